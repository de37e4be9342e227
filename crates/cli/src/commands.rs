//! Command execution and output rendering.

use agent::HttpAgent;
use anyhow::bail;
use protocol::{
    CallFields, CanisterId, CborCodec, HttpAgentRequest, HttpRequest, QueryFields, QueryResponse,
    RequestBody, RequestStatusFields, RequestStatusResponse, SubmitRequest, SubmitResponse, Value,
};
use tracing::info;

use crate::config::{Cli, Command, OutputFormat};

/// Runs the selected command and prints its result to stdout.
pub async fn run(cli: &Cli) -> anyhow::Result<()> {
    let agent = cli.connection.agent()?;
    info!(url = %cli.connection.url, api_version = %cli.connection.api_version, "agent ready");

    let output = match &cli.command {
        Command::Call {
            canister,
            method,
            arg,
        } => {
            let fields = CallFields {
                method_name: method.clone(),
                arg: arg.clone(),
            };
            let response = submit_call(&agent, canister.clone(), fields).await?;
            render_submit(&response)
        }
        Command::Query {
            canister,
            method,
            arg,
            output,
        } => {
            let response = agent
                .query(
                    canister.clone(),
                    QueryFields {
                        method_name: method.clone(),
                        arg: arg.clone(),
                    },
                )
                .await?;
            render_query(&response, *output)?
        }
        Command::RequestStatus { request_id, output } => {
            let response = agent
                .request_status(RequestStatusFields {
                    request_id: *request_id,
                })
                .await?;
            render_status(&response, *output)?
        }
    };

    println!("{output}");
    Ok(())
}

/// Submits a call whose printed request id can be used with `request-status`.
///
/// The id is derived from the request as handed to the agent, while the
/// nonce and expiry stages add fields on the way out. Running the call through
/// the pipeline first fixes those fields in the submitted request; the stages
/// then leave it unchanged, so the id covers the body on the wire.
async fn submit_call(
    agent: &HttpAgent,
    canister: CanisterId,
    fields: CallFields,
) -> anyhow::Result<SubmitResponse> {
    let envelope = HttpAgentRequest::new(
        HttpRequest::post(CborCodec::CONTENT_TYPE),
        RequestBody::Submit(SubmitRequest::call(canister, fields)),
    );
    let RequestBody::Submit(request) = agent.pipeline().apply(envelope).await?.body else {
        bail!("pipeline turned the call into a read request");
    };
    Ok(agent.submit(request).await?)
}

fn render_submit(response: &SubmitResponse) -> String {
    format!(
        "request_id: {}\nstatus: {}",
        response.request_id, response.response.status
    )
}

fn render_query(response: &QueryResponse, format: OutputFormat) -> anyhow::Result<String> {
    match (format, response) {
        (OutputFormat::Json, _) => json(&response.to_value()),
        (OutputFormat::Raw, QueryResponse::Replied { arg }) => Ok(arg.to_string()),
        (
            OutputFormat::Raw,
            QueryResponse::Rejected {
                reject_code,
                reject_message,
            },
        ) => bail!(
            "query rejected (code {}): {reject_message}",
            u64::from(*reject_code)
        ),
    }
}

fn render_status(response: &RequestStatusResponse, format: OutputFormat) -> anyhow::Result<String> {
    match (format, response) {
        (OutputFormat::Json, _) => json(&response.to_value()),
        (OutputFormat::Raw, RequestStatusResponse::Replied { reply }) => {
            Ok(format!("replied\n{reply}"))
        }
        (
            OutputFormat::Raw,
            RequestStatusResponse::Rejected {
                reject_code,
                reject_message,
            },
        ) => Ok(format!(
            "rejected (code {}): {reject_message}",
            u64::from(*reject_code)
        )),
        (OutputFormat::Raw, other) => Ok(other.status().to_owned()),
    }
}

fn json(value: &Value) -> anyhow::Result<String> {
    Ok(serde_json::to_string_pretty(&to_json(value))?)
}

/// Byte strings render as lowercase hex.
fn to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Nat(n) => serde_json::Value::from(*n),
        Value::Int(n) => serde_json::Value::from(*n),
        Value::Bytes(bytes) => serde_json::Value::String(hex::encode(bytes)),
        Value::Text(text) => serde_json::Value::String(text.clone()),
        Value::Array(items) => serde_json::Value::Array(items.iter().map(to_json).collect()),
        Value::Map(entries) => serde_json::Value::Object(
            entries
                .iter()
                .map(|(key, value)| (key.clone(), to_json(value)))
                .collect(),
        ),
    }
}
