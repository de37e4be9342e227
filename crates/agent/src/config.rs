//! Agent configuration.

use protocol::{ApiVersion, Endpoint};
use serde::{Deserialize, Serialize};

/// Settings fixed when an [`crate::HttpAgent`] is built.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentConfig {
    /// API version used in the route prefix (`/api/{version}/...`).
    #[serde(default)]
    pub api_version: ApiVersion,
}

impl AgentConfig {
    /// Route for `endpoint` under the configured version.
    pub fn route(&self, endpoint: Endpoint) -> String {
        self.api_version.route(endpoint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_v1_routes() {
        let config = AgentConfig::default();
        assert_eq!(config.route(Endpoint::Submit), "/api/v1/submit");
        assert_eq!(config.route(Endpoint::Read), "/api/v1/read");
    }

    #[test]
    fn missing_version_deserializes_to_default() {
        let config: AgentConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, AgentConfig::default());

        let config: AgentConfig = serde_json::from_str(r#"{"api_version":2}"#).unwrap();
        assert_eq!(config.route(Endpoint::Read), "/api/v2/read");
    }
}
