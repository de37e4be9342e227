//! Priority-ordered transform pipeline.
//!
//! Stages are kept sorted from highest to lowest priority at all times. A new
//! stage is inserted before the first stage whose priority is strictly lower
//! than its own, or appended when there is none; a stage registered with the
//! same priority as existing ones therefore lands at the end of that block.
//!
//! Cloning a pipeline copies the list. Stages themselves are shared, but
//! registering on one copy never changes the other.

use std::sync::Arc;

use protocol::{AgentError, HttpAgentRequest, Transform};
use tracing::{debug, trace};

#[derive(Clone)]
struct Stage {
    priority: i32,
    transform: Arc<dyn Transform>,
}

/// An ordered list of [`Transform`] stages.
#[derive(Clone, Default)]
pub struct TransformPipeline {
    stages: Vec<Stage>,
}

impl TransformPipeline {
    /// Creates an empty pipeline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `transform` at its own declared priority.
    pub fn add<T: Transform + 'static>(&mut self, transform: T) {
        let priority = transform.priority();
        self.insert(Arc::new(transform), priority);
    }

    /// Registers `transform` at an explicit priority, overriding its declared one.
    pub fn add_with_priority<T: Transform + 'static>(&mut self, transform: T, priority: i32) {
        self.insert(Arc::new(transform), priority);
    }

    /// Registers an already-shared stage at `priority`.
    pub fn insert(&mut self, transform: Arc<dyn Transform>, priority: i32) {
        let index = self
            .stages
            .iter()
            .position(|stage| stage.priority < priority)
            .unwrap_or(self.stages.len());
        debug!(stage = transform.name(), priority, index, "registering transform");
        self.stages.insert(index, Stage { priority, transform });
    }

    /// Number of registered stages.
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Returns `true` if no stage is registered.
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Priorities of the registered stages, in execution order.
    pub fn priorities(&self) -> Vec<i32> {
        self.stages.iter().map(|stage| stage.priority).collect()
    }

    /// Names of the registered stages, in execution order.
    pub fn names(&self) -> Vec<&str> {
        self.stages.iter().map(|stage| stage.transform.name()).collect()
    }

    /// Runs every stage in order.
    ///
    /// Each stage sees the previous stage's output; a stage returning `None`
    /// passes its input through unchanged. The first failing stage aborts the
    /// run and its error is returned as is.
    pub async fn apply(&self, request: HttpAgentRequest) -> Result<HttpAgentRequest, AgentError> {
        let mut current = request;
        for stage in &self.stages {
            match stage.transform.apply(&current).await? {
                Some(next) => {
                    trace!(stage = stage.transform.name(), "transform replaced request");
                    current = next;
                }
                None => trace!(stage = stage.transform.name(), "transform left request as is"),
            }
        }
        Ok(current)
    }
}

impl std::fmt::Debug for TransformPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(
                self.stages
                    .iter()
                    .map(|stage| (stage.transform.name(), stage.priority)),
            )
            .finish()
    }
}
