use super::queue::{QueueError, UpdateQueue};
use catalog_types::update::{BatchUpdateTask, Cadence, Configuration, ConfigurationError};
use derive_more::{Display, Error};
use std::sync::Arc;

#[derive(Debug, Display, Error, PartialEq, Eq)]
pub enum ContextError {
    #[display("No update queue configured")]
    MissingQueue,
}

#[derive(Debug, Display, Error)]
pub enum ResolveError {
    #[display("Invalid configuration: {_0}")]
    Configuration(ConfigurationError),
    #[display("Invalid context: {_0}")]
    Context(ContextError),
    Queue(QueueError),
}

/// What a worker is being resolved against: the queue of its provider and
/// the cadence of the current run.
#[derive(Clone)]
pub struct ConfigurationContext {
    queue: Option<Arc<dyn UpdateQueue>>,
    cadence: Cadence,
}

impl ConfigurationContext {
    pub fn new(queue: Option<Arc<dyn UpdateQueue>>, cadence: Cadence) -> Self {
        Self { queue, cadence }
    }

    pub fn cadence(&self) -> Cadence {
        self.cadence
    }

    pub fn validate(&self) -> Result<&Arc<dyn UpdateQueue>, ContextError> {
        self.queue.as_ref().ok_or(ContextError::MissingQueue)
    }
}

/// Cuts a batch of at most `max_tasks` products once the queue holds at least
/// `min_tasks`. `Ok(None)` means there is nothing to do yet.
pub async fn resolve(
    config: &Configuration,
    context: &ConfigurationContext,
) -> Result<Option<BatchUpdateTask>, ResolveError> {
    let thresholds = config.validate().map_err(ResolveError::Configuration)?;
    let queue = context.validate().map_err(ResolveError::Context)?;
    let size = queue.size().await.map_err(ResolveError::Queue)?;
    if size < thresholds.min_tasks {
        log::debug!(
            "Queue {} holds {size} of {} task(s) needed for a {} run",
            queue.provider_slug(),
            thresholds.min_tasks,
            context.cadence
        );
        return Ok(None);
    }
    queue
        .get_batched(thresholds.max_tasks)
        .await
        .map_err(ResolveError::Queue)
}
