use crate::provider::CredentialsError;
use crate::update::{BatchUpdateTask, Cadence, Configuration};
use async_trait::async_trait;
use derive_more::{Display, Error};

/// Why a worker finished without touching any product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum SkipReason {
    #[display("batch belongs to another provider")]
    ForeignProvider,
    #[display("batch has no products")]
    NoProducts,
    #[display("no affiliate product ids found")]
    NoAffiliateProductIds,
    #[display("provider returned no items")]
    NoItemsReturned,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum UpdateOutcome {
    #[display("skipped: {_0}")]
    Skipped(SkipReason),
    #[display("updated {stored} product(s)")]
    Updated { stored: usize },
}

#[derive(Debug, Display, Error)]
pub enum UpdateError {
    Credentials(CredentialsError),
    #[display("Unable to look up items: {_0:#}")]
    Lookup(#[error(ignore)] anyhow::Error),
}

/// Refreshes products of one provider type.
#[async_trait]
pub trait UpdateWorker: Send + Sync {
    fn name(&self) -> &str;

    /// Fills in the options the resolver needs to cut a batch for this worker.
    fn configure(&self, config: &mut Configuration);

    async fn execute(
        &self,
        batch: BatchUpdateTask,
        cadence: Cadence,
    ) -> Result<UpdateOutcome, UpdateError>;
}
