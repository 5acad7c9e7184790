use super::mediator::UpdateMediator;
use super::resolver::{resolve, ConfigurationContext};
use super::timer::UpdateRunner;
use anyhow::Context as AnyhowContext;
use async_trait::async_trait;
use catalog_types::product::ProductRepository;
use catalog_types::update::{Cadence, Configuration, UpdateWorker};
use std::sync::Arc;
use typesafe_repository::async_ops::List;

pub struct UpdateManager {
    products: Arc<dyn ProductRepository>,
    mediator: UpdateMediator,
    workers: Vec<Arc<dyn UpdateWorker>>,
    batches_per_run: usize,
}

impl UpdateManager {
    pub fn new(
        products: Arc<dyn ProductRepository>,
        mediator: UpdateMediator,
        workers: Vec<Arc<dyn UpdateWorker>>,
        batches_per_run: usize,
    ) -> Self {
        Self {
            products,
            mediator,
            workers,
            batches_per_run: batches_per_run.max(1),
        }
    }

    /// Resolves and executes batches for `worker` until the resolver has
    /// nothing more or the per-run limit is hit.
    async fn run_worker(&self, worker: &dyn UpdateWorker, cadence: Cadence) -> usize {
        let mut config = Configuration::new();
        worker.configure(&mut config);
        let queue = config
            .provider_slug()
            .and_then(|slug| self.mediator.queues().get(slug));
        let context = ConfigurationContext::new(queue, cadence);
        let mut executed = 0;
        for _ in 0..self.batches_per_run {
            let batch = match resolve(&config, &context).await {
                Ok(Some(batch)) => batch,
                Ok(None) => break,
                Err(err) => {
                    log::error!("Unable to resolve {} batch: {err}", worker.name());
                    break;
                }
            };
            executed += 1;
            match worker.execute(batch, cadence).await {
                Ok(outcome) => log::info!("{} {cadence} batch: {outcome}", worker.name()),
                Err(err) => log::error!("{} {cadence} batch failed: {err}", worker.name()),
            }
        }
        executed
    }
}

#[async_trait]
impl UpdateRunner for UpdateManager {
    async fn run_tasks(&self, cadence: Cadence) -> Result<(), anyhow::Error> {
        let products = self
            .products
            .list()
            .await
            .context("Unable to list products")?;
        let added = self.mediator.mediate_all(&products).await;
        log::debug!("Enqueued {added} product(s) for the {cadence} run");
        for worker in &self.workers {
            self.run_worker(worker.as_ref(), cadence).await;
        }
        Ok(())
    }
}
