use super::queue::UpdateQueues;
use catalog_types::product::Product;
use catalog_types::provider::{Provider, ProviderRepository};
use catalog_types::shop::ShopTemplateRepository;
use catalog_types::update::UpdateTask;
use std::collections::BTreeSet;
use std::sync::Arc;
use typesafe_repository::async_ops::Get;
use typesafe_repository::IdentityOf;

/// Turns products into pending update tasks, one per provider.
pub struct UpdateMediator {
    shop_templates: Arc<dyn ShopTemplateRepository>,
    providers: Arc<dyn ProviderRepository>,
    queues: UpdateQueues,
}

impl UpdateMediator {
    pub fn new(
        shop_templates: Arc<dyn ShopTemplateRepository>,
        providers: Arc<dyn ProviderRepository>,
        queues: UpdateQueues,
    ) -> Self {
        Self {
            shop_templates,
            providers,
            queues,
        }
    }

    pub fn queues(&self) -> &UpdateQueues {
        &self.queues
    }

    async fn providers_of(&self, product: &Product) -> Result<Vec<Provider>, anyhow::Error> {
        let mut seen: BTreeSet<IdentityOf<Provider>> = BTreeSet::new();
        let mut providers = vec![];
        for shop in product.display_shops() {
            let Some(template) = self.shop_templates.get_one(&shop.template_id).await? else {
                log::warn!(
                    "Shop template {} of product #{} not found",
                    shop.template_id,
                    product.id
                );
                continue;
            };
            let Some(provider_id) = template.provider_id else {
                continue;
            };
            if !seen.insert(provider_id) {
                continue;
            }
            match self.providers.get_one(&provider_id).await? {
                Some(provider) => providers.push(provider),
                None => log::warn!("Provider {provider_id} of shop template {} not found", template.id),
            }
        }
        Ok(providers)
    }

    /// Enqueues `product` for every provider that has a queue and is not
    /// already waiting on it. Returns the number of tasks added.
    pub async fn mediate(&self, product: &Product) -> Result<usize, anyhow::Error> {
        let mut added = 0;
        for provider in self.providers_of(product).await? {
            let Some(queue) = self.queues.for_provider(&provider) else {
                continue;
            };
            if queue.contains(&product.id).await? {
                continue;
            }
            queue
                .put(UpdateTask::new(provider, product.clone()))
                .await?;
            added += 1;
        }
        Ok(added)
    }

    /// Mediates every product, logging failures and moving on.
    pub async fn mediate_all(&self, products: &[Product]) -> usize {
        let mut added = 0;
        for product in products {
            match self.mediate(product).await {
                Ok(n) => added += n,
                Err(err) => log::error!("Unable to enqueue product #{}: {err:#}", product.id),
            }
        }
        added
    }
}
