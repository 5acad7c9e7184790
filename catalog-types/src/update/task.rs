use crate::product::Product;
use crate::provider::Provider;
use serde::{Deserialize, Serialize};
use typesafe_repository::IdentityOf;

/// A single product waiting to be refreshed from `provider`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct UpdateTask {
    pub provider: Provider,
    pub product: Product,
    #[serde(default)]
    pub priority: i64,
}

impl UpdateTask {
    pub fn new(provider: Provider, product: Product) -> Self {
        Self {
            provider,
            product,
            priority: 0,
        }
    }

    pub fn with_priority(mut self, priority: i64) -> Self {
        self.priority = priority;
        self
    }
}

/// Products refreshed together in one remote lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchUpdateTask {
    provider: Provider,
    limit: Option<usize>,
    products: Vec<Product>,
}

impl BatchUpdateTask {
    pub fn new(provider: Provider, limit: Option<usize>) -> Self {
        Self {
            provider,
            limit,
            products: vec![],
        }
    }

    pub fn provider(&self) -> &Provider {
        &self.provider
    }

    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    pub fn has_reached_limit(&self) -> bool {
        self.limit.is_some_and(|l| self.products.len() >= l)
    }

    pub fn has_product(&self, id: &IdentityOf<Product>) -> bool {
        self.products.iter().any(|p| p.id == *id)
    }

    /// Adds `product`, replacing a product with the same id in place.
    /// Returns `false` if the product was rejected because the limit is reached.
    pub fn add_product(&mut self, product: Product) -> bool {
        if let Some(existing) = self.products.iter_mut().find(|p| p.id == product.id) {
            *existing = product;
            return true;
        }
        if self.has_reached_limit() {
            return false;
        }
        self.products.push(product);
        true
    }

    pub fn remove_product(&mut self, id: &IdentityOf<Product>) -> Option<Product> {
        let i = self.products.iter().position(|p| p.id == *id)?;
        Some(self.products.remove(i))
    }

    pub fn products(&self) -> &[Product] {
        &self.products
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    pub fn into_products(self) -> Vec<Product> {
        self.products
    }

    pub fn into_parts(self) -> (Provider, Vec<Product>) {
        (self.provider, self.products)
    }

    /// Splits the batch back into single tasks.
    pub fn into_tasks(self) -> impl Iterator<Item = UpdateTask> {
        let provider = self.provider;
        self.products
            .into_iter()
            .map(move |p| UpdateTask::new(provider.clone(), p))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ProviderType;

    pub fn provider() -> Provider {
        Provider {
            id: uuid::Uuid::new_v4(),
            name: "Amazon".into(),
            slug: "amazon".into(),
            kind: ProviderType::Amazon,
            credentials: Default::default(),
        }
    }

    #[test]
    fn never_exceeds_limit() {
        let mut batch = BatchUpdateTask::new(provider(), Some(2));
        assert!(batch.add_product(Product::simple("a", vec![])));
        assert!(!batch.has_reached_limit());
        assert!(batch.add_product(Product::simple("b", vec![])));
        assert!(batch.has_reached_limit());
        assert!(!batch.add_product(Product::simple("c", vec![])));
        assert_eq!(2, batch.len());
        assert!(batch.has_reached_limit());
    }

    #[test]
    fn replaces_product_with_same_id() {
        let mut batch = BatchUpdateTask::new(provider(), Some(1));
        let mut p = Product::simple("a", vec![]);
        batch.add_product(p.clone());
        p.name = "renamed".into();
        assert!(batch.add_product(p.clone()));
        assert_eq!(1, batch.len());
        assert_eq!("renamed", batch.products()[0].name);
    }

    #[test]
    fn removing_absent_product_is_noop() {
        let mut batch = BatchUpdateTask::new(provider(), None);
        let p = Product::simple("a", vec![]);
        let id = p.id;
        batch.add_product(p);
        assert!(batch.remove_product(&uuid::Uuid::new_v4()).is_none());
        assert!(batch.has_product(&id));
        assert!(batch.remove_product(&id).is_some());
        assert!(batch.is_empty());
        assert!(!batch.has_reached_limit());
    }

    #[test]
    fn splits_into_tasks() {
        let mut batch = BatchUpdateTask::new(provider(), None);
        batch.add_product(Product::simple("a", vec![]));
        batch.add_product(Product::simple("b", vec![]));
        let tasks = batch.into_tasks().collect::<Vec<_>>();
        assert_eq!(2, tasks.len());
        assert_eq!("b", tasks[1].product.name);
        assert_eq!(0, tasks[1].priority);
    }
}
