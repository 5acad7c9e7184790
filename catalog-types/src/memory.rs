//! Repositories kept in process memory. Used by tests and as a scratch backend.

use crate::attribute::{AttributeTemplate, AttributeTemplateRepository};
use crate::detail::{DetailTemplate, DetailTemplateRepository};
use crate::product::{Product, ProductRepository};
use crate::provider::{Provider, ProviderRepository};
use crate::shop::{ByProvider, ShopTemplate, ShopTemplateRepository};
use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::RwLock;
use typesafe_repository::async_ops::{Get, List, Remove, Save, Select};
use typesafe_repository::{GetIdentity, Identity, IdentityOf, Repository};

pub struct InMemoryRepository<T: Identity> {
    items: RwLock<BTreeMap<IdentityOf<T>, T>>,
}

impl<T: Identity> Default for InMemoryRepository<T>
where
    IdentityOf<T>: Ord,
{
    fn default() -> Self {
        Self {
            items: RwLock::new(BTreeMap::new()),
        }
    }
}

impl<T: Identity> InMemoryRepository<T>
where
    IdentityOf<T>: Ord,
{
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.items.read().await.len()
    }
}

impl<T: Identity> Repository<T> for InMemoryRepository<T> {
    type Error = anyhow::Error;
}

#[async_trait]
impl<T> Get<T> for InMemoryRepository<T>
where
    T: Identity + Clone + Send + Sync + 'static,
    IdentityOf<T>: Ord + Send + Sync,
{
    async fn get_one(&self, id: &IdentityOf<T>) -> Result<Option<T>, Self::Error> {
        Ok(self.items.read().await.get(id).cloned())
    }
}

#[async_trait]
impl<T> List<T> for InMemoryRepository<T>
where
    T: Identity + Clone + Send + Sync + 'static,
    IdentityOf<T>: Ord + Send + Sync,
{
    async fn list(&self) -> Result<Vec<T>, Self::Error> {
        Ok(self.items.read().await.values().cloned().collect())
    }
}

#[async_trait]
impl<T> Save<T> for InMemoryRepository<T>
where
    T: Identity + GetIdentity + Send + Sync + 'static,
    IdentityOf<T>: Ord + Send + Sync,
{
    async fn save(&self, t: T) -> Result<(), Self::Error> {
        self.items.write().await.insert(t.id(), t);
        Ok(())
    }
}

#[async_trait]
impl<T> Remove<T> for InMemoryRepository<T>
where
    T: Identity + Send + Sync + 'static,
    IdentityOf<T>: Ord + Send + Sync,
{
    async fn remove(&self, id: &IdentityOf<T>) -> Result<(), Self::Error> {
        self.items.write().await.remove(id);
        Ok(())
    }
}

#[async_trait]
impl Select<ShopTemplate, ByProvider> for InMemoryRepository<ShopTemplate> {
    async fn select(&self, ByProvider(id): &ByProvider) -> Result<Vec<ShopTemplate>, Self::Error> {
        Ok(self
            .items
            .read()
            .await
            .values()
            .filter(|t| t.provider_id.as_ref() == Some(id))
            .cloned()
            .collect())
    }
}

impl ProductRepository for InMemoryRepository<Product> {}
impl ShopTemplateRepository for InMemoryRepository<ShopTemplate> {}
impl ProviderRepository for InMemoryRepository<Provider> {}
impl AttributeTemplateRepository for InMemoryRepository<AttributeTemplate> {}
impl DetailTemplateRepository for InMemoryRepository<DetailTemplate> {}
