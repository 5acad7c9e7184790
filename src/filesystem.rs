//! Repositories keeping one JSON document per entity in a directory.

use anyhow::Context as AnyhowContext;
use async_trait::async_trait;
use catalog_types::provider::{Provider, ProviderRepository};
use catalog_types::shop::{ByProvider, ShopTemplate, ShopTemplateRepository};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::fmt::Display;
use std::io::ErrorKind;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use typesafe_repository::async_ops::{Get, List, Remove, Save, Select};
use typesafe_repository::{GetIdentity, Identity, IdentityOf, Repository};

pub const SHOP_TEMPLATE_DIR: &str = "shop_templates.d";
pub const PROVIDER_DIR: &str = "providers.d";

pub struct FileSystemRepository<T> {
    dir: PathBuf,
    _entity: PhantomData<fn() -> T>,
}

impl<T> FileSystemRepository<T> {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self {
            dir: dir.into(),
            _entity: PhantomData,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path<I: Display>(&self, id: &I) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }
}

/// The file name is the source of truth for the id.
async fn read_document<T: DeserializeOwned, I: Display>(
    path: &Path,
    id: &I,
) -> Result<T, anyhow::Error> {
    let content = tokio::fs::read_to_string(path).await?;
    let value = match serde_json::from_str(&content)
        .with_context(|| format!("Unable to parse {}", path.display()))?
    {
        Value::Object(mut map) => {
            map.insert("id".to_string(), Value::String(id.to_string()));
            Value::Object(map)
        }
        val => val,
    };
    Ok(serde_json::from_value(value)
        .with_context(|| format!("Unable to decode {}", path.display()))?)
}

fn is_not_found(err: &anyhow::Error) -> bool {
    err.downcast_ref::<std::io::Error>()
        .is_some_and(|e| e.kind() == ErrorKind::NotFound)
}

impl<T: Identity> Repository<T> for FileSystemRepository<T> {
    type Error = anyhow::Error;
}

#[async_trait]
impl<T> Get<T> for FileSystemRepository<T>
where
    T: Identity + DeserializeOwned + Send + Sync + 'static,
    IdentityOf<T>: Display + Send + Sync,
{
    async fn get_one(&self, id: &IdentityOf<T>) -> Result<Option<T>, Self::Error> {
        match read_document(&self.path(id), id).await {
            Ok(t) => Ok(Some(t)),
            Err(err) if is_not_found(&err) => Ok(None),
            Err(err) => Err(err),
        }
    }
}

#[async_trait]
impl<T> List<T> for FileSystemRepository<T>
where
    T: Identity + DeserializeOwned + Send + Sync + 'static,
    IdentityOf<T>: Display + FromStr + Ord + Send + Sync,
{
    async fn list(&self) -> Result<Vec<T>, Self::Error> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(r) => r,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(vec![]),
            Err(err) => return Err(err.into()),
        };
        let mut ids = vec![];
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) != Some("json") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            match stem.parse::<IdentityOf<T>>() {
                Ok(id) => ids.push(id),
                Err(_) => log::warn!("Skipping {}: file name is not an id", path.display()),
            }
        }
        ids.sort();
        let mut res = Vec::with_capacity(ids.len());
        for id in ids {
            res.push(read_document(&self.path(&id), &id).await?);
        }
        Ok(res)
    }
}

#[async_trait]
impl<T> Save<T> for FileSystemRepository<T>
where
    T: Identity + GetIdentity + Serialize + Send + Sync + 'static,
    IdentityOf<T>: Display + Send + Sync,
{
    async fn save(&self, t: T) -> Result<(), Self::Error> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("Unable to create {}", self.dir.display()))?;
        let path = self.path(&t.id());
        tokio::fs::write(&path, serde_json::to_string_pretty(&t)?)
            .await
            .with_context(|| format!("Unable to write {}", path.display()))?;
        Ok(())
    }
}

#[async_trait]
impl<T> Remove<T> for FileSystemRepository<T>
where
    T: Identity + Send + Sync + 'static,
    IdentityOf<T>: Display + Send + Sync,
{
    async fn remove(&self, id: &IdentityOf<T>) -> Result<(), Self::Error> {
        match tokio::fs::remove_file(self.path(id)).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err).context("Unable to remove document"),
        }
    }
}

#[async_trait]
impl Select<ShopTemplate, ByProvider> for FileSystemRepository<ShopTemplate> {
    async fn select(&self, ByProvider(id): &ByProvider) -> Result<Vec<ShopTemplate>, Self::Error> {
        Ok(self
            .list()
            .await?
            .into_iter()
            .filter(|t| t.provider_id.as_ref() == Some(id))
            .collect())
    }
}

impl ShopTemplateRepository for FileSystemRepository<ShopTemplate> {}
impl ProviderRepository for FileSystemRepository<Provider> {}
