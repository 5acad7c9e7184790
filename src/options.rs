use anyhow::Context as AnyhowContext;
use catalog_amazon::AmazonOptions;
use catalog_types::parse_duration;
use catalog_types::provider::{AmazonProvider, Provider, ProviderRepository, AMAZON_SLUG};
use serde::{Deserialize, Deserializer};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;
use typesafe_repository::async_ops::{List, Save};

pub const CONFIG_PATH_VAR: &str = "CATALOG_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "catalog.yml";

#[derive(Deserialize, Debug, Clone, PartialEq, Eq, Default)]
#[serde(default)]
pub struct CatalogOptions {
    pub storage: StorageOptions,
    pub update: UpdateOptions,
    pub amazon: AmazonOptions,
    pub amazon_credentials: AmazonCredentials,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct StorageOptions {
    pub database: PathBuf,
    pub shop_template_dir: PathBuf,
    pub provider_dir: PathBuf,
}

impl Default for StorageOptions {
    fn default() -> Self {
        Self {
            database: PathBuf::from("storage/catalog.db"),
            shop_template_dir: PathBuf::from(crate::filesystem::SHOP_TEMPLATE_DIR),
            provider_dir: PathBuf::from(crate::filesystem::PROVIDER_DIR),
        }
    }
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Sqlite,
    Memory,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct UpdateOptions {
    pub batches_per_run: usize,
    pub queue: Backend,
    pub semaphore: Backend,
    #[serde(deserialize_with = "deserialize_optional_duration")]
    pub semaphore_stale_after: Option<Duration>,
}

impl Default for UpdateOptions {
    fn default() -> Self {
        Self {
            batches_per_run: 1,
            queue: Backend::Sqlite,
            semaphore: Backend::Sqlite,
            semaphore_stale_after: None,
        }
    }
}

fn deserialize_optional_duration<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)?.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => parse_duration(s).map(Some).map_err(serde::de::Error::custom),
    }
}

/// Credentials of the Amazon provider, usually supplied through the
/// environment rather than the options file.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq, Default)]
#[serde(default)]
pub struct AmazonCredentials {
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    pub country: Option<String>,
    pub associate_tag: Option<String>,
}

impl AmazonCredentials {
    pub const ACCESS_KEY_VAR: &'static str = "AMAZON_ACCESS_KEY";
    pub const SECRET_KEY_VAR: &'static str = "AMAZON_SECRET_KEY";
    pub const COUNTRY_VAR: &'static str = "AMAZON_COUNTRY";
    pub const ASSOCIATE_TAG_VAR: &'static str = "AMAZON_ASSOCIATE_TAG";

    fn entries(&self) -> impl Iterator<Item = (&'static str, &String)> {
        [
            (AmazonProvider::ACCESS_KEY, &self.access_key),
            (AmazonProvider::SECRET_KEY, &self.secret_key),
            (AmazonProvider::COUNTRY, &self.country),
            (AmazonProvider::ASSOCIATE_TAG, &self.associate_tag),
        ]
        .into_iter()
        .filter_map(|(k, v)| v.as_ref().map(|v| (k, v)))
    }

    pub fn is_empty(&self) -> bool {
        self.entries().next().is_none()
    }

    pub fn apply_env<F: Fn(&str) -> Option<String>>(&mut self, var: F) {
        for (key, field) in [
            (Self::ACCESS_KEY_VAR, &mut self.access_key),
            (Self::SECRET_KEY_VAR, &mut self.secret_key),
            (Self::COUNTRY_VAR, &mut self.country),
            (Self::ASSOCIATE_TAG_VAR, &mut self.associate_tag),
        ] {
            if let Some(value) = var(key).filter(|v| !v.trim().is_empty()) {
                *field = Some(value);
            }
        }
    }

    /// Writes the credentials into the stored Amazon provider, creating it
    /// when none exists yet.
    pub async fn sync(
        &self,
        providers: &dyn ProviderRepository,
    ) -> Result<Option<Provider>, anyhow::Error> {
        if self.is_empty() {
            return Ok(None);
        }
        let existing = providers
            .list()
            .await?
            .into_iter()
            .find(|p| p.slug.as_str() == AMAZON_SLUG);
        let provider = match existing {
            Some(mut provider) => {
                let credentials = provider
                    .credentials
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .chain(self.entries().map(|(k, v)| (k.to_string(), v.clone())))
                    .collect();
                provider.credentials = credentials;
                AmazonProvider::try_from(&provider)?;
                provider
            }
            None => Provider::amazon(self.entries().collect())?,
        };
        providers
            .save(provider.clone())
            .await
            .context("Unable to store Amazon provider")?;
        Ok(Some(provider))
    }
}

impl CatalogOptions {
    /// A missing file yields the defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, anyhow::Error> {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(content) if content.trim().is_empty() => Ok(Self::default()),
            Ok(content) => serde_yaml::from_str(&content)
                .with_context(|| format!("Unable to parse {}", path.display())),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                log::info!("{} not found, using default options", path.display());
                Ok(Self::default())
            }
            Err(err) => Err(err).with_context(|| format!("Unable to read {}", path.display())),
        }
    }

    pub fn from_env() -> Result<Self, anyhow::Error> {
        let path = envmnt::get_or(CONFIG_PATH_VAR, DEFAULT_CONFIG_PATH);
        let mut options = Self::load(path)?;
        options
            .amazon_credentials
            .apply_env(|key| envmnt::exists(key).then(|| envmnt::get_or(key, "")));
        Ok(options)
    }
}
