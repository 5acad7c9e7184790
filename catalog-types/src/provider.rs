use crate::Slug;
use derive_more::{Deref, Display, Error};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use typesafe_repository::async_ops::{Get, List, Remove, Save};
use typesafe_repository::macros::Id;
use typesafe_repository::prelude::*;
use typesafe_repository::Repository;
use uuid::Uuid;

pub const AMAZON_SLUG: &str = "amazon";

pub trait ProviderRepository:
    Repository<Provider, Error = anyhow::Error>
    + Get<Provider>
    + List<Provider>
    + Remove<Provider>
    + Save<Provider>
    + Send
    + Sync
{
}

/// Types without a worker keep their stored name.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash, Display)]
#[serde(from = "String", into = "String")]
pub enum ProviderType {
    #[display("amazon")]
    Amazon,
    #[display("{_0}")]
    Other(String),
}

impl From<String> for ProviderType {
    fn from(s: String) -> Self {
        match s.trim() {
            t if t.eq_ignore_ascii_case("amazon") => Self::Amazon,
            t => Self::Other(t.to_string()),
        }
    }
}

impl From<ProviderType> for String {
    fn from(t: ProviderType) -> Self {
        t.to_string()
    }
}

#[derive(Debug, Display, Error, PartialEq, Eq)]
pub enum CredentialsError {
    #[display("Missing credential \"{_0}\"")]
    Missing(#[error(ignore)] &'static str),
    #[display("Credential \"{_0}\" is empty")]
    Empty(#[error(ignore)] &'static str),
    #[display("Provider {_0} is not an Amazon provider")]
    WrongType(#[error(ignore)] String),
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default, Deref)]
#[serde(transparent)]
pub struct Credentials(BTreeMap<String, String>);

impl Credentials {
    pub fn require(&self, key: &'static str) -> Result<&str, CredentialsError> {
        match self.0.get(key).map(|v| v.trim()) {
            None => Err(CredentialsError::Missing(key)),
            Some("") => Err(CredentialsError::Empty(key)),
            Some(v) => Ok(v),
        }
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Credentials {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

#[derive(Id, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[Id(ref_id, get_id)]
pub struct Provider {
    pub id: Uuid,
    pub name: String,
    pub slug: Slug,
    #[serde(rename = "type")]
    pub kind: ProviderType,
    #[serde(default)]
    pub credentials: Credentials,
}

impl Provider {
    /// Builds an Amazon provider, failing on the first missing credential.
    pub fn amazon(credentials: Credentials) -> Result<Self, CredentialsError> {
        let provider = Self {
            id: Uuid::new_v4(),
            name: "Amazon".to_string(),
            slug: Slug::from_name(AMAZON_SLUG),
            kind: ProviderType::Amazon,
            credentials,
        };
        AmazonProvider::try_from(&provider)?;
        Ok(provider)
    }

    pub fn is_amazon(&self) -> bool {
        self.kind == ProviderType::Amazon
    }
}

/// Validated view over the credentials of an Amazon provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AmazonProvider {
    pub access_key: String,
    pub secret_key: String,
    pub country: String,
    pub associate_tag: String,
}

impl AmazonProvider {
    pub const ACCESS_KEY: &'static str = "access_key";
    pub const SECRET_KEY: &'static str = "secret_key";
    pub const COUNTRY: &'static str = "country";
    pub const ASSOCIATE_TAG: &'static str = "associate_tag";
}

impl TryFrom<&Provider> for AmazonProvider {
    type Error = CredentialsError;

    fn try_from(p: &Provider) -> Result<Self, Self::Error> {
        if !p.is_amazon() {
            return Err(CredentialsError::WrongType(p.slug.to_string()));
        }
        let c = &p.credentials;
        Ok(Self {
            access_key: c.require(Self::ACCESS_KEY)?.to_string(),
            secret_key: c.require(Self::SECRET_KEY)?.to_string(),
            country: c.require(Self::COUNTRY)?.to_string(),
            associate_tag: c.require(Self::ASSOCIATE_TAG)?.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full() -> Vec<(&'static str, &'static str)> {
        vec![
            ("access_key", "AKIA"),
            ("secret_key", "secret"),
            ("country", "de"),
            ("associate_tag", "tag-21"),
        ]
    }

    #[test]
    fn builds_amazon_provider() {
        let provider = Provider::amazon(full().into_iter().collect()).unwrap();
        assert_eq!("amazon", provider.slug.as_str());
        let amazon = AmazonProvider::try_from(&provider).unwrap();
        assert_eq!("de", amazon.country);
        assert_eq!("tag-21", amazon.associate_tag);
    }

    #[test]
    fn fails_fast_on_missing_key() {
        let creds = full()
            .into_iter()
            .filter(|(k, _)| *k != "country")
            .collect();
        assert_eq!(
            Err(CredentialsError::Missing("country")),
            Provider::amazon(creds)
        );
        let creds = full()
            .into_iter()
            .map(|(k, v)| if k == "secret_key" { (k, " ") } else { (k, v) })
            .collect();
        assert_eq!(Err(CredentialsError::Empty("secret_key")), Provider::amazon(creds));
    }

    #[test]
    fn rejects_foreign_provider() {
        let mut provider = Provider::amazon(full().into_iter().collect()).unwrap();
        provider.kind = ProviderType::Other("ebay".to_string());
        assert!(matches!(
            AmazonProvider::try_from(&provider),
            Err(CredentialsError::WrongType(_))
        ));
    }

    #[test]
    fn keeps_unknown_type_name() {
        let p: Provider = serde_json::from_str(&format!(
            r#"{{"id":"{}","name":"Shop","slug":"shop","type":"affilinet"}}"#,
            Uuid::new_v4()
        ))
        .unwrap();
        assert_eq!(ProviderType::Other("affilinet".to_string()), p.kind);
        assert!(p.credentials.is_empty());
        assert!(!p.is_amazon());

        let json = serde_json::to_value(&p).unwrap();
        assert_eq!("affilinet", json["type"]);
        let amazon = Provider::amazon(full().into_iter().collect()).unwrap();
        assert_eq!("amazon", serde_json::to_value(&amazon).unwrap()["type"]);
    }
}
