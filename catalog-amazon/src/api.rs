use crate::response::{Item, ItemLookupErrorResponse, ItemLookupResponse};
use anyhow::Context as AnyhowContext;
use async_trait::async_trait;
use base64::Engine;
use catalog_types::provider::AmazonProvider;
use catalog_types::AffiliateProductId;
use derive_more::{Display, Error};
use hmac::{Hmac, Mac};
use itertools::Itertools;
use reqwest::StatusCode;
use sha2::Sha256;
use time::OffsetDateTime;

const PATH: &str = "/onca/xml";
const SERVICE: &str = "AWSECommerceService";
const RESPONSE_GROUP: &str = "Large";

#[derive(Debug, Display, Error)]
pub enum LookupError {
    #[display("Request was throttled")]
    Throttled,
    #[display("Amazon returned {code}: {message}")]
    Api { code: String, message: String },
    #[display("Unable to decode response: {_0}")]
    Malformed(quick_xml::de::DeError),
    #[display("Request failed: {_0:#}")]
    Request(#[error(ignore)] anyhow::Error),
}

impl From<reqwest::Error> for LookupError {
    fn from(err: reqwest::Error) -> Self {
        Self::Request(err.into())
    }
}

#[async_trait]
pub trait ProductAdvertisingApi: Send + Sync {
    /// Looks up every id in one request.
    async fn item_lookup(
        &self,
        provider: &AmazonProvider,
        ids: &[AffiliateProductId],
    ) -> Result<Vec<Item>, LookupError>;
}

pub struct PaApiClient {
    client: reqwest::Client,
}

impl PaApiClient {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    pub fn host(country: &str) -> String {
        let country = match country.trim().to_lowercase().as_str() {
            "us" | "com" => "com".to_string(),
            "uk" | "gb" => "co.uk".to_string(),
            "jp" => "co.jp".to_string(),
            other => other.to_string(),
        };
        format!("webservices.amazon.{country}")
    }
}

/// Percent-encodes and sorts the query, then appends the HMAC-SHA256 signature.
pub fn signed_query(
    provider: &AmazonProvider,
    host: &str,
    ids: &[AffiliateProductId],
    timestamp: OffsetDateTime,
) -> Result<String, anyhow::Error> {
    let timestamp = timestamp
        .format(time::macros::format_description!(
            "[year]-[month]-[day]T[hour]:[minute]:[second]Z"
        ))
        .context("Unable to format timestamp")?;
    let item_id = ids.iter().map(|i| i.as_str()).unique().join(",");
    let params = [
        ("AWSAccessKeyId", provider.access_key.as_str()),
        ("AssociateTag", provider.associate_tag.as_str()),
        ("ItemId", item_id.as_str()),
        ("Operation", "ItemLookup"),
        ("ResponseGroup", RESPONSE_GROUP),
        ("Service", SERVICE),
        ("Timestamp", timestamp.as_str()),
    ];
    let query = params
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .sorted()
        .join("&");
    let mut mac = Hmac::<Sha256>::new_from_slice(provider.secret_key.as_bytes())
        .context("Unable to init hasher")?;
    mac.update(format!("GET\n{host}\n{PATH}\n{query}").as_bytes());
    let signature = base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes());
    Ok(format!("{query}&Signature={}", urlencoding::encode(&signature)))
}

#[async_trait]
impl ProductAdvertisingApi for PaApiClient {
    async fn item_lookup(
        &self,
        provider: &AmazonProvider,
        ids: &[AffiliateProductId],
    ) -> Result<Vec<Item>, LookupError> {
        let host = Self::host(&provider.country);
        let query = signed_query(provider, &host, ids, OffsetDateTime::now_utc())
            .map_err(LookupError::Request)?;
        let res = self
            .client
            .get(format!("https://{host}{PATH}?{query}"))
            .send()
            .await?;
        let status = res.status();
        let body = res.text().await?;
        if status == StatusCode::SERVICE_UNAVAILABLE {
            return Err(LookupError::Throttled);
        }
        if !status.is_success() {
            return Err(match quick_xml::de::from_str::<ItemLookupErrorResponse>(&body) {
                Ok(e) => LookupError::Api {
                    code: e.error.code,
                    message: e.error.message,
                },
                Err(_) => LookupError::Api {
                    code: status.as_u16().to_string(),
                    message: status.canonical_reason().unwrap_or_default().to_string(),
                },
            });
        }
        parse_lookup_response(&body)
    }
}

pub fn parse_lookup_response(body: &str) -> Result<Vec<Item>, LookupError> {
    let res: ItemLookupResponse = quick_xml::de::from_str(body).map_err(LookupError::Malformed)?;
    if let Some(e) = res.errors().first() {
        if res.items.as_ref().map_or(true, |i| i.items.is_empty()) {
            return Err(LookupError::Api {
                code: e.code.clone(),
                message: e.message.clone(),
            });
        }
        log::warn!("Amazon lookup returned partial errors: {}: {}", e.code, e.message);
    }
    Ok(res.into_items())
}
