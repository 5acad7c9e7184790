#![deny(clippy::unwrap_used)]

use derive_more::{Deref, Display, Error};
use lazy_regex::regex;
use rust_decimal::Decimal;
use serde::de::Deserializer;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub mod attribute;
pub mod detail;
pub mod logger;
pub mod memory;
pub mod product;
pub mod provider;
pub mod shop;
pub mod update;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display)]
#[serde(rename_all = "snake_case")]
pub enum Availability {
    #[display("available")]
    Available,
    #[display("out of stock")]
    OutOfStock,
}

impl Default for Availability {
    fn default() -> Self {
        Self::OutOfStock
    }
}

/// URL-safe lowercase identifier derived from a human readable name.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Display, Deref)]
#[serde(transparent)]
pub struct Slug(String);

impl Slug {
    pub fn from_name<S: AsRef<str>>(name: S) -> Self {
        let lower = name.as_ref().trim().to_lowercase();
        let slug = regex!(r"[^\p{L}\p{N}]+").replace_all(&lower, "-");
        Self(slug.trim_matches('-').to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Slug {
    fn from(s: &str) -> Self {
        Self::from_name(s)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Display, Deref)]
#[serde(transparent)]
pub struct Currency(String);

impl Currency {
    pub fn new<S: AsRef<str>>(code: S) -> Self {
        Self(code.as_ref().trim().to_uppercase())
    }

    /// Number of digits after the decimal point in the ISO 4217 minor unit.
    pub fn minor_units(&self) -> u32 {
        match self.0.as_str() {
            "BIF" | "CLP" | "DJF" | "GNF" | "ISK" | "JPY" | "KMF" | "KRW" | "PYG" | "RWF"
            | "UGX" | "VND" | "VUV" | "XAF" | "XOF" | "XPF" => 0,
            "BHD" | "IQD" | "JOD" | "KWD" | "LYD" | "OMR" | "TND" => 3,
            _ => 2,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Display)]
#[display("{value} {currency}")]
pub struct Money {
    pub value: Decimal,
    pub currency: Currency,
}

impl Money {
    pub fn new(value: Decimal, currency: Currency) -> Self {
        Self { value, currency }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Display, Deref)]
#[serde(transparent)]
pub struct AffiliateLink(pub String);

/// External identifier of a listing at the provider (ASIN for Amazon).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Display, Deref)]
#[serde(transparent)]
pub struct AffiliateProductId(pub String);

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Display)]
#[display("{url}")]
pub struct Image {
    pub url: String,
}

impl Image {
    pub fn new<S: Into<String>>(url: S) -> Self {
        Self { url: url.into() }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Display, Deref)]
#[serde(transparent)]
pub struct Unit(pub String);

#[derive(Debug, Display, Error, PartialEq, Eq)]
#[display("Rating {_0} must be between 0 and 5 in steps of 0.5")]
pub struct InvalidRating(#[error(ignore)] pub Decimal);

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Rating(Decimal);

impl Rating {
    pub fn new(value: Decimal) -> Result<Self, InvalidRating> {
        let doubled = value * Decimal::TWO;
        if value < Decimal::ZERO || value > Decimal::from(5) || doubled.fract() != Decimal::ZERO {
            return Err(InvalidRating(value));
        }
        Ok(Self(value.normalize()))
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for Rating {
    type Error = InvalidRating;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Rating> for Decimal {
    fn from(r: Rating) -> Self {
        r.0
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct Review {
    pub rating: Option<Rating>,
    pub votes: Option<u32>,
}

pub fn parse_duration(duration: &str) -> Result<Duration, anyhow::Error> {
    let duration = duration.trim().to_lowercase().replace(' ', "");
    duration_str::parse(duration).map_err(|dur| anyhow::anyhow!("Unable to parse duration {dur}"))
}

pub fn deserialize_duration_from_string<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    parse_duration(&s).map_err(serde::de::Error::custom)
}
