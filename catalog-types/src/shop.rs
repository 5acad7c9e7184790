use crate::provider::Provider;
use crate::{AffiliateLink, AffiliateProductId, Availability, Image, Money, Slug};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use typesafe_repository::async_ops::{Get, List, Remove, Save, Select};
use typesafe_repository::macros::Id;
use typesafe_repository::prelude::*;
use typesafe_repository::{IdentityOf, Repository, SelectBy, Selector};
use uuid::Uuid;

pub trait ShopTemplateRepository:
    Repository<ShopTemplate, Error = anyhow::Error>
    + Get<ShopTemplate>
    + List<ShopTemplate>
    + Remove<ShopTemplate>
    + Save<ShopTemplate>
    + Select<ShopTemplate, ByProvider>
    + Send
    + Sync
{
}

pub struct ByProvider(pub IdentityOf<Provider>);

impl Selector for ByProvider {}
impl SelectBy<ByProvider> for ShopTemplate {}

/// Reusable shop configuration shared by every listing in that shop.
#[derive(Id, Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[Id(ref_id, get_id)]
pub struct ShopTemplate {
    pub id: Uuid,
    pub name: String,
    pub slug: Slug,
    #[serde(default)]
    pub provider_id: Option<IdentityOf<Provider>>,
    #[serde(default)]
    pub thumbnail: Option<Image>,
}

impl ShopTemplate {
    pub fn new<S: Into<String>>(name: S, provider_id: Option<IdentityOf<Provider>>) -> Self {
        let name = name.into();
        Self {
            id: Uuid::new_v4(),
            slug: Slug::from_name(&name),
            name,
            provider_id,
            thumbnail: None,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Default)]
pub struct Tracking {
    #[serde(default)]
    pub affiliate_link: Option<AffiliateLink>,
    #[serde(default)]
    pub affiliate_product_id: Option<AffiliateProductId>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Default)]
pub struct Pricing {
    #[serde(default)]
    pub availability: Availability,
    #[serde(default)]
    pub price: Option<Money>,
    #[serde(default)]
    pub old_price: Option<Money>,
}

impl Pricing {
    pub fn should_display_old_price(&self) -> bool {
        match (&self.price, &self.old_price) {
            (Some(price), Some(old)) => old.value > price.value,
            _ => false,
        }
    }
}

/// Listing of a product in one shop.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Shop {
    pub template_id: IdentityOf<ShopTemplate>,
    pub name: String,
    #[serde(default)]
    pub thumbnail: Option<Image>,
    #[serde(default)]
    pub tracking: Tracking,
    #[serde(default)]
    pub pricing: Pricing,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl Shop {
    pub fn new(template: &ShopTemplate, tracking: Tracking, pricing: Pricing) -> Self {
        Self {
            template_id: template.id,
            name: template.name.clone(),
            thumbnail: template.thumbnail.clone(),
            tracking,
            pricing,
            updated_at: OffsetDateTime::now_utc(),
        }
    }

    pub fn is_available(&self) -> bool {
        self.pricing.availability == Availability::Available
    }

    pub fn affiliate_product_id(&self) -> Option<&AffiliateProductId> {
        self.tracking.affiliate_product_id.as_ref()
    }

    pub fn touch(&mut self, now: OffsetDateTime) {
        self.updated_at = now;
    }
}
