//! Product Advertising API `ItemLookup` response documents.

use catalog_types::{AffiliateLink, AffiliateProductId, Availability, Currency, Image, Money};
use rust_decimal::Decimal;
use serde::Deserialize;

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct ItemLookupResponse {
    #[serde(rename = "Items", default)]
    pub items: Option<Items>,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct ItemLookupErrorResponse {
    #[serde(rename = "Error")]
    pub error: ApiError,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct Items {
    #[serde(rename = "Request", default)]
    pub request: Option<Request>,
    #[serde(rename = "Item", default)]
    pub items: Vec<Item>,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct Request {
    #[serde(rename = "Errors", default)]
    pub errors: Option<Errors>,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct Errors {
    #[serde(rename = "Error", default)]
    pub errors: Vec<ApiError>,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct ApiError {
    #[serde(rename = "Code")]
    pub code: String,
    #[serde(rename = "Message", default)]
    pub message: String,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct Item {
    #[serde(rename = "ASIN")]
    pub asin: String,
    #[serde(rename = "DetailPageURL", default)]
    pub detail_page_url: Option<String>,
    #[serde(rename = "LargeImage", default)]
    pub large_image: Option<ItemImage>,
    #[serde(rename = "ImageSets", default)]
    pub image_sets: Option<ImageSets>,
    #[serde(rename = "ItemAttributes", default)]
    pub attributes: Option<ItemAttributes>,
    #[serde(rename = "OfferSummary", default)]
    pub offer_summary: Option<OfferSummary>,
    #[serde(rename = "Offers", default)]
    pub offers: Option<Offers>,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct ItemImage {
    #[serde(rename = "URL")]
    pub url: String,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct ImageSets {
    #[serde(rename = "ImageSet", default)]
    pub sets: Vec<ImageSet>,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct ImageSet {
    #[serde(rename = "@Category", default)]
    pub category: Option<String>,
    #[serde(rename = "LargeImage", default)]
    pub large_image: Option<ItemImage>,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct ItemAttributes {
    #[serde(rename = "Title", default)]
    pub title: Option<String>,
    #[serde(rename = "ListPrice", default)]
    pub list_price: Option<Price>,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct OfferSummary {
    #[serde(rename = "LowestNewPrice", default)]
    pub lowest_new_price: Option<Price>,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct Offers {
    #[serde(rename = "TotalOffers", default)]
    pub total_offers: u32,
    #[serde(rename = "Offer", default)]
    pub offers: Vec<Offer>,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct Offer {
    #[serde(rename = "OfferListing", default)]
    pub listing: Option<OfferListing>,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct OfferListing {
    #[serde(rename = "Price", default)]
    pub price: Option<Price>,
}

/// Amount in the minor unit of the currency (whole yen for JPY).
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct Price {
    #[serde(rename = "Amount")]
    pub amount: i64,
    #[serde(rename = "CurrencyCode")]
    pub currency_code: String,
}

impl From<&Price> for Money {
    fn from(p: &Price) -> Self {
        let currency = Currency::new(&p.currency_code);
        Money::new(Decimal::new(p.amount, currency.minor_units()), currency)
    }
}

impl ItemLookupResponse {
    pub fn errors(&self) -> &[ApiError] {
        self.items
            .as_ref()
            .and_then(|i| i.request.as_ref())
            .and_then(|r| r.errors.as_ref())
            .map(|e| e.errors.as_slice())
            .unwrap_or(&[])
    }

    pub fn into_items(self) -> Vec<Item> {
        self.items.map(|i| i.items).unwrap_or_default()
    }
}

impl Item {
    pub fn affiliate_product_id(&self) -> AffiliateProductId {
        AffiliateProductId(self.asin.clone())
    }

    pub fn affiliate_link(&self) -> Option<AffiliateLink> {
        self.detail_page_url.clone().map(AffiliateLink)
    }

    pub fn thumbnail(&self) -> Option<Image> {
        self.large_image.as_ref().map(|i| Image::new(&i.url))
    }

    /// Every non-primary image set, in response order.
    pub fn image_gallery(&self) -> Vec<Image> {
        self.image_sets
            .iter()
            .flat_map(|s| s.sets.iter())
            .filter(|s| s.category.as_deref() != Some("primary"))
            .filter_map(|s| s.large_image.as_ref())
            .map(|i| Image::new(&i.url))
            .collect()
    }

    /// First offer listing price, falling back to the lowest new price.
    pub fn price(&self) -> Option<Money> {
        self.offers
            .iter()
            .flat_map(|o| o.offers.iter())
            .filter_map(|o| o.listing.as_ref()?.price.as_ref())
            .next()
            .or_else(|| self.offer_summary.as_ref()?.lowest_new_price.as_ref())
            .map(Money::from)
    }

    pub fn old_price(&self) -> Option<Money> {
        self.attributes
            .as_ref()
            .and_then(|a| a.list_price.as_ref())
            .map(Money::from)
    }

    pub fn availability(&self) -> Availability {
        match &self.offers {
            Some(o) if o.total_offers > 0 => Availability::Available,
            _ => Availability::OutOfStock,
        }
    }
}
