use crate::attribute::Attribute;
use crate::detail::Detail;
use crate::shop::Shop;
use crate::{Image, Review, Slug};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use typesafe_repository::async_ops::{Get, List, Remove, Save};
use typesafe_repository::macros::Id;
use typesafe_repository::prelude::*;
use typesafe_repository::{IdentityOf, Repository};
use uuid::Uuid;

pub mod choice;

pub trait ProductRepository:
    Repository<Product, Error = anyhow::Error>
    + Get<Product>
    + List<Product>
    + Remove<Product>
    + Save<Product>
    + Send
    + Sync
{
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProductKind {
    Simple {
        #[serde(default)]
        shops: Vec<Shop>,
    },
    Complex {
        #[serde(default)]
        variants: Vec<Product>,
    },
    Variant {
        parent_id: IdentityOf<Product>,
        #[serde(default)]
        default: bool,
        #[serde(default)]
        attributes: Vec<Attribute>,
        #[serde(default)]
        shops: Vec<Shop>,
    },
}

#[derive(Id, Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[Id(ref_id, get_id)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub slug: Slug,
    #[serde(flatten)]
    pub kind: ProductKind,
    #[serde(default)]
    pub thumbnail: Option<Image>,
    #[serde(default)]
    pub image_gallery: Vec<Image>,
    #[serde(default)]
    pub details: Vec<Detail>,
    #[serde(default)]
    pub review: Review,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub related_products: Vec<IdentityOf<Product>>,
    #[serde(default)]
    pub related_accessories: Vec<IdentityOf<Product>>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl Product {
    pub fn new<S: Into<String>>(name: S, kind: ProductKind) -> Self {
        let name = name.into();
        let now = OffsetDateTime::now_utc();
        Self {
            id: Uuid::new_v4(),
            slug: Slug::from_name(&name),
            name,
            kind,
            thumbnail: None,
            image_gallery: vec![],
            details: vec![],
            review: Review::default(),
            tags: vec![],
            related_products: vec![],
            related_accessories: vec![],
            created_at: now,
            updated_at: now,
        }
    }

    pub fn simple<S: Into<String>>(name: S, shops: Vec<Shop>) -> Self {
        Self::new(name, ProductKind::Simple { shops })
    }

    /// Creates an empty complex product. Variants are attached with [`Product::add_variant`].
    pub fn complex<S: Into<String>>(name: S) -> Self {
        Self::new(name, ProductKind::Complex { variants: vec![] })
    }

    /// Creates a variant of `self` and attaches it. Returns the id of the new variant.
    pub fn add_variant<S: Into<String>>(
        &mut self,
        name: S,
        attributes: Vec<Attribute>,
        shops: Vec<Shop>,
    ) -> Option<IdentityOf<Product>> {
        let parent_id = self.id;
        let ProductKind::Complex { variants } = &mut self.kind else {
            return None;
        };
        let variant = Product::new(
            name,
            ProductKind::Variant {
                parent_id,
                default: false,
                attributes,
                shops,
            },
        );
        let id = variant.id;
        variants.push(variant);
        Some(id)
    }

    pub fn is_shop_aware(&self) -> bool {
        matches!(
            self.kind,
            ProductKind::Simple { .. } | ProductKind::Variant { .. }
        )
    }

    pub fn is_complex(&self) -> bool {
        matches!(self.kind, ProductKind::Complex { .. })
    }

    pub fn shops(&self) -> &[Shop] {
        match &self.kind {
            ProductKind::Simple { shops } | ProductKind::Variant { shops, .. } => shops,
            ProductKind::Complex { .. } => &[],
        }
    }

    pub fn shops_mut(&mut self) -> &mut [Shop] {
        match &mut self.kind {
            ProductKind::Simple { shops } | ProductKind::Variant { shops, .. } => shops,
            ProductKind::Complex { .. } => &mut [],
        }
    }

    pub fn variants(&self) -> &[Product] {
        match &self.kind {
            ProductKind::Complex { variants } => variants,
            _ => &[],
        }
    }

    pub fn variant(&self, id: &IdentityOf<Product>) -> Option<&Product> {
        self.variants().iter().find(|v| v.id == *id)
    }

    pub fn parent_id(&self) -> Option<IdentityOf<Product>> {
        match &self.kind {
            ProductKind::Variant { parent_id, .. } => Some(*parent_id),
            _ => None,
        }
    }

    pub fn attributes(&self) -> &[Attribute] {
        match &self.kind {
            ProductKind::Variant { attributes, .. } => attributes,
            _ => &[],
        }
    }

    pub fn is_default_variant(&self) -> bool {
        matches!(self.kind, ProductKind::Variant { default: true, .. })
    }

    fn default_variant_index(&self) -> Option<usize> {
        let variants = self.variants();
        variants
            .iter()
            .position(Product::is_default_variant)
            .or(if variants.is_empty() { None } else { Some(0) })
    }

    /// Flagged default variant, or the first one when none is flagged.
    pub fn default_variant(&self) -> Option<&Product> {
        self.default_variant_index().map(|i| &self.variants()[i])
    }

    pub fn default_variant_mut(&mut self) -> Option<&mut Product> {
        let i = self.default_variant_index()?;
        match &mut self.kind {
            ProductKind::Complex { variants } => variants.get_mut(i),
            _ => None,
        }
    }

    /// Marks the variant with `id` as default and clears the flag on its siblings.
    pub fn set_default_variant(&mut self, id: &IdentityOf<Product>) -> bool {
        let ProductKind::Complex { variants } = &mut self.kind else {
            return false;
        };
        if !variants.iter().any(|v| v.id == *id) {
            return false;
        }
        for v in variants.iter_mut() {
            if let ProductKind::Variant { default, .. } = &mut v.kind {
                *default = v.id == *id;
            }
        }
        true
    }

    /// Shops whose prices are shown for this product.
    pub fn display_shops(&self) -> &[Shop] {
        match self.kind {
            ProductKind::Complex { .. } => self.default_variant().map(Product::shops).unwrap_or(&[]),
            _ => self.shops(),
        }
    }

    pub fn cheapest_shop(&self) -> Option<&Shop> {
        self.display_shops()
            .iter()
            .filter_map(|s| s.pricing.price.as_ref().map(|p| (p.value, s)))
            .min_by(|(a, _), (b, _)| a.cmp(b))
            .map(|(_, s)| s)
    }

    pub fn detail(&self, slug: &Slug) -> Option<&Detail> {
        self.details.iter().find(|d| d.slug == *slug)
    }

    pub fn has_detail(&self, slug: &Slug) -> bool {
        self.detail(slug).is_some()
    }

    /// Inserts `detail`, replacing the one with the same slug.
    pub fn add_detail(&mut self, detail: Detail) {
        match self.details.iter_mut().find(|d| d.slug == detail.slug) {
            Some(d) => *d = detail,
            None => self.details.push(detail),
        }
    }

    pub fn remove_detail(&mut self, slug: &Slug) -> Option<Detail> {
        let i = self.details.iter().position(|d| d.slug == *slug)?;
        Some(self.details.remove(i))
    }

    pub fn touch(&mut self, now: OffsetDateTime) {
        self.updated_at = now;
    }
}
