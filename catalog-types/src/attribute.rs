use crate::{Slug, Unit};
use serde::{Deserialize, Serialize};
use typesafe_repository::async_ops::{Get, List, Remove, Save};
use typesafe_repository::macros::Id;
use typesafe_repository::prelude::*;
use typesafe_repository::Repository;
use uuid::Uuid;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    #[default]
    Text,
    Number,
    Boolean,
}

pub trait AttributeTemplateRepository:
    Repository<AttributeTemplate, Error = anyhow::Error>
    + Get<AttributeTemplate>
    + List<AttributeTemplate>
    + Save<AttributeTemplate>
    + Remove<AttributeTemplate>
    + Send
    + Sync
{
}

/// Definition of a variant-distinguishing attribute such as colour or size.
#[derive(Id, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[Id(ref_id, get_id)]
pub struct AttributeTemplate {
    pub id: Uuid,
    pub name: String,
    pub slug: Slug,
    pub value_type: ValueType,
    unit: Option<Unit>,
}

impl AttributeTemplate {
    pub fn new<S: Into<String>>(name: S, value_type: ValueType, unit: Option<Unit>) -> Self {
        let name = name.into();
        Self {
            id: Uuid::new_v4(),
            slug: Slug::from_name(&name),
            name,
            value_type,
            unit: unit.filter(|_| value_type == ValueType::Number),
        }
    }

    pub fn unit(&self) -> Option<&Unit> {
        self.unit.as_ref()
    }

    pub fn attribute<S: Into<String>>(&self, value: S) -> Attribute {
        Attribute {
            name: self.name.clone(),
            slug: self.slug.clone(),
            value: value.into(),
            unit: self.unit.clone(),
        }
    }
}

/// Concrete attribute value carried by a product variant.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct Attribute {
    pub name: String,
    pub slug: Slug,
    pub value: String,
    #[serde(default)]
    pub unit: Option<Unit>,
}

impl Attribute {
    pub fn new<N: Into<String>, V: Into<String>>(name: N, value: V) -> Self {
        let name = name.into();
        Self {
            slug: Slug::from_name(&name),
            name,
            value: value.into(),
            unit: None,
        }
    }
}
