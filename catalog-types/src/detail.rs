use crate::attribute::ValueType;
use crate::{Slug, Unit};
use serde::{Deserialize, Serialize};
use typesafe_repository::async_ops::{Get, List, Remove, Save};
use typesafe_repository::macros::Id;
use typesafe_repository::prelude::*;
use typesafe_repository::Repository;
use uuid::Uuid;

pub trait DetailTemplateRepository:
    Repository<DetailTemplate, Error = anyhow::Error>
    + Get<DetailTemplate>
    + List<DetailTemplate>
    + Save<DetailTemplate>
    + Remove<DetailTemplate>
    + Send
    + Sync
{
}

#[derive(Id, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[Id(ref_id, get_id)]
pub struct DetailTemplate {
    pub id: Uuid,
    pub name: String,
    pub slug: Slug,
    pub value_type: ValueType,
    unit: Option<Unit>,
    /// Predefined values offered when editing a product.
    #[serde(default)]
    pub custom_values: Vec<String>,
}

impl DetailTemplate {
    pub fn new<S: Into<String>>(name: S, value_type: ValueType, unit: Option<Unit>) -> Self {
        let name = name.into();
        Self {
            id: Uuid::new_v4(),
            slug: Slug::from_name(&name),
            name,
            value_type,
            unit: unit.filter(|_| value_type == ValueType::Number),
            custom_values: vec![],
        }
    }

    pub fn unit(&self) -> Option<&Unit> {
        self.unit.as_ref()
    }

    pub fn detail<S: Into<String>>(&self, value: Option<S>) -> Detail {
        Detail {
            name: self.name.clone(),
            slug: self.slug.clone(),
            value: value.map(Into::into),
            unit: self.unit.clone(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct Detail {
    pub name: String,
    pub slug: Slug,
    pub value: Option<String>,
    #[serde(default)]
    pub unit: Option<Unit>,
}
