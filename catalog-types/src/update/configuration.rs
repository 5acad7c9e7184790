use derive_more::{Display, Error};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const MIN_BATCH_SIZE: i64 = 1;
pub const MAX_BATCH_SIZE: i64 = 100;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Display)]
#[serde(untagged)]
pub enum Scalar {
    Bool(bool),
    Int(i64),
    Text(String),
}

impl From<bool> for Scalar {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for Scalar {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<&str> for Scalar {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for Scalar {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

#[derive(Debug, Display, Error, PartialEq, Eq)]
pub enum ConfigurationError {
    #[display("Configuration option {_0} is missing")]
    Missing(#[error(ignore)] &'static str),
    #[display("Configuration option {_0} must be an integer")]
    NotAnInteger(#[error(ignore)] &'static str),
    #[display("Configuration option {_0} must not be negative")]
    Negative(#[error(ignore)] &'static str),
    #[display("max_tasks must be between 1 and 100, got {_0}")]
    MaxOutOfRange(#[error(ignore)] i64),
    #[display("min_tasks ({min}) is greater than max_tasks ({max})")]
    MinExceedsMax { min: i64, max: i64 },
}

/// Validated batch thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Thresholds {
    pub min_tasks: usize,
    pub max_tasks: usize,
}

/// Named options a worker hands to the resolver.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
#[serde(transparent)]
pub struct Configuration(BTreeMap<String, Scalar>);

impl Configuration {
    pub const PROVIDER_SLUG: &'static str = "provider_slug";
    pub const MIN_TASKS: &'static str = "min_tasks";
    pub const MAX_TASKS: &'static str = "max_tasks";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn set<V: Into<Scalar>>(&mut self, key: &str, value: V) -> &mut Self {
        self.0.insert(key.to_string(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Scalar> {
        self.0.get(key)
    }

    pub fn provider_slug(&self) -> Option<&str> {
        match self.get(Self::PROVIDER_SLUG) {
            Some(Scalar::Text(s)) => Some(s),
            _ => None,
        }
    }

    fn threshold(&self, key: &'static str) -> Result<i64, ConfigurationError> {
        match self.get(key) {
            None => Err(ConfigurationError::Missing(key)),
            Some(Scalar::Int(v)) if *v < 0 => Err(ConfigurationError::Negative(key)),
            Some(Scalar::Int(v)) => Ok(*v),
            Some(_) => Err(ConfigurationError::NotAnInteger(key)),
        }
    }

    pub fn validate(&self) -> Result<Thresholds, ConfigurationError> {
        let min = self.threshold(Self::MIN_TASKS)?;
        let max = self.threshold(Self::MAX_TASKS)?;
        if !(MIN_BATCH_SIZE..=MAX_BATCH_SIZE).contains(&max) {
            return Err(ConfigurationError::MaxOutOfRange(max));
        }
        if min > max {
            return Err(ConfigurationError::MinExceedsMax { min, max });
        }
        Ok(Thresholds {
            min_tasks: min as usize,
            max_tasks: max as usize,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(min: impl Into<Scalar>, max: impl Into<Scalar>) -> Configuration {
        let mut c = Configuration::new();
        c.set(Configuration::MIN_TASKS, min)
            .set(Configuration::MAX_TASKS, max);
        c
    }

    #[test]
    fn validates_thresholds() {
        assert_eq!(
            Ok(Thresholds {
                min_tasks: 5,
                max_tasks: 10
            }),
            config(5i64, 10i64).validate()
        );
        assert_eq!(Ok(Thresholds { min_tasks: 0, max_tasks: 100 }), config(0i64, 100i64).validate());
    }

    #[test]
    fn rejects_invalid_thresholds() {
        assert_eq!(
            Err(ConfigurationError::Missing("min_tasks")),
            Configuration::new().validate()
        );
        assert_eq!(
            Err(ConfigurationError::Negative("min_tasks")),
            config(-1i64, 10i64).validate()
        );
        assert_eq!(
            Err(ConfigurationError::NotAnInteger("max_tasks")),
            config(1i64, "ten").validate()
        );
        assert_eq!(Err(ConfigurationError::MaxOutOfRange(0)), config(0i64, 0i64).validate());
        assert_eq!(
            Err(ConfigurationError::MaxOutOfRange(101)),
            config(1i64, 101i64).validate()
        );
        assert_eq!(
            Err(ConfigurationError::MinExceedsMax { min: 11, max: 10 }),
            config(11i64, 10i64).validate()
        );
    }

    #[test]
    fn reads_provider_slug() {
        let mut c = config(1i64, 10i64);
        assert_eq!(None, c.provider_slug());
        c.set(Configuration::PROVIDER_SLUG, "amazon");
        assert_eq!(Some("amazon"), c.provider_slug());
    }
}
