use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub mod configuration;
pub mod task;
pub mod worker;

pub use configuration::{Configuration, ConfigurationError, Scalar, Thresholds};
pub use task::{BatchUpdateTask, UpdateTask};
pub use worker::{SkipReason, UpdateError, UpdateOutcome, UpdateWorker};

/// Granularity of scheduled update runs.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display)]
#[serde(rename_all = "lowercase")]
pub enum Cadence {
    #[display("hourly")]
    Hourly,
    #[display("twicedaily")]
    TwiceDaily,
    #[display("daily")]
    Daily,
}

impl Cadence {
    pub const ALL: [Cadence; 3] = [Cadence::Hourly, Cadence::TwiceDaily, Cadence::Daily];

    pub fn period(&self) -> Duration {
        match self {
            Self::Hourly => Duration::from_secs(60 * 60),
            Self::TwiceDaily => Duration::from_secs(12 * 60 * 60),
            Self::Daily => Duration::from_secs(24 * 60 * 60),
        }
    }

    /// Name of the scheduled trigger for this cadence.
    pub fn hook(&self) -> String {
        format!("update_run_tasks_{self}")
    }
}

/// Per-field refresh policy.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum UpdateInterval {
    Hourly,
    #[serde(rename = "twicedaily")]
    TwiceDaily,
    Daily,
    #[serde(alias = "")]
    None,
}

impl UpdateInterval {
    pub fn cadence(&self) -> Option<Cadence> {
        match self {
            Self::Hourly => Some(Cadence::Hourly),
            Self::TwiceDaily => Some(Cadence::TwiceDaily),
            Self::Daily => Some(Cadence::Daily),
            Self::None => None,
        }
    }
}

/// Whether a field configured with `interval` is refreshed on a `current` run.
/// Unset intervals behave as hourly.
pub fn should_update(current: Cadence, interval: Option<UpdateInterval>) -> bool {
    interval.unwrap_or(UpdateInterval::Hourly).cadence() == Some(current)
}
