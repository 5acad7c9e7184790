#![deny(clippy::unwrap_used)]

pub mod api;
pub mod response;
pub mod worker;

pub use api::{PaApiClient, ProductAdvertisingApi};
pub use worker::{AmazonOptions, AmazonUpdateWorker, FieldIntervals};
