#![deny(clippy::unwrap_used)]

pub mod filesystem;
pub mod options;
pub mod product;
pub mod update;

pub use filesystem::FileSystemRepository;
pub use options::CatalogOptions;
pub use product::SqliteProductRepository;
