use anyhow::Context as AnyhowContext;
use async_trait::async_trait;
use catalog_types::product::{Product, ProductRepository};
use rusqlite::{params, OptionalExtension};
use tokio_rusqlite::Connection;
use typesafe_repository::async_ops::{Get, List, Remove, Save};
use typesafe_repository::{IdentityOf, Repository};

/// Stores each product aggregate, variants included, as one JSON document.
pub struct SqliteProductRepository {
    conn: Connection,
}

impl SqliteProductRepository {
    pub async fn init(conn: Connection) -> Result<Self, tokio_rusqlite::Error> {
        conn.call(|conn| {
            conn.execute(
                "CREATE TABLE IF NOT EXISTS product (
                    id BLOB PRIMARY KEY,
                    name TEXT NOT NULL,
                    data TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                )",
                [],
            )?;
            Ok(())
        })
        .await?;
        Ok(Self { conn })
    }
}

fn decode(id: &IdentityOf<Product>, data: &str) -> Result<Product, anyhow::Error> {
    serde_json::from_str(data).with_context(|| format!("Unable to decode product #{id}"))
}

impl Repository<Product> for SqliteProductRepository {
    type Error = anyhow::Error;
}

#[async_trait]
impl Get<Product> for SqliteProductRepository {
    async fn get_one(&self, id: &IdentityOf<Product>) -> Result<Option<Product>, Self::Error> {
        let id = *id;
        let data = self
            .conn
            .call(move |conn| {
                let data = conn
                    .query_row("SELECT data FROM product WHERE id = ?1", [id], |row| {
                        row.get::<_, String>(0)
                    })
                    .optional()?;
                Ok(data)
            })
            .await?;
        data.map(|d| decode(&id, &d)).transpose()
    }
}

#[async_trait]
impl List<Product> for SqliteProductRepository {
    async fn list(&self) -> Result<Vec<Product>, Self::Error> {
        let rows = self
            .conn
            .call(|conn| {
                let mut stmt = conn.prepare("SELECT id, data FROM product ORDER BY name, id")?;
                let rows = stmt
                    .query_map([], |row| {
                        Ok((row.get::<_, IdentityOf<Product>>(0)?, row.get::<_, String>(1)?))
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await?;
        rows.iter().map(|(id, data)| decode(id, data)).collect()
    }
}

#[async_trait]
impl Save<Product> for SqliteProductRepository {
    async fn save(&self, product: Product) -> Result<(), Self::Error> {
        let data = serde_json::to_string(&product)
            .with_context(|| format!("Unable to encode product #{}", product.id))?;
        let updated_at = product
            .updated_at
            .format(&time::format_description::well_known::Rfc3339)?;
        let (id, name) = (product.id, product.name);
        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO product (id, name, data, updated_at) VALUES (?1, ?2, ?3, ?4)
                    ON CONFLICT(id) DO UPDATE SET
                        name = excluded.name,
                        data = excluded.data,
                        updated_at = excluded.updated_at",
                    params![id, name, data, updated_at],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }
}

#[async_trait]
impl Remove<Product> for SqliteProductRepository {
    async fn remove(&self, id: &IdentityOf<Product>) -> Result<(), Self::Error> {
        let id = *id;
        self.conn
            .call(move |conn| {
                conn.execute("DELETE FROM product WHERE id = ?1", [id])?;
                Ok(())
            })
            .await?;
        Ok(())
    }
}

impl ProductRepository for SqliteProductRepository {}
