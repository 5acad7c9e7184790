use super::{clamp, into_batch, QueueError, UpdateQueue};
use async_trait::async_trait;
use catalog_types::product::{Product, ProductRepository};
use catalog_types::provider::{Provider, ProviderRepository, ProviderType};
use catalog_types::update::{BatchUpdateTask, UpdateTask};
use rusqlite::params;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_rusqlite::Connection;
use typesafe_repository::async_ops::Get;
use typesafe_repository::IdentityOf;

/// Queue rows keep ids only. Products and providers are read back from
/// their repositories when the rows are drained.
pub struct SqliteUpdateQueue {
    conn: Connection,
    provider_slug: String,
    provider_type: Option<ProviderType>,
    products: Arc<dyn ProductRepository>,
    providers: Arc<dyn ProviderRepository>,
}

#[derive(Clone, Copy)]
struct Row {
    seq: i64,
    priority: i64,
    provider_id: IdentityOf<Provider>,
    product_id: IdentityOf<Product>,
}

impl SqliteUpdateQueue {
    pub async fn init<S: Into<String>>(
        conn: Connection,
        provider_slug: S,
        provider_type: Option<ProviderType>,
        products: Arc<dyn ProductRepository>,
        providers: Arc<dyn ProviderRepository>,
    ) -> Result<Self, tokio_rusqlite::Error> {
        conn.call(|conn| {
            conn.execute(
                "CREATE TABLE IF NOT EXISTS update_task (
                    seq INTEGER PRIMARY KEY AUTOINCREMENT,
                    provider_slug TEXT NOT NULL,
                    provider_type TEXT,
                    priority INTEGER NOT NULL DEFAULT 0,
                    provider_id BLOB NOT NULL,
                    product_id BLOB NOT NULL
                )",
                [],
            )?;
            conn.execute(
                "CREATE INDEX IF NOT EXISTS update_task_order
                    ON update_task (provider_slug, priority, seq)",
                [],
            )?;
            Ok(())
        })
        .await?;
        Ok(Self {
            conn,
            provider_slug: provider_slug.into(),
            provider_type,
            products,
            providers,
        })
    }

    fn kind(&self) -> Option<String> {
        self.provider_type.as_ref().map(|t| t.to_string())
    }

    /// Selects and deletes the head rows in one transaction.
    async fn drain(&self, n: usize, grouped: bool) -> Result<Vec<Row>, QueueError> {
        let n = clamp(n);
        if n == 0 {
            return Ok(vec![]);
        }
        let slug = self.provider_slug.clone();
        let kind = self.kind();
        let rows = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                let rows = {
                    let mut stmt = tx.prepare(
                        "SELECT seq, priority, provider_id, product_id FROM update_task
                        WHERE provider_slug = ?1 AND provider_type IS ?2
                        ORDER BY priority, seq",
                    )?;
                    let all = stmt.query_map(params![slug, kind], |row| {
                        Ok(Row {
                            seq: row.get(0)?,
                            priority: row.get(1)?,
                            provider_id: row.get(2)?,
                            product_id: row.get(3)?,
                        })
                    })?;
                    let mut taken: Vec<Row> = vec![];
                    for row in all {
                        if taken.len() >= n {
                            break;
                        }
                        let row = row?;
                        if grouped
                            && taken
                                .first()
                                .is_some_and(|first| first.provider_id != row.provider_id)
                        {
                            continue;
                        }
                        taken.push(row);
                    }
                    taken
                };
                for row in &rows {
                    tx.execute("DELETE FROM update_task WHERE seq = ?1", [row.seq])?;
                }
                tx.commit()?;
                Ok(rows)
            })
            .await?;
        Ok(rows)
    }

    /// Puts drained rows back under their original sequence numbers.
    async fn restore(&self, rows: Vec<Row>) -> Result<(), QueueError> {
        let slug = self.provider_slug.clone();
        let kind = self.kind();
        self.conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                for row in &rows {
                    tx.execute(
                        "INSERT OR IGNORE INTO update_task
                            (seq, provider_slug, provider_type, priority, provider_id, product_id)
                        VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                        params![row.seq, slug, kind, row.priority, row.provider_id, row.product_id],
                    )?;
                }
                tx.commit()?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    /// Rows whose lookup fails are restored, so a repository outage does not
    /// lose queued work.
    async fn take(&self, n: usize, grouped: bool) -> Result<Vec<UpdateTask>, QueueError> {
        let rows = self.drain(n, grouped).await?;
        match self.rehydrate(&rows).await {
            Ok(tasks) => Ok(tasks),
            Err(err) => {
                if let Err(restore) = self.restore(rows).await {
                    log::error!("Unable to restore drained update tasks: {restore}");
                }
                Err(err)
            }
        }
    }

    async fn rehydrate(&self, rows: &[Row]) -> Result<Vec<UpdateTask>, QueueError> {
        let mut providers: HashMap<IdentityOf<Provider>, Option<Provider>> = HashMap::new();
        let mut tasks = Vec::with_capacity(rows.len());
        for row in rows {
            let provider = match providers.get(&row.provider_id) {
                Some(p) => p.clone(),
                None => {
                    let p = self.providers.get_one(&row.provider_id).await?;
                    providers.insert(row.provider_id, p.clone());
                    p
                }
            };
            let Some(provider) = provider else {
                log::warn!(
                    "Dropping update task #{}: provider {} no longer exists",
                    row.seq,
                    row.provider_id
                );
                continue;
            };
            let Some(product) = self.products.get_one(&row.product_id).await? else {
                log::warn!(
                    "Dropping update task #{}: product {} no longer exists",
                    row.seq,
                    row.product_id
                );
                continue;
            };
            tasks.push(UpdateTask::new(provider, product).with_priority(row.priority));
        }
        Ok(tasks)
    }
}

#[async_trait]
impl UpdateQueue for SqliteUpdateQueue {
    fn provider_slug(&self) -> &str {
        &self.provider_slug
    }

    fn provider_type(&self) -> Option<ProviderType> {
        self.provider_type.clone()
    }

    async fn put(&self, task: UpdateTask) -> Result<(), QueueError> {
        if !self.accepts(&task.provider) {
            return Err(QueueError::ForeignProvider(task.provider.slug.to_string()));
        }
        let slug = self.provider_slug.clone();
        let kind = self.kind();
        let (priority, provider_id, product_id) =
            (task.priority, task.provider.id, task.product.id);
        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO update_task
                        (provider_slug, provider_type, priority, provider_id, product_id)
                    VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![slug, kind, priority, provider_id, product_id],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    async fn get(&self, n: usize) -> Result<Vec<UpdateTask>, QueueError> {
        self.take(n, false).await
    }

    async fn get_batched(&self, n: usize) -> Result<Option<BatchUpdateTask>, QueueError> {
        let tasks = self.take(n, true).await?;
        Ok(into_batch(tasks, clamp(n)))
    }

    async fn size(&self) -> Result<usize, QueueError> {
        let slug = self.provider_slug.clone();
        let kind = self.kind();
        let count = self
            .conn
            .call(move |conn| {
                let count: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM update_task WHERE provider_slug = ?1 AND provider_type IS ?2",
                    params![slug, kind],
                    |row| row.get(0),
                )?;
                Ok(count)
            })
            .await?;
        Ok(count as usize)
    }

    async fn contains(&self, product: &IdentityOf<Product>) -> Result<bool, QueueError> {
        let slug = self.provider_slug.clone();
        let kind = self.kind();
        let product = *product;
        Ok(self
            .conn
            .call(move |conn| {
                let exists: bool = conn.query_row(
                    "SELECT EXISTS(SELECT 1 FROM update_task
                        WHERE provider_slug = ?1 AND provider_type IS ?2 AND product_id = ?3)",
                    params![slug, kind, product],
                    |row| row.get(0),
                )?;
                Ok(exists)
            })
            .await?)
    }
}
