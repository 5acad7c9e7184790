use async_trait::async_trait;
use catalog_types::update::Cadence;
use rusqlite::params;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;
use tokio::sync::Mutex;
use tokio_rusqlite::Connection;

/// Flag storage with an atomic test-and-set per cadence.
#[async_trait]
pub trait SemaphoreStore: Send + Sync {
    /// Sets the flag. Returns `false` if it was already set.
    async fn try_insert(&self, cadence: Cadence) -> Result<bool, anyhow::Error>;

    async fn delete(&self, cadence: Cadence) -> Result<(), anyhow::Error>;
}

#[derive(Default)]
pub struct InMemorySemaphoreStore(Mutex<HashSet<Cadence>>);

#[async_trait]
impl SemaphoreStore for InMemorySemaphoreStore {
    async fn try_insert(&self, cadence: Cadence) -> Result<bool, anyhow::Error> {
        Ok(self.0.lock().await.insert(cadence))
    }

    async fn delete(&self, cadence: Cadence) -> Result<(), anyhow::Error> {
        self.0.lock().await.remove(&cadence);
        Ok(())
    }
}

/// Shares flags between processes through one SQLite file.
pub struct SqliteSemaphoreStore {
    conn: Connection,
    stale_after: Option<Duration>,
}

impl SqliteSemaphoreStore {
    pub async fn init(
        conn: Connection,
        stale_after: Option<Duration>,
    ) -> Result<Self, tokio_rusqlite::Error> {
        conn.call(|conn| {
            conn.execute(
                "CREATE TABLE IF NOT EXISTS update_semaphore (
                    cadence TEXT PRIMARY KEY,
                    acquired_at INTEGER NOT NULL
                )",
                [],
            )?;
            Ok(())
        })
        .await?;
        Ok(Self { conn, stale_after })
    }
}

#[async_trait]
impl SemaphoreStore for SqliteSemaphoreStore {
    async fn try_insert(&self, cadence: Cadence) -> Result<bool, anyhow::Error> {
        let key = cadence.to_string();
        let now = OffsetDateTime::now_utc().unix_timestamp();
        let stale_before = self.stale_after.map(|d| now - d.as_secs() as i64);
        Ok(self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                if let Some(before) = stale_before {
                    let reclaimed = tx.execute(
                        "DELETE FROM update_semaphore WHERE cadence = ?1 AND acquired_at < ?2",
                        params![key, before],
                    )?;
                    if reclaimed > 0 {
                        log::warn!("Reclaimed stale {key} update semaphore");
                    }
                }
                let inserted = tx.execute(
                    "INSERT OR IGNORE INTO update_semaphore (cadence, acquired_at) VALUES (?1, ?2)",
                    params![key, now],
                )?;
                tx.commit()?;
                Ok(inserted == 1)
            })
            .await?)
    }

    async fn delete(&self, cadence: Cadence) -> Result<(), anyhow::Error> {
        let key = cadence.to_string();
        self.conn
            .call(move |conn| {
                conn.execute("DELETE FROM update_semaphore WHERE cadence = ?1", [key])?;
                Ok(())
            })
            .await?;
        Ok(())
    }
}

/// Keeps runs of the same cadence from overlapping.
#[derive(Clone)]
pub struct UpdateSemaphore {
    store: Arc<dyn SemaphoreStore>,
}

impl UpdateSemaphore {
    pub fn new(store: Arc<dyn SemaphoreStore>) -> Self {
        Self { store }
    }

    /// Never waits. A failing store counts as held.
    pub async fn acquire(&self, cadence: Cadence) -> bool {
        match self.store.try_insert(cadence).await {
            Ok(acquired) => acquired,
            Err(err) => {
                log::error!("Unable to acquire {cadence} update semaphore: {err:#}");
                false
            }
        }
    }

    pub async fn release(&self, cadence: Cadence) {
        if let Err(err) = self.store.delete(cadence).await {
            log::error!("Unable to release {cadence} update semaphore: {err:#}");
        }
    }
}
