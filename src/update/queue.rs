use async_trait::async_trait;
use catalog_types::product::Product;
use catalog_types::provider::{Provider, ProviderType};
use catalog_types::update::configuration::MAX_BATCH_SIZE;
use catalog_types::update::{BatchUpdateTask, UpdateTask};
use derive_more::{Display, Error};
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Arc;
use tokio::sync::Mutex;
use typesafe_repository::IdentityOf;

pub mod sqlite;

pub use sqlite::SqliteUpdateQueue;

#[derive(Debug, Display, Error)]
pub enum QueueError {
    #[display("Task for provider {_0} does not belong to this queue")]
    ForeignProvider(#[error(ignore)] String),
    #[display("Queue storage failed: {_0:#}")]
    Storage(#[error(ignore)] anyhow::Error),
}

impl From<anyhow::Error> for QueueError {
    fn from(err: anyhow::Error) -> Self {
        Self::Storage(err)
    }
}

impl From<tokio_rusqlite::Error> for QueueError {
    fn from(err: tokio_rusqlite::Error) -> Self {
        Self::Storage(err.into())
    }
}

/// Pending update tasks of one provider, ordered by priority and then by
/// insertion.
#[async_trait]
pub trait UpdateQueue: Send + Sync {
    fn provider_slug(&self) -> &str;

    /// `None` accepts providers of any type.
    fn provider_type(&self) -> Option<ProviderType>;

    fn accepts(&self, provider: &Provider) -> bool {
        provider.slug.as_str() == self.provider_slug()
            && self.provider_type().map_or(true, |t| t == provider.kind)
    }

    async fn put(&self, task: UpdateTask) -> Result<(), QueueError>;

    async fn put_batched(&self, batch: BatchUpdateTask) -> Result<(), QueueError> {
        for task in batch.into_tasks() {
            self.put(task).await?;
        }
        Ok(())
    }

    /// Removes at most `n` tasks from the head of the queue.
    async fn get(&self, n: usize) -> Result<Vec<UpdateTask>, QueueError>;

    /// Removes at most `n` tasks bound to the provider of the head task and
    /// groups them into one batch. Tasks of other providers keep their place.
    async fn get_batched(&self, n: usize) -> Result<Option<BatchUpdateTask>, QueueError>;

    async fn size(&self) -> Result<usize, QueueError>;

    async fn is_empty(&self) -> Result<bool, QueueError> {
        Ok(self.size().await? == 0)
    }

    async fn contains(&self, product: &IdentityOf<Product>) -> Result<bool, QueueError>;
}

pub(crate) fn clamp(n: usize) -> usize {
    n.min(MAX_BATCH_SIZE as usize)
}

pub(crate) fn into_batch(tasks: Vec<UpdateTask>, limit: usize) -> Option<BatchUpdateTask> {
    let mut tasks = tasks.into_iter();
    let first = tasks.next()?;
    let mut batch = BatchUpdateTask::new(first.provider, Some(limit));
    batch.add_product(first.product);
    for task in tasks {
        batch.add_product(task.product);
    }
    Some(batch)
}

/// Queues known to the process, looked up by provider.
#[derive(Clone, Default)]
pub struct UpdateQueues(Vec<Arc<dyn UpdateQueue>>);

impl UpdateQueues {
    pub fn new(queues: Vec<Arc<dyn UpdateQueue>>) -> Self {
        Self(queues)
    }

    pub fn get(&self, provider_slug: &str) -> Option<Arc<dyn UpdateQueue>> {
        self.0
            .iter()
            .find(|q| q.provider_slug() == provider_slug)
            .cloned()
    }

    pub fn for_provider(&self, provider: &Provider) -> Option<Arc<dyn UpdateQueue>> {
        self.0.iter().find(|q| q.accepts(provider)).cloned()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

struct Entry {
    seq: u64,
    task: UpdateTask,
}

impl Entry {
    fn key(&self) -> (i64, u64) {
        (self.task.priority, self.seq)
    }
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// reversed: BinaryHeap pops the greatest entry
impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        other.key().cmp(&self.key())
    }
}

#[derive(Default)]
struct State {
    heap: BinaryHeap<Entry>,
    next_seq: u64,
}

impl State {
    fn drain(&mut self, n: usize, grouped: bool) -> Vec<UpdateTask> {
        let n = clamp(n);
        let mut taken: Vec<UpdateTask> = vec![];
        let mut kept = vec![];
        while taken.len() < n {
            let Some(entry) = self.heap.pop() else {
                break;
            };
            let same_provider = taken
                .first()
                .map_or(true, |first| !grouped || first.provider.id == entry.task.provider.id);
            if same_provider {
                taken.push(entry.task);
            } else {
                kept.push(entry);
            }
        }
        self.heap.extend(kept);
        taken
    }
}

pub struct InMemoryUpdateQueue {
    provider_slug: String,
    provider_type: Option<ProviderType>,
    state: Mutex<State>,
}

impl InMemoryUpdateQueue {
    pub fn new<S: Into<String>>(provider_slug: S, provider_type: Option<ProviderType>) -> Self {
        Self {
            provider_slug: provider_slug.into(),
            provider_type,
            state: Mutex::new(State::default()),
        }
    }
}

#[async_trait]
impl UpdateQueue for InMemoryUpdateQueue {
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
        let mut state = self.state.lock().await;
        let seq = state.next_seq;
        state.next_seq += 1;
        state.heap.push(Entry { seq, task });
        Ok(())
    }

    async fn get(&self, n: usize) -> Result<Vec<UpdateTask>, QueueError> {
        Ok(self.state.lock().await.drain(n, false))
    }

    async fn get_batched(&self, n: usize) -> Result<Option<BatchUpdateTask>, QueueError> {
        let tasks = self.state.lock().await.drain(n, true);
        Ok(into_batch(tasks, clamp(n)))
    }

    async fn size(&self) -> Result<usize, QueueError> {
        Ok(self.state.lock().await.heap.len())
    }

    async fn contains(&self, product: &IdentityOf<Product>) -> Result<bool, QueueError> {
        Ok(self
            .state
            .lock()
            .await
            .heap
            .iter()
            .any(|e| e.task.product.id == *product))
    }
}

#[cfg(test)]
pub mod test {
    use super::*;
    use catalog_types::provider::AMAZON_SLUG;

    pub fn amazon() -> Provider {
        Provider::amazon(
            [
                ("access_key", "AKIA"),
                ("secret_key", "secret"),
                ("country", "de"),
                ("associate_tag", "tag-21"),
            ]
            .into_iter()
            .collect(),
        )
        .unwrap()
    }

    fn queue() -> InMemoryUpdateQueue {
        InMemoryUpdateQueue::new(AMAZON_SLUG, Some(ProviderType::Amazon))
    }

    fn names(tasks: &[UpdateTask]) -> Vec<&str> {
        tasks.iter().map(|t| t.product.name.as_str()).collect()
    }

    #[tokio::test]
    async fn pops_by_priority_then_insertion() {
        let queue = queue();
        let provider = amazon();
        for (name, priority) in [("a", 0), ("b", 5), ("c", -1), ("d", 0)] {
            let task = UpdateTask::new(provider.clone(), Product::simple(name, vec![]))
                .with_priority(priority);
            queue.put(task).await.unwrap();
        }
        assert_eq!(4, queue.size().await.unwrap());
        assert_eq!(vec!["c", "a", "d"], names(&queue.get(3).await.unwrap()));
        assert_eq!(vec!["b"], names(&queue.get(3).await.unwrap()));
        assert!(queue.is_empty().await.unwrap());
        assert!(queue.get(3).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn batches_tasks_of_the_head_provider() {
        let queue = queue();
        let (first, second) = (amazon(), amazon());
        for (name, provider) in [("a", &first), ("b", &second), ("c", &first), ("d", &second)] {
            let task = UpdateTask::new(provider.clone(), Product::simple(name, vec![]));
            queue.put(task).await.unwrap();
        }

        let batch = queue.get_batched(10).await.unwrap().unwrap();
        assert_eq!(first.id, batch.provider().id);
        assert_eq!(Some(10), batch.limit());
        assert_eq!(
            vec!["a", "c"],
            batch.products().iter().map(|p| p.name.as_str()).collect::<Vec<_>>()
        );
        assert_eq!(vec!["b", "d"], names(&queue.get(10).await.unwrap()));
        assert_eq!(None, queue.get_batched(10).await.unwrap());
    }

    #[tokio::test]
    async fn bounds_drain_size() {
        let queue = queue();
        let provider = amazon();
        for i in 0..105 {
            let task = UpdateTask::new(provider.clone(), Product::simple(i.to_string(), vec![]));
            queue.put(task).await.unwrap();
        }
        assert!(queue.get(0).await.unwrap().is_empty());
        assert_eq!(None, queue.get_batched(0).await.unwrap());
        assert_eq!(105, queue.size().await.unwrap());
        assert_eq!(100, queue.get_batched(500).await.unwrap().unwrap().len());
        assert_eq!(5, queue.size().await.unwrap());
    }

    #[tokio::test]
    async fn tracks_pending_products() {
        let queue = queue();
        let product = Product::simple("a", vec![]);
        let id = product.id;
        queue.put(UpdateTask::new(amazon(), product)).await.unwrap();
        assert!(queue.contains(&id).await.unwrap());
        queue.get(1).await.unwrap();
        assert!(!queue.contains(&id).await.unwrap());
    }

    #[tokio::test]
    async fn rejects_foreign_tasks() {
        let queue = InMemoryUpdateQueue::new("ebay", None);
        let res = queue
            .put(UpdateTask::new(amazon(), Product::simple("a", vec![])))
            .await;
        assert!(matches!(res, Err(QueueError::ForeignProvider(slug)) if slug == "amazon"));
        assert!(queue.is_empty().await.unwrap());
    }

    #[tokio::test]
    async fn splits_batches_back_into_tasks() {
        let queue = queue();
        let mut batch = BatchUpdateTask::new(amazon(), None);
        batch.add_product(Product::simple("a", vec![]));
        batch.add_product(Product::simple("b", vec![]));
        queue.put_batched(batch).await.unwrap();
        assert_eq!(vec!["a", "b"], names(&queue.get(2).await.unwrap()));
    }

    #[test]
    fn finds_queue_by_provider() {
        let queues = UpdateQueues::new(vec![
            Arc::new(InMemoryUpdateQueue::new("ebay", None)),
            Arc::new(queue()),
        ]);
        let provider = amazon();
        assert_eq!(
            Some("amazon"),
            queues.for_provider(&provider).as_deref().map(|q| q.provider_slug())
        );
        let mut unknown = provider;
        unknown.kind = ProviderType::Other("ebay".to_string());
        assert!(queues.for_provider(&unknown).is_none());
        assert!(queues.get("ebay").is_some());
    }
}
