//! Scheduled refresh of provider-backed product data.

pub mod manager;
pub mod mediator;
pub mod queue;
pub mod resolver;
pub mod semaphore;
pub mod timer;

pub use manager::UpdateManager;
pub use mediator::UpdateMediator;
pub use queue::{InMemoryUpdateQueue, QueueError, SqliteUpdateQueue, UpdateQueue, UpdateQueues};
pub use resolver::{resolve, ConfigurationContext, ContextError, ResolveError};
pub use semaphore::{InMemorySemaphoreStore, SemaphoreStore, SqliteSemaphoreStore, UpdateSemaphore};
pub use timer::{UpdateRunner, UpdateTimer};
