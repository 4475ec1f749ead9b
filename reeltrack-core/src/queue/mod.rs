//! Show queue backends and the task executor they drive.

pub mod executor;
pub mod memory;

pub use executor::StoreTaskExecutor;
pub use memory::{InMemoryShowQueue, QueueItem};
