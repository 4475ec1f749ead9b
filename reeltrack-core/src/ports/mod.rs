//! Boundaries to the collaborators the scheduler does not own: the show
//! store, remote metadata sources and the shared work queue.

pub mod metadata;
pub mod queue;
pub mod store;

pub use metadata::{IdMapper, MetadataSource, UpdatedShows};
pub use queue::{ShowQueue, ShowTask, ShowTaskAction, ShowTaskExecutor, WorkHandle};
pub use store::{ShowStore, StaleQuery};
