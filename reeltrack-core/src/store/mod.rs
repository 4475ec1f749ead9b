//! Show store backends.

pub mod json;
pub mod memory;

pub use json::{BackupPolicy, JsonFileShowStore};
pub use memory::InMemoryShowStore;
