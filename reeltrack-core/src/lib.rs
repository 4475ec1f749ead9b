//! # Reeltrack Core
//!
//! Scheduling core for keeping a library of tracked TV shows fresh.
//!
//! A daily run performs housekeeping, picks which shows are stale enough to
//! need a full metadata update (the rest only get a refresh), hands the work
//! to a shared show queue and exposes the batch's progress to observers.
//!
//! ## Architecture
//!
//! - [`ports`]: traits for the store, metadata sources and the show queue
//! - [`update`]: staleness selection, dispatch, maintenance and the
//!   [`ShowUpdater`](update::ShowUpdater) coordinator
//! - [`progress`]: progress of queued batches, grouped in named slots
//! - [`notifications`]: short-lived per-viewer UI notifications
//! - [`notifiers`]: media-library notifiers with optional batching
//! - [`store`] and [`queue`]: in-process implementations of the ports
//! - [`sources`]: the TVmaze metadata client

pub mod clock;
pub mod config;
pub mod error;
pub mod notifications;
pub mod notifiers;
pub mod ports;
pub mod progress;
pub mod queue;
pub mod sources;
pub mod store;
pub mod types;
pub mod update;

pub use clock::{Clock, FakeClock, SystemClock};
pub use config::UpdaterConfig;
pub use error::{Result, ShowError};
