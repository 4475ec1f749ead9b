pub mod ids;
pub mod show;

pub use ids::{InfoSource, ShowId};
pub use show::{
    EpisodeWindow, QueueActionKind, RefreshOptions, ReleaseWords, ShowStatus,
    TrackedShow, UpdateAction,
};
