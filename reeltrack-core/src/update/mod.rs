//! The daily update run: maintenance, stale show selection and dispatch.

pub mod background;
pub mod cache;
pub mod coordinator;
pub mod dispatcher;
pub mod history;
pub mod hooks;
pub mod maintenance;
pub mod policy;
pub mod staleness;
pub mod words;

pub use background::BackgroundTask;
pub use cache::{PruneStats, prune_cache_dir};
pub use coordinator::{DAILY_UPDATE_NAME, RunOutcome, RunReport, ShowUpdater};
pub use dispatcher::UpdateDispatcher;
pub use history::{ManualSearchHistory, ManualSearchRecord};
pub use hooks::{HttpHookStep, MaintenanceHookConfig};
pub use maintenance::{
    CachePruneStep, FnStep, IdMappingRefreshStep, MaintenancePlan, MaintenanceStep,
    MappingCleanupStep, SearchHistoryPurgeStep, SourceCacheStep, Stage, StoreBackupStep,
    WordListStep,
};
pub use policy::{ChangeSignal, GraceWindowPolicy, UpdatePolicy};
pub use staleness::{StaleCandidate, StaleSelection, StaleWindow, StalenessSelector};
pub use words::{GlobalWords, reconcile};
