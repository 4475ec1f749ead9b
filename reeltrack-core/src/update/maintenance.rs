//! Housekeeping performed at the start of every daily update run.

use std::{collections::BTreeMap, fmt, future::Future, path::PathBuf, sync::Arc, time::SystemTime};

use async_trait::async_trait;
use chrono::Duration;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{Result, ShowError};
use crate::ports::{IdMapper, MetadataSource, ShowStore};

use super::background::BackgroundTask;
use super::cache::prune_cache_dir;
use super::history::ManualSearchHistory;
use super::words::{GlobalWords, reconcile};

/// One failure-isolated housekeeping step.
#[async_trait]
pub trait MaintenanceStep: Send + Sync {
    fn name(&self) -> &str;

    async fn run(&self) -> Result<()>;
}

/// Position of a step within a run. Steps execute in declaration order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Backup,
    Timezones,
    LookupCaches,
    MappingCleanup,
    ProviderCleanup,
    CachePrune,
    SourceCaches,
    WordLists,
    SearchHistory,
    IdMappings,
}

/// Steps to run before shows are selected, keyed by stage.
#[derive(Clone, Default)]
pub struct MaintenancePlan {
    stages: BTreeMap<Stage, Vec<Arc<dyn MaintenanceStep>>>,
}

impl fmt::Debug for MaintenancePlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut list = f.debug_list();
        for (stage, steps) in &self.stages {
            for step in steps {
                list.entry(&format_args!("{stage:?}:{}", step.name()));
            }
        }
        list.finish()
    }
}

impl MaintenancePlan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_step(mut self, stage: Stage, step: Arc<dyn MaintenanceStep>) -> Self {
        self.add(stage, step);
        self
    }

    pub fn add(&mut self, stage: Stage, step: Arc<dyn MaintenanceStep>) {
        self.stages.entry(stage).or_default().push(step);
    }

    pub fn len(&self) -> usize {
        self.stages.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Steps in execution order.
    pub fn steps(&self) -> Vec<Arc<dyn MaintenanceStep>> {
        self.stages.values().flatten().cloned().collect()
    }
}

/// Adapts an async closure into a step.
pub struct FnStep<F> {
    name: String,
    func: F,
}

impl<F> fmt::Debug for FnStep<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnStep").field("name", &self.name).finish()
    }
}

impl<F> FnStep<F> {
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

#[async_trait]
impl<F, Fut> MaintenanceStep for FnStep<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<()>> + Send,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self) -> Result<()> {
        (self.func)().await
    }
}

/// Backs up the show store.
pub struct StoreBackupStep {
    store: Arc<dyn ShowStore>,
}

impl fmt::Debug for StoreBackupStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreBackupStep").finish_non_exhaustive()
    }
}

impl StoreBackupStep {
    pub fn new(store: Arc<dyn ShowStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl MaintenanceStep for StoreBackupStep {
    fn name(&self) -> &str {
        "store backup"
    }

    async fn run(&self) -> Result<()> {
        match self.store.backup().await? {
            Some(path) => info!(backup = %path.display(), "backed up show store"),
            None => debug!("show store backups disabled"),
        }
        Ok(())
    }
}

/// Clears out old files from the cache directory.
#[derive(Debug, Clone)]
pub struct CachePruneStep {
    root: PathBuf,
    max_age: std::time::Duration,
}

impl CachePruneStep {
    pub fn new(root: impl Into<PathBuf>, max_age: std::time::Duration) -> Self {
        Self {
            root: root.into(),
            max_age,
        }
    }
}

#[async_trait]
impl MaintenanceStep for CachePruneStep {
    fn name(&self) -> &str {
        "cache prune"
    }

    async fn run(&self) -> Result<()> {
        prune_cache_dir(&self.root, self.max_age, SystemTime::now()).await?;
        Ok(())
    }
}

/// Validates then cleans every metadata source's response cache.
pub struct SourceCacheStep {
    sources: Vec<Arc<dyn MetadataSource>>,
}

impl fmt::Debug for SourceCacheStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceCacheStep")
            .field("sources", &self.sources.len())
            .finish()
    }
}

impl SourceCacheStep {
    pub fn new(sources: Vec<Arc<dyn MetadataSource>>) -> Self {
        Self { sources }
    }
}

#[async_trait]
impl MaintenanceStep for SourceCacheStep {
    fn name(&self) -> &str {
        "source cache maintenance"
    }

    async fn run(&self) -> Result<()> {
        let mut failed = Vec::new();
        for source in &self.sources {
            let result = match source.check_cache().await {
                Ok(()) => source.clean_cache().await,
                Err(err) => Err(err),
            };
            if let Err(err) = result {
                warn!(source = %source.source(), error = %err, "metadata cache maintenance failed");
                failed.push(source.source().to_string());
            }
        }

        if failed.is_empty() {
            Ok(())
        } else {
            Err(ShowError::Maintenance {
                step: self.name().to_string(),
                message: format!("failed for {}", failed.join(", ")),
            })
        }
    }
}

/// Removes per-show release words that duplicate the global lists.
pub struct WordListStep {
    store: Arc<dyn ShowStore>,
    global: Arc<RwLock<GlobalWords>>,
}

impl fmt::Debug for WordListStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WordListStep")
            .field("global", &*self.global.read())
            .finish_non_exhaustive()
    }
}

impl WordListStep {
    pub fn new(store: Arc<dyn ShowStore>, global: Arc<RwLock<GlobalWords>>) -> Self {
        Self { store, global }
    }
}

#[async_trait]
impl MaintenanceStep for WordListStep {
    fn name(&self) -> &str {
        "release word cleanup"
    }

    async fn run(&self) -> Result<()> {
        let global = self.global.read().clone();
        let mut saved = 0usize;
        for mut show in self.store.all_shows().await? {
            if reconcile(&mut show.words, &global) {
                self.store.save_show(&show).await?;
                saved += 1;
            }
        }
        if saved > 0 {
            info!(shows = saved, "cleaned release word lists");
        }
        Ok(())
    }
}

/// Drops cross-source ids that point back at a show's own source or carry
/// no id.
pub struct MappingCleanupStep {
    store: Arc<dyn ShowStore>,
}

impl fmt::Debug for MappingCleanupStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MappingCleanupStep").finish_non_exhaustive()
    }
}

impl MappingCleanupStep {
    pub fn new(store: Arc<dyn ShowStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl MaintenanceStep for MappingCleanupStep {
    fn name(&self) -> &str {
        "id mapping cleanup"
    }

    async fn run(&self) -> Result<()> {
        let mut removed = 0usize;
        for mut show in self.store.all_shows().await? {
            let dropped = show.prune_external_ids();
            if dropped > 0 {
                self.store.save_show(&show).await?;
                removed += dropped;
            }
        }
        if removed > 0 {
            info!(removed, "dropped invalid id mappings");
        }
        Ok(())
    }
}

/// Purges old manual search results.
#[derive(Debug)]
pub struct SearchHistoryPurgeStep {
    history: Arc<ManualSearchHistory>,
    max_age: Duration,
}

impl SearchHistoryPurgeStep {
    pub fn new(history: Arc<ManualSearchHistory>, max_age: Duration) -> Self {
        Self { history, max_age }
    }
}

#[async_trait]
impl MaintenanceStep for SearchHistoryPurgeStep {
    fn name(&self) -> &str {
        "manual search history purge"
    }

    async fn run(&self) -> Result<()> {
        let removed = self.history.remove_older_than(self.max_age);
        debug!(removed, "purged manual search history");
        Ok(())
    }
}

/// Starts a background refresh of missing id mappings unless one is still
/// running. Never waits for it.
pub struct IdMappingRefreshStep {
    task: BackgroundTask,
    mapper: Arc<dyn IdMapper>,
}

impl fmt::Debug for IdMappingRefreshStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdMappingRefreshStep")
            .field("task", &self.task)
            .finish_non_exhaustive()
    }
}

impl IdMappingRefreshStep {
    pub fn new(task: BackgroundTask, mapper: Arc<dyn IdMapper>) -> Self {
        Self { task, mapper }
    }
}

#[async_trait]
impl MaintenanceStep for IdMappingRefreshStep {
    fn name(&self) -> &str {
        "id mapping refresh"
    }

    async fn run(&self) -> Result<()> {
        let mapper = self.mapper.clone();
        let spawned = self.task.try_spawn(async move {
            match mapper.refresh_missing().await {
                Ok(added) => info!(added, "id mappings refreshed"),
                Err(err) => warn!(error = %err, "id mapping refresh failed"),
            }
        });
        if spawned {
            info!(task = self.task.name(), "updating show id mappings in the background");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use chrono::NaiveDate;

    use super::*;
    use crate::ports::metadata::MockMetadataSource;
    use crate::store::InMemoryShowStore;
    use crate::types::{InfoSource, ShowId, TrackedShow};

    fn named(name: &'static str) -> Arc<dyn MaintenanceStep> {
        Arc::new(FnStep::new(name, || async { Ok::<(), ShowError>(()) }))
    }

    #[test]
    fn plan_orders_by_stage_not_insertion() {
        let plan = MaintenancePlan::new()
            .with_step(Stage::SearchHistory, named("history"))
            .with_step(Stage::Backup, named("backup"))
            .with_step(Stage::CachePrune, named("cache"))
            .with_step(Stage::Backup, named("second backup"));

        let names: Vec<String> = plan.steps().iter().map(|s| s.name().to_string()).collect();
        assert_eq!(names, vec!["backup", "second backup", "cache", "history"]);
        assert_eq!(plan.len(), 4);
    }

    #[tokio::test]
    async fn source_cache_step_visits_every_source_despite_failures() {
        let mut failing = MockMetadataSource::new();
        failing.expect_source().return_const(InfoSource::Tvdb);
        failing
            .expect_check_cache()
            .times(1)
            .returning(|| Err(ShowError::Metadata("corrupt".into())));
        failing.expect_clean_cache().never();

        let mut healthy = MockMetadataSource::new();
        healthy.expect_source().return_const(InfoSource::Tvmaze);
        healthy.expect_check_cache().times(1).returning(|| Ok(()));
        healthy.expect_clean_cache().times(1).returning(|| Ok(()));

        let step = SourceCacheStep::new(vec![Arc::new(failing), Arc::new(healthy)]);
        let err = step.run().await.expect_err("one source failed");
        assert!(matches!(err, ShowError::Maintenance { message, .. } if message.contains("tvdb")));
    }

    #[test]
    fn stages_parse_from_config_names() {
        let stage: Stage = serde_json::from_str("\"provider_cleanup\"").expect("known stage");
        assert_eq!(stage, Stage::ProviderCleanup);
        assert!(serde_json::from_str::<Stage>("\"lunch\"").is_err());
    }

    #[tokio::test]
    async fn mapping_cleanup_only_saves_changed_shows() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).expect("valid date");
        let mut broken = TrackedShow::new(ShowId::new(InfoSource::Tvmaze, 1), "B", "/tv/B", date);
        broken.external_ids.insert(InfoSource::Tvmaze, 1);
        broken.external_ids.insert(InfoSource::Tvdb, 77);
        let mut fine = TrackedShow::new(ShowId::new(InfoSource::Tvdb, 2), "F", "/tv/F", date);
        fine.external_ids.insert(InfoSource::Imdb, 12);

        let store = Arc::new(InMemoryShowStore::new(vec![broken, fine.clone()]));
        MappingCleanupStep::new(store.clone())
            .run()
            .await
            .expect("cleanup");

        let shows = store.snapshot();
        assert_eq!(
            shows[0].external_ids.keys().copied().collect::<Vec<_>>(),
            vec![InfoSource::Tvdb]
        );
        assert_eq!(shows[1], fine);
    }

    #[tokio::test]
    async fn word_list_step_strips_global_duplicates() {
        let mut dirty = TrackedShow::new(
            ShowId::new(InfoSource::Tvdb, 1),
            "Dirty",
            "/tv/Dirty",
            NaiveDate::from_ymd_opt(2024, 1, 1).expect("valid date"),
        );
        dirty.words.ignore.insert("cam".into());
        let clean = TrackedShow::new(
            ShowId::new(InfoSource::Tvdb, 2),
            "Clean",
            "/tv/Clean",
            NaiveDate::from_ymd_opt(2024, 1, 1).expect("valid date"),
        );

        let store = Arc::new(InMemoryShowStore::new(vec![dirty, clean]));
        let global = GlobalWords {
            ignore: ["cam".to_string()].into(),
            ..Default::default()
        };
        let step = WordListStep::new(store.clone(), Arc::new(RwLock::new(global)));
        step.run().await.expect("cleanup");

        let shows = store.snapshot();
        assert!(shows[0].words.ignore.is_empty());
        assert!(shows[1].words.ignore.is_empty());
    }

    struct CountingMapper(AtomicUsize);

    #[async_trait]
    impl IdMapper for CountingMapper {
        async fn refresh_missing(&self) -> Result<usize> {
            Ok(self.0.fetch_add(1, Ordering::SeqCst) + 1)
        }
    }

    #[tokio::test]
    async fn id_mapping_step_returns_without_waiting() {
        let mapper = Arc::new(CountingMapper(AtomicUsize::new(0)));
        let task = BackgroundTask::new("mappings");
        let step = IdMappingRefreshStep::new(task.clone(), mapper.clone());

        step.run().await.expect("kick off");
        for _ in 0..100 {
            if !task.is_running() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        assert_eq!(mapper.0.load(Ordering::SeqCst), 1);
    }
}
