//! Composition root: turns a loaded [`Config`] into running services.

use std::{fmt, sync::Arc};

use anyhow::Context;
use parking_lot::RwLock;
use reeltrack_core::{
    Clock, SystemClock,
    notifications::Notifications,
    notifiers::{LibraryNotifier, NotifierRegistry, WebhookNotifier},
    ports::{IdMapper, MetadataSource, ShowStore},
    progress::ProgressIndicators,
    queue::{InMemoryShowQueue, StoreTaskExecutor},
    sources::{TvmazeClient, TvmazeIdMapper},
    store::{BackupPolicy, JsonFileShowStore},
    update::{
        BackgroundTask, CachePruneStep, GraceWindowPolicy, HttpHookStep, IdMappingRefreshStep,
        MaintenancePlan, ManualSearchHistory, MappingCleanupStep, SearchHistoryPurgeStep,
        ShowUpdater, SourceCacheStep, Stage, StalenessSelector, StoreBackupStep, WordListStep,
    },
};
use tracing::info;

use super::app_context::AppContext;
use crate::config::Config;

/// Everything `main` needs to serve requests and drain the queue.
pub struct Services {
    pub context: AppContext,
    pub executor: Arc<StoreTaskExecutor>,
}

impl fmt::Debug for Services {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Services")
            .field("context", &self.context)
            .field("executor", &self.executor)
            .finish()
    }
}

/// Open the show store at the configured path and wire it up.
pub async fn build_services(config: Config) -> anyhow::Result<Services> {
    let json = JsonFileShowStore::open(&config.store.path)
        .await
        .with_context(|| format!("failed to open show store {}", config.store.path.display()))?
        .with_backups(BackupPolicy {
            dir: config.store.backup_dir.clone(),
            max_count: config.store.backup_max_count,
        });
    let store: Arc<dyn ShowStore> = Arc::new(json);
    build_services_with_store(config, store, Arc::new(SystemClock))
}

/// Wire services around an already opened store.
pub fn build_services_with_store(
    config: Config,
    store: Arc<dyn ShowStore>,
    clock: Arc<dyn Clock>,
) -> anyhow::Result<Services> {
    let queue = Arc::new(InMemoryShowQueue::new());
    let progress = Arc::new(ProgressIndicators::default());
    let notifications =
        Arc::new(Notifications::new(clock.clone()).with_ttl(config.updater.notifications.ttl()));

    let mut notifiers = NotifierRegistry::default();
    for hook in &config.webhooks {
        let notifier = WebhookNotifier::new(hook.clone())
            .with_context(|| format!("failed to build webhook notifier '{}'", hook.id))?;
        notifiers.register(Arc::new(notifier) as Arc<dyn LibraryNotifier>);
    }
    let notifiers = Arc::new(notifiers);

    let maintenance = config.updater.maintenance;
    let history = Arc::new(ManualSearchHistory::new(clock.clone()));
    let history_max_age = chrono::Duration::from_std(maintenance.search_history_max_age())
        .context("search history max age out of range")?;
    let words = Arc::new(RwLock::new(config.release_words.clone()));

    let mut sources: Vec<Arc<dyn MetadataSource>> = Vec::new();
    let mut mapper: Option<Arc<dyn IdMapper>> = None;
    if let Some(tvmaze) = config.sources.tvmaze.as_ref().filter(|tvmaze| tvmaze.enabled) {
        let cache_dir = tvmaze
            .cache_dir
            .clone()
            .unwrap_or_else(|| config.cache.root.join("tvmaze"));
        let client = Arc::new(
            TvmazeClient::new(tvmaze, cache_dir, clock.clone())
                .context("failed to build tvmaze client")?,
        );
        info!(
            base_url = %tvmaze.base_url,
            cache = %client.cache_dir().display(),
            "tvmaze source enabled"
        );
        sources.push(client.clone() as Arc<dyn MetadataSource>);
        mapper = Some(Arc::new(TvmazeIdMapper::new(client, store.clone())) as Arc<dyn IdMapper>);
    }

    let id_mapping = BackgroundTask::new("id mapping refresh");
    let mut plan = MaintenancePlan::new()
        .with_step(Stage::Backup, Arc::new(StoreBackupStep::new(store.clone())))
        .with_step(
            Stage::MappingCleanup,
            Arc::new(MappingCleanupStep::new(store.clone())),
        )
        .with_step(
            Stage::CachePrune,
            Arc::new(CachePruneStep::new(
                config.cache.root.clone(),
                maintenance.cache_max_age(),
            )),
        )
        .with_step(
            Stage::WordLists,
            Arc::new(WordListStep::new(store.clone(), words)),
        )
        .with_step(
            Stage::SearchHistory,
            Arc::new(SearchHistoryPurgeStep::new(history.clone(), history_max_age)),
        );
    if !sources.is_empty() {
        plan.add(
            Stage::SourceCaches,
            Arc::new(SourceCacheStep::new(sources.clone())),
        );
    }
    if let Some(mapper) = mapper {
        plan.add(
            Stage::IdMappings,
            Arc::new(IdMappingRefreshStep::new(id_mapping.clone(), mapper)),
        );
    }
    for hook in &config.maintenance_hooks {
        let step = HttpHookStep::new(hook.clone())
            .with_context(|| format!("failed to build maintenance hook '{}'", hook.name))?;
        plan.add(step.stage(), Arc::new(step));
    }

    let staleness = config.updater.staleness;
    let selector = StalenessSelector::new(
        store.clone(),
        sources,
        Arc::new(GraceWindowPolicy::new(staleness.grace_days)),
        staleness,
    );

    info!(
        steps = plan.len(),
        notifiers = config.webhooks.len(),
        "daily update wired"
    );

    let updater = Arc::new(ShowUpdater::new(
        clock.clone(),
        store.clone(),
        queue.clone(),
        selector,
        progress.clone(),
        plan,
    ));

    let executor = Arc::new(StoreTaskExecutor::new(
        store,
        clock,
        notifications.clone(),
        notifiers,
    ));

    let context = AppContext::new(
        queue,
        progress,
        notifications,
        updater,
        history,
        id_mapping,
    );

    Ok(Services { context, executor })
}
