//! Media-library notifiers told about updated shows.
//!
//! Some integrations rescan an entire library section per call, so they opt
//! into batching: updates are queued and sent once per show or per library
//! root when the show queue drains.

pub mod webhook;

use std::{
    collections::HashSet,
    fmt,
    path::PathBuf,
    sync::{Arc, LazyLock},
};

use async_trait::async_trait;
use parking_lot::Mutex;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::Result;

pub use webhook::{WebhookConfig, WebhookNotifier};

/// How a notifier wants library updates delivered.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LibraryBatching {
    /// Every update is sent right away.
    #[default]
    Immediate,
    /// Queued; one call per distinct show name on flush.
    ByShowName,
    /// Queued; one call per distinct library root on flush.
    ByParentDir,
}

/// What changed in the library.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryTarget {
    pub show_name: String,
    /// Path of the updated item, usually an episode file inside the show
    /// directory.
    pub location: PathBuf,
}

impl LibraryTarget {
    pub fn new(show_name: impl Into<String>, location: impl Into<PathBuf>) -> Self {
        Self {
            show_name: show_name.into(),
            location: location.into(),
        }
    }

    /// Library root holding the show, with any drive or leading separator
    /// stripped so equivalent roots compare equal.
    pub fn parent_dir(&self) -> String {
        let location = self.location.to_string_lossy();
        let dirname = location
            .rfind(['/', '\\'])
            .map_or("", |idx| &location[..idx]);

        let show_suffix = format!(r"[/\\]+{}.*", regex::escape(&self.show_name));
        let without_show = match Regex::new(&show_suffix) {
            Ok(re) => re.replace(dirname, "").into_owned(),
            Err(_) => dirname.to_string(),
        };
        match LEADING_ROOT.as_ref() {
            Some(re) => re.replace(&without_show, "").into_owned(),
            None => without_show,
        }
    }
}

static LEADING_ROOT: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"^.{0,2}[/\\]").ok());

#[async_trait]
pub trait LibraryNotifier: Send + Sync {
    fn id(&self) -> &str;

    fn is_enabled(&self) -> bool;

    /// Whether this notifier handles library updates at all.
    fn updates_library(&self) -> bool;

    fn batching(&self) -> LibraryBatching {
        LibraryBatching::Immediate
    }

    async fn update_library(&self, target: &LibraryTarget) -> Result<()>;
}

/// Fans library updates out to every enabled notifier.
#[derive(Default)]
pub struct NotifierRegistry {
    notifiers: Vec<Arc<dyn LibraryNotifier>>,
    pending: Mutex<Vec<LibraryTarget>>,
}

impl fmt::Debug for NotifierRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ids: Vec<&str> = self.notifiers.iter().map(|n| n.id()).collect();
        f.debug_struct("NotifierRegistry")
            .field("notifiers", &ids)
            .field("pending", &self.pending.lock().len())
            .finish()
    }
}

impl NotifierRegistry {
    pub fn new(notifiers: Vec<Arc<dyn LibraryNotifier>>) -> Self {
        Self {
            notifiers,
            pending: Mutex::new(Vec::new()),
        }
    }

    pub fn register(&mut self, notifier: Arc<dyn LibraryNotifier>) {
        self.notifiers.push(notifier);
    }

    /// Enabled notifiers that handle library updates.
    pub fn enabled_library(&self) -> impl Iterator<Item = &Arc<dyn LibraryNotifier>> {
        self.notifiers
            .iter()
            .filter(|n| n.is_enabled() && n.updates_library())
    }

    pub fn pending(&self) -> usize {
        self.pending.lock().len()
    }

    /// Send `target` to immediate notifiers and queue it for batched ones.
    pub async fn notify_update_library(&self, target: LibraryTarget) {
        let mut queue_for_batch = false;
        for notifier in self.enabled_library() {
            match notifier.batching() {
                LibraryBatching::Immediate => deliver(notifier.as_ref(), &target).await,
                LibraryBatching::ByShowName | LibraryBatching::ByParentDir => {
                    queue_for_batch = true;
                }
            }
        }
        if queue_for_batch {
            self.pending.lock().push(target);
        }
    }

    /// Deliver queued updates to batched notifiers, de-duplicated per
    /// notifier. Returns the number of calls made.
    pub async fn flush(&self) -> usize {
        let queued = std::mem::take(&mut *self.pending.lock());
        if queued.is_empty() {
            return 0;
        }

        let mut calls = 0;
        for notifier in self.enabled_library() {
            let batching = notifier.batching();
            if batching == LibraryBatching::Immediate {
                continue;
            }

            let mut seen = HashSet::new();
            for target in &queued {
                let key = match batching {
                    LibraryBatching::ByShowName => target.show_name.clone(),
                    _ => target.parent_dir(),
                };
                if !seen.insert(key) {
                    continue;
                }
                deliver(notifier.as_ref(), target).await;
                calls += 1;
            }
        }
        debug!(queued = queued.len(), calls, "flushed library updates");
        calls
    }
}

async fn deliver(notifier: &dyn LibraryNotifier, target: &LibraryTarget) {
    if let Err(err) = notifier.update_library(target).await {
        warn!(
            notifier = notifier.id(),
            show = %target.show_name,
            error = %err,
            "library update notification failed"
        );
    }
}
