//! Daily run against a local stand-in for the TVmaze API and a maintenance
//! hook endpoint, wired from a config file the way the binary does it.

use std::{fs, sync::Arc, time::Duration};

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post},
};
use chrono::{NaiveDate, TimeZone, Utc};
use parking_lot::Mutex;
use reeltrack_core::{
    FakeClock,
    store::InMemoryShowStore,
    types::{InfoSource, ShowId, ShowStatus, TrackedShow},
    update::RunOutcome,
};
use reeltrack_server::{
    config::{ConfigLoad, ConfigLoader, sources::EnvConfig},
    infra::startup::build_services_with_store,
};
use serde_json::{Value, json};
use tempfile::tempdir;
use tokio::net::TcpListener;

#[derive(Clone, Default)]
struct Seen {
    update_windows: Arc<Mutex<Vec<String>>>,
    hooks: Arc<Mutex<Vec<Value>>>,
}

fn now() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 4, 0, 0).unwrap()
}

async fn updates(
    State(seen): State<Seen>,
    Query(query): Query<std::collections::HashMap<String, String>>,
) -> Json<Value> {
    seen.update_windows
        .lock()
        .push(query.get("since").cloned().unwrap_or_default());
    let changed = (now() - chrono::Duration::days(1)).timestamp();
    Json(json!({ "10": changed }))
}

async fn show_lookup(Path(id): Path<u64>) -> Json<Value> {
    Json(json!({
        "id": id,
        "externals": { "tvrage": null, "thetvdb": 5000 + id, "imdb": "tt0000123" }
    }))
}

async fn hook(State(seen): State<Seen>, Json(body): Json<Value>) -> Json<Value> {
    seen.hooks.lock().push(body);
    Json(json!({ "ok": true }))
}

async fn serve_fake_api(seen: Seen) -> String {
    let router = Router::new()
        .route("/updates/shows", get(updates))
        .route("/shows/{id}", get(show_lookup))
        .route("/hooks/timezones", post(hook))
        .with_state(seen);
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("fake api");
    });
    format!("http://{addr}")
}

fn show(prodid: u64, last_update: NaiveDate) -> TrackedShow {
    TrackedShow::new(
        ShowId::new(InfoSource::Tvmaze, prodid),
        format!("Show {prodid}"),
        format!("/tv/Show {prodid}"),
        last_update,
    )
    .with_status(ShowStatus::Continuing)
}

#[tokio::test]
async fn configured_source_feeds_selection_caches_and_id_mappings() {
    let seen = Seen::default();
    let base = serve_fake_api(seen.clone()).await;

    let dir = tempdir().expect("tempdir");
    let config_path = dir.path().join("reeltrack.toml");
    let cache_root = dir.path().join("cache");
    fs::write(
        &config_path,
        format!(
            r#"
[store]
path = "{store}"

[cache]
root = "{cache}"

[sources.tvmaze]
base_url = "{base}"
timeout_secs = 5

[[maintenance_hooks]]
stage = "timezones"
name = "zoneinfo refresh"
url = "{base}/hooks/timezones"
"#,
            store = dir.path().join("shows.json").display(),
            cache = cache_root.display(),
        ),
    )
    .expect("write config");
    let ConfigLoad { config, warnings } = ConfigLoader::new()
        .with_config_path(&config_path)
        .load_with_env(EnvConfig::default(), false)
        .expect("load config");
    assert!(warnings.is_empty());

    let today = now().date_naive();
    let store = Arc::new(InMemoryShowStore::new(vec![
        show(10, today - chrono::Duration::days(3)),
        show(11, today - chrono::Duration::days(1)),
    ]));
    let services = build_services_with_store(
        config,
        store.clone(),
        Arc::new(FakeClock::new(now())),
    )
    .expect("services");
    let updater = services.context.updater();

    let RunOutcome::Completed(report) = updater.run().await else {
        panic!("updater was idle");
    };
    assert!(report.failed_steps.is_empty(), "{:?}", report.failed_steps);
    assert_eq!(report.full_updates, 1, "only the remotely changed show");
    assert_eq!(report.refreshes, 1);

    assert_eq!(*seen.update_windows.lock(), vec!["week".to_string()]);
    assert!(cache_root.join("tvmaze/updates-week.json").is_file());

    let hooks = seen.hooks.lock().clone();
    assert_eq!(hooks.len(), 1);
    assert_eq!(hooks[0]["event"], "maintenance");
    assert_eq!(hooks[0]["stage"], "timezones");
    assert_eq!(hooks[0]["step"], "zoneinfo refresh");

    tokio::time::timeout(Duration::from_secs(5), async {
        while store
            .snapshot()
            .iter()
            .any(|show| show.external_ids.len() < 2)
        {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("id mappings filled in");

    let mapped = store.snapshot();
    assert_eq!(mapped[0].external_ids[&InfoSource::Tvdb], 5010);
    assert_eq!(mapped[1].external_ids[&InfoSource::Tvdb], 5011);
    assert_eq!(mapped[0].external_ids[&InfoSource::Imdb], 123);
}
