//! Offline cache worker.
//!
//! ### Lifecycle
//! `Uninstalled -> Installing -> Waiting -> Activating -> Active`, and
//! `Redundant` once a newer generation takes over. Install pre-caches the
//! manifest into the generation named `<app>-v<version>`; activation deletes
//! every other generation.
//!
//! ### Fetch handling
//! 1. Cache hit on exact URL: served, no network.
//! 2. Miss: network. 200 `basic` responses for same-origin requests are
//!    stored before being returned.
//! 3. Network failure: HTML requests get the cached app shell, image
//!    requests a placeholder SVG, everything else the network error.
//!
//! Only the active worker reads or writes its generation. Any other state
//! passes requests straight to the network, and a response is never stored
//! into a generation that activation has already deleted.
//!
//! Cache storage failures are logged and never fail a fetch.

pub mod fallback;
pub mod message;
pub mod registration;
pub mod task;

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures_util::future::join_all;
use reqwest::{Method, Url};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::fetch::{Network, Request, Response, ResponseSource, is_same_origin, parse_origin, resolve};
use folio_core::{AppConfig, CacheDb, Error};

pub use fallback::{PLACEHOLDER_SVG, is_image_request, placeholder_image};
pub use message::ControlMessage;
pub use registration::{Registration, RegistrationStatus, WorkerStatus};
pub use task::{WorkerHandle, spawn};

/// Worker lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
    Uninstalled,
    Installing,
    /// Installed, waiting for the previous generation to let go.
    Waiting,
    Activating,
    /// Controlling pages and intercepting fetches.
    Active,
    /// Replaced by a newer generation or unregistered.
    Redundant,
}

impl WorkerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkerState::Uninstalled => "uninstalled",
            WorkerState::Installing => "installing",
            WorkerState::Waiting => "waiting",
            WorkerState::Activating => "activating",
            WorkerState::Active => "active",
            WorkerState::Redundant => "redundant",
        }
    }

    pub fn can_intercept_fetch(&self) -> bool {
        matches!(self, WorkerState::Active)
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of one cache generation: its name, origin and install manifest.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub cache_name: String,
    pub origin: Url,
    pub manifest: Vec<Url>,
}

impl WorkerConfig {
    /// Resolve the manifest against the configured origin.
    pub fn from_app_config(config: &AppConfig) -> Result<Self, Error> {
        let origin = parse_origin(&config.origin).map_err(|e| Error::InvalidUrl(e.to_string()))?;
        let manifest = config
            .manifest
            .iter()
            .map(|entry| resolve(&origin, entry).map_err(|e| Error::InvalidUrl(format!("{entry}: {e}"))))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { cache_name: config.cache_name(), origin, manifest })
    }

    /// URL of the app shell served to offline navigations.
    pub fn app_shell(&self) -> Url {
        let mut root = self.origin.clone();
        root.set_path("/");
        root
    }
}

/// Outcome of pre-caching the manifest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InstallReport {
    pub cached: Vec<String>,
    /// `(url, reason)` for entries that could not be stored.
    pub failed: Vec<(String, String)>,
}

/// Outcome of activation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivationReport {
    /// Stale generations that were deleted.
    pub deleted: Vec<String>,
}

/// One cache generation's worker.
pub struct CacheWorker {
    config: WorkerConfig,
    db: CacheDb,
    network: Arc<dyn Network>,
    state: watch::Sender<WorkerState>,
    skip_waiting: AtomicBool,
}

impl CacheWorker {
    pub fn new(config: WorkerConfig, db: CacheDb, network: Arc<dyn Network>) -> Self {
        let (state, _) = watch::channel(WorkerState::Uninstalled);
        Self { config, db, network, state, skip_waiting: AtomicBool::new(false) }
    }

    pub fn cache_name(&self) -> &str {
        &self.config.cache_name
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    pub fn state(&self) -> WorkerState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<WorkerState> {
        self.state.subscribe()
    }

    fn transition(&self, from: WorkerState, to: WorkerState) -> Result<(), Error> {
        let mut actual = from;
        let moved = self.state.send_if_modified(|state| {
            if *state == from {
                *state = to;
                true
            } else {
                actual = *state;
                false
            }
        });
        if !moved {
            return Err(Error::InvalidState { expected: from.to_string(), actual: actual.to_string() });
        }
        tracing::debug!(cache = %self.config.cache_name, %from, %to, "worker state changed");
        Ok(())
    }

    /// Open the generation and pre-cache every manifest entry.
    ///
    /// Entries are fetched concurrently. A failing entry is logged and
    /// reported but never aborts the others. Ends in `Waiting`, or `Active`
    /// if a skip-waiting message arrived meanwhile.
    pub async fn install(&self) -> Result<InstallReport, Error> {
        self.transition(WorkerState::Uninstalled, WorkerState::Installing)?;
        let cache_name = &self.config.cache_name;
        tracing::info!(cache = %cache_name, entries = self.config.manifest.len(), "installing cache generation");

        if let Err(e) = self.db.open_cache(cache_name).await {
            tracing::error!(cache = %cache_name, "failed to open cache: {e}");
        }

        let results = join_all(self.config.manifest.iter().map(|url| self.precache(url))).await;

        let mut report = InstallReport::default();
        for (url, result) in self.config.manifest.iter().zip(results) {
            match result {
                Ok(()) => report.cached.push(url.to_string()),
                Err(e) => {
                    tracing::error!(url = %url, "failed to cache resource: {e}");
                    report.failed.push((url.to_string(), e.to_string()));
                }
            }
        }

        self.transition(WorkerState::Installing, WorkerState::Waiting)?;
        tracing::info!(
            cache = %cache_name,
            cached = report.cached.len(),
            failed = report.failed.len(),
            "cache generation installed"
        );

        if self.skip_waiting.load(Ordering::SeqCst) {
            self.activate_if_waiting().await?;
        }

        Ok(report)
    }

    async fn precache(&self, url: &Url) -> Result<(), Error> {
        let request = Request::get(url.clone());
        let response = self.network.fetch(&request).await?;
        if !response.status.is_success() {
            return Err(Error::CacheWrite(format!("{url}: unexpected status {}", response.status.as_u16())));
        }
        self.db.put_entry(&self.config.cache_name, &response.to_stored(&request)).await
    }

    /// Delete every generation other than this one and start controlling.
    pub async fn activate(&self) -> Result<ActivationReport, Error> {
        self.transition(WorkerState::Waiting, WorkerState::Activating)?;
        let current = &self.config.cache_name;

        let names = self.db.cache_names().await.unwrap_or_else(|e| {
            tracing::error!("failed to list cache generations: {e}");
            Vec::new()
        });

        let mut report = ActivationReport::default();
        for name in names.into_iter().filter(|name| name != current) {
            match self.db.delete_cache(&name).await {
                Ok(true) => {
                    tracing::info!(cache = %name, "deleted stale cache generation");
                    report.deleted.push(name);
                }
                Ok(false) => {}
                Err(e) => tracing::error!(cache = %name, "failed to delete stale cache generation: {e}"),
            }
        }

        self.transition(WorkerState::Activating, WorkerState::Active)?;
        tracing::info!(cache = %current, deleted = report.deleted.len(), "cache generation active");
        Ok(report)
    }

    /// Activate unless someone else already did.
    async fn activate_if_waiting(&self) -> Result<Option<ActivationReport>, Error> {
        if self.state() != WorkerState::Waiting {
            return Ok(None);
        }
        match self.activate().await {
            Ok(report) => Ok(Some(report)),
            Err(Error::InvalidState { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// React to a message posted by the page.
    pub async fn handle_message(&self, message: ControlMessage) -> Result<Option<ActivationReport>, Error> {
        match message {
            ControlMessage::SkipWaiting => {
                tracing::info!(cache = %self.config.cache_name, "skip waiting requested");
                self.skip_waiting.store(true, Ordering::SeqCst);
                self.activate_if_waiting().await
            }
        }
    }

    /// Retire this generation's worker.
    pub fn retire(&self) {
        let previous = self.state.send_replace(WorkerState::Redundant);
        if previous != WorkerState::Redundant {
            tracing::info!(cache = %self.config.cache_name, "worker is redundant");
        }
    }

    /// Answer one intercepted request.
    ///
    /// Non-GET requests, and every request reaching a worker that is not
    /// active, are passed straight to the network.
    pub async fn handle_fetch(&self, request: Request) -> Result<Response, Error> {
        if request.method != Method::GET || !self.state().can_intercept_fetch() {
            return self.network.fetch(&request).await;
        }

        if let Some(hit) = self.lookup(&request.url).await {
            tracing::debug!(url = %request.url, "served from cache");
            return Ok(hit);
        }

        match self.network.fetch(&request).await {
            Ok(response) => {
                if response.is_cacheable() && is_same_origin(&request.url, &self.config.origin) {
                    self.store(&request, &response).await;
                }
                Ok(response)
            }
            Err(e) if e.is_network_failure() => self.fallback(&request, e).await,
            Err(e) => Err(e),
        }
    }

    async fn lookup(&self, url: &Url) -> Option<Response> {
        let stored = match self.db.match_entry(&self.config.cache_name, Method::GET.as_str(), url.as_str()).await {
            Ok(stored) => stored?,
            Err(e) => {
                tracing::warn!(url = %url, "cache lookup failed: {e}");
                return None;
            }
        };
        Response::from_stored(stored)
            .inspect_err(|e| tracing::warn!(url = %url, "unreadable cache entry: {e}"))
            .ok()
    }

    async fn store(&self, request: &Request, response: &Response) {
        if !self.state().can_intercept_fetch() {
            tracing::debug!(url = %request.url, state = %self.state(), "worker no longer active, response not cached");
            return;
        }
        if let Err(e) = self.db.put_entry_if_open(&self.config.cache_name, &response.to_stored(request)).await {
            tracing::warn!(url = %request.url, "failed to cache response: {e}");
        }
    }

    async fn fallback(&self, request: &Request, error: Error) -> Result<Response, Error> {
        if request.accepts_html() {
            return match self.lookup(&self.config.app_shell()).await {
                Some(mut shell) => {
                    tracing::info!(url = %request.url, "offline, serving cached app shell");
                    shell.source = ResponseSource::Fallback;
                    Ok(shell)
                }
                None => Err(error),
            };
        }

        if is_image_request(&request.url) {
            tracing::info!(url = %request.url, "offline, serving placeholder image");
            return Ok(placeholder_image(&request.url));
        }

        Err(error)
    }
}

impl fmt::Debug for CacheWorker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheWorker")
            .field("cache_name", &self.config.cache_name)
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockNetwork, ORIGIN};

    const MANIFEST: &[&str] = &["/", "/favicon.ico", "/billz png.png"];

    fn config(version: u32) -> WorkerConfig {
        let app = AppConfig {
            app_name: "app".into(),
            cache_version: version,
            origin: ORIGIN.into(),
            manifest: MANIFEST.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        };
        WorkerConfig::from_app_config(&app).unwrap()
    }

    fn site() -> Arc<MockNetwork> {
        let network = MockNetwork::new();
        network.route("https://folio.example/", 200, "text/html", "<html>shell</html>");
        network.route("https://folio.example/favicon.ico", 200, "image/x-icon", "ico");
        network.route("https://folio.example/billz%20png.png", 200, "image/png", "png");
        network
    }

    async fn worker(version: u32, network: Arc<MockNetwork>) -> (CacheDb, CacheWorker) {
        let db = CacheDb::open_in_memory().await.unwrap();
        let worker = CacheWorker::new(config(version), db.clone(), network);
        (db, worker)
    }

    async fn active_worker(network: Arc<MockNetwork>) -> (CacheDb, CacheWorker) {
        let (db, worker) = worker(1, network).await;
        worker.install().await.unwrap();
        worker.activate().await.unwrap();
        (db, worker)
    }

    fn get(url: &str) -> Request {
        Request::get(Url::parse(url).unwrap())
    }

    #[test]
    fn test_config_resolves_manifest() {
        let config = config(2);
        assert_eq!(config.cache_name, "app-v2");
        assert_eq!(config.manifest[2].as_str(), "https://folio.example/billz%20png.png");
        assert_eq!(config.app_shell().as_str(), "https://folio.example/");
    }

    #[tokio::test]
    async fn test_lifecycle_states() {
        let (_db, worker) = worker(1, site()).await;
        assert_eq!(worker.state(), WorkerState::Uninstalled);

        worker.install().await.unwrap();
        assert_eq!(worker.state(), WorkerState::Waiting);

        worker.activate().await.unwrap();
        assert_eq!(worker.state(), WorkerState::Active);
        assert!(worker.state().can_intercept_fetch());
    }

    #[tokio::test]
    async fn test_out_of_order_transitions_rejected() {
        let (_db, worker) = worker(1, site()).await;
        assert!(matches!(worker.activate().await, Err(Error::InvalidState { .. })));

        worker.install().await.unwrap();
        let err = worker.install().await.unwrap_err();
        assert_eq!(err.to_string(), "INVALID_STATE: expected uninstalled, found waiting");
    }

    #[tokio::test]
    async fn test_install_caches_manifest() {
        let (db, worker) = worker(1, site()).await;
        let report = worker.install().await.unwrap();

        assert_eq!(report.cached.len(), 3);
        assert!(report.failed.is_empty());
        assert_eq!(db.entry_count("app-v1").await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_install_failures_are_not_fatal() {
        let network = MockNetwork::new();
        network.route("https://folio.example/", 200, "text/html", "<html>shell</html>");
        // favicon is unrouted (404) and the image is never served
        let (db, worker) = worker(1, network).await;

        let report = worker.install().await.unwrap();
        assert_eq!(report.cached, vec!["https://folio.example/".to_string()]);
        assert_eq!(report.failed.len(), 2);
        assert_eq!(worker.state(), WorkerState::Waiting);
        assert_eq!(db.entry_count("app-v1").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_manifest_assets_served_without_network() {
        let network = site();
        let (_db, worker) = active_worker(network.clone()).await;
        let calls_after_install = network.calls();

        for path in MANIFEST {
            let url = resolve(&Url::parse(ORIGIN).unwrap(), path).unwrap();
            let response = worker.handle_fetch(Request::get(url)).await.unwrap();
            assert_eq!(response.source, ResponseSource::Cache);
        }
        assert_eq!(network.calls(), calls_after_install);
    }

    #[tokio::test]
    async fn test_activation_purges_stale_generations() {
        let network = site();
        let db = CacheDb::open_in_memory().await.unwrap();
        db.open_cache("app-v1").await.unwrap();

        let worker = CacheWorker::new(config(2), db.clone(), network);
        worker.install().await.unwrap();
        assert!(db.has_cache("app-v1").await.unwrap());

        let report = worker.activate().await.unwrap();
        assert_eq!(report.deleted, vec!["app-v1".to_string()]);
        assert!(!db.has_cache("app-v1").await.unwrap());
        assert!(db.has_cache("app-v2").await.unwrap());
        assert_eq!(db.cache_names().await.unwrap(), vec!["app-v2".to_string()]);
    }

    #[tokio::test]
    async fn test_same_origin_responses_populate_cache() {
        let network = site();
        network.route("https://folio.example/comp%202.webp", 200, "image/webp", "webp");
        let (db, worker) = active_worker(network.clone()).await;

        let first = worker.handle_fetch(get("https://folio.example/comp%202.webp")).await.unwrap();
        assert_eq!(first.source, ResponseSource::Network);
        assert!(db.match_entry("app-v1", "GET", "https://folio.example/comp%202.webp").await.unwrap().is_some());

        let second = worker.handle_fetch(get("https://folio.example/comp%202.webp")).await.unwrap();
        assert_eq!(second.source, ResponseSource::Cache);
        assert_eq!(network.calls_to("https://folio.example/comp%202.webp"), 1);
    }

    #[tokio::test]
    async fn test_cross_origin_responses_never_cached() {
        let network = site();
        network.route("https://cdn.example/font.woff2", 200, "font/woff2", "font");
        let (db, worker) = active_worker(network.clone()).await;

        let response = worker.handle_fetch(get("https://cdn.example/font.woff2")).await.unwrap();
        assert_eq!(response.status, reqwest::StatusCode::OK);
        assert_eq!(&response.body[..], b"font");
        assert!(db.match_entry("app-v1", "GET", "https://cdn.example/font.woff2").await.unwrap().is_none());

        worker.handle_fetch(get("https://cdn.example/font.woff2")).await.unwrap();
        assert_eq!(network.calls_to("https://cdn.example/font.woff2"), 2);
    }

    #[tokio::test]
    async fn test_error_statuses_returned_but_not_cached() {
        let network = site();
        let (db, worker) = active_worker(network).await;

        let response = worker.handle_fetch(get("https://folio.example/missing")).await.unwrap();
        assert_eq!(response.status, reqwest::StatusCode::NOT_FOUND);
        assert!(db.match_entry("app-v1", "GET", "https://folio.example/missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_offline_html_gets_app_shell() {
        let network = site();
        let (_db, worker) = active_worker(network.clone()).await;
        network.set_offline(true);

        let request = get("https://folio.example/works").accept("text/html,application/xhtml+xml");
        let response = worker.handle_fetch(request).await.unwrap();
        assert_eq!(response.source, ResponseSource::Fallback);
        assert_eq!(&response.body[..], b"<html>shell</html>");
    }

    #[tokio::test]
    async fn test_offline_html_without_shell_fails() {
        let network = MockNetwork::new();
        let (_db, worker) = active_worker(network.clone()).await;
        network.set_offline(true);

        let request = get("https://folio.example/works").accept("text/html");
        let err = worker.handle_fetch(request).await.unwrap_err();
        assert!(matches!(err, Error::Network(_)));
    }

    #[tokio::test]
    async fn test_offline_image_gets_placeholder() {
        let network = site();
        let (_db, worker) = active_worker(network.clone()).await;
        network.set_offline(true);

        let response = worker.handle_fetch(get("https://folio.example/dancing%20evernight.png")).await.unwrap();
        assert_eq!(response.content_type(), Some("image/svg+xml"));
        assert_eq!(response.source, ResponseSource::Fallback);
    }

    #[tokio::test]
    async fn test_offline_other_requests_propagate_error() {
        let network = site();
        let (_db, worker) = active_worker(network.clone()).await;
        network.set_offline(true);

        let err = worker.handle_fetch(get("https://folio.example/video%20bg.webm")).await.unwrap_err();
        assert!(matches!(err, Error::Network(msg) if msg.contains("offline")));
    }

    #[tokio::test]
    async fn test_non_get_bypasses_cache() {
        let network = site();
        let (db, worker) = active_worker(network.clone()).await;

        let mut request = get("https://folio.example/");
        request.method = Method::POST;
        let response = worker.handle_fetch(request).await.unwrap();
        assert_eq!(response.source, ResponseSource::Network);
        assert_eq!(db.entry_count("app-v1").await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_skip_waiting_activates_waiting_worker() {
        let (_db, worker) = worker(1, site()).await;
        worker.install().await.unwrap();

        let report = worker.handle_message(ControlMessage::SkipWaiting).await.unwrap();
        assert!(report.is_some());
        assert_eq!(worker.state(), WorkerState::Active);

        let again = worker.handle_message(ControlMessage::SkipWaiting).await.unwrap();
        assert!(again.is_none());
    }

    #[tokio::test]
    async fn test_skip_waiting_before_install_activates_after() {
        let (_db, worker) = worker(1, site()).await;
        assert!(worker.handle_message(ControlMessage::SkipWaiting).await.unwrap().is_none());

        worker.install().await.unwrap();
        assert_eq!(worker.state(), WorkerState::Active);
    }

    #[tokio::test]
    async fn test_retire() {
        let (_db, worker) = active_worker(site()).await;
        worker.retire();
        assert_eq!(worker.state(), WorkerState::Redundant);
        assert!(!worker.state().can_intercept_fetch());
    }

    #[tokio::test]
    async fn test_redundant_worker_bypasses_cache() {
        let network = site();
        network.route("https://folio.example/comp%202.webp", 200, "image/webp", "webp");
        let (db, worker) = active_worker(network.clone()).await;
        worker.retire();

        let cached = worker.handle_fetch(get("https://folio.example/")).await.unwrap();
        assert_eq!(cached.source, ResponseSource::Network);
        assert_eq!(network.calls_to("https://folio.example/"), 2);

        let fresh = worker.handle_fetch(get("https://folio.example/comp%202.webp")).await.unwrap();
        assert_eq!(&fresh.body[..], b"webp");
        assert!(db.match_entry("app-v1", "GET", "https://folio.example/comp%202.webp").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_waiting_worker_never_serves_fallback() {
        let network = site();
        let (_db, worker) = worker(1, network.clone()).await;
        worker.install().await.unwrap();
        network.set_offline(true);

        let request = get("https://folio.example/works").accept("text/html");
        let err = worker.handle_fetch(request).await.unwrap_err();
        assert!(matches!(err, Error::Network(_)));
    }

    #[tokio::test]
    async fn test_deleted_generation_not_revived_by_fetch() {
        let network = site();
        network.route("https://folio.example/comp%202.webp", 200, "image/webp", "webp");
        let (db, worker) = active_worker(network).await;
        db.delete_cache("app-v1").await.unwrap();

        let response = worker.handle_fetch(get("https://folio.example/comp%202.webp")).await.unwrap();
        assert_eq!(response.source, ResponseSource::Network);
        assert_eq!(&response.body[..], b"webp");
        assert!(db.cache_names().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_storage_failure_falls_back_to_network() {
        let network = site();
        network.route("https://folio.example/comp%202.webp", 200, "image/webp", "webp");
        let (db, worker) = active_worker(network.clone()).await;
        db.clone().close().await.unwrap();

        // cached entry can no longer be read
        let shell = worker.handle_fetch(get("https://folio.example/")).await.unwrap();
        assert_eq!(shell.source, ResponseSource::Network);
        assert_eq!(&shell.body[..], b"<html>shell</html>");

        // and a fresh response cannot be written
        let fresh = worker.handle_fetch(get("https://folio.example/comp%202.webp")).await.unwrap();
        assert_eq!(fresh.source, ResponseSource::Network);
        assert_eq!(&fresh.body[..], b"webp");
        assert!(matches!(db.cache_names().await, Err(Error::Database(_))));
    }

    #[tokio::test]
    async fn test_offline_html_with_broken_storage_fails() {
        let network = site();
        let (db, worker) = active_worker(network.clone()).await;
        db.clone().close().await.unwrap();
        network.set_offline(true);

        let request = get("https://folio.example/works").accept("text/html");
        let err = worker.handle_fetch(request).await.unwrap_err();
        assert!(matches!(err, Error::Network(_)));
    }

    #[tokio::test]
    async fn test_activation_survives_storage_failure() {
        let (db, worker) = worker(2, site()).await;
        db.open_cache("app-v1").await.unwrap();
        worker.install().await.unwrap();
        db.clone().close().await.unwrap();

        let report = worker.activate().await.unwrap();
        assert!(report.deleted.is_empty());
        assert_eq!(worker.state(), WorkerState::Active);
    }
}
