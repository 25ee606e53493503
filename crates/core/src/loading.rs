//! Loading indicator state and the first-visit loading screen.
//!
//! The first visit shows the loading screen for a fixed splash duration and
//! then persists `has-visited-<app>`; later visits skip it entirely.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;

use crate::{CacheDb, Error};

const VISITED_PREFIX: &str = "has-visited-";

/// Local storage key that marks a returning visitor.
pub fn visited_key(app_name: &str) -> String {
    format!("{VISITED_PREFIX}{app_name}")
}

#[derive(Debug)]
struct Inner {
    visited_key: String,
    loading: watch::Sender<bool>,
    initial_load: watch::Sender<bool>,
}

/// Shared loading flags. Clones observe the same state.
#[derive(Debug, Clone)]
pub struct LoadingState {
    inner: Arc<Inner>,
}

impl LoadingState {
    pub fn new(visited_key: impl Into<String>, initial_load: bool) -> Self {
        let (loading, _) = watch::channel(false);
        let (initial, _) = watch::channel(initial_load);
        Self { inner: Arc::new(Inner { visited_key: visited_key.into(), loading, initial_load: initial }) }
    }

    /// Establish loading state for a page session.
    ///
    /// Returning visitors skip the initial loading screen. First-time visitors
    /// get it for `splash`, after which the visited flag is persisted and the
    /// initial load completes. An unreadable flag counts as a first visit.
    pub async fn start(db: &CacheDb, app_name: &str, splash: Duration) -> Self {
        let key = visited_key(app_name);
        let visited = match db.get_item(&key).await {
            Ok(value) => value.is_some(),
            Err(e) => {
                tracing::warn!(key = %key, "could not read visited flag: {e}");
                false
            }
        };

        let state = Self::new(key, !visited);
        if visited {
            tracing::debug!("returning visitor, skipping loading screen");
            return state;
        }

        let db = db.clone();
        let splash_state = state.clone();
        tokio::spawn(async move {
            tokio::time::sleep(splash).await;
            if splash_state.is_initial_load()
                && let Err(e) = splash_state.complete_initial_load(&db).await
            {
                tracing::warn!("could not persist visited flag: {e}");
            }
        });

        state
    }

    pub fn is_loading(&self) -> bool {
        *self.inner.loading.borrow()
    }

    pub fn is_initial_load(&self) -> bool {
        *self.inner.initial_load.borrow()
    }

    pub fn set_loading(&self, loading: bool) {
        self.inner.loading.send_if_modified(|current| std::mem::replace(current, loading) != loading);
    }

    pub fn subscribe_loading(&self) -> watch::Receiver<bool> {
        self.inner.loading.subscribe()
    }

    pub fn subscribe_initial_load(&self) -> watch::Receiver<bool> {
        self.inner.initial_load.subscribe()
    }

    /// End the initial loading screen now and remember the visitor.
    ///
    /// The screen is dismissed even if persisting the flag fails.
    pub async fn complete_initial_load(&self, db: &CacheDb) -> Result<(), Error> {
        let persisted = db.set_item(&self.inner.visited_key, "true").await;
        self.inner.initial_load.send_if_modified(|current| std::mem::replace(current, false));
        persisted
    }

    /// Run `task` with the loading flag raised.
    ///
    /// The flag stays up for at least `min_duration`. If `timeout` elapses
    /// first the flag is dropped with a warning, but `task` still runs to
    /// completion and its output is returned.
    pub async fn execute_with_loading<F, T>(&self, task: F, min_duration: Duration, timeout: Duration) -> T
    where
        F: Future<Output = T>,
    {
        let started = Instant::now();
        self.set_loading(true);

        tokio::pin!(task);
        let output = tokio::select! {
            output = &mut task => output,
            _ = tokio::time::sleep(timeout) => {
                tracing::warn!(timeout_ms = timeout.as_millis() as u64, "loading state timed out");
                self.set_loading(false);
                task.await
            }
        };

        let elapsed = started.elapsed();
        if elapsed < min_duration {
            tokio::time::sleep(min_duration - elapsed).await;
        }

        self.set_loading(false);
        output
    }
}
