//! Runs a [`CacheWorker`] on its own task and hands out cloneable handles.
//!
//! Commands are received in order but each one runs on a separate task, so a
//! slow network fetch never blocks a lifecycle message.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};

use super::{ActivationReport, CacheWorker, ControlMessage, InstallReport, WorkerState};
use crate::fetch::{Request, Response};
use folio_core::Error;

const COMMAND_BUFFER: usize = 64;

type Reply<T> = oneshot::Sender<Result<T, Error>>;

enum Command {
    Install(Reply<InstallReport>),
    Activate(Reply<ActivationReport>),
    Fetch(Box<Request>, Reply<Response>),
    Message(ControlMessage, Reply<Option<ActivationReport>>),
    Retire,
}

/// Cloneable handle to a running worker.
#[derive(Clone)]
pub struct WorkerHandle {
    tx: mpsc::Sender<Command>,
    state: watch::Receiver<WorkerState>,
    cache_name: Arc<str>,
}

/// Start the worker's command loop. The loop ends when every handle is dropped.
pub fn spawn(worker: CacheWorker) -> WorkerHandle {
    let worker = Arc::new(worker);
    let (tx, mut rx) = mpsc::channel(COMMAND_BUFFER);
    let handle = WorkerHandle { tx, state: worker.subscribe(), cache_name: Arc::from(worker.cache_name()) };

    tokio::spawn(async move {
        while let Some(command) = rx.recv().await {
            let worker = Arc::clone(&worker);
            match command {
                Command::Install(reply) => {
                    tokio::spawn(async move {
                        let _ = reply.send(worker.install().await);
                    });
                }
                Command::Activate(reply) => {
                    tokio::spawn(async move {
                        let _ = reply.send(worker.activate().await);
                    });
                }
                Command::Fetch(request, reply) => {
                    tokio::spawn(async move {
                        let _ = reply.send(worker.handle_fetch(*request).await);
                    });
                }
                Command::Message(message, reply) => {
                    tokio::spawn(async move {
                        let _ = reply.send(worker.handle_message(message).await);
                    });
                }
                Command::Retire => worker.retire(),
            }
        }
        tracing::debug!(cache = %worker.cache_name(), "worker task stopped");
    });

    handle
}

impl WorkerHandle {
    pub fn cache_name(&self) -> &str {
        &self.cache_name
    }

    pub fn state(&self) -> WorkerState {
        *self.state.borrow()
    }

    pub async fn install(&self) -> Result<InstallReport, Error> {
        self.request(Command::Install).await
    }

    pub async fn activate(&self) -> Result<ActivationReport, Error> {
        self.request(Command::Activate).await
    }

    pub async fn fetch(&self, request: Request) -> Result<Response, Error> {
        self.request(|reply| Command::Fetch(Box::new(request), reply)).await
    }

    pub async fn post_message(&self, message: ControlMessage) -> Result<Option<ActivationReport>, Error> {
        self.request(|reply| Command::Message(message, reply)).await
    }

    pub async fn retire(&self) -> Result<(), Error> {
        self.tx.send(Command::Retire).await.map_err(|_| self.unavailable())
    }

    /// Wait until the worker reaches `target`.
    ///
    /// Fails if the worker goes redundant first or its task has stopped.
    pub async fn wait_for_state(&self, target: WorkerState) -> Result<(), Error> {
        let mut state = self.state.clone();
        let reached = state
            .wait_for(|s| *s == target || *s == WorkerState::Redundant)
            .await
            .map_err(|_| self.unavailable())?;
        if *reached == target {
            Ok(())
        } else {
            Err(Error::InvalidState { expected: target.to_string(), actual: reached.to_string() })
        }
    }

    async fn request<T>(&self, command: impl FnOnce(Reply<T>) -> Command) -> Result<T, Error> {
        let (reply, response) = oneshot::channel();
        self.tx.send(command(reply)).await.map_err(|_| self.unavailable())?;
        response.await.map_err(|_| self.unavailable())?
    }

    fn unavailable(&self) -> Error {
        Error::WorkerUnavailable(format!("worker for {} has stopped", self.cache_name))
    }
}

impl std::fmt::Debug for WorkerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerHandle")
            .field("cache_name", &self.cache_name)
            .field("state", &self.state())
            .finish()
    }
}
