//! Client side of folio.
//!
//! This crate provides the network layer and the offline cache worker that
//! sits between the page and the network, shared by the server.

pub mod fetch;
pub mod worker;

#[cfg(test)]
pub(crate) mod testing;

pub use fetch::{FetchConfig, HttpNetwork, Network, Request, Response, ResponseSource, ResponseType};
pub use worker::{
    CacheWorker, ControlMessage, Registration, RegistrationStatus, WorkerConfig, WorkerHandle, WorkerState,
    WorkerStatus,
};
