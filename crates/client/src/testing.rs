//! In-memory network for worker tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{StatusCode, Url};
use tokio::sync::Notify;

use crate::fetch::{Network, Request, Response, ResponseSource, ResponseType, is_same_origin};
use folio_core::Error;

pub const ORIGIN: &str = "https://folio.example/";

struct Route {
    status: StatusCode,
    content_type: &'static str,
    body: Bytes,
}

/// Holds a request at the network until released.
#[derive(Default)]
pub struct Gate {
    /// Signalled once the request reaches the network.
    pub arrived: Notify,
    /// Let the held request complete.
    pub release: Notify,
}

/// Serves canned routes, records every call, and can be switched offline.
pub struct MockNetwork {
    origin: Url,
    routes: Mutex<HashMap<String, Route>>,
    gates: Mutex<HashMap<String, Arc<Gate>>>,
    calls: Mutex<Vec<String>>,
    offline: AtomicBool,
}

impl MockNetwork {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            origin: Url::parse(ORIGIN).unwrap(),
            routes: Mutex::new(HashMap::new()),
            gates: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            offline: AtomicBool::new(false),
        })
    }

    pub fn route(&self, url: &str, status: u16, content_type: &'static str, body: &str) {
        let route =
            Route { status: StatusCode::from_u16(status).unwrap(), content_type, body: Bytes::from(body.to_string()) };
        self.routes.lock().unwrap().insert(Url::parse(url).unwrap().to_string(), route);
    }

    /// Hold every request for `url` until the returned gate is released.
    pub fn gate(&self, url: &str) -> Arc<Gate> {
        let gate = Arc::new(Gate::default());
        self.gates.lock().unwrap().insert(Url::parse(url).unwrap().to_string(), Arc::clone(&gate));
        gate
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn calls_to(&self, url: &str) -> usize {
        let url = Url::parse(url).unwrap().to_string();
        self.calls.lock().unwrap().iter().filter(|c| **c == url).count()
    }
}

#[async_trait]
impl Network for MockNetwork {
    async fn fetch(&self, request: &Request) -> Result<Response, Error> {
        self.calls.lock().unwrap().push(request.url.to_string());
        let gate = self.gates.lock().unwrap().get(request.url.as_str()).cloned();
        if let Some(gate) = gate {
            gate.arrived.notify_one();
            gate.release.notified().await;
        }
        if self.offline.load(Ordering::SeqCst) {
            return Err(Error::Network(format!("{}: offline", request.url)));
        }

        let response_type =
            if is_same_origin(&request.url, &self.origin) { ResponseType::Basic } else { ResponseType::Cors };
        let routes = self.routes.lock().unwrap();
        let (status, content_type, body) = match routes.get(request.url.as_str()) {
            Some(route) => (route.status, route.content_type, route.body.clone()),
            None => (StatusCode::NOT_FOUND, "text/plain", Bytes::from_static(b"not found")),
        };

        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
        Ok(Response {
            url: request.url.clone(),
            status,
            response_type,
            headers,
            body,
            source: ResponseSource::Network,
        })
    }
}
