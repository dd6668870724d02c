//! Test doubles for the network and cache store seams.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::HeaderMap;
use url::Url;

use pwa_relay_core::{CacheDb, CacheStorage, Error, RequestKey, Snapshot};

use crate::fetch::{Body, Network, Request, Response};

/// Canned answer for one URL.
#[derive(Debug, Clone)]
pub(crate) enum Reply {
    Respond { status: u16, body: Vec<u8>, final_url: Option<String> },
    Fail(String),
    /// Never resolves.
    Hang,
}

impl Reply {
    pub(crate) fn ok(body: &str) -> Self {
        Self::status(200, body)
    }

    pub(crate) fn status(status: u16, body: &str) -> Self {
        Reply::Respond { status, body: body.as_bytes().to_vec(), final_url: None }
    }

    pub(crate) fn fail(reason: &str) -> Self {
        Reply::Fail(reason.to_string())
    }

    pub(crate) fn redirected_to(self, url: &str) -> Self {
        match self {
            Reply::Respond { status, body, .. } => Reply::Respond { status, body, final_url: Some(url.to_string()) },
            other => other,
        }
    }
}

/// Network double answering from a URL → reply table.
#[derive(Default)]
pub(crate) struct MockNetwork {
    replies: Mutex<HashMap<String, Reply>>,
    calls: AtomicUsize,
}

impl MockNetwork {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with(self, url: &str, reply: Reply) -> Self {
        self.set(url, reply);
        self
    }

    pub(crate) fn set(&self, url: &str, reply: Reply) {
        let key = Url::parse(url).map(|u| u.to_string()).unwrap_or_else(|_| url.to_string());
        self.replies.lock().unwrap().insert(key, reply);
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Network for MockNetwork {
    async fn fetch(&self, request: &Request) -> Result<Response, Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let reply = self.replies.lock().unwrap().get(request.url.as_str()).cloned();

        match reply {
            Some(Reply::Respond { status, body, final_url }) => {
                let url = match final_url {
                    Some(u) => Url::parse(&u).unwrap(),
                    None => request.url.clone(),
                };
                Ok(Response::new(url, StatusCode::from_u16(status).unwrap(), HeaderMap::new(), Body::from_bytes(body)))
            }
            Some(Reply::Fail(reason)) => Err(Error::Network(reason)),
            Some(Reply::Hang) => std::future::pending().await,
            None => Err(Error::Network(format!("no route to {}", request.url))),
        }
    }
}

/// Cache store wrapper counting reads and writes, with injectable write failures.
pub(crate) struct CountingStorage {
    inner: CacheDb,
    reads: AtomicUsize,
    writes: AtomicUsize,
    fail_writes: AtomicBool,
}

impl CountingStorage {
    pub(crate) fn new(inner: CacheDb) -> Self {
        Self { inner, reads: AtomicUsize::new(0), writes: AtomicUsize::new(0), fail_writes: AtomicBool::new(false) }
    }

    pub(crate) fn inner(&self) -> &CacheDb {
        &self.inner
    }

    pub(crate) fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub(crate) fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub(crate) fn fail_writes(&self) {
        self.fail_writes.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl CacheStorage for CountingStorage {
    async fn open(&self, name: &str) -> Result<(), Error> {
        self.inner.open(name).await
    }

    async fn match_request(&self, name: &str, key: &RequestKey) -> Result<Option<Snapshot>, Error> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.match_request(name, key).await
    }

    async fn put(&self, name: &str, key: &RequestKey, snapshot: &Snapshot) -> Result<(), Error> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Error::InvalidInput("disk full".into()));
        }
        self.inner.put(name, key, snapshot).await
    }

    async fn keys(&self) -> Result<Vec<String>, Error> {
        self.inner.keys().await
    }

    async fn delete(&self, name: &str) -> Result<bool, Error> {
        self.inner.delete(name).await
    }
}
