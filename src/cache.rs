//! Keyed stale-while-revalidate cache for resource collections.
//!
//! Each key holds its latest snapshot in a `watch` channel. Fetches for one
//! key are coalesced behind a per-key async gate: callers that queue up behind
//! an in-flight fetch reuse its result instead of issuing their own request.
//! Every fetch is tagged with a per-key sequence number and a completion older
//! than the last applied write is dropped.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures_util::future::{join_all, BoxFuture};
use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::debug;

use crate::error::ClientError;

/// Identity of a cached collection: endpoint plus every parameter that
/// affects the result.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey {
    endpoint: String,
    params: BTreeMap<String, String>,
}

impl CacheKey {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self { endpoint: endpoint.into(), params: BTreeMap::new() }
    }

    pub fn with(mut self, name: &str, value: impl ToString) -> Self {
        self.params.insert(name.to_string(), value.to_string());
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(|s| s.as_str())
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.endpoint)?;
        for (i, (k, v)) in self.params.iter().enumerate() {
            let sep = if i == 0 { '?' } else { '&' };
            write!(f, "{}{}={}", sep, urlencoding::encode(k), urlencoding::encode(v))?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Idle,
    Loading,
    Ready,
    Error,
}

/// What a consumer sees for a key.
#[derive(Debug)]
pub struct Snapshot<V> {
    pub data: Option<Arc<V>>,
    pub status: Status,
    pub error: Option<ClientError>,
}

impl<V> Clone for Snapshot<V> {
    fn clone(&self) -> Self {
        Self { data: self.data.clone(), status: self.status, error: self.error.clone() }
    }
}

impl<V> Snapshot<V> {
    fn idle() -> Self {
        Self { data: None, status: Status::Idle, error: None }
    }

    pub fn is_loading(&self) -> bool {
        self.status == Status::Loading
    }
}

/// Events that revalidate every registered key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Focus,
    Reconnect,
}

/// How recent a fetch must be for a queued caller to reuse its outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Freshness {
    /// Any fetch finishing after the call arrived, including one in flight.
    Join,
    /// Only a fetch issued after the call arrived.
    After,
}

pub type Fetcher<V> = Arc<dyn Fn() -> BoxFuture<'static, Result<V, ClientError>> + Send + Sync>;

/// Box an async closure into a [`Fetcher`].
pub fn fetcher<V, F, Fut>(f: F) -> Fetcher<V>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<V, ClientError>> + Send + 'static,
{
    Arc::new(move || Box::pin(f()))
}

struct Entry<V> {
    tx: watch::Sender<Snapshot<V>>,
    fetcher: Option<Fetcher<V>>,
    gate: Arc<tokio::sync::Mutex<()>>,
    issued: u64,
    applied: u64,
    /// Sequence number of the most recently finished fetch.
    fetched: u64,
}

impl<V> Entry<V> {
    fn new() -> Self {
        let (tx, _rx) = watch::channel(Snapshot::idle());
        Self { tx, fetcher: None, gate: Arc::new(tokio::sync::Mutex::new(())), issued: 0, applied: 0, fetched: 0 }
    }

    fn snapshot(&self) -> Snapshot<V> {
        self.tx.borrow().clone()
    }
}

pub struct ResourceCache<V> {
    entries: Arc<Mutex<HashMap<CacheKey, Entry<V>>>>,
}

impl<V> Clone for ResourceCache<V> {
    fn clone(&self) -> Self {
        Self { entries: self.entries.clone() }
    }
}

impl<V> Default for ResourceCache<V> {
    fn default() -> Self {
        Self { entries: Arc::new(Mutex::new(HashMap::new())) }
    }
}

impl<V: Send + Sync + 'static> ResourceCache<V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `fetcher` for `key` and return its data, fetching only when
    /// nothing has been loaded yet. A call made while a fetch is in flight
    /// joins that fetch.
    pub async fn use_resource(&self, key: &CacheKey, fetcher: Fetcher<V>) -> Snapshot<V> {
        let status = {
            let mut map = self.entries.lock();
            let entry = map.entry(key.clone()).or_insert_with(Entry::new);
            entry.fetcher = Some(fetcher);
            let status = entry.tx.borrow().status;
            status
        };
        match status {
            Status::Ready | Status::Error => self.peek(key),
            Status::Idle | Status::Loading => self.revalidate(key, Freshness::Join).await,
        }
    }

    /// Force a revalidating fetch for `key` with its registered fetcher.
    ///
    /// The returned data comes from a fetch issued after this call, so a
    /// write that finished before `mutate` is reflected.
    pub async fn mutate(&self, key: &CacheKey) -> Snapshot<V> {
        self.revalidate(key, Freshness::After).await
    }

    /// Replace the data for `key` locally. Any fetch issued before this call
    /// is discarded when it completes.
    pub fn set_data(&self, key: &CacheKey, data: V) {
        let mut map = self.entries.lock();
        let entry = map.entry(key.clone()).or_insert_with(Entry::new);
        entry.issued += 1;
        entry.applied = entry.issued;
        let data = Arc::new(data);
        entry.tx.send_modify(|s| {
            s.data = Some(data);
            s.status = Status::Ready;
            s.error = None;
        });
    }

    pub fn peek(&self, key: &CacheKey) -> Snapshot<V> {
        self.entries.lock().get(key).map(|e| e.snapshot()).unwrap_or_else(Snapshot::idle)
    }

    /// Observe every state change of `key`. Dropping the receiver detaches
    /// the consumer; later completions are not delivered to it.
    pub fn subscribe(&self, key: &CacheKey) -> watch::Receiver<Snapshot<V>> {
        let mut map = self.entries.lock();
        map.entry(key.clone()).or_insert_with(Entry::new).tx.subscribe()
    }

    /// Revalidate every key that has a fetcher. Returns how many were refreshed.
    pub async fn revalidate_on(&self, trigger: Trigger) -> usize {
        let keys: Vec<CacheKey> = {
            let map = self.entries.lock();
            map.iter().filter(|(_, e)| e.fetcher.is_some()).map(|(k, _)| k.clone()).collect()
        };
        debug!(target: "cache", ?trigger, keys = keys.len(), "revalidate all");
        join_all(keys.iter().map(|k| self.revalidate(k, Freshness::After))).await;
        keys.len()
    }

    pub fn keys(&self) -> Vec<CacheKey> {
        let mut keys: Vec<CacheKey> = self.entries.lock().keys().cloned().collect();
        keys.sort();
        keys
    }

    async fn revalidate(&self, key: &CacheKey, freshness: Freshness) -> Snapshot<V> {
        let (gate, floor) = {
            let mut map = self.entries.lock();
            let entry = map.entry(key.clone()).or_insert_with(Entry::new);
            let floor = match freshness {
                Freshness::Join => entry.fetched,
                Freshness::After => entry.issued,
            };
            (entry.gate.clone(), floor)
        };
        let _turn = gate.lock().await;

        let (seq, fetch) = {
            let mut map = self.entries.lock();
            let entry = map.entry(key.clone()).or_insert_with(Entry::new);
            if entry.fetched > floor {
                // A fetch issued late enough finished while we queued; share it.
                return entry.snapshot();
            }
            let Some(fetch) = entry.fetcher.clone() else {
                return entry.snapshot();
            };
            entry.issued += 1;
            entry.tx.send_modify(|s| s.status = Status::Loading);
            (entry.issued, fetch)
        };

        debug!(target: "cache", key = %key, seq, "fetch");
        let result = fetch().await;

        let mut map = self.entries.lock();
        let entry = map.entry(key.clone()).or_insert_with(Entry::new);
        entry.fetched = seq;
        if seq < entry.applied {
            debug!(target: "cache", key = %key, seq, applied = entry.applied, "stale response dropped");
            entry.tx.send_modify(|s| {
                if s.status == Status::Loading {
                    s.status = if s.error.is_some() { Status::Error } else { Status::Ready };
                }
            });
            return entry.snapshot();
        }
        entry.applied = seq;
        match result {
            Ok(data) => {
                let data = Arc::new(data);
                entry.tx.send_modify(|s| {
                    s.data = Some(data);
                    s.status = Status::Ready;
                    s.error = None;
                });
            }
            Err(err) => {
                debug!(target: "cache", key = %key, error = %err, "fetch failed, keeping previous data");
                entry.tx.send_modify(|s| {
                    s.status = Status::Error;
                    s.error = Some(err);
                });
            }
        }
        entry.snapshot()
    }
}

#[cfg(test)]
#[path = "cache_tests.rs"]
mod cache_tests;
