//! TTL cache with a single-flight guard over shared fetches.
//!
//! Values are stored as JSON so one cache serves every response shape.
//! Freshness is strict: an entry whose age equals its TTL is already
//! stale. Callers pick a TTL per entry or fall back to the cache-wide
//! default. Concurrent fetches for the same key collapse onto one producer;
//! every waiter receives the producer's outcome, success or failure, and
//! a failed fetch caches nothing.

use crate::clock::Clock;
use outdial_core::{OutdialError, OutdialResult, SyncError, Timestamp};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tokio::sync::watch;

type SharedOutcome = Option<Result<serde_json::Value, OutdialError>>;

#[derive(Debug, Clone)]
struct CacheEntry {
    value: serde_json::Value,
    expires_at: Timestamp,
}

enum Role {
    Leader(watch::Sender<SharedOutcome>),
    Follower(watch::Receiver<SharedOutcome>),
}

pub struct SyncCache {
    clock: Arc<dyn Clock>,
    default_ttl: Duration,
    entries: RwLock<HashMap<String, CacheEntry>>,
    // Keyed by cache key; the entry is removed before the outcome is
    // broadcast so late arrivals start a fresh fetch instead of joining
    // a settled one. Never held across an await.
    inflight: Mutex<HashMap<String, watch::Receiver<SharedOutcome>>>,
}

impl SyncCache {
    pub fn new(clock: Arc<dyn Clock>, default_ttl: Duration) -> Self {
        Self {
            clock,
            default_ttl,
            entries: RwLock::new(HashMap::new()),
            inflight: Mutex::new(HashMap::new()),
        }
    }

    /// TTL applied when a caller does not pick one per entry.
    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Fetch a fresh entry, decoded into `T`. Stale or absent gives `None`.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let now = self.clock.now();
        let entries = self.entries.read().ok()?;
        let entry = entries.get(key)?;
        if now >= entry.expires_at {
            return None;
        }
        match serde_json::from_value(entry.value.clone()) {
            Ok(value) => Some(value),
            Err(err) => {
                tracing::debug!(key, error = %err, "cached value failed to decode, treating as miss");
                None
            }
        }
    }

    /// Store a value under `key` with the given TTL.
    pub fn set<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) -> OutdialResult<()> {
        let json = serde_json::to_value(value).map_err(|e| SyncError::Encode {
            key: key.to_string(),
            reason: e.to_string(),
        })?;
        self.insert(key, json, ttl);
        Ok(())
    }

    /// [`set`](Self::set) with the cache-wide default TTL.
    pub fn set_default<T: Serialize>(&self, key: &str, value: &T) -> OutdialResult<()> {
        self.set(key, value, self.default_ttl)
    }

    /// Drop one entry. Returns whether anything was removed.
    pub fn invalidate(&self, key: &str) -> bool {
        match self.entries.write() {
            Ok(mut entries) => entries.remove(key).is_some(),
            Err(_) => false,
        }
    }

    /// Number of stored entries, fresh or stale.
    pub fn len(&self) -> usize {
        self.entries.read().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every entry whose key starts with `prefix`. Returns the count.
    pub fn invalidate_prefix(&self, prefix: &str) -> usize {
        match self.entries.write() {
            Ok(mut entries) => {
                let before = entries.len();
                entries.retain(|key, _| !key.starts_with(prefix));
                before - entries.len()
            }
            Err(_) => 0,
        }
    }

    /// Read-through fetch with single-flight collapsing.
    ///
    /// A fresh cached value returns immediately. Otherwise the first caller
    /// becomes the producer and runs `producer`; callers arriving while it
    /// is in flight wait for its outcome instead of issuing their own
    /// request. Only a successful outcome is cached.
    pub async fn fetch<T, F, Fut>(&self, key: &str, ttl: Duration, producer: F) -> OutdialResult<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = OutdialResult<T>>,
    {
        if let Some(hit) = self.get::<T>(key) {
            return Ok(hit);
        }

        let role = {
            let mut inflight = lock_unpoisoned(&self.inflight);
            match inflight.get(key) {
                Some(rx) => Role::Follower(rx.clone()),
                None => {
                    let (tx, rx) = watch::channel(None);
                    inflight.insert(key.to_string(), rx);
                    Role::Leader(tx)
                }
            }
        };

        match role {
            Role::Leader(tx) => self.lead(key, ttl, producer, tx).await,
            Role::Follower(rx) => follow(key, rx).await,
        }
    }

    /// [`fetch`](Self::fetch) with the cache-wide default TTL.
    pub async fn fetch_default<T, F, Fut>(&self, key: &str, producer: F) -> OutdialResult<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = OutdialResult<T>>,
    {
        self.fetch(key, self.default_ttl, producer).await
    }

    async fn lead<T, F, Fut>(
        &self,
        key: &str,
        ttl: Duration,
        producer: F,
        tx: watch::Sender<SharedOutcome>,
    ) -> OutdialResult<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = OutdialResult<T>>,
    {
        // Deregisters the flight even if the producer panics or this
        // future is dropped mid-await; waiters then see a closed channel
        // instead of joining a flight that can never settle.
        let guard = FlightGuard { cache: self, key };
        let result = producer().await;

        let broadcast = match &result {
            Ok(value) => match serde_json::to_value(value) {
                Ok(json) => {
                    self.insert(key, json.clone(), ttl);
                    Ok(json)
                }
                Err(err) => Err(OutdialError::from(SyncError::Encode {
                    key: key.to_string(),
                    reason: err.to_string(),
                })),
            },
            Err(err) => Err(err.clone()),
        };

        // Remove before broadcasting so a caller observing the settled
        // outcome can never find the same flight still registered.
        drop(guard);
        let _ = tx.send(Some(broadcast));

        result
    }

    fn insert(&self, key: &str, value: serde_json::Value, ttl: Duration) {
        let expires_at = self.clock.now() + chrono_ttl(ttl);
        if let Ok(mut entries) = self.entries.write() {
            entries.insert(key.to_string(), CacheEntry { value, expires_at });
        }
    }
}

struct FlightGuard<'a> {
    cache: &'a SyncCache,
    key: &'a str,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        lock_unpoisoned(&self.cache.inflight).remove(self.key);
    }
}

fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

async fn follow<T: DeserializeOwned>(
    key: &str,
    mut rx: watch::Receiver<SharedOutcome>,
) -> OutdialResult<T> {
    loop {
        let settled = rx.borrow_and_update().clone();
        if let Some(outcome) = settled {
            return match outcome {
                Ok(json) => serde_json::from_value(json).map_err(|e| {
                    SyncError::Encode {
                        key: key.to_string(),
                        reason: e.to_string(),
                    }
                    .into()
                }),
                Err(err) => Err(err),
            };
        }
        if rx.changed().await.is_err() {
            return Err(SyncError::SingleFlightFailed {
                key: key.to_string(),
                reason: "producer dropped without settling".to_string(),
            }
            .into());
        }
    }
}

fn chrono_ttl(ttl: Duration) -> chrono::Duration {
    chrono::Duration::milliseconds(ttl.as_millis().min(i64::MAX as u128) as i64)
}

// ============================================================================
// TESTS
// ============================================================================
