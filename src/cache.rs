// src/cache.rs
// Normalized response cache. Guarantees: one network call per set of
// concurrent identical reads (the rest attach to the leader's pending
// result), and last-issued-wins application so a slow stale response never
// overwrites fresher data.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::Value;
use tokio::sync::{broadcast, watch};
use tracing::trace;

use crate::error::ClientError;

#[derive(Debug, Clone)]
struct CacheEntry {
    value: Value,
    stale: bool,
    applied_seq: u64,
}

/// Snapshot handed out on a cache read.
#[derive(Debug, Clone)]
pub struct CachedValue {
    pub value: Value,
    pub stale: bool,
}

/// Shared slot a pending fetch publishes into. `None` until the leader
/// completes; the final result is cloned to every attached caller.
pub type PendingResult = Option<Result<Value, ClientError>>;

/// Role assigned to a caller that wants `key` fetched.
pub enum FetchRole {
    /// This caller runs the network request and must finish with
    /// [`OperationCache::complete_fetch`].
    Leader(FetchTicket),
    /// An identical request is already in flight; await its published result.
    Follower(watch::Receiver<PendingResult>),
}

pub struct FetchTicket {
    key: String,
    seq: u64,
    publisher: watch::Sender<PendingResult>,
    registered: bool,
}

struct InFlight {
    seq: u64,
    pending: watch::Receiver<PendingResult>,
}

pub struct OperationCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
    in_flight: Mutex<HashMap<String, InFlight>>,
    /// Monotonic issue counter; results apply in issue order, not arrival
    /// order.
    issue_seq: AtomicU64,
    /// Results issued at or before this point are discarded (set on purge).
    apply_floor: AtomicU64,
    updates: broadcast::Sender<String>,
}

impl OperationCache {
    pub fn new() -> Self {
        let (updates, _) = broadcast::channel(64);
        OperationCache {
            entries: Mutex::new(HashMap::new()),
            in_flight: Mutex::new(HashMap::new()),
            issue_seq: AtomicU64::new(0),
            apply_floor: AtomicU64::new(0),
            updates,
        }
    }

    pub fn get(&self, key: &str) -> Option<CachedValue> {
        let entries = self.lock_entries();
        entries.get(key).map(|entry| CachedValue {
            value: entry.value.clone(),
            stale: entry.stale,
        })
    }

    /// Flag a key as needing revalidation, typically after a dependent
    /// mutation succeeded.
    pub fn mark_stale(&self, key: &str) {
        let mut entries = self.lock_entries();
        if let Some(entry) = entries.get_mut(key) {
            entry.stale = true;
            drop(entries);
            let _ = self.updates.send(key.to_string());
        }
    }

    /// Drop every entry. Results still in flight at purge time will not be
    /// applied, so a fresh login never sees the previous user's data. The
    /// in-flight table is dropped too: a read issued after the purge must
    /// lead its own fetch, never attach to one from the previous session.
    pub fn purge(&self) {
        self.apply_floor
            .store(self.issue_seq.load(Ordering::SeqCst), Ordering::SeqCst);
        self.lock_entries().clear();
        self.lock_in_flight().clear();
    }

    /// Notifications of changed cache keys, for readers that re-render
    /// from cache.
    pub fn updates(&self) -> broadcast::Receiver<String> {
        self.updates.subscribe()
    }

    /// Register intent to fetch `key`. The first caller becomes the leader;
    /// concurrent identical callers attach to its pending result. A `forced`
    /// fetch (mutation refetch, poll tick) always goes to the network but
    /// still registers so later identical reads can attach.
    pub fn begin_fetch(&self, key: &str, forced: bool) -> FetchRole {
        let mut in_flight = self.lock_in_flight();
        if !forced {
            if let Some(entry) = in_flight.get(key) {
                trace!(key, "attaching to in-flight request");
                return FetchRole::Follower(entry.pending.clone());
            }
        }

        let seq = self.issue_seq.fetch_add(1, Ordering::SeqCst) + 1;
        let (publisher, receiver) = watch::channel(None);
        // A forced fetch must not displace an existing registration: its
        // attached followers still hold the original receiver.
        let registered = if in_flight.contains_key(key) {
            false
        } else {
            in_flight.insert(
                key.to_string(),
                InFlight {
                    seq,
                    pending: receiver,
                },
            );
            true
        };
        FetchRole::Leader(FetchTicket {
            key: key.to_string(),
            seq,
            publisher,
            registered,
        })
    }

    /// Publish the leader's result: deregister the in-flight slot, apply the
    /// value under last-issued-wins, and wake the followers.
    pub fn complete_fetch(&self, ticket: FetchTicket, result: Result<Value, ClientError>) {
        if ticket.registered {
            let mut in_flight = self.lock_in_flight();
            // a purge may have dropped this registration and a newer fetch
            // re-registered the key; remove only our own entry
            if in_flight
                .get(&ticket.key)
                .is_some_and(|entry| entry.seq == ticket.seq)
            {
                in_flight.remove(&ticket.key);
            }
        }
        if let Ok(value) = &result {
            self.apply(&ticket.key, ticket.seq, value.clone());
        }
        let _ = ticket.publisher.send_replace(Some(result));
    }

    fn apply(&self, key: &str, seq: u64, value: Value) {
        if seq <= self.apply_floor.load(Ordering::SeqCst) {
            trace!(key, seq, "discarding result issued before cache purge");
            return;
        }
        let mut entries = self.lock_entries();
        let entry = entries.entry(key.to_string()).or_insert(CacheEntry {
            value: Value::Null,
            stale: true,
            applied_seq: 0,
        });
        if seq > entry.applied_seq {
            entry.value = value;
            entry.stale = false;
            entry.applied_seq = seq;
            drop(entries);
            let _ = self.updates.send(key.to_string());
        } else {
            trace!(key, seq, applied = entry.applied_seq, "discarding out-of-order result");
        }
    }

    fn lock_entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, CacheEntry>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_in_flight(&self) -> std::sync::MutexGuard<'_, HashMap<String, InFlight>> {
        self.in_flight.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for OperationCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn leader(role: FetchRole) -> FetchTicket {
        match role {
            FetchRole::Leader(ticket) => ticket,
            FetchRole::Follower(_) => panic!("expected leader role"),
        }
    }

    #[test]
    fn second_identical_read_attaches_to_the_first() {
        let cache = OperationCache::new();
        let ticket = leader(cache.begin_fetch("GetMe:{}", false));
        match cache.begin_fetch("GetMe:{}", false) {
            FetchRole::Follower(_) => {}
            FetchRole::Leader(_) => panic!("expected follower role"),
        }
        // a different key is unaffected
        leader(cache.begin_fetch("GetLoadTests:{}", false));
        cache.complete_fetch(ticket, Ok(json!({"me": {"id": "u1"}})));
        // after completion a new read leads again
        leader(cache.begin_fetch("GetMe:{}", false));
    }

    #[tokio::test]
    async fn followers_observe_the_leader_result() {
        let cache = OperationCache::new();
        let ticket = leader(cache.begin_fetch("k", false));
        let FetchRole::Follower(mut rx) = cache.begin_fetch("k", false) else {
            panic!("expected follower");
        };
        cache.complete_fetch(ticket, Ok(json!(42)));
        rx.changed().await.unwrap();
        let seen = rx.borrow().clone().unwrap().unwrap();
        assert_eq!(seen, json!(42));
    }

    #[test]
    fn last_issued_wins_over_late_arrivals() {
        let cache = OperationCache::new();
        // A issued first, B issued second, B resolves first.
        let a = leader(cache.begin_fetch("k", false));
        let b = leader(cache.begin_fetch("k", true));
        cache.complete_fetch(b, Ok(json!("fresh")));
        cache.complete_fetch(a, Ok(json!("stale")));
        assert_eq!(cache.get("k").unwrap().value, json!("fresh"));
    }

    #[test]
    fn in_order_arrivals_apply_normally() {
        let cache = OperationCache::new();
        let a = leader(cache.begin_fetch("k", false));
        cache.complete_fetch(a, Ok(json!("first")));
        let b = leader(cache.begin_fetch("k", true));
        cache.complete_fetch(b, Ok(json!("second")));
        assert_eq!(cache.get("k").unwrap().value, json!("second"));
    }

    #[test]
    fn purge_empties_the_cache_and_blocks_late_results() {
        let cache = OperationCache::new();
        let a = leader(cache.begin_fetch("k", false));
        cache.complete_fetch(a, Ok(json!("before")));
        assert!(cache.get("k").is_some());

        let late = leader(cache.begin_fetch("k2", false));
        cache.purge();
        assert!(cache.get("k").is_none());

        // issued before the purge, resolved after: must not repopulate
        cache.complete_fetch(late, Ok(json!("zombie")));
        assert!(cache.get("k2").is_none());
    }

    #[test]
    fn purge_detaches_in_flight_fetches() {
        let cache = OperationCache::new();
        let old = leader(cache.begin_fetch("k", false));
        cache.purge();

        // a read issued after the purge leads its own fetch instead of
        // attaching to the previous session's request
        let new = leader(cache.begin_fetch("k", false));

        // the pre-purge fetch neither applies nor displaces the new
        // registration when it finally resolves
        cache.complete_fetch(old, Ok(json!("old")));
        assert!(cache.get("k").is_none());
        match cache.begin_fetch("k", false) {
            FetchRole::Follower(_) => {}
            FetchRole::Leader(_) => panic!("expected follower role"),
        }

        cache.complete_fetch(new, Ok(json!("new")));
        assert_eq!(cache.get("k").unwrap().value, json!("new"));
    }

    #[test]
    fn mark_stale_flags_without_dropping_the_value() {
        let cache = OperationCache::new();
        let a = leader(cache.begin_fetch("k", false));
        cache.complete_fetch(a, Ok(json!("v")));
        assert!(!cache.get("k").unwrap().stale);

        cache.mark_stale("k");
        let cached = cache.get("k").unwrap();
        assert!(cached.stale);
        assert_eq!(cached.value, json!("v"));
    }

    #[test]
    fn failed_fetch_does_not_populate_the_cache() {
        let cache = OperationCache::new();
        let a = leader(cache.begin_fetch("k", false));
        cache.complete_fetch(a, Err(ClientError::transport("boom")));
        assert!(cache.get("k").is_none());
    }
}
