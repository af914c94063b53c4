//! Per-source traffic profiles.
//!
//! The store is a sharded concurrent map. Every mutation of a profile
//! happens while holding the write lock of that profile's shard, so
//! concurrent requests from the same source are serialized and requests
//! from different sources only contend when they hash to the same shard.

use std::collections::{HashMap, VecDeque};
use std::time::Instant;
use dashmap::DashMap;
use serde::Serialize;

use crate::core::classifier::Detection;

/// Accumulated behaviour of one source
#[derive(Debug, Clone)]
pub struct TrafficProfile {
    /// Resolved source identifier
    pub source_id: String,
    /// Requests seen since `first_seen`
    pub request_count: u64,
    pub first_seen: Instant,
    pub last_seen: Instant,
    /// Hits per request path; values sum to `request_count`
    pub path_counts: HashMap<String, u64>,
    /// Distinct user agents, most recently seen last
    pub user_agents: VecDeque<String>,
    /// One-way flag, only cleared by deleting the profile
    pub suspicious: bool,
    /// Why the profile was first flagged
    pub flagged_by: Option<Detection>,
}

impl TrafficProfile {
    pub fn new(source_id: &str, now: Instant) -> Self {
        Self {
            source_id: source_id.to_string(),
            request_count: 0,
            first_seen: now,
            last_seen: now,
            path_counts: HashMap::new(),
            user_agents: VecDeque::new(),
            suspicious: false,
            flagged_by: None,
        }
    }

    /// Account for one request. `last_seen` never moves backwards.
    pub fn record_request(&mut self, path: &str, user_agent: Option<&str>, now: Instant, max_user_agents: usize) {
        self.request_count += 1;
        self.last_seen = self.last_seen.max(now);
        *self.path_counts.entry(path.to_string()).or_insert(0) += 1;

        if let Some(agent) = user_agent {
            if let Some(pos) = self.user_agents.iter().position(|seen| seen == agent) {
                if let Some(seen) = self.user_agents.remove(pos) {
                    self.user_agents.push_back(seen);
                }
            } else {
                self.user_agents.push_back(agent.to_string());
                while self.user_agents.len() > max_user_agents {
                    self.user_agents.pop_front();
                }
            }
        }
    }

    /// Set the suspicious flag, keeping the first recorded reason
    pub fn flag(&mut self, detection: Detection) {
        self.suspicious = true;
        if self.flagged_by.is_none() {
            self.flagged_by = Some(detection);
        }
    }

    pub fn distinct_paths(&self) -> usize {
        self.path_counts.len()
    }

    pub fn snapshot(&self) -> ProfileSnapshot {
        let now = Instant::now();
        ProfileSnapshot {
            source_id: self.source_id.clone(),
            request_count: self.request_count,
            distinct_paths: self.path_counts.len(),
            user_agents: self.user_agents.iter().cloned().collect(),
            suspicious: self.suspicious,
            flagged_by: self.flagged_by.clone(),
            first_seen_secs_ago: now.saturating_duration_since(self.first_seen).as_secs(),
            last_seen_secs_ago: now.saturating_duration_since(self.last_seen).as_secs(),
        }
    }
}

/// Serializable view of a profile for operators
#[derive(Debug, Clone, Serialize)]
pub struct ProfileSnapshot {
    pub source_id: String,
    pub request_count: u64,
    pub distinct_paths: usize,
    pub user_agents: Vec<String>,
    pub suspicious: bool,
    pub flagged_by: Option<Detection>,
    pub first_seen_secs_ago: u64,
    pub last_seen_secs_ago: u64,
}

/// Owner of every profile's lifetime
#[derive(Debug, Default)]
pub struct ProfileStore {
    profiles: DashMap<String, TrafficProfile>,
}

impl ProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` on the profile for `source_id`, creating it first if absent.
    ///
    /// The shard lock is held for the duration of `f`, so `f` must be short
    /// and must not touch the store again.
    pub fn update<R>(&self, source_id: &str, now: Instant, f: impl FnOnce(&mut TrafficProfile) -> R) -> R {
        let mut entry = self
            .profiles
            .entry(source_id.to_string())
            .or_insert_with(|| TrafficProfile::new(source_id, now));
        f(entry.value_mut())
    }

    /// Read a profile without creating it
    pub fn inspect<R>(&self, source_id: &str, f: impl FnOnce(&TrafficProfile) -> R) -> Option<R> {
        self.profiles.get(source_id).map(|entry| f(entry.value()))
    }

    /// Delete a profile; deleting an absent profile is a no-op
    pub fn remove(&self, source_id: &str) -> bool {
        self.profiles.remove(source_id).is_some()
    }

    /// Drop every profile idle since before `cutoff`, returning how many were dropped.
    ///
    /// The idle check runs under the shard write lock, so a profile touched
    /// after `cutoff` is always kept.
    pub fn retain_active_since(&self, cutoff: Instant) -> usize {
        let mut evicted = 0;
        self.profiles.retain(|_, profile| {
            let keep = profile.last_seen >= cutoff;
            if !keep {
                evicted += 1;
            }
            keep
        });
        evicted
    }

    /// Visit every profile under its shard read lock
    pub fn for_each(&self, mut f: impl FnMut(&TrafficProfile)) {
        for entry in self.profiles.iter() {
            f(entry.value());
        }
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_update_creates_lazily() {
        let store = ProfileStore::new();
        let now = Instant::now();
        assert!(store.inspect("10.0.0.1", |p| p.request_count).is_none());

        let count = store.update("10.0.0.1", now, |p| p.request_count);
        assert_eq!(count, 0);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_record_request_keeps_counts_consistent() {
        let now = Instant::now();
        let mut profile = TrafficProfile::new("10.0.0.1", now);
        profile.record_request("/a", Some("ua"), now, 10);
        profile.record_request("/a", None, now, 10);
        profile.record_request("/b", Some("ua"), now, 10);

        assert_eq!(profile.request_count, 3);
        assert_eq!(profile.path_counts.values().sum::<u64>(), profile.request_count);
        assert_eq!(profile.distinct_paths(), 2);
        assert_eq!(profile.user_agents.len(), 1);
    }

    #[test]
    fn test_last_seen_never_moves_backwards() {
        let start = Instant::now();
        let mut profile = TrafficProfile::new("10.0.0.1", start);
        profile.record_request("/", None, start + Duration::from_secs(5), 10);
        profile.record_request("/", None, start + Duration::from_secs(2), 10);
        assert_eq!(profile.last_seen, start + Duration::from_secs(5));
        assert!(profile.last_seen >= profile.first_seen);
    }

    #[test]
    fn test_user_agents_capped_to_most_recent() {
        let now = Instant::now();
        let mut profile = TrafficProfile::new("10.0.0.1", now);
        for i in 0..5 {
            profile.record_request("/", Some(&format!("agent-{}", i)), now, 3);
        }
        profile.record_request("/", Some("agent-2"), now, 3);

        let agents: Vec<&str> = profile.user_agents.iter().map(String::as_str).collect();
        assert_eq!(agents, vec!["agent-3", "agent-4", "agent-2"]);
    }

    #[test]
    fn test_remove_absent_is_noop() {
        let store = ProfileStore::new();
        assert!(!store.remove("10.0.0.1"));
    }

    #[test]
    fn test_concurrent_updates_lose_nothing() {
        let store = Arc::new(ProfileStore::new());
        let now = Instant::now();
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for i in 0..500 {
                        let path = format!("/p{}", (t + i) % 7);
                        store.update("10.0.0.1", now, |p| p.record_request(&path, None, now, 10));
                        store.update(&format!("10.0.1.{}", t), now, |p| p.record_request(&path, None, now, 10));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let (count, summed) = store
            .inspect("10.0.0.1", |p| (p.request_count, p.path_counts.values().sum::<u64>()))
            .unwrap();
        assert_eq!(count, 4000);
        assert_eq!(summed, 4000);
        assert_eq!(store.len(), 9);
    }
}
