//! Administrative control plane.
//!
//! Manual block/unblock and the statistics snapshot. All operations are
//! idempotent and never fail on a missing profile.

use std::cmp::Reverse;
use std::collections::HashMap;
use std::time::Instant;
use serde::{Deserialize, Serialize};

use crate::core::classifier::{Detection, DetectionRule};
use crate::core::events::{EventKind, SecurityEvent, Severity};
use crate::core::guard::TrafficGuard;

const TOP_N: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathCount {
    pub path: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceCount {
    pub ip: String,
    pub count: u64,
}

/// Aggregated view of the profile store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrafficStats {
    pub total_sources: usize,
    pub suspicious_sources: usize,
    pub top_paths: Vec<PathCount>,
    pub top_sources: Vec<SourceCount>,
}

impl TrafficGuard {
    /// Flag a source, creating an empty profile if it has none
    pub fn block_ip(&self, source_id: &str, reason: &str) {
        let now = Instant::now();
        self.store.update(source_id, now, |profile| {
            profile.flag(Detection::new(DetectionRule::Manual, reason));
        });
        self.events.record(&SecurityEvent::new(
            EventKind::ManualBlock,
            Severity::High,
            source_id,
            reason,
        ));
    }

    /// Forget a source entirely, including its request history
    pub fn unblock_ip(&self, source_id: &str) {
        self.store.remove(source_id);
        self.events.record(&SecurityEvent::new(
            EventKind::ManualUnblock,
            Severity::Low,
            source_id,
            "manual unblock",
        ));
    }

    pub fn is_blocked(&self, source_id: &str) -> bool {
        self.store
            .inspect(source_id, |profile| profile.suspicious)
            .unwrap_or(false)
    }

    pub fn stats(&self) -> TrafficStats {
        let mut total_sources = 0;
        let mut suspicious_sources = 0;
        let mut path_totals: HashMap<String, u64> = HashMap::new();
        let mut sources = Vec::new();

        self.store.for_each(|profile| {
            total_sources += 1;
            if profile.suspicious {
                suspicious_sources += 1;
            }
            for (path, count) in &profile.path_counts {
                *path_totals.entry(path.clone()).or_insert(0) += count;
            }
            sources.push(SourceCount {
                ip: profile.source_id.clone(),
                count: profile.request_count,
            });
        });

        let mut top_paths: Vec<PathCount> = path_totals
            .into_iter()
            .map(|(path, count)| PathCount { path, count })
            .collect();
        top_paths.sort_by_key(|p| (Reverse(p.count), p.path.clone()));
        top_paths.truncate(TOP_N);

        sources.sort_by_key(|s| (Reverse(s.count), s.ip.clone()));
        sources.truncate(TOP_N);

        TrafficStats {
            total_sources,
            suspicious_sources,
            top_paths,
            top_sources: sources,
        }
    }
}
