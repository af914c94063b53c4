//! Traffic pattern classification.
//!
//! Three independent rules run in order against a profile that has just
//! been updated with the current request: burst, path diversity (scan)
//! and bot signature. The first match wins. The burst window is anchored
//! to the profile's first request, not re-centered on each request, so a
//! source that bursts early and then slows down is not re-evaluated for
//! bursts until its profile is recreated.

use std::fmt;
use std::time::{Duration, Instant};
use serde::{Deserialize, Serialize};

use crate::core::profile_store::TrafficProfile;
use crate::models::DetectionConfig;

/// Rule that flagged a source
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DetectionRule {
    Burst,
    Scan,
    Bot,
    /// Flagged by an operator
    Manual,
}

impl DetectionRule {
    pub fn as_str(&self) -> &'static str {
        match self {
            DetectionRule::Burst => "burst",
            DetectionRule::Scan => "scan",
            DetectionRule::Bot => "bot",
            DetectionRule::Manual => "manual",
        }
    }
}

impl fmt::Display for DetectionRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A rule match with a human-readable explanation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Detection {
    pub rule: DetectionRule,
    pub detail: String,
}

impl Detection {
    pub fn new(rule: DetectionRule, detail: impl Into<String>) -> Self {
        Self {
            rule,
            detail: detail.into(),
        }
    }
}

/// Outcome of classifying one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    Clean,
    /// `fresh` is true when a rule matched on this request rather than
    /// the profile carrying an earlier flag
    Suspicious { detection: Detection, fresh: bool },
}

impl Classification {
    pub fn is_suspicious(&self) -> bool {
        matches!(self, Classification::Suspicious { .. })
    }

    pub fn detection(&self) -> Option<&Detection> {
        match self {
            Classification::Clean => None,
            Classification::Suspicious { detection, .. } => Some(detection),
        }
    }
}

/// Rule evaluator
#[derive(Debug, Clone)]
pub struct Classifier {
    burst_threshold: u64,
    burst_window: Duration,
    path_diversity_threshold: usize,
    bot_request_threshold: u64,
    bot_markers: Vec<String>,
    max_user_agents: usize,
}

impl Classifier {
    pub fn new(config: &DetectionConfig) -> Self {
        Self {
            burst_threshold: config.burst_threshold,
            burst_window: Duration::from_secs(config.burst_window_secs),
            path_diversity_threshold: config.path_diversity_threshold,
            bot_request_threshold: config.bot_request_threshold,
            bot_markers: config
                .bot_user_agents
                .iter()
                .map(|marker| marker.to_lowercase())
                .filter(|marker| !marker.is_empty())
                .collect(),
            max_user_agents: config.max_user_agents,
        }
    }

    /// Record the request on `profile`, then evaluate the rules.
    ///
    /// A profile flagged earlier stays suspicious even when no rule
    /// matches the current request.
    pub fn classify(
        &self,
        profile: &mut TrafficProfile,
        path: &str,
        user_agent: Option<&str>,
        now: Instant,
    ) -> Classification {
        profile.record_request(path, user_agent, now, self.max_user_agents);

        match self.evaluate(profile, user_agent, now) {
            Some(detection) => {
                profile.flag(detection.clone());
                Classification::Suspicious {
                    detection,
                    fresh: true,
                }
            }
            None if profile.suspicious => Classification::Suspicious {
                detection: profile
                    .flagged_by
                    .clone()
                    .unwrap_or_else(|| Detection::new(DetectionRule::Manual, "previously flagged")),
                fresh: false,
            },
            None => Classification::Clean,
        }
    }

    fn evaluate(&self, profile: &TrafficProfile, user_agent: Option<&str>, now: Instant) -> Option<Detection> {
        let since_first = now.saturating_duration_since(profile.first_seen);
        if since_first < self.burst_window && profile.request_count > self.burst_threshold {
            return Some(Detection::new(
                DetectionRule::Burst,
                format!(
                    "Burst traffic: {} requests in {}ms",
                    profile.request_count,
                    since_first.as_millis()
                ),
            ));
        }

        let distinct_paths = profile.distinct_paths();
        if distinct_paths > self.path_diversity_threshold {
            return Some(Detection::new(
                DetectionRule::Scan,
                format!("Path scanning: {} unique paths", distinct_paths),
            ));
        }

        if let Some(agent) = user_agent {
            if profile.request_count > self.bot_request_threshold && self.is_bot(agent) {
                return Some(Detection::new(
                    DetectionRule::Bot,
                    format!("Bot detected: {}", agent),
                ));
            }
        }

        None
    }

    fn is_bot(&self, user_agent: &str) -> bool {
        let lowered = user_agent.to_lowercase();
        self.bot_markers.iter().any(|marker| lowered.contains(marker.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BROWSER: &str = "Mozilla/5.0 (X11; Linux x86_64) Firefox/118.0";

    fn classifier() -> Classifier {
        Classifier::new(&DetectionConfig::default())
    }

    fn fresh_profile(now: Instant) -> TrafficProfile {
        TrafficProfile::new("203.0.113.7", now)
    }

    fn rule_of(result: &Classification) -> Option<DetectionRule> {
        result.detection().map(|d| d.rule)
    }

    #[test]
    fn test_burst_flags_on_51st_request() {
        let classifier = classifier();
        let start = Instant::now();
        let mut profile = fresh_profile(start);

        for i in 0..50 {
            let at = start + Duration::from_millis(i * 180);
            assert_eq!(classifier.classify(&mut profile, "/", Some(BROWSER), at), Classification::Clean);
        }
        let result = classifier.classify(&mut profile, "/", Some(BROWSER), start + Duration::from_secs(9));
        assert_eq!(rule_of(&result), Some(DetectionRule::Burst));
        assert!(profile.suspicious);
    }

    #[test]
    fn test_fifty_requests_in_window_never_burst() {
        let classifier = classifier();
        let start = Instant::now();
        let mut profile = fresh_profile(start);

        for _ in 0..50 {
            assert!(!classifier.classify(&mut profile, "/", None, start).is_suspicious());
        }
        assert!(!profile.suspicious);
    }

    #[test]
    fn test_burst_window_is_anchored_to_first_seen() {
        let classifier = classifier();
        let start = Instant::now();
        let mut profile = fresh_profile(start);

        classifier.classify(&mut profile, "/", None, start);
        // 100 requests packed into one second, but eleven seconds after the first request.
        for i in 0..100 {
            let at = start + Duration::from_secs(11) + Duration::from_millis(i * 10);
            assert!(!classifier.classify(&mut profile, "/", None, at).is_suspicious());
        }
    }

    #[test]
    fn test_scan_flags_on_21st_distinct_path() {
        let classifier = classifier();
        let start = Instant::now();
        let mut profile = fresh_profile(start);

        for i in 0..20 {
            let at = start + Duration::from_secs(30 + i);
            let result = classifier.classify(&mut profile, &format!("/page/{}", i), Some(BROWSER), at);
            assert!(!result.is_suspicious());
        }
        let result = classifier.classify(&mut profile, "/page/20", Some(BROWSER), start + Duration::from_secs(60));
        assert_eq!(rule_of(&result), Some(DetectionRule::Scan));
    }

    #[test]
    fn test_bot_flags_on_6th_request() {
        let classifier = classifier();
        let start = Instant::now();
        let mut profile = fresh_profile(start);

        for _ in 0..5 {
            let result = classifier.classify(&mut profile, "/", Some("python-requests/2.31"), start);
            assert!(!result.is_suspicious());
        }
        let result = classifier.classify(&mut profile, "/", Some("python-requests/2.31"), start);
        assert_eq!(rule_of(&result), Some(DetectionRule::Bot));
    }

    #[test]
    fn test_bot_markers_are_case_insensitive() {
        let classifier = classifier();
        assert!(classifier.is_bot("Googlebot/2.1"));
        assert!(classifier.is_bot("CURL/8.0"));
        assert!(!classifier.is_bot(BROWSER));
    }

    #[test]
    fn test_missing_user_agent_never_matches_bot_rule() {
        let classifier = classifier();
        let start = Instant::now();
        let mut profile = fresh_profile(start);

        for _ in 0..10 {
            assert!(!classifier.classify(&mut profile, "/", None, start).is_suspicious());
        }
    }

    #[test]
    fn test_suspicion_is_one_way() {
        let classifier = classifier();
        let start = Instant::now();
        let mut profile = fresh_profile(start);

        for _ in 0..6 {
            classifier.classify(&mut profile, "/", Some("curl/8.0"), start);
        }
        assert!(profile.suspicious);

        let later = start + Duration::from_secs(120);
        let result = classifier.classify(&mut profile, "/", Some(BROWSER), later);
        match result {
            Classification::Suspicious { detection, fresh } => {
                assert_eq!(detection.rule, DetectionRule::Bot);
                assert!(!fresh);
            }
            Classification::Clean => panic!("flag was cleared"),
        }
        assert!(profile.suspicious);
    }

    #[test]
    fn test_rules_short_circuit_in_order() {
        let classifier = classifier();
        let start = Instant::now();
        let mut profile = fresh_profile(start);

        // Burst and scan both match on the 51st request; burst is reported.
        let mut last = Classification::Clean;
        for i in 0..51 {
            last = classifier.classify(&mut profile, &format!("/p/{}", i), Some("curl/8.0"), start);
            if i == 5 {
                assert_eq!(rule_of(&last), Some(DetectionRule::Bot));
            }
        }
        assert_eq!(rule_of(&last), Some(DetectionRule::Burst));
        assert_eq!(profile.flagged_by.as_ref().map(|d| d.rule), Some(DetectionRule::Bot));
    }
}
