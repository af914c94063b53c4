//! Per-request traffic guard.
//!
//! ```text
//! request headers → resolver (source id)
//!     → enforcement (kill switch, whitelists)
//!     → profile store (get or create, shard-locked)
//!         → classifier (update profile, evaluate rules)
//!     → enforcement (allow / allow-logged / deny)
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};
use log::debug;

use crate::core::classifier::{Classification, Classifier};
use crate::core::enforcement::{Decision, EnforcementPolicy};
use crate::core::events::{EventKind, LogEventSink, SecurityEvent, SecurityEventSink, Severity};
use crate::core::profile_store::{ProfileSnapshot, ProfileStore};
use crate::core::resolver::{resolve_client_ip, HeaderSource};
use crate::core::sweeper::Sweeper;
use crate::core::telemetry;
use crate::models::Config;

/// Detector and mitigator shared by every request handler
pub struct TrafficGuard {
    pub(crate) store: Arc<ProfileStore>,
    classifier: Classifier,
    policy: EnforcementPolicy,
    sweeper: Sweeper,
    sweep_interval: Option<Duration>,
    pub(crate) events: Arc<dyn SecurityEventSink>,
}

impl TrafficGuard {
    pub fn new(config: &Config) -> Self {
        let sweep_interval =
            (config.sweeper.interval_secs > 0).then(|| Duration::from_secs(config.sweeper.interval_secs));
        Self {
            store: Arc::new(ProfileStore::new()),
            classifier: Classifier::new(&config.detection),
            policy: EnforcementPolicy::new(&config.guard),
            sweeper: Sweeper::new(&config.sweeper),
            sweep_interval,
            events: Arc::new(LogEventSink),
        }
    }

    /// Replace the default log sink
    pub fn with_event_sink(mut self, sink: Arc<dyn SecurityEventSink>) -> Self {
        self.events = sink;
        self
    }

    /// Decide what to do with a request. The method is accepted for future
    /// rules and currently ignored.
    pub fn check<H: HeaderSource + ?Sized>(&self, method: &str, path: &str, headers: &H) -> Decision {
        self.check_at(method, path, headers, Instant::now())
    }

    pub fn check_at<H: HeaderSource + ?Sized>(
        &self,
        _method: &str,
        path: &str,
        headers: &H,
        now: Instant,
    ) -> Decision {
        if !self.policy.is_enabled() {
            return Decision::Allow;
        }

        self.sweeper.maybe_sweep(&self.store, now);

        let source_id = resolve_client_ip(headers);
        if self.policy.is_exempt(&source_id, path) {
            telemetry::record_decision("exempt");
            return Decision::Allow;
        }

        let user_agent = headers
            .header("user-agent")
            .filter(|agent| !agent.trim().is_empty());
        let classification = self.store.update(&source_id, now, |profile| {
            self.classifier.classify(profile, path, user_agent, now)
        });

        if let Classification::Suspicious { detection, fresh } = &classification {
            if *fresh {
                telemetry::record_flagged(detection.rule);
            }
            self.events.record(
                &SecurityEvent::new(
                    EventKind::SuspiciousTraffic,
                    Severity::High,
                    &source_id,
                    detection.detail.as_str(),
                )
                .with_request(path, user_agent),
            );
        }

        let decision = self.policy.decide(&classification);
        telemetry::record_decision(decision.label());
        if let Decision::Deny { detection, .. } = &decision {
            debug!("Denied {} {} ({})", source_id, path, detection.rule);
        }
        decision
    }

    /// Read-only view of one source's profile
    pub fn profile(&self, source_id: &str) -> Option<ProfileSnapshot> {
        self.store.inspect(source_id, |profile| profile.snapshot())
    }

    /// Run an eviction pass now
    pub fn sweep(&self) -> usize {
        self.sweeper.sweep(&self.store, Instant::now())
    }

    /// Start the background sweeper if an interval is configured
    pub fn spawn_sweeper(&self) -> Option<tokio::task::JoinHandle<()>> {
        self.sweep_interval
            .map(|period| self.sweeper.clone().spawn_periodic(Arc::clone(&self.store), period))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use crate::core::classifier::DetectionRule;
    use crate::core::events::MockSecurityEventSink;

    fn headers(ip: &str, user_agent: &str) -> HashMap<String, String> {
        HashMap::from([
            ("x-forwarded-for".to_string(), ip.to_string()),
            ("user-agent".to_string(), user_agent.to_string()),
        ])
    }

    fn quiet_config() -> Config {
        let mut config = Config::default();
        config.sweeper.sample_rate = 0.0;
        config
    }

    #[test]
    fn test_burst_is_denied_with_retry_hint() {
        let guard = TrafficGuard::new(&quiet_config());
        let h = headers("198.51.100.10", "Mozilla/5.0");
        let start = Instant::now();

        for _ in 0..50 {
            assert_eq!(guard.check_at("GET", "/", &h, start), Decision::Allow);
        }
        match guard.check_at("GET", "/", &h, start + Duration::from_secs(1)) {
            Decision::Deny { retry_after_secs, detection } => {
                assert_eq!(retry_after_secs, 3600);
                assert_eq!(detection.rule, DetectionRule::Burst);
            }
            other => panic!("expected deny, got {:?}", other),
        }
    }

    #[test]
    fn test_whitelisted_source_never_flagged() {
        let mut config = quiet_config();
        config.guard.whitelisted_ips = vec!["198.51.100.20".to_string()];
        let guard = TrafficGuard::new(&config);
        let h = headers("198.51.100.20", "curl/8.0");
        let start = Instant::now();

        for i in 0..100 {
            let at = start + Duration::from_millis(i * 10);
            assert_eq!(guard.check_at("GET", &format!("/p/{}", i), &h, at), Decision::Allow);
        }
        assert!(guard.profile("198.51.100.20").is_none());
    }

    #[test]
    fn test_whitelisted_path_skips_profile() {
        let guard = TrafficGuard::new(&quiet_config());
        let h = headers("198.51.100.21", "curl/8.0");
        for _ in 0..20 {
            assert_eq!(guard.check("GET", "/api/health", &h), Decision::Allow);
        }
        assert!(guard.profile("198.51.100.21").is_none());
    }

    #[test]
    fn test_disabled_guard_allows_everything() {
        let mut config = quiet_config();
        config.guard.enabled = false;
        let guard = TrafficGuard::new(&config);
        let h = headers("198.51.100.22", "python-requests/2.31");
        for _ in 0..100 {
            assert_eq!(guard.check("GET", "/", &h), Decision::Allow);
        }
        assert!(guard.profile("198.51.100.22").is_none());
    }

    #[test]
    fn test_log_only_emits_event_and_allows() {
        let mut config = quiet_config();
        config.guard.log_only = true;

        let mut sink = MockSecurityEventSink::new();
        sink.expect_record()
            .withf(|event: &SecurityEvent| {
                event.kind == EventKind::SuspiciousTraffic
                    && event.severity == Severity::High
                    && event.source_id == "198.51.100.23"
                    && event.user_agent.as_deref() == Some("Scrapy/2.11")
            })
            .times(1)
            .return_const(());

        let guard = TrafficGuard::new(&config).with_event_sink(Arc::new(sink));
        let h = headers("198.51.100.23", "Scrapy/2.11");
        let now = Instant::now();
        for _ in 0..5 {
            assert_eq!(guard.check_at("GET", "/", &h, now), Decision::Allow);
        }
        assert!(matches!(guard.check_at("GET", "/", &h, now), Decision::AllowLogged(_)));
    }

    #[test]
    fn test_unknown_sources_share_a_profile() {
        let guard = TrafficGuard::new(&quiet_config());
        let empty: HashMap<String, String> = HashMap::new();
        guard.check("GET", "/a", &empty);
        guard.check("GET", "/b", &empty);
        assert_eq!(guard.profile("unknown").map(|p| p.request_count), Some(2));
    }

    #[test]
    fn test_spawn_sweeper_respects_disabled_interval() {
        let mut config = quiet_config();
        config.sweeper.interval_secs = 0;
        assert!(TrafficGuard::new(&config).spawn_sweeper().is_none());
    }

    #[test]
    fn test_empty_user_agent_is_treated_as_missing() {
        let mut config = quiet_config();
        config.guard.log_only = true;

        let mut sink = MockSecurityEventSink::new();
        sink.expect_record()
            .withf(|event: &SecurityEvent| event.user_agent.as_deref() == Some("unknown"))
            .times(1)
            .return_const(());

        let guard = TrafficGuard::new(&config).with_event_sink(Arc::new(sink));
        let h = headers("198.51.100.24", "  ");
        let now = Instant::now();
        for i in 0..21 {
            guard.check_at("GET", &format!("/item/{}", i), &h, now);
        }

        let profile = guard.profile("198.51.100.24").unwrap();
        assert!(profile.user_agents.is_empty());
    }
}
