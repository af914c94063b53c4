//! Security event records.
//!
//! Events are handed to a [`SecurityEventSink`]; the default sink writes
//! one JSON line per event under the `security` log target so the host's
//! log pipeline can route them to alerting.

use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Event severity
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

/// Event kind
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    SuspiciousTraffic,
    ManualBlock,
    ManualUnblock,
}

/// Security event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityEvent {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub severity: Severity,
    pub kind: EventKind,
    pub source_id: String,
    pub path: Option<String>,
    pub user_agent: Option<String>,
    pub reason: String,
}

impl SecurityEvent {
    pub fn new(kind: EventKind, severity: Severity, source_id: &str, reason: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            severity,
            kind,
            source_id: source_id.to_string(),
            path: None,
            user_agent: None,
            reason: reason.into(),
        }
    }

    pub fn with_request(mut self, path: &str, user_agent: Option<&str>) -> Self {
        self.path = Some(path.to_string());
        self.user_agent = Some(user_agent.unwrap_or("unknown").to_string());
        self
    }
}

/// Receiver of security events
#[cfg_attr(test, mockall::automock)]
pub trait SecurityEventSink: Send + Sync {
    fn record(&self, event: &SecurityEvent);
}

/// Writes events to the `security` log target
#[derive(Debug, Default, Clone, Copy)]
pub struct LogEventSink;

impl SecurityEventSink for LogEventSink {
    fn record(&self, event: &SecurityEvent) {
        let line = match serde_json::to_string(event) {
            Ok(line) => line,
            Err(e) => format!("{:?} (serialization failed: {})", event, e),
        };
        match event.severity {
            Severity::High => warn!(target: "security", "{}", line),
            Severity::Medium | Severity::Low => info!(target: "security", "{}", line),
        }
    }
}
