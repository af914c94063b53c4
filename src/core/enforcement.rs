//! Enforcement policy.
//!
//! Turns a classification into an allow/deny decision according to the
//! configured mode and whitelists.

use serde::Serialize;

use crate::core::classifier::{Classification, Detection, DetectionRule};
use crate::models::GuardConfig;

/// Error code carried in every rejection body
pub const REJECTION_CODE: &str = "suspicious_traffic";

/// What the caller must do with a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow,
    /// Proceed, but the source was classified as suspicious
    AllowLogged(Detection),
    /// Stop processing and answer 429
    Deny {
        retry_after_secs: u64,
        detection: Detection,
    },
}

impl Decision {
    pub fn is_denied(&self) -> bool {
        matches!(self, Decision::Deny { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            Decision::Allow => "allow",
            Decision::AllowLogged(_) => "allow_logged",
            Decision::Deny { .. } => "deny",
        }
    }
}

/// JSON body of a 429 rejection
#[derive(Debug, Clone, Serialize)]
pub struct Rejection {
    pub error: &'static str,
    pub code: &'static str,
    pub reason: DetectionRule,
    pub message: &'static str,
}

impl Rejection {
    pub fn for_detection(detection: &Detection) -> Self {
        Self {
            error: "Too many requests",
            code: REJECTION_CODE,
            reason: detection.rule,
            message: "Your IP has been temporarily blocked due to suspicious activity",
        }
    }
}

/// Mode switches and whitelists
#[derive(Debug, Clone)]
pub struct EnforcementPolicy {
    enabled: bool,
    block_suspicious: bool,
    log_only: bool,
    whitelisted_ips: Vec<String>,
    whitelisted_path_prefixes: Vec<String>,
    retry_after_secs: u64,
}

impl EnforcementPolicy {
    pub fn new(config: &GuardConfig) -> Self {
        Self {
            enabled: config.enabled,
            block_suspicious: config.block_suspicious_ips,
            log_only: config.log_only,
            whitelisted_ips: config.whitelisted_ips.clone(),
            whitelisted_path_prefixes: config.whitelisted_path_prefixes.clone(),
            retry_after_secs: config.retry_after_secs,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Whitelisted sources and paths skip classification entirely
    pub fn is_exempt(&self, source_id: &str, path: &str) -> bool {
        self.whitelisted_ips.iter().any(|ip| ip == source_id)
            || self
                .whitelisted_path_prefixes
                .iter()
                .any(|prefix| path.starts_with(prefix.as_str()))
    }

    pub fn decide(&self, classification: &Classification) -> Decision {
        match classification.detection() {
            None => Decision::Allow,
            Some(detection) if self.block_suspicious && !self.log_only => Decision::Deny {
                retry_after_secs: self.retry_after_secs,
                detection: detection.clone(),
            },
            Some(detection) => Decision::AllowLogged(detection.clone()),
        }
    }
}
