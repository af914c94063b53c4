use serde::{Deserialize, Serialize};

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

/// Enforcement configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardConfig {
    /// Global kill switch; when false every request passes untouched
    pub enabled: bool,
    /// Reject requests from suspicious sources
    pub block_suspicious_ips: bool,
    /// Record security events but never reject
    pub log_only: bool,
    /// Sources that bypass classification entirely
    pub whitelisted_ips: Vec<String>,
    /// Path prefixes that bypass classification entirely
    pub whitelisted_path_prefixes: Vec<String>,
    /// Value of the `Retry-After` header on rejection
    pub retry_after_secs: u64,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            block_suspicious_ips: true,
            log_only: false,
            whitelisted_ips: Vec::new(),
            whitelisted_path_prefixes: vec!["/api/health".to_string(), "/api/status".to_string()],
            retry_after_secs: 3600,
        }
    }
}

/// Classification thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Requests allowed inside the burst window before a source is flagged
    pub burst_threshold: u64,
    /// Burst window, measured from the first request of a profile
    pub burst_window_secs: u64,
    /// Distinct paths allowed before a source is flagged as scanning
    pub path_diversity_threshold: usize,
    /// Requests a bot-looking client may make before it is flagged
    pub bot_request_threshold: u64,
    /// Case-insensitive user-agent markers of automation tools
    pub bot_user_agents: Vec<String>,
    /// Maximum number of distinct user agents remembered per profile
    pub max_user_agents: usize,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            burst_threshold: 50,
            burst_window_secs: 10,
            path_diversity_threshold: 20,
            bot_request_threshold: 5,
            bot_user_agents: [
                "curl",
                "wget",
                "python-requests",
                "go-http-client",
                "scrapy",
                "bot",
                "crawler",
                "spider",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            max_user_agents: 50,
        }
    }
}

/// Idle profile reclamation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SweeperConfig {
    /// Profiles idle for longer than this are evicted
    pub retention_secs: u64,
    /// Fraction of requests that trigger an inline sweep
    pub sample_rate: f64,
    /// Period of the background sweep; 0 disables it
    pub interval_secs: u64,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            retention_secs: 3600,
            sample_rate: 0.01,
            interval_secs: 60,
        }
    }
}

/// Administrative API configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Bearer token for the admin endpoints; empty disables them
    pub api_key: String,
}

/// Monitoring configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    /// Whether to expose Prometheus metrics
    pub metrics_enabled: bool,
    /// Metrics listener address
    pub metrics_address: String,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9000".to_string(),
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Server configuration
    pub server: ServerConfig,
    /// Enforcement configuration
    pub guard: GuardConfig,
    /// Classification thresholds
    pub detection: DetectionConfig,
    /// Sweeper configuration
    pub sweeper: SweeperConfig,
    /// Admin API configuration
    pub admin: AdminConfig,
    /// Monitoring configuration
    pub monitoring: MonitoringConfig,
}
