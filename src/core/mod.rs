//! Core functionality for the traffic guard.
//!
//! This module contains the detection and mitigation engine:
//! address resolution, per-source profiles, classification rules,
//! enforcement, idle eviction and the administrative control plane.

pub mod resolver;
pub mod profile_store;
pub mod classifier;
pub mod enforcement;
pub mod sweeper;
pub mod control;
pub mod events;
pub mod telemetry;
pub mod guard;

pub use classifier::{Classification, Classifier, Detection, DetectionRule};
pub use control::{PathCount, SourceCount, TrafficStats};
pub use enforcement::{Decision, EnforcementPolicy, Rejection};
pub use events::{LogEventSink, SecurityEvent, SecurityEventSink};
pub use guard::TrafficGuard;
pub use profile_store::{ProfileSnapshot, ProfileStore, TrafficProfile};
pub use resolver::{resolve_client_ip, HeaderSource, UNKNOWN_SOURCE};
pub use sweeper::Sweeper;
