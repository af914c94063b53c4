//! Traffic Guard
//!
//! Request-time traffic anomaly detection and mitigation for HTTP
//! applications. Profiles each client address, flags bursts, endpoint
//! scanning and automation clients, and rejects flagged sources with a
//! retry hint.

pub mod api;
pub mod config;
pub mod core;
pub mod models;
