//! Client address resolution from proxy headers.
//!
//! Precedence is fixed: `cf-connecting-ip`, then the first hop of
//! `x-forwarded-for`, then `x-real-ip`, then the `unknown` sentinel.
//! These headers are only trustworthy when a controlled ingress layer
//! overwrites them; deployments without one let clients pick their own
//! source identifier.

use std::collections::HashMap;

/// Source identifier shared by every request whose address cannot be resolved
pub const UNKNOWN_SOURCE: &str = "unknown";

const CF_CONNECTING_IP: &str = "cf-connecting-ip";
const X_FORWARDED_FOR: &str = "x-forwarded-for";
const X_REAL_IP: &str = "x-real-ip";

/// Read-only, case-insensitive access to request headers
pub trait HeaderSource {
    fn header(&self, name: &str) -> Option<&str>;
}

impl HeaderSource for HashMap<String, String> {
    fn header(&self, name: &str) -> Option<&str> {
        self.iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

impl HeaderSource for actix_web::http::header::HeaderMap {
    fn header(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(|value| value.to_str().ok())
    }
}

/// Resolve the canonical source identifier for a request
pub fn resolve_client_ip<H: HeaderSource + ?Sized>(headers: &H) -> String {
    let non_empty = |value: &str| {
        let value = value.trim();
        (!value.is_empty()).then(|| value.to_string())
    };

    headers
        .header(CF_CONNECTING_IP)
        .and_then(non_empty)
        .or_else(|| {
            headers
                .header(X_FORWARDED_FOR)
                .and_then(|chain| chain.split(',').next())
                .and_then(non_empty)
        })
        .or_else(|| headers.header(X_REAL_IP).and_then(non_empty))
        .unwrap_or_else(|| UNKNOWN_SOURCE.to_string())
}
