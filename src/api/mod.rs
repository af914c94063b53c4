//! API endpoints for the traffic guard.
//!
//! This module provides HTTP endpoints for interacting with the service,
//! including the per-request decision check and the operator endpoints.

pub mod middleware;

use std::collections::HashMap;
use std::sync::Arc;
use actix_web::{http::header, http::StatusCode, web, HttpRequest, HttpResponse, Responder, ResponseError};
use constant_time_eq::constant_time_eq;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::{Decision, Rejection, TrafficGuard, TrafficStats};
use crate::models::AdminConfig;

pub struct ApiState {
    pub guard: Arc<TrafficGuard>,
    pub admin: AdminConfig,
}

/// Errors returned by the HTTP surface
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Missing or invalid admin credentials")]
    Unauthorized,
    #[error("Admin API is disabled")]
    AdminDisabled,
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::AdminDisabled => StatusCode::FORBIDDEN,
            ApiError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let error = match self {
            ApiError::Unauthorized => "unauthorized",
            ApiError::AdminDisabled => "admin_disabled",
            ApiError::InvalidRequest(_) => "invalid_request",
        };
        HttpResponse::build(self.status_code()).json(ErrorBody {
            error,
            message: self.to_string(),
        })
    }
}

/// API configuration function for Actix-web
pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .service(web::resource("/health").route(web::get().to(health_check)))
            .service(web::resource("/check").route(web::post().to(check_request)))
            .service(
                web::scope("/admin")
                    .service(web::resource("/block").route(web::post().to(block_ip)))
                    .service(web::resource("/unblock").route(web::post().to(unblock_ip)))
                    .service(web::resource("/blocked/{ip}").route(web::get().to(is_blocked)))
                    .service(web::resource("/stats").route(web::get().to(stats))),
            ),
    );
}

/// Build the 429 response for a deny decision, or `None` if the request may proceed
pub fn rejection_response(decision: &Decision) -> Option<HttpResponse> {
    match decision {
        Decision::Deny {
            retry_after_secs,
            detection,
        } => Some(
            HttpResponse::TooManyRequests()
                .insert_header((header::RETRY_AFTER, retry_after_secs.to_string()))
                .json(Rejection::for_detection(detection)),
        ),
        Decision::Allow | Decision::AllowLogged(_) => None,
    }
}

/// Health check endpoint response
#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

/// Request description forwarded by a proxy for a decision
#[derive(Debug, Serialize, Deserialize)]
pub struct CheckRequest {
    #[serde(default = "default_method")]
    pub method: String,
    pub path: String,
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

fn default_method() -> String {
    "GET".to_string()
}

/// Decision check response for allowed requests
#[derive(Serialize)]
struct CheckResponse {
    allowed: bool,
    logged: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BlockRequest {
    pub ip: String,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UnblockRequest {
    pub ip: String,
}

#[derive(Serialize)]
struct BlockStatus {
    ip: String,
    blocked: bool,
}

/// Health check endpoint
async fn health_check() -> impl Responder {
    HttpResponse::Ok().json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Decision check endpoint
async fn check_request(
    state: web::Data<ApiState>,
    req: web::Json<CheckRequest>,
) -> Result<HttpResponse, ApiError> {
    if !req.path.starts_with('/') {
        return Err(ApiError::InvalidRequest("path must start with '/'".to_string()));
    }

    let decision = state.guard.check(&req.method, &req.path, &req.headers);
    Ok(rejection_response(&decision).unwrap_or_else(|| {
        HttpResponse::Ok().json(CheckResponse {
            allowed: true,
            logged: matches!(decision, Decision::AllowLogged(_)),
        })
    }))
}

fn authorize(req: &HttpRequest, admin: &AdminConfig) -> Result<(), ApiError> {
    if admin.api_key.is_empty() {
        return Err(ApiError::AdminDisabled);
    }

    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));
    match token {
        Some(token) if constant_time_eq(token.as_bytes(), admin.api_key.as_bytes()) => Ok(()),
        _ => Err(ApiError::Unauthorized),
    }
}

fn validate_ip(ip: &str) -> Result<&str, ApiError> {
    let ip = ip.trim();
    if ip.is_empty() {
        return Err(ApiError::InvalidRequest("ip must not be empty".to_string()));
    }
    Ok(ip)
}

async fn block_ip(
    http: HttpRequest,
    state: web::Data<ApiState>,
    req: web::Json<BlockRequest>,
) -> Result<HttpResponse, ApiError> {
    authorize(&http, &state.admin)?;
    let ip = validate_ip(&req.ip)?;
    let reason = req.reason.as_deref().unwrap_or("manual block");

    state.guard.block_ip(ip, reason);
    Ok(HttpResponse::Ok().json(BlockStatus {
        ip: ip.to_string(),
        blocked: true,
    }))
}

async fn unblock_ip(
    http: HttpRequest,
    state: web::Data<ApiState>,
    req: web::Json<UnblockRequest>,
) -> Result<HttpResponse, ApiError> {
    authorize(&http, &state.admin)?;
    let ip = validate_ip(&req.ip)?;

    state.guard.unblock_ip(ip);
    Ok(HttpResponse::Ok().json(BlockStatus {
        ip: ip.to_string(),
        blocked: false,
    }))
}

async fn is_blocked(
    http: HttpRequest,
    state: web::Data<ApiState>,
    ip: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    authorize(&http, &state.admin)?;
    let ip = ip.into_inner();

    Ok(HttpResponse::Ok().json(BlockStatus {
        blocked: state.guard.is_blocked(&ip),
        ip,
    }))
}

async fn stats(
    http: HttpRequest,
    state: web::Data<ApiState>,
) -> Result<web::Json<TrafficStats>, ApiError> {
    authorize(&http, &state.admin)?;
    Ok(web::Json(state.guard.stats()))
}
