//! Traffic Guard Service
//!
//! This is the main entry point for the traffic guard service.
//! It loads configuration, starts the background sweeper and metrics
//! exporter, and serves the decision and admin API.

use std::net::SocketAddr;
use std::sync::Arc;
use actix_web::{web, App, HttpServer};
use anyhow::Context;
use dotenv::dotenv;
use log::{error, info, warn};

use traffic_guard::api::{self, ApiState};
use traffic_guard::config;
use traffic_guard::core::{telemetry, TrafficGuard};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenv().ok();

    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    info!("Starting traffic guard service...");

    let config = config::load_config().context("Failed to load configuration")?;

    if config.monitoring.metrics_enabled {
        match config.monitoring.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => match telemetry::init_metrics(addr) {
                Ok(()) => info!("Serving metrics on {}", addr),
                Err(e) => error!("Failed to start metrics exporter: {}", e),
            },
            Err(e) => error!(
                "Invalid metrics address {}: {}",
                config.monitoring.metrics_address, e
            ),
        }
    }

    if !config.guard.enabled {
        warn!("Traffic guard is disabled; every request will be allowed");
    } else if config.guard.log_only {
        info!("Traffic guard running in log-only mode");
    }

    let guard = Arc::new(TrafficGuard::new(&config));
    let _sweeper = guard.spawn_sweeper();

    let state = web::Data::new(ApiState {
        guard,
        admin: config.admin.clone(),
    });
    if state.admin.api_key.is_empty() {
        warn!("admin.api_key is not set; admin endpoints are disabled");
    }

    let bind = (config.server.host.clone(), config.server.port);
    info!("Listening on {}:{}", bind.0, bind.1);

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .configure(api::config)
    })
    .bind(bind)
    .context("Failed to bind HTTP listener")?
    .run()
    .await
    .context("HTTP server failed")
}
