//! `taskpulse` server: REST task API, live metrics over WebSocket.
//!
//! # Usage
//!
//! ```bash
//! # Run on default address 0.0.0.0:8080
//! cargo run --bin taskpulse-server
//!
//! # Run on custom address with a faster broadcast
//! cargo run --bin taskpulse-server -- --bind 127.0.0.1:9090 --broadcast-interval-ms 500
//!
//! # Or via environment variable
//! TASKPULSE_ADDR=127.0.0.1:9090 cargo run --bin taskpulse-server
//! ```

use std::sync::Arc;

use clap::Parser;
use taskpulse_server::broadcaster::MetricsBroadcaster;
use taskpulse_server::config::{CliArgs, ServerConfig};
use taskpulse_server::http::{self, AppInfo, AppState};
use taskpulse_server::metrics::{MetricsSource, SystemMetricsCollector};
use taskpulse_server::service::TaskService;
use taskpulse_server::store::InMemoryTaskStore;
use taskpulse_server::topics::TopicHub;

#[tokio::main]
async fn main() {
    let cli = CliArgs::parse();

    let config = match ServerConfig::load(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            std::process::exit(1);
        }
    };

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    tracing::info!(addr = %config.bind_addr, env = %config.environment, "starting taskpulse server");

    let collector: Arc<dyn MetricsSource> =
        match SystemMetricsCollector::new(config.memory_limit_mb) {
            Ok(c) => Arc::new(c),
            Err(e) => {
                tracing::error!(error = %e, "failed to initialise metrics collector");
                std::process::exit(1);
            }
        };
    let hub = Arc::new(TopicHub::with_capacity(config.topic_capacity));

    let broadcaster = MetricsBroadcaster::new(Arc::clone(&collector), hub.clone())
        .with_interval(config.broadcast_interval)
        .spawn();

    let info = AppInfo {
        name: config.app_name.clone(),
        environment: config.environment.clone(),
        ..AppInfo::default()
    };
    let state = Arc::new(AppState::new(
        TaskService::new(InMemoryTaskStore::new()),
        collector,
        hub,
        info,
    ));

    match http::start_server_with_state(&config.bind_addr, state).await {
        Ok((bound_addr, handle)) => {
            tracing::info!(addr = %bound_addr, "taskpulse server listening");
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "server task failed");
            }
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to start server");
            broadcaster.stop().await;
            std::process::exit(1);
        }
    }

    broadcaster.stop().await;
}
