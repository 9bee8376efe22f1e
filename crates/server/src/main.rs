mod bootstrap;
mod health;
mod routes;
mod signing;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use skillmatch_core::config::{AppConfig, LoadOptions};
use skillmatch_slack::RosterManager;
use tokio::sync::Notify;

fn init_logging(config: &AppConfig) {
    use skillmatch_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    // Load config and initialize logging before any other operations
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config).await?;

    if let Some(idle_secs) = app.config.chatbot.idle_timeout_secs {
        spawn_idle_eviction(app.roster.clone(), Duration::from_secs(idle_secs));
    }

    let state = routes::SlackState::new(
        app.roster.clone(),
        app.dispatcher.clone(),
        app.config.slack.channels.clone(),
        app.config.slack.signing_secret.clone(),
    );
    let router = routes::router(state).merge(health::router(app.db_pool.clone()));

    let address = format!("{}:{}", app.config.server.bind_address, app.config.server.port);
    let listener = tokio::net::TcpListener::bind(&address).await?;
    tracing::info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        bind_address = %address,
        "skillmatch-server listening"
    );

    let stop = Arc::new(Notify::new());
    let server = axum::serve(listener, router).with_graceful_shutdown({
        let stop = stop.clone();
        async move { stop.notified().await }
    });
    let mut server = tokio::spawn(async move { server.await });

    tokio::select! {
        result = &mut server => {
            result??;
            return Ok(());
        }
        signal = wait_for_shutdown() => signal?,
    }

    tracing::info!(
        event_name = "system.server.stopping",
        correlation_id = "shutdown",
        "skillmatch-server stopping"
    );
    stop.notify_one();

    let grace = Duration::from_secs(app.config.server.graceful_shutdown_secs);
    match tokio::time::timeout(grace, server).await {
        Ok(result) => result??,
        Err(_) => tracing::warn!(
            event_name = "system.server.drain_timeout",
            correlation_id = "shutdown",
            grace_secs = grace.as_secs(),
            "in-flight requests did not finish before the shutdown deadline"
        ),
    }
    app.db_pool.close().await;

    Ok(())
}

fn spawn_idle_eviction(roster: Arc<RosterManager>, max_idle: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(max_idle);
        loop {
            ticker.tick().await;
            roster.evict_idle(max_idle).await;
        }
    });
}

async fn wait_for_shutdown() -> Result<()> {
    tokio::signal::ctrl_c().await?;
    Ok(())
}
