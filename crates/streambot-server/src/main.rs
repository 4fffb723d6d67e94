mod console;
mod gateway;
mod settings;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use streambot_db::{Store, StoreError};
use streambot_engine::sinks::StaticProfiles;
use streambot_engine::workers;
use streambot_engine::{Engine, Registry, Services};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::gateway::Hub;
use crate::settings::Settings;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "streambot=debug,tower_http=info".into()),
        )
        .init();

    let settings = Settings::from_env()?;
    let config = settings.load_config()?;
    info!(config = %settings.config_path.display(), commands = config.commands.len(), "Config loaded");

    let db_path = settings.database_path(&config);
    let store = match Store::open(&db_path) {
        Ok(store) => Arc::new(store),
        Err(StoreError::Busy) => bail!(
            "database {} is locked; is another streambot running?",
            db_path.display()
        ),
        Err(e) => return Err(e).with_context(|| format!("opening database {}", db_path.display())),
    };

    let mut registry = Registry::with_builtin_modules().context("registering modules")?;
    registry.init(&config).context("initializing modules")?;
    info!(modules = ?registry.module_names(), "Modules registered");
    for (command, tag) in config.unknown_restrictions() {
        warn!(command, tag, "Unknown restriction tag, command will never run");
    }

    let cancel = CancellationToken::new();
    let hub = Hub::new(cancel.clone());
    let (outbound, outbound_rx) = console::outbound();
    let services = Services::new(
        store,
        Arc::new(outbound),
        Arc::new(hub.clone()),
        Arc::new(StaticProfiles::new(config.followers.clone())),
        config.streaming,
    );
    let engine = Arc::new(Engine::new(&config, Arc::new(registry), services.clone()));

    // Background workers
    let mut tasks = vec![
        tokio::spawn(workers::run_follower_refresh(
            services.followers.clone(),
            Duration::from_secs(config.follower_refresh_secs.max(1)),
            cancel.clone(),
        )),
        tokio::spawn(console::write_outbound(outbound_rx, cancel.clone())),
        tokio::spawn(console::run_console(
            engine,
            config.main_channel.clone(),
            cancel.clone(),
        )),
    ];
    let report = &config.counter_report;
    tasks.extend(workers::spawn_counter_report(
        services.counters.clone(),
        &report.names,
        Duration::from_secs(report.interval_secs.max(1)),
        services.chat.clone(),
        report.channel.clone().unwrap_or_else(|| config.main_channel.clone()),
        cancel.clone(),
    ));

    let addr: SocketAddr = format!("{}:{}", settings.host, settings.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Streambot gateway listening on {}", addr);

    let signal = cancel.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        signal.cancel();
    });

    axum::serve(listener, gateway::router(hub))
        .with_graceful_shutdown(cancel.clone().cancelled_owned())
        .await?;

    // The console stops on its own at EOF; make sure everything else does too.
    cancel.cancel();
    for task in tasks {
        if let Err(e) = task.await {
            warn!("Background task ended abnormally: {}", e);
        }
    }
    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
                }
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                ctrl_c.await.ok();
                info!("Received Ctrl+C, shutting down...");
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
