// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `relayd`: the DICOM spool processing daemon. Loads config, wires the
//! stage workers and the admin socket together, and runs until signalled.

use relay_daemon::{env, Daemon};
use relay_engine::Config;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(env::default_log_filter()));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config_path = env::config_path();
    let config = Config::load(&config_path)?;
    tracing::info!(path = %config_path.display(), spool_root = %config.spool_root.display(), "loaded configuration");

    let daemon = Daemon::build(config, config_path)?;

    let cancellation = CancellationToken::new();
    let shutdown_token = cancellation.clone();
    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        tracing::info!("shutdown signal received");
        shutdown_token.cancel();
    });

    daemon.run(cancellation).await?;
    Ok(())
}

async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut terminate = match signal(SignalKind::terminate()) {
            Ok(sig) => sig,
            Err(err) => {
                tracing::error!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
                unreachable!()
            }
        };
        tokio::select! {
            _ = terminate.recv() => {}
            _ = tokio::signal::ctrl_c() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
