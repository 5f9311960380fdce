// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::future::IntoFuture;
use std::process::ExitCode;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use authgate::api::router;
use authgate::auth::{AccessControl, KeyStore, SystemClock};
use authgate::config::AppConfig;
use authgate::error::StartupError;
use authgate::policy::PolicyEngine;
use authgate::state::AppState;
use authgate::telemetry;

#[tokio::main]
async fn main() -> ExitCode {
    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            telemetry::init(Default::default());
            error!(error = %e, "Invalid configuration");
            return ExitCode::FAILURE;
        }
    };
    telemetry::init(config.log_format);

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Server failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: AppConfig) -> Result<(), StartupError> {
    let keys = Arc::new(KeyStore::from_dir(&config.keys_dir)?);
    if !keys.contains(&config.active_kid) {
        return Err(StartupError::MissingActiveKey(config.active_kid));
    }
    let policies = Arc::new(PolicyEngine::embedded()?);
    info!(kids = ?keys.kids(), active_kid = %config.active_kid, "Loaded keys and policies");

    let mut access = AccessControl::new(keys, policies, Arc::new(SystemClock));
    if let Some(audience) = &config.audience {
        access = access.with_audience(audience.clone());
    }

    let shutdown = CancellationToken::new();
    let mut state = AppState::new(access).with_shutdown(shutdown.clone());
    if let Some(timeout) = config.policy_timeout {
        state = state.with_policy_timeout(timeout);
    }
    let app = router(state);

    let listener = TcpListener::bind(config.bind)
        .await
        .map_err(|e| StartupError::io(format!("binding {}", config.bind), e))?;
    info!(addr = %config.bind, "Authgate listening");

    tokio::spawn(watch_signals(shutdown.clone()));

    let grace = config.shutdown_timeout;
    let drained = shutdown.clone();
    let server = axum::serve(listener, app).with_graceful_shutdown(async move {
        drained.cancelled().await;
        info!("Shutdown signal received, draining connections");
    })
    .into_future();

    tokio::select! {
        result = server => result.map_err(|e| StartupError::io("serving", e))?,
        () = async {
            shutdown.cancelled().await;
            tokio::time::sleep(grace).await;
        } => warn!(grace_secs = grace.as_secs(), "Grace period elapsed, exiting"),
    }

    info!("Server shut down");
    Ok(())
}

/// Cancel `shutdown` on SIGINT or SIGTERM.
async fn watch_signals(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    shutdown.cancel();
}
