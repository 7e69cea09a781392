mod cli;
mod config;
mod http;
mod live;
mod loader;
mod paginate;
mod service;
mod state;
#[cfg(test)]
mod testing;
mod wiring;

use clap::Parser;
use thiserror::Error;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::cli::Cli;
use crate::config::ConfigError;
use crate::http::HttpError;
use crate::wiring::WiringError;
use agora_infra::db::run_migrations;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("wiring error: {0}")]
    Wiring(#[from] WiringError),
    #[error("db error: {0}")]
    Db(#[from] agora_infra::db::DbPoolError),
    #[error("http error: {0}")]
    Http(#[from] HttpError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("task join error: {0}")]
    Join(#[from] tokio::task::JoinError),
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let cli = Cli::parse();
    config::load_dotenv()?;
    let mut config = config::AppConfig::from_env()?;
    if let Some(addr) = cli.http_addr {
        config.http_addr = addr;
    }
    let state = wiring::build_state(config)?;
    if let Some(pool) = state.store.pool() {
        if cli.skip_migrations {
            info!("skipping migrations");
        } else {
            run_migrations(pool).await?;
        }
    }

    let addr = state.config.http_addr;
    let http_state = state.clone();
    let mut api = tokio::spawn(async move {
        info!(%addr, backend = http_state.store.backend(), "http server starting");
        http::serve(addr, http_state).await
    });

    tokio::select! {
        _ = shutdown_signal() => {
            info!("shutdown signal received");
            state.shutdown.cancel();
            (&mut api).await??;
        }
        res = &mut api => {
            state.shutdown.cancel();
            res??;
        }
    }

    info!("stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "failed to install ctrl-c handler");
    }
}
