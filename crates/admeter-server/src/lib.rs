//! Admeter Server - HTTP surface for the ad engine
//!
//! Exposes ad serving, click tracking, the virtual clock, statistics and
//! client / advertiser / campaign management over `warp`.
//!
//! # Example
//!
//! ```rust,ignore
//! use admeter_server::{serve, ServerConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ServerConfig::load("admeter.toml".as_ref())?;
//! serve(config, async { tokio::signal::ctrl_c().await.ok(); }).await?;
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod config;
pub mod handlers;
pub mod routes;

pub use config::{ConfigError, ServerConfig, DEFAULT_BIND};
pub use routes::{api, app, MAX_BODY_BYTES};

use admeter_core::AdEngine;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{fmt, EnvFilter, Layer};

/// Server errors
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Listener could not be bound
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: warp::Error,
    },
}

/// Install the global tracing subscriber
///
/// Filtering follows `RUST_LOG`, defaulting to `info`.
///
/// # Errors
/// If a global subscriber is already installed
pub fn init_tracing(json: bool) -> Result<(), TryInitError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = if json {
        fmt::layer().json().with_current_span(true).boxed()
    } else {
        fmt::layer().with_target(true).boxed()
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()
}

/// Run the server until `shutdown` resolves
///
/// # Errors
/// `Bind` if the listen address is unavailable
pub async fn serve<S>(config: ServerConfig, shutdown: S) -> Result<(), ServerError>
where
    S: Future<Output = ()> + Send + 'static,
{
    let engine = Arc::new(AdEngine::new(config.engine.clone()));
    let (addr, server) = warp::serve(app(engine))
        .try_bind_with_graceful_shutdown(config.bind, shutdown)
        .map_err(|source| ServerError::Bind {
            addr: config.bind,
            source,
        })?;

    tracing::info!(%addr, version = admeter_core::VERSION, "admeter listening");
    server.await;
    tracing::info!("admeter stopped");
    Ok(())
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
