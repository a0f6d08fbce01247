//! Background services.
//!
//! Each submodule provides a long-running async function intended to be
//! spawned via `tokio::spawn`. All services accept a [`CancellationToken`]
//! for graceful shutdown.
//!
//! [`CancellationToken`]: tokio_util::sync::CancellationToken

pub mod config_watcher;

pub use config_watcher::ConfigWatcher;
