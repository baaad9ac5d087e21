// src/lib.rs
//! JD tracking board, batch CV automation and article reading cards.

pub mod batch;
pub mod board;
pub mod config;
pub mod core;
pub mod local_store;
pub mod reading;
pub mod types;
pub mod utils;
pub mod web;

pub use config::ConfigManager;
pub use local_store::LocalStore;
pub use web::{build_rocket, start_web_server};

/// Log through `tracing` with a level keyword: `app_log!(info, "..", args)`.
#[macro_export]
macro_rules! app_log {
    (trace, $($arg:tt)+) => { ::tracing::trace!($($arg)+) };
    (debug, $($arg:tt)+) => { ::tracing::debug!($($arg)+) };
    (info, $($arg:tt)+) => { ::tracing::info!($($arg)+) };
    (warn, $($arg:tt)+) => { ::tracing::warn!($($arg)+) };
    (error, $($arg:tt)+) => { ::tracing::error!($($arg)+) };
}
