//! A small email-signup service.
//! Serves a landing page and collects deduplicated subscriber emails from forms and JSON clients.

pub mod app;
pub mod config;
pub mod database;
mod error;
pub mod templ_manager;
pub mod utils;
pub mod web;

pub use app::{App, AppState};
pub use error::{Error, Result};
pub use web::serve::serve;

use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "waitlist=debug,tower_http=info,info";

/// Human readable, compact logs for development.
/// `RUST_LOG` overrides the default filter.
pub fn init_dbg_tracing() {
    tracing_subscriber::fmt()
        .without_time()
        .with_target(false)
        .with_env_filter(env_filter())
        .compact()
        .init();
}

/// One JSON object per line, for log collectors.
pub fn init_production_tracing() {
    tracing_subscriber::fmt()
        .json()
        .with_current_span(true)
        .with_span_list(false)
        .with_env_filter(env_filter())
        .init();
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
}
