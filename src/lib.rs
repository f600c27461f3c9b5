//! Headache triage engine.
//!
//! Free-text clinical messages are turned into a structured [`models::HeadacheCase`],
//! missing critical information is requested one question at a time, and a
//! prioritized rule set produces an imaging recommendation adapted to the
//! patient.

pub mod config;
pub mod core_state; // Session-aware service facade
pub mod dialogue;
pub mod models;
pub mod pipeline;
pub mod rules;

pub use core_state::{InboundTurn, OutboundTurn, TriageError, TriageService};

use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber. `RUST_LOG` wins over the default
/// filter; calling this twice is harmless.
pub fn init_tracing() {
    let installed = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .try_init()
        .is_ok();

    if installed {
        tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);
    }
}
