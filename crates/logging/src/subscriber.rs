//! crates/logging/src/subscriber.rs
//! Subscriber installation for binaries and tests.
//!
//! # Usage
//!
//! ```rust,ignore
//! use logging::init_tracing;
//!
//! // Honour BNET_LOG when set, otherwise log warnings and worse.
//! init_tracing("warn");
//! tracing::info!(target: "bnet::connect", "connecting");
//! ```

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};

/// Environment variable consulted for the filter directive.
pub const LOG_ENV_VAR: &str = "BNET_LOG";

fn build_filter(default_directive: &str) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| EnvFilter::new(default_directive))
}

/// Installs a global subscriber with an [`EnvFilter`] and a formatting layer.
///
/// The filter comes from [`LOG_ENV_VAR`] when set, otherwise from
/// `default_directive` (for example `"bnet::net=debug,warn"`).
///
/// # Panics
///
/// Panics if a global subscriber is already installed. Use
/// [`try_init_tracing`] where that can happen, such as in tests.
pub fn init_tracing(default_directive: &str) {
    tracing_subscriber::registry()
        .with(build_filter(default_directive))
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}

/// Fallible variant of [`init_tracing`].
pub fn try_init_tracing(default_directive: &str) -> Result<(), TryInitError> {
    tracing_subscriber::registry()
        .with(build_filter(default_directive))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_test_writer(),
        )
        .try_init()
}
