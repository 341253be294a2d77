//! Logging bootstrap. The engine itself only ever calls `tracing::event!` /
//! `tracing::debug_span!`; it is up to the host application to install a
//! subscriber. [`init_tracing`] is a convenience default for tests and
//! standalone binaries.

use std::sync::Once;

static INIT: Once = Once::new();

pub fn init_tracing() {
    INIT.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .try_init();
    });
}
