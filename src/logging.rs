//! Tracing setup for the `lrag` binary.

use std::sync::Once;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Environment variable holding the log filter, e.g. `LRAG_LOG=legal_rag=debug`.
pub const LOG_ENV: &str = "LRAG_LOG";

static INIT: Once = Once::new();

/// Installs a stderr fmt subscriber filtered by [`LOG_ENV`].
///
/// Falls back to `warn` when the variable is unset or invalid. Calling it
/// more than once is a no-op.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));

        tracing_subscriber::registry()
            .with(fmt::layer().with_writer(std::io::stderr).with_target(true))
            .with(filter)
            .init();
    });
}
