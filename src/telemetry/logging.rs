use std::sync::Once;

static INIT: Once = Once::new();

/// Installs the global tracing subscriber. Safe to call more than once;
/// only the first call has any effect.
pub fn init() {
    INIT.call_once(|| {
        use tracing_subscriber::{prelude::*, EnvFilter};

        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_timer(tracing_subscriber::fmt::time::uptime()),
            )
            .try_init();
    });
}
