//! Console logging for the workload driver.
//!
//! Library events from `baupipe` (worker lifecycle, backoff escalation, pool
//! teardown) and the driver's own progress go through one `fmt` layer on
//! stderr, so stdout stays reserved for the assembled documents. Filtering
//! follows `RUST_LOG` and defaults to `info`.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

pub fn init_telemetry() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_thread_ids(true)
                .with_thread_names(true)
                .with_line_number(true)
                .with_target(false)
                .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
                .with_file(true)
                .pretty(),
        )
        .try_init()?;
    Ok(())
}
