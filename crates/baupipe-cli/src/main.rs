#![doc = include_str!("../README.md")]

mod config;
mod telemetry;
mod workload;

use baupipe::{FactoryRegistry, Printer, WriterPrinter};
use baupipe_json::PrettyPrinter;
use clap::Parser;
use config::{CliArgs, RunConfig};
use std::fs::OpenOptions;
use std::io::{self, BufWriter, Write};
use std::sync::Arc;
use telemetry::init_telemetry;

// Using mimalloc for better performance under contention, especially in musl
// environments.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = RunConfig::try_from(args)?;

    init_telemetry()?;
    log_startup_info(&config);

    let mut registry = FactoryRegistry::default();
    baupipe_json::register(&mut registry);

    let printer = match &config.output {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            sink(BufWriter::new(file), config.pretty)
        }
        None => sink(io::stdout(), config.pretty),
    };

    let profiler = config.pipeline.build(&registry, printer)?;
    let report = workload::run(&profiler, &config)?;

    tracing::info!(
        "Assembled {} groups from {} events ({} discarded) in {:?}",
        report.groups,
        report.events,
        report.discarded,
        report.elapsed
    );

    // Joins the workers.
    drop(profiler);
    tracing::info!("Pipeline shut down successfully");
    Ok(())
}

fn sink<W: Write + Send + 'static>(out: W, pretty: bool) -> Arc<dyn Printer> {
    let printer = WriterPrinter::new(out);
    if pretty {
        Arc::new(PrettyPrinter::new(printer))
    } else {
        Arc::new(printer)
    }
}

fn log_startup_info(config: &RunConfig) {
    if cfg!(debug_assertions) {
        tracing::info!("Starting workload with full config: {:#?}", config);
    } else {
        tracing::info!(
            "Starting workload: {} groups x {} events on {} producers and {} workers",
            config.groups,
            config.events_per_group,
            config.producers,
            config.pipeline.num_workers
        );
    }
}
