use anyhow::bail;
use baupipe::{BackoffConfig, EncoderBounds, PipelineConfig};
use clap::Parser;
use core::time::Duration;
use std::path::PathBuf;

/// Runtime configuration for the `baupipe` workload driver.
///
/// Every value is parsed from CLI arguments or environment variables. The
/// pipeline settings map one to one onto [`PipelineConfig`]; the workload
/// settings shape the synthetic traffic pushed through it.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "baupipe",
    version,
    about = "Drive the baupipe telemetry pipeline with a synthetic workload"
)]
pub struct CliArgs {
    /// Number of pipeline workers draining and assembling groups.
    ///
    /// Defaults to the number of CPUs, clamped to `[2, 16]`.
    ///
    /// Environment variable: `NUM_WORKERS`
    #[arg(long, env = "NUM_WORKERS")]
    pub num_workers: Option<usize>,

    /// Total number of groups (documents) produced.
    ///
    /// Environment variable: `GROUPS`
    #[arg(long, env = "GROUPS", default_value_t = 100)]
    pub groups: u64,

    /// Timed events emitted into each group before it is closed.
    ///
    /// Environment variable: `EVENTS_PER_GROUP`
    #[arg(long, env = "EVENTS_PER_GROUP", default_value_t = 20)]
    pub events_per_group: u32,

    /// Number of producer threads. Groups are split round robin between them.
    ///
    /// Environment variable: `PRODUCERS`
    #[arg(long, env = "PRODUCERS", default_value_t = 2)]
    pub producers: usize,

    /// First backoff sleep of a worker whose groups ran dry.
    ///
    /// Environment variable: `BACKOFF_BASE_MS`
    #[arg(long, env = "BACKOFF_BASE_MS", default_value_t = 1)]
    pub backoff_base_ms: u64,

    /// Growth factor applied to the backoff sleep after every empty pass.
    ///
    /// Environment variable: `BACKOFF_RATE`
    #[arg(long, env = "BACKOFF_RATE", default_value_t = 2)]
    pub backoff_rate: u32,

    /// Upper bound of the backoff sleep.
    ///
    /// Environment variable: `BACKOFF_CEILING_MS`
    #[arg(long, env = "BACKOFF_CEILING_MS", default_value_t = 250)]
    pub backoff_ceiling_ms: u64,

    /// Registered assembler factory that renders the documents.
    ///
    /// Environment variable: `ASSEMBLER`
    #[arg(long, env = "ASSEMBLER", default_value_t = String::from("json"))]
    pub assembler: String,

    /// Comma separated parameters handed to the assembler factory. Write a
    /// literal comma as `\,`.
    ///
    /// Environment variable: `ASSEMBLER_PARAMS`
    #[arg(long, env = "ASSEMBLER_PARAMS", default_value_t = String::new())]
    pub assembler_params: String,

    /// Append documents to this file instead of writing them to stdout.
    ///
    /// Environment variable: `OUTPUT`
    #[arg(long, env = "OUTPUT")]
    pub output: Option<PathBuf>,

    /// Indent every document. Only meaningful for JSON output.
    #[arg(long, default_value_t = false)]
    pub pretty: bool,

    /// Ask every event to include its verbose fields.
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub pipeline: PipelineConfig,
    pub groups: u64,
    pub events_per_group: u32,
    pub producers: usize,
    pub output: Option<PathBuf>,
    pub pretty: bool,
}

impl TryFrom<CliArgs> for RunConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        let num_workers = args
            .num_workers
            .unwrap_or_else(|| num_cpus::get().clamp(2, 16));

        if num_workers == 0 {
            bail!("NUM_WORKERS must be greater than 0");
        }

        if args.producers == 0 {
            bail!("PRODUCERS must be greater than 0");
        }

        if args.events_per_group == 0 {
            bail!("EVENTS_PER_GROUP must be greater than 0");
        }

        if args.backoff_rate == 0 {
            bail!("BACKOFF_RATE must be greater than 0");
        }

        if args.backoff_ceiling_ms < args.backoff_base_ms {
            bail!(
                "BACKOFF_CEILING_MS ({}) must not be below BACKOFF_BASE_MS ({})",
                args.backoff_ceiling_ms,
                args.backoff_base_ms
            );
        }

        let pipeline = PipelineConfig {
            enabled: true,
            num_workers,
            encoder: EncoderBounds::Unbounded,
            backoff: BackoffConfig {
                base: Duration::from_millis(args.backoff_base_ms),
                rate: args.backoff_rate,
                ceiling: Some(Duration::from_millis(args.backoff_ceiling_ms)),
            },
            verbose: args.verbose,
            assembler: args.assembler,
            assembler_params: args.assembler_params,
        };

        Ok(Self {
            pipeline,
            groups: args.groups,
            events_per_group: args.events_per_group,
            producers: args.producers,
            output: args.output,
            pretty: args.pretty,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> anyhow::Result<RunConfig> {
        let args = CliArgs::try_parse_from(core::iter::once("baupipe").chain(args.iter().copied()))?;
        RunConfig::try_from(args)
    }

    #[test]
    fn defaults_are_valid() {
        let config = parse(&["--num-workers", "3"]).unwrap();
        assert_eq!(config.pipeline.num_workers, 3);
        assert_eq!(config.pipeline.assembler, "json");
        assert_eq!(config.pipeline.backoff.base, Duration::from_millis(1));
        assert_eq!(config.producers, 2);
        assert!(config.output.is_none());
    }

    #[test]
    fn rejects_zero_workers() {
        assert!(parse(&["--num-workers", "0"]).is_err());
    }

    #[test]
    fn rejects_ceiling_below_base() {
        assert!(
            parse(&[
                "--num-workers",
                "2",
                "--backoff-base-ms",
                "10",
                "--backoff-ceiling-ms",
                "5"
            ])
            .is_err()
        );
    }

    #[test]
    fn maps_pipeline_options() {
        let config = parse(&[
            "--num-workers",
            "4",
            "--assembler",
            "streaming",
            "--assembler-params",
            "[,]",
            "--verbose",
        ])
        .unwrap();
        assert_eq!(config.pipeline.assembler, "streaming");
        assert_eq!(config.pipeline.assembler_params, "[,]");
        assert!(config.pipeline.verbose);
    }
}
