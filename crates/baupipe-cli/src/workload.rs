//! Synthetic traffic: producer threads that open groups, emit timed spans
//! into them and close them again.
//!
//! Each group renders as
//!
//! ```text
//! {"spans":[{"name":"op0",...},...],"summary":{"group":7,"spans":20}}
//! ```
//!
//! The summary is emitted first but depends on the last span, so the
//! pipeline has to reorder it.

use crate::config::RunConfig;
use baupipe::{AssemblyNode, Conversion, GroupId, Profile, Profiler, Timed, Timer};
use baupipe_json::{NodeKeys, field};
use core::time::Duration;
use rand::Rng;
use serde_json::{Value, json};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

const SPAN_SLOT: u32 = 1;
const SUMMARY_SLOT: u32 = 2;

/// Probability that a span discards itself before assembly.
const DISCARD_RATE: f64 = 0.02;

struct Span {
    name: String,
    value: u32,
    discard: bool,
    verbose: bool,
    thread: Option<String>,
    timer: Option<Timer>,
    elapsed_ms: f64,
    nodes: Vec<Arc<dyn AssemblyNode>>,
}

impl Profile for Span {
    fn id(&self) -> u32 {
        SPAN_SLOT
    }

    fn set_verbosity(&mut self, verbose: bool) {
        self.verbose = verbose;
    }

    fn pre_process(&mut self) {
        self.thread = thread::current().name().map(str::to_owned);
    }

    fn invalidate(&mut self) -> bool {
        self.discard
    }

    fn post_process(&mut self) {
        self.elapsed_ms = self
            .timer
            .as_ref()
            .map_or(0.0, |timer| timer.info().total_time_millis());
    }

    fn convert(&self) -> Conversion {
        let mut body = format!(
            "{},{},{}",
            field("name", &Value::from(self.name.as_str())),
            field("value", &json!(self.value)),
            field("ms", &json!(self.elapsed_ms)),
        );
        if self.verbose {
            body.push(',');
            body.push_str(&field("thread", &json!(self.thread)));
        }
        Conversion::new(u64::from(SPAN_SLOT), body, self.nodes.clone())
    }
}

impl Timed for Span {
    fn set_timer(&mut self, timer: Timer) {
        self.timer = Some(timer);
    }
}

struct Summary {
    group: GroupId,
    spans: u32,
    /// Body of the span this summary must follow.
    after: String,
    nodes: Vec<Arc<dyn AssemblyNode>>,
}

impl Profile for Summary {
    fn id(&self) -> u32 {
        SUMMARY_SLOT
    }

    fn dependency_id(&self) -> Option<u32> {
        Some(SPAN_SLOT)
    }

    fn predicate(&self, anchor: &dyn Profile) -> bool {
        anchor.convert().body().starts_with(&self.after)
    }

    fn convert(&self) -> Conversion {
        let body = format!(
            "{},{}",
            field("group", &json!(self.group)),
            field("spans", &json!(self.spans)),
        );
        Conversion::new(u64::from(SUMMARY_SLOT), body, self.nodes.clone())
    }
}

/// Shared nesting descriptors for every group.
struct Layout {
    spans: Arc<dyn AssemblyNode>,
    summary: Arc<dyn AssemblyNode>,
}

impl Layout {
    fn new() -> Self {
        let mut keys = NodeKeys::new();
        Self {
            spans: keys.object_array("spans"),
            summary: keys.object("summary"),
        }
    }
}

#[derive(Debug, Default)]
pub struct Report {
    pub groups: u64,
    pub events: u64,
    pub discarded: u64,
    pub elapsed: Duration,
}

/// Runs every producer to completion and waits until the pipeline drained.
pub fn run(profiler: &Profiler, config: &RunConfig) -> anyhow::Result<Report> {
    let layout = Layout::new();
    let started = Instant::now();

    let reports = thread::scope(|s| {
        let handles: Vec<_> = (0..config.producers)
            .map(|producer| {
                let layout = &layout;
                thread::Builder::new()
                    .name(format!("producer-{producer}"))
                    .spawn_scoped(s, move || produce(profiler, config, layout, producer))
            })
            .collect::<Result<_, _>>()?;
        handles
            .into_iter()
            .map(|handle| {
                handle
                    .join()
                    .map_err(|_| anyhow::anyhow!("producer thread panicked"))?
            })
            .collect::<anyhow::Result<Vec<Report>>>()
    })?;

    await_drain(profiler);

    let mut total = reports
        .into_iter()
        .fold(Report::default(), |mut total, report| {
            total.groups += report.groups;
            total.events += report.events;
            total.discarded += report.discarded;
            total
        });
    total.elapsed = started.elapsed();
    Ok(total)
}

fn produce(
    profiler: &Profiler,
    config: &RunConfig,
    layout: &Layout,
    producer: usize,
) -> anyhow::Result<Report> {
    let mut rng = rand::rng();
    let mut report = Report::default();
    let producers = config.producers as u64;

    for group in (0..config.groups).filter(|g| g % producers == producer as u64) {
        profiler.attach(group)?;

        let last = config.events_per_group - 1;
        let summary = Summary {
            group,
            spans: config.events_per_group,
            after: field("name", &json!(format!("op{last}"))),
            nodes: vec![Arc::clone(&layout.summary)],
        };
        profiler.profile(Box::new(summary), group)?;

        for n in 0..config.events_per_group {
            // The summary's anchor is never discarded.
            let discard = n != last && rng.random_bool(DISCARD_RATE);
            let span = Span {
                name: format!("op{n}"),
                value: rng.random_range(0..1_000),
                discard,
                verbose: false,
                thread: None,
                timer: None,
                elapsed_ms: 0.0,
                nodes: vec![Arc::clone(&layout.spans)],
            };
            let timer = profiler.tprofile(span, group)?;
            timer.start();
            simulate_work(rng.random_range(0..50));
            timer.stop();

            report.events += 1;
            report.discarded += u64::from(discard);
        }

        profiler.detach(group)?;
        report.groups += 1;
    }
    tracing::debug!("Producer {producer} finished {} groups", report.groups);
    Ok(report)
}

fn simulate_work(micros: u64) {
    let until = Instant::now() + Duration::from_micros(micros);
    while Instant::now() < until {
        core::hint::spin_loop();
    }
}

fn await_drain(profiler: &Profiler) {
    let Some(dispatcher) = profiler.dispatcher() else {
        return;
    };
    let mut last_report = Instant::now();
    while dispatcher.pool().in_flight() > 0 {
        if last_report.elapsed() >= Duration::from_secs(1) {
            tracing::info!(
                "Waiting for {} groups to be assembled",
                dispatcher.pool().in_flight()
            );
            last_report = Instant::now();
        }
        thread::sleep(Duration::from_millis(1));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use baupipe::{CollectingPrinter, FactoryRegistry, PipelineConfig};

    fn run_config(groups: u64, events_per_group: u32) -> RunConfig {
        RunConfig {
            pipeline: PipelineConfig {
                assembler: String::from("json"),
                ..PipelineConfig::default()
            },
            groups,
            events_per_group,
            producers: 3,
            output: None,
            pretty: false,
        }
    }

    #[test]
    fn every_group_yields_one_document_with_the_summary_last() {
        let config = run_config(12, 8);
        let mut registry = FactoryRegistry::default();
        baupipe_json::register(&mut registry);
        let printer = Arc::new(CollectingPrinter::new());
        let profiler = config.pipeline.build(&registry, printer.clone()).unwrap();

        let report = run(&profiler, &config).unwrap();
        assert_eq!(report.groups, 12);
        assert_eq!(report.events, 12 * 8);

        let documents = printer.take();
        assert_eq!(documents.len(), 12);
        let mut seen = Vec::new();
        for document in &documents {
            let value: Value = serde_json::from_str(document).unwrap();
            let spans = value["spans"].as_array().unwrap();
            assert!(!spans.is_empty());
            assert_eq!(spans.last().unwrap()["name"], "op7");
            assert!(document.ends_with(&format!(
                "\"summary\":{{\"group\":{},\"spans\":8}}}}",
                value["summary"]["group"]
            )));
            seen.push(value["summary"]["group"].as_u64().unwrap());
        }
        seen.sort_unstable();
        assert_eq!(seen, (0..12).collect::<Vec<_>>());
    }

    #[test]
    fn disabled_pipeline_runs_without_output() {
        let mut config = run_config(4, 2);
        config.pipeline.enabled = false;
        let printer = Arc::new(CollectingPrinter::new());
        let profiler = config
            .pipeline
            .build(&FactoryRegistry::default(), printer.clone())
            .unwrap();

        let report = run(&profiler, &config).unwrap();
        assert_eq!(report.groups, 4);
        assert!(printer.is_empty());
    }
}
