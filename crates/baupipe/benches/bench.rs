use baupipe::{
    Assembler, AssemblyNode, BaseNode, CollectingPrinter, ConcurrentDispatcher, Conversion,
    Delimiters, Grouping, PoolConfig, Profile, StreamingAssembler, StreamingAssemblerFactory,
    UniqueEncoder, WorkerPool,
};
use core::hint::black_box;
use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use std::{
    sync::{Arc, Barrier},
    thread::scope,
    time::{Duration, Instant},
};

// Number of fragments assembled or ids encoded per benchmark iteration
// (per-thread for multi-threaded).
const TOTAL_ELEMS: usize = 4096;

struct Sample {
    id: u32,
    body: String,
}

impl Profile for Sample {
    fn id(&self) -> u32 {
        self.id
    }

    fn convert(&self) -> Conversion {
        Conversion::flat(u64::from(self.id), self.body.clone())
    }
}

fn flat_conversions() -> Vec<Conversion> {
    (0..TOTAL_ELEMS)
        .map(|n| Conversion::flat(n as u64, format!("\"key{n}\":{n}")))
        .collect()
}

/// Fragments nested three levels deep, repeating the innermost wrapper so
/// every other fragment opens a new element.
fn nested_conversions() -> Vec<Conversion> {
    let outer: Arc<dyn AssemblyNode> = Arc::new(BaseNode::new(
        "\"outer\"",
        1,
        Delimiters::new(":", "", "{", "}", ""),
    ));
    let middle: Arc<dyn AssemblyNode> = Arc::new(BaseNode::new(
        "\"middle\"",
        2,
        Delimiters::new(":", "[", "", "", "]"),
    ));
    let inner: Arc<dyn AssemblyNode> = Arc::new(BaseNode::new(
        "",
        3,
        Delimiters::new("", "", "{", "}", ""),
    ));
    (0..TOTAL_ELEMS)
        .map(|n| {
            Conversion::new(
                (n / 2) as u64,
                format!("\"v{}\":{n}", n % 2),
                vec![outer.clone(), middle.clone(), inner.clone()],
            )
        })
        .collect()
}

fn bench_assembler(c: &mut Criterion, group_name: &str, conversions: &[Conversion]) {
    let estimated = conversions.iter().map(|c| c.body().len()).sum();
    let mut group = c.benchmark_group(group_name);
    group.throughput(Throughput::Elements(TOTAL_ELEMS as u64));

    group.bench_function(format!("elems/{TOTAL_ELEMS}"), |b| {
        b.iter_custom(|iters| {
            let mut elapsed = Duration::ZERO;
            for _ in 0..iters {
                let input = conversions.to_vec();
                let start = Instant::now();
                let assembly =
                    StreamingAssembler::default().assemble(&mut input.into_iter(), estimated);
                elapsed += start.elapsed();
                black_box(assembly);
            }
            elapsed
        });
    });

    group.finish();
}

fn benchmark_assembler_flat(c: &mut Criterion) {
    bench_assembler(c, "assembler/flat", &flat_conversions());
}

fn benchmark_assembler_nested(c: &mut Criterion) {
    bench_assembler(c, "assembler/nested", &nested_conversions());
}

fn benchmark_encoder_sequential(c: &mut Criterion) {
    let mut group = c.benchmark_group("encoder/sequential");
    group.throughput(Throughput::Elements(TOTAL_ELEMS as u64));

    group.bench_function(format!("elems/{TOTAL_ELEMS}"), |b| {
        b.iter_custom(|iters| {
            let start = Instant::now();
            for _ in 0..iters {
                let encoder = UniqueEncoder::unbounded();
                for group in 0..TOTAL_ELEMS as u64 {
                    black_box(encoder.encode(group).ok());
                }
                for group in 0..TOTAL_ELEMS as u64 {
                    black_box(encoder.remove(group).ok());
                }
            }
            start.elapsed()
        });
    });

    group.finish();
}

fn benchmark_encoder_contended(c: &mut Criterion) {
    for threads in [2, 4, 8] {
        let mut group = c.benchmark_group(format!("encoder/contended/threads/{threads}"));
        group.throughput(Throughput::Elements((TOTAL_ELEMS * threads) as u64));

        group.bench_function(format!("elems/{TOTAL_ELEMS}"), |b| {
            b.iter_custom(|iters| {
                let mut elapsed = Duration::ZERO;
                for _ in 0..iters {
                    let encoder = UniqueEncoder::unbounded();
                    let barrier = Barrier::new(threads + 1);
                    let start = scope(|s| {
                        for t in 0..threads {
                            let encoder = &encoder;
                            let barrier = &barrier;
                            s.spawn(move || {
                                barrier.wait();
                                let base = (t * TOTAL_ELEMS) as u64;
                                for group in base..base + TOTAL_ELEMS as u64 {
                                    black_box(encoder.encode(group).ok());
                                    black_box(encoder.remove(group).ok());
                                }
                            });
                        }
                        barrier.wait();
                        Instant::now()
                    });
                    elapsed += start.elapsed();
                }
                elapsed
            });
        });

        group.finish();
    }
}

fn benchmark_pipeline(c: &mut Criterion) {
    const GROUPS: u64 = 64;
    const EVENTS: u32 = 64;

    let mut group = c.benchmark_group("pipeline/end_to_end");
    group.throughput(Throughput::Elements(GROUPS * u64::from(EVENTS)));
    group.sample_size(20);

    group.bench_function(format!("groups/{GROUPS}/events/{EVENTS}"), |b| {
        b.iter_custom(|iters| {
            let start = Instant::now();
            for _ in 0..iters {
                let printer = Arc::new(CollectingPrinter::new());
                let grouping = Arc::new(Grouping::new());
                let pool = WorkerPool::new(
                    PoolConfig::default(),
                    Arc::clone(&grouping),
                    Arc::new(StreamingAssemblerFactory::default()),
                    printer.clone(),
                );
                let dispatcher =
                    ConcurrentDispatcher::from_parts(UniqueEncoder::unbounded(), grouping, pool);
                for group in 0..GROUPS {
                    let _ = dispatcher.dispatch_group(group);
                    for id in 0..EVENTS {
                        let sample = Sample {
                            id,
                            body: format!("\"e{id}\":{group}"),
                        };
                        let _ = dispatcher.dispatch_profile(Box::new(sample), group);
                    }
                    let _ = dispatcher.release_group(group);
                }
                while printer.len() < GROUPS as usize {
                    std::thread::yield_now();
                }
                black_box(printer.take());
            }
            start.elapsed()
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    benchmark_assembler_flat,
    benchmark_assembler_nested,
    benchmark_encoder_sequential,
    benchmark_encoder_contended,
    benchmark_pipeline,
);
criterion_main!(benches);
