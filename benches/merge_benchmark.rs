/*!
 * Merge Benchmarks
 *
 * Merge throughput across channel counts, and backward seeks over
 * checkpointed positions
 */

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::time::Duration;
use tracemerge::{
    Event, EventTypeTable, MemoryChannel, MemoryTrace, SeekOptions, Timestamp, TraceSetContext,
};

const EVENTS_PER_CHANNEL: u64 = 10_000;

fn traceset(channels: u32, seed: u64) -> TraceSetContext {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut trace = MemoryTrace::new("bench", EventTypeTable::new(["tick"]));
    for cpu in 0..channels {
        let mut t = 0u64;
        let events = (0..EVENTS_PER_CHANNEL)
            .map(|_| {
                t += rng.gen_range(1..100);
                Event::new(Timestamp::from_nanos(t), 0, cpu)
            })
            .collect();
        trace = trace.with_channel(MemoryChannel::new(&format!("cpu{cpu}"), events).on_cpu(cpu));
    }
    TraceSetContext::new(vec![trace.into_trace()]).unwrap()
}

fn bench_merge(c: &mut Criterion) {
    let mut group = c.benchmark_group("merge");

    for channels in [1u32, 4, 16, 64] {
        group.throughput(Throughput::Elements(u64::from(channels) * EVENTS_PER_CHANNEL));
        group.bench_with_input(
            BenchmarkId::from_parameter(channels),
            &channels,
            |b, &channels| {
                let mut ctx = traceset(channels, 7);
                b.iter(|| {
                    ctx.seek_time(Timestamp::ZERO).unwrap();
                    let count = ctx
                        .process_with(Timestamp::INFINITE, None, None, |event| {
                            black_box(event.timestamp());
                            false
                        })
                        .unwrap();
                    black_box(count)
                });
            },
        );
    }

    group.finish();
}

fn bench_seek_backward(c: &mut Criterion) {
    let mut group = c.benchmark_group("seek_n_backward");
    let options = SeekOptions::new();

    for n in [10u64, 1_000] {
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            let mut ctx = traceset(8, 11);
            ctx.seek_time(Timestamp::INFINITE).unwrap();
            let end = ctx.save_position();
            b.iter(|| {
                ctx.restore_position(&end).unwrap();
                let found = ctx
                    .seek_n_backward(
                        n,
                        Duration::from_nanos(500),
                        |ctx, t| ctx.seek_time(t),
                        &options,
                    )
                    .unwrap();
                black_box(found)
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_merge, bench_seek_backward);
criterion_main!(benches);
