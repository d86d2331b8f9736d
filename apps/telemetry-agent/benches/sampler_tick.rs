//! Physics/Scoring Sampler tick overhead benchmarks.
//!
//! Run with: cargo bench --bench sampler_tick

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::sync::Arc;
use std::time::Duration;
use telemetry_agent::events::{AgentEventKind, EventBus};
use telemetry_agent::sampling::{PhysicsSampler, ScoringSampler};
use telemetry_agent::source::MockAdapter;
use tokio::runtime::Runtime;
use tokio_util::sync::CancellationToken;

async fn seeded_source() -> Arc<MockAdapter> {
    let mut source = MockAdapter::new();
    telemetry_agent::source::SourceAdapter::open(&mut source).await.unwrap();
    for lap in 0..5 {
        for i in 0..200 {
            source.push_physics(MockAdapter::sample_physics(lap, i as f64 * 0.011, i as f32 / 200.0));
        }
    }
    Arc::new(source)
}

/// Measures how long a single Physics Sampler run-loop iteration takes once
/// the bus has a live subscriber, by running the sampler for a fixed wall
/// clock window and counting emitted samples.
fn bench_physics_sampler_throughput(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();

    c.bench_function("physics_sampler_100ms_window", |b| {
        b.to_async(&rt).iter_custom(|iters| async move {
            let mut total = Duration::ZERO;
            for _ in 0..iters {
                let bus: EventBus = EventBus::new(1024);
                let mut rx = bus.subscribe(AgentEventKind::Raw);
                let source = seeded_source().await;
                let cancel = CancellationToken::new();

                let sampler = PhysicsSampler::new(
                    source,
                    bus,
                    cancel.clone(),
                    Duration::from_millis(1),
                    Duration::from_secs(2),
                );

                let start = std::time::Instant::now();
                let handle = tokio::spawn(sampler.run());
                tokio::time::sleep(Duration::from_millis(100)).await;
                cancel.cancel();
                let _ = handle.await;
                total += start.elapsed();

                let mut drained = 0;
                while rx.try_recv().is_ok() {
                    drained += 1;
                }
                black_box(drained);
            }
            total
        });
    });
}

fn bench_scoring_sampler_throughput(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();

    c.bench_function("scoring_sampler_100ms_window", |b| {
        b.to_async(&rt).iter_custom(|iters| async move {
            let mut total = Duration::ZERO;
            for _ in 0..iters {
                let bus: EventBus = EventBus::new(1024);
                let mut rx = bus.subscribe(AgentEventKind::Raw);
                let mut raw_source = MockAdapter::new();
                telemetry_agent::source::SourceAdapter::open(&mut raw_source).await.unwrap();
                for lap in 0..5 {
                    for sector in 0..10 {
                        raw_source.push_scoring(telemetry_agent::model::ScoringSnapshot {
                            snapshot_time: chrono::Utc::now(),
                            update_trigger: telemetry_agent::model::ScoringTrigger::Periodic,
                            session_time: sector as f64,
                            lap_number: lap,
                            sector,
                            position: 1,
                            last_lap_time: -1.0,
                            best_lap_time: 0.0,
                            current_lap_time: 0.0,
                            incidents: 0,
                            fuel_level: 100.0,
                            track_temp: 25.0,
                            air_temp: 20.0,
                            session_flags: 0,
                        });
                    }
                }
                let source = Arc::new(raw_source);
                let cancel = CancellationToken::new();

                let sampler = ScoringSampler::new(
                    source,
                    bus,
                    cancel.clone(),
                    Duration::from_millis(5),
                    Duration::from_secs(1),
                    Duration::from_secs(2),
                );

                let start = std::time::Instant::now();
                let handle = tokio::spawn(sampler.run());
                tokio::time::sleep(Duration::from_millis(100)).await;
                cancel.cancel();
                let _ = handle.await;
                total += start.elapsed();

                let mut drained = 0;
                while rx.try_recv().is_ok() {
                    drained += 1;
                }
                black_box(drained);
            }
            total
        });
    });
}

criterion_group!(benches, bench_physics_sampler_throughput, bench_scoring_sampler_throughput);
criterion_main!(benches);
