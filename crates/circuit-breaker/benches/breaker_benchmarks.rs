//! Benchmarks for the circuit breaker
//!
//! Run with: cargo bench --package breakwater-circuit-breaker

use breakwater_circuit_breaker::{BreakerConfig, CircuitBreaker};
use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;
use std::time::Duration;

fn breaker(threshold: u32) -> CircuitBreaker<String> {
    CircuitBreaker::new(BreakerConfig::new("bench", threshold, Duration::from_secs(3600)))
        .expect("valid config")
}

fn bench_closed_success(c: &mut Criterion) {
    let cb = breaker(5);

    c.bench_function("execute_closed_success", |b| {
        b.iter(|| {
            let result = cb.execute(|| Ok::<_, String>(black_box(42)));
            black_box(result)
        });
    });
}

fn bench_closed_failure(c: &mut Criterion) {
    let cb = breaker(u32::MAX);

    c.bench_function("execute_closed_failure", |b| {
        b.iter(|| {
            let result = cb.execute(|| Err::<i32, _>("unavailable".to_string()));
            black_box(result)
        });
    });
}

fn bench_open_rejection(c: &mut Criterion) {
    let cb = breaker(1);
    let _ = cb.execute(|| Err::<i32, _>("unavailable".to_string()));

    c.bench_function("execute_open_rejection", |b| {
        b.iter(|| {
            let result = cb.execute(|| Ok::<_, String>(black_box(42)));
            black_box(result)
        });
    });
}

criterion_group!(
    benches,
    bench_closed_success,
    bench_closed_failure,
    bench_open_rejection
);
criterion_main!(benches);
