// crates/circuit-breaker/examples/breaker_demo.rs
//! Demonstration of the circuit breaker
//!
//! Run with: RUST_LOG=debug cargo run --example breaker_demo

use breakwater_circuit_breaker::{BreakerConfig, BreakerSettings, CircuitBreaker, TokioScheduler};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
enum ServiceError {
    #[error("service unavailable")]
    Unavailable,
    #[error("invalid request")]
    InvalidRequest,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    println!("Circuit Breaker Demo");
    println!("====================\n");

    demo_trip_and_recover()?;
    println!();
    demo_failure_predicate()?;
    println!();
    demo_async_timeout().await?;

    Ok(())
}

fn demo_trip_and_recover() -> Result<(), Box<dyn std::error::Error>> {
    println!("1. Trip and Recover");
    println!("-------------------");

    let settings = BreakerSettings::from_toml_str(
        r#"
        name = "inventory"
        failure_threshold = 3
        cool_down_ms = 100
        "#,
    )?;
    let cb: CircuitBreaker<ServiceError> = CircuitBreaker::new(settings.into_config())?;

    for i in 1..=5 {
        let result = cb.execute(|| {
            if i <= 3 {
                Err(ServiceError::Unavailable)
            } else {
                Ok(42)
            }
        });

        match result {
            Ok(value) => println!("  Request {}: ✓ {}", i, value),
            Err(e) => println!("  Request {}: ✗ {}", i, e),
        }
    }

    println!("  Circuit state: {}", cb.state());

    std::thread::sleep(Duration::from_millis(150));
    println!("  Waited for cool-down, state: {}", cb.state());

    match cb.execute(|| Ok::<_, ServiceError>(42)) {
        Ok(_) => println!("  Trial call: ✓ succeeded"),
        Err(e) => println!("  Trial call: ✗ {}", e),
    }
    println!("  Circuit state: {}", cb.state());

    Ok(())
}

fn demo_failure_predicate() -> Result<(), Box<dyn std::error::Error>> {
    println!("2. Failure Predicate");
    println!("--------------------");

    let config = BreakerConfig::new("orders", 2, Duration::from_secs(30))
        .with_failure_predicate(|e: &ServiceError| matches!(e, ServiceError::Unavailable));
    let cb = CircuitBreaker::new(config)?;

    for i in 1..=4 {
        let _ = cb.execute(|| Err::<(), _>(ServiceError::InvalidRequest));
        println!(
            "  Invalid request {}: failures = {}, state = {}",
            i,
            cb.failure_count(),
            cb.state()
        );
    }

    for i in 1..=2 {
        let _ = cb.execute(|| Err::<(), _>(ServiceError::Unavailable));
        println!(
            "  Outage {}: failures = {}, state = {}",
            i,
            cb.failure_count(),
            cb.state()
        );
    }

    Ok(())
}

async fn demo_async_timeout() -> Result<(), Box<dyn std::error::Error>> {
    println!("3. Enforced Call Timeout");
    println!("------------------------");

    let config = BreakerConfig::new("search", 1, Duration::from_millis(50))
        .with_call_timeout(Duration::from_millis(20))
        .with_timeout_enforcement(true);
    let scheduler = TokioScheduler::current().ok_or("no tokio runtime")?;
    let cb = CircuitBreaker::with_scheduler(config, scheduler)?;

    let result = cb
        .execute_async(|| async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            Ok::<_, ServiceError>("results")
        })
        .await;

    match result {
        Ok(value) => println!("  Slow call: ✓ {}", value),
        Err(e) => println!("  Slow call: ✗ {}", e),
    }
    println!("  Circuit state: {}", cb.state());

    tokio::time::sleep(Duration::from_millis(80)).await;

    let result = cb
        .execute_async(|| async { Ok::<_, ServiceError>("results") })
        .await;
    match result {
        Ok(value) => println!("  Trial call: ✓ {}", value),
        Err(e) => println!("  Trial call: ✗ {}", e),
    }
    println!("  Circuit state: {}", cb.state());

    Ok(())
}
