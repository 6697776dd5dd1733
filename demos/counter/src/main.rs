//! Counter Demo
//!
//! A store holding a running total. Three `add` actions are queued, a
//! listener prints every new total, a middleware rejects nothing but logs
//! every action, and an immediate dispatch shows the returned state.
//!
//! # Running the Example
//!
//! ```bash
//! cargo run -p counter-demo
//! STATECRAFT_DEBUG=1 RUST_LOG=debug cargo run -p counter-demo
//! ```

#![allow(missing_docs)]

use statecraft_core::{Action, Middleware, MiddlewareError, ReducerError, on_change, try_reducer_fn};
use statecraft_runtime::metrics::MetricsRecorder;
use statecraft_runtime::{ListenerBinding, Store, StoreConfig, StoreError};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Counter {
    total: i64,
    applied: u32,
}

struct AuditLog;

impl Middleware<Counter, i64> for AuditLog {
    fn name(&self) -> &str {
        "audit"
    }

    fn before(&self, state: &Counter, action: &Action<i64>) -> Result<(), MiddlewareError> {
        tracing::info!(action = %action, amount = action.payload(), total = state.total, "Applying");
        Ok(())
    }

    fn after(&self, state: &Counter, action: &Action<i64>) -> Result<(), MiddlewareError> {
        tracing::info!(action = %action, total = state.total, "Applied");
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,statecraft_runtime=info,counter_demo=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut metrics = MetricsRecorder::new();
    metrics.install()?;

    let config = StoreConfig::from_env()?;
    tracing::info!(?config, "Starting counter demo");

    let store: Store<Counter, i64> = Store::with_config(Counter::default(), config);
    store.add_reducer(Arc::new(try_reducer_fn(|state: &Counter, action: &Action<i64>| {
        let total = state
            .total
            .checked_add(*action.payload())
            .ok_or_else(|| ReducerError::new("total overflowed"))?;
        Ok(Counter {
            total,
            applied: state.applied + 1,
        })
    })));
    store.add_middleware(Arc::new(AuditLog));
    store.add_error_observer(Arc::new(|error: &StoreError| {
        tracing::warn!(%error, "Store reported an error");
    }));

    let printer = ListenerBinding::bind(
        &store,
        Arc::new(on_change(|counter: &Counter| {
            println!("total = {} after {} actions", counter.total, counter.applied);
        })),
    );

    for amount in [1, 2, 3] {
        store.enqueue(Action::new("add", amount))?;
    }
    store.flush().await;

    let state = store.dispatch_now(Action::new("add", 10)).await?;
    println!("immediate dispatch returned total = {}", state.total);

    if let Err(error) = store.dispatch_now(Action::new("add", i64::MAX)).await {
        println!("rejected: {error}");
    }

    drop(printer);
    store.stop();
    store.stopped().await;

    if let Some(rendered) = metrics.render() {
        println!("\n{rendered}");
    }
    Ok(())
}
