//! Follow an execution stream and print what it reports.
//!
//! Usage: `exec-monitor <execution-id> [status]`
//!
//! The endpoint and reconnect policy come from `EXEC_STREAM__*` variables.

use anyhow::{Context, bail};
use exec_stream_client::{ConnectionManager, StreamConfig};
use exec_stream_core::{Callbacks, ExecutionStatus};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn parse_status(raw: &str) -> anyhow::Result<ExecutionStatus> {
    serde_json::from_value(serde_json::Value::String(raw.to_lowercase()))
        .with_context(|| format!("unknown execution status: {raw}"))
}

fn printing_callbacks() -> Callbacks {
    Callbacks::new()
        .on_log(|entry| {
            println!(
                "[{}] {}",
                entry.level.as_deref().unwrap_or("info"),
                entry.message.as_deref().unwrap_or_default()
            );
        })
        .on_status(|status| println!("status: {status}"))
        .on_node_update(|node_id, state| println!("node {node_id}: {state}"))
        .on_completion(|result| match result {
            Some(result) => println!("completed: {result}"),
            None => println!("completed"),
        })
        .on_error(|error| eprintln!("error: {error}"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let Some(execution_id) = args.next() else {
        bail!("usage: exec-monitor <execution-id> [status]");
    };
    let status = args
        .next()
        .map_or(Ok(ExecutionStatus::Running), |raw| parse_status(&raw))?;

    let config = StreamConfig::load()?;
    tracing::info!(
        execution_id = %execution_id,
        max_reconnect_attempts = config.max_reconnect_attempts,
        base_delay_ms = config.base_delay_ms,
        "Starting monitor"
    );

    let span = tracing::info_span!("execution", id = %execution_id);
    let mut manager = ConnectionManager::websocket(&config)
        .with_execution_id(execution_id)
        .with_status(status)
        .with_span(span);

    manager.connect(printing_callbacks());

    tokio::select! {
        () = manager.run() => tracing::info!("Stream finished"),
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutting down");
            manager.close(Some("Monitor stopped"));
        }
    }

    Ok(())
}
