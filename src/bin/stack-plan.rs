// Copyright (c) 2025 - Cowboy AI, Inc.
//! Stack Plan
//!
//! Assembles the three-tier stack from environment configuration and
//! applies it against the in-memory engine, printing the outputs, the
//! declaration graph and the security allow-graph as JSON.
//!
//! Run with: STACK_SSH_KEY_NAME=ops cargo run --bin stack-plan
//!
//! With the `nats` feature and `NATS_URL` set, stack events are also
//! published to `stack.{network}.{event}`.

use anyhow::{Context, Result};
use cim_network_stack::{assemble, InMemoryEngine, JournalSink, StackConfig, TracingJournal};
use serde_json::json;
use std::sync::Arc;
use tracing::info;

#[cfg(feature = "nats")]
async fn journal() -> Result<Box<dyn JournalSink>> {
    use cim_network_stack::journal::{NatsConfig, NatsJournal};

    match std::env::var("NATS_URL") {
        Ok(url) => {
            let journal = NatsJournal::connect(NatsConfig::with_url(&url))
                .await
                .context("Failed to connect to NATS")?;
            Ok(Box::new(journal))
        }
        Err(_) => Ok(Box::new(TracingJournal)),
    }
}

#[cfg(not(feature = "nats"))]
async fn journal() -> Result<Box<dyn JournalSink>> {
    Ok(Box::new(TracingJournal))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = StackConfig::from_env().context("Failed to load stack configuration")?;
    info!(
        "Planning stack {} ({}, {} zones)",
        config.network_name, config.cidr_block, config.availability_zone_count
    );

    let engine = Arc::new(InMemoryEngine::new());
    let stack = assemble(&config, engine.clone()).context("Failed to assemble stack")?;

    let journal = journal().await?;
    let outputs = stack
        .apply(journal.as_ref())
        .await
        .context("Failed to apply stack")?;

    let report = json!({
        "outputs": outputs,
        "resources": stack.graph(),
        "trust": stack.trust_edges().iter().map(|e| e.to_string()).collect::<Vec<_>>(),
        "plan": stack.network().plan(),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);

    info!("Dry run created {} resources", engine.created().await.len());
    Ok(())
}
