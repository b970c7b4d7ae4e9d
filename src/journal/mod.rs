// Copyright (c) 2025 - Cowboy AI, Inc.
//! Apply Journal
//!
//! Records what happened while a stack was applied. The journal is an
//! observer: a sink failure aborts the apply, but sinks never influence
//! what gets created.
//!
//! # Sinks
//!
//! - [`MemoryJournal`] - keeps events in memory (tests, dry runs)
//! - [`TracingJournal`] - emits each event as a structured log line
//! - `NatsJournal` - publishes to `stack.{name}.{event}` (feature `nats`)

pub mod events;
#[cfg(feature = "nats")]
pub mod nats;

pub use events::{ResourceDeclared, ResourceProvisioned, StackApplied, StackEvent};
#[cfg(feature = "nats")]
pub use nats::{NatsConfig, NatsJournal};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::info;

use crate::errors::StackResult;

/// Destination for stack events
#[async_trait]
pub trait JournalSink: Send + Sync {
    /// Record one event
    async fn record(&self, event: &StackEvent) -> StackResult<()>;
}

/// In-memory journal
#[derive(Debug, Default)]
pub struct MemoryJournal {
    events: Mutex<Vec<StackEvent>>,
}

impl MemoryJournal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorded events in recording order
    pub async fn events(&self) -> Vec<StackEvent> {
        self.events.lock().await.clone()
    }
}

#[async_trait]
impl JournalSink for MemoryJournal {
    async fn record(&self, event: &StackEvent) -> StackResult<()> {
        self.events.lock().await.push(event.clone());
        Ok(())
    }
}

/// Journal that only logs
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingJournal;

#[async_trait]
impl JournalSink for TracingJournal {
    async fn record(&self, event: &StackEvent) -> StackResult<()> {
        match event {
            StackEvent::ResourceDeclared(e) => {
                info!(stack = %e.stack_name, kind = %e.kind, name = %e.name, "resource declared")
            }
            StackEvent::ResourceProvisioned(e) => info!(
                stack = %e.stack_name,
                kind = %e.kind,
                name = %e.name,
                id = %e.resource_id,
                "resource provisioned"
            ),
            StackEvent::StackApplied(e) => {
                info!(stack = %e.stack_name, resources = e.resource_count, "stack applied")
            }
        }
        Ok(())
    }
}
