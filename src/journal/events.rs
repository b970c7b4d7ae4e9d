// Copyright (c) 2025 - Cowboy AI, Inc.
//! Stack Lifecycle Events
//!
//! Immutable facts recorded while a stack is applied. Every event carries
//! a UUID v7 id (time ordered) and the run id of the stack that emitted it,
//! which doubles as the correlation id for the whole apply.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

use crate::domain::{ResourceKind, ResourceName};
use crate::stack::{Declaration, ProvisionedResource};

/// Events emitted during `Stack::apply`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StackEvent {
    /// A resource is part of the stack
    ResourceDeclared(ResourceDeclared),

    /// The engine created a resource
    ResourceProvisioned(ResourceProvisioned),

    /// Every declared resource was created
    StackApplied(StackApplied),
}

/// A resource was declared
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceDeclared {
    /// Unique event identifier (UUID v7 for time ordering)
    pub event_id: Uuid,

    /// Stack run this event belongs to
    pub stack_id: Uuid,
    pub stack_name: String,
    pub timestamp: DateTime<Utc>,

    pub kind: ResourceKind,
    pub name: ResourceName,

    /// Resources whose outputs this one consumes
    pub depends_on: BTreeSet<ResourceName>,
}

/// A resource was created by the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceProvisioned {
    pub event_id: Uuid,
    pub stack_id: Uuid,
    pub stack_name: String,
    pub timestamp: DateTime<Utc>,

    pub kind: ResourceKind,
    pub name: ResourceName,

    /// Provider-assigned identifier
    pub resource_id: String,
}

/// The stack finished applying
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackApplied {
    pub event_id: Uuid,
    pub stack_id: Uuid,
    pub stack_name: String,
    pub timestamp: DateTime<Utc>,

    /// Number of resources created
    pub resource_count: usize,
}

impl StackEvent {
    pub fn declared(stack_id: Uuid, stack_name: &str, declaration: &Declaration) -> Self {
        StackEvent::ResourceDeclared(ResourceDeclared {
            event_id: Uuid::now_v7(),
            stack_id,
            stack_name: stack_name.to_string(),
            timestamp: Utc::now(),
            kind: declaration.kind,
            name: declaration.name.clone(),
            depends_on: declaration.depends_on.clone(),
        })
    }

    pub fn provisioned(stack_id: Uuid, stack_name: &str, resource: &ProvisionedResource) -> Self {
        StackEvent::ResourceProvisioned(ResourceProvisioned {
            event_id: Uuid::now_v7(),
            stack_id,
            stack_name: stack_name.to_string(),
            timestamp: Utc::now(),
            kind: resource.kind,
            name: resource.name.clone(),
            resource_id: resource.id.clone(),
        })
    }

    pub fn applied(stack_id: Uuid, stack_name: &str, resource_count: usize) -> Self {
        StackEvent::StackApplied(StackApplied {
            event_id: Uuid::now_v7(),
            stack_id,
            stack_name: stack_name.to_string(),
            timestamp: Utc::now(),
            resource_count,
        })
    }

    /// Get the event ID
    pub fn event_id(&self) -> Uuid {
        match self {
            StackEvent::ResourceDeclared(e) => e.event_id,
            StackEvent::ResourceProvisioned(e) => e.event_id,
            StackEvent::StackApplied(e) => e.event_id,
        }
    }

    /// Get the stack run ID
    pub fn stack_id(&self) -> Uuid {
        match self {
            StackEvent::ResourceDeclared(e) => e.stack_id,
            StackEvent::ResourceProvisioned(e) => e.stack_id,
            StackEvent::StackApplied(e) => e.stack_id,
        }
    }

    /// Get the stack name
    pub fn stack_name(&self) -> &str {
        match self {
            StackEvent::ResourceDeclared(e) => &e.stack_name,
            StackEvent::ResourceProvisioned(e) => &e.stack_name,
            StackEvent::StackApplied(e) => &e.stack_name,
        }
    }

    /// Short event name, used as the last subject token
    pub fn event_type(&self) -> &'static str {
        match self {
            StackEvent::ResourceDeclared(_) => "declared",
            StackEvent::ResourceProvisioned(_) => "provisioned",
            StackEvent::StackApplied(_) => "applied",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_applied_event_serialization() {
        let stack_id = Uuid::now_v7();
        let event = StackEvent::applied(stack_id, "my-network", 17);

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "stack_applied");
        assert_eq!(json["resource_count"], 17);

        let back: StackEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
        assert_eq!(back.stack_id(), stack_id);
        assert_eq!(back.event_type(), "applied");
    }
}
