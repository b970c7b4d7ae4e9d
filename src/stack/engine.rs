// Copyright (c) 2025 - Cowboy AI, Inc.
//! Provisioning Engine Port
//!
//! The boundary between the topology model and whatever actually creates
//! cloud resources. The engine sees only fully resolved property maps:
//! all deferred inputs have been awaited by the [`Stack`](super::Stack)
//! before `create` is called, so an engine never has to reason about
//! ordering.
//!
//! # Contract
//!
//! ```text
//! create(kind, name, properties) → { id, attributes }
//! lookup(query)                  → value
//! ```
//!
//! Reconciliation, diffing and rollback are the engine's business.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::compute::ImageFilter;
use crate::domain::{ResourceKind, ResourceName};
use crate::errors::StackResult;

/// A fully resolved resource body handed to the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceRequest {
    /// What to create
    pub kind: ResourceKind,

    /// Logical name, unique within the stack
    pub name: ResourceName,

    /// Resolved property mapping (camelCase provider keys)
    pub properties: Map<String, Value>,
}

/// What the engine hands back for a created resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvisionedResource {
    /// Resource kind
    pub kind: ResourceKind,

    /// Logical name
    pub name: ResourceName,

    /// Provider-assigned identifier
    pub id: String,

    /// Provider-reported attributes (`publicIp`, `arn`, ...)
    #[serde(default)]
    pub attributes: Map<String, Value>,
}

/// External lookups a stack may need
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LookupQuery {
    /// Availability zones of the target region in the given state
    AvailabilityZones { state: String },

    /// Image matching a filter
    LatestImage(ImageFilter),
}

impl LookupQuery {
    /// Zones currently accepting resources
    pub fn available_zones() -> Self {
        LookupQuery::AvailabilityZones {
            state: "available".to_string(),
        }
    }
}

impl fmt::Display for LookupQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LookupQuery::AvailabilityZones { state } => write!(f, "availability-zones({state})"),
            LookupQuery::LatestImage(filter) => {
                write!(f, "image({} from {})", filter.name_pattern, filter.owners.join(","))
            }
        }
    }
}

/// Provisioning engine trait
///
/// Implementations may run `create` calls concurrently; the stack only
/// calls `create` for a resource after everything it consumes has been
/// created.
#[async_trait]
pub trait ProvisioningEngine: Send + Sync {
    /// Create one resource from a resolved body
    ///
    /// # Errors
    ///
    /// - `Provision` if the body is rejected; the reason is surfaced verbatim
    async fn create(&self, request: ResourceRequest) -> StackResult<ProvisionedResource>;

    /// Answer an external lookup
    ///
    /// Zone lookups return `{"names": [..]}`, image lookups return
    /// `{"id": "...", "name": "..."}`.
    async fn lookup(&self, query: &LookupQuery) -> StackResult<Value>;

    /// Engine name, for logs
    fn name(&self) -> &str;
}
