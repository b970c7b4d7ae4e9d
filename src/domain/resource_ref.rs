// Copyright (c) 2025 - Cowboy AI, Inc.
//! Stack-Scoped Resource Reference
//!
//! Names are only unique within one stack. A [`ResourceRef`] pairs the name
//! with the id of the stack that declared it, so two stacks that both
//! declare `net-public-subnet` never satisfy each other's dependencies.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::ResourceName;

/// A resource as identified by its owning stack and its logical name
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceRef {
    stack_id: Uuid,
    name: ResourceName,
}

impl ResourceRef {
    pub fn new(stack_id: Uuid, name: ResourceName) -> Self {
        Self { stack_id, name }
    }

    /// Id of the stack that declared the resource
    pub fn stack_id(&self) -> Uuid {
        self.stack_id
    }

    pub fn name(&self) -> &ResourceName {
        &self.name
    }

    /// Whether this resource belongs to the stack `stack_id`
    pub fn is_owned_by(&self, stack_id: Uuid) -> bool {
        self.stack_id == stack_id
    }

    pub fn into_name(self) -> ResourceName {
        self.name
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.stack_id)
    }
}
