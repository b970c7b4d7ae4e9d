// Copyright (c) 2025 - Cowboy AI, Inc.
//! Network Stack Domain Models
//!
//! Value objects and pure rules shared by every layer of the stack.
//!
//! # Value Objects with Invariants
//!
//! - [`CidrBlock`] - canonical IPv4 block in prefix notation
//! - [`DefaultRoute`] - gateway a subnet's default route targets
//! - [`ResourceName`] - validated logical resource name
//! - [`ResourceRef`] - resource name scoped to the stack that declared it
//! - [`ResourceKind`] - taxonomy of declarable cloud resources
//!
//! # Invariants
//!
//! [`invariants`] holds the address, routing and trust rules, checked on
//! planned data before any resource is declared.

pub mod invariants;
pub mod network;
pub mod resource_kind;
pub mod resource_name;
pub mod resource_ref;

pub use invariants::{ValidationError, ValidationResult};
pub use network::{CidrBlock, DefaultRoute, NetworkError};
pub use resource_kind::ResourceKind;
pub use resource_name::{ResourceName, ResourceNameError};
pub use resource_ref::ResourceRef;
