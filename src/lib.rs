//! Three-tier network stack for the Composable Information Machine
//!
//! Declares a VPC with public and private subnets, NAT and Internet Gateway
//! routing, layered security groups and three instances (bastion, web
//! front, database) against a provisioning engine. Identifiers come back
//! asynchronously as [`Output`] values; every consumed output becomes a
//! dependency edge in the [`Stack`].
//!
//! ```rust
//! use std::sync::Arc;
//! use cim_network_stack::{assemble, InMemoryEngine, MemoryJournal, StackConfig};
//!
//! # tokio_test::block_on(async {
//! let config = StackConfig::default().with_ssh_key("ops-key");
//! let stack = assemble(&config, Arc::new(InMemoryEngine::new())).unwrap();
//! let outputs = stack.apply(&MemoryJournal::new()).await.unwrap();
//! println!("bastion at {}", outputs.bastion_public_ip);
//! # });
//! ```

pub mod assembler;
pub mod compute;
pub mod config;
pub mod domain;
pub mod errors;
pub mod journal;
pub mod output;
pub mod planner;
pub mod security;
pub mod stack;
pub mod topology;

// Re-export commonly used types
pub use assembler::{assemble, AssembledStack, ResolvedOutputs, StackOutputs};
pub use compute::{ComputeProvisioner, Instance, InstanceRole};
pub use config::StackConfig;
pub use domain::{CidrBlock, ResourceKind, ResourceName, ResourceRef};
pub use errors::{StackError, StackResult};
pub use journal::{JournalSink, MemoryJournal, StackEvent, TracingJournal};
pub use output::Output;
pub use planner::{plan_addresses, AddressLayout, AddressPlan};
pub use security::{build_security_groups, SecurityGroups};
pub use stack::{InMemoryEngine, ProvisioningEngine, Stack};
pub use topology::{build_network, Network};
