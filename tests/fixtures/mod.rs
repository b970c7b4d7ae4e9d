// Copyright (c) 2025 - Cowboy AI, Inc.
//! Test Fixtures for cim-network-stack
//!
//! Deterministic configurations and engines shared by the integration tests.
//!
//! # Design Principles
//! - Fixtures are the only place that builds configurations and engines
//! - Every engine is an `InMemoryEngine`, so ids and addresses are stable
//! - Helpers panic on invalid fixture data instead of returning errors

#![allow(dead_code)]

use std::sync::Arc;

use cim_network_stack::domain::ResourceName;
use cim_network_stack::journal::MemoryJournal;
use cim_network_stack::stack::InMemoryEngine;
use cim_network_stack::{assemble, AssembledStack, StackConfig};

pub const NETWORK_NAME: &str = "my-network";
pub const SSH_KEY_NAME: &str = "ops-key";

pub const ZONES: [&str; 3] = ["eu-central-1a", "eu-central-1b", "eu-central-1c"];

/// Parse a resource name from fixture data
pub fn name(s: &str) -> ResourceName {
    ResourceName::new(s).expect("Invalid resource name in test fixture")
}

/// Default single-zone configuration with a key pair
pub fn config() -> StackConfig {
    StackConfig::default().with_ssh_key(SSH_KEY_NAME)
}

/// Configuration spread over `zones` availability zones
pub fn multi_zone_config(zones: usize) -> StackConfig {
    StackConfig {
        availability_zone_count: zones,
        ..config()
    }
}

/// Engine with the fixture zones
pub fn engine() -> Arc<InMemoryEngine> {
    Arc::new(InMemoryEngine::new().with_zones(ZONES))
}

/// Assemble the stack against a fresh fixture engine
pub fn assembled(config: &StackConfig) -> (AssembledStack, Arc<InMemoryEngine>) {
    let engine = engine();
    let stack = assemble(config, engine.clone()).expect("Fixture stack failed to assemble");
    (stack, engine)
}

/// Assemble and apply, returning the journal too
pub async fn applied(config: &StackConfig) -> (AssembledStack, Arc<InMemoryEngine>, MemoryJournal) {
    let (stack, engine) = assembled(config);
    let journal = MemoryJournal::new();
    stack
        .apply(&journal)
        .await
        .expect("Fixture stack failed to apply");
    (stack, engine, journal)
}
