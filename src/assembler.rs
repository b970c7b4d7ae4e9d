// Copyright (c) 2025 - Cowboy AI, Inc.
//! Stack Assembler
//!
//! Composes the layers in order and exposes the two public addresses.
//!
//! ```text
//! StackConfig ─validate─▶ AddressPlanner ─▶ NetworkTopology
//!                                               │
//!                                   SecurityPolicyGraph
//!                                               │
//!                                   ComputeProvisioner
//!                                               │
//!                          bastionPublicIp, nginxPublicIp
//! ```
//!
//! Configuration and planning errors surface from [`assemble`] before the
//! engine sees anything; engine errors surface from
//! [`AssembledStack::apply`].

use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::sync::Arc;
use tracing::info;

use crate::compute::{ComputeProvisioner, Instance, InstanceRole};
use crate::config::StackConfig;
use crate::domain::invariants::validate_port_open;
use crate::errors::{StackError, StackResult};
use crate::journal::JournalSink;
use crate::output::{self, Output};
use crate::planner::SubnetVisibility;
use crate::security::{build_security_groups, trust_edges, SecurityGroups, TrustEdge};
use crate::stack::{GraphNode, ProvisioningEngine, Stack};
use crate::topology::{build_network, Network};

/// The stack's external outputs, still deferred
#[derive(Debug, Clone)]
pub struct StackOutputs {
    pub bastion_public_ip: Output<Ipv4Addr>,
    pub nginx_public_ip: Output<Ipv4Addr>,
}

impl StackOutputs {
    /// Wait for both addresses
    pub async fn resolve(&self) -> StackResult<ResolvedOutputs> {
        let both = output::apply2(
            self.bastion_public_ip.clone(),
            self.nginx_public_ip.clone(),
            |bastion_public_ip, nginx_public_ip| ResolvedOutputs {
                bastion_public_ip,
                nginx_public_ip,
            },
        );
        both.resolve().await
    }
}

/// The stack's external outputs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedOutputs {
    pub bastion_public_ip: Ipv4Addr,
    pub nginx_public_ip: Ipv4Addr,
}

/// The three tier instances
#[derive(Debug, Clone)]
pub struct Instances {
    pub bastion: Instance,
    pub web_front: Instance,
    pub database: Instance,
}

impl Instances {
    pub fn for_role(&self, role: InstanceRole) -> &Instance {
        match role {
            InstanceRole::Bastion => &self.bastion,
            InstanceRole::WebFront => &self.web_front,
            InstanceRole::Database => &self.database,
        }
    }
}

/// A fully declared three-tier stack
#[derive(Debug)]
pub struct AssembledStack {
    stack: Stack,
    network: Network,
    security_groups: SecurityGroups,
    instances: Instances,
    outputs: StackOutputs,
}

impl AssembledStack {
    pub fn stack(&self) -> &Stack {
        &self.stack
    }

    pub fn network(&self) -> &Network {
        &self.network
    }

    pub fn security_groups(&self) -> &SecurityGroups {
        &self.security_groups
    }

    pub fn instances(&self) -> &Instances {
        &self.instances
    }

    pub fn outputs(&self) -> &StackOutputs {
        &self.outputs
    }

    /// Declaration graph
    pub fn graph(&self) -> Vec<GraphNode> {
        self.stack.graph()
    }

    /// Security allow-graph
    pub fn trust_edges(&self) -> Vec<TrustEdge> {
        trust_edges(&self.security_groups)
    }

    /// Provision everything and resolve the outputs
    pub async fn apply(&self, journal: &dyn JournalSink) -> StackResult<ResolvedOutputs> {
        self.stack.apply(journal).await?;
        let outputs = self.outputs.resolve().await?;
        info!(
            "Stack {} outputs: bastionPublicIp={} nginxPublicIp={}",
            self.stack.name(),
            outputs.bastion_public_ip,
            outputs.nginx_public_ip
        );
        Ok(outputs)
    }
}

/// Check that each role's service port is open in the role's group
fn check_service_ports(groups: &SecurityGroups) -> StackResult<()> {
    for role in InstanceRole::ALL {
        let group = groups.for_role(role);
        validate_port_open(
            group.name().as_str(),
            role.service_port(),
            &group.spec().open_tcp_ranges(),
        )?;
    }
    Ok(())
}

/// Declare the whole stack
///
/// # Errors
///
/// - `Configuration` / `InvalidCidr` from [`StackConfig::validate`], before
///   anything is declared
/// - `AddressSpaceExhausted` from planning
/// - `InvariantViolation` if a routing or trust rule does not hold
/// - `Provision` / `DependencyUnresolved` from layer wiring
pub fn assemble(config: &StackConfig, engine: Arc<dyn ProvisioningEngine>) -> StackResult<AssembledStack> {
    config.validate()?;
    let topology = config.topology()?;

    let mut stack = Stack::new(topology.name.as_str(), engine);
    let network = build_network(&mut stack, &topology)?;
    let security_groups = build_security_groups(&mut stack, &network)?;
    check_service_ports(&security_groups)?;

    let public_subnet = network
        .subnet(0, SubnetVisibility::Public)
        .ok_or_else(|| StackError::unresolved(network.name(), "public subnet"))?;
    let private_subnet = network
        .subnet(0, SubnetVisibility::Private)
        .ok_or_else(|| StackError::unresolved(network.name(), "private subnet"))?;

    let compute = ComputeProvisioner::new(&stack, &config.compute());
    let bastion = compute.create(
        &mut stack,
        InstanceRole::Bastion,
        public_subnet,
        &[&security_groups.bastion],
        config.ssh_key(),
    )?;
    let web_front = compute.create(
        &mut stack,
        InstanceRole::WebFront,
        public_subnet,
        &[&security_groups.web_front],
        None,
    )?;
    let database = compute.create(
        &mut stack,
        InstanceRole::Database,
        private_subnet,
        &[&security_groups.database],
        None,
    )?;

    let outputs = StackOutputs {
        bastion_public_ip: bastion.public_ip(),
        nginx_public_ip: web_front.public_ip(),
    };

    info!(
        "Assembled stack {}: {} resources declared",
        stack.name(),
        stack.declarations().len()
    );

    Ok(AssembledStack {
        stack,
        network,
        security_groups,
        instances: Instances {
            bastion,
            web_front,
            database,
        },
        outputs,
    })
}
