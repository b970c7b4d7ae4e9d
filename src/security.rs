// Copyright (c) 2025 - Cowboy AI, Inc.
//! Security Policy Graph
//!
//! Security groups for the three tiers and the trust edges between them.
//!
//! ```text
//! 0.0.0.0/0 ──tcp/22───▶ bastion-sg
//! 0.0.0.0/0 ──tcp/80───▶ nginx-sg ──tcp/5432──▶ pg-sg
//! ```
//!
//! Every group allows all egress. The database group admits traffic only
//! from the web-front group; that is checked on the group spec before the
//! group is declared.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use tracing::info;

use crate::compute::InstanceRole;
use crate::domain::invariants::{validate_group_sources_only, validate_trusted_source};
use crate::domain::{CidrBlock, ResourceKind, ResourceName};
use crate::errors::{StackError, StackResult};
use crate::output::{self, Output};
use crate::stack::{Properties, ResourceHandle, Stack};
use crate::topology::Network;

/// Traffic protocol of a rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Protocol {
    #[serde(rename = "tcp")]
    Tcp,
    #[serde(rename = "udp")]
    Udp,
    /// Every protocol, written `-1` on the wire
    #[serde(rename = "-1")]
    All,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Tcp => "tcp",
            Protocol::Udp => "udp",
            Protocol::All => "-1",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Inclusive port range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortRange {
    from_port: u16,
    to_port: u16,
}

impl PortRange {
    pub fn new(from_port: u16, to_port: u16) -> StackResult<Self> {
        if from_port > to_port {
            return Err(StackError::Configuration(format!(
                "port range {from_port}-{to_port} is inverted"
            )));
        }
        Ok(Self { from_port, to_port })
    }

    pub fn single(port: u16) -> Self {
        Self {
            from_port: port,
            to_port: port,
        }
    }

    /// The `0-0` range used with protocol `-1`
    pub fn any() -> Self {
        Self::single(0)
    }

    pub fn from_port(&self) -> u16 {
        self.from_port
    }

    pub fn to_port(&self) -> u16 {
        self.to_port
    }
}

impl fmt::Display for PortRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.from_port == self.to_port {
            write!(f, "{}", self.from_port)
        } else {
            write!(f, "{}-{}", self.from_port, self.to_port)
        }
    }
}

/// Who a rule admits (ingress) or reaches (egress)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleSource {
    Cidr(CidrBlock),
    /// Members of another security group in the same stack
    Group(ResourceName),
}

impl fmt::Display for RuleSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleSource::Cidr(block) => write!(f, "{block}"),
            RuleSource::Group(name) => write!(f, "{name}"),
        }
    }
}

/// One allow rule
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SecurityRule {
    pub protocol: Protocol,
    pub ports: PortRange,
    pub source: RuleSource,
}

impl SecurityRule {
    /// tcp on a single port
    pub fn tcp(port: u16, source: RuleSource) -> Self {
        Self {
            protocol: Protocol::Tcp,
            ports: PortRange::single(port),
            source,
        }
    }

    /// All protocols, all ports, anywhere
    pub fn allow_all() -> Self {
        Self {
            protocol: Protocol::All,
            ports: PortRange::any(),
            source: RuleSource::Cidr(CidrBlock::anywhere()),
        }
    }

    /// Whether this rule admits tcp traffic on `port`
    pub fn admits_tcp(&self, port: u16) -> bool {
        match self.protocol {
            Protocol::Tcp => self.ports.from_port <= port && port <= self.ports.to_port,
            Protocol::All => true,
            Protocol::Udp => false,
        }
    }

    /// Provider body of the rule, with group sources resolved to ids
    fn body(&self, groups: &[&SecurityGroup]) -> StackResult<Output<Value>> {
        let protocol = self.protocol.as_str();
        let (from_port, to_port) = (self.ports.from_port, self.ports.to_port);

        match &self.source {
            RuleSource::Cidr(block) => Ok(Output::known(json!({
                "protocol": protocol,
                "fromPort": from_port,
                "toPort": to_port,
                "cidrBlocks": [block.to_string()],
            }))),
            RuleSource::Group(name) => {
                let group = groups
                    .iter()
                    .find(|g| g.name() == name)
                    .ok_or_else(|| StackError::unresolved(name, "security group id"))?;
                Ok(group.id().map(move |id| {
                    json!({
                        "protocol": protocol,
                        "fromPort": from_port,
                        "toPort": to_port,
                        "securityGroups": [id],
                    })
                }))
            }
        }
    }
}

/// Planned security group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityGroupSpec {
    pub name: ResourceName,
    pub description: String,
    pub ingress: Vec<SecurityRule>,
    pub egress: Vec<SecurityRule>,
}

impl SecurityGroupSpec {
    /// Number of ingress rules admitting a CIDR block
    pub fn cidr_sources(&self) -> usize {
        self.ingress
            .iter()
            .filter(|r| matches!(r.source, RuleSource::Cidr(_)))
            .count()
    }

    /// Security groups this group admits traffic from
    pub fn group_sources(&self) -> Vec<&ResourceName> {
        self.ingress
            .iter()
            .filter_map(|r| match &r.source {
                RuleSource::Group(name) => Some(name),
                RuleSource::Cidr(_) => None,
            })
            .collect()
    }

    /// Whether some ingress rule admits tcp on `port`
    pub fn admits_tcp(&self, port: u16) -> bool {
        self.ingress.iter().any(|r| r.admits_tcp(port))
    }

    /// Inclusive tcp port ranges open for ingress
    pub fn open_tcp_ranges(&self) -> Vec<(u16, u16)> {
        self.ingress
            .iter()
            .filter_map(|r| match r.protocol {
                Protocol::Tcp => Some((r.ports.from_port, r.ports.to_port)),
                Protocol::All => Some((0, u16::MAX)),
                Protocol::Udp => None,
            })
            .collect()
    }
}

fn group_name(role: InstanceRole) -> StackResult<ResourceName> {
    Ok(ResourceName::new(role.security_group_name())?)
}

/// Internet → bastion on tcp/22
pub fn bastion_group_spec() -> StackResult<SecurityGroupSpec> {
    let role = InstanceRole::Bastion;
    Ok(SecurityGroupSpec {
        name: group_name(role)?,
        description: "Allow SSH access to Bastion host".to_string(),
        ingress: vec![SecurityRule::tcp(
            role.service_port(),
            RuleSource::Cidr(CidrBlock::anywhere()),
        )],
        egress: vec![SecurityRule::allow_all()],
    })
}

/// Internet → web front on tcp/80
pub fn web_front_group_spec() -> StackResult<SecurityGroupSpec> {
    let role = InstanceRole::WebFront;
    Ok(SecurityGroupSpec {
        name: group_name(role)?,
        description: "Allow HTTP access to Nginx server".to_string(),
        ingress: vec![SecurityRule::tcp(
            role.service_port(),
            RuleSource::Cidr(CidrBlock::anywhere()),
        )],
        egress: vec![SecurityRule::allow_all()],
    })
}

/// `trusted` group → database on tcp/5432, nothing else
pub fn database_group_spec(trusted: &ResourceName) -> StackResult<SecurityGroupSpec> {
    let role = InstanceRole::Database;
    Ok(SecurityGroupSpec {
        name: group_name(role)?,
        description: "Allow PostgreSQL access only from Nginx server".to_string(),
        ingress: vec![SecurityRule::tcp(
            role.service_port(),
            RuleSource::Group(trusted.clone()),
        )],
        egress: vec![SecurityRule::allow_all()],
    })
}

/// A declared security group
#[derive(Debug, Clone)]
pub struct SecurityGroup {
    spec: SecurityGroupSpec,
    handle: ResourceHandle,
}

impl SecurityGroup {
    pub fn id(&self) -> Output<String> {
        self.handle.id()
    }

    pub fn name(&self) -> &ResourceName {
        self.handle.name()
    }

    pub fn spec(&self) -> &SecurityGroupSpec {
        &self.spec
    }

    pub fn handle(&self) -> &ResourceHandle {
        &self.handle
    }
}

/// Declare one security group in the VPC
///
/// Group sources are resolved against `groups`, which must already be
/// declared in the stack.
pub fn declare_security_group(
    stack: &mut Stack,
    vpc_id: Output<String>,
    spec: SecurityGroupSpec,
    groups: &[&SecurityGroup],
) -> StackResult<SecurityGroup> {
    let ingress = spec
        .ingress
        .iter()
        .map(|rule| rule.body(groups))
        .collect::<StackResult<Vec<_>>>()?;
    let egress = spec
        .egress
        .iter()
        .map(|rule| rule.body(groups))
        .collect::<StackResult<Vec<_>>>()?;

    let handle = stack.declare(
        ResourceKind::SecurityGroup,
        spec.name.clone(),
        Properties::new()
            .set_output("vpcId", vpc_id)
            .set("description", &spec.description)
            .set_output("ingress", output::all(ingress))
            .set_output("egress", output::all(egress)),
    )?;

    Ok(SecurityGroup { spec, handle })
}

/// The three tier groups
#[derive(Debug, Clone)]
pub struct SecurityGroups {
    pub bastion: SecurityGroup,
    pub web_front: SecurityGroup,
    pub database: SecurityGroup,
}

impl SecurityGroups {
    /// Group guarding a role
    pub fn for_role(&self, role: InstanceRole) -> &SecurityGroup {
        match role {
            InstanceRole::Bastion => &self.bastion,
            InstanceRole::WebFront => &self.web_front,
            InstanceRole::Database => &self.database,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &SecurityGroup> {
        [&self.bastion, &self.web_front, &self.database].into_iter()
    }
}

/// Declare the tier groups in the network's VPC
///
/// # Errors
///
/// - `InvariantViolation` if the database group admits a CIDR source or any
///   group other than the web front
pub fn build_security_groups(stack: &mut Stack, network: &Network) -> StackResult<SecurityGroups> {
    let bastion = declare_security_group(stack, network.vpc_id(), bastion_group_spec()?, &[])?;
    let web_front = declare_security_group(stack, network.vpc_id(), web_front_group_spec()?, &[])?;

    let database_spec = database_group_spec(web_front.name())?;
    let sources: Vec<String> = database_spec
        .group_sources()
        .iter()
        .map(|n| n.to_string())
        .collect();
    validate_group_sources_only(database_spec.name.as_str(), database_spec.cidr_sources())?;
    validate_trusted_source(database_spec.name.as_str(), &sources, web_front.name().as_str())?;

    let database = declare_security_group(stack, network.vpc_id(), database_spec, &[&web_front])?;

    info!(
        "Declared security groups {}, {}, {}",
        bastion.name(),
        web_front.name(),
        database.name()
    );

    Ok(SecurityGroups {
        bastion,
        web_front,
        database,
    })
}

/// One allowed flow into a group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustEdge {
    pub source: RuleSource,
    pub target: ResourceName,
    pub protocol: Protocol,
    pub ports: PortRange,
}

impl fmt::Display for TrustEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -> {} ({}/{})",
            self.source, self.target, self.protocol, self.ports
        )
    }
}

/// The ingress allow-graph of the tier groups
pub fn trust_edges(groups: &SecurityGroups) -> Vec<TrustEdge> {
    groups
        .iter()
        .flat_map(|group| {
            group.spec().ingress.iter().map(|rule| TrustEdge {
                source: rule.source.clone(),
                target: group.name().clone(),
                protocol: rule.protocol,
                ports: rule.ports,
            })
        })
        .collect()
}
