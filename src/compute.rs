// Copyright (c) 2025 - Cowboy AI, Inc.
//! Compute Provisioner
//!
//! Declares the three tier instances. Each role fixes its subnet placement,
//! whether it gets a public address, the port its service listens on and
//! the bootstrap script it runs at first boot.
//!
//! | Role     | Placement | Public IP | Port | Bootstrap          |
//! |----------|-----------|-----------|------|--------------------|
//! | Bastion  | public    | yes       | 22   | none (key pair)    |
//! | WebFront | public    | yes       | 80   | nginx              |
//! | Database | private   | no        | 5432 | PostgreSQL 12      |
//!
//! The base image is looked up once per provisioner and shared by every
//! instance it declares.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::net::Ipv4Addr;
use tracing::info;
use uuid::Uuid;

use crate::domain::{ResourceKind, ResourceName};
use crate::errors::{StackError, StackResult};
use crate::output::{self, Output};
use crate::planner::SubnetVisibility;
use crate::security::SecurityGroup;
use crate::stack::{LookupQuery, Properties, ResourceHandle, Stack};
use crate::topology::Subnet;

/// Default instance size
pub const DEFAULT_INSTANCE_TYPE: &str = "t3.micro";

/// Tier an instance serves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceRole {
    Bastion,
    WebFront,
    Database,
}

impl InstanceRole {
    pub const ALL: [InstanceRole; 3] = [
        InstanceRole::Bastion,
        InstanceRole::WebFront,
        InstanceRole::Database,
    ];

    /// Port the role's service listens on
    pub fn service_port(&self) -> u16 {
        match self {
            InstanceRole::Bastion => 22,
            InstanceRole::WebFront => self.bootstrap().map_or(80, |b| b.service_port()),
            InstanceRole::Database => self.bootstrap().map_or(5432, |b| b.service_port()),
        }
    }

    /// Subnet visibility the role must be placed in
    pub fn placement(&self) -> SubnetVisibility {
        match self {
            InstanceRole::Bastion | InstanceRole::WebFront => SubnetVisibility::Public,
            InstanceRole::Database => SubnetVisibility::Private,
        }
    }

    /// Whether the instance gets a public address
    pub fn assigns_public_ip(&self) -> bool {
        self.placement().is_public()
    }

    /// Whether the instance needs an SSH key pair
    pub fn requires_key(&self) -> bool {
        matches!(self, InstanceRole::Bastion)
    }

    pub fn bootstrap(&self) -> Option<BootstrapScript> {
        match self {
            InstanceRole::Bastion => None,
            InstanceRole::WebFront => Some(BootstrapScript::Nginx),
            InstanceRole::Database => Some(BootstrapScript::Postgres12),
        }
    }

    pub fn default_name(&self) -> &'static str {
        match self {
            InstanceRole::Bastion => "bastion-host",
            InstanceRole::WebFront => "nginx-instance",
            InstanceRole::Database => "pg-instance",
        }
    }

    pub fn security_group_name(&self) -> &'static str {
        match self {
            InstanceRole::Bastion => "bastion-sg",
            InstanceRole::WebFront => "nginx-sg",
            InstanceRole::Database => "pg-sg",
        }
    }
}

impl fmt::Display for InstanceRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstanceRole::Bastion => write!(f, "bastion"),
            InstanceRole::WebFront => write!(f, "web-front"),
            InstanceRole::Database => write!(f, "database"),
        }
    }
}

/// First-boot shell script, passed to the instance unchanged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BootstrapScript {
    /// Install and enable nginx
    Nginx,
    /// Install, initialise and enable PostgreSQL 12
    Postgres12,
}

impl BootstrapScript {
    pub fn script(&self) -> &'static str {
        match self {
            BootstrapScript::Nginx => concat!(
                "#!/bin/bash\n",
                "sudo yum update -y\n",
                "sudo amazon-linux-extras install nginx1 -y\n",
                "sudo systemctl start nginx\n",
                "sudo systemctl enable nginx\n",
            ),
            BootstrapScript::Postgres12 => concat!(
                "#!/bin/bash\n",
                "sudo yum update -y\n",
                "sudo amazon-linux-extras install postgresql12 -y\n",
                "sudo yum install postgresql12-server -y\n",
                "sudo /usr/pgsql-12/bin/postgresql-12-setup initdb\n",
                "sudo systemctl start postgresql-12\n",
                "sudo systemctl enable postgresql-12\n",
            ),
        }
    }

    /// Port the installed service listens on
    pub fn service_port(&self) -> u16 {
        match self {
            BootstrapScript::Nginx => 80,
            BootstrapScript::Postgres12 => 5432,
        }
    }
}

/// Base image selection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageFilter {
    pub owners: Vec<String>,
    /// Glob over image names
    pub name_pattern: String,
    pub most_recent: bool,
}

impl Default for ImageFilter {
    fn default() -> Self {
        Self {
            owners: vec!["amazon".to_string()],
            name_pattern: "amzn2-ami-hvm-*-x86_64-gp2".to_string(),
            most_recent: true,
        }
    }
}

/// Inputs of the compute layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComputeConfig {
    pub instance_type: String,
    #[serde(default)]
    pub image: ImageFilter,
}

impl Default for ComputeConfig {
    fn default() -> Self {
        Self {
            instance_type: DEFAULT_INSTANCE_TYPE.to_string(),
            image: ImageFilter::default(),
        }
    }
}

/// A declared instance
#[derive(Debug, Clone)]
pub struct Instance {
    role: InstanceRole,
    handle: ResourceHandle,
    subnet: ResourceName,
    security_groups: Vec<ResourceName>,
    public_ip_assigned: bool,
}

impl Instance {
    pub fn role(&self) -> InstanceRole {
        self.role
    }

    pub fn id(&self) -> Output<String> {
        self.handle.id()
    }

    pub fn name(&self) -> &ResourceName {
        self.handle.name()
    }

    pub fn subnet(&self) -> &ResourceName {
        &self.subnet
    }

    pub fn security_groups(&self) -> &[ResourceName] {
        &self.security_groups
    }

    pub fn public_ip_assigned(&self) -> bool {
        self.public_ip_assigned
    }

    /// Public address, once the instance exists
    ///
    /// Fails with `DependencyUnresolved` for instances without one.
    pub fn public_ip(&self) -> Output<Ipv4Addr> {
        if !self.public_ip_assigned {
            return Output::failed(StackError::unresolved(self.name(), "publicIp"));
        }
        let name = self.name().clone();
        self.handle.attribute("publicIp").try_map(move |value| {
            value
                .as_str()
                .and_then(|s| s.parse::<Ipv4Addr>().ok())
                .ok_or_else(|| StackError::unresolved(&name, "publicIp"))
        })
    }
}

/// Declares instances against one resolved base image
#[derive(Debug, Clone)]
pub struct ComputeProvisioner {
    config: ComputeConfig,
    stack_id: Uuid,
    image_id: Output<String>,
}

impl ComputeProvisioner {
    /// Issue the image lookup for this stack
    pub fn new(stack: &Stack, config: &ComputeConfig) -> Self {
        let query = LookupQuery::LatestImage(config.image.clone());
        let label = query.to_string();
        let image_id = stack.lookup(query).try_map(move |value| {
            value
                .get("id")
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| StackError::Lookup {
                    query: label,
                    reason: "no image id in response".to_string(),
                })
        });

        Self {
            config: config.clone(),
            stack_id: stack.id(),
            image_id,
        }
    }

    /// Resolved base image id
    pub fn image_id(&self) -> &Output<String> {
        &self.image_id
    }

    /// Declare the instance for `role` under its default name
    pub fn create(
        &self,
        stack: &mut Stack,
        role: InstanceRole,
        subnet: &Subnet,
        security_groups: &[&SecurityGroup],
        key_name: Option<&str>,
    ) -> StackResult<Instance> {
        let name = ResourceName::new(role.default_name())?;
        self.create_named(stack, name, role, subnet, security_groups, key_name)
    }

    /// Declare an instance for `role`
    ///
    /// # Errors
    ///
    /// - `Provision` if the subnet or a security group is not declared in
    ///   this stack (same-named resources of another stack included), no
    ///   security group is given, the provisioner was built for another
    ///   stack, or the subnet visibility does not match the role's placement
    /// - `Configuration` if the role needs a key pair and none is given
    pub fn create_named(
        &self,
        stack: &mut Stack,
        name: ResourceName,
        role: InstanceRole,
        subnet: &Subnet,
        security_groups: &[&SecurityGroup],
        key_name: Option<&str>,
    ) -> StackResult<Instance> {
        let declared = |handle: &ResourceHandle, kind: ResourceKind| {
            handle.kind() == kind && stack.owns(handle)
        };

        if self.stack_id != stack.id() {
            return Err(StackError::provision(
                &name,
                "image lookup was issued by another stack",
            ));
        }
        if !declared(subnet.handle(), ResourceKind::Subnet) {
            return Err(StackError::provision(
                &name,
                format!("subnet {} is not declared in this stack", subnet.name()),
            ));
        }
        if security_groups.is_empty() {
            return Err(StackError::provision(&name, "no security group given"));
        }
        if let Some(group) = security_groups
            .iter()
            .find(|g| !declared(g.handle(), ResourceKind::SecurityGroup))
        {
            return Err(StackError::provision(
                &name,
                format!("security group {} is not declared in this stack", group.name()),
            ));
        }
        if subnet.visibility() != role.placement() {
            return Err(StackError::provision(
                &name,
                format!(
                    "{} instances belong in a {} subnet, {} is {}",
                    role,
                    role.placement(),
                    subnet.name(),
                    subnet.visibility()
                ),
            ));
        }

        let key_name = key_name.map(str::trim).filter(|k| !k.is_empty());
        if role.requires_key() && key_name.is_none() {
            return Err(StackError::Configuration(format!(
                "{name} requires an SSH key name"
            )));
        }

        let group_ids = output::all(security_groups.iter().map(|g| g.id()).collect());
        let mut properties = Properties::new()
            .set("instanceType", &self.config.instance_type)
            .set_output("subnetId", subnet.id())
            .set_output("vpcSecurityGroupIds", group_ids)
            .set("associatePublicIpAddress", role.assigns_public_ip())
            .set_output("ami", self.image_id.clone());
        if let Some(key) = key_name {
            properties = properties.set("keyName", key);
        }
        if let Some(bootstrap) = role.bootstrap() {
            properties = properties.set("userData", bootstrap.script());
        }

        let handle = stack.declare(ResourceKind::Instance, name, properties)?;
        info!(
            "Declared {} instance {} in {}",
            role,
            handle.name(),
            subnet.name()
        );

        Ok(Instance {
            role,
            subnet: subnet.name().clone(),
            security_groups: security_groups.iter().map(|g| g.name().clone()).collect(),
            public_ip_assigned: role.assigns_public_ip(),
            handle,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::CidrBlock;
    use crate::journal::MemoryJournal;
    use crate::planner::AddressLayout;
    use crate::security::{build_security_groups, SecurityGroups};
    use crate::stack::InMemoryEngine;
    use crate::topology::{build_network, Network, TopologyConfig};
    use std::sync::Arc;
    use test_case::test_case;

    fn setup(engine: Arc<InMemoryEngine>) -> (Stack, Network, SecurityGroups) {
        let mut stack = Stack::new("compute", engine);
        let network = build_network(
            &mut stack,
            &TopologyConfig {
                name: ResourceName::new("net").unwrap(),
                cidr_block: CidrBlock::new("10.0.0.0/16").unwrap(),
                layout: AddressLayout::default(),
            },
        )
        .unwrap();
        let groups = build_security_groups(&mut stack, &network).unwrap();
        (stack, network, groups)
    }

    #[test_case(InstanceRole::Bastion, 22, SubnetVisibility::Public ; "bastion")]
    #[test_case(InstanceRole::WebFront, 80, SubnetVisibility::Public ; "web front")]
    #[test_case(InstanceRole::Database, 5432, SubnetVisibility::Private ; "database")]
    fn test_role_table(role: InstanceRole, port: u16, placement: SubnetVisibility) {
        assert_eq!(role.service_port(), port);
        assert_eq!(role.placement(), placement);
        assert_eq!(role.assigns_public_ip(), placement.is_public());
    }

    #[test]
    fn test_bootstrap_scripts() {
        assert!(BootstrapScript::Nginx.script().contains("systemctl enable nginx"));
        assert!(BootstrapScript::Postgres12
            .script()
            .contains("postgresql-12-setup initdb"));
        assert!(InstanceRole::Bastion.bootstrap().is_none());
    }

    #[test]
    fn test_bastion_requires_key() {
        let (mut stack, network, groups) = setup(Arc::new(InMemoryEngine::new()));
        let compute = ComputeProvisioner::new(&stack, &ComputeConfig::default());
        let subnet = network.public_subnet().unwrap();

        for key in [None, Some(""), Some("   ")] {
            let err = compute
                .create(&mut stack, InstanceRole::Bastion, subnet, &[&groups.bastion], key)
                .unwrap_err();
            assert!(matches!(err, StackError::Configuration(_)));
        }
        assert!(!stack.contains(&ResourceName::new("bastion-host").unwrap()));
    }

    #[test]
    fn test_placement_mismatch() {
        let (mut stack, network, groups) = setup(Arc::new(InMemoryEngine::new()));
        let compute = ComputeProvisioner::new(&stack, &ComputeConfig::default());

        let err = compute
            .create(
                &mut stack,
                InstanceRole::Database,
                network.public_subnet().unwrap(),
                &[&groups.database],
                None,
            )
            .unwrap_err();
        assert!(matches!(err, StackError::Provision { .. }));
    }

    #[test]
    fn test_no_security_groups() {
        let (mut stack, network, _) = setup(Arc::new(InMemoryEngine::new()));
        let compute = ComputeProvisioner::new(&stack, &ComputeConfig::default());

        let err = compute
            .create(
                &mut stack,
                InstanceRole::WebFront,
                network.public_subnet().unwrap(),
                &[],
                None,
            )
            .unwrap_err();
        assert_eq!(
            err,
            StackError::provision("nginx-instance", "no security group given")
        );
    }

    #[test]
    fn test_foreign_subnet_rejected() {
        let (mut stack, _, groups) = setup(Arc::new(InMemoryEngine::new()));
        let mut foreign = Stack::new("foreign", Arc::new(InMemoryEngine::new()));
        let foreign_network = build_network(
            &mut foreign,
            &TopologyConfig {
                name: ResourceName::new("elsewhere").unwrap(),
                cidr_block: CidrBlock::new("10.1.0.0/16").unwrap(),
                layout: AddressLayout::default(),
            },
        )
        .unwrap();

        let compute = ComputeProvisioner::new(&stack, &ComputeConfig::default());
        let err = compute
            .create(
                &mut stack,
                InstanceRole::WebFront,
                foreign_network.public_subnet().unwrap(),
                &[&groups.web_front],
                None,
            )
            .unwrap_err();
        assert!(matches!(err, StackError::Provision { .. }));
    }

    #[tokio::test]
    async fn test_same_named_foreign_subnet_rejected() {
        let (mut stack, _, groups) = setup(Arc::new(InMemoryEngine::new()));
        let foreign_engine = Arc::new(InMemoryEngine::new());
        let (_foreign, foreign_network, _) = setup(foreign_engine.clone());

        let compute = ComputeProvisioner::new(&stack, &ComputeConfig::default());
        let err = compute
            .create(
                &mut stack,
                InstanceRole::WebFront,
                foreign_network.public_subnet().unwrap(),
                &[&groups.web_front],
                None,
            )
            .unwrap_err();

        assert_eq!(
            err,
            StackError::provision(
                "nginx-instance",
                "subnet net-public-subnet is not declared in this stack"
            )
        );
        assert!(!stack.contains(&ResourceName::new("nginx-instance").unwrap()));
        stack.apply(&MemoryJournal::new()).await.unwrap();
        assert!(foreign_engine.created().await.is_empty());
    }

    #[test]
    fn test_same_named_foreign_group_rejected() {
        let (mut stack, network, _) = setup(Arc::new(InMemoryEngine::new()));
        let (_foreign, _, foreign_groups) = setup(Arc::new(InMemoryEngine::new()));

        let compute = ComputeProvisioner::new(&stack, &ComputeConfig::default());
        let err = compute
            .create(
                &mut stack,
                InstanceRole::WebFront,
                network.public_subnet().unwrap(),
                &[&foreign_groups.web_front],
                None,
            )
            .unwrap_err();

        assert_eq!(
            err,
            StackError::provision(
                "nginx-instance",
                "security group nginx-sg is not declared in this stack"
            )
        );
    }

    #[test]
    fn test_provisioner_bound_to_its_stack() {
        let (mut stack, network, groups) = setup(Arc::new(InMemoryEngine::new()));
        let (foreign, _, _) = setup(Arc::new(InMemoryEngine::new()));

        let compute = ComputeProvisioner::new(&foreign, &ComputeConfig::default());
        let err = compute
            .create(
                &mut stack,
                InstanceRole::WebFront,
                network.public_subnet().unwrap(),
                &[&groups.web_front],
                None,
            )
            .unwrap_err();
        assert!(matches!(err, StackError::Provision { .. }));
    }

    #[tokio::test]
    async fn test_instances_share_one_image_lookup() {
        let engine = Arc::new(InMemoryEngine::new());
        let (mut stack, network, groups) = setup(engine.clone());
        let compute = ComputeProvisioner::new(&stack, &ComputeConfig::default());

        let web = compute
            .create(
                &mut stack,
                InstanceRole::WebFront,
                network.public_subnet().unwrap(),
                &[&groups.web_front],
                None,
            )
            .unwrap();
        let db = compute
            .create(
                &mut stack,
                InstanceRole::Database,
                network.private_subnet().unwrap(),
                &[&groups.database],
                None,
            )
            .unwrap();
        stack.apply(&MemoryJournal::new()).await.unwrap();

        let web_request = engine.request(web.name()).await.unwrap();
        let db_request = engine.request(db.name()).await.unwrap();
        assert_eq!(web_request.properties["ami"], db_request.properties["ami"]);
        assert_eq!(
            web_request.properties["userData"],
            serde_json::json!(BootstrapScript::Nginx.script())
        );
        assert_eq!(web_request.properties["instanceType"], serde_json::json!("t3.micro"));

        let image_lookups = engine
            .lookups()
            .await
            .into_iter()
            .filter(|q| matches!(q, LookupQuery::LatestImage(_)))
            .count();
        assert_eq!(image_lookups, 1);

        assert!(web.public_ip().resolve().await.is_ok());
        assert!(matches!(
            db.public_ip().resolve().await,
            Err(StackError::DependencyUnresolved { .. })
        ));
    }
}
