// Copyright (c) 2025 - Cowboy AI, Inc.
//! Network Topology
//!
//! Declares the VPC, its Internet Gateway, one public and one private
//! subnet per zone, a NAT gateway (with its elastic IP) per zone, and the
//! route tables wiring them together.
//!
//! # Routing
//!
//! ```text
//!                    Internet
//!                       │
//!                 Internet Gateway
//!                       │
//!   public-rt ──────────┘   (shared by every public subnet)
//!      │
//!   public subnet(i) ── NAT gateway(i) ── elastic IP(i)
//!                            │
//!   private-rt(i) ───────────┘
//!      │
//!   private subnet(i)
//! ```
//!
//! The route plan is computed and checked against the address plan
//! before any resource is declared: every subnet has exactly one route
//! table, and its default route target follows its visibility.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::info;

use crate::domain::invariants::{validate_route_table_count, validate_route_target};
use crate::domain::{CidrBlock, DefaultRoute, ResourceKind, ResourceName};
use crate::errors::{StackError, StackResult};
use crate::output::Output;
use crate::planner::{
    plan_addresses, select_zones, zone_for, AddressLayout, AddressPlan, SubnetAllocation,
    SubnetVisibility,
};
use crate::stack::{Properties, ResourceHandle, Stack};

/// Destination of every default route
pub const DEFAULT_ROUTE_CIDR: &str = "0.0.0.0/0";

/// Inputs of the network layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopologyConfig {
    /// Prefix for every network resource name
    pub name: ResourceName,
    pub cidr_block: CidrBlock,
    #[serde(default)]
    pub layout: AddressLayout,
}

/// One route table in the route plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutePlan {
    /// Visibility of the subnets this table serves
    pub visibility: SubnetVisibility,

    /// Zone of the NAT gateway, for private tables
    pub zone_index: Option<usize>,

    pub target: DefaultRoute,

    /// Associated subnets as (zone index, visibility)
    pub associations: Vec<(usize, SubnetVisibility)>,
}

/// Route tables for an address plan
///
/// One public table shared by all public subnets, one private table per
/// zone routing through that zone's NAT gateway.
pub fn plan_routes(plan: &AddressPlan) -> Vec<RoutePlan> {
    let mut routes = vec![RoutePlan {
        visibility: SubnetVisibility::Public,
        zone_index: None,
        target: DefaultRoute::InternetGateway,
        associations: plan
            .by_visibility(SubnetVisibility::Public)
            .map(|a| (a.zone_index, a.visibility))
            .collect(),
    }];

    routes.extend(
        plan.by_visibility(SubnetVisibility::Private)
            .map(|a| RoutePlan {
                visibility: SubnetVisibility::Private,
                zone_index: Some(a.zone_index),
                target: DefaultRoute::NatGateway,
                associations: vec![(a.zone_index, a.visibility)],
            }),
    );

    routes
}

/// Check a route plan against the subnets it serves
///
/// # Errors
///
/// - `InvariantViolation` if a subnet has no route table or more than one,
///   or if its default route target does not match its visibility
pub fn validate_routes(plan: &AddressPlan, routes: &[RoutePlan]) -> StackResult<()> {
    for allocation in plan.allocations() {
        let key = (allocation.zone_index, allocation.visibility);
        let tables: Vec<&RoutePlan> = routes
            .iter()
            .filter(|r| r.associations.contains(&key))
            .collect();

        let subnet = allocation.cidr_block.to_string();
        validate_route_table_count(&subnet, tables.len())?;
        validate_route_target(&subnet, allocation.visibility.is_public(), tables[0].target)?;
    }
    Ok(())
}

/// A declared subnet
#[derive(Debug, Clone)]
pub struct Subnet {
    handle: ResourceHandle,
    allocation: SubnetAllocation,
    availability_zone: Output<String>,
    route_table: ResourceName,
}

impl Subnet {
    pub fn id(&self) -> Output<String> {
        self.handle.id()
    }

    pub fn name(&self) -> &ResourceName {
        self.handle.name()
    }

    pub fn handle(&self) -> &ResourceHandle {
        &self.handle
    }

    pub fn cidr_block(&self) -> &CidrBlock {
        &self.allocation.cidr_block
    }

    pub fn zone_index(&self) -> usize {
        self.allocation.zone_index
    }

    pub fn visibility(&self) -> SubnetVisibility {
        self.allocation.visibility
    }

    pub fn is_public(&self) -> bool {
        self.allocation.visibility.is_public()
    }

    pub fn availability_zone(&self) -> &Output<String> {
        &self.availability_zone
    }

    /// Name of the route table this subnet is associated with
    pub fn route_table(&self) -> &ResourceName {
        &self.route_table
    }
}

/// A NAT gateway and the elastic IP it egresses through
#[derive(Debug, Clone)]
pub struct NatGateway {
    pub zone_index: usize,
    pub elastic_ip: ResourceHandle,
    pub gateway: ResourceHandle,
}

impl NatGateway {
    pub fn id(&self) -> Output<String> {
        self.gateway.id()
    }

    /// Stable public egress address
    pub fn public_ip(&self) -> Output<Value> {
        self.elastic_ip.attribute("publicIp")
    }
}

/// Where a route table's default route points
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteTarget {
    InternetGateway(ResourceName),
    NatGateway(ResourceName),
}

impl RouteTarget {
    pub fn kind(&self) -> DefaultRoute {
        match self {
            RouteTarget::InternetGateway(_) => DefaultRoute::InternetGateway,
            RouteTarget::NatGateway(_) => DefaultRoute::NatGateway,
        }
    }

    /// The gateway resource
    pub fn resource(&self) -> &ResourceName {
        match self {
            RouteTarget::InternetGateway(name) | RouteTarget::NatGateway(name) => name,
        }
    }
}

/// A declared route table and its associations
#[derive(Debug, Clone)]
pub struct RouteTable {
    pub handle: ResourceHandle,
    pub target: RouteTarget,
    pub subnets: Vec<ResourceName>,
    pub associations: Vec<ResourceHandle>,
}

impl RouteTable {
    pub fn id(&self) -> Output<String> {
        self.handle.id()
    }

    pub fn name(&self) -> &ResourceName {
        self.handle.name()
    }
}

/// The declared network layer
#[derive(Debug, Clone)]
pub struct Network {
    name: ResourceName,
    plan: AddressPlan,
    vpc: ResourceHandle,
    internet_gateway: ResourceHandle,
    subnets: Vec<Subnet>,
    nat_gateways: Vec<NatGateway>,
    route_tables: Vec<RouteTable>,
}

impl Network {
    pub fn name(&self) -> &ResourceName {
        &self.name
    }

    pub fn cidr_block(&self) -> &CidrBlock {
        self.plan.network()
    }

    pub fn plan(&self) -> &AddressPlan {
        &self.plan
    }

    pub fn vpc(&self) -> &ResourceHandle {
        &self.vpc
    }

    pub fn vpc_id(&self) -> Output<String> {
        self.vpc.id()
    }

    pub fn internet_gateway_id(&self) -> Output<String> {
        self.internet_gateway.id()
    }

    /// NAT gateway of the first zone
    pub fn nat_gateway_id(&self) -> Output<String> {
        match self.nat_gateways.first() {
            Some(nat) => nat.id(),
            None => Output::failed(StackError::unresolved(&self.name, "nat-gateway")),
        }
    }

    pub fn subnets(&self) -> &[Subnet] {
        &self.subnets
    }

    pub fn nat_gateways(&self) -> &[NatGateway] {
        &self.nat_gateways
    }

    pub fn route_tables(&self) -> &[RouteTable] {
        &self.route_tables
    }

    /// Subnet of a zone and visibility
    pub fn subnet(&self, zone_index: usize, visibility: SubnetVisibility) -> Option<&Subnet> {
        self.subnets
            .iter()
            .find(|s| s.zone_index() == zone_index && s.visibility() == visibility)
    }

    /// Public subnet of the first zone
    pub fn public_subnet(&self) -> Option<&Subnet> {
        self.subnet(0, SubnetVisibility::Public)
    }

    /// Private subnet of the first zone
    pub fn private_subnet(&self) -> Option<&Subnet> {
        self.subnet(0, SubnetVisibility::Private)
    }

    /// Route table a subnet is associated with
    pub fn route_table_for(&self, subnet: &ResourceName) -> Option<&RouteTable> {
        self.route_tables.iter().find(|t| t.subnets.contains(subnet))
    }
}

/// Name for a per-zone resource: `{network}-{suffix}`, plus `-{zone}` when
/// the network spans more than one zone
fn zone_name(
    network: &ResourceName,
    suffix: &str,
    zone_index: usize,
    zone_count: usize,
) -> StackResult<ResourceName> {
    if zone_count > 1 {
        Ok(network.child(&format!("{suffix}-{zone_index}"))?)
    } else {
        Ok(network.child(suffix)?)
    }
}

/// Default route pointing `key` at the gateway id
fn default_route(target: DefaultRoute, gateway_id: Output<String>) -> Output<Value> {
    gateway_id.map(move |id| {
        let mut route = Map::new();
        route.insert("cidrBlock".to_string(), json!(DEFAULT_ROUTE_CIDR));
        route.insert(target.route_key().to_string(), json!(id));
        Value::Array(vec![Value::Object(route)])
    })
}

/// Declare the network layer
///
/// # Errors
///
/// - `Configuration` / `AddressSpaceExhausted` from address planning
/// - `InvariantViolation` if the route plan breaks a routing rule
/// - `DependencyUnresolved` if a declaration consumes something not in the
///   stack
pub fn build_network(stack: &mut Stack, config: &TopologyConfig) -> StackResult<Network> {
    let plan = plan_addresses(&config.cidr_block, &config.layout)?;
    let routes = plan_routes(&plan);
    validate_routes(&plan, &routes)?;

    let name = &config.name;
    let zone_count = plan.zone_count();

    let vpc = stack.declare(
        ResourceKind::Vpc,
        name.child("vpc")?,
        Properties::new()
            .set("cidrBlock", plan.network())
            .set("enableDnsHostnames", true),
    )?;

    let internet_gateway = stack.declare(
        ResourceKind::InternetGateway,
        name.child("igw")?,
        Properties::new().set_output("vpcId", vpc.id()),
    )?;

    let zones = select_zones(stack, zone_count);

    let mut subnets = Vec::with_capacity(plan.allocations().len());
    for allocation in plan.allocations() {
        let availability_zone = zone_for(&zones, allocation.zone_index);
        let suffix = format!("{}-subnet", allocation.visibility);
        let handle = stack.declare(
            ResourceKind::Subnet,
            zone_name(name, &suffix, allocation.zone_index, zone_count)?,
            Properties::new()
                .set_output("vpcId", vpc.id())
                .set("cidrBlock", allocation.cidr_block)
                .set_output("availabilityZone", availability_zone.clone())
                .set("mapPublicIpOnLaunch", allocation.visibility.is_public()),
        )?;

        let route_table = match allocation.visibility {
            SubnetVisibility::Public => name.child("public-rt")?,
            SubnetVisibility::Private => {
                zone_name(name, "private-rt", allocation.zone_index, zone_count)?
            }
        };

        subnets.push(Subnet {
            handle,
            allocation: *allocation,
            availability_zone,
            route_table,
        });
    }

    let find_subnet = |zone_index: usize, visibility: SubnetVisibility| {
        subnets
            .iter()
            .find(|s| s.zone_index() == zone_index && s.visibility() == visibility)
            .ok_or_else(|| StackError::unresolved(name, format!("{visibility} subnet {zone_index}")))
    };

    let mut nat_gateways = Vec::with_capacity(zone_count);
    for zone_index in 0..zone_count {
        let public_subnet = find_subnet(zone_index, SubnetVisibility::Public)?;
        let elastic_ip = stack.declare(
            ResourceKind::ElasticIp,
            zone_name(name, "nat-eip", zone_index, zone_count)?,
            Properties::new().set("vpc", true),
        )?;
        let gateway = stack.declare(
            ResourceKind::NatGateway,
            zone_name(name, "nat-gateway", zone_index, zone_count)?,
            Properties::new()
                .set_output("allocationId", elastic_ip.id())
                .set_output("subnetId", public_subnet.id()),
        )?;
        nat_gateways.push(NatGateway {
            zone_index,
            elastic_ip,
            gateway,
        });
    }

    let mut route_tables = Vec::with_capacity(routes.len());
    for route in &routes {
        let (table_name, target, gateway_id) = match route.zone_index {
            None => (
                name.child("public-rt")?,
                RouteTarget::InternetGateway(internet_gateway.name().clone()),
                internet_gateway.id(),
            ),
            Some(zone_index) => {
                let nat = nat_gateways
                    .iter()
                    .find(|n| n.zone_index == zone_index)
                    .ok_or_else(|| StackError::unresolved(name, format!("nat-gateway {zone_index}")))?;
                (
                    zone_name(name, "private-rt", zone_index, zone_count)?,
                    RouteTarget::NatGateway(nat.gateway.name().clone()),
                    nat.id(),
                )
            }
        };

        let handle = stack.declare(
            ResourceKind::RouteTable,
            table_name,
            Properties::new()
                .set_output("vpcId", vpc.id())
                .set_output("routes", default_route(route.target, gateway_id)),
        )?;

        let assoc_base = format!("{}-rt-assoc", route.visibility);
        let mut associated = Vec::with_capacity(route.associations.len());
        let mut associations = Vec::with_capacity(route.associations.len());
        for &(zone_index, visibility) in &route.associations {
            let subnet = find_subnet(zone_index, visibility)?;
            let association = stack.declare(
                ResourceKind::RouteTableAssociation,
                zone_name(name, &assoc_base, zone_index, zone_count)?,
                Properties::new()
                    .set_output("subnetId", subnet.id())
                    .set_output("routeTableId", handle.id()),
            )?;
            associated.push(subnet.name().clone());
            associations.push(association);
        }

        route_tables.push(RouteTable {
            handle,
            target,
            subnets: associated,
            associations,
        });
    }

    info!(
        "Declared network {} ({}): {} subnets, {} NAT gateways, {} route tables",
        name,
        plan.network(),
        subnets.len(),
        nat_gateways.len(),
        route_tables.len()
    );

    Ok(Network {
        name: name.clone(),
        plan,
        vpc,
        internet_gateway,
        subnets,
        nat_gateways,
        route_tables,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::journal::MemoryJournal;
    use crate::stack::InMemoryEngine;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn name(s: &str) -> ResourceName {
        ResourceName::new(s).unwrap()
    }

    fn config(zone_count: usize) -> TopologyConfig {
        TopologyConfig {
            name: name("net"),
            cidr_block: CidrBlock::new("10.0.0.0/16").unwrap(),
            layout: AddressLayout {
                zone_count,
                ..AddressLayout::default()
            },
        }
    }

    #[test]
    fn test_route_plan_single_zone() {
        let plan = plan_addresses(
            &CidrBlock::new("10.0.0.0/16").unwrap(),
            &AddressLayout::default(),
        )
        .unwrap();
        let routes = plan_routes(&plan);

        assert_eq!(routes.len(), 2);
        assert_eq!(routes[0].target, DefaultRoute::InternetGateway);
        assert_eq!(routes[1].target, DefaultRoute::NatGateway);
        assert!(validate_routes(&plan, &routes).is_ok());
    }

    #[test]
    fn test_route_plan_rejects_private_to_igw() {
        let plan = plan_addresses(
            &CidrBlock::new("10.0.0.0/16").unwrap(),
            &AddressLayout::default(),
        )
        .unwrap();
        let mut routes = plan_routes(&plan);
        routes[1].target = DefaultRoute::InternetGateway;

        assert!(matches!(
            validate_routes(&plan, &routes),
            Err(StackError::InvariantViolation(_))
        ));
    }

    #[test]
    fn test_route_plan_rejects_double_association() {
        let plan = plan_addresses(
            &CidrBlock::new("10.0.0.0/16").unwrap(),
            &AddressLayout::default(),
        )
        .unwrap();
        let mut routes = plan_routes(&plan);
        routes[0].associations.push((0, SubnetVisibility::Private));

        assert!(validate_routes(&plan, &routes).is_err());
    }

    #[test]
    fn test_declared_names_single_zone() {
        let mut stack = Stack::new("net", Arc::new(InMemoryEngine::new()));
        build_network(&mut stack, &config(1)).unwrap();

        let names: Vec<&str> = stack
            .declarations()
            .iter()
            .map(|d| d.name.as_str())
            .collect();
        assert_eq!(
            names,
            vec![
                "net-vpc",
                "net-igw",
                "net-public-subnet",
                "net-private-subnet",
                "net-nat-eip",
                "net-nat-gateway",
                "net-public-rt",
                "net-public-rt-assoc",
                "net-private-rt",
                "net-private-rt-assoc",
            ]
        );
    }

    #[test]
    fn test_dependency_edges() {
        let mut stack = Stack::new("net", Arc::new(InMemoryEngine::new()));
        build_network(&mut stack, &config(1)).unwrap();

        let deps = |n: &str| stack.dependencies_of(&name(n)).unwrap().clone();
        assert!(deps("net-private-rt").contains(&name("net-nat-gateway")));
        assert!(deps("net-nat-gateway").contains(&name("net-nat-eip")));
        assert!(deps("net-nat-gateway").contains(&name("net-public-subnet")));
        assert!(deps("net-public-rt").contains(&name("net-igw")));
        assert!(!deps("net-private-rt").contains(&name("net-igw")));
    }

    #[test]
    fn test_multi_zone_topology() {
        let mut stack = Stack::new("net", Arc::new(InMemoryEngine::new()));
        let network = build_network(&mut stack, &config(2)).unwrap();

        assert_eq!(network.subnets().len(), 4);
        assert_eq!(network.nat_gateways().len(), 2);
        // one shared public table, one private table per zone
        assert_eq!(network.route_tables().len(), 3);
        assert_eq!(network.route_tables()[0].subnets.len(), 2);

        let private_1 = network.subnet(1, SubnetVisibility::Private).unwrap();
        assert_eq!(private_1.name().as_str(), "net-private-subnet-1");
        let table = network.route_table_for(private_1.name()).unwrap();
        assert_eq!(table.name().as_str(), "net-private-rt-1");
        assert_eq!(
            table.target,
            RouteTarget::NatGateway(name("net-nat-gateway-1"))
        );
    }

    #[tokio::test]
    async fn test_apply_wires_routes() {
        let engine = Arc::new(InMemoryEngine::new());
        let mut stack = Stack::new("net", engine.clone());
        let network = build_network(&mut stack, &config(1)).unwrap();
        stack.apply(&MemoryJournal::new()).await.unwrap();

        let nat_id = network.nat_gateway_id().resolve().await.unwrap();
        let igw_id = network.internet_gateway_id().resolve().await.unwrap();

        let private_rt = engine.request(&name("net-private-rt")).await.unwrap();
        assert_eq!(
            private_rt.properties["routes"],
            json!([{"cidrBlock": "0.0.0.0/0", "natGatewayId": nat_id}])
        );
        let public_rt = engine.request(&name("net-public-rt")).await.unwrap();
        assert_eq!(
            public_rt.properties["routes"],
            json!([{"cidrBlock": "0.0.0.0/0", "gatewayId": igw_id}])
        );

        let public_subnet = engine.request(&name("net-public-subnet")).await.unwrap();
        assert_eq!(public_subnet.properties["cidrBlock"], json!("10.0.1.0/24"));
        assert_eq!(public_subnet.properties["availabilityZone"], json!("us-east-1a"));
        assert_eq!(public_subnet.properties["mapPublicIpOnLaunch"], json!(true));

        let vpc = engine.request(&name("net-vpc")).await.unwrap();
        assert_eq!(vpc.properties["enableDnsHostnames"], json!(true));

        // one zone lookup for the whole network
        assert_eq!(engine.lookups().await.len(), 1);
    }
}
