// Copyright (c) 2025 - Cowboy AI, Inc.
//! Address Planner
//!
//! Derives the subnet layout of a VPC from its base block and the number of
//! availability zones. Planning is pure and deterministic; the only external
//! input, the zone list, is looked up once per stack and shared by every
//! subnet.
//!
//! # Slice Layout
//!
//! ```text
//! base 10.0.0.0/16, /24 slices
//!
//! slice 0      10.0.0.0/24   reserved
//! slice 1+2i   public subnet of zone i   (10.0.1.0/24 for zone 0)
//! slice 2+2i   private subnet of zone i  (10.0.2.0/24 for zone 0)
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::info;

use crate::domain::invariants::{validate_disjoint, validate_subnet_within};
use crate::domain::{CidrBlock, DefaultRoute};
use crate::errors::{StackError, StackResult};
use crate::output::Output;
use crate::stack::{LookupQuery, Stack};

/// Default VPC block
pub const DEFAULT_CIDR_BLOCK: &str = "10.0.0.0/16";

/// Default subnet prefix length
pub const DEFAULT_SUBNET_PREFIX: u8 = 24;

/// Longest subnet prefix accepted (providers reject anything smaller than /28)
pub const MAX_SUBNET_PREFIX: u8 = 28;

/// Prefix bounds a VPC base block must fall within
pub const MIN_NETWORK_PREFIX: u8 = 16;
pub const MAX_NETWORK_PREFIX: u8 = 28;

/// Whether a subnet is reachable from the internet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubnetVisibility {
    Public,
    Private,
}

impl SubnetVisibility {
    pub fn is_public(&self) -> bool {
        matches!(self, SubnetVisibility::Public)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SubnetVisibility::Public => "public",
            SubnetVisibility::Private => "private",
        }
    }

    /// Gateway the default route of a subnet with this visibility targets
    pub fn default_route(&self) -> DefaultRoute {
        match self {
            SubnetVisibility::Public => DefaultRoute::InternetGateway,
            SubnetVisibility::Private => DefaultRoute::NatGateway,
        }
    }
}

impl fmt::Display for SubnetVisibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How many zones to spread over and how large each subnet is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressLayout {
    pub zone_count: usize,
    pub subnet_prefix_len: u8,
}

impl Default for AddressLayout {
    fn default() -> Self {
        Self {
            zone_count: 1,
            subnet_prefix_len: DEFAULT_SUBNET_PREFIX,
        }
    }
}

impl AddressLayout {
    /// One public and one private subnet per zone
    pub fn subnet_count(&self) -> usize {
        self.zone_count.saturating_mul(2)
    }

    /// Slices consumed, including the reserved slice 0
    pub fn required_slices(&self) -> usize {
        self.subnet_count().saturating_add(1)
    }
}

/// One planned subnet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubnetAllocation {
    pub zone_index: usize,
    pub visibility: SubnetVisibility,
    pub cidr_block: CidrBlock,
}

/// The complete, validated address plan of a VPC
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressPlan {
    network: CidrBlock,
    layout: AddressLayout,
    allocations: Vec<SubnetAllocation>,
}

impl AddressPlan {
    pub fn network(&self) -> &CidrBlock {
        &self.network
    }

    pub fn layout(&self) -> &AddressLayout {
        &self.layout
    }

    pub fn zone_count(&self) -> usize {
        self.layout.zone_count
    }

    /// All allocations, zone by zone, public before private
    pub fn allocations(&self) -> &[SubnetAllocation] {
        &self.allocations
    }

    /// Allocation for a zone and visibility
    pub fn allocation(&self, zone_index: usize, visibility: SubnetVisibility) -> Option<&SubnetAllocation> {
        self.allocations
            .iter()
            .find(|a| a.zone_index == zone_index && a.visibility == visibility)
    }

    /// Allocations of one visibility, in zone order
    pub fn by_visibility(&self, visibility: SubnetVisibility) -> impl Iterator<Item = &SubnetAllocation> {
        self.allocations
            .iter()
            .filter(move |a| a.visibility == visibility)
    }

    /// Check the address invariants: every subnet strictly inside the
    /// network block, no two subnets overlapping
    pub fn validate(&self) -> StackResult<()> {
        for allocation in &self.allocations {
            validate_subnet_within(&self.network, &allocation.cidr_block)?;
        }
        let blocks: Vec<CidrBlock> = self.allocations.iter().map(|a| a.cidr_block).collect();
        validate_disjoint(&blocks)?;
        Ok(())
    }
}

/// Plan subnet blocks for `layout` inside `network`
///
/// # Errors
///
/// - `Configuration` if the zone count is zero, or the subnet prefix is not
///   longer than the network prefix or exceeds [`MAX_SUBNET_PREFIX`]
/// - `AddressSpaceExhausted` if the slices needed do not fit
pub fn plan_addresses(network: &CidrBlock, layout: &AddressLayout) -> StackResult<AddressPlan> {
    if layout.zone_count == 0 {
        return Err(StackError::Configuration(
            "availability zone count must be at least 1".to_string(),
        ));
    }

    let prefix_len = layout.subnet_prefix_len;
    if prefix_len <= network.prefix_len() || prefix_len > MAX_SUBNET_PREFIX {
        return Err(StackError::Configuration(format!(
            "subnet prefix /{} must be longer than /{} and at most /{}",
            prefix_len,
            network.prefix_len(),
            MAX_SUBNET_PREFIX
        )));
    }

    let capacity = network.capacity(prefix_len);
    let requested = layout.required_slices();
    if requested > capacity {
        return Err(StackError::AddressSpaceExhausted {
            cidr: network.to_string(),
            prefix_len,
            requested,
            capacity,
        });
    }

    let mut allocations = Vec::with_capacity(layout.subnet_count());
    for zone_index in 0..layout.zone_count {
        for (offset, visibility) in [(1, SubnetVisibility::Public), (2, SubnetVisibility::Private)] {
            let slice = 2 * zone_index + offset;
            let cidr_block = network.slice(prefix_len, slice).ok_or_else(|| {
                StackError::AddressSpaceExhausted {
                    cidr: network.to_string(),
                    prefix_len,
                    requested,
                    capacity,
                }
            })?;
            allocations.push(SubnetAllocation {
                zone_index,
                visibility,
                cidr_block,
            });
        }
    }

    let plan = AddressPlan {
        network: *network,
        layout: *layout,
        allocations,
    };
    plan.validate()?;

    info!(
        "Planned {} subnets in {} (/{} slices, {} zones)",
        plan.allocations.len(),
        network,
        prefix_len,
        layout.zone_count
    );

    Ok(plan)
}

/// Resolve the first `count` available zones
///
/// One lookup for the whole stack; every subnet derives its zone from the
/// returned output. Fails with `DependencyUnresolved` naming the zone
/// lookup when fewer than `count` zones exist.
pub fn select_zones(stack: &Stack, count: usize) -> Output<Vec<String>> {
    let query = LookupQuery::available_zones();
    let label = query.to_string();

    stack.lookup(query).try_map(move |value| {
        let names: Vec<String> = value
            .get("names")
            .and_then(|names| names.as_array())
            .map(|names| {
                names
                    .iter()
                    .filter_map(|n| n.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();

        if names.len() < count {
            return Err(StackError::unresolved(
                label,
                format!("{} zones requested, {} available", count, names.len()),
            ));
        }
        Ok(names.into_iter().take(count).collect())
    })
}

/// The zone for one zone index
pub fn zone_for(zones: &Output<Vec<String>>, zone_index: usize) -> Output<String> {
    zones.clone().try_map(move |names| {
        names
            .get(zone_index)
            .cloned()
            .ok_or_else(|| StackError::unresolved("availability-zones", format!("zone {zone_index}")))
    })
}
