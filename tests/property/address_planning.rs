// Copyright (c) 2025 - Cowboy AI, Inc.
//! Property-Based Tests for Address Planning
//!
//! For every base block, subnet prefix and zone count the planner either
//! produces a plan whose subnets are pairwise disjoint strict subsets of the
//! base block, or fails with `AddressSpaceExhausted` exactly when the
//! required slices exceed the capacity.

use cim_network_stack::domain::CidrBlock;
use cim_network_stack::planner::{plan_addresses, AddressLayout, SubnetVisibility, MAX_SUBNET_PREFIX};
use cim_network_stack::StackError;
use proptest::prelude::*;
use std::net::Ipv4Addr;

// ============================================================================
// Strategies
// ============================================================================

/// Canonical base blocks from /8 to /26
fn base_block() -> impl Strategy<Value = CidrBlock> {
    (any::<u32>(), 8u8..=26).prop_map(|(bits, prefix)| {
        let mask = u32::MAX << (32 - prefix);
        CidrBlock::from_parts(Ipv4Addr::from(bits & mask), prefix).unwrap()
    })
}

/// A base block with a valid subnet prefix for it
fn block_and_layout() -> impl Strategy<Value = (CidrBlock, AddressLayout)> {
    base_block().prop_flat_map(|block| {
        let min = block.prefix_len() + 1;
        (Just(block), min..=MAX_SUBNET_PREFIX, 1usize..=6).prop_map(
            |(block, subnet_prefix_len, zone_count)| {
                (
                    block,
                    AddressLayout {
                        zone_count,
                        subnet_prefix_len,
                    },
                )
            },
        )
    })
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #[test]
    fn prop_plan_or_exhausted((block, layout) in block_and_layout()) {
        let capacity = block.capacity(layout.subnet_prefix_len);
        match plan_addresses(&block, &layout) {
            Ok(plan) => {
                prop_assert!(layout.required_slices() <= capacity);
                prop_assert_eq!(plan.allocations().len(), 2 * layout.zone_count);
            }
            Err(StackError::AddressSpaceExhausted { requested, capacity: reported, .. }) => {
                prop_assert!(requested > capacity);
                prop_assert_eq!(reported, capacity);
            }
            Err(other) => prop_assert!(false, "unexpected error {other}"),
        }
    }

    #[test]
    fn prop_subnets_disjoint_and_contained((block, layout) in block_and_layout()) {
        if let Ok(plan) = plan_addresses(&block, &layout) {
            let blocks: Vec<CidrBlock> = plan.allocations().iter().map(|a| a.cidr_block).collect();
            for (i, a) in blocks.iter().enumerate() {
                prop_assert!(a.is_strict_subset_of(&block));
                prop_assert_eq!(a.prefix_len(), layout.subnet_prefix_len);
                for b in &blocks[i + 1..] {
                    prop_assert!(!a.overlaps(b));
                }
            }
        }
    }

    #[test]
    fn prop_planner_is_deterministic((block, layout) in block_and_layout()) {
        prop_assert_eq!(plan_addresses(&block, &layout), plan_addresses(&block, &layout));
    }

    #[test]
    fn prop_slice_zero_is_reserved((block, layout) in block_and_layout()) {
        if let Ok(plan) = plan_addresses(&block, &layout) {
            let reserved = block.slice(layout.subnet_prefix_len, 0).unwrap();
            prop_assert!(plan.allocations().iter().all(|a| a.cidr_block != reserved));
        }
    }

    #[test]
    fn prop_every_zone_has_both_visibilities((block, layout) in block_and_layout()) {
        if let Ok(plan) = plan_addresses(&block, &layout) {
            for zone in 0..layout.zone_count {
                prop_assert!(plan.allocation(zone, SubnetVisibility::Public).is_some());
                prop_assert!(plan.allocation(zone, SubnetVisibility::Private).is_some());
            }
        }
    }
}
