// Copyright (c) 2025 - Cowboy AI, Inc.
//! Property-Based Tests for Output Laws
//!
//! ```text
//! known(x).map(f)               = known(f(x))
//! o.map(f).map(g)               = o.map(g . f)
//! apply2(known(x), known(y), f) = known(f(x, y))
//! all([known(x) for x in xs])   = known(xs)
//! ```

use cim_network_stack::domain::{ResourceName, ResourceRef};
use cim_network_stack::output::{all, apply2, Output};
use proptest::prelude::*;
use tokio_test::block_on;
use uuid::Uuid;

fn resource_ref() -> impl Strategy<Value = ResourceRef> {
    ("[a-z][a-z0-9]{0,10}", any::<bool>()).prop_map(|(s, other_stack)| {
        let stack_id = if other_stack { Uuid::from_u128(1) } else { Uuid::nil() };
        ResourceRef::new(stack_id, ResourceName::new(s).unwrap())
    })
}

proptest! {
    #[test]
    fn prop_map_on_known(x in any::<i32>()) {
        let f = |v: i32| v.wrapping_mul(3);
        let mapped = block_on(Output::known(x).map(f).resolve());
        prop_assert_eq!(mapped, Ok(f(x)));
    }

    #[test]
    fn prop_map_composition(x in any::<i32>()) {
        let f = |v: i32| v.wrapping_add(7);
        let g = |v: i32| v.wrapping_mul(2);
        let chained = block_on(Output::known(x).map(f).map(g).resolve());
        let fused = block_on(Output::known(x).map(move |v| g(f(v))).resolve());
        prop_assert_eq!(chained, fused);
    }

    #[test]
    fn prop_apply2_on_known(x in any::<i16>(), y in any::<i16>()) {
        let sum = block_on(apply2(Output::known(x), Output::known(y), |a, b| i32::from(a) + i32::from(b)).resolve());
        prop_assert_eq!(sum, Ok(i32::from(x) + i32::from(y)));
    }

    #[test]
    fn prop_all_preserves_values(xs in proptest::collection::vec(any::<u8>(), 0..16)) {
        let collected = block_on(all(xs.iter().copied().map(Output::known).collect()).resolve());
        prop_assert_eq!(collected, Ok(xs));
    }

    #[test]
    fn prop_dependencies_union(a in resource_ref(), b in resource_ref()) {
        let left = Output::known(1).with_dependency(a.clone());
        let right = Output::known(2).with_dependency(b.clone());
        let combined = apply2(left, right, |x, y| x + y);

        prop_assert!(combined.depends_on(&a));
        prop_assert!(combined.depends_on(&b));
        let expected = if a == b { 1 } else { 2 };
        prop_assert_eq!(combined.dependencies().len(), expected);
    }
}
