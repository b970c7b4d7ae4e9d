// Copyright (c) 2025 - Cowboy AI, Inc.
//! Deferred Resource Values
//!
//! Identifiers and attributes handed back by the provisioning engine are not
//! known when a resource is declared. An [`Output<T>`] stands in for such a
//! value: it resolves at most once, can be shared by any number of
//! consumers, and records which declared resources it was derived from.
//!
//! # Applicative Lift
//!
//! Outputs compose without being resolved:
//!
//! ```text
//! map      : Output<T> → (T → U) → Output<U>
//! apply2   : Output<T> → Output<U> → (T → U → V) → Output<V>
//! all      : [Output<T>] → Output<[T]>
//! ```
//!
//! The dependency set of a composed output is the union of its inputs'
//! sets. A resource declared with properties built from outputs therefore
//! carries explicit edges to every resource it consumes, which is all the
//! sequencing the engine needs.
//!
//! # Laws
//!
//! ```text
//! known(x).map(f)              = known(f(x))
//! o.map(id)                    = o
//! o.map(f).map(g)              = o.map(g . f)
//! apply2(known(x), known(y), f) = known(f(x, y))
//! ```
//!
//! # Example
//!
//! ```rust
//! use cim_network_stack::output::{apply2, Output};
//!
//! # tokio_test::block_on(async {
//! let vpc_id = Output::known("vpc-01".to_string());
//! let cidr = Output::known("10.0.1.0/24".to_string());
//! let label = apply2(vpc_id, cidr, |vpc, cidr| format!("{vpc}:{cidr}"));
//! assert_eq!(label.resolve().await.unwrap(), "vpc-01:10.0.1.0/24");
//! # });
//! ```

pub mod combinators;
pub mod deferred;

pub use combinators::*;
pub use deferred::Output;
