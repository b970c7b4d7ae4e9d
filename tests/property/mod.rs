// Copyright (c) 2025 - Cowboy AI, Inc.
//! Property-Based Tests Module
//!
//! - [`address_planning`] - subnet plans are disjoint, contained and deterministic
//! - [`output_laws`] - functor and applicative laws of `Output`

mod address_planning;
mod output_laws;
