// Copyright (c) 2025 - Cowboy AI, Inc.
//! Property-Based Tests Entry Point
//!
//! This test suite uses proptest to verify properties that must hold for
//! all valid address plans and all compositions of deferred outputs.

mod property;
