// Copyright (c) 2025 - Cowboy AI, Inc.
//! Pure Validation Functions - Topology Invariants
//!
//! Business rules the network, security and compute layers must satisfy
//! before anything is declared. All functions are pure (no side effects)
//! and work on plain planned data, never on deferred outputs.
//!
//! # Invariant Categories
//!
//! 1. **Address Invariants**: subnets inside the VPC block, pairwise disjoint
//! 2. **Routing Invariants**: one route table per subnet, default route
//!    target fixed by subnet visibility
//! 3. **Trust Invariants**: group-only sources, the expected upstream,
//!    service ports actually open

use crate::domain::{CidrBlock, DefaultRoute};

/// Validation result with detailed error information
pub type ValidationResult = Result<(), ValidationError>;

/// Validation error with context
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// Subnet block is not a strict subset of the network block
    #[error("Subnet {subnet} is not contained in network {network}")]
    SubnetOutsideNetwork { subnet: String, network: String },

    /// Two subnet blocks share addresses
    #[error("Subnets {first} and {second} overlap")]
    SubnetOverlap { first: String, second: String },

    /// Default route points at the wrong gateway for the subnet's visibility
    #[error("Subnet {subnet} must route default traffic to {expected}, found {actual}")]
    WrongRouteTarget {
        subnet: String,
        expected: DefaultRoute,
        actual: DefaultRoute,
    },

    /// A subnet must be associated with exactly one route table
    #[error("Subnet {subnet} is associated with {count} route tables")]
    RouteTableCount { subnet: String, count: usize },

    /// Group admits traffic by CIDR where only group references are allowed
    #[error("Security group {group} must not admit CIDR sources")]
    CidrIngressForbidden { group: String },

    /// Group admits a source other than its declared upstream
    #[error("Security group {group} must trust only {expected}, found {actual:?}")]
    UntrustedSource {
        group: String,
        expected: String,
        actual: Vec<String>,
    },

    /// The service port of a role is not open in its security group
    #[error("Security group {group} does not open port {port}")]
    ServicePortClosed { group: String, port: u16 },
}

/// Validate a subnet block lies strictly inside the network block
pub fn validate_subnet_within(network: &CidrBlock, subnet: &CidrBlock) -> ValidationResult {
    if !subnet.is_strict_subset_of(network) {
        return Err(ValidationError::SubnetOutsideNetwork {
            subnet: subnet.to_string(),
            network: network.to_string(),
        });
    }
    Ok(())
}

/// Validate no two subnet blocks overlap
///
/// Reports the first offending pair in input order.
pub fn validate_disjoint(subnets: &[CidrBlock]) -> ValidationResult {
    for (i, first) in subnets.iter().enumerate() {
        if let Some(second) = subnets[i + 1..].iter().find(|s| first.overlaps(s)) {
            return Err(ValidationError::SubnetOverlap {
                first: first.to_string(),
                second: second.to_string(),
            });
        }
    }
    Ok(())
}

/// Validate a subnet's default route target against its visibility
///
/// # Rules
/// - Public subnets route to the Internet Gateway
/// - Private subnets route to a NAT Gateway, never the Internet Gateway
pub fn validate_route_target(subnet: &str, is_public: bool, actual: DefaultRoute) -> ValidationResult {
    let expected = if is_public {
        DefaultRoute::InternetGateway
    } else {
        DefaultRoute::NatGateway
    };
    if actual != expected {
        return Err(ValidationError::WrongRouteTarget {
            subnet: subnet.to_string(),
            expected,
            actual,
        });
    }
    Ok(())
}

/// Validate a subnet is associated with exactly one route table
pub fn validate_route_table_count(subnet: &str, count: usize) -> ValidationResult {
    if count != 1 {
        return Err(ValidationError::RouteTableCount {
            subnet: subnet.to_string(),
            count,
        });
    }
    Ok(())
}

/// Validate a group admits traffic only from other security groups
pub fn validate_group_sources_only(group: &str, cidr_sources: usize) -> ValidationResult {
    if cidr_sources > 0 {
        return Err(ValidationError::CidrIngressForbidden {
            group: group.to_string(),
        });
    }
    Ok(())
}

/// Validate a group trusts exactly one upstream group, `expected`
pub fn validate_trusted_source(group: &str, sources: &[String], expected: &str) -> ValidationResult {
    if sources.len() != 1 || sources[0] != expected {
        return Err(ValidationError::UntrustedSource {
            group: group.to_string(),
            expected: expected.to_string(),
            actual: sources.to_vec(),
        });
    }
    Ok(())
}

/// Validate `port` falls in one of the open tcp ranges
pub fn validate_port_open(group: &str, port: u16, open: &[(u16, u16)]) -> ValidationResult {
    if !open.iter().any(|&(from, to)| from <= port && port <= to) {
        return Err(ValidationError::ServicePortClosed {
            group: group.to_string(),
            port,
        });
    }
    Ok(())
}
