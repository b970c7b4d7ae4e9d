// Copyright (c) 2025 - Cowboy AI, Inc.
//! Network Value Objects with Validation Invariants

use ipnet::Ipv4Net;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;
use thiserror::Error;

/// Network validation error
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NetworkError {
    #[error("Invalid CIDR notation: {0}")]
    InvalidCidr(String),

    #[error("Invalid prefix length: {0} (must be 0-32 for IPv4)")]
    InvalidPrefixLength(u8),

    #[error("Host bits set in CIDR block {given}, expected {canonical}")]
    HostBitsSet { given: String, canonical: String },
}

/// IPv4 CIDR block value object
///
/// Invariants:
/// - Valid IPv4 network address
/// - Prefix length 0-32
/// - Canonical form (no host bits set: `10.0.0.5/16` is rejected)
///
/// # Examples
///
/// ```rust
/// use cim_network_stack::domain::CidrBlock;
///
/// let vpc = CidrBlock::new("10.0.0.0/16").unwrap();
/// let public = CidrBlock::new("10.0.1.0/24").unwrap();
/// assert!(public.is_strict_subset_of(&vpc));
/// assert!(CidrBlock::new("10.0.0.5/16").is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CidrBlock(Ipv4Net);

impl CidrBlock {
    /// Create a CIDR block from prefix notation
    pub fn new(cidr: impl AsRef<str>) -> Result<Self, NetworkError> {
        let cidr = cidr.as_ref();
        let (addr_str, prefix_str) = cidr
            .split_once('/')
            .ok_or_else(|| NetworkError::InvalidCidr(cidr.to_string()))?;

        let address = Ipv4Addr::from_str(addr_str)
            .map_err(|_| NetworkError::InvalidCidr(cidr.to_string()))?;
        let prefix_len = prefix_str
            .parse::<u8>()
            .map_err(|_| NetworkError::InvalidCidr(cidr.to_string()))?;

        Self::from_parts(address, prefix_len)
    }

    /// Create from a network address and prefix length
    pub fn from_parts(address: Ipv4Addr, prefix_len: u8) -> Result<Self, NetworkError> {
        let net = Ipv4Net::new(address, prefix_len)
            .map_err(|_| NetworkError::InvalidPrefixLength(prefix_len))?;

        // Invariant: canonical form only
        if net.trunc() != net {
            return Err(NetworkError::HostBitsSet {
                given: net.to_string(),
                canonical: net.trunc().to_string(),
            });
        }

        Ok(Self(net))
    }

    /// The whole IPv4 space, `0.0.0.0/0`
    pub fn anywhere() -> Self {
        Self(Ipv4Net::default())
    }

    /// Network address
    pub fn network(&self) -> Ipv4Addr {
        self.0.network()
    }

    /// Prefix length
    pub fn prefix_len(&self) -> u8 {
        self.0.prefix_len()
    }

    /// Whether `other` lies entirely inside this block
    pub fn contains(&self, other: &CidrBlock) -> bool {
        self.0.contains(&other.0)
    }

    /// Whether `self` lies inside `outer` and is smaller than it
    pub fn is_strict_subset_of(&self, outer: &CidrBlock) -> bool {
        outer.contains(self) && self.prefix_len() > outer.prefix_len()
    }

    /// Whether the two blocks share at least one address
    pub fn overlaps(&self, other: &CidrBlock) -> bool {
        self.0.contains(&other.0.network()) || other.0.contains(&self.0.network())
    }

    /// Number of `/prefix_len` slices this block divides into
    ///
    /// Zero when `prefix_len` is not longer than the block's own prefix
    /// or exceeds 32. Saturates at `usize::MAX`.
    pub fn capacity(&self, prefix_len: u8) -> usize {
        if prefix_len <= self.prefix_len() || prefix_len > 32 {
            return 0;
        }
        let bits = u32::from(prefix_len - self.prefix_len());
        1usize.checked_shl(bits).unwrap_or(usize::MAX)
    }

    /// The `index`-th `/prefix_len` slice of this block, in address order
    pub fn slice(&self, prefix_len: u8, index: usize) -> Option<CidrBlock> {
        self.0
            .subnets(prefix_len)
            .ok()
            .and_then(|mut slices| slices.nth(index))
            .map(CidrBlock)
    }

    /// Get as CIDR notation string
    pub fn as_cidr(&self) -> String {
        self.0.to_string()
    }
}

impl fmt::Display for CidrBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for CidrBlock {
    type Err = NetworkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for CidrBlock {
    type Error = NetworkError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<CidrBlock> for String {
    fn from(block: CidrBlock) -> Self {
        block.as_cidr()
    }
}

/// Gateway a subnet's default route (`0.0.0.0/0`) points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefaultRoute {
    InternetGateway,
    NatGateway,
}

impl DefaultRoute {
    /// Route property naming the gateway id
    pub fn route_key(&self) -> &'static str {
        match self {
            DefaultRoute::InternetGateway => "gatewayId",
            DefaultRoute::NatGateway => "natGatewayId",
        }
    }
}

impl fmt::Display for DefaultRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DefaultRoute::InternetGateway => write!(f, "internet gateway"),
            DefaultRoute::NatGateway => write!(f, "NAT gateway"),
        }
    }
}
