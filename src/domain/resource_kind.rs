// Copyright (c) 2025 - Cowboy AI, Inc.
//! Declarable Resource Kinds
//!
//! The vocabulary of resources a stack can ask the provisioning engine to
//! create. The provider type token (`aws:ec2/vpc:Vpc` style) is what an
//! engine adapter dispatches on.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Resource kinds understood by the provisioning engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// Virtual private cloud
    Vpc,
    /// Internet gateway attached to a VPC
    InternetGateway,
    /// Subnet inside a VPC
    Subnet,
    /// Elastic (stable public) IP address
    ElasticIp,
    /// Managed NAT gateway
    NatGateway,
    /// Route table with its routes
    RouteTable,
    /// Binding of a route table to a subnet
    RouteTableAssociation,
    /// Stateful firewall attached to instances
    SecurityGroup,
    /// Compute instance
    Instance,
}

impl ResourceKind {
    /// Every kind, in declaration order of a full stack
    pub const ALL: [ResourceKind; 9] = [
        Self::Vpc,
        Self::InternetGateway,
        Self::Subnet,
        Self::ElasticIp,
        Self::NatGateway,
        Self::RouteTable,
        Self::RouteTableAssociation,
        Self::SecurityGroup,
        Self::Instance,
    ];

    /// Get the canonical string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Vpc => "vpc",
            Self::InternetGateway => "internet_gateway",
            Self::Subnet => "subnet",
            Self::ElasticIp => "elastic_ip",
            Self::NatGateway => "nat_gateway",
            Self::RouteTable => "route_table",
            Self::RouteTableAssociation => "route_table_association",
            Self::SecurityGroup => "security_group",
            Self::Instance => "instance",
        }
    }

    /// Provider type token
    pub fn provider_type(&self) -> &'static str {
        match self {
            Self::Vpc => "aws:ec2/vpc:Vpc",
            Self::InternetGateway => "aws:ec2/internetGateway:InternetGateway",
            Self::Subnet => "aws:ec2/subnet:Subnet",
            Self::ElasticIp => "aws:ec2/eip:Eip",
            Self::NatGateway => "aws:ec2/natGateway:NatGateway",
            Self::RouteTable => "aws:ec2/routeTable:RouteTable",
            Self::RouteTableAssociation => "aws:ec2/routeTableAssociation:RouteTableAssociation",
            Self::SecurityGroup => "aws:ec2/securityGroup:SecurityGroup",
            Self::Instance => "aws:ec2/instance:Instance",
        }
    }

    /// Prefix used for identifiers minted by the provider (`vpc-…`, `sg-…`)
    pub fn id_prefix(&self) -> &'static str {
        match self {
            Self::Vpc => "vpc",
            Self::InternetGateway => "igw",
            Self::Subnet => "subnet",
            Self::ElasticIp => "eipalloc",
            Self::NatGateway => "nat",
            Self::RouteTable => "rtb",
            Self::RouteTableAssociation => "rtbassoc",
            Self::SecurityGroup => "sg",
            Self::Instance => "i",
        }
    }

    /// Whether the resource accepts a `tags` property
    pub fn is_taggable(&self) -> bool {
        !matches!(self, Self::ElasticIp | Self::RouteTableAssociation)
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
