// Copyright (c) 2025 - Cowboy AI, Inc.
//! Stack Configuration
//!
//! The handful of inputs the whole stack derives from, with defaults and
//! environment loading.
//!
//! | Variable              | Field                   | Default        |
//! |-----------------------|-------------------------|----------------|
//! | `STACK_NETWORK_NAME`  | `networkName`           | `my-network`   |
//! | `STACK_CIDR_BLOCK`    | `cidrBlock`             | `10.0.0.0/16`  |
//! | `STACK_SSH_KEY_NAME`  | `sshKeyName`            | (required)     |
//! | `STACK_AZ_COUNT`      | `availabilityZoneCount` | `1`            |
//! | `STACK_SUBNET_PREFIX` | `subnetPrefixLength`    | `24`           |
//! | `STACK_INSTANCE_TYPE` | `instanceType`          | `t3.micro`     |

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::compute::{ComputeConfig, ImageFilter, DEFAULT_INSTANCE_TYPE};
use crate::domain::{CidrBlock, ResourceName};
use crate::errors::{StackError, StackResult};
use crate::planner::{
    AddressLayout, DEFAULT_CIDR_BLOCK, DEFAULT_SUBNET_PREFIX, MAX_NETWORK_PREFIX,
    MIN_NETWORK_PREFIX,
};
use crate::topology::TopologyConfig;

/// Default network name prefix
pub const DEFAULT_NETWORK_NAME: &str = "my-network";

pub const ENV_NETWORK_NAME: &str = "STACK_NETWORK_NAME";
pub const ENV_CIDR_BLOCK: &str = "STACK_CIDR_BLOCK";
pub const ENV_SSH_KEY_NAME: &str = "STACK_SSH_KEY_NAME";
pub const ENV_AZ_COUNT: &str = "STACK_AZ_COUNT";
pub const ENV_SUBNET_PREFIX: &str = "STACK_SUBNET_PREFIX";
pub const ENV_INSTANCE_TYPE: &str = "STACK_INSTANCE_TYPE";

/// Inputs of a three-tier stack
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StackConfig {
    pub network_name: String,
    pub cidr_block: String,
    /// Key pair for the bastion host
    pub ssh_key_name: Option<String>,
    pub availability_zone_count: usize,
    pub subnet_prefix_length: u8,
    pub instance_type: String,
}

impl Default for StackConfig {
    fn default() -> Self {
        Self {
            network_name: DEFAULT_NETWORK_NAME.to_string(),
            cidr_block: DEFAULT_CIDR_BLOCK.to_string(),
            ssh_key_name: None,
            availability_zone_count: 1,
            subnet_prefix_length: DEFAULT_SUBNET_PREFIX,
            instance_type: DEFAULT_INSTANCE_TYPE.to_string(),
        }
    }
}

fn parse<T: FromStr>(key: &str, value: String) -> StackResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| StackError::Configuration(format!("{key} has invalid value {value:?}")))
}

impl StackConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> StackResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from any key lookup, falling back to defaults
    pub fn from_lookup<F>(lookup: F) -> StackResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        Ok(Self {
            network_name: lookup(ENV_NETWORK_NAME).unwrap_or(defaults.network_name),
            cidr_block: lookup(ENV_CIDR_BLOCK).unwrap_or(defaults.cidr_block),
            ssh_key_name: lookup(ENV_SSH_KEY_NAME),
            availability_zone_count: lookup(ENV_AZ_COUNT)
                .map(|v| parse(ENV_AZ_COUNT, v))
                .transpose()?
                .unwrap_or(defaults.availability_zone_count),
            subnet_prefix_length: lookup(ENV_SUBNET_PREFIX)
                .map(|v| parse(ENV_SUBNET_PREFIX, v))
                .transpose()?
                .unwrap_or(defaults.subnet_prefix_length),
            instance_type: lookup(ENV_INSTANCE_TYPE).unwrap_or(defaults.instance_type),
        })
    }

    /// Set the bastion key pair
    pub fn with_ssh_key(mut self, key_name: impl Into<String>) -> Self {
        self.ssh_key_name = Some(key_name.into());
        self
    }

    /// Check every input before anything is planned or declared
    ///
    /// # Errors
    ///
    /// - `Configuration` for a missing or blank `sshKeyName`, an invalid
    ///   network name, a zero zone count or an empty instance type
    /// - `InvalidCidr` for a malformed `cidrBlock`
    pub fn validate(&self) -> StackResult<()> {
        self.network_name()?;
        let cidr = self.cidr()?;
        if !(MIN_NETWORK_PREFIX..=MAX_NETWORK_PREFIX).contains(&cidr.prefix_len()) {
            return Err(StackError::Configuration(format!(
                "cidrBlock {cidr} must have a prefix between /{MIN_NETWORK_PREFIX} and /{MAX_NETWORK_PREFIX}"
            )));
        }

        if self.ssh_key().is_none() {
            return Err(StackError::Configuration(
                "sshKeyName is required".to_string(),
            ));
        }
        if self.availability_zone_count == 0 {
            return Err(StackError::Configuration(
                "availabilityZoneCount must be at least 1".to_string(),
            ));
        }
        if self.instance_type.trim().is_empty() {
            return Err(StackError::Configuration(
                "instanceType must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Validated network name
    pub fn network_name(&self) -> StackResult<ResourceName> {
        Ok(ResourceName::new(self.network_name.trim())?)
    }

    /// Parsed base block
    pub fn cidr(&self) -> StackResult<CidrBlock> {
        Ok(CidrBlock::new(self.cidr_block.trim())?)
    }

    /// Non-blank key name
    pub fn ssh_key(&self) -> Option<&str> {
        self.ssh_key_name
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
    }

    pub fn layout(&self) -> AddressLayout {
        AddressLayout {
            zone_count: self.availability_zone_count,
            subnet_prefix_len: self.subnet_prefix_length,
        }
    }

    pub fn topology(&self) -> StackResult<TopologyConfig> {
        Ok(TopologyConfig {
            name: self.network_name()?,
            cidr_block: self.cidr()?,
            layout: self.layout(),
        })
    }

    pub fn compute(&self) -> ComputeConfig {
        ComputeConfig {
            instance_type: self.instance_type.trim().to_string(),
            image: ImageFilter::default(),
        }
    }
}
