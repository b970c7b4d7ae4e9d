// Copyright (c) 2025 - Cowboy AI, Inc.
//! Resource Name Value Object
//!
//! Every declared resource carries a logical name that is unique within
//! its stack and doubles as its `Name` tag.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Resource name validation error
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResourceNameError {
    #[error("Resource name is empty")]
    Empty,

    #[error("Resource name exceeds maximum length of 255 characters: {0}")]
    TooLong(usize),

    #[error("Invalid character in resource name: {0:?}")]
    InvalidCharacter(char),

    #[error("Resource name cannot start or end with hyphen: {0}")]
    InvalidFormat(String),
}

/// Logical resource name
///
/// Invariants:
/// - Non-empty, at most 255 characters
/// - ASCII letters, digits and hyphens only
/// - Cannot start or end with a hyphen
///
/// # Examples
///
/// ```rust
/// use cim_network_stack::domain::ResourceName;
///
/// let vpc = ResourceName::new("my-network-vpc").unwrap();
/// assert_eq!(vpc.child("assoc").unwrap().as_str(), "my-network-vpc-assoc");
/// assert!(ResourceName::new("-vpc").is_err());
/// assert!(ResourceName::new("my network").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ResourceName(String);

impl ResourceName {
    /// Maximum length of a resource name (EC2 tag value limit)
    pub const MAX_LENGTH: usize = 255;

    /// Create a new resource name with validation
    pub fn new(name: impl Into<String>) -> Result<Self, ResourceNameError> {
        let name = name.into();

        if name.is_empty() {
            return Err(ResourceNameError::Empty);
        }

        if name.len() > Self::MAX_LENGTH {
            return Err(ResourceNameError::TooLong(name.len()));
        }

        if let Some(ch) = name.chars().find(|c| !c.is_ascii_alphanumeric() && *c != '-') {
            return Err(ResourceNameError::InvalidCharacter(ch));
        }

        if name.starts_with('-') || name.ends_with('-') {
            return Err(ResourceNameError::InvalidFormat(name));
        }

        Ok(Self(name))
    }

    /// Derive `{self}-{suffix}`
    pub fn child(&self, suffix: &str) -> Result<Self, ResourceNameError> {
        Self::new(format!("{}-{}", self.0, suffix))
    }

    /// Get the name as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for ResourceName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ResourceName {
    type Error = ResourceNameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for ResourceName {
    type Error = ResourceNameError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ResourceName> for String {
    fn from(name: ResourceName) -> Self {
        name.0
    }
}
