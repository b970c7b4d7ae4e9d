// Copyright (c) 2025 - Cowboy AI, Inc.
//! In-Memory Provisioning Engine
//!
//! A deterministic engine for dry runs and tests. It mints provider-style
//! ids (`vpc-00000001`), hands out public addresses from TEST-NET-3
//! (`203.0.113.10` to `203.0.113.254`, after which creation fails with
//! `AddressLimitExceeded`) and enforces the referential checks a real provider
//! would: a subnet must name an existing VPC, an instance an existing
//! subnet and security groups, and so on.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::{json, Map, Value};
use std::collections::{HashMap, HashSet};
use std::net::Ipv4Addr;
use tokio::sync::Mutex;
use tracing::debug;

use super::engine::{LookupQuery, ProvisionedResource, ProvisioningEngine, ResourceRequest};
use crate::compute::ImageFilter;
use crate::domain::{ResourceKind, ResourceName};
use crate::errors::{StackError, StackResult};

/// First public address handed out (203.0.113.10)
const PUBLIC_POOL_START: u32 = u32::from_be_bytes([203, 0, 113, 10]);

/// Last public address handed out (203.0.113.254)
const PUBLIC_POOL_END: u32 = u32::from_be_bytes([203, 0, 113, 254]);

/// An image in the engine's catalog
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogImage {
    pub id: String,
    pub name: String,
    pub owner: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct EngineState {
    requests: Vec<ResourceRequest>,
    created: Vec<ProvisionedResource>,
    ids: HashSet<String>,
    lookups: Vec<LookupQuery>,
    counters: HashMap<ResourceKind, u32>,
    next_public_ip: u32,
}

/// Deterministic in-memory provisioning engine
#[derive(Debug)]
pub struct InMemoryEngine {
    zones: Vec<String>,
    images: Vec<CatalogImage>,
    rejections: HashMap<String, String>,
    state: Mutex<EngineState>,
}

impl Default for InMemoryEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryEngine {
    /// Engine with three zones and a small Amazon Linux 2 catalog
    pub fn new() -> Self {
        Self {
            zones: vec![
                "us-east-1a".to_string(),
                "us-east-1b".to_string(),
                "us-east-1c".to_string(),
            ],
            images: [
                ("ami-0a1b2c3d4e5f60001", "amzn2-ami-hvm-2.0.20240306.2-x86_64-gp2", (2024, 3, 6)),
                ("ami-0a1b2c3d4e5f60002", "amzn2-ami-hvm-2.0.20240412.0-x86_64-gp2", (2024, 4, 12)),
                ("ami-0a1b2c3d4e5f60003", "amzn2-ami-hvm-2.0.20240501.0-arm64-gp2", (2024, 5, 1)),
            ]
            .into_iter()
            .filter_map(|(id, name, (y, m, d))| {
                Utc.with_ymd_and_hms(y, m, d, 0, 0, 0)
                    .single()
                    .map(|created_at| CatalogImage {
                        id: id.to_string(),
                        name: name.to_string(),
                        owner: "amazon".to_string(),
                        created_at,
                    })
            })
            .collect(),
            rejections: HashMap::new(),
            state: Mutex::new(EngineState {
                next_public_ip: PUBLIC_POOL_START,
                ..EngineState::default()
            }),
        }
    }

    /// Replace the zone list
    pub fn with_zones<I, S>(mut self, zones: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.zones = zones.into_iter().map(Into::into).collect();
        self
    }

    /// Add an image to the catalog
    pub fn with_image(mut self, image: CatalogImage) -> Self {
        self.images.push(image);
        self
    }

    /// Reject creation of the named resource with `reason`
    pub fn reject(mut self, name: impl Into<String>, reason: impl Into<String>) -> Self {
        self.rejections.insert(name.into(), reason.into());
        self
    }

    /// Every request received, in arrival order
    pub async fn requests(&self) -> Vec<ResourceRequest> {
        self.state.lock().await.requests.clone()
    }

    /// The request received for a resource
    pub async fn request(&self, name: &ResourceName) -> Option<ResourceRequest> {
        self.state
            .lock()
            .await
            .requests
            .iter()
            .find(|r| &r.name == name)
            .cloned()
    }

    /// Every resource created, in creation order
    pub async fn created(&self) -> Vec<ProvisionedResource> {
        self.state.lock().await.created.clone()
    }

    /// Every lookup answered
    pub async fn lookups(&self) -> Vec<LookupQuery> {
        self.state.lock().await.lookups.clone()
    }

    fn required_references(kind: ResourceKind) -> &'static [&'static str] {
        match kind {
            ResourceKind::InternetGateway | ResourceKind::Subnet => &["vpcId"],
            ResourceKind::RouteTable | ResourceKind::SecurityGroup => &["vpcId"],
            ResourceKind::NatGateway => &["allocationId", "subnetId"],
            ResourceKind::RouteTableAssociation => &["subnetId", "routeTableId"],
            ResourceKind::Instance => &["subnetId"],
            ResourceKind::Vpc | ResourceKind::ElasticIp => &[],
        }
    }

    /// Collect every id a property refers to that this engine never minted
    fn unknown_references(state: &EngineState, request: &ResourceRequest) -> Vec<String> {
        let mut unknown: Vec<String> = Vec::new();
        let mut referenced: Vec<&Value> = Vec::new();
        for key in Self::required_references(request.kind) {
            match request.properties.get(*key) {
                Some(value) => referenced.push(value),
                None => unknown.push(format!("missing {key}")),
            }
        }

        if let Some(Value::Array(groups)) = request.properties.get("vpcSecurityGroupIds") {
            referenced.extend(groups.iter());
        }
        if let Some(Value::Array(routes)) = request.properties.get("routes") {
            for route in routes {
                referenced.extend(route.get("gatewayId"));
                referenced.extend(route.get("natGatewayId"));
            }
        }
        for direction in ["ingress", "egress"] {
            if let Some(Value::Array(rules)) = request.properties.get(direction) {
                for rule in rules {
                    if let Some(Value::Array(groups)) = rule.get("securityGroups") {
                        referenced.extend(groups.iter());
                    }
                }
            }
        }

        unknown.extend(
            referenced
                .into_iter()
                .filter(|v| !matches!(v.as_str(), Some(id) if state.ids.contains(id)))
                .map(|v| v.to_string()),
        );
        unknown
    }

    fn validate(state: &EngineState, request: &ResourceRequest) -> Result<(), String> {
        let unknown = Self::unknown_references(state, request);
        if !unknown.is_empty() {
            return Err(format!("InvalidReference: {}", unknown.join(", ")));
        }

        if request.kind == ResourceKind::Instance {
            match request.properties.get("vpcSecurityGroupIds") {
                Some(Value::Array(groups)) if !groups.is_empty() => {}
                _ => return Err("InvalidParameter: vpcSecurityGroupIds is empty".to_string()),
            }
            if !matches!(request.properties.get("ami"), Some(Value::String(_))) {
                return Err("InvalidParameter: ami is required".to_string());
            }
        }

        Ok(())
    }

    /// Image matching `filter`
    ///
    /// With `most_recent` the newest match wins; without it the filter must
    /// match exactly one image.
    fn find_image(&self, filter: &ImageFilter) -> StackResult<&CatalogImage> {
        let lookup_error = |reason: String| StackError::Lookup {
            query: filter.name_pattern.clone(),
            reason,
        };
        let pattern = glob::Pattern::new(&filter.name_pattern)
            .map_err(|e| lookup_error(e.to_string()))?;

        let mut matches: Vec<&CatalogImage> = self
            .images
            .iter()
            .filter(|image| filter.owners.is_empty() || filter.owners.contains(&image.owner))
            .filter(|image| pattern.matches(&image.name))
            .collect();

        if !filter.most_recent && matches.len() > 1 {
            return Err(lookup_error(format!(
                "{} images match and most recent was not requested",
                matches.len()
            )));
        }
        matches.sort_by_key(|image| image.created_at);
        matches
            .pop()
            .ok_or_else(|| lookup_error("no matching image".to_string()))
    }
}

#[async_trait]
impl ProvisioningEngine for InMemoryEngine {
    async fn create(&self, request: ResourceRequest) -> StackResult<ProvisionedResource> {
        let mut state = self.state.lock().await;
        state.requests.push(request.clone());

        if let Some(reason) = self.rejections.get(request.name.as_str()) {
            return Err(StackError::provision(&request.name, reason));
        }
        Self::validate(&state, &request).map_err(|reason| StackError::provision(&request.name, reason))?;

        let wants_public_ip = match request.kind {
            ResourceKind::ElasticIp => true,
            ResourceKind::Instance => request.properties.get("associatePublicIpAddress")
                == Some(&Value::Bool(true)),
            _ => false,
        };
        let public_ip = if wants_public_ip {
            if state.next_public_ip > PUBLIC_POOL_END {
                return Err(StackError::provision(
                    &request.name,
                    "AddressLimitExceeded: public address pool is exhausted",
                ));
            }
            let address = Ipv4Addr::from(state.next_public_ip);
            state.next_public_ip += 1;
            Some(address)
        } else {
            None
        };

        let counter = state.counters.entry(request.kind).or_insert(0);
        *counter += 1;
        let id = format!("{}-{:08x}", request.kind.id_prefix(), counter);

        let mut attributes: Map<String, Value> = request.properties.clone();
        attributes.insert("id".to_string(), json!(id));
        if let Some(address) = public_ip {
            attributes.insert("publicIp".to_string(), json!(address.to_string()));
        }

        let resource = ProvisionedResource {
            kind: request.kind,
            name: request.name,
            id: id.clone(),
            attributes,
        };
        state.ids.insert(id);
        state.created.push(resource.clone());
        debug!("In-memory engine created {} {}", resource.kind, resource.id);

        Ok(resource)
    }

    async fn lookup(&self, query: &LookupQuery) -> StackResult<Value> {
        self.state.lock().await.lookups.push(query.clone());

        match query {
            LookupQuery::AvailabilityZones { .. } => Ok(json!({ "names": self.zones })),
            LookupQuery::LatestImage(filter) => {
                let image = self.find_image(filter)?;
                Ok(json!({ "id": image.id, "name": image.name }))
            }
        }
    }

    fn name(&self) -> &str {
        "in-memory"
    }
}
