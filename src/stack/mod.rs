// Copyright (c) 2025 - Cowboy AI, Inc.
//! Stack Declaration Context
//!
//! A [`Stack`] is where resources get declared. Each declaration is turned
//! into a lazily evaluated [`Output`] that first resolves the resource's
//! property map (awaiting every upstream output it was built from) and
//! then asks the [`ProvisioningEngine`] to create it.
//!
//! # Architecture
//!
//! ```text
//! Builder fn → Properties (Outputs) → Stack::declare → ResourceHandle
//!                                           ↓
//!                         Stack::apply → join_all(declarations)
//!                                           ↓
//!                         ProvisioningEngine::create (per resource,
//!                           after its inputs resolve)
//! ```
//!
//! # Invariants
//!
//! - Resource names are unique within a stack
//! - A declaration may only consume outputs of resources already declared
//!   in the same stack, so the dependency graph is acyclic by construction
//! - Every lookup is issued at most once per call to [`Stack::lookup`]

pub mod engine;
pub mod memory;

pub use engine::{LookupQuery, ProvisionedResource, ProvisioningEngine, ResourceRequest};
pub use memory::InMemoryEngine;

use futures::future;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::domain::{ResourceKind, ResourceName, ResourceRef};
use crate::errors::{StackError, StackResult};
use crate::journal::{JournalSink, StackEvent};
use crate::output::{self, Output};

/// Property mapping for a resource, each value possibly deferred
#[derive(Debug, Clone, Default)]
pub struct Properties {
    entries: BTreeMap<String, Output<Value>>,
}

impl Properties {
    /// Create an empty property map
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a property whose value is already known
    pub fn set(mut self, key: &str, value: impl Serialize) -> Self {
        let value = match serde_json::to_value(value) {
            Ok(value) => Output::known(value),
            Err(e) => Output::failed(e.into()),
        };
        self.entries.insert(key.to_string(), value);
        self
    }

    /// Set a property from a deferred value
    pub fn set_output<T>(mut self, key: &str, value: Output<T>) -> Self
    where
        T: Serialize + Clone + Send + Sync + 'static,
    {
        let value = value.try_map(|v| Ok(serde_json::to_value(v)?));
        self.entries.insert(key.to_string(), value);
        self
    }

    /// Whether `key` has been set
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Union of the dependencies of every property value
    pub fn dependencies(&self) -> BTreeSet<ResourceRef> {
        self.entries
            .values()
            .flat_map(|v| v.dependencies().iter().cloned())
            .collect()
    }

    /// Lift the whole map into one deferred value
    pub fn into_output(self) -> Output<Map<String, Value>> {
        let (keys, values): (Vec<_>, Vec<_>) = self.entries.into_iter().unzip();
        output::all(values).map(move |values| keys.into_iter().zip(values).collect())
    }
}

/// Handle to a declared resource
///
/// Holds the deferred provisioning result; ids and attributes are derived
/// from it and carry a dependency on this resource.
#[derive(Debug, Clone)]
pub struct ResourceHandle {
    kind: ResourceKind,
    reference: ResourceRef,
    provisioned: Output<ProvisionedResource>,
}

impl ResourceHandle {
    /// Resource kind
    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    /// Logical name
    pub fn name(&self) -> &ResourceName {
        self.reference.name()
    }

    /// Id of the stack that declared this resource
    pub fn stack_id(&self) -> Uuid {
        self.reference.stack_id()
    }

    /// Stack-scoped reference to this resource
    pub fn reference(&self) -> &ResourceRef {
        &self.reference
    }

    /// Provider-assigned id, once created
    pub fn id(&self) -> Output<String> {
        self.provisioned.clone().map(|resource| resource.id)
    }

    /// Provider-reported attribute, once created
    ///
    /// Fails with `DependencyUnresolved` if the engine did not report it.
    pub fn attribute(&self, key: &str) -> Output<Value> {
        let key = key.to_string();
        self.provisioned.clone().try_map(move |resource| {
            resource
                .attributes
                .get(&key)
                .cloned()
                .ok_or_else(|| StackError::unresolved(&resource.name, &key))
        })
    }

    /// The full provisioning result
    pub fn provisioned(&self) -> &Output<ProvisionedResource> {
        &self.provisioned
    }
}

/// One declared resource and its direct dependencies
#[derive(Debug, Clone)]
pub struct Declaration {
    pub kind: ResourceKind,
    pub name: ResourceName,
    pub depends_on: BTreeSet<ResourceName>,
    handle: ResourceHandle,
}

/// Serializable view of the declaration graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphNode {
    pub kind: ResourceKind,
    pub name: ResourceName,
    pub depends_on: BTreeSet<ResourceName>,
}

/// Declaration context for one stack
pub struct Stack {
    id: Uuid,
    name: String,
    engine: Arc<dyn ProvisioningEngine>,
    declarations: Vec<Declaration>,
    index: HashMap<ResourceName, usize>,
}

impl std::fmt::Debug for Stack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stack")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("engine", &self.engine.name())
            .field("resources", &self.declarations.len())
            .finish()
    }
}

impl Stack {
    /// Create an empty stack bound to an engine
    pub fn new(name: impl Into<String>, engine: Arc<dyn ProvisioningEngine>) -> Self {
        Self {
            id: Uuid::now_v7(),
            name: name.into(),
            engine,
            declarations: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Stack run id
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Stack name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declare a resource
    ///
    /// Taggable kinds get `tags = {Name: <name>}` unless `tags` is already set.
    ///
    /// # Errors
    ///
    /// - `Configuration` if the name is already declared
    /// - `DependencyUnresolved` if a property consumes a resource that is
    ///   not declared in this stack, including a same-named resource
    ///   declared by another stack
    pub fn declare(
        &mut self,
        kind: ResourceKind,
        name: ResourceName,
        properties: Properties,
    ) -> StackResult<ResourceHandle> {
        if self.index.contains_key(&name) {
            return Err(StackError::Configuration(format!(
                "resource {name} is declared twice"
            )));
        }

        let properties = if kind.is_taggable() && !properties.contains_key("tags") {
            properties.set("tags", json!({ "Name": name.as_str() }))
        } else {
            properties
        };

        let consumed = properties.dependencies();
        if let Some(foreign) = consumed.iter().find(|d| !self.owns_reference(d)) {
            return Err(StackError::unresolved(&name, foreign.name()));
        }
        let depends_on: BTreeSet<ResourceName> =
            consumed.into_iter().map(ResourceRef::into_name).collect();

        let engine = Arc::clone(&self.engine);
        let body = properties.into_output();
        let request_name = name.clone();
        let provisioned = Output::from_future(
            async move {
                let properties = body.resolve().await?;
                let resource = engine
                    .create(ResourceRequest {
                        kind,
                        name: request_name.clone(),
                        properties,
                    })
                    .await?;
                if resource.id.is_empty() {
                    return Err(StackError::unresolved(&request_name, "id"));
                }
                debug!("Provisioned {} {} as {}", kind, request_name, resource.id);
                Ok(resource)
            },
            BTreeSet::from([ResourceRef::new(self.id, name.clone())]),
        );

        debug!(
            "Declared {} {} (depends on {:?})",
            kind,
            name,
            depends_on.iter().map(ResourceName::as_str).collect::<Vec<_>>()
        );

        let handle = ResourceHandle {
            kind,
            reference: ResourceRef::new(self.id, name.clone()),
            provisioned,
        };
        self.index.insert(name.clone(), self.declarations.len());
        self.declarations.push(Declaration {
            kind,
            name,
            depends_on,
            handle: handle.clone(),
        });

        Ok(handle)
    }

    /// Issue an external lookup
    ///
    /// The returned output is shared: however many consumers derive from
    /// it, the engine sees the query once.
    pub fn lookup(&self, query: LookupQuery) -> Output<Value> {
        let engine = Arc::clone(&self.engine);
        debug!("Declared lookup {}", query);
        Output::from_future(
            async move {
                let value = engine.lookup(&query).await?;
                debug!("Lookup {} resolved", query);
                Ok(value)
            },
            BTreeSet::new(),
        )
    }

    /// Whether a resource with this name is declared here
    pub fn contains(&self, name: &ResourceName) -> bool {
        self.index.contains_key(name)
    }

    /// Whether `handle` was declared by this stack
    ///
    /// Matches on stack id and name; a same-named handle from another
    /// stack is not owned.
    pub fn owns(&self, handle: &ResourceHandle) -> bool {
        self.owns_reference(handle.reference())
            && self
                .declaration(handle.name())
                .map_or(false, |d| d.kind == handle.kind())
    }

    fn owns_reference(&self, reference: &ResourceRef) -> bool {
        reference.is_owned_by(self.id) && self.index.contains_key(reference.name())
    }

    /// Declaration for a name
    pub fn declaration(&self, name: &ResourceName) -> Option<&Declaration> {
        self.index.get(name).map(|&i| &self.declarations[i])
    }

    /// All declarations in declaration order
    pub fn declarations(&self) -> &[Declaration] {
        &self.declarations
    }

    /// Direct dependencies of a declared resource
    pub fn dependencies_of(&self, name: &ResourceName) -> Option<&BTreeSet<ResourceName>> {
        self.declaration(name).map(|d| &d.depends_on)
    }

    /// Serializable declaration graph
    pub fn graph(&self) -> Vec<GraphNode> {
        self.declarations
            .iter()
            .map(|d| GraphNode {
                kind: d.kind,
                name: d.name.clone(),
                depends_on: d.depends_on.clone(),
            })
            .collect()
    }

    /// Provision every declared resource
    ///
    /// All declarations are driven concurrently; each one waits only on
    /// its own inputs. Journal events are recorded as resources complete.
    /// The first failure in declaration order is returned.
    pub async fn apply(&self, journal: &dyn JournalSink) -> StackResult<Vec<ProvisionedResource>> {
        info!(
            "Applying stack {} ({} resources) via {}",
            self.name,
            self.declarations.len(),
            self.engine.name()
        );

        for declaration in &self.declarations {
            journal
                .record(&StackEvent::declared(self.id, &self.name, declaration))
                .await?;
        }

        let results = future::join_all(self.declarations.iter().map(|declaration| async move {
            let resource = declaration.handle.provisioned.resolve().await?;
            journal
                .record(&StackEvent::provisioned(self.id, &self.name, &resource))
                .await?;
            Ok::<_, StackError>(resource)
        }))
        .await;

        let resources = results.into_iter().collect::<StackResult<Vec<_>>>()?;

        journal
            .record(&StackEvent::applied(self.id, &self.name, resources.len()))
            .await?;
        info!("Stack {} applied: {} resources", self.name, resources.len());

        Ok(resources)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::journal::MemoryJournal;

    fn name(s: &str) -> ResourceName {
        ResourceName::new(s).unwrap()
    }

    fn stack() -> (Stack, Arc<InMemoryEngine>) {
        let engine = Arc::new(InMemoryEngine::new());
        (Stack::new("test", engine.clone()), engine)
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let (mut stack, _) = stack();
        stack
            .declare(ResourceKind::Vpc, name("net-vpc"), Properties::new())
            .unwrap();
        let err = stack
            .declare(ResourceKind::Vpc, name("net-vpc"), Properties::new())
            .unwrap_err();
        assert!(matches!(err, StackError::Configuration(_)));
    }

    #[test]
    fn test_foreign_dependency_rejected() {
        let (mut stack, _) = stack();
        let (mut other, _) = self::stack();
        let vpc = other
            .declare(ResourceKind::Vpc, name("net-vpc"), Properties::new())
            .unwrap();

        let err = stack
            .declare(
                ResourceKind::InternetGateway,
                name("net-igw"),
                Properties::new().set_output("vpcId", vpc.id()),
            )
            .unwrap_err();
        assert_eq!(err, StackError::unresolved("net-igw", "net-vpc"));
    }

    #[tokio::test]
    async fn test_same_named_foreign_dependency_rejected() {
        let (mut stack, _) = stack();
        let (mut other, other_engine) = self::stack();
        stack
            .declare(ResourceKind::Vpc, name("net-vpc"), Properties::new())
            .unwrap();
        let foreign_vpc = other
            .declare(ResourceKind::Vpc, name("net-vpc"), Properties::new())
            .unwrap();

        let err = stack
            .declare(
                ResourceKind::InternetGateway,
                name("net-igw"),
                Properties::new().set_output("vpcId", foreign_vpc.id()),
            )
            .unwrap_err();
        assert_eq!(err, StackError::unresolved("net-igw", "net-vpc"));
        assert!(!stack.contains(&name("net-igw")));
        assert!(!stack.owns(&foreign_vpc));
        assert!(other.owns(&foreign_vpc));
        assert!(other_engine.created().await.is_empty());
    }

    #[test]
    fn test_dependencies_recorded() {
        let (mut stack, _) = stack();
        let vpc = stack
            .declare(
                ResourceKind::Vpc,
                name("net-vpc"),
                Properties::new().set("cidrBlock", "10.0.0.0/16"),
            )
            .unwrap();
        stack
            .declare(
                ResourceKind::InternetGateway,
                name("net-igw"),
                Properties::new().set_output("vpcId", vpc.id()),
            )
            .unwrap();

        assert!(stack.dependencies_of(&name("net-vpc")).unwrap().is_empty());
        assert_eq!(
            stack.dependencies_of(&name("net-igw")).unwrap(),
            &BTreeSet::from([name("net-vpc")])
        );
        assert_eq!(stack.graph().len(), 2);
    }

    #[tokio::test]
    async fn test_apply_resolves_inputs_and_tags() {
        let (mut stack, engine) = stack();
        let vpc = stack
            .declare(
                ResourceKind::Vpc,
                name("net-vpc"),
                Properties::new().set("cidrBlock", "10.0.0.0/16"),
            )
            .unwrap();
        let igw = stack
            .declare(
                ResourceKind::InternetGateway,
                name("net-igw"),
                Properties::new().set_output("vpcId", vpc.id()),
            )
            .unwrap();

        let journal = MemoryJournal::new();
        let resources = stack.apply(&journal).await.unwrap();
        assert_eq!(resources.len(), 2);

        let vpc_id = vpc.id().resolve().await.unwrap();
        let request = engine.request(&name("net-igw")).await.unwrap();
        assert_eq!(request.properties["vpcId"], json!(vpc_id));
        assert_eq!(request.properties["tags"], json!({"Name": "net-igw"}));
        assert!(igw.id().resolve().await.unwrap().starts_with("igw-"));

        // declared x2, provisioned x2, applied x1
        assert_eq!(journal.events().await.len(), 5);
    }

    #[tokio::test]
    async fn test_rejection_surfaces_verbatim() {
        let engine = Arc::new(InMemoryEngine::new().reject("net-vpc", "VpcLimitExceeded"));
        let mut stack = Stack::new("test", engine);
        let vpc = stack
            .declare(ResourceKind::Vpc, name("net-vpc"), Properties::new())
            .unwrap();
        stack
            .declare(
                ResourceKind::InternetGateway,
                name("net-igw"),
                Properties::new().set_output("vpcId", vpc.id()),
            )
            .unwrap();

        let err = stack.apply(&MemoryJournal::new()).await.unwrap_err();
        assert_eq!(err, StackError::provision("net-vpc", "VpcLimitExceeded"));
    }

    #[tokio::test]
    async fn test_lookup_issued_once() {
        let (stack, engine) = stack();
        let zones = stack.lookup(LookupQuery::available_zones());
        let first = zones.clone().map(|v| v["names"][0].clone());
        let second = zones.map(|v| v["names"][1].clone());

        assert_eq!(first.resolve().await.unwrap(), json!("us-east-1a"));
        assert_eq!(second.resolve().await.unwrap(), json!("us-east-1b"));
        assert_eq!(engine.lookups().await.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_attribute() {
        let (mut stack, _) = stack();
        let vpc = stack
            .declare(ResourceKind::Vpc, name("net-vpc"), Properties::new())
            .unwrap();
        let err = vpc.attribute("publicIp").resolve().await.unwrap_err();
        assert_eq!(err, StackError::unresolved("net-vpc", "publicIp"));
    }
}
