// Copyright (c) 2025 - Cowboy AI, Inc.
//! Output - Shared Deferred Values
//!
//! An `Output<T>` wraps a shared future producing `StackResult<T>`.
//! The future is lazy: nothing runs until some consumer awaits it, and once
//! resolved every clone observes the same value (or the same error).
//!
//! # Mathematical Model
//!
//! ```text
//! Output<T> ≅ (Deps, Future<Result<T>>)
//! ```

use futures::future::{self, BoxFuture, FutureExt, Shared};
use std::collections::BTreeSet;
use std::fmt::{self, Debug};
use std::future::Future;
use std::sync::Arc;

use crate::domain::ResourceRef;
use crate::errors::{StackError, StackResult};

type SharedResult<T> = Shared<BoxFuture<'static, StackResult<T>>>;

/// Deferred value produced by (or derived from) declared resources
///
/// # Type Parameters
///
/// - `T`: The resolved value type (must be Clone so every consumer gets a copy)
#[derive(Clone)]
pub struct Output<T> {
    /// Future producing the value, resolved at most once
    future: SharedResult<T>,

    /// Resources this value is derived from
    dependencies: Arc<BTreeSet<ResourceRef>>,
}

impl<T> Debug for Output<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(&format!("Output<{}>", std::any::type_name::<T>()))
            .field("dependencies", &self.dependencies)
            .finish()
    }
}

impl<T> Output<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create an output whose value is already known
    ///
    /// Known outputs depend on nothing.
    pub fn known(value: T) -> Self {
        Self::from_future(future::ready(Ok(value)), BTreeSet::new())
    }

    /// Create an output that always fails with `error`
    pub fn failed(error: StackError) -> Self {
        Self::from_future(future::ready(Err(error)), BTreeSet::new())
    }

    /// Create an output from a future and the resources it derives from
    pub fn from_future<F>(future: F, dependencies: BTreeSet<ResourceRef>) -> Self
    where
        F: Future<Output = StackResult<T>> + Send + 'static,
    {
        Self {
            future: future.boxed().shared(),
            dependencies: Arc::new(dependencies),
        }
    }

    /// Resources this value is derived from
    pub fn dependencies(&self) -> &BTreeSet<ResourceRef> {
        &self.dependencies
    }

    /// Whether this value is derived from `resource`
    pub fn depends_on(&self, resource: &ResourceRef) -> bool {
        self.dependencies.contains(resource)
    }

    /// Add an explicit dependency without changing the value
    pub fn with_dependency(self, resource: ResourceRef) -> Self {
        let mut dependencies = (*self.dependencies).clone();
        dependencies.insert(resource);
        Self {
            future: self.future,
            dependencies: Arc::new(dependencies),
        }
    }

    /// Wait for the value
    ///
    /// Resolving twice does not re-run the underlying future.
    pub async fn resolve(&self) -> StackResult<T> {
        self.future.clone().await
    }

    /// Transform the value once it resolves (Functor)
    pub fn map<U, F>(self, f: F) -> Output<U>
    where
        U: Clone + Send + Sync + 'static,
        F: FnOnce(T) -> U + Send + 'static,
    {
        let dependencies = (*self.dependencies).clone();
        let upstream = self.future;
        Output::from_future(async move { upstream.await.map(f) }, dependencies)
    }

    /// Transform the value with a fallible function
    pub fn try_map<U, F>(self, f: F) -> Output<U>
    where
        U: Clone + Send + Sync + 'static,
        F: FnOnce(T) -> StackResult<U> + Send + 'static,
    {
        let dependencies = (*self.dependencies).clone();
        let upstream = self.future;
        Output::from_future(async move { upstream.await.and_then(f) }, dependencies)
    }

    /// Combine two outputs with a binary function
    ///
    /// Both inputs resolve concurrently; the result depends on the union
    /// of their dependencies.
    pub fn apply2<U, V, F>(self, other: Output<U>, f: F) -> Output<V>
    where
        U: Clone + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
        F: FnOnce(T, U) -> V + Send + 'static,
    {
        let dependencies = self
            .dependencies
            .union(&other.dependencies)
            .cloned()
            .collect();
        let left = self.future;
        let right = other.future;

        Output::from_future(
            async move {
                let (a, b) = future::join(left, right).await;
                Ok(f(a?, b?))
            },
            dependencies,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ResourceName;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use uuid::Uuid;

    fn dep(stack_id: Uuid, s: &str) -> ResourceRef {
        ResourceRef::new(stack_id, ResourceName::new(s).unwrap())
    }

    #[tokio::test]
    async fn test_known_output() {
        let output = Output::known(42);
        assert_eq!(output.resolve().await, Ok(42));
        assert_eq!(output.resolve().await, Ok(42));
        assert!(output.dependencies().is_empty());
    }

    #[tokio::test]
    async fn test_map_identity_and_composition() {
        let output = Output::known(2);

        let identity = output.clone().map(|x| x);
        assert_eq!(identity.resolve().await, output.resolve().await);

        let chained = output.clone().map(|x| x + 1).map(|x| x * 2);
        let fused = output.map(|x| (x + 1) * 2);
        assert_eq!(chained.resolve().await, fused.resolve().await);
    }

    #[tokio::test]
    async fn test_resolves_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let output = Output::from_future(
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok("ami-1".to_string())
            },
            BTreeSet::new(),
        );

        let a = output.clone().map(|id| format!("{id}-a"));
        let b = output.clone().map(|id| format!("{id}-b"));
        assert_eq!(a.resolve().await.unwrap(), "ami-1-a");
        assert_eq!(b.resolve().await.unwrap(), "ami-1-b");
        assert_eq!(output.resolve().await.unwrap(), "ami-1");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_dependencies_union() {
        let stack_id = Uuid::now_v7();
        let vpc = Output::known("vpc-1".to_string()).with_dependency(dep(stack_id, "net-vpc"));
        let igw = Output::known("igw-1".to_string()).with_dependency(dep(stack_id, "net-igw"));

        let route = vpc.apply2(igw, |v, g| format!("{v}->{g}"));
        assert!(route.depends_on(&dep(stack_id, "net-vpc")));
        assert!(route.depends_on(&dep(stack_id, "net-igw")));
        assert_eq!(route.dependencies().len(), 2);
        assert_eq!(route.resolve().await.unwrap(), "vpc-1->igw-1");
    }

    #[test]
    fn test_same_name_from_two_stacks_stays_distinct() {
        let local = Output::known(1).with_dependency(dep(Uuid::now_v7(), "net-public-subnet"));
        let foreign = Output::known(2).with_dependency(dep(Uuid::now_v7(), "net-public-subnet"));

        let combined = local.apply2(foreign, |a, b| a + b);
        assert_eq!(combined.dependencies().len(), 2);
    }

    #[tokio::test]
    async fn test_error_propagates() {
        let broken: Output<String> = Output::failed(StackError::unresolved("net-nat", "allocationId"));
        let derived = broken.map(|id| id.len());
        assert_eq!(
            derived.resolve().await,
            Err(StackError::unresolved("net-nat", "allocationId"))
        );
    }

    #[tokio::test]
    async fn test_try_map() {
        let raw = Output::known("203.0.113.10".to_string());
        let parsed = raw.try_map(|s| {
            s.parse::<std::net::Ipv4Addr>()
                .map_err(|e| StackError::Serialization(e.to_string()))
        });
        assert_eq!(
            parsed.resolve().await.unwrap(),
            std::net::Ipv4Addr::new(203, 0, 113, 10)
        );
    }
}
