// Copyright (c) 2025 - Cowboy AI, Inc.
//! Output Combinators
//!
//! Free-function forms of the applicative operations on [`Output`], plus
//! `all` for collecting a list of outputs.

use futures::future;
use std::collections::BTreeSet;

use super::deferred::Output;

/// Combine two outputs using a binary function
///
/// Convenience wrapper around `Output::apply2`.
pub fn apply2<T, U, V, F>(a: Output<T>, b: Output<U>, f: F) -> Output<V>
where
    T: Clone + Send + Sync + 'static,
    U: Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    F: FnOnce(T, U) -> V + Send + 'static,
{
    a.apply2(b, f)
}

/// Combine three outputs using a ternary function
pub fn apply3<T, U, V, W, F>(a: Output<T>, b: Output<U>, c: Output<V>, f: F) -> Output<W>
where
    T: Clone + Send + Sync + 'static,
    U: Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    W: Clone + Send + Sync + 'static,
    F: FnOnce(T, U, V) -> W + Send + 'static,
{
    let combined_ab = a.apply2(b, |x, y| (x, y));
    combined_ab.apply2(c, move |(x, y), z| f(x, y, z))
}

/// Collect outputs into one output of a vector, preserving order
///
/// All inputs resolve concurrently. The first failure (in input order)
/// becomes the result.
pub fn all<T>(outputs: Vec<Output<T>>) -> Output<Vec<T>>
where
    T: Clone + Send + Sync + 'static,
{
    let dependencies: BTreeSet<_> = outputs
        .iter()
        .flat_map(|o| o.dependencies().iter().cloned())
        .collect();

    Output::from_future(
        async move {
            future::join_all(outputs.iter().map(|o| o.resolve()))
                .await
                .into_iter()
                .collect()
        },
        dependencies,
    )
}
