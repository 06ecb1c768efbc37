//! Per-pixel map and fold helpers.
//!
//! With the `rayon` feature the work is spread over the global thread pool;
//! without it the same closures run sequentially.

#[cfg(feature = "rayon")]
use rayon::prelude::*;

/// Evaluates `f` for every index in `0..len` and collects the results in index order.
#[cfg(feature = "rayon")]
pub fn map_indexed<T, F>(len: usize, f: F) -> Vec<T>
where
    T: Send,
    F: Fn(usize) -> T + Sync + Send,
{
    (0..len).into_par_iter().map(f).collect()
}

/// Evaluates `f` for every index in `0..len` and collects the results in index order.
#[cfg(not(feature = "rayon"))]
pub fn map_indexed<T, F>(len: usize, f: F) -> Vec<T>
where
    T: Send,
    F: Fn(usize) -> T + Sync + Send,
{
    (0..len).map(f).collect()
}

/// Folds every index in `0..len` into an accumulator.
///
/// `fold` must be order-independent and `reduce` must merge two partial
/// accumulators, since the parallel path splits the range arbitrarily.
#[cfg(feature = "rayon")]
pub fn fold_indexed<A, ID, F, R>(len: usize, identity: ID, fold: F, reduce: R) -> A
where
    A: Send,
    ID: Fn() -> A + Sync + Send,
    F: Fn(A, usize) -> A + Sync + Send,
    R: Fn(A, A) -> A + Sync + Send,
{
    (0..len)
        .into_par_iter()
        .fold(&identity, &fold)
        .reduce(&identity, &reduce)
}

/// Folds every index in `0..len` into an accumulator.
#[cfg(not(feature = "rayon"))]
pub fn fold_indexed<A, ID, F, R>(len: usize, identity: ID, fold: F, _reduce: R) -> A
where
    A: Send,
    ID: Fn() -> A + Sync + Send,
    F: Fn(A, usize) -> A + Sync + Send,
    R: Fn(A, A) -> A + Sync + Send,
{
    (0..len).fold(identity(), fold)
}
