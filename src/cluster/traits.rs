//! Clustering traits.

use crate::error::Result;

/// Trait for clustering algorithms.
pub trait Clustering {
    /// Fit the model to data and return cluster assignments.
    ///
    /// Returns a vector of cluster labels, one per input point. Points are
    /// compared with the euclidean metric; use the engines directly for others.
    fn fit_predict(&self, data: &[Vec<f64>]) -> Result<Vec<usize>>;

    /// Get the number of clusters, or the upper bound on it for algorithms
    /// that discover the count.
    fn n_clusters(&self) -> usize;
}
