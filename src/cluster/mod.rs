//! Palette clustering algorithms.
//!
//! Both algorithms reduce a bag of colors to a small set of representatives.
//! They differ in who picks the palette size.
//!
//! ## Algorithms
//!
//! ### K-means
//!
//! The classic algorithm: assign each point to the nearest centroid, then
//! update centroids to the mean of their points. Repeat.
//!
//! **Objective**: Minimize within-cluster sum of squares:
//!
//! ```text
//! J = Σ_k Σ_{x ∈ C_k} ||x - μ_k||²
//! ```
//!
//! **When to use**: You know how many palette entries you want.
//!
//! ### Mean-shift
//!
//! Seeds a grid of spheres over the color cube and lets each drift to the mean
//! of the colors it covers until it stops moving. Dense regions attract several
//! spheres; near-duplicates are pruned at the end.
//!
//! **When to use**: You want the image to decide how many colors it needs.
//!
//! ## Usage
//!
//! ```rust
//! use hueshift::cluster::{Clustering, Kmeans};
//!
//! let data = vec![
//!     vec![0.0, 0.0],
//!     vec![0.1, 0.1],
//!     vec![10.0, 10.0],
//!     vec![10.1, 10.1],
//! ];
//!
//! let labels = Kmeans::new(2)
//!     .with_seed(7)
//!     .with_plus_plus(true)
//!     .fit_predict(&data)
//!     .unwrap();
//! assert_eq!(labels[0], labels[1]);  // First two together
//! assert_ne!(labels[0], labels[2]);  // Separate from last two
//! ```
//!
//! For a non-euclidean metric, progress reporting, or cancellation, build an
//! engine and drive it yourself:
//!
//! ```rust
//! use hueshift::cluster::Kmeans;
//! use hueshift::metric::Chebyshev;
//! use hueshift::progress::{NoProgress, RunFlag};
//! use ndarray::array;
//!
//! let points = array![[0.0, 0.0, 0.0], [0.0, 0.0, 1.0], [9.0, 9.0, 9.0]];
//! let mut engine = Kmeans::new(2).with_seed(1).engine(points, Chebyshev).unwrap();
//! let summary = engine
//!     .compute_until_max_shift(0.5, &RunFlag::new(), &NoProgress)
//!     .unwrap();
//! assert_eq!(engine.clustering().unwrap().len(), 3);
//! # let _ = summary;
//! ```

mod kmeans;
mod mean_shift;
mod traits;

pub use kmeans::{Kmeans, KmeansEngine};
pub use mean_shift::{
    prune_similar, spheres_per_dimension, CandidateState, MeanShift, MeanShiftEngine,
    MAX_CENTROIDS, MIN_CENTROIDS,
};
pub use traits::Clustering;
