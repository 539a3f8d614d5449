//! Run configuration for [`quantize`](crate::quantize).
//!
//! One flat struct covers both algorithms; fields that do not apply to the
//! selected algorithm are ignored. With the `serde` feature it round-trips
//! through any serde format, and missing fields take their defaults:
//!
//! ```rust
//! use hueshift::config::{Algorithm, QuantizeConfig};
//!
//! let config = QuantizeConfig::default()
//!     .with_algorithm(Algorithm::MeanShift)
//!     .with_metric("scaled(euclidean, (1, 2, 1))")
//!     .with_max_centroids(64);
//! assert!(config.validate().is_ok());
//! ```

use std::fmt;
use std::str::FromStr;

use crate::cluster::{Kmeans, MeanShift};
use crate::error::{Error, Result};
use crate::metric::{parse_metric, Metric};

/// Which clustering algorithm to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum Algorithm {
    /// Fixed palette size.
    #[default]
    Kmeans,
    /// Palette size discovered from the data.
    MeanShift,
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Algorithm::Kmeans => "kmeans",
            Algorithm::MeanShift => "mean-shift",
        })
    }
}

impl FromStr for Algorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "kmeans" | "k-means" => Ok(Algorithm::Kmeans),
            "mean-shift" | "meanshift" | "mean_shift" => Ok(Algorithm::MeanShift),
            _ => Err(Error::InvalidParameter {
                name: "algorithm",
                message: "expected \"kmeans\" or \"mean-shift\"",
            }),
        }
    }
}

/// Everything a quantization run needs besides the pixels.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct QuantizeConfig {
    /// Algorithm to run.
    pub algorithm: Algorithm,
    /// Palette size for k-means.
    pub k: usize,
    /// Metric descriptor, e.g. `"euclidean"` or `"norm(3)"`.
    pub metric: String,
    /// K-means stops once no centroid moves farther than this. Mean-shift uses
    /// it as `min_movement`.
    pub convergence_threshold: f64,
    /// Mean-shift candidate budget, in `[16, 256]`.
    pub max_centroids: usize,
    /// K-means iterates over distinct colors with counts.
    pub use_histogram: bool,
    /// K-means seeds with k-means++.
    pub use_kmeans_plus_plus: bool,
    /// RNG seed for k-means seeding.
    pub seed: Option<u64>,
    /// Iteration cap for either algorithm.
    pub max_iter: Option<usize>,
}

impl Default for QuantizeConfig {
    fn default() -> Self {
        Self {
            algorithm: Algorithm::Kmeans,
            k: 4,
            metric: "euclidean".to_string(),
            convergence_threshold: 3.0,
            max_centroids: 256,
            use_histogram: true,
            use_kmeans_plus_plus: true,
            seed: None,
            max_iter: None,
        }
    }
}

impl QuantizeConfig {
    /// Select the algorithm.
    pub fn with_algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Set the k-means palette size.
    pub fn with_k(mut self, k: usize) -> Self {
        self.k = k;
        self
    }

    /// Set the metric descriptor.
    pub fn with_metric(mut self, metric: impl Into<String>) -> Self {
        self.metric = metric.into();
        self
    }

    /// Set the convergence threshold.
    pub fn with_convergence_threshold(mut self, threshold: f64) -> Self {
        self.convergence_threshold = threshold;
        self
    }

    /// Set the mean-shift candidate budget.
    pub fn with_max_centroids(mut self, max_centroids: usize) -> Self {
        self.max_centroids = max_centroids;
        self
    }

    /// Toggle the histogram fast path.
    pub fn with_histogram(mut self, use_histogram: bool) -> Self {
        self.use_histogram = use_histogram;
        self
    }

    /// Toggle k-means++ seeding.
    pub fn with_plus_plus(mut self, plus_plus: bool) -> Self {
        self.use_kmeans_plus_plus = plus_plus;
        self
    }

    /// Fix the RNG seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Cap the iterations.
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = Some(max_iter);
        self
    }

    /// Parse the metric descriptor.
    pub fn parse_metric(&self) -> Result<Box<dyn Metric>> {
        Ok(parse_metric(&self.metric)?)
    }

    /// K-means settings derived from this config.
    pub fn kmeans(&self) -> Kmeans {
        let mut kmeans = Kmeans::new(self.k)
            .with_tol(self.convergence_threshold)
            .with_histogram(self.use_histogram)
            .with_plus_plus(self.use_kmeans_plus_plus);
        if let Some(seed) = self.seed {
            kmeans = kmeans.with_seed(seed);
        }
        if let Some(max_iter) = self.max_iter {
            kmeans = kmeans.with_max_iter(max_iter);
        }
        kmeans
    }

    /// Mean-shift settings derived from this config.
    pub fn mean_shift(&self) -> MeanShift {
        let mean_shift = MeanShift::new()
            .with_max_centroids(self.max_centroids)
            .with_min_movement(self.convergence_threshold);
        match self.max_iter {
            Some(max_iter) => mean_shift.with_max_iter(max_iter),
            None => mean_shift,
        }
    }

    /// Check the settings of the selected algorithm and the metric.
    ///
    /// Nothing is clamped: every out-of-range value is an error.
    pub fn validate(&self) -> Result<()> {
        let _ = self.parse_metric()?;
        match self.algorithm {
            Algorithm::Kmeans => self.kmeans().validate(),
            Algorithm::MeanShift => self.mean_shift().validate(),
        }
    }
}
