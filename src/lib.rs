//! # hueshift
//!
//! Palette reduction by clustering: turn millions of pixel colors into a
//! handful of representatives, then map every pixel to its nearest one.
//!
//! Two algorithms are provided:
//!
//! - **K-means** ([`cluster::Kmeans`]): you pick the palette size. Optional
//!   histogram fast path and k-means++ seeding.
//! - **Mean-shift** ([`cluster::MeanShift`]): the data picks the palette size,
//!   using a [`spatial::SpatialPartition`] for its radius queries.
//!
//! Distances are pluggable ([`metric`]), including a small text grammar for
//! choosing one from a config file. Long runs report progress over a channel
//! and can be cancelled cooperatively ([`progress`]).
//!
//! ```rust
//! use hueshift::{Algorithm, NoProgress, QuantizeConfig, RunFlag};
//!
//! let pixels: Vec<Vec<u8>> = (0..64).map(|i| vec![i * 4, 255 - i * 4, 128]).collect();
//! let result = QuantizeConfig::default()
//!     .with_algorithm(Algorithm::Kmeans)
//!     .with_k(4)
//!     .with_seed(42)
//!     .quantize(&pixels, &RunFlag::new(), &NoProgress)
//!     .unwrap();
//!
//! assert_eq!(result.palette.len(), 4);
//! assert_eq!(result.indices.len(), pixels.len());
//! ```
//!
//! Image decoding and encoding are out of scope: feed in channel tuples, get
//! back a palette and one index per pixel.

pub mod cluster;
pub mod config;
/// Error types used across `hueshift`.
pub mod error;
pub mod histogram;
pub mod metric;
pub mod nearest;
pub mod point;
pub mod progress;
pub mod quantize;
pub mod spatial;

pub use cluster::{Clustering, Kmeans, KmeansEngine, MeanShift, MeanShiftEngine};
pub use config::{Algorithm, QuantizeConfig};
pub use error::{Error, Result};
pub use metric::{parse_metric, Chebyshev, Metric, MetricRegistry, Norm, Scaled};
pub use progress::{NoProgress, ProgressEvent, ProgressSink, RunFlag, RunStatus, RunSummary};
pub use quantize::Quantized;
