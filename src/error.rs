use thiserror::Error;

use crate::metric::MetricParseError;

/// Result alias for `hueshift`.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by the clustering engines and their helpers.
///
/// Every variant except [`Error::EmptyCandidateSet`] is a configuration error:
/// it is detected before the first iteration and is terminal to the run.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// Nearest-candidate search was asked to choose from nothing.
    #[error("nearest assignment requires at least one candidate")]
    EmptyCandidateSet,

    /// A point does not have the arity established by the first point.
    #[error("dimension mismatch at row {row}: expected {expected}, found {found}")]
    DimensionMismatch {
        /// Row of the offending point.
        row: usize,
        /// Expected dimension.
        expected: usize,
        /// Found dimension.
        found: usize,
    },

    /// Invalid number of clusters requested.
    #[error("cannot create {requested} clusters")]
    InvalidClusterCount {
        /// Requested count.
        requested: usize,
    },

    /// Mean-shift initial sampling outside the supported range.
    #[error("max_centroids must lie in [{min}, {max}], got {requested}")]
    MaxCentroidsOutOfRange {
        /// Requested count.
        requested: usize,
        /// Smallest accepted value.
        min: usize,
        /// Largest accepted value.
        max: usize,
    },

    /// Invalid parameter value.
    #[error("invalid parameter '{name}': {message}")]
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// Error message.
        message: &'static str,
    },

    /// A metric descriptor could not be resolved.
    #[error(transparent)]
    Metric(#[from] MetricParseError),
}

impl Error {
    /// True for errors caused by the run configuration rather than by a caller bug.
    pub fn is_configuration(&self) -> bool {
        !matches!(self, Error::EmptyCandidateSet)
    }
}
