//! Mean-shift mode seeking.
//!
//! Discovers the number of palette entries instead of taking it as input.
//!
//! # Algorithm
//!
//! 1. Tile the bounding cube of the data with `s^d` equal spheres, one candidate
//!    at each center (`s` chosen so that `s^d <= max_centroids`)
//! 2. **Step**: move every active candidate to the mean of the points inside its
//!    sphere. A sphere with no points discards its candidate; a candidate that
//!    moved less than `min_movement` settles.
//! 3. Repeat until no candidate is active
//! 4. **Prune**: settled candidates closer than `min_movement` to an earlier
//!    survivor are dropped
//!
//! Sphere membership goes through a [`SpatialPartition`] built once over the
//! points, so a step costs roughly one bucket scan per candidate instead of one
//! pass over the whole image.
//!
//! The bounding cube uses the same `[min, max]` range on every axis (the
//! overall extremes across all coordinates), so spheres are never squashed
//! along a narrow axis.

use ndarray::{Array1, Array2, ArrayView2, Axis};
use tracing::{debug, info, trace};

use super::traits::Clustering;
use crate::error::{Error, Result};
use crate::metric::{Metric, Norm};
use crate::nearest::assign_all;
use crate::point::{or_synthetic, points_from_rows, round_points};
use crate::progress::{NoProgress, ProgressSink, RunFlag, RunStatus, RunSummary};
use crate::spatial::SpatialPartition;

/// Smallest accepted `max_centroids`.
pub const MIN_CENTROIDS: usize = 16;
/// Largest accepted `max_centroids`; an 8-bit palette holds no more.
pub const MAX_CENTROIDS: usize = 256;

/// Mean-shift settings.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MeanShift {
    /// Upper bound on the number of initial candidates.
    max_centroids: usize,
    /// Settling threshold, also the pruning distance.
    min_movement: f64,
    /// Maximum global steps per driven run.
    max_iter: Option<usize>,
}

impl MeanShift {
    /// Create a mean-shift miner with 256 candidates and a movement threshold of 3.
    pub fn new() -> Self {
        Self {
            max_centroids: MAX_CENTROIDS,
            min_movement: 3.0,
            max_iter: None,
        }
    }

    /// Set the candidate budget, in `[16, 256]`.
    pub fn with_max_centroids(mut self, max_centroids: usize) -> Self {
        self.max_centroids = max_centroids;
        self
    }

    /// Set the settling and pruning distance.
    pub fn with_min_movement(mut self, min_movement: f64) -> Self {
        self.min_movement = min_movement;
        self
    }

    /// Cap the global steps of a driven run.
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = Some(max_iter);
        self
    }

    /// Candidate budget.
    pub fn max_centroids(&self) -> usize {
        self.max_centroids
    }

    /// Settling and pruning distance.
    pub fn min_movement(&self) -> f64 {
        self.min_movement
    }

    /// Check the settings without touching any data.
    pub fn validate(&self) -> Result<()> {
        if !(MIN_CENTROIDS..=MAX_CENTROIDS).contains(&self.max_centroids) {
            return Err(Error::MaxCentroidsOutOfRange {
                requested: self.max_centroids,
                min: MIN_CENTROIDS,
                max: MAX_CENTROIDS,
            });
        }
        // Zero would never settle a candidate that keeps jittering.
        if !(self.min_movement.is_finite() && self.min_movement > 0.0) {
            return Err(Error::InvalidParameter {
                name: "min_movement",
                message: "must be a finite number greater than zero",
            });
        }
        Ok(())
    }

    /// Lay out the candidate grid and index `points`.
    ///
    /// An empty collection is replaced by a single origin point.
    pub fn engine<M: Metric>(&self, points: Array2<f64>, metric: M) -> Result<MeanShiftEngine<M>> {
        self.validate()?;
        let data = or_synthetic(points);
        let dims = data.ncols();

        let (min, max) = data
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            });
        let range_length = max - min + 1.0;
        let per_dim = spheres_per_dimension(self.max_centroids, dims);
        let radius = range_length / per_dim as f64 / 2.0;

        let candidates = grid_centers(min, radius, per_dim, dims);
        let n = candidates.nrows();
        let space = SpatialPartition::build(data, per_dim);

        info!(
            points = space.len(),
            leaves = space.leaf_count(),
            candidates = n,
            spheres_per_dimension = per_dim,
            radius,
            "laid out mean-shift grid"
        );

        Ok(MeanShiftEngine {
            space,
            metric,
            radius,
            min_movement: self.min_movement,
            spheres_per_dimension: per_dim,
            candidates,
            states: vec![CandidateState::Active; n],
            iterations: 0,
            max_iter: self.max_iter,
        })
    }
}

impl Default for MeanShift {
    fn default() -> Self {
        Self::new()
    }
}

/// Largest `s >= 1` with `s^dims <= max_centroids`.
pub fn spheres_per_dimension(max_centroids: usize, dims: usize) -> usize {
    let Ok(exp) = u32::try_from(dims) else {
        return 1;
    };
    if exp == 0 {
        return 1;
    }
    let mut s = 1usize;
    while (s + 1)
        .checked_pow(exp)
        .is_some_and(|total| total <= max_centroids)
    {
        s += 1;
    }
    s
}

/// Sphere centers of an `s^dims` grid, axis 0 varying fastest.
fn grid_centers(min: f64, radius: f64, per_dim: usize, dims: usize) -> Array2<f64> {
    let total = (0..dims).fold(1usize, |acc, _| acc.saturating_mul(per_dim));
    Array2::from_shape_fn((total, dims), |(i, axis)| {
        let digit = (i / per_dim.pow(axis as u32)) % per_dim;
        min + radius + 2.0 * radius * digit as f64
    })
}

/// Drop centroids closer than `threshold` to an earlier kept one.
///
/// Walks `centroids` in order, so the first of two near-duplicates survives.
/// Distances exactly equal to `threshold` count as distinct.
pub fn prune_similar<M: Metric + ?Sized>(
    centroids: ArrayView2<'_, f64>,
    metric: &M,
    threshold: f64,
) -> Array2<f64> {
    let mut kept: Vec<usize> = Vec::new();
    for (i, c) in centroids.outer_iter().enumerate() {
        if kept
            .iter()
            .all(|&j| metric.distance(centroids.row(j), c) >= threshold)
        {
            kept.push(i);
        }
    }
    if kept.is_empty() {
        Array2::zeros((0, centroids.ncols()))
    } else {
        centroids.select(Axis(0), &kept)
    }
}

/// Lifecycle of one candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateState {
    /// Still moving.
    Active,
    /// Moved less than `min_movement` in its last step.
    Settled,
    /// Its sphere held no points.
    Discarded,
}

/// A running mean-shift computation.
#[derive(Debug, Clone)]
pub struct MeanShiftEngine<M> {
    space: SpatialPartition,
    metric: M,
    radius: f64,
    min_movement: f64,
    spheres_per_dimension: usize,
    candidates: Array2<f64>,
    states: Vec<CandidateState>,
    iterations: usize,
    max_iter: Option<usize>,
}

impl<M: Metric> MeanShiftEngine<M> {
    /// Move every active candidate once. Returns the largest shift.
    pub fn step<S: ProgressSink>(&mut self, sink: &S) -> f64 {
        let n = self.candidates.nrows();
        let mut max_shift = 0.0f64;

        for i in 0..n {
            if self.states[i] != CandidateState::Active {
                continue;
            }
            let center = self.candidates.row(i);
            let members = self.space.points_in_radius(center, self.radius, &self.metric);
            let mean: Option<Array1<f64>> = if members.is_empty() {
                None
            } else {
                self.space.points().select(Axis(0), &members).mean_axis(Axis(0))
            };
            let Some(mean) = mean else {
                trace!(candidate = i, "empty sphere, discarding");
                self.states[i] = CandidateState::Discarded;
                continue;
            };

            let shift = self.metric.distance(center, mean.view());
            self.candidates.row_mut(i).assign(&mean);
            max_shift = max_shift.max(shift);
            if shift < self.min_movement {
                trace!(candidate = i, members = members.len(), "settled");
                self.states[i] = CandidateState::Settled;
            }

            sink.status(format!(
                "Moving centroid {} of {}\nIteration: {}, Shift: {:.2}",
                i + 1,
                n,
                self.iterations + 1,
                shift
            ));
        }

        self.iterations += 1;
        max_shift
    }

    /// Step until no candidate is active, the flag is lowered, or `max_iter`
    /// runs out. The flag is checked once per global step.
    pub fn run<S: ProgressSink>(&mut self, flag: &RunFlag, sink: &S) -> RunSummary {
        let mut iterations = 0;
        let mut max_shift = f64::INFINITY;
        let status = loop {
            let active = self.active_count();
            if active == 0 {
                break RunStatus::Converged;
            }
            if !flag.is_running() {
                break RunStatus::Cancelled;
            }
            if self.max_iter.is_some_and(|max| iterations >= max) {
                break RunStatus::IterationLimit;
            }

            sink.status(format!("Shifting centroids: {active} still moving"));
            max_shift = self.step(sink);
            iterations += 1;
            debug!(
                iteration = self.iterations,
                active = self.active_count(),
                settled = self.settled_count(),
                max_shift,
                "mean-shift step"
            );
        };

        info!(
            ?status,
            iterations,
            settled = self.settled_count(),
            discarded = self.count(CandidateState::Discarded),
            "mean-shift stopped"
        );
        RunSummary {
            status,
            iterations,
            max_shift,
        }
    }

    /// Settled candidates, then any still active, in candidate order, before
    /// pruning. After a converged run there are no active ones left.
    pub fn raw_centroids(&self) -> Array2<f64> {
        let picked: Vec<usize> = self
            .states
            .iter()
            .enumerate()
            .filter(|(_, s)| **s != CandidateState::Discarded)
            .map(|(i, _)| i)
            .collect();
        if picked.is_empty() {
            Array2::zeros((0, self.candidates.ncols()))
        } else {
            self.candidates.select(Axis(0), &picked)
        }
    }

    /// Pruned centroids, reporting progress to `sink`.
    pub fn finish<S: ProgressSink>(&self, sink: &S) -> Array2<f64> {
        sink.status("Pruning similar centroids");
        let raw = self.raw_centroids();
        let pruned = prune_similar(raw.view(), &self.metric, self.min_movement);
        debug!(before = raw.nrows(), after = pruned.nrows(), "pruned centroids");
        sink.status(format!("{} distinct colors found", pruned.nrows()));
        pruned
    }

    /// Pruned, unrounded centroids.
    pub fn exact_centroids(&self) -> Array2<f64> {
        self.finish(&NoProgress)
    }

    /// Pruned centroids rounded to the nearest integer.
    pub fn centroids(&self) -> Vec<Vec<i64>> {
        round_points(&self.exact_centroids())
    }

    /// Current candidate positions, including discarded ones.
    pub fn candidates(&self) -> &Array2<f64> {
        &self.candidates
    }

    /// Per-candidate lifecycle state.
    pub fn states(&self) -> &[CandidateState] {
        &self.states
    }

    /// Candidates still moving.
    pub fn active_count(&self) -> usize {
        self.count(CandidateState::Active)
    }

    /// Candidates that settled.
    pub fn settled_count(&self) -> usize {
        self.count(CandidateState::Settled)
    }

    /// Sphere radius.
    pub fn radius(&self) -> f64 {
        self.radius
    }

    /// Grid resolution per axis.
    pub fn spheres_per_dimension(&self) -> usize {
        self.spheres_per_dimension
    }

    /// Global steps taken so far.
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// The indexed points.
    pub fn points(&self) -> &Array2<f64> {
        self.space.points()
    }

    /// The metric candidates move under.
    pub fn metric(&self) -> &M {
        &self.metric
    }

    fn count(&self, state: CandidateState) -> usize {
        self.states.iter().filter(|s| **s == state).count()
    }
}

impl Clustering for MeanShift {
    fn fit_predict(&self, data: &[Vec<f64>]) -> Result<Vec<usize>> {
        self.validate()?;
        if data.is_empty() {
            return Ok(Vec::new());
        }
        let points = points_from_rows(data)?;
        let metric = Norm::euclidean();
        let mut engine = self.engine(points, metric)?;
        let _ = engine.run(&RunFlag::new(), &NoProgress);
        let centroids = engine.exact_centroids();
        assign_all(engine.points().view(), centroids.view(), &metric)
    }

    fn n_clusters(&self) -> usize {
        self.max_centroids
    }
}
