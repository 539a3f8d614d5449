//! K-means clustering.
//!
//! Partitions colors into k clusters by minimizing **within-cluster sum of
//! squares** (WCSS). The foundational clustering algorithm, dating to 1957 (Lloyd).
//!
//! # Lloyd's Algorithm
//!
//! 1. Seed k centroids (uniformly, or via k-means++)
//! 2. **Assign**: each point → nearest centroid
//! 3. **Update**: each centroid → mean of its points
//! 4. Repeat until the largest centroid movement drops below a threshold
//!
//! The engine exposes step 2–3 as [`KmeansEngine::shift_centroids`] and leaves
//! the loop to the caller, or to [`KmeansEngine::compute_until`].
//!
//! With the euclidean metric WCSS never increases between steps. Other metrics
//! still work (assignment uses the metric, the update is always the mean) but
//! lose that guarantee.
//!
//! # Empty Clusters
//!
//! A centroid that attracts no points stays where it is and reports a shift of
//! 0. It may pick up points again once its neighbors move.
//!
//! # Histogram Fast Path
//!
//! Photos repeat colors, flat artwork repeats them massively. With
//! [`Kmeans::with_histogram`] each step iterates over (distinct color, count)
//! pairs and accumulates count-weighted sums, which gives the same means as
//! visiting every pixel.
//!
//! ## K-means++ Seeding
//!
//! 1. Choose the first centroid uniformly among the distinct colors
//! 2. Choose each next centroid with probability proportional to
//!    count × D(x)², where D(x) is the distance to the nearest chosen centroid
//!
//! Provides provable O(log k) approximation to optimal WCSS.

use ndarray::{Array1, Array2, Axis};
use rand::prelude::*;
use tracing::{debug, info};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use super::traits::Clustering;
use crate::error::{Error, Result};
use crate::histogram::Histogram;
use crate::metric::{Metric, Norm};
use crate::nearest::{assign_all, closest_index, sum_squared_error};
use crate::point::{or_synthetic, points_from_rows, round_points};
use crate::progress::{NoProgress, ProgressSink, RunFlag, RunStatus, RunSummary};

/// K-means settings.
///
/// Builds [`KmeansEngine`]s and implements [`Clustering`] for one-call use.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Kmeans {
    /// Number of clusters.
    k: usize,
    /// Convergence tolerance: stop once no centroid moves farther than this.
    tol: f64,
    /// Maximum iterations per driven run.
    max_iter: Option<usize>,
    /// Random seed.
    seed: Option<u64>,
    /// Seed with k-means++ instead of uniform draws.
    plus_plus: bool,
    /// Iterate over distinct colors with counts.
    use_histogram: bool,
}

impl Kmeans {
    /// Create a new K-means clusterer.
    pub fn new(k: usize) -> Self {
        Self {
            k,
            tol: 1.0,
            max_iter: None,
            seed: None,
            plus_plus: false,
            use_histogram: false,
        }
    }

    /// Set convergence tolerance.
    pub fn with_tol(mut self, tol: f64) -> Self {
        self.tol = tol;
        self
    }

    /// Cap the iterations of a driven run.
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = Some(max_iter);
        self
    }

    /// Set random seed for reproducibility.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Use k-means++ seeding.
    pub fn with_plus_plus(mut self, plus_plus: bool) -> Self {
        self.plus_plus = plus_plus;
        self
    }

    /// Iterate over the color histogram instead of every point.
    pub fn with_histogram(mut self, use_histogram: bool) -> Self {
        self.use_histogram = use_histogram;
        self
    }

    /// Number of clusters.
    pub fn k(&self) -> usize {
        self.k
    }

    /// Convergence tolerance.
    pub fn tol(&self) -> f64 {
        self.tol
    }

    /// Check the settings without touching any data.
    pub fn validate(&self) -> Result<()> {
        if self.k == 0 {
            return Err(Error::InvalidClusterCount { requested: self.k });
        }
        if self.tol.is_nan() || self.tol < 0.0 {
            return Err(Error::InvalidParameter {
                name: "tol",
                message: "must be a non-negative number",
            });
        }
        Ok(())
    }

    /// Seed an engine over `points`.
    ///
    /// An empty collection is replaced by a single origin point.
    pub fn engine<M: Metric>(&self, points: Array2<f64>, metric: M) -> Result<KmeansEngine<M>> {
        self.validate()?;
        let data = or_synthetic(points);
        let mut rng = self.rng();

        let histogram = (self.use_histogram || self.plus_plus).then(|| Histogram::from_points(&data));
        let centroids = match &histogram {
            Some(h) if self.plus_plus => plus_plus_centroids(h, self.k, &metric, &mut rng),
            _ => uniform_centroids(&data, self.k, &mut rng),
        };

        info!(
            k = self.k,
            points = data.nrows(),
            distinct = ?histogram.as_ref().map(Histogram::len),
            plus_plus = self.plus_plus,
            "seeded k-means"
        );

        Ok(KmeansEngine::from_parts(
            data,
            histogram.filter(|_| self.use_histogram),
            centroids,
            metric,
            self.max_iter,
        ))
    }

    /// Start an engine from caller-chosen centroids instead of seeding.
    ///
    /// `k` is taken from the number of centroid rows; the configured `k` and
    /// seeding options are ignored.
    pub fn engine_with_centroids<M: Metric>(
        &self,
        points: Array2<f64>,
        centroids: Array2<f64>,
        metric: M,
    ) -> Result<KmeansEngine<M>> {
        Self {
            k: centroids.nrows(),
            ..self.clone()
        }
        .validate()?;

        let data = or_synthetic(points);
        if centroids.ncols() != data.ncols() {
            return Err(Error::DimensionMismatch {
                row: 0,
                expected: data.ncols(),
                found: centroids.ncols(),
            });
        }
        let histogram = self.use_histogram.then(|| Histogram::from_points(&data));
        Ok(KmeansEngine::from_parts(
            data,
            histogram,
            centroids,
            metric,
            self.max_iter,
        ))
    }

    fn rng(&self) -> Box<dyn RngCore> {
        match self.seed {
            Some(s) => Box::new(StdRng::seed_from_u64(s)),
            None => Box::new(rand::rng()),
        }
    }
}

impl Default for Kmeans {
    fn default() -> Self {
        Self::new(4)
    }
}

/// `k` independent uniform draws, with replacement, from `data`.
fn uniform_centroids(data: &Array2<f64>, k: usize, rng: &mut impl Rng) -> Array2<f64> {
    let n = data.nrows();
    let picks: Vec<usize> = (0..k).map(|_| rng.random_range(0..n)).collect();
    data.select(Axis(0), &picks)
}

/// k-means++ over the distinct colors, weighting each by its count.
fn plus_plus_centroids<M: Metric + ?Sized>(
    histogram: &Histogram,
    k: usize,
    metric: &M,
    rng: &mut impl Rng,
) -> Array2<f64> {
    let distinct = histogram.points();
    let m = histogram.len();

    // First centroid: random distinct color
    let first = rng.random_range(0..m);
    let mut chosen = Vec::with_capacity(k);
    chosen.push(first);

    let mut weights: Vec<f64> = histogram
        .iter()
        .map(|(p, count)| count as f64 * metric.distance(p, distinct.row(first)).powi(2))
        .collect();

    while chosen.len() < k {
        // Sample proportional to weight
        let total: f64 = weights.iter().sum();
        let next = if total > 0.0 && total.is_finite() {
            let threshold = rng.random::<f64>() * total;
            let mut cumsum = 0.0;
            let mut selected = weights.iter().rposition(|&w| w > 0.0).unwrap_or(0);
            for (j, &w) in weights.iter().enumerate() {
                cumsum += w;
                if w > 0.0 && cumsum >= threshold {
                    selected = j;
                    break;
                }
            }
            selected
        } else {
            // Every color coincides with a chosen centroid.
            rng.random_range(0..m)
        };
        chosen.push(next);

        let c = distinct.row(next);
        for (w, (p, count)) in weights.iter_mut().zip(histogram.iter()) {
            *w = w.min(count as f64 * metric.distance(p, c).powi(2));
        }
    }

    distinct.select(Axis(0), &chosen)
}

/// A running k-means computation.
///
/// Owns its points, centroids, and the lazily computed clustering and error,
/// both of which are dropped whenever the centroids move.
#[derive(Debug, Clone)]
pub struct KmeansEngine<M> {
    data: Array2<f64>,
    histogram: Option<Histogram>,
    metric: M,
    centroids: Array2<f64>,
    shift: Vec<f64>,
    clustering: Option<Vec<usize>>,
    error: Option<f64>,
    iterations: usize,
    max_iter: Option<usize>,
}

impl<M: Metric> KmeansEngine<M> {
    fn from_parts(
        data: Array2<f64>,
        histogram: Option<Histogram>,
        centroids: Array2<f64>,
        metric: M,
        max_iter: Option<usize>,
    ) -> Self {
        let k = centroids.nrows();
        Self {
            data,
            histogram,
            metric,
            centroids,
            shift: vec![f64::INFINITY; k],
            clustering: None,
            error: None,
            iterations: 0,
            max_iter,
        }
    }

    /// One assign-and-update step.
    pub fn shift_centroids(&mut self) -> Result<()> {
        let (k, d) = self.centroids.dim();
        let mut sums = Array2::<f64>::zeros((k, d));
        let mut counts = vec![0usize; k];

        match &self.histogram {
            Some(h) => {
                let labels = self.assign_distinct(h)?;
                for ((point, count), &label) in h.iter().zip(&labels) {
                    sums.row_mut(label).scaled_add(count as f64, &point);
                    counts[label] += count;
                }
            }
            None => {
                let labels = match self.clustering.take() {
                    Some(labels) => labels,
                    None => self.compute_clustering()?,
                };
                for (point, &label) in self.data.outer_iter().zip(&labels) {
                    let mut row = sums.row_mut(label);
                    row += &point;
                    counts[label] += 1;
                }
            }
        }

        let mut next = self.centroids.clone();
        for (i, &count) in counts.iter().enumerate() {
            // Nothing assigned: hold position.
            if count == 0 {
                self.shift[i] = 0.0;
                continue;
            }
            let mean: Array1<f64> = &sums.row(i) / count as f64;
            self.shift[i] = self.metric.distance(self.centroids.row(i), mean.view());
            next.row_mut(i).assign(&mean);
        }

        self.centroids = next;
        self.clustering = None;
        self.error = None;
        self.iterations += 1;
        Ok(())
    }

    /// Step until `predicate` holds, the flag is lowered, or `max_iter` runs out.
    ///
    /// The flag is checked once before every step.
    pub fn compute_until<P, S>(
        &mut self,
        mut predicate: P,
        flag: &RunFlag,
        sink: &S,
    ) -> Result<RunSummary>
    where
        P: FnMut(&Self) -> bool,
        S: ProgressSink,
    {
        let mut iterations = 0;
        let status = loop {
            if predicate(self) {
                break RunStatus::Converged;
            }
            if !flag.is_running() {
                break RunStatus::Cancelled;
            }
            if self.max_iter.is_some_and(|max| iterations >= max) {
                break RunStatus::IterationLimit;
            }

            self.shift_centroids()?;
            iterations += 1;

            let max_shift = self.max_shift();
            debug!(iteration = self.iterations, max_shift, "shifted centroids");
            sink.status(format!(
                "Iteration: {}, Shift: {:.2}",
                self.iterations, max_shift
            ));
        };

        info!(?status, iterations, max_shift = self.max_shift(), "k-means stopped");
        Ok(RunSummary {
            status,
            iterations,
            max_shift: self.max_shift(),
        })
    }

    /// Step until no centroid moved farther than `threshold`.
    pub fn compute_until_max_shift<S: ProgressSink>(
        &mut self,
        threshold: f64,
        flag: &RunFlag,
        sink: &S,
    ) -> Result<RunSummary> {
        self.compute_until(|engine| engine.max_shift() <= threshold, flag, sink)
    }

    /// Nearest-centroid index for every point, computed on first use.
    pub fn clustering(&mut self) -> Result<&[usize]> {
        if self.clustering.is_none() {
            self.clustering = Some(self.compute_clustering()?);
        }
        Ok(self.clustering.as_deref().unwrap_or_default())
    }

    /// Sum of squared point-to-centroid distances, computed on first use.
    pub fn sum_squared_error(&mut self) -> Result<f64> {
        if let Some(error) = self.error {
            return Ok(error);
        }
        let _ = self.clustering()?;
        let labels = self.clustering.as_deref().unwrap_or_default();
        let error = sum_squared_error(
            self.data.view(),
            labels,
            self.centroids.view(),
            &self.metric,
        );
        self.error = Some(error);
        Ok(error)
    }

    /// Centroids rounded to the nearest integer, ready for an 8-bit palette.
    pub fn centroids(&self) -> Vec<Vec<i64>> {
        round_points(&self.centroids)
    }

    /// Unrounded centroids.
    pub fn exact_centroids(&self) -> &Array2<f64> {
        &self.centroids
    }

    /// Movement of each centroid in the last step (`+∞` before the first).
    pub fn shift_distances(&self) -> &[f64] {
        &self.shift
    }

    /// Largest entry of [`shift_distances`](Self::shift_distances).
    pub fn max_shift(&self) -> f64 {
        self.shift.iter().copied().fold(0.0, f64::max)
    }

    /// Steps taken since seeding.
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// Number of centroids.
    pub fn k(&self) -> usize {
        self.centroids.nrows()
    }

    /// The clustered points.
    pub fn points(&self) -> &Array2<f64> {
        &self.data
    }

    /// The histogram, when the fast path is enabled.
    pub fn histogram(&self) -> Option<&Histogram> {
        self.histogram.as_ref()
    }

    fn compute_clustering(&self) -> Result<Vec<usize>> {
        assign_all(self.data.view(), self.centroids.view(), &self.metric)
    }

    fn assign_distinct(&self, histogram: &Histogram) -> Result<Vec<usize>> {
        let distinct = histogram.points();
        let centroids = self.centroids.view();

        #[cfg(feature = "parallel")]
        {
            (0..distinct.nrows())
                .into_par_iter()
                .map(|i| {
                    closest_index(distinct.row(i), centroids, &self.metric)
                        .ok_or(Error::EmptyCandidateSet)
                })
                .collect()
        }

        #[cfg(not(feature = "parallel"))]
        distinct
            .outer_iter()
            .map(|p| closest_index(p, centroids, &self.metric).ok_or(Error::EmptyCandidateSet))
            .collect()
    }
}

impl Clustering for Kmeans {
    fn fit_predict(&self, data: &[Vec<f64>]) -> Result<Vec<usize>> {
        self.validate()?;
        if data.is_empty() {
            return Ok(Vec::new());
        }
        let points = points_from_rows(data)?;
        let mut engine = self.engine(points, Norm::euclidean())?;
        let _ = engine.compute_until_max_shift(self.tol, &RunFlag::new(), &NoProgress)?;
        Ok(engine.clustering()?.to_vec())
    }

    fn n_clusters(&self) -> usize {
        self.k
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::metric::Chebyshev;
    use crate::progress::ProgressEvent;
    use approx::assert_abs_diff_eq;
    use ndarray::array;
    use proptest::prelude::*;
    use std::sync::mpsc;

    fn two_blobs() -> Array2<f64> {
        array![[0.0, 0.0, 0.0], [0.0, 0.0, 1.0], [10.0, 10.0, 10.0], [10.0, 10.0, 11.0]]
    }

    #[test]
    fn test_kmeans_basic() {
        let data = vec![
            vec![0.0, 0.0],
            vec![0.1, 0.1],
            vec![10.0, 10.0],
            vec![10.1, 10.1],
        ];

        let kmeans = Kmeans::new(2).with_seed(42).with_plus_plus(true);
        let labels = kmeans.fit_predict(&data).unwrap();

        // Points 0,1 should be in same cluster, points 2,3 in another
        assert_eq!(labels[0], labels[1]);
        assert_eq!(labels[2], labels[3]);
        assert_ne!(labels[0], labels[2]);
    }

    #[test]
    fn test_kmeans_all_points_assigned() {
        // Property: every point must be assigned to exactly one cluster
        let data: Vec<Vec<f64>> = (0..50)
            .map(|i| vec![i as f64 * 0.1, (i % 5) as f64])
            .collect();

        let kmeans = Kmeans::new(5).with_seed(123);
        let labels = kmeans.fit_predict(&data).unwrap();

        assert_eq!(labels.len(), data.len());
        for &label in &labels {
            assert!(label < 5, "label {} out of range", label);
        }
    }

    #[test]
    fn test_kmeans_k_equals_distinct_with_plus_plus() {
        // k-means++ never re-picks a color while others have positive weight.
        let data = vec![vec![0.0, 0.0], vec![1.0, 0.0], vec![0.0, 1.0]];

        let kmeans = Kmeans::new(3).with_seed(42).with_plus_plus(true);
        let labels = kmeans.fit_predict(&data).unwrap();

        let unique: std::collections::HashSet<_> = labels.iter().collect();
        assert_eq!(unique.len(), 3);
    }

    #[test]
    fn test_kmeans_deterministic_with_seed() {
        let data: Vec<Vec<f64>> = (0..40)
            .map(|i| vec![(i * 37 % 256) as f64, (i * 91 % 256) as f64, (i * 13 % 256) as f64])
            .collect();

        for plus_plus in [false, true] {
            let kmeans = Kmeans::new(4).with_seed(7).with_plus_plus(plus_plus);
            let labels1 = kmeans.fit_predict(&data).unwrap();
            let labels2 = kmeans.fit_predict(&data).unwrap();
            assert_eq!(labels1, labels2, "same seed should give same result");
        }
    }

    #[test]
    fn test_kmeans_invalid_config() {
        let data = vec![vec![0.0, 0.0], vec![1.0, 1.0]];
        assert_eq!(
            Kmeans::new(0).fit_predict(&data).unwrap_err(),
            Error::InvalidClusterCount { requested: 0 }
        );
        assert!(Kmeans::new(2).with_tol(-1.0).fit_predict(&data).is_err());
        assert!(Kmeans::new(2).with_tol(f64::NAN).validate().is_err());

        let ragged = vec![vec![0.0, 0.0], vec![1.0]];
        assert!(matches!(
            Kmeans::new(1).fit_predict(&ragged).unwrap_err(),
            Error::DimensionMismatch { row: 1, .. }
        ));
    }

    #[test]
    fn test_k_larger_than_n_duplicates_centroids() {
        let engine = Kmeans::new(5)
            .with_seed(1)
            .engine(array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]], Norm::euclidean())
            .unwrap();
        assert_eq!(engine.k(), 5);
    }

    #[test]
    fn test_empty_input_uses_origin() {
        let mut engine = Kmeans::new(2)
            .with_seed(3)
            .engine(Array2::zeros((0, 3)), Norm::euclidean())
            .unwrap();
        assert_eq!(engine.points(), &array![[0.0, 0.0, 0.0]]);
        let summary = engine
            .compute_until_max_shift(0.0, &RunFlag::new(), &NoProgress)
            .unwrap();
        assert_eq!(summary.status, RunStatus::Converged);
        assert_eq!(engine.centroids(), vec![vec![0, 0, 0], vec![0, 0, 0]]);

        assert!(Kmeans::new(2).fit_predict(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_uniform_seeding_stays_in_bounds() {
        // Every seeded centroid must be an input point, for every seed.
        let data = array![[1.0, 1.0, 1.0], [2.0, 2.0, 2.0], [3.0, 3.0, 3.0]];
        for seed in 0..200 {
            let engine = Kmeans::new(4)
                .with_seed(seed)
                .engine(data.clone(), Norm::euclidean())
                .unwrap();
            for row in engine.exact_centroids().outer_iter() {
                assert!(data.outer_iter().any(|p| p == row));
            }
        }
    }

    #[test]
    fn test_plus_plus_weights_colors_by_count() {
        // Two colors equally far from the origin; one covers fifty pixels.
        let origin = [0.0, 0.0, 0.0];
        let crowd = [100.0, 0.0, 0.0];
        let lone = [0.0, 100.0, 0.0];
        let mut rows = vec![origin, lone];
        rows.extend(std::iter::repeat(crowd).take(50));
        let data = Array2::from_shape_fn((rows.len(), 3), |(i, j)| rows[i][j]);

        let (mut crowd_second, mut lone_second) = (0, 0);
        for seed in 0..400 {
            let engine = Kmeans::new(2)
                .with_seed(seed)
                .with_plus_plus(true)
                .engine(data.clone(), Norm::euclidean())
                .unwrap();
            let centroids = engine.exact_centroids();
            if centroids.row(0).to_vec() != origin {
                continue;
            }
            if centroids.row(1).to_vec() == crowd {
                crowd_second += 1;
            } else if centroids.row(1).to_vec() == lone {
                lone_second += 1;
            }
        }

        assert!(crowd_second > 50, "crowd picked {crowd_second} times");
        assert!(
            crowd_second > 10 * lone_second,
            "crowd {crowd_second} vs lone {lone_second}"
        );
    }

    #[test]
    fn test_two_blob_convergence() {
        let seeds = array![[0.0, 0.0, 0.0], [10.0, 10.0, 10.0]];
        let mut engine = Kmeans::new(2)
            .engine_with_centroids(two_blobs(), seeds, Norm::euclidean())
            .unwrap();

        let summary = engine
            .compute_until_max_shift(0.0, &RunFlag::new(), &NoProgress)
            .unwrap();

        assert_eq!(summary.status, RunStatus::Converged);
        assert_eq!(summary.iterations, 2);
        assert_eq!(
            engine.exact_centroids(),
            &array![[0.0, 0.0, 0.5], [10.0, 10.0, 10.5]]
        );
        assert_eq!(engine.clustering().unwrap(), &[0, 0, 1, 1]);
        assert_abs_diff_eq!(engine.sum_squared_error().unwrap(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_single_point_does_not_move() {
        let mut engine = Kmeans::new(1)
            .with_seed(99)
            .engine(array![[5.0, 5.0, 5.0]], Norm::euclidean())
            .unwrap();
        assert_eq!(engine.centroids(), vec![vec![5, 5, 5]]);

        let summary = engine
            .compute_until_max_shift(0.0, &RunFlag::new(), &NoProgress)
            .unwrap();

        // The first measured shift is already zero.
        assert_eq!(summary.iterations, 1);
        assert_eq!(engine.shift_distances(), &[0.0]);
        assert_eq!(engine.centroids(), vec![vec![5, 5, 5]]);
    }

    #[test]
    fn test_empty_cluster_holds_position() {
        let points = array![[0.0, 0.0, 0.0], [1.0, 1.0, 1.0], [2.0, 2.0, 2.0]];
        let seeds = array![[1.0, 1.0, 1.0], [1000.0, 1000.0, 1000.0]];
        let mut engine = Kmeans::new(2)
            .engine_with_centroids(points, seeds, Chebyshev)
            .unwrap();

        engine.shift_centroids().unwrap();

        assert_eq!(engine.exact_centroids().row(1), array![1000.0, 1000.0, 1000.0]);
        assert_eq!(engine.shift_distances()[1], 0.0);
        assert_eq!(engine.shift_distances()[0], 0.0);
    }

    #[test]
    fn test_histogram_matches_plain_iteration() {
        // Three well-separated blobs of heavily repeated colors.
        let bases = [[0.0, 0.0, 0.0], [100.0, 100.0, 100.0], [200.0, 0.0, 200.0]];
        let points =
            Array2::from_shape_fn((600, 3), |(i, j)| bases[i % 3][j] + ((i / 3) % 5) as f64);
        let seeds = array![[10.0, 0.0, 0.0], [90.0, 100.0, 100.0], [200.0, 10.0, 190.0]];

        let mut plain = Kmeans::new(3)
            .engine_with_centroids(points.clone(), seeds.clone(), Norm::euclidean())
            .unwrap();
        let mut fast = Kmeans::new(3)
            .with_histogram(true)
            .engine_with_centroids(points, seeds, Norm::euclidean())
            .unwrap();
        assert!(fast.histogram().unwrap().len() < 600);

        for _ in 0..6 {
            plain.shift_centroids().unwrap();
            fast.shift_centroids().unwrap();
            for (a, b) in plain
                .exact_centroids()
                .iter()
                .zip(fast.exact_centroids().iter())
            {
                assert_abs_diff_eq!(a, b, epsilon = 1e-9);
            }
        }
        assert_eq!(plain.clustering().unwrap(), fast.clustering().unwrap());
    }

    #[test]
    fn test_cancelled_before_first_step() {
        let mut engine = Kmeans::new(2)
            .with_seed(5)
            .engine(two_blobs(), Norm::euclidean())
            .unwrap();
        let before = engine.exact_centroids().clone();

        let flag = RunFlag::new();
        flag.halt();
        let summary = engine
            .compute_until_max_shift(0.0, &flag, &NoProgress)
            .unwrap();

        assert_eq!(summary.status, RunStatus::Cancelled);
        assert_eq!(summary.iterations, 0);
        assert_eq!(engine.exact_centroids(), &before);
        assert_eq!(engine.clustering().unwrap().len(), 4);
    }

    #[test]
    fn test_iteration_limit_and_progress() {
        let points = Array2::from_shape_fn((200, 3), |(i, j)| ((i * 31 + j * 7) % 256) as f64);
        let mut engine = Kmeans::new(8)
            .with_seed(11)
            .with_max_iter(3)
            .engine(points, Norm::euclidean())
            .unwrap();
        let (tx, rx) = mpsc::channel::<ProgressEvent>();

        // A negative threshold can never be met.
        let summary = engine
            .compute_until_max_shift(-1.0, &RunFlag::new(), &tx)
            .unwrap();

        assert_eq!(summary.status, RunStatus::IterationLimit);
        assert_eq!(summary.iterations, 3);
        let messages: Vec<_> = rx.try_iter().collect();
        assert_eq!(messages.len(), 3);
        assert!(matches!(&messages[0], ProgressEvent::Status(s) if s.starts_with("Iteration: 1")));
    }

    #[test]
    fn test_caches_invalidate_on_shift() {
        let seeds = array![[0.0, 0.0, 5.0], [10.0, 10.0, 5.0]];
        let mut engine = Kmeans::new(2)
            .engine_with_centroids(two_blobs(), seeds, Norm::euclidean())
            .unwrap();
        let before = engine.sum_squared_error().unwrap();
        engine.shift_centroids().unwrap();
        let after = engine.sum_squared_error().unwrap();
        assert!(after < before);
    }

    fn small_image() -> impl Strategy<Value = (Vec<[u8; 3]>, usize, u64)> {
        (
            proptest::collection::vec([0u8..50, 0u8..50, 0u8..50], 5..80),
            1usize..6,
            any::<u64>(),
        )
    }

    proptest! {
        #[test]
        fn sse_never_increases((pixels, k, seed) in small_image(), plus_plus in any::<bool>()) {
            let points = Array2::from_shape_fn((pixels.len(), 3), |(i, j)| f64::from(pixels[i][j]));
            let mut engine = Kmeans::new(k)
                .with_seed(seed)
                .with_plus_plus(plus_plus)
                .engine(points, Norm::euclidean())
                .unwrap();

            let mut previous = engine.sum_squared_error().unwrap();
            for _ in 0..8 {
                engine.shift_centroids().unwrap();
                let sse = engine.sum_squared_error().unwrap();
                prop_assert!(sse <= previous + 1e-9 * previous.max(1.0), "{} > {}", sse, previous);
                previous = sse;
            }
        }
    }
}
