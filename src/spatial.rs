//! Static per-axis partition for radius queries.
//!
//! Mean-shift asks, over and over, for every point within `r` of a moving
//! center. A linear scan over millions of pixels per query is the dominant cost,
//! so the points are indexed once up front.
//!
//! # Structure
//!
//! The index splits the collection on axis 0 into `partitions` buckets of equal
//! coordinate width, then splits each bucket on axis 1, and so on until every
//! axis has been used; the nodes below the last axis are leaves holding point
//! indices.
//!
//! ```text
//!            axis 0:   [0, 64)   [64, 128)   [128, 192)   [192, 256]
//!                         │          │
//!            axis 1:   [0,64) ...  [0,64) ...
//!                         │
//!                       leaf: {3, 17, 42}
//! ```
//!
//! Nodes live in a flat arena; each branch holds a short list of
//! `(range, child)` pairs. Buckets with no points are not stored.
//!
//! # Queries Are a Pre-Filter
//!
//! [`SpatialPartition::points_in_range`] returns every point in every leaf whose
//! box intersects the query's bounding cube. That is a **superset** of the
//! sphere: recall is exact, precision is not. [`SpatialPartition::points_in_radius`]
//! sizes the box from [`Metric::axis_weight`], so a metric that shrinks or
//! ignores an axis gets a box that is wider (or unbounded) along it, then adds
//! the exact metric test.

use ndarray::{Array2, ArrayView1};

use crate::metric::Metric;

#[derive(Debug, Clone, Copy)]
struct Bucket {
    lo: f64,
    hi: f64,
    child: usize,
}

#[derive(Debug, Clone)]
enum Node {
    /// Range into `order`.
    Leaf { start: usize, end: usize },
    Branch { buckets: Vec<Bucket> },
}

/// Read-only spatial index over a fixed point collection.
#[derive(Debug, Clone)]
pub struct SpatialPartition {
    points: Array2<f64>,
    /// Point indices, grouped so that every leaf owns a contiguous run.
    order: Vec<usize>,
    nodes: Vec<Node>,
    partitions: usize,
}

impl SpatialPartition {
    /// Index `points` with `partitions` buckets per axis.
    ///
    /// Bucket widths on each axis are `(max − min) / partitions` over that
    /// axis's extent in the whole collection. `partitions` of 0 is treated as 1.
    pub fn build(points: Array2<f64>, partitions: usize) -> Self {
        let partitions = partitions.max(1);
        let bounds: Vec<(f64, f64)> = points
            .columns()
            .into_iter()
            .map(|col| {
                col.iter()
                    .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
                        (lo.min(v), hi.max(v))
                    })
            })
            .collect();

        let mut order: Vec<usize> = (0..points.nrows()).collect();
        let mut nodes = Vec::new();
        let mut builder = Builder {
            points: &points,
            bounds: &bounds,
            partitions,
            nodes: &mut nodes,
        };
        let _root = builder.node(&mut order, 0, 0);

        Self {
            points,
            order,
            nodes,
            partitions,
        }
    }

    /// Number of indexed points.
    pub fn len(&self) -> usize {
        self.points.nrows()
    }

    /// True when no points are indexed.
    pub fn is_empty(&self) -> bool {
        self.points.nrows() == 0
    }

    /// Buckets per axis.
    pub fn partitions(&self) -> usize {
        self.partitions
    }

    /// Number of non-empty leaves.
    pub fn leaf_count(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, Node::Leaf { .. }))
            .count()
    }

    /// The indexed points.
    pub fn points(&self) -> &Array2<f64> {
        &self.points
    }

    /// Indices of every point in a leaf whose box meets the cube of half-width
    /// `radius` around `center`.
    ///
    /// Every point within `radius` (under any metric bounded below by the
    /// per-axis difference, which includes all p-norms and Chebyshev) is in the
    /// result. Axes past the end of `center` are not filtered.
    pub fn points_in_range(&self, center: ArrayView1<'_, f64>, radius: f64) -> Vec<usize> {
        let half_widths = vec![radius; self.points.ncols()];
        let mut out = Vec::new();
        self.collect(0, 0, center, &half_widths, &mut out);
        out
    }

    /// Indices of the points with `metric(point, center) <= radius`.
    ///
    /// Recall is exact for any metric that honors the
    /// [`Metric::axis_weight`] contract.
    pub fn points_in_radius<M: Metric + ?Sized>(
        &self,
        center: ArrayView1<'_, f64>,
        radius: f64,
        metric: &M,
    ) -> Vec<usize> {
        let half_widths: Vec<f64> = (0..self.points.ncols())
            .map(|axis| {
                let weight = metric.axis_weight(axis);
                if weight > 0.0 && weight.is_finite() {
                    // Slack absorbs rounding inside the scaled distance.
                    radius / weight * (1.0 + 1e-9)
                } else {
                    f64::INFINITY
                }
            })
            .collect();

        let mut candidates = Vec::new();
        self.collect(0, 0, center, &half_widths, &mut candidates);
        candidates.retain(|&i| metric.distance(self.points.row(i), center) <= radius);
        candidates
    }

    fn collect(
        &self,
        node: usize,
        axis: usize,
        center: ArrayView1<'_, f64>,
        half_widths: &[f64],
        out: &mut Vec<usize>,
    ) {
        match &self.nodes[node] {
            Node::Leaf { start, end } => out.extend_from_slice(&self.order[*start..*end]),
            Node::Branch { buckets } => {
                let (lo, hi) = match (center.get(axis), half_widths.get(axis)) {
                    (Some(&c), Some(&w)) if w.is_finite() => (c - w, c + w),
                    _ => (f64::NEG_INFINITY, f64::INFINITY),
                };
                for bucket in buckets {
                    if bucket.lo <= hi && lo <= bucket.hi {
                        self.collect(bucket.child, axis + 1, center, half_widths, out);
                    }
                }
            }
        }
    }
}

struct Builder<'a> {
    points: &'a Array2<f64>,
    bounds: &'a [(f64, f64)],
    partitions: usize,
    nodes: &'a mut Vec<Node>,
}

impl Builder<'_> {
    /// Build the subtree for `order` (which starts at `offset` in the full
    /// ordering) split on `axis`, returning its node id.
    fn node(&mut self, order: &mut [usize], offset: usize, axis: usize) -> usize {
        let id = self.nodes.len();
        if axis == self.points.ncols() {
            self.nodes.push(Node::Leaf {
                start: offset,
                end: offset + order.len(),
            });
            return id;
        }
        self.nodes.push(Node::Branch {
            buckets: Vec::new(),
        });

        let points = self.points;
        order.sort_by(|&a, &b| points[[a, axis]].total_cmp(&points[[b, axis]]));

        let (min, max) = self.bounds[axis];
        let width = (max - min) / self.partitions as f64;
        let last = self.partitions - 1;
        let bucket_of = |v: f64| -> usize {
            if width > 0.0 {
                (((v - min) / width).floor().max(0.0) as usize).min(last)
            } else {
                0
            }
        };

        let mut buckets = Vec::new();
        let mut start = 0;
        for bucket in 0..self.partitions {
            let mut end = start;
            while end < order.len() && bucket_of(points[[order[end], axis]]) <= bucket {
                end += 1;
            }
            if end == start {
                continue;
            }

            let nominal_lo = min + width * bucket as f64;
            let nominal_hi = if bucket == last {
                max
            } else {
                min + width * (bucket + 1) as f64
            };
            // Widen to the members' extremes so rounding in `bucket_of` can
            // never hide a point from the range test.
            let lo = nominal_lo.min(points[[order[start], axis]]);
            let hi = nominal_hi.max(points[[order[end - 1], axis]]);

            let child = self.node(&mut order[start..end], offset + start, axis + 1);
            buckets.push(Bucket { lo, hi, child });
            start = end;
        }

        self.nodes[id] = Node::Branch { buckets };
        id
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::metric::{Chebyshev, Norm, Scaled};
    use ndarray::array;
    use proptest::prelude::*;

    fn grid_points() -> Array2<f64> {
        Array2::from_shape_fn((1000, 3), |(i, j)| match j {
            0 => (i % 10) as f64 * 25.0,
            1 => ((i / 10) % 10) as f64 * 25.0,
            _ => (i / 100) as f64 * 25.0,
        })
    }

    #[test]
    fn test_every_point_is_indexed_once() {
        let space = SpatialPartition::build(grid_points(), 4);
        let mut all = space.points_in_range(array![0.0, 0.0, 0.0].view(), 1e9);
        all.sort_unstable();
        assert_eq!(all, (0..1000).collect::<Vec<_>>());
        assert!(space.leaf_count() <= 4 * 4 * 4);
    }

    #[test]
    fn test_range_query_prunes_far_buckets() {
        let space = SpatialPartition::build(grid_points(), 4);
        let center = array![0.0, 0.0, 0.0];
        let nearby = space.points_in_range(center.view(), 10.0);
        assert!(nearby.len() < 1000);
        assert!(nearby.contains(&0));

        let exact = space.points_in_radius(center.view(), 10.0, &Norm::euclidean());
        assert_eq!(exact, vec![0]);
    }

    #[test]
    fn test_empty_buckets_are_skipped() {
        // Two tight clumps at opposite corners: only 2 of 8³ leaves are populated.
        let points = array![
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 1.0],
            [255.0, 255.0, 255.0],
            [254.0, 255.0, 254.0],
        ];
        let space = SpatialPartition::build(points, 8);
        assert_eq!(space.leaf_count(), 2);
        let hits = space.points_in_range(array![250.0, 250.0, 250.0].view(), 6.0);
        assert_eq!(hits.len(), 2);
        assert!(hits.contains(&2) && hits.contains(&3));
    }

    #[test]
    fn test_degenerate_inputs() {
        let same = Array2::from_elem((5, 3), 7.0);
        let space = SpatialPartition::build(same, 6);
        assert_eq!(space.leaf_count(), 1);
        assert_eq!(
            space
                .points_in_radius(array![7.0, 7.0, 7.0].view(), 0.0, &Chebyshev)
                .len(),
            5
        );

        let empty = SpatialPartition::build(Array2::zeros((0, 3)), 4);
        assert!(empty.is_empty());
        assert!(empty.points_in_range(array![0.0, 0.0, 0.0].view(), 100.0).is_empty());
    }

    #[test]
    fn test_ignored_axis_does_not_hide_points() {
        // Identical colors, different alpha; the metric ignores alpha.
        let points = array![[0.0, 0.0, 0.0, 0.0], [0.0, 0.0, 0.0, 255.0]];
        let space = SpatialPartition::build(points, 4);
        let metric = Scaled::new(Norm::euclidean(), vec![1.0, 1.0, 1.0, 0.0]);

        let mut hits = space.points_in_radius(array![0.0, 0.0, 0.0, 0.0].view(), 10.0, &metric);
        hits.sort_unstable();
        assert_eq!(hits, vec![0, 1]);
    }

    #[test]
    fn test_shrunken_axis_widens_the_box() {
        let points = array![[0.0, 0.0], [0.0, 60.0], [30.0, 0.0]];
        let space = SpatialPartition::build(points, 8);
        // Axis 1 counts a tenth: (0, 60) is 6 away, (30, 0) is 30 away.
        let metric = Scaled::new(Chebyshev, vec![1.0, 0.1]);

        let mut hits = space.points_in_radius(array![0.0, 0.0].view(), 10.0, &metric);
        hits.sort_unstable();
        assert_eq!(hits, vec![0, 1]);
    }

    fn cloud() -> impl Strategy<Value = (Vec<[f64; 3]>, [f64; 3], f64, usize)> {
        (
            proptest::collection::vec(
                [0u8..=255, 0u8..=255, 0u8..=255].prop_map(|c| c.map(f64::from)),
                1..300,
            ),
            [0.0f64..256.0, 0.0f64..256.0, 0.0f64..256.0],
            0.0f64..80.0,
            1usize..9,
        )
    }

    proptest! {
        #[test]
        fn range_query_has_full_recall((pts, center, radius, partitions) in cloud()) {
            let n = pts.len();
            let points = Array2::from_shape_fn((n, 3), |(i, j)| pts[i][j]);
            let space = SpatialPartition::build(points.clone(), partitions);
            let center = ndarray::Array1::from(center.to_vec());

            let superset = space.points_in_range(center.view(), radius);
            let metric = Norm::euclidean();
            let exact: Vec<usize> = (0..n)
                .filter(|&i| metric.distance(points.row(i), center.view()) <= radius)
                .collect();

            prop_assert!(superset.len() >= exact.len());
            for i in &exact {
                prop_assert!(superset.contains(i), "point {} missing from pre-filter", i);
            }

            let mut filtered = space.points_in_radius(center.view(), radius, &metric);
            filtered.sort_unstable();
            prop_assert_eq!(filtered, exact);
        }

        #[test]
        fn scaled_radius_query_has_full_recall(
            (pts, center, radius, partitions) in cloud(),
            scale in [
                prop_oneof![Just(0.0f64), 0.0f64..2.0],
                prop_oneof![Just(0.0f64), 0.0f64..2.0],
                prop_oneof![Just(0.0f64), 0.0f64..2.0],
            ],
            chebyshev in any::<bool>(),
        ) {
            let n = pts.len();
            let points = Array2::from_shape_fn((n, 3), |(i, j)| pts[i][j]);
            let space = SpatialPartition::build(points.clone(), partitions);
            let center = ndarray::Array1::from(center.to_vec());
            let metric: Box<dyn Metric> = if chebyshev {
                Box::new(Scaled::new(Chebyshev, scale.to_vec()))
            } else {
                Box::new(Scaled::new(Norm::euclidean(), scale.to_vec()))
            };

            let exact: Vec<usize> = (0..n)
                .filter(|&i| metric.distance(points.row(i), center.view()) <= radius)
                .collect();
            let mut filtered = space.points_in_radius(center.view(), radius, &metric);
            filtered.sort_unstable();
            prop_assert_eq!(filtered, exact);
        }
    }
}
