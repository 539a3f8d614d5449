//! Occurrence counts of distinct points.
//!
//! Images repeat colors heavily: a 4-megapixel photo often has well under a
//! million distinct colors, and flat artwork only a handful. Iterating over
//! (distinct point, count) pairs gives exactly the same weighted sums as
//! iterating over every pixel, at a fraction of the distance computations.

use std::collections::HashMap;

use ndarray::{Array2, ArrayView1, Axis};

use crate::point::{point_key, PointKey};

/// Distinct points of a collection with their multiplicities.
///
/// Distinct points are kept in first-seen order so that seeded sampling over
/// the histogram is reproducible.
#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    points: Array2<f64>,
    counts: Vec<usize>,
}

impl Histogram {
    /// Count the distinct rows of `points`.
    pub fn from_points(points: &Array2<f64>) -> Self {
        let mut slots: HashMap<PointKey, usize> = HashMap::new();
        let mut first_rows = Vec::new();
        let mut counts = Vec::new();

        for (i, row) in points.outer_iter().enumerate() {
            let slot = *slots.entry(point_key(row)).or_insert_with(|| {
                first_rows.push(i);
                counts.push(0);
                counts.len() - 1
            });
            counts[slot] += 1;
        }

        let points = if first_rows.is_empty() {
            Array2::zeros((0, points.ncols()))
        } else {
            points.select(Axis(0), &first_rows)
        };
        Self { points, counts }
    }

    /// Number of distinct points.
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    /// True when built from an empty collection.
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Distinct points, one per row.
    pub fn points(&self) -> &Array2<f64> {
        &self.points
    }

    /// Multiplicity of each distinct point.
    pub fn counts(&self) -> &[usize] {
        &self.counts
    }

    /// Size of the original collection.
    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }

    /// (distinct point, count) pairs.
    pub fn iter(&self) -> impl Iterator<Item = (ArrayView1<'_, f64>, usize)> + '_ {
        self.points.outer_iter().zip(self.counts.iter().copied())
    }
}
