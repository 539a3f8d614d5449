//! Nearest-representative queries.
//!
//! Mapping every pixel to its closest palette entry is the inner loop of both
//! engines and of the final palette mapping. Images repeat colors, so the batch
//! form memoizes results by exact point value: each distinct color costs one
//! linear scan over the candidates, every repeat costs a hash lookup.

use std::collections::HashMap;

use ndarray::{ArrayView1, ArrayView2};

use crate::error::{Error, Result};
use crate::metric::Metric;
use crate::point::{point_key, PointKey};

/// Index of the candidate closest to `point`.
///
/// Ties keep the earliest candidate. Returns `None` only when `candidates` has
/// no rows.
pub fn closest_index<M: Metric + ?Sized>(
    point: ArrayView1<'_, f64>,
    candidates: ArrayView2<'_, f64>,
    metric: &M,
) -> Option<usize> {
    let mut best = None;
    let mut best_dist = f64::INFINITY;
    for (i, candidate) in candidates.outer_iter().enumerate() {
        let dist = metric.distance(point, candidate);
        if best.is_none() || dist < best_dist {
            best = Some(i);
            best_dist = dist;
        }
    }
    best
}

/// Nearest candidate for every point.
pub fn assign_all<M: Metric + ?Sized>(
    points: ArrayView2<'_, f64>,
    candidates: ArrayView2<'_, f64>,
    metric: &M,
) -> Result<Vec<usize>> {
    assign_all_with_progress(points, candidates, metric, &mut |_| {})
}

/// [`assign_all`] with a completion callback.
///
/// `progress` receives the percentage of points processed. It is called at most
/// 100 times in total and at most once per 1% of the input, so it is safe to
/// forward every call to a UI.
pub fn assign_all_with_progress<M: Metric + ?Sized>(
    points: ArrayView2<'_, f64>,
    candidates: ArrayView2<'_, f64>,
    metric: &M,
    progress: &mut dyn FnMut(u8),
) -> Result<Vec<usize>> {
    if candidates.nrows() == 0 {
        return Err(Error::EmptyCandidateSet);
    }

    let n = points.nrows();
    let step = n.div_ceil(100).max(1);
    let mut memo: HashMap<PointKey, usize> = HashMap::new();
    let mut assignment = Vec::with_capacity(n);

    for (i, point) in points.outer_iter().enumerate() {
        let key = point_key(point);
        let index = match memo.get(&key) {
            Some(&index) => index,
            None => {
                let index =
                    closest_index(point, candidates, metric).ok_or(Error::EmptyCandidateSet)?;
                let _ = memo.insert(key, index);
                index
            }
        };
        assignment.push(index);

        if (i + 1) % step == 0 {
            progress(((i + 1) * 100 / n) as u8);
        }
    }

    Ok(assignment)
}

/// Σ distance(candidate[assignment[i]], point[i])².
///
/// A quality diagnostic; neither engine uses it to decide convergence.
///
/// # Panics
///
/// If an entry of `assignment` is not a valid row of `candidates`.
pub fn sum_squared_error<M: Metric + ?Sized>(
    points: ArrayView2<'_, f64>,
    assignment: &[usize],
    candidates: ArrayView2<'_, f64>,
    metric: &M,
) -> f64 {
    points
        .outer_iter()
        .zip(assignment)
        .map(|(point, &a)| metric.distance(candidates.row(a), point).powi(2))
        .sum()
}
