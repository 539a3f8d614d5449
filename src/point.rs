//! Point collections.
//!
//! Points are stored row-major in an `Array2<f64>`: one row per point, one
//! column per channel. Input rows may use any numeric channel type
//! (`u8` pixels, `i32`, `f32`, ...); averaging always happens in `f64`.

use ndarray::{Array2, ArrayView1};
use ordered_float::OrderedFloat;
use tracing::warn;

use crate::error::{Error, Result};

/// Arity of the synthetic point substituted for an empty input (an RGB origin).
pub const SYNTHETIC_DIMENSIONS: usize = 3;

/// Hashable exact-equality key for a point.
pub type PointKey = Vec<OrderedFloat<f64>>;

/// Key for `row`; two points share a key iff every coordinate is equal.
pub fn point_key(row: ArrayView1<'_, f64>) -> PointKey {
    row.iter().copied().map(OrderedFloat).collect()
}

/// Pack rows into a point matrix.
///
/// The first row fixes the dimensionality; any row with a different length is
/// rejected with [`Error::DimensionMismatch`]. An empty input yields a `0 × 0`
/// matrix.
pub fn points_from_rows<T>(rows: &[Vec<T>]) -> Result<Array2<f64>>
where
    T: Copy + Into<f64>,
{
    let Some(first) = rows.first() else {
        return Ok(Array2::zeros((0, 0)));
    };
    let d = first.len();
    let mut points = Array2::zeros((rows.len(), d));
    for (i, (row, mut target)) in rows.iter().zip(points.rows_mut()).enumerate() {
        if row.len() != d {
            return Err(Error::DimensionMismatch {
                row: i,
                expected: d,
                found: row.len(),
            });
        }
        for (dst, &src) in target.iter_mut().zip(row) {
            *dst = src.into();
        }
    }
    Ok(points)
}

/// Replace an empty collection with a single origin point.
///
/// Keeps both engines well defined on empty images; the substitution is logged.
pub(crate) fn or_synthetic(points: Array2<f64>) -> Array2<f64> {
    if points.nrows() > 0 {
        return points;
    }
    let d = if points.ncols() == 0 {
        SYNTHETIC_DIMENSIONS
    } else {
        points.ncols()
    };
    warn!(dimensions = d, "empty point collection, substituting a single origin point");
    Array2::zeros((1, d))
}

/// Round every coordinate to the nearest integer.
pub fn round_points(points: &Array2<f64>) -> Vec<Vec<i64>> {
    points
        .rows()
        .into_iter()
        .map(|row| row.iter().map(|v| v.round() as i64).collect())
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_points_from_pixels() {
        let pixels: Vec<Vec<u8>> = vec![vec![0, 128, 255], vec![1, 2, 3]];
        let points = points_from_rows(&pixels).unwrap();
        assert_eq!(points, array![[0.0, 128.0, 255.0], [1.0, 2.0, 3.0]]);
    }

    #[test]
    fn test_dimension_mismatch_reports_row() {
        let rows = vec![vec![0.0, 0.0, 0.0], vec![1.0, 1.0, 1.0], vec![1.0, 1.0]];
        assert_eq!(
            points_from_rows(&rows).unwrap_err(),
            Error::DimensionMismatch {
                row: 2,
                expected: 3,
                found: 2
            }
        );
    }

    #[test]
    fn test_empty_input_becomes_origin() {
        let rows: Vec<Vec<u8>> = vec![];
        let points = or_synthetic(points_from_rows(&rows).unwrap());
        assert_eq!(points, array![[0.0, 0.0, 0.0]]);

        let rgba = or_synthetic(Array2::zeros((0, 4)));
        assert_eq!(rgba.dim(), (1, 4));
    }

    #[test]
    fn test_point_key_equality() {
        let a = array![1.0, -0.0, 2.5];
        let b = array![1.0, 0.0, 2.5];
        assert_eq!(point_key(a.view()), point_key(b.view()));
        assert_ne!(point_key(a.view()), point_key(array![1.0, 0.0, 2.0].view()));
    }

    #[test]
    fn test_round_points() {
        let p = array![[0.4, 0.5, 10.5], [254.6, -0.2, 3.0]];
        assert_eq!(round_points(&p), vec![vec![0, 1, 11], vec![255, 0, 3]]);
    }
}
