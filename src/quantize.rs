//! End-to-end palette reduction.
//!
//! [`QuantizeConfig::quantize`] runs the configured algorithm over a list of
//! pixels and maps every pixel to its nearest palette entry. The result is the
//! palette plus one index per pixel; turning that into an indexed image is
//! left to the caller's codec.
//!
//! Progress and cancellation follow [`crate::progress`]: run it on a worker
//! thread, hand it a channel and a [`RunFlag`] clone, and poll from the UI.
//!
//! ```rust
//! use hueshift::config::QuantizeConfig;
//! use hueshift::progress::{NoProgress, RunFlag};
//!
//! let pixels: Vec<Vec<u8>> = vec![vec![250, 0, 0], vec![255, 5, 0], vec![0, 0, 250]];
//! let result = QuantizeConfig::default()
//!     .with_k(2)
//!     .with_seed(1)
//!     .quantize(&pixels, &RunFlag::new(), &NoProgress)
//!     .unwrap();
//!
//! assert_eq!(result.indices.len(), 3);
//! assert_eq!(result.indices[0], result.indices[1]);
//! assert_ne!(result.indices[0], result.indices[2]);
//! ```

use ndarray::Array2;
use tracing::info;

use crate::config::{Algorithm, QuantizeConfig};
use crate::error::Result;
use crate::metric::Metric;
use crate::nearest::{assign_all_with_progress, sum_squared_error};
use crate::point::{points_from_rows, round_points};
use crate::progress::{ProgressEvent, ProgressSink, RunFlag, RunStatus};

/// Output of a quantization run.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Quantized {
    /// Palette entries, rounded to integers.
    pub palette: Vec<Vec<i64>>,
    /// Palette index of every input pixel, in input order.
    pub indices: Vec<usize>,
    /// Σ distance(pixel, assigned centroid)².
    pub sum_squared_error: f64,
    /// How the clustering loop ended.
    pub status: RunStatus,
    /// Iterations the clustering loop performed.
    pub iterations: usize,
}

impl Quantized {
    /// Number of palette entries.
    pub fn len(&self) -> usize {
        self.palette.len()
    }

    /// True when no palette entry was found.
    pub fn is_empty(&self) -> bool {
        self.palette.is_empty()
    }
}

impl QuantizeConfig {
    /// Cluster `pixels` and map each one to the resulting palette.
    ///
    /// The metric comes from [`metric`](QuantizeConfig::metric). Configuration
    /// errors are reported before any work is done.
    pub fn quantize<T, S>(&self, pixels: &[Vec<T>], flag: &RunFlag, sink: &S) -> Result<Quantized>
    where
        T: Copy + Into<f64>,
        S: ProgressSink,
    {
        let metric = self.parse_metric()?;
        self.quantize_with_metric(pixels, metric, flag, sink)
    }

    /// [`quantize`](Self::quantize) with a caller-supplied metric; the
    /// descriptor string is ignored.
    pub fn quantize_with_metric<T, M, S>(
        &self,
        pixels: &[Vec<T>],
        metric: M,
        flag: &RunFlag,
        sink: &S,
    ) -> Result<Quantized>
    where
        T: Copy + Into<f64>,
        M: Metric,
        S: ProgressSink,
    {
        match self.algorithm {
            Algorithm::Kmeans => self.kmeans().validate()?,
            Algorithm::MeanShift => self.mean_shift().validate()?,
        }
        let points = points_from_rows(pixels)?;
        info!(
            algorithm = %self.algorithm,
            pixels = points.nrows(),
            metric = ?metric,
            "quantizing"
        );

        let result = match self.algorithm {
            Algorithm::Kmeans => run_kmeans(self, points, metric, flag, sink)?,
            Algorithm::MeanShift => run_mean_shift(self, points, metric, flag, sink)?,
        };

        sink.emit(ProgressEvent::SumSquaredError(result.sum_squared_error));
        info!(
            colors = result.palette.len(),
            status = ?result.status,
            iterations = result.iterations,
            sse = result.sum_squared_error,
            "quantized"
        );
        Ok(result)
    }
}

fn run_kmeans<M: Metric, S: ProgressSink>(
    config: &QuantizeConfig,
    points: Array2<f64>,
    metric: M,
    flag: &RunFlag,
    sink: &S,
) -> Result<Quantized> {
    let n = points.nrows();
    sink.status("Choosing initial centroids");
    let mut engine = config.kmeans().engine(points, metric)?;

    sink.status("Shifting centroids");
    let summary = engine.compute_until_max_shift(config.convergence_threshold, flag, sink)?;

    let mut indices = engine.clustering()?.to_vec();
    // Drop the label of the synthetic point substituted for an empty input.
    indices.truncate(n);
    let sum_squared_error = if n == 0 {
        0.0
    } else {
        engine.sum_squared_error()?
    };

    Ok(Quantized {
        palette: engine.centroids(),
        indices,
        sum_squared_error,
        status: summary.status,
        iterations: summary.iterations,
    })
}

fn run_mean_shift<M: Metric, S: ProgressSink>(
    config: &QuantizeConfig,
    points: Array2<f64>,
    metric: M,
    flag: &RunFlag,
    sink: &S,
) -> Result<Quantized> {
    let n = points.nrows();
    sink.status("Choosing initial centroids");
    let mut engine = config.mean_shift().engine(points, metric)?;
    let summary = engine.run(flag, sink);
    let centroids = engine.finish(sink);

    // Pixels are mapped to the palette they will actually be drawn with.
    let palette = round_points(&centroids);
    let rounded = centroids.mapv(f64::round);

    let (indices, sum_squared_error) = if n == 0 {
        (Vec::new(), 0.0)
    } else {
        let points = engine.points().view();
        let indices = assign_all_with_progress(
            points,
            rounded.view(),
            engine.metric(),
            &mut |percent| sink.status(format!("Mapping pixels: {percent}%")),
        )?;
        let sse = sum_squared_error(points, &indices, rounded.view(), engine.metric());
        (indices, sse)
    };

    Ok(Quantized {
        palette,
        indices,
        sum_squared_error,
        status: summary.status,
        iterations: summary.iterations,
    })
}
