//! Distance metrics between color points.
//!
//! Every metric compares two coordinate vectors over their **shared prefix**:
//! when one vector is longer, its extra dimensions are ignored. This lets an
//! RGB palette be compared against RGBA pixels without reshaping either side.
//!
//! # Provided Metrics
//!
//! | Metric | Formula | Registry name |
//! |--------|---------|---------------|
//! | [`Norm`] | (Σ\|xᵢ − yᵢ\|ᵖ)^(1/p) | `norm(p)`, `euclidean`, `manhattan` |
//! | [`Chebyshev`] | max \|xᵢ − yᵢ\| | `chebyshev` |
//! | [`Scaled`] | inner(s ⊙ x, s ⊙ y) | `scaled(inner, (s0, s1, ...))` |
//!
//! For `p ≥ 1` the p-norm family is a true metric (triangle inequality holds).
//! `p < 1` is accepted by [`Norm::new`] but rejected by the registry, since the
//! mean-shift radius filter and k-means++ weighting both assume a metric.
//!
//! # Selecting a Metric by Name
//!
//! User-facing text goes through a closed [`MetricRegistry`]: only registered
//! names resolve, and arguments are parsed as plain numbers, numeric tuples, or
//! nested metric descriptors.
//!
//! ```rust
//! use hueshift::metric::{parse_metric, Metric};
//!
//! let m = parse_metric("scaled(euclidean, (1, 1, 1, 0))").unwrap();
//! // The alpha channel is scaled away.
//! assert_eq!(m.distance_slices(&[0.0, 0.0, 0.0, 0.0], &[0.0, 3.0, 4.0, 255.0]), 5.0);
//! ```

use std::collections::BTreeMap;
use std::fmt;

use ndarray::{Array1, ArrayView1};
use thiserror::Error;

/// A distance function over color points.
pub trait Metric: fmt::Debug + Send + Sync {
    /// Distance between `x` and `y` over their shared dimensions.
    fn distance(&self, x: ArrayView1<'_, f64>, y: ArrayView1<'_, f64>) -> f64;

    /// [`Metric::distance`] for plain slices.
    fn distance_slices(&self, x: &[f64], y: &[f64]) -> f64 {
        self.distance(ArrayView1::from(x), ArrayView1::from(y))
    }

    /// Lower bound on how much a difference along `axis` contributes.
    ///
    /// Implementations must guarantee
    /// `distance(x, y) >= axis_weight(axis) * |x[axis] - y[axis]|`.
    /// Spatial queries widen their box along `axis` to `radius / weight`, and
    /// drop the bound entirely for a weight of 0. Every p-norm and
    /// [`Chebyshev`] satisfy the default of 1.
    fn axis_weight(&self, axis: usize) -> f64 {
        let _ = axis;
        1.0
    }
}

impl<M: Metric + ?Sized> Metric for Box<M> {
    fn distance(&self, x: ArrayView1<'_, f64>, y: ArrayView1<'_, f64>) -> f64 {
        (**self).distance(x, y)
    }

    fn axis_weight(&self, axis: usize) -> f64 {
        (**self).axis_weight(axis)
    }
}

impl<M: Metric + ?Sized> Metric for &M {
    fn distance(&self, x: ArrayView1<'_, f64>, y: ArrayView1<'_, f64>) -> f64 {
        (**self).distance(x, y)
    }

    fn axis_weight(&self, axis: usize) -> f64 {
        (**self).axis_weight(axis)
    }
}

/// p-norm distance.
///
/// `p` must be at least 1 for the triangle inequality to hold; this is a
/// contract on the caller and is not checked here.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Norm {
    p: f64,
}

impl Norm {
    /// Create a p-norm metric.
    pub fn new(p: f64) -> Self {
        Self { p }
    }

    /// Straight-line distance (p = 2).
    pub fn euclidean() -> Self {
        Self::new(2.0)
    }

    /// Taxicab distance (p = 1).
    pub fn manhattan() -> Self {
        Self::new(1.0)
    }

    /// The norm exponent.
    pub fn p(&self) -> f64 {
        self.p
    }
}

impl Default for Norm {
    fn default() -> Self {
        Self::euclidean()
    }
}

impl Metric for Norm {
    fn distance(&self, x: ArrayView1<'_, f64>, y: ArrayView1<'_, f64>) -> f64 {
        let diffs = x.iter().zip(y.iter()).map(|(a, b)| (a - b).abs());
        if self.p == 1.0 {
            diffs.sum()
        } else if self.p == 2.0 {
            diffs.map(|d| d * d).sum::<f64>().sqrt()
        } else {
            diffs.map(|d| d.powf(self.p)).sum::<f64>().powf(1.0 / self.p)
        }
    }
}

/// Chessboard distance: the largest per-coordinate difference.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Chebyshev;

impl Metric for Chebyshev {
    fn distance(&self, x: ArrayView1<'_, f64>, y: ArrayView1<'_, f64>) -> f64 {
        x.iter()
            .zip(y.iter())
            .map(|(a, b)| (a - b).abs())
            .fold(0.0, f64::max)
    }
}

/// Component-wise scaling in front of another metric.
///
/// Both inputs are multiplied by `scale` before `inner` sees them. Coordinates
/// past the end of `scale` get a factor of zero, which drops that dimension.
///
/// [`Metric::axis_weight`] reports `|scale[axis]|` times the inner weight, so
/// radius queries stretch along shrunken axes and ignore dropped ones.
#[derive(Debug, Clone, PartialEq)]
pub struct Scaled<M> {
    inner: M,
    scale: Vec<f64>,
}

impl<M: Metric> Scaled<M> {
    /// Wrap `inner` with the given per-dimension scale.
    pub fn new(inner: M, scale: Vec<f64>) -> Self {
        Self { inner, scale }
    }

    /// Per-dimension scale factors.
    pub fn scale(&self) -> &[f64] {
        &self.scale
    }

    fn apply(&self, v: ArrayView1<'_, f64>) -> Array1<f64> {
        v.iter()
            .enumerate()
            .map(|(i, &c)| c * self.scale.get(i).copied().unwrap_or(0.0))
            .collect()
    }
}

impl<M: Metric> Metric for Scaled<M> {
    fn distance(&self, x: ArrayView1<'_, f64>, y: ArrayView1<'_, f64>) -> f64 {
        let x = self.apply(x);
        let y = self.apply(y);
        self.inner.distance(x.view(), y.view())
    }

    fn axis_weight(&self, axis: usize) -> f64 {
        let factor = self.scale.get(axis).map_or(0.0, |s| s.abs());
        factor * self.inner.axis_weight(axis)
    }
}

/// Failure to resolve a textual metric descriptor.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MetricParseError {
    /// The name is not in the registry.
    #[error("unknown metric '{0}'")]
    UnknownMetric(String),

    /// The descriptor is not well formed.
    #[error("malformed metric descriptor at offset {offset}: {message}")]
    Syntax {
        /// Byte offset into the descriptor.
        offset: usize,
        /// What was expected.
        message: &'static str,
    },

    /// A known metric received arguments it cannot use.
    #[error("invalid arguments for metric '{name}': {message}")]
    InvalidArguments {
        /// Metric name.
        name: String,
        /// What was wrong.
        message: &'static str,
    },
}

/// A parsed argument handed to a registry constructor.
#[derive(Debug)]
pub enum MetricArg {
    /// A single number, e.g. the `3` in `norm(3)`.
    Number(f64),
    /// A numeric tuple, e.g. `(1, 1, 1, 0)`.
    Vector(Vec<f64>),
    /// A nested metric descriptor.
    Metric(Box<dyn Metric>),
}

/// Builds a metric from parsed arguments, or explains why it cannot.
pub type MetricConstructor = fn(Vec<MetricArg>) -> Result<Box<dyn Metric>, &'static str>;

/// Closed mapping from metric names to constructors.
///
/// Lookups are case-insensitive. Anything not registered is rejected.
#[derive(Debug, Clone)]
pub struct MetricRegistry {
    entries: BTreeMap<String, MetricConstructor>,
}

impl MetricRegistry {
    /// A registry with no entries.
    pub fn empty() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Register (or replace) a named constructor.
    pub fn register(&mut self, name: &str, constructor: MetricConstructor) -> &mut Self {
        let _ = self.entries.insert(name.to_ascii_lowercase(), constructor);
        self
    }

    /// Registered names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Resolve a descriptor such as `norm(3)` or `scaled(chebyshev, (1, 2, 1))`.
    pub fn parse(&self, descriptor: &str) -> Result<Box<dyn Metric>, MetricParseError> {
        let mut parser = Parser {
            src: descriptor,
            pos: 0,
            depth: 0,
            registry: self,
        };
        let metric = parser.metric()?;
        parser.skip_ws();
        if parser.pos != descriptor.len() {
            return Err(parser.syntax("unexpected trailing input"));
        }
        Ok(metric)
    }

    fn construct(
        &self,
        name: &str,
        args: Vec<MetricArg>,
    ) -> Result<Box<dyn Metric>, MetricParseError> {
        let key = name.to_ascii_lowercase();
        let constructor = self
            .entries
            .get(&key)
            .ok_or_else(|| MetricParseError::UnknownMetric(name.to_string()))?;
        constructor(args).map_err(|message| MetricParseError::InvalidArguments {
            name: key,
            message,
        })
    }
}

impl Default for MetricRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry
            .register("euclidean", build_euclidean)
            .register("manhattan", build_manhattan)
            .register("chebyshev", build_chebyshev)
            .register("norm", build_norm)
            .register("scaled", build_scaled);
        registry
    }
}

fn no_args(args: &[MetricArg]) -> Result<(), &'static str> {
    if args.is_empty() {
        Ok(())
    } else {
        Err("takes no arguments")
    }
}

fn build_euclidean(args: Vec<MetricArg>) -> Result<Box<dyn Metric>, &'static str> {
    no_args(&args)?;
    Ok(Box::new(Norm::euclidean()))
}

fn build_manhattan(args: Vec<MetricArg>) -> Result<Box<dyn Metric>, &'static str> {
    no_args(&args)?;
    Ok(Box::new(Norm::manhattan()))
}

fn build_chebyshev(args: Vec<MetricArg>) -> Result<Box<dyn Metric>, &'static str> {
    no_args(&args)?;
    Ok(Box::new(Chebyshev))
}

fn build_norm(args: Vec<MetricArg>) -> Result<Box<dyn Metric>, &'static str> {
    match args.as_slice() {
        [MetricArg::Number(p)] if *p >= 1.0 => Ok(Box::new(Norm::new(*p))),
        [MetricArg::Number(_)] => Err("p must be at least 1"),
        _ => Err("expected a single number"),
    }
}

fn build_scaled(args: Vec<MetricArg>) -> Result<Box<dyn Metric>, &'static str> {
    let mut args = args.into_iter();
    match (args.next(), args.next(), args.next()) {
        (Some(MetricArg::Metric(inner)), Some(MetricArg::Vector(scale)), None) => {
            Ok(Box::new(Scaled::new(inner, scale)))
        }
        _ => Err("expected a metric and a scale tuple"),
    }
}

/// Resolve a descriptor against the built-in registry.
pub fn parse_metric(descriptor: &str) -> Result<Box<dyn Metric>, MetricParseError> {
    MetricRegistry::default().parse(descriptor)
}

/// Deepest accepted nesting of metric descriptors.
const MAX_NESTING: usize = 32;

struct Parser<'a> {
    src: &'a str,
    pos: usize,
    /// Metric descriptors currently open.
    depth: usize,
    registry: &'a MetricRegistry,
}

impl<'a> Parser<'a> {
    fn syntax(&self, message: &'static str) -> MetricParseError {
        MetricParseError::Syntax {
            offset: self.pos,
            message,
        }
    }

    fn skip_ws(&mut self) {
        let rest = &self.src[self.pos..];
        self.pos += rest.len() - rest.trim_start().len();
    }

    fn peek(&mut self) -> Option<char> {
        self.skip_ws();
        self.src[self.pos..].chars().next()
    }

    fn eat(&mut self, c: char) -> bool {
        if self.peek() == Some(c) {
            self.pos += c.len_utf8();
            true
        } else {
            false
        }
    }

    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> &'a str {
        let src: &'a str = self.src;
        let rest = &src[self.pos..];
        let len = rest.find(|c: char| !pred(c)).unwrap_or(rest.len());
        self.pos += len;
        &rest[..len]
    }

    fn metric(&mut self) -> Result<Box<dyn Metric>, MetricParseError> {
        if self.depth >= MAX_NESTING {
            return Err(self.syntax("metric nesting too deep"));
        }
        self.depth += 1;
        let metric = self.named_metric();
        self.depth -= 1;
        metric
    }

    fn named_metric(&mut self) -> Result<Box<dyn Metric>, MetricParseError> {
        match self.peek() {
            Some(c) if c.is_ascii_alphabetic() => {}
            _ => return Err(self.syntax("expected a metric name")),
        }
        let name = self.take_while(|c| c.is_ascii_alphanumeric() || c == '_');
        let mut args = Vec::new();
        if self.eat('(') {
            if !self.eat(')') {
                loop {
                    args.push(self.arg()?);
                    if !self.eat(',') {
                        break;
                    }
                }
                if !self.eat(')') {
                    return Err(self.syntax("expected ')'"));
                }
            }
        }
        self.registry.construct(name, args)
    }

    fn arg(&mut self) -> Result<MetricArg, MetricParseError> {
        match self.peek() {
            Some('(') => self.vector().map(MetricArg::Vector),
            Some(c) if c.is_ascii_alphabetic() => self.metric().map(MetricArg::Metric),
            Some(_) => self.number().map(MetricArg::Number),
            None => Err(self.syntax("unexpected end of input")),
        }
    }

    fn vector(&mut self) -> Result<Vec<f64>, MetricParseError> {
        if !self.eat('(') {
            return Err(self.syntax("expected '('"));
        }
        let mut values = vec![self.number()?];
        while self.eat(',') {
            // tolerate a trailing comma, as in `(1,)`
            if self.peek() == Some(')') {
                break;
            }
            values.push(self.number()?);
        }
        if !self.eat(')') {
            return Err(self.syntax("expected ')'"));
        }
        Ok(values)
    }

    fn number(&mut self) -> Result<f64, MetricParseError> {
        self.skip_ws();
        let start = self.pos;
        let text = self.take_while(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | '+' | 'e' | 'E'));
        match text.parse::<f64>() {
            Ok(v) if v.is_finite() => Ok(v),
            _ => {
                self.pos = start;
                Err(self.syntax("expected a finite number"))
            }
        }
    }
}
