//! Cubic Bezier fitting for ordered 2D point sequences.
//!
//! # Algorithm (per span of points)
//! 1. Collapse consecutive duplicate points (stationary vehicles repeat them)
//! 2. Estimate unit tangents at both ends of the span
//! 3. Chord-length parameterization u ∈ [0, 1]
//! 4. Least-squares solve for the distances α₁, α₂ of the inner control
//!    points along the end tangents
//! 5. Max squared error ≤ tolerance²: accept the segment
//! 6. Max squared error ≤ 4·tolerance²: Newton-Raphson reparameterization,
//!    then repeat 4-5 up to `max_iterations` times
//! 7. Otherwise split at the point of maximum error and fit both halves
//!
//! Splitting is driven by an explicit work stack, so very long tracks cannot
//! exhaust the call stack. The fit is a pure function of its input.

use crate::types::Point2;
use nalgebra::{Matrix2, Vector2};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// Configuration for the curve fitter.
#[derive(Clone, Debug)]
pub struct FitConfig {
    /// Maximum allowed distance (m) between a sample and the fitted curve.
    pub tolerance: f64,
    /// Newton-Raphson reparameterization rounds before a span is split.
    pub max_iterations: usize,
    /// Minimum number of samples for a fit. Values below 2 are treated as 2.
    pub min_points: usize,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            tolerance: 0.5,
            max_iterations: 4,
            min_points: 2,
        }
    }
}

// ---------------------------------------------------------------------------
// Curve types
// ---------------------------------------------------------------------------

/// One cubic Bezier segment given by its four control points.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CubicBezier {
    pub p0: Point2,
    pub p1: Point2,
    pub p2: Point2,
    pub p3: Point2,
}

impl CubicBezier {
    /// Evaluate the segment at parameter `u` ∈ [0, 1].
    pub fn point_at(&self, u: f64) -> Point2 {
        let v = 1.0 - u;
        self.p0 * (v * v * v)
            + self.p1 * (3.0 * v * v * u)
            + self.p2 * (3.0 * v * u * u)
            + self.p3 * (u * u * u)
    }

    fn first_derivative(&self, u: f64) -> Point2 {
        let v = 1.0 - u;
        (self.p1 - self.p0) * (3.0 * v * v)
            + (self.p2 - self.p1) * (6.0 * v * u)
            + (self.p3 - self.p2) * (3.0 * u * u)
    }

    fn second_derivative(&self, u: f64) -> Point2 {
        let v = 1.0 - u;
        (self.p2 - self.p1 * 2.0 + self.p0) * (6.0 * v)
            + (self.p3 - self.p2 * 2.0 + self.p1) * (6.0 * u)
    }

    pub fn control_points(&self) -> [Point2; 4] {
        [self.p0, self.p1, self.p2, self.p3]
    }

    fn is_finite(&self) -> bool {
        self.control_points()
            .iter()
            .all(|p| p.x.is_finite() && p.y.is_finite())
    }
}

/// Piecewise cubic Bezier curve. Consecutive segments share their joint.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BezierPath {
    pub segments: Vec<CubicBezier>,
}

impl BezierPath {
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// First control point of the path.
    pub fn start(&self) -> Option<Point2> {
        self.segments.first().map(|s| s.p0)
    }

    /// Last control point of the path.
    pub fn end(&self) -> Option<Point2> {
        self.segments.last().map(|s| s.p3)
    }

    /// Evaluate segment `segment` at `u` ∈ [0, 1].
    pub fn point_at(&self, segment: usize, u: f64) -> Option<Point2> {
        self.segments.get(segment).map(|s| s.point_at(u))
    }

    /// Control points flattened, joints listed once: `p0, (p1, p2, p3)*`.
    pub fn control_points(&self) -> Vec<Point2> {
        let mut out = Vec::with_capacity(self.segments.len() * 3 + 1);
        if let Some(first) = self.segments.first() {
            out.push(first.p0);
        }
        for seg in &self.segments {
            out.extend_from_slice(&[seg.p1, seg.p2, seg.p3]);
        }
        out
    }

    /// Dense polyline along the path for drawing: `points_per_segment` points
    /// per segment plus the final end point.
    pub fn sample(&self, points_per_segment: usize) -> Vec<Point2> {
        let n = points_per_segment.max(1);
        let mut out = Vec::with_capacity(self.segments.len() * n + 1);
        for seg in &self.segments {
            out.extend((0..n).map(|k| seg.point_at(k as f64 / n as f64)));
        }
        if let Some(end) = self.end() {
            out.push(end);
        }
        out
    }
}

/// Fit-quality signal for a successful fit.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FitQuality {
    /// Largest sample-to-curve distance (m)
    pub max_error: f64,
    /// Root-mean-square sample-to-curve distance (m)
    pub rms_error: f64,
    /// Number of Bezier segments
    pub segments: usize,
}

/// A successful fit.
#[derive(Clone, Debug, PartialEq)]
pub struct BezierFit {
    pub path: BezierPath,
    pub quality: FitQuality,
}

/// Why a point sequence could not be fitted.
#[derive(Clone, Debug, Error, PartialEq, Eq, Serialize, Deserialize)]
pub enum FitError {
    #[error("need at least {required} points, got {actual}")]
    TooFewPoints { required: usize, actual: usize },

    #[error("all {0} points coincide")]
    Coincident(usize),

    #[error("input contains a non-finite coordinate")]
    NonFinite,

    #[error("fit became numerically unstable")]
    Unstable,
}

// ---------------------------------------------------------------------------
// Fitting
// ---------------------------------------------------------------------------

/// A contiguous run of points still to be fitted.
struct Span {
    first: usize,
    last: usize,
    t_start: Point2,
    t_end: Point2,
}

enum SpanFit {
    Accepted {
        bezier: CubicBezier,
        sum_sq: f64,
        max_sq: f64,
    },
    /// Split at this index relative to the span start.
    Split(usize),
}

/// Fit a piecewise cubic Bezier to `points`.
pub fn fit_bezier(points: &[Point2], config: &FitConfig) -> Result<BezierFit, FitError> {
    let required = config.min_points.max(2);
    if points.len() < required {
        return Err(FitError::TooFewPoints {
            required,
            actual: points.len(),
        });
    }
    if points.iter().any(|p| !p.x.is_finite() || !p.y.is_finite()) {
        return Err(FitError::NonFinite);
    }

    let pts = dedup_consecutive(points);
    if pts.len() < 2 {
        return Err(FitError::Coincident(points.len()));
    }

    let n = pts.len();
    let tol_sq = config.tolerance * config.tolerance;
    let mut segments = Vec::new();
    let mut sum_sq = 0.0;
    let mut max_sq: f64 = 0.0;

    // Left span is pushed last so segments come out in path order.
    let mut stack = vec![Span {
        first: 0,
        last: n - 1,
        t_start: unit(pts[1] - pts[0]),
        t_end: unit(pts[n - 2] - pts[n - 1]),
    }];
    while let Some(span) = stack.pop() {
        match fit_span(&pts[span.first..=span.last], &span, tol_sq, config.max_iterations) {
            SpanFit::Accepted {
                bezier,
                sum_sq: s,
                max_sq: m,
            } => {
                if !bezier.is_finite() {
                    return Err(FitError::Unstable);
                }
                segments.push(bezier);
                sum_sq += s;
                max_sq = max_sq.max(m);
            }
            SpanFit::Split(offset) => {
                let split = span.first + offset;
                let center = center_tangent(&pts, split);
                stack.push(Span {
                    first: split,
                    last: span.last,
                    t_start: -center,
                    t_end: span.t_end,
                });
                stack.push(Span {
                    first: span.first,
                    last: split,
                    t_start: span.t_start,
                    t_end: center,
                });
            }
        }
    }

    let quality = FitQuality {
        max_error: max_sq.sqrt(),
        rms_error: (sum_sq / n as f64).sqrt(),
        segments: segments.len(),
    };
    if !quality.rms_error.is_finite() {
        return Err(FitError::Unstable);
    }
    Ok(BezierFit {
        path: BezierPath { segments },
        quality,
    })
}

fn fit_span(p: &[Point2], span: &Span, tol_sq: f64, max_iterations: usize) -> SpanFit {
    let first = p[0];
    let last = p[p.len() - 1];

    if p.len() == 2 {
        let dist = (last - first).norm() / 3.0;
        return SpanFit::Accepted {
            bezier: CubicBezier {
                p0: first,
                p1: first + span.t_start * dist,
                p2: last + span.t_end * dist,
                p3: last,
            },
            sum_sq: 0.0,
            max_sq: 0.0,
        };
    }

    let mut u = chord_length_parameterize(p);
    let mut bezier = generate_bezier(p, &u, span.t_start, span.t_end);
    let (mut max_sq, mut split, mut sum_sq) = max_error(p, &bezier, &u);
    if max_sq <= tol_sq {
        return SpanFit::Accepted {
            bezier,
            sum_sq,
            max_sq,
        };
    }

    if max_sq <= tol_sq * 4.0 {
        for _ in 0..max_iterations {
            let u_prime = reparameterize(p, &u, &bezier);
            bezier = generate_bezier(p, &u_prime, span.t_start, span.t_end);
            (max_sq, split, sum_sq) = max_error(p, &bezier, &u_prime);
            if max_sq <= tol_sq {
                return SpanFit::Accepted {
                    bezier,
                    sum_sq,
                    max_sq,
                };
            }
            u = u_prime;
        }
    }

    SpanFit::Split(split)
}

/// Least-squares inner control points for fixed end points and tangents.
fn generate_bezier(p: &[Point2], u: &[f64], t_start: Point2, t_end: Point2) -> CubicBezier {
    let first = p[0];
    let last = p[p.len() - 1];

    let (mut c00, mut c01, mut c11) = (0.0, 0.0, 0.0);
    let (mut x0, mut x1) = (0.0, 0.0);
    for (pt, &ui) in p.iter().zip(u) {
        let a0 = t_start * b1(ui);
        let a1 = t_end * b2(ui);
        c00 += a0.dot(&a0);
        c01 += a0.dot(&a1);
        c11 += a1.dot(&a1);
        let tmp = pt - (first * (b0(ui) + b1(ui)) + last * (b2(ui) + b3(ui)));
        x0 += a0.dot(&tmp);
        x1 += a1.dot(&tmp);
    }

    let seg_len = (last - first).norm();
    let eps = 1e-6 * seg_len;
    let alphas = Matrix2::new(c00, c01, c01, c11)
        .lu()
        .solve(&Vector2::new(x0, x1))
        .filter(|a| a.iter().all(|v| v.is_finite()));

    // Fall back to the Wu/Barsky heuristic when the system is singular or
    // places a control point behind its end point.
    let (alpha_l, alpha_r) = match alphas {
        Some(a) if a[0] >= eps && a[1] >= eps => (a[0], a[1]),
        _ => (seg_len / 3.0, seg_len / 3.0),
    };

    CubicBezier {
        p0: first,
        p1: first + t_start * alpha_l,
        p2: last + t_end * alpha_r,
        p3: last,
    }
}

/// Returns (max squared error, index of that point, sum of squared errors).
fn max_error(p: &[Point2], bezier: &CubicBezier, u: &[f64]) -> (f64, usize, f64) {
    let mut max_sq = 0.0;
    let mut split = p.len() / 2;
    let mut sum_sq = 0.0;
    for i in 1..p.len() - 1 {
        let d = (bezier.point_at(u[i]) - p[i]).norm_squared();
        sum_sq += d;
        if d > max_sq {
            max_sq = d;
            split = i;
        }
    }
    (max_sq, split, sum_sq)
}

fn reparameterize(p: &[Point2], u: &[f64], bezier: &CubicBezier) -> Vec<f64> {
    p.iter()
        .zip(u)
        .map(|(pt, &ui)| newton_raphson_root(bezier, pt, ui))
        .collect()
}

/// One Newton step towards the parameter of the curve point closest to `pt`.
fn newton_raphson_root(bezier: &CubicBezier, pt: &Point2, u: f64) -> f64 {
    let d = bezier.point_at(u) - pt;
    let d1 = bezier.first_derivative(u);
    let d2 = bezier.second_derivative(u);
    let numerator = d.dot(&d1);
    let denominator = d1.dot(&d1) + d.dot(&d2);
    if denominator.abs() < f64::EPSILON {
        return u;
    }
    let next = u - numerator / denominator;
    if next.is_finite() {
        next.clamp(0.0, 1.0)
    } else {
        u
    }
}

fn chord_length_parameterize(p: &[Point2]) -> Vec<f64> {
    let mut u = Vec::with_capacity(p.len());
    u.push(0.0);
    for w in p.windows(2) {
        let prev = u[u.len() - 1];
        u.push(prev + (w[1] - w[0]).norm());
    }
    let total = u[u.len() - 1];
    u.iter_mut().for_each(|v| *v /= total);
    u
}

/// Tangent at an interior split point, pointing backwards along the path.
fn center_tangent(pts: &[Point2], split: usize) -> Point2 {
    let t = unit(pts[split - 1] - pts[split + 1]);
    if t.norm_squared() > 0.0 {
        t
    } else {
        // Path doubles back on itself: use the incoming direction.
        unit(pts[split - 1] - pts[split])
    }
}

fn dedup_consecutive(points: &[Point2]) -> Vec<Point2> {
    let mut out: Vec<Point2> = Vec::with_capacity(points.len());
    for p in points {
        if out.last() != Some(p) {
            out.push(*p);
        }
    }
    out
}

fn unit(v: Point2) -> Point2 {
    let n = v.norm();
    if n > f64::EPSILON {
        v / n
    } else {
        Point2::zeros()
    }
}

// Bernstein basis
fn b0(u: f64) -> f64 {
    let v = 1.0 - u;
    v * v * v
}

fn b1(u: f64) -> f64 {
    let v = 1.0 - u;
    3.0 * u * v * v
}

fn b2(u: f64) -> f64 {
    3.0 * u * u * (1.0 - u)
}

fn b3(u: f64) -> f64 {
    u * u * u
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
