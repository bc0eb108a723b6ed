//! Linear three-anchor trilateration
//!
//! Subtracting the circle equations of anchor pairs (1,2) and (2,3) removes
//! the quadratic terms and leaves a 2x2 linear system
//!
//! ```text
//! A·x + B·y = C
//! D·x + E·y = F
//! ```
//!
//! solved by Cramer's rule. There is no least-squares refinement: with
//! noisy ranges the circles need not meet, and the result is the
//! intersection of the two radical lines.

use crate::core::{RangedAnchor, DEFAULT_COLLINEARITY_TOLERANCE};
use nalgebra::Point2;

/// Closed-form 2D solver over exactly three anchors
#[derive(Debug, Clone, Copy)]
pub struct TrilaterationSolver {
    /// Minimum |sin| of the angle between the two radical-line normals.
    /// Anything flatter is treated as collinear.
    pub collinearity_tolerance: f64,
}

impl Default for TrilaterationSolver {
    fn default() -> Self {
        Self {
            collinearity_tolerance: DEFAULT_COLLINEARITY_TOLERANCE,
        }
    }
}

impl TrilaterationSolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tolerance(collinearity_tolerance: f64) -> Self {
        Self {
            collinearity_tolerance,
        }
    }

    /// Position of the target, or `None` when the anchors are collinear,
    /// coincide, or the ranges produce a non-finite result.
    pub fn solve(&self, anchors: &[RangedAnchor; 3]) -> Option<Point2<f64>> {
        let [a1, a2, a3] = anchors;
        let (p1, p2, p3) = (a1.position, a2.position, a3.position);
        let (r1, r2, r3) = (a1.distance, a2.distance, a3.distance);

        let row1 = 2.0 * (p2 - p1);
        let row2 = 2.0 * (p3 - p2);
        let (a, b) = (row1.x, row1.y);
        let (d, e) = (row2.x, row2.y);

        let c = r1.powi(2) - r2.powi(2) - p1.coords.norm_squared() + p2.coords.norm_squared();
        let f = r2.powi(2) - r3.powi(2) - p2.coords.norm_squared() + p3.coords.norm_squared();

        let det = e * a - b * d;
        let scale = row1.norm() * row2.norm();
        if scale == 0.0 || !(det.abs() / scale > self.collinearity_tolerance) {
            return None;
        }

        let x = (c * e - f * b) / det;
        let y = (c * d - a * f) / (b * d - a * e);

        if x.is_finite() && y.is_finite() {
            Some(Point2::new(x, y))
        } else {
            None
        }
    }
}
