//! Catmull-Rom spline over 2D control points with auto-calculated tangents.
//!
//! Evaluation matches the classic hermite formulation: a global parameter
//! `t` in [0, 1] spans the whole point set, tangents are the centered
//! differences `0.5 * (p[i+1] - p[i-1])` (one-sided at the ends). Torque
//! curves and inertia response curves are both stored in this form.

use glam::Vec2;
use crate::Scalar;

#[derive(Clone, Debug, Default)]
pub struct Spline {
    points: Vec<Vec2>,
    tangents: Vec<Vec2>,
}

impl Spline {
    pub fn new() -> Self { Self::default() }

    pub fn from_points(points: &[(Scalar, Scalar)]) -> Self {
        let mut s = Self::new();
        for &(x, y) in points { s.add_point(Vec2::new(x, y)); }
        s
    }

    pub fn add_point(&mut self, p: Vec2) {
        self.points.push(p);
        self.recalc_tangents();
    }

    pub fn clear(&mut self) {
        self.points.clear();
        self.tangents.clear();
    }

    #[inline] pub fn len(&self) -> usize { self.points.len() }
    #[inline] pub fn is_empty(&self) -> bool { self.points.is_empty() }
    #[inline] pub fn point(&self, i: usize) -> Vec2 { self.points[i] }
    #[inline] pub fn points(&self) -> &[Vec2] { &self.points }

    fn recalc_tangents(&mut self) {
        let n = self.points.len();
        self.tangents.clear();
        self.tangents.resize(n, Vec2::ZERO);
        if n < 2 {
            return;
        }
        for i in 0..n {
            self.tangents[i] = if i == 0 {
                0.5 * (self.points[1] - self.points[0])
            } else if i == n - 1 {
                0.5 * (self.points[n - 1] - self.points[n - 2])
            } else {
                0.5 * (self.points[i + 1] - self.points[i - 1])
            };
        }
    }

    /// Evaluate at a global parameter `t` in [0, 1] spanning all points.
    pub fn interpolate(&self, t: Scalar) -> Vec2 {
        match self.points.len() {
            0 => Vec2::ZERO,
            1 => self.points[0],
            n => {
                let t = t.clamp(0.0, 1.0);
                let seg = t * (n - 1) as Scalar;
                let i = (seg as usize).min(n - 2);
                self.interpolate_segment(i, seg - i as Scalar)
            }
        }
    }

    /// Evaluate within segment `i` at local parameter `t` in [0, 1].
    pub fn interpolate_segment(&self, i: usize, t: Scalar) -> Vec2 {
        if t <= 0.0 {
            return self.points[i];
        }
        if t >= 1.0 {
            return self.points[i + 1];
        }
        let t2 = t * t;
        let t3 = t2 * t;
        let h1 = 2.0 * t3 - 3.0 * t2 + 1.0;
        let h2 = -2.0 * t3 + 3.0 * t2;
        let h3 = t3 - 2.0 * t2 + t;
        let h4 = t3 - t2;
        h1 * self.points[i] + h2 * self.points[i + 1] + h3 * self.tangents[i] + h4 * self.tangents[i + 1]
    }
}
