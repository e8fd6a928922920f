//! Small geometric helpers shared across the crate: axis-aligned bounds,
//! piecewise-linear curves and scalar interpolation utilities.

use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Axis-aligned bounding box.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    /// An empty box ready to grow around points.
    pub const EMPTY: Aabb = Aabb {
        min: Vec3::splat(f32::INFINITY),
        max: Vec3::splat(f32::NEG_INFINITY),
    };

    /// Builds the tightest box around `points`.
    ///
    /// Returns [`Aabb::EMPTY`] when `points` is empty.
    pub fn from_points(points: &[Vec3]) -> Self {
        let mut bounds = Self::EMPTY;
        for p in points {
            bounds.grow(*p);
        }
        bounds
    }

    /// Expands the box to contain `p`.
    pub fn grow(&mut self, p: Vec3) {
        self.min = self.min.min(p);
        self.max = self.max.max(p);
    }

    /// Expands the box outwards by `amount` on every axis.
    pub fn inflate(&mut self, amount: f32) {
        self.min -= Vec3::splat(amount);
        self.max += Vec3::splat(amount);
    }

    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// `true` if no point was ever added.
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x
    }

    /// Area of the box projected on the YZ plane.
    pub fn area_yz(&self) -> f32 {
        (self.max.y - self.min.y).abs() * (self.max.z - self.min.z).abs()
    }
}

impl Default for Aabb {
    fn default() -> Self {
        Aabb {
            min: Vec3::ZERO,
            max: Vec3::ZERO,
        }
    }
}

/// Inverse linear interpolation clamped to `0..=1`.
///
/// Returns where `v` sits between `a` and `b`; `0.0` when the range is
/// degenerate.
pub fn inverse_lerp(a: f32, b: f32, v: f32) -> f32 {
    if (b - a).abs() <= f32::EPSILON {
        0.0
    } else {
        ((v - a) / (b - a)).clamp(0.0, 1.0)
    }
}

pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// A piecewise-linear curve over `0..=1`, evaluated by interpolating
/// between sorted `(t, value)` keys.
///
/// Stands in for the authoring-tool curves that shape girth and length
/// falloff along a branch.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Curve {
    keys: Vec<(f32, f32)>,
}

impl Curve {
    /// Builds a curve from `(t, value)` keys; keys are sorted by `t`.
    pub fn new(mut keys: Vec<(f32, f32)>) -> Self {
        keys.sort_by(|a, b| a.0.total_cmp(&b.0));
        Self { keys }
    }

    /// A curve that always evaluates to `value`.
    pub fn constant(value: f32) -> Self {
        Self {
            keys: vec![(0.0, value)],
        }
    }

    /// A straight line from `(0, start)` to `(1, end)`.
    pub fn linear(start: f32, end: f32) -> Self {
        Self {
            keys: vec![(0.0, start), (1.0, end)],
        }
    }

    /// Evaluates the curve at `t`, clamping outside the key range.
    pub fn eval(&self, t: f32) -> f32 {
        match self.keys.len() {
            0 => 0.0,
            1 => self.keys[0].1,
            _ => {
                if t <= self.keys[0].0 {
                    return self.keys[0].1;
                }
                let last = self.keys[self.keys.len() - 1];
                if t >= last.0 {
                    return last.1;
                }
                let i = self.keys.partition_point(|k| k.0 <= t);
                let (t0, v0) = self.keys[i - 1];
                let (t1, v1) = self.keys[i];
                lerp(v0, v1, inverse_lerp(t0, t1, t))
            }
        }
    }
}

impl Default for Curve {
    fn default() -> Self {
        Self::linear(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aabb_from_points_covers_all_points() {
        let pts = [
            Vec3::new(-1.0, 2.0, 0.5),
            Vec3::new(3.0, -4.0, 0.0),
            Vec3::new(0.0, 0.0, 7.0),
        ];
        let b = Aabb::from_points(&pts);
        assert_eq!(b.min, Vec3::new(-1.0, -4.0, 0.0));
        assert_eq!(b.max, Vec3::new(3.0, 2.0, 7.0));
        assert!(!b.is_empty());
    }

    #[test]
    fn aabb_of_no_points_is_empty() {
        let b = Aabb::from_points(&[]);
        assert!(b.is_empty());
    }

    #[test]
    fn inverse_lerp_clamps_and_handles_degenerate_range() {
        assert_eq!(inverse_lerp(0.0, 10.0, 5.0), 0.5);
        assert_eq!(inverse_lerp(0.0, 10.0, -5.0), 0.0);
        assert_eq!(inverse_lerp(0.0, 10.0, 20.0), 1.0);
        assert_eq!(inverse_lerp(3.0, 3.0, 3.0), 0.0);
    }

    #[test]
    fn curve_evaluates_between_keys() {
        let c = Curve::new(vec![(0.0, 0.0), (0.5, 1.0), (1.0, 0.0)]);
        assert_eq!(c.eval(0.25), 0.5);
        assert_eq!(c.eval(0.5), 1.0);
        assert_eq!(c.eval(0.75), 0.5);
    }

    #[test]
    fn curve_clamps_outside_key_range() {
        let c = Curve::linear(2.0, 4.0);
        assert_eq!(c.eval(-1.0), 2.0);
        assert_eq!(c.eval(2.0), 4.0);
    }

    #[test]
    fn constant_curve_ignores_t() {
        let c = Curve::constant(0.7);
        assert_eq!(c.eval(0.0), 0.7);
        assert_eq!(c.eval(1.0), 0.7);
    }
}
