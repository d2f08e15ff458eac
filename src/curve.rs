use std::f64::consts::PI;

use geo::{Coordinate, Rect};

use crate::{
    geometry::{envelope_of, Envelope},
    utils::{cross, distance, dot, snap_to_grid, LINEARIZE_RESOLUTION},
};

const TAU: f64 = 2. * PI;

/// Maximum distance between an arc and its linearization.
pub(crate) const LINEARIZE_MAX_DEVIATION: f64 = 0.01;

// Caps the vertex count of a single linearized arc.
const MAX_DENSIFY_STEPS: usize = 4096;

/// Circular arc from `from` to `to` through an interior point.
///
/// The arc is stored as a center, a radius and a signed sweep angle
/// starting at the angle of `from`. Positive sweeps run counter
/// clockwise.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct CircularArc {
    from: Coordinate<f64>,
    to: Coordinate<f64>,
    center: Coordinate<f64>,
    radius: f64,
    start_angle: f64,
    sweep: f64,
}

impl CircularArc {
    /// Returns `None` if the three points are (nearly) collinear or the
    /// end points coincide; such an arc is treated as a straight line.
    pub fn new(from: Coordinate<f64>, through: Coordinate<f64>, to: Coordinate<f64>) -> Option<Self> {
        let b = through - from;
        let c = to - from;
        let det = cross(b, c);
        let scale = dot(b, b).sqrt() * dot(c, c).sqrt();
        if scale == 0. || det.abs() <= 1e-12 * scale {
            return None;
        }

        let d = 2. * det;
        let (b2, c2) = (dot(b, b), dot(c, c));
        let offset = Coordinate {
            x: (c.y * b2 - b.y * c2) / d,
            y: (b.x * c2 - c.x * b2) / d,
        };
        let center = from + offset;
        let radius = offset.x.hypot(offset.y);

        let angle_of = |p: Coordinate<f64>| (p.y - center.y).atan2(p.x - center.x);
        let start_angle = angle_of(from);
        let ccw_end = (angle_of(to) - start_angle).rem_euclid(TAU);
        let ccw_mid = (angle_of(through) - start_angle).rem_euclid(TAU);
        let sweep = if ccw_mid < ccw_end {
            ccw_end
        } else {
            ccw_end - TAU
        };

        Some(CircularArc {
            from,
            to,
            center,
            radius,
            start_angle,
            sweep,
        })
    }

    pub fn length(&self) -> f64 {
        self.radius * self.sweep.abs()
    }

    pub fn point_at(&self, fraction: f64) -> Coordinate<f64> {
        if fraction <= 0. {
            return self.from;
        }
        if fraction >= 1. {
            return self.to;
        }
        let angle = self.start_angle + self.sweep * fraction;
        Coordinate {
            x: self.center.x + self.radius * angle.cos(),
            y: self.center.y + self.radius * angle.sin(),
        }
    }

    /// Fraction of the arc angle of `angle`, if it lies within the sweep.
    fn fraction_of_angle(&self, angle: f64) -> Option<f64> {
        let rel = if self.sweep > 0. {
            (angle - self.start_angle).rem_euclid(TAU)
        } else {
            (self.start_angle - angle).rem_euclid(TAU)
        };
        let sweep = self.sweep.abs();
        (rel <= sweep).then(|| rel / sweep)
    }

    /// Fraction of the location on the arc closest to `coord`, and the
    /// distance to it.
    pub fn locate(&self, coord: Coordinate<f64>) -> (f64, f64) {
        let angle = (coord.y - self.center.y).atan2(coord.x - self.center.x);
        match self.fraction_of_angle(angle) {
            Some(fraction) => (fraction, (distance(coord, self.center) - self.radius).abs()),
            None => {
                let (d_from, d_to) = (distance(coord, self.from), distance(coord, self.to));
                if d_from <= d_to {
                    (0., d_from)
                } else {
                    (1., d_to)
                }
            }
        }
    }

    /// Interior points of the linearized arc with their fractions.
    ///
    /// The arc is divided into equal angles, so the same arc traversed in
    /// the opposite direction yields the same points. Coordinates are
    /// snapped to a fixed grid to absorb rounding differences between
    /// the two directions.
    pub fn densify(&self, max_deviation: f64) -> Vec<(f64, Coordinate<f64>)> {
        let steps = if max_deviation >= self.radius {
            1
        } else {
            let step_angle = 2. * (1. - max_deviation / self.radius).acos();
            ((self.sweep.abs() / step_angle).ceil() as usize).max(1)
        }
        .min(MAX_DENSIFY_STEPS);

        (1..steps)
            .map(|i| {
                let fraction = i as f64 / steps as f64;
                let c = self.point_at(fraction);
                let snapped = Coordinate {
                    x: snap_to_grid(c.x, LINEARIZE_RESOLUTION),
                    y: snap_to_grid(c.y, LINEARIZE_RESOLUTION),
                };
                (fraction, snapped)
            })
            .collect()
    }

    /// Interior points of the two arcs that result from splitting at
    /// `fraction`.
    pub fn split(&self, fraction: f64) -> (Coordinate<f64>, Coordinate<f64>) {
        (self.point_at(fraction / 2.), self.point_at((1. + fraction) / 2.))
    }

    pub fn envelope(&self) -> Envelope {
        let extremes = (0..4)
            .map(|k| k as f64 * PI / 2.)
            .filter(|&angle| self.fraction_of_angle(angle).is_some())
            .map(|angle| Coordinate {
                x: self.center.x + self.radius * angle.cos(),
                y: self.center.y + self.radius * angle.sin(),
            });
        envelope_of(std::iter::once(self.from).chain(std::iter::once(self.to)).chain(extremes))
            .unwrap_or_else(|| Rect::new(self.from, self.to))
    }
}
