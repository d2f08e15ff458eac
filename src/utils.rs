use geo::Coordinate;

/// Number of decimals that distances are rounded to before they are
/// compared against a length threshold.
pub(crate) const DISTANCE_DECIMALS: i32 = 2;

/// Grid that linearized arc vertices are snapped to.
pub(crate) const LINEARIZE_RESOLUTION: f64 = 1e-6;

pub(crate) fn round_distance(distance: f64) -> f64 {
    let factor = 10f64.powi(DISTANCE_DECIMALS);
    (distance * factor).round() / factor
}

pub(crate) fn snap_to_grid(value: f64, resolution: f64) -> f64 {
    (value / resolution).round() * resolution
}

#[inline]
pub(crate) fn cross(a: Coordinate<f64>, b: Coordinate<f64>) -> f64 {
    a.x * b.y - a.y * b.x
}

#[inline]
pub(crate) fn dot(a: Coordinate<f64>, b: Coordinate<f64>) -> f64 {
    a.x * b.x + a.y * b.y
}

#[inline]
pub(crate) fn distance(a: Coordinate<f64>, b: Coordinate<f64>) -> f64 {
    (a.x - b.x).hypot(a.y - b.y)
}

/// Fraction of the projection of `p` onto the line `a -> b`, clamped to
/// `[0, 1]`. Degenerate lines project everything onto `a`.
pub(crate) fn project_fraction(a: Coordinate<f64>, b: Coordinate<f64>, p: Coordinate<f64>) -> f64 {
    let ab = b - a;
    let len2 = dot(ab, ab);
    if len2 == 0. {
        return 0.;
    }
    (dot(p - a, ab) / len2).max(0.).min(1.)
}

#[inline]
pub(crate) fn lerp(a: Coordinate<f64>, b: Coordinate<f64>, t: f64) -> Coordinate<f64> {
    Coordinate {
        x: a.x + (b.x - a.x) * t,
        y: a.y + (b.y - a.y) * t,
    }
}

pub(crate) fn distance_to_segment(a: Coordinate<f64>, b: Coordinate<f64>, p: Coordinate<f64>) -> f64 {
    let t = project_fraction(a, b, p);
    distance(lerp(a, b, t), p)
}
