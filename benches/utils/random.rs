#![allow(dead_code)]

use std::f64::consts::PI;

use geo::{Coordinate, Rect};

use rand::Rng;
use rand_distr::{Distribution, Normal, Standard};

#[inline]
pub fn uniform_point<R: Rng>(rng: &mut R, bounds: Rect<f64>) -> Coordinate<f64> {
    let coords: [f64; 2] = rng.sample(Standard);
    let dims = bounds.max() - bounds.min();
    Coordinate {
        x: bounds.min().x + dims.x * coords[0],
        y: bounds.min().y + dims.y * coords[1],
    }
}

/// Closed, star shaped ring around `center` with `count` distinct
/// vertices at increasing angles (counter clockwise).
///
/// Radii vary randomly between half and the full `radius`; Z follows a
/// normal distribution around `z_mean`.
pub fn star_ring<R: Rng>(
    rng: &mut R,
    center: Coordinate<f64>,
    radius: f64,
    count: usize,
    z_mean: f64,
) -> Vec<(f64, f64, f64)> {
    let z_dist = Normal::new(z_mean, 1.).unwrap();
    let mut coords: Vec<_> = (0..count)
        .map(|i| {
            let angle = 2. * PI * (i as f64 + 0.5 * rng.sample::<f64, _>(Standard)) / count as f64;
            let r = radius * (0.5 + 0.5 * rng.sample::<f64, _>(Standard));
            (
                center.x + r * angle.cos(),
                center.y + r * angle.sin(),
                z_dist.sample(rng),
            )
        })
        .collect();
    coords.push(coords[0]);
    coords
}

/// Ring with `per_edge` nearly collinear vertices on each edge of an
/// axis aligned square; vertices deviate by up to `jitter`.
pub fn jittered_square<R: Rng>(
    rng: &mut R,
    origin: Coordinate<f64>,
    size: f64,
    per_edge: usize,
    jitter: f64,
) -> Vec<(f64, f64, f64)> {
    let corners = [(0., 0.), (0., 1.), (1., 1.), (1., 0.)];
    let mut coords = vec![];
    for k in 0..4 {
        let (x0, y0) = corners[k];
        let (x1, y1) = corners[(k + 1) % 4];
        coords.push((origin.x + x0 * size, origin.y + y0 * size, 0.));
        for i in 1..=per_edge {
            let t = i as f64 / (per_edge + 1) as f64;
            let dx = jitter * (rng.sample::<f64, _>(Standard) - 0.5);
            let dy = jitter * (rng.sample::<f64, _>(Standard) - 0.5);
            coords.push((
                origin.x + (x0 + (x1 - x0) * t) * size + dx,
                origin.y + (y0 + (y1 - y0) * t) * size + dy,
                0.,
            ));
        }
    }
    coords.push(coords[0]);
    coords
}
