//! Weeding of redundant vertices.
//!
//! Each part is brought into a canonical form before it is weeded:
//! rings start at their lexicographically smallest vertex and run
//! counter clockwise, paths start at their smaller end point. The
//! result is therefore the same for a geometry and its reverse, and
//! does not depend on where a ring starts.
use geo::winding_order::WindingOrder;
use log::debug;

use crate::{
    geometry::{sort_dedup, EnvelopeExt, Envelope, Geometry, Path, Segment, Vertex},
    CrackError, Result,
};

/// Returns the vertices of `geometry` that can be removed without the
/// geometry moving by more than `tolerance`.
///
/// Distances are measured in 2D if `ignore_z` is set and in 3D
/// otherwise; 3D weeding requires every vertex to have a Z value. Arc
/// segments are densified first if `linearize_arcs_first` is set,
/// otherwise their end points are kept. The result is sorted and free
/// of duplicates, and restricted to `extent` if given.
pub fn weed_points(
    geometry: &Geometry,
    tolerance: f64,
    ignore_z: bool,
    extent: Option<&Envelope>,
    linearize_arcs_first: bool,
) -> Result<Vec<Vertex>> {
    if !tolerance.is_finite() || tolerance < 0. {
        return Err(CrackError::invalid(format!(
            "weed tolerance must be a finite, non-negative number, got {tolerance}"
        )));
    }
    if geometry.is_point_like() {
        return Ok(vec![]);
    }
    if !ignore_z && !geometry.is_z_aware() {
        return Err(CrackError::invalid(
            "3D weeding requires a Z value on every vertex",
        ));
    }

    let geometry = if linearize_arcs_first {
        geometry.linearized()
    } else {
        geometry.clone()
    };

    let mut weeded = vec![];
    for path in geometry.parts() {
        let canonical = Canonical::new(path);
        weeded.extend(canonical.weed(tolerance, ignore_z));
    }

    if let Some(extent) = extent {
        weeded.retain(|v| extent.covers(v.xy()));
    }
    sort_dedup(&mut weeded);
    debug!(
        "weeded {} of {} vertices (tolerance {tolerance}, {})",
        weeded.len(),
        geometry.vertex_count(),
        if ignore_z { "2D" } else { "3D" }
    );
    Ok(weeded)
}

/// A part in canonical order.
///
/// For rings, the closing vertex is dropped and `arcs[i]` refers to the
/// segment from vertex `i` to vertex `i + 1` (wrapping around).
struct Canonical {
    vertices: Vec<Vertex>,
    arcs: Vec<bool>,
    closed: bool,
}

impl Canonical {
    fn new(path: &Path) -> Self {
        let vertices = path.vertices().to_vec();
        let arcs: Vec<bool> = path.segments().map(|s| s.is_arc()).collect();

        if !path.is_closed() {
            let reverse = path.end().lex_cmp(&path.start()).is_lt();
            let (mut vertices, mut arcs) = (vertices, arcs);
            if reverse {
                vertices.reverse();
                arcs.reverse();
            }
            return Canonical {
                vertices,
                arcs,
                closed: false,
            };
        }

        let mut vertices = vertices;
        vertices.pop();
        let m = vertices.len();
        let start = (0..m)
            .min_by(|&i, &j| vertices[i].lex_cmp(&vertices[j]))
            .unwrap_or(0);
        let mut rotated: Vec<Vertex> = (0..m).map(|k| vertices[(start + k) % m]).collect();
        let mut rotated_arcs: Vec<bool> = (0..m).map(|k| arcs[(start + k) % m]).collect();

        if path.winding_order() == Some(WindingOrder::Clockwise) {
            rotated = (0..m).map(|k| rotated[(m - k) % m]).collect();
            rotated_arcs = (0..m).map(|k| rotated_arcs[m - k - 1]).collect();
        }

        Canonical {
            vertices: rotated,
            arcs: rotated_arcs,
            closed: true,
        }
    }

    fn vertex(&self, index: usize) -> Vertex {
        self.vertices[index % self.vertices.len()]
    }

    /// Indices (into the canonical order, rings extended by the closing
    /// vertex) that are never weeded.
    fn fixed_indices(&self, ignore_z: bool) -> Vec<usize> {
        let n = self.vertices.len();
        let last = if self.closed { n } else { n - 1 };
        let mut fixed = vec![0, last];

        if self.closed {
            let start = self.vertices[0];
            let farthest = (1..n).fold(None, |best: Option<(f64, usize)>, i| {
                let d = distance(&start, &self.vertices[i], ignore_z);
                match best {
                    Some((bd, _)) if bd >= d => best,
                    _ => Some((d, i)),
                }
            });
            if let Some((_, i)) = farthest {
                fixed.push(i);
            }
        }

        for (i, &is_arc) in self.arcs.iter().enumerate() {
            if is_arc {
                fixed.push(i);
                fixed.push(i + 1);
            }
        }
        fixed.sort_unstable();
        fixed.dedup();
        fixed
    }

    fn weed(&self, tolerance: f64, ignore_z: bool) -> Vec<Vertex> {
        let fixed = self.fixed_indices(ignore_z);
        let mut weeded = vec![];
        for window in fixed.windows(2) {
            let (lo, hi) = (window[0], window[1]);
            if hi - lo < 2 || self.arcs[lo] {
                continue;
            }
            let mut keep = vec![false; hi - lo + 1];
            self.douglas_peucker(lo, hi, tolerance, ignore_z, &mut keep, lo);
            weeded.extend(
                (lo + 1..hi)
                    .filter(|&i| !keep[i - lo])
                    .map(|i| self.vertex(i)),
            );
        }
        weeded
    }

    fn douglas_peucker(
        &self,
        lo: usize,
        hi: usize,
        tolerance: f64,
        ignore_z: bool,
        keep: &mut [bool],
        offset: usize,
    ) {
        if hi - lo < 2 {
            return;
        }
        let chord = Segment::line(self.vertex(lo), self.vertex(hi));
        let farthest = (lo + 1..hi).fold(None, |best: Option<(f64, usize)>, i| {
            let d = chord.chord_distance(&self.vertex(i), ignore_z);
            match best {
                Some((bd, _)) if bd >= d => best,
                _ => Some((d, i)),
            }
        });
        if let Some((d, i)) = farthest {
            if d > tolerance {
                keep[i - offset] = true;
                self.douglas_peucker(lo, i, tolerance, ignore_z, keep, offset);
                self.douglas_peucker(i, hi, tolerance, ignore_z, keep, offset);
            }
        }
    }
}

fn distance(a: &Vertex, b: &Vertex, ignore_z: bool) -> f64 {
    if ignore_z {
        a.distance_2d(b)
    } else {
        a.distance_3d(b)
    }
}
