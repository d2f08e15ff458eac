//! Raw intersections between a source and a target geometry.
//!
//! Candidate segment pairs are found by querying an [`RTree`] of the
//! source segments against an `RTree` of the target segments (or target
//! points), then each pair is intersected with the configured
//! [`IntersectionStrategy`]. Overlapping pieces are merged into
//! connected runs along each source part.
//!
//! [`RTree`]: rstar::RTree
use std::cmp::Ordering;

use geo::Coordinate;
use itertools::Itertools;
use log::{debug, trace};

use crate::{
    geometry::{EnvelopeExt, Envelope, Geometry, Path, Vertex},
    options::{IntersectionPointOptions, IntersectionStrategy},
    utils::distance,
    LineOrPoint,
};

mod custom;
pub(crate) mod index;
mod native;

use index::{source_segments, target_items, SourceSegment, TargetItem};

/// How a candidate came about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntersectionKind {
    /// A crossing or touching point.
    Point,
    /// An end point of a linear (overlapping) run.
    LinearEnd,
    /// A vertex inside a linear run.
    LinearInterior,
    /// A target vertex near, but not on, a source segment.
    NearVertex,
}

/// A candidate location where the source meets the target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntersectionPoint {
    pub location: Coordinate<f64>,
    /// Z interpolated along the source segment.
    pub source_z: Option<f64>,
    /// Z of the target at the location.
    pub target_z: Option<f64>,
    pub source_part: usize,
    pub source_segment: usize,
    /// Position along the source segment, in `[0, 1]`.
    pub fraction: f64,
    pub kind: IntersectionKind,
}

impl IntersectionPoint {
    fn on_pair(location: Coordinate<f64>, source: &SourceSegment, target: &TargetItem, kind: IntersectionKind) -> Self {
        let (fraction, _) = source.segment.locate(location);
        IntersectionPoint {
            location,
            source_z: source.segment.z_at(fraction),
            target_z: target.z_at(location),
            source_part: source.part,
            source_segment: source.index,
            fraction,
            kind,
        }
    }

    /// The candidate as a vertex, with the Z of the source or the target.
    pub fn vertex(&self, use_source_zs: bool) -> Vertex {
        Vertex {
            x: self.location.x,
            y: self.location.y,
            z: if use_source_zs {
                self.source_z
            } else {
                self.target_z
            },
        }
    }

    /// Position along the source part.
    fn param(&self) -> f64 {
        self.source_segment as f64 + self.fraction
    }
}

/// The raw intersection of a source and a target.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Intersections {
    /// Candidates, ordered along the source parts.
    pub points: Vec<IntersectionPoint>,
    /// Connected overlap runs, as paths along the source.
    pub linear: Vec<Path>,
}

impl Intersections {
    pub fn is_empty(&self) -> bool {
        self.points.is_empty() && self.linear.is_empty()
    }

    /// The overlap runs as a polyline, if there are any.
    pub fn linear_geometry(&self) -> Option<Geometry> {
        (!self.linear.is_empty()).then(|| Geometry::Polyline(self.linear.clone()))
    }

    /// Appends the candidates of `other`, shifting source part indices by
    /// `part_offset`.
    pub(crate) fn extend_with_offset(&mut self, other: Intersections, part_offset: usize) {
        self.points.extend(other.points.into_iter().map(|mut p| {
            p.source_part += part_offset;
            p
        }));
        self.linear.extend(other.linear);
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct IntersectParams {
    pub strategy: IntersectionStrategy,
    pub tolerance: f64,
    pub point_options: IntersectionPointOptions,
    pub extent: Option<Envelope>,
}

/// An overlapping piece along a source part.
#[derive(Debug, Clone, Copy)]
struct Piece {
    part: usize,
    start: IntersectionPoint,
    end: IntersectionPoint,
}

/// Intersects the curve parts of `source` with `target`.
pub(crate) fn intersect(source: &Geometry, target: &Geometry, params: &IntersectParams) -> Intersections {
    let source = source.linearized();
    let target = target.linearized();
    if source.is_point_like() || target.is_empty() {
        return Intersections::default();
    }

    let source_tree = source_segments(&source, params.tolerance);
    let target_tree = target_items(&target);

    let mut points = vec![];
    let mut pieces = vec![];
    for (s, t) in source_tree.intersection_candidates_with_other_tree(&target_tree) {
        let (s, t) = (&s.item, &t.item);
        let source_lp: LineOrPoint = s.segment.chord().into();
        let target_lp = match t {
            TargetItem::Point(v) => LineOrPoint::from(v.xy()),
            TargetItem::Segment(seg) => LineOrPoint::from(seg.chord()),
        };
        let hit = match params.strategy {
            IntersectionStrategy::Native => native::intersect(&source_lp, &target_lp),
            IntersectionStrategy::Custom => custom::intersect(&source_lp, &target_lp, params.tolerance),
        };
        match hit {
            None => {}
            Some(LineOrPoint::Point(p)) => {
                trace!("point intersection at {:?} on part {} segment {}", p.coord(), s.part, s.index);
                points.push(IntersectionPoint::on_pair(p.coord(), s, t, IntersectionKind::Point));
            }
            Some(LineOrPoint::Line(p, q)) => {
                let mut start = IntersectionPoint::on_pair(p.coord(), s, t, IntersectionKind::LinearEnd);
                let mut end = IntersectionPoint::on_pair(q.coord(), s, t, IntersectionKind::LinearEnd);
                if start.fraction > end.fraction {
                    std::mem::swap(&mut start, &mut end);
                }
                pieces.push(Piece {
                    part: s.part,
                    start,
                    end,
                });
            }
        }
    }

    let closed: Vec<(bool, usize)> = source
        .parts()
        .iter()
        .map(|p| (p.is_closed(), p.segment_count()))
        .collect();
    let runs = merge_runs(pieces, &closed, params.tolerance);

    let mut result = Intersections::default();
    for run in &runs {
        let vertices: Vec<Vertex> = run.iter().map(|p| p.vertex(true)).collect();
        if let Ok(path) = Path::new(vertices) {
            result.linear.push(path);
        }
    }

    match params.point_options {
        IntersectionPointOptions::AllPoints => {
            for run in &runs {
                let last = run.len() - 1;
                result.points.extend(run.iter().enumerate().map(|(i, p)| IntersectionPoint {
                    kind: if i == 0 || i == last {
                        IntersectionKind::LinearEnd
                    } else {
                        IntersectionKind::LinearInterior
                    },
                    ..*p
                }));
            }
            result.points.extend(points);
        }
        IntersectionPointOptions::EndpointsOnly => {
            for run in &runs {
                result.points.push(run[0]);
                if !is_full_ring(run) {
                    result.points.push(run[run.len() - 1]);
                }
            }
            // Touching points inside a run are not reported separately
            let inside_run = |p: &IntersectionPoint| {
                result.linear.iter().any(|path| {
                    path.segments().any(|s| s.interior_within(p.location, params.tolerance))
                        || path.vertices()[1..path.vertex_count() - 1]
                            .iter()
                            .any(|v| distance(v.xy(), p.location) <= params.tolerance)
                })
            };
            let points: Vec<_> = points.into_iter().filter(|p| !inside_run(p)).collect();
            result.points.extend(points);
        }
    }

    if let Some(extent) = params.extent {
        result.points.retain(|p| extent.covers(p.location));
    }

    result.points = dedup_points(result.points, params.tolerance);
    debug!(
        "{} intersection candidates, {} linear runs",
        result.points.len(),
        result.linear.len()
    );
    result
}

// A run covering a whole closed part starts and ends at the same place.
fn is_full_ring(run: &[IntersectionPoint]) -> bool {
    run.len() > 2 && run[0].location == run[run.len() - 1].location
}

/// Merges overlapping pieces into connected runs along each part.
///
/// Each run is the ordered list of piece end points. On closed parts a
/// run ending at the closing vertex continues into the run starting at
/// the first vertex.
fn merge_runs(mut pieces: Vec<Piece>, closed: &[(bool, usize)], tolerance: f64) -> Vec<Vec<IntersectionPoint>> {
    pieces.sort_by(|a, b| {
        (a.part, a.start.param())
            .partial_cmp(&(b.part, b.start.param()))
            .unwrap_or(Ordering::Equal)
    });

    let mut runs: Vec<(usize, Vec<IntersectionPoint>)> = vec![];
    for piece in pieces {
        if let Some((part, run)) = runs.last_mut() {
            let last = run[run.len() - 1];
            let connected = *part == piece.part
                && (piece.start.param() <= last.param()
                    || distance(last.location, piece.start.location) <= tolerance);
            if connected {
                if piece.end.param() > last.param() {
                    run.push(piece.end);
                }
                continue;
            }
        }
        runs.push((piece.part, vec![piece.start, piece.end]));
    }

    let mut merged = vec![];
    for (part, group) in &runs.into_iter().group_by(|(part, _)| *part) {
        let mut part_runs: Vec<Vec<IntersectionPoint>> = group.map(|(_, run)| run).collect();
        let (is_closed, segments) = closed[part];
        if is_closed && part_runs.len() > 1 {
            let starts_at_origin = part_runs[0][0].param() <= 0.;
            let ends_at_closure = part_runs
                .last()
                .map_or(false, |run| run[run.len() - 1].param() >= segments as f64);
            if starts_at_origin && ends_at_closure {
                let head = part_runs.remove(0);
                if let Some(tail) = part_runs.last_mut() {
                    tail.extend(head.into_iter().skip(1));
                }
            }
        }
        merged.extend(part_runs);
    }
    merged
}

/// Drops candidates within `tolerance` of an earlier one on the same
/// part, after ordering them along the source parts.
fn dedup_points(mut points: Vec<IntersectionPoint>, tolerance: f64) -> Vec<IntersectionPoint> {
    points.sort_by(|a, b| {
        (a.source_part, a.param())
            .partial_cmp(&(b.source_part, b.param()))
            .unwrap_or(Ordering::Equal)
    });
    let mut kept: Vec<IntersectionPoint> = Vec::with_capacity(points.len());
    for p in points {
        let duplicate = kept.iter().any(|k| {
            k.source_part == p.source_part
                && distance(k.location, p.location) <= tolerance
                && match (k.target_z, p.target_z) {
                    (Some(z1), Some(z2)) => (z1 - z2).abs() <= tolerance,
                    _ => true,
                }
        });
        if !duplicate {
            kept.push(p);
        }
    }
    kept
}

/// Target vertices within `snap_tolerance` of a source segment, but
/// further than `tolerance` from it.
pub(crate) fn near_vertices(
    source: &Geometry,
    target_vertices: &[Vertex],
    snap_tolerance: f64,
    tolerance: f64,
    extent: Option<&Envelope>,
) -> Vec<IntersectionPoint> {
    let source = source.linearized();
    let source_tree = source_segments(&source, 0.);
    let mut found = vec![];
    for v in target_vertices {
        if extent.map_or(false, |e| !e.covers(v.xy())) {
            continue;
        }
        let query = Envelope::new(v.xy(), v.xy()).inflate(snap_tolerance).to_aabb();
        let nearest = source_tree
            .locate_in_envelope_intersecting(&query)
            .map(|s| (s.item.segment.distance_2d(v.xy()), s.item))
            .filter(|(d, _)| *d <= snap_tolerance)
            .fold(None, |best: Option<(f64, SourceSegment)>, (d, s)| match best {
                Some((bd, bs)) if (bd, bs.part, bs.index) <= (d, s.part, s.index) => best,
                _ => Some((d, s)),
            });
        if let Some((d, s)) = nearest {
            if d > tolerance {
                trace!("target vertex {:?} is {d} from part {} segment {}", v, s.part, s.index);
                found.push(IntersectionPoint::on_pair(
                    v.xy(),
                    &s,
                    &TargetItem::Point(*v),
                    IntersectionKind::NearVertex,
                ));
            }
        }
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Ring;

    fn ring(coords: &[(f64, f64, f64)]) -> Ring {
        Ring::new(coords.iter().map(|&c| Vertex::from(c)).collect()).unwrap()
    }

    fn params(strategy: IntersectionStrategy, point_options: IntersectionPointOptions) -> IntersectParams {
        IntersectParams {
            strategy,
            tolerance: 0.001,
            point_options,
            extent: None,
        }
    }

    fn target_square() -> Geometry {
        Geometry::Polygon(vec![ring(&[
            (0., 0., 640.),
            (0., 60., 640.),
            (50., 60., 600.),
            (50., 0., 600.),
            (0., 0., 640.),
        ])])
    }

    #[test]
    fn test_linear_run_end_points() {
        let source = Geometry::Polygon(vec![ring(&[
            (0., 10., 605.),
            (0., 20., 605.),
            (0., 30., 605.),
            (20., 30., 640.),
            (20., 10., 640.),
            (0., 10., 605.),
        ])]);

        for strategy in [IntersectionStrategy::Native, IntersectionStrategy::Custom].iter() {
            let result = intersect(
                &source,
                &target_square(),
                &params(*strategy, IntersectionPointOptions::EndpointsOnly),
            );
            assert_eq!(result.linear.len(), 1, "{strategy:?}");
            assert_eq!(result.linear[0].vertex_count(), 3);
            assert_eq!(result.linear_geometry().map(|g| g.vertex_count()), Some(3));
            assert_eq!(result.points.len(), 2, "{strategy:?}");
            assert!(result.points.iter().all(|p| p.target_z == Some(640.)));
            assert!(result.points.iter().all(|p| p.source_z == Some(605.)));

            let all = intersect(
                &source,
                &target_square(),
                &params(*strategy, IntersectionPointOptions::AllPoints),
            );
            assert_eq!(all.points.len(), 3, "{strategy:?}");
        }
    }

    #[test]
    fn test_run_across_ring_start() {
        // The source ring starts in the middle of the shared edge
        let source = Geometry::Polygon(vec![ring(&[
            (0., 20., 0.),
            (0., 30., 0.),
            (-20., 30., 0.),
            (-20., 10., 0.),
            (0., 10., 0.),
            (0., 20., 0.),
        ])]);
        let result = intersect(
            &source,
            &target_square(),
            &params(IntersectionStrategy::Custom, IntersectionPointOptions::EndpointsOnly),
        );
        assert_eq!(result.linear.len(), 1);
        let mut ys: Vec<_> = result.points.iter().map(|p| p.location.y).collect();
        ys.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_eq!(ys, vec![10., 30.]);
    }

    #[test]
    fn test_point_target_and_extent() {
        let source = target_square();
        let target = Geometry::Multipoint(vec![Vertex::new(0., 30.), Vertex::new(50., 30.)]);
        let mut p = params(IntersectionStrategy::Native, IntersectionPointOptions::AllPoints);
        let result = intersect(&source, &target, &p);
        assert_eq!(result.points.len(), 2);
        assert_eq!(result.points[0].source_segment, 0);
        assert_eq!(result.points[0].source_z, Some(640.));
        assert_eq!(result.points[0].target_z, None);

        p.extent = Some(Envelope::new(Coordinate { x: -1., y: -1. }, Coordinate { x: 1., y: 61. }));
        let result = intersect(&source, &target, &p);
        assert_eq!(result.points.len(), 1);
        assert_eq!(result.points[0].location, Coordinate { x: 0., y: 30. });
    }

    #[test]
    fn test_touching_point_is_reported_per_part() {
        // Two rings sharing the edge the target point lies on
        let source = Geometry::Multipatch(vec![
            ring(&[(0., 0., 0.), (0., 60., 0.), (50., 60., 0.), (50., 0., 0.), (0., 0., 0.)]),
            ring(&[(-10., 0., 0.), (-10., 60., 0.), (0., 60., 0.), (0., 0., 0.), (-10., 0., 0.)]),
        ]);
        let target = Geometry::Point(Vertex::new(0., 30.));
        let result = intersect(
            &source,
            &target,
            &params(IntersectionStrategy::Custom, IntersectionPointOptions::AllPoints),
        );
        let parts: Vec<_> = result.points.iter().map(|p| (p.source_part, p.source_segment)).collect();
        assert_eq!(parts, vec![(0, 0), (1, 2)]);
    }

    #[test]
    fn test_near_vertices() {
        let source = target_square();
        let found = near_vertices(
            &source,
            &[Vertex::new(0.05, 30.), Vertex::new(0.0005, 20.), Vertex::new(25., 30.)],
            0.1,
            0.001,
            None,
        );
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].kind, IntersectionKind::NearVertex);
        assert_eq!(found[0].source_segment, 0);
    }
}
