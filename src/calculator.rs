//! The crack point calculator.
//!
//! A crack point is derived from a raw intersection candidate in the
//! following steps:
//!
//! 1. Candidates that coincide with an existing source vertex (in XY,
//!    and in Z where both have one) are dropped, as nothing needs to be
//!    inserted. In chopping mode only polyline end points are dropped.
//! 1. The candidate snaps to the nearest target vertex within the snap
//!    tolerance.
//! 1. The Z value is taken from the source or the target.
//! 1. Points that would create a segment shorter than the minimum
//!    segment length, or crack two adjacent segments (a cut back), are
//!    flagged.
//! 1. Duplicates are removed.
use itertools::Itertools;
use log::{debug, trace};

use crate::{
    geometry::{EnvelopeExt, Geometry, Vertex},
    intersect::{
        self,
        index::{SegmentIndex, SourceSegment, VertexIndex},
        near_vertices, IntersectParams, IntersectionPoint, Intersections,
    },
    options::{CrackerOptions, TargetTransformation},
    utils::round_distance,
    CrackError, Result,
};

/// A location where a vertex should be inserted into the source.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CrackPoint {
    pub point: Vertex,
    pub source_part: usize,
    pub source_segment: usize,
    /// Inserting the point would create a segment shorter than the
    /// minimum segment length, or the point is ambiguous.
    pub violates_minimum_segment_length: bool,
    pub is_on_existing_vertex: bool,
    /// The point lies on two adjacent segments; inserting it would make
    /// the ring double back on itself.
    pub causes_cutback: bool,
    /// The point coincides with a source vertex in XY, but not in Z.
    pub target_vertex_different_in_z: bool,
}

impl CrackPoint {
    pub fn is_crackable(&self) -> bool {
        !self.violates_minimum_segment_length && !self.causes_cutback
    }
}

/// Computes crack points between a source and a target geometry.
///
/// The calculator holds only its validated configuration; it never
/// modifies its inputs and can be shared between threads.
#[derive(Debug, Clone)]
pub struct CrackPointCalculator {
    options: CrackerOptions,
}

impl CrackPointCalculator {
    /// Validates the options; see [`CrackerOptions::validated`].
    pub fn new(options: CrackerOptions) -> Result<Self> {
        Ok(CrackPointCalculator {
            options: options.validated()?,
        })
    }

    pub fn options(&self) -> &CrackerOptions {
        &self.options
    }

    pub fn snap_tolerance(&self) -> Option<f64> {
        self.options.snap_tolerance
    }

    pub fn minimum_segment_length(&self) -> Option<f64> {
        self.options.minimum_segment_length
    }

    /// Whether the envelopes of `a` and `b` are too far apart for the two
    /// to produce any crack point.
    pub fn cannot_intersect(&self, a: &Geometry, b: &Geometry) -> bool {
        match (a.envelope(), b.envelope()) {
            (Some(a), Some(b)) => !a.inflate(self.options.search_tolerance()).overlaps(&b),
            _ => true,
        }
    }

    /// Applies the configured target transformation.
    pub fn transform_target(&self, target: &Geometry) -> Geometry {
        match self.options.target_transformation {
            None => target.clone(),
            Some(TargetTransformation::Vertices) => Geometry::Multipoint(target.vertices()),
            Some(TargetTransformation::LineEndpoints) => match target {
                Geometry::Polyline(paths) => {
                    let mut ends: Vec<Vertex> = vec![];
                    for p in paths {
                        for v in [p.start(), p.end()].iter() {
                            if !ends.contains(v) {
                                ends.push(*v);
                            }
                        }
                    }
                    Geometry::Multipoint(ends)
                }
                _ => Geometry::Multipoint(vec![]),
            },
        }
    }

    /// Raw intersection candidates of `source` with the (transformed)
    /// `target`, including target vertices within the snap tolerance of
    /// a source segment.
    pub fn intersection_points(&self, source: &Geometry, target: &Geometry) -> Result<Intersections> {
        if source.is_point_like() {
            return Err(CrackError::UnsupportedGeometry(source.type_name()));
        }
        // Curve parts are checked on construction, bare points are not
        if target.is_point_like() {
            if let Some(v) = target.vertices().into_iter().find(|v| !v.is_finite()) {
                return Err(CrackError::invalid(format!("non-finite target point {v:?}")));
            }
        }
        let target = self.transform_target(target);
        let params = IntersectParams {
            strategy: self.options.intersection_strategy,
            tolerance: self.options.xy_tolerance,
            point_options: self.options.intersection_point_options,
            extent: self.options.extent,
        };
        let mut result = intersect::intersect(source, &target, &params);

        if let Some(snap) = self.options.snap_tolerance {
            let near = near_vertices(
                source,
                &target.vertices(),
                snap,
                self.options.xy_tolerance,
                self.options.extent.as_ref(),
            );
            result.points.extend(near);
        }
        Ok(result)
    }

    /// Turns raw candidates into crack points on `source`, snapping to
    /// the vertices of `snap_target`.
    pub fn determine_crack_points(
        &self,
        candidates: &[IntersectionPoint],
        source: &Geometry,
        snap_target: Option<&Geometry>,
    ) -> Vec<CrackPoint> {
        let source = source.linearized();
        let context = Context {
            options: &self.options,
            source_vertices: VertexIndex::new(&source),
            source_segments: SegmentIndex::new(&source),
            snap_vertices: match (self.options.snap_tolerance, snap_target) {
                (Some(_), Some(target)) => Some(VertexIndex::new(target)),
                _ => None,
            },
            polyline_ends: match &source {
                Geometry::Polyline(paths) => paths.iter().flat_map(|p| vec![p.start(), p.end()]).collect(),
                _ => vec![],
            },
            source: &source,
        };

        let mut crack_points: Vec<CrackPoint> = vec![];
        for candidate in candidates {
            if let Some(cp) = context.crack_point(candidate) {
                let duplicate = crack_points.iter().any(|other| {
                    other.source_part == cp.source_part
                        && other.point.equals_xy(&cp.point, context.merge_tolerance())
                        && other.point.z_agrees(&cp.point, self.options.z_tolerance)
                });
                if duplicate {
                    trace!("dropping duplicate crack point {:?}", cp.point);
                } else {
                    crack_points.push(cp);
                }
            }
        }
        debug!(
            "{} crack points from {} candidates ({} not crackable)",
            crack_points.len(),
            candidates.len(),
            crack_points.iter().filter(|cp| !cp.is_crackable()).count()
        );
        crack_points
    }

    /// Intersects `source` with `target` and derives the crack points on
    /// `source`. Also returns the raw intersection.
    pub fn get_intersection_points(
        &self,
        source: &Geometry,
        target: &Geometry,
    ) -> Result<(Vec<CrackPoint>, Intersections)> {
        let intersections = self.intersection_points(source, target)?;
        let snap_target = self.transform_target(target);
        let crack_points = self.determine_crack_points(&intersections.points, source, Some(&snap_target));
        Ok((crack_points, intersections))
    }
}

/// Lookup structures for one `determine_crack_points` call.
struct Context<'a> {
    options: &'a CrackerOptions,
    source: &'a Geometry,
    source_vertices: VertexIndex,
    source_segments: SegmentIndex,
    snap_vertices: Option<VertexIndex>,
    polyline_ends: Vec<Vertex>,
}

impl<'a> Context<'a> {
    fn merge_tolerance(&self) -> f64 {
        self.options.snap_tolerance.unwrap_or(self.options.xy_tolerance)
    }

    /// Vertices of source part `part` within `tolerance` of `point`.
    fn part_vertices_within(&self, point: &Vertex, part: usize, tolerance: f64) -> Vec<Vertex> {
        self.source_vertices
            .within(point.xy(), tolerance)
            .into_iter()
            .filter(|v| v.part == part)
            .map(|v| v.vertex)
            .collect()
    }

    /// Whether a vertex of source part `part` coincides with `point` in
    /// XY and Z. Returns `None` if no vertex is near in XY.
    fn existing_vertex_matches(&self, point: &Vertex, part: usize) -> Option<bool> {
        let existing = self.part_vertices_within(point, part, self.options.xy_tolerance);
        if existing.is_empty() {
            return None;
        }
        Some(existing.iter().any(|v| v.z_agrees(point, self.options.z_tolerance)))
    }

    fn crack_point(&self, candidate: &IntersectionPoint) -> Option<CrackPoint> {
        let options = self.options;
        if let Some(extent) = &options.extent {
            if !extent.covers(candidate.location) {
                return None;
            }
        }
        let raw = candidate.vertex(options.use_source_zs);

        let mut different_in_z = false;
        if options.add_crack_points_on_existing_vertices {
            if self
                .polyline_ends
                .iter()
                .any(|end| end.equals_xy(&raw, options.xy_tolerance))
            {
                trace!("{raw:?} is a polyline end point");
                return None;
            }
        } else {
            match self.existing_vertex_matches(&raw, candidate.source_part) {
                Some(true) => {
                    trace!("{raw:?} is an existing vertex");
                    return None;
                }
                Some(false) => different_in_z = true,
                None => {}
            }
        }

        let point = self.snap(&raw, candidate);
        if point != raw && !options.add_crack_points_on_existing_vertices {
            match self.existing_vertex_matches(&point, candidate.source_part) {
                Some(true) => {
                    trace!("{raw:?} snapped onto the existing vertex {point:?}");
                    return None;
                }
                Some(false) => different_in_z = true,
                None => different_in_z = false,
            }
        }

        let is_on_existing_vertex = !self
            .part_vertices_within(&point, candidate.source_part, options.xy_tolerance)
            .is_empty();
        let (violates, cutback) = self.segment_policy(&point, candidate);
        if violates {
            debug!(
                "{point:?} on part {} segment {} is not crackable (cut back: {cutback})",
                candidate.source_part, candidate.source_segment
            );
        }

        Some(CrackPoint {
            point,
            source_part: candidate.source_part,
            source_segment: candidate.source_segment,
            violates_minimum_segment_length: violates,
            is_on_existing_vertex,
            causes_cutback: cutback,
            target_vertex_different_in_z: different_in_z,
        })
    }

    /// Moves `raw` onto the nearest target vertex within the snap
    /// tolerance, taking the Z value according to the Z policy.
    fn snap(&self, raw: &Vertex, candidate: &IntersectionPoint) -> Vertex {
        let (index, snap) = match (&self.snap_vertices, self.options.snap_tolerance) {
            (Some(index), Some(snap)) => (index, snap),
            _ => return *raw,
        };
        let target_vertex = match index.nearest(raw.xy(), snap) {
            Some(v) => v.vertex,
            None => return *raw,
        };
        let z = if self.options.use_source_zs {
            self.host_segment(candidate).and_then(|s| s.segment.z_at(s.segment.locate(target_vertex.xy()).0))
        } else {
            target_vertex.z.or(raw.z)
        };
        Vertex {
            x: target_vertex.x,
            y: target_vertex.y,
            z,
        }
    }

    fn host_segment(&self, candidate: &IntersectionPoint) -> Option<SourceSegment> {
        let path = *self.source.parts().get(candidate.source_part)?;
        (candidate.source_segment < path.segment_count()).then(|| SourceSegment {
            part: candidate.source_part,
            index: candidate.source_segment,
            segment: path.segment(candidate.source_segment),
        })
    }

    /// Returns `(violates_minimum_segment_length, causes_cutback)`.
    fn segment_policy(&self, point: &Vertex, candidate: &IntersectionPoint) -> (bool, bool) {
        let search = self.options.search_tolerance();
        let part = candidate.source_part;
        if !self.part_vertices_within(point, part, search).is_empty() {
            return (false, false);
        }

        let hosts: Vec<SourceSegment> = self
            .source_segments
            .within(point.xy(), search)
            .into_iter()
            .filter(|s| s.part == part && s.segment.interior_within(point.xy(), search))
            .collect();
        if hosts
            .iter()
            .tuple_combinations()
            .any(|(a, b)| self.source_segments.adjacent(a, b))
        {
            return (true, true);
        }
        if hosts.len() > 1 {
            return (true, false);
        }

        let min_length = match self.options.minimum_segment_length {
            Some(min_length) => min_length,
            None => return (false, false),
        };
        let host = match hosts.first().copied().or_else(|| self.host_segment(candidate)) {
            Some(host) => host,
            None => return (false, false),
        };
        let too_short = |end: &Vertex| {
            let d = round_distance(point.distance_3d(end));
            d > search && d < min_length
        };
        (too_short(&host.segment.from) || too_short(&host.segment.to), false)
    }
}
