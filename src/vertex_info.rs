//! Per-feature collection of the vertex edits to apply.
use log::trace;

use crate::{
    calculator::CrackPoint,
    geometry::{EnvelopeExt, Envelope, Geometry, Vertex},
    options::{normalize_tolerance, DEFAULT_XY_TOLERANCE, DEFAULT_Z_TOLERANCE},
    orchestrate::{Feature, FeatureId},
};

/// The crack points found for one feature, and the vertices to remove
/// from it.
#[derive(Debug, Clone)]
pub struct FeatureVertexInfo {
    feature: FeatureId,
    geometry: Geometry,
    crack_points: Vec<CrackPoint>,
    crack_point_collection: Vec<Vertex>,
    non_crackable_points: Vec<Vertex>,
    points_to_delete: Option<Vec<Vertex>>,
    intersection_points: Vec<Vertex>,
    snap_tolerance: Option<f64>,
    minimum_segment_length: Option<f64>,
    xy_tolerance: f64,
    /// Replace arcs by straight segments before applying the edits.
    pub linearize_segments: bool,
}

/// Pushes `point` unless an equal point (within `tolerance`) is present.
fn add_unique(points: &mut Vec<Vertex>, point: Vertex, tolerance: f64) {
    let exists = points
        .iter()
        .any(|p| p.equals_xy(&point, tolerance) && p.z_agrees(&point, DEFAULT_Z_TOLERANCE));
    if !exists {
        points.push(point);
    }
}

impl FeatureVertexInfo {
    pub fn new(feature: &Feature, snap_tolerance: Option<f64>, minimum_segment_length: Option<f64>) -> Self {
        Self::from_geometry(feature.id, feature.geometry.clone(), snap_tolerance, minimum_segment_length)
    }

    pub fn from_geometry(
        feature: FeatureId,
        geometry: Geometry,
        snap_tolerance: Option<f64>,
        minimum_segment_length: Option<f64>,
    ) -> Self {
        FeatureVertexInfo {
            feature,
            geometry,
            crack_points: vec![],
            crack_point_collection: vec![],
            non_crackable_points: vec![],
            points_to_delete: None,
            intersection_points: vec![],
            snap_tolerance: normalize_tolerance(snap_tolerance),
            minimum_segment_length: normalize_tolerance(minimum_segment_length),
            xy_tolerance: DEFAULT_XY_TOLERANCE,
            linearize_segments: false,
        }
    }

    /// Sets the coordinate tolerance the crack points were calculated
    /// with.
    pub fn with_xy_tolerance(mut self, xy_tolerance: f64) -> Self {
        self.xy_tolerance = xy_tolerance;
        self
    }

    pub fn feature_id(&self) -> FeatureId {
        self.feature
    }

    /// The geometry as it was when the info was created.
    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    pub fn snap_tolerance(&self) -> Option<f64> {
        self.snap_tolerance
    }

    pub fn minimum_segment_length(&self) -> Option<f64> {
        self.minimum_segment_length
    }

    pub fn xy_tolerance(&self) -> f64 {
        self.xy_tolerance
    }

    /// The distance within which a crack point matches a vertex or a
    /// segment of the geometry.
    pub fn search_tolerance(&self) -> f64 {
        self.snap_tolerance.unwrap_or(0.).max(self.xy_tolerance)
    }

    /// Every crack point found, crackable or not.
    pub fn crack_points(&self) -> &[CrackPoint] {
        &self.crack_points
    }

    /// Points to insert, if there are any.
    pub fn crack_point_collection(&self) -> Option<&[Vertex]> {
        (!self.crack_point_collection.is_empty()).then(|| &self.crack_point_collection[..])
    }

    /// Points that were found but would create too short segments.
    pub fn non_crackable_points(&self) -> Option<&[Vertex]> {
        (!self.non_crackable_points.is_empty()).then(|| &self.non_crackable_points[..])
    }

    pub fn points_to_delete(&self) -> Option<&[Vertex]> {
        self.points_to_delete.as_deref().filter(|p| !p.is_empty())
    }

    /// Raw intersection locations with all targets; these are protected
    /// from deletion.
    pub fn intersection_points(&self) -> &[Vertex] {
        &self.intersection_points
    }

    fn merge_tolerance(&self) -> f64 {
        self.snap_tolerance.unwrap_or(self.xy_tolerance)
    }

    /// Files crack points: points causing a cut back are only recorded,
    /// points violating the minimum segment length become non-crackable,
    /// and the rest are collected for insertion.
    pub fn add_crack_points<I: IntoIterator<Item = CrackPoint>>(&mut self, points: I) {
        let tolerance = self.merge_tolerance();
        for cp in points {
            if cp.causes_cutback {
                trace!("{}: {:?} would cut back", self.feature, cp.point);
            } else if cp.violates_minimum_segment_length {
                add_unique(&mut self.non_crackable_points, cp.point, tolerance);
            } else {
                add_unique(&mut self.crack_point_collection, cp.point, tolerance);
            }
            self.crack_points.push(cp);
        }
    }

    pub fn add_intersection_points<I: IntoIterator<Item = Vertex>>(&mut self, points: I) {
        let tolerance = self.merge_tolerance();
        for p in points {
            add_unique(&mut self.intersection_points, p, tolerance);
        }
    }

    pub fn set_points_to_delete(&mut self, points: Vec<Vertex>) {
        self.points_to_delete = Some(points);
    }

    /// Whether `point` is an intersection or crack point and must stay.
    pub fn is_protected(&self, point: &Vertex, tolerance: f64) -> bool {
        self.intersection_points
            .iter()
            .chain(self.crack_point_collection.iter())
            .any(|p| p.equals_xy(point, tolerance))
    }

    /// A copy restricted to the points within `perimeter`, or `None` if
    /// the feature does not reach into it.
    pub fn clone_within(&self, perimeter: &Envelope) -> Option<Self> {
        let envelope = self.geometry.envelope()?;
        if !envelope.overlaps(perimeter) {
            return None;
        }
        let inside = |points: &[Vertex]| -> Vec<Vertex> {
            points.iter().filter(|p| perimeter.covers(p.xy())).copied().collect()
        };
        Some(FeatureVertexInfo {
            crack_points: self
                .crack_points
                .iter()
                .filter(|cp| perimeter.covers(cp.point.xy()))
                .copied()
                .collect(),
            crack_point_collection: inside(&self.crack_point_collection),
            non_crackable_points: inside(&self.non_crackable_points),
            points_to_delete: self.points_to_delete.as_deref().map(inside),
            intersection_points: inside(&self.intersection_points),
            ..self.clone()
        })
    }
}
