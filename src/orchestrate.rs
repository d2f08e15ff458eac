//! Many-to-many cracking of features.
//!
//! Features are read from a [`FeatureStore`], compared pairwise or
//! against a set of target features, and the crack points of each
//! feature are gathered in a [`FeatureVertexInfo`]. The infos are then
//! applied with [`add_remove_points`] and the rewritten geometries are
//! written back to the store.
use std::collections::BTreeMap;
use std::fmt;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::{
    apply::add_remove_points,
    calculator::{CrackPoint, CrackPointCalculator},
    geometry::{EnvelopeExt, Envelope, Geometry},
    intersect::Intersections,
    options::{CrackMode, CrackerOptions, TargetFeatureSelection},
    vertex_info::FeatureVertexInfo,
    weed::weed_points,
    CrackError, Result,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FeatureId(pub u64);

impl fmt::Display for FeatureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A geometry with the state that target selection looks at.
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub id: FeatureId,
    pub geometry: Geometry,
    pub selected: bool,
    pub visible: bool,
}

impl Feature {
    /// A visible, unselected feature.
    pub fn new(id: u64, geometry: Geometry) -> Self {
        Feature {
            id: FeatureId(id),
            geometry,
            selected: false,
            visible: true,
        }
    }

    pub fn selected(mut self, selected: bool) -> Self {
        self.selected = selected;
        self
    }

    pub fn visible(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }
}

/// Whether `feature` takes part under `selection`.
pub fn selection_matches(selection: TargetFeatureSelection, feature: &Feature) -> bool {
    match selection {
        TargetFeatureSelection::SelectedFeatures => feature.selected,
        TargetFeatureSelection::VisibleFeatures => feature.visible,
        TargetFeatureSelection::AllFeatures => true,
    }
}

/// Restricts the features returned by a store. Unset criteria match
/// everything.
#[derive(Debug, Clone, Default)]
pub struct FeatureFilter {
    pub ids: Option<Vec<FeatureId>>,
    pub extent: Option<Envelope>,
    pub selection: Option<TargetFeatureSelection>,
}

impl FeatureFilter {
    pub fn ids(ids: &[FeatureId]) -> Self {
        FeatureFilter {
            ids: Some(ids.to_vec()),
            ..Default::default()
        }
    }

    pub fn matches(&self, feature: &Feature) -> bool {
        if let Some(ids) = &self.ids {
            if !ids.contains(&feature.id) {
                return false;
            }
        }
        if let Some(extent) = &self.extent {
            match feature.geometry.envelope() {
                Some(envelope) if envelope.overlaps(extent) => {}
                _ => return false,
            }
        }
        self.selection
            .map_or(true, |selection| selection_matches(selection, feature))
    }
}

/// Source and sink of features.
pub trait FeatureStore {
    fn get_features(&self, filter: &FeatureFilter) -> Result<Vec<Feature>>;

    /// Replaces the geometry of a feature; fails with
    /// [`CrackError::FeatureNotFound`] for an unknown id.
    fn update_geometry(&mut self, id: FeatureId, geometry: Geometry) -> Result<()>;

    /// Stores a copy of `template` with `geometry` under a new id and
    /// returns the id.
    fn create_feature(&mut self, template: &Feature, geometry: Geometry) -> Result<FeatureId>;
}

/// A [`FeatureStore`] holding its features in memory, ordered by id.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    features: BTreeMap<FeatureId, Feature>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn insert(&mut self, feature: Feature) -> Option<Feature> {
        self.features.insert(feature.id, feature)
    }

    pub fn get(&self, id: FeatureId) -> Option<&Feature> {
        self.features.get(&id)
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

impl std::iter::FromIterator<Feature> for InMemoryStore {
    fn from_iter<I: IntoIterator<Item = Feature>>(iter: I) -> Self {
        InMemoryStore {
            features: iter.into_iter().map(|f| (f.id, f)).collect(),
        }
    }
}

impl FeatureStore for InMemoryStore {
    fn get_features(&self, filter: &FeatureFilter) -> Result<Vec<Feature>> {
        Ok(self
            .features
            .values()
            .filter(|f| filter.matches(f))
            .cloned()
            .collect())
    }

    fn update_geometry(&mut self, id: FeatureId, geometry: Geometry) -> Result<()> {
        let feature = self.features.get_mut(&id).ok_or(CrackError::FeatureNotFound(id))?;
        feature.geometry = geometry;
        Ok(())
    }

    fn create_feature(&mut self, template: &Feature, geometry: Geometry) -> Result<FeatureId> {
        let id = FeatureId(self.features.keys().next_back().map_or(1, |last| last.0 + 1));
        self.features.insert(
            id,
            Feature {
                id,
                geometry,
                ..template.clone()
            },
        );
        Ok(id)
    }
}

/// The infos of the features that were processed, and the error of each
/// feature that was skipped.
#[derive(Debug, Clone, Default)]
pub struct CrackOutcome {
    pub infos: Vec<FeatureVertexInfo>,
    pub failures: Vec<(FeatureId, CrackError)>,
}

/// Result of [`crack_features`].
#[derive(Debug, Clone, Default)]
pub struct CrackSummary {
    pub updated: Vec<FeatureId>,
    pub failures: Vec<(FeatureId, CrackError)>,
}

/// An empty info for `feature` with the tolerances of `options`, or
/// `None` if it cannot be cracked: point geometries and features outside
/// the extent are skipped.
pub fn create_feature_vertex_info(feature: &Feature, options: &CrackerOptions) -> Option<FeatureVertexInfo> {
    if feature.geometry.is_point_like() {
        debug!("{}: {} geometries are not cracked", feature.id, feature.geometry.type_name());
        return None;
    }
    if let Some(extent) = &options.extent {
        let envelope = feature.geometry.envelope()?;
        if !envelope.overlaps(extent) {
            return None;
        }
    }
    let info = FeatureVertexInfo::new(feature, options.snap_tolerance, options.minimum_segment_length);
    Some(info.with_xy_tolerance(options.xy_tolerance))
}

fn record(info: &mut FeatureVertexInfo, crack_points: Vec<CrackPoint>, found: &Intersections, use_source_zs: bool) {
    info.add_intersection_points(found.points.iter().map(|p| p.vertex(use_source_zs)));
    info.add_crack_points(crack_points);
}

/// Adds the crack points of `info`'s geometry with `target`.
pub fn add_crack_points(
    info: &mut FeatureVertexInfo,
    target: &Geometry,
    calculator: &CrackPointCalculator,
) -> Result<()> {
    if calculator.cannot_intersect(info.geometry(), target) {
        return Ok(());
    }
    let (crack_points, found) = calculator.get_intersection_points(info.geometry(), target)?;
    record(info, crack_points, &found, calculator.options().use_source_zs);
    Ok(())
}

/// Adds the crack points with every feature in `targets` that matches
/// `selection` and reaches into `extent`. The feature itself is never
/// a target.
pub fn add_target_intersection_crack_points(
    info: &mut FeatureVertexInfo,
    targets: &[Feature],
    selection: TargetFeatureSelection,
    calculator: &CrackPointCalculator,
    extent: Option<&Envelope>,
) -> Result<()> {
    for target in targets {
        if target.id == info.feature_id() || !selection_matches(selection, target) {
            continue;
        }
        if let Some(extent) = extent {
            match target.geometry.envelope() {
                Some(envelope) if envelope.overlaps(extent) => {}
                _ => continue,
            }
        }
        add_crack_points(info, &target.geometry, calculator)?;
    }
    Ok(())
}

/// Adds the crack points between the parts of `info`'s own geometry.
///
/// Every part is intersected with every other part; the candidates are
/// then evaluated against the whole geometry.
pub fn add_geometry_part_intersection_crack_points(
    info: &mut FeatureVertexInfo,
    calculator: &CrackPointCalculator,
) -> Result<()> {
    let geometry = info.geometry().clone();
    let count = geometry.parts().len();
    if count < 2 {
        return Ok(());
    }
    let parts: Vec<Geometry> = (0..count).filter_map(|i| geometry.part(i)).collect();

    let mut found = Intersections::default();
    for (i, source) in parts.iter().enumerate() {
        for (j, target) in parts.iter().enumerate() {
            if i == j || calculator.cannot_intersect(source, target) {
                continue;
            }
            found.extend_with_offset(calculator.intersection_points(source, target)?, i);
        }
    }
    if found.points.is_empty() {
        return Ok(());
    }
    let snap_target = calculator.transform_target(&geometry);
    let crack_points = calculator.determine_crack_points(&found.points, &geometry, Some(&snap_target));
    debug!(
        "{}: {} crack points between {count} parts",
        info.feature_id(),
        crack_points.len()
    );
    record(info, crack_points, &found, calculator.options().use_source_zs);
    Ok(())
}

/// Calculates the crack points of `features`.
///
/// With [`TargetFeatureSelection::SelectedFeatures`] the features are
/// compared with each other: both of each pair are cracked in
/// [`CrackMode::Symmetrical`], only the earlier one otherwise. Any other
/// selection compares each feature with the matching `targets`, which
/// must then be given. A feature that fails is logged, reported in
/// [`CrackOutcome::failures`] and left out of the infos.
pub fn calculate_feature_vertex_infos(
    features: &[Feature],
    targets: Option<&[Feature]>,
    calculator: &CrackPointCalculator,
    mode: CrackMode,
) -> Result<CrackOutcome> {
    let options = calculator.options();
    let selection = options.target_feature_selection;
    let extent = options.extent.as_ref();

    let mut infos: Vec<Option<FeatureVertexInfo>> =
        features.iter().map(|f| create_feature_vertex_info(f, options)).collect();
    // Pairs of selected features compare regardless of their state
    let target_selection = match selection {
        TargetFeatureSelection::SelectedFeatures => TargetFeatureSelection::AllFeatures,
        other => other,
    };
    let mut failures: Vec<(FeatureId, CrackError)> = vec![];
    let mut crack = |index: usize, infos: &mut Vec<Option<FeatureVertexInfo>>, targets: &[Feature]| {
        let result = match &mut infos[index] {
            Some(info) => add_target_intersection_crack_points(info, targets, target_selection, calculator, extent),
            None => Ok(()),
        };
        if let Err(e) = result {
            let id = features[index].id;
            warn!("{id}: skipped, {e}");
            infos[index] = None;
            failures.push((id, e));
        }
    };

    if selection == TargetFeatureSelection::SelectedFeatures {
        for i in 0..features.len() {
            for j in i + 1..features.len() {
                crack(i, &mut infos, std::slice::from_ref(&features[j]));
                if mode == CrackMode::Symmetrical {
                    crack(j, &mut infos, std::slice::from_ref(&features[i]));
                }
            }
        }
    } else if let Some(targets) = targets {
        for i in 0..features.len() {
            crack(i, &mut infos, targets);
        }
    } else {
        return Err(CrackError::invalid(format!("{selection:?} requires target features")));
    }

    let infos: Vec<FeatureVertexInfo> = infos.into_iter().flatten().collect();
    info!(
        "calculated crack points for {} features ({} failed)",
        infos.len(),
        failures.len()
    );
    Ok(CrackOutcome { infos, failures })
}

/// Fills the points to delete of every info with the vertices that
/// weeding within `tolerance` would remove, except the intersection and
/// crack points. Z-aware geometries are weeded in 3D.
pub fn add_unnecessary_vertices_to_delete(
    infos: &mut [FeatureVertexInfo],
    tolerance: f64,
    extent: Option<&Envelope>,
) -> Vec<(FeatureId, CrackError)> {
    let mut failures = vec![];
    for info in infos.iter_mut() {
        let ignore_z = !info.geometry().is_z_aware();
        match weed_points(info.geometry(), tolerance, ignore_z, extent, info.linearize_segments) {
            Ok(weeded) => {
                let protect = tolerance.max(info.snap_tolerance().unwrap_or(0.));
                let deletable: Vec<_> = weeded.into_iter().filter(|p| !info.is_protected(p, protect)).collect();
                debug!("{}: {} vertices to delete", info.feature_id(), deletable.len());
                info.set_points_to_delete(deletable);
            }
            Err(e) => {
                warn!("{}: not weeded, {e}", info.feature_id());
                failures.push((info.feature_id(), e));
            }
        }
    }
    failures
}

/// Reads the features `selected` of `store`, and the targets matching
/// the target selection of `options` unless the selected features are
/// compared with each other.
pub(crate) fn load_features<S: FeatureStore>(
    store: &S,
    selected: &[FeatureId],
    options: &CrackerOptions,
) -> Result<(Vec<Feature>, Option<Vec<Feature>>)> {
    let features = store.get_features(&FeatureFilter::ids(selected))?;
    if let Some(missing) = selected.iter().find(|id| !features.iter().any(|f| f.id == **id)) {
        return Err(CrackError::FeatureNotFound(*missing));
    }

    let selection = options.target_feature_selection;
    let targets = match selection {
        TargetFeatureSelection::SelectedFeatures => None,
        _ => Some(store.get_features(&FeatureFilter {
            ids: None,
            extent: options.extent,
            selection: Some(selection),
        })?),
    };
    Ok((features, targets))
}

/// Cracks the features `selected` of `store` and writes the changed
/// geometries back.
///
/// Targets are the selected features themselves, or the features of the
/// store matching the configured target selection within the extent.
pub fn crack_features<S: FeatureStore>(
    store: &mut S,
    selected: &[FeatureId],
    options: &CrackerOptions,
    mode: CrackMode,
) -> Result<CrackSummary> {
    let calculator = CrackPointCalculator::new(options.clone())?;
    let (features, targets) = load_features(store, selected, calculator.options())?;

    let outcome = calculate_feature_vertex_infos(&features, targets.as_deref(), &calculator, mode)?;
    let mut result = BTreeMap::new();
    add_remove_points(&outcome.infos, &mut result, calculator.options().extent.as_ref());

    let mut summary = CrackSummary {
        updated: vec![],
        failures: outcome.failures,
    };
    for (id, geometry) in result {
        store.update_geometry(id, geometry)?;
        summary.updated.push(id);
    }
    info!("{} features updated", summary.updated.len());
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        apply::remove_points,
        calculator::tests::init_log,
        geometry::{Path, Ring, Vertex},
        options::{IntersectionPointOptions, TargetTransformation},
    };
    use approx::assert_relative_eq;
    use geo::{algorithm::area::Area, Coordinate, LineString, Polygon};

    fn ring(coords: &[(f64, f64)]) -> Ring {
        Ring::new(coords.iter().map(|&c| Vertex::from(c)).collect()).unwrap()
    }

    fn square(x0: f64, y0: f64, size: f64) -> Geometry {
        Geometry::Polygon(vec![ring(&[
            (x0, y0),
            (x0, y0 + size),
            (x0 + size, y0 + size),
            (x0 + size, y0),
            (x0, y0),
        ])])
    }

    fn area(geometry: &Geometry) -> f64 {
        let coords: Vec<Coordinate<f64>> = geometry.parts()[0].vertices().iter().map(Vertex::xy).collect();
        Polygon::new(LineString::from(coords), vec![]).unsigned_area()
    }

    fn overlapping_squares() -> InMemoryStore {
        vec![
            Feature::new(1, square(0., 0., 1000.)).selected(true),
            Feature::new(2, square(500., 500., 1000.)).selected(true),
        ]
        .into_iter()
        .collect()
    }

    fn selected_options() -> CrackerOptions {
        CrackerOptions {
            target_feature_selection: TargetFeatureSelection::SelectedFeatures,
            ..Default::default()
        }
    }

    #[test]
    fn test_overlapping_squares() {
        init_log();
        let store = overlapping_squares();
        let features = store.get_features(&FeatureFilter::default()).unwrap();
        let calculator = CrackPointCalculator::new(selected_options()).unwrap();

        let outcome =
            calculate_feature_vertex_infos(&features, None, &calculator, CrackMode::Asymmetrical).unwrap();
        assert!(outcome.failures.is_empty());
        assert_eq!(outcome.infos.len(), 2);
        assert_eq!(outcome.infos[0].crack_point_collection().map(<[_]>::len), Some(2));
        assert!(outcome.infos[1].crack_point_collection().is_none());

        let mut result = BTreeMap::new();
        assert_eq!(add_remove_points(&outcome.infos, &mut result, None), 1);
        let cracked = &result[&FeatureId(1)];
        assert_eq!(cracked.vertex_count(), 7);
        assert!(!cracked.has_degenerate_segments());
        assert_relative_eq!(area(cracked), 1_000_000.);
    }

    #[test]
    fn test_crack_features_symmetrical_and_idempotent() {
        let mut store = overlapping_squares();
        let ids = [FeatureId(1), FeatureId(2)];

        let summary = crack_features(&mut store, &ids, &selected_options(), CrackMode::Symmetrical).unwrap();
        assert_eq!(summary.updated, ids.to_vec());
        for id in ids.iter() {
            let geometry = &store.get(*id).unwrap().geometry;
            assert_eq!(geometry.vertex_count(), 7);
            assert_relative_eq!(area(geometry), 1_000_000.);
        }

        let summary = crack_features(&mut store, &ids, &selected_options(), CrackMode::Symmetrical).unwrap();
        assert!(summary.updated.is_empty());
    }

    #[test]
    fn test_visible_targets() {
        let mut store: InMemoryStore = vec![
            Feature::new(1, square(0., 0., 1000.)),
            Feature::new(2, square(500., 500., 1000.)).visible(false),
            Feature::new(3, square(-500., -500., 1000.)),
            Feature::new(4, Geometry::Point(Vertex::new(0., 300.))),
        ]
        .into_iter()
        .collect();

        let summary = crack_features(&mut store, &[FeatureId(1)], &CrackerOptions::default(), CrackMode::Asymmetrical)
            .unwrap();
        assert_eq!(summary.updated, vec![FeatureId(1)]);
        // Crossings with feature 3, and the visible point on the left edge
        assert_eq!(store.get(FeatureId(1)).unwrap().geometry.vertex_count(), 8);
        assert_eq!(store.get(FeatureId(3)).unwrap().geometry.vertex_count(), 5);

        let all = CrackerOptions {
            target_feature_selection: TargetFeatureSelection::AllFeatures,
            ..Default::default()
        };
        let summary = crack_features(&mut store, &[FeatureId(1)], &all, CrackMode::Asymmetrical).unwrap();
        assert_eq!(summary.updated, vec![FeatureId(1)]);
        assert_eq!(store.get(FeatureId(1)).unwrap().geometry.vertex_count(), 10);
    }

    #[test]
    fn test_targets_are_required() {
        let calculator = CrackPointCalculator::new(CrackerOptions::default()).unwrap();
        let features = overlapping_squares().get_features(&FeatureFilter::default()).unwrap();
        assert!(matches!(
            calculate_feature_vertex_infos(&features, None, &calculator, CrackMode::Symmetrical),
            Err(CrackError::InvalidArgument(_))
        ));

        let mut store = overlapping_squares();
        assert_eq!(
            crack_features(&mut store, &[FeatureId(9)], &selected_options(), CrackMode::Symmetrical).unwrap_err(),
            CrackError::FeatureNotFound(FeatureId(9))
        );
    }

    #[test]
    fn test_unnecessary_vertices_keep_intersections() {
        // (500, 1000) is where the other square crosses; (0, 300) is
        // redundant
        let source = Feature::new(
            1,
            Geometry::Polygon(vec![ring(&[
                (0., 0.),
                (0., 300.),
                (0., 1000.),
                (500., 1000.),
                (1000., 1000.),
                (1000., 0.),
                (0., 0.),
            ])]),
        )
        .selected(true);
        let other = Feature::new(2, square(500., 500., 1000.)).selected(true);
        let calculator = CrackPointCalculator::new(selected_options()).unwrap();

        let mut outcome =
            calculate_feature_vertex_infos(&[source, other], None, &calculator, CrackMode::Asymmetrical).unwrap();
        let failures = add_unnecessary_vertices_to_delete(&mut outcome.infos, 0.01, None);
        assert!(failures.is_empty());
        assert_eq!(outcome.infos[0].points_to_delete(), Some(&[Vertex::new(0., 300.)][..]));

        let mut result = BTreeMap::new();
        add_remove_points(&outcome.infos, &mut result, None);
        let cracked = result[&FeatureId(1)].parts()[0];
        assert_eq!(cracked.vertex_count(), 7);
        assert!(cracked.vertices().contains(&Vertex::new(500., 1000.)));
        assert!(cracked.vertices().contains(&Vertex::new(1000., 500.)));
        assert!(!cracked.vertices().contains(&Vertex::new(0., 300.)));
    }

    /// Two rings: a thin spike with its tip at the origin, and a triangle
    /// whose apex lies inside the spike, 0.05 from the tip and 0.0005 from
    /// both of its long edges.
    fn acute_multipatch() -> Geometry {
        let ring = |coords: &[(f64, f64, f64)]| Ring::new(coords.iter().map(|&c| Vertex::from(c)).collect()).unwrap();
        Geometry::Multipatch(vec![
            ring(&[(0., 0., 10.), (10., -0.1, 10.), (10., 0.1, 10.), (0., 0., 10.)]),
            ring(&[(0.05, 0., 10.), (2., -5., 10.), (-2., -5., 10.), (0.05, 0., 10.)]),
        ])
    }

    fn part_crack_points(tolerance: f64) -> FeatureVertexInfo {
        let options = CrackerOptions::default()
            .with_snap_tolerance(Some(tolerance))
            .with_minimum_segment_length(Some(tolerance))
            .with_use_source_zs(true)
            .with_target_transformation(Some(TargetTransformation::Vertices))
            .with_intersection_point_options(IntersectionPointOptions::EndpointsOnly);
        let calculator = CrackPointCalculator::new(options).unwrap();
        let feature = Feature::new(1, acute_multipatch());
        let mut info = create_feature_vertex_info(&feature, calculator.options()).unwrap();
        add_geometry_part_intersection_crack_points(&mut info, &calculator).unwrap();
        info
    }

    #[test]
    fn test_part_intersections_near_acute_angle() {
        init_log();
        // Tip and apex are within the snap tolerance: each ring gets the
        // other ring's vertex
        let coarse = part_crack_points(0.1);
        assert_eq!(coarse.crack_points().len(), 2);
        assert!(coarse.crack_points().iter().all(CrackPoint::is_crackable));
        let found: Vec<_> = coarse.crack_points().iter().map(|cp| (cp.source_part, cp.point.xy())).collect();
        assert!(found.contains(&(0, Coordinate { x: 0.05, y: 0. })));
        assert!(found.contains(&(1, Coordinate { x: 0., y: 0. })));

        // Only the apex is found, on both long edges of the spike
        let fine = part_crack_points(0.015);
        assert_eq!(fine.crack_points().len(), 1);
        let cp = fine.crack_points()[0];
        assert_eq!(cp.source_part, 0);
        assert_eq!(cp.point.xy(), Coordinate { x: 0.05, y: 0. });
        assert!(cp.violates_minimum_segment_length);
        assert!(cp.causes_cutback);
        assert!(fine.crack_point_collection().is_none());
        assert!(fine.non_crackable_points().is_none());

        let mut result = BTreeMap::new();
        assert_eq!(add_remove_points(&[fine], &mut result, None), 0);
        assert!(result.is_empty());
    }

    #[test]
    fn test_crack_points_within_xy_tolerance_are_applied() {
        // The target point is 0.005 off the left edge
        let mut store: InMemoryStore = vec![
            Feature::new(1, square(0., 0., 10.)),
            Feature::new(2, Geometry::Point(Vertex::new(0.005, 5.))),
        ]
        .into_iter()
        .collect();
        let options = CrackerOptions {
            xy_tolerance: 0.01,
            ..Default::default()
        };

        let summary = crack_features(&mut store, &[FeatureId(1)], &options, CrackMode::Asymmetrical).unwrap();
        assert_eq!(summary.updated, vec![FeatureId(1)]);
        let cracked = &store.get(FeatureId(1)).unwrap().geometry;
        assert_eq!(cracked.vertex_count(), 6);
        assert!(cracked.parts()[0].vertices().contains(&Vertex::new(0.005, 5.)));

        let summary = crack_features(&mut store, &[FeatureId(1)], &options, CrackMode::Asymmetrical).unwrap();
        assert!(summary.updated.is_empty());
    }

    #[test]
    fn test_failing_feature_does_not_stop_the_batch() {
        init_log();
        let mut store: InMemoryStore = vec![
            Feature::new(1, square(0., 0., 1000.)),
            Feature::new(2, square(5000., 5000., 1000.)),
            Feature::new(3, square(5500., 5500., 1000.)),
            Feature::new(4, Geometry::Point(Vertex::new_z(0., 300., f64::NAN))),
        ]
        .into_iter()
        .collect();
        let ids = [FeatureId(1), FeatureId(2)];

        let summary = crack_features(&mut store, &ids, &CrackerOptions::default(), CrackMode::Asymmetrical).unwrap();
        assert_eq!(summary.updated, vec![FeatureId(2)]);
        assert_eq!(summary.failures.len(), 1);
        assert_eq!(summary.failures[0].0, FeatureId(1));
        assert!(matches!(summary.failures[0].1, CrackError::InvalidArgument(_)));

        assert_eq!(store.get(FeatureId(1)).unwrap().geometry, square(0., 0., 1000.));
        assert_eq!(store.get(FeatureId(2)).unwrap().geometry.vertex_count(), 7);
    }

    /// A straight run with a redundant vertex, followed by a half circle.
    fn line_with_arc() -> Geometry {
        let path = Path::new(vec![
            Vertex::new(0., 0.),
            Vertex::new(5., 0.),
            Vertex::new(10., 0.),
            Vertex::new(30., 0.),
        ])
        .unwrap()
        .with_arc(2, Coordinate { x: 20., y: 10. })
        .unwrap();
        Geometry::Polyline(vec![path])
    }

    /// Weeds the linearized geometry, applies the deletions and returns
    /// the resulting vertex count.
    fn weed_linearized(geometry: Geometry, remove_only: bool) -> usize {
        let mut info = FeatureVertexInfo::from_geometry(FeatureId(1), geometry, None, None);
        info.linearize_segments = true;
        let failures = add_unnecessary_vertices_to_delete(std::slice::from_mut(&mut info), 0.5, None);
        assert!(failures.is_empty());
        let deleted = info.points_to_delete().unwrap();
        assert!(deleted.contains(&Vertex::new(5., 0.)));
        let expected = info.geometry().linearized().vertex_count() - deleted.len();

        let mut result = BTreeMap::new();
        let infos = [info];
        let changed = if remove_only {
            remove_points(&infos, &mut result, None)
        } else {
            add_remove_points(&infos, &mut result, None)
        };
        assert_eq!(changed, 1);
        let weeded = &result[&FeatureId(1)];
        assert!(!weeded.has_arcs());
        assert_eq!(weeded.vertex_count(), expected);
        expected
    }

    #[test]
    fn test_weeding_linearized_arcs() {
        init_log();
        let count = weed_linearized(line_with_arc(), true);
        assert!(count < line_with_arc().linearized().vertex_count() - 1);
        assert_eq!(weed_linearized(line_with_arc().reversed(), false), count);
        assert_eq!(weed_linearized(line_with_arc(), false), count);
    }

    #[test]
    fn test_point_features_are_skipped() {
        let options = CrackerOptions::default();
        let point = Feature::new(1, Geometry::Point(Vertex::new(0., 0.)));
        assert!(create_feature_vertex_info(&point, &options).is_none());

        let far = Feature::new(2, square(100., 100., 1.));
        assert!(create_feature_vertex_info(&far, &options).is_some());
        let extent = Envelope::new(Coordinate { x: 0., y: 0. }, Coordinate { x: 10., y: 10. });
        assert!(create_feature_vertex_info(&far, &options.clone().with_extent(Some(extent))).is_none());
    }

    #[test]
    fn test_created_features_get_new_ids() {
        let mut store = overlapping_squares();
        let template = store.get(FeatureId(2)).unwrap().clone();
        let id = store.create_feature(&template, square(0., 0., 1.)).unwrap();
        assert_eq!(id, FeatureId(3));
        let created = store.get(id).unwrap();
        assert!(created.selected);
        assert_eq!(created.geometry, square(0., 0., 1.));
        assert_eq!(store.len(), 3);
    }
}
