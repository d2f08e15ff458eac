//! Chopping polylines at their crack points.
//!
//! Instead of inserting the crack points as vertices, a chopped line is
//! cut into separate features at each of them. The cuts are ordered so
//! that every split takes the shorter end off the remaining line, which
//! keeps the original feature on its longest piece.
use std::collections::BTreeMap;

use log::{debug, info, warn};

use crate::{
    apply::{crack_path, nearest_vertex, within_perimeter},
    calculator::CrackPointCalculator,
    geometry::{Envelope, Geometry, Path, Vertex},
    options::{CrackMode, CrackerOptions},
    orchestrate::{calculate_feature_vertex_infos, load_features, FeatureFilter, FeatureId, FeatureStore},
    vertex_info::FeatureVertexInfo,
    CrackError, Result,
};

/// Result of [`chop_features`].
#[derive(Debug, Clone, Default)]
pub struct ChopSummary {
    /// Features created from chopped-off pieces, in creation order.
    pub created: Vec<FeatureId>,
    /// Features that were shortened.
    pub split: Vec<FeatureId>,
    pub failures: Vec<(FeatureId, CrackError)>,
}

fn single_path(geometry: &Geometry) -> Result<&Path> {
    match geometry {
        Geometry::Polyline(paths) if paths.len() == 1 => Ok(&paths[0]),
        Geometry::Polyline(paths) => Err(CrackError::invalid(format!(
            "only single-part polylines can be split, got {} parts",
            paths.len()
        ))),
        other => Err(CrackError::UnsupportedGeometry(other.type_name())),
    }
}

fn polyline_parts(geometry: &Geometry) -> Result<&[Path]> {
    match geometry {
        Geometry::Polyline(paths) => Ok(paths),
        other => Err(CrackError::UnsupportedGeometry(other.type_name())),
    }
}

/// Cracks a copy of `path` at `points` and cuts it at the cracked
/// vertices. Points farther than `tolerance` from the path are ignored.
fn split_path(path: &Path, points: &[Vertex], tolerance: f64) -> Vec<Path> {
    let mut cracked = path.clone();
    for point in points {
        crack_path(&mut cracked, point, tolerance);
    }
    let at: Vec<usize> = points
        .iter()
        .filter_map(|p| nearest_vertex(&cracked, p, tolerance))
        .collect();
    cracked.split_at(&at)
}

/// The crack points of every polyline info within `perimeter`, keyed by
/// feature. Infos without crack points are left out.
pub fn get_split_points(
    infos: &[FeatureVertexInfo],
    perimeter: Option<&Envelope>,
) -> Result<BTreeMap<FeatureId, Vec<Vertex>>> {
    let mut result = BTreeMap::new();
    for info in infos {
        polyline_parts(info.geometry())?;
        let points = within_perimeter(info.crack_point_collection(), perimeter);
        if !points.is_empty() {
            result.insert(info.feature_id(), points);
        }
    }
    Ok(result)
}

/// Orders `chop_points` so that splitting `polyline` at them one after
/// the other always cuts off the shorter end of what remains.
///
/// Points that do not lie on the line within `tolerance` are dropped,
/// and so are points on its end points.
pub fn get_ordered_chop_points(chop_points: &[Vertex], polyline: &Geometry, tolerance: f64) -> Result<Vec<Vertex>> {
    let path = single_path(polyline)?;
    let pieces = split_path(path, chop_points, tolerance);

    let mut ordered = Vec::with_capacity(pieces.len() - 1);
    let (mut first, mut last) = (0, pieces.len() - 1);
    while first < last {
        if pieces[first].length_2d() < pieces[last].length_2d() {
            ordered.push(pieces[first].end());
            first += 1;
        } else {
            ordered.push(pieces[last].start());
            last -= 1;
        }
    }
    Ok(ordered)
}

/// The pieces of every polyline info cut at its crack points within
/// `perimeter`, one single-part polyline per piece. Infos without crack
/// points are left out.
pub fn get_split_line_geometries(
    infos: &[FeatureVertexInfo],
    perimeter: Option<&Envelope>,
) -> Result<BTreeMap<FeatureId, Vec<Geometry>>> {
    let mut result = BTreeMap::new();
    for info in infos {
        let parts = polyline_parts(info.geometry())?;
        let points = within_perimeter(info.crack_point_collection(), perimeter);
        if points.is_empty() {
            continue;
        }
        let tolerance = info.search_tolerance();
        let pieces: Vec<Geometry> = parts
            .iter()
            .map(|part| {
                if info.linearize_segments {
                    part.linearized()
                } else {
                    part.clone()
                }
            })
            .flat_map(|part| split_path(&part, &points, tolerance))
            .map(|piece| Geometry::Polyline(vec![piece]))
            .collect();
        debug!("{}: {} pieces", info.feature_id(), pieces.len());
        result.insert(info.feature_id(), pieces);
    }
    Ok(result)
}

/// Splits the polyline feature `id` at `split_point` and stores the
/// shorter piece as a new feature, which inherits the other attributes.
///
/// With `project` the split vertex is moved onto the line; otherwise it
/// keeps its location and the two pieces meet at a kink. A split point
/// within `tolerance` of an existing vertex splits at that vertex.
/// Returns the new feature and the shortened one, or `None` if the point
/// falls on an end of the line.
pub fn split_polyline_feature<S: FeatureStore>(
    store: &mut S,
    id: FeatureId,
    split_point: &Vertex,
    project: bool,
    tolerance: f64,
) -> Result<Option<(FeatureId, FeatureId)>> {
    let feature = store
        .get_features(&FeatureFilter::ids(&[id]))?
        .into_iter()
        .next()
        .ok_or(CrackError::FeatureNotFound(id))?;
    let path = single_path(&feature.geometry)?;

    let mut cracked = path.clone();
    let at = match nearest_vertex(path, split_point, tolerance) {
        Some(index) => index,
        None => {
            let (_, host) = path
                .segments()
                .enumerate()
                .map(|(i, s)| (s.distance_2d(split_point.xy()), i))
                .fold((f64::INFINITY, 0), |best, next| if next.0 < best.0 { next } else { best });
            let segment = path.segment(host);
            let on_line = segment.point_at(segment.locate(split_point.xy()).0);
            let vertex = if project {
                on_line
            } else {
                split_point.with_z(split_point.z.or(on_line.z))
            };
            cracked.insert_vertex(host, vertex);
            host + 1
        }
    };

    let (first, second) = match cracked.split_at(&[at]).as_slice() {
        [first, second] => (first.clone(), second.clone()),
        _ => {
            debug!("{id}: {split_point:?} is an end point, not split");
            return Ok(None);
        }
    };
    let (shorter, longer) = if first.length_2d() < second.length_2d() {
        (first, second)
    } else {
        (second, first)
    };
    let created = store.create_feature(&feature, Geometry::Polyline(vec![shorter]))?;
    store.update_geometry(id, Geometry::Polyline(vec![longer]))?;
    debug!("{id}: split at {split_point:?} into {created}");
    Ok(Some((created, id)))
}

/// Chops the polyline features `selected` of `store` at their crack
/// points with the targets of `options`.
///
/// Crack points on existing vertices count as well. Non-linear features
/// are ignored; features that cannot be chopped are reported in
/// [`ChopSummary::failures`].
pub fn chop_features<S: FeatureStore>(
    store: &mut S,
    selected: &[FeatureId],
    options: &CrackerOptions,
    mode: CrackMode,
) -> Result<ChopSummary> {
    let options = options.clone().with_crack_points_on_existing_vertices(true);
    let calculator = CrackPointCalculator::new(options)?;
    let (mut features, targets) = load_features(store, selected, calculator.options())?;
    features.retain(|f| {
        let linear = matches!(f.geometry, Geometry::Polyline(_));
        if !linear {
            debug!("{}: {} features are not chopped", f.id, f.geometry.type_name());
        }
        linear
    });

    let outcome = calculate_feature_vertex_infos(&features, targets.as_deref(), &calculator, mode)?;
    let mut summary = ChopSummary {
        failures: outcome.failures,
        ..Default::default()
    };
    let perimeter = calculator.options().extent;
    for info in &outcome.infos {
        let id = info.feature_id();
        let points = within_perimeter(info.crack_point_collection(), perimeter.as_ref());
        if points.is_empty() {
            continue;
        }
        let tolerance = info.search_tolerance();
        let ordered = match get_ordered_chop_points(&points, info.geometry(), tolerance) {
            Ok(ordered) => ordered,
            Err(e) => {
                warn!("{id}: not chopped, {e}");
                summary.failures.push((id, e));
                continue;
            }
        };
        let before = summary.created.len();
        for point in &ordered {
            if let Some((created, _)) = split_polyline_feature(store, id, point, true, tolerance)? {
                summary.created.push(created);
            }
        }
        if summary.created.len() > before {
            summary.split.push(id);
        }
    }
    info!(
        "{} features chopped into {} new features",
        summary.split.len(),
        summary.created.len()
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        calculator::{tests::init_log, CrackPoint},
        geometry::Ring,
        options::TargetFeatureSelection,
        orchestrate::{Feature, InMemoryStore},
    };

    fn line(coords: &[(f64, f64)]) -> Geometry {
        Geometry::Polyline(vec![Path::new(coords.iter().map(|&c| Vertex::from(c)).collect()).unwrap()])
    }

    fn points(coords: &[(f64, f64)]) -> Vec<Vertex> {
        coords.iter().map(|&c| Vertex::from(c)).collect()
    }

    fn info_with_cracks(id: u64, geometry: Geometry, cracks: &[(f64, f64)]) -> FeatureVertexInfo {
        let mut info = FeatureVertexInfo::from_geometry(FeatureId(id), geometry, None, None);
        info.add_crack_points(cracks.iter().map(|&(x, y)| CrackPoint {
            point: Vertex::new(x, y),
            source_part: 0,
            source_segment: 0,
            violates_minimum_segment_length: false,
            is_on_existing_vertex: false,
            causes_cutback: false,
            target_vertex_different_in_z: false,
        }));
        info
    }

    #[test]
    fn test_ordered_chop_points() {
        let polyline = line(&[(0., 0.), (100., 0.)]);
        let chop = points(&[(10., 0.), (60., 0.), (90., 0.)]);
        let ordered = get_ordered_chop_points(&chop, &polyline, 0.001).unwrap();
        assert_eq!(ordered, points(&[(90., 0.), (10., 0.), (60., 0.)]));

        // End points and points off the line do not chop
        let chop = points(&[(0., 0.), (50., 5.), (100., 0.)]);
        assert!(get_ordered_chop_points(&chop, &polyline, 0.001).unwrap().is_empty());
    }

    #[test]
    fn test_only_single_part_lines_are_chopped() {
        let two_parts = Geometry::Polyline(vec![
            Path::new(points(&[(0., 0.), (10., 0.)])).unwrap(),
            Path::new(points(&[(0., 5.), (10., 5.)])).unwrap(),
        ]);
        let chop = points(&[(5., 0.)]);
        assert!(matches!(
            get_ordered_chop_points(&chop, &two_parts, 0.001),
            Err(CrackError::InvalidArgument(_))
        ));

        let polygon = Geometry::Polygon(vec![Ring::new(points(&[
            (0., 0.),
            (0., 10.),
            (10., 10.),
            (0., 0.),
        ]))
        .unwrap()]);
        assert_eq!(
            get_ordered_chop_points(&chop, &polygon, 0.001),
            Err(CrackError::UnsupportedGeometry("polygon"))
        );
        let infos = [info_with_cracks(1, polygon, &[(5., 5.)])];
        assert_eq!(
            get_split_points(&infos, None),
            Err(CrackError::UnsupportedGeometry("polygon"))
        );
        assert_eq!(
            get_split_line_geometries(&infos, None),
            Err(CrackError::UnsupportedGeometry("polygon"))
        );
    }

    #[test]
    fn test_split_points_and_line_geometries() {
        init_log();
        let infos = [
            info_with_cracks(1, line(&[(0., 0.), (100., 0.)]), &[(30., 0.), (80., 0.)]),
            info_with_cracks(2, line(&[(0., 10.), (100., 10.)]), &[]),
        ];

        let split_points = get_split_points(&infos, None).unwrap();
        assert_eq!(split_points.len(), 1);
        assert_eq!(split_points[&FeatureId(1)], points(&[(30., 0.), (80., 0.)]));

        let perimeter = Envelope::new((0., -1.), (50., 1.));
        let split_points = get_split_points(&infos, Some(&perimeter)).unwrap();
        assert_eq!(split_points[&FeatureId(1)], points(&[(30., 0.)]));

        let pieces = get_split_line_geometries(&infos, None).unwrap();
        assert_eq!(
            pieces[&FeatureId(1)],
            vec![
                line(&[(0., 0.), (30., 0.)]),
                line(&[(30., 0.), (80., 0.)]),
                line(&[(80., 0.), (100., 0.)]),
            ]
        );
        assert!(!pieces.contains_key(&FeatureId(2)));
    }

    #[test]
    fn test_split_polyline_feature() {
        let mut store: InMemoryStore = vec![Feature::new(1, line(&[(0., 0.), (100., 0.)]))]
            .into_iter()
            .collect();

        let split = split_polyline_feature(&mut store, FeatureId(1), &Vertex::new(25., 0.5), true, 0.001).unwrap();
        assert_eq!(split, Some((FeatureId(2), FeatureId(1))));
        assert_eq!(store.get(FeatureId(2)).unwrap().geometry, line(&[(0., 0.), (25., 0.)]));
        assert_eq!(store.get(FeatureId(1)).unwrap().geometry, line(&[(25., 0.), (100., 0.)]));

        // Without projection the pieces meet at the split point
        let split = split_polyline_feature(&mut store, FeatureId(1), &Vertex::new(90., 0.5), false, 0.001).unwrap();
        assert_eq!(split, Some((FeatureId(3), FeatureId(1))));
        assert_eq!(store.get(FeatureId(3)).unwrap().geometry, line(&[(90., 0.5), (100., 0.)]));
        assert_eq!(store.get(FeatureId(1)).unwrap().geometry, line(&[(25., 0.), (90., 0.5)]));

        // End points do not split
        let split = split_polyline_feature(&mut store, FeatureId(1), &Vertex::new(25., 0.), true, 0.001).unwrap();
        assert_eq!(split, None);
        assert_eq!(store.len(), 3);

        assert_eq!(
            split_polyline_feature(&mut store, FeatureId(9), &Vertex::new(50., 0.), true, 0.001),
            Err(CrackError::FeatureNotFound(FeatureId(9)))
        );
    }

    #[test]
    fn test_chop_features() {
        init_log();
        let mut store: InMemoryStore = vec![
            Feature::new(1, line(&[(0., 0.), (100., 0.)])),
            Feature::new(2, line(&[(30., -10.), (30., 10.)])),
            Feature::new(3, line(&[(80., -10.), (80., 10.)])),
        ]
        .into_iter()
        .collect();
        let options = CrackerOptions {
            target_feature_selection: TargetFeatureSelection::VisibleFeatures,
            ..Default::default()
        };

        let summary = chop_features(&mut store, &[FeatureId(1)], &options, CrackMode::Asymmetrical).unwrap();
        assert!(summary.failures.is_empty());
        assert_eq!(summary.created, vec![FeatureId(4), FeatureId(5)]);
        assert_eq!(summary.split, vec![FeatureId(1)]);
        assert_eq!(store.get(FeatureId(4)).unwrap().geometry, line(&[(80., 0.), (100., 0.)]));
        assert_eq!(store.get(FeatureId(5)).unwrap().geometry, line(&[(0., 0.), (30., 0.)]));
        assert_eq!(store.get(FeatureId(1)).unwrap().geometry, line(&[(30., 0.), (80., 0.)]));
        // Targets are left alone
        assert_eq!(store.get(FeatureId(2)).unwrap().geometry, line(&[(30., -10.), (30., 10.)]));

        // The pieces only touch the targets at their ends now
        let summary = chop_features(&mut store, &[FeatureId(1)], &options, CrackMode::Asymmetrical).unwrap();
        assert!(summary.created.is_empty());
        assert_eq!(store.len(), 5);
    }
}
