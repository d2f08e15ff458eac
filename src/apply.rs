//! Applying crack points and vertex deletions to geometries.
use std::collections::BTreeMap;

use log::{debug, info, warn};

use crate::{
    geometry::{EnvelopeExt, Envelope, Geometry, Path, Vertex},
    orchestrate::FeatureId,
    vertex_info::FeatureVertexInfo,
    CrackError, Result,
};

pub(crate) fn within_perimeter(points: Option<&[Vertex]>, perimeter: Option<&Envelope>) -> Vec<Vertex> {
    points
        .unwrap_or(&[])
        .iter()
        .filter(|p| perimeter.map_or(true, |e| e.covers(p.xy())))
        .copied()
        .collect()
}

/// The geometry to edit: the one already in `result`, or a copy of the
/// info's, linearized if the info asks for it.
fn working_geometry(info: &FeatureVertexInfo, result: &BTreeMap<FeatureId, Geometry>) -> Geometry {
    let geometry = result.get(&info.feature_id()).unwrap_or_else(|| info.geometry());
    if info.linearize_segments {
        geometry.linearized()
    } else {
        geometry.clone()
    }
}

/// Inserts the crack points and removes the deletable points of every
/// info, writing changed geometries into `result`.
///
/// A geometry already present in `result` is edited further, so several
/// passes can accumulate. Only points within `perimeter` are applied.
/// Points match vertices and segments within the search tolerance of the
/// info. Features whose geometry cannot take the edits are skipped with
/// a warning. Returns the number of features changed.
pub fn add_remove_points(
    infos: &[FeatureVertexInfo],
    result: &mut BTreeMap<FeatureId, Geometry>,
    perimeter: Option<&Envelope>,
) -> usize {
    let mut changed = 0;
    for info in infos {
        let id = info.feature_id();
        let to_add = within_perimeter(info.crack_point_collection(), perimeter);
        let to_remove = within_perimeter(info.points_to_delete(), perimeter);
        if to_add.is_empty() && to_remove.is_empty() {
            continue;
        }

        let mut geometry = working_geometry(info, result);
        match add_remove_points_in(
            &mut geometry,
            &to_add,
            &to_remove,
            info.search_tolerance(),
            info.xy_tolerance(),
        ) {
            Ok(true) => {
                debug!("{id}: {} points added, {} removed", to_add.len(), to_remove.len());
                result.insert(id, geometry);
                changed += 1;
            }
            Ok(false) => {}
            Err(e) => warn!("{id}: {e}"),
        }
    }
    info!("crack points applied to {changed} features");
    changed
}

/// Removes the deletable points of every info; see
/// [`add_remove_points`].
pub fn remove_points(
    infos: &[FeatureVertexInfo],
    result: &mut BTreeMap<FeatureId, Geometry>,
    perimeter: Option<&Envelope>,
) -> usize {
    let mut changed = 0;
    for info in infos {
        let id = info.feature_id();
        let to_remove = within_perimeter(info.points_to_delete(), perimeter);
        if to_remove.is_empty() {
            continue;
        }
        let mut geometry = working_geometry(info, result);
        match add_remove_points_in(&mut geometry, &[], &to_remove, info.search_tolerance(), info.xy_tolerance()) {
            Ok(true) => {
                debug!("{id}: {} points removed", to_remove.len());
                result.insert(id, geometry);
                changed += 1;
            }
            Ok(false) => {}
            Err(e) => warn!("{id}: {e}"),
        }
    }
    changed
}

/// Edits `geometry` in place. Returns whether anything changed.
///
/// In each part, a point within `search_tolerance` of an existing vertex
/// updates that vertex, including its Z. Otherwise it is inserted into
/// every segment of the part that passes within `search_tolerance`,
/// unless it would land on two adjacent segments. Points to remove
/// match vertices within `xy_tolerance`.
pub fn add_remove_points_in(
    geometry: &mut Geometry,
    to_add: &[Vertex],
    to_remove: &[Vertex],
    search_tolerance: f64,
    xy_tolerance: f64,
) -> Result<bool> {
    if geometry.is_point_like() {
        return Err(CrackError::UnsupportedGeometry(geometry.type_name()));
    }
    let mut changed = false;
    for point in to_add {
        for path in geometry.parts_mut() {
            changed |= crack_path(path, point, search_tolerance);
        }
    }
    for point in to_remove {
        for path in geometry.parts_mut() {
            changed |= remove_point(path, point, xy_tolerance.min(search_tolerance));
        }
    }
    Ok(changed)
}

/// Moves the nearest vertex within `tolerance` onto `point`, or else
/// inserts `point` into the segments it lies on.
pub(crate) fn crack_path(path: &mut Path, point: &Vertex, tolerance: f64) -> bool {
    match update_vertex(path, point, tolerance) {
        Some(updated) => updated,
        None => insert_point(path, point, tolerance),
    }
}

/// Index of the vertex of `path` nearest to `point`, within `tolerance`.
pub(crate) fn nearest_vertex(path: &Path, point: &Vertex, tolerance: f64) -> Option<usize> {
    path.vertex_indices_near(point.xy(), tolerance)
        .into_iter()
        .map(|i| (path.vertices()[i].distance_2d(point), i))
        .fold(None, |best: Option<(f64, usize)>, (d, i)| match best {
            Some((bd, _)) if bd <= d => best,
            _ => Some((d, i)),
        })
        .map(|(_, i)| i)
}

/// The vertices before and after `index`, wrapping around closed paths.
fn neighbours(path: &Path, index: usize) -> (Option<usize>, Option<usize>) {
    let n = path.vertex_count();
    if path.is_closed() && (index == 0 || index == n - 1) {
        (Some(n - 2), Some(1))
    } else {
        (index.checked_sub(1), Some(index + 1).filter(|&i| i < n))
    }
}

/// Moves the vertex nearest to `point` onto it. Returns `None` if no
/// vertex is within `tolerance`, otherwise whether the path changed.
fn update_vertex(path: &mut Path, point: &Vertex, tolerance: f64) -> Option<bool> {
    let index = nearest_vertex(path, point, tolerance)?;
    let current = path.vertices()[index];
    let updated = Vertex {
        z: point.z.or(current.z),
        ..*point
    };
    if updated == current {
        return Some(false);
    }
    let (prev, next) = neighbours(path, index);
    let collapses = [prev, next]
        .iter()
        .flatten()
        .any(|&i| path.vertices()[i].xy() == updated.xy());
    if collapses {
        debug!("not moving vertex {index} onto its neighbour at {:?}", updated.xy());
        return Some(false);
    }
    path.set_vertex(index, updated);
    Some(true)
}

fn insert_point(path: &mut Path, point: &Vertex, tolerance: f64) -> bool {
    let hosts: Vec<usize> = (0..path.segment_count())
        .filter(|&i| path.segment(i).interior_within(point.xy(), tolerance))
        .collect();
    if hosts.is_empty() {
        return false;
    }
    let count = path.segment_count();
    let closed = path.is_closed();
    let adjacent = hosts.windows(2).any(|w| w[1] == w[0] + 1)
        || (closed && count > 2 && hosts[0] == 0 && hosts[hosts.len() - 1] == count - 1);
    if adjacent {
        debug!("not inserting {point:?}: it would cut back");
        return false;
    }
    // Descending, so earlier segment indices stay valid
    for &i in hosts.iter().rev() {
        let segment = path.segment(i);
        let z = point
            .z
            .or_else(|| segment.z_at(segment.locate(point.xy()).0));
        path.insert_vertex(i, Vertex { z, ..*point });
    }
    true
}

fn remove_point(path: &mut Path, point: &Vertex, tolerance: f64) -> bool {
    let index = match nearest_vertex(path, point, tolerance) {
        Some(index) => index,
        None => return false,
    };
    if let (Some(prev), Some(next)) = neighbours(path, index) {
        if path.vertices()[prev].xy() == path.vertices()[next].xy() {
            debug!("not removing vertex {index}: its neighbours coincide");
            return false;
        }
    }
    path.remove_vertex(index)
}
