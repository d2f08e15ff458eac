use geo::Coordinate;
use rstar::{RTree, RTreeObject, AABB};

use crate::{
    geometry::{EnvelopeExt, Envelope, Geometry, Segment, Vertex},
    utils::distance,
};

/// An item stored in an [`RTree`] together with a (possibly inflated)
/// envelope.
pub(crate) struct Indexed<T> {
    envelope: Envelope,
    pub item: T,
}

impl<T> Indexed<T> {
    pub fn new(envelope: Envelope, item: T) -> Self {
        Indexed { envelope, item }
    }
}

impl<T> RTreeObject for Indexed<T> {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope.to_aabb()
    }
}

/// A segment of a source part.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SourceSegment {
    pub part: usize,
    pub index: usize,
    pub segment: Segment,
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum TargetItem {
    Point(Vertex),
    Segment(Segment),
}

impl TargetItem {
    pub fn z_at(&self, coord: Coordinate<f64>) -> Option<f64> {
        match self {
            TargetItem::Point(v) => v.z,
            TargetItem::Segment(s) => s.z_at(s.locate(coord).0),
        }
    }
}

/// Indexes the segments of every part of `geometry`, with envelopes
/// inflated by `inflate`.
pub(crate) fn source_segments(geometry: &Geometry, inflate: f64) -> RTree<Indexed<SourceSegment>> {
    let items = geometry
        .parts()
        .into_iter()
        .enumerate()
        .flat_map(|(part, path)| {
            path.segments().enumerate().map(move |(index, segment)| {
                Indexed::new(
                    segment.envelope().inflate(inflate),
                    SourceSegment {
                        part,
                        index,
                        segment,
                    },
                )
            })
        })
        .collect();
    RTree::bulk_load(items)
}

/// Indexes the points of a point-like target, or the segments of a
/// curve target.
pub(crate) fn target_items(geometry: &Geometry) -> RTree<Indexed<TargetItem>> {
    let items = if geometry.is_point_like() {
        geometry
            .vertices()
            .into_iter()
            .map(|v| Indexed::new(Envelope::new(v.xy(), v.xy()), TargetItem::Point(v)))
            .collect()
    } else {
        geometry
            .parts()
            .into_iter()
            .flat_map(|path| path.segments())
            .map(|s| Indexed::new(s.envelope(), TargetItem::Segment(s)))
            .collect()
    };
    RTree::bulk_load(items)
}

/// A vertex with its position in the geometry.
#[derive(Debug, Clone, Copy)]
pub(crate) struct IndexedVertex {
    pub part: usize,
    pub index: usize,
    pub vertex: Vertex,
}

/// Vertex lookup by distance.
pub(crate) struct VertexIndex {
    tree: RTree<Indexed<IndexedVertex>>,
}

impl VertexIndex {
    /// Indexes every stored vertex of the curve parts, or the points of a
    /// point-like geometry.
    pub fn new(geometry: &Geometry) -> Self {
        let items: Vec<_> = if geometry.is_point_like() {
            geometry
                .vertices()
                .into_iter()
                .enumerate()
                .map(|(index, vertex)| IndexedVertex {
                    part: 0,
                    index,
                    vertex,
                })
                .collect()
        } else {
            geometry
                .parts()
                .into_iter()
                .enumerate()
                .flat_map(|(part, path)| {
                    path.vertices()
                        .iter()
                        .enumerate()
                        .map(move |(index, &vertex)| IndexedVertex {
                            part,
                            index,
                            vertex,
                        })
                })
                .collect()
        };
        let items = items
            .into_iter()
            .map(|v| Indexed::new(Envelope::new(v.vertex.xy(), v.vertex.xy()), v))
            .collect();
        VertexIndex {
            tree: RTree::bulk_load(items),
        }
    }

    /// Vertices within `tolerance` of `coord`, in the XY plane.
    pub fn within(&self, coord: Coordinate<f64>, tolerance: f64) -> Vec<IndexedVertex> {
        let query = Envelope::new(coord, coord).inflate(tolerance).to_aabb();
        let mut found: Vec<_> = self
            .tree
            .locate_in_envelope_intersecting(&query)
            .map(|i| i.item)
            .filter(|v| distance(v.vertex.xy(), coord) <= tolerance)
            .collect();
        found.sort_by(|a, b| (a.part, a.index).cmp(&(b.part, b.index)));
        found
    }

    /// The vertex closest to `coord` within `tolerance`; ties go to the
    /// first vertex in part order.
    pub fn nearest(&self, coord: Coordinate<f64>, tolerance: f64) -> Option<IndexedVertex> {
        self.within(coord, tolerance).into_iter().fold(None, |best, v| {
            let d = distance(v.vertex.xy(), coord);
            match best {
                Some((bd, _)) if bd <= d => best,
                _ => Some((d, v)),
            }
        })
        .map(|(_, v)| v)
    }
}

/// Segment lookup by distance.
pub(crate) struct SegmentIndex {
    tree: RTree<Indexed<SourceSegment>>,
    closed: Vec<(bool, usize)>,
}

impl SegmentIndex {
    pub fn new(geometry: &Geometry) -> Self {
        SegmentIndex {
            tree: source_segments(geometry, 0.),
            closed: geometry
                .parts()
                .into_iter()
                .map(|p| (p.is_closed(), p.segment_count()))
                .collect(),
        }
    }

    /// Segments within `tolerance` of `coord`, sorted by part and index.
    pub fn within(&self, coord: Coordinate<f64>, tolerance: f64) -> Vec<SourceSegment> {
        let query = Envelope::new(coord, coord).inflate(tolerance).to_aabb();
        let mut found: Vec<_> = self
            .tree
            .locate_in_envelope_intersecting(&query)
            .map(|i| i.item)
            .filter(|s| s.segment.distance_2d(coord) <= tolerance)
            .collect();
        found.sort_by(|a, b| (a.part, a.index).cmp(&(b.part, b.index)));
        found
    }

    /// Whether two segments of the same part follow each other, including
    /// the wrap-around of closed parts.
    pub fn adjacent(&self, a: &SourceSegment, b: &SourceSegment) -> bool {
        if a.part != b.part {
            return false;
        }
        let (closed, count) = self.closed[a.part];
        let (lo, hi) = if a.index < b.index {
            (a.index, b.index)
        } else {
            (b.index, a.index)
        };
        hi == lo + 1 || (closed && count > 2 && lo == 0 && hi == count - 1)
    }
}
