//! Owned vertex geometries.
//!
//! Geometries are a tagged variant over owned vertex arrays. Curve
//! parts are [`Path`]s whose segments are either straight or circular
//! arcs through an interior point; a [`Ring`] is a closed path.
use std::cmp::Ordering;
use std::ops::Deref;

use geo::{
    winding_order::{Winding, WindingOrder},
    Coordinate, Line, LineString, Rect,
};
use rstar::AABB;

use crate::{
    curve::{CircularArc, LINEARIZE_MAX_DEVIATION},
    utils::{distance, lerp, project_fraction},
    CrackError, OrderedCoord, Result,
};

/// Axis aligned bounding box used for extents and pruning.
pub type Envelope = Rect<f64>;

/// Envelope helpers that `Rect` does not provide.
pub trait EnvelopeExt {
    fn inflate(&self, by: f64) -> Self;
    fn overlaps(&self, other: &Self) -> bool;
    fn covers(&self, coord: Coordinate<f64>) -> bool;
    fn merge(&self, other: &Self) -> Self;
    fn to_aabb(&self) -> AABB<[f64; 2]>;
}

impl EnvelopeExt for Rect<f64> {
    fn inflate(&self, by: f64) -> Self {
        Rect::new(
            Coordinate {
                x: self.min().x - by,
                y: self.min().y - by,
            },
            Coordinate {
                x: self.max().x + by,
                y: self.max().y + by,
            },
        )
    }

    fn overlaps(&self, other: &Self) -> bool {
        self.min().x <= other.max().x
            && other.min().x <= self.max().x
            && self.min().y <= other.max().y
            && other.min().y <= self.max().y
    }

    fn covers(&self, coord: Coordinate<f64>) -> bool {
        coord.x >= self.min().x
            && coord.x <= self.max().x
            && coord.y >= self.min().y
            && coord.y <= self.max().y
    }

    fn merge(&self, other: &Self) -> Self {
        Rect::new(
            Coordinate {
                x: self.min().x.min(other.min().x),
                y: self.min().y.min(other.min().y),
            },
            Coordinate {
                x: self.max().x.max(other.max().x),
                y: self.max().y.max(other.max().y),
            },
        )
    }

    fn to_aabb(&self) -> AABB<[f64; 2]> {
        AABB::from_corners([self.min().x, self.min().y], [self.max().x, self.max().y])
    }
}

pub(crate) fn envelope_of<I: IntoIterator<Item = Coordinate<f64>>>(coords: I) -> Option<Envelope> {
    coords.into_iter().fold(None, |env, c| {
        let point = Rect::new(c, c);
        Some(match env {
            None => point,
            Some(env) => env.merge(&point),
        })
    })
}

/// A location with an optional elevation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vertex {
    pub x: f64,
    pub y: f64,
    pub z: Option<f64>,
}

impl Vertex {
    pub fn new(x: f64, y: f64) -> Self {
        Vertex { x, y, z: None }
    }

    pub fn new_z(x: f64, y: f64, z: f64) -> Self {
        Vertex { x, y, z: Some(z) }
    }

    #[inline]
    pub fn xy(&self) -> Coordinate<f64> {
        Coordinate {
            x: self.x,
            y: self.y,
        }
    }

    pub fn with_z(self, z: Option<f64>) -> Self {
        Vertex { z, ..self }
    }

    pub fn distance_2d(&self, other: &Vertex) -> f64 {
        distance(self.xy(), other.xy())
    }

    /// 3D distance, or the 2D distance if either vertex lacks Z.
    pub fn distance_3d(&self, other: &Vertex) -> f64 {
        match (self.z, other.z) {
            (Some(z1), Some(z2)) => {
                let d2 = self.distance_2d(other);
                (d2 * d2 + (z1 - z2) * (z1 - z2)).sqrt()
            }
            _ => self.distance_2d(other),
        }
    }

    pub fn equals_xy(&self, other: &Vertex, tolerance: f64) -> bool {
        self.distance_2d(other) <= tolerance
    }

    /// Whether the elevations agree. A missing Z agrees with anything.
    pub fn z_agrees(&self, other: &Vertex, z_tolerance: f64) -> bool {
        match (self.z, other.z) {
            (Some(z1), Some(z2)) => (z1 - z2).abs() <= z_tolerance,
            _ => true,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.map_or(true, f64::is_finite)
    }

    pub(crate) fn ordered(&self) -> OrderedCoord {
        self.xy().into()
    }

    /// Lexicographic order by x, y and then z (missing Z first).
    pub(crate) fn lex_cmp(&self, other: &Vertex) -> Ordering {
        self.ordered()
            .cmp(&other.ordered())
            .then_with(|| match (self.z, other.z) {
                (None, None) => Ordering::Equal,
                (None, Some(_)) => Ordering::Less,
                (Some(_), None) => Ordering::Greater,
                (Some(z1), Some(z2)) => z1.partial_cmp(&z2).unwrap_or(Ordering::Equal),
            })
    }
}

impl From<Coordinate<f64>> for Vertex {
    fn from(c: Coordinate<f64>) -> Self {
        Vertex::new(c.x, c.y)
    }
}

impl From<(f64, f64)> for Vertex {
    fn from((x, y): (f64, f64)) -> Self {
        Vertex::new(x, y)
    }
}

impl From<(f64, f64, f64)> for Vertex {
    fn from((x, y, z): (f64, f64, f64)) -> Self {
        Vertex::new_z(x, y, z)
    }
}

/// Sorts vertices lexicographically and removes exact duplicates.
pub(crate) fn sort_dedup(vertices: &mut Vec<Vertex>) {
    vertices.sort_by(|a, b| a.lex_cmp(b));
    vertices.dedup_by(|a, b| a.lex_cmp(b) == Ordering::Equal);
}

/// A segment of a path: a straight line, or a circular arc through an
/// interior point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    pub from: Vertex,
    pub to: Vertex,
    pub through: Option<Coordinate<f64>>,
}

impl Segment {
    pub fn line(from: Vertex, to: Vertex) -> Self {
        Segment {
            from,
            to,
            through: None,
        }
    }

    pub fn is_arc(&self) -> bool {
        self.through.is_some()
    }

    /// The straight line between the end points.
    pub fn chord(&self) -> Line<f64> {
        Line::new(self.from.xy(), self.to.xy())
    }

    /// The arc geometry, unless the segment is straight or the arc
    /// degenerates to a line.
    pub(crate) fn arc(&self) -> Option<CircularArc> {
        self.through
            .and_then(|through| CircularArc::new(self.from.xy(), through, self.to.xy()))
    }

    pub fn length_2d(&self) -> f64 {
        match self.arc() {
            Some(arc) => arc.length(),
            None => self.from.distance_2d(&self.to),
        }
    }

    /// Fraction along the segment of the location closest to `coord`, and
    /// the 2D distance to it.
    pub fn locate(&self, coord: Coordinate<f64>) -> (f64, f64) {
        match self.arc() {
            Some(arc) => arc.locate(coord),
            None => {
                let t = project_fraction(self.from.xy(), self.to.xy(), coord);
                (t, distance(lerp(self.from.xy(), self.to.xy(), t), coord))
            }
        }
    }

    pub fn distance_2d(&self, coord: Coordinate<f64>) -> f64 {
        self.locate(coord).1
    }

    pub fn z_at(&self, fraction: f64) -> Option<f64> {
        match (self.from.z, self.to.z) {
            (Some(z1), Some(z2)) => Some(z1 + (z2 - z1) * fraction),
            _ => None,
        }
    }

    pub fn point_at(&self, fraction: f64) -> Vertex {
        let xy = match self.arc() {
            Some(arc) => arc.point_at(fraction),
            None => lerp(self.from.xy(), self.to.xy(), fraction),
        };
        Vertex {
            x: xy.x,
            y: xy.y,
            z: self.z_at(fraction),
        }
    }

    /// Whether `coord` is within `tolerance` of the segment but not of
    /// either end point.
    pub fn interior_within(&self, coord: Coordinate<f64>, tolerance: f64) -> bool {
        distance(self.from.xy(), coord) > tolerance
            && distance(self.to.xy(), coord) > tolerance
            && self.distance_2d(coord) <= tolerance
    }

    /// Distance of `vertex` to the straight line between the end points,
    /// in 3D when both the vertex and the end points carry Z.
    pub(crate) fn chord_distance(&self, vertex: &Vertex, ignore_z: bool) -> f64 {
        let t = project_fraction(self.from.xy(), self.to.xy(), vertex.xy());
        let foot = lerp(self.from.xy(), self.to.xy(), t);
        let d_xy = distance(foot, vertex.xy());
        if ignore_z {
            return d_xy;
        }
        match (self.z_at_line(vertex), vertex.z) {
            (Some(z1), Some(z2)) => (d_xy * d_xy + (z1 - z2) * (z1 - z2)).sqrt(),
            _ => d_xy,
        }
    }

    fn z_at_line(&self, vertex: &Vertex) -> Option<f64> {
        self.z_at(project_fraction(self.from.xy(), self.to.xy(), vertex.xy()))
    }

    pub fn envelope(&self) -> Envelope {
        match self.arc() {
            Some(arc) => arc.envelope(),
            None => Rect::new(self.from.xy(), self.to.xy()),
        }
    }
}

/// An open or closed sequence of at least two vertices.
#[derive(Debug, Clone, PartialEq)]
pub struct Path {
    vertices: Vec<Vertex>,
    // One entry per segment; `Some` holds the interior point of an arc.
    arcs: Vec<Option<Coordinate<f64>>>,
}

impl Path {
    pub fn new(vertices: Vec<Vertex>) -> Result<Self> {
        if vertices.len() < 2 {
            return Err(CrackError::invalid(format!(
                "a path requires at least 2 vertices, got {}",
                vertices.len()
            )));
        }
        if let Some(v) = vertices.iter().find(|v| !v.is_finite()) {
            return Err(CrackError::invalid(format!("non-finite vertex {v:?}")));
        }
        let arcs = vec![None; vertices.len() - 1];
        Ok(Path { vertices, arcs })
    }

    /// Turns segment `segment` into a circular arc through `through`.
    pub fn with_arc(mut self, segment: usize, through: Coordinate<f64>) -> Result<Self> {
        if segment >= self.arcs.len() {
            return Err(CrackError::invalid(format!(
                "segment {segment} out of range for a path of {} segments",
                self.arcs.len()
            )));
        }
        if !(through.x.is_finite() && through.y.is_finite()) {
            return Err(CrackError::invalid("non-finite arc interior point"));
        }
        self.arcs[segment] = Some(through);
        Ok(self)
    }

    #[inline]
    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn segment_count(&self) -> usize {
        self.arcs.len()
    }

    pub fn segment(&self, index: usize) -> Segment {
        Segment {
            from: self.vertices[index],
            to: self.vertices[index + 1],
            through: self.arcs[index],
        }
    }

    pub fn segments(&self) -> impl Iterator<Item = Segment> + '_ {
        (0..self.segment_count()).map(move |i| self.segment(i))
    }

    pub fn start(&self) -> Vertex {
        self.vertices[0]
    }

    pub fn end(&self) -> Vertex {
        self.vertices[self.vertices.len() - 1]
    }

    pub fn is_closed(&self) -> bool {
        self.vertices.len() >= 3 && self.start().xy() == self.end().xy()
    }

    pub fn has_arcs(&self) -> bool {
        self.arcs.iter().any(Option::is_some)
    }

    pub fn is_z_aware(&self) -> bool {
        self.vertices.iter().all(|v| v.z.is_some())
    }

    pub fn reversed(&self) -> Path {
        let mut vertices = self.vertices.clone();
        vertices.reverse();
        let mut arcs = self.arcs.clone();
        arcs.reverse();
        Path { vertices, arcs }
    }

    /// Replaces every arc by a deterministic sequence of straight segments.
    pub fn linearized(&self) -> Path {
        if !self.has_arcs() {
            return self.clone();
        }
        let mut vertices = Vec::with_capacity(self.vertices.len());
        vertices.push(self.vertices[0]);
        for segment in self.segments() {
            if let Some(arc) = segment.arc() {
                for (fraction, xy) in arc.densify(LINEARIZE_MAX_DEVIATION) {
                    vertices.push(Vertex {
                        x: xy.x,
                        y: xy.y,
                        z: segment.z_at(fraction),
                    });
                }
            }
            vertices.push(segment.to);
        }
        let arcs = vec![None; vertices.len() - 1];
        Path { vertices, arcs }
    }

    pub fn envelope(&self) -> Envelope {
        self.segments()
            .map(|s| s.envelope())
            .fold(Rect::new(self.start().xy(), self.start().xy()), |a, b| {
                a.merge(&b)
            })
    }

    pub fn length_2d(&self) -> f64 {
        self.segments().map(|s| s.length_2d()).sum()
    }

    /// The vertices `from..=to` with their segments. Requires
    /// `from < to < vertex_count()`.
    pub(crate) fn sub_path(&self, from: usize, to: usize) -> Path {
        Path {
            vertices: self.vertices[from..=to].to_vec(),
            arcs: self.arcs[from..to].to_vec(),
        }
    }

    /// Splits the path at the vertices `at`, ignoring the end points.
    pub(crate) fn split_at(&self, at: &[usize]) -> Vec<Path> {
        let last = self.vertices.len() - 1;
        let mut cuts: Vec<usize> = at.iter().copied().filter(|&i| i > 0 && i < last).collect();
        cuts.sort_unstable();
        cuts.dedup();
        let mut pieces = Vec::with_capacity(cuts.len() + 1);
        let mut from = 0;
        for to in cuts.into_iter().chain(std::iter::once(last)) {
            pieces.push(self.sub_path(from, to));
            from = to;
        }
        pieces
    }

    pub fn winding_order(&self) -> Option<WindingOrder> {
        let ls: LineString<f64> = self.vertices.iter().map(|v| v.xy()).collect();
        ls.winding_order()
    }

    /// Whether the path contains a zero-length segment, or a segment that
    /// doubles back exactly onto its predecessor.
    pub fn has_degenerate_segments(&self) -> bool {
        let n = self.segment_count();
        let zero_length = self
            .segments()
            .any(|s| s.through.is_none() && s.from.xy() == s.to.xy());
        if zero_length {
            return true;
        }
        let cut_back = |i: usize, j: usize| {
            let (a, b) = (self.segment(i), self.segment(j));
            a.through.is_none() && b.through.is_none() && a.from.xy() == b.to.xy()
        };
        (1..n).any(|i| cut_back(i - 1, i)) || (self.is_closed() && n > 1 && cut_back(n - 1, 0))
    }

    pub(crate) fn vertex_indices_near(&self, coord: Coordinate<f64>, tolerance: f64) -> Vec<usize> {
        self.vertices
            .iter()
            .enumerate()
            .filter(|(_, v)| distance(v.xy(), coord) <= tolerance)
            .map(|(i, _)| i)
            .collect()
    }

    /// Replaces a vertex. Updating either end of a closed path updates
    /// both, so the path stays closed.
    pub(crate) fn set_vertex(&mut self, index: usize, vertex: Vertex) {
        let last = self.vertices.len() - 1;
        if self.is_closed() && (index == 0 || index == last) {
            self.vertices[0] = vertex;
            self.vertices[last] = vertex;
        } else {
            self.vertices[index] = vertex;
        }
    }

    /// Inserts `vertex` inside segment `segment`, splitting an arc into
    /// two arcs.
    pub(crate) fn insert_vertex(&mut self, segment: usize, vertex: Vertex) {
        let split = self.segment(segment).arc().map(|arc| {
            let (fraction, _) = arc.locate(vertex.xy());
            arc.split(fraction)
        });
        match split {
            Some((first, second)) => {
                self.arcs[segment] = Some(first);
                self.arcs.insert(segment + 1, Some(second));
            }
            None => {
                self.arcs[segment] = None;
                self.arcs.insert(segment + 1, None);
            }
        }
        self.vertices.insert(segment + 1, vertex);
    }

    /// Removes a vertex, merging the adjacent segments into a straight
    /// one. Returns `false` if the path would become too short (two
    /// vertices for open paths, four for closed ones).
    pub(crate) fn remove_vertex(&mut self, index: usize) -> bool {
        let closed = self.is_closed();
        let min_count = if closed { 4 } else { 2 };
        if self.vertices.len() <= min_count {
            return false;
        }
        let last = self.vertices.len() - 1;
        if closed && (index == 0 || index == last) {
            self.vertices.remove(0);
            self.arcs.remove(0);
            let new_last = self.vertices.len() - 1;
            self.vertices[new_last] = self.vertices[0];
            let arc_last = self.arcs.len() - 1;
            self.arcs[arc_last] = None;
        } else if index == 0 {
            self.vertices.remove(0);
            self.arcs.remove(0);
        } else if index == last {
            self.vertices.pop();
            self.arcs.pop();
        } else {
            self.vertices.remove(index);
            self.arcs.remove(index);
            self.arcs[index - 1] = None;
        }
        true
    }
}

/// A closed path of at least four vertices.
#[derive(Debug, Clone, PartialEq)]
pub struct Ring(Path);

impl Ring {
    pub fn new(vertices: Vec<Vertex>) -> Result<Self> {
        Ring::from_path(Path::new(vertices)?)
    }

    pub fn from_path(path: Path) -> Result<Self> {
        if path.vertex_count() < 4 {
            return Err(CrackError::invalid(format!(
                "a ring requires at least 4 vertices, got {}",
                path.vertex_count()
            )));
        }
        if !path.is_closed() {
            return Err(CrackError::invalid("ring is not closed"));
        }
        Ok(Ring(path))
    }

    pub fn path(&self) -> &Path {
        &self.0
    }

    pub(crate) fn path_mut(&mut self) -> &mut Path {
        &mut self.0
    }

    pub fn into_path(self) -> Path {
        self.0
    }

    pub fn reversed(&self) -> Ring {
        Ring(self.0.reversed())
    }

    pub fn linearized(&self) -> Ring {
        Ring(self.0.linearized())
    }
}

impl Deref for Ring {
    type Target = Path;

    fn deref(&self) -> &Path {
        &self.0
    }
}

/// A point, multipoint, polyline, polygon or multipatch geometry.
#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    Point(Vertex),
    Multipoint(Vec<Vertex>),
    Polyline(Vec<Path>),
    Polygon(Vec<Ring>),
    Multipatch(Vec<Ring>),
}

impl Geometry {
    pub fn type_name(&self) -> &'static str {
        match self {
            Geometry::Point(_) => "point",
            Geometry::Multipoint(_) => "multipoint",
            Geometry::Polyline(_) => "polyline",
            Geometry::Polygon(_) => "polygon",
            Geometry::Multipatch(_) => "multipatch",
        }
    }

    pub fn is_point_like(&self) -> bool {
        matches!(self, Geometry::Point(_) | Geometry::Multipoint(_))
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Geometry::Point(_) => false,
            Geometry::Multipoint(points) => points.is_empty(),
            Geometry::Polyline(paths) => paths.is_empty(),
            Geometry::Polygon(rings) | Geometry::Multipatch(rings) => rings.is_empty(),
        }
    }

    /// The curve parts: polyline paths, or the rings of polygons and
    /// multipatches. Empty for point geometries.
    pub fn parts(&self) -> Vec<&Path> {
        match self {
            Geometry::Point(_) | Geometry::Multipoint(_) => vec![],
            Geometry::Polyline(paths) => paths.iter().collect(),
            Geometry::Polygon(rings) | Geometry::Multipatch(rings) => {
                rings.iter().map(Ring::path).collect()
            }
        }
    }

    pub(crate) fn parts_mut(&mut self) -> Vec<&mut Path> {
        match self {
            Geometry::Point(_) | Geometry::Multipoint(_) => vec![],
            Geometry::Polyline(paths) => paths.iter_mut().collect(),
            Geometry::Polygon(rings) | Geometry::Multipatch(rings) => {
                rings.iter_mut().map(Ring::path_mut).collect()
            }
        }
    }

    pub fn part_count(&self) -> usize {
        match self {
            Geometry::Point(_) => 1,
            Geometry::Multipoint(points) => points.len(),
            Geometry::Polyline(paths) => paths.len(),
            Geometry::Polygon(rings) | Geometry::Multipatch(rings) => rings.len(),
        }
    }

    /// Part `index` as a geometry of its own, of the same type.
    pub fn part(&self, index: usize) -> Option<Geometry> {
        match self {
            Geometry::Point(p) => (index == 0).then(|| Geometry::Point(*p)),
            Geometry::Multipoint(points) => points.get(index).map(|p| Geometry::Point(*p)),
            Geometry::Polyline(paths) => paths.get(index).map(|p| Geometry::Polyline(vec![p.clone()])),
            Geometry::Polygon(rings) => rings.get(index).map(|r| Geometry::Polygon(vec![r.clone()])),
            Geometry::Multipatch(rings) => {
                rings.get(index).map(|r| Geometry::Multipatch(vec![r.clone()]))
            }
        }
    }

    /// Every stored vertex, including the closing vertex of rings.
    pub fn vertex_count(&self) -> usize {
        match self {
            Geometry::Point(_) => 1,
            Geometry::Multipoint(points) => points.len(),
            _ => self.parts().iter().map(|p| p.vertex_count()).sum(),
        }
    }

    /// The distinct vertex locations; the closing vertex of a ring is
    /// reported once.
    pub fn vertices(&self) -> Vec<Vertex> {
        match self {
            Geometry::Point(p) => vec![*p],
            Geometry::Multipoint(points) => points.clone(),
            _ => self
                .parts()
                .into_iter()
                .flat_map(|p| {
                    let n = if p.is_closed() {
                        p.vertex_count() - 1
                    } else {
                        p.vertex_count()
                    };
                    p.vertices()[..n].iter().copied()
                })
                .collect(),
        }
    }

    pub fn envelope(&self) -> Option<Envelope> {
        match self {
            Geometry::Point(p) => Some(Rect::new(p.xy(), p.xy())),
            Geometry::Multipoint(points) => envelope_of(points.iter().map(Vertex::xy)),
            _ => self
                .parts()
                .into_iter()
                .map(Path::envelope)
                .fold(None, |env, e| Some(env.map_or(e, |env: Envelope| env.merge(&e)))),
        }
    }

    pub fn has_arcs(&self) -> bool {
        self.parts().iter().any(|p| p.has_arcs())
    }

    pub fn is_z_aware(&self) -> bool {
        match self {
            Geometry::Point(p) => p.z.is_some(),
            Geometry::Multipoint(points) => points.iter().all(|p| p.z.is_some()),
            _ => self.parts().iter().all(|p| p.is_z_aware()),
        }
    }

    pub fn linearized(&self) -> Geometry {
        match self {
            Geometry::Polyline(paths) => Geometry::Polyline(paths.iter().map(Path::linearized).collect()),
            Geometry::Polygon(rings) => Geometry::Polygon(rings.iter().map(Ring::linearized).collect()),
            Geometry::Multipatch(rings) => {
                Geometry::Multipatch(rings.iter().map(Ring::linearized).collect())
            }
            point_like => point_like.clone(),
        }
    }

    pub fn reversed(&self) -> Geometry {
        match self {
            Geometry::Polyline(paths) => Geometry::Polyline(paths.iter().map(Path::reversed).collect()),
            Geometry::Polygon(rings) => Geometry::Polygon(rings.iter().map(Ring::reversed).collect()),
            Geometry::Multipatch(rings) => {
                Geometry::Multipatch(rings.iter().map(Ring::reversed).collect())
            }
            point_like => point_like.clone(),
        }
    }

    /// Whether any part has a zero-length or cut-back segment.
    pub fn has_degenerate_segments(&self) -> bool {
        self.parts().iter().any(|p| p.has_degenerate_segments())
    }
}
