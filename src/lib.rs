//! Computes crack points between vector geometries and rewrites the
//! geometries so that touching features share coincident vertices.
//!
//! 1. [Crack Points](#crack-points)
//! 1. [Weeding](#weeding)
//! 1. [Applying](#applying)
//!
//! # Crack Points
//!
//! A crack point is a location where a vertex must be inserted into a
//! geometry so that it becomes topologically coincident with another
//! geometry. The [`CrackPointCalculator`] intersects a source geometry
//! with a target, snaps the raw intersections to nearby target
//! vertices, resolves the Z value and flags points that would create
//! short or degenerate segments.
//!
//! ## Usage
//!
//! ```rust
//! use geo_cracking::{CrackPointCalculator, CrackerOptions, Geometry, Ring, Vertex};
//!
//! let square = |x0: f64, y0: f64, size: f64| {
//!     Ring::new(vec![
//!         Vertex::new(x0, y0),
//!         Vertex::new(x0, y0 + size),
//!         Vertex::new(x0 + size, y0 + size),
//!         Vertex::new(x0 + size, y0),
//!         Vertex::new(x0, y0),
//!     ])
//!     .unwrap()
//! };
//! let source = Geometry::Polygon(vec![square(0., 0., 10.)]);
//! let target = Geometry::Polygon(vec![square(5., 5., 10.)]);
//!
//! let calculator = CrackPointCalculator::new(CrackerOptions::default()).unwrap();
//! let (crack_points, _) = calculator.get_intersection_points(&source, &target).unwrap();
//! // The two outlines cross twice
//! assert_eq!(crack_points.len(), 2);
//! ```
//!
//! Many-to-many comparisons and the per-feature aggregation
//! ([`FeatureVertexInfo`]) live in [`orchestrate`].
//!
//! # Weeding
//!
//! [`weed_points`] returns the vertices of a geometry that are redundant
//! within a tolerance. The result does not depend on the ring
//! orientation or on the start vertex.
//!
//! # Applying
//!
//! [`add_remove_points`] inserts the accepted crack points and deletes
//! the weeded points, preserving ring closure and never introducing
//! zero-length or cut-back segments. Lines can instead be cut into
//! separate features at their crack points, see [`chop`].
mod ordered;
pub use ordered::OrderedCoord;

mod error;
pub use error::{CrackError, Result};

pub mod geometry;
pub use geometry::{Envelope, Geometry, Path, Ring, Segment, Vertex};

mod curve;

mod line_or_point;
pub use line_or_point::LineOrPoint;

pub mod intersect;
pub use intersect::{IntersectionKind, IntersectionPoint, Intersections};

pub mod options;
pub use options::{
    CrackMode, CrackerOptions, IntersectionPointOptions, IntersectionStrategy,
    TargetFeatureSelection, TargetTransformation,
};

pub mod weed;
pub use weed::weed_points;

pub mod calculator;
pub use calculator::{CrackPoint, CrackPointCalculator};

pub mod vertex_info;
pub use vertex_info::FeatureVertexInfo;

pub mod apply;
pub use apply::{add_remove_points, remove_points};

pub mod chop;
pub use chop::{chop_features, split_polyline_feature};

pub mod orchestrate;
pub use orchestrate::{crack_features, Feature, FeatureFilter, FeatureId, FeatureStore, InMemoryStore};

#[cfg(test)]
#[path = "../benches/utils/random.rs"]
pub mod random;

pub(crate) mod utils;
