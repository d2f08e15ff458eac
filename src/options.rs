//! Configuration of the crack point calculation.
//!
//! [`CrackerOptions`] derives `serde` traits so that it can be loaded
//! from JSON or any other serde format. Missing fields take their
//! default values.
use serde::{Deserialize, Serialize};

use crate::{geometry::Envelope, CrackError, Result};

/// Default coordinate coincidence tolerance.
pub const DEFAULT_XY_TOLERANCE: f64 = 0.001;

/// Default elevation coincidence tolerance.
pub const DEFAULT_Z_TOLERANCE: f64 = 0.001;

/// Which points of a linear (overlapping) intersection become
/// candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IntersectionPointOptions {
    /// The two end points of every connected overlap.
    EndpointsOnly,
    /// Every source and target vertex along the overlap.
    AllPoints,
}

/// Which target features participate in a comparison pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TargetFeatureSelection {
    SelectedFeatures,
    VisibleFeatures,
    AllFeatures,
}

/// The segment intersection routine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IntersectionStrategy {
    /// Exact predicates, no tolerance.
    Native,
    /// Parametric intersection that also reports touching within the
    /// XY tolerance.
    Custom,
}

/// Reduction applied to the target before intersecting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TargetTransformation {
    /// Only the vertices of the target.
    Vertices,
    /// Only the end points of polyline paths.
    LineEndpoints,
}

/// Whether both features of a pair are cracked, or only the first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CrackMode {
    Symmetrical,
    Asymmetrical,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrackerOptions {
    pub snap_tolerance: Option<f64>,
    pub minimum_segment_length: Option<f64>,
    pub add_crack_points_on_existing_vertices: bool,
    pub use_source_zs: bool,
    pub intersection_point_options: IntersectionPointOptions,
    pub target_feature_selection: TargetFeatureSelection,
    pub extent: Option<Envelope>,
    pub intersection_strategy: IntersectionStrategy,
    pub target_transformation: Option<TargetTransformation>,
    pub xy_tolerance: f64,
    pub z_tolerance: f64,
}

impl Default for CrackerOptions {
    fn default() -> Self {
        CrackerOptions {
            snap_tolerance: None,
            minimum_segment_length: None,
            add_crack_points_on_existing_vertices: false,
            use_source_zs: false,
            intersection_point_options: IntersectionPointOptions::AllPoints,
            target_feature_selection: TargetFeatureSelection::VisibleFeatures,
            extent: None,
            intersection_strategy: IntersectionStrategy::Custom,
            target_transformation: None,
            xy_tolerance: DEFAULT_XY_TOLERANCE,
            z_tolerance: DEFAULT_Z_TOLERANCE,
        }
    }
}

impl CrackerOptions {
    pub fn with_snap_tolerance(mut self, snap_tolerance: Option<f64>) -> Self {
        self.snap_tolerance = snap_tolerance;
        self
    }

    pub fn with_minimum_segment_length(mut self, minimum_segment_length: Option<f64>) -> Self {
        self.minimum_segment_length = minimum_segment_length;
        self
    }

    pub fn with_use_source_zs(mut self, use_source_zs: bool) -> Self {
        self.use_source_zs = use_source_zs;
        self
    }

    pub fn with_intersection_point_options(mut self, options: IntersectionPointOptions) -> Self {
        self.intersection_point_options = options;
        self
    }

    pub fn with_strategy(mut self, strategy: IntersectionStrategy) -> Self {
        self.intersection_strategy = strategy;
        self
    }

    pub fn with_target_transformation(mut self, transformation: Option<TargetTransformation>) -> Self {
        self.target_transformation = transformation;
        self
    }

    pub fn with_extent(mut self, extent: Option<Envelope>) -> Self {
        self.extent = extent;
        self
    }

    pub fn with_crack_points_on_existing_vertices(mut self, add: bool) -> Self {
        self.add_crack_points_on_existing_vertices = add;
        self
    }

    /// Checks the tolerances and returns a copy in which zero
    /// tolerances are normalized to `None`.
    pub fn validated(&self) -> Result<Self> {
        check_tolerance("xy_tolerance", Some(self.xy_tolerance))?;
        check_tolerance("z_tolerance", Some(self.z_tolerance))?;
        check_tolerance("snap_tolerance", self.snap_tolerance)?;
        check_tolerance("minimum_segment_length", self.minimum_segment_length)?;

        let snap_tolerance = normalize_tolerance(self.snap_tolerance);
        if let Some(snap) = snap_tolerance {
            if snap < self.xy_tolerance {
                return Err(CrackError::invalid(format!(
                    "snap tolerance {snap} is smaller than the xy tolerance {}",
                    self.xy_tolerance
                )));
            }
        }

        Ok(CrackerOptions {
            snap_tolerance,
            minimum_segment_length: normalize_tolerance(self.minimum_segment_length),
            ..self.clone()
        })
    }

    /// The tolerance used to search for vertices and segments near a
    /// crack point.
    pub fn search_tolerance(&self) -> f64 {
        self.snap_tolerance.unwrap_or(0.).max(self.xy_tolerance)
    }
}

fn check_tolerance(name: &str, value: Option<f64>) -> Result<()> {
    match value {
        Some(v) if !v.is_finite() || v < 0. => {
            Err(CrackError::invalid(format!("{name} must be a finite, non-negative number, got {v}")))
        }
        _ => Ok(()),
    }
}

/// Tolerances that are not positive are treated as disabled.
pub(crate) fn normalize_tolerance(value: Option<f64>) -> Option<f64> {
    value.filter(|v| *v > 0.)
}
