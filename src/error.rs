use thiserror::Error;

use crate::orchestrate::FeatureId;

/// Errors raised while calculating or applying crack points.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CrackError {
    /// An argument or an option combination is not usable, e.g. 3D weeding
    /// of a geometry without Z values.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The operation is not defined for the given geometry type.
    #[error("unsupported geometry type: {0}")]
    UnsupportedGeometry(&'static str),

    #[error("feature {0} not found in the feature store")]
    FeatureNotFound(FeatureId),
}

impl CrackError {
    pub(crate) fn invalid<S: Into<String>>(msg: S) -> Self {
        CrackError::InvalidArgument(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, CrackError>;
