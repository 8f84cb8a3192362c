use thiserror::Error;

/// Errors that can occur while tracing outlines.
///
/// Every variant is fatal for the run: nothing is retried and no partial
/// result is recovered.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum OutlineError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("missing affine transform")]
    MissingAffine,

    #[error("missing coordinate transform")]
    MissingGeoTransform,

    #[error("ring topology violated: {0}")]
    Topology(String),

    #[error("failed to load image: {0}")]
    ImageLoad(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("bad raster metadata: {0}")]
    Metadata(#[from] serde_json::Error),
}

impl OutlineError {
    pub(crate) fn topology(msg: impl Into<String>) -> Self {
        OutlineError::Topology(msg.into())
    }

    pub(crate) fn config(msg: impl Into<String>) -> Self {
        OutlineError::InvalidConfig(msg.into())
    }
}
