//! Error types for the blend engine.

use thiserror::Error;

/// Errors reported by layout, compositor and backend operations.
#[derive(Error, Debug)]
pub enum BlendError {
    #[error("Cannot initialize with {0} projectors")]
    InvalidProjectorCount(i64),
    #[error("Invalid projector resolution {width}x{height}")]
    InvalidResolution { width: u32, height: u32 },
    #[error("Invalid layout {0:?}, expected \"horizontal\" or \"vertical\"")]
    InvalidLayout(String),
    #[error("Invalid rotation {0:?}, expected \"none\", \"left\" or \"right\"")]
    InvalidRotation(String),
    #[error("Overlap of {width} px on seam {seam} exceeds the {extent} px slot extent")]
    InvalidOverlap { seam: usize, width: f32, extent: f32 },
    #[error("Projector index {index} is invalid ({count} projectors configured)")]
    InvalidIndex { index: usize, count: usize },
    #[error("Seam index {index} is invalid ({count} seams configured)")]
    InvalidSeam { index: usize, count: usize },
    #[error("Blend engine is not configured")]
    NotConfigured,
    #[error("No canvas capture is active")]
    NotCapturing,
    #[error("No output target set")]
    NoOutputTarget,
    #[error("Render backend error: {0}")]
    Backend(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Settings format error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

/// Coarse classification of a [`BlendError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A configure call was rejected; prior state is untouched.
    Configuration,
    /// An index was out of range; the call was ignored.
    Range,
    /// The render backend could not perform the request.
    Backend,
    /// Reading or writing files failed.
    Io,
}

impl BlendError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BlendError::InvalidProjectorCount(_)
            | BlendError::InvalidResolution { .. }
            | BlendError::InvalidLayout(_)
            | BlendError::InvalidRotation(_)
            | BlendError::InvalidOverlap { .. }
            | BlendError::NotConfigured => ErrorKind::Configuration,
            BlendError::InvalidIndex { .. } | BlendError::InvalidSeam { .. } => ErrorKind::Range,
            BlendError::NotCapturing | BlendError::NoOutputTarget | BlendError::Backend(_) => {
                ErrorKind::Backend
            }
            BlendError::Io(_) | BlendError::Json(_) | BlendError::Image(_) => ErrorKind::Io,
        }
    }
}

pub type Result<T, E = BlendError> = std::result::Result<T, E>;
