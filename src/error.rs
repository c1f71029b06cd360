use thiserror::Error;

#[derive(Debug, Error)]
pub enum OverlayError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid {dimension}: {value}")]
    Validation { dimension: &'static str, value: i64 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Encoding error: {0}")]
    Encode(String),

    #[error("Processing panicked: {0}")]
    Panicked(String),

    #[error("Failed to move output into place: {0}")]
    Persist(#[from] tempfile::PersistError),
}

impl OverlayError {
    pub(crate) fn validation(dimension: &'static str, value: impl Into<i64>) -> Self {
        OverlayError::Validation {
            dimension,
            value: value.into(),
        }
    }
}

pub type Result<T, E = OverlayError> = std::result::Result<T, E>;
