//! Captured image acquisition for a session.

pub mod fs;

pub use fs::FsImageProvider;

use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;

use crate::session::SessionId;

#[derive(Error, Debug)]
pub enum ImageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image decode/encode error: {0}")]
    Codec(#[from] image::ImageError),

    #[error("Image task failed: {0}")]
    Task(String),
}

/// Raw bytes of a captured frame as they will be sent to evaluators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedImage {
    bytes: Vec<u8>,
    source: Option<PathBuf>,
}

impl CapturedImage {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            source: None,
        }
    }

    pub fn with_source(mut self, source: PathBuf) -> Self {
        self.source = Some(source);
        self
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn source(&self) -> Option<&PathBuf> {
        self.source.as_ref()
    }
}

/// Supplies the most recent captured image for a session.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ImageProvider: Send + Sync {
    /// `Ok(None)` means no image is available, which is a valid outcome.
    async fn latest_image(&self, session_id: &SessionId)
    -> Result<Option<CapturedImage>, ImageError>;
}
