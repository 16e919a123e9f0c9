//! Capture coordinator — one permission check, one picker invocation.

use async_trait::async_trait;
use rostro_core::ImageHandle;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use crate::policy::{CapturePolicy, CAPTURE_POLICY};

/// Where the image comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Camera,
    Library,
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Camera => f.write_str("camera"),
            Source::Library => f.write_str("library"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    Granted,
    Denied,
}

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("permission to use the {0} was denied")]
    PermissionDenied(Source),
    #[error("cannot access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("image processing failed: {0}")]
    Image(#[from] image::ImageError),
    #[error("image worker failed: {0}")]
    Worker(String),
}

/// What the picker returned.
#[derive(Debug)]
pub enum PickResult {
    Picked(ImageHandle),
    Cancelled,
}

/// Outcome of [`CaptureCoordinator::acquire`]. `Cancelled` must not be submitted.
#[derive(Debug)]
pub enum Acquisition {
    Captured(ImageHandle),
    Cancelled,
}

/// Device permission prompt.
#[async_trait]
pub trait PermissionGate: Send + Sync {
    async fn request(&self, source: Source) -> Permission;
}

/// Camera or gallery picker.
#[async_trait]
pub trait ImagePicker: Send + Sync {
    async fn pick(&self, source: Source, policy: &CapturePolicy) -> Result<PickResult, CaptureError>;
}

pub struct CaptureCoordinator<P, G> {
    picker: P,
    gate: G,
}

impl<P: ImagePicker, G: PermissionGate> CaptureCoordinator<P, G> {
    pub fn new(picker: P, gate: G) -> Self {
        Self { picker, gate }
    }

    /// Obtain one image from `source`.
    ///
    /// Asks for permission exactly once; a denial returns before the picker
    /// is opened.
    pub async fn acquire(&self, source: Source) -> Result<Acquisition, CaptureError> {
        if self.gate.request(source).await == Permission::Denied {
            tracing::warn!(%source, "permission denied");
            return Err(CaptureError::PermissionDenied(source));
        }

        match self.picker.pick(source, &CAPTURE_POLICY).await? {
            PickResult::Picked(image) => {
                tracing::info!(%source, image = %image, "image acquired");
                Ok(Acquisition::Captured(image))
            }
            PickResult::Cancelled => {
                tracing::info!(%source, "acquisition cancelled");
                Ok(Acquisition::Cancelled)
            }
        }
    }
}
