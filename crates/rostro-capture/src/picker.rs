//! File-backed picker and fixed permission answers for headless hosts.

use async_trait::async_trait;
use rostro_core::ImageHandle;
use std::path::{Path, PathBuf};

use crate::coordinator::{CaptureError, ImagePicker, Permission, PermissionGate, PickResult, Source};
use crate::policy::CapturePolicy;

/// Permission gate with a preset answer per source.
#[derive(Debug, Clone, Copy)]
pub struct StaticPermissions {
    pub camera: bool,
    pub library: bool,
}

impl StaticPermissions {
    pub fn granted() -> Self {
        Self {
            camera: true,
            library: true,
        }
    }
}

#[async_trait]
impl PermissionGate for StaticPermissions {
    async fn request(&self, source: Source) -> Permission {
        let allowed = match source {
            Source::Camera => self.camera,
            Source::Library => self.library,
        };
        if allowed {
            Permission::Granted
        } else {
            Permission::Denied
        }
    }
}

/// Picks a file selected up front; stands in for both camera and library.
///
/// The selection is normalized with the capture policy and written to
/// `output_dir` under a fresh name, so the original is never uploaded as is.
/// No selection means the operator backed out.
#[derive(Debug, Clone)]
pub struct FilePicker {
    selection: Option<PathBuf>,
    output_dir: PathBuf,
}

impl FilePicker {
    pub fn new(selection: Option<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            selection,
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }
}

#[async_trait]
impl ImagePicker for FilePicker {
    async fn pick(&self, source: Source, policy: &CapturePolicy) -> Result<PickResult, CaptureError> {
        let Some(selection) = &self.selection else {
            tracing::debug!(%source, "no file selected");
            return Ok(PickResult::Cancelled);
        };

        let raw = tokio::fs::read(selection).await.map_err(|e| CaptureError::Io {
            path: selection.clone(),
            source: e,
        })?;

        let policy = *policy;
        let encoded = tokio::task::spawn_blocking(move || policy.apply(&raw))
            .await
            .map_err(|e| CaptureError::Worker(e.to_string()))??;

        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .map_err(|e| CaptureError::Io {
                path: self.output_dir.clone(),
                source: e,
            })?;

        let out = self
            .output_dir
            .join(format!("capture-{}.jpg", uuid::Uuid::new_v4()));
        tokio::fs::write(&out, &encoded)
            .await
            .map_err(|e| CaptureError::Io {
                path: out.clone(),
                source: e,
            })?;

        tracing::debug!(
            %source,
            from = %selection.display(),
            to = %out.display(),
            bytes = encoded.len(),
            "selection normalized"
        );
        Ok(PickResult::Picked(ImageHandle::new(out)))
    }
}
