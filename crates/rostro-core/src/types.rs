use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::RegistryError;

/// Reference to a captured or picked image on local storage.
///
/// Deliberately not `Clone`: exactly one workflow step owns the handle at a
/// time and passes it on by value.
#[derive(Debug, PartialEq, Eq)]
pub struct ImageHandle {
    path: PathBuf,
}

impl ImageHandle {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File name used for the multipart attachment, falling back to `photo.jpg`.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_owned)
            .unwrap_or_else(|| "photo.jpg".to_string())
    }

    /// Read the image bytes for upload.
    pub async fn read_bytes(&self) -> Result<Vec<u8>, RegistryError> {
        tokio::fs::read(&self.path)
            .await
            .map_err(|source| RegistryError::Attachment {
                path: self.path.clone(),
                source,
            })
    }
}

impl fmt::Display for ImageHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.display())
    }
}

/// A person enrolled in the identity registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonRecord {
    /// Externally assigned, unique per registry.
    pub user_id: String,
    pub name: String,
    pub last_name: String,
    pub email: String,
    /// Whether the person is flagged as wanted.
    pub requisitioned: bool,
}

impl PersonRecord {
    /// Check the fields the registry requires for enrollment.
    pub fn validate_for_create(&self) -> Result<(), RegistryError> {
        require("user_id", &self.user_id)?;
        require("name", &self.name)?;
        require("last_name", &self.last_name)?;
        require("email", &self.email)
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.name, self.last_name)
    }
}

/// Editable fields of a [`PersonRecord`]; the id travels in the request path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonUpdate {
    pub name: String,
    pub last_name: String,
    pub email: String,
    pub requisitioned: bool,
}

impl From<&PersonRecord> for PersonUpdate {
    fn from(record: &PersonRecord) -> Self {
        Self {
            name: record.name.clone(),
            last_name: record.last_name.clone(),
            email: record.email.clone(),
            requisitioned: record.requisitioned,
        }
    }
}

/// Reject a missing or blank required field before anything is sent.
pub(crate) fn require(field: &'static str, value: &str) -> Result<(), RegistryError> {
    if value.trim().is_empty() {
        return Err(RegistryError::Validation { field });
    }
    Ok(())
}

/// Similarity score reported by the registry, always within [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize)]
pub struct Similarity(f64);

impl Similarity {
    pub const ZERO: Similarity = Similarity(0.0);

    /// Returns `None` for values outside the closed unit interval (or NaN).
    pub fn new(raw: f64) -> Option<Self> {
        (0.0..=1.0).contains(&raw).then_some(Self(raw))
    }

    pub fn raw(self) -> f64 {
        self.0
    }

    /// Score as a percentage rounded to two decimal places (0.8734 → 87.34).
    pub fn percent(self) -> f64 {
        (self.0 * 10_000.0).round() / 100.0
    }
}

impl fmt::Display for Similarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}%", self.percent())
    }
}

/// Successful answer to a comparison request.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Match {
        similarity: Similarity,
        person: PersonRecord,
    },
    NoMatch,
}

/// Terminal artifact of one submission: exactly one case holds.
#[derive(Debug)]
pub enum ComparisonOutcome {
    Match {
        similarity: Similarity,
        person: PersonRecord,
    },
    NoMatch,
    Failure {
        reason: RegistryError,
    },
}

impl From<Result<Verdict, RegistryError>> for ComparisonOutcome {
    fn from(result: Result<Verdict, RegistryError>) -> Self {
        match result {
            Ok(Verdict::Match { similarity, person }) => Self::Match { similarity, person },
            Ok(Verdict::NoMatch) => Self::NoMatch,
            Err(reason) => Self::Failure { reason },
        }
    }
}

/// Body returned by create/update/delete.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct OperationAck {
    #[serde(default)]
    pub message: Option<String>,
}
