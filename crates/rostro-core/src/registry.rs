//! Identity registry gateway.
//!
//! The [`Registry`] trait is the seam between the workflow and the remote
//! service; [`HttpRegistry`](crate::http::HttpRegistry) is the production
//! implementation.

use async_trait::async_trait;
use reqwest::Url;
use std::time::Duration;

use crate::error::RegistryError;
use crate::types::{ImageHandle, OperationAck, PersonRecord, PersonUpdate, Verdict};

pub type RegistryResult<T> = Result<T, RegistryError>;

/// Default base endpoint of a locally running registry service.
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000/api";

/// Largest response body accepted from the registry (20 MiB).
pub const DEFAULT_MAX_RESPONSE_BYTES: usize = 20 * 1024 * 1024;

/// Connection settings for [`HttpRegistry`](crate::http::HttpRegistry).
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    pub base_url: String,
    /// Whole-request timeout, connect included.
    pub timeout: Duration,
    /// Responses larger than this fail with [`RegistryError::TooLarge`].
    pub max_response_bytes: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(30),
            max_response_bytes: DEFAULT_MAX_RESPONSE_BYTES,
        }
    }
}

/// Typed operations of the identity registry service.
#[async_trait]
pub trait Registry: Send + Sync {
    /// All enrolled people, in the order the service returns them.
    async fn list(&self) -> RegistryResult<Vec<PersonRecord>>;

    async fn read(&self, user_id: &str) -> RegistryResult<PersonRecord>;

    /// Stable locator of the stored image for `user_id`. No request is made.
    fn image_url(&self, user_id: &str) -> Url;

    /// Download the stored image for `user_id`.
    async fn fetch_image(&self, user_id: &str) -> RegistryResult<Vec<u8>>;

    /// Ask the service whether `image` matches anyone in the registry.
    async fn compare(&self, image: &ImageHandle) -> RegistryResult<Verdict>;

    /// Enroll a new person with their reference image.
    async fn create(&self, record: &PersonRecord, image: &ImageHandle)
        -> RegistryResult<OperationAck>;

    /// Replace the editable fields of `user_id`. Without `image` the stored
    /// picture is left as is.
    async fn update(
        &self,
        user_id: &str,
        update: &PersonUpdate,
        image: Option<&ImageHandle>,
    ) -> RegistryResult<OperationAck>;

    async fn delete(&self, user_id: &str) -> RegistryResult<OperationAck>;
}
