//! HTTP implementation of the registry gateway via `reqwest`.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::{BuildError, Operation, RegistryError};
use crate::registry::{Registry, RegistryConfig, RegistryResult};
use crate::types::{
    require, ImageHandle, OperationAck, PersonRecord, PersonUpdate, Similarity, Verdict,
};

/// Longest service error message carried into [`RegistryError::Service`].
const MAX_SERVICE_MESSAGE: usize = 200;

/// `GET /listar_usuarios` body.
#[derive(Debug, Deserialize)]
struct PeopleList {
    users: Vec<PersonRecord>,
}

/// `POST /comparar` body.
#[derive(Debug, Deserialize)]
struct CompareResponse {
    #[serde(rename = "match")]
    matched: bool,
    similarity: Option<f64>,
    user_data: Option<PersonRecord>,
}

impl CompareResponse {
    fn into_verdict(self) -> RegistryResult<Verdict> {
        if !self.matched {
            return Ok(Verdict::NoMatch);
        }

        let person = self.user_data.ok_or_else(|| RegistryError::Decode {
            operation: Operation::Compare,
            reason: "match reported without user_data".into(),
        })?;

        let similarity = match self.similarity {
            Some(raw) => Similarity::new(raw).ok_or_else(|| RegistryError::Decode {
                operation: Operation::Compare,
                reason: format!("similarity {raw} outside [0, 1]"),
            })?,
            None => {
                tracing::debug!(user_id = %person.user_id, "match without similarity; using 0");
                Similarity::ZERO
            }
        };

        Ok(Verdict::Match { similarity, person })
    }
}

/// Registry client speaking the service's JSON + multipart protocol.
#[derive(Debug, Clone)]
pub struct HttpRegistry {
    client: Client,
    base_url: Url,
    max_response_bytes: usize,
}

impl HttpRegistry {
    pub fn new(config: &RegistryConfig) -> Result<Self, BuildError> {
        let base_url = Url::parse(&config.base_url).map_err(|e| BuildError::InvalidBaseUrl {
            url: config.base_url.clone(),
            reason: e.to_string(),
        })?;
        if base_url.cannot_be_a_base() {
            return Err(BuildError::InvalidBaseUrl {
                url: config.base_url.clone(),
                reason: "not a hierarchical URL".into(),
            });
        }

        let client = Client::builder().timeout(config.timeout).build()?;

        tracing::info!(
            base_url = %base_url,
            timeout_secs = config.timeout.as_secs(),
            "registry client ready"
        );

        Ok(Self {
            client,
            base_url,
            max_response_bytes: config.max_response_bytes,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Append percent-encoded path segments to the base URL.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        // Only fails for cannot-be-a-base URLs, rejected in `new`.
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// Send a request and return the body of a 2xx response.
    async fn execute(&self, operation: Operation, request: RequestBuilder) -> RegistryResult<Vec<u8>> {
        let mut response = request
            .send()
            .await
            .map_err(|source| RegistryError::Transport { operation, source })?;
        let status = response.status();

        let limit = self.max_response_bytes;
        let too_large = || RegistryError::TooLarge { operation, limit };
        if response.content_length().is_some_and(|len| len > limit as u64) {
            return Err(too_large());
        }
        let mut body = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|source| RegistryError::Transport { operation, source })?
        {
            if body.len() + chunk.len() > limit {
                return Err(too_large());
            }
            body.extend_from_slice(&chunk);
        }

        if !status.is_success() {
            let message = service_message(status, &body);
            tracing::warn!(%operation, code = status.as_u16(), %message, "registry rejected request");
            return Err(RegistryError::Service {
                operation,
                code: status.as_u16(),
                message,
            });
        }

        tracing::debug!(%operation, bytes = body.len(), "registry responded");
        Ok(body)
    }

    async fn image_part(&self, operation: Operation, image: &ImageHandle) -> RegistryResult<Part> {
        let bytes = image.read_bytes().await?;
        Part::bytes(bytes)
            .file_name(image.file_name())
            .mime_str(mime_for(image))
            .map_err(|source| RegistryError::Transport { operation, source })
    }

    fn record_form(update: &PersonUpdate) -> Form {
        Form::new()
            .text("name", update.name.clone())
            .text("last_name", update.last_name.clone())
            .text("email", update.email.clone())
            .text("requisitioned", flag(update.requisitioned))
    }
}

#[async_trait]
impl Registry for HttpRegistry {
    async fn list(&self) -> RegistryResult<Vec<PersonRecord>> {
        let url = self.endpoint(&["listar_usuarios"]);
        let body = self.execute(Operation::List, self.client.get(url)).await?;
        let list: PeopleList = decode(Operation::List, &body)?;
        tracing::debug!(count = list.users.len(), "listed registry");
        Ok(list.users)
    }

    async fn read(&self, user_id: &str) -> RegistryResult<PersonRecord> {
        require("user_id", user_id)?;
        let url = self.endpoint(&["usuario", user_id]);
        let body = self
            .execute(Operation::Read, self.client.get(url))
            .await
            .map_err(|e| not_found(e, user_id))?;
        decode(Operation::Read, &body)
    }

    fn image_url(&self, user_id: &str) -> Url {
        self.endpoint(&["usuario", user_id, "imagen"])
    }

    async fn fetch_image(&self, user_id: &str) -> RegistryResult<Vec<u8>> {
        require("user_id", user_id)?;
        let url = self.image_url(user_id);
        self.execute(Operation::Image, self.client.get(url))
            .await
            .map_err(|e| not_found(e, user_id))
    }

    async fn compare(&self, image: &ImageHandle) -> RegistryResult<Verdict> {
        let form = Form::new().part("file", self.image_part(Operation::Compare, image).await?);
        let url = self.endpoint(&["comparar"]);

        tracing::info!(image = %image, "sending comparison request");
        let body = self
            .execute(Operation::Compare, self.client.post(url).multipart(form))
            .await?;
        let response: CompareResponse = decode(Operation::Compare, &body)?;
        response.into_verdict()
    }

    async fn create(
        &self,
        record: &PersonRecord,
        image: &ImageHandle,
    ) -> RegistryResult<OperationAck> {
        record.validate_for_create()?;

        let form = Self::record_form(&PersonUpdate::from(record))
            .text("user_id", record.user_id.clone())
            .part("file", self.image_part(Operation::Create, image).await?);
        let url = self.endpoint(&["registrar_usuario"]);

        let body = self
            .execute(Operation::Create, self.client.post(url).multipart(form))
            .await?;
        tracing::info!(user_id = %record.user_id, "person enrolled");
        decode_ack(Operation::Create, &body)
    }

    async fn update(
        &self,
        user_id: &str,
        update: &PersonUpdate,
        image: Option<&ImageHandle>,
    ) -> RegistryResult<OperationAck> {
        require("user_id", user_id)?;

        let mut form = Self::record_form(update);
        if let Some(image) = image {
            form = form.part("file", self.image_part(Operation::Update, image).await?);
        }
        let url = self.endpoint(&["editar_usuario", user_id]);

        let body = self
            .execute(Operation::Update, self.client.put(url).multipart(form))
            .await
            .map_err(|e| not_found(e, user_id))?;
        tracing::info!(user_id, image_replaced = image.is_some(), "person updated");
        decode_ack(Operation::Update, &body)
    }

    async fn delete(&self, user_id: &str) -> RegistryResult<OperationAck> {
        require("user_id", user_id)?;
        let url = self.endpoint(&["eliminar_usuario", user_id]);
        let body = self
            .execute(Operation::Delete, self.client.delete(url))
            .await
            .map_err(|e| not_found(e, user_id))?;
        tracing::info!(user_id, "person deleted");
        decode_ack(Operation::Delete, &body)
    }
}

fn decode<T: DeserializeOwned>(operation: Operation, body: &[u8]) -> RegistryResult<T> {
    serde_json::from_slice(body).map_err(|e| RegistryError::Decode {
        operation,
        reason: e.to_string(),
    })
}

/// Mutation bodies may be empty (204); anything else must be a JSON object.
fn decode_ack(operation: Operation, body: &[u8]) -> RegistryResult<OperationAck> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(OperationAck::default());
    }
    decode(operation, body)
}

/// Narrow a 404 from an id-addressed endpoint to [`RegistryError::NotFound`].
fn not_found(err: RegistryError, user_id: &str) -> RegistryError {
    match err {
        RegistryError::Service { code: 404, .. } => RegistryError::NotFound {
            user_id: user_id.to_string(),
        },
        other => other,
    }
}

/// Multipart form booleans are the literal strings `true`/`false`.
fn flag(value: bool) -> &'static str {
    if value {
        "true"
    } else {
        "false"
    }
}

fn mime_for(image: &ImageHandle) -> &'static str {
    match image
        .path()
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        _ => "image/jpeg",
    }
}

/// Pull a human-readable message out of an error body.
fn service_message(status: StatusCode, body: &[u8]) -> String {
    let from_json = serde_json::from_slice::<serde_json::Value>(body)
        .ok()
        .and_then(|value| {
            ["detail", "message", "error"]
                .iter()
                .find_map(|key| value.get(*key).cloned())
        })
        .map(|field| match field {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        });

    let message = from_json.unwrap_or_else(|| String::from_utf8_lossy(body).trim().to_string());
    if message.is_empty() {
        return status
            .canonical_reason()
            .unwrap_or("no details")
            .to_string();
    }
    message.chars().take(MAX_SERVICE_MESSAGE).collect()
}
