//! services/guard/src/adapters/http.rs
//!
//! This module contains the REST adapter for the patrol backend.
//! It implements the `PatrolApi` port from the `core` crate using `reqwest`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use patrol_core::domain::{NewPatrolRecord, RecordPage, RecordQuery, UserProfile};
use patrol_core::ports::{PatrolApi, PortError, PortResult, SessionStore};
use reqwest::{header, Client, RequestBuilder, Response, StatusCode, Url};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::error::GuardError;

const USERS_PATH: &str = "users";
const HEALTH_PATH: &str = "health";
const RECORDS_PATH: &str = "industerialsecurity";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements the `PatrolApi` port over HTTP.
///
/// A 401 from any endpoint clears the local session before the error is returned.
#[derive(Clone)]
pub struct HttpPatrolApi {
    client: Client,
    base_url: Url,
    probe_timeout: Duration,
    session: Arc<dyn SessionStore>,
}

impl HttpPatrolApi {
    /// Creates a new `HttpPatrolApi`.
    pub fn new(
        base_url: Url,
        timeout: Duration,
        probe_timeout: Duration,
        session: Arc<dyn SessionStore>,
    ) -> Result<Self, GuardError> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );
        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()?;
        Ok(Self {
            client,
            base_url,
            probe_timeout,
            session,
        })
    }

    fn url(&self, path: &str) -> PortResult<Url> {
        self.base_url
            .join(path)
            .map_err(|e| PortError::Unexpected(format!("Invalid API path '{}': {}", path, e)))
    }

    /// Attaches the stored bearer token, if any.
    async fn authorized(&self, request: RequestBuilder) -> PortResult<RequestBuilder> {
        Ok(match self.session.auth_token().await? {
            Some(token) => request.bearer_auth(token),
            None => request,
        })
    }

    /// Sends the request and maps non-success statuses onto `PortError`.
    async fn send(&self, request: RequestBuilder) -> PortResult<Response> {
        let response = self
            .authorized(request)
            .await?
            .send()
            .await
            .map_err(transport_error)?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let url = response.url().clone();
        match status {
            StatusCode::UNAUTHORIZED => {
                warn!(%url, "Unauthorized response, clearing local session");
                if let Err(e) = self.session.clear_session().await {
                    error!("Failed to clear session after 401: {}", e);
                }
                Err(PortError::Unauthorized)
            }
            StatusCode::UNPROCESSABLE_ENTITY => {
                let body = response.json::<Value>().await.unwrap_or(Value::Null);
                Err(validation_error(&url, &body))
            }
            StatusCode::NOT_FOUND => Err(PortError::NotFound(url.path().to_string())),
            _ => {
                warn!(%url, status = status.as_u16(), "Request failed");
                Err(PortError::Http {
                    status: status.as_u16(),
                })
            }
        }
    }
}

fn transport_error(e: reqwest::Error) -> PortError {
    if e.is_timeout() {
        PortError::Timeout
    } else if e.is_connect() {
        PortError::Unreachable(e.to_string())
    } else {
        PortError::Unexpected(e.to_string())
    }
}

//=========================================================================================
// Validation Errors
//=========================================================================================

#[derive(Deserialize)]
struct FieldError {
    #[serde(default)]
    loc: Vec<Value>,
    #[serde(default)]
    field: Option<String>,
    #[serde(default, alias = "message")]
    msg: Option<String>,
    #[serde(default, alias = "value")]
    input: Option<Value>,
}

impl FieldError {
    fn field(&self) -> String {
        if !self.loc.is_empty() {
            return self
                .loc
                .iter()
                .map(|part| match part {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect::<Vec<_>>()
                .join(".");
        }
        self.field.clone().unwrap_or_else(|| "unknown".to_string())
    }

    fn message(&self) -> String {
        self.msg
            .clone()
            .unwrap_or_else(|| "Validation failed".to_string())
    }
}

/// Logs every field-level complaint of a 422 body and keeps the first.
fn validation_error(url: &Url, body: &Value) -> PortError {
    let detail = body
        .get("detail")
        .or_else(|| body.get("errors"))
        .or_else(|| body.get("message"))
        .unwrap_or(body);

    error!(%url, "Validation error (422)");
    match detail {
        Value::Array(items) => {
            let errors: Vec<FieldError> = items
                .iter()
                .filter_map(|item| serde_json::from_value(item.clone()).ok())
                .collect();
            for (idx, err) in errors.iter().enumerate() {
                error!(
                    index = idx + 1,
                    field = %err.field(),
                    message = %err.message(),
                    value = ?err.input,
                    "Validation failure"
                );
            }
            match errors.first() {
                Some(first) => PortError::Validation {
                    field: first.field(),
                    message: first.message(),
                },
                None => PortError::Http { status: 422 },
            }
        }
        Value::String(message) => {
            error!(message = %message, "Validation failure");
            PortError::Validation {
                field: "request".to_string(),
                message: message.clone(),
            }
        }
        other => {
            error!(details = %other, "Validation failure");
            PortError::Http { status: 422 }
        }
    }
}

//=========================================================================================
// `PatrolApi` Trait Implementation
//=========================================================================================

#[async_trait]
impl PatrolApi for HttpPatrolApi {
    async fn login(&self, username: &str, password: &str) -> PortResult<UserProfile> {
        let request = self
            .client
            .get(self.url(USERS_PATH)?)
            .query(&[("username", username), ("password", password)]);
        let response = self.send(request).await?;
        response
            .json::<UserProfile>()
            .await
            .map_err(|e| PortError::Unexpected(format!("Malformed login response: {}", e)))
    }

    async fn health(&self) -> PortResult<bool> {
        let response = self
            .client
            .get(self.url(HEALTH_PATH)?)
            .timeout(self.probe_timeout)
            .send()
            .await
            .map_err(transport_error)?;
        debug!(status = response.status().as_u16(), "Health check");
        Ok(response.status().is_success())
    }

    async fn create_record(&self, record: &NewPatrolRecord) -> PortResult<()> {
        let request = self
            .client
            .post(self.url(RECORDS_PATH)?)
            .timeout(self.probe_timeout)
            .json(record);
        self.send(request).await?;
        Ok(())
    }

    async fn list_records(&self, query: &RecordQuery) -> PortResult<RecordPage> {
        let request = self
            .client
            .get(self.url(RECORDS_PATH)?)
            .query(&query.to_params());
        let response = self.send(request).await?;
        response
            .json::<RecordPage>()
            .await
            .map_err(|e| PortError::Unexpected(format!("Malformed records response: {}", e)))
    }

    async fn fetch_image(&self, image_id: &str) -> PortResult<Vec<u8>> {
        let request = self
            .client
            .get(self.url(RECORDS_PATH)?)
            .query(&[("imageid", image_id)]);
        let response = self.send(request).await?;
        let bytes = response.bytes().await.map_err(transport_error)?;
        Ok(bytes.to_vec())
    }
}
