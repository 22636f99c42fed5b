//! HTTP implementation of [`RemoteStore`].

use crate::{
    error::RemoteError,
    remote::{
        CreateObservationRequest, CreateWalkRequest, CreatedResponse, ErrorResponse,
        RemoteResult, RemoteStore,
    },
    ObservationFields, WalkFields, WalkPatch,
};
use async_trait::async_trait;
use reqwest::StatusCode;
use std::time::Duration;

/// Default per-request timeout.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Remote store reached over the JSON HTTP API.
#[derive(Debug, Clone)]
pub struct HttpRemoteStore {
    base_url: String,
    client: reqwest::Client,
    bearer: Option<String>,
}

impl HttpRemoteStore {
    /// Create a client for the backend at `base_url`, e.g. `http://host:3000`.
    pub fn new(base_url: impl Into<String>) -> RemoteResult<Self> {
        let base_url = base_url.into().trim().trim_end_matches('/').to_string();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(RemoteError::Rejected(format!(
                "base url must include http:// or https://: {base_url}"
            )));
        }
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| RemoteError::Unavailable(e.to_string()))?;
        Ok(Self {
            base_url,
            client,
            bearer: None,
        })
    }

    /// Attach a bearer token obtained by the host's auth collaborator.
    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer = Some(token.into());
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let builder = self
            .client
            .request(method, format!("{}{path}", self.base_url))
            .header("Accept", "application/json");
        match &self.bearer {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send(&self, builder: reqwest::RequestBuilder) -> RemoteResult<reqwest::Response> {
        let response = builder
            .send()
            .await
            .map_err(|e| RemoteError::Unavailable(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(classify(status, &body))
    }

    async fn created_id(&self, builder: reqwest::RequestBuilder) -> RemoteResult<String> {
        let created: CreatedResponse = self
            .send(builder)
            .await?
            .json()
            .await
            .map_err(|e| RemoteError::Unavailable(format!("malformed response: {e}")))?;
        Ok(created.id)
    }
}

#[async_trait]
impl RemoteStore for HttpRemoteStore {
    async fn create_walk(&self, client_ref: &str, walk: &WalkFields) -> RemoteResult<String> {
        let body = CreateWalkRequest {
            client_ref: client_ref.to_string(),
            walk: walk.clone(),
        };
        self.created_id(self.request(reqwest::Method::POST, "/walks").json(&body))
            .await
    }

    async fn update_walk(&self, id: &str, patch: &WalkPatch) -> RemoteResult<()> {
        self.send(
            self.request(reqwest::Method::PATCH, &format!("/walks/{id}"))
                .json(patch),
        )
        .await?;
        Ok(())
    }

    async fn create_observation(
        &self,
        client_ref: &str,
        walk_id: &str,
        observation: &ObservationFields,
    ) -> RemoteResult<String> {
        let body = CreateObservationRequest {
            client_ref: client_ref.to_string(),
            walk_id: walk_id.to_string(),
            observation: observation.clone(),
        };
        self.created_id(self.request(reqwest::Method::POST, "/observations").json(&body))
            .await
    }
}

/// Map a non-success status to a remote error.
///
/// Client errors about the payload are rejections; everything else
/// (auth, throttling, server faults) is treated as temporary unavailability.
fn classify(status: StatusCode, body: &str) -> RemoteError {
    let message = error_message(status, body);
    match status {
        StatusCode::BAD_REQUEST
        | StatusCode::NOT_FOUND
        | StatusCode::CONFLICT
        | StatusCode::UNPROCESSABLE_ENTITY => RemoteError::Rejected(message),
        _ => RemoteError::Unavailable(message),
    }
}

fn error_message(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<ErrorResponse>(body) {
        return match payload.details {
            Some(details) => format!("{}: {} ({})", payload.error, details, status.as_u16()),
            None => format!("{} ({})", payload.error, status.as_u16()),
        };
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", trimmed, status.as_u16())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_base_url_without_scheme() {
        assert!(HttpRemoteStore::new("api.example.com").is_err());
        let store = HttpRemoteStore::new("http://localhost:3000/").unwrap();
        assert_eq!(store.base_url(), "http://localhost:3000");
    }

    #[test]
    fn payload_errors_are_rejections() {
        let err = classify(
            StatusCode::UNPROCESSABLE_ENTITY,
            r#"{"error":"walk not found"}"#,
        );
        assert_eq!(err, RemoteError::Rejected("walk not found (422)".into()));
        assert!(classify(StatusCode::BAD_REQUEST, "").is_rejection());
    }

    #[test]
    fn auth_and_server_errors_are_unavailable() {
        for status in [
            StatusCode::UNAUTHORIZED,
            StatusCode::FORBIDDEN,
            StatusCode::TOO_MANY_REQUESTS,
            StatusCode::INTERNAL_SERVER_ERROR,
            StatusCode::SERVICE_UNAVAILABLE,
        ] {
            assert!(!classify(status, "").is_rejection(), "{status}");
        }
    }

    #[test]
    fn plain_text_bodies_are_kept() {
        assert_eq!(
            error_message(StatusCode::BAD_GATEWAY, " upstream down "),
            "upstream down (502)"
        );
        assert_eq!(error_message(StatusCode::BAD_GATEWAY, ""), "HTTP 502");
    }
}
