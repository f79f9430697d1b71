//! Bare HTTP transport
//!
//! [`Transport`] is the seam every API call goes through. The reqwest-backed
//! [`ReqwestTransport`] talks to the network; the session-aware decorator in
//! [`super::SessionAwareTransport`] wraps any transport with token handling.
//!
//! Requests are plain values so they can be replayed after a token refresh.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

use crate::redact;

/// Errors that can occur while sending a request
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// No response within the configured timeout
    #[error("Request timed out")]
    Timeout,

    /// The server could not be reached
    #[error("Connection failed: {0}")]
    Connect(String),

    /// The request could not be built or the response could not be read
    #[error("Request failed: {0}")]
    Request(String),

    /// The session ended while handling an authorization failure
    #[error("Session terminated")]
    SessionTerminated,

    /// Refreshed tokens could not be persisted
    #[error("Credential storage failed: {0}")]
    Storage(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TransportError::Timeout
        } else if e.is_connect() {
            TransportError::Connect(e.to_string())
        } else {
            TransportError::Request(e.to_string())
        }
    }
}

/// One field of a multipart body
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormField {
    Text {
        name: String,
        value: String,
    },
    File {
        name: String,
        file_name: String,
        content_type: String,
        bytes: Vec<u8>,
    },
}

impl FormField {
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        FormField::Text {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Request payload
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Empty,
    Json(serde_json::Value),
    Multipart(Vec<FormField>),
}

/// An outgoing request
///
/// `attempt` is 0 for the first send and is only ever increased by
/// [`ApiRequest::retry_with`], which returns a new value.
#[derive(Clone)]
pub struct ApiRequest {
    method: Method,
    path: String,
    body: RequestBody,
    bearer: Option<String>,
    attempt: u8,
}

impl ApiRequest {
    /// Creates a request for `path`, relative to the transport's base URL
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: RequestBody::Empty,
            bearer: None,
            attempt: 0,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Sets a JSON body
    pub fn json<T: Serialize>(mut self, body: &T) -> Result<Self, TransportError> {
        let value = serde_json::to_value(body).map_err(|e| TransportError::Request(e.to_string()))?;
        self.body = RequestBody::Json(value);
        Ok(self)
    }

    /// Sets a multipart body
    pub fn multipart(mut self, fields: Vec<FormField>) -> Self {
        self.body = RequestBody::Multipart(fields);
        self
    }

    /// Attaches a bearer credential
    pub fn with_bearer(mut self, token: impl Into<String>) -> Self {
        self.bearer = Some(token.into());
        self
    }

    /// The replay of this request carrying a fresh access token
    pub fn retry_with(&self, token: &str) -> Self {
        Self {
            bearer: Some(token.to_string()),
            attempt: self.attempt.saturating_add(1),
            ..self.clone()
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn body(&self) -> &RequestBody {
        &self.body
    }

    pub fn bearer(&self) -> Option<&str> {
        self.bearer.as_deref()
    }

    pub fn attempt(&self) -> u8 {
        self.attempt
    }
}

impl fmt::Debug for ApiRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiRequest")
            .field("method", &self.method)
            .field("path", &redact::path(&self.path))
            .field("bearer", &self.bearer.as_deref().map(redact::token))
            .field("attempt", &self.attempt)
            .finish()
    }
}

/// A received response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    status: u16,
    body: Vec<u8>,
}

impl ApiResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Convenience constructor for a JSON body
    pub fn json_body(status: u16, body: &serde_json::Value) -> Self {
        Self::new(status, body.to_string())
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status == 401
    }

    pub fn bytes(&self) -> &[u8] {
        &self.body
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Decodes the body as JSON
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }
}

/// Sends requests and returns responses of any status
///
/// Non-2xx responses are `Ok`; only failures to obtain a response are `Err`.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError>;
}

/// Transport backed by a pooled reqwest client
#[derive(Clone)]
pub struct ReqwestTransport {
    client: Client,
    base_url: String,
}

impl ReqwestTransport {
    /// Creates a transport for `base_url` with a per-request timeout
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, TransportError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url_for(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    fn build_form(fields: &[FormField]) -> Result<Form, TransportError> {
        let mut form = Form::new();
        for field in fields {
            form = match field {
                FormField::Text { name, value } => form.text(name.clone(), value.clone()),
                FormField::File {
                    name,
                    file_name,
                    content_type,
                    bytes,
                } => {
                    let part = Part::bytes(bytes.clone())
                        .file_name(file_name.clone())
                        .mime_str(content_type)
                        .map_err(|e| TransportError::Request(e.to_string()))?;
                    form.part(name.clone(), part)
                }
            };
        }
        Ok(form)
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
        let url = self.url_for(request.path());
        tracing::debug!(
            method = %request.method(),
            path = redact::path(request.path()),
            attempt = request.attempt(),
            "Sending request"
        );

        let mut builder = self
            .client
            .request(request.method().clone(), &url)
            .header(reqwest::header::ACCEPT, "application/json");

        if let Some(token) = request.bearer() {
            builder = builder.bearer_auth(token);
        }

        builder = match request.body() {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(value),
            RequestBody::Multipart(fields) => builder.multipart(Self::build_form(fields)?),
        };

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?;

        tracing::debug!(status, path = redact::path(request.path()), "Response received");
        Ok(ApiResponse::new(status, body.to_vec()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_retry_with_is_a_new_value() {
        let original = ApiRequest::get("/products").with_bearer("old");
        let retry = original.retry_with("new");

        assert_eq!(original.attempt(), 0);
        assert_eq!(original.bearer(), Some("old"));
        assert_eq!(retry.attempt(), 1);
        assert_eq!(retry.bearer(), Some("new"));
        assert_eq!(retry.path(), "/products");
    }

    #[test]
    fn test_request_debug_redacts_bearer() {
        let request = ApiRequest::get("/user/profile?x=1").with_bearer("secret-token-abcd");
        let debug = format!("{:?}", request);

        assert!(!debug.contains("secret-token"));
        assert!(debug.contains("***abcd"));
        assert!(!debug.contains("x=1"));
    }

    #[test]
    fn test_response_helpers() {
        let response = ApiResponse::json_body(201, &serde_json::json!({"ok": true}));
        assert!(response.is_success());
        assert!(!response.is_unauthorized());

        let value: serde_json::Value = response.json().unwrap();
        assert_eq!(value["ok"], true);
        assert!(ApiResponse::new(401, "").is_unauthorized());
    }

    #[tokio::test]
    async fn test_reqwest_transport_sends_json_and_bearer() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/products"))
            .and(header("authorization", "Bearer tok-1"))
            .and(body_json(serde_json::json!({"title": "Lamp"})))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({"id": "p1"})))
            .expect(1)
            .mount(&server)
            .await;

        let transport = ReqwestTransport::new(&server.uri(), Duration::from_secs(5)).unwrap();
        let request = ApiRequest::post("/products")
            .json(&serde_json::json!({"title": "Lamp"}))
            .unwrap()
            .with_bearer("tok-1");

        let response = transport.send(request).await.unwrap();
        assert_eq!(response.status(), 201);
        assert_eq!(response.json::<serde_json::Value>().unwrap()["id"], "p1");
    }

    #[tokio::test]
    async fn test_reqwest_transport_returns_error_statuses() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404).set_body_string("nope"))
            .mount(&server)
            .await;

        let transport = ReqwestTransport::new(&format!("{}/", server.uri()), Duration::from_secs(5)).unwrap();
        let response = transport.send(ApiRequest::get("missing")).await.unwrap();

        assert_eq!(response.status(), 404);
        assert_eq!(response.text(), "nope");
    }

    #[tokio::test]
    async fn test_reqwest_transport_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
            .mount(&server)
            .await;

        let transport = ReqwestTransport::new(&server.uri(), Duration::from_millis(50)).unwrap();
        let err = transport.send(ApiRequest::get("/slow")).await.unwrap_err();

        assert_eq!(err, TransportError::Timeout);
    }

    #[tokio::test]
    async fn test_reqwest_transport_connect_failure() {
        // Port 9 (discard) on localhost is not expected to accept connections
        let transport = ReqwestTransport::new("http://127.0.0.1:9", Duration::from_secs(2)).unwrap();
        let err = transport.send(ApiRequest::get("/")).await.unwrap_err();

        assert!(matches!(err, TransportError::Connect(_) | TransportError::Timeout));
    }
}
