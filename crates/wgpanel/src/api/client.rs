//! Error-normalizing HTTP client
//!
//! [`ApiClient`] never returns `Err`. Every outcome, including a backend that
//! cannot be reached, comes back as an [`ApiResponse`] carrying either data or
//! a normalized [`ApiError`].

use std::fmt;

use bytes::Bytes;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{Error, Result};

/// Characters left untouched by JavaScript's `encodeURIComponent`
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Percent-encode a single path segment (peer ids are base64 and contain `/`).
#[must_use]
pub fn encode_segment(segment: &str) -> String {
    utf8_percent_encode(segment, URI_COMPONENT).to_string()
}

/// Uniform failure shape for every remote call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    /// Short user-facing message
    pub error: String,
    /// Optional detail (cause, status text, raw body)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ApiError {
    /// Create an error with an optional detail
    pub fn new(error: impl Into<String>, details: Option<String>) -> Self {
        Self {
            error: error.into(),
            details,
        }
    }

    /// No response was obtained at all
    pub fn network(cause: impl fmt::Display) -> Self {
        Self::new("Network error", Some(cause.to_string()))
    }

    /// Non-2xx status without a usable error body
    pub fn http(status: u16, details: impl Into<String>) -> Self {
        Self::new(format!("HTTP {status} error"), Some(details.into()))
    }

    /// A 2xx response whose body could not be decoded
    pub fn invalid_response(cause: impl fmt::Display) -> Self {
        Self::new("Invalid response", Some(cause.to_string()))
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.details {
            Some(details) if !details.is_empty() => write!(f, "{}: {details}", self.error),
            _ => f.write_str(&self.error),
        }
    }
}

impl std::error::Error for ApiError {}

/// Result of a remote call
///
/// `status` is the HTTP status, or `0` when no response was received. A
/// successful call may still carry no data (204 or an empty body).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse<T> {
    /// HTTP status, `0` for transport failures
    pub status: u16,
    /// Decoded payload on success
    pub data: Option<T>,
    /// Normalized error on failure
    pub error: Option<ApiError>,
}

impl<T> ApiResponse<T> {
    /// A successful response with a payload
    pub fn ok(status: u16, data: T) -> Self {
        Self {
            status,
            data: Some(data),
            error: None,
        }
    }

    /// A successful response without a payload
    pub fn empty(status: u16) -> Self {
        Self {
            status,
            data: None,
            error: None,
        }
    }

    /// A failed response
    pub fn failure(status: u16, error: ApiError) -> Self {
        Self {
            status,
            data: None,
            error: Some(error),
        }
    }

    /// Whether the call succeeded
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Transform the payload, keeping status and error
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ApiResponse<U> {
        ApiResponse {
            status: self.status,
            data: self.data.map(f),
            error: self.error,
        }
    }

    /// Split into the success payload or the normalized error
    pub fn into_result(self) -> std::result::Result<Option<T>, ApiError> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(self.data),
        }
    }
}

/// Error body sent by the backend on failure
#[derive(Deserialize)]
struct ErrorBody {
    error: Option<String>,
    details: Option<String>,
}

/// HTTP client for the management backend
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    /// Build a client from a validated configuration
    pub fn new(config: &Config) -> Result<Self> {
        config.validate()?;
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| Error::client(format!("failed to build http client: {e}")))?;
        Ok(Self {
            http,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Base URL requests are sent to
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{endpoint}", self.base_url)
    }

    /// `GET` a JSON resource
    pub async fn get<T: DeserializeOwned>(&self, endpoint: &str) -> ApiResponse<T> {
        self.request::<T, ()>(Method::GET, endpoint, None).await
    }

    /// `POST` a JSON body
    pub async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        endpoint: &str,
        body: &B,
    ) -> ApiResponse<T> {
        self.request(Method::POST, endpoint, Some(body)).await
    }

    /// `PATCH` a JSON body
    pub async fn patch<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        endpoint: &str,
        body: &B,
    ) -> ApiResponse<T> {
        self.request(Method::PATCH, endpoint, Some(body)).await
    }

    /// `DELETE` a resource
    pub async fn delete<T: DeserializeOwned>(&self, endpoint: &str) -> ApiResponse<T> {
        self.request::<T, ()>(Method::DELETE, endpoint, None).await
    }

    /// Send a JSON request and normalize the outcome
    pub async fn request<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<&B>,
    ) -> ApiResponse<T> {
        let mut builder = self
            .http
            .request(method.clone(), self.url(endpoint))
            .header(CONTENT_TYPE, "application/json");
        if let Some(body) = body {
            builder = builder.json(body);
        }

        let response = match builder.send().await {
            Ok(r) => r,
            Err(e) => {
                warn!(%method, endpoint, error = %e, "Request failed without response");
                return ApiResponse::failure(0, ApiError::network(e));
            }
        };

        let status = response.status();
        debug!(%method, endpoint, status = status.as_u16(), "Response received");

        if !status.is_success() {
            return Self::error_response(response).await;
        }

        let bytes = match response.bytes().await {
            Ok(b) => b,
            Err(e) => return ApiResponse::failure(status.as_u16(), ApiError::network(e)),
        };

        if status == StatusCode::NO_CONTENT || bytes.iter().all(u8::is_ascii_whitespace) {
            return ApiResponse::empty(status.as_u16());
        }

        match serde_json::from_slice(&bytes) {
            Ok(data) => ApiResponse::ok(status.as_u16(), data),
            Err(e) => {
                warn!(%method, endpoint, error = %e, "Undecodable success body");
                ApiResponse::failure(status.as_u16(), ApiError::invalid_response(e))
            }
        }
    }

    /// `GET` a resource as raw text, bypassing JSON handling.
    ///
    /// The body is passed through byte for byte; a body that is not valid
    /// UTF-8 is an invalid response rather than being repaired.
    pub async fn get_text(&self, endpoint: &str) -> ApiResponse<String> {
        match self.get_raw(endpoint, "text/plain").await {
            Ok((status, bytes)) => match String::from_utf8(bytes.to_vec()) {
                Ok(text) => ApiResponse::ok(status, text),
                Err(e) => {
                    warn!(endpoint, "Text response is not valid UTF-8");
                    ApiResponse::failure(status, ApiError::invalid_response(e))
                }
            },
            Err(failure) => failure,
        }
    }

    /// `GET` a resource as raw bytes (images)
    pub async fn get_bytes(&self, endpoint: &str) -> ApiResponse<Bytes> {
        match self.get_raw(endpoint, "*/*").await {
            Ok((status, bytes)) => ApiResponse::ok(status, bytes),
            Err(failure) => failure,
        }
    }

    async fn get_raw<T>(
        &self,
        endpoint: &str,
        accept: &str,
    ) -> std::result::Result<(u16, Bytes), ApiResponse<T>> {
        let response = self
            .http
            .get(self.url(endpoint))
            .header(ACCEPT, accept)
            .send()
            .await
            .map_err(|e| {
                warn!(endpoint, error = %e, "Request failed without response");
                ApiResponse::failure(0, ApiError::network(e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let reason = reason_phrase(status);
            let text = response.text().await.unwrap_or_default();
            let details = if text.trim().is_empty() {
                reason
            } else {
                text.trim().to_string()
            };
            return Err(ApiResponse::failure(
                status.as_u16(),
                ApiError::http(status.as_u16(), details),
            ));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ApiResponse::failure(status.as_u16(), ApiError::network(e)))?;
        Ok((status.as_u16(), bytes))
    }

    async fn error_response<T>(response: Response) -> ApiResponse<T> {
        let status = response.status();
        let code = status.as_u16();
        let reason = reason_phrase(status);
        let text = response.text().await.unwrap_or_default();

        let error = match serde_json::from_str::<ErrorBody>(&text) {
            Ok(body) => ApiError::new(
                body.error
                    .filter(|e| !e.is_empty())
                    .unwrap_or_else(|| format!("HTTP {code} error")),
                body.details,
            ),
            Err(_) => ApiError::http(code, reason),
        };
        debug!(status = code, error = %error, "Backend reported failure");
        ApiResponse::failure(code, error)
    }
}

fn reason_phrase(status: StatusCode) -> String {
    status.canonical_reason().unwrap_or_default().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_segment() {
        assert_eq!(encode_segment("abc"), "abc");
        assert_eq!(
            encode_segment("xTIBA5rboUvnH4htodjb6e697QjLERt1NAB4mZqp8Dg="),
            "xTIBA5rboUvnH4htodjb6e697QjLERt1NAB4mZqp8Dg%3D"
        );
        assert_eq!(encode_segment("a/b+c"), "a%2Fb%2Bc");
        assert_eq!(encode_segment("it's (ok)!~*"), "it's%20(ok)!~*");
    }

    #[test]
    fn test_api_error_constructors() {
        let e = ApiError::network("connection refused");
        assert_eq!(e.error, "Network error");
        assert_eq!(e.details.as_deref(), Some("connection refused"));
        assert_eq!(e.to_string(), "Network error: connection refused");

        let e = ApiError::http(502, "Bad Gateway");
        assert_eq!(e.error, "HTTP 502 error");

        let e = ApiError::new("not found", None);
        assert_eq!(e.to_string(), "not found");
    }

    #[test]
    fn test_api_error_serde() {
        let e: ApiError = serde_json::from_str(r#"{"error":"not found"}"#).unwrap();
        assert_eq!(e, ApiError::new("not found", None));
        let json = serde_json::to_string(&e).unwrap();
        assert_eq!(json, r#"{"error":"not found"}"#);
    }

    #[test]
    fn test_response_into_result() {
        let ok: ApiResponse<u8> = ApiResponse::ok(200, 7);
        assert!(ok.is_success());
        assert_eq!(ok.into_result(), Ok(Some(7)));

        let empty: ApiResponse<u8> = ApiResponse::empty(204);
        assert!(empty.is_success());
        assert_eq!(empty.into_result(), Ok(None));

        let failed: ApiResponse<u8> = ApiResponse::failure(0, ApiError::network("down"));
        assert!(!failed.is_success());
        assert_eq!(failed.into_result().unwrap_err().error, "Network error");
    }

    #[test]
    fn test_client_rejects_bad_config() {
        assert!(ApiClient::new(&Config::new("::nope::")).is_err());
        let client = ApiClient::new(&Config::new("http://127.0.0.1:8080/")).unwrap();
        assert_eq!(client.base_url(), "http://127.0.0.1:8080");
        assert_eq!(client.url("/peers"), "http://127.0.0.1:8080/peers");
    }
}
