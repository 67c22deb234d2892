//! Error types for DCE operations.
//!
//! This module provides the error type hierarchy for DCE and container-engine
//! operations, including the classification of failed HTTP responses into
//! typed API errors.

use reqwest::StatusCode;
use std::fmt;
use thiserror::Error;

/// Substrings of an engine explanation that identify a missing image.
const IMAGE_NOT_FOUND_MARKERS: [&str; 3] = [
    "No such image",
    "not found: does not exist or no pull access",
    "repository does not exist",
];

/// Main error type for DCE operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// The server answered with a client or server error status
    #[error(transparent)]
    Api(#[from] ApiError),

    /// Server version is outside the supported range
    #[error("Invalid version: {0}")]
    InvalidVersion(String),

    /// Operation timed out
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// Endpoint could not be reached
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// HTTP request failed at the transport level
    #[error("HTTP request failed: {0}")]
    HttpError(String),

    /// Response body could not be decoded
    #[error("Failed to parse response: {0}")]
    ParseError(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Invalid endpoint
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// Cluster topology could not be resolved
    #[error("Discovery failed: {0}")]
    DiscoveryFailed(String),
}

/// Specialized result type for DCE operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Returns the error code for this error type.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Api(err) => err.kind().error_code(),
            Self::InvalidVersion(_) => "INVALID_VERSION",
            Self::Timeout(_) => "TIMEOUT",
            Self::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
            Self::HttpError(_) => "HTTP_ERROR",
            Self::ParseError(_) => "PARSE_ERROR",
            Self::ConfigError(_) => "CONFIG_ERROR",
            Self::InvalidEndpoint(_) => "INVALID_ENDPOINT",
            Self::DiscoveryFailed(_) => "DISCOVERY_FAILED",
        }
    }

    /// Returns the API error when the failure came from an HTTP status.
    #[must_use]
    pub const fn api_error(&self) -> Option<&ApiError> {
        match self {
            Self::Api(err) => Some(err),
            _ => None,
        }
    }

    /// Returns true for not-found failures, including missing images.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.api_error().is_some_and(ApiError::is_not_found)
    }

    /// Returns the HTTP status code of an API error, if any.
    #[must_use]
    pub fn status_code(&self) -> Option<u16> {
        self.api_error().and_then(ApiError::status_code)
    }
}

/// Refinement of an [`ApiError`], selected at classification time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiErrorKind {
    /// Any non-success status without a more specific meaning
    Generic,
    /// 404 for a resource other than an image
    NotFound,
    /// 404 whose explanation names a missing image or repository
    ImageNotFound,
    /// 401
    NotAuthorized,
}

impl ApiErrorKind {
    /// Returns the error code for this kind.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::Generic => "API_ERROR",
            Self::NotFound => "NOT_FOUND",
            Self::ImageNotFound => "IMAGE_NOT_FOUND",
            Self::NotAuthorized => "NOT_AUTHORIZED",
        }
    }
}

/// Details of the HTTP response that produced an [`ApiError`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseInfo {
    /// HTTP status code
    pub status: u16,
    /// Canonical reason phrase for the status
    pub reason: String,
    /// Final request URL
    pub url: String,
}

/// An HTTP error returned by the DCE or engine API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    kind: ApiErrorKind,
    cause: String,
    response: Option<ResponseInfo>,
    explanation: Option<String>,
}

impl ApiError {
    /// Create an API error from its parts.
    #[must_use]
    pub fn new(
        kind: ApiErrorKind,
        cause: impl Into<String>,
        response: Option<ResponseInfo>,
        explanation: Option<String>,
    ) -> Self {
        Self {
            kind,
            cause: cause.into(),
            response,
            explanation,
        }
    }

    /// Classify a failed response from its status, URL and raw body.
    #[must_use]
    pub fn classify(status: StatusCode, url: &str, body: &[u8]) -> Self {
        let explanation = extract_explanation(body);

        let kind = match status {
            StatusCode::UNAUTHORIZED => ApiErrorKind::NotAuthorized,
            StatusCode::NOT_FOUND => {
                let image_missing = explanation.as_deref().is_some_and(|text| {
                    IMAGE_NOT_FOUND_MARKERS
                        .iter()
                        .any(|marker| text.contains(marker))
                });
                if image_missing {
                    ApiErrorKind::ImageNotFound
                } else {
                    ApiErrorKind::NotFound
                }
            }
            _ => ApiErrorKind::Generic,
        };

        let reason = status.canonical_reason().unwrap_or_default().to_string();
        let class = if status.is_client_error() {
            "Client Error"
        } else if status.is_server_error() {
            "Server Error"
        } else {
            "Error"
        };
        let cause = format!("{} {class}: {reason} for url: {url}", status.as_u16());

        Self {
            kind,
            cause,
            response: Some(ResponseInfo {
                status: status.as_u16(),
                reason,
                url: url.to_string(),
            }),
            explanation,
        }
    }

    /// Consume a failed response and classify it.
    pub async fn from_response(response: reqwest::Response) -> Self {
        let status = response.status();
        let url = response.url().to_string();
        let body = response.bytes().await.map(|b| b.to_vec()).unwrap_or_default();
        Self::classify(status, &url, &body)
    }

    /// The refinement selected for this error.
    #[must_use]
    pub const fn kind(&self) -> ApiErrorKind {
        self.kind
    }

    /// Text of the original failure.
    #[must_use]
    pub fn cause(&self) -> &str {
        &self.cause
    }

    /// The response that produced this error, if any.
    #[must_use]
    pub const fn response(&self) -> Option<&ResponseInfo> {
        self.response.as_ref()
    }

    /// Explanation extracted from the response body.
    #[must_use]
    pub fn explanation(&self) -> Option<&str> {
        self.explanation.as_deref()
    }

    /// HTTP status code, if a response is attached.
    #[must_use]
    pub fn status_code(&self) -> Option<u16> {
        self.response.as_ref().map(|r| r.status)
    }

    /// Returns true for 4xx responses.
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_some_and(|s| (400..500).contains(&s))
    }

    /// Returns true for 5xx responses.
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_some_and(|s| (500..600).contains(&s))
    }

    /// Returns true for not-found errors; a missing image is also not found.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(
            self.kind,
            ApiErrorKind::NotFound | ApiErrorKind::ImageNotFound
        )
    }

    /// Returns true for authorization failures.
    #[must_use]
    pub const fn is_not_authorized(&self) -> bool {
        matches!(self.kind, ApiErrorKind::NotAuthorized)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.response {
            Some(response) if self.is_client_error() => {
                write!(f, "{} Client Error: {}", response.status, response.reason)?;
            }
            Some(response) if self.is_server_error() => {
                write!(f, "{} Server Error: {}", response.status, response.reason)?;
            }
            _ => f.write_str(&self.cause)?,
        }

        if let Some(explanation) = self.explanation.as_deref() {
            write!(f, " (\"{explanation}\")")?;
        }

        Ok(())
    }
}

impl std::error::Error for ApiError {}

/// Pull a human-readable explanation out of an error body.
///
/// Prefers the JSON `message` field and falls back to the trimmed body text.
fn extract_explanation(body: &[u8]) -> Option<String> {
    if let Ok(serde_json::Value::Object(map)) = serde_json::from_slice(body) {
        if let Some(message) = map.get("message") {
            return match message {
                serde_json::Value::String(text) => Some(text.clone()),
                serde_json::Value::Null => None,
                other => Some(other.to_string()),
            };
        }
    }

    let text = String::from_utf8_lossy(body).trim().to_string();
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

// Conversions from external error types
impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else if err.is_connect() {
            Self::ServiceUnavailable(err.to_string())
        } else if err.is_decode() {
            Self::ParseError(err.to_string())
        } else if err.is_builder() {
            Self::InvalidEndpoint(err.to_string())
        } else {
            Self::HttpError(err.to_string())
        }
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Self::InvalidEndpoint(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::ParseError(err.to_string())
    }
}

impl From<validator::ValidationErrors> for Error {
    fn from(err: validator::ValidationErrors) -> Self {
        Self::ConfigError(err.to_string())
    }
}

impl From<semver::Error> for Error {
    fn from(err: semver::Error) -> Self {
        Self::InvalidVersion(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const URL: &str = "http://dce.example.com/dce/info";

    #[test]
    fn test_unauthorized_ignores_body() {
        let err = ApiError::classify(StatusCode::UNAUTHORIZED, URL, b"No such image: busybox");
        assert_eq!(err.kind(), ApiErrorKind::NotAuthorized);
        assert!(err.is_not_authorized());
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_not_found_with_image_markers() {
        for body in [
            r#"{"message": "No such image: busybox:latest"}"#,
            r#"{"message": "pull access denied for foo, repository does not exist"}"#,
            "manifest for foo not found: does not exist or no pull access",
        ] {
            let err = ApiError::classify(StatusCode::NOT_FOUND, URL, body.as_bytes());
            assert_eq!(err.kind(), ApiErrorKind::ImageNotFound, "body: {body}");
            assert!(err.is_not_found());
        }
    }

    #[test]
    fn test_plain_not_found() {
        let err = ApiError::classify(
            StatusCode::NOT_FOUND,
            URL,
            br#"{"message": "service dce_base not found"}"#,
        );
        assert_eq!(err.kind(), ApiErrorKind::NotFound);
        assert_eq!(err.explanation(), Some("service dce_base not found"));

        let empty = ApiError::classify(StatusCode::NOT_FOUND, URL, b"");
        assert_eq!(empty.kind(), ApiErrorKind::NotFound);
        assert!(empty.explanation().is_none());
    }

    #[test]
    fn test_other_statuses_are_generic() {
        for status in [
            StatusCode::BAD_REQUEST,
            StatusCode::FORBIDDEN,
            StatusCode::CONFLICT,
            StatusCode::INTERNAL_SERVER_ERROR,
            StatusCode::SERVICE_UNAVAILABLE,
        ] {
            let err = ApiError::classify(status, URL, b"No such image");
            assert_eq!(err.kind(), ApiErrorKind::Generic);
        }
    }

    #[test]
    fn test_explanation_falls_back_to_trimmed_text() {
        let err = ApiError::classify(StatusCode::BAD_REQUEST, URL, b"  bad things happened \n");
        assert_eq!(err.explanation(), Some("bad things happened"));

        let err = ApiError::classify(StatusCode::BAD_REQUEST, URL, br#"{"error": "x"}"#);
        assert_eq!(err.explanation(), Some(r#"{"error": "x"}"#));
    }

    #[test]
    fn test_client_error_display() {
        let err = ApiError::classify(
            StatusCode::NOT_FOUND,
            URL,
            br#"{"message": "No such image: busybox"}"#,
        );
        assert_eq!(
            err.to_string(),
            "404 Client Error: Not Found (\"No such image: busybox\")"
        );
    }

    #[test]
    fn test_server_error_display_without_explanation() {
        let err = ApiError::classify(StatusCode::BAD_GATEWAY, URL, b"");
        assert_eq!(err.to_string(), "502 Server Error: Bad Gateway");
        assert!(err.is_server_error());
        assert!(!err.is_client_error());
    }

    #[test]
    fn test_error_without_response_renders_cause() {
        let err = ApiError::new(ApiErrorKind::Generic, "connection reset", None, None);
        assert_eq!(err.to_string(), "connection reset");
        assert!(err.status_code().is_none());
        assert!(!err.is_client_error());
    }

    #[test]
    fn test_response_info_is_kept() {
        let err = ApiError::classify(StatusCode::UNAUTHORIZED, URL, b"denied");
        let response = err.response().unwrap();
        assert_eq!(response.status, 401);
        assert_eq!(response.reason, "Unauthorized");
        assert_eq!(response.url, URL);
        assert!(err.cause().starts_with("401 Client Error: Unauthorized"));
    }

    #[test]
    fn test_error_codes() {
        let not_found: Error = ApiError::classify(StatusCode::NOT_FOUND, URL, b"").into();
        assert_eq!(not_found.error_code(), "NOT_FOUND");
        assert!(not_found.is_not_found());
        assert_eq!(not_found.status_code(), Some(404));

        assert_eq!(
            Error::InvalidVersion("test".to_string()).error_code(),
            "INVALID_VERSION"
        );
        assert_eq!(Error::Timeout("test".to_string()).error_code(), "TIMEOUT");
        assert_eq!(
            Error::DiscoveryFailed("test".to_string()).error_code(),
            "DISCOVERY_FAILED"
        );
        assert!(!Error::ConfigError("test".to_string()).is_not_found());
    }

    #[test]
    fn test_api_error_display_is_transparent() {
        let err: Error = ApiError::classify(StatusCode::UNAUTHORIZED, URL, b"").into();
        assert_eq!(err.to_string(), "401 Client Error: Unauthorized");
    }

    #[test]
    fn test_from_url_parse_error() {
        let err = url::Url::parse("not a url").unwrap_err();
        let dce_err: Error = err.into();
        assert!(matches!(dce_err, Error::InvalidEndpoint(_)));
    }

    #[test]
    fn test_from_serde_json_error() {
        let err = serde_json::from_str::<serde_json::Value>("{invalid json}").unwrap_err();
        let dce_err: Error = err.into();
        assert!(matches!(dce_err, Error::ParseError(_)));
    }

    #[test]
    fn test_from_semver_error() {
        let err = semver::Version::parse("not-a-version").unwrap_err();
        let dce_err: Error = err.into();
        assert_eq!(dce_err.error_code(), "INVALID_VERSION");
    }
}
