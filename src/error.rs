use thiserror::Error;

/// Type alias for Result with GmailError
pub type Result<T> = std::result::Result<T, GmailError>;

/// Error types for the auto-responder
#[derive(Error, Debug)]
pub enum GmailError {
    /// Gmail API returned an error
    #[error("Gmail API error: {0}")]
    ApiError(String),

    /// Authentication failed
    #[error("Authentication failed: {0}")]
    AuthError(String),

    /// Rate limit exceeded - should retry after specified seconds
    #[error("Rate limit exceeded, retry after {retry_after} seconds")]
    RateLimitExceeded { retry_after: u64 },

    /// Network-related error (connection issues, etc.)
    #[error("Network error: {0}")]
    NetworkError(String),

    /// A single API call did not complete in time
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    /// Server returned 5xx error
    #[error("Server error (HTTP {status}): {message}")]
    ServerError { status: u16, message: String },

    /// Resource not found (404)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bad request (400)
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Forbidden (403)
    #[error("Access forbidden: {0}")]
    Forbidden(String),

    /// Message is missing a field we need (id, thread id, From header, ...)
    #[error("Invalid message format: {0}")]
    InvalidMessageFormat(String),

    /// Outgoing reply could not be built or sent
    #[error("Send failed: {0}")]
    SendError(String),

    /// IO error (file operations, etc.)
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl GmailError {
    /// Check if the error is transient and should be retried
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            GmailError::RateLimitExceeded { .. }
                | GmailError::ServerError { .. }
                | GmailError::NetworkError(_)
                | GmailError::Timeout(_)
        )
    }
}

/// Parse the Retry-After header (delay-seconds form) from an HTTP response.
///
/// Missing or non-numeric values fall back to 5 seconds.
fn parse_retry_after_header<B>(response: &hyper::Response<B>) -> u64 {
    const DEFAULT_RETRY_AFTER: u64 = 5;

    response
        .headers()
        .get("retry-after")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok())
        .unwrap_or(DEFAULT_RETRY_AFTER)
}

impl From<google_gmail1::Error> for GmailError {
    fn from(error: google_gmail1::Error) -> Self {
        match error {
            // HTTP response with status code (non-success responses)
            google_gmail1::Error::Failure(ref response) => {
                let status = response.status();
                let status_code = status.as_u16();
                let message = format!(
                    "HTTP {}: {}",
                    status_code,
                    status.canonical_reason().unwrap_or("Unknown")
                );

                match status_code {
                    429 => GmailError::RateLimitExceeded {
                        retry_after: parse_retry_after_header(response),
                    },
                    404 => GmailError::NotFound(message),
                    400 => GmailError::BadRequest(message),
                    401 => GmailError::AuthError(message),
                    403 => GmailError::Forbidden(message),
                    500..=599 => GmailError::ServerError {
                        status: status_code,
                        message,
                    },
                    _ => GmailError::ApiError(message),
                }
            }
            google_gmail1::Error::BadRequest(ref err) => GmailError::BadRequest(format!("{}", err)),
            google_gmail1::Error::HttpError(ref err) => {
                GmailError::NetworkError(format!("Connection error: {}", err))
            }
            google_gmail1::Error::Io(err) => GmailError::NetworkError(err.to_string()),
            _ => GmailError::ApiError(error.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_errors() {
        let rate_limit = GmailError::RateLimitExceeded { retry_after: 5 };
        assert!(rate_limit.is_transient());

        let server_error = GmailError::ServerError {
            status: 503,
            message: "Service unavailable".to_string(),
        };
        assert!(server_error.is_transient());

        assert!(GmailError::NetworkError("reset".to_string()).is_transient());
        assert!(GmailError::Timeout(30).is_transient());
    }

    #[test]
    fn test_permanent_errors() {
        assert!(!GmailError::BadRequest("Invalid query".to_string()).is_transient());
        assert!(!GmailError::NotFound("msg123".to_string()).is_transient());
        assert!(!GmailError::Forbidden("Access denied".to_string()).is_transient());
        assert!(!GmailError::SendError("rejected".to_string()).is_transient());
        assert!(!GmailError::AuthError("expired".to_string()).is_transient());
    }

    #[test]
    fn test_error_display() {
        let display = GmailError::RateLimitExceeded { retry_after: 10 }.to_string();
        assert!(display.contains("Rate limit exceeded"));
        assert!(display.contains("10 seconds"));

        let display = GmailError::Timeout(60).to_string();
        assert_eq!(display, "Request timed out after 60 seconds");
    }

    #[test]
    fn test_parse_retry_after_header_integer() {
        let mut response = hyper::Response::builder().status(429).body(()).unwrap();
        response.headers_mut().insert(
            "retry-after",
            hyper::header::HeaderValue::from_static("120"),
        );

        assert_eq!(parse_retry_after_header(&response), 120);
    }

    #[test]
    fn test_parse_retry_after_header_missing() {
        let response = hyper::Response::builder().status(429).body(()).unwrap();
        assert_eq!(parse_retry_after_header(&response), 5);
    }

    #[test]
    fn test_parse_retry_after_header_http_date_falls_back() {
        let mut response = hyper::Response::builder().status(429).body(()).unwrap();
        response.headers_mut().insert(
            "retry-after",
            hyper::header::HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT"),
        );

        assert_eq!(parse_retry_after_header(&response), 5);
    }
}
