use serde::Deserialize;
use thiserror::Error;

/// Errors returned by the query endpoint.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Unauthorized - access token rejected")]
    Unauthorized,

    #[error("Request failed with status {status}: {}", summarize(.errors))]
    Fault { status: u16, errors: Vec<FaultError> },

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// One entry of the provider's `Fault.Error` list.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FaultError {
    #[serde(default)]
    pub code: String,

    #[serde(rename = "Message", default)]
    pub message: String,

    #[serde(rename = "Detail", default)]
    pub detail: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FaultBody {
    #[serde(rename = "Fault")]
    fault: Fault,
}

#[derive(Debug, Deserialize)]
struct Fault {
    #[serde(rename = "Error", default)]
    errors: Vec<FaultError>,
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            return body.to_string();
        }
        let mut end = MAX_ERROR_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
    }

    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        if status.as_u16() == 401 {
            return ApiError::Unauthorized;
        }

        if let Ok(parsed) = serde_json::from_str::<FaultBody>(body) {
            if !parsed.fault.errors.is_empty() {
                return ApiError::Fault {
                    status: status.as_u16(),
                    errors: parsed.fault.errors,
                };
            }
        }

        let truncated = Self::truncate_body(body);
        match status.as_u16() {
            500..=599 => ApiError::ServerError(truncated),
            _ => ApiError::InvalidResponse(format!("Status {}: {}", status, truncated)),
        }
    }
}

fn summarize(errors: &[FaultError]) -> String {
    errors
        .iter()
        .map(|e| match &e.detail {
            Some(detail) if !detail.is_empty() => {
                format!("[{}] {}: {}", e.code, e.message, detail)
            }
            _ => format!("[{}] {}", e.code, e.message),
        })
        .collect::<Vec<_>>()
        .join("; ")
}
