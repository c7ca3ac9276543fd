use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;

/// Errors surfaced by the incremental ingestion client.
#[derive(Debug, Error)]
pub enum IngestionError {
    /// The backend answered with a non-2xx status.
    #[error("{message}")]
    Response {
        status: u16,
        status_text: String,
        body: String,
        message: String,
    },

    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to decode response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("discovery failed for plugin '{plugin_id}': {message}")]
    Discovery { plugin_id: String, message: String },
}

impl IngestionError {
    /// Build a [`IngestionError::Response`] from a failed response.
    ///
    /// The message is taken from an `{"error": {"message": ..}}` body when
    /// present, else it names the status.
    pub fn from_response(status: StatusCode, body: String) -> Self {
        let status_text = status.canonical_reason().unwrap_or_default().to_string();
        let message = serde_json::from_str::<Value>(&body)
            .ok()
            .and_then(|v| {
                v.pointer("/error/message")
                    .and_then(Value::as_str)
                    .map(str::to_string)
            })
            .unwrap_or_else(|| format!("Request failed with {} {}", status.as_u16(), status_text));
        Self::Response {
            status: status.as_u16(),
            status_text,
            body,
            message,
        }
    }

    /// HTTP status for response errors.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Response { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Errors raised by the in-memory engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("Provider '{0}' not found")]
    UnknownProvider(String),
}

impl EngineError {
    /// Error name carried in JSON error bodies.
    pub fn name(&self) -> &'static str {
        match self {
            Self::UnknownProvider(_) => "NotFoundError",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_error_prefers_body_message() {
        let body = r#"{"error":{"name":"NotFoundError","message":"Provider 'x' not found"}}"#;
        let err = IngestionError::from_response(StatusCode::NOT_FOUND, body.to_string());
        assert_eq!(err.status(), Some(404));
        assert_eq!(err.to_string(), "Provider 'x' not found");
        match err {
            IngestionError::Response { status_text, body: b, .. } => {
                assert_eq!(status_text, "Not Found");
                assert_eq!(b, body);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn response_error_falls_back_to_status_line() {
        let err =
            IngestionError::from_response(StatusCode::INTERNAL_SERVER_ERROR, "boom".to_string());
        assert_eq!(err.to_string(), "Request failed with 500 Internal Server Error");
    }
}
