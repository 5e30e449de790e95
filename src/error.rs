use axum::{
    extract::{multipart::MultipartError, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Client-supplied data is malformed.
    #[error("{0}")]
    InvalidInput(String),

    /// A recognised upload whose kind we do not decode.
    #[error("{0}")]
    UnsupportedMediaType(String),

    /// A fetch or decode step downstream failed.
    #[error("{message}")]
    ExtractionFailed {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    /// The provider answered but the reply did not fit the expected shape,
    /// or the call itself failed. `raw` keeps the reply for diagnostics.
    #[error("{reason}")]
    SummarizationFailed { reason: String, raw: Option<String> },

    #[error("{0}")]
    Internal(String),
}

impl AppError {
    pub fn extraction(message: impl Into<String>) -> Self {
        AppError::ExtractionFailed {
            message: message.into(),
            source: None,
        }
    }

    pub fn extraction_with<E>(message: impl Into<String>, source: E) -> Self
    where
        E: Into<BoxError>,
    {
        AppError::ExtractionFailed {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    pub fn summarization(reason: impl Into<String>, raw: Option<String>) -> Self {
        AppError::SummarizationFailed {
            reason: reason.into(),
            raw,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::InvalidInput(_) | AppError::UnsupportedMediaType(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::ExtractionFailed { .. } | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AppError::SummarizationFailed { .. } => StatusCode::BAD_GATEWAY,
        }
    }

    /// Short message safe to hand to a client.
    pub fn detail(&self) -> String {
        match self {
            AppError::InvalidInput(msg) | AppError::UnsupportedMediaType(msg) => msg.clone(),
            // the source stays in the logs
            AppError::ExtractionFailed { message, .. } => {
                format!("Failed to extract content: {}", message)
            }
            AppError::SummarizationFailed { reason, .. } => reason.clone(),
            AppError::Internal(_) => "Internal Server Error".to_string(),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::InvalidInput(rejection.body_text())
    }
}

impl From<MultipartError> for AppError {
    fn from(err: MultipartError) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            AppError::InvalidInput("File exceeds the upload size limit".to_string())
        } else {
            AppError::InvalidInput(err.body_text())
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            AppError::SummarizationFailed { reason, raw } => {
                tracing::warn!(%reason, raw = raw.as_deref().unwrap_or(""), "summarization failed");
            }
            AppError::Internal(msg) => tracing::error!(error = %msg, "internal error"),
            _ => {}
        }
        (status, Json(json!({"detail": self.detail()}))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_map_to_status_codes() {
        assert_eq!(AppError::InvalidInput("x".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            AppError::UnsupportedMediaType("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::extraction("x").status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            AppError::summarization("x", None).status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            AppError::Internal("x".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn internal_detail_hides_message() {
        let err = AppError::Internal("panicked at src/secret.rs".into());
        assert_eq!(err.detail(), "Internal Server Error");
    }

    #[test]
    fn extraction_detail_hides_cause() {
        let cause = std::io::Error::new(
            std::io::ErrorKind::Other,
            "error sending request for url (http://10.0.0.7:8080/internal)",
        );
        let err = AppError::extraction_with("Upstream request failed", cause);
        assert_eq!(err.detail(), "Failed to extract content: Upstream request failed");
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn summarization_detail_omits_raw_reply() {
        let err = AppError::summarization(
            "Failed to parse OpenAI response",
            Some("not json at all".into()),
        );
        assert_eq!(err.detail(), "Failed to parse OpenAI response");
    }
}
