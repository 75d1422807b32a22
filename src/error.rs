use axum::http::StatusCode;
use thiserror::Error;

/// Failures the landmark flow reports to the router.
///
/// Transport problems never reach this type raw; they are logged and folded
/// into `RecognitionUnavailable` or `FallbackFailure` where the call is made.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
  #[error("Configuration error: {0}")]
  Configuration(String),

  #[error("Image recognition service is unavailable.")]
  RecognitionUnavailable,

  #[error("Could not describe landmark '{0}'. Please try again later.")]
  FallbackFailure(String),

  #[error("Invalid image: {0}")]
  InvalidImage(String),

  #[error("Unsupported language '{0}', expected 'en' or 'zh'.")]
  UnknownLanguage(String),

  #[error("Landmark name must not be empty.")]
  EmptyLandmarkName,

  #[error("Manual entry is only available after image recognition fails.")]
  ManualEntryUnavailable,

  #[error("A request is already in progress for this session.")]
  SessionBusy,

  #[error("Session {0} not found.")]
  SessionNotFound(uuid::Uuid),

  #[error("Nothing to read aloud yet.")]
  NothingToSpeak,
}

impl ServiceError {
  pub fn code(&self) -> &'static str {
    match self {
      ServiceError::Configuration(_) => "configuration_error",
      ServiceError::RecognitionUnavailable => "recognition_unavailable",
      ServiceError::FallbackFailure(_) => "fallback_failed",
      ServiceError::InvalidImage(_) => "invalid_image",
      ServiceError::UnknownLanguage(_) => "unknown_language",
      ServiceError::EmptyLandmarkName => "empty_landmark_name",
      ServiceError::ManualEntryUnavailable => "manual_entry_unavailable",
      ServiceError::SessionBusy => "session_busy",
      ServiceError::SessionNotFound(_) => "session_not_found",
      ServiceError::NothingToSpeak => "nothing_to_speak",
    }
  }

  pub fn status(&self) -> StatusCode {
    match self {
      ServiceError::Configuration(_) | ServiceError::RecognitionUnavailable => {
        StatusCode::SERVICE_UNAVAILABLE
      }
      ServiceError::FallbackFailure(_) => StatusCode::BAD_GATEWAY,
      ServiceError::InvalidImage(_)
      | ServiceError::UnknownLanguage(_)
      | ServiceError::EmptyLandmarkName => StatusCode::BAD_REQUEST,
      ServiceError::ManualEntryUnavailable
      | ServiceError::SessionBusy
      | ServiceError::NothingToSpeak => StatusCode::CONFLICT,
      ServiceError::SessionNotFound(_) => StatusCode::NOT_FOUND,
    }
  }
}
