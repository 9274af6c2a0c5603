use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::rewrite::ConfigError;

/// API error response structure
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
  pub error: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub details: Option<String>,
}

impl ErrorResponse {
  pub fn new(error: impl Into<String>) -> Self {
    Self {
      error: error.into(),
      details: None,
    }
  }

  pub fn with_details(error: impl Into<String>, details: impl Into<String>) -> Self {
    Self {
      error: error.into(),
      details: Some(details.into()),
    }
  }
}

/// Admin surface error type
#[derive(Debug)]
pub enum AppError {
  Config(ConfigError),
}

impl IntoResponse for AppError {
  fn into_response(self) -> Response {
    match self {
      AppError::Config(config_err) => {
        tracing::error!(%config_err, "config reload failed, keeping current settings");

        let (status, body) = match &config_err {
          ConfigError::ConfigUnreadable { .. } => (
            StatusCode::INTERNAL_SERVER_ERROR,
            // Don't expose filesystem details
            ErrorResponse::new("Config file could not be read"),
          ),
          ConfigError::ConfigInvalid { source, .. } => (
            StatusCode::UNPROCESSABLE_ENTITY,
            ErrorResponse::with_details("Config file is invalid", source.message()),
          ),
        };

        (status, Json(body)).into_response()
      }
    }
  }
}

impl From<ConfigError> for AppError {
  fn from(err: ConfigError) -> Self {
    AppError::Config(err)
  }
}
