// Crate-wide error type
//
// Every fallible operation returns `Result<T>`. The HTTP layer turns an
// `Error` into a status code plus a JSON `{ "error": ... }` body.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serde_json error: {0}")]
    SerdeJson(#[from] serde_json::Error),

    #[error("invalid config file: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("API request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("completion returned no text")]
    EmptyCompletion,

    #[error("no API key configured for provider '{0}'")]
    MissingApiKey(String),

    #[error("credential store error: {0}")]
    Credential(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("a submission is already in progress")]
    Busy,

    #[error("unknown form field '{0}'")]
    UnknownField(String),

    #[error("log row {index} out of range (log has {len} rows)")]
    RowOutOfRange { index: usize, len: usize },
}

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::Busy => StatusCode::CONFLICT,
            Error::UnknownField(_) | Error::Credential(_) => StatusCode::BAD_REQUEST,
            Error::MissingApiKey(_) => StatusCode::BAD_REQUEST,
            Error::RowOutOfRange { .. } => StatusCode::NOT_FOUND,
            Error::Http(_) | Error::Api { .. } | Error::EmptyCompletion => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(serde::Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        (status, Json(ErrorBody { error: self.to_string() })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(Error::Busy.status_code(), StatusCode::CONFLICT);
        assert_eq!(Error::EmptyCompletion.status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(
            Error::RowOutOfRange { index: 3, len: 1 }.status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            Error::Config("bad".to_string()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_api_error_message() {
        let err = Error::Api { status: 429, body: "rate limited".to_string() };
        assert_eq!(err.to_string(), "API error 429: rate limited");
    }
}
