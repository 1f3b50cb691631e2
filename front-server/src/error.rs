use std::error::Error as StdError;
use std::fmt;

use anyhow::Error as AnyError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use displaydoc::Display;
use serde::Serialize;
use tracing_error::SpanTrace;

pub type ServerResult<T> = Result<T, ServerError>;

/// The kind of an error.
#[derive(Debug, Display)]
pub enum ErrorKind {
    /// The server encountered an internal error or misconfiguration.
    InternalServerError,
    /// The URL you requested was not found.
    NotFound,
    /// General request error: {0}
    RequestError(AnyError),
    /// Chunk server already registered
    AlreadyRegistered,
    /// Not enough chunk servers available
    NotEnoughServers,
    /// Failed to upload file: {0}
    UploadError(AnyError),
    /// Failed to copy chunks: {0}
    DownloadError(AnyError),
}
impl ErrorKind {
    /// Returns a version of this error for clients.
    fn into_clients(self) -> Self {
        match self {
            Self::UploadError(_) => Self::InternalServerError,
            Self::DownloadError(_) => Self::InternalServerError,
            _ => self,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Self::InternalServerError => "InternalServerError",
            Self::NotFound => "NotFound",
            Self::RequestError(_) => "RequestError",
            Self::AlreadyRegistered => "AlreadyRegistered",
            Self::NotEnoughServers => "NotEnoughServers",
            Self::UploadError(_) => "UploadError",
            Self::DownloadError(_) => "DownloadError",
        }
    }
    fn http_status_code(&self) -> StatusCode {
        match self {
            Self::InternalServerError => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::RequestError(_) => StatusCode::BAD_REQUEST,
            Self::AlreadyRegistered => StatusCode::CONFLICT,
            Self::NotEnoughServers => StatusCode::INTERNAL_SERVER_ERROR,
            Self::UploadError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::DownloadError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Serialize)]
pub struct ErrorResponse {
    code: u16,
    error: String,
    message: String,
}

/// A server error.
#[derive(Debug)]
pub struct ServerError {
    /// The kind of the error.
    kind: ErrorKind,
    /// Context of where the error occurred.
    context: SpanTrace,
}
impl ServerError {
    pub fn request_error(error: impl StdError + Send + Sync + 'static) -> Self {
        ErrorKind::RequestError(AnyError::new(error)).into()
    }
}
impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.kind)?;
        self.context.fmt(f)?;
        Ok(())
    }
}
impl StdError for ServerError {}
impl From<ErrorKind> for ServerError {
    fn from(kind: ErrorKind) -> Self {
        Self {
            kind,
            context: SpanTrace::capture(),
        }
    }
}
impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        if matches!(
            self.kind,
            ErrorKind::RequestError(_) | ErrorKind::UploadError(_) | ErrorKind::DownloadError(_)
        ) {
            tracing::error!("{}", self);
        }

        let sanitized = self.kind.into_clients();

        let status_code = sanitized.http_status_code();
        let error_response = ErrorResponse {
            code: status_code.as_u16(),
            message: sanitized.to_string(),
            error: sanitized.name().to_string(),
        };

        (status_code, Json(error_response)).into_response()
    }
}
