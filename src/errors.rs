use std::fmt;
use std::io;
use std::path::PathBuf;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

/// Fatal startup failures. These are reported to stderr by the entry point
/// and the process exits non-zero without serving a single request.
#[derive(Debug)]
pub enum SetupError {
    NotADirectory(PathBuf),
    DirectoryAccess(PathBuf, io::Error),
    Bind(String, io::Error),
    Logger(log::SetLoggerError),
    Io(io::Error),
}

impl fmt::Display for SetupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SetupError::NotADirectory(path) => {
                write!(f, "Not a directory: {}", path.display())
            }
            SetupError::DirectoryAccess(path, e) => {
                write!(f, "Couldn't access {}: {}", path.display(), e)
            }
            SetupError::Bind(addr, e) => write!(f, "Couldn't listen on {}: {}", addr, e),
            SetupError::Logger(e) => write!(f, "Couldn't set up logging: {}", e),
            SetupError::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl From<io::Error> for SetupError {
    fn from(err: io::Error) -> Self {
        SetupError::Io(err)
    }
}

impl From<log::SetLoggerError> for SetupError {
    fn from(err: log::SetLoggerError) -> Self {
        SetupError::Logger(err)
    }
}

/// Per-request failures. Every variant maps to a short plain-text body;
/// internal detail is logged, never sent to the client.
#[derive(Debug)]
pub enum ServeError {
    NotFound,
    Forbidden,
    Io(io::Error),
    Render(String),
}

impl From<io::Error> for ServeError {
    fn from(err: io::Error) -> Self {
        ServeError::Io(err)
    }
}

impl IntoResponse for ServeError {
    fn into_response(self) -> Response {
        match self {
            ServeError::NotFound => (StatusCode::NOT_FOUND, "404: Not found").into_response(),
            ServeError::Forbidden => (StatusCode::FORBIDDEN, "403: Forbidden").into_response(),
            ServeError::Io(e) => {
                log::error!("request failed with I/O error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "500: Internal server error",
                )
                    .into_response()
            }
            ServeError::Render(e) => {
                log::error!("request failed with render error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "500: Internal server error",
                )
                    .into_response()
            }
        }
    }
}
