use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::rejection::{ContentLengthLimitRejection, JsonRejection};
use axum::http::{StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Json;

use serde::Serialize;

pub type Payload<T> = Result<(StatusCode, Json<Success<T>>), Error>;

pub fn proceeds<V>(value: V) -> Payload<V>
where
    V: Serialize,
{
    Ok((StatusCode::OK, Json(Success::of(value))))
}

pub fn created<V>(value: V) -> Payload<V>
where
    V: Serialize,
{
    Ok((StatusCode::CREATED, Json(Success::of(value))))
}

pub async fn handler404(path: Uri) -> Error {
    Error::NotFound {
        detail: format!("Invalid path: {}", path),
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Success<V> {
    success: bool,
    #[serde(flatten)]
    value: V,
}

impl<V: Serialize> Success<V> {
    pub fn of(value: V) -> Self {
        Self {
            success: true,
            value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "error")]
pub enum Error {
    NotFound { detail: String },
    InvalidPayload { detail: String },
    PayloadTooLarge { detail: String },
    StudentNotFound { detail: String },
    FaceMismatch { detail: String },
    VerificationFailed { detail: String },
    InternalError { kind: &'static str, detail: String },
}

impl Error {
    pub fn invalid<S: Into<String>>(detail: S) -> Error {
        Error::InvalidPayload {
            detail: detail.into(),
        }
    }

    pub fn student_not_found() -> Error {
        Error::StudentNotFound {
            detail: "Student not found".to_string(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Error::NotFound { .. } | Error::StudentNotFound { .. } => StatusCode::NOT_FOUND,
            Error::InvalidPayload { .. } | Error::VerificationFailed { .. } => {
                StatusCode::BAD_REQUEST
            }
            Error::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Error::FaceMismatch { .. } => StatusCode::UNAUTHORIZED,
            Error::InternalError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn detail(&self) -> &str {
        match self {
            Error::NotFound { detail }
            | Error::InvalidPayload { detail }
            | Error::PayloadTooLarge { detail }
            | Error::StudentNotFound { detail }
            | Error::FaceMismatch { detail }
            | Error::VerificationFailed { detail }
            | Error::InternalError { detail, .. } => detail,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        match &self {
            Error::InternalError { kind, detail } => log::error!("{}: {}", kind, detail),
            other => log::debug!("Rejected request: {}", other.detail()),
        }
        (self.status(), Json(self)).into_response()
    }
}

impl From<std::io::Error> for Error {
    fn from(io: std::io::Error) -> Self {
        Self::InternalError {
            kind: "IOError",
            detail: io.to_string(),
        }
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        Self::InternalError {
            kind: "DatabaseError",
            detail: err.to_string(),
        }
    }
}

impl From<MultipartError> for Error {
    fn from(err: MultipartError) -> Self {
        Self::InvalidPayload {
            detail: format!("Malformed form data: {}", err),
        }
    }
}

impl From<ContentLengthLimitRejection<MultipartRejection>> for Error {
    fn from(rejection: ContentLengthLimitRejection<MultipartRejection>) -> Self {
        match rejection {
            ContentLengthLimitRejection::PayloadTooLarge(too_large) => Self::PayloadTooLarge {
                detail: too_large.to_string(),
            },
            other => Self::InvalidPayload {
                detail: other.to_string(),
            },
        }
    }
}

impl From<JsonRejection> for Error {
    fn from(err: JsonRejection) -> Self {
        Self::InvalidPayload {
            detail: err.to_string(),
        }
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::InternalError {
            kind: "Unknown",
            detail: err.to_string(),
        }
    }
}
