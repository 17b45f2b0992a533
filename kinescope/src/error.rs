//! Error taxonomy shared by every component, mapped onto
//! [`actix_web::ResponseError`] so HTTP handlers can propagate it with `?`.

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use derive_more::{Display, Error};
use serde::Serialize;

/// Errors produced while operating the metadata store, catalog, planners,
/// schedule lookup, channel switcher and fairness picker.
#[derive(Debug, Display, Error)]
pub enum Error {
    /// Requested channel, series, or video id is unknown.
    #[display(fmt = "Not found: {}", _0)]
    NotFound(#[error(not(source))] String),

    /// Request failed validation (unknown `time_of_day`, empty required
    /// field, duplicate id, malformed JSON body, etc).
    #[display(fmt = "Bad request: {}", _0)]
    BadRequest(#[error(not(source))] String),

    /// Concurrent state change conflicts with the requested mutation.
    #[display(fmt = "Conflict: {}", _0)]
    Conflict(#[error(not(source))] String),

    /// Disk or subprocess failure.
    #[display(fmt = "I/O fault: {}", _0)]
    IoFault(std::io::Error),

    /// A persisted document failed to (de)serialize.
    #[display(fmt = "Malformed document: {}", _0)]
    Malformed(serde_json::Error),

    /// A loaded document violates an invariant (gaps/overlaps in a daily
    /// plan, for example) and must be discarded and regenerated rather than
    /// surfaced to the caller.
    #[display(fmt = "Invariant violated: {}", _0)]
    Invariant(#[error(not(source))] String),
}

impl Error {
    /// Shorthand for [`Error::NotFound`].
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    /// Shorthand for [`Error::BadRequest`].
    pub fn bad_request(what: impl Into<String>) -> Self {
        Self::BadRequest(what.into())
    }

    /// Shorthand for [`Error::Conflict`].
    pub fn conflict(what: impl Into<String>) -> Self {
        Self::Conflict(what.into())
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::IoFault(e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Malformed(e)
    }
}

/// Wire shape of an error response, normative per the HTTP surface.
#[derive(Serialize)]
struct Body {
    error: &'static str,
    cause: String,
}

impl ResponseError for Error {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::IoFault(_) | Self::Malformed(_) | Self::Invariant(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        let error = match self {
            Self::NotFound(_) => "not_found",
            Self::BadRequest(_) => "bad_request",
            Self::Conflict(_) => "conflict",
            Self::IoFault(_) => "io_fault",
            Self::Malformed(_) => "malformed",
            Self::Invariant(_) => "invariant_violation",
        };
        HttpResponse::build(self.status_code()).json(Body {
            error,
            cause: self.to_string(),
        })
    }
}
