use argon2::Error as Argon2Error;
use jsonwebtoken::errors::Error as JwtError;
use mongodb::{bson::de::Error as BsonDeError, error::Error as DbError};
use rocket::{
    http::Status,
    response::{self, Responder},
    serde::json::Json,
    Request, Response,
};
use serde::Serialize;
use thiserror::Error;

use crate::ledger::VoteRejection;
use crate::logging::RequestId;
use crate::model::{api::auth::InvalidRegistration, db::campaign::InvalidCampaign};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Db(#[from] DbError),
    #[error(transparent)]
    BsonDe(#[from] BsonDeError),
    #[error(transparent)]
    Jwt(#[from] JwtError),
    #[error(transparent)]
    Argon2(#[from] Argon2Error),
    #[error(transparent)]
    Vote(#[from] VoteRejection),
    #[error("{1}")]
    Status(Status, String),
}

impl Error {
    /// A 404 naming the kind of thing that is missing, never its ID.
    pub fn not_found(what: &str) -> Self {
        Self::Status(Status::NotFound, format!("{what} not found"))
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::Status(Status::BadRequest, message.into())
    }
}

impl From<InvalidRegistration> for Error {
    fn from(err: InvalidRegistration) -> Self {
        Self::bad_request(err.to_string())
    }
}

impl From<InvalidCampaign> for Error {
    fn from(err: InvalidCampaign) -> Self {
        Self::bad_request(err.to_string())
    }
}

/// HTTP status for each kind of vote rejection.
fn rejection_status(rejection: &VoteRejection) -> Status {
    match rejection {
        VoteRejection::CampaignClosed(_) => Status::Forbidden,
        VoteRejection::DuplicatePosition | VoteRejection::QuotaExhausted { .. } => Status::Conflict,
        VoteRejection::NotFound(_) => Status::NotFound,
    }
}

/// JSON body of every error response.
#[derive(Debug, Serialize)]
struct ErrorBody {
    kind: &'static str,
    message: String,
}

impl<'r, 'o: 'r> Responder<'r, 'o> for Error {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'o> {
        let (status, body) = match self {
            Self::Vote(rejection) => (
                rejection_status(&rejection),
                ErrorBody {
                    kind: rejection.kind(),
                    message: rejection.to_string(),
                },
            ),
            Self::Status(status, message) => (
                status,
                ErrorBody {
                    kind: status.reason().unwrap_or("Error"),
                    message,
                },
            ),
            other => {
                // Details stay in the log.
                let id = req.local_cache(RequestId::next);
                error!("rsp{id} internal error: {other}");
                (
                    Status::InternalServerError,
                    ErrorBody {
                        kind: "Internal",
                        message: "Internal server error".to_string(),
                    },
                )
            }
        };
        Response::build_from(Json(body).respond_to(req)?)
            .status(status)
            .ok()
    }
}
