//! Every failure a request can end in, and how each one is shown to the client.

use actix_web::{error::BlockingError, http::StatusCode, HttpResponse, ResponseError};
use diesel::r2d2::PoolError;
use log::error;
use serde_derive::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Bad request")]
    BadRequest,
    #[error("Not found")]
    NotFound,
    #[error("Method not allowed")]
    MethodNotAllowed,
    #[error("Unprocessable request")]
    Unprocessable,
    #[error("Internal Server Error")]
    Store(#[from] diesel::result::Error),
    #[error("Internal Server Error")]
    Pool(#[from] PoolError),
    #[error("Internal Server Error")]
    Blocking(#[from] BlockingError),
}

impl ApiError {
    /// A failed write is reported as a bad request so the client resubmits.
    pub fn into_bad_request(self) -> Self {
        match self {
            ApiError::Store(e) => {
                error!("Store rejected write: {}", e);
                ApiError::BadRequest
            }
            other => other,
        }
    }
}

/// JSON body of every error response.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct ErrorBody {
    pub success: bool,
    pub error: u16,
    pub message: String,
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest => StatusCode::BAD_REQUEST,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::Unprocessable => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Store(_) | ApiError::Pool(_) | ApiError::Blocking(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            error!("{:?}", self);
        }
        HttpResponse::build(status).json(ErrorBody {
            success: false,
            error: status.as_u16(),
            message: self.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;

    async fn body_of(err: ApiError) -> ErrorBody {
        let bytes = to_bytes(err.error_response().into_body()).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[actix_web::test]
    async fn renders_client_errors() {
        assert_eq!(
            body_of(ApiError::NotFound).await,
            ErrorBody {
                success: false,
                error: 404,
                message: "Not found".to_owned()
            }
        );
        assert_eq!(body_of(ApiError::BadRequest).await.message, "Bad request");
        assert_eq!(body_of(ApiError::Unprocessable).await.error, 422);
    }

    #[actix_web::test]
    async fn store_errors_are_internal() {
        let err = ApiError::from(diesel::result::Error::NotFound);
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_of(err).await;
        assert_eq!(body.error, 500);
        assert_eq!(body.message, "Internal Server Error");
    }

    #[test]
    fn failed_writes_become_bad_requests() {
        let err = ApiError::from(diesel::result::Error::RollbackTransaction).into_bad_request();
        assert!(matches!(err, ApiError::BadRequest));
        assert!(matches!(ApiError::NotFound.into_bad_request(), ApiError::NotFound));
    }
}
