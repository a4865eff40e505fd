use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

use crate::models::auth::ErrorResponse;

#[derive(Debug, Clone, Error, Serialize, ToSchema)]
pub enum ServiceError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Permission Denied: {0}")]
    PermissionDenied(String),
    #[error("Not Found: {0}")]
    NotFound(String),
    #[error("Internal Error: {0}")]
    InternalError(String),
    #[error("Database Error: {0}")]
    DatabaseError(String),
    #[error("Validation Error: {0}")]
    ValidationError(String),
}

impl ServiceError {
    fn body(message: &str) -> ErrorResponse {
        ErrorResponse {
            status: "error".to_string(),
            message: message.to_string(),
        }
    }
}

impl ResponseError for ServiceError {
    fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ServiceError::PermissionDenied(_) => StatusCode::FORBIDDEN,
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::ValidationError(_) => StatusCode::BAD_REQUEST,
            ServiceError::InternalError(_) | ServiceError::DatabaseError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        match self {
            ServiceError::Unauthorized(msg) => {
                log::warn!("Unauthorized: {}", msg);
                HttpResponse::Unauthorized().json(Self::body(msg))
            }
            ServiceError::PermissionDenied(msg) => {
                log::warn!("Permission Denied: {}", msg);
                HttpResponse::Forbidden().json(Self::body(msg))
            }
            ServiceError::NotFound(msg) => {
                log::warn!("Not Found: {}", msg);
                HttpResponse::NotFound().json(Self::body(msg))
            }
            ServiceError::InternalError(msg) => {
                log::error!("Internal Error: {}", msg);
                // Internal details stay in the log
                HttpResponse::InternalServerError().json(Self::body("Something went wrong"))
            }
            ServiceError::DatabaseError(msg) => {
                log::error!("Database Error: {}", msg);
                HttpResponse::InternalServerError().json(Self::body("Database operation failed"))
            }
            ServiceError::ValidationError(msg) => {
                log::warn!("Validation Error: {}", msg);
                HttpResponse::BadRequest().json(Self::body(msg))
            }
        }
    }
}

// Convert sqlx errors to ServiceError
impl From<sqlx::Error> for ServiceError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => ServiceError::NotFound("Record not found".to_string()),
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                ServiceError::ValidationError(db_err.message().to_string())
            }
            sqlx::Error::Database(ref db_err) if db_err.is_foreign_key_violation() => {
                ServiceError::ValidationError("Referenced object does not exist".to_string())
            }
            _ => ServiceError::DatabaseError(err.to_string()),
        }
    }
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(err.to_string())
    }
}

// Convert bcrypt errors to ServiceError
impl From<bcrypt::BcryptError> for ServiceError {
    fn from(err: bcrypt::BcryptError) -> Self {
        ServiceError::InternalError(format!("Password hashing error: {}", err))
    }
}

// Convert JWT errors to ServiceError
impl From<jsonwebtoken::errors::Error> for ServiceError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        ServiceError::Unauthorized(format!("JWT error: {}", err))
    }
}

impl From<std::io::Error> for ServiceError {
    fn from(err: std::io::Error) -> Self {
        ServiceError::InternalError(format!("I/O error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(ServiceError::ValidationError("bad".into()), StatusCode::BAD_REQUEST)]
    #[case(ServiceError::Unauthorized("who".into()), StatusCode::UNAUTHORIZED)]
    #[case(ServiceError::PermissionDenied("no".into()), StatusCode::FORBIDDEN)]
    #[case(ServiceError::NotFound("gone".into()), StatusCode::NOT_FOUND)]
    #[case(ServiceError::DatabaseError("boom".into()), StatusCode::INTERNAL_SERVER_ERROR)]
    fn maps_variants_to_status(#[case] err: ServiceError, #[case] expected: StatusCode) {
        assert_eq!(err.status_code(), expected);
        assert_eq!(err.error_response().status(), expected);
    }

    #[test]
    fn row_not_found_becomes_not_found() {
        let err: ServiceError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }
}
