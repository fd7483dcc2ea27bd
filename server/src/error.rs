//! HTTP error mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use api::AuthError;

/// An error ready to leave the process: status, stable code, message.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl ApiError {
    pub fn unauthorized(message: &str) -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            code: "UNAUTHORIZED",
            message: message.to_string(),
        }
    }

    pub fn forbidden(message: &str) -> Self {
        Self {
            status: StatusCode::FORBIDDEN,
            code: "FORBIDDEN",
            message: message.to_string(),
        }
    }

    pub fn payment_required(message: &str) -> Self {
        Self {
            status: StatusCode::PAYMENT_REQUIRED,
            code: "SUBSCRIPTION_REQUIRED",
            message: message.to_string(),
        }
    }

    pub fn bad_request(message: &str) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            code: "BAD_REQUEST",
            message: message.to_string(),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        let status = match &err {
            AuthError::MissingField(_) | AuthError::InvalidState => StatusCode::BAD_REQUEST,
            AuthError::InvalidCredentials
            | AuthError::InvalidSignature
            | AuthError::ExpiredAssertion
            | AuthError::TokenExpired
            | AuthError::TokenMalformed
            | AuthError::SessionRevoked
            | AuthError::SessionNotFound => StatusCode::UNAUTHORIZED,
            AuthError::UserNotFound => StatusCode::NOT_FOUND,
            AuthError::ProviderConflict
            | AuthError::DuplicateEmail
            | AuthError::DuplicateUsername => StatusCode::CONFLICT,
            AuthError::ProviderNotConfigured(_) => StatusCode::SERVICE_UNAVAILABLE,
            AuthError::Provider(_) => StatusCode::BAD_GATEWAY,
            AuthError::Database(_) | AuthError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let message = match &err {
            // Never expose backend detail to clients.
            AuthError::Database(e) => {
                tracing::error!("database error: {e:?}");
                "internal error".to_string()
            }
            AuthError::Internal(e) => {
                tracing::error!("internal error: {e}");
                "internal error".to_string()
            }
            AuthError::Provider(e) => {
                tracing::warn!("provider error: {e}");
                "identity provider unavailable".to_string()
            }
            other => other.to_string(),
        };

        Self {
            status,
            code: err.code(),
            message,
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: String,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn taxonomy_maps_to_stable_codes_and_statuses() {
        let err = ApiError::from(AuthError::TokenExpired);
        assert_eq!(err.status, StatusCode::UNAUTHORIZED);
        assert_eq!(err.code, "TOKEN_EXPIRED");

        let err = ApiError::from(AuthError::ProviderConflict);
        assert_eq!(err.status, StatusCode::CONFLICT);

        let err = ApiError::from(AuthError::InvalidState);
        assert_eq!(err.status, StatusCode::BAD_REQUEST);

        // Provider faults surface as a gateway problem without detail.
        let err = ApiError::from(AuthError::Provider("token endpoint 500".into()));
        assert_eq!(err.status, StatusCode::BAD_GATEWAY);
        assert_eq!(err.message, "identity provider unavailable");
    }
}
