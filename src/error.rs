// Uniform operational-error taxonomy for the HTTP API.
use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};

use crate::config::Environment;

/// Every failure a handler can surface, with its HTTP-equivalent status.
/// All variants are operational (expected, user-facing) except `Unexpected`,
/// which is logged server-side and reported generically in production.
#[derive(Debug)]
pub enum ApiError {
    // 400
    InvalidField { field: String, value: String },
    ValidationFailed(Vec<String>),
    DuplicateValue(String),

    // 401
    TokenInvalid,
    TokenExpired,
    NoCredential(String),
    SubjectGone,
    StaleToken,

    // 403
    Forbidden,

    // 404
    NotFound(String),

    // 500
    Unexpected(anyhow::Error),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::InvalidField { .. }
            | ApiError::ValidationFailed(_)
            | ApiError::DuplicateValue(_) => StatusCode::BAD_REQUEST,
            ApiError::TokenInvalid
            | ApiError::TokenExpired
            | ApiError::NoCredential(_)
            | ApiError::SubjectGone
            | ApiError::StaleToken => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Client-safe message. `Unexpected` never exposes its cause here.
    pub fn message(&self) -> String {
        match self {
            ApiError::InvalidField { field, value } => {
                format!("invalid {}: {}", field, value)
            }
            ApiError::ValidationFailed(messages) => messages.join("/ "),
            ApiError::DuplicateValue(value) => {
                format!("duplicate field value: {}", value)
            }
            ApiError::TokenInvalid => "Token is invalid. Please log in again".to_string(),
            ApiError::TokenExpired => "Your token has expired, please log in again".to_string(),
            ApiError::NoCredential(msg) => msg.clone(),
            ApiError::SubjectGone => {
                "The user belonging to this token no longer exists".to_string()
            }
            ApiError::StaleToken => {
                "User changed password recently. Please log in again".to_string()
            }
            ApiError::Forbidden => {
                "You do not have permission to perform this action".to_string()
            }
            ApiError::NotFound(msg) => msg.clone(),
            ApiError::Unexpected(_) => "something went wrong".to_string(),
        }
    }

    pub fn is_operational(&self) -> bool {
        !matches!(self, ApiError::Unexpected(_))
    }

    /// 4xx failures report "fail", 5xx report "error".
    fn status_text(&self) -> &'static str {
        if self.status_code().is_client_error() {
            "fail"
        } else {
            "error"
        }
    }

    pub fn unexpected(err: impl Into<anyhow::Error>) -> Self {
        ApiError::Unexpected(err.into())
    }

    fn to_json(&self, env: Environment) -> Value {
        match env {
            Environment::Development => json!({
                "status": self.status_text(),
                "message": self.message(),
                "error": format!("{:?}", self),
            }),
            Environment::Production => json!({
                "status": self.status_text(),
                "message": self.message(),
            }),
        }
    }
}

// Classification of persistence failures. Uniqueness and cast errors come
// back from Postgres with SQLSTATE codes; everything unmatched is Unexpected.
impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        if matches!(err, sqlx::Error::RowNotFound) {
            return ApiError::NotFound("no document found".to_string());
        }
        if let sqlx::Error::Database(db_err) = &err {
            match db_err.code().as_deref() {
                Some("23505") => {
                    let detail = db_err.constraint().unwrap_or("unique constraint").to_string();
                    return ApiError::DuplicateValue(detail);
                }
                // invalid_text_representation, datetime_field_overflow,
                // numeric_value_out_of_range, undefined_function (no operator
                // for the compared types), datatype_mismatch
                Some("22P02") | Some("22007") | Some("22003") | Some("42883")
                | Some("42804") => {
                    return ApiError::InvalidField {
                        field: "input".to_string(),
                        value: db_err.message().to_string(),
                    };
                }
                // foreign_key_violation: a referenced document does not exist
                Some("23503") => {
                    return ApiError::InvalidField {
                        field: "reference".to_string(),
                        value: db_err.message().to_string(),
                    };
                }
                _ => {}
            }
        }
        ApiError::Unexpected(err.into())
    }
}

impl From<jsonwebtoken::errors::Error> for ApiError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => ApiError::TokenExpired,
            _ => ApiError::TokenInvalid,
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        if !self.is_operational() {
            if let ApiError::Unexpected(cause) = &self {
                tracing::error!(error = ?cause, "unexpected failure");
            }
        }
        let body = self.to_json(Environment::current());
        (self.status_code(), Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_follow_taxonomy() {
        assert_eq!(
            ApiError::ValidationFailed(vec!["x".into()]).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::DuplicateValue("name".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(ApiError::TokenExpired.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::StaleToken.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::Forbidden.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(
            ApiError::NotFound("no document found".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::unexpected(anyhow::anyhow!("boom")).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn validation_messages_are_joined() {
        let err = ApiError::ValidationFailed(vec![
            "a name is required".to_string(),
            "two passwords entered are not the same".to_string(),
        ]);
        assert_eq!(
            err.message(),
            "a name is required/ two passwords entered are not the same"
        );
    }

    #[test]
    fn unexpected_never_leaks_cause() {
        let err = ApiError::unexpected(anyhow::anyhow!("connection refused to 10.0.0.3"));
        assert_eq!(err.message(), "something went wrong");
        assert!(!err.is_operational());
    }

    #[test]
    fn status_text_splits_fail_and_error() {
        assert_eq!(ApiError::Forbidden.status_text(), "fail");
        assert_eq!(
            ApiError::unexpected(anyhow::anyhow!("boom")).status_text(),
            "error"
        );
    }

    #[test]
    fn jwt_errors_classify_by_kind() {
        let expired = jsonwebtoken::errors::Error::from(
            jsonwebtoken::errors::ErrorKind::ExpiredSignature,
        );
        assert!(matches!(ApiError::from(expired), ApiError::TokenExpired));

        let forged =
            jsonwebtoken::errors::Error::from(jsonwebtoken::errors::ErrorKind::InvalidSignature);
        assert!(matches!(ApiError::from(forged), ApiError::TokenInvalid));
    }

    #[test]
    fn row_not_found_maps_to_not_found() {
        assert!(matches!(
            ApiError::from(sqlx::Error::RowNotFound),
            ApiError::NotFound(_)
        ));
    }
}
