use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use serde_json::{json, Value};

/// Success envelope shared by every handler: `{ "status": "success", ... }`.
/// Failures never pass through here; they render via `ApiError`.
#[derive(Debug)]
pub struct ApiResponse {
    status_code: StatusCode,
    body: Option<Value>,
}

impl ApiResponse {
    pub fn success<T: Serialize>(data: T) -> Self {
        Self::with_status(StatusCode::OK, data)
    }

    pub fn created<T: Serialize>(data: T) -> Self {
        Self::with_status(StatusCode::CREATED, data)
    }

    pub fn with_status<T: Serialize>(status_code: StatusCode, data: T) -> Self {
        let data = serde_json::to_value(data).unwrap_or(Value::Null);
        Self {
            status_code,
            body: Some(json!({ "status": "success", "data": { "data": data } })),
        }
    }

    /// List envelope with the result count alongside the documents.
    pub fn list<T: Serialize>(items: &[T]) -> Self {
        let data = serde_json::to_value(items).unwrap_or(Value::Array(vec![]));
        Self {
            status_code: StatusCode::OK,
            body: Some(json!({
                "status": "success",
                "results": items.len(),
                "data": { "data": data },
            })),
        }
    }

    /// 204 with an empty body.
    pub fn no_content() -> Self {
        Self {
            status_code: StatusCode::NO_CONTENT,
            body: None,
        }
    }

    /// Session responses carry the token next to the user document.
    pub fn session<T: Serialize>(status_code: StatusCode, token: &str, user: T) -> Self {
        let user = serde_json::to_value(user).unwrap_or(Value::Null);
        Self {
            status_code,
            body: Some(json!({
                "status": "success",
                "token": token,
                "data": { "user": user },
            })),
        }
    }

    /// Bare acknowledgement, no payload.
    pub fn ok() -> Self {
        Self {
            status_code: StatusCode::OK,
            body: Some(json!({ "status": "success" })),
        }
    }

    /// Plain acknowledgement with a message, no payload.
    pub fn message(text: &str) -> Self {
        Self {
            status_code: StatusCode::OK,
            body: Some(json!({ "status": "success", "message": text })),
        }
    }
}

impl IntoResponse for ApiResponse {
    fn into_response(self) -> Response {
        match self.body {
            Some(body) => (self.status_code, Json(body)).into_response(),
            None => self.status_code.into_response(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_counts_results() {
        let response = ApiResponse::list(&[json!({"a": 1}), json!({"a": 2})]);
        let body = response.body.unwrap();
        assert_eq!(body["status"], "success");
        assert_eq!(body["results"], 2);
        assert_eq!(body["data"]["data"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn no_content_has_no_body() {
        let response = ApiResponse::no_content();
        assert_eq!(response.status_code, StatusCode::NO_CONTENT);
        assert!(response.body.is_none());
    }

    #[test]
    fn session_embeds_token_and_user() {
        let response =
            ApiResponse::session(StatusCode::OK, "tok", json!({"name": "Alice"}));
        let body = response.body.unwrap();
        assert_eq!(body["token"], "tok");
        assert_eq!(body["data"]["user"]["name"], "Alice");
    }
}
