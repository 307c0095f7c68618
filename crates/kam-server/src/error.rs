//! Mapping of registry errors onto HTTP responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use kam::KamError;
use kam_core::wire::ErrorBody;

/// An error response: status plus `{error, message}` body.
#[derive(Debug)]
pub struct ApiError {
    pub(crate) status: StatusCode,
    pub(crate) body: ErrorBody,
}

impl ApiError {
    /// Unparseable body, query, or path.
    pub fn validation(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            body: ErrorBody {
                error: "validation_error".to_string(),
                message: message.into(),
            },
        }
    }

    /// An error raised by the HTTP layer rather than the registry.
    pub fn from_status(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorBody {
                error: status_code(status).to_string(),
                message: message.into(),
            },
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

fn status_code(status: StatusCode) -> &'static str {
    match status {
        StatusCode::BAD_REQUEST => "validation_error",
        StatusCode::NOT_FOUND => "not_found",
        StatusCode::METHOD_NOT_ALLOWED => "method_not_allowed",
        StatusCode::REQUEST_TIMEOUT => "request_timeout",
        StatusCode::CONFLICT => "conflict",
        StatusCode::PAYLOAD_TOO_LARGE => "payload_too_large",
        s if s.is_server_error() => "internal_error",
        _ => "bad_request",
    }
}

impl From<KamError> for ApiError {
    fn from(err: KamError) -> Self {
        let status = match &err {
            KamError::Validation(_) => StatusCode::BAD_REQUEST,
            KamError::NotFound(_) => StatusCode::NOT_FOUND,
            KamError::Conflict(_) => StatusCode::CONFLICT,
            KamError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            body: ErrorBody {
                error: err.code().to_string(),
                message: err.to_string(),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kam::store::StoreError;
    use kam::ValidationError;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (KamError::Validation(ValidationError::EmptyIdentity), 400, "validation_error"),
            (KamError::NotFound("record 7".into()), 404, "not_found"),
            (KamError::Conflict("pair busy".into()), 409, "conflict"),
            (
                KamError::Storage(StoreError::Unavailable("gone".into())),
                500,
                "storage_error",
            ),
        ];
        for (err, status, code) in cases {
            let api = ApiError::from(err);
            assert_eq!(api.status.as_u16(), status);
            assert_eq!(api.body.error, code);
        }
    }

    #[test]
    fn test_layer_status_codes() {
        let cases = [
            (StatusCode::REQUEST_TIMEOUT, "request_timeout"),
            (StatusCode::PAYLOAD_TOO_LARGE, "payload_too_large"),
            (StatusCode::METHOD_NOT_ALLOWED, "method_not_allowed"),
            (StatusCode::NOT_FOUND, "not_found"),
            (StatusCode::UNSUPPORTED_MEDIA_TYPE, "bad_request"),
            (StatusCode::BAD_GATEWAY, "internal_error"),
        ];
        for (status, code) in cases {
            let api = ApiError::from_status(status, "layer");
            assert_eq!(api.status(), status);
            assert_eq!(api.body.error, code);
        }
    }
}
