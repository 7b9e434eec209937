use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use sea_orm::error::DbErr;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::future::Future;
use utoipa::ToSchema;

/// Per-field validation messages, keyed by field name (`pictures.1` for array items).
pub type FieldErrors = BTreeMap<String, Vec<String>>;

tokio::task_local! {
    static DEBUG_ERRORS: bool;
}

/// Runs `future` with error debug output enabled or disabled for every error
/// rendered inside it.
pub async fn scope_debug_errors<Fut, R>(enabled: bool, future: Fut) -> R
where
    Fut: Future<Output = R>,
{
    DEBUG_ERRORS.scope(enabled, future).await
}

pub fn debug_errors_enabled() -> bool {
    DEBUG_ERRORS.try_with(|enabled| *enabled).unwrap_or(false)
}

fn current_request_id() -> Option<String> {
    crate::tracing::current_request_id().map(|rid| rid.as_str().to_string())
}

/// JSON envelope returned for every failed request under `/api`.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "success": false,
    "message": "The given data was invalid.",
    "status_code": 422,
    "errors": { "name": ["The name field is required."] },
    "request_id": "5f0c2d4e-3c1b-4b8e-9d8a-0d6f3f1f2a11"
}))]
pub struct ErrorResponse {
    pub success: bool,
    pub message: String,
    pub status_code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<FieldErrors>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    /// Only present when the service runs with `debug = true`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug: Option<ErrorDebug>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorDebug {
    pub kind: String,
    pub detail: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] DbErr),

    #[error("{0}")]
    NotFound(String),

    #[error("The given data was invalid.")]
    ValidationError(FieldErrors),

    #[error("{0}")]
    BadRequest(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("{0}")]
    PayloadTooLarge(String),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(field_errors_from(&err))
    }
}

impl From<std::io::Error> for ServiceError {
    fn from(err: std::io::Error) -> Self {
        ServiceError::StorageError(err.to_string())
    }
}

/// Flattens `validator` output into the `{ field: [messages] }` shape.
pub fn field_errors_from(errors: &validator::ValidationErrors) -> FieldErrors {
    let mut fields = FieldErrors::new();
    for (field, errs) in errors.field_errors() {
        let messages = errs
            .iter()
            .map(|err| describe_validation_error(field, err))
            .collect::<Vec<_>>();
        fields.entry(field.to_string()).or_default().extend(messages);
    }
    fields
}

fn describe_validation_error(field: &str, err: &validator::ValidationError) -> String {
    if let Some(message) = &err.message {
        return message.to_string();
    }

    let label = field.replace('_', " ");
    let param = |name: &str| err.params.get(name).map(format_param);

    match err.code.as_ref() {
        "required" => format!("The {label} field is required."),
        "length" => match (param("min"), param("max")) {
            (Some(min), Some(max)) => {
                format!("The {label} field must be between {min} and {max} characters.")
            }
            (None, Some(max)) => {
                format!("The {label} field must not be greater than {max} characters.")
            }
            (Some(min), None) => format!("The {label} field must be at least {min} characters."),
            (None, None) => format!("The {label} field has an invalid length."),
        },
        "range" => match (param("min"), param("max")) {
            (Some(min), Some(max)) => format!("The {label} field must be between {min} and {max}."),
            (Some(min), None) => format!("The {label} field must be at least {min}."),
            (None, Some(max)) => format!("The {label} field must not be greater than {max}."),
            (None, None) => format!("The {label} field is out of range."),
        },
        code => format!("The {label} field is invalid ({code})."),
    }
}

fn format_param(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Number(n) => match n.as_f64() {
            Some(f) if f.fract() == 0.0 => format!("{}", f as i64),
            _ => n.to_string(),
        },
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl ServiceError {
    pub fn not_found(resource: &str, id: impl std::fmt::Display) -> Self {
        ServiceError::NotFound(format!("{resource} {id} not found"))
    }

    /// Single-field validation failure.
    pub fn invalid_field(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = FieldErrors::new();
        errors.insert(field.into(), vec![message.into()]);
        ServiceError::ValidationError(errors)
    }

    /// Returns the HTTP status code for this error.
    /// This is the single source of truth for error-to-status mapping.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::ValidationError(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::DatabaseError(_) | Self::StorageError(_) | Self::Other(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Returns the error message suitable for HTTP responses.
    /// Internal errors return generic messages unless debug output is enabled.
    pub fn response_message(&self) -> String {
        let debug = debug_errors_enabled();
        match self {
            Self::DatabaseError(e) if debug => format!("A database error occurred: {e}"),
            Self::DatabaseError(_) => "A database error occurred.".to_string(),
            Self::StorageError(e) if debug => format!("File storage error: {e}"),
            Self::StorageError(_) => "File storage error.".to_string(),
            Self::Other(_) if debug => self.to_string(),
            Self::Other(_) => "An unexpected error occurred.".to_string(),
            _ => self.to_string(),
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::DatabaseError(_) => "database_error",
            Self::NotFound(_) => "not_found",
            Self::ValidationError(_) => "validation_error",
            Self::BadRequest(_) => "bad_request",
            Self::StorageError(_) => "storage_error",
            Self::PayloadTooLarge(_) => "payload_too_large",
            Self::Other(_) => "unexpected_error",
        }
    }

    fn debug_detail(&self) -> String {
        match self {
            Self::Other(err) => format!("{err:?}"),
            other => format!("{other:?}"),
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, kind = self.kind(), "Request failed");
        }

        let debug = debug_errors_enabled().then(|| ErrorDebug {
            kind: self.kind().to_string(),
            detail: self.debug_detail(),
        });

        let message = self.response_message();
        let errors = match self {
            ServiceError::ValidationError(fields) => Some(fields),
            _ => None,
        };

        let body = ErrorResponse {
            success: false,
            message,
            status_code: status.as_u16(),
            errors,
            request_id: current_request_id(),
            debug,
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use validator::Validate;

    #[derive(Validate)]
    struct SampleForm {
        #[validate(required)]
        name: Option<String>,
        #[validate(range(min = 1, max = 200))]
        max_capacity: Option<i32>,
    }

    #[tokio::test]
    async fn service_error_response_includes_request_id() {
        let response =
            crate::tracing::scope_request_id(crate::tracing::RequestId::new("req-123"), async {
                ServiceError::NotFound("Hotel 9 not found".into()).into_response()
            })
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let payload: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(payload.request_id.as_deref(), Some("req-123"));
        assert_eq!(payload.status_code, 404);
        assert!(!payload.success);
        assert_eq!(payload.message, "Hotel 9 not found");
    }

    #[test]
    fn service_error_status_code_mapping() {
        assert_eq!(
            ServiceError::NotFound("x".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ServiceError::invalid_field("name", "required").status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            ServiceError::BadRequest("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ServiceError::PayloadTooLarge("x".into()).status_code(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(
            ServiceError::StorageError("disk".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ServiceError::DatabaseError(DbErr::Custom("boom".into())).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn internal_errors_hide_details_without_debug() {
        assert_eq!(
            ServiceError::DatabaseError(DbErr::Custom("secret table".into())).response_message(),
            "A database error occurred."
        );
        assert_eq!(
            ServiceError::Other(anyhow::anyhow!("stack")).response_message(),
            "An unexpected error occurred."
        );
    }

    #[tokio::test]
    async fn debug_scope_exposes_details() {
        let response = scope_debug_errors(true, async {
            ServiceError::DatabaseError(DbErr::Custom("secret table".into())).into_response()
        })
        .await;

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let payload: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert!(payload.message.contains("secret table"));
        let debug = payload.debug.expect("debug block");
        assert_eq!(debug.kind, "database_error");
    }

    #[test]
    fn validator_errors_become_field_messages() {
        let form = SampleForm {
            name: None,
            max_capacity: Some(500),
        };
        let err: ServiceError = form.validate().unwrap_err().into();
        let ServiceError::ValidationError(fields) = err else {
            panic!("expected validation error");
        };
        assert_eq!(fields["name"], vec!["The name field is required."]);
        assert_eq!(
            fields["max_capacity"],
            vec!["The max capacity field must be between 1 and 200."]
        );
    }
}
