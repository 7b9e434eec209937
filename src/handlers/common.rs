use crate::errors::ServiceError;
use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        FromRequest, FromRequestParts, Path, Request,
    },
    http::request::Parts,
    Json,
};
use serde::{de::DeserializeOwned, Deserialize, Deserializer, Serialize};
use utoipa::ToSchema;
use validator::Validate;

/// JSON body with rejections rendered as the standard error envelope.
///
/// Malformed JSON is a 400; well-formed JSON of the wrong shape is a 422.
pub struct ApiJson<T>(pub T);

#[axum::async_trait]
impl<T, S> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        Json::<T>::from_request(req, state)
            .await
            .map(|Json(payload)| ApiJson(payload))
            .map_err(json_rejection)
    }
}

/// JSON body that has been deserialized and passed its validation rules.
pub struct ValidatedJson<T>(pub T);

#[axum::async_trait]
impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let ApiJson(payload) = ApiJson::<T>::from_request(req, state).await?;
        payload.validate()?;
        Ok(ValidatedJson(payload))
    }
}

fn json_rejection(rejection: JsonRejection) -> ServiceError {
    match rejection {
        JsonRejection::JsonDataError(err) => ServiceError::invalid_field("body", err.body_text()),
        JsonRejection::JsonSyntaxError(err) => {
            ServiceError::BadRequest(format!("Malformed JSON body: {}", err.body_text()))
        }
        JsonRejection::MissingJsonContentType(_) => ServiceError::BadRequest(
            "Expected request with `Content-Type: application/json`".to_string(),
        ),
        other => ServiceError::BadRequest(other.body_text()),
    }
}

/// Path parameters with rejections rendered as the standard error envelope.
pub struct ApiPath<T>(pub T);

#[axum::async_trait]
impl<T, S> FromRequestParts<S> for ApiPath<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Path::<T>::from_request_parts(parts, state)
            .await
            .map(|Path(value)| ApiPath(value))
            .map_err(|rejection: PathRejection| ServiceError::BadRequest(rejection.body_text()))
    }
}

/// Parses a route id.
///
/// Anything that is not an integer is a malformed request (400). Integers that
/// cannot name a row (zero, negative, beyond the id range) simply do not
/// resolve (404).
pub fn parse_id(raw: &str, resource: &str) -> Result<i32, ServiceError> {
    let raw = raw.trim();
    let digits = raw.strip_prefix('-').unwrap_or(raw);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ServiceError::BadRequest(format!(
            "Invalid {} id '{}'",
            resource.to_lowercase(),
            raw
        )));
    }

    raw.parse::<i32>()
        .ok()
        .filter(|id| *id > 0)
        .ok_or_else(|| ServiceError::not_found(resource, raw))
}

/// Trims a string field, turning blank strings and null into `None`.
pub fn trimmed_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty()))
}

/// For partial updates: `Some(..)` whenever the key is present, with blank
/// strings and null both carried as `Some(None)`. Pair with `#[serde(default)]`.
pub fn present_trimmed_string<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    trimmed_string(deserializer).map(Some)
}

/// For partial updates of non-string fields; see [`present_trimmed_string`].
pub fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Pagination details of a list response.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PageMeta {
    pub current_page: u64,
    pub last_page: u64,
    pub per_page: u64,
    pub total: u64,
    pub from: Option<u64>,
    pub to: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PageLinks {
    pub first: String,
    pub last: String,
    pub prev: Option<String>,
    pub next: Option<String>,
}

impl PageLinks {
    /// Links for `current` out of `last` pages of the collection at `base`.
    pub fn build(base: &str, current: u64, last: u64) -> Self {
        let url = |page: u64| format!("{}?page={}", base, page);
        Self {
            first: url(1),
            last: url(last),
            prev: (current > 1).then(|| url(current - 1)),
            next: (current < last).then(|| url(current + 1)),
        }
    }
}
