use crate::{
    entities::hotel_picture,
    errors::{ErrorResponse, ServiceError},
    handlers::common::{parse_id, ApiPath, ValidatedJson},
    services::pictures::{FailedUpload, UploadedFile},
    storage::FileStorage,
    ApiResponse, AppState,
};
use axum::{
    extract::{multipart::MultipartRejection, Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

const SINGLE_FIELD: &str = "picture";
const BATCH_FIELD: &str = "pictures";

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "id": 7,
    "hotel_id": 3,
    "filepath": "hotels/1717171717_1f2e3d4c_lobby.jpg",
    "filesize": 245812,
    "position": 1,
    "url": "http://localhost:8080/storage/hotels/1717171717_1f2e3d4c_lobby.jpg",
    "created_at": "2025-01-01T10:00:00Z",
    "updated_at": "2025-01-01T10:00:00Z"
}))]
pub struct PictureResponse {
    pub id: i32,
    pub hotel_id: i32,
    pub filepath: String,
    pub filesize: i64,
    pub position: i32,
    pub url: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PictureResponse {
    pub fn from_model(model: hotel_picture::Model, storage: &dyn FileStorage) -> Self {
        let url = storage.url(&model.filepath);
        Self {
            id: model.id,
            hotel_id: model.hotel_id,
            filepath: model.filepath,
            filesize: model.filesize,
            position: model.position,
            url,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[schema(example = json!({ "position": 5 }))]
pub struct RepositionPictureRequest {
    /// New display position (0 or greater); other pictures keep theirs
    #[serde(default)]
    #[validate(required, range(min = 0, max = 2147483647))]
    #[schema(value_type = i32)]
    pub position: Option<i64>,
}

/// Multipart body for a single upload.
#[derive(ToSchema)]
#[allow(dead_code)]
pub struct UploadPictureForm {
    /// jpeg, png or webp image
    #[schema(value_type = String, format = Binary)]
    pub picture: Vec<u8>,
}

/// Multipart body for a batch upload: repeat the `pictures[]` field 1 to 10 times.
#[derive(ToSchema)]
#[allow(dead_code)]
pub struct UploadPicturesForm {
    #[schema(rename = "pictures[]", value_type = Vec<String>)]
    pub pictures: Vec<Vec<u8>>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct BatchUploadResponse {
    pub success: bool,
    pub message: String,
    pub data: Vec<PictureResponse>,
    /// Files that could not be stored
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<FailedUpload>>,
    pub status_code: u16,
}

fn multipart_error(err: axum::extract::multipart::MultipartError) -> ServiceError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return ServiceError::PayloadTooLarge(
            "The request body exceeds the upload size limit.".to_string(),
        );
    }
    ServiceError::BadRequest(format!("Invalid multipart body: {}", err.body_text()))
}

fn is_batch_field(name: &str) -> bool {
    name == BATCH_FIELD || name.starts_with("pictures[")
}

/// Reads every file whose field name matches `wanted`, in request order.
async fn collect_files(
    multipart: Result<Multipart, MultipartRejection>,
    wanted: impl Fn(&str) -> bool,
) -> Result<Vec<UploadedFile>, ServiceError> {
    // A body that is not multipart at all carries no files.
    let Ok(mut multipart) = multipart else {
        return Ok(Vec::new());
    };

    let mut files = Vec::new();
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let matches = field.name().map(&wanted).unwrap_or(false);
        if !matches {
            continue;
        }
        let original_name = field.file_name().unwrap_or_default().to_string();
        let bytes = field.bytes().await.map_err(multipart_error)?;
        files.push(UploadedFile::new(original_name, bytes));
    }
    Ok(files)
}

/// Upload one picture to the end of a hotel's gallery
#[utoipa::path(
    post,
    path = "/api/hotels/{hotel}/pictures",
    params(("hotel" = i32, Path, description = "Hotel id")),
    request_body(content = UploadPictureForm, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Picture uploaded", body = ApiResponse<PictureResponse>),
        (status = 404, description = "Hotel not found", body = ErrorResponse),
        (status = 422, description = "Missing or invalid image", body = ErrorResponse),
        (status = 413, description = "Request body over the upload limit", body = ErrorResponse)
    ),
    tag = "Pictures"
)]
pub async fn upload_picture(
    State(state): State<AppState>,
    ApiPath(hotel): ApiPath<String>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, ServiceError> {
    let hotel_id = parse_id(&hotel, "Hotel")?;
    let file = collect_files(multipart, |name| name == SINGLE_FIELD)
        .await?
        .into_iter()
        .next();

    let picture = state.services.pictures.upload_single(hotel_id, file).await?;

    Ok(ApiResponse::created(
        "Picture uploaded successfully",
        PictureResponse::from_model(picture, state.storage.as_ref()),
    )
    .into_response())
}

/// Upload up to ten pictures at once
///
/// Every file is validated before any is stored. Files that then fail to be
/// stored are listed under `errors` without undoing the others.
#[utoipa::path(
    post,
    path = "/api/hotels/{hotel}/pictures/multiple",
    params(("hotel" = i32, Path, description = "Hotel id")),
    request_body(content = UploadPicturesForm, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Batch stored (possibly with per-file failures)", body = BatchUploadResponse),
        (status = 404, description = "Hotel not found", body = ErrorResponse),
        (status = 422, description = "Invalid batch, or no file could be stored", body = ErrorResponse),
        (status = 413, description = "Request body over the upload limit", body = ErrorResponse)
    ),
    tag = "Pictures"
)]
pub async fn upload_pictures(
    State(state): State<AppState>,
    ApiPath(hotel): ApiPath<String>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, ServiceError> {
    let hotel_id = parse_id(&hotel, "Hotel")?;
    let files = collect_files(multipart, is_batch_field).await?;

    let outcome = state
        .services
        .pictures
        .upload_multiple(hotel_id, files)
        .await?;

    let status = if outcome.uploaded.is_empty() {
        StatusCode::UNPROCESSABLE_ENTITY
    } else {
        StatusCode::CREATED
    };
    let message = outcome.message();
    let storage = state.storage.as_ref();

    let body = BatchUploadResponse {
        success: !outcome.uploaded.is_empty(),
        message,
        data: outcome
            .uploaded
            .into_iter()
            .map(|picture| PictureResponse::from_model(picture, storage))
            .collect(),
        errors: (!outcome.failed.is_empty()).then_some(outcome.failed),
        status_code: status.as_u16(),
    };
    Ok((status, Json(body)).into_response())
}

/// Move a picture to another position in the gallery
#[utoipa::path(
    patch,
    path = "/api/hotels/{hotel}/pictures/{picture}",
    params(
        ("hotel" = i32, Path, description = "Hotel id"),
        ("picture" = i32, Path, description = "Picture id")
    ),
    request_body = RepositionPictureRequest,
    responses(
        (status = 200, description = "Position updated", body = ApiResponse<PictureResponse>),
        (status = 404, description = "Hotel or picture not found", body = ErrorResponse),
        (status = 422, description = "Invalid position", body = ErrorResponse)
    ),
    tag = "Pictures"
)]
pub async fn reposition_picture(
    State(state): State<AppState>,
    ApiPath((hotel, picture)): ApiPath<(String, String)>,
    ValidatedJson(payload): ValidatedJson<RepositionPictureRequest>,
) -> Result<Response, ServiceError> {
    let hotel_id = parse_id(&hotel, "Hotel")?;
    let picture_id = parse_id(&picture, "Picture")?;
    let position = payload
        .position
        .and_then(|position| i32::try_from(position).ok())
        .ok_or_else(|| {
            ServiceError::invalid_field("position", "The position field is required.")
        })?;

    let picture = state
        .services
        .pictures
        .reposition(hotel_id, picture_id, position)
        .await?;

    Ok(ApiResponse::ok(
        "Picture position updated successfully",
        PictureResponse::from_model(picture, state.storage.as_ref()),
    )
    .into_response())
}

/// Delete a picture and its stored file
#[utoipa::path(
    delete,
    path = "/api/hotels/{hotel}/pictures/{picture}",
    params(
        ("hotel" = i32, Path, description = "Hotel id"),
        ("picture" = i32, Path, description = "Picture id")
    ),
    responses(
        (status = 200, description = "Picture deleted", body = crate::MessageResponse),
        (status = 404, description = "Hotel or picture not found", body = ErrorResponse)
    ),
    tag = "Pictures"
)]
pub async fn delete_picture(
    State(state): State<AppState>,
    ApiPath((hotel, picture)): ApiPath<(String, String)>,
) -> Result<Response, ServiceError> {
    let hotel_id = parse_id(&hotel, "Hotel")?;
    let picture_id = parse_id(&picture, "Picture")?;

    state.services.pictures.delete(hotel_id, picture_id).await?;

    Ok(ApiResponse::<()>::message(StatusCode::OK, "Picture deleted successfully").into_response())
}
