use axum::{response::IntoResponse, Json};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Hotel API",
        version = "1.0.0",
        description = r#"
# Hotel Listings API

Manage hotels and their photo galleries.

## Hotels

- `GET /api/hotels` lists hotels 15 per page by default (`per_page` up to 100).
  Filter with `q` (name or city, case-insensitive) and order with `sort` and `order`.
- Monetary and coordinate values are returned as decimal strings.

## Pictures

Pictures are jpeg, png or webp images. Each hotel keeps its gallery ordered by
`position`; new uploads are appended after the current last position.

## Errors

Every failure uses the same envelope:

```json
{
  "success": false,
  "message": "The given data was invalid.",
  "status_code": 422,
  "errors": { "name": ["The name field is required."] }
}
```
        "#,
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "Hotels", description = "Hotel listing endpoints"),
        (name = "Pictures", description = "Hotel gallery endpoints"),
        (name = "Health", description = "Health check endpoints")
    ),
    paths(
        // Hotels
        crate::handlers::hotels::list_hotels,
        crate::handlers::hotels::get_hotel,
        crate::handlers::hotels::create_hotel,
        crate::handlers::hotels::update_hotel,
        crate::handlers::hotels::delete_hotel,

        // Pictures
        crate::handlers::pictures::upload_picture,
        crate::handlers::pictures::upload_pictures,
        crate::handlers::pictures::reposition_picture,
        crate::handlers::pictures::delete_picture,

        // Health
        crate::health::health_check,
    ),
    components(
        schemas(
            // Common types
            crate::MessageResponse,
            crate::handlers::common::PageMeta,
            crate::handlers::common::PageLinks,

            // Hotel types
            crate::handlers::hotels::CreateHotelRequest,
            crate::handlers::hotels::UpdateHotelRequest,
            crate::handlers::hotels::HotelResponse,
            crate::handlers::hotels::HotelDetailResponse,
            crate::handlers::hotels::HotelSummaryResponse,
            crate::handlers::hotels::HotelListResponse,

            // Picture types
            crate::handlers::pictures::PictureResponse,
            crate::handlers::pictures::RepositionPictureRequest,
            crate::handlers::pictures::UploadPictureForm,
            crate::handlers::pictures::UploadPicturesForm,
            crate::handlers::pictures::BatchUploadResponse,
            crate::services::pictures::FailedUpload,

            // Health types
            crate::health::HealthInfo,
            crate::health::HealthDetail,
            crate::health::HealthStatus,

            // Error types
            crate::errors::ErrorResponse
        )
    )
)]
pub struct ApiDocV1;

/// Serves the generated document at `/api-docs/openapi.json`.
pub async fn openapi_json() -> impl IntoResponse {
    Json(ApiDocV1::openapi())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_every_route() {
        let openapi = ApiDocV1::openapi();
        let json = serde_json::to_string_pretty(&openapi).unwrap();
        assert!(json.contains("Hotel API"));
        for path in [
            "/api/hotels",
            "/api/hotels/{id}",
            "/api/hotels/{hotel}/pictures",
            "/api/hotels/{hotel}/pictures/multiple",
            "/api/hotels/{hotel}/pictures/{picture}",
            "/health",
        ] {
            assert!(openapi.paths.paths.contains_key(path), "missing {path}");
        }
    }
}
