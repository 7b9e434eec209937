use crate::{
    entities::{hotel, hotel_picture},
    errors::{ErrorResponse, ServiceError},
    handlers::{
        common::{
            parse_id, present, present_trimmed_string, trimmed_string, ApiJson, ApiPath,
            PageLinks, PageMeta, ValidatedJson,
        },
        pictures::PictureResponse,
    },
    services::hotels::{HotelChanges, HotelListQuery, NewHotel},
    storage::FileStorage,
    ApiResponse, AppState,
};
use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use utoipa::{IntoParams, ToSchema};
use validator::{Validate, ValidationError, ValidationErrors};

const LAT_RANGE: (i64, i64) = (-90, 90);
const LNG_RANGE: (i64, i64) = (-180, 180);

fn decimal_between(value: &Decimal, min: i64, max: i64) -> Result<(), ValidationError> {
    if *value < Decimal::from(min) || *value > Decimal::from(max) {
        let mut err = ValidationError::new("range");
        err.add_param(Cow::from("min"), &min);
        err.add_param(Cow::from("max"), &max);
        return Err(err);
    }
    Ok(())
}

fn validate_latitude(value: &Decimal) -> Result<(), ValidationError> {
    decimal_between(value, LAT_RANGE.0, LAT_RANGE.1)
}

fn validate_longitude(value: &Decimal) -> Result<(), ValidationError> {
    decimal_between(value, LNG_RANGE.0, LNG_RANGE.1)
}

fn validate_price(value: &Decimal) -> Result<(), ValidationError> {
    if *value < Decimal::ZERO {
        let mut err = ValidationError::new("range");
        err.add_param(Cow::from("min"), &0);
        return Err(err);
    }
    Ok(())
}

/// Rescales a decimal for output (`48.8566` becomes `48.85660000` at 8 places).
fn fixed(value: Decimal, scale: u32) -> Decimal {
    let mut value = value.round_dp(scale);
    value.rescale(scale);
    value
}

// Request/Response DTOs

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[schema(example = json!({
    "name": "Hôtel des Arts",
    "address1": "5 Rue Tholozé",
    "address2": null,
    "zipcode": "75018",
    "city": "Paris",
    "country": "France",
    "lat": 48.8848,
    "lng": 2.3366,
    "description": "Quiet rooms at the foot of Montmartre.",
    "max_capacity": 40,
    "price_per_night": "129.00"
}))]
pub struct CreateHotelRequest {
    #[serde(default, deserialize_with = "trimmed_string")]
    #[validate(required, length(max = 255))]
    #[schema(value_type = String)]
    pub name: Option<String>,

    #[serde(default, deserialize_with = "trimmed_string")]
    #[validate(required, length(max = 255))]
    #[schema(value_type = String)]
    pub address1: Option<String>,

    #[serde(default, deserialize_with = "trimmed_string")]
    #[validate(length(max = 255))]
    pub address2: Option<String>,

    #[serde(default, deserialize_with = "trimmed_string")]
    #[validate(required, length(max = 20))]
    #[schema(value_type = String)]
    pub zipcode: Option<String>,

    #[serde(default, deserialize_with = "trimmed_string")]
    #[validate(required, length(max = 100))]
    #[schema(value_type = String)]
    pub city: Option<String>,

    #[serde(default, deserialize_with = "trimmed_string")]
    #[validate(required, length(max = 100))]
    #[schema(value_type = String)]
    pub country: Option<String>,

    /// Latitude between -90 and 90
    #[serde(default)]
    #[validate(required, custom = "validate_latitude")]
    #[schema(value_type = f64)]
    pub lat: Option<Decimal>,

    /// Longitude between -180 and 180
    #[serde(default)]
    #[validate(required, custom = "validate_longitude")]
    #[schema(value_type = f64)]
    pub lng: Option<Decimal>,

    #[serde(default, deserialize_with = "trimmed_string")]
    #[validate(length(max = 5000))]
    pub description: Option<String>,

    #[serde(default)]
    #[validate(required, range(min = 1, max = 200))]
    #[schema(value_type = i32)]
    pub max_capacity: Option<i32>,

    #[serde(default)]
    #[validate(required, custom = "validate_price")]
    #[schema(value_type = String)]
    pub price_per_night: Option<Decimal>,
}

impl CreateHotelRequest {
    /// Converts a validated request; a missing required field is still reported
    /// rather than assumed.
    fn into_new_hotel(self) -> Result<NewHotel, ServiceError> {
        fn required<T>(value: Option<T>, field: &str) -> Result<T, ServiceError> {
            value.ok_or_else(|| {
                ServiceError::invalid_field(
                    field,
                    format!("The {} field is required.", field.replace('_', " ")),
                )
            })
        }

        Ok(NewHotel {
            name: required(self.name, "name")?,
            address1: required(self.address1, "address1")?,
            address2: self.address2,
            zipcode: required(self.zipcode, "zipcode")?,
            city: required(self.city, "city")?,
            country: required(self.country, "country")?,
            lat: required(self.lat, "lat")?,
            lng: required(self.lng, "lng")?,
            description: self.description,
            max_capacity: required(self.max_capacity, "max_capacity")?,
            price_per_night: required(self.price_per_night, "price_per_night")?,
        })
    }
}

/// Partial update. Absent keys are left unchanged; `address2` and
/// `description` may be cleared with null, every other key must carry a value
/// when present.
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
#[schema(example = json!({ "price_per_night": "149.00", "description": null }))]
pub struct UpdateHotelRequest {
    #[serde(default, deserialize_with = "present_trimmed_string")]
    #[validate(length(max = 255))]
    #[schema(value_type = Option<String>)]
    pub name: Option<Option<String>>,

    #[serde(default, deserialize_with = "present_trimmed_string")]
    #[validate(length(max = 255))]
    #[schema(value_type = Option<String>)]
    pub address1: Option<Option<String>>,

    #[serde(default, deserialize_with = "present_trimmed_string")]
    #[validate(length(max = 255))]
    #[schema(value_type = Option<String>)]
    pub address2: Option<Option<String>>,

    #[serde(default, deserialize_with = "present_trimmed_string")]
    #[validate(length(max = 20))]
    #[schema(value_type = Option<String>)]
    pub zipcode: Option<Option<String>>,

    #[serde(default, deserialize_with = "present_trimmed_string")]
    #[validate(length(max = 100))]
    #[schema(value_type = Option<String>)]
    pub city: Option<Option<String>>,

    #[serde(default, deserialize_with = "present_trimmed_string")]
    #[validate(length(max = 100))]
    #[schema(value_type = Option<String>)]
    pub country: Option<Option<String>>,

    #[serde(default, deserialize_with = "present")]
    #[validate(custom = "validate_latitude")]
    #[schema(value_type = Option<f64>)]
    pub lat: Option<Option<Decimal>>,

    #[serde(default, deserialize_with = "present")]
    #[validate(custom = "validate_longitude")]
    #[schema(value_type = Option<f64>)]
    pub lng: Option<Option<Decimal>>,

    #[serde(default, deserialize_with = "present_trimmed_string")]
    #[validate(length(max = 5000))]
    #[schema(value_type = Option<String>)]
    pub description: Option<Option<String>>,

    #[serde(default, deserialize_with = "present")]
    #[validate(range(min = 1, max = 200))]
    #[schema(value_type = Option<i32>)]
    pub max_capacity: Option<Option<i32>>,

    #[serde(default, deserialize_with = "present")]
    #[validate(custom = "validate_price")]
    #[schema(value_type = Option<String>)]
    pub price_per_night: Option<Option<Decimal>>,
}

impl UpdateHotelRequest {
    /// Runs the field rules, then rejects explicit nulls on required columns.
    fn validate_update(&self) -> Result<(), ValidationErrors> {
        let mut errors = self.validate().err().unwrap_or_else(ValidationErrors::new);

        let nulls: [(&'static str, bool); 9] = [
            ("name", matches!(self.name, Some(None))),
            ("address1", matches!(self.address1, Some(None))),
            ("zipcode", matches!(self.zipcode, Some(None))),
            ("city", matches!(self.city, Some(None))),
            ("country", matches!(self.country, Some(None))),
            ("lat", matches!(self.lat, Some(None))),
            ("lng", matches!(self.lng, Some(None))),
            ("max_capacity", matches!(self.max_capacity, Some(None))),
            ("price_per_night", matches!(self.price_per_night, Some(None))),
        ];
        for (field, is_null) in nulls {
            if is_null {
                errors.add(field, ValidationError::new("required"));
            }
        }

        if errors.errors().is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    fn into_changes(self) -> HotelChanges {
        HotelChanges {
            name: self.name.flatten(),
            address1: self.address1.flatten(),
            address2: self.address2,
            zipcode: self.zipcode.flatten(),
            city: self.city.flatten(),
            country: self.country.flatten(),
            lat: self.lat.flatten(),
            lng: self.lng.flatten(),
            description: self.description,
            max_capacity: self.max_capacity.flatten(),
            price_per_night: self.price_per_night.flatten(),
        }
    }
}

/// Listing parameters. Paging values that do not parse fall back to defaults.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct HotelListParams {
    /// Case-insensitive match against name or city
    pub q: Option<String>,
    /// One of name, city, country, price_per_night, max_capacity, created_at, updated_at
    pub sort: Option<String>,
    /// asc or desc (default desc)
    pub order: Option<String>,
    /// Page number, starting at 1
    pub page: Option<String>,
    /// Items per page (default 15, at most 100)
    pub per_page: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HotelResponse {
    pub id: i32,
    pub name: String,
    pub address1: String,
    pub address2: Option<String>,
    pub zipcode: String,
    pub city: String,
    pub country: String,
    #[schema(value_type = String, example = "48.88480000")]
    pub lat: Decimal,
    #[schema(value_type = String, example = "2.33660000")]
    pub lng: Decimal,
    pub description: Option<String>,
    pub max_capacity: i32,
    #[schema(value_type = String, example = "129.00")]
    pub price_per_night: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<hotel::Model> for HotelResponse {
    fn from(model: hotel::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            address1: model.address1,
            address2: model.address2,
            zipcode: model.zipcode,
            city: model.city,
            country: model.country,
            lat: fixed(model.lat, 8),
            lng: fixed(model.lng, 8),
            description: model.description,
            max_capacity: model.max_capacity,
            price_per_night: fixed(model.price_per_night, 2),
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

/// Hotel with its full gallery, ordered by position.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HotelDetailResponse {
    #[serde(flatten)]
    pub hotel: HotelResponse,
    pub pictures: Vec<PictureResponse>,
}

/// Listing entry: the hotel and the first picture of its gallery.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HotelSummaryResponse {
    #[serde(flatten)]
    pub hotel: HotelResponse,
    pub first_picture: Option<PictureResponse>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HotelListResponse {
    pub success: bool,
    pub message: String,
    pub data: Vec<HotelSummaryResponse>,
    pub meta: PageMeta,
    pub links: PageLinks,
    pub status_code: u16,
}

fn picture_responses(
    pictures: Vec<hotel_picture::Model>,
    storage: &dyn FileStorage,
) -> Vec<PictureResponse> {
    pictures
        .into_iter()
        .map(|picture| PictureResponse::from_model(picture, storage))
        .collect()
}

/// List hotels with search, sorting and pagination
#[utoipa::path(
    get,
    path = "/api/hotels",
    params(HotelListParams),
    responses(
        (status = 200, description = "Hotels listed", body = HotelListResponse),
        (status = 400, description = "Unknown sort field or order", body = ErrorResponse)
    ),
    tag = "Hotels"
)]
pub async fn list_hotels(
    State(state): State<AppState>,
    params: Result<Query<HotelListParams>, QueryRejection>,
) -> Result<Response, ServiceError> {
    let Query(params) = params.map_err(|rejection| ServiceError::BadRequest(rejection.body_text()))?;

    let query = HotelListQuery::from_raw(
        params.q.as_deref(),
        params.sort.as_deref(),
        params.order.as_deref(),
        params.page.as_deref(),
        params.per_page.as_deref(),
    )?;

    let page = state.services.hotels.list(query).await?;

    let meta = PageMeta {
        current_page: page.page,
        last_page: page.last_page(),
        per_page: page.per_page,
        total: page.total,
        from: page.from(),
        to: page.to(),
    };
    let links = PageLinks::build(
        &format!("{}/api/hotels", state.config.app_url.trim_end_matches('/')),
        page.page,
        page.last_page(),
    );

    let storage = state.storage.as_ref();
    let data = page
        .items
        .into_iter()
        .map(|(hotel, first_picture)| HotelSummaryResponse {
            hotel: hotel.into(),
            first_picture: first_picture.map(|picture| PictureResponse::from_model(picture, storage)),
        })
        .collect();

    let body = HotelListResponse {
        success: true,
        message: "Hotels retrieved successfully".to_string(),
        data,
        meta,
        links,
        status_code: StatusCode::OK.as_u16(),
    };
    Ok((StatusCode::OK, Json(body)).into_response())
}

/// Get a hotel with its pictures
#[utoipa::path(
    get,
    path = "/api/hotels/{id}",
    params(("id" = i32, Path, description = "Hotel id")),
    responses(
        (status = 200, description = "Hotel found", body = ApiResponse<HotelDetailResponse>),
        (status = 400, description = "Malformed id", body = ErrorResponse),
        (status = 404, description = "Hotel not found", body = ErrorResponse)
    ),
    tag = "Hotels"
)]
pub async fn get_hotel(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<String>,
) -> Result<Response, ServiceError> {
    let id = parse_id(&id, "Hotel")?;
    let (hotel, pictures) = state.services.hotels.get_with_pictures(id).await?;

    let body = HotelDetailResponse {
        hotel: hotel.into(),
        pictures: picture_responses(pictures, state.storage.as_ref()),
    };
    Ok(ApiResponse::ok("Hotel retrieved successfully", body).into_response())
}

/// Create a hotel
#[utoipa::path(
    post,
    path = "/api/hotels",
    request_body = CreateHotelRequest,
    responses(
        (status = 201, description = "Hotel created", body = ApiResponse<HotelResponse>),
        (status = 400, description = "Malformed JSON", body = ErrorResponse),
        (status = 422, description = "Validation failed", body = ErrorResponse)
    ),
    tag = "Hotels"
)]
pub async fn create_hotel(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<CreateHotelRequest>,
) -> Result<Response, ServiceError> {
    let input = payload.into_new_hotel()?;
    let hotel = state.services.hotels.create(input).await?;

    Ok(
        ApiResponse::created("Hotel created successfully", HotelResponse::from(hotel))
            .into_response(),
    )
}

/// Update some or all fields of a hotel
#[utoipa::path(
    put,
    path = "/api/hotels/{id}",
    params(("id" = i32, Path, description = "Hotel id")),
    request_body = UpdateHotelRequest,
    responses(
        (status = 200, description = "Hotel updated", body = ApiResponse<HotelResponse>),
        (status = 404, description = "Hotel not found", body = ErrorResponse),
        (status = 422, description = "Validation failed", body = ErrorResponse)
    ),
    tag = "Hotels"
)]
pub async fn update_hotel(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<String>,
    ApiJson(payload): ApiJson<UpdateHotelRequest>,
) -> Result<Response, ServiceError> {
    let id = parse_id(&id, "Hotel")?;
    payload.validate_update()?;

    let hotel = state
        .services
        .hotels
        .update(id, payload.into_changes())
        .await?;

    Ok(ApiResponse::ok("Hotel updated successfully", HotelResponse::from(hotel)).into_response())
}

/// Delete a hotel together with its pictures
#[utoipa::path(
    delete,
    path = "/api/hotels/{id}",
    params(("id" = i32, Path, description = "Hotel id")),
    responses(
        (status = 200, description = "Hotel deleted", body = crate::MessageResponse),
        (status = 404, description = "Hotel not found", body = ErrorResponse)
    ),
    tag = "Hotels"
)]
pub async fn delete_hotel(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<String>,
) -> Result<Response, ServiceError> {
    let id = parse_id(&id, "Hotel")?;
    state.services.hotels.delete(id).await?;

    Ok(ApiResponse::<()>::message(StatusCode::OK, "Hotel deleted successfully").into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn field_errors(payload: serde_json::Value) -> crate::errors::FieldErrors {
        let request: CreateHotelRequest = serde_json::from_value(payload).unwrap();
        crate::errors::field_errors_from(&request.validate().unwrap_err())
    }

    #[test]
    fn missing_fields_are_required() {
        let errors = field_errors(serde_json::json!({ "name": "Only a name" }));
        assert_eq!(errors["city"], vec!["The city field is required."]);
        assert_eq!(
            errors["price_per_night"],
            vec!["The price per night field is required."]
        );
        assert!(!errors.contains_key("name"));
        assert!(!errors.contains_key("address2"));
    }

    #[test]
    fn coordinates_and_capacity_are_bounded() {
        let errors = field_errors(serde_json::json!({
            "name": "Edge",
            "address1": "1 Pole Road",
            "zipcode": "0000",
            "city": "Nowhere",
            "country": "Antarctica",
            "lat": 90.5,
            "lng": -181,
            "max_capacity": 0,
            "price_per_night": -1
        }));
        assert_eq!(errors["lat"], vec!["The lat field must be between -90 and 90."]);
        assert_eq!(errors["lng"], vec!["The lng field must be between -180 and 180."]);
        assert_eq!(
            errors["max_capacity"],
            vec!["The max capacity field must be between 1 and 200."]
        );
        assert_eq!(
            errors["price_per_night"],
            vec!["The price per night field must be at least 0."]
        );
    }

    #[test]
    fn blank_strings_count_as_missing() {
        let errors = field_errors(serde_json::json!({ "name": "   " }));
        assert_eq!(errors["name"], vec!["The name field is required."]);
    }

    #[test]
    fn update_rejects_null_on_required_columns_only() {
        let request: UpdateHotelRequest = serde_json::from_value(serde_json::json!({
            "name": null,
            "description": null,
            "address2": null
        }))
        .unwrap();
        let errors = crate::errors::field_errors_from(&request.validate_update().unwrap_err());
        assert_eq!(errors.len(), 1);
        assert_eq!(errors["name"], vec!["The name field is required."]);
    }

    #[test]
    fn update_keeps_explicit_clears() {
        let request: UpdateHotelRequest = serde_json::from_value(serde_json::json!({
            "description": null,
            "max_capacity": 12
        }))
        .unwrap();
        request.validate_update().unwrap();
        let changes = request.into_changes();
        assert_eq!(changes.description, Some(None));
        assert_eq!(changes.max_capacity, Some(12));
        assert_eq!(changes.name, None);
        assert_eq!(changes.address2, None);
    }

    #[test]
    fn decimals_are_rendered_at_column_scale() {
        assert_eq!(fixed(dec!(48.8566), 8).to_string(), "48.85660000");
        assert_eq!(fixed(dec!(129), 2).to_string(), "129.00");
        assert_eq!(fixed(dec!(2.349999999999), 8).to_string(), "2.35000000");
    }
}
