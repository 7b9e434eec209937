use crate::{
    entities::{hotel, hotel_picture, Hotel, HotelPicture},
    errors::ServiceError,
    storage::FileStorage,
};
use futures::future::try_join_all;
use metrics::counter;
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::{Expr, Func},
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, DbBackend,
    EntityTrait, Order, PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use std::sync::Arc;
use tracing::{info, instrument, warn};

pub const DEFAULT_PER_PAGE: u64 = 15;
pub const MAX_PER_PAGE: u64 = 100;

/// Columns a hotel listing may be sorted by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HotelSortField {
    Name,
    City,
    Country,
    PricePerNight,
    MaxCapacity,
    #[default]
    CreatedAt,
    UpdatedAt,
}

impl HotelSortField {
    pub const ALLOWED: [&'static str; 7] = [
        "name",
        "city",
        "country",
        "price_per_night",
        "max_capacity",
        "created_at",
        "updated_at",
    ];

    pub fn parse(raw: &str) -> Result<Self, ServiceError> {
        match raw {
            "name" => Ok(Self::Name),
            "city" => Ok(Self::City),
            "country" => Ok(Self::Country),
            "price_per_night" => Ok(Self::PricePerNight),
            "max_capacity" => Ok(Self::MaxCapacity),
            "created_at" => Ok(Self::CreatedAt),
            "updated_at" => Ok(Self::UpdatedAt),
            other => Err(ServiceError::BadRequest(format!(
                "Invalid sort field '{}'. Allowed: {}",
                other,
                Self::ALLOWED.join(", ")
            ))),
        }
    }

    fn column(self) -> hotel::Column {
        match self {
            Self::Name => hotel::Column::Name,
            Self::City => hotel::Column::City,
            Self::Country => hotel::Column::Country,
            Self::PricePerNight => hotel::Column::PricePerNight,
            Self::MaxCapacity => hotel::Column::MaxCapacity,
            Self::CreatedAt => hotel::Column::CreatedAt,
            Self::UpdatedAt => hotel::Column::UpdatedAt,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    pub fn parse(raw: &str) -> Result<Self, ServiceError> {
        if raw.eq_ignore_ascii_case("asc") {
            Ok(Self::Asc)
        } else if raw.eq_ignore_ascii_case("desc") {
            Ok(Self::Desc)
        } else {
            Err(ServiceError::BadRequest(format!(
                "Invalid sort order '{}'. Allowed: asc, desc",
                raw
            )))
        }
    }

    fn order(self) -> Order {
        match self {
            Self::Asc => Order::Asc,
            Self::Desc => Order::Desc,
        }
    }
}

/// Normalized listing query.
#[derive(Debug, Clone, PartialEq)]
pub struct HotelListQuery {
    pub search: Option<String>,
    pub sort: HotelSortField,
    pub direction: SortDirection,
    pub page: u64,
    pub per_page: u64,
}

impl Default for HotelListQuery {
    fn default() -> Self {
        Self {
            search: None,
            sort: HotelSortField::default(),
            direction: SortDirection::default(),
            page: 1,
            per_page: DEFAULT_PER_PAGE,
        }
    }
}

impl HotelListQuery {
    /// Builds a query from raw request parameters.
    ///
    /// Unknown sort fields and orders are rejected; unparsable or non-positive
    /// paging values fall back to their defaults and `per_page` is capped.
    pub fn from_raw(
        q: Option<&str>,
        sort: Option<&str>,
        order: Option<&str>,
        page: Option<&str>,
        per_page: Option<&str>,
    ) -> Result<Self, ServiceError> {
        let search = q
            .map(str::trim)
            .filter(|term| !term.is_empty())
            .map(str::to_string);
        let sort = match sort.map(str::trim).filter(|s| !s.is_empty()) {
            Some(raw) => HotelSortField::parse(raw)?,
            None => HotelSortField::default(),
        };
        let direction = match order.map(str::trim).filter(|s| !s.is_empty()) {
            Some(raw) => SortDirection::parse(raw)?,
            None => SortDirection::default(),
        };

        Ok(Self {
            search,
            sort,
            direction,
            page: parse_positive(page).unwrap_or(1),
            per_page: parse_positive(per_page)
                .unwrap_or(DEFAULT_PER_PAGE)
                .min(MAX_PER_PAGE),
        })
    }
}

fn parse_positive(raw: Option<&str>) -> Option<u64> {
    raw.and_then(|value| value.trim().parse::<i64>().ok())
        .filter(|value| *value > 0)
        .map(|value| value as u64)
}

/// Lowercases a search term the way the backend's `lower()` folds stored values.
///
/// SQLite folds ASCII letters only, so there `É` and `é` stay distinct on both sides.
fn fold_search_term(term: &str, backend: DbBackend) -> String {
    match backend {
        DbBackend::Sqlite => term.to_ascii_lowercase(),
        _ => term.to_lowercase(),
    }
}

/// One page of hotels, each paired with its first picture.
#[derive(Debug, Clone)]
pub struct HotelPage {
    pub items: Vec<(hotel::Model, Option<hotel_picture::Model>)>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

impl HotelPage {
    pub fn last_page(&self) -> u64 {
        self.total.div_ceil(self.per_page).max(1)
    }

    /// 1-based index of the first item on this page, `None` when the page is empty.
    pub fn from(&self) -> Option<u64> {
        (!self.items.is_empty()).then(|| (self.page - 1) * self.per_page + 1)
    }

    pub fn to(&self) -> Option<u64> {
        self.from().map(|from| from + self.items.len() as u64 - 1)
    }
}

#[derive(Debug, Clone)]
pub struct NewHotel {
    pub name: String,
    pub address1: String,
    pub address2: Option<String>,
    pub zipcode: String,
    pub city: String,
    pub country: String,
    pub lat: Decimal,
    pub lng: Decimal,
    pub description: Option<String>,
    pub max_capacity: i32,
    pub price_per_night: Decimal,
}

/// Partial update. For nullable columns the outer `Option` means "present",
/// the inner one carries an explicit null.
#[derive(Debug, Clone, Default)]
pub struct HotelChanges {
    pub name: Option<String>,
    pub address1: Option<String>,
    pub address2: Option<Option<String>>,
    pub zipcode: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub lat: Option<Decimal>,
    pub lng: Option<Decimal>,
    pub description: Option<Option<String>>,
    pub max_capacity: Option<i32>,
    pub price_per_night: Option<Decimal>,
}

/// Hotel records and their listing queries
#[derive(Clone)]
pub struct HotelService {
    db: Arc<DatabaseConnection>,
    storage: Arc<dyn FileStorage>,
}

impl HotelService {
    pub fn new(db: Arc<DatabaseConnection>, storage: Arc<dyn FileStorage>) -> Self {
        Self { db, storage }
    }

    /// Search, sort and paginate hotels.
    #[instrument(skip(self))]
    pub async fn list(&self, query: HotelListQuery) -> Result<HotelPage, ServiceError> {
        let mut select = Hotel::find();

        if let Some(term) = &query.search {
            let pattern = format!("%{}%", fold_search_term(term, self.db.get_database_backend()));
            select = select.filter(
                Condition::any()
                    .add(Expr::expr(Func::lower(Expr::col(hotel::Column::Name))).like(&pattern))
                    .add(Expr::expr(Func::lower(Expr::col(hotel::Column::City))).like(&pattern)),
            );
        }

        let order = query.direction.order();
        let paginator = select
            .order_by(query.sort.column(), order.clone())
            .order_by(hotel::Column::Id, order)
            .paginate(&*self.db, query.per_page);

        let total = paginator.num_items().await?;
        // Pages past the end are empty; their offset may not even fit a u64.
        let hotels = match (query.page - 1).checked_mul(query.per_page) {
            Some(offset) if offset < total => paginator.fetch_page(query.page - 1).await?,
            _ => Vec::new(),
        };

        let first_pictures =
            try_join_all(hotels.iter().map(|hotel| self.first_picture(hotel.id))).await?;

        Ok(HotelPage {
            items: hotels.into_iter().zip(first_pictures).collect(),
            total,
            page: query.page,
            per_page: query.per_page,
        })
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: i32) -> Result<hotel::Model, ServiceError> {
        Hotel::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::not_found("Hotel", id))
    }

    /// Hotel with its full gallery, ordered by position then id.
    #[instrument(skip(self))]
    pub async fn get_with_pictures(
        &self,
        id: i32,
    ) -> Result<(hotel::Model, Vec<hotel_picture::Model>), ServiceError> {
        let hotel = self.get(id).await?;
        let pictures = HotelPicture::find()
            .filter(hotel_picture::Column::HotelId.eq(id))
            .order_by_asc(hotel_picture::Column::Position)
            .order_by_asc(hotel_picture::Column::Id)
            .all(&*self.db)
            .await?;
        Ok((hotel, pictures))
    }

    /// Lowest-positioned picture of a hotel (ties go to the oldest record).
    pub async fn first_picture(
        &self,
        hotel_id: i32,
    ) -> Result<Option<hotel_picture::Model>, ServiceError> {
        HotelPicture::find()
            .filter(hotel_picture::Column::HotelId.eq(hotel_id))
            .order_by_asc(hotel_picture::Column::Position)
            .order_by_asc(hotel_picture::Column::Id)
            .one(&*self.db)
            .await
            .map_err(Into::into)
    }

    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create(&self, input: NewHotel) -> Result<hotel::Model, ServiceError> {
        let hotel = hotel::ActiveModel {
            name: Set(input.name),
            address1: Set(input.address1),
            address2: Set(input.address2),
            zipcode: Set(input.zipcode),
            city: Set(input.city),
            country: Set(input.country),
            lat: Set(input.lat.round_dp(8)),
            lng: Set(input.lng.round_dp(8)),
            description: Set(input.description),
            max_capacity: Set(input.max_capacity),
            price_per_night: Set(input.price_per_night.round_dp(2)),
            ..Default::default()
        };

        let hotel = hotel.insert(&*self.db).await?;

        counter!("hotel_api.hotels.created", 1);
        info!("Created hotel: {}", hotel.id);
        Ok(hotel)
    }

    #[instrument(skip(self, changes))]
    pub async fn update(&self, id: i32, changes: HotelChanges) -> Result<hotel::Model, ServiceError> {
        let hotel = self.get(id).await?;
        let mut active: hotel::ActiveModel = hotel.into();

        if let Some(name) = changes.name {
            active.name = Set(name);
        }
        if let Some(address1) = changes.address1 {
            active.address1 = Set(address1);
        }
        if let Some(address2) = changes.address2 {
            active.address2 = Set(address2);
        }
        if let Some(zipcode) = changes.zipcode {
            active.zipcode = Set(zipcode);
        }
        if let Some(city) = changes.city {
            active.city = Set(city);
        }
        if let Some(country) = changes.country {
            active.country = Set(country);
        }
        if let Some(lat) = changes.lat {
            active.lat = Set(lat.round_dp(8));
        }
        if let Some(lng) = changes.lng {
            active.lng = Set(lng.round_dp(8));
        }
        if let Some(description) = changes.description {
            active.description = Set(description);
        }
        if let Some(max_capacity) = changes.max_capacity {
            active.max_capacity = Set(max_capacity);
        }
        if let Some(price) = changes.price_per_night {
            active.price_per_night = Set(price.round_dp(2));
        }

        let hotel = active.update(&*self.db).await?;

        counter!("hotel_api.hotels.updated", 1);
        info!("Updated hotel: {}", id);
        Ok(hotel)
    }

    /// Deletes a hotel and its pictures in one transaction, then removes the
    /// stored files. File removal failures are logged and do not fail the call.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: i32) -> Result<(), ServiceError> {
        let txn = self.db.begin().await?;

        Hotel::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::not_found("Hotel", id))?;

        let pictures = HotelPicture::find()
            .filter(hotel_picture::Column::HotelId.eq(id))
            .all(&txn)
            .await?;

        HotelPicture::delete_many()
            .filter(hotel_picture::Column::HotelId.eq(id))
            .exec(&txn)
            .await?;
        Hotel::delete_by_id(id).exec(&txn).await?;

        txn.commit().await?;

        for picture in &pictures {
            if let Err(err) = self.storage.delete(&picture.filepath).await {
                warn!(
                    hotel_id = id,
                    picture_id = picture.id,
                    error = %err,
                    "Failed to remove picture file after hotel deletion"
                );
            }
        }

        counter!("hotel_api.hotels.deleted", 1);
        info!("Deleted hotel {} with {} picture(s)", id, pictures.len());
        Ok(())
    }
}
