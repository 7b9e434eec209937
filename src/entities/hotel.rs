use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveModelBehavior, ActiveValue::Set, ConnectionTrait};
use serde::{Deserialize, Serialize};

/// Hotel listing
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "hotels")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub name: String,
    pub address1: String,
    pub address2: Option<String>,
    pub zipcode: String,
    pub city: String,
    pub country: String,

    /// Latitude, stored with 8 decimal places
    #[sea_orm(column_type = "Decimal(Some((10, 8)))")]
    pub lat: Decimal,

    /// Longitude, stored with 8 decimal places
    #[sea_orm(column_type = "Decimal(Some((11, 8)))")]
    pub lng: Decimal,

    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,

    pub max_capacity: i32,

    #[sea_orm(column_type = "Decimal(Some((10, 2)))")]
    pub price_per_night: Decimal,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::hotel_picture::Entity")]
    Pictures,
}

impl Related<super::hotel_picture::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Pictures.def()
    }
}

#[async_trait::async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C>(self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let mut active_model = self;
        let now = Utc::now();

        if insert {
            active_model.created_at = Set(now);
        }
        active_model.updated_at = Set(now);

        Ok(active_model)
    }
}
