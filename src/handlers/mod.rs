pub mod common;
pub mod hotels;
pub mod pictures;

use crate::{
    db::DbPool,
    services::{HotelService, PictureService},
    storage::FileStorage,
};
use std::sync::Arc;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub hotels: Arc<HotelService>,
    pub pictures: Arc<PictureService>,
}

impl AppServices {
    pub fn new(db_pool: Arc<DbPool>, storage: Arc<dyn FileStorage>, max_upload_bytes: u64) -> Self {
        let hotels = Arc::new(HotelService::new(db_pool.clone(), storage.clone()));
        let pictures = Arc::new(PictureService::new(db_pool, storage, max_upload_bytes));

        Self { hotels, pictures }
    }
}
