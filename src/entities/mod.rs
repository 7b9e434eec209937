pub mod hotel;
pub mod hotel_picture;

pub use hotel::Entity as Hotel;
pub use hotel_picture::Entity as HotelPicture;
