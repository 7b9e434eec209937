pub mod hotels;
pub mod pictures;

pub use hotels::HotelService;
pub use pictures::PictureService;
