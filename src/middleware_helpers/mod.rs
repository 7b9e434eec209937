pub mod debug_errors;
pub mod request_id;

pub use debug_errors::debug_errors_middleware;
pub use request_id::{request_id_middleware, REQUEST_ID_HEADER};
