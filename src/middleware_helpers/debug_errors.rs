use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

/// Enables debug details in error envelopes for the duration of the request
/// when the service runs with `debug = true`.
pub async fn debug_errors_middleware(
    State(enabled): State<bool>,
    request: Request,
    next: Next,
) -> Response {
    crate::errors::scope_debug_errors(enabled, next.run(request)).await
}
