//! Request arrival timestamp.

use std::convert::Infallible;

use axum::extract::{FromRequestParts, Request};
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::Response;
use chrono::Utc;
use tourbook_core::types::Timestamp;

/// The moment a request entered the middleware stack.
///
/// Use as an extractor in handlers that report `requestedAt`:
///
/// ```ignore
/// async fn list(requested_at: RequestTime) -> AppResult<Json<ListResponse<Tour>>> { ... }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestTime(pub Timestamp);

/// Stamp every request with a [`RequestTime`] extension.
pub async fn stamp_request_time(mut request: Request, next: Next) -> Response {
    request.extensions_mut().insert(RequestTime(Utc::now()));
    next.run(request).await
}

impl<S> FromRequestParts<S> for RequestTime
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // Routers built without the middleware fall back to "now".
        Ok(parts
            .extensions
            .get::<RequestTime>()
            .copied()
            .unwrap_or_else(|| RequestTime(Utc::now())))
    }
}
