pub mod health;
pub mod tours;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /tours                              list, create
/// /tours/tour-stats                   stats per difficulty
/// /tours/monthly-plan/{year}          tour starts per month
/// /tours/aggregate                    caller-supplied pipeline (POST)
/// /tours/{id}                         get, update (PATCH), delete
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new().nest("/tours", tours::router())
}
