use axum::routing::{get, post};
use axum::Router;

use crate::handlers::tours;
use crate::state::AppState;

/// Routes mounted at `/tours`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(tours::list).post(tours::create))
        .route("/tour-stats", get(tours::tour_stats))
        .route("/monthly-plan/{year}", get(tours::monthly_plan))
        .route("/aggregate", post(tours::aggregate))
        .route(
            "/{id}",
            get(tours::get_by_id)
                .patch(tours::update)
                .delete(tours::delete),
        )
}
