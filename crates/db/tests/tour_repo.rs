//! Integration tests for `TourRepo` against a real database.

use assert_matches::assert_matches;
use serde_json::json;
use sqlx::PgPool;
use tourbook_core::error::CoreError;
use tourbook_core::tour::{
    CompareOp, NewTour, TourCondition, TourDraft, TourField, TourFilter, TourPatch,
    VisibleFilter, VisiblePipeline,
};
use tourbook_db::error::WriteError;
use tourbook_db::repositories::TourRepo;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn new_tour(name: &str, difficulty: &str, price: f64, secret: bool) -> NewTour {
    let draft: TourDraft = serde_json::from_value(json!({
        "name": name,
        "duration": 5,
        "maxGroupSize": 25,
        "difficulty": difficulty,
        "price": price,
        "summary": "Breathtaking hike",
        "imageCover": "cover.jpg",
        "startDates": ["2021-04-25T09:00:00Z", "2021-07-20T09:00:00Z"],
        "secretTour": secret,
    }))
    .unwrap();
    draft.into_new_tour().unwrap()
}

async fn seed(pool: &PgPool) {
    for (name, difficulty, price, secret) in [
        ("The Forest Hiker", "easy", 397.0, false),
        ("The Sea Explorer", "medium", 497.0, false),
        ("The Snow Adventurer", "difficult", 997.0, false),
        ("The Secret Escape", "easy", 10.0, true),
    ] {
        TourRepo::create(pool, &new_tour(name, difficulty, price, secret))
            .await
            .unwrap();
    }
}

// ---------------------------------------------------------------------------
// Create
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "./migrations")]
async fn test_create_derives_slug_and_defaults(pool: PgPool) {
    let tour = TourRepo::create(&pool, &new_tour("The Forest Hiker", "easy", 397.0, false))
        .await
        .unwrap();

    assert_eq!(tour.slug, "the-forest-hiker");
    assert_eq!(tour.ratings_average, 4.5);
    assert_eq!(tour.ratings_quantity, 0);
    assert_eq!(tour.start_dates.len(), 2);
    assert!(!tour.secret_tour);
    assert!((tour.duration_weeks() - 5.0 / 7.0).abs() < 1e-9);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_duplicate_name_is_a_conflict(pool: PgPool) {
    let input = new_tour("The Forest Hiker", "easy", 397.0, false);
    TourRepo::create(&pool, &input).await.unwrap();

    let err = TourRepo::create(&pool, &input).await.unwrap_err();
    assert_matches!(
        err,
        WriteError::Core(CoreError::Conflict(msg)) if msg.contains("The Forest Hiker")
    );
}

#[sqlx::test(migrations = "./migrations")]
async fn test_update_to_taken_name_is_a_conflict(pool: PgPool) {
    seed(&pool).await;
    let hiker = TourRepo::find_many(&pool, &VisibleFilter::all())
        .await
        .unwrap()
        .into_iter()
        .find(|t| t.slug == "the-forest-hiker")
        .unwrap();

    let patch: TourPatch = serde_json::from_value(json!({"name": "The Sea Explorer"})).unwrap();
    let merged = patch.merge_onto(hiker.to_draft()).into_new_tour().unwrap();
    let err = TourRepo::update(&pool, hiker.id, &merged).await.unwrap_err();
    assert_matches!(err, WriteError::Core(CoreError::Conflict(_)));
}

// ---------------------------------------------------------------------------
// Find
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "./migrations")]
async fn test_find_many_hides_secret_tours(pool: PgPool) {
    seed(&pool).await;

    let tours = TourRepo::find_many(&pool, &VisibleFilter::all()).await.unwrap();
    assert_eq!(tours.len(), 3);
    assert!(tours.iter().all(|t| !t.secret_tour));
}

#[sqlx::test(migrations = "./migrations")]
async fn test_find_many_applies_caller_filter(pool: PgPool) {
    seed(&pool).await;

    let filter = TourFilter::new()
        .and(TourCondition::parse(TourField::Price, CompareOp::Lt, "900").unwrap())
        .and(TourCondition::parse(TourField::Difficulty, CompareOp::Eq, "easy").unwrap());
    let tours = TourRepo::find_many(&pool, &filter.into()).await.unwrap();
    let names: Vec<_> = tours.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["The Forest Hiker"]);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_explicit_secret_filter_still_hidden(pool: PgPool) {
    seed(&pool).await;

    let filter = TourFilter::new()
        .and(TourCondition::parse(TourField::SecretTour, CompareOp::Eq, "true").unwrap());
    let tours = TourRepo::find_many(&pool, &filter.into()).await.unwrap();
    assert!(tours.is_empty());
}

#[sqlx::test(migrations = "./migrations")]
async fn test_find_one_hides_secret_tour(pool: PgPool) {
    let secret = TourRepo::create(&pool, &new_tour("The Secret Escape", "easy", 10.0, true))
        .await
        .unwrap();
    let visible = TourRepo::create(&pool, &new_tour("The Forest Hiker", "easy", 397.0, false))
        .await
        .unwrap();

    assert!(TourRepo::find_one(&pool, secret.id).await.unwrap().is_none());
    assert_eq!(
        TourRepo::find_one(&pool, visible.id).await.unwrap().unwrap().name,
        "The Forest Hiker"
    );
    assert!(TourRepo::find_one(&pool, 999_999).await.unwrap().is_none());
}

// ---------------------------------------------------------------------------
// Update / delete
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "./migrations")]
async fn test_update_rewrites_slug(pool: PgPool) {
    let tour = TourRepo::create(&pool, &new_tour("The Forest Hiker", "easy", 397.0, false))
        .await
        .unwrap();

    let patch: TourPatch = serde_json::from_value(json!({"name": "The Mountain Hiker"})).unwrap();
    let merged = patch.merge_onto(tour.to_draft()).into_new_tour().unwrap();
    let updated = TourRepo::update(&pool, tour.id, &merged).await.unwrap().unwrap();

    assert_eq!(updated.id, tour.id);
    assert_eq!(updated.slug, "the-mountain-hiker");
    assert_eq!(updated.price, 397.0);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_update_and_delete_skip_secret_tours(pool: PgPool) {
    let secret = TourRepo::create(&pool, &new_tour("The Secret Escape", "easy", 10.0, true))
        .await
        .unwrap();
    let input = secret.to_draft().into_new_tour().unwrap();

    assert!(TourRepo::update(&pool, secret.id, &input).await.unwrap().is_none());
    assert!(!TourRepo::delete(&pool, secret.id).await.unwrap());
}

#[sqlx::test(migrations = "./migrations")]
async fn test_delete_removes_row(pool: PgPool) {
    let tour = TourRepo::create(&pool, &new_tour("The Forest Hiker", "easy", 397.0, false))
        .await
        .unwrap();

    assert!(TourRepo::delete(&pool, tour.id).await.unwrap());
    assert!(!TourRepo::delete(&pool, tour.id).await.unwrap());
    assert!(TourRepo::find_one(&pool, tour.id).await.unwrap().is_none());
}

// ---------------------------------------------------------------------------
// Aggregate
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "./migrations")]
async fn test_tour_stats_excludes_secret_tours(pool: PgPool) {
    seed(&pool).await;

    let stats = TourRepo::aggregate(&pool, &VisiblePipeline::tour_stats())
        .await
        .unwrap();
    // Every seeded tour has the default 4.5 rating.
    let easy = stats.iter().find(|d| d["key"] == "easy").unwrap();
    assert_eq!(easy["numTours"], 1);
    assert_eq!(easy["minPrice"], 397);
    assert_eq!(stats.len(), 3);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_monthly_plan_over_stored_dates(pool: PgPool) {
    seed(&pool).await;

    let plan = TourRepo::aggregate(&pool, &VisiblePipeline::monthly_plan(2021).unwrap())
        .await
        .unwrap();
    assert_eq!(plan.len(), 2);
    for month in &plan {
        assert_eq!(month["numTourStarts"], 3);
        assert!(!month["tours"]
            .as_array()
            .unwrap()
            .contains(&json!("The Secret Escape")));
    }
}
