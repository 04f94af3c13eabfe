//! Repository for the `tours` table.
//!
//! Every read goes through a [`VisibleFilter`] or a [`VisiblePipeline`], so
//! secret tours cannot be returned by a find, an update, a delete or an
//! aggregation.

use std::time::Instant;

use serde_json::Value;
use sqlx::postgres::PgArguments;
use sqlx::query::QueryAs;
use sqlx::{PgPool, Postgres};
use tourbook_core::tour::filter::{CompareOp, FieldKind, FilterValue, TourCondition};
use tourbook_core::tour::{NewTour, VisibleFilter, VisiblePipeline};
use tourbook_core::types::DbId;

use crate::error::{map_unique, WriteError};
use crate::models::tour::Tour;

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, name, slug, duration, max_group_size, difficulty, \
    ratings_average, ratings_quantity, price, price_discount, summary, description, \
    image_cover, images, start_dates, secret_tour, created_at";

/// Provides CRUD and aggregation operations for tours.
pub struct TourRepo;

impl TourRepo {
    /// Insert a validated tour, returning the created row.
    ///
    /// The slug is derived from the name here, immediately before the write.
    /// A name already taken by another tour yields a conflict.
    pub async fn create(pool: &PgPool, input: &NewTour) -> Result<Tour, WriteError> {
        let query = format!(
            "INSERT INTO tours (name, slug, duration, max_group_size, difficulty,
                ratings_average, ratings_quantity, price, price_discount, summary,
                description, image_cover, images, start_dates, secret_tour)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Tour>(&query)
            .bind(&input.name)
            .bind(input.slug())
            .bind(input.duration)
            .bind(input.max_group_size)
            .bind(input.difficulty.as_str())
            .bind(input.ratings_average)
            .bind(input.ratings_quantity)
            .bind(input.price)
            .bind(input.price_discount)
            .bind(&input.summary)
            .bind(&input.description)
            .bind(&input.image_cover)
            .bind(&input.images)
            .bind(&input.start_dates)
            .bind(input.secret_tour)
            .fetch_one(pool)
            .await
            .map_err(|e| map_unique(e, &input.name))
    }

    /// List visible tours matching `filter`, ordered by id.
    pub async fn find_many(pool: &PgPool, filter: &VisibleFilter) -> Result<Vec<Tour>, sqlx::Error> {
        let started = Instant::now();
        let clause = WhereClause::build(filter, 1);
        let query = format!(
            "SELECT {COLUMNS} FROM tours WHERE {} ORDER BY id",
            clause.predicate()
        );
        let tours = bind_values(sqlx::query_as::<_, Tour>(&query), &clause.binds)
            .fetch_all(pool)
            .await?;
        log_read("find_many", started, tours.len());
        Ok(tours)
    }

    /// Find a visible tour by ID.
    pub async fn find_one(pool: &PgPool, id: DbId) -> Result<Option<Tour>, sqlx::Error> {
        let started = Instant::now();
        let clause = WhereClause::build(&VisibleFilter::all(), 2);
        let query = format!(
            "SELECT {COLUMNS} FROM tours WHERE id = $1 AND {}",
            clause.predicate()
        );
        let tour = bind_values(sqlx::query_as::<_, Tour>(&query).bind(id), &clause.binds)
            .fetch_optional(pool)
            .await?;
        log_read("find_one", started, usize::from(tour.is_some()));
        Ok(tour)
    }

    /// Overwrite a visible tour with a fully validated record.
    ///
    /// Returns `None` if no visible row with the given `id` exists.
    pub async fn update(
        pool: &PgPool,
        id: DbId,
        input: &NewTour,
    ) -> Result<Option<Tour>, WriteError> {
        let clause = WhereClause::build(&VisibleFilter::all(), 17);
        let query = format!(
            "UPDATE tours SET
                name = $2,
                slug = $3,
                duration = $4,
                max_group_size = $5,
                difficulty = $6,
                ratings_average = $7,
                ratings_quantity = $8,
                price = $9,
                price_discount = $10,
                summary = $11,
                description = $12,
                image_cover = $13,
                images = $14,
                start_dates = $15,
                secret_tour = $16
             WHERE id = $1 AND {}
             RETURNING {COLUMNS}",
            clause.predicate()
        );
        let q = sqlx::query_as::<_, Tour>(&query)
            .bind(id)
            .bind(&input.name)
            .bind(input.slug())
            .bind(input.duration)
            .bind(input.max_group_size)
            .bind(input.difficulty.as_str())
            .bind(input.ratings_average)
            .bind(input.ratings_quantity)
            .bind(input.price)
            .bind(input.price_discount)
            .bind(&input.summary)
            .bind(&input.description)
            .bind(&input.image_cover)
            .bind(&input.images)
            .bind(&input.start_dates)
            .bind(input.secret_tour);
        bind_values(q, &clause.binds)
            .fetch_optional(pool)
            .await
            .map_err(|e| map_unique(e, &input.name))
    }

    /// Delete a visible tour by ID. Returns `true` if a row was removed.
    pub async fn delete(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let clause = WhereClause::build(&VisibleFilter::all(), 2);
        let query = format!(
            "DELETE FROM tours WHERE id = $1 AND {} RETURNING id",
            clause.predicate()
        );
        let deleted = bind_values(sqlx::query_as::<_, (DbId,)>(&query).bind(id), &clause.binds)
            .fetch_optional(pool)
            .await?;
        Ok(deleted.is_some())
    }

    /// Run an aggregation pipeline over every tour document.
    ///
    /// Rows are loaded unfiltered; the pipeline's leading visibility stage
    /// removes secret tours before any caller stage runs.
    pub async fn aggregate(
        pool: &PgPool,
        pipeline: &VisiblePipeline,
    ) -> Result<Vec<Value>, sqlx::Error> {
        let started = Instant::now();
        tracing::debug!(stages = ?pipeline.stages(), "Running aggregation pipeline");

        let query = format!("SELECT {COLUMNS} FROM tours ORDER BY id");
        let tours = sqlx::query_as::<_, Tour>(&query).fetch_all(pool).await?;
        let docs = tours
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| sqlx::Error::Decode(Box::new(e)))?;

        let results = pipeline.run(docs);
        log_read("aggregate", started, results.len());
        Ok(results)
    }
}

fn log_read(operation: &'static str, started: Instant, rows: usize) {
    let elapsed_ms = started.elapsed().as_millis() as u64;
    tracing::debug!(operation, elapsed_ms, rows, "Tour query finished");
}

// ---------------------------------------------------------------------------
// Dynamic WHERE clause
// ---------------------------------------------------------------------------

/// A dynamically bound value for filter queries.
#[derive(Debug, Clone, PartialEq)]
enum BindValue {
    Number(f64),
    Text(String),
    Bool(bool),
}

/// SQL conditions for a [`VisibleFilter`] with placeholders numbered from a
/// caller-chosen index.
#[derive(Debug)]
struct WhereClause {
    conditions: Vec<String>,
    binds: Vec<BindValue>,
}

impl WhereClause {
    fn build(filter: &VisibleFilter, first_idx: usize) -> Self {
        let mut conditions = Vec::new();
        let mut binds = Vec::new();
        for (offset, condition) in filter.conditions().iter().enumerate() {
            let bind_idx = first_idx + offset;
            conditions.push(condition_sql(condition, bind_idx));
            binds.push(match condition.value() {
                FilterValue::Number(n) => BindValue::Number(*n),
                FilterValue::Text(s) => BindValue::Text(s.clone()),
                FilterValue::Bool(b) => BindValue::Bool(*b),
            });
        }
        Self { conditions, binds }
    }

    fn predicate(&self) -> String {
        if self.conditions.is_empty() {
            "TRUE".to_string()
        } else {
            self.conditions.join(" AND ")
        }
    }
}

fn condition_sql(condition: &TourCondition, bind_idx: usize) -> String {
    let field = condition.field();
    let column = match field.kind() {
        FieldKind::Number => format!("{}::float8", field.column()),
        FieldKind::Text | FieldKind::Boolean | FieldKind::Difficulty => field.column().to_string(),
    };
    // `ne` also matches NULL columns.
    let operator = match condition.op() {
        CompareOp::Eq => "=",
        CompareOp::Ne => "IS DISTINCT FROM",
        CompareOp::Gt => ">",
        CompareOp::Gte => ">=",
        CompareOp::Lt => "<",
        CompareOp::Lte => "<=",
    };
    format!("{column} {operator} ${bind_idx}")
}

/// Bind a slice of `BindValue` to a sqlx `QueryAs`.
fn bind_values<'q, O>(
    mut q: QueryAs<'q, Postgres, O, PgArguments>,
    binds: &'q [BindValue],
) -> QueryAs<'q, Postgres, O, PgArguments> {
    for value in binds {
        q = match value {
            BindValue::Number(v) => q.bind(*v),
            BindValue::Text(v) => q.bind(v.as_str()),
            BindValue::Bool(v) => q.bind(*v),
        };
    }
    q
}
