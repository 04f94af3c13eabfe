//! Tour entity model.

use serde::ser::{Serialize, SerializeStruct, Serializer};
use sqlx::FromRow;
use tourbook_core::tour::{Difficulty, TourDraft};
use tourbook_core::types::{DbId, Timestamp};

/// A row from the `tours` table.
///
/// Serialized in camelCase with the derived `durationWeeks`; `createdAt` is
/// never serialized.
#[derive(Debug, Clone, FromRow)]
pub struct Tour {
    pub id: DbId,
    pub name: String,
    pub slug: String,
    pub duration: i32,
    pub max_group_size: i32,
    #[sqlx(try_from = "String")]
    pub difficulty: Difficulty,
    pub ratings_average: f64,
    pub ratings_quantity: i32,
    pub price: f64,
    pub price_discount: Option<f64>,
    pub summary: String,
    pub description: Option<String>,
    pub image_cover: String,
    pub images: Vec<String>,
    pub start_dates: Vec<Timestamp>,
    pub secret_tour: bool,
    pub created_at: Timestamp,
}

impl Tour {
    /// Duration in weeks. Not stored.
    pub fn duration_weeks(&self) -> f64 {
        f64::from(self.duration) / 7.0
    }

    /// The stored record as a complete draft, used as the base an update
    /// patch is merged onto.
    pub fn to_draft(&self) -> TourDraft {
        TourDraft {
            name: Some(self.name.clone()),
            duration: Some(self.duration),
            max_group_size: Some(self.max_group_size),
            difficulty: Some(self.difficulty.as_str().to_string()),
            ratings_average: Some(self.ratings_average),
            ratings_quantity: Some(self.ratings_quantity),
            price: Some(self.price),
            price_discount: self.price_discount,
            summary: Some(self.summary.clone()),
            description: self.description.clone(),
            image_cover: Some(self.image_cover.clone()),
            images: Some(self.images.clone()),
            start_dates: Some(self.start_dates.clone()),
            secret_tour: Some(self.secret_tour),
        }
    }
}

impl Serialize for Tour {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("Tour", 17)?;
        s.serialize_field("id", &self.id)?;
        s.serialize_field("name", &self.name)?;
        s.serialize_field("slug", &self.slug)?;
        s.serialize_field("duration", &self.duration)?;
        s.serialize_field("durationWeeks", &self.duration_weeks())?;
        s.serialize_field("maxGroupSize", &self.max_group_size)?;
        s.serialize_field("difficulty", &self.difficulty)?;
        s.serialize_field("ratingsAverage", &self.ratings_average)?;
        s.serialize_field("ratingsQuantity", &self.ratings_quantity)?;
        s.serialize_field("price", &self.price)?;
        s.serialize_field("priceDiscount", &self.price_discount)?;
        s.serialize_field("summary", &self.summary)?;
        s.serialize_field("description", &self.description)?;
        s.serialize_field("imageCover", &self.image_cover)?;
        s.serialize_field("images", &self.images)?;
        s.serialize_field("startDates", &self.start_dates)?;
        s.serialize_field("secretTour", &self.secret_tour)?;
        s.end()
    }
}
