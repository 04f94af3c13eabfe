//! Tour schema: the inbound payload, its constraints, and the validated
//! record handed to the persistence layer.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationErrors};

use crate::error::{CoreError, FieldViolation};
use crate::tour::slug::slugify;
use crate::types::Timestamp;

/// Default `ratingsAverage` for a tour nobody has rated yet.
pub const DEFAULT_RATINGS_AVERAGE: f64 = 4.5;

const DIFFICULTY_MESSAGE: &str = "Difficulty is either: easy, medium or difficult.";

// ---------------------------------------------------------------------------
// Difficulty
// ---------------------------------------------------------------------------

/// How demanding a tour is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Difficult,
}

impl Difficulty {
    pub const ALL: [Difficulty; 3] = [Difficulty::Easy, Difficulty::Medium, Difficulty::Difficult];

    pub fn as_str(self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Difficult => "difficult",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Difficulty {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Difficulty::ALL
            .into_iter()
            .find(|d| d.as_str() == s)
            .ok_or_else(|| {
                CoreError::InvalidFields(vec![FieldViolation::new(
                    "difficulty",
                    DIFFICULTY_MESSAGE,
                )])
            })
    }
}

impl TryFrom<String> for Difficulty {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

// ---------------------------------------------------------------------------
// Draft payload
// ---------------------------------------------------------------------------

/// A candidate tour as submitted by a client.
///
/// Every field is optional so that missing required fields are reported as
/// field-level violations rather than deserialization failures.
///
/// `slug` and `createdAt` are not part of the payload; unknown keys in the
/// request body are ignored.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct TourDraft {
    #[validate(
        required(message = "A tour must have a name."),
        length(
            min = 10,
            max = 40,
            message = "A tour name must have between 10 and 40 characters."
        )
    )]
    pub name: Option<String>,

    #[validate(required(message = "A tour must have a duration."))]
    pub duration: Option<i32>,

    #[validate(required(message = "A tour must have a group size."))]
    pub max_group_size: Option<i32>,

    #[validate(required(message = "A tour must have a difficulty."))]
    pub difficulty: Option<String>,

    #[validate(range(min = 1.0, max = 5.0, message = "Rating must be between 1.0 and 5.0."))]
    pub ratings_average: Option<f64>,

    pub ratings_quantity: Option<i32>,

    #[validate(required(message = "A tour must have a price."))]
    pub price: Option<f64>,

    pub price_discount: Option<f64>,

    #[validate(required(message = "A tour must have a summary."))]
    pub summary: Option<String>,

    pub description: Option<String>,

    #[validate(required(message = "A tour must have a cover image."))]
    pub image_cover: Option<String>,

    pub images: Option<Vec<String>>,

    #[serde(default, deserialize_with = "start_dates")]
    pub start_dates: Option<Vec<Timestamp>>,

    pub secret_tour: Option<bool>,
}

impl TourDraft {
    /// Trim text fields. Required text that is blank after trimming is
    /// treated as missing.
    pub fn normalized(mut self) -> TourDraft {
        self.name = trimmed_non_blank(self.name);
        self.summary = trimmed_non_blank(self.summary);
        self.description = trimmed_non_blank(self.description);
        self.image_cover = self.image_cover.filter(|s| !s.trim().is_empty());
        self
    }

    /// Normalize and validate the draft, producing a record ready to persist.
    ///
    /// Collects every violation (field constraints, the difficulty enum and
    /// the discount-below-price rule) into a single
    /// [`CoreError::InvalidFields`].
    pub fn into_new_tour(self) -> Result<NewTour, CoreError> {
        let draft = self.normalized();

        let mut violations = match draft.validate() {
            Ok(()) => Vec::new(),
            Err(errors) => violations_from(&errors),
        };

        let difficulty = match draft.difficulty.as_deref().map(str::parse::<Difficulty>) {
            Some(Ok(d)) => Some(d),
            Some(Err(_)) => {
                violations.push(FieldViolation::new("difficulty", DIFFICULTY_MESSAGE));
                None
            }
            None => None,
        };

        if let (Some(discount), Some(price)) = (draft.price_discount, draft.price) {
            if discount >= price {
                violations.push(FieldViolation::new(
                    "priceDiscount",
                    format!("Discount price ({discount}) should be less than the regular price."),
                ));
            }
        }

        match (
            draft.name,
            draft.duration,
            draft.max_group_size,
            difficulty,
            draft.price,
            draft.summary,
            draft.image_cover,
        ) {
            (
                Some(name),
                Some(duration),
                Some(max_group_size),
                Some(difficulty),
                Some(price),
                Some(summary),
                Some(image_cover),
            ) if violations.is_empty() => Ok(NewTour {
                name,
                duration,
                max_group_size,
                difficulty,
                ratings_average: draft.ratings_average.unwrap_or(DEFAULT_RATINGS_AVERAGE),
                ratings_quantity: draft.ratings_quantity.unwrap_or(0),
                price,
                price_discount: draft.price_discount,
                summary,
                description: draft.description,
                image_cover,
                images: draft.images.unwrap_or_default(),
                start_dates: draft.start_dates.unwrap_or_default(),
                secret_tour: draft.secret_tour.unwrap_or(false),
            }),
            _ => {
                violations.sort_by(|a, b| a.field.cmp(&b.field).then(a.message.cmp(&b.message)));
                Err(CoreError::InvalidFields(violations))
            }
        }
    }
}

fn trimmed_non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Flatten `validator` errors into wire-named field violations.
fn violations_from(errors: &ValidationErrors) -> Vec<FieldViolation> {
    let mut out = Vec::new();
    for (field, errs) in errors.field_errors() {
        let field = camel_case(&field);
        for err in errs {
            let message = err
                .message
                .as_ref()
                .map(|m| m.to_string())
                .unwrap_or_else(|| format!("{field} is invalid ({})", err.code));
            out.push(FieldViolation::new(field.clone(), message));
        }
    }
    out
}

/// `max_group_size` -> `maxGroupSize`. Already camel-cased input is returned
/// unchanged.
fn camel_case(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    let mut upper_next = false;
    for c in field.chars() {
        if c == '_' {
            upper_next = true;
        } else if upper_next {
            out.extend(c.to_uppercase());
            upper_next = false;
        } else {
            out.push(c);
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Update patch
// ---------------------------------------------------------------------------

/// A partial update.
///
/// An absent key leaves the stored value alone. For the nullable fields the
/// outer `Option` is presence and the inner one is the new value, so
/// `{"priceDiscount": null}` clears the discount. A `null` on any other field
/// is the same as leaving the key out.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TourPatch {
    pub name: Option<String>,
    pub duration: Option<i32>,
    pub max_group_size: Option<i32>,
    pub difficulty: Option<String>,
    pub ratings_average: Option<f64>,
    pub ratings_quantity: Option<i32>,
    pub price: Option<f64>,

    #[serde(default, deserialize_with = "nullable")]
    pub price_discount: Option<Option<f64>>,

    pub summary: Option<String>,

    #[serde(default, deserialize_with = "nullable")]
    pub description: Option<Option<String>>,

    pub image_cover: Option<String>,

    #[serde(default, deserialize_with = "nullable")]
    pub images: Option<Option<Vec<String>>>,

    #[serde(default, deserialize_with = "nullable_start_dates")]
    pub start_dates: Option<Option<Vec<Timestamp>>>,

    pub secret_tour: Option<bool>,
}

impl TourPatch {
    /// Overlay this patch onto the stored tour. The result still has to pass
    /// [`TourDraft::into_new_tour`].
    pub fn merge_onto(self, base: TourDraft) -> TourDraft {
        TourDraft {
            name: self.name.or(base.name),
            duration: self.duration.or(base.duration),
            max_group_size: self.max_group_size.or(base.max_group_size),
            difficulty: self.difficulty.or(base.difficulty),
            ratings_average: self.ratings_average.or(base.ratings_average),
            ratings_quantity: self.ratings_quantity.or(base.ratings_quantity),
            price: self.price.or(base.price),
            price_discount: self.price_discount.unwrap_or(base.price_discount),
            summary: self.summary.or(base.summary),
            description: self.description.unwrap_or(base.description),
            image_cover: self.image_cover.or(base.image_cover),
            images: self.images.unwrap_or(base.images),
            start_dates: self.start_dates.unwrap_or(base.start_dates),
            secret_tour: self.secret_tour.or(base.secret_tour),
        }
    }
}

/// Deserialize a present key (including `null`) as `Some(..)`. Paired with
/// `#[serde(default)]` so an absent key stays `None`.
fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

fn nullable_start_dates<'de, D>(deserializer: D) -> Result<Option<Option<Vec<Timestamp>>>, D::Error>
where
    D: Deserializer<'de>,
{
    start_dates(deserializer).map(Some)
}

// ---------------------------------------------------------------------------
// Start dates
// ---------------------------------------------------------------------------

/// Parse an RFC 3339 instant, or a bare `YYYY-MM-DD` date taken as midnight UTC.
fn parse_start_date(raw: &str) -> Option<Timestamp> {
    if let Ok(instant) = DateTime::parse_from_rfc3339(raw) {
        return Some(instant.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|midnight| midnight.and_utc())
}

struct StartDate(Timestamp);

impl<'de> Deserialize<'de> for StartDate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse_start_date(&raw).map(StartDate).ok_or_else(|| {
            de::Error::custom(format!(
                "invalid start date '{raw}', expected RFC 3339 or YYYY-MM-DD"
            ))
        })
    }
}

fn start_dates<'de, D>(deserializer: D) -> Result<Option<Vec<Timestamp>>, D::Error>
where
    D: Deserializer<'de>,
{
    let dates = Option::<Vec<StartDate>>::deserialize(deserializer)?;
    Ok(dates.map(|dates| dates.into_iter().map(|StartDate(t)| t).collect()))
}

// ---------------------------------------------------------------------------
// Validated record
// ---------------------------------------------------------------------------

/// A tour that passed validation, with defaults applied.
///
/// Only obtainable through [`TourDraft::into_new_tour`]. There is no slug
/// field: the persistence layer derives it from `name` via [`NewTour::slug`]
/// right before writing.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub struct NewTour {
    pub name: String,
    pub duration: i32,
    pub max_group_size: i32,
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
}

impl NewTour {
    pub fn slug(&self) -> String {
        slugify(&self.name)
    }
}
