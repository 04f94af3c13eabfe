//! Find-style filters over tours.
//!
//! A [`TourFilter`] is what a caller asks for. The persistence layer only
//! accepts a [`VisibleFilter`], whose constructor always appends the
//! secret-tour exclusion, so no find-style read can skip it.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::tour::schema::Difficulty;

// ---------------------------------------------------------------------------
// Fields and operators
// ---------------------------------------------------------------------------

/// Tour fields that may appear in a find filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TourField {
    Name,
    Slug,
    Duration,
    MaxGroupSize,
    Difficulty,
    RatingsAverage,
    RatingsQuantity,
    Price,
    PriceDiscount,
    SecretTour,
}

/// How a filter value for a field is parsed and compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Number,
    Boolean,
    Difficulty,
}

impl TourField {
    pub const ALL: [TourField; 10] = [
        TourField::Name,
        TourField::Slug,
        TourField::Duration,
        TourField::MaxGroupSize,
        TourField::Difficulty,
        TourField::RatingsAverage,
        TourField::RatingsQuantity,
        TourField::Price,
        TourField::PriceDiscount,
        TourField::SecretTour,
    ];

    /// Name used in JSON and query strings.
    pub fn wire_name(self) -> &'static str {
        match self {
            TourField::Name => "name",
            TourField::Slug => "slug",
            TourField::Duration => "duration",
            TourField::MaxGroupSize => "maxGroupSize",
            TourField::Difficulty => "difficulty",
            TourField::RatingsAverage => "ratingsAverage",
            TourField::RatingsQuantity => "ratingsQuantity",
            TourField::Price => "price",
            TourField::PriceDiscount => "priceDiscount",
            TourField::SecretTour => "secretTour",
        }
    }

    /// Column name in the `tours` table.
    pub fn column(self) -> &'static str {
        match self {
            TourField::Name => "name",
            TourField::Slug => "slug",
            TourField::Duration => "duration",
            TourField::MaxGroupSize => "max_group_size",
            TourField::Difficulty => "difficulty",
            TourField::RatingsAverage => "ratings_average",
            TourField::RatingsQuantity => "ratings_quantity",
            TourField::Price => "price",
            TourField::PriceDiscount => "price_discount",
            TourField::SecretTour => "secret_tour",
        }
    }

    pub fn kind(self) -> FieldKind {
        match self {
            TourField::Name | TourField::Slug => FieldKind::Text,
            TourField::Duration
            | TourField::MaxGroupSize
            | TourField::RatingsAverage
            | TourField::RatingsQuantity
            | TourField::Price
            | TourField::PriceDiscount => FieldKind::Number,
            TourField::Difficulty => FieldKind::Difficulty,
            TourField::SecretTour => FieldKind::Boolean,
        }
    }
}

impl FromStr for TourField {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TourField::ALL
            .into_iter()
            .find(|f| f.wire_name() == s)
            .ok_or_else(|| CoreError::Validation(format!("Unknown filter field '{s}'")))
    }
}

/// Comparison operator shared by find filters and pipeline `match` stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl CompareOp {
    pub fn as_str(self) -> &'static str {
        match self {
            CompareOp::Eq => "eq",
            CompareOp::Ne => "ne",
            CompareOp::Gt => "gt",
            CompareOp::Gte => "gte",
            CompareOp::Lt => "lt",
            CompareOp::Lte => "lte",
        }
    }

    pub fn is_ordering(self) -> bool {
        !matches!(self, CompareOp::Eq | CompareOp::Ne)
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CompareOp {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "eq" => Ok(CompareOp::Eq),
            "ne" => Ok(CompareOp::Ne),
            "gt" => Ok(CompareOp::Gt),
            "gte" => Ok(CompareOp::Gte),
            "lt" => Ok(CompareOp::Lt),
            "lte" => Ok(CompareOp::Lte),
            other => Err(CoreError::Validation(format!(
                "Unknown filter operator '{other}'"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Conditions
// ---------------------------------------------------------------------------

/// A typed filter operand.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Number(f64),
    Text(String),
    Bool(bool),
}

/// `field op value`, already checked against the field's kind.
#[derive(Debug, Clone, PartialEq)]
pub struct TourCondition {
    field: TourField,
    op: CompareOp,
    value: FilterValue,
}

impl TourCondition {
    /// Parse a raw query-string operand for `field`.
    pub fn parse(field: TourField, op: CompareOp, raw: &str) -> Result<Self, CoreError> {
        let name = field.wire_name();
        let value = match field.kind() {
            FieldKind::Text => FilterValue::Text(raw.to_string()),
            FieldKind::Number => {
                let n: f64 = raw.trim().parse().map_err(|_| {
                    CoreError::Validation(format!("'{raw}' is not a number (field '{name}')"))
                })?;
                if !n.is_finite() {
                    return Err(CoreError::Validation(format!(
                        "'{raw}' is not a finite number (field '{name}')"
                    )));
                }
                FilterValue::Number(n)
            }
            FieldKind::Boolean => {
                if op.is_ordering() {
                    return Err(CoreError::Validation(format!(
                        "Operator '{op}' is not supported for boolean field '{name}'"
                    )));
                }
                let b: bool = raw.trim().parse().map_err(|_| {
                    CoreError::Validation(format!("'{raw}' is not a boolean (field '{name}')"))
                })?;
                FilterValue::Bool(b)
            }
            FieldKind::Difficulty => {
                if op.is_ordering() {
                    return Err(CoreError::Validation(format!(
                        "Operator '{op}' is not supported for field '{name}'"
                    )));
                }
                let d: Difficulty = raw.trim().parse()?;
                FilterValue::Text(d.as_str().to_string())
            }
        };
        Ok(Self { field, op, value })
    }

    /// `secretTour != true`.
    pub fn not_secret() -> Self {
        Self {
            field: TourField::SecretTour,
            op: CompareOp::Ne,
            value: FilterValue::Bool(true),
        }
    }

    pub fn field(&self) -> TourField {
        self.field
    }

    pub fn op(&self) -> CompareOp {
        self.op
    }

    pub fn value(&self) -> &FilterValue {
        &self.value
    }
}

// ---------------------------------------------------------------------------
// Filters
// ---------------------------------------------------------------------------

/// A conjunction of conditions requested by a caller.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TourFilter {
    conditions: Vec<TourCondition>,
}

impl TourFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn and(mut self, condition: TourCondition) -> Self {
        self.conditions.push(condition);
        self
    }

    /// Build a filter from query-string pairs.
    ///
    /// Keys are either `field` (equality) or `field[op]`, e.g.
    /// `duration[gte]=5`.
    pub fn from_query<'a, I>(pairs: I) -> Result<Self, CoreError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut filter = TourFilter::new();
        for (key, raw) in pairs {
            let (field, op) = parse_key(key)?;
            filter = filter.and(TourCondition::parse(field, op, raw)?);
        }
        Ok(filter)
    }

    pub fn conditions(&self) -> &[TourCondition] {
        &self.conditions
    }
}

fn parse_key(key: &str) -> Result<(TourField, CompareOp), CoreError> {
    match key.split_once('[') {
        Some((field, rest)) => {
            let op = rest.strip_suffix(']').ok_or_else(|| {
                CoreError::Validation(format!("Malformed filter key '{key}'"))
            })?;
            Ok((field.parse()?, op.parse()?))
        }
        None => Ok((key.parse()?, CompareOp::Eq)),
    }
}

/// A filter that is guaranteed to exclude secret tours.
///
/// The only way to obtain one is through [`VisibleFilter::new`] (or
/// `From<TourFilter>`), which appends `secretTour != true`.
#[derive(Debug, Clone, PartialEq)]
pub struct VisibleFilter {
    conditions: Vec<TourCondition>,
}

impl VisibleFilter {
    pub fn new(filter: TourFilter) -> Self {
        let mut conditions = filter.conditions;
        conditions.push(TourCondition::not_secret());
        Self { conditions }
    }

    /// Every visible tour.
    pub fn all() -> Self {
        Self::new(TourFilter::new())
    }

    pub fn conditions(&self) -> &[TourCondition] {
        &self.conditions
    }
}

impl From<TourFilter> for VisibleFilter {
    fn from(filter: TourFilter) -> Self {
        Self::new(filter)
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn plain_key_is_equality() {
        let filter = TourFilter::from_query([("difficulty", "easy")]).unwrap();
        let c = &filter.conditions()[0];
        assert_eq!(c.field(), TourField::Difficulty);
        assert_eq!(c.op(), CompareOp::Eq);
        assert_eq!(c.value(), &FilterValue::Text("easy".into()));
    }

    #[test]
    fn bracket_operator() {
        let filter =
            TourFilter::from_query([("duration[gte]", "5"), ("price[lt]", "1500.5")]).unwrap();
        assert_eq!(filter.conditions().len(), 2);
        assert_eq!(filter.conditions()[0].op(), CompareOp::Gte);
        assert_eq!(filter.conditions()[0].value(), &FilterValue::Number(5.0));
        assert_eq!(filter.conditions()[1].field(), TourField::Price);
        assert_eq!(filter.conditions()[1].value(), &FilterValue::Number(1500.5));
    }

    #[test]
    fn unknown_field_rejected() {
        assert_matches!(
            TourFilter::from_query([("color", "red")]),
            Err(CoreError::Validation(msg)) if msg.contains("color")
        );
    }

    #[test]
    fn unknown_operator_rejected() {
        assert_matches!(
            TourFilter::from_query([("price[between]", "1")]),
            Err(CoreError::Validation(_))
        );
    }

    #[test]
    fn malformed_key_rejected() {
        assert_matches!(
            TourFilter::from_query([("price[gte", "1")]),
            Err(CoreError::Validation(_))
        );
    }

    #[test]
    fn non_numeric_value_rejected() {
        assert_matches!(
            TourFilter::from_query([("price", "cheap")]),
            Err(CoreError::Validation(_))
        );
        assert_matches!(
            TourFilter::from_query([("price", "inf")]),
            Err(CoreError::Validation(_))
        );
    }

    #[test]
    fn ordering_on_boolean_rejected() {
        assert_matches!(
            TourFilter::from_query([("secretTour[gt]", "false")]),
            Err(CoreError::Validation(_))
        );
    }

    #[test]
    fn invalid_difficulty_rejected() {
        assert_matches!(
            TourFilter::from_query([("difficulty", "extreme")]),
            Err(CoreError::InvalidFields(_))
        );
    }

    #[test]
    fn visible_filter_always_excludes_secret_tours() {
        let visible = VisibleFilter::new(TourFilter::from_query([("duration", "5")]).unwrap());
        assert_eq!(visible.conditions().len(), 2);
        assert_eq!(
            visible.conditions().last(),
            Some(&TourCondition::not_secret())
        );

        let all = VisibleFilter::all();
        assert_eq!(all.conditions(), &[TourCondition::not_secret()]);
    }

    #[test]
    fn caller_cannot_opt_into_secret_tours() {
        let filter = TourFilter::from_query([("secretTour", "true")]).unwrap();
        let visible: VisibleFilter = filter.into();
        assert!(visible
            .conditions()
            .iter()
            .any(|c| *c == TourCondition::not_secret()));
    }

    #[test]
    fn field_names_round_trip() {
        for field in TourField::ALL {
            assert_eq!(field.wire_name().parse::<TourField>().unwrap(), field);
        }
    }
}
