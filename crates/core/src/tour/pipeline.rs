//! Aggregation pipelines over tour documents.
//!
//! A pipeline is an ordered list of [`Stage`]s evaluated over the JSON
//! serialization of each tour. Evaluation is pure; the persistence layer
//! loads the documents and hands them to [`VisiblePipeline::run`].
//!
//! Pipelines are only executable as a [`VisiblePipeline`], whose
//! constructor prepends `match secretTour ne true`.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::{DateTime, Datelike};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::error::CoreError;
use crate::tour::filter::{CompareOp, TourField};

// ---------------------------------------------------------------------------
// Stage definitions
// ---------------------------------------------------------------------------

/// One step of a pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Keep documents satisfying every condition.
    Match(Vec<Condition>),
    /// Replace each document by one copy per element of an array field.
    Unwind(String),
    /// Collapse documents sharing a key into one accumulated document.
    Group(Group),
    /// Stable sort; missing values sort last.
    Sort(Vec<SortKey>),
    /// Keep the first `n` documents.
    Limit(usize),
}

/// `field op value` against a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub field: String,
    pub op: CompareOp,
    pub value: Value,
}

impl Condition {
    pub fn new(field: impl Into<String>, op: CompareOp, value: Value) -> Self {
        Self {
            field: field.into(),
            op,
            value,
        }
    }

    /// `secretTour ne true`. Matches tours with the flag unset as well.
    pub fn not_secret() -> Self {
        Self::new(TourField::SecretTour.wire_name(), CompareOp::Ne, Value::Bool(true))
    }

    pub fn matches(&self, doc: &Value) -> bool {
        let actual = lookup(doc, &self.field).unwrap_or(&Value::Null);
        match self.op {
            CompareOp::Eq => values_equal(actual, &self.value),
            CompareOp::Ne => !values_equal(actual, &self.value),
            op => match compare_values(actual, &self.value) {
                Some(ord) => match op {
                    CompareOp::Gt => ord.is_gt(),
                    CompareOp::Gte => ord.is_ge(),
                    CompareOp::Lt => ord.is_lt(),
                    CompareOp::Lte => ord.is_le(),
                    CompareOp::Eq | CompareOp::Ne => false,
                },
                None => false,
            },
        }
    }
}

/// Grouping key and named accumulators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub key: GroupKey,
    #[serde(default)]
    pub fields: BTreeMap<String, Accumulator>,
}

/// What documents are grouped by. The key appears as `key` in the output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "by", content = "field", rename_all = "snake_case")]
pub enum GroupKey {
    /// A single group holding every document (`key` is null).
    All,
    /// The value of a field.
    Field(String),
    /// The month (1-12) of an RFC 3339 timestamp field.
    Month(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Accumulator {
    Count,
    Sum { field: String },
    Avg { field: String },
    Min { field: String },
    Max { field: String },
    Push { field: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortKey {
    pub field: String,
    #[serde(default)]
    pub order: SortOrder,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

// ---------------------------------------------------------------------------
// Visible pipeline
// ---------------------------------------------------------------------------

/// A validated pipeline that never sees secret tours.
#[derive(Debug, Clone, PartialEq)]
pub struct VisiblePipeline {
    stages: Vec<Stage>,
}

impl VisiblePipeline {
    /// Validate caller stages and prepend the secret-tour exclusion.
    pub fn new(stages: Vec<Stage>) -> Result<Self, CoreError> {
        for stage in &stages {
            validate_stage(stage)?;
        }
        let mut all = Vec::with_capacity(stages.len() + 1);
        all.push(Stage::Match(vec![Condition::not_secret()]));
        all.extend(stages);
        Ok(Self { stages: all })
    }

    /// Per-difficulty statistics over well-rated tours, cheapest first.
    pub fn tour_stats() -> Self {
        let fields = BTreeMap::from([
            ("numTours".to_string(), Accumulator::Count),
            ("numRatings".to_string(), Accumulator::Sum { field: "ratingsQuantity".into() }),
            ("avgRating".to_string(), Accumulator::Avg { field: "ratingsAverage".into() }),
            ("avgPrice".to_string(), Accumulator::Avg { field: "price".into() }),
            ("minPrice".to_string(), Accumulator::Min { field: "price".into() }),
            ("maxPrice".to_string(), Accumulator::Max { field: "price".into() }),
        ]);
        Self::with_builtin(vec![
            Stage::Match(vec![Condition::new("ratingsAverage", CompareOp::Gte, json!(4.5))]),
            Stage::Group(Group {
                key: GroupKey::Field("difficulty".into()),
                fields,
            }),
            Stage::Sort(vec![SortKey {
                field: "avgPrice".into(),
                order: SortOrder::Asc,
            }]),
        ])
    }

    /// Tour starts per month of `year`, busiest month first.
    pub fn monthly_plan(year: i32) -> Result<Self, CoreError> {
        if !(1970..=9999).contains(&year) {
            return Err(CoreError::Validation(format!(
                "Year must be between 1970 and 9999, got {year}"
            )));
        }
        let fields = BTreeMap::from([
            ("numTourStarts".to_string(), Accumulator::Count),
            ("tours".to_string(), Accumulator::Push { field: "name".into() }),
        ]);
        Ok(Self::with_builtin(vec![
            Stage::Unwind("startDates".into()),
            Stage::Match(vec![
                Condition::new(
                    "startDates",
                    CompareOp::Gte,
                    json!(format!("{year:04}-01-01T00:00:00Z")),
                ),
                Condition::new(
                    "startDates",
                    CompareOp::Lte,
                    json!(format!("{year:04}-12-31T23:59:59.999999999Z")),
                ),
            ]),
            Stage::Group(Group {
                key: GroupKey::Month("startDates".into()),
                fields,
            }),
            Stage::Sort(vec![SortKey {
                field: "numTourStarts".into(),
                order: SortOrder::Desc,
            }]),
            Stage::Limit(12),
        ]))
    }

    fn with_builtin(stages: Vec<Stage>) -> Self {
        let mut all = Vec::with_capacity(stages.len() + 1);
        all.push(Stage::Match(vec![Condition::not_secret()]));
        all.extend(stages);
        Self { stages: all }
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Evaluate every stage in order over `docs`.
    pub fn run(&self, docs: Vec<Value>) -> Vec<Value> {
        self.stages
            .iter()
            .fold(docs, |docs, stage| apply_stage(stage, docs))
    }
}

fn validate_stage(stage: &Stage) -> Result<(), CoreError> {
    match stage {
        Stage::Match(conditions) => conditions
            .iter()
            .try_for_each(|c| require_field("match", &c.field)),
        Stage::Unwind(field) => require_field("unwind", field),
        Stage::Group(group) => {
            match &group.key {
                GroupKey::All => {}
                GroupKey::Field(f) | GroupKey::Month(f) => require_field("group key", f)?,
            }
            for (name, acc) in &group.fields {
                require_field("group output", name)?;
                if name == "key" {
                    return Err(CoreError::Validation(
                        "group output field 'key' is reserved".into(),
                    ));
                }
                match acc {
                    Accumulator::Count => {}
                    Accumulator::Sum { field }
                    | Accumulator::Avg { field }
                    | Accumulator::Min { field }
                    | Accumulator::Max { field }
                    | Accumulator::Push { field } => require_field("accumulator", field)?,
                }
            }
            Ok(())
        }
        Stage::Sort(keys) => {
            if keys.is_empty() {
                return Err(CoreError::Validation(
                    "sort stage needs at least one key".into(),
                ));
            }
            keys.iter().try_for_each(|k| require_field("sort", &k.field))
        }
        Stage::Limit(0) => Err(CoreError::Validation(
            "limit stage must be positive".into(),
        )),
        Stage::Limit(_) => Ok(()),
    }
}

fn require_field(context: &str, field: &str) -> Result<(), CoreError> {
    if field.trim().is_empty() {
        Err(CoreError::Validation(format!(
            "{context} field name must not be empty"
        )))
    } else {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

fn apply_stage(stage: &Stage, docs: Vec<Value>) -> Vec<Value> {
    match stage {
        Stage::Match(conditions) => docs
            .into_iter()
            .filter(|doc| conditions.iter().all(|c| c.matches(doc)))
            .collect(),
        Stage::Unwind(field) => unwind(field, docs),
        Stage::Group(group) => group_docs(group, docs),
        Stage::Sort(keys) => {
            let mut docs = docs;
            docs.sort_by(|a, b| compare_docs(keys, a, b));
            docs
        }
        Stage::Limit(n) => docs.into_iter().take(*n).collect(),
    }
}

/// Top-level field lookup; JSON `null` counts as missing.
fn lookup<'a>(doc: &'a Value, field: &str) -> Option<&'a Value> {
    doc.get(field).filter(|v| !v.is_null())
}

fn unwind(field: &str, docs: Vec<Value>) -> Vec<Value> {
    let mut out = Vec::new();
    for doc in docs {
        let Some(Value::Array(items)) = doc.get(field) else {
            continue;
        };
        for item in items {
            let mut copy = doc.clone();
            if let Some(obj) = copy.as_object_mut() {
                obj.insert(field.to_string(), item.clone());
            }
            out.push(copy);
        }
    }
    out
}

fn group_key(key: &GroupKey, doc: &Value) -> Value {
    match key {
        GroupKey::All => Value::Null,
        GroupKey::Field(field) => lookup(doc, field).cloned().unwrap_or(Value::Null),
        GroupKey::Month(field) => lookup(doc, field)
            .and_then(Value::as_str)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| json!(dt.month()))
            .unwrap_or(Value::Null),
    }
}

fn group_docs(group: &Group, docs: Vec<Value>) -> Vec<Value> {
    // First-seen order of keys is preserved.
    let mut buckets: Vec<(Value, Vec<Value>)> = Vec::new();
    for doc in docs {
        let key = group_key(&group.key, &doc);
        match buckets.iter_mut().find(|(k, _)| values_equal(k, &key)) {
            Some((_, members)) => members.push(doc),
            None => buckets.push((key, vec![doc])),
        }
    }

    buckets
        .into_iter()
        .map(|(key, members)| {
            let mut out = Map::new();
            out.insert("key".to_string(), key);
            for (name, acc) in &group.fields {
                out.insert(name.clone(), accumulate(acc, &members));
            }
            Value::Object(out)
        })
        .collect()
}

fn accumulate(acc: &Accumulator, members: &[Value]) -> Value {
    let numbers = |field: &str| -> Vec<f64> {
        members
            .iter()
            .filter_map(|doc| lookup(doc, field).and_then(Value::as_f64))
            .collect()
    };
    match acc {
        Accumulator::Count => json!(members.len()),
        Accumulator::Sum { field } => number_value(numbers(field.as_str()).iter().sum()),
        Accumulator::Avg { field } => {
            let values = numbers(field.as_str());
            if values.is_empty() {
                Value::Null
            } else {
                number_value(values.iter().sum::<f64>() / values.len() as f64)
            }
        }
        Accumulator::Min { field } => numbers(field.as_str())
            .into_iter()
            .reduce(f64::min)
            .map_or(Value::Null, number_value),
        Accumulator::Max { field } => numbers(field.as_str())
            .into_iter()
            .reduce(f64::max)
            .map_or(Value::Null, number_value),
        Accumulator::Push { field } => Value::Array(
            members
                .iter()
                .filter_map(|doc| lookup(doc, field).cloned())
                .collect(),
        ),
    }
}

/// Whole numbers are emitted as JSON integers so `37` stays `37`, not `37.0`.
fn number_value(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        json!(n as i64)
    } else {
        json!(n)
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

/// Numbers compare numerically; strings compare as instants when both are
/// RFC 3339 timestamps, otherwise lexicographically. Anything else is
/// incomparable.
fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => {
            match (
                DateTime::parse_from_rfc3339(x),
                DateTime::parse_from_rfc3339(y),
            ) {
                (Ok(x), Ok(y)) => Some(x.cmp(&y)),
                _ => Some(x.cmp(y)),
            }
        }
        _ => None,
    }
}

fn compare_docs(keys: &[SortKey], a: &Value, b: &Value) -> Ordering {
    for key in keys {
        let ord = match (lookup(a, &key.field), lookup(b, &key.field)) {
            (Some(x), Some(y)) => {
                let ord = compare_values(x, y).unwrap_or(Ordering::Equal);
                match key.order {
                    SortOrder::Asc => ord,
                    SortOrder::Desc => ord.reverse(),
                }
            }
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}
