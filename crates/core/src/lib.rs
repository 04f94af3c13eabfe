//! Tour domain logic: schema validation, derived fields, find filters and
//! the aggregation pipeline. No I/O lives here.

pub mod error;
pub mod tour;
pub mod types;
