//! Domain model structs.
//!
//! Each submodule contains a `FromRow` entity struct matching the database
//! row, serialized the way the API returns it.

pub mod tour;
