use tourbook_core::error::CoreError;

/// Unique constraint guarding tour names.
pub const TOUR_NAME_CONSTRAINT: &str = "uq_tours_name";

/// Error returned by repository writes.
///
/// A unique-name violation is reported as [`CoreError::Conflict`]; every
/// other database failure is passed through untouched.
#[derive(Debug, thiserror::Error)]
pub enum WriteError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Map a SQLSTATE 23505 on `uq_tours_name` to a conflict naming `name`.
pub(crate) fn map_unique(err: sqlx::Error, name: &str) -> WriteError {
    if let Some(db_err) = err.as_database_error() {
        if db_err.code().as_deref() == Some("23505")
            && db_err.constraint() == Some(TOUR_NAME_CONSTRAINT)
        {
            return WriteError::Core(CoreError::Conflict(format!(
                "A tour named '{name}' already exists"
            )));
        }
    }
    WriteError::Database(err)
}
