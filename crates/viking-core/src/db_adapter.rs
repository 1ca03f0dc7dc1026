//! Adapter layer for viking-db infrastructure.
//!
//! Maps `DbError` onto the domain taxonomy. Object-store errors arrive with
//! physical paths (`/{account}/{root}/...`); callers that know the uri should
//! prefer reporting it, which is why most filesystem code maps errors itself
//! and this conversion is the fallback used by `?`.

use viking_db::DbError;

use crate::errors::VikingError;

// ============================================================================
// Error Conversion
// ============================================================================

/// Convert a viking-db error to a viking-core error.
pub fn from_db_error(err: DbError) -> VikingError {
    match err {
        DbError::NotFound { path } => VikingError::NotFound(path),
        DbError::AlreadyExists { path } => VikingError::AlreadyExists(path),
        DbError::NotADirectory { path } => VikingError::NotADirectory(path),
        DbError::IsADirectory { path } => VikingError::IsADirectory(path),
        DbError::DirectoryNotEmpty { path } => VikingError::NotEmpty(path),
        DbError::InvalidPath { path } => {
            VikingError::invalid_uri(path, "path is not valid in the object store")
        }
        DbError::Config { message } => {
            VikingError::config(message, "Check the storage and vector sections of config.yaml")
        }
        DbError::Io(io_err) => VikingError::Io(io_err),
        other => VikingError::Db(other),
    }
}
