mod comments;
mod content;
mod traits;

pub use comments::SqliteCommentRepository;
pub use content::SqliteContentRepository;
pub use traits::{CommentRepository, ContentRepository};

use std::sync::{Arc, Mutex, MutexGuard};

use diesel::sqlite::SqliteConnection;
use tracing::error;

use crate::errors::ApiError;

pub type SharedConnection = Arc<Mutex<SqliteConnection>>;

pub(crate) fn lock(db: &SharedConnection) -> Result<MutexGuard<'_, SqliteConnection>, ApiError> {
    db.lock().map_err(|_| {
        error!("Database connection mutex poisoned");
        ApiError::Internal
    })
}

pub(crate) fn to_sql_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}
