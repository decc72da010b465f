use std::sync::Arc;

use axum::Router;
use diesel::sqlite::SqliteConnection;
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};

use crate::config::ServiceConfig;
use crate::repositories::{
    CommentRepository, ContentRepository, SharedConnection, SqliteCommentRepository,
    SqliteContentRepository,
};

pub mod caller;
pub mod comments;
pub mod config;
pub mod content;
pub mod errors;
pub mod filter;
pub mod models;
pub mod pagination;
pub mod repositories;
pub mod routes;
pub mod schema;
pub mod shutdown;
pub mod slug;
pub mod validation;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!();

/// Applies any migrations the database has not seen yet.
pub fn run_migrations(
    connection: &mut SqliteConnection,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    connection.run_pending_migrations(MIGRATIONS)?;
    Ok(())
}

/// Everything a handler needs, behind one cloneable handle.
pub trait AppState: Clone + Send + Sync + 'static {
    type ContentRepo: ContentRepository;
    type CommentRepo: CommentRepository;

    fn content_repo(&self) -> &Self::ContentRepo;
    fn comment_repo(&self) -> &Self::CommentRepo;
    fn config(&self) -> &ServiceConfig;
}

#[derive(Clone)]
pub struct DefaultAppState {
    content_repo: SqliteContentRepository,
    comment_repo: SqliteCommentRepository,
    config: Arc<ServiceConfig>,
}

impl DefaultAppState {
    pub fn new(db: SharedConnection, config: ServiceConfig) -> Self {
        Self {
            content_repo: SqliteContentRepository::new(db.clone()),
            comment_repo: SqliteCommentRepository::new(db),
            config: Arc::new(config),
        }
    }
}

impl AppState for DefaultAppState {
    type ContentRepo = SqliteContentRepository;
    type CommentRepo = SqliteCommentRepository;

    fn content_repo(&self) -> &Self::ContentRepo {
        &self.content_repo
    }

    fn comment_repo(&self) -> &Self::CommentRepo {
        &self.comment_repo
    }

    fn config(&self) -> &ServiceConfig {
        &self.config
    }
}

pub fn create_app<S: AppState>(state: S) -> Router {
    routes::create_router().with_state(state)
}
