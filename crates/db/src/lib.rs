//! Database access for the fylr core: connection pooling, the pgvector-backed
//! entities, and the queries the workers run against them.

mod entity;
mod queries;
mod search;

pub use entity::{
    DocumentVector, Podcast, PodcastEpisode, Source, SourceStatus, Summary, SummaryEpisode,
};
pub use queries::*;
pub use search::{LibraryVector, SearchHit, knn_search, library_vectors};

use config::DatabaseConfig;
use sqlx::{PgPool, postgres::PgPoolOptions};

/// Connect to the configured database with a health check, so a bad
/// configuration fails at startup rather than on the first message.
pub async fn connect(config: &DatabaseConfig) -> sqlx::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .test_before_acquire(true)
        .connect(&config.url())
        .await?;

    log::debug!("Database connection pool established");

    Ok(pool)
}
