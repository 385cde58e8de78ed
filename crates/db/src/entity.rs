use chrono::{DateTime, Utc};
use pgvector::Vector;
use sqlx::FromRow;

/// Processing status values shared by sources and generation jobs.
pub struct SourceStatus;

impl SourceStatus {
    /// Waiting for a worker to pick the source up.
    pub const PENDING: &'static str = "PENDING";
    /// Fully ingested with vectors persisted.
    pub const COMPLETED: &'static str = "COMPLETED";
    /// Ingestion failed; the message went to the dead-letter queue.
    pub const FAILED: &'static str = "FAILED";
}

/// An uploaded document. Created by the uploader in PENDING, mutated only by
/// ingestion workers.
#[derive(Debug, Clone, FromRow)]
pub struct Source {
    pub id: String,
    pub library_id: String,
    pub name: String,
    #[sqlx(rename = "type")]
    pub mime_type: String,
    pub url: String,
    pub size: i64,
    pub upload_time: Option<DateTime<Utc>>,
    pub job_key: String,
    pub status: String,
    pub ingestor_type: Option<String>,
    pub ingestor_version: Option<String>,
    pub reingestion_status: Option<String>,
    pub reingestion_started_at: Option<DateTime<Utc>>,
    pub reingestion_completed_at: Option<DateTime<Utc>>,
}

/// A chunk of a source with its embedding. Replaced wholesale on re-ingest,
/// cascade-deleted with the source.
#[derive(Debug, Clone, FromRow)]
pub struct DocumentVector {
    pub id: String,
    pub file_id: String,
    pub embedding: Vector,
    pub content: String,
    /// Byte offset of the chunk in the extracted text; the stable ordering
    /// key within a source.
    pub chunk_index: i32,
}

/// A summary generation job.
#[derive(Debug, Clone, FromRow)]
pub struct Summary {
    pub id: String,
    pub library_id: String,
    pub title: String,
    pub length: i64,
    pub generated: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A single episode of a summary.
#[derive(Debug, Clone, FromRow)]
pub struct SummaryEpisode {
    pub id: String,
    pub summary_id: String,
    pub title: String,
    pub focus: Option<String>,
    pub content: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A podcast generation job.
#[derive(Debug, Clone, FromRow)]
pub struct Podcast {
    pub id: String,
    pub library_id: String,
    pub title: String,
    pub length: i64,
    pub generated: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// The episode slot a podcast job fills.
#[derive(Debug, Clone, FromRow)]
pub struct PodcastEpisode {
    pub id: String,
    pub podcast_id: String,
    pub title: String,
    pub focus: Option<String>,
    pub content: Option<String>,
    pub audio_key: Option<String>,
    pub created_at: DateTime<Utc>,
}
