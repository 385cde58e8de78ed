use chrono::Utc;
use pgvector::Vector;
use sqlx::PgPool;

use crate::entity::{
    Podcast, PodcastEpisode, Source, SourceStatus, Summary, SummaryEpisode,
};

/// A chunk with its embedding, ready for insertion.
#[derive(Debug, Clone)]
pub struct NewVector {
    pub content: String,
    pub embedding: Vector,
    /// Byte offset where the chunk started in the extracted text.
    pub chunk_index: i32,
}

pub async fn fetch_source(pool: &PgPool, id: &str) -> sqlx::Result<Option<Source>> {
    sqlx::query_as::<_, Source>(r#"SELECT * FROM "Sources" WHERE id = $1"#)
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// Best-effort status update used on the failure path; the caller has
/// usually already lost its transaction.
pub async fn set_source_status(pool: &PgPool, id: &str, status: &str) -> sqlx::Result<()> {
    sqlx::query(r#"UPDATE "Sources" SET status = $2 WHERE id = $1"#)
        .bind(id)
        .bind(status)
        .execute(pool)
        .await?;

    Ok(())
}

/// Replace all vectors of a source and mark it completed, in one
/// transaction. Supports re-ingest: any rows from an earlier run disappear
/// with the delete.
pub async fn replace_source_vectors(
    pool: &PgPool,
    source_id: &str,
    vectors: &[NewVector],
    ingestor_type: &str,
    ingestor_version: &str,
) -> sqlx::Result<usize> {
    let mut tx = pool.begin().await?;

    sqlx::query(r#"DELETE FROM "Vectors" WHERE file_id = $1"#)
        .bind(source_id)
        .execute(&mut *tx)
        .await?;

    for (i, vector) in vectors.iter().enumerate() {
        sqlx::query(
            r#"INSERT INTO "Vectors" (id, file_id, embedding, content, chunk_index)
               VALUES ($1, $2, $3, $4, $5)"#,
        )
        .bind(format!("vec_{source_id}_{i}"))
        .bind(source_id)
        .bind(&vector.embedding)
        .bind(&vector.content)
        .bind(vector.chunk_index)
        .execute(&mut *tx)
        .await?;
    }

    sqlx::query(
        r#"UPDATE "Sources"
           SET status = $2, ingestor_type = $3, ingestor_version = $4
           WHERE id = $1"#,
    )
    .bind(source_id)
    .bind(SourceStatus::COMPLETED)
    .bind(ingestor_type)
    .bind(ingestor_version)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok(vectors.len())
}

/// Existing chunks of a source in chunk order, used by re-ingestion to reuse
/// the extracted text without another parse.
pub async fn fetch_source_vectors(pool: &PgPool, source_id: &str) -> sqlx::Result<Vec<crate::DocumentVector>> {
    sqlx::query_as::<_, crate::DocumentVector>(
        r#"SELECT * FROM "Vectors" WHERE file_id = $1 ORDER BY chunk_index"#,
    )
    .bind(source_id)
    .fetch_all(pool)
    .await
}

pub async fn mark_reingestion_started(pool: &PgPool, source_id: &str) -> sqlx::Result<()> {
    sqlx::query(
        r#"UPDATE "Sources"
           SET reingestion_status = 'IN_PROGRESS', reingestion_started_at = $2
           WHERE id = $1"#,
    )
    .bind(source_id)
    .bind(Utc::now())
    .execute(pool)
    .await?;

    Ok(())
}

/// Swap in the recomputed embeddings and close out the re-ingestion, in one
/// transaction so readers never observe a half-migrated source.
pub async fn update_source_embeddings(
    pool: &PgPool,
    source_id: &str,
    vector_ids: &[String],
    embeddings: &[Vector],
) -> sqlx::Result<()> {
    let mut tx = pool.begin().await?;

    for (id, embedding) in vector_ids.iter().zip(embeddings) {
        sqlx::query(r#"UPDATE "Vectors" SET embedding = $2 WHERE id = $1"#)
            .bind(id)
            .bind(embedding)
            .execute(&mut *tx)
            .await?;
    }

    sqlx::query(
        r#"UPDATE "Sources"
           SET status = $2, reingestion_status = 'COMPLETED', reingestion_completed_at = $3
           WHERE id = $1"#,
    )
    .bind(source_id)
    .bind(SourceStatus::COMPLETED)
    .bind(Utc::now())
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok(())
}

pub async fn mark_reingestion_failed(pool: &PgPool, source_id: &str) -> sqlx::Result<()> {
    sqlx::query(
        r#"UPDATE "Sources"
           SET status = $2, reingestion_status = 'FAILED', reingestion_completed_at = $3
           WHERE id = $1"#,
    )
    .bind(source_id)
    .bind(SourceStatus::FAILED)
    .bind(Utc::now())
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn fetch_summary(pool: &PgPool, id: &str) -> sqlx::Result<Option<Summary>> {
    sqlx::query_as::<_, Summary>(r#"SELECT * FROM "Summary" WHERE id = $1"#)
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn fetch_summary_episodes(pool: &PgPool, summary_id: &str) -> sqlx::Result<Vec<SummaryEpisode>> {
    sqlx::query_as::<_, SummaryEpisode>(
        r#"SELECT * FROM "SummaryEpisode" WHERE summary_id = $1 ORDER BY created_at"#,
    )
    .bind(summary_id)
    .fetch_all(pool)
    .await
}

pub async fn set_summary_generated(pool: &PgPool, id: &str, generated: &str) -> sqlx::Result<()> {
    sqlx::query(r#"UPDATE "Summary" SET generated = $2 WHERE id = $1"#)
        .bind(id)
        .bind(generated)
        .execute(pool)
        .await?;

    Ok(())
}

/// Persist a finished summary run in one transaction: every generated
/// episode body plus the final job status land together or not at all.
pub async fn finish_summary(
    pool: &PgPool,
    summary_id: &str,
    episode_contents: &[(String, String)],
    generated: &str,
) -> sqlx::Result<()> {
    let mut tx = pool.begin().await?;

    for (episode_id, content) in episode_contents {
        sqlx::query(r#"UPDATE "SummaryEpisode" SET content = $2 WHERE id = $1"#)
            .bind(episode_id)
            .bind(content)
            .execute(&mut *tx)
            .await?;
    }

    sqlx::query(r#"UPDATE "Summary" SET generated = $2 WHERE id = $1"#)
        .bind(summary_id)
        .bind(generated)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    Ok(())
}

/// Persist a finished podcast run in one transaction: the episode script and
/// audio key plus the final job status.
pub async fn finish_podcast(
    pool: &PgPool,
    podcast_id: &str,
    episode_id: &str,
    content: &str,
    audio_key: &str,
    generated: &str,
) -> sqlx::Result<()> {
    let mut tx = pool.begin().await?;

    sqlx::query(r#"UPDATE "PodcastEpisode" SET content = $2, audio_key = $3 WHERE id = $1"#)
        .bind(episode_id)
        .bind(content)
        .bind(audio_key)
        .execute(&mut *tx)
        .await?;

    sqlx::query(r#"UPDATE "Podcast" SET generated = $2 WHERE id = $1"#)
        .bind(podcast_id)
        .bind(generated)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    Ok(())
}

pub async fn fetch_podcast(pool: &PgPool, id: &str) -> sqlx::Result<Option<Podcast>> {
    sqlx::query_as::<_, Podcast>(r#"SELECT * FROM "Podcast" WHERE id = $1"#)
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn fetch_podcast_episodes(pool: &PgPool, podcast_id: &str) -> sqlx::Result<Vec<PodcastEpisode>> {
    sqlx::query_as::<_, PodcastEpisode>(
        r#"SELECT * FROM "PodcastEpisode" WHERE podcast_id = $1 ORDER BY created_at"#,
    )
    .bind(podcast_id)
    .fetch_all(pool)
    .await
}

pub async fn set_podcast_generated(pool: &PgPool, id: &str, generated: &str) -> sqlx::Result<()> {
    sqlx::query(r#"UPDATE "Podcast" SET generated = $2 WHERE id = $1"#)
        .bind(id)
        .bind(generated)
        .execute(pool)
        .await?;

    Ok(())
}
