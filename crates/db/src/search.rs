use pgvector::Vector;
use sqlx::{FromRow, PgPool};

/// One k-NN match with its source metadata attached.
#[derive(Debug, Clone, FromRow)]
pub struct SearchHit {
    pub vector_id: String,
    pub content: String,
    pub chunk_index: i32,
    pub source_id: String,
    pub source_name: String,
    /// Cosine distance to the query embedding; lower is closer.
    pub distance: f64,
}

/// Top-N chunks of a library by ascending cosine distance to the query
/// embedding. Relies on the pgvector `<=>` operator, which an ivfflat or
/// hnsw index on the embedding column accelerates.
pub async fn knn_search(
    pool: &PgPool,
    library_id: &str,
    query: &Vector,
    limit: i64,
) -> sqlx::Result<Vec<SearchHit>> {
    sqlx::query_as::<_, SearchHit>(
        r#"SELECT v.id AS vector_id,
                  v.content,
                  v.chunk_index,
                  s.id AS source_id,
                  s.name AS source_name,
                  (v.embedding <=> $2)::float8 AS distance
           FROM "Vectors" v
           JOIN "Sources" s ON v.file_id = s.id
           WHERE s.library_id = $1
           ORDER BY v.embedding <=> $2
           LIMIT $3"#,
    )
    .bind(library_id)
    .bind(query)
    .bind(limit)
    .fetch_all(pool)
    .await
}

/// A chunk row pulled for clustering, embedding included.
#[derive(Debug, Clone, FromRow)]
pub struct LibraryVector {
    pub vector_id: String,
    pub content: String,
    pub source_name: String,
    pub embedding: Vector,
}

/// Every chunk in a library with its embedding, in source and chunk order.
/// The podcast generator clusters these into thematic groups.
pub async fn library_vectors(pool: &PgPool, library_id: &str) -> sqlx::Result<Vec<LibraryVector>> {
    sqlx::query_as::<_, LibraryVector>(
        r#"SELECT v.id AS vector_id,
                  v.content,
                  s.name AS source_name,
                  v.embedding
           FROM "Vectors" v
           JOIN "Sources" s ON v.file_id = s.id
           WHERE s.library_id = $1
           ORDER BY s.id, v.chunk_index"#,
    )
    .bind(library_id)
    .fetch_all(pool)
    .await
}
