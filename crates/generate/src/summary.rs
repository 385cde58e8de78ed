//! The summary generator: per episode, expand the title and focus into
//! search keywords, retrieve the closest chunks from the library, and ask
//! the LLM to synthesize the episode content.

use async_trait::async_trait;
use broker::StatusEvent;
use db::SearchHit;
use pgvector::Vector;
use serde_json::{Map, json};

use crate::worker::{Generator, GeneratorContext};

const KEYWORD_LIMIT: usize = 3;
const SEARCH_LIMIT: i64 = 5;
const CONTEXT_LIMIT: usize = 10;

pub struct SummaryGenerator;

#[async_trait]
impl Generator for SummaryGenerator {
    fn entity_type(&self) -> &'static str {
        "summary"
    }

    fn queue(&self) -> &'static str {
        "summary-generator"
    }

    async fn create(&self, ctx: &GeneratorContext, entity_id: &str) -> anyhow::Result<()> {
        let summary = db::fetch_summary(&ctx.pool, entity_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Summary with ID {entity_id} not found in database"))?;

        let episodes = db::fetch_summary_episodes(&ctx.pool, entity_id).await?;

        log::info!("Generating summary for '{}' (ID: {})", summary.title, summary.id);

        ctx.publisher
            .entity_status(
                self.entity_type(),
                entity_id,
                &StatusEvent::new(
                    "starting",
                    format!("Starting summary generation for '{}'...", summary.title),
                ),
            )
            .await;

        match self.generate_episodes(ctx, &summary, &episodes).await {
            Ok(generated) => {
                let any_content = generated.iter().any(|(_, _, retrieved)| *retrieved);
                let final_status = if any_content { "COMPLETED" } else { "FAILED" };

                let contents: Vec<(String, String)> = generated
                    .into_iter()
                    .map(|(id, content, _)| (id, content))
                    .collect();

                db::finish_summary(&ctx.pool, entity_id, &contents, final_status).await?;

                ctx.publisher
                    .entity_status(
                        self.entity_type(),
                        entity_id,
                        &StatusEvent::new("complete", "Summary generation finished.")
                            .with("finalStatus", json!(final_status)),
                    )
                    .await;

                Ok(())
            }
            Err(e) => {
                // Nothing from the failed run is kept; only the job status
                // moves, so the API can surface the failure.
                if let Err(db_err) = db::set_summary_generated(&ctx.pool, entity_id, "FAILED").await {
                    log::error!("Failed to mark summary {entity_id} as FAILED: {db_err}");
                }

                ctx.publisher
                    .entity_status(
                        self.entity_type(),
                        entity_id,
                        &StatusEvent::failed("error", "An error occurred during summary generation."),
                    )
                    .await;

                Err(e)
            }
        }
    }
}

impl SummaryGenerator {
    /// Generate content for every episode. Returns `(episode_id, content,
    /// retrieval_succeeded)` triples; nothing is written to the database
    /// until the whole run has succeeded.
    async fn generate_episodes(
        &self,
        ctx: &GeneratorContext,
        summary: &db::Summary,
        episodes: &[db::SummaryEpisode],
    ) -> anyhow::Result<Vec<(String, String, bool)>> {
        let mut generated = Vec::with_capacity(episodes.len());

        for episode in episodes {
            log::info!("Processing episode: '{}'", episode.title);

            ctx.publisher
                .entity_status(
                    "summary",
                    &summary.id,
                    &StatusEvent::new(
                        "episode_start",
                        format!("Generating content for episode: '{}'...", episode.title),
                    )
                    .with("episodeId", json!(episode.id)),
                )
                .await;

            let focus = episode.focus.clone().unwrap_or_default();

            let mut vars = Map::new();
            vars.insert("episode_title".to_string(), json!(episode.title));
            vars.insert("focus".to_string(), json!(focus));

            let keywords_text = ctx.gateway.generate_text("summary_keywords", "v1", vars).await?;

            let keywords: Vec<&str> = keywords_text
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .take(KEYWORD_LIMIT)
                .collect();

            log::info!("Generated search queries: {keywords:?}");

            let mut hits: Vec<SearchHit> = Vec::new();

            for keyword in keywords {
                match self.search(ctx, &summary.library_id, keyword).await {
                    Ok(found) => hits.extend(found),
                    Err(e) => log::error!("Error during vector search for '{keyword}': {e}"),
                }
            }

            // Dedupe by chunk, closest first, and keep a bounded context.
            let mut seen = std::collections::HashSet::new();
            hits.retain(|hit| seen.insert(hit.vector_id.clone()));
            hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
            hits.truncate(CONTEXT_LIMIT);

            let (content, retrieved) = if hits.is_empty() {
                log::warn!("No relevant content found for episode '{}'", episode.title);

                (
                    format!(
                        "No relevant content found for the topic '{}' in the available documents.",
                        episode.title
                    ),
                    false,
                )
            } else {
                let context_content: Vec<String> = hits
                    .iter()
                    .map(|hit| format!("Source: {}\nContent: {}", hit.source_name, hit.content))
                    .collect();

                let mut vars = Map::new();
                vars.insert("episode_title".to_string(), json!(episode.title));
                vars.insert("focus".to_string(), json!(focus));
                vars.insert("context_content".to_string(), json!(context_content.join("\n\n")));

                let content = ctx.gateway.generate_text("episode_summary", "v1", vars).await?;

                log::info!(
                    "Generated content for episode '{}' ({} characters)",
                    episode.title,
                    content.len()
                );

                (content, true)
            };

            ctx.publisher
                .entity_status(
                    "summary",
                    &summary.id,
                    &StatusEvent::new("episode_complete", "Episode content generated.").with(
                        "episode",
                        json!({
                            "id": episode.id,
                            "title": episode.title,
                            "content": content,
                            "focus": episode.focus,
                            "createdAt": episode.created_at.to_rfc3339(),
                        }),
                    ),
                )
                .await;

            generated.push((episode.id.clone(), content, retrieved));
        }

        Ok(generated)
    }

    async fn search(
        &self,
        ctx: &GeneratorContext,
        library_id: &str,
        query: &str,
    ) -> anyhow::Result<Vec<SearchHit>> {
        let embedding = ctx.gateway.generate_embedding(query).await?;
        let hits = db::knn_search(&ctx.pool, library_id, &Vector::from(embedding), SEARCH_LIMIT).await?;

        Ok(hits)
    }
}
