//! The podcast generator: cluster the library's chunks into thematic
//! groups, summarize each into a segment, combine the segments into a
//! two-host script, synthesize every line, and stitch the audio.

use async_trait::async_trait;
use broker::StatusEvent;
use serde_json::{Map, json};
use uuid::Uuid;

use crate::{
    audio, cluster,
    script::{self, Speaker},
    segment::SegmentSummary,
    worker::{Generator, GeneratorContext},
};

const K_MIN: usize = 2;
const K_MAX: usize = 20;
const CHUNKS_PER_SEGMENT: usize = 15;

pub struct PodcastGenerator;

#[async_trait]
impl Generator for PodcastGenerator {
    fn entity_type(&self) -> &'static str {
        "podcast"
    }

    fn queue(&self) -> &'static str {
        "podcast-generator"
    }

    async fn create(&self, ctx: &GeneratorContext, entity_id: &str) -> anyhow::Result<()> {
        let podcast = db::fetch_podcast(&ctx.pool, entity_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Podcast with ID {entity_id} not found in database"))?;

        let episodes = db::fetch_podcast_episodes(&ctx.pool, entity_id).await?;
        let episode = episodes
            .first()
            .ok_or_else(|| anyhow::anyhow!("Podcast {entity_id} has no episode slot to fill"))?;

        log::info!("Generating podcast for '{}' (ID: {})", podcast.title, podcast.id);

        ctx.publisher
            .entity_status(
                self.entity_type(),
                entity_id,
                &StatusEvent::new(
                    "starting",
                    format!("Starting podcast generation for '{}'...", podcast.title),
                ),
            )
            .await;

        match self.produce(ctx, &podcast, episode).await {
            Ok((script_text, audio_key)) => {
                db::finish_podcast(&ctx.pool, entity_id, &episode.id, &script_text, &audio_key, "COMPLETED").await?;

                ctx.publisher
                    .entity_status(
                        self.entity_type(),
                        entity_id,
                        &StatusEvent::new("completed", "Podcast generation finished.")
                            .with("audioKey", json!(audio_key)),
                    )
                    .await;

                Ok(())
            }
            Err(e) => {
                if let Err(db_err) = db::set_podcast_generated(&ctx.pool, entity_id, "FAILED").await {
                    log::error!("Failed to mark podcast {entity_id} as FAILED: {db_err}");
                }

                ctx.publisher
                    .entity_status(
                        self.entity_type(),
                        entity_id,
                        &StatusEvent::failed("error", "An error occurred during podcast generation."),
                    )
                    .await;

                Err(e)
            }
        }
    }
}

impl PodcastGenerator {
    async fn produce(
        &self,
        ctx: &GeneratorContext,
        podcast: &db::Podcast,
        episode: &db::PodcastEpisode,
    ) -> anyhow::Result<(String, String)> {
        // 1. Every chunk in the library, embeddings included.
        let vectors = db::library_vectors(&ctx.pool, &podcast.library_id).await?;

        if vectors.is_empty() {
            anyhow::bail!("Library {} has no ingested content to build a podcast from", podcast.library_id);
        }

        // 2. Thematic grouping.
        let embeddings: Vec<Vec<f32>> = vectors.iter().map(|v| v.embedding.as_slice().to_vec()).collect();
        let clustering = cluster::cluster_auto(&embeddings, K_MIN, K_MAX, false)?;

        log::info!(
            "Clustered {} chunks into {} thematic groups",
            vectors.len(),
            clustering.k
        );

        // 3. Summarize each group into a segment.
        let mut segments: Vec<SegmentSummary> = Vec::new();

        for group in 0..clustering.k {
            let members: Vec<&db::LibraryVector> = vectors
                .iter()
                .zip(&clustering.labels)
                .filter(|(_, label)| **label == group)
                .map(|(vector, _)| vector)
                .take(CHUNKS_PER_SEGMENT)
                .collect();

            if members.is_empty() {
                continue;
            }

            let context: Vec<String> = members
                .iter()
                .map(|v| format!("Source: {}\nContent: {}", v.source_name, v.content))
                .collect();

            let mut vars = Map::new();
            vars.insert("context".to_string(), json!(context.join("\n\n")));

            let response = ctx.gateway.generate_text("podcast_segment", "v1", vars).await?;

            match SegmentSummary::parse(&response) {
                Ok(segment) => segments.push(segment),
                Err(e) => {
                    log::error!("Segment {group} rejected: {e}");

                    ctx.publisher
                        .entity_status(
                            "podcast",
                            &podcast.id,
                            &StatusEvent::failed("segment_error", format!("Skipping segment {group}: {e}")),
                        )
                        .await;
                }
            }
        }

        if segments.is_empty() {
            anyhow::bail!("No valid segment summaries were produced");
        }

        ctx.publisher
            .entity_status(
                "podcast",
                &podcast.id,
                &StatusEvent::new("script", format!("Combining {} segments into a script.", segments.len())),
            )
            .await;

        // 4. Combine the segments into a line-by-line dialogue.
        let combined: Vec<String> = segments.iter().map(SegmentSummary::to_block).collect();

        let mut vars = Map::new();
        vars.insert("segments".to_string(), json!(combined.join("\n")));
        vars.insert("title".to_string(), json!(podcast.title));
        vars.insert("target_length".to_string(), json!(podcast.length));

        let script_text = ctx.gateway.generate_text("podcast_script_combiner", "v1", vars).await?;

        // 5. Parse into (speaker, line) pairs.
        let lines = script::parse_script(&script_text);

        if lines.is_empty() {
            anyhow::bail!("Script combiner produced no speakable lines");
        }

        // 6. Per-line TTS, paced to stay under the provider's rate limit.
        let mut clips: Vec<Vec<u8>> = Vec::with_capacity(lines.len());

        for (i, line) in lines.iter().enumerate() {
            ctx.publisher
                .entity_status(
                    "podcast",
                    &podcast.id,
                    &StatusEvent::new(
                        "synthesizing",
                        format!("Synthesizing line {} of {}.", i + 1, lines.len()),
                    ),
                )
                .await;

            let voice = match line.speaker {
                Speaker::HostA => &ctx.config.host_a_voice,
                Speaker::HostB => &ctx.config.host_b_voice,
            };

            let clip = ctx
                .gateway
                .generate_tts(&line.text, voice, &ctx.config.tts_model, &ctx.config.tts_provider)
                .await?;

            clips.push(clip.to_vec());

            if i + 1 < lines.len() {
                tokio::time::sleep(ctx.config.tts_pacing).await;
            }
        }

        // 7. Trim, concatenate with 250 ms gaps, export as WAV.
        let wav = audio::stitch(&clips)?;

        // 8. Upload and record.
        let audio_key = format!("{}/{}.wav", podcast.id, Uuid::new_v4());

        ctx.publisher
            .entity_status(
                "podcast",
                &podcast.id,
                &StatusEvent::new("uploading", "Uploading combined audio."),
            )
            .await;

        ctx.storage.store_podcast_audio(&audio_key, wav).await?;

        log::info!("Uploaded podcast audio for episode {} under {audio_key}", episode.id);

        let tagged: Vec<String> = lines.iter().map(script::ScriptLine::to_tagged).collect();

        Ok((tagged.join("\n"), audio_key))
    }
}
