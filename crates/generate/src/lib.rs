//! Generator workers for the fylr platform: message-driven consumers that
//! assemble derived artifacts (textual summaries and multi-speaker audio
//! podcasts) from a library's ingested content.

pub mod audio;
pub mod client;
pub mod cluster;
pub mod podcast;
pub mod script;
pub mod segment;
pub mod summary;
pub mod worker;

use std::sync::Arc;

use config::Config;

use crate::worker::Generator;

/// Run the generator service with both generators attached.
pub async fn run(config: &Config) -> anyhow::Result<()> {
    let generators: Vec<Arc<dyn Generator>> = vec![
        Arc::new(summary::SummaryGenerator),
        Arc::new(podcast::PodcastGenerator),
    ];

    worker::run(config, generators).await
}
