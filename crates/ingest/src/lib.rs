//! Ingestion workers for the fylr platform: message-driven consumers that
//! fetch uploads from object storage, extract and chunk their text, embed
//! the chunks through the AI gateway, and persist the result.

pub mod chunker;
pub mod client;
pub mod handlers;
pub mod reingest;
pub mod worker;

pub use worker::{IngestError, IngestMessage};
