//! Parsing and validation of the per-cluster segment summaries the LLM
//! produces as JSON.

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SegmentError {
    #[error("segment response is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid segment: {0}")]
    Invalid(String),
}

/// A thematic segment summary: title, the points to make, and supporting
/// facts.
#[derive(Debug, Clone, Deserialize)]
pub struct SegmentSummary {
    pub title: String,
    pub keynotes: Vec<String>,
    pub facts: Vec<String>,
}

impl SegmentSummary {
    /// Parse the LLM response, tolerating a markdown code fence around the
    /// JSON, and enforce the schema bounds.
    pub fn parse(response: &str) -> Result<SegmentSummary, SegmentError> {
        let segment: SegmentSummary = serde_json::from_str(strip_code_fence(response))?;
        segment.validate()?;

        Ok(segment)
    }

    fn validate(&self) -> Result<(), SegmentError> {
        check_len("title", &self.title, 15, 80)?;

        if !(2..=7).contains(&self.keynotes.len()) {
            return Err(SegmentError::Invalid(format!(
                "expected 2-7 keynotes, got {}",
                self.keynotes.len()
            )));
        }

        for keynote in &self.keynotes {
            check_len("keynote", keynote, 10, 100)?;
        }

        if !(2..=5).contains(&self.facts.len()) {
            return Err(SegmentError::Invalid(format!(
                "expected 2-5 facts, got {}",
                self.facts.len()
            )));
        }

        for fact in &self.facts {
            check_len("fact", fact, 10, 150)?;
        }

        Ok(())
    }

    /// Render the segment as the text block fed to the script combiner.
    pub fn to_block(&self) -> String {
        let mut block = format!("## {}\n", self.title);

        block.push_str("Key points:\n");
        for keynote in &self.keynotes {
            block.push_str(&format!("- {keynote}\n"));
        }

        block.push_str("Facts:\n");
        for fact in &self.facts {
            block.push_str(&format!("- {fact}\n"));
        }

        block
    }
}

fn check_len(field: &str, value: &str, min: usize, max: usize) -> Result<(), SegmentError> {
    let len = value.chars().count();

    if len < min || len > max {
        return Err(SegmentError::Invalid(format!(
            "{field} length {len} outside {min}-{max}: '{value}'"
        )));
    }

    Ok(())
}

/// LLMs often wrap JSON in a markdown fence; strip one when present.
fn strip_code_fence(response: &str) -> &str {
    let trimmed = response.trim();

    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };

    let inner = inner.strip_prefix("json").unwrap_or(inner);
    let inner = inner.strip_suffix("```").unwrap_or(inner);

    inner.trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_json() -> String {
        serde_json::json!({
            "title": "The Origins of the Internet",
            "keynotes": [
                "ARPANET connected four universities in 1969",
                "Packet switching replaced circuit switching",
            ],
            "facts": [
                "The first message was the truncated word LO",
                "TCP/IP became the standard on January 1, 1983",
            ],
        })
        .to_string()
    }

    #[test]
    fn parses_valid_segments() {
        let segment = SegmentSummary::parse(&valid_json()).unwrap();

        assert_eq!(segment.title, "The Origins of the Internet");
        assert_eq!(segment.keynotes.len(), 2);
        assert_eq!(segment.facts.len(), 2);
    }

    #[test]
    fn tolerates_markdown_fences() {
        let fenced = format!("```json\n{}\n```", valid_json());
        assert!(SegmentSummary::parse(&fenced).is_ok());
    }

    #[test]
    fn rejects_invalid_json() {
        let err = SegmentSummary::parse("not json at all").unwrap_err();
        assert!(matches!(err, SegmentError::Json(_)));
    }

    #[test]
    fn rejects_out_of_range_titles() {
        let short = serde_json::json!({
            "title": "Too short",
            "keynotes": ["long enough keynote one", "long enough keynote two"],
            "facts": ["long enough fact one", "long enough fact two"],
        });

        let err = SegmentSummary::parse(&short.to_string()).unwrap_err();
        assert!(matches!(err, SegmentError::Invalid(_)));
    }

    #[test]
    fn rejects_wrong_cardinality() {
        let one_keynote = serde_json::json!({
            "title": "A title of acceptable length",
            "keynotes": ["only one keynote here"],
            "facts": ["long enough fact one", "long enough fact two"],
        });

        let err = SegmentSummary::parse(&one_keynote.to_string()).unwrap_err();
        assert!(matches!(err, SegmentError::Invalid(_)));
    }

    #[test]
    fn block_rendering_lists_points_and_facts() {
        let segment = SegmentSummary::parse(&valid_json()).unwrap();
        let block = segment.to_block();

        assert!(block.starts_with("## The Origins of the Internet\n"));
        assert!(block.contains("- ARPANET connected four universities in 1969"));
        assert!(block.contains("Facts:\n"));
    }
}
