//! Format handlers: map a MIME type or file extension to a text extractor.
//! The registry is a static table assembled at compile time; adding a format
//! means adding an entry here.

mod docx;
mod ooxml;
mod pdf;
mod pptx;
mod text;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("No handler found for file type '{0}'")]
    Unsupported(String),

    #[error("Failed to extract text from {format} file: {message}")]
    Extraction { format: &'static str, message: String },

    #[error("No text could be extracted from the file.")]
    EmptyText,
}

type Extractor = fn(&[u8]) -> Result<String, HandlerError>;

/// Extension and MIME aliases per extractor.
const HANDLERS: &[(&[&str], Extractor)] = &[
    (
        &[".txt", ".md", ".markdown", "text/plain", "text/markdown"],
        text::extract,
    ),
    (&[".pdf", "application/pdf"], pdf::extract),
    (
        &[
            ".docx",
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        ],
        docx::extract,
    ),
    (
        &[
            ".pptx",
            "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        ],
        pptx::extract,
    ),
];

/// Whether a file type has a registered handler.
pub fn supports(file_type: &str) -> bool {
    lookup(file_type).is_some()
}

/// Extract text from a buffer using the handler registered for the type.
/// Empty extraction is an error: an unreadable document must fail the job
/// before any embedding call happens.
pub fn extract(file_type: &str, buffer: &[u8]) -> Result<String, HandlerError> {
    let extractor = lookup(file_type).ok_or_else(|| HandlerError::Unsupported(file_type.to_string()))?;

    let extracted = extractor(buffer)?;

    if extracted.trim().is_empty() {
        return Err(HandlerError::EmptyText);
    }

    Ok(extracted)
}

fn lookup(file_type: &str) -> Option<Extractor> {
    let normalized = file_type.to_ascii_lowercase();

    HANDLERS
        .iter()
        .find(|(aliases, _)| aliases.contains(&normalized.as_str()))
        .map(|(_, extractor)| *extractor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_normalizes_case() {
        assert!(supports(".PDF"));
        assert!(supports("text/markdown"));
        assert!(!supports(".csv"));
    }

    #[test]
    fn unsupported_type_errors_before_extraction() {
        let err = extract(".csv", b"a,b,c").unwrap_err();
        assert!(matches!(err, HandlerError::Unsupported(_)));
    }

    #[test]
    fn empty_extraction_is_an_error() {
        let err = extract(".txt", b"   \n  ").unwrap_err();
        assert!(matches!(err, HandlerError::EmptyText));
    }
}
