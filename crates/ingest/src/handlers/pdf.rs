use super::HandlerError;

/// Extract text from PDF files with the layout-aware extractor.
pub(super) fn extract(buffer: &[u8]) -> Result<String, HandlerError> {
    let text = pdf_extract::extract_text_from_mem(buffer).map_err(|e| HandlerError::Extraction {
        format: "PDF",
        message: e.to_string(),
    })?;

    Ok(text.trim().to_string())
}
