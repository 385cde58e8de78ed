use super::HandlerError;

/// Extract text from markdown and plain text files. Falls back to latin-1
/// when the bytes are not valid UTF-8, and strips NUL bytes which Postgres
/// rejects in text columns.
pub(super) fn extract(buffer: &[u8]) -> Result<String, HandlerError> {
    let text = match std::str::from_utf8(buffer) {
        Ok(text) => text.to_string(),
        Err(_) => buffer.iter().map(|&b| b as char).collect(),
    };

    Ok(text.replace('\0', "").trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utf8_passes_through() {
        assert_eq!(extract("héllo\n".as_bytes()).unwrap(), "héllo");
    }

    #[test]
    fn latin1_fallback_decodes_every_byte() {
        // 0xE9 is 'é' in latin-1 and invalid as a standalone UTF-8 byte.
        let bytes = b"caf\xe9";
        assert_eq!(extract(bytes).unwrap(), "café");
    }

    #[test]
    fn nul_bytes_are_stripped() {
        assert_eq!(extract(b"a\x00b").unwrap(), "ab");
    }
}
