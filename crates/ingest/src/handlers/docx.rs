use super::{
    HandlerError,
    ooxml::{Archive, paragraph_text},
};

const FORMAT: &str = "docx";

/// Extract text from DOCX files: body paragraphs and table cells come from
/// the main document part, then header and footer parts are appended.
pub(super) fn extract(buffer: &[u8]) -> Result<String, HandlerError> {
    let mut archive = Archive::open(FORMAT, buffer)?;

    let mut lines = Vec::new();

    let document = archive.read(FORMAT, "word/document.xml")?;
    lines.extend(paragraph_text(FORMAT, &document, b"w:t", b"w:p")?);

    // Header and footer parts are numbered (header1.xml, footer2.xml, ...).
    let mut extras: Vec<String> = archive
        .file_names()
        .into_iter()
        .filter(|name| {
            let Some(stem) = name.strip_prefix("word/") else {
                return false;
            };

            (stem.starts_with("header") || stem.starts_with("footer")) && stem.ends_with(".xml")
        })
        .collect();
    extras.sort();

    for name in extras {
        let part = archive.read(FORMAT, &name)?;
        lines.extend(paragraph_text(FORMAT, &part, b"w:t", b"w:p")?);
    }

    Ok(lines.join("\n"))
}

#[cfg(test)]
mod tests {
    use std::io::{Cursor, Write};

    use zip::write::SimpleFileOptions;

    use super::*;

    fn docx_with(parts: &[(&str, &str)]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));

        for (name, content) in parts {
            writer.start_file(*name, SimpleFileOptions::default()).unwrap();
            writer.write_all(content.as_bytes()).unwrap();
        }

        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn extracts_paragraphs_tables_and_headers() {
        let document = r#"<?xml version="1.0"?>
            <w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
              <w:body>
                <w:p><w:r><w:t>First paragraph.</w:t></w:r></w:p>
                <w:tbl>
                  <w:tr><w:tc><w:p><w:r><w:t>Cell text.</w:t></w:r></w:p></w:tc></w:tr>
                </w:tbl>
                <w:p><w:r><w:t>Second </w:t></w:r><w:r><w:t>paragraph.</w:t></w:r></w:p>
              </w:body>
            </w:document>"#;
        let header = r#"<w:hdr xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
            <w:p><w:r><w:t>Page header</w:t></w:r></w:p>
        </w:hdr>"#;

        let buffer = docx_with(&[("word/document.xml", document), ("word/header1.xml", header)]);
        let text = extract(&buffer).unwrap();

        assert_eq!(text, "First paragraph.\nCell text.\nSecond paragraph.\nPage header");
    }

    #[test]
    fn missing_document_part_is_an_error() {
        let buffer = docx_with(&[("word/other.xml", "<x/>")]);
        let err = extract(&buffer).unwrap_err();

        assert!(matches!(err, HandlerError::Extraction { .. }));
    }
}
