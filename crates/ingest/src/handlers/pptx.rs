use super::{
    HandlerError,
    ooxml::{Archive, paragraph_text},
};

const FORMAT: &str = "pptx";

/// Extract all shape text per slide from PPTX files, slides in deck order.
pub(super) fn extract(buffer: &[u8]) -> Result<String, HandlerError> {
    let mut archive = Archive::open(FORMAT, buffer)?;

    let mut slides: Vec<(u32, String)> = archive
        .file_names()
        .into_iter()
        .filter_map(|name| {
            let number = name
                .strip_prefix("ppt/slides/slide")?
                .strip_suffix(".xml")?
                .parse::<u32>()
                .ok()?;

            Some((number, name))
        })
        .collect();
    slides.sort();

    let mut lines = Vec::new();

    for (_, name) in slides {
        let part = archive.read(FORMAT, &name)?;
        lines.extend(paragraph_text(FORMAT, &part, b"a:t", b"a:p")?);
    }

    Ok(lines.join("\n"))
}

#[cfg(test)]
mod tests {
    use std::io::{Cursor, Write};

    use zip::write::SimpleFileOptions;

    use super::*;

    fn pptx_with(slides: &[&str]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));

        for (i, content) in slides.iter().enumerate() {
            let name = format!("ppt/slides/slide{}.xml", i + 1);
            writer.start_file(name, SimpleFileOptions::default()).unwrap();
            writer.write_all(content.as_bytes()).unwrap();
        }

        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn extracts_shape_text_in_slide_order() {
        let slide_one = r#"<p:sld xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main">
            <p:txBody><a:p><a:r><a:t>Title slide</a:t></a:r></a:p></p:txBody>
        </p:sld>"#;
        let slide_two = r#"<p:sld xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main">
            <p:txBody>
              <a:p><a:r><a:t>Bullet </a:t></a:r><a:r><a:t>one</a:t></a:r></a:p>
              <a:p><a:r><a:t>Bullet two</a:t></a:r></a:p>
            </p:txBody>
        </p:sld>"#;

        let buffer = pptx_with(&[slide_one, slide_two]);
        let text = extract(&buffer).unwrap();

        assert_eq!(text, "Title slide\nBullet one\nBullet two");
    }
}
