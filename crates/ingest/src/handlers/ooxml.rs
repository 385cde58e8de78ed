//! Shared plumbing for the OOXML formats: both DOCX and PPTX are zip
//! archives of XML parts where visible text lives in run elements (`w:t`,
//! `a:t`) grouped into paragraphs (`w:p`, `a:p`).

use std::io::{Cursor, Read};

use quick_xml::events::Event;

use super::HandlerError;

pub(super) struct Archive {
    inner: zip::ZipArchive<Cursor<Vec<u8>>>,
}

impl Archive {
    pub(super) fn open(format: &'static str, buffer: &[u8]) -> Result<Self, HandlerError> {
        let inner = zip::ZipArchive::new(Cursor::new(buffer.to_vec())).map_err(|e| HandlerError::Extraction {
            format,
            message: e.to_string(),
        })?;

        Ok(Self { inner })
    }

    pub(super) fn file_names(&self) -> Vec<String> {
        self.inner.file_names().map(str::to_string).collect()
    }

    pub(super) fn read(&mut self, format: &'static str, name: &str) -> Result<Vec<u8>, HandlerError> {
        let mut file = self.inner.by_name(name).map_err(|e| HandlerError::Extraction {
            format,
            message: format!("missing part '{name}': {e}"),
        })?;

        let mut content = Vec::new();
        file.read_to_end(&mut content).map_err(|e| HandlerError::Extraction {
            format,
            message: e.to_string(),
        })?;

        Ok(content)
    }
}

/// Collect the text of an XML part, one string per paragraph element.
pub(super) fn paragraph_text(
    format: &'static str,
    xml: &[u8],
    text_tag: &[u8],
    paragraph_tag: &[u8],
) -> Result<Vec<String>, HandlerError> {
    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();

    let mut paragraphs = Vec::new();
    let mut current = String::new();
    let mut in_text_run = false;
    let mut saw_paragraph = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.name().as_ref() == text_tag => {
                in_text_run = true;
            }
            Ok(Event::Text(t)) if in_text_run => {
                let text = t.unescape().map_err(|e| HandlerError::Extraction {
                    format,
                    message: e.to_string(),
                })?;
                current.push_str(&text);
            }
            Ok(Event::End(e)) => {
                if e.name().as_ref() == text_tag {
                    in_text_run = false;
                } else if e.name().as_ref() == paragraph_tag {
                    paragraphs.push(std::mem::take(&mut current));
                    saw_paragraph = true;
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(HandlerError::Extraction {
                    format,
                    message: e.to_string(),
                });
            }
        }

        buf.clear();
    }

    // Text outside any paragraph element still counts.
    if !saw_paragraph && !current.is_empty() {
        paragraphs.push(current);
    }

    Ok(paragraphs)
}
