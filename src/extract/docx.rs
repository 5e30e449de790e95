use std::io::{Cursor, Read};

use quick_xml::{events::Event, Reader};

use crate::error::AppError;

const DOCUMENT_PART: &str = "word/document.xml";

/// Extract paragraph text from a DOCX archive, one line per paragraph.
pub fn extract_docx(bytes: &[u8]) -> Result<String, AppError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| AppError::extraction_with("Failed to open DOCX archive", e.to_string()))?;

    let mut xml = String::new();
    archive
        .by_name(DOCUMENT_PART)
        .map_err(|e| AppError::extraction_with("DOCX has no document body", e.to_string()))?
        .read_to_string(&mut xml)
        .map_err(|e| AppError::extraction_with("Failed to read DOCX document body", e))?;

    let paragraphs = paragraphs(&xml)
        .map_err(|e| AppError::extraction_with("Malformed DOCX document body", e))?;
    tracing::debug!(paragraphs = paragraphs.len(), "extracted DOCX text");
    Ok(paragraphs.join("\n"))
}

/// Walk the document part and collect one string per `<w:p>`, ordered by
/// where each paragraph opens. A paragraph nested in a text box gets its own
/// line and the enclosing paragraph keeps the text around it.
fn paragraphs(xml: &str) -> Result<Vec<String>, quick_xml::Error> {
    let mut reader = Reader::from_str(xml);
    let mut out: Vec<String> = Vec::new();
    // indices into `out` of the paragraphs currently open
    let mut open: Vec<usize> = Vec::new();
    let mut in_text = false;
    // `mc:Fallback` repeats the text of its `mc:Choice` sibling
    let mut fallback = 0usize;

    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.name().as_ref() {
                b"mc:Fallback" => fallback += 1,
                _ if fallback > 0 => {}
                b"w:p" => {
                    open.push(out.len());
                    out.push(String::new());
                }
                b"w:t" => in_text = true,
                _ => {}
            },
            Event::End(e) => match e.name().as_ref() {
                b"mc:Fallback" => fallback = fallback.saturating_sub(1),
                _ if fallback > 0 => {}
                b"w:p" => {
                    open.pop();
                }
                b"w:t" => in_text = false,
                _ => {}
            },
            Event::Empty(e) if fallback == 0 => {
                let ch = match e.name().as_ref() {
                    b"w:p" => {
                        out.push(String::new());
                        continue;
                    }
                    b"w:tab" => '\t',
                    b"w:br" | b"w:cr" => '\n',
                    _ => continue,
                };
                if let Some(&idx) = open.last() {
                    out[idx].push(ch);
                }
            }
            Event::Text(t) if in_text && fallback == 0 => {
                if let Some(&idx) = open.last() {
                    out[idx].push_str(&t.unescape()?);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(out)
}
