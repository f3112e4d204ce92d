//! Text extraction for uploaded documents (PDF, Word, plain text).
//!
//! The document kind is decided by media type, which [`extract`] guesses
//! from the file extension. Extraction only concatenates text: no OCR and
//! no layout normalization.

use std::io::Read;
use std::path::Path;

use crate::error::{RagError, Result};

pub const MIME_PDF: &str = "application/pdf";
pub const MIME_DOCX: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
pub const MIME_TEXT: &str = "text/plain";
pub const MIME_MARKDOWN: &str = "text/markdown";

/// Maximum decompressed bytes to read from a single ZIP entry (zip-bomb protection).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

/// Media type for a file name, from its extension.
pub fn media_type_for(path: &Path) -> String {
    mime_guess::from_path(path)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}

/// Read a file and extract its text according to its media type.
pub fn extract(path: &Path) -> Result<String> {
    let media_type = media_type_for(path);
    if !is_supported(&media_type) {
        return Err(RagError::UnsupportedFormat { media_type });
    }
    let bytes = std::fs::read(path)?;
    extract_bytes(&bytes, &media_type).map_err(|e| with_file(e, path))
}

pub fn is_supported(media_type: &str) -> bool {
    matches!(media_type, MIME_PDF | MIME_DOCX | MIME_TEXT | MIME_MARKDOWN)
}

/// Extract text from in-memory content of a known media type.
pub fn extract_bytes(bytes: &[u8], media_type: &str) -> Result<String> {
    match media_type {
        MIME_PDF => extract_pdf(bytes),
        MIME_DOCX => extract_docx(bytes),
        MIME_TEXT | MIME_MARKDOWN => String::from_utf8(bytes.to_vec()).map_err(|e| {
            RagError::Extraction {
                file: String::new(),
                reason: format!("not valid UTF-8: {}", e),
            }
        }),
        other => Err(RagError::UnsupportedFormat {
            media_type: other.to_string(),
        }),
    }
}

fn with_file(err: RagError, path: &Path) -> RagError {
    match err {
        RagError::Extraction { reason, .. } => RagError::Extraction {
            file: path.display().to_string(),
            reason,
        },
        other => other,
    }
}

fn extraction_error(reason: impl ToString) -> RagError {
    RagError::Extraction {
        file: String::new(),
        reason: reason.to_string(),
    }
}

fn extract_pdf(bytes: &[u8]) -> Result<String> {
    let pages = pdf_extract::extract_text_from_mem_by_pages(bytes).map_err(extraction_error)?;
    Ok(pages.join("\n"))
}

fn extract_docx(bytes: &[u8]) -> Result<String> {
    let mut archive =
        zip::ZipArchive::new(std::io::Cursor::new(bytes)).map_err(extraction_error)?;
    let entry = archive
        .by_name("word/document.xml")
        .map_err(|_| extraction_error("word/document.xml not found"))?;

    let mut doc_xml = Vec::new();
    entry
        .take(MAX_XML_ENTRY_BYTES)
        .read_to_end(&mut doc_xml)
        .map_err(extraction_error)?;
    if doc_xml.len() as u64 >= MAX_XML_ENTRY_BYTES {
        return Err(extraction_error("word/document.xml exceeds size limit"));
    }

    let paragraphs = docx_paragraphs(&doc_xml)?;
    Ok(paragraphs.join("\n"))
}

/// Text of every `w:p` paragraph, built from its `w:t` runs, in document order.
fn docx_paragraphs(xml: &[u8]) -> Result<Vec<String>> {
    use quick_xml::events::Event;

    let mut paragraphs = Vec::new();
    let mut current = String::new();
    let mut in_paragraph = false;
    let mut in_text = false;

    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"p" => {
                    in_paragraph = true;
                    current.clear();
                }
                b"t" => in_text = true,
                _ => {}
            },
            Ok(Event::Empty(e)) => {
                // Self-closing <w:p/> is an empty paragraph
                if e.local_name().as_ref() == b"p" {
                    paragraphs.push(String::new());
                }
            }
            Ok(Event::Text(te)) if in_text => {
                let text = te.unescape().map_err(extraction_error)?;
                current.push_str(&text);
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" if in_paragraph => {
                    in_paragraph = false;
                    paragraphs.push(std::mem::take(&mut current));
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(extraction_error(e)),
            _ => {}
        }
        buf.clear();
    }
    Ok(paragraphs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn docx_with_paragraphs(paragraphs: &[&str]) -> Vec<u8> {
        let body: String = paragraphs
            .iter()
            .map(|p| format!("<w:p><w:r><w:t>{}</w:t></w:r></w:p>", p))
            .collect();
        let xml = format!(
            "<?xml version=\"1.0\"?><w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\"><w:body>{}</w:body></w:document>",
            body
        );
        let mut buf = Vec::new();
        {
            let mut zip = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
            zip.start_file("word/document.xml", zip::write::SimpleFileOptions::default())
                .unwrap();
            zip.write_all(xml.as_bytes()).unwrap();
            zip.finish().unwrap();
        }
        buf
    }

    #[test]
    fn media_type_from_extension() {
        assert_eq!(media_type_for(Path::new("a.pdf")), MIME_PDF);
        assert_eq!(media_type_for(Path::new("a.docx")), MIME_DOCX);
        assert_eq!(media_type_for(Path::new("a.txt")), MIME_TEXT);
    }

    #[test]
    fn unsupported_extension_returns_error() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("molecule.xyz");
        std::fs::write(&path, "3\nwater\nO 0 0 0").unwrap();
        let err = extract(&path).unwrap_err();
        match err {
            RagError::UnsupportedFormat { media_type } => assert_ne!(media_type, MIME_TEXT),
            other => panic!("expected UnsupportedFormat, got {other:?}"),
        }
    }

    #[test]
    fn plain_text_is_read_as_utf8() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("notes.txt");
        std::fs::write(&path, "Paris is the capital of France.").unwrap();
        assert_eq!(extract(&path).unwrap(), "Paris is the capital of France.");
    }

    #[test]
    fn invalid_utf8_names_the_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("broken.txt");
        std::fs::write(&path, [0xff, 0xfe, 0xfd]).unwrap();
        match extract(&path).unwrap_err() {
            RagError::Extraction { file, .. } => assert!(file.ends_with("broken.txt")),
            other => panic!("expected Extraction, got {other:?}"),
        }
    }

    #[test]
    fn docx_paragraphs_joined_in_order() {
        let bytes = docx_with_paragraphs(&["First paragraph.", "Second paragraph."]);
        let text = extract_bytes(&bytes, MIME_DOCX).unwrap();
        assert_eq!(text, "First paragraph.\nSecond paragraph.");
    }

    #[test]
    fn invalid_pdf_returns_error() {
        let err = extract_bytes(b"not a pdf", MIME_PDF).unwrap_err();
        assert!(matches!(err, RagError::Extraction { .. }));
    }

    #[test]
    fn invalid_zip_returns_error_for_docx() {
        let err = extract_bytes(b"not a zip", MIME_DOCX).unwrap_err();
        assert!(matches!(err, RagError::Extraction { .. }));
    }
}
