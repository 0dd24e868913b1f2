//! Plain-text decoding of uploaded syllabus documents.

use syllatrack_shared::{Result, SyllatrackError};

/// Document encodings the decoder understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Pdf,
    PlainText,
}

impl DocumentFormat {
    /// Pick a format from the blob name's extension. Unknown extensions are treated as PDF.
    pub fn from_name(name: &str) -> Self {
        let ext = name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "txt" | "md" | "text" => Self::PlainText,
            _ => Self::Pdf,
        }
    }
}

/// Extract plain text from `bytes`.
///
/// PDF parsing is CPU-bound and may panic on malformed input, so async callers
/// should run this on a blocking thread.
pub fn decode_document(name: &str, bytes: &[u8]) -> Result<String> {
    match DocumentFormat::from_name(name) {
        DocumentFormat::PlainText => Ok(String::from_utf8_lossy(bytes).into_owned()),
        DocumentFormat::Pdf => pdf_extract::extract_text_from_mem(bytes).map_err(|e| {
            SyllatrackError::Extraction(format!("failed to read PDF '{name}': {e}"))
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_from_extension() {
        assert_eq!(DocumentFormat::from_name("a.pdf"), DocumentFormat::Pdf);
        assert_eq!(DocumentFormat::from_name("a.PDF"), DocumentFormat::Pdf);
        assert_eq!(DocumentFormat::from_name("notes.TXT"), DocumentFormat::PlainText);
        assert_eq!(DocumentFormat::from_name("notes.md"), DocumentFormat::PlainText);
        assert_eq!(DocumentFormat::from_name("noext"), DocumentFormat::Pdf);
    }

    #[test]
    fn plain_text_is_lossy_utf8() {
        let text = decode_document("s.txt", b"CS 101\n\xffMidterm").unwrap();
        assert!(text.starts_with("CS 101\n"));
        assert!(text.ends_with("Midterm"));
    }
}
