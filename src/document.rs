use crate::error::{RagError, Result};
use log::{debug, info, warn};
use mime_guess::from_path;
use pdf_extract::{extract_text, extract_text_from_mem};
use std::fs;
use std::path::Path;

/// Text extracted from an uploaded file. Lives only for one ingestion.
#[derive(Debug, Clone)]
pub struct Document {
    /// The extracted text content of the document
    pub content: String,
    /// The document's file name (used as document ID)
    pub document_id: String,
    /// The document's MIME type
    pub mime_type: String,
}

impl Document {
    /// Create a new document from a file path
    pub fn from_file<P: AsRef<Path>>(file_path: P) -> Result<Self> {
        let path = file_path.as_ref();
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| {
                RagError::Document(format!("invalid file name: {}", path.display()))
            })?
            .to_string();

        // Detect MIME type
        let mime = from_path(path).first_or_octet_stream();
        let mime_type = mime.to_string();
        debug!("Detected MIME type: {}", mime_type);

        let content = read_document_content(path, &mime_type)?;

        Ok(Document {
            content,
            document_id: file_name,
            mime_type,
        })
    }
}

/// Extract the concatenated page text of a PDF held in memory.
///
/// Pages without extractable text contribute nothing; a PDF with no text at
/// all yields an empty string.
pub fn pdf_bytes_to_text(bytes: &[u8]) -> Result<String> {
    let content = extract_text_from_mem(bytes)
        .map_err(|e| RagError::Document(format!("failed to extract text from PDF: {}", e)))?;

    let cleaned_content = normalize_whitespace(&content);
    if cleaned_content.is_empty() {
        warn!("Extracted PDF content is empty or contains only whitespace");
    }

    Ok(cleaned_content)
}

/// Read content from a document based on its MIME type
pub fn read_document_content<P: AsRef<Path>>(file_path: P, mime_type: &str) -> Result<String> {
    let path = file_path.as_ref();

    match mime_type {
        // Handle PDF documents
        mime if mime.starts_with("application/pdf") => {
            info!("Processing PDF document: {}", path.display());
            let content = extract_text(path).map_err(|e| {
                RagError::Document(format!(
                    "failed to extract text from PDF {}: {}",
                    path.display(),
                    e
                ))
            })?;

            // PDF extraction can sometimes include excessive whitespace
            let cleaned_content = normalize_whitespace(&content);

            if cleaned_content.is_empty() {
                warn!("Extracted PDF content is empty or contains only whitespace");
            }

            Ok(cleaned_content)
        }

        // Handle plain text documents
        mime if mime.starts_with("text/") => {
            info!("Processing text document: {}", path.display());
            fs::read_to_string(path).map_err(|e| {
                RagError::Document(format!(
                    "failed to read text file {}: {}",
                    path.display(),
                    e
                ))
            })
        }

        // Unsupported format
        _ => Err(RagError::Document(format!(
            "unsupported document format: {}. Only text and PDF files are supported.",
            mime_type
        ))),
    }
}

/// Normalize whitespace in text (remove multiple consecutive spaces, newlines, etc.)
fn normalize_whitespace(text: &str) -> String {
    let result = text.replace('\r', "");

    // Replace multiple consecutive newlines with double newlines (paragraph separator)
    let mut prev_char = ' ';
    let mut newline_count = 0;
    let mut normalized = String::with_capacity(result.len());

    for c in result.chars() {
        if c == '\n' {
            newline_count += 1;
        } else {
            if newline_count > 0 {
                // Add at most two newlines (paragraph break)
                if newline_count >= 2 {
                    normalized.push_str("\n\n");
                } else {
                    normalized.push('\n');
                }
                newline_count = 0;
            }

            // Don't add consecutive spaces
            if !(c == ' ' && prev_char == ' ') {
                normalized.push(c);
            }

            prev_char = c;
        }
    }

    normalized.trim().to_string()
}
