//! Resume / job description parsing.
//!
//! Turns an uploaded PDF, DOCX or plain-text file into whitespace-normalized
//! text for the interview setup. Legacy binary Word files are refused
//! outright; no partial text is ever returned for a rejected file.

pub mod handlers;

use docx_rs::{
    DocumentChild, Paragraph, ParagraphChild, RunChild, Table, TableCellContent, TableChild,
    TableRowChild,
};
use thiserror::Error;

/// OLE2 compound file signature used by legacy `.doc` files.
const OLE2_MAGIC: [u8; 8] = [0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];
const PDF_MAGIC: &[u8] = b"%PDF";
const ZIP_MAGIC: &[u8] = b"PK\x03\x04";

#[derive(Debug, Error, PartialEq)]
pub enum DocumentError {
    #[error("Legacy .doc files are not supported. Please upload a PDF, DOCX or TXT file")]
    LegacyWord,

    #[error("Unsupported file type '{0}'. Please upload a PDF, DOCX or TXT file")]
    Unsupported(String),

    #[error("Could not read the document: {0}")]
    Unreadable(String),

    #[error("No text could be extracted from the document")]
    Empty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Docx,
    PlainText,
}

/// Decides how to read an upload from its name, declared type and leading
/// bytes. The content signature wins over the name when they disagree.
pub fn detect_kind(
    filename: &str,
    content_type: Option<&str>,
    bytes: &[u8],
) -> Result<DocumentKind, DocumentError> {
    let extension = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    let content_type = content_type.unwrap_or_default().to_ascii_lowercase();

    if bytes.starts_with(&OLE2_MAGIC) || extension == "doc" || content_type == "application/msword"
    {
        return Err(DocumentError::LegacyWord);
    }
    if bytes.starts_with(PDF_MAGIC) {
        return Ok(DocumentKind::Pdf);
    }
    if bytes.starts_with(ZIP_MAGIC)
        && (extension == "docx" || content_type.contains("wordprocessingml"))
    {
        return Ok(DocumentKind::Docx);
    }
    match extension.as_str() {
        "pdf" => Ok(DocumentKind::Pdf),
        "docx" => Ok(DocumentKind::Docx),
        "txt" | "text" | "md" => Ok(DocumentKind::PlainText),
        _ if content_type.starts_with("text/plain") => Ok(DocumentKind::PlainText),
        "" => Err(DocumentError::Unsupported(if content_type.is_empty() {
            "unknown".to_string()
        } else {
            content_type
        })),
        other => Err(DocumentError::Unsupported(format!(".{other}"))),
    }
}

/// Extracts and normalizes text. CPU-bound; call from a blocking task.
pub fn extract_text(kind: DocumentKind, bytes: &[u8]) -> Result<String, DocumentError> {
    let raw = match kind {
        DocumentKind::Pdf => pdf_extract::extract_text_from_mem(bytes)
            .map_err(|e| DocumentError::Unreadable(e.to_string()))?,
        DocumentKind::Docx => docx_text(bytes)?,
        DocumentKind::PlainText => String::from_utf8(bytes.to_vec())
            .map_err(|_| DocumentError::Unreadable("text file is not valid UTF-8".to_string()))?,
    };
    let text = normalize_whitespace(&raw);
    if text.is_empty() {
        return Err(DocumentError::Empty);
    }
    Ok(text)
}

fn docx_text(bytes: &[u8]) -> Result<String, DocumentError> {
    let docx = docx_rs::read_docx(bytes).map_err(|e| DocumentError::Unreadable(e.to_string()))?;
    let mut lines = Vec::new();
    for child in &docx.document.children {
        match child {
            DocumentChild::Paragraph(p) => lines.push(paragraph_text(p)),
            DocumentChild::Table(t) => table_text(t, &mut lines),
            _ => {}
        }
    }
    Ok(lines.join("\n"))
}

fn paragraph_text(paragraph: &Paragraph) -> String {
    let mut out = String::new();
    collect_runs(&paragraph.children, &mut out);
    out
}

fn collect_runs(children: &[ParagraphChild], out: &mut String) {
    for child in children {
        match child {
            ParagraphChild::Run(run) => {
                for rc in &run.children {
                    match rc {
                        RunChild::Text(t) => out.push_str(&t.text),
                        RunChild::Tab(_) => out.push('\t'),
                        RunChild::Break(_) => out.push('\n'),
                        _ => {}
                    }
                }
            }
            ParagraphChild::Hyperlink(link) => collect_runs(&link.children, out),
            _ => {}
        }
    }
}

#[allow(irrefutable_let_patterns)]
fn table_text(table: &Table, lines: &mut Vec<String>) {
    for row in &table.rows {
        let TableChild::TableRow(row) = row else {
            continue;
        };
        for cell in &row.cells {
            let TableRowChild::TableCell(cell) = cell else {
                continue;
            };
            for content in &cell.children {
                match content {
                    TableCellContent::Paragraph(p) => lines.push(paragraph_text(p)),
                    TableCellContent::Table(t) => table_text(t, lines),
                    _ => {}
                }
            }
        }
    }
}

/// Collapses runs of spaces and tabs, trims every line, keeps at most one
/// blank line between paragraphs and trims the whole text.
pub fn normalize_whitespace(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut blank_pending = false;
    for line in raw.lines() {
        let collapsed = line.split_whitespace().collect::<Vec<_>>().join(" ");
        if collapsed.is_empty() {
            blank_pending = !out.is_empty();
            continue;
        }
        if !out.is_empty() {
            out.push('\n');
            if blank_pending {
                out.push('\n');
            }
        }
        blank_pending = false;
        out.push_str(&collapsed);
    }
    out
}
