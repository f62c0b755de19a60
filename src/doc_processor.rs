use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Pdf,
    Txt,
    Csv,
    Doc,
    Docx,
    Xls,
    Xlsx,
}

impl DocumentKind {
    pub fn from_mime(mime: &str) -> Option<Self> {
        let essence = mime.split(';').next().unwrap_or("").trim().to_lowercase();
        match essence.as_str() {
            "application/pdf" => Some(Self::Pdf),
            "text/plain" => Some(Self::Txt),
            "text/csv" => Some(Self::Csv),
            "application/msword" => Some(Self::Doc),
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => {
                Some(Self::Docx)
            }
            "application/vnd.ms-excel" => Some(Self::Xls),
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet" => {
                Some(Self::Xlsx)
            }
            _ => None,
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "pdf" => Some(Self::Pdf),
            "txt" => Some(Self::Txt),
            "csv" => Some(Self::Csv),
            "doc" => Some(Self::Doc),
            "docx" => Some(Self::Docx),
            "xls" => Some(Self::Xls),
            "xlsx" => Some(Self::Xlsx),
            _ => None,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Txt => "txt",
            Self::Csv => "csv",
            Self::Doc => "doc",
            Self::Docx => "docx",
            Self::Xls => "xls",
            Self::Xlsx => "xlsx",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("Unsupported file type: {0}")]
    UnsupportedType(String),
    #[error("Text extraction is not supported for .{} files", .0.extension())]
    ExtractionUnsupported(DocumentKind),
    #[error("Failed to read file: {0}")]
    Io(#[from] std::io::Error),
    #[error("File is not valid UTF-8 text")]
    Decode,
    #[error("PDF parse error: {0}")]
    Pdf(String),
    #[error("Document is empty or could not be parsed")]
    Empty,
    #[error("Text extraction did not finish: {0}")]
    Interrupted(String),
}

/// A file handed over by the drop zone or the file picker.
#[derive(Debug, Clone)]
pub struct SelectedFile {
    pub name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl SelectedFile {
    pub fn from_path(path: &Path) -> Result<Self, DocumentError> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown")
            .to_string();
        let bytes = fs::read(path)?;
        Ok(Self {
            name,
            content_type: None,
            bytes,
        })
    }
}

/// The user's current document. Text is extracted on first use and cached.
#[derive(Debug, Clone)]
pub struct Document {
    pub id: Uuid,
    pub name: String,
    pub kind: DocumentKind,
    pub bytes: Vec<u8>,
    extracted_text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentInfo {
    pub id: Uuid,
    pub name: String,
    pub kind: DocumentKind,
    pub size: usize,
}

impl Document {
    pub fn info(&self) -> DocumentInfo {
        DocumentInfo {
            id: self.id,
            name: self.name.clone(),
            kind: self.kind,
            size: self.bytes.len(),
        }
    }

    pub fn extracted_text(&self) -> Option<&str> {
        self.extracted_text.as_deref()
    }

    pub(crate) fn cache_text(&mut self, text: String) {
        self.extracted_text = Some(text);
    }
}

/// Validate a selection against the allow-list. Browse and drop both land here.
pub fn select(file: SelectedFile) -> Result<Document, DocumentError> {
    let kind = match file.content_type.as_deref().filter(|t| !t.trim().is_empty()) {
        Some(mime) => DocumentKind::from_mime(mime)
            .ok_or_else(|| DocumentError::UnsupportedType(mime.to_string()))?,
        None => {
            let ext = Path::new(&file.name)
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or("");
            DocumentKind::from_extension(ext)
                .ok_or_else(|| DocumentError::UnsupportedType(format!(".{}", ext)))?
        }
    };
    Ok(Document {
        id: Uuid::new_v4(),
        name: file.name,
        kind,
        bytes: file.bytes,
        extracted_text: None,
    })
}

/// Extracts text on the blocking pool; PDF parsing is CPU-bound.
pub async fn extract_text(kind: DocumentKind, bytes: Vec<u8>) -> Result<String, DocumentError> {
    tokio::task::spawn_blocking(move || extract(kind, &bytes))
        .await
        .map_err(|e| DocumentError::Interrupted(e.to_string()))?
}

fn extract(kind: DocumentKind, bytes: &[u8]) -> Result<String, DocumentError> {
    let content = match kind {
        DocumentKind::Txt | DocumentKind::Csv => {
            String::from_utf8(bytes.to_vec()).map_err(|_| DocumentError::Decode)?
        }
        DocumentKind::Pdf => pdf_extract::extract_text_from_mem(bytes)
            .map_err(|e| DocumentError::Pdf(e.to_string()))?,
        other => return Err(DocumentError::ExtractionUnsupported(other)),
    };
    if content.trim().is_empty() {
        return Err(DocumentError::Empty);
    }
    Ok(content)
}
