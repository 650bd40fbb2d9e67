//! Best-effort text extraction for uploaded files.
//!
//! Extraction never fails: unreadable or unsupported files produce a short
//! bracketed marker line instead of text, so a single bad file does not sink
//! a whole upload.

mod office;
mod pdf;
mod structured;

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use study_models::{Config, ExtractionConfig};
use tracing::{debug, instrument};

const TEXT_EXTS: &[&str] = &[
    "txt", "md", "rst", "log", "ini", "cfg", "conf", "env", "py", "ipynb", "js", "ts", "tsx",
    "jsx", "java", "kt", "kts", "cs", "vb", "c", "h", "cpp", "hpp", "cc", "hh", "go", "rs",
    "swift", "m", "mm", "php", "rb", "pl", "sh", "bash", "zsh", "fish", "sql", "scala", "clj",
    "edn", "lua",
];

const IMAGE_EXTS: &[&str] = &["png", "jpg", "jpeg", "bmp", "tif", "tiff", "gif", "webp"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileKind {
    Text,
    Csv,
    Tsv,
    Xlsx,
    Docx,
    Pptx,
    Pdf,
    Image,
    Json,
    Yaml,
    Xml,
    Other,
}

impl FileKind {
    fn from_ext(ext: &str) -> Self {
        match ext {
            e if TEXT_EXTS.contains(&e) => FileKind::Text,
            "csv" => FileKind::Csv,
            "tsv" => FileKind::Tsv,
            "xlsx" => FileKind::Xlsx,
            "docx" => FileKind::Docx,
            "pptx" => FileKind::Pptx,
            "pdf" => FileKind::Pdf,
            e if IMAGE_EXTS.contains(&e) => FileKind::Image,
            "json" => FileKind::Json,
            "yaml" | "yml" => FileKind::Yaml,
            "xml" => FileKind::Xml,
            _ => FileKind::Other,
        }
    }
}

/// Text extracted from one file, with its path relative to the walk base.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedFile {
    pub path: PathBuf,
    pub text: String,
}

impl ExtractedFile {
    /// Path rendered the way it is stored as a chunk `source`.
    pub fn source(&self) -> String {
        self.path.to_string_lossy().into_owned()
    }
}

#[derive(Debug, Clone)]
pub struct Extractor {
    ocr: bool,
    max_text_bytes: u64,
}

impl Default for Extractor {
    fn default() -> Self {
        Self::new(&Config::default().extraction)
    }
}

impl Extractor {
    pub fn new(config: &ExtractionConfig) -> Self {
        Self {
            ocr: config.ocr,
            max_text_bytes: config.max_text_bytes,
        }
    }

    pub fn extract_text_from_path(&self, path: &Path) -> String {
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        let name = display_name(path);

        match FileKind::from_ext(&ext) {
            FileKind::Text => read_text_or_marker(path, "text file"),
            FileKind::Csv => structured::read_delimited(path, b',')
                .unwrap_or_else(|e| error_marker("CSV/TSV", &name, e)),
            FileKind::Tsv => structured::read_delimited(path, b'\t')
                .unwrap_or_else(|e| error_marker("CSV/TSV", &name, e)),
            FileKind::Xlsx => {
                office::read_xlsx(path).unwrap_or_else(|e| error_marker("XLSX", &name, e))
            }
            FileKind::Docx => {
                office::read_docx(path).unwrap_or_else(|e| error_marker("DOCX", &name, e))
            }
            FileKind::Pptx => {
                office::read_pptx(path).unwrap_or_else(|e| error_marker("PPTX", &name, e))
            }
            FileKind::Pdf => pdf::read_pdf(path).unwrap_or_else(|e| error_marker("PDF", &name, e)),
            FileKind::Image if !self.ocr => format!("[skip] {}: OCR disabled.\n", name),
            FileKind::Image => format!("[missing] no OCR engine available for {}\n", name),
            FileKind::Json => {
                structured::read_json(path).unwrap_or_else(|e| error_marker("JSON", &name, e))
            }
            FileKind::Yaml => {
                structured::read_yaml(path).unwrap_or_else(|e| error_marker("YAML", &name, e))
            }
            FileKind::Xml => read_text_or_marker(path, "XML"),
            FileKind::Other => self.fallback(path, &name, &ext),
        }
    }

    fn fallback(&self, path: &Path, name: &str, ext: &str) -> String {
        let small = std::fs::metadata(path)
            .map(|m| m.len() <= self.max_text_bytes)
            .unwrap_or(false);
        if small {
            return read_text_or_marker(path, "text file");
        }

        let is_text = mime_guess::from_path(path)
            .first()
            .map(|mime| mime.type_() == mime_guess::mime::TEXT)
            .unwrap_or(false);
        if is_text {
            return read_text_or_marker(path, "text file");
        }

        format!("[unsupported] {} (.{}) — no extractor available.\n", name, ext)
    }

    /// Extract every file reachable from `paths`, keeping non-blank results.
    ///
    /// Directories are walked recursively in sorted order and files reached
    /// twice are extracted once. When `base_dir` is given, returned paths are
    /// relative to it.
    #[instrument(skip(self, paths))]
    pub fn walk_and_extract(&self, paths: &[PathBuf], base_dir: Option<&Path>) -> Vec<ExtractedFile> {
        let base = base_dir.and_then(|b| std::fs::canonicalize(b).ok());
        let mut results = Vec::new();
        for file in unique_files(paths) {
            let text = self.extract_text_from_path(&file);
            if text.trim().is_empty() {
                debug!("No text in {}", file.display());
                continue;
            }
            results.push(ExtractedFile {
                path: relative_to(&file, base.as_deref()),
                text,
            });
        }
        results
    }

    /// Concatenate every file's text behind a `===== FILE: <name> =====` header.
    pub fn walk_and_extract_blob(&self, paths: &[PathBuf], base_dir: Option<&Path>) -> String {
        let base = base_dir.and_then(|b| std::fs::canonicalize(b).ok());
        let mut out = String::new();
        for file in unique_files(paths) {
            let rel = relative_to(&file, base.as_deref());
            out.push_str(&format!("\n\n===== FILE: {} =====\n", display_name(&rel)));
            out.push_str(&self.extract_text_from_path(&file));
        }
        out
    }
}

fn unique_files(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            let mut found = Vec::new();
            collect_files(path, &mut found);
            found.sort();
            files.extend(found);
        } else if path.is_file() {
            files.push(path.clone());
        }
    }

    let mut seen = HashSet::new();
    files
        .into_iter()
        .filter_map(|f| std::fs::canonicalize(&f).ok())
        .filter(|f| seen.insert(f.clone()))
        .collect()
}

fn collect_files(dir: &Path, out: &mut Vec<PathBuf>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_files(&path, out);
        } else if path.is_file() {
            out.push(path);
        }
    }
}

fn relative_to(path: &Path, base: Option<&Path>) -> PathBuf {
    base.and_then(|b| path.strip_prefix(b).ok())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| path.to_path_buf())
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn error_marker(kind: &str, name: &str, err: impl std::fmt::Display) -> String {
    format!("[error] reading {} {}: {}\n", kind, name, err)
}

fn read_text_or_marker(path: &Path, kind: &str) -> String {
    read_text_lossy(path).unwrap_or_else(|e| error_marker(kind, &display_name(path), e))
}

/// Reason a reader gave up on a file; rendered into the
/// `[error] reading ...` marker.
#[derive(Debug, thiserror::Error)]
pub(crate) enum ReadError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Zip(#[from] zip::result::ZipError),
    #[error(transparent)]
    Xml(#[from] quick_xml::Error),
    #[error(transparent)]
    Pdf(#[from] lopdf::Error),
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
    #[error("missing part {0}")]
    MissingPart(String),
}

/// Read a file as UTF-8, dropping bytes that do not decode.
pub(crate) fn read_text_lossy(path: &Path) -> std::io::Result<String> {
    let bytes = std::fs::read(path)?;
    Ok(decode_lossy(&bytes))
}

pub(crate) fn decode_lossy(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => String::from_utf8_lossy(bytes).replace('\u{FFFD}', ""),
    }
}
