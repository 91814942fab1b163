//! Header inspection.
//!
//! Lists a framework's public headers and picks out lines that look like
//! Objective-C declarations. The heuristics are line-based substring checks,
//! good enough to answer "what does this SDK expose" without a C parser.

use std::fs;
use std::path::{Path, PathBuf};

use log::debug;

/// Keywords that mark a line as a candidate method declaration.
const METHOD_KEYWORDS: [&str; 6] = ["+", "-", "void", "int", "NSString", "BOOL"];

/// Number of characters shown in a dump preview.
pub const PREVIEW_CHARS: usize = 500;

/// Number of method lines shown in a dump before summarising the rest.
pub const METHOD_DISPLAY_LIMIT: usize = 10;

/// How declarations are collected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScanMode {
    /// Method lines only; comment lines are kept.
    #[default]
    Inspect,
    /// Interfaces, classes, methods and imports; `//` comment lines are not
    /// counted as methods. Adds size and a preview.
    Dump,
}

/// A trimmed source line and its 1-based line number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclarationLine {
    pub number: usize,
    pub text: String,
}

impl std::fmt::Display for DeclarationLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Line {}: {}", self.number, self.text)
    }
}

/// Declarations found in one header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderScan {
    pub interfaces: Vec<DeclarationLine>,
    pub classes: Vec<DeclarationLine>,
    pub methods: Vec<DeclarationLine>,
    pub imports: Vec<DeclarationLine>,
}

fn is_method(line: &str) -> bool {
    METHOD_KEYWORDS.iter().any(|k| line.contains(k)) && line.contains('(') && line.contains(')')
}

/// Scans header text line by line.
///
/// In [`ScanMode::Inspect`] only `methods` is filled.
pub fn scan_declarations(content: &str, mode: ScanMode) -> HeaderScan {
    let mut scan = HeaderScan::default();

    for (idx, raw) in content.split('\n').enumerate() {
        let line = raw.trim();
        let decl = || DeclarationLine {
            number: idx + 1,
            text: line.to_string(),
        };

        if mode == ScanMode::Dump {
            if line.contains("@interface") {
                scan.interfaces.push(decl());
            } else if line.contains("@class")
                || (line.contains("class") && line.contains('(') && line.contains(')'))
            {
                scan.classes.push(decl());
            }
            if line.starts_with("#import") || line.starts_with("#include") {
                scan.imports.push(decl());
            }
        }

        if is_method(line) && (mode == ScanMode::Inspect || !line.starts_with("//")) {
            scan.methods.push(decl());
        }
    }

    scan
}

/// Details only reported in [`ScanMode::Dump`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderDetails {
    /// Size in characters.
    pub size: usize,
    /// The first [`PREVIEW_CHARS`] characters.
    pub preview: String,
}

/// Outcome of reading and scanning one header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderReport {
    pub name: String,
    pub path: PathBuf,
    /// `Err` holds the read error text; other headers are still scanned.
    pub scan: Result<HeaderScan, String>,
    pub details: Option<HeaderDetails>,
}

impl HeaderReport {
    pub fn read(path: &Path, mode: ScanMode) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        match fs::read_to_string(path) {
            Ok(content) => {
                debug!("scanning {} ({} bytes)", path.display(), content.len());
                let details = (mode == ScanMode::Dump).then(|| HeaderDetails {
                    size: content.chars().count(),
                    preview: content.chars().take(PREVIEW_CHARS).collect(),
                });
                Self {
                    name,
                    path: path.to_path_buf(),
                    scan: Ok(scan_declarations(&content, mode)),
                    details,
                }
            }
            Err(e) => Self {
                name,
                path: path.to_path_buf(),
                scan: Err(e.to_string()),
                details: None,
            },
        }
    }
}

/// Headers of a framework, or the fact that there is no `Headers` directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderInventory {
    Missing(PathBuf),
    Found(Vec<HeaderReport>),
}

impl HeaderInventory {
    /// Scans every `*.h` file in `headers_dir`, sorted by file name.
    pub fn scan(headers_dir: &Path, mode: ScanMode) -> Self {
        if !headers_dir.is_dir() {
            return HeaderInventory::Missing(headers_dir.to_path_buf());
        }
        let reports = list_headers(headers_dir)
            .iter()
            .map(|path| HeaderReport::read(path, mode))
            .collect();
        HeaderInventory::Found(reports)
    }
}

/// Paths of the `*.h` files directly inside `dir`, sorted by file name.
pub fn list_headers(dir: &Path) -> Vec<PathBuf> {
    let pattern = Path::new(&glob::Pattern::escape(&dir.to_string_lossy())).join("*.h");
    let mut headers: Vec<PathBuf> = match glob::glob(&pattern.to_string_lossy()) {
        Ok(paths) => paths.filter_map(Result::ok).filter(|p| p.is_file()).collect(),
        Err(e) => {
            debug!("bad header pattern {}: {}", pattern.display(), e);
            Vec::new()
        }
    };
    headers.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    headers
}
