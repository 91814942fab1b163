//! Crash log scanning.
//!
//! Looks for `*Runner*.crash` reports in the usual macOS locations and pulls
//! the interesting lines out of the most recent ones.

use std::fs;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use log::debug;

use crate::types::ProjectLayout;

/// Number of most recent crash files summarised per directory.
pub const RECENT_LIMIT: usize = 3;

/// Number of leading lines searched in each crash file.
pub const HEAD_LINES: usize = 10;

/// Default glob; `{target}` is replaced with the Xcode target name.
pub const DEFAULT_PATTERN: &str = "*{target}*.crash";

/// What to scan and what to look for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrashScanOptions {
    pub dirs: Vec<PathBuf>,
    /// File name glob, already resolved (no `{target}`).
    pub pattern: String,
    /// Substrings that make a line worth showing.
    pub keywords: Vec<String>,
}

impl CrashScanOptions {
    /// Defaults for a project: macOS report directories, the target's crash
    /// files, and the framework's short name as an extra keyword.
    pub fn for_layout(layout: &ProjectLayout) -> Self {
        Self {
            dirs: default_crash_dirs(),
            pattern: DEFAULT_PATTERN.replace("{target}", &layout.target),
            keywords: vec![
                "Exception".to_string(),
                "Crash".to_string(),
                layout.framework.short_name().to_string(),
            ],
        }
    }
}

/// `~/Library/Logs/DiagnosticReports` and `~/Library/Developer/Xcode/DerivedData`.
///
/// Empty when `HOME` is not set.
pub fn default_crash_dirs() -> Vec<PathBuf> {
    match std::env::var_os("HOME") {
        Some(home) => {
            let library = PathBuf::from(home).join("Library");
            vec![
                library.join("Logs").join("DiagnosticReports"),
                library.join("Developer").join("Xcode").join("DerivedData"),
            ]
        }
        None => Vec::new(),
    }
}

/// Summary of one crash file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrashFileSummary {
    pub name: String,
    pub path: PathBuf,
    /// Matching lines among the first [`HEAD_LINES`], trimmed; `Err` holds the read error.
    pub highlights: Result<Vec<String>, String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CrashDirScan {
    Missing,
    NoCrashFiles,
    Found {
        total: usize,
        recent: Vec<CrashFileSummary>,
    },
}

/// Result for one scanned directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrashDirReport {
    pub dir: PathBuf,
    pub scan: CrashDirScan,
}

/// Scans every configured directory.
pub fn analyze(options: &CrashScanOptions) -> Vec<CrashDirReport> {
    options
        .dirs
        .iter()
        .map(|dir| CrashDirReport {
            dir: dir.clone(),
            scan: scan_dir(dir, &options.pattern, &options.keywords),
        })
        .collect()
}

/// Scans one directory for crash files matching `pattern`.
pub fn scan_dir(dir: &Path, pattern: &str, keywords: &[String]) -> CrashDirScan {
    if !dir.is_dir() {
        return CrashDirScan::Missing;
    }

    let full = Path::new(&glob::Pattern::escape(&dir.to_string_lossy())).join(pattern);
    let mut files: Vec<(SystemTime, PathBuf)> = match glob::glob(&full.to_string_lossy()) {
        Ok(paths) => paths
            .filter_map(Result::ok)
            .filter(|p| p.is_file())
            .map(|p| {
                let modified = fs::metadata(&p)
                    .and_then(|m| m.modified())
                    .unwrap_or(SystemTime::UNIX_EPOCH);
                (modified, p)
            })
            .collect(),
        Err(e) => {
            debug!("bad crash log pattern {}: {}", full.display(), e);
            Vec::new()
        }
    };
    debug!("{} crash file(s) in {}", files.len(), dir.display());

    if files.is_empty() {
        return CrashDirScan::NoCrashFiles;
    }

    let total = files.len();
    files.sort_by(|a, b| b.0.cmp(&a.0));
    let recent = files
        .into_iter()
        .take(RECENT_LIMIT)
        .map(|(_, path)| summarize(&path, keywords))
        .collect();
    CrashDirScan::Found { total, recent }
}

fn summarize(path: &Path, keywords: &[String]) -> CrashFileSummary {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    CrashFileSummary {
        name,
        path: path.to_path_buf(),
        highlights: highlights(path, keywords).map_err(|e| e.to_string()),
    }
}

fn highlights(path: &Path, keywords: &[String]) -> std::io::Result<Vec<String>> {
    let reader = BufReader::new(fs::File::open(path)?);
    let mut found = Vec::new();
    for line in reader.split(b'\n').take(HEAD_LINES) {
        let line = String::from_utf8_lossy(&line?).into_owned();
        if keywords.iter().any(|k| line.contains(k.as_str())) {
            found.push(line.trim().to_string());
        }
    }
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FrameworkSpec;
    use std::time::Duration;
    use tempfile::TempDir;

    fn keywords() -> Vec<String> {
        vec!["Exception".into(), "Crash".into(), "Castar".into()]
    }

    #[test]
    fn options_follow_layout() {
        let layout = ProjectLayout::new("/app", "Runner", FrameworkSpec::default());
        let options = CrashScanOptions::for_layout(&layout);
        assert_eq!(options.pattern, "*Runner*.crash");
        assert_eq!(options.keywords[2], "Castar");
    }

    #[test]
    fn missing_and_empty_dirs() {
        let temp = TempDir::new().unwrap();
        assert_eq!(
            scan_dir(&temp.path().join("nope"), "*Runner*.crash", &keywords()),
            CrashDirScan::Missing
        );
        fs::write(temp.path().join("Other.crash"), "Crash").unwrap();
        assert_eq!(
            scan_dir(temp.path(), "*Runner*.crash", &keywords()),
            CrashDirScan::NoCrashFiles
        );
    }

    #[test]
    fn summarises_most_recent_three() {
        let temp = TempDir::new().unwrap();
        let base = SystemTime::now() - Duration::from_secs(3600);
        for i in 0..5u64 {
            let path = temp.path().join(format!("Runner-{}.crash", i));
            let mut body = String::from("Process: Runner\n");
            body.push_str(&format!("Exception Type: EXC_CRASH {}\n", i));
            for _ in 0..10 {
                body.push_str("filler\n");
            }
            body.push_str("Castar frame beyond the head\n");
            fs::write(&path, body).unwrap();
            let file = fs::File::options().write(true).open(&path).unwrap();
            file.set_modified(base + Duration::from_secs(i * 60)).unwrap();
        }

        let CrashDirScan::Found { total, recent } =
            scan_dir(temp.path(), "*Runner*.crash", &keywords())
        else {
            panic!("expected crash files");
        };
        assert_eq!(total, 5);
        let names: Vec<&str> = recent.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Runner-4.crash", "Runner-3.crash", "Runner-2.crash"]);
        assert_eq!(
            recent[0].highlights.as_ref().unwrap(),
            &vec!["Exception Type: EXC_CRASH 4".to_string()]
        );
    }

    #[test]
    fn pattern_applies_only_to_file_names() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("Reports [*]");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("Runner-2024.crash"), "Exception Type: EXC_BAD_ACCESS\n").unwrap();

        let CrashDirScan::Found { total, recent } = scan_dir(&dir, "*Runner*.crash", &keywords())
        else {
            panic!("expected crash files");
        };
        assert_eq!(total, 1);
        assert_eq!(recent[0].name, "Runner-2024.crash");
    }

    #[test]
    fn analyze_reports_every_dir() {
        let temp = TempDir::new().unwrap();
        let options = CrashScanOptions {
            dirs: vec![temp.path().to_path_buf(), temp.path().join("missing")],
            pattern: "*Runner*.crash".into(),
            keywords: keywords(),
        };
        let reports = analyze(&options);
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].scan, CrashDirScan::NoCrashFiles);
        assert_eq!(reports[1].scan, CrashDirScan::Missing);
    }
}
