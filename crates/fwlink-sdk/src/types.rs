//! Core types for fwlink-sdk.
//!
//! This module defines the fundamental types shared by every tool:
//!
//! - [`FwError`] - Error type for file, template and manifest operations
//! - [`FrameworkSpec`] - Which prebuilt framework is being integrated
//! - [`ProjectLayout`] - Every path the tools read or write, derived from one root
//! - [`CheckReport`] / [`Finding`] - Human-readable outcome of a check

use std::fmt;
use std::path::{Path, PathBuf};

/// Name of the Flutter project manifest used to recognise a project root.
pub const PUBSPEC_FILE: &str = "pubspec.yaml";

/// Default name of the prebuilt framework.
pub const DEFAULT_FRAMEWORK: &str = "CastarSDK";

/// Default Xcode target (and main group) name of a Flutter iOS project.
pub const DEFAULT_TARGET: &str = "Runner";

/// Error types for fwlink-sdk operations.
///
/// Failures of external commands are not errors: they are reported through
/// [`crate::process::CommandOutput`]. Missing files that a check merely looks
/// for are reported through [`CheckReport`] findings. The variants below are
/// reserved for conditions that stop an operation.
///
/// # Example
///
/// ```ignore
/// use fwlink_sdk::{FwError, patcher};
///
/// match patcher::patch_project_file(&layout, &options) {
///     Ok(report) => println!("written: {}", report.written),
///     Err(FwError::PatternNotFound(section)) => {
///         eprintln!("project file has no {} section", section);
///     }
///     Err(e) => eprintln!("Other error: {}", e),
/// }
/// ```
#[derive(Debug, thiserror::Error)]
pub enum FwError {
    /// An I/O error occurred.
    #[error("I/O error: {0}. Check file paths and permissions")]
    Io(#[from] std::io::Error),

    /// JSON serialization failed while writing the debug report.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// An artifact the operation depends on does not exist.
    #[error("{what} not found: {}\n\n{hint}", path.display())]
    MissingArtifact {
        /// Short human name of the artifact (e.g. "Xcode project file").
        what: &'static str,
        /// Where it was expected.
        path: PathBuf,
        /// What to do about it.
        hint: &'static str,
    },

    /// A section of the Xcode project file could not be located.
    ///
    /// The file is left untouched when this is returned.
    #[error(
        "could not find {0} in the Xcode project file.\n\n\
         The project file layout differs from what Xcode normally writes.\n\
         Add the framework manually in Xcode or run `fwlink integrate` for a checklist."
    )]
    PatternNotFound(String),

    /// An embedded template failed to render.
    #[error("template error: {0}")]
    Template(String),

    /// A configuration value is invalid.
    #[error("configuration error: {0}. Check fwlink.toml or CLI flags")]
    Config(String),
}

impl FwError {
    pub(crate) fn missing(what: &'static str, path: &Path, hint: &'static str) -> Self {
        FwError::MissingArtifact {
            what,
            path: path.to_path_buf(),
            hint,
        }
    }
}

/// The prebuilt framework being integrated.
///
/// # Example
///
/// ```
/// use fwlink_sdk::FrameworkSpec;
///
/// let spec = FrameworkSpec::default();
/// assert_eq!(spec.bundle_name(), "CastarSDK.framework");
/// assert_eq!(spec.umbrella_header_name(), "CastarSDK.h");
/// assert_eq!(spec.short_name(), "Castar");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameworkSpec {
    /// Module name, also the binary and umbrella header stem (e.g. "CastarSDK").
    pub name: String,
    /// Header that declares the public class and must be reachable from the umbrella header.
    pub nested_header: String,
    /// Objective-C class that Swift code instantiates.
    pub swift_class: String,
}

impl Default for FrameworkSpec {
    fn default() -> Self {
        Self {
            name: DEFAULT_FRAMEWORK.to_string(),
            nested_header: "CSDK.h".to_string(),
            swift_class: "Castar".to_string(),
        }
    }
}

impl FrameworkSpec {
    /// Directory name of the bundle, e.g. `CastarSDK.framework`.
    pub fn bundle_name(&self) -> String {
        format!("{}.framework", self.name)
    }

    /// File name of the umbrella header, e.g. `CastarSDK.h`.
    pub fn umbrella_header_name(&self) -> String {
        format!("{}.h", self.name)
    }

    /// Vendor name without a trailing `SDK`, used to spot the vendor in crash logs.
    pub fn short_name(&self) -> &str {
        match self.name.strip_suffix("SDK") {
            Some(stem) if !stem.is_empty() => stem,
            _ => &self.name,
        }
    }
}

/// Every path the tools touch, derived from the Flutter project root.
///
/// Nothing in the SDK reads the process working directory; callers decide
/// the root once and pass the layout around.
#[derive(Debug, Clone)]
pub struct ProjectLayout {
    /// Flutter project root (the directory holding `pubspec.yaml`).
    pub root: PathBuf,
    /// Xcode target and main group name.
    pub target: String,
    /// Framework being integrated.
    pub framework: FrameworkSpec,
}

impl ProjectLayout {
    pub fn new(root: impl Into<PathBuf>, target: impl Into<String>, framework: FrameworkSpec) -> Self {
        Self {
            root: root.into(),
            target: target.into(),
            framework,
        }
    }

    /// Resolves the project root from a starting directory.
    ///
    /// The start directory is the root when it holds `pubspec.yaml`. When the
    /// start directory is the project's `ios/` folder, its parent is used so
    /// the tools behave the same from either location. Otherwise the start
    /// directory is taken as-is and later checks report what is missing.
    pub fn detect(start: &Path, target: impl Into<String>, framework: FrameworkSpec) -> Self {
        let resolved = start.canonicalize().unwrap_or_else(|_| start.to_path_buf());
        let root = if resolved.join(PUBSPEC_FILE).is_file() {
            resolved
        } else {
            match resolved.parent() {
                Some(parent)
                    if resolved.file_name().is_some_and(|name| name == "ios")
                        && parent.join(PUBSPEC_FILE).is_file() =>
                {
                    parent.to_path_buf()
                }
                _ => resolved,
            }
        };
        Self::new(root, target, framework)
    }

    pub fn pubspec(&self) -> PathBuf {
        self.root.join(PUBSPEC_FILE)
    }

    pub fn ios_dir(&self) -> PathBuf {
        self.root.join("ios")
    }

    /// Folder holding the app sources, e.g. `ios/Runner`.
    pub fn app_dir(&self) -> PathBuf {
        self.ios_dir().join(&self.target)
    }

    /// Candidate app delegate sources, Swift first.
    pub fn app_delegate_candidates(&self) -> [PathBuf; 2] {
        let dir = self.app_dir();
        [dir.join("AppDelegate.swift"), dir.join("AppDelegate.m")]
    }

    /// The first app delegate that exists, if any.
    pub fn app_delegate(&self) -> Option<PathBuf> {
        self.app_delegate_candidates()
            .into_iter()
            .find(|path| path.is_file())
    }

    pub fn info_plist(&self) -> PathBuf {
        self.app_dir().join("Info.plist")
    }

    pub fn frameworks_dir(&self) -> PathBuf {
        self.ios_dir().join("Frameworks")
    }

    pub fn framework_dir(&self) -> PathBuf {
        self.frameworks_dir().join(self.framework.bundle_name())
    }

    /// Framework directory relative to the project root, with `/` separators.
    pub fn framework_dir_display(&self) -> String {
        format!("ios/Frameworks/{}", self.framework.bundle_name())
    }

    /// Framework directory relative to the Xcode project (`SRCROOT`).
    pub fn framework_project_path(&self) -> String {
        format!("Frameworks/{}", self.framework.bundle_name())
    }

    pub fn headers_dir(&self) -> PathBuf {
        self.framework_dir().join("Headers")
    }

    pub fn modules_dir(&self) -> PathBuf {
        self.framework_dir().join("Modules")
    }

    pub fn module_map(&self) -> PathBuf {
        self.modules_dir().join("module.modulemap")
    }

    pub fn umbrella_header(&self) -> PathBuf {
        self.headers_dir().join(self.framework.umbrella_header_name())
    }

    pub fn nested_header(&self) -> PathBuf {
        self.headers_dir().join(&self.framework.nested_header)
    }

    pub fn framework_info_plist(&self) -> PathBuf {
        self.framework_dir().join("Info.plist")
    }

    pub fn framework_binary(&self) -> PathBuf {
        self.framework_dir().join(&self.framework.name)
    }

    pub fn xcodeproj(&self) -> PathBuf {
        self.ios_dir().join(format!("{}.xcodeproj", self.target))
    }

    pub fn pbxproj(&self) -> PathBuf {
        self.xcodeproj().join("project.pbxproj")
    }

    pub fn bridging_header(&self) -> PathBuf {
        self.app_dir()
            .join(format!("{}-Bridging-Header.h", self.target))
    }

    pub fn setup_script(&self) -> PathBuf {
        self.ios_dir().join("setup_framework.sh")
    }
}

/// Severity of a single finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Ok,
    Info,
    Warn,
    Fail,
}

/// One line of a check's outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    pub level: Level,
    pub message: String,
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Outcome of a check: a title, an overall verdict and the findings behind it.
///
/// `passed` is decided by each check. A `Fail` finding does not by itself
/// fail the check; the environment checks, for instance, record a missing
/// `Info.plist` as a failure finding while still passing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckReport {
    pub title: String,
    pub passed: bool,
    pub findings: Vec<Finding>,
}

impl CheckReport {
    /// Creates a passing report with no findings.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            passed: true,
            findings: Vec::new(),
        }
    }

    pub fn push(&mut self, level: Level, message: impl Into<String>) {
        self.findings.push(Finding {
            level,
            message: message.into(),
        });
    }

    pub fn ok(&mut self, message: impl Into<String>) {
        self.push(Level::Ok, message);
    }

    pub fn info(&mut self, message: impl Into<String>) {
        self.push(Level::Info, message);
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.push(Level::Warn, message);
    }

    pub fn fail(&mut self, message: impl Into<String>) {
        self.push(Level::Fail, message);
    }

    /// Records a failure finding and fails the whole check.
    pub fn abort(&mut self, message: impl Into<String>) {
        self.fail(message);
        self.passed = false;
    }

    /// Returns `true` if any finding has the given level.
    pub fn has(&self, level: Level) -> bool {
        self.findings.iter().any(|f| f.level == level)
    }

    /// Returns the messages of every finding with the given level.
    pub fn messages(&self, level: Level) -> Vec<&str> {
        self.findings
            .iter()
            .filter(|f| f.level == level)
            .map(|f| f.message.as_str())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn framework_spec_names() {
        let spec = FrameworkSpec::default();
        assert_eq!(spec.bundle_name(), "CastarSDK.framework");
        assert_eq!(spec.short_name(), "Castar");

        let plain = FrameworkSpec {
            name: "Vendor".into(),
            ..FrameworkSpec::default()
        };
        assert_eq!(plain.short_name(), "Vendor");

        let only_suffix = FrameworkSpec {
            name: "SDK".into(),
            ..FrameworkSpec::default()
        };
        assert_eq!(only_suffix.short_name(), "SDK");
    }

    #[test]
    fn layout_paths_follow_conventions() {
        let layout = ProjectLayout::new("/app", "Runner", FrameworkSpec::default());
        assert_eq!(
            layout.pbxproj(),
            PathBuf::from("/app/ios/Runner.xcodeproj/project.pbxproj")
        );
        assert_eq!(
            layout.module_map(),
            PathBuf::from("/app/ios/Frameworks/CastarSDK.framework/Modules/module.modulemap")
        );
        assert_eq!(
            layout.umbrella_header(),
            PathBuf::from("/app/ios/Frameworks/CastarSDK.framework/Headers/CastarSDK.h")
        );
        assert_eq!(
            layout.bridging_header(),
            PathBuf::from("/app/ios/Runner/Runner-Bridging-Header.h")
        );
        assert_eq!(layout.framework_project_path(), "Frameworks/CastarSDK.framework");
        assert_eq!(layout.framework_dir_display(), "ios/Frameworks/CastarSDK.framework");
    }

    #[test]
    fn detect_from_project_root_and_ios_dir() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join(PUBSPEC_FILE), "name: app\n").unwrap();
        std::fs::create_dir(temp.path().join("ios")).unwrap();
        let expected = temp.path().canonicalize().unwrap();

        let from_root = ProjectLayout::detect(temp.path(), "Runner", FrameworkSpec::default());
        assert_eq!(from_root.root, expected);

        let from_ios =
            ProjectLayout::detect(&temp.path().join("ios"), "Runner", FrameworkSpec::default());
        assert_eq!(from_ios.root, expected);
    }

    #[test]
    fn detect_without_pubspec_keeps_start() {
        let temp = TempDir::new().unwrap();
        let layout = ProjectLayout::detect(temp.path(), "Runner", FrameworkSpec::default());
        assert_eq!(layout.root, temp.path().canonicalize().unwrap());
    }

    #[test]
    fn check_report_verdicts() {
        let mut report = CheckReport::new("iOS setup");
        report.ok("found");
        report.fail("Info.plist not found");
        assert!(report.passed);
        assert!(report.has(Level::Fail));

        report.abort("iOS folder not found");
        assert!(!report.passed);
        assert_eq!(
            report.messages(Level::Fail),
            vec!["Info.plist not found", "iOS folder not found"]
        );
    }

    #[test]
    fn missing_artifact_message_is_actionable() {
        let err = FwError::missing(
            "Xcode project file",
            Path::new("/app/ios/Runner.xcodeproj/project.pbxproj"),
            "Run `flutter create .` to regenerate the iOS project.",
        );
        let msg = err.to_string();
        assert!(msg.contains("Xcode project file not found"));
        assert!(msg.contains("project.pbxproj"));
        assert!(msg.contains("flutter create"));
    }
}
