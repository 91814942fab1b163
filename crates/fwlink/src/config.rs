//! Configuration file support for fwlink.
//!
//! This module provides support for `fwlink.toml` configuration files that
//! record which framework a project integrates and where it lives, so the
//! subcommands do not need the same flags on every run.
//!
//! ## Configuration File Location
//!
//! Unless `--config` names a file, the configuration is searched for in:
//! 1. Current working directory (`./fwlink.toml`)
//! 2. Parent directories (up to the repository root or filesystem root)
//!
//! ## Example Configuration
//!
//! ```toml
//! [project]
//! root = "."
//! target = "Runner"
//!
//! [framework]
//! name = "CastarSDK"
//! nested_header = "CSDK.h"
//! swift_class = "Castar"
//! search_path = "$(SRCROOT)/Frameworks"
//!
//! [doctor]
//! timeout_secs = 60
//! report = "debug_report.json"
//! crash_dirs = []
//! crash_pattern = "*{target}*.crash"
//! ```

use anyhow::{Context, Result};
use fwlink_sdk::crashlog::DEFAULT_PATTERN;
use fwlink_sdk::patcher::DEFAULT_SEARCH_PATH;
use fwlink_sdk::report::DEFAULT_REPORT_FILE;
use fwlink_sdk::{DEFAULT_TARGET, FrameworkSpec};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The default configuration file name.
pub const CONFIG_FILE_NAME: &str = "fwlink.toml";

/// Root configuration structure for `fwlink.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FwlinkConfig {
    /// Project location.
    pub project: ProjectConfig,

    /// The framework being integrated.
    pub framework: FrameworkConfig,

    /// Doctor settings.
    pub doctor: DoctorConfig,
}

/// Project location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    /// Flutter project root, relative to the config file.
    ///
    /// If not specified, `--project-root` (default `.`) is used.
    pub root: Option<PathBuf>,

    /// Xcode target and main group name.
    ///
    /// Defaults to "Runner".
    pub target: String,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            root: None,
            target: DEFAULT_TARGET.to_string(),
        }
    }
}

/// The prebuilt framework.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameworkConfig {
    /// Framework module name. Defaults to "CastarSDK".
    pub name: String,

    /// Header declaring the public class. Defaults to "CSDK.h".
    pub nested_header: String,

    /// Objective-C class used from Swift. Defaults to "Castar".
    pub swift_class: String,

    /// Framework search path added to the target's build configurations.
    pub search_path: String,
}

impl Default for FrameworkConfig {
    fn default() -> Self {
        let spec = FrameworkSpec::default();
        Self {
            name: spec.name,
            nested_header: spec.nested_header,
            swift_class: spec.swift_class,
            search_path: DEFAULT_SEARCH_PATH.to_string(),
        }
    }
}

impl FrameworkConfig {
    pub fn spec(&self) -> FrameworkSpec {
        FrameworkSpec {
            name: self.name.clone(),
            nested_header: self.nested_header.clone(),
            swift_class: self.swift_class.clone(),
        }
    }
}

/// Doctor settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DoctorConfig {
    /// Bound on each external command, in seconds. Defaults to 60.
    pub timeout_secs: u64,

    /// Report path, relative to the project root. Defaults to "debug_report.json".
    pub report: PathBuf,

    /// Directories searched for crash logs. Empty means the macOS defaults.
    pub crash_dirs: Vec<PathBuf>,

    /// Crash file glob; `{target}` is replaced with the target name.
    pub crash_pattern: String,
}

impl Default for DoctorConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 60,
            report: PathBuf::from(DEFAULT_REPORT_FILE),
            crash_dirs: Vec::new(),
            crash_pattern: DEFAULT_PATTERN.to_string(),
        }
    }
}

impl FwlinkConfig {
    /// Loads configuration from the specified file path.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let config: FwlinkConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        Ok(config)
    }

    /// Attempts to find and load configuration from the current directory
    /// or any parent directory.
    ///
    /// # Returns
    ///
    /// * `Ok(Some((config, path)))` - Found and loaded configuration with its path
    /// * `Ok(None)` - No configuration file found
    /// * `Err` - If a config file was found but couldn't be parsed
    pub fn discover() -> Result<Option<(Self, PathBuf)>> {
        let cwd = std::env::current_dir().context("Failed to get current directory")?;
        Self::discover_from(&cwd)
    }

    /// Attempts to find and load configuration starting from the specified directory.
    pub fn discover_from(start_dir: &Path) -> Result<Option<(Self, PathBuf)>> {
        let mut current = start_dir.to_path_buf();

        loop {
            let config_path = current.join(CONFIG_FILE_NAME);

            if config_path.is_file() {
                let config = Self::load_from_file(&config_path)?;
                return Ok(Some((config, config_path)));
            }

            // Stop at repository root or filesystem root
            if current.join(".git").exists() || !current.pop() {
                break;
            }
        }

        Ok(None)
    }

    /// Generates a starter configuration file as a formatted TOML string.
    ///
    /// This includes comments explaining each option.
    pub fn generate_starter_toml(framework: &str, target: &str) -> String {
        let spec = FrameworkSpec::default();
        format!(
            r#"# fwlink configuration file
# Describes the Flutter project and the prebuilt framework it integrates.
# CLI flags override these settings when provided.

[project]
# Flutter project root, relative to this file
root = "."

# Xcode target and main group name
target = "{target}"

[framework]
# Framework module name; the bundle is ios/Frameworks/<name>.framework
name = "{framework}"

# Header that declares the public class, imported from the umbrella header
nested_header = "{nested_header}"

# Objective-C class that Swift code uses
swift_class = "{swift_class}"

# Added to FRAMEWORK_SEARCH_PATHS by `fwlink patch-project`
search_path = "{search_path}"

[doctor]
# Timeout for each external command, in seconds
timeout_secs = 60

# Debug report path, relative to the project root
report = "{report}"

# Crash log directories (default: ~/Library/Logs/DiagnosticReports and Xcode DerivedData)
crash_dirs = []

# Crash file pattern; {{target}} is replaced with the target name
crash_pattern = "{crash_pattern}"
"#,
            target = target,
            framework = framework,
            nested_header = spec.nested_header,
            swift_class = spec.swift_class,
            search_path = DEFAULT_SEARCH_PATH,
            report = DEFAULT_REPORT_FILE,
            crash_pattern = DEFAULT_PATTERN,
        )
    }
}

/// Configuration resolver that merges config file values with CLI arguments.
///
/// CLI arguments always take precedence over config file values.
#[derive(Debug, Default)]
pub struct ConfigResolver {
    /// Loaded configuration, if any.
    pub config: Option<FwlinkConfig>,

    /// Path to the loaded config file, if any.
    pub config_path: Option<PathBuf>,
}

impl ConfigResolver {
    /// Loads `explicit` if given, otherwise discovers `fwlink.toml`.
    pub fn new(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            let config = FwlinkConfig::load_from_file(path)?;
            return Ok(Self {
                config: Some(config),
                config_path: Some(path.to_path_buf()),
            });
        }
        match FwlinkConfig::discover()? {
            Some((config, path)) => Ok(Self {
                config: Some(config),
                config_path: Some(path),
            }),
            None => Ok(Self {
                config: None,
                config_path: None,
            }),
        }
    }

    /// The loaded configuration, or defaults.
    pub fn effective(&self) -> FwlinkConfig {
        self.config.clone().unwrap_or_default()
    }

    /// Returns the project root from config, resolved against the config file's directory.
    pub fn project_root(&self) -> Option<PathBuf> {
        let root = self.config.as_ref()?.project.root.as_ref()?;
        let base = self
            .config_path
            .as_deref()
            .and_then(Path::parent)
            .unwrap_or_else(|| Path::new(""));
        Some(base.join(root))
    }

    /// Resolves a CLI value, using config as fallback.
    ///
    /// # Returns
    ///
    /// The resolved value, preferring CLI over config over default.
    pub fn resolve<T, F>(&self, cli_value: Option<T>, config_getter: F, default: T) -> T
    where
        F: FnOnce(&FwlinkConfig) -> Option<T>,
    {
        cli_value
            .or_else(|| self.config.as_ref().and_then(config_getter))
            .unwrap_or(default)
    }
}
