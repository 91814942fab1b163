//! The doctor's JSON debug report.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use time::macros::format_description;

use crate::types::{FwError, ProjectLayout};

/// Default report file name, written at the project root.
pub const DEFAULT_REPORT_FILE: &str = "debug_report.json";

/// Presence of the iOS project's key files.
///
/// When the `ios` folder is missing only `folder_exists` is serialized.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IosSetup {
    pub folder_exists: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_delegate_exists: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info_plist_exists: Option<bool>,
}

impl IosSetup {
    pub fn detect(layout: &ProjectLayout) -> Self {
        if !layout.ios_dir().is_dir() {
            return Self::default();
        }
        Self {
            folder_exists: true,
            app_delegate_exists: Some(layout.app_delegate().is_some()),
            info_plist_exists: Some(layout.info_plist().is_file()),
        }
    }
}

/// Presence of the framework bundle. `headers_exist` is omitted when the
/// framework itself is missing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameworkStatus {
    pub framework_exists: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers_exist: Option<bool>,
}

impl FrameworkStatus {
    pub fn detect(layout: &ProjectLayout) -> Self {
        if !layout.framework_dir().is_dir() {
            return Self::default();
        }
        Self {
            framework_exists: true,
            headers_exist: Some(layout.headers_dir().is_dir()),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildStatus {
    #[default]
    NotRun,
    Success,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebugReport {
    /// Local time (UTC if the offset is unknown), `YYYY-MM-DD HH:MM:SS`.
    pub timestamp: String,
    /// First line of `flutter --version`, empty when Flutter is unavailable.
    pub flutter_version: String,
    pub ios_setup: IosSetup,
    #[serde(rename = "castar_sdk")]
    pub framework: FrameworkStatus,
    pub build_status: BuildStatus,
    pub recommendations: Vec<String>,
}

impl DebugReport {
    /// Inspects the filesystem; the caller fills in build status and recommendations.
    pub fn collect(layout: &ProjectLayout, flutter_version: impl Into<String>) -> Self {
        Self {
            timestamp: timestamp_now(),
            flutter_version: flutter_version.into(),
            ios_setup: IosSetup::detect(layout),
            framework: FrameworkStatus::detect(layout),
            build_status: BuildStatus::NotRun,
            recommendations: Vec::new(),
        }
    }

    /// Writes the report as pretty-printed JSON.
    pub fn write(&self, path: &Path) -> Result<(), FwError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}

/// Current time as `YYYY-MM-DD HH:MM:SS`.
pub fn timestamp_now() -> String {
    let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
    format_timestamp(now)
}

fn format_timestamp(at: OffsetDateTime) -> String {
    let format = format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
    at.format(format)
        .unwrap_or_else(|_| at.unix_timestamp().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FrameworkSpec;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn timestamp_format() {
        let at = OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap();
        assert_eq!(format_timestamp(at), "2023-11-14 22:13:20");
        assert_eq!(timestamp_now().len(), 19);
    }

    #[test]
    fn sparse_objects_for_missing_folders() {
        let temp = TempDir::new().unwrap();
        let layout = ProjectLayout::new(temp.path(), "Runner", FrameworkSpec::default());
        let mut report = DebugReport::collect(&layout, "");
        report.timestamp = "2024-01-01 00:00:00".into();

        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(
            value,
            json!({
                "timestamp": "2024-01-01 00:00:00",
                "flutter_version": "",
                "ios_setup": {"folder_exists": false},
                "castar_sdk": {"framework_exists": false},
                "build_status": "not_run",
                "recommendations": []
            })
        );
    }

    #[test]
    fn full_objects_when_present() {
        let temp = TempDir::new().unwrap();
        let layout = ProjectLayout::new(temp.path(), "Runner", FrameworkSpec::default());
        fs::create_dir_all(layout.app_dir()).unwrap();
        fs::write(layout.info_plist(), "<plist/>").unwrap();
        fs::create_dir_all(layout.framework_dir()).unwrap();

        let mut report = DebugReport::collect(&layout, "Flutter 3.22.0");
        report.build_status = BuildStatus::Failed;
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(
            value["ios_setup"],
            json!({"folder_exists": true, "app_delegate_exists": false, "info_plist_exists": true})
        );
        assert_eq!(
            value["castar_sdk"],
            json!({"framework_exists": true, "headers_exist": false})
        );
        assert_eq!(value["build_status"], "failed");

        let path = temp.path().join(DEFAULT_REPORT_FILE);
        report.write(&path).unwrap();
        let parsed: DebugReport = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(parsed, report);
    }
}
