//! Environment doctor.
//!
//! Runs a fixed sequence of checks against a Flutter project (toolchain,
//! iOS project files, framework bundle, a debug simulator build, crash logs)
//! and writes a JSON debug report. Each check returns a [`CheckReport`];
//! external command failures are findings, never errors.

use std::fs;
use std::path::PathBuf;

use log::{debug, info};

use crate::crashlog::{self, CrashDirReport, CrashScanOptions};
use crate::headers::list_headers;
use crate::process::CommandRunner;
use crate::report::{BuildStatus, DebugReport};
use crate::types::{CheckReport, ProjectLayout};

/// Commands run by [`Doctor::build_and_test`], in order.
pub const BUILD_STEPS: [(&str, &str); 3] = [
    ("flutter clean", "Clean"),
    ("flutter pub get", "Pub get"),
    ("flutter build ios --debug --simulator", "Build"),
];

/// Options for [`Doctor::run_all`].
#[derive(Debug, Clone)]
pub struct DoctorOptions {
    /// Skip the clean/pub get/build sequence; the build is reported as not run.
    pub skip_build: bool,
    pub crash_logs: CrashScanOptions,
    /// Where to write the JSON report; `None` skips writing.
    pub report_path: Option<PathBuf>,
}

impl DoctorOptions {
    pub fn for_layout(layout: &ProjectLayout) -> Self {
        Self {
            skip_build: false,
            crash_logs: CrashScanOptions::for_layout(layout),
            report_path: Some(layout.root.join(crate::report::DEFAULT_REPORT_FILE)),
        }
    }
}

/// Outcome of the Flutter toolchain check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlutterCheck {
    pub check: CheckReport,
    /// First line of `flutter --version`, empty when it failed.
    pub version: String,
}

/// Progress notifications from [`Doctor::run_all`], emitted as each step finishes.
#[derive(Debug)]
pub enum DoctorEvent<'a> {
    Check(&'a CheckReport),
    BuildSkipped,
    CrashLogs(&'a [CrashDirReport]),
    ReportWritten(&'a PathBuf),
    ReportFailed { path: &'a PathBuf, error: &'a str },
}

/// Everything a complete doctor run found.
#[derive(Debug, Clone)]
pub struct DoctorSummary {
    pub flutter: CheckReport,
    pub ios: CheckReport,
    pub framework: CheckReport,
    /// `None` when the build was skipped.
    pub build: Option<CheckReport>,
    pub crash_logs: Vec<CrashDirReport>,
    pub report: DebugReport,
}

impl DoctorSummary {
    /// `true` when every executed check passed.
    pub fn passed(&self) -> bool {
        self.flutter.passed
            && self.ios.passed
            && self.framework.passed
            && self.build.as_ref().is_none_or(|b| b.passed)
    }

    pub fn recommendations(&self) -> &[String] {
        &self.report.recommendations
    }
}

#[derive(Debug, Clone)]
pub enum DoctorOutcome {
    /// `pubspec.yaml` is missing; nothing else ran.
    NotAFlutterProject(CheckReport),
    Completed(DoctorSummary),
}

impl DoctorOutcome {
    pub fn passed(&self) -> bool {
        match self {
            DoctorOutcome::NotAFlutterProject(_) => false,
            DoctorOutcome::Completed(summary) => summary.passed(),
        }
    }
}

/// Follow-up advice derived from the check verdicts.
pub fn recommendations(
    flutter_ok: bool,
    ios_ok: bool,
    framework_ok: bool,
    build_ok: Option<bool>,
    framework_name: &str,
) -> Vec<String> {
    let mut out = Vec::new();
    if !flutter_ok {
        out.push("Install or fix Flutter environment".to_string());
    }
    if !ios_ok {
        out.push("Check iOS project setup".to_string());
    }
    if !framework_ok {
        out.push(format!("Download and integrate {} framework", framework_name));
    }
    if build_ok == Some(false) {
        out.push("Fix build errors before testing".to_string());
    }
    if out.is_empty() {
        out.push("All checks passed! App should work correctly.".to_string());
        out.push("If app still crashes, check device logs for specific errors.".to_string());
    }
    out
}

pub struct Doctor<'a, R: CommandRunner> {
    layout: &'a ProjectLayout,
    runner: &'a R,
}

impl<'a, R: CommandRunner> Doctor<'a, R> {
    pub fn new(layout: &'a ProjectLayout, runner: &'a R) -> Self {
        Self { layout, runner }
    }

    /// Fails when `pubspec.yaml` is missing. Otherwise reports the app name
    /// and warns when no Flutter SDK dependency is declared.
    pub fn check_project_root(&self) -> CheckReport {
        let mut check = CheckReport::new("Project root");
        let pubspec = self.layout.pubspec();
        if !pubspec.is_file() {
            check.abort(format!(
                "pubspec.yaml not found in {}. Run from the Flutter project root or pass --project-root.",
                self.layout.root.display()
            ));
            return check;
        }

        let text = match fs::read_to_string(&pubspec) {
            Ok(text) => text,
            Err(e) => {
                check.warn(format!("Could not read pubspec.yaml: {}", e));
                return check;
            }
        };
        match serde_yaml::from_str::<serde_yaml::Value>(&text) {
            Ok(doc) => {
                match doc["name"].as_str() {
                    Some(name) => check.ok(format!("Flutter project: {}", name)),
                    None => check.warn("pubspec.yaml has no name"),
                }
                if doc["dependencies"]["flutter"].is_null() {
                    check.warn("pubspec.yaml does not declare the flutter SDK dependency");
                }
            }
            Err(e) => check.warn(format!("pubspec.yaml is not valid YAML: {}", e)),
        }
        check
    }

    /// `flutter --version` must succeed; `flutter doctor -v` only informs.
    pub fn check_flutter_environment(&self) -> FlutterCheck {
        let mut check = CheckReport::new("Flutter environment");
        let cwd = Some(self.layout.root.as_path());

        let version = self.runner.run("flutter --version", cwd);
        if !version.success() {
            check.abort(format!("Flutter not found or error: {}", version.stderr.trim()));
            return FlutterCheck {
                check,
                version: String::new(),
            };
        }
        let first_line = version.first_line().to_string();
        check.ok("Flutter is available");
        check.info(first_line.clone());

        let doctor = self.runner.run("flutter doctor -v", cwd);
        if doctor.success() {
            check.ok("Flutter doctor completed");
            if doctor.stdout.contains("iOS toolchain") && doctor.stdout.contains('✓') {
                check.ok("iOS toolchain is properly configured");
            } else {
                check.warn("iOS toolchain may have issues");
            }
        } else {
            check.fail(format!("Flutter doctor failed: {}", doctor.stderr.trim()));
        }

        FlutterCheck {
            check,
            version: first_line,
        }
    }

    /// Fails only when the `ios` folder is missing.
    pub fn check_ios_setup(&self) -> CheckReport {
        let mut check = CheckReport::new("iOS setup");
        if !self.layout.ios_dir().is_dir() {
            check.abort("iOS folder not found");
            return check;
        }

        let framework = &self.layout.framework.name;
        match self.layout.app_delegate() {
            Some(path) => {
                let file_name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                check.ok(format!("{} found", file_name));
                let import = if file_name.ends_with(".swift") {
                    format!("import {}", framework)
                } else {
                    format!("#import <{}/", framework)
                };
                match fs::read_to_string(&path) {
                    Ok(content) if content.contains(&import) => {
                        check.ok(format!("{} import found", framework))
                    }
                    Ok(_) => check.fail(format!("{} import not found", framework)),
                    Err(e) => check.fail(format!("Error reading AppDelegate: {}", e)),
                }
            }
            None => check.fail("AppDelegate.swift not found"),
        }

        let plist = self.layout.info_plist();
        if plist.is_file() {
            check.ok("Info.plist found");
            match fs::read_to_string(&plist) {
                Ok(content) if content.contains("UIBackgroundModes") => {
                    check.ok("Background modes configured")
                }
                Ok(_) => check.fail("Background modes not configured"),
                Err(e) => check.fail(format!("Error reading Info.plist: {}", e)),
            }
        } else {
            check.fail("Info.plist not found");
        }

        check
    }

    /// Reports the framework bundle and its headers. Never fails the run.
    pub fn check_framework(&self) -> CheckReport {
        let fw = &self.layout.framework;
        let mut check = CheckReport::new(format!("{} setup", fw.name));
        if !self.layout.framework_dir().is_dir() {
            check.fail(format!("{} not found", fw.bundle_name()));
            check.info("Run the download script first");
            return check;
        }
        check.ok(format!("{} found", fw.bundle_name()));

        let headers_dir = self.layout.headers_dir();
        if !headers_dir.is_dir() {
            check.fail("Framework headers not found");
            return check;
        }
        check.ok("Framework headers found");

        let headers = list_headers(&headers_dir);
        if headers.is_empty() {
            check.fail("No header files found");
        } else {
            check.ok(format!("Found {} header files", headers.len()));
            for header in headers {
                if let Some(name) = header.file_name() {
                    check.info(format!("- {}", name.to_string_lossy()));
                }
            }
        }
        check
    }

    /// Cleans, fetches packages and builds for the simulator; stops at the first failure.
    pub fn build_and_test(&self) -> CheckReport {
        let mut check = CheckReport::new("Build test");
        let cwd = Some(self.layout.root.as_path());

        for (command, label) in BUILD_STEPS {
            info!("running {}", command);
            let output = self.runner.run(command, cwd);
            if output.success() {
                continue;
            }
            if label == "Build" {
                check.abort("Build failed");
                check.info(format!("STDOUT: {}", output.stdout.trim_end()));
                check.info(format!("STDERR: {}", output.stderr.trim_end()));
            } else {
                check.abort(format!("{} failed: {}", label, output.stderr.trim()));
            }
            return check;
        }

        check.ok("Build successful");
        check
    }

    /// Runs every check in order, reporting each through `on_event`.
    pub fn run_all(
        &self,
        options: &DoctorOptions,
        mut on_event: impl FnMut(DoctorEvent<'_>),
    ) -> DoctorOutcome {
        let project = self.check_project_root();
        on_event(DoctorEvent::Check(&project));
        if !project.passed {
            return DoctorOutcome::NotAFlutterProject(project);
        }

        let flutter = self.check_flutter_environment();
        on_event(DoctorEvent::Check(&flutter.check));
        let ios = self.check_ios_setup();
        on_event(DoctorEvent::Check(&ios));
        let framework = self.check_framework();
        on_event(DoctorEvent::Check(&framework));

        let build = if options.skip_build {
            on_event(DoctorEvent::BuildSkipped);
            None
        } else {
            let build = self.build_and_test();
            on_event(DoctorEvent::Check(&build));
            Some(build)
        };

        let crash_logs = crashlog::analyze(&options.crash_logs);
        on_event(DoctorEvent::CrashLogs(&crash_logs));

        let mut report = DebugReport::collect(self.layout, flutter.version);
        report.build_status = match &build {
            None => BuildStatus::NotRun,
            Some(b) if b.passed => BuildStatus::Success,
            Some(_) => BuildStatus::Failed,
        };
        report.recommendations = recommendations(
            flutter.check.passed,
            ios.passed,
            framework.passed,
            build.as_ref().map(|b| b.passed),
            &self.layout.framework.name,
        );

        if let Some(path) = &options.report_path {
            match report.write(path) {
                Ok(()) => {
                    debug!("wrote {}", path.display());
                    on_event(DoctorEvent::ReportWritten(path));
                }
                Err(e) => {
                    let error = e.to_string();
                    on_event(DoctorEvent::ReportFailed {
                        path,
                        error: &error,
                    });
                }
            }
        }

        DoctorOutcome::Completed(DoctorSummary {
            flutter: flutter.check,
            ios,
            framework,
            build,
            crash_logs,
            report,
        })
    }
}
