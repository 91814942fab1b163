//! # fwlink
//!
//! Command-line tool that diagnoses and patches a Flutter project's iOS build
//! so a prebuilt binary framework links and imports correctly.
//!
//! ## Overview
//!
//! `fwlink` is the CLI for `fwlink-sdk`. Every subcommand is an independent
//! tool working on the same project layout:
//!
//! | Command | Description |
//! |---------|-------------|
//! | `doctor` | Check toolchain, iOS project, framework, build and crash logs; write a JSON report |
//! | `patch-project` | Add the framework to `ios/Runner.xcodeproj/project.pbxproj` |
//! | `inspect-headers` | List the framework's headers and the declarations they expose |
//! | `fix-module` | Repair the umbrella header and module map for Swift, add a bridging header |
//! | `integrate` | Print the manual Xcode checklist or write `ios/setup_framework.sh` |
//! | `crash-logs` | Summarise recent crash reports for the app |
//! | `init` | Write a starter `fwlink.toml` |
//!
//! ## Quick Start
//!
//! ```bash
//! # From the Flutter project root (or its ios/ folder)
//! fwlink doctor --skip-build
//! fwlink patch-project
//! fwlink fix-module
//! ```
//!
//! ## CLI Flags
//!
//! Global flags available on all commands:
//!
//! - **`--project-root`** - Flutter project root (default: current directory)
//! - **`--config`** - Explicit `fwlink.toml` (default: discovered upward)
//! - **`--dry-run`** - Report what would change without writing files
//! - **`--verbose` / `-v`** - Show diagnostic logging (or set `FWLINK_LOG`)
//!
//! ## Modules
//!
//! - [`config`] - Configuration file support for `fwlink.toml`

#![cfg_attr(docsrs, feature(doc_cfg))]

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use console::style;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use fwlink_sdk::crashlog::{self, CrashDirReport, CrashDirScan, CrashScanOptions};
use fwlink_sdk::fixer::{self, FixOptions};
use fwlink_sdk::headers::{HeaderInventory, HeaderReport, METHOD_DISPLAY_LIMIT, ScanMode};
use fwlink_sdk::integrate::{self, IntegrationOutcome};
use fwlink_sdk::patcher::{self, PatchOptions, ReferenceOutcome, SearchPath, SearchPathOutcome};
use fwlink_sdk::{
    CheckReport, Doctor, DoctorEvent, DoctorOptions, DoctorOutcome, Level, ProjectLayout,
    ShellRunner,
};

use config::{ConfigResolver, FwlinkConfig};

pub mod config;
mod logging;

/// Diagnose and patch a Flutter iOS project for a prebuilt binary framework.
#[derive(Parser, Debug)]
#[command(name = "fwlink", author, version, about = "Flutter iOS framework integration toolkit", long_about = None)]
struct Cli {
    #[command(flatten)]
    globals: GlobalArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct GlobalArgs {
    /// Flutter project root (or its ios/ folder)
    #[arg(long, global = true)]
    project_root: Option<PathBuf>,

    /// Path to fwlink.toml (default: search upward from the current directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Xcode target and main group name
    #[arg(long, global = true)]
    target: Option<String>,

    /// Framework module name
    #[arg(long, global = true)]
    framework: Option<String>,

    /// Print what would be done without actually doing it
    #[arg(long, global = true)]
    dry_run: bool,

    /// Print verbose output including all commands
    #[arg(long, short = 'v', global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check the Flutter environment, iOS project, framework and build; write a debug report.
    Doctor {
        #[arg(long, help = "Skip flutter clean / pub get / build")]
        skip_build: bool,
        #[arg(long, help = "Report path (default: debug_report.json in the project root)")]
        report: Option<PathBuf>,
        #[arg(long, help = "Timeout for each external command, in seconds")]
        timeout_secs: Option<u64>,
    },
    /// Add the framework to the Xcode project file.
    PatchProject {
        #[arg(long, help = "Leave FRAMEWORK_SEARCH_PATHS untouched")]
        no_search_path: bool,
        #[arg(long, help = "Framework search path to add (default: $(SRCROOT)/Frameworks)")]
        search_path: Option<String>,
    },
    /// List the framework's headers and the declarations they expose.
    InspectHeaders {
        #[arg(long, help = "Show interfaces, classes, imports and a preview of each header")]
        dump: bool,
        #[arg(long, help = "Headers directory (default: the framework's Headers/)")]
        headers_dir: Option<PathBuf>,
    },
    /// Repair the umbrella header and module map for Swift.
    FixModule {
        #[arg(long, help = "Do not create <Target>-Bridging-Header.h")]
        no_bridging_header: bool,
    },
    /// Print the manual Xcode checklist or write ios/setup_framework.sh.
    Integrate,
    /// Summarise recent crash reports for the app.
    CrashLogs {
        #[arg(long = "dir", help = "Directory to scan (repeatable)")]
        dirs: Vec<PathBuf>,
    },
    /// Write a starter fwlink.toml.
    Init {
        #[arg(long, default_value = "fwlink.toml")]
        output: PathBuf,
    },
}

/// Parses the command line and runs the subcommand.
///
/// Returns `Ok(false)` when the subcommand ran but reported failure.
pub fn run() -> Result<bool> {
    let Cli { globals, command } = Cli::parse();
    logging::init(globals.verbose);

    if let Command::Init { output } = command {
        return cmd_init(&output, &globals);
    }

    let resolver = ConfigResolver::new(globals.config.as_deref())?;
    if let Some(path) = &resolver.config_path {
        log::debug!("using config {}", path.display());
    }
    let config = resolver.effective();
    let layout = resolve_layout(&globals, &resolver, &config);
    log::info!("project root: {}", layout.root.display());
    let dry_run = globals.dry_run;

    match command {
        Command::Doctor {
            skip_build,
            report,
            timeout_secs,
        } => {
            let timeout = resolver.resolve(timeout_secs, |c| Some(c.doctor.timeout_secs), 60);
            let report = report.unwrap_or_else(|| config.doctor.report.clone());
            cmd_doctor(&layout, &config, skip_build, &report, timeout, dry_run)
        }
        Command::PatchProject {
            no_search_path,
            search_path,
        } => {
            let search_path = if no_search_path {
                None
            } else {
                Some(SearchPath(
                    search_path.unwrap_or_else(|| config.framework.search_path.clone()),
                ))
            };
            cmd_patch_project(&layout, search_path, dry_run)
        }
        Command::InspectHeaders { dump, headers_dir } => {
            let mode = if dump { ScanMode::Dump } else { ScanMode::Inspect };
            let dir = headers_dir.unwrap_or_else(|| layout.headers_dir());
            cmd_inspect_headers(&layout, &dir, mode)
        }
        Command::FixModule { no_bridging_header } => {
            cmd_fix_module(&layout, !no_bridging_header, dry_run)
        }
        Command::Integrate => cmd_integrate(&layout, dry_run),
        Command::CrashLogs { dirs } => {
            let mut options = crash_options(&layout, &config);
            if !dirs.is_empty() {
                options.dirs = dirs;
            }
            print_crash_logs(&crashlog::analyze(&options));
            Ok(true)
        }
        Command::Init { output } => cmd_init(&output, &globals),
    }
}

fn resolve_layout(cli: &GlobalArgs, resolver: &ConfigResolver, config: &FwlinkConfig) -> ProjectLayout {
    let start = cli
        .project_root
        .clone()
        .or_else(|| resolver.project_root())
        .unwrap_or_else(|| PathBuf::from("."));
    let target = cli
        .target
        .clone()
        .unwrap_or_else(|| config.project.target.clone());
    let mut framework = config.framework.spec();
    if let Some(name) = &cli.framework {
        framework.name = name.clone();
    }
    ProjectLayout::detect(&start, target, framework)
}

fn crash_options(layout: &ProjectLayout, config: &FwlinkConfig) -> CrashScanOptions {
    let mut options = CrashScanOptions::for_layout(layout);
    if !config.doctor.crash_dirs.is_empty() {
        options.dirs = config.doctor.crash_dirs.clone();
    }
    options.pattern = config.doctor.crash_pattern.replace("{target}", &layout.target);
    options
}

fn marker(level: Level) -> console::StyledObject<&'static str> {
    match level {
        Level::Ok => style("✓").green(),
        Level::Info => style("•").dim(),
        Level::Warn => style("⚠").yellow(),
        Level::Fail => style("✗").red(),
    }
}

fn verdict(passed: bool) -> console::StyledObject<&'static str> {
    if passed {
        style("✓").green()
    } else {
        style("✗").red()
    }
}

fn print_check(check: &CheckReport) {
    println!();
    println!("{}", style(&check.title).bold());
    for finding in &check.findings {
        println!("  {} {}", marker(finding.level), finding);
    }
}

fn cmd_doctor(
    layout: &ProjectLayout,
    config: &FwlinkConfig,
    skip_build: bool,
    report: &Path,
    timeout_secs: u64,
    dry_run: bool,
) -> Result<bool> {
    println!("{}", style("Flutter iOS framework doctor").bold());
    println!("Project: {}", layout.root.display());

    let runner = ShellRunner::with_timeout(Duration::from_secs(timeout_secs));
    let report_path = if report.is_absolute() {
        report.to_path_buf()
    } else {
        layout.root.join(report)
    };
    let options = DoctorOptions {
        skip_build,
        crash_logs: crash_options(layout, config),
        report_path: (!dry_run).then(|| report_path.clone()),
    };

    let outcome = Doctor::new(layout, &runner).run_all(&options, |event| match event {
        DoctorEvent::Check(check) => print_check(check),
        DoctorEvent::BuildSkipped => {
            println!();
            println!("{}", style("Build test").bold());
            println!("  {} skipped (--skip-build)", marker(Level::Info));
        }
        DoctorEvent::CrashLogs(reports) => print_crash_logs(reports),
        DoctorEvent::ReportWritten(path) => {
            println!();
            println!("{} Debug report saved to {}", marker(Level::Ok), path.display());
        }
        DoctorEvent::ReportFailed { path, error } => {
            println!();
            println!(
                "{} Error saving debug report to {}: {}",
                marker(Level::Fail),
                path.display(),
                error
            );
        }
    });

    let summary = match outcome {
        DoctorOutcome::NotAFlutterProject(_) => return Ok(false),
        DoctorOutcome::Completed(summary) => summary,
    };
    if dry_run {
        println!();
        println!("[dry-run] would write {}", report_path.display());
    }

    println!();
    println!("{}", style("Summary").bold());
    println!("  Flutter environment: {}", verdict(summary.flutter.passed));
    println!("  iOS setup: {}", verdict(summary.ios.passed));
    println!(
        "  {} setup: {}",
        layout.framework.name,
        verdict(summary.framework.passed)
    );
    match &summary.build {
        Some(build) => println!("  Build test: {}", verdict(build.passed)),
        None => println!("  Build test: {}", style("not run").dim()),
    }

    println!();
    println!("{}", style("Recommendations").bold());
    for recommendation in summary.recommendations() {
        println!("  - {}", recommendation);
    }

    Ok(summary.passed())
}

fn print_crash_logs(reports: &[CrashDirReport]) {
    println!();
    println!("{}", style("Crash logs").bold());
    if reports.is_empty() {
        println!("  {} no crash log directories configured", marker(Level::Info));
    }
    for report in reports {
        match &report.scan {
            CrashDirScan::Missing => {
                log::debug!("{} does not exist", report.dir.display());
            }
            CrashDirScan::NoCrashFiles => {
                println!("  Checking {}", report.dir.display());
                println!("    No crash files found");
            }
            CrashDirScan::Found { total, recent } => {
                println!("  Checking {}", report.dir.display());
                println!("  {} Found {} crash files", marker(Level::Warn), total);
                for file in recent {
                    println!("    - {}", file.name);
                    match &file.highlights {
                        Ok(lines) => {
                            for line in lines {
                                println!("      {}", line);
                            }
                        }
                        Err(e) => println!("      Error reading crash file: {}", e),
                    }
                }
            }
        }
    }
}

fn cmd_patch_project(
    layout: &ProjectLayout,
    search_path: Option<SearchPath>,
    dry_run: bool,
) -> Result<bool> {
    let pbxproj = layout.pbxproj();
    println!("Patching {}", pbxproj.display());

    let report = patcher::patch_project_file(
        layout,
        &PatchOptions {
            search_path,
            dry_run,
        },
    )
    .with_context(|| format!("patching {}", pbxproj.display()))?;

    let bundle = layout.framework.bundle_name();
    match &report.reference {
        ReferenceOutcome::AlreadyPresent => {
            println!("  {} {} already in project", marker(Level::Ok), bundle)
        }
        ReferenceOutcome::Added {
            file_ref_id,
            build_file_id,
        } => println!(
            "  {} Added {} (file reference {}, build file {})",
            marker(Level::Ok),
            bundle,
            file_ref_id,
            build_file_id
        ),
    }
    match &report.search_path {
        None => {}
        Some(SearchPathOutcome::AlreadyConfigured) => {
            println!("  {} Framework search path already configured", marker(Level::Ok))
        }
        Some(SearchPathOutcome::Updated { configurations }) => println!(
            "  {} Added framework search path to {} build configuration(s)",
            marker(Level::Ok),
            configurations
        ),
        Some(SearchPathOutcome::Skipped { reason }) => println!(
            "  {} Framework search path not changed: {}",
            marker(Level::Warn),
            reason
        ),
    }

    if report.written {
        println!("  {} Wrote {}", marker(Level::Ok), pbxproj.display());
    } else if dry_run {
        println!("[dry-run] {} not modified", pbxproj.display());
    }
    Ok(true)
}

fn cmd_inspect_headers(layout: &ProjectLayout, dir: &Path, mode: ScanMode) -> Result<bool> {
    println!(
        "{}",
        style(format!("{} headers", layout.framework.name)).bold()
    );
    let reports = match HeaderInventory::scan(dir, mode) {
        HeaderInventory::Missing(path) => {
            println!(
                "  {} Headers directory not found: {}",
                marker(Level::Fail),
                path.display()
            );
            return Ok(false);
        }
        HeaderInventory::Found(reports) => reports,
    };

    println!("  {} Found headers directory: {}", marker(Level::Ok), dir.display());
    let names: Vec<&str> = reports.iter().map(|r| r.name.as_str()).collect();
    println!("  Header files found: {:?}", names);

    for report in &reports {
        print_header(report, mode);
    }
    Ok(true)
}

fn print_header(report: &HeaderReport, mode: ScanMode) {
    println!();
    println!("{}", style(&report.name).bold());
    println!("{}", "=".repeat(50));

    let scan = match &report.scan {
        Ok(scan) => scan,
        Err(e) => {
            println!("  {} Error reading {}: {}", marker(Level::Fail), report.path.display(), e);
            return;
        }
    };

    if mode == ScanMode::Inspect {
        for line in &scan.methods {
            println!("{}", line);
        }
        return;
    }

    if let Some(details) = &report.details {
        println!("File size: {} characters", details.size);
        println!("First 500 characters:");
        println!("{}", "-".repeat(40));
        println!("{}", details.preview);
        println!("{}", "-".repeat(40));
    }
    let sections = [
        ("@interface declarations", &scan.interfaces),
        ("Class declarations", &scan.classes),
    ];
    for (title, lines) in sections {
        if !lines.is_empty() {
            println!();
            println!("{}:", title);
            for line in lines {
                println!("  {}", line);
            }
        }
    }
    if !scan.methods.is_empty() {
        println!();
        println!("Method declarations:");
        for line in scan.methods.iter().take(METHOD_DISPLAY_LIMIT) {
            println!("  {}", line);
        }
        if scan.methods.len() > METHOD_DISPLAY_LIMIT {
            println!(
                "  ... and {} more methods",
                scan.methods.len() - METHOD_DISPLAY_LIMIT
            );
        }
    }
    if !scan.imports.is_empty() {
        println!();
        println!("Import statements:");
        for line in &scan.imports {
            println!("  {}", line);
        }
    }
}

fn cmd_fix_module(layout: &ProjectLayout, bridging_header: bool, dry_run: bool) -> Result<bool> {
    let runner = ShellRunner::new();
    let report = fixer::fix_framework(
        layout,
        &runner,
        &FixOptions {
            dry_run,
            bridging_header,
        },
    )
    .with_context(|| format!("fixing {}", layout.framework_dir().display()))?;

    print_check(&report.check);
    println!();
    if report.passed() {
        if dry_run {
            println!("[dry-run] no files were modified");
        }
        println!(
            "{} {} should now be importable from Swift",
            marker(Level::Ok),
            layout.framework.name
        );
    } else {
        println!("{} Swift compatibility check failed", marker(Level::Fail));
    }
    Ok(report.passed())
}

fn cmd_integrate(layout: &ProjectLayout, dry_run: bool) -> Result<bool> {
    match integrate::integrate(layout, dry_run)? {
        IntegrationOutcome::ManualStepsRequired(steps) => {
            println!(
                "{} {} is not referenced in the Xcode project",
                marker(Level::Warn),
                layout.framework.bundle_name()
            );
            println!("Manual steps required:");
            for (idx, step) in steps.iter().enumerate() {
                println!("{}. {}", idx + 1, step);
            }
            Ok(false)
        }
        IntegrationOutcome::ScriptWritten(path) => {
            if dry_run {
                println!("[dry-run] would write {}", path.display());
            } else {
                println!("{} Created setup script: {}", marker(Level::Ok), path.display());
            }
            Ok(true)
        }
    }
}

fn cmd_init(output: &Path, cli: &GlobalArgs) -> Result<bool> {
    let framework = cli.framework.as_deref().unwrap_or(fwlink_sdk::DEFAULT_FRAMEWORK);
    let target = cli.target.as_deref().unwrap_or(fwlink_sdk::DEFAULT_TARGET);
    let contents = FwlinkConfig::generate_starter_toml(framework, target);

    if cli.dry_run {
        println!("[dry-run] would write {}", output.display());
        return Ok(true);
    }
    ensure_can_write(output)?;
    write_file(output, contents.as_bytes())?;
    println!("Wrote starter config to {}", output.display());
    Ok(true)
}

fn ensure_can_write(path: &Path) -> Result<()> {
    if path.exists() {
        bail!("refusing to overwrite existing file: {:?}", path);
    }
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating parent directory {:?}", parent))?;
    }
    Ok(())
}

fn write_file(path: &Path, contents: &[u8]) -> Result<()> {
    fs::write(path, contents).with_context(|| format!("writing file {:?}", path))
}
