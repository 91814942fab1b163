//! Swift interoperability fixes for the framework bundle.
//!
//! Checks, in order, the umbrella header, the module map, the header that
//! declares the public class, the bundle's `Info.plist` and the binary, and
//! repairs the first two in place. The run stops at the first hard failure;
//! repairs already made stay made.

use std::fs;
use std::path::Path;

use log::{debug, info};

use crate::codegen;
use crate::process::{CommandRunner, shell_quote};
use crate::types::{CheckReport, FrameworkSpec, FwError, ProjectLayout};

/// Options for [`fix_framework`].
#[derive(Debug, Clone)]
pub struct FixOptions {
    /// Report what would change without writing.
    pub dry_run: bool,
    /// Write `<Target>-Bridging-Header.h` when the checks pass.
    pub bridging_header: bool,
}

impl Default for FixOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            bridging_header: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UmbrellaStatus {
    AlreadyImported,
    Appended,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleMapStatus {
    AlreadyConfigured,
    /// Replaced with the canonical declaration; prior content is discarded.
    Rewritten,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwiftVisibility {
    Visible,
    NotExposed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryKind {
    Dynamic,
    NotDynamic,
    /// `file` could not be run.
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgingHeaderStatus {
    Created,
    AlreadyExists,
}

/// Outcome of [`fix_framework`]. Each status is `None` when the run stopped
/// before reaching that step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixReport {
    pub check: CheckReport,
    pub umbrella: Option<UmbrellaStatus>,
    pub module_map: Option<ModuleMapStatus>,
    pub visibility: Option<SwiftVisibility>,
    pub binary: Option<BinaryKind>,
    pub bridging_header: Option<BridgingHeaderStatus>,
}

impl FixReport {
    fn new() -> Self {
        Self {
            check: CheckReport::new("Swift compatibility"),
            umbrella: None,
            module_map: None,
            visibility: None,
            binary: None,
            bridging_header: None,
        }
    }

    pub fn passed(&self) -> bool {
        self.check.passed
    }
}

/// Checks and repairs the framework bundle for Swift use.
///
/// Missing artifacts are recorded as failures in the report; `Err` is only
/// returned when reading or writing an existing file fails.
pub fn fix_framework<R: CommandRunner>(
    layout: &ProjectLayout,
    runner: &R,
    options: &FixOptions,
) -> Result<FixReport, FwError> {
    let mut report = FixReport::new();
    let check = &mut report.check;
    let fw = &layout.framework;

    let framework_dir = layout.framework_dir();
    if !framework_dir.is_dir() {
        check.abort(format!(
            "Framework directory not found: {}",
            framework_dir.display()
        ));
        return Ok(report);
    }
    check.ok(format!("Found framework: {}", framework_dir.display()));

    // Umbrella header
    let umbrella = layout.umbrella_header();
    if !umbrella.is_file() {
        check.abort(format!("Umbrella header not found: {}", umbrella.display()));
        return Ok(report);
    }
    let status = ensure_umbrella_import(&umbrella, &fw.name, &fw.nested_header, options.dry_run)?;
    match status {
        UmbrellaStatus::Appended => check.warn(format!(
            "{} was not imported in the umbrella header; added #import \"{}\"",
            fw.nested_header, fw.nested_header
        )),
        UmbrellaStatus::AlreadyImported => check.ok(format!(
            "{} already imported in umbrella header",
            fw.nested_header
        )),
    }
    report.umbrella = Some(status);
    let check = &mut report.check;

    // Module map
    let module_map = layout.module_map();
    if !module_map.is_file() {
        check.abort(format!("Module map not found: {}", module_map.display()));
        return Ok(report);
    }
    let status = ensure_module_map(&module_map, fw, options.dry_run)?;
    match status {
        ModuleMapStatus::Rewritten => {
            check.warn("Module map was not using the umbrella header; rewrote it")
        }
        ModuleMapStatus::AlreadyConfigured => check.ok("Module map properly configured"),
    }
    report.module_map = Some(status);
    let check = &mut report.check;

    // Public class
    let nested = layout.nested_header();
    if !nested.is_file() {
        check.abort(format!(
            "{} header not found: {}",
            fw.nested_header,
            nested.display()
        ));
        return Ok(report);
    }
    let content = fs::read_to_string(&nested)?;
    if !content.contains(&format!("@interface {}", fw.swift_class)) {
        check.abort(format!(
            "{} class not found in {}",
            fw.swift_class, fw.nested_header
        ));
        return Ok(report);
    }
    check.ok(format!("{} class found in header", fw.swift_class));
    let visibility = swift_visibility(&content);
    match visibility {
        SwiftVisibility::Visible => check.ok(format!(
            "{} class properly configured for Swift",
            fw.swift_class
        )),
        SwiftVisibility::NotExposed => check.warn(format!(
            "{} class may not be properly exposed to Swift; consider an @objc annotation or NSObject inheritance",
            fw.swift_class
        )),
    }
    report.visibility = Some(visibility);
    let check = &mut report.check;

    let plist = layout.framework_info_plist();
    if plist.is_file() {
        check.ok(format!("Framework Info.plist exists: {}", plist.display()));
    } else {
        check.warn(format!("Framework Info.plist not found: {}", plist.display()));
    }

    // Binary
    let binary = layout.framework_binary();
    if !binary.is_file() {
        check.abort(format!("Framework binary not found: {}", binary.display()));
        return Ok(report);
    }
    check.ok(format!("Framework binary exists: {}", binary.display()));
    let kind = classify_binary(runner, &binary);
    match kind {
        BinaryKind::Dynamic => check.ok("Framework is a dynamic library"),
        BinaryKind::NotDynamic => check.warn("Framework may not be a dynamic library"),
        BinaryKind::Unknown => check.warn("Could not check framework binary type"),
    }
    report.binary = Some(kind);

    if options.bridging_header {
        let path = layout.bridging_header();
        let status = ensure_bridging_header(layout, options.dry_run)?;
        match status {
            BridgingHeaderStatus::Created => report
                .check
                .ok(format!("Created bridging header: {}", path.display())),
            BridgingHeaderStatus::AlreadyExists => report
                .check
                .ok(format!("Bridging header already exists: {}", path.display())),
        }
        report.bridging_header = Some(status);
    }

    Ok(report)
}

/// Appends `#import "<nested>"` to the umbrella header unless it already
/// imports the nested header in either quoted or framework form.
pub fn ensure_umbrella_import(
    umbrella: &Path,
    framework: &str,
    nested: &str,
    dry_run: bool,
) -> Result<UmbrellaStatus, FwError> {
    let content = fs::read_to_string(umbrella)?;
    let quoted = format!("#import \"{}\"", nested);
    let angled = format!("#import <{}/{}>", framework, nested);
    if content.contains(&quoted) || content.contains(&angled) {
        return Ok(UmbrellaStatus::AlreadyImported);
    }

    let updated = format!("{}\n\n{}\n", content.trim_end(), quoted);
    if !dry_run {
        write(umbrella, &updated)?;
    }
    info!("added {} to {}", quoted, umbrella.display());
    Ok(UmbrellaStatus::Appended)
}

/// Rewrites the module map with the canonical declaration unless it already
/// declares the framework's umbrella header.
pub fn ensure_module_map(
    module_map: &Path,
    framework: &FrameworkSpec,
    dry_run: bool,
) -> Result<ModuleMapStatus, FwError> {
    let content = fs::read_to_string(module_map)?;
    let declaration = format!("umbrella header \"{}\"", framework.umbrella_header_name());
    if content.contains(&declaration) {
        return Ok(ModuleMapStatus::AlreadyConfigured);
    }

    let canonical = codegen::module_map(framework)?;
    if !dry_run {
        write(module_map, &canonical)?;
    }
    info!("rewrote {}", module_map.display());
    Ok(ModuleMapStatus::Rewritten)
}

fn swift_visibility(header: &str) -> SwiftVisibility {
    if header.contains("NSObject") || header.contains("@objc") {
        SwiftVisibility::Visible
    } else {
        SwiftVisibility::NotExposed
    }
}

/// Asks `file` what kind of binary the framework ships.
pub fn classify_binary<R: CommandRunner>(runner: &R, binary: &Path) -> BinaryKind {
    let output = runner.run(&format!("file {}", shell_quote(binary)), None);
    if !output.success() {
        debug!("`file` failed: {}", output.stderr.trim());
        return BinaryKind::Unknown;
    }
    if output.stdout.contains("dynamically linked") {
        BinaryKind::Dynamic
    } else {
        BinaryKind::NotDynamic
    }
}

/// Writes the bridging header if the project has none.
pub fn ensure_bridging_header(
    layout: &ProjectLayout,
    dry_run: bool,
) -> Result<BridgingHeaderStatus, FwError> {
    let path = layout.bridging_header();
    if path.exists() {
        return Ok(BridgingHeaderStatus::AlreadyExists);
    }
    let contents = codegen::bridging_header(layout)?;
    if !dry_run {
        write(&path, &contents)?;
    }
    Ok(BridgingHeaderStatus::Created)
}

fn write(path: &Path, contents: &str) -> Result<(), FwError> {
    debug!("writing {}", path.display());
    fs::write(path, contents)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::testing::ScriptedRunner;
    use crate::types::Level;
    use tempfile::TempDir;

    const CANONICAL: &str = "framework module CastarSDK {\n    umbrella header \"CastarSDK.h\"\n    export *\n    module * { export * }\n}\n";

    fn framework(temp: &TempDir) -> ProjectLayout {
        let layout = ProjectLayout::new(temp.path(), "Runner", FrameworkSpec::default());
        fs::create_dir_all(layout.headers_dir()).unwrap();
        fs::create_dir_all(layout.modules_dir()).unwrap();
        fs::create_dir_all(layout.app_dir()).unwrap();
        fs::write(
            layout.umbrella_header(),
            "#import <Foundation/Foundation.h>\n\nFOUNDATION_EXPORT double CastarSDKVersionNumber;\n\n",
        )
        .unwrap();
        fs::write(layout.module_map(), "framework module CastarSDK {\n  header \"CSDK.h\"\n}\n").unwrap();
        fs::write(
            layout.nested_header(),
            "@interface Castar : NSObject\n- (void)Start;\n@end\n",
        )
        .unwrap();
        fs::write(layout.framework_info_plist(), "<plist/>").unwrap();
        fs::write(layout.framework_binary(), [0xcf, 0xfa, 0xed, 0xfe]).unwrap();
        layout
    }

    fn file_cmd(layout: &ProjectLayout) -> String {
        format!("file {}", shell_quote(&layout.framework_binary()))
    }

    fn dynamic_runner(layout: &ProjectLayout) -> ScriptedRunner {
        ScriptedRunner::new().on(
            &file_cmd(layout),
            0,
            "CastarSDK: Mach-O 64-bit dynamically linked shared library arm64\n",
            "",
        )
    }

    #[test]
    fn fixes_umbrella_and_module_map() {
        let temp = TempDir::new().unwrap();
        let layout = framework(&temp);
        let runner = dynamic_runner(&layout);

        let report = fix_framework(&layout, &runner, &FixOptions::default()).unwrap();
        assert!(report.passed(), "{:?}", report.check);
        assert_eq!(report.umbrella, Some(UmbrellaStatus::Appended));
        assert_eq!(report.module_map, Some(ModuleMapStatus::Rewritten));
        assert_eq!(report.visibility, Some(SwiftVisibility::Visible));
        assert_eq!(report.binary, Some(BinaryKind::Dynamic));
        assert_eq!(report.bridging_header, Some(BridgingHeaderStatus::Created));

        assert_eq!(
            fs::read_to_string(layout.umbrella_header()).unwrap(),
            "#import <Foundation/Foundation.h>\n\nFOUNDATION_EXPORT double CastarSDKVersionNumber;\n\n#import \"CSDK.h\"\n"
        );
        assert_eq!(fs::read_to_string(layout.module_map()).unwrap(), CANONICAL);
        assert!(
            fs::read_to_string(layout.bridging_header())
                .unwrap()
                .contains("#import <CastarSDK/CastarSDK.h>")
        );
        assert!(runner.called(&file_cmd(&layout)));
    }

    #[test]
    fn second_run_leaves_files_identical() {
        let temp = TempDir::new().unwrap();
        let layout = framework(&temp);
        let runner = dynamic_runner(&layout);
        fix_framework(&layout, &runner, &FixOptions::default()).unwrap();
        let umbrella = fs::read(layout.umbrella_header()).unwrap();
        let module_map = fs::read(layout.module_map()).unwrap();

        let report = fix_framework(&layout, &runner, &FixOptions::default()).unwrap();
        assert_eq!(report.umbrella, Some(UmbrellaStatus::AlreadyImported));
        assert_eq!(report.module_map, Some(ModuleMapStatus::AlreadyConfigured));
        assert_eq!(report.bridging_header, Some(BridgingHeaderStatus::AlreadyExists));
        assert_eq!(fs::read(layout.umbrella_header()).unwrap(), umbrella);
        assert_eq!(fs::read(layout.module_map()).unwrap(), module_map);
    }

    #[test]
    fn angled_import_counts_as_imported() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("CastarSDK.h");
        fs::write(&path, "#import <CastarSDK/CSDK.h>\n").unwrap();
        let status = ensure_umbrella_import(&path, "CastarSDK", "CSDK.h", false).unwrap();
        assert_eq!(status, UmbrellaStatus::AlreadyImported);
        assert_eq!(fs::read_to_string(&path).unwrap(), "#import <CastarSDK/CSDK.h>\n");
    }

    #[test]
    fn module_map_is_reset_regardless_of_content() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("module.modulemap");
        for prior in ["", "garbage {{{", "framework module Other {\n}\n"] {
            fs::write(&path, prior).unwrap();
            let status = ensure_module_map(&path, &FrameworkSpec::default(), false).unwrap();
            assert_eq!(status, ModuleMapStatus::Rewritten);
            assert_eq!(fs::read_to_string(&path).unwrap(), CANONICAL);
        }
    }

    #[test]
    fn dry_run_writes_nothing() {
        let temp = TempDir::new().unwrap();
        let layout = framework(&temp);
        let umbrella = fs::read(layout.umbrella_header()).unwrap();
        let module_map = fs::read(layout.module_map()).unwrap();
        let options = FixOptions {
            dry_run: true,
            bridging_header: true,
        };

        let report = fix_framework(&layout, &dynamic_runner(&layout), &options).unwrap();
        assert_eq!(report.umbrella, Some(UmbrellaStatus::Appended));
        assert_eq!(report.module_map, Some(ModuleMapStatus::Rewritten));
        assert_eq!(report.bridging_header, Some(BridgingHeaderStatus::Created));
        assert_eq!(fs::read(layout.umbrella_header()).unwrap(), umbrella);
        assert_eq!(fs::read(layout.module_map()).unwrap(), module_map);
        assert!(!layout.bridging_header().exists());
    }

    #[test]
    fn stops_at_missing_class() {
        let temp = TempDir::new().unwrap();
        let layout = framework(&temp);
        fs::write(layout.nested_header(), "@interface Other : NSObject\n@end\n").unwrap();

        let report = fix_framework(&layout, &dynamic_runner(&layout), &FixOptions::default())
            .unwrap();
        assert!(!report.passed());
        assert!(report.visibility.is_none());
        assert!(report.binary.is_none());
        assert_eq!(report.check.messages(Level::Fail), vec!["Castar class not found in CSDK.h"]);
        // earlier repairs stay applied
        assert_eq!(fs::read_to_string(layout.module_map()).unwrap(), CANONICAL);
    }

    #[test]
    fn missing_framework_fails_first() {
        let temp = TempDir::new().unwrap();
        let layout = ProjectLayout::new(temp.path(), "Runner", FrameworkSpec::default());
        let report = fix_framework(&layout, &ScriptedRunner::new(), &FixOptions::default()).unwrap();
        assert!(!report.passed());
        assert!(report.umbrella.is_none());
    }

    #[test]
    fn soft_warnings_do_not_fail() {
        let temp = TempDir::new().unwrap();
        let layout = framework(&temp);
        fs::write(layout.nested_header(), "@interface Castar\n@end\n").unwrap();
        fs::remove_file(layout.framework_info_plist()).unwrap();
        let options = FixOptions {
            dry_run: false,
            bridging_header: false,
        };

        // unscripted `file` call fails
        let report = fix_framework(&layout, &ScriptedRunner::new(), &options).unwrap();
        assert!(report.passed());
        assert_eq!(report.visibility, Some(SwiftVisibility::NotExposed));
        assert_eq!(report.binary, Some(BinaryKind::Unknown));
        assert!(report.bridging_header.is_none());
        assert_eq!(report.check.messages(Level::Warn).len(), 5);
    }

    #[test]
    fn static_binary_is_flagged() {
        let temp = TempDir::new().unwrap();
        let layout = framework(&temp);
        let runner = ScriptedRunner::new().on(
            &file_cmd(&layout),
            0,
            "CastarSDK: current ar archive random library\n",
            "",
        );
        assert_eq!(
            classify_binary(&runner, &layout.framework_binary()),
            BinaryKind::NotDynamic
        );
    }
}
