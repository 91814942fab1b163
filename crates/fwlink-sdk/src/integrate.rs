//! Integration helper.
//!
//! If the Xcode project already references the framework, writes
//! `ios/setup_framework.sh`, a build-time script that re-verifies the bundle.
//! Otherwise returns the manual Xcode checklist.

use std::fs;
use std::path::PathBuf;

use log::{debug, info};

use crate::codegen;
use crate::patcher::DEFAULT_SEARCH_PATH;
use crate::types::{FwError, ProjectLayout};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntegrationOutcome {
    /// The project file does not mention the framework; these steps add it in Xcode.
    ManualStepsRequired(Vec<String>),
    /// The verification script was written (or would be, in a dry run).
    ScriptWritten(PathBuf),
}

/// Xcode steps that add the framework to the target by hand.
pub fn manual_checklist(layout: &ProjectLayout) -> Vec<String> {
    let target = &layout.target;
    let bundle = layout.framework.bundle_name();
    vec![
        format!("Open ios/{}.xcworkspace in Xcode", target),
        format!("Right-click on {0} project → Add Files to '{0}'", target),
        format!("Select {}", layout.framework_dir_display()),
        format!("Check 'Add to target: {}'", target),
        "Click 'Add'".to_string(),
        format!(
            "In Build Settings, add '{}' to Framework Search Paths",
            DEFAULT_SEARCH_PATH
        ),
        format!("In General tab, set {} to 'Embed & Sign'", bundle),
    ]
}

/// Writes the setup script, or returns the manual checklist when the
/// framework is not referenced from the Xcode project yet.
pub fn integrate(layout: &ProjectLayout, dry_run: bool) -> Result<IntegrationOutcome, FwError> {
    let framework_dir = layout.framework_dir();
    if !framework_dir.is_dir() {
        return Err(FwError::missing(
            "Framework",
            &framework_dir,
            "Download the SDK and unpack the .framework bundle into ios/Frameworks/.",
        ));
    }
    let pbxproj = layout.pbxproj();
    if !pbxproj.is_file() {
        return Err(FwError::missing(
            "Xcode project file",
            &pbxproj,
            "Run from the Flutter project root, or regenerate the iOS project with `flutter create .`.",
        ));
    }

    let contents = fs::read_to_string(&pbxproj)?;
    if !contents.contains(&layout.framework.bundle_name()) {
        info!("{} not referenced in {}", layout.framework.bundle_name(), pbxproj.display());
        return Ok(IntegrationOutcome::ManualStepsRequired(manual_checklist(layout)));
    }

    let script = layout.setup_script();
    if !dry_run {
        let body = codegen::setup_script(layout)?;
        debug!("writing {}", script.display());
        fs::write(&script, body)?;
        make_executable(&script)?;
    }
    Ok(IntegrationOutcome::ScriptWritten(script))
}

#[cfg(unix)]
fn make_executable(path: &std::path::Path) -> Result<(), FwError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o755))?;
    Ok(())
}

#[cfg(not(unix))]
fn make_executable(_path: &std::path::Path) -> Result<(), FwError> {
    Ok(())
}
