//! Flutter iOS framework integration toolkit
//!
//! `fwlink-sdk` diagnoses and patches a Flutter project's iOS build so that a
//! prebuilt binary framework (by default `CastarSDK.framework`, unpacked into
//! `ios/Frameworks/`) links and imports from Swift, Objective-C and the
//! Flutter toolchain.
//!
//! # Architecture
//!
//! The toolkit consists of independent tools that only share the project
//! layout and a command runner:
//!
//! - **Doctor** ([`doctor`]): toolchain, project, framework, build and crash-log checks,
//!   plus a JSON debug report ([`report`])
//! - **Patcher** ([`patcher`]): adds the framework to `project.pbxproj` behind the
//!   [`ManifestEditor`] interface
//! - **Header inspector** ([`headers`]): lists public headers and their declarations
//! - **Fixer** ([`fixer`]): umbrella header, module map and bridging header for Swift
//! - **Integrate** ([`integrate`]): manual Xcode checklist or a build-time setup script
//! - **Crash logs** ([`crashlog`]): recent `*.crash` reports for the app target
//!
//! # Example
//!
//! ```ignore
//! use std::path::Path;
//! use fwlink_sdk::{FrameworkSpec, ProjectLayout, patcher};
//!
//! fn main() -> Result<(), fwlink_sdk::FwError> {
//!     let layout = ProjectLayout::detect(Path::new("."), "Runner", FrameworkSpec::default());
//!     let report = patcher::patch_project_file(
//!         &layout,
//!         &patcher::PatchOptions {
//!             search_path: Some(patcher::SearchPath::default()),
//!             dry_run: false,
//!         },
//!     )?;
//!     println!("{:?}", report.reference);
//!     Ok(())
//! }
//! ```

// Public modules
pub mod codegen;
pub mod crashlog;
pub mod doctor;
pub mod fixer;
pub mod headers;
pub mod integrate;
pub mod patcher;
pub mod process;
pub mod report;
pub mod types;

// Re-export key types for convenience
pub use doctor::{Doctor, DoctorEvent, DoctorOptions, DoctorOutcome, DoctorSummary};
pub use patcher::{ManifestEditor, PbxprojText};
pub use process::{CommandOutput, CommandRunner, ShellRunner};
pub use report::{BuildStatus, DebugReport};
pub use types::{
    CheckReport, DEFAULT_FRAMEWORK, DEFAULT_TARGET, Finding, FrameworkSpec, FwError, Level,
    ProjectLayout,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
