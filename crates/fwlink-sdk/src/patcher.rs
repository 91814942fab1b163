//! Xcode project file patching.
//!
//! The project file (`project.pbxproj`) is edited as text. Callers only see
//! the [`ManifestEditor`] interface (make sure the framework is referenced,
//! make sure the search path is set) so the regex strategy in [`PbxprojText`]
//! can be replaced by a real parser without touching them.
//!
//! ## Edits made for a framework `X.framework`
//!
//! | Section                     | Inserted                                     |
//! |-----------------------------|----------------------------------------------|
//! | `PBXFileReference`          | file reference node (last entry)             |
//! | `PBXBuildFile`              | build file node pointing at the reference    |
//! | `PBXGroup` (target group)   | reference id as first `children` entry       |
//! | `PBXFrameworksBuildPhase`   | build file id as first `files` entry         |
//! | `XCBuildConfiguration`      | `FRAMEWORK_SEARCH_PATHS` entry per variant   |
//!
//! All edits are composed on one in-memory string and the file is written
//! once. When a section is missing nothing is written.

use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::ops::Range;
use std::path::Path;
use std::sync::LazyLock;

use log::{debug, info, warn};
use regex::Regex;
use uuid::Uuid;

use crate::types::{FwError, ProjectLayout};

/// Search path added to the target's build configurations by default.
pub const DEFAULT_SEARCH_PATH: &str = "$(SRCROOT)/Frameworks";

const SEARCH_PATHS_KEY: &str = "FRAMEWORK_SEARCH_PATHS";

static OBJECT_ID: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b[0-9A-F]{24}\b").unwrap());

static BUILD_SETTINGS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)buildSettings = \{(.*?)\n\t\t\t\};").unwrap());

static SEARCH_PATHS_LIST: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)FRAMEWORK_SEARCH_PATHS = \((.*?)\);").unwrap());

static SEARCH_PATHS_SCALAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"FRAMEWORK_SEARCH_PATHS = ([^(\s][^;\n]*);").unwrap());

/// A 24-digit uppercase hexadecimal object identifier, as Xcode writes them.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectId(String);

impl ObjectId {
    /// Generates an identifier not present in `taken`, and records it there.
    pub fn generate(taken: &mut HashSet<String>) -> Self {
        loop {
            let simple = Uuid::new_v4().simple().to_string().to_uppercase();
            let candidate = simple[..24].to_string();
            if taken.insert(candidate.clone()) {
                return ObjectId(candidate);
            }
            debug!("object id {} already used, regenerating", candidate);
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The framework reference to make sure of.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameworkRef {
    /// Bundle file name, e.g. `CastarSDK.framework`. Its presence anywhere in
    /// the project file counts as "already referenced".
    pub file_name: String,
    /// Path relative to the Xcode project, e.g. `Frameworks/CastarSDK.framework`.
    pub path: String,
    /// Name of the group that receives the reference (the app's main group).
    pub group: String,
}

impl FrameworkRef {
    pub fn for_layout(layout: &ProjectLayout) -> Self {
        Self {
            file_name: layout.framework.bundle_name(),
            path: layout.framework_project_path(),
            group: layout.target.clone(),
        }
    }
}

/// A framework search path value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchPath(pub String);

impl Default for SearchPath {
    fn default() -> Self {
        SearchPath(DEFAULT_SEARCH_PATH.to_string())
    }
}

impl SearchPath {
    fn quoted(&self) -> String {
        format!("\"{}\"", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReferenceOutcome {
    /// The framework name already appears in the project file.
    AlreadyPresent,
    /// All four entries were inserted.
    Added {
        file_ref_id: ObjectId,
        build_file_id: ObjectId,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchPathOutcome {
    /// Every target build configuration already lists the value.
    AlreadyConfigured,
    /// The value was added to this many build configurations.
    Updated { configurations: usize },
    /// The build configurations could not be located; the reference edits
    /// still apply. Only produced by [`patch_project_file`].
    Skipped { reason: String },
}

/// Narrow editing interface over an Xcode project file.
pub trait ManifestEditor {
    /// Makes sure the framework has a file reference, a build file, a group
    /// entry and a frameworks-phase entry.
    fn ensure_framework_reference(
        &mut self,
        framework: &FrameworkRef,
    ) -> Result<ReferenceOutcome, FwError>;

    /// Makes sure every target build configuration lists the search path.
    fn ensure_search_path(&mut self, search_path: &SearchPath)
    -> Result<SearchPathOutcome, FwError>;
}

/// Text-level editor over the contents of a `project.pbxproj` file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PbxprojText {
    contents: String,
}

struct Edit {
    range: Range<usize>,
    text: String,
}

impl Edit {
    fn insert(at: usize, text: String) -> Self {
        Self {
            range: at..at,
            text,
        }
    }

    fn replace(range: Range<usize>, text: String) -> Self {
        Self { range, text }
    }
}

impl PbxprojText {
    pub fn new(contents: impl Into<String>) -> Self {
        Self {
            contents: contents.into(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.contents
    }

    pub fn into_string(self) -> String {
        self.contents
    }

    /// Every object identifier already used in the file.
    pub fn existing_ids(&self) -> HashSet<String> {
        OBJECT_ID
            .find_iter(&self.contents)
            .map(|m| m.as_str().to_string())
            .collect()
    }

    /// Range of `/* Begin <name> section */ ... /* End <name> section */`.
    fn section(&self, name: &str) -> Result<Range<usize>, FwError> {
        let pattern = format!(
            r"(?s)/\* Begin {0} section \*/.*?/\* End {0} section \*/",
            regex::escape(name)
        );
        let re = compile(&pattern)?;
        let found = re
            .find(&self.contents)
            .map(|m| m.range())
            .ok_or_else(|| FwError::PatternNotFound(format!("{} section", name)))?;
        debug!("located {} section at {:?}", name, found);
        Ok(found)
    }

    /// First object node `\t\t<id> /* <name> */ = { ... \n\t\t};` inside `within`.
    fn node(&self, within: &Range<usize>, name: &str, what: &str) -> Result<Range<usize>, FwError> {
        let pattern = format!(
            r"(?s)\t\t[0-9A-F]{{24}} /\* {} \*/ = \{{.*?\n\t\t\}};",
            regex::escape(name)
        );
        let re = compile(&pattern)?;
        re.find(&self.contents[within.clone()])
            .map(|m| within.start + m.start()..within.start + m.end())
            .ok_or_else(|| FwError::PatternNotFound(what.to_string()))
    }

    /// Offset just past `opening` (e.g. `children = (`) inside `node`.
    fn list_start(&self, node: &Range<usize>, opening: &str, what: &str) -> Result<usize, FwError> {
        self.contents[node.clone()]
            .find(opening)
            .map(|idx| node.start + idx + opening.len())
            .ok_or_else(|| FwError::PatternNotFound(what.to_string()))
    }

    /// Offset of the first character of the line holding the section's end marker.
    fn end_marker_line(&self, section: &Range<usize>, name: &str) -> usize {
        let marker = format!("/* End {} section */", name);
        let marker_start = section.end - marker.len();
        self.contents[..marker_start]
            .rfind('\n')
            .map(|idx| idx + 1)
            .unwrap_or(marker_start)
    }

    fn apply(&mut self, mut edits: Vec<Edit>) {
        edits.sort_by(|a, b| b.range.start.cmp(&a.range.start));
        for edit in edits {
            self.contents.replace_range(edit.range, &edit.text);
        }
    }
}

fn compile(pattern: &str) -> Result<Regex, FwError> {
    Regex::new(pattern).map_err(|e| FwError::Config(format!("invalid project file pattern: {}", e)))
}

impl ManifestEditor for PbxprojText {
    fn ensure_framework_reference(
        &mut self,
        framework: &FrameworkRef,
    ) -> Result<ReferenceOutcome, FwError> {
        if self.contents.contains(&framework.file_name) {
            info!("{} already in project file", framework.file_name);
            return Ok(ReferenceOutcome::AlreadyPresent);
        }

        // Locate everything before touching anything.
        let file_refs = self.section("PBXFileReference")?;
        let build_files = self.section("PBXBuildFile")?;
        let groups = self.section("PBXGroup")?;
        let group = self.node(&groups, &framework.group, &format!("{} group", framework.group))?;
        let children = self.list_start(
            &group,
            "children = (",
            &format!("children list in {} group", framework.group),
        )?;
        let phases = self.section("PBXFrameworksBuildPhase")?;
        let phase = self.node(&phases, "Frameworks", "frameworks build phase")?;
        let files = self.list_start(&phase, "files = (", "files list in frameworks build phase")?;

        let mut taken = self.existing_ids();
        let file_ref_id = ObjectId::generate(&mut taken);
        let build_file_id = ObjectId::generate(&mut taken);
        let name = &framework.file_name;

        let edits = vec![
            Edit::insert(
                self.end_marker_line(&file_refs, "PBXFileReference"),
                format!(
                    "\t\t{file_ref_id} /* {name} */ = {{isa = PBXFileReference; lastKnownFileType = wrapper.framework; name = {name}; path = {path}; sourceTree = \"<group>\"; }};\n",
                    path = framework.path,
                ),
            ),
            Edit::insert(
                self.end_marker_line(&build_files, "PBXBuildFile"),
                format!(
                    "\t\t{build_file_id} /* {name} in Frameworks */ = {{isa = PBXBuildFile; fileRef = {file_ref_id} /* {name} */; }};\n"
                ),
            ),
            Edit::insert(children, format!("\n\t\t\t\t{file_ref_id} /* {name} */,")),
            Edit::insert(files, format!("\n\t\t\t\t{build_file_id} /* {name} in Frameworks */,")),
        ];
        self.apply(edits);

        info!(
            "added {} (file reference {}, build file {})",
            name, file_ref_id, build_file_id
        );
        Ok(ReferenceOutcome::Added {
            file_ref_id,
            build_file_id,
        })
    }

    fn ensure_search_path(
        &mut self,
        search_path: &SearchPath,
    ) -> Result<SearchPathOutcome, FwError> {
        let configs = self.section("XCBuildConfiguration")?;

        let blocks: Vec<Range<usize>> = BUILD_SETTINGS
            .captures_iter(&self.contents[configs.clone()])
            .filter_map(|caps| caps.get(1))
            .map(|m| configs.start + m.start()..configs.start + m.end())
            .filter(|block| self.contents[block.clone()].contains("PRODUCT_BUNDLE_IDENTIFIER"))
            .collect();
        if blocks.is_empty() {
            return Err(FwError::PatternNotFound(
                "target build configurations".to_string(),
            ));
        }

        let mut edits = Vec::new();
        for block in &blocks {
            if let Some(edit) = search_path_edit(&self.contents, block, search_path) {
                edits.push(edit);
            }
        }

        let configurations = edits.len();
        if configurations == 0 {
            info!("{} already lists {}", SEARCH_PATHS_KEY, search_path.0);
            return Ok(SearchPathOutcome::AlreadyConfigured);
        }
        self.apply(edits);
        info!(
            "added {} to {} in {} build configuration(s)",
            search_path.0, SEARCH_PATHS_KEY, configurations
        );
        Ok(SearchPathOutcome::Updated { configurations })
    }
}

/// Edit adding the search path to one `buildSettings` block, if needed.
///
/// Purely syntactic: list elements are not parsed, so the value counts as
/// present whenever it appears inside the list text.
fn search_path_edit(contents: &str, block: &Range<usize>, search_path: &SearchPath) -> Option<Edit> {
    let settings = &contents[block.clone()];
    let at = |r: Range<usize>| block.start + r.start..block.start + r.end;

    if let Some(caps) = SEARCH_PATHS_LIST.captures(settings) {
        let items = caps.get(1)?;
        if items.as_str().contains(&search_path.0) {
            return None;
        }
        let close = at(items.range()).end;
        let text = if items.as_str().ends_with("\n\t\t\t\t") {
            format!("\t{},\n\t\t\t\t", search_path.quoted())
        } else {
            format!("\n\t\t\t\t\t{},\n\t\t\t\t", search_path.quoted())
        };
        return Some(Edit::insert(close, text));
    }

    if let Some(caps) = SEARCH_PATHS_SCALAR.captures(settings) {
        let whole = caps.get(0)?;
        let value = caps.get(1)?.as_str().trim();
        if value.contains(&search_path.0) {
            return None;
        }
        return Some(Edit::replace(
            at(whole.range()),
            format!(
                "{SEARCH_PATHS_KEY} = (\n\t\t\t\t\t{value},\n\t\t\t\t\t{},\n\t\t\t\t);",
                search_path.quoted()
            ),
        ));
    }

    Some(Edit::insert(
        block.start,
        format!(
            "\n\t\t\t\t{SEARCH_PATHS_KEY} = (\n\t\t\t\t\t\"$(inherited)\",\n\t\t\t\t\t{},\n\t\t\t\t);",
            search_path.quoted()
        ),
    ))
}

/// Options for [`patch_project_file`].
#[derive(Debug, Clone, Default)]
pub struct PatchOptions {
    /// Search path to ensure; `None` leaves build settings alone.
    pub search_path: Option<SearchPath>,
    /// Compute the edits without writing the file.
    pub dry_run: bool,
}

/// What [`patch_project_file`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchReport {
    pub reference: ReferenceOutcome,
    pub search_path: Option<SearchPathOutcome>,
    /// `true` if the project file was rewritten.
    pub written: bool,
}

/// Adds the framework to the project's Xcode project file.
///
/// Reads the file once, applies [`ManifestEditor::ensure_framework_reference`]
/// and optionally [`ManifestEditor::ensure_search_path`], then writes once if
/// the text changed. A missing search-path section downgrades to
/// [`SearchPathOutcome::Skipped`]; any other error leaves the file untouched.
pub fn patch_project_file(
    layout: &ProjectLayout,
    options: &PatchOptions,
) -> Result<PatchReport, FwError> {
    let pbxproj = layout.pbxproj();
    if !pbxproj.is_file() {
        return Err(FwError::missing(
            "Xcode project file",
            &pbxproj,
            "Run from the Flutter project root (or its ios/ folder), or regenerate the iOS project with `flutter create .`.",
        ));
    }
    let framework_dir = layout.framework_dir();
    if !framework_dir.is_dir() {
        return Err(FwError::missing(
            "Framework",
            &framework_dir,
            "Download the SDK and unpack the .framework bundle into ios/Frameworks/.",
        ));
    }

    let original = fs::read_to_string(&pbxproj)?;
    let mut manifest = PbxprojText::new(original.as_str());

    let reference = manifest.ensure_framework_reference(&FrameworkRef::for_layout(layout))?;

    let search_path = match &options.search_path {
        Some(value) => Some(match manifest.ensure_search_path(value) {
            Ok(outcome) => outcome,
            Err(FwError::PatternNotFound(what)) => {
                warn!("could not locate {}, search path left unchanged", what);
                SearchPathOutcome::Skipped {
                    reason: format!("could not find {}", what),
                }
            }
            Err(e) => return Err(e),
        }),
        None => None,
    };

    let changed = manifest.as_str() != original;
    let written = changed && !options.dry_run;
    if written {
        write_file(&pbxproj, manifest.as_str())?;
    }

    Ok(PatchReport {
        reference,
        search_path,
        written,
    })
}

fn write_file(path: &Path, contents: &str) -> Result<(), FwError> {
    debug!("writing {}", path.display());
    fs::write(path, contents)?;
    Ok(())
}

#[cfg(test)]
pub(crate) mod fixtures {
    /// Trimmed project file in the shape `flutter create` generates.
    pub const FLUTTER_PBXPROJ: &str = "// !$*UTF8*$!
{
	archiveVersion = 1;
	classes = {
	};
	objectVersion = 54;
	objects = {

/* Begin PBXBuildFile section */
		1498D2341E8E89220040F4C2 /* GeneratedPluginRegistrant.m in Sources */ = {isa = PBXBuildFile; fileRef = 1498D2331E8E89220040F4C2 /* GeneratedPluginRegistrant.m */; };
		74858FAF1ED2DC5600515810 /* AppDelegate.swift in Sources */ = {isa = PBXBuildFile; fileRef = 74858FAE1ED2DC5600515810 /* AppDelegate.swift */; };
/* End PBXBuildFile section */

/* Begin PBXFileReference section */
		1498D2331E8E89220040F4C2 /* GeneratedPluginRegistrant.m */ = {isa = PBXFileReference; fileEncoding = 4; lastKnownFileType = sourcecode.c.objc; path = GeneratedPluginRegistrant.m; sourceTree = \"<group>\"; };
		74858FAE1ED2DC5600515810 /* AppDelegate.swift */ = {isa = PBXFileReference; fileEncoding = 4; lastKnownFileType = sourcecode.swift; path = AppDelegate.swift; sourceTree = \"<group>\"; };
		97C146EE1CF9000F007C117D /* Runner.app */ = {isa = PBXFileReference; explicitFileType = wrapper.application; includeInIndex = 0; path = Runner.app; sourceTree = BUILT_PRODUCTS_DIR; };
/* End PBXFileReference section */

/* Begin PBXFrameworksBuildPhase section */
		97C146EB1CF9000F007C117D /* Frameworks */ = {
			isa = PBXFrameworksBuildPhase;
			buildActionMask = 2147483647;
			files = (
			);
			runOnlyForDeploymentPostprocessing = 0;
		};
/* End PBXFrameworksBuildPhase section */

/* Begin PBXGroup section */
		97C146E51CF9000F007C117D = {
			isa = PBXGroup;
			children = (
				97C146F01CF9000F007C117D /* Runner */,
				97C146EF1CF9000F007C117D /* Products */,
			);
			sourceTree = \"<group>\";
		};
		97C146EF1CF9000F007C117D /* Products */ = {
			isa = PBXGroup;
			children = (
				97C146EE1CF9000F007C117D /* Runner.app */,
			);
			name = Products;
			sourceTree = \"<group>\";
		};
		97C146F01CF9000F007C117D /* Runner */ = {
			isa = PBXGroup;
			children = (
				74858FAE1ED2DC5600515810 /* AppDelegate.swift */,
				1498D2331E8E89220040F4C2 /* GeneratedPluginRegistrant.m */,
			);
			path = Runner;
			sourceTree = \"<group>\";
		};
/* End PBXGroup section */

/* Begin XCBuildConfiguration section */
		97C147031CF9000F007C117D /* Debug */ = {
			isa = XCBuildConfiguration;
			buildSettings = {
				ALWAYS_SEARCH_USER_PATHS = NO;
				SDKROOT = iphoneos;
			};
			name = Debug;
		};
		97C147061CF9000F007C117D /* Debug */ = {
			isa = XCBuildConfiguration;
			baseConfigurationReference = 9740EEB21CF90195004384FC /* Debug.xcconfig */;
			buildSettings = {
				ASSETCATALOG_COMPILER_APPICON_NAME = AppIcon;
				ENABLE_BITCODE = NO;
				INFOPLIST_FILE = Runner/Info.plist;
				PRODUCT_BUNDLE_IDENTIFIER = com.example.myTime;
				PRODUCT_NAME = \"$(TARGET_NAME)\";
			};
			name = Debug;
		};
		97C147071CF9000F007C117D /* Release */ = {
			isa = XCBuildConfiguration;
			baseConfigurationReference = 7AFA3C8E1D35360C0083082E /* Release.xcconfig */;
			buildSettings = {
				ASSETCATALOG_COMPILER_APPICON_NAME = AppIcon;
				ENABLE_BITCODE = NO;
				FRAMEWORK_SEARCH_PATHS = (
					\"$(inherited)\",
					\"$(PROJECT_DIR)/Flutter\",
				);
				INFOPLIST_FILE = Runner/Info.plist;
				PRODUCT_BUNDLE_IDENTIFIER = com.example.myTime;
				PRODUCT_NAME = \"$(TARGET_NAME)\";
			};
			name = Release;
		};
		249021D4217E4FDB00AE95B9 /* Profile */ = {
			isa = XCBuildConfiguration;
			baseConfigurationReference = 7AFA3C8E1D35360C0083082E /* Release.xcconfig */;
			buildSettings = {
				FRAMEWORK_SEARCH_PATHS = \"$(PROJECT_DIR)/Flutter\";
				INFOPLIST_FILE = Runner/Info.plist;
				PRODUCT_BUNDLE_IDENTIFIER = com.example.myTime;
			};
			name = Profile;
		};
/* End XCBuildConfiguration section */
	};
	rootObject = 97C146E61CF9000F007C117D /* Project object */;
}
";
}
