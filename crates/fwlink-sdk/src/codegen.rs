//! Generated file contents.
//!
//! The canonical module map, the Swift bridging header and the build-time
//! verification script are embedded templates with `{{NAME}}` placeholders.

use std::path::Path;

use include_dir::{Dir, include_dir};

use crate::types::{FrameworkSpec, FwError, ProjectLayout};

const TEMPLATES: Dir = include_dir!("$CARGO_MANIFEST_DIR/templates");

/// Template variable that can be replaced in template files
#[derive(Debug, Clone)]
pub struct TemplateVar {
    pub name: &'static str,
    pub value: String,
}

/// Canonical module map declaring the framework with its umbrella header.
pub fn module_map(framework: &FrameworkSpec) -> Result<String, FwError> {
    render(
        "module.modulemap",
        &[
            TemplateVar {
                name: "FRAMEWORK_NAME",
                value: framework.name.clone(),
            },
            TemplateVar {
                name: "UMBRELLA_HEADER",
                value: framework.umbrella_header_name(),
            },
        ],
    )
}

/// Bridging header importing the framework's umbrella header.
pub fn bridging_header(layout: &ProjectLayout) -> Result<String, FwError> {
    render(
        "bridging-header.h",
        &[
            TemplateVar {
                name: "TARGET",
                value: layout.target.clone(),
            },
            TemplateVar {
                name: "FRAMEWORK_NAME",
                value: layout.framework.name.clone(),
            },
            TemplateVar {
                name: "UMBRELLA_HEADER",
                value: layout.framework.umbrella_header_name(),
            },
        ],
    )
}

/// Shell script that re-verifies the framework directory at build time.
pub fn setup_script(layout: &ProjectLayout) -> Result<String, FwError> {
    render(
        "setup_framework.sh",
        &[
            TemplateVar {
                name: "FRAMEWORK_NAME",
                value: layout.framework.name.clone(),
            },
            TemplateVar {
                name: "FRAMEWORK_BUNDLE",
                value: layout.framework.bundle_name(),
            },
            TemplateVar {
                name: "FRAMEWORK_DIR",
                value: layout.framework_dir_display(),
            },
        ],
    )
}

/// Renders an embedded template by file name.
pub fn render(name: &str, vars: &[TemplateVar]) -> Result<String, FwError> {
    let file = TEMPLATES
        .get_file(name)
        .ok_or_else(|| FwError::Template(format!("no embedded template named {:?}", name)))?;
    let text = file
        .contents_utf8()
        .ok_or_else(|| FwError::Template(format!("template {:?} is not valid UTF-8", name)))?;
    let rendered = render_template(text, vars);
    validate_no_unreplaced_placeholders(&rendered, Path::new(name))?;
    Ok(rendered)
}

/// Validates that no unreplaced template placeholders remain in the rendered content
fn validate_no_unreplaced_placeholders(content: &str, file_path: &Path) -> Result<(), FwError> {
    let mut pos = 0;
    let mut unreplaced = Vec::new();

    while let Some(start) = content[pos..].find("{{") {
        let abs_start = pos + start;
        if let Some(end) = content[abs_start..].find("}}") {
            let placeholder = &content[abs_start..abs_start + end + 2];
            let var_name = &content[abs_start + 2..abs_start + end];
            // Shell `${...}` and brace-heavy text are not ours
            if !var_name.contains('$') && !var_name.contains(' ') && !var_name.is_empty() {
                unreplaced.push(placeholder.to_string());
            }
            pos = abs_start + end + 2;
        } else {
            break;
        }
    }

    if !unreplaced.is_empty() {
        return Err(FwError::Template(format!(
            "unreplaced placeholders in {:?}: {:?}",
            file_path, unreplaced
        )));
    }

    Ok(())
}

fn render_template(input: &str, vars: &[TemplateVar]) -> String {
    let mut output = input.to_string();
    for var in vars {
        output = output.replace(&format!("{{{{{}}}}}", var.name), &var.value);
    }
    output
}
