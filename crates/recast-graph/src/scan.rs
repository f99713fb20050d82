//! Dependency scan over rendered descriptors.
//!
//! A dependency is any `FROM` line whose image lives in the configured
//! registry. Matching is case-insensitive; `--flag` arguments before the
//! image are skipped.

use std::path::Path;

use nom::{
    IResult, Parser,
    bytes::complete::{tag, tag_no_case, take_till1},
    character::complete::{space0, space1},
    multi::many0,
    sequence::{preceded, terminated},
};
use recast_common::error::{RecastError, Result};
use recast_common::types::Project;

fn word(input: &str) -> IResult<&str, &str> {
    take_till1(|c: char| c.is_whitespace()).parse(input)
}

/// Parses a `FROM` instruction and returns its image argument.
fn from_image(line: &str) -> IResult<&str, &str> {
    let flag = terminated(preceded(tag("--"), word), space1);
    let (input, _) = (space0, tag_no_case("from"), space1, many0(flag)).parse(line)?;
    word(input)
}

/// Returns the registry projects referenced by `FROM` lines in `content`.
///
/// Names are lowercased, lose any `@digest` or `:tag` suffix, appear once
/// each in first-seen order, and never include `own_name`.
///
/// Image repository names are always lowercase, so a project directory
/// with uppercase letters never matches here. The dry run keeps the case
/// written in the template, so the two strategies only agree for
/// lowercase project names.
#[must_use]
pub fn read_dependencies(content: &str, registry: &str, own_name: &str) -> Vec<String> {
    let repo = format!("{}/", registry.to_lowercase());
    let own_name = own_name.to_lowercase();

    let mut dependencies: Vec<String> = Vec::new();
    for line in content.lines() {
        let Ok((_, image)) = from_image(line) else {
            continue;
        };
        let image = image.to_lowercase();
        let Some(name) = image.strip_prefix(&repo) else {
            continue;
        };
        let name = name.split('@').next().unwrap_or_default();
        let name = name.split(':').next().unwrap_or_default();
        if !name.is_empty() && name != own_name && !dependencies.iter().any(|d| d == name) {
            dependencies.push(name.to_string());
        }
    }
    dependencies
}

/// Scans a descriptor file; the project is named after its directory.
///
/// # Errors
///
/// Returns an error if the file cannot be read or has no parent directory name.
pub fn scan_descriptor(path: &Path, registry: &str) -> Result<Project> {
    let name = path
        .parent()
        .and_then(Path::file_name)
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| RecastError::Config {
            message: format!("descriptor {} is not inside a project directory", path.display()),
        })?;
    let content = std::fs::read_to_string(path).map_err(|source| RecastError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let needed = read_dependencies(&content, registry, &name);
    tracing::debug!(project = %name, ?needed, "scanned descriptor");
    Ok(Project::new(name, needed))
}
