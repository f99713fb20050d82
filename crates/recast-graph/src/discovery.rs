//! Project discovery.
//!
//! Hidden directories (a name starting with `.`, other than `.` itself)
//! are never descended into.

use std::path::{Path, PathBuf};

use recast_common::constants::{DESCRIPTOR_NAMES, IGNORE_MARKER};
use recast_common::error::{RecastError, Result};
use walkdir::{DirEntry, WalkDir};

/// A directory holding a project template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateProject {
    /// Project name: the directory's own name.
    pub name: String,
    /// Directory relative to the discovery root.
    pub dir: PathBuf,
    /// Template path relative to the discovery root.
    pub template: PathBuf,
}

fn is_hidden(entry: &DirEntry) -> bool {
    let name = entry.file_name().to_string_lossy();
    entry.depth() > 0 && entry.file_type().is_dir() && name.len() > 1 && name.starts_with('.')
}

fn walk(root: &Path) -> impl Iterator<Item = Result<DirEntry>> {
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_hidden(e))
        .map(|entry| {
            entry.map_err(|e| {
                let path = e.path().unwrap_or(root).to_path_buf();
                RecastError::Io {
                    path,
                    source: e.into(),
                }
            })
        })
}

/// Finds every directory under `root` containing `template_name`.
///
/// Directories that also contain an `IGNORE` marker are skipped. Results
/// are in path order.
///
/// # Errors
///
/// Returns an error if the tree cannot be walked.
pub fn find_template_projects(root: &Path, template_name: &str) -> Result<Vec<TemplateProject>> {
    let mut projects = Vec::new();
    for entry in walk(root) {
        let entry = entry?;
        if !entry.file_type().is_file() || entry.file_name() != template_name {
            continue;
        }
        let Some(dir) = entry.path().parent() else {
            continue;
        };
        if dir.join(IGNORE_MARKER).exists() {
            tracing::debug!(dir = %dir.display(), "skipping ignored project");
            continue;
        }
        let Some(name) = dir.file_name().map(|n| n.to_string_lossy().into_owned()) else {
            continue;
        };
        let relative = |path: &Path| path.strip_prefix(root).unwrap_or(path).to_path_buf();
        projects.push(TemplateProject {
            name,
            dir: relative(dir),
            template: relative(entry.path()),
        });
    }
    tracing::debug!(root = %root.display(), count = projects.len(), "discovered template projects");
    Ok(projects)
}

/// Finds every rendered descriptor (`Dockerfile`/`Containerfile`, any case) under `root`.
///
/// # Errors
///
/// Returns an error if the tree cannot be walked.
pub fn find_descriptors(root: &Path) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    for entry in walk(root) {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().to_lowercase();
        if entry.file_type().is_file() && DESCRIPTOR_NAMES.contains(&name.as_str()) {
            found.push(entry.into_path());
        }
    }
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(root: &Path, relative: &str) {
        let path = root.join(relative);
        std::fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        std::fs::write(path, "").expect("write");
    }

    #[test]
    fn finds_template_directories_in_path_order() {
        let dir = tempfile::tempdir().expect("tempdir");
        touch(dir.path(), "golang/Dockerfile.tera");
        touch(dir.path(), "base/Dockerfile.tera");
        touch(dir.path(), "base/README.md");

        let projects = find_template_projects(dir.path(), "Dockerfile.tera").expect("find");
        assert_eq!(
            projects,
            vec![
                TemplateProject {
                    name: "base".into(),
                    dir: PathBuf::from("base"),
                    template: PathBuf::from("base/Dockerfile.tera"),
                },
                TemplateProject {
                    name: "golang".into(),
                    dir: PathBuf::from("golang"),
                    template: PathBuf::from("golang/Dockerfile.tera"),
                },
            ]
        );
    }

    #[test]
    fn ignore_marker_and_hidden_directories_are_skipped() {
        let dir = tempfile::tempdir().expect("tempdir");
        touch(dir.path(), "kept/Dockerfile.tera");
        touch(dir.path(), "retired/Dockerfile.tera");
        touch(dir.path(), "retired/IGNORE");
        touch(dir.path(), ".git/Dockerfile.tera");
        touch(dir.path(), ".github/nested/Dockerfile.tera");

        let projects = find_template_projects(dir.path(), "Dockerfile.tera").expect("find");
        let names: Vec<&str> = projects.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["kept"]);
    }

    #[test]
    fn descriptors_match_case_insensitively() {
        let dir = tempfile::tempdir().expect("tempdir");
        touch(dir.path(), "a/Dockerfile");
        touch(dir.path(), "b/containerfile");
        touch(dir.path(), "c/DOCKERFILE");
        touch(dir.path(), "d/Dockerfile.tera");
        touch(dir.path(), ".cache/e/Dockerfile");

        let found = find_descriptors(dir.path()).expect("find");
        let relative: Vec<PathBuf> = found
            .iter()
            .map(|p| p.strip_prefix(dir.path()).expect("prefix").to_path_buf())
            .collect();
        assert_eq!(
            relative,
            vec![
                PathBuf::from("a/Dockerfile"),
                PathBuf::from("b/containerfile"),
                PathBuf::from("c/DOCKERFILE"),
            ]
        );
    }

    #[test]
    fn missing_root_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(find_template_projects(&dir.path().join("nope"), "Dockerfile.tera").is_err());
    }
}
