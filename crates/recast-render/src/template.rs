//! Template loading.
//!
//! A project's template is loaded together with every partial found in
//! `<template_base>/_partials/`, each under the name `_partials/<file>`.

use std::error::Error as _;
use std::path::{Path, PathBuf};

use recast_common::constants::PARTIALS_DIR;
use recast_common::error::{RecastError, Result};
use tera::Tera;

/// A template engine holding one project template and the shared partials.
#[derive(Debug)]
pub struct LoadedTemplate {
    /// Engine with autoescaping disabled; functions are bound by the caller.
    pub tera: Tera,
    /// Name under which the project template was registered.
    pub name: String,
}

impl LoadedTemplate {
    /// Reads `template_base/template_relative` and the partials beside it.
    ///
    /// # Errors
    ///
    /// Returns [`RecastError::Io`] if a file cannot be read and
    /// [`RecastError::Template`] if a template does not parse.
    pub fn load(template_base: &Path, template_relative: &Path) -> Result<Self> {
        let name = template_name(template_relative);
        let path = template_base.join(template_relative);
        let body = read(&path)?;

        let mut sources = partials(&template_base.join(PARTIALS_DIR))?;
        sources.push((name.clone(), body));

        let mut tera = Tera::default();
        tera.autoescape_on(Vec::new());
        tera.add_raw_templates(sources)
            .map_err(|e| template_error(&name, &e))?;

        tracing::debug!(template = %name, "loaded template");
        Ok(Self { tera, name })
    }
}

/// Template name with `/` separators regardless of platform.
#[must_use]
pub fn template_name(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Converts an engine error into [`RecastError::Template`], keeping its causes.
#[must_use]
pub fn template_error(template: &str, error: &tera::Error) -> RecastError {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    RecastError::Template {
        template: template.to_string(),
        message,
    }
}

fn partials(dir: &Path) -> Result<Vec<(String, String)>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let entries = std::fs::read_dir(dir).map_err(|source| io_error(dir, source))?;

    let mut files: Vec<PathBuf> = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| io_error(dir, source))?;
        let path = entry.path();
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();

    files
        .into_iter()
        .filter_map(|path| {
            let file = path.file_name()?.to_string_lossy().into_owned();
            Some((path, file))
        })
        .map(|(path, file)| Ok((format!("{PARTIALS_DIR}/{file}"), read(&path)?)))
        .collect()
}

fn read(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|source| io_error(path, source))
}

fn io_error(path: &Path, source: std::io::Error) -> RecastError {
    RecastError::Io {
        path: path.to_path_buf(),
        source,
    }
}
