//! External tool invocation (`git`, `buildah`).

use std::ffi::OsStr;
use std::path::PathBuf;
use std::process::Command;

use anyhow::{Context as _, bail};
use recast_common::error::RecastError;

/// An external program located on `PATH`.
#[derive(Debug, Clone)]
pub struct Tool {
    name: &'static str,
    path: PathBuf,
}

impl Tool {
    /// Locates `name` on `PATH`.
    ///
    /// # Errors
    ///
    /// Returns an error if the program is not installed.
    pub fn find(name: &'static str) -> anyhow::Result<Self> {
        let path = which::which(name).map_err(|_| RecastError::NotFound {
            kind: "program",
            id: name.to_string(),
        })?;
        Ok(Self { name, path })
    }

    /// Runs the tool with inherited stdio and waits for it.
    ///
    /// # Errors
    ///
    /// Returns an error if the tool cannot be started or exits unsuccessfully.
    pub fn run<I, S>(&self, args: I) -> anyhow::Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let args: Vec<S> = args.into_iter().collect();
        tracing::debug!(
            tool = self.name,
            args = ?args.iter().map(|a| a.as_ref().to_string_lossy()).collect::<Vec<_>>(),
            "running"
        );
        let status = Command::new(&self.path)
            .args(&args)
            .status()
            .with_context(|| format!("failed to start {}", self.name))?;
        if !status.success() {
            bail!("{} exited with {status}", self.name);
        }
        Ok(())
    }
}
