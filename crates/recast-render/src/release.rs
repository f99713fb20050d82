//! Single-resolution memo shared by a release family's accessors.

use std::sync::{Mutex, PoisonError};

use recast_common::error::Result;
use recast_sources::{Release, ReleaseProvider};

/// Resolves a release at most once and hands out copies afterwards.
///
/// A failed resolution is not cached; the failure aborts the render anyway.
#[derive(Debug, Default)]
pub struct ReleaseMemo {
    resolved: Mutex<Option<Release>>,
}

impl ReleaseMemo {
    /// Returns the memoized release, resolving it through `provider` first if needed.
    ///
    /// # Errors
    ///
    /// Returns the provider's error on the first (failing) resolution.
    pub fn get_or_resolve(&self, provider: &dyn ReleaseProvider) -> Result<Release> {
        let mut resolved = self.resolved.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(release) = resolved.as_ref() {
            return Ok(release.clone());
        }
        tracing::debug!(family = provider.family(), "resolving release");
        let release = provider.latest_release()?;
        *resolved = Some(release.clone());
        Ok(release)
    }
}
