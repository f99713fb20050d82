//! # recast-sources
//!
//! External collaborators that turn a name into a version string.
//!
//! Each concern sits behind a small trait so the renderer can be driven by
//! fakes in tests:
//! - **Registry**: latest manifest digest for an image reference.
//! - **Git**: highest stable semver tag of a remote repository.
//! - **Alpine**: latest package versions from the `APKINDEX`.
//! - **Content**: first regex match in a fetched document.
//! - **Releases**: version, download URL and checksum of tracked artifacts.
//!
//! None of these impose retries; every HTTP call carries a timeout.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod alpine;
pub mod content;
pub mod git;
pub mod http;
pub mod registry;
pub mod release;

use std::collections::BTreeMap;
use std::sync::Arc;

use recast_common::config::SourcesConfig;
use recast_common::error::Result;

pub use release::Release;

/// An image reference resolved against its registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedImage {
    /// Fully-qualified image name, e.g. `reg.c5h.io/base`.
    pub image: String,
    /// Manifest digest including its algorithm, e.g. `sha256:abcd...`.
    pub digest: String,
}

/// Looks up the current digest of an image.
pub trait DigestResolver: Send + Sync {
    /// Resolves `reference` to its qualified name and latest digest.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry cannot be reached or has no such image.
    fn latest_digest(&self, reference: &str) -> Result<ResolvedImage>;

    /// Address of the registry unqualified references resolve against.
    fn registry(&self) -> &str;
}

/// Finds the latest stable tag of a git repository.
pub trait TagResolver: Send + Sync {
    /// Returns the highest non-prerelease semver tag of `repo_url`, considering
    /// only tags that start with `prefix`. The returned tag keeps its prefix.
    ///
    /// # Errors
    ///
    /// Returns an error if the remote cannot be listed or has no stable tag.
    fn latest_tag(&self, repo_url: &str, prefix: &str) -> Result<String>;
}

/// Resolves OS package names to their current versions.
pub trait PackageResolver: Send + Sync {
    /// Returns a version for every requested package.
    ///
    /// # Errors
    ///
    /// Returns an error if the index cannot be fetched or a package is unknown.
    fn latest_packages(&self, names: &[String]) -> Result<BTreeMap<String, String>>;
}

/// Extracts a value from a remote document with a regular expression.
pub trait ContentResolver: Send + Sync {
    /// Fetches `url` and returns the first capture group of `pattern`
    /// (or the whole match when the pattern has no groups).
    ///
    /// # Errors
    ///
    /// Returns an error if the fetch fails, the pattern is invalid, or nothing matches.
    fn regex_url_content(&self, url: &str, pattern: &str) -> Result<String>;
}

/// Provides the latest release of one tracked artifact family.
pub trait ReleaseProvider: Send + Sync {
    /// Family name, used as the template function prefix and material key.
    fn family(&self) -> &str;

    /// Resolves the latest release.
    ///
    /// # Errors
    ///
    /// Returns an error if the release feed cannot be fetched or parsed.
    fn latest_release(&self) -> Result<Release>;
}

/// The full set of resolvers the function registry is built from.
#[derive(Clone)]
pub struct Resolvers {
    /// Registry digest lookups.
    pub digests: Arc<dyn DigestResolver>,
    /// Git tag lookups.
    pub tags: Arc<dyn TagResolver>,
    /// Package index lookups.
    pub packages: Arc<dyn PackageResolver>,
    /// Regex-scraped documents.
    pub content: Arc<dyn ContentResolver>,
    /// Release-tracked artifact families.
    pub releases: Vec<Arc<dyn ReleaseProvider>>,
}

impl Resolvers {
    /// Builds the network-backed resolvers described by `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn from_config(config: &SourcesConfig) -> Result<Self> {
        let http = http::client()?;

        let mut releases: Vec<Arc<dyn ReleaseProvider>> = vec![
            Arc::new(alpine::AlpineRelease::new(http.clone(), &config.alpine_mirror)),
            Arc::new(release::GolangRelease::new(http.clone())),
        ];
        for major in &config.postgres_majors {
            releases.push(Arc::new(release::PostgresRelease::new(http.clone(), major)));
        }

        tracing::debug!(
            registry = %config.registry,
            families = releases.len(),
            "configured resolvers"
        );

        Ok(Self {
            digests: Arc::new(registry::RegistryClient::new(http.clone(), config)),
            tags: Arc::new(git::GitTagResolver),
            packages: Arc::new(alpine::AlpineIndex::new(http.clone(), &config.alpine_mirror)),
            content: Arc::new(content::RegexContent::new(http)),
            releases,
        })
    }
}

impl std::fmt::Debug for Resolvers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolvers")
            .field("registry", &self.digests.registry())
            .field(
                "releases",
                &self.releases.iter().map(|r| r.family()).collect::<Vec<_>>(),
            )
            .finish_non_exhaustive()
    }
}
