//! Alpine Linux package index and release lookups.
//!
//! Package versions come from the signed `APKINDEX.tar.gz` of the `main`
//! and `community` repositories; the minirootfs release comes from
//! `latest-releases.yaml`.

use std::collections::BTreeMap;
use std::io::Read;

use flate2::read::MultiGzDecoder;
use recast_common::error::{RecastError, Result};
use reqwest::blocking::Client;
use serde::Deserialize;

use crate::http::{get_bytes, get_text, join_url};
use crate::{PackageResolver, Release, ReleaseProvider};

const REPOSITORIES: &[&str] = &["main", "community"];
const ARCH: &str = "x86_64";
const MINIROOTFS_TITLE: &str = "Mini root filesystem";

/// Package version lookups against an Alpine mirror.
#[derive(Debug, Clone)]
pub struct AlpineIndex {
    http: Client,
    mirror: String,
}

impl AlpineIndex {
    /// Creates a resolver reading indexes from `mirror`.
    #[must_use]
    pub fn new(http: Client, mirror: &str) -> Self {
        Self {
            http,
            mirror: mirror.to_string(),
        }
    }

    fn load_repository(&self, repository: &str) -> Result<BTreeMap<String, String>> {
        let url = join_url(
            &self.mirror,
            &format!("latest-stable/{repository}/{ARCH}/APKINDEX.tar.gz"),
        );
        let archive = get_bytes(&self.http, &url)?;
        let index = extract_index(&archive).map_err(|e| RecastError::resolver(&url, e))?;
        Ok(parse_apkindex(&index))
    }
}

impl PackageResolver for AlpineIndex {
    fn latest_packages(&self, names: &[String]) -> Result<BTreeMap<String, String>> {
        tracing::debug!(packages = ?names, "resolving alpine packages");

        let mut available = BTreeMap::new();
        for repository in REPOSITORIES {
            for (name, version) in self.load_repository(repository)? {
                let _ = available.entry(name).or_insert(version);
            }
        }

        names
            .iter()
            .map(|name| {
                available
                    .get(name)
                    .map(|version| (name.clone(), version.clone()))
                    .ok_or_else(|| {
                        RecastError::resolver(format!("apk:{name}"), "package not found in APKINDEX")
                    })
            })
            .collect()
    }
}

/// Reads the `APKINDEX` member out of a (multi-stream) gzipped tarball.
///
/// # Errors
///
/// Returns an error if the archive is unreadable or lacks an index.
pub fn extract_index(archive: &[u8]) -> std::io::Result<String> {
    let mut tarball = tar::Archive::new(MultiGzDecoder::new(archive));
    tarball.set_ignore_zeros(true);
    for entry in tarball.entries()? {
        let mut entry = entry?;
        if entry.path()?.to_string_lossy() == "APKINDEX" {
            let mut index = String::new();
            let _ = entry.read_to_string(&mut index)?;
            return Ok(index);
        }
    }
    Err(std::io::Error::new(
        std::io::ErrorKind::NotFound,
        "archive has no APKINDEX member",
    ))
}

/// Parses `P:`/`V:` pairs out of an `APKINDEX` document.
#[must_use]
pub fn parse_apkindex(index: &str) -> BTreeMap<String, String> {
    let mut packages = BTreeMap::new();
    for record in index.split("\n\n") {
        let mut name = None;
        let mut version = None;
        for line in record.lines() {
            if let Some(value) = line.strip_prefix("P:") {
                name = Some(value.trim());
            } else if let Some(value) = line.strip_prefix("V:") {
                version = Some(value.trim());
            }
        }
        if let (Some(name), Some(version)) = (name, version) {
            let _ = packages.insert(name.to_string(), version.to_string());
        }
    }
    packages
}

#[derive(Debug, Deserialize)]
struct ReleaseEntry {
    title: String,
    file: String,
    sha256: String,
    version: String,
}

/// Latest Alpine minirootfs, exposed as the `alpine` release family.
#[derive(Debug, Clone)]
pub struct AlpineRelease {
    http: Client,
    mirror: String,
}

impl AlpineRelease {
    /// Creates a provider reading release metadata from `mirror`.
    #[must_use]
    pub fn new(http: Client, mirror: &str) -> Self {
        Self {
            http,
            mirror: mirror.to_string(),
        }
    }
}

impl ReleaseProvider for AlpineRelease {
    fn family(&self) -> &str {
        "alpine"
    }

    fn latest_release(&self) -> Result<Release> {
        let base = join_url(&self.mirror, &format!("latest-stable/releases/{ARCH}/"));
        let index_url = join_url(&base, "latest-releases.yaml");
        let document = get_text(&self.http, &index_url)?;
        select_minirootfs(&document, &base)
            .map_err(|message| RecastError::resolver("alpine", message))
    }
}

/// Picks the minirootfs entry from a `latest-releases.yaml` document.
///
/// # Errors
///
/// Returns a description of the problem if the document does not parse or
/// lists no minirootfs.
pub fn select_minirootfs(document: &str, base_url: &str) -> std::result::Result<Release, String> {
    let entries: Vec<ReleaseEntry> =
        serde_yaml::from_str(document).map_err(|e| format!("invalid release index: {e}"))?;
    entries
        .into_iter()
        .find(|entry| entry.title == MINIROOTFS_TITLE)
        .map(|entry| Release {
            version: entry.version,
            url: join_url(base_url, &entry.file),
            checksum: entry.sha256,
        })
        .ok_or_else(|| format!("no release found matching '{MINIROOTFS_TITLE}'"))
}
