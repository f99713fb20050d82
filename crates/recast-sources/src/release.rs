//! Release-tracked artifacts: Go toolchain and PostgreSQL sources.

use std::sync::LazyLock;

use recast_common::error::{RecastError, Result};
use regex::Regex;
use reqwest::blocking::Client;
use serde::Deserialize;

use crate::ReleaseProvider;
use crate::http::get_text;

const GOLANG_FEED: &str = "https://go.dev/dl/?mode=json";
const GOLANG_DOWNLOADS: &str = "https://go.dev/dl/";
const POSTGRES_SOURCES: &str = "https://ftp.postgresql.org/pub/source/";

static POSTGRES_DIR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"href="v(\d+)\.(\d+)/""#).unwrap_or_else(|_| unreachable!("static pattern"))
});

/// One resolved release: the version recorded in the BOM plus the values
/// templates embed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Release {
    /// Version string, recorded as the material value.
    pub version: String,
    /// Download URL of the artifact.
    pub url: String,
    /// Checksum of the artifact.
    pub checksum: String,
}

#[derive(Debug, Deserialize)]
struct GoVersion {
    version: String,
    stable: bool,
    files: Vec<GoFile>,
}

#[derive(Debug, Deserialize)]
struct GoFile {
    filename: String,
    os: String,
    arch: String,
    kind: String,
    sha256: String,
}

/// Latest stable Go toolchain for linux/amd64, the `golang` family.
#[derive(Debug, Clone)]
pub struct GolangRelease {
    http: Client,
}

impl GolangRelease {
    /// Creates the provider.
    #[must_use]
    pub const fn new(http: Client) -> Self {
        Self { http }
    }
}

impl ReleaseProvider for GolangRelease {
    fn family(&self) -> &str {
        "golang"
    }

    fn latest_release(&self) -> Result<Release> {
        let feed = get_text(&self.http, GOLANG_FEED)?;
        select_golang(&feed).map_err(|message| RecastError::resolver("golang", message))
    }
}

/// Picks the newest stable linux/amd64 archive from the Go download feed.
///
/// # Errors
///
/// Returns a description of the problem if the feed is malformed or has no
/// matching archive.
pub fn select_golang(feed: &str) -> std::result::Result<Release, String> {
    let versions: Vec<GoVersion> =
        serde_json::from_str(feed).map_err(|e| format!("invalid download feed: {e}"))?;
    versions
        .into_iter()
        .filter(|v| v.stable)
        .find_map(|v| {
            let file = v
                .files
                .into_iter()
                .find(|f| f.os == "linux" && f.arch == "amd64" && f.kind == "archive")?;
            Some(Release {
                version: v.version.trim_start_matches("go").to_string(),
                url: format!("{GOLANG_DOWNLOADS}{}", file.filename),
                checksum: file.sha256,
            })
        })
        .ok_or_else(|| "no stable linux/amd64 archive in download feed".to_string())
}

/// Latest PostgreSQL source release within one major version.
#[derive(Debug, Clone)]
pub struct PostgresRelease {
    http: Client,
    major: String,
    family: String,
}

impl PostgresRelease {
    /// Creates a provider for `postgres<major>`.
    #[must_use]
    pub fn new(http: Client, major: &str) -> Self {
        Self {
            http,
            major: major.to_string(),
            family: format!("postgres{major}"),
        }
    }
}

impl ReleaseProvider for PostgresRelease {
    fn family(&self) -> &str {
        &self.family
    }

    fn latest_release(&self) -> Result<Release> {
        let listing = get_text(&self.http, POSTGRES_SOURCES)?;
        let version = latest_postgres(&listing, &self.major).ok_or_else(|| {
            RecastError::resolver(&self.family, "no release listed for this major version")
        })?;

        let url = format!("{POSTGRES_SOURCES}v{version}/postgresql-{version}.tar.bz2");
        let checksum_file = get_text(&self.http, &format!("{url}.sha256"))?;
        let checksum = checksum_file
            .split_whitespace()
            .next()
            .ok_or_else(|| RecastError::resolver(&self.family, "empty checksum file"))?
            .to_string();

        Ok(Release {
            version,
            url,
            checksum,
        })
    }
}

/// Finds the highest `<major>.<minor>` directory in the source listing.
#[must_use]
pub fn latest_postgres(listing: &str, major: &str) -> Option<String> {
    POSTGRES_DIR
        .captures_iter(listing)
        .filter(|caps| &caps[1] == major)
        .filter_map(|caps| caps[2].parse::<u32>().ok())
        .max()
        .map(|minor| format!("{major}.{minor}"))
}
