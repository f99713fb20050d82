//! Latest stable tag lookups via `git ls-remote`.

use std::process::Command;

use recast_common::error::{RecastError, Result};
use semver::Version;

use crate::TagResolver;

/// Maps a GitHub `org/repo` slug to its clone URL.
#[must_use]
pub fn github_url(repo: &str) -> String {
    format!("https://github.com/{repo}")
}

/// Resolves tags by listing the remote with the `git` binary.
#[derive(Debug, Clone, Copy, Default)]
pub struct GitTagResolver;

impl TagResolver for GitTagResolver {
    fn latest_tag(&self, repo_url: &str, prefix: &str) -> Result<String> {
        tracing::debug!(repo = repo_url, prefix, "listing remote tags");

        let output = Command::new("git")
            .args(["ls-remote", "--tags", "--refs", repo_url])
            .output()
            .map_err(|e| RecastError::Io {
                path: "git".into(),
                source: e,
            })?;

        if !output.status.success() {
            return Err(RecastError::resolver(
                repo_url,
                format!(
                    "git ls-remote failed: {}",
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            ));
        }

        let tags = parse_ls_remote(&String::from_utf8_lossy(&output.stdout));
        latest_stable_tag(&tags, prefix).ok_or_else(|| {
            RecastError::resolver(
                repo_url,
                format!("no stable semver tag found with prefix '{prefix}'"),
            )
        })
    }
}

/// Extracts tag names from `git ls-remote --tags` output.
#[must_use]
pub fn parse_ls_remote(output: &str) -> Vec<String> {
    output
        .lines()
        .filter_map(|line| line.split_whitespace().nth(1))
        .filter_map(|reference| reference.strip_prefix("refs/tags/"))
        .filter(|tag| !tag.ends_with("^{}"))
        .map(ToString::to_string)
        .collect()
}

/// Parses a tag into a version once `prefix` has been stripped.
///
/// A leading `v` is tolerated and missing minor/patch components are
/// filled with zero, so `v1.2` parses as `1.2.0`.
#[must_use]
pub fn parse_tag(tag: &str, prefix: &str) -> Option<Version> {
    let raw = tag.strip_prefix(prefix)?;
    let raw = raw.strip_prefix('v').unwrap_or(raw);
    if let Ok(version) = Version::parse(raw) {
        return Some(version);
    }

    let core_len = raw.find(['-', '+']).unwrap_or(raw.len());
    let (core, suffix) = raw.split_at(core_len);
    let padded = match core.split('.').count() {
        1 => format!("{core}.0.0{suffix}"),
        2 => format!("{core}.0{suffix}"),
        _ => return None,
    };
    Version::parse(&padded).ok()
}

/// Returns the tag with the highest non-prerelease version.
#[must_use]
pub fn latest_stable_tag(tags: &[String], prefix: &str) -> Option<String> {
    tags.iter()
        .filter_map(|tag| parse_tag(tag, prefix).map(|version| (version, tag)))
        .filter(|(version, _)| version.pre.is_empty())
        .max_by(|(a, _), (b, _)| a.cmp(b))
        .map(|(_, tag)| tag.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(names: &[&str]) -> Vec<String> {
        names.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn ls_remote_output_yields_tag_names() {
        let output = "\
aaaa\trefs/tags/v1.0.0
bbbb\trefs/tags/v1.1.0
cccc\trefs/tags/v1.1.0^{}
dddd\trefs/heads/main
";
        assert_eq!(parse_ls_remote(output), tags(&["v1.0.0", "v1.1.0"]));
    }

    #[test]
    fn latest_skips_prereleases() {
        let candidates = tags(&["v1.9.0", "v2.0.0-rc.1", "v1.10.0", "nightly"]);
        assert_eq!(latest_stable_tag(&candidates, ""), Some("v1.10.0".into()));
    }

    #[test]
    fn latest_respects_prefix() {
        let candidates = tags(&["release-1.2", "release-1.10", "v9.0.0", "other-3.0.0"]);
        assert_eq!(
            latest_stable_tag(&candidates, "release-"),
            Some("release-1.10".into())
        );
    }

    #[test]
    fn latest_none_without_stable_tags() {
        assert_eq!(latest_stable_tag(&tags(&["v1.0.0-beta"]), ""), None);
        assert_eq!(latest_stable_tag(&[], ""), None);
    }

    #[test]
    fn parse_tag_pads_short_versions() {
        assert_eq!(parse_tag("v3", ""), Some(Version::new(3, 0, 0)));
        assert_eq!(parse_tag("1.2-rc1", "").map(|v| v.pre.is_empty()), Some(false));
        assert_eq!(parse_tag("1.2.3.4", ""), None);
    }

    #[test]
    fn github_slug_maps_to_url() {
        assert_eq!(github_url("csmith/gitrefs"), "https://github.com/csmith/gitrefs");
    }
}
