//! Formatted output helpers for CLI commands.
//!
//! Provides commit message formatting and GitHub Actions log grouping.

use recast_common::types::Change;

/// Formats changes as the body of a commit message.
///
/// A single change is one line; several changes get a count header and
/// one line per change sorted by material.
#[must_use]
pub fn format_changes(changes: &[Change]) -> String {
    if changes.is_empty() {
        return "no detected changes".into();
    }

    let mut sorted = changes.to_vec();
    let mut message = String::new();
    if sorted.len() > 1 {
        message.push_str(&format!("{} changes\n", sorted.len()));
        sorted.sort_by(|a, b| a.material.cmp(&b.material));
    }

    for change in &sorted {
        message.push('\n');
        message.push_str(&format_change(change));
    }

    message
        .strip_prefix('\n')
        .map_or_else(|| message.clone(), ToString::to_string)
}

fn format_change(change: &Change) -> String {
    let material = &change.material;
    match (change.old.is_empty(), change.new.is_empty()) {
        (true, true) => format!("{material} unknown changes"),
        (true, false) => format!("{material} (unknown)->{}", truncate(&change.new, 8)),
        (false, true) => format!("{material} {}->(unknown)", truncate(&change.old, 8)),
        (false, false) => format!(
            "{material} {}->{}",
            truncate(&change.old, 12),
            truncate(&change.new, 12)
        ),
    }
}

fn truncate(value: &str, max: usize) -> &str {
    value.char_indices().nth(max).map_or(value, |(idx, _)| &value[..idx])
}

/// Wraps one project's log output in a collapsible workflow group.
#[derive(Debug)]
pub struct LogGroup {
    enabled: bool,
}

impl LogGroup {
    /// Opens a group named `title` when `enabled`.
    #[must_use]
    pub fn start(enabled: bool, title: &str) -> Self {
        if enabled {
            println!("::group::{title}");
        }
        Self { enabled }
    }
}

impl Drop for LogGroup {
    fn drop(&mut self) {
        if self.enabled {
            println!("::endgroup::");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_changes() {
        assert_eq!(format_changes(&[]), "no detected changes");
    }

    #[test]
    fn single_change_is_one_line() {
        let changes = [Change::new("image:base", "0123456789abcdef", "fedcba9876543210")];
        assert_eq!(format_changes(&changes), "image:base 0123456789ab->fedcba987654");
    }

    #[test]
    fn unknown_sides_use_short_truncation() {
        assert_eq!(
            format_changes(&[Change::new("golang", "", "1.22.5-long-suffix")]),
            "golang (unknown)->1.22.5-l"
        );
        assert_eq!(
            format_changes(&[Change::new("apk:curl", "8.5.0-r0-extra", "")]),
            "apk:curl 8.5.0-r0->(unknown)"
        );
        assert_eq!(
            format_changes(&[Change::new("regexurl:x", "", "")]),
            "regexurl:x unknown changes"
        );
    }

    #[test]
    fn several_changes_are_counted_and_sorted() {
        let changes = [
            Change::new("image:base", "aaa", "bbb"),
            Change::new("apk:curl", "1", "2"),
        ];
        assert_eq!(
            format_changes(&changes),
            "2 changes\n\napk:curl 1->2\nimage:base aaa->bbb"
        );
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate("ééééé", 3), "ééé");
        assert_eq!(truncate("ab", 8), "ab");
    }
}
