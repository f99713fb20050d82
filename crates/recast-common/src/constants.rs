//! System-wide constants and defaults.

/// Prefix of the attribution line at the top of every generated file.
pub const GENERATED_PREFIX: &str = "# Generated from ";

/// Prefix of the BOM line (second line) of every generated file.
pub const BOM_PREFIX: &str = "# BOM: ";

/// Marker file that excludes a directory from project discovery.
pub const IGNORE_MARKER: &str = "IGNORE";

/// Directory (relative to the template base) holding shared partials.
pub const PARTIALS_DIR: &str = "_partials";

/// Default template file name looked up in every project directory.
pub const DEFAULT_TEMPLATE_NAME: &str = "Dockerfile.tera";

/// Default name of the rendered descriptor.
pub const DEFAULT_OUTPUT_NAME: &str = "Dockerfile";

/// Default link prepended to the template path in the attribution line.
pub const DEFAULT_SOURCE_LINK: &str = "https://github.com/example/repo/blob/master/";

/// Default registry used for pushes, pulls and unqualified image references.
pub const DEFAULT_REGISTRY: &str = "reg.c5h.io";

/// Default Alpine mirror.
pub const DEFAULT_ALPINE_MIRROR: &str = "https://dl-cdn.alpinelinux.org/alpine/";

/// PostgreSQL major versions tracked as release families by default.
pub const DEFAULT_POSTGRES_MAJORS: &[&str] = &["13", "14", "15"];

/// Default number of push retries after the first attempt.
pub const DEFAULT_PUSH_RETRIES: u32 = 2;

/// Per-request timeout applied to every resolver HTTP call, in seconds.
pub const HTTP_TIMEOUT_SECS: u64 = 30;

/// Descriptor file names recognized by the text-scan discovery (lowercase).
pub const DESCRIPTOR_NAMES: &[&str] = &["dockerfile", "containerfile"];

/// Application name used in CLI output and the HTTP user agent.
pub const APP_NAME: &str = "recast";
