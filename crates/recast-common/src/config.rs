//! Configuration models for the resolvers and the generator.

use serde::{Deserialize, Serialize};

use crate::constants;

/// Settings consumed by the external resolvers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourcesConfig {
    /// Registry that images are pushed to and unqualified refs resolve against.
    pub registry: String,
    /// Username used when querying the registry.
    pub registry_user: Option<String>,
    /// Password used when querying the registry.
    pub registry_pass: Option<String>,
    /// Base URL of the Alpine mirror.
    pub alpine_mirror: String,
    /// PostgreSQL major versions exposed as `postgres<major>` release families.
    pub postgres_majors: Vec<String>,
}

impl SourcesConfig {
    /// Returns the registry credentials when both halves are present.
    #[must_use]
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (self.registry_user.as_deref(), self.registry_pass.as_deref()) {
            (Some(user), Some(pass)) if !user.is_empty() && !pass.is_empty() => Some((user, pass)),
            _ => None,
        }
    }
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            registry: constants::DEFAULT_REGISTRY.into(),
            registry_user: None,
            registry_pass: None,
            alpine_mirror: constants::DEFAULT_ALPINE_MIRROR.into(),
            postgres_majors: constants::DEFAULT_POSTGRES_MAJORS
                .iter()
                .map(ToString::to_string)
                .collect(),
        }
    }
}

/// Settings describing where templates live and what gets written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratorConfig {
    /// File name of the template inside each project directory.
    pub template_name: String,
    /// File name of the rendered descriptor inside each output directory.
    pub output_name: String,
    /// Browsable link to the source repository, prefixed to template paths.
    pub source_link: String,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            template_name: constants::DEFAULT_TEMPLATE_NAME.into(),
            output_name: constants::DEFAULT_OUTPUT_NAME.into(),
            source_link: constants::DEFAULT_SOURCE_LINK.into(),
        }
    }
}
