//! Domain primitive types used across the recast workspace.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One buildable unit: a directory holding a template or a descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Project {
    /// Project name, taken from its directory name.
    pub name: String,
    /// Names of other projects whose images this project builds on.
    pub needed: Vec<String>,
}

impl Project {
    /// Creates a project with the given dependencies.
    #[must_use]
    pub fn new(name: impl Into<String>, needed: Vec<String>) -> Self {
        Self {
            name: name.into(),
            needed,
        }
    }
}

impl fmt::Display for Project {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.needed.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{} (needs {})", self.name, self.needed.join(", "))
        }
    }
}

/// A difference between two ledgers for one material key.
///
/// An empty `old` means the material is new in this render; an empty `new`
/// means the material resolved to an empty value.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Change {
    /// Namespaced material key, e.g. `image:base`.
    pub material: String,
    /// Value recorded by the previous render.
    pub old: String,
    /// Value recorded by the current render.
    pub new: String,
}

impl Change {
    /// Creates a change record.
    #[must_use]
    pub fn new(material: impl Into<String>, old: impl Into<String>, new: impl Into<String>) -> Self {
        Self {
            material: material.into(),
            old: old.into(),
            new: new.into(),
        }
    }
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {:?} -> {:?}", self.material, self.old, self.new)
    }
}
