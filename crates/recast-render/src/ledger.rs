//! Material ledger: the bill of materials of one render.
//!
//! Keys are namespaced (`<kind>:<subject>`, or a bare release family name)
//! and unique within a ledger. A key written twice keeps the later value.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};

use recast_common::error::Result;
use serde::{Deserialize, Serialize};

/// Builds a namespaced material key such as `image:base` or `apk:curl`.
#[must_use]
pub fn material_key(kind: &str, subject: &str) -> String {
    format!("{kind}:{subject}")
}

/// Mapping from material key to resolved value.
///
/// Backed by a sorted map so the encoded form is stable across renders.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ledger(BTreeMap<String, String>);

impl Ledger {
    /// Creates an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a material, returning the value it replaced.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.0.insert(key.into(), value.into())
    }

    /// Returns the recorded value for `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Number of recorded materials.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates materials in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Encodes the ledger as a single-line JSON object.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.0)?)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Ledger {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Shared handle through which template functions write to the active ledger.
///
/// One recorder is created per render and threaded into every bound
/// function, so concurrent renders never see each other's materials.
#[derive(Debug, Clone, Default)]
pub struct MaterialRecorder {
    ledger: Arc<Mutex<Ledger>>,
}

impl MaterialRecorder {
    /// Creates a recorder over an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one material.
    pub fn record(&self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        let mut ledger = self.ledger.lock().unwrap_or_else(PoisonError::into_inner);
        tracing::debug!(material = %key, value = %value, "recorded material");
        if let Some(previous) = ledger.insert(key.clone(), value.clone()) {
            if previous != value {
                tracing::debug!(material = %key, %previous, "material overwritten within one render");
            }
        }
    }

    /// Returns a copy of everything recorded so far.
    #[must_use]
    pub fn snapshot(&self) -> Ledger {
        self.ledger
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
