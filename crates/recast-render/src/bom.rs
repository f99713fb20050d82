//! Reading and writing the provenance header of generated files.
//!
//! A generated file starts with:
//!
//! ```text
//! # Generated from <sourceLink><templateRelativePath>
//! # BOM: {"image:base":"..."}
//!
//! <rendered body>
//! ```
//!
//! Reading is deliberately forgiving: a missing file, a missing header or
//! an unparseable payload all mean "no recorded provenance".

use std::path::Path;

use recast_common::constants::{BOM_PREFIX, GENERATED_PREFIX};
use recast_common::error::Result;

use crate::ledger::Ledger;

/// Loads the ledger embedded in a previously generated file.
///
/// Never fails; every problem yields an empty ledger.
#[must_use]
pub fn read(path: &Path) -> Ledger {
    match std::fs::read_to_string(path) {
        Ok(content) => parse(&content).unwrap_or_else(|reason| {
            tracing::warn!(path = %path.display(), reason, "ignoring existing BOM");
            Ledger::new()
        }),
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "no existing file to read BOM from");
            Ledger::new()
        }
    }
}

/// Extracts the ledger from generated file content.
///
/// # Errors
///
/// Returns a short reason when the content carries no usable BOM.
pub fn parse(content: &str) -> std::result::Result<Ledger, &'static str> {
    let line = content.lines().nth(1).ok_or("file has no BOM line")?;
    let payload = line
        .strip_prefix(BOM_PREFIX)
        .ok_or("second line is not a BOM")?;
    serde_json::from_str(payload).map_err(|_| "BOM payload is not a string map")
}

/// Builds the two header lines plus the separating blank line.
///
/// # Errors
///
/// Returns an error if the ledger cannot be encoded.
pub fn header(source_link: &str, template_path: &str, ledger: &Ledger) -> Result<String> {
    Ok(format!(
        "{GENERATED_PREFIX}{source_link}{template_path}\n{BOM_PREFIX}{}\n\n",
        ledger.to_json()?
    ))
}
