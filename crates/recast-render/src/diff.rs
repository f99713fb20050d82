//! Change detection between two ledgers.

use recast_common::types::Change;

use crate::ledger::Ledger;

/// Reports every material of `new` whose value differs from `old`.
///
/// A key missing from `old` compares as the empty string. Keys that only
/// exist in `old` (materials the template stopped using) are not reported.
/// Results come out in key order.
#[must_use]
pub fn diff(old: &Ledger, new: &Ledger) -> Vec<Change> {
    new.iter()
        .filter_map(|(material, value)| {
            let previous = old.get(material).unwrap_or_default();
            (previous != value).then(|| Change::new(material, previous, value))
        })
        .collect()
}
