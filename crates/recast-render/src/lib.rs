//! # recast-render
//!
//! Renders container descriptor templates while recording every externally
//! resolved value, so that regenerating a descriptor reports exactly which
//! upstream versions moved.
//!
//! Handles:
//! - **Ledger**: the per-render record of resolved materials.
//! - **Registry**: the catalog of template functions and their effects.
//! - **Functions**: the standard function set backed by `recast-sources`.
//! - **Renderer**: template execution, header embedding, and persistence.
//! - **BOM**: reading the header of a previously generated file.
//! - **Diff**: change detection between two ledgers.
//! - **Extract**: side-effect-free dry runs that harvest project references.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod bom;
pub mod diff;
pub mod extract;
pub mod functions;
pub mod ledger;
pub mod registry;
pub mod release;
pub mod renderer;
pub mod template;

pub use diff::diff;
pub use extract::DependencyExtractor;
pub use functions::standard_registry;
pub use ledger::Ledger;
pub use registry::FunctionRegistry;
pub use renderer::ProvenanceRenderer;
