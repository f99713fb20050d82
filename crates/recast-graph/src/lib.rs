//! # recast-graph
//!
//! Works out which projects exist and in which order they must be built.
//!
//! Handles:
//! - **Discovery**: finding template projects and rendered descriptors.
//! - **Scan**: reading dependencies back out of rendered descriptors.
//! - **Order**: batch topological ordering with alphabetical ties.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used, clippy::panic))]

pub mod discovery;
pub mod order;
pub mod scan;

pub use order::order;
