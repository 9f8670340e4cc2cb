//! Caravel Render - Deterministic descriptor rendering
//!
//! Turns a validated `ReleaseConfiguration` into an apply-ordered set of
//! resource descriptors:
//! - `render`: the full pipeline (validate, partition, resolve, build, order)
//! - `DescriptorBuilder`: descriptor construction from resolved topology
//! - `plan` / `ApplyPlan`: dependency-graph apply ordering
//! - `DiffEngine`: change detection between two rendered sets

pub mod builder;
pub mod diff;
pub mod error;
pub mod graph;
pub mod pipeline;

#[cfg(test)]
pub(crate) mod testutil;

pub use builder::DescriptorBuilder;
pub use diff::{ChangeType, DiffContent, DiffEngine, DiffLine, DiffResult, LineType, ResourceChange};
pub use error::{RenderError, Result};
pub use graph::{plan, ApplyPlan};
pub use pipeline::{render, RenderOptions, RenderOutput};
