//! Data layer for wide-column stores speaking CQL.
//!
//! Queries are built from an immutable [`ExecutionContext`], values go through the
//! [`Coercion`] engine against the live schema of their column and results are delivered as
//! records, entities or backpressured [`ResultStream`]s. The transport is any [`Session`]
//! implementation.
pub use cask_core::*;
pub use cask_macros::*;
