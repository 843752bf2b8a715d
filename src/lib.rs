//! An ordered multiset backed by a treap.
//!
//! Values are kept sorted under a caller supplied order, duplicates included, and every
//! operation is expressed through two primitives on the underlying tree: `split`, which cuts a
//! tree at a threshold, and `merge`, which joins two ordered trees. On top of these the multiset
//! offers order statistics, range counting and erasure, and structural split/merge of whole
//! collections.

pub mod arena;
mod error;
pub mod treap;

pub use crate::error::{Error, Result};
