//! Program metadata contracts: references, classes, hierarchy and pruning records.
//!
//! This module is the narrow slice of the host compiler's metadata store the shrinker
//! consumes:
//!
//! - [`refs`] - Interned type/method/field identities
//! - [`class`] - Class definitions with access flags and member lists
//! - [`pool`] - The concurrent class store with subtype queries
//! - [`facts`] - Read-only reachability queries and the post-fixpoint enqueuer sink
//! - [`pruning`] - Removed-item records handed to the tree-shaker
//!
//! Nothing here performs analysis on its own; the passes under [`crate::shrink`] combine
//! these contracts with the IR layer to make their decisions.

pub mod class;
pub mod facts;
pub mod pool;
pub mod pruning;
pub mod refs;
