// Copyright 2026 the protoshrink authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![allow(dead_code)]
#![allow(clippy::too_many_arguments)]

//! # protoshrink
//!
//! A whole-program optimizer core that eliminates dead protocol-buffer runtime support
//! code from a compiled program. It operates over the intermediate representation of a
//! bytecode compiler/shrinker and targets the highly regular code the protobuf
//! generator emits: the packed schema every message class hands to the runtime, the
//! enum-value-map and extension-registry support classes that only matter when
//! reflection actually happens, and the per-message builder classes.
//!
//! ## Features
//!
//! - **Schema codec** - Decode and re-encode the compact schema format (a packed
//!   integer string plus a parallel object array) with exact-consumption validation
//! - **Dead enum-value-maps** - Clear map classes whose reflective anchor field is
//!   never read
//! - **Dead extensions** - Remove extension fields only the registry dispatch reads
//! - **Schema rewriting** - Splice minimized schemas back into the IR with fresh,
//!   provenance-tracked operands
//! - **Builder elimination** - Redirect dead per-message builders to the shared
//!   generic base, with the inlining policies that make the hierarchy collapsible
//!
//! ## Quick Start
//!
//! Add `protoshrink` to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! protoshrink = "0.1"
//! ```
//!
//! ### Using the Prelude
//!
//! ```rust
//! use std::sync::Arc;
//! use protoshrink::prelude::*;
//!
//! let pool = Arc::new(ClassPool::new());
//! let shrinker = ProtoShrinker::new(Arc::clone(&pool), ShrinkerOptions::default());
//! assert_eq!(shrinker.pruned_items().removed_field_count(), 0);
//! ```
//!
//! ## Architecture
//!
//! `protoshrink` is organized into several key modules:
//!
//! - [`prelude`] - Convenient re-exports of commonly used types and traits
//! - [`schema`] - The compact schema encoding: packing, model and codec
//! - [`ir`] - The minimal host-IR contract the passes pattern-match and mutate
//! - [`program`] - Metadata contracts: references, classes, reachability facts and
//!   pruning records
//! - [`shrink`] - The passes and their coordinator
//! - [`diagnostics`] - The structured event log the passes record into
//! - [`Error`] and [`Result`] - Error handling
//!
//! ## Pipeline Integration
//!
//! The host invokes the coordinator at two points. Immediately after the first
//! whole-program reachability fixpoint: clear dead enum maps, record dead extension
//! fields, rewrite dead builder construction sites, then freeze the dead-type
//! candidates. And again during general IR optimization of each reflection method:
//! rewrite the schema construction in place. A final verification asserts that every
//! dead-type candidate really vanished; a survivor fails the compilation.
//!
//! ## Thread Safety
//!
//! The coordinator is shared by reference across the host's worker threads. Analyses
//! read facts fixed by the completed fixpoint and write to insertion-order-independent
//! accumulator sets; the schema rewrite is per-method and embarrassingly parallel.

#[macro_use]
pub(crate) mod error;

pub mod diagnostics;
pub mod ir;
pub mod prelude;
pub mod program;
pub mod schema;
pub mod shrink;

/// A specialized `Result` type for shrinker operations.
///
/// # Example
///
/// ```rust
/// use protoshrink::Result;
///
/// fn check() -> Result<()> {
///     Ok(())
/// }
/// # check().unwrap();
/// ```
pub type Result<T> = std::result::Result<T, Error>;

/// The error type for everything this library can fail with.
///
/// See [`error::Error`] for the taxonomy: malformed schemas are recoverable and
/// contained to one message, unsound optimizations and allow-list I/O failures are
/// fatal.
pub use error::Error;
