//! The host-IR contract: values, instructions, method bodies and cursors.
//!
//! The shrinker does not own the host compiler's IR; this module defines the minimal
//! surface it relies on:
//!
//! - [`value`] - SSA-like values with definitions, phis and static types
//! - [`instruction`] - The instruction sum type the passes match on and synthesize
//! - [`method`] - Method bodies: blocks, instruction arena, alias chasing
//! - [`cursor`] - Lookahead iteration with insertion and in-place replacement
//!
//! Two properties matter to the passes: alias chains are acyclic (so
//! [`method::MethodIr::aliased_value`] is total), and blocks end at the first
//! control-transferring instruction (so forward scans are bounded).

pub mod cursor;
pub mod instruction;
pub mod method;
pub mod value;
