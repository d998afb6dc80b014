//! Convenient re-exports of the most commonly used types.
//!
//! ```rust
//! use protoshrink::prelude::*;
//! ```
//!
//! Brings in the coordinator and its options, the program-model types the collaborator
//! traits are written against, the schema model, and the error types.

pub use crate::diagnostics::{Event, EventKind, EventLog};
pub use crate::program::class::{
    ClassAccessFlags, FieldAccessFlags, FieldDef, MethodAccessFlags, MethodDef, ProgramClass,
};
pub use crate::program::facts::{EnqueuerWorklist, ReachabilityFacts};
pub use crate::program::pool::ClassPool;
pub use crate::program::pruning::{DeadTypeCandidateSet, PrunedItems};
pub use crate::program::refs::{FieldRef, MethodRef, TypeRef};
pub use crate::schema::field_type::{FieldTypeExtras, ProtoFieldKind, ProtoFieldType};
pub use crate::schema::message_info::{ProtoFieldInfo, ProtoMessageInfo};
pub use crate::schema::object::SchemaObject;
pub use crate::shrink::{ProtoShrinker, ShrinkerOptions};
pub use crate::{Error, Result};
