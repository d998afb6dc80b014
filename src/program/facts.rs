//! Collaborator interfaces onto the host compiler's whole-program analysis.
//!
//! The shrinker never computes reachability itself. It consumes the facts the host's
//! fixpoint already established through [`ReachabilityFacts`], and pushes the few items it
//! synthesizes after the fixpoint back through [`EnqueuerWorklist`] so the host's liveness
//! stays sound. Both traits are object-safe; the passes take `&dyn` references.

use crate::program::refs::{FieldRef, MethodRef, TypeRef};

/// Read-only queries against the completed whole-program reachability fixpoint.
///
/// Every decision in this crate depends only on facts that are fixed once the fixpoint
/// has converged, so any interleaving of queries from worker threads is sound.
pub trait ReachabilityFacts: Send + Sync {
    /// Returns `true` if the field has at least one read anywhere in the program.
    fn is_field_read(&self, field: &FieldRef) -> bool;

    /// Returns `true` if the field has at least one write anywhere in the program.
    fn is_field_written(&self, field: &FieldRef) -> bool;

    /// Returns `true` if every write of the static field happens inside the static
    /// initializer of the field's own holder.
    ///
    /// Vacuously `true` for fields that are never written.
    fn is_static_field_written_only_in_enclosing_static_initializer(
        &self,
        field: &FieldRef,
    ) -> bool;

    /// Returns the single method from which the field is read, if the whole program
    /// contains exactly one reading method.
    fn unique_read_context(&self, field: &FieldRef) -> Option<MethodRef>;

    /// Returns `true` if the class was found live by the fixpoint.
    fn is_live_class(&self, ty: &TypeRef) -> bool;

    /// Maps a type through upstream class merging/renaming, if any occurred.
    ///
    /// Schema objects are re-synthesized through this lens so a class literal keeps
    /// pointing at the class it meant even after the class was merged or renamed.
    fn renamed_type(&self, _ty: &TypeRef) -> Option<TypeRef> {
        None
    }
}

/// Sink for reachability edges synthesized after tracing already happened.
///
/// The builder elimination pass rewrites construction sites after the fixpoint has
/// converged; it reports the instruction triple it introduces here, so the host can keep
/// the superclass, its constructor and the default-instance field alive.
pub trait EnqueuerWorklist: Send + Sync {
    /// Reports a synthesized `new-instance` of the type.
    fn trace_new_instance(&self, ty: &TypeRef);

    /// Reports a synthesized direct constructor invocation.
    fn trace_invoke_direct(&self, method: &MethodRef);

    /// Reports a synthesized static field read.
    fn trace_static_get(&self, field: &FieldRef);
}
