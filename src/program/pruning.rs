//! Pruning records shared between the shrinker and the host tree-shaker.
//!
//! Two accumulators cross the pass boundary: [`PrunedItems`], the sink of members the
//! shrinker has proven removable, and [`DeadTypeCandidateSet`], the grow-then-freeze set
//! of types that *might* be unreachable once the schemas have been rewritten. Both are
//! created fresh per compilation, shared by reference across worker threads, and handed
//! to the tree-shaker read-only.

use std::sync::atomic::{AtomicBool, Ordering};

use dashmap::DashSet;

use crate::program::facts::ReachabilityFacts;
use crate::program::refs::{FieldRef, MethodRef, TypeRef};
use crate::Result;

/// Removed-item sink consumed by the host tree-shaker.
///
/// Insertion order is not meaningful; the tree-shaker treats each record as a set
/// membership test. All methods are callable concurrently.
#[derive(Debug, Default)]
pub struct PrunedItems {
    removed_types: DashSet<TypeRef>,
    removed_fields: DashSet<FieldRef>,
    removed_methods: DashSet<MethodRef>,
}

impl PrunedItems {
    /// Creates an empty record.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a removed type.
    pub fn record_removed_type(&self, ty: TypeRef) {
        self.removed_types.insert(ty);
    }

    /// Records a removed field.
    pub fn record_removed_field(&self, field: FieldRef) {
        self.removed_fields.insert(field);
    }

    /// Records a removed method.
    pub fn record_removed_method(&self, method: MethodRef) {
        self.removed_methods.insert(method);
    }

    /// Returns `true` if the type was recorded as removed.
    #[must_use]
    pub fn is_removed_type(&self, ty: &TypeRef) -> bool {
        self.removed_types.contains(ty)
    }

    /// Returns `true` if the field was recorded as removed.
    #[must_use]
    pub fn is_removed_field(&self, field: &FieldRef) -> bool {
        self.removed_fields.contains(field)
    }

    /// Returns `true` if the method was recorded as removed.
    #[must_use]
    pub fn is_removed_method(&self, method: &MethodRef) -> bool {
        self.removed_methods.contains(method)
    }

    /// Number of removed fields recorded so far.
    #[must_use]
    pub fn removed_field_count(&self) -> usize {
        self.removed_fields.len()
    }
}

/// Types tentatively judged unreachable, pending tree-shaker confirmation.
///
/// Lifecycle: populated (grow-only) while the passes run, frozen once they join, then
/// used read-only. In debug builds, [`DeadTypeCandidateSet::verify_absent`] asserts the
/// candidates really vanished from the output; a survivor is an unsound optimization and
/// fails the compilation.
#[derive(Debug, Default)]
pub struct DeadTypeCandidateSet {
    candidates: DashSet<TypeRef>,
    frozen: AtomicBool,
}

impl DeadTypeCandidateSet {
    /// Creates an empty, unfrozen set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a candidate type.
    ///
    /// Inserting after [`freeze`](Self::freeze) is a lifecycle violation; debug builds
    /// assert, release builds ignore the insert.
    pub fn insert(&self, ty: TypeRef) {
        let frozen = self.frozen.load(Ordering::Acquire);
        debug_assert!(!frozen, "dead type candidate inserted after freeze: {ty}");
        if !frozen {
            self.candidates.insert(ty);
        }
    }

    /// Freezes the set; subsequent inserts are rejected.
    pub fn freeze(&self) {
        self.frozen.store(true, Ordering::Release);
    }

    /// Returns `true` once [`freeze`](Self::freeze) has been called.
    #[must_use]
    pub fn is_frozen(&self) -> bool {
        self.frozen.load(Ordering::Acquire)
    }

    /// Returns `true` if the type was recorded as a candidate.
    #[must_use]
    pub fn contains(&self, ty: &TypeRef) -> bool {
        self.candidates.contains(ty)
    }

    /// Number of candidates recorded.
    #[must_use]
    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    /// Returns `true` if no candidates were recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// Verifies that no candidate survived into the final liveness result.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsoundOptimization`](crate::Error::UnsoundOptimization) naming
    /// the first surviving type. This is a fatal compilation error: a live candidate
    /// means a pass removed references it should not have.
    pub fn verify_absent(&self, facts: &dyn ReachabilityFacts) -> Result<()> {
        debug_assert!(self.is_frozen(), "verification before freeze");
        for ty in self.candidates.iter() {
            if facts.is_live_class(ty.key()) {
                return Err(crate::Error::UnsoundOptimization(ty.key().clone()));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedLiveness(Vec<TypeRef>);

    impl ReachabilityFacts for FixedLiveness {
        fn is_field_read(&self, _field: &FieldRef) -> bool {
            false
        }
        fn is_field_written(&self, _field: &FieldRef) -> bool {
            false
        }
        fn is_static_field_written_only_in_enclosing_static_initializer(
            &self,
            _field: &FieldRef,
        ) -> bool {
            true
        }
        fn unique_read_context(&self, _field: &FieldRef) -> Option<MethodRef> {
            None
        }
        fn is_live_class(&self, ty: &TypeRef) -> bool {
            self.0.contains(ty)
        }
    }

    #[test]
    fn test_pruned_items_membership() {
        let pruned = PrunedItems::new();
        let ty = TypeRef::new("La/B;");
        let field = FieldRef::new(ty.clone(), "f", TypeRef::int());
        assert!(!pruned.is_removed_field(&field));
        pruned.record_removed_field(field.clone());
        pruned.record_removed_type(ty.clone());
        assert!(pruned.is_removed_field(&field));
        assert!(pruned.is_removed_type(&ty));
        assert_eq!(pruned.removed_field_count(), 1);
    }

    #[test]
    fn test_candidate_lifecycle() {
        let candidates = DeadTypeCandidateSet::new();
        let ty = TypeRef::new("La/DeadMap;");
        candidates.insert(ty.clone());
        assert!(candidates.contains(&ty));
        candidates.freeze();
        assert!(candidates.is_frozen());

        let facts = FixedLiveness(vec![]);
        assert!(candidates.verify_absent(&facts).is_ok());
    }

    #[test]
    fn test_surviving_candidate_is_fatal() {
        let candidates = DeadTypeCandidateSet::new();
        let ty = TypeRef::new("La/DeadMap;");
        candidates.insert(ty.clone());
        candidates.freeze();

        let facts = FixedLiveness(vec![ty]);
        let err = candidates.verify_absent(&facts).unwrap_err();
        assert!(matches!(err, crate::Error::UnsoundOptimization(_)));
    }
}
