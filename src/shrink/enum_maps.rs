//! Dead enum-value-map analysis.
//!
//! Every generated enum carries a small map class translating wire numbers back to enum
//! constants, anchored to the enum through the reflective `internalValueMap` field. When
//! that field is never read, the map class exists only for reflection that never
//! happens: the class's virtual methods can be cleared and the type recorded as a dead
//! candidate for the tree-shaker.
//!
//! The shape check is strict by design. A candidate must carry exactly the two
//! `findValueByNumber(int)` lookups the generator emits (the bridge returning the
//! generic type and the concrete one); anything else means the class is not a plain
//! generated map and is rejected outright.

use crate::program::class::ProgramClass;
use crate::program::facts::ReachabilityFacts;
use crate::program::pool::ClassPool;
use crate::program::refs::TypeRef;
use crate::shrink::references::ProtoSupportRefs;

/// Analysis over candidate enum-value-map classes.
pub struct DeadEnumMapAnalysis<'a> {
    refs: &'a ProtoSupportRefs,
    pool: &'a ClassPool,
    facts: &'a dyn ReachabilityFacts,
}

impl<'a> DeadEnumMapAnalysis<'a> {
    /// Creates the analysis over the given collaborators.
    #[must_use]
    pub fn new(
        refs: &'a ProtoSupportRefs,
        pool: &'a ClassPool,
        facts: &'a dyn ReachabilityFacts,
    ) -> Self {
        DeadEnumMapAnalysis { refs, pool, facts }
    }

    /// Returns the owning enum type if the map class is provably dead.
    ///
    /// A map class is dead iff it has the exact generated shape, its enum declares the
    /// `internalValueMap` field, that field is never read, and it is written at most
    /// from the enum's own static initializer.
    #[must_use]
    pub fn dead_map_owner(&self, map_type: &TypeRef) -> Option<TypeRef> {
        let enum_type = self
            .pool
            .with_class(map_type, |clazz| self.lookup_concrete_enum(clazz))??;

        let declares_field = self.pool.with_class(&enum_type, |clazz| {
            clazz.is_enum() && clazz.lookup_static_field("internalValueMap").is_some()
        })?;
        if !declares_field {
            return None;
        }

        let field = self.refs.internal_value_map_field(&enum_type);
        if self.facts.is_field_read(&field) {
            return None;
        }
        if self.facts.is_field_written(&field)
            && !self
                .facts
                .is_static_field_written_only_in_enclosing_static_initializer(&field)
        {
            return None;
        }
        Some(enum_type)
    }

    /// Checks the candidate's method shape and derives the concrete enum type.
    ///
    /// Exactly two virtual methods, both `findValueByNumber(int)`: the bridge returns
    /// the generic object type, the other the concrete enum. Any deviation rejects the
    /// class.
    fn lookup_concrete_enum(&self, clazz: &ProgramClass) -> Option<TypeRef> {
        if !clazz.interfaces.contains(&self.refs.enum_lite_map_type) {
            return None;
        }
        if clazz.virtual_methods.len() != 2 {
            return None;
        }
        let mut concrete: Option<TypeRef> = None;
        let mut bridge_seen = false;
        for method in &clazz.virtual_methods {
            let reference = &method.reference;
            if reference.name() != "findValueByNumber" || reference.params() != [TypeRef::int()] {
                return None;
            }
            if *reference.return_type() == TypeRef::object() {
                if bridge_seen {
                    return None;
                }
                bridge_seen = true;
            } else if concrete.is_none() {
                concrete = Some(reference.return_type().clone());
            } else {
                return None;
            }
        }
        if !bridge_seen {
            return None;
        }
        concrete
    }
}
