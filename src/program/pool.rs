//! Concurrent class pool with hierarchy queries.
//!
//! The pool is the shrinker's view of the host compiler's class store: a thread-safe map
//! from type to [`ProgramClass`] plus the subtype queries the passes decide on. Mutations
//! (clearing virtual methods, demoting a superclass) go through closures so no lock guard
//! escapes.

use dashmap::DashMap;

use crate::program::class::{ClassAccessFlags, MethodAccessFlags, ProgramClass};
use crate::program::refs::TypeRef;

/// Thread-safe map of all program classes, with hierarchy queries.
///
/// # Examples
///
/// ```rust
/// use protoshrink::program::class::{ClassAccessFlags, ProgramClass};
/// use protoshrink::program::pool::ClassPool;
/// use protoshrink::program::refs::TypeRef;
///
/// let pool = ClassPool::new();
/// let base = TypeRef::new("Lcom/example/Base;");
/// let derived = TypeRef::new("Lcom/example/Derived;");
/// pool.insert(ProgramClass::new(base.clone(), None, ClassAccessFlags::PUBLIC));
/// pool.insert(ProgramClass::new(
///     derived.clone(),
///     Some(base.clone()),
///     ClassAccessFlags::PUBLIC,
/// ));
/// assert!(pool.is_strict_subtype_of(&derived, &base));
/// assert!(!pool.is_strict_subtype_of(&base, &base));
/// ```
#[derive(Debug, Default)]
pub struct ClassPool {
    classes: DashMap<TypeRef, ProgramClass>,
}

impl ClassPool {
    /// Creates an empty pool.
    #[must_use]
    pub fn new() -> Self {
        ClassPool {
            classes: DashMap::new(),
        }
    }

    /// Registers a class, replacing any previous definition of the same type.
    pub fn insert(&self, clazz: ProgramClass) {
        self.classes.insert(clazz.ty.clone(), clazz);
    }

    /// Returns `true` if the pool holds a definition for the type.
    #[must_use]
    pub fn contains(&self, ty: &TypeRef) -> bool {
        self.classes.contains_key(ty)
    }

    /// Returns the number of registered classes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    /// Returns `true` if the pool is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Executes a closure with a reference to the class definition.
    ///
    /// This is the preferred way to read classes as it avoids cloning. The closure should
    /// be quick to execute as a read lock is held.
    pub fn with_class<R, F>(&self, ty: &TypeRef, f: F) -> Option<R>
    where
        F: FnOnce(&ProgramClass) -> R,
    {
        self.classes.get(ty).map(|r| f(&r))
    }

    /// Executes a closure with a mutable reference to the class definition.
    pub fn with_class_mut<R, F>(&self, ty: &TypeRef, f: F) -> Option<R>
    where
        F: FnOnce(&mut ProgramClass) -> R,
    {
        self.classes.get_mut(ty).map(|mut r| f(&mut r))
    }

    /// Iterates over all registered types.
    #[must_use]
    pub fn all_types(&self) -> Vec<TypeRef> {
        self.classes.iter().map(|r| r.key().clone()).collect()
    }

    /// Returns the superclass of a type, if the type is known and has one.
    #[must_use]
    pub fn super_type(&self, ty: &TypeRef) -> Option<TypeRef> {
        self.classes.get(ty).and_then(|r| r.super_type.clone())
    }

    /// Returns `true` if `sub` is a strict subtype of `sup`.
    ///
    /// Walks superclass edges and interface edges transitively. A type is never a strict
    /// subtype of itself. Types without a pool definition terminate the walk; the query
    /// is conservative for hierarchies that leave the program.
    #[must_use]
    pub fn is_strict_subtype_of(&self, sub: &TypeRef, sup: &TypeRef) -> bool {
        if sub == sup {
            return false;
        }
        let mut worklist: Vec<TypeRef> = Vec::new();
        self.push_supers(sub, &mut worklist);
        let mut visited: Vec<TypeRef> = Vec::new();
        while let Some(current) = worklist.pop() {
            if current == *sup {
                return true;
            }
            if visited.contains(&current) {
                continue;
            }
            self.push_supers(&current, &mut worklist);
            visited.push(current);
        }
        false
    }

    fn push_supers(&self, ty: &TypeRef, out: &mut Vec<TypeRef>) {
        if let Some(clazz) = self.classes.get(ty) {
            if let Some(super_type) = &clazz.super_type {
                out.push(super_type.clone());
            }
            out.extend(clazz.interfaces.iter().cloned());
        }
    }

    /// Returns every registered strict subtype of `sup`.
    #[must_use]
    pub fn strict_subtypes_of(&self, sup: &TypeRef) -> Vec<TypeRef> {
        // Snapshot the keys first; the subtype walk takes its own shard locks.
        self.all_types()
            .into_iter()
            .filter(|ty| self.is_strict_subtype_of(ty, sup))
            .collect()
    }

    /// Returns `true` if the class directly lists the interface.
    #[must_use]
    pub fn implements_directly(&self, ty: &TypeRef, interface: &TypeRef) -> bool {
        self.classes
            .get(ty)
            .is_some_and(|r| r.interfaces.contains(interface))
    }

    /// Removes every virtual method of the class, so no IR processing visits them.
    ///
    /// Returns `true` if the class was known.
    pub fn clear_virtual_methods(&self, ty: &TypeRef) -> bool {
        self.with_class_mut(ty, |clazz| clazz.virtual_methods.clear())
            .is_some()
    }

    /// Demotes a class from abstract to concrete and publicizes its constructors.
    ///
    /// Idempotent; callers guard the one-time semantics with a claimed set, this method
    /// only applies the flag changes. Returns `true` if the class was known.
    pub fn make_instantiable(&self, ty: &TypeRef) -> bool {
        self.with_class_mut(ty, |clazz| {
            clazz.access.remove(ClassAccessFlags::ABSTRACT);
            for method in &mut clazz.direct_methods {
                if method.reference.is_constructor() {
                    method
                        .access
                        .remove(MethodAccessFlags::PRIVATE | MethodAccessFlags::PROTECTED);
                    method.access.insert(MethodAccessFlags::PUBLIC);
                }
            }
        })
        .is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::class::MethodDef;
    use crate::program::refs::MethodRef;

    fn class(ty: &str, super_ty: Option<&str>, access: ClassAccessFlags) -> ProgramClass {
        ProgramClass::new(
            TypeRef::new(ty),
            super_ty.map(TypeRef::new),
            access,
        )
    }

    #[test]
    fn test_subtype_walk() {
        let pool = ClassPool::new();
        pool.insert(class("La/Root;", None, ClassAccessFlags::PUBLIC));
        pool.insert(class("La/Mid;", Some("La/Root;"), ClassAccessFlags::PUBLIC));
        pool.insert(class("La/Leaf;", Some("La/Mid;"), ClassAccessFlags::PUBLIC));

        let root = TypeRef::new("La/Root;");
        let leaf = TypeRef::new("La/Leaf;");
        assert!(pool.is_strict_subtype_of(&leaf, &root));
        assert!(!pool.is_strict_subtype_of(&root, &leaf));
        assert!(!pool.is_strict_subtype_of(&root, &root));
        assert_eq!(pool.strict_subtypes_of(&root).len(), 2);
    }

    #[test]
    fn test_subtype_through_interface() {
        let pool = ClassPool::new();
        let iface = TypeRef::new("La/Marker;");
        pool.insert(class("La/Marker;", None, ClassAccessFlags::INTERFACE));
        let mut impl_class = class("La/Impl;", None, ClassAccessFlags::PUBLIC);
        impl_class.interfaces.push(iface.clone());
        pool.insert(impl_class);

        let impl_ty = TypeRef::new("La/Impl;");
        assert!(pool.is_strict_subtype_of(&impl_ty, &iface));
        assert!(pool.implements_directly(&impl_ty, &iface));
    }

    #[test]
    fn test_make_instantiable() {
        let pool = ClassPool::new();
        let ty = TypeRef::new("La/AbstractBase;");
        let mut clazz = class("La/AbstractBase;", None, ClassAccessFlags::ABSTRACT);
        clazz.direct_methods.push(MethodDef::new(
            MethodRef::new(ty.clone(), "<init>", vec![], TypeRef::void()),
            MethodAccessFlags::PROTECTED,
        ));
        pool.insert(clazz);

        assert!(pool.make_instantiable(&ty));
        pool.with_class(&ty, |c| {
            assert!(!c.is_abstract());
            let ctor = c.lookup_constructor(&[]).unwrap();
            assert!(ctor.access.contains(MethodAccessFlags::PUBLIC));
            assert!(!ctor.access.contains(MethodAccessFlags::PROTECTED));
        })
        .unwrap();

        // Applying it again is harmless.
        assert!(pool.make_instantiable(&ty));
    }
}
