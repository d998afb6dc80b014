//! Program class definitions and member access flags.
//!
//! [`ProgramClass`] is the slice of class metadata the shrinker passes actually consume:
//! identity, hierarchy edges, access flags and member lists. Method definitions optionally
//! carry an IR body so interprocedural diagnostics can look inside dispatch methods.

use bitflags::bitflags;

use crate::ir::method::MethodIr;
use crate::program::refs::{FieldRef, MethodRef, TypeRef};

bitflags! {
    /// Class-level access and property flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ClassAccessFlags: u32 {
        /// Publicly accessible.
        const PUBLIC = 0x0001;
        /// Cannot be subclassed.
        const FINAL = 0x0010;
        /// Declared as an interface.
        const INTERFACE = 0x0200;
        /// Abstract; cannot be instantiated.
        const ABSTRACT = 0x0400;
        /// Compiler-synthesized.
        const SYNTHETIC = 0x1000;
        /// Declared as an enum.
        const ENUM = 0x4000;
    }
}

bitflags! {
    /// Method-level access and property flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct MethodAccessFlags: u32 {
        /// Publicly accessible.
        const PUBLIC = 0x0001;
        /// Accessible only from the declaring class.
        const PRIVATE = 0x0002;
        /// Accessible from subclasses and the package.
        const PROTECTED = 0x0004;
        /// Static method.
        const STATIC = 0x0008;
        /// Cannot be overridden.
        const FINAL = 0x0010;
        /// Compiler-generated bridge.
        const BRIDGE = 0x0040;
        /// Abstract; no body.
        const ABSTRACT = 0x0400;
        /// Compiler-synthesized.
        const SYNTHETIC = 0x1000;
    }
}

bitflags! {
    /// Field-level access and property flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FieldAccessFlags: u32 {
        /// Publicly accessible.
        const PUBLIC = 0x0001;
        /// Accessible only from the declaring class.
        const PRIVATE = 0x0002;
        /// Static field.
        const STATIC = 0x0008;
        /// Write-once.
        const FINAL = 0x0010;
        /// Compiler-synthesized.
        const SYNTHETIC = 0x1000;
    }
}

/// A method definition: reference, flags, and optionally an IR body.
#[derive(Debug)]
pub struct MethodDef {
    /// The method's identity.
    pub reference: MethodRef,

    /// Access and property flags.
    pub access: MethodAccessFlags,

    /// The method body, when the embedding compiler has materialized it.
    ///
    /// The shrinker mutates bodies through the coordinator entry points only; a `None`
    /// body is treated as opaque (abstract, native, or simply not built).
    pub code: Option<MethodIr>,
}

impl MethodDef {
    /// Creates a bodyless definition.
    #[must_use]
    pub fn new(reference: MethodRef, access: MethodAccessFlags) -> Self {
        MethodDef {
            reference,
            access,
            code: None,
        }
    }

    /// Creates a definition with an IR body.
    #[must_use]
    pub fn with_code(reference: MethodRef, access: MethodAccessFlags, code: MethodIr) -> Self {
        MethodDef {
            reference,
            access,
            code: Some(code),
        }
    }

    /// Returns `true` for compiler-generated bridge methods.
    #[must_use]
    pub fn is_bridge(&self) -> bool {
        self.access.contains(MethodAccessFlags::BRIDGE)
    }
}

/// A field definition: reference plus flags.
#[derive(Debug, Clone)]
pub struct FieldDef {
    /// The field's identity.
    pub reference: FieldRef,

    /// Access and property flags.
    pub access: FieldAccessFlags,
}

impl FieldDef {
    /// Creates a field definition.
    #[must_use]
    pub fn new(reference: FieldRef, access: FieldAccessFlags) -> Self {
        FieldDef { reference, access }
    }

    /// Returns `true` for static fields.
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.access.contains(FieldAccessFlags::STATIC)
    }
}

/// A program class: identity, hierarchy, flags and members.
///
/// Direct methods are constructors, static and private methods; virtual methods are the
/// dynamically dispatched ones. The split mirrors the host compiler's metadata store and
/// matters to the passes: the enum-map analysis counts *virtual* methods, the builder
/// pass publicizes a *direct* constructor.
#[derive(Debug)]
pub struct ProgramClass {
    /// The class's own type.
    pub ty: TypeRef,

    /// The superclass, absent only for the root of the hierarchy.
    pub super_type: Option<TypeRef>,

    /// Implemented interfaces.
    pub interfaces: Vec<TypeRef>,

    /// Access and property flags.
    pub access: ClassAccessFlags,

    /// Static fields declared by this class.
    pub static_fields: Vec<FieldDef>,

    /// Instance fields declared by this class.
    pub instance_fields: Vec<FieldDef>,

    /// Constructors, static and private methods.
    pub direct_methods: Vec<MethodDef>,

    /// Dynamically dispatched methods.
    pub virtual_methods: Vec<MethodDef>,
}

impl ProgramClass {
    /// Creates an empty class with the given identity, superclass and flags.
    #[must_use]
    pub fn new(ty: TypeRef, super_type: Option<TypeRef>, access: ClassAccessFlags) -> Self {
        ProgramClass {
            ty,
            super_type,
            interfaces: Vec::new(),
            access,
            static_fields: Vec::new(),
            instance_fields: Vec::new(),
            direct_methods: Vec::new(),
            virtual_methods: Vec::new(),
        }
    }

    /// Returns `true` if the class is abstract.
    #[must_use]
    pub fn is_abstract(&self) -> bool {
        self.access.contains(ClassAccessFlags::ABSTRACT)
    }

    /// Returns `true` if the class is an interface.
    #[must_use]
    pub fn is_interface(&self) -> bool {
        self.access.contains(ClassAccessFlags::INTERFACE)
    }

    /// Returns `true` if the class is an enum.
    #[must_use]
    pub fn is_enum(&self) -> bool {
        self.access.contains(ClassAccessFlags::ENUM)
    }

    /// Looks up a declared static field by name.
    #[must_use]
    pub fn lookup_static_field(&self, name: &str) -> Option<&FieldDef> {
        self.static_fields.iter().find(|f| f.reference.name() == name)
    }

    /// Looks up a direct method by predicate.
    pub fn lookup_direct_method<P>(&self, predicate: P) -> Option<&MethodDef>
    where
        P: Fn(&MethodDef) -> bool,
    {
        self.direct_methods.iter().find(|m| predicate(m))
    }

    /// Looks up the constructor with the given parameter list.
    #[must_use]
    pub fn lookup_constructor(&self, params: &[TypeRef]) -> Option<&MethodDef> {
        self.direct_methods
            .iter()
            .find(|m| m.reference.is_constructor() && m.reference.params() == params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_class() -> ProgramClass {
        let ty = TypeRef::new("Lcom/example/Foo;");
        let mut clazz = ProgramClass::new(
            ty.clone(),
            Some(TypeRef::object()),
            ClassAccessFlags::PUBLIC | ClassAccessFlags::ABSTRACT,
        );
        clazz.static_fields.push(FieldDef::new(
            FieldRef::new(ty.clone(), "DEFAULT_INSTANCE", ty.clone()),
            FieldAccessFlags::STATIC | FieldAccessFlags::FINAL,
        ));
        clazz.direct_methods.push(MethodDef::new(
            MethodRef::new(ty, "<init>", vec![], TypeRef::void()),
            MethodAccessFlags::PRIVATE,
        ));
        clazz
    }

    #[test]
    fn test_flags_and_lookup() {
        let clazz = sample_class();
        assert!(clazz.is_abstract());
        assert!(!clazz.is_interface());
        assert!(clazz.lookup_static_field("DEFAULT_INSTANCE").is_some());
        assert!(clazz.lookup_static_field("MISSING").is_none());
        assert!(clazz.lookup_constructor(&[]).is_some());
        assert!(clazz.lookup_constructor(&[TypeRef::int()]).is_none());
    }
}
