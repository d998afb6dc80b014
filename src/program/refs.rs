//! Interned references to program types, methods and fields.
//!
//! References identify program items by descriptor, the way the host compiler's metadata
//! store does: a type is its JVM-style descriptor string, a method is a (holder, name,
//! signature) triple, a field a (holder, name, type) triple. Two references are the same
//! item iff they compare equal; all three types are cheap to clone (the payload is behind
//! [`Arc`]s) and hashable, so they can key the concurrent accumulator maps.

use std::fmt;
use std::sync::Arc;

/// A reference to a type, by JVM-style descriptor.
///
/// Class descriptors have the shape `Lcom/example/Foo;`, primitives are single letters
/// (`I`, `V`, ...), arrays are `[` followed by the element descriptor.
///
/// # Examples
///
/// ```rust
/// use protoshrink::program::refs::TypeRef;
///
/// let ty = TypeRef::new("Lcom/google/protobuf/GeneratedMessageLite;");
/// assert!(ty.is_class());
/// assert_eq!(ty.java_name(), "com.google.protobuf.GeneratedMessageLite");
/// ```
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeRef(Arc<str>);

impl TypeRef {
    /// Creates a type reference from a descriptor string.
    #[must_use]
    pub fn new(descriptor: &str) -> Self {
        TypeRef(Arc::from(descriptor))
    }

    /// The `int` primitive.
    #[must_use]
    pub fn int() -> Self {
        TypeRef::new("I")
    }

    /// The `void` pseudo-type.
    #[must_use]
    pub fn void() -> Self {
        TypeRef::new("V")
    }

    /// `java.lang.Object`.
    #[must_use]
    pub fn object() -> Self {
        TypeRef::new("Ljava/lang/Object;")
    }

    /// `java.lang.String`.
    #[must_use]
    pub fn string() -> Self {
        TypeRef::new("Ljava/lang/String;")
    }

    /// `java.lang.Class`.
    #[must_use]
    pub fn class() -> Self {
        TypeRef::new("Ljava/lang/Class;")
    }

    /// `java.lang.Object[]`.
    #[must_use]
    pub fn object_array() -> Self {
        TypeRef::new("[Ljava/lang/Object;")
    }

    /// Returns the raw descriptor.
    #[must_use]
    pub fn descriptor(&self) -> &str {
        &self.0
    }

    /// Returns `true` for class types (descriptor `L...;`).
    #[must_use]
    pub fn is_class(&self) -> bool {
        self.0.starts_with('L') && self.0.ends_with(';')
    }

    /// Returns `true` for array types.
    #[must_use]
    pub fn is_array(&self) -> bool {
        self.0.starts_with('[')
    }

    /// Returns `true` if the descriptor starts with the given prefix.
    ///
    /// Used for package matching, e.g. everything under `Lcom/google/protobuf/`.
    #[must_use]
    pub fn has_descriptor_prefix(&self, prefix: &str) -> bool {
        self.0.starts_with(prefix)
    }

    /// Renders a class descriptor as a dotted Java name.
    ///
    /// Non-class descriptors are returned verbatim.
    #[must_use]
    pub fn java_name(&self) -> String {
        if self.is_class() {
            self.0[1..self.0.len() - 1].replace('/', ".")
        } else {
            self.0.to_string()
        }
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeRef({})", self.0)
    }
}

/// A reference to a method: holder, name, parameter types and return type.
///
/// Equality is full signature equality, which is what every shape predicate in the
/// shrinker matches on.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct MethodRef {
    holder: TypeRef,
    name: Arc<str>,
    params: Arc<[TypeRef]>,
    return_type: TypeRef,
}

impl MethodRef {
    /// Creates a method reference.
    #[must_use]
    pub fn new(holder: TypeRef, name: &str, params: Vec<TypeRef>, return_type: TypeRef) -> Self {
        MethodRef {
            holder,
            name: Arc::from(name),
            params: Arc::from(params),
            return_type,
        }
    }

    /// The type declaring (or receiving) the method.
    #[must_use]
    pub fn holder(&self) -> &TypeRef {
        &self.holder
    }

    /// The method name. Constructors use the conventional name `<init>`.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The parameter types, receiver excluded.
    #[must_use]
    pub fn params(&self) -> &[TypeRef] {
        &self.params
    }

    /// The return type.
    #[must_use]
    pub fn return_type(&self) -> &TypeRef {
        &self.return_type
    }

    /// Returns `true` if this is a constructor reference.
    #[must_use]
    pub fn is_constructor(&self) -> bool {
        &*self.name == "<init>"
    }

    /// Returns a copy of this reference with a different holder.
    #[must_use]
    pub fn with_holder(&self, holder: TypeRef) -> Self {
        MethodRef {
            holder,
            name: Arc::clone(&self.name),
            params: Arc::clone(&self.params),
            return_type: self.return_type.clone(),
        }
    }

    /// Returns `true` if name, parameters and return type match, ignoring the holder.
    ///
    /// Virtual dispatch predicates match this way: the same generated method appears on
    /// every message subclass.
    #[must_use]
    pub fn matches_signature(&self, other: &MethodRef) -> bool {
        self.name == other.name
            && self.params == other.params
            && self.return_type == other.return_type
    }
}

impl fmt::Display for MethodRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}->{}(", self.holder, self.name)?;
        for param in self.params.iter() {
            write!(f, "{param}")?;
        }
        write!(f, "){}", self.return_type)
    }
}

impl fmt::Debug for MethodRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MethodRef({self})")
    }
}

/// A reference to a field: holder, name and field type.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct FieldRef {
    holder: TypeRef,
    name: Arc<str>,
    field_type: TypeRef,
}

impl FieldRef {
    /// Creates a field reference.
    #[must_use]
    pub fn new(holder: TypeRef, name: &str, field_type: TypeRef) -> Self {
        FieldRef {
            holder,
            name: Arc::from(name),
            field_type,
        }
    }

    /// The type declaring the field.
    #[must_use]
    pub fn holder(&self) -> &TypeRef {
        &self.holder
    }

    /// The field name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The declared field type.
    #[must_use]
    pub fn field_type(&self) -> &TypeRef {
        &self.field_type
    }

    /// Renders the field as `package.Class.fieldName`, the allow-list entry format.
    #[must_use]
    pub fn qualified_java_name(&self) -> String {
        format!("{}.{}", self.holder.java_name(), self.name)
    }
}

impl fmt::Display for FieldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}->{}:{}", self.holder, self.name, self.field_type)
    }
}

impl fmt::Debug for FieldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FieldRef({self})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_ref_kinds() {
        assert!(TypeRef::new("Lcom/example/Foo;").is_class());
        assert!(!TypeRef::int().is_class());
        assert!(TypeRef::object_array().is_array());
        assert!(TypeRef::new("Lcom/google/protobuf/MessageLite;")
            .has_descriptor_prefix("Lcom/google/protobuf/"));
    }

    #[test]
    fn test_java_names() {
        assert_eq!(
            TypeRef::new("Lcom/example/Foo$Bar;").java_name(),
            "com.example.Foo$Bar"
        );
        assert_eq!(TypeRef::int().java_name(), "I");

        let field = FieldRef::new(
            TypeRef::new("Lcom/example/Outer;"),
            "someExtension",
            TypeRef::new("Lcom/google/protobuf/GeneratedMessageLite$GeneratedExtension;"),
        );
        assert_eq!(field.qualified_java_name(), "com.example.Outer.someExtension");
    }

    #[test]
    fn test_method_signature_matching() {
        let holder_a = TypeRef::new("Lcom/example/A;");
        let holder_b = TypeRef::new("Lcom/example/B;");
        let m1 = MethodRef::new(holder_a, "dynamicMethod", vec![TypeRef::int()], TypeRef::object());
        let m2 = MethodRef::new(holder_b, "dynamicMethod", vec![TypeRef::int()], TypeRef::object());
        assert_ne!(m1, m2);
        assert!(m1.matches_signature(&m2));
        assert_eq!(m1.with_holder(m2.holder().clone()), m2);
    }

    #[test]
    fn test_constructor_detection() {
        let ctor = MethodRef::new(
            TypeRef::new("Lcom/example/A;"),
            "<init>",
            vec![],
            TypeRef::void(),
        );
        assert!(ctor.is_constructor());
    }
}
