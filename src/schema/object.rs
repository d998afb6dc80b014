//! Schema objects with provenance.
//!
//! The objects array of a schema is positional: the decoder records *where each object
//! came from* rather than holding on to the original IR operands, so the rewriter can
//! synthesize semantically equivalent fresh instructions after upstream passes have
//! merged or renamed the referenced classes. Each variant re-materializes as exactly
//! one instruction; type-carrying variants are re-resolved through the facts' rename
//! lens first.

use widestring::U16String;

use crate::ir::cursor::InstructionCursor;
use crate::ir::instruction::Instruction;
use crate::ir::method::MethodIr;
use crate::ir::value::ValueId;
use crate::program::facts::ReachabilityFacts;
use crate::program::refs::{FieldRef, MethodRef, TypeRef};
use crate::Result;

/// One entry of a schema's objects array, tracked by provenance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaObject {
    /// A field-name string constant (also covers oneof case names and has-bits holders).
    FieldName(U16String),

    /// A class literal, e.g. the element class of a message-typed list field.
    TypeLiteral(TypeRef),

    /// A static field read, e.g. a map-entry descriptor held in a static field.
    StaticRead(FieldRef),

    /// A static call, e.g. an enum verifier obtained from `internalGetVerifier()`.
    StaticCall(MethodRef),
}

impl SchemaObject {
    /// Convenience constructor for a field-name object from UTF-8 text.
    #[must_use]
    pub fn field_name(name: &str) -> Self {
        SchemaObject::FieldName(U16String::from_str(name))
    }

    /// Classifies the definition of an objects-array element.
    ///
    /// # Errors
    ///
    /// Fails when the stored value's definition is not one of the shapes generated
    /// code produces (a string constant, a class literal, a static read, or a
    /// result-producing static call).
    pub fn from_value(ir: &MethodIr, value: ValueId) -> Result<Self> {
        let root = ir.aliased_value(value);
        match ir.definition_instr(root) {
            Some(Instruction::ConstString { value, .. }) => {
                Ok(SchemaObject::FieldName(value.clone()))
            }
            Some(Instruction::ConstClass { ty, .. }) => Ok(SchemaObject::TypeLiteral(ty.clone())),
            Some(Instruction::StaticGet { field, .. }) => {
                Ok(SchemaObject::StaticRead(field.clone()))
            }
            Some(Instruction::InvokeStatic {
                dest: Some(_),
                method,
                ..
            }) => Ok(SchemaObject::StaticCall(method.clone())),
            _ => Err(schema_error!(
                "schema object {root} has no recognizable definition"
            )),
        }
    }

    /// Synthesizes a fresh instruction producing this object before the cursor's
    /// current instruction, and returns the produced value.
    ///
    /// Type-carrying variants are re-resolved through the facts' rename lens, so the
    /// fresh material points at the post-merging identity of whatever the original
    /// operand referenced.
    pub fn materialize(
        &self,
        cursor: &mut InstructionCursor<'_>,
        facts: &dyn ReachabilityFacts,
    ) -> ValueId {
        let renamed = |ty: &TypeRef| facts.renamed_type(ty).unwrap_or_else(|| ty.clone());
        match self {
            SchemaObject::FieldName(name) => {
                let dest = cursor.ir_mut().new_value(Some(TypeRef::string()));
                cursor.insert_before(Instruction::ConstString {
                    dest,
                    value: name.clone(),
                });
                dest
            }
            SchemaObject::TypeLiteral(ty) => {
                let ty = renamed(ty);
                let dest = cursor.ir_mut().new_value(Some(TypeRef::class()));
                cursor.insert_before(Instruction::ConstClass { dest, ty });
                dest
            }
            SchemaObject::StaticRead(field) => {
                let holder = renamed(field.holder());
                let field_type = renamed(field.field_type());
                let field = FieldRef::new(holder, field.name(), field_type.clone());
                let dest = cursor.ir_mut().new_value(Some(field_type));
                cursor.insert_before(Instruction::StaticGet { dest, field });
                dest
            }
            SchemaObject::StaticCall(method) => {
                let holder = renamed(method.holder());
                let method = method.with_holder(holder);
                let dest = cursor.ir_mut().new_value(Some(method.return_type().clone()));
                cursor.insert_before(Instruction::InvokeStatic {
                    dest: Some(dest),
                    method,
                    args: vec![],
                });
                dest
            }
        }
    }
}
