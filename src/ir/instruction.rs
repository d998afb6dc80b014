//! The instruction sum type of the host-IR contract.
//!
//! This is deliberately the *minimal* instruction set the shrinker needs to recognize
//! and synthesize: constants, array construction and element stores, field accesses,
//! the four invoke kinds, check-cast, and opaque control flow. The host compiler's full
//! instruction set maps onto these; everything the shrinker does not inspect stays
//! behind [`Instruction::Opaque`].

use std::fmt;

use widestring::U16String;

use crate::ir::value::ValueId;
use crate::program::refs::{FieldRef, MethodRef, TypeRef};

/// Identifier of an instruction within one method's IR arena.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstrId(pub u32);

impl InstrId {
    /// Returns the raw index.
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for InstrId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "i{}", self.0)
    }
}

/// Source position attached to an instruction, propagated on insertion.
///
/// The payload is opaque to the shrinker; synthesized instructions inherit the position
/// of the instruction they were inserted next to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourcePosition(pub u32);

impl SourcePosition {
    /// Position for instructions with no source counterpart.
    pub const SYNTHETIC: SourcePosition = SourcePosition(u32::MAX);
}

/// One instruction of the host-IR contract.
///
/// Instructions name their operand values by [`ValueId`]; results are explicit `dest`
/// values. Invoke argument lists include the receiver as the first element for the
/// instance invoke kinds.
#[derive(Debug, Clone)]
pub enum Instruction {
    /// A constant string of UTF-16 code units.
    ///
    /// The packed schema payload contains unpaired surrogates, so string constants are
    /// code-unit sequences, not guaranteed-valid UTF-8 text.
    ConstString {
        /// Defined value.
        dest: ValueId,
        /// The code units.
        value: U16String,
    },

    /// A constant integer.
    ConstNumber {
        /// Defined value.
        dest: ValueId,
        /// The constant.
        value: i64,
    },

    /// A class literal.
    ConstClass {
        /// Defined value.
        dest: ValueId,
        /// The referenced type.
        ty: TypeRef,
    },

    /// A transparent alias of another value.
    Assign {
        /// Defined value.
        dest: ValueId,
        /// Aliased value.
        src: ValueId,
    },

    /// Allocation of an uninitialized instance.
    NewInstance {
        /// Defined value.
        dest: ValueId,
        /// Instantiated type.
        ty: TypeRef,
    },

    /// Allocation of a fixed-size array.
    NewArray {
        /// Defined value.
        dest: ValueId,
        /// Element type.
        element_type: TypeRef,
        /// Array length operand.
        size: ValueId,
    },

    /// Store of a value into an array element.
    ArrayPut {
        /// The array.
        array: ValueId,
        /// Element index operand.
        index: ValueId,
        /// Stored value.
        value: ValueId,
    },

    /// Read of a static field.
    StaticGet {
        /// Defined value.
        dest: ValueId,
        /// The field.
        field: FieldRef,
    },

    /// Write of a static field.
    StaticPut {
        /// The field.
        field: FieldRef,
        /// Stored value.
        value: ValueId,
    },

    /// Write of an instance field.
    InstancePut {
        /// The field.
        field: FieldRef,
        /// Receiver object.
        object: ValueId,
        /// Stored value.
        value: ValueId,
    },

    /// Invocation of a static method.
    InvokeStatic {
        /// Result value, absent for `void`.
        dest: Option<ValueId>,
        /// Invoked method.
        method: MethodRef,
        /// Arguments.
        args: Vec<ValueId>,
    },

    /// Direct (non-virtual) invocation: constructors and private methods.
    InvokeDirect {
        /// Result value, absent for `void`.
        dest: Option<ValueId>,
        /// Invoked method.
        method: MethodRef,
        /// Receiver followed by arguments.
        args: Vec<ValueId>,
    },

    /// Virtual invocation.
    InvokeVirtual {
        /// Result value, absent for `void`.
        dest: Option<ValueId>,
        /// Invoked method.
        method: MethodRef,
        /// Receiver followed by arguments.
        args: Vec<ValueId>,
    },

    /// Super invocation.
    InvokeSuper {
        /// Result value, absent for `void`.
        dest: Option<ValueId>,
        /// Invoked method.
        method: MethodRef,
        /// Receiver followed by arguments.
        args: Vec<ValueId>,
    },

    /// Checked downcast.
    CheckCast {
        /// Defined value.
        dest: ValueId,
        /// Cast operand.
        object: ValueId,
        /// Target type.
        ty: TypeRef,
    },

    /// Conditional branch. Targets live in the host CFG; the shrinker only needs the
    /// control-flow boundary.
    If {
        /// Branch condition.
        condition: ValueId,
    },

    /// Unconditional jump.
    Goto,

    /// Method return.
    Return {
        /// Returned value, absent for `void`.
        value: Option<ValueId>,
    },

    /// Throw of an exception value.
    Throw {
        /// Thrown value.
        value: ValueId,
    },

    /// An instruction the shrinker does not model.
    ///
    /// Opaque instructions never transfer control and define at most the given value.
    Opaque {
        /// Defined value, if any.
        dest: Option<ValueId>,
    },
}

impl Instruction {
    /// Returns the value this instruction defines, if any.
    #[must_use]
    pub fn dest(&self) -> Option<ValueId> {
        match self {
            Instruction::ConstString { dest, .. }
            | Instruction::ConstNumber { dest, .. }
            | Instruction::ConstClass { dest, .. }
            | Instruction::Assign { dest, .. }
            | Instruction::NewInstance { dest, .. }
            | Instruction::NewArray { dest, .. }
            | Instruction::CheckCast { dest, .. }
            | Instruction::StaticGet { dest, .. } => Some(*dest),
            Instruction::InvokeStatic { dest, .. }
            | Instruction::InvokeDirect { dest, .. }
            | Instruction::InvokeVirtual { dest, .. }
            | Instruction::InvokeSuper { dest, .. }
            | Instruction::Opaque { dest } => *dest,
            Instruction::ArrayPut { .. }
            | Instruction::StaticPut { .. }
            | Instruction::InstancePut { .. }
            | Instruction::If { .. }
            | Instruction::Goto
            | Instruction::Return { .. }
            | Instruction::Throw { .. } => None,
        }
    }

    /// Returns `true` if this instruction transfers control.
    ///
    /// The schema objects-array scan stops at the first such instruction.
    #[must_use]
    pub fn is_control_flow(&self) -> bool {
        matches!(
            self,
            Instruction::If { .. }
                | Instruction::Goto
                | Instruction::Return { .. }
                | Instruction::Throw { .. }
        )
    }

    /// Returns the invoked method for any invoke kind.
    #[must_use]
    pub fn invoked_method(&self) -> Option<&MethodRef> {
        match self {
            Instruction::InvokeStatic { method, .. }
            | Instruction::InvokeDirect { method, .. }
            | Instruction::InvokeVirtual { method, .. }
            | Instruction::InvokeSuper { method, .. } => Some(method),
            _ => None,
        }
    }

    /// Returns the argument list for any invoke kind.
    #[must_use]
    pub fn invoke_args(&self) -> Option<&[ValueId]> {
        match self {
            Instruction::InvokeStatic { args, .. }
            | Instruction::InvokeDirect { args, .. }
            | Instruction::InvokeVirtual { args, .. }
            | Instruction::InvokeSuper { args, .. } => Some(args),
            _ => None,
        }
    }
}
