//! Values in the host IR's SSA-like value graph.
//!
//! A [`ValueId`] names one value; the owning [`MethodIr`](crate::ir::method::MethodIr)
//! holds the per-value data: the defining instruction, whether the value is a phi, and
//! its static type when known. The shrinker never inspects phi operands; alias chasing
//! stops at phis, matching the host compiler's contract.

use std::fmt;

use crate::program::refs::TypeRef;

/// Identifier of a value within one method's IR.
///
/// Plain index newtype; only meaningful together with the method that created it.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ValueId(pub u32);

impl ValueId {
    /// Returns the raw index.
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for ValueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

impl fmt::Display for ValueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// Per-value bookkeeping owned by the method.
#[derive(Debug, Clone)]
pub struct ValueData {
    /// The instruction that defines this value, if any.
    ///
    /// Phis and method arguments have no defining instruction here.
    pub definition: Option<crate::ir::instruction::InstrId>,

    /// Whether the value joins multiple definitions.
    pub is_phi: bool,

    /// The value's static type, when the host compiler knows one.
    pub ty: Option<TypeRef>,
}

impl ValueData {
    /// Creates data for an ordinary (non-phi) value.
    #[must_use]
    pub fn new(ty: Option<TypeRef>) -> Self {
        ValueData {
            definition: None,
            is_phi: false,
            ty,
        }
    }

    /// Creates data for a phi value.
    #[must_use]
    pub fn phi(ty: Option<TypeRef>) -> Self {
        ValueData {
            definition: None,
            is_phi: true,
            ty,
        }
    }
}
