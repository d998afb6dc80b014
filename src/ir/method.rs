//! Method bodies: instruction arena, basic blocks and value graph.
//!
//! [`MethodIr`] owns everything a single method's rewrite touches: the instruction arena
//! (instructions are never deallocated, only detached from blocks), the block layout, and
//! the value table. The shrinker's passes are per-method, so no synchronization lives
//! here; parallelism happens one method per worker.

use widestring::U16String;

use crate::ir::instruction::{InstrId, Instruction, SourcePosition};
use crate::ir::value::{ValueData, ValueId};
use crate::program::refs::TypeRef;

/// A basic block: an ordered list of instructions ending in at most one control transfer.
#[derive(Debug, Default, Clone)]
pub struct BasicBlock {
    /// Instruction ids in execution order.
    pub instructions: Vec<InstrId>,
}

/// One method's IR.
///
/// # Examples
///
/// ```rust
/// use protoshrink::ir::instruction::Instruction;
/// use protoshrink::ir::method::MethodIr;
///
/// let mut ir = MethodIr::new();
/// let block = ir.new_block();
/// let value = ir.new_value(None);
/// ir.push(block, Instruction::ConstNumber { dest: value, value: 42 });
/// assert_eq!(ir.const_int(value), Some(42));
/// ```
#[derive(Debug, Default, Clone)]
pub struct MethodIr {
    blocks: Vec<BasicBlock>,
    instructions: Vec<Instruction>,
    positions: Vec<SourcePosition>,
    values: Vec<ValueData>,
}

impl MethodIr {
    /// Creates an empty method body.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a new empty basic block and returns its index.
    pub fn new_block(&mut self) -> usize {
        self.blocks.push(BasicBlock::default());
        self.blocks.len() - 1
    }

    /// Number of basic blocks.
    #[must_use]
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// The instruction ids of one block, in execution order.
    #[must_use]
    pub fn block_instructions(&self, block: usize) -> &[InstrId] {
        &self.blocks[block].instructions
    }

    /// Creates a fresh value with an optional static type.
    pub fn new_value(&mut self, ty: Option<TypeRef>) -> ValueId {
        self.values.push(ValueData::new(ty));
        ValueId((self.values.len() - 1) as u32)
    }

    /// Creates a fresh phi value with an optional static type.
    pub fn new_phi_value(&mut self, ty: Option<TypeRef>) -> ValueId {
        self.values.push(ValueData::phi(ty));
        ValueId((self.values.len() - 1) as u32)
    }

    /// Appends an instruction to a block and registers its definition.
    pub fn push(&mut self, block: usize, instruction: Instruction) -> InstrId {
        self.push_with_position(block, instruction, SourcePosition::SYNTHETIC)
    }

    /// Appends an instruction with an explicit source position.
    pub fn push_with_position(
        &mut self,
        block: usize,
        instruction: Instruction,
        position: SourcePosition,
    ) -> InstrId {
        let id = self.intern(instruction, position);
        self.blocks[block].instructions.push(id);
        id
    }

    /// Inserts an instruction into a block at the given index.
    pub(crate) fn insert_at(
        &mut self,
        block: usize,
        index: usize,
        instruction: Instruction,
        position: SourcePosition,
    ) -> InstrId {
        let id = self.intern(instruction, position);
        self.blocks[block].instructions.insert(index, id);
        id
    }

    fn intern(&mut self, instruction: Instruction, position: SourcePosition) -> InstrId {
        let id = InstrId(self.instructions.len() as u32);
        if let Some(dest) = instruction.dest() {
            self.values[dest.index()].definition = Some(id);
        }
        self.instructions.push(instruction);
        self.positions.push(position);
        id
    }

    /// Replaces the instruction stored under an existing id.
    ///
    /// The previous instruction's result value loses its definition if the replacement
    /// defines a different value.
    pub fn replace(&mut self, id: InstrId, instruction: Instruction) {
        let old_dest = self.instructions[id.index()].dest();
        let new_dest = instruction.dest();
        if let Some(old) = old_dest {
            if old_dest != new_dest {
                self.values[old.index()].definition = None;
            }
        }
        if let Some(dest) = new_dest {
            self.values[dest.index()].definition = Some(id);
        }
        self.instructions[id.index()] = instruction;
    }

    /// Returns the instruction stored under an id.
    #[must_use]
    pub fn instruction(&self, id: InstrId) -> &Instruction {
        &self.instructions[id.index()]
    }

    /// Returns a mutable reference to an instruction, for operand repointing.
    ///
    /// Callers must not change which value the instruction defines; use
    /// [`replace`](Self::replace) for that.
    pub fn instruction_mut(&mut self, id: InstrId) -> &mut Instruction {
        &mut self.instructions[id.index()]
    }

    /// Returns the source position of an instruction.
    #[must_use]
    pub fn position(&self, id: InstrId) -> SourcePosition {
        self.positions[id.index()]
    }

    /// Returns the defining instruction id of a value.
    #[must_use]
    pub fn definition(&self, value: ValueId) -> Option<InstrId> {
        self.values[value.index()].definition
    }

    /// Returns the defining instruction of a value.
    #[must_use]
    pub fn definition_instr(&self, value: ValueId) -> Option<&Instruction> {
        self.definition(value).map(|id| self.instruction(id))
    }

    /// Returns `true` if the value is a phi.
    #[must_use]
    pub fn is_phi(&self, value: ValueId) -> bool {
        self.values[value.index()].is_phi
    }

    /// Returns the static type of a value, when known.
    #[must_use]
    pub fn value_type(&self, value: ValueId) -> Option<&TypeRef> {
        self.values[value.index()].ty.as_ref()
    }

    /// Sets the static type of a value.
    pub fn set_value_type(&mut self, value: ValueId, ty: Option<TypeRef>) {
        self.values[value.index()].ty = ty;
    }

    /// Follows the assignment chain of a value to its root.
    ///
    /// Stops at phis and at any non-alias definition. Total by construction: the walk is
    /// bounded by the value count, so a malformed cyclic graph terminates rather than
    /// spinning.
    #[must_use]
    pub fn aliased_value(&self, value: ValueId) -> ValueId {
        let mut current = value;
        for _ in 0..self.values.len() {
            if self.is_phi(current) {
                return current;
            }
            match self.definition_instr(current) {
                Some(Instruction::Assign { src, .. }) => current = *src,
                _ => return current,
            }
        }
        current
    }

    /// Resolves a value to a constant string through the alias chain.
    #[must_use]
    pub fn const_string(&self, value: ValueId) -> Option<&U16String> {
        match self.definition_instr(self.aliased_value(value)) {
            Some(Instruction::ConstString { value, .. }) => Some(value),
            _ => None,
        }
    }

    /// Resolves a value to a constant integer through the alias chain.
    #[must_use]
    pub fn const_int(&self, value: ValueId) -> Option<i64> {
        match self.definition_instr(self.aliased_value(value)) {
            Some(Instruction::ConstNumber { value, .. }) => Some(*value),
            _ => None,
        }
    }

    /// Locates an instruction's block and index within that block.
    #[must_use]
    pub fn locate(&self, id: InstrId) -> Option<(usize, usize)> {
        for (block_index, block) in self.blocks.iter().enumerate() {
            if let Some(pos) = block.instructions.iter().position(|&i| i == id) {
                return Some((block_index, pos));
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alias_chain_resolution() {
        let mut ir = MethodIr::new();
        let block = ir.new_block();
        let root = ir.new_value(None);
        let alias1 = ir.new_value(None);
        let alias2 = ir.new_value(None);
        ir.push(block, Instruction::ConstNumber { dest: root, value: 7 });
        ir.push(block, Instruction::Assign { dest: alias1, src: root });
        ir.push(block, Instruction::Assign { dest: alias2, src: alias1 });

        assert_eq!(ir.aliased_value(alias2), root);
        assert_eq!(ir.const_int(alias2), Some(7));
    }

    #[test]
    fn test_alias_chain_stops_at_phi() {
        let mut ir = MethodIr::new();
        let block = ir.new_block();
        let phi = ir.new_phi_value(None);
        let alias = ir.new_value(None);
        ir.push(block, Instruction::Assign { dest: alias, src: phi });

        assert_eq!(ir.aliased_value(alias), phi);
        assert_eq!(ir.const_int(alias), None);
    }

    #[test]
    fn test_replace_rebinds_definition() {
        let mut ir = MethodIr::new();
        let block = ir.new_block();
        let a = ir.new_value(None);
        let b = ir.new_value(None);
        let id = ir.push(block, Instruction::ConstNumber { dest: a, value: 1 });

        ir.replace(id, Instruction::ConstNumber { dest: b, value: 2 });
        assert_eq!(ir.definition(a), None);
        assert_eq!(ir.definition(b), Some(id));
        assert_eq!(ir.const_int(b), Some(2));
    }

    #[test]
    fn test_locate() {
        let mut ir = MethodIr::new();
        let b0 = ir.new_block();
        let b1 = ir.new_block();
        let v = ir.new_value(None);
        ir.push(b0, Instruction::Goto);
        let id = ir.push(b1, Instruction::ConstNumber { dest: v, value: 3 });
        assert_eq!(ir.locate(id), Some((b1, 0)));
        assert_eq!(ir.block_count(), 2);
    }
}
