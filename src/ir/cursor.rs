//! Instruction cursor with lookahead, insertion and replacement.
//!
//! Pattern matching over instruction streams is expressed through a cursor rather than
//! hand-rolled index bookkeeping: [`InstructionCursor::find_next`] advances to the next
//! instruction satisfying a predicate, and mutation happens relative to the stable
//! current position. Inserted instructions inherit the current instruction's source
//! position.

use crate::ir::instruction::{InstrId, Instruction};
use crate::ir::method::MethodIr;

/// Cursor over one basic block's instruction list.
///
/// The cursor starts *before* the first instruction; the first
/// [`advance`](Self::advance) or [`find_next`](Self::find_next) establishes a current
/// position.
///
/// # Examples
///
/// ```rust
/// use protoshrink::ir::cursor::InstructionCursor;
/// use protoshrink::ir::instruction::Instruction;
/// use protoshrink::ir::method::MethodIr;
///
/// let mut ir = MethodIr::new();
/// let block = ir.new_block();
/// let v = ir.new_value(None);
/// ir.push(block, Instruction::ConstNumber { dest: v, value: 1 });
/// ir.push(block, Instruction::Goto);
///
/// let mut cursor = InstructionCursor::new(&mut ir, block);
/// let found = cursor.find_next(|i| i.is_control_flow());
/// assert!(found.is_some());
/// ```
pub struct InstructionCursor<'a> {
    ir: &'a mut MethodIr,
    block: usize,
    position: Option<usize>,
}

impl<'a> InstructionCursor<'a> {
    /// Creates a cursor positioned before the first instruction of the block.
    pub fn new(ir: &'a mut MethodIr, block: usize) -> Self {
        InstructionCursor {
            ir,
            block,
            position: None,
        }
    }

    /// Creates a cursor positioned *at* the given index of the block.
    pub fn at(ir: &'a mut MethodIr, block: usize, index: usize) -> Self {
        InstructionCursor {
            ir,
            block,
            position: Some(index),
        }
    }

    /// The block this cursor iterates.
    #[must_use]
    pub fn block(&self) -> usize {
        self.block
    }

    /// Read access to the underlying method.
    #[must_use]
    pub fn ir(&self) -> &MethodIr {
        self.ir
    }

    /// Mutable access to the underlying method, e.g. for creating fresh values.
    ///
    /// Structural edits to the cursor's block must go through the cursor itself;
    /// anything else invalidates the current position.
    pub fn ir_mut(&mut self) -> &mut MethodIr {
        self.ir
    }

    /// The current instruction, if a position is established.
    #[must_use]
    pub fn current(&self) -> Option<InstrId> {
        let index = self.position?;
        self.ir.block_instructions(self.block).get(index).copied()
    }

    /// Moves to the next instruction and returns it.
    pub fn advance(&mut self) -> Option<InstrId> {
        let next = match self.position {
            None => 0,
            Some(index) => index + 1,
        };
        if next < self.ir.block_instructions(self.block).len() {
            self.position = Some(next);
            self.current()
        } else {
            self.position = Some(next);
            None
        }
    }

    /// Advances until an instruction satisfies the predicate.
    ///
    /// Returns the matching instruction and leaves the cursor positioned at it; returns
    /// `None` with the cursor exhausted when no instruction matches.
    pub fn find_next<P>(&mut self, predicate: P) -> Option<InstrId>
    where
        P: Fn(&Instruction) -> bool,
    {
        while let Some(id) = self.advance() {
            if predicate(self.ir.instruction(id)) {
                return Some(id);
            }
        }
        None
    }

    /// Inserts an instruction immediately before the current one.
    ///
    /// The inserted instruction inherits the current instruction's source position, and
    /// the cursor keeps pointing at the same current instruction.
    ///
    /// # Panics
    ///
    /// Panics if no current position is established.
    pub fn insert_before(&mut self, instruction: Instruction) -> InstrId {
        let current = self.current().expect("cursor has no current instruction");
        let index = self.position.unwrap();
        let position = self.ir.position(current);
        let id = self.ir.insert_at(self.block, index, instruction, position);
        self.position = Some(index + 1);
        id
    }

    /// Replaces the current instruction in place, keeping its id and position.
    ///
    /// # Panics
    ///
    /// Panics if no current position is established.
    pub fn replace_current(&mut self, instruction: Instruction) -> InstrId {
        let id = self.current().expect("cursor has no current instruction");
        self.ir.replace(id, instruction);
        id
    }
}
