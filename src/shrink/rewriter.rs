//! The schema rewrite pass.
//!
//! For each message class's reflection method, the rewriter locates the unique schema
//! construction site, decodes the schema through the codec, re-encodes it (recomputing
//! the summary integers and re-synthesizing the objects through the rename lens), and
//! splices the fresh payload back into the IR: a new constant string for the info
//! operand and a new array construction for the objects operand. The original operand
//! chains become unreferenced and are left to the host's dead-code sweep.
//!
//! Decode failure is soft: the method is left exactly as found, one skip event is
//! recorded, and compilation continues with the schema un-minimized.

use crate::diagnostics::{EventKind, EventLog};
use crate::ir::cursor::InstructionCursor;
use crate::ir::instruction::{InstrId, Instruction};
use crate::ir::method::MethodIr;
use crate::ir::value::ValueId;
use crate::program::facts::ReachabilityFacts;
use crate::program::refs::{MethodRef, TypeRef};
use crate::schema::decoder::decode_from_ir;
use crate::schema::encoder::{encode_schema, EncodedSchema};
use crate::shrink::references::{ConstructionShape, ProtoSupportRefs};

/// The per-method schema rewriter.
pub struct SchemaRewriter<'a> {
    refs: &'a ProtoSupportRefs,
    facts: &'a dyn ReachabilityFacts,
    events: &'a EventLog,
}

/// The located construction site of one reflection method.
#[derive(Debug, Clone, Copy)]
enum ConstructionSite {
    /// A single call carrying the info/objects operands.
    Call {
        invoke: InstrId,
        info_index: usize,
        objects_index: usize,
    },
    /// The inlined constructor: separate stores of the two fields.
    FieldStores {
        info_store: InstrId,
        objects_store: InstrId,
    },
}

impl<'a> SchemaRewriter<'a> {
    /// Creates a rewriter over the given collaborators.
    #[must_use]
    pub fn new(
        refs: &'a ProtoSupportRefs,
        facts: &'a dyn ReachabilityFacts,
        events: &'a EventLog,
    ) -> Self {
        SchemaRewriter { refs, facts, events }
    }

    /// Rewrites the schema construction inside one reflection method.
    ///
    /// Returns `true` if the method was changed. A method without a construction site
    /// is a no-op; a malformed schema records a skip event and leaves the method
    /// untouched.
    pub fn rewrite(&self, method: &MethodRef, ir: &mut MethodIr) -> bool {
        let Some(site) = self.locate_construction(ir) else {
            return false;
        };
        let (info, objects) = match site {
            ConstructionSite::Call {
                invoke,
                info_index,
                objects_index,
            } => {
                let args = ir
                    .instruction(invoke)
                    .invoke_args()
                    .expect("construction site is an invoke");
                (args[info_index], args[objects_index])
            }
            ConstructionSite::FieldStores {
                info_store,
                objects_store,
            } => {
                let info = match ir.instruction(info_store) {
                    Instruction::InstancePut { value, .. } => *value,
                    _ => unreachable!("classified as a field store"),
                };
                let objects = match ir.instruction(objects_store) {
                    Instruction::InstancePut { value, .. } => *value,
                    _ => unreachable!("classified as a field store"),
                };
                (info, objects)
            }
        };

        let decoded = match decode_from_ir(ir, info, objects) {
            Ok(decoded) => decoded,
            Err(error) => {
                self.events
                    .record(EventKind::SchemaSkipped)
                    .subject(method)
                    .message(error.to_string());
                return false;
            }
        };
        let encoded = encode_schema(&decoded);

        match site {
            ConstructionSite::Call {
                invoke,
                info_index,
                objects_index,
            } => {
                let (info_value, objects_value) = self.splice_before(ir, invoke, &encoded);
                if let Some(args) = invoke_args_mut(ir.instruction_mut(invoke)) {
                    args[info_index] = info_value;
                    args[objects_index] = objects_value;
                }
            }
            ConstructionSite::FieldStores {
                info_store,
                objects_store,
            } => {
                let info_value = self.splice_info_before(ir, info_store, &encoded);
                if let Instruction::InstancePut { value, .. } = ir.instruction_mut(info_store) {
                    *value = info_value;
                }
                let objects_value = self.splice_objects_before(ir, objects_store, &encoded);
                if let Instruction::InstancePut { value, .. } = ir.instruction_mut(objects_store)
                {
                    *value = objects_value;
                }
            }
        }

        self.events
            .record(EventKind::SchemaRewritten)
            .subject(method);
        true
    }

    /// Locates the unique construction site.
    ///
    /// More than one site in a single reflection method is unreachable for generated
    /// code; debug builds assert, release builds keep the first.
    fn locate_construction(&self, ir: &MethodIr) -> Option<ConstructionSite> {
        let mut calls: Vec<InstrId> = Vec::new();
        let mut info_stores: Vec<InstrId> = Vec::new();
        let mut objects_stores: Vec<InstrId> = Vec::new();

        for block in 0..ir.block_count() {
            for &id in ir.block_instructions(block) {
                match self.refs.classify_message_info_construction(ir, id) {
                    Some(ConstructionShape::StaticFactory | ConstructionShape::RawConstructor) => {
                        calls.push(id);
                    }
                    Some(ConstructionShape::InlinedFieldStores) => {
                        match ir.instruction(id) {
                            Instruction::InstancePut { field, .. }
                                if *field == self.refs.raw_message_info_info_field =>
                            {
                                info_stores.push(id);
                            }
                            _ => objects_stores.push(id),
                        }
                    }
                    None => {}
                }
            }
        }

        if let Some(&invoke) = calls.first() {
            debug_assert_eq!(calls.len(), 1, "multiple schema construction calls");
            debug_assert!(
                info_stores.is_empty() && objects_stores.is_empty(),
                "mixed schema construction shapes"
            );
            let (info_index, objects_index) = match ir.instruction(invoke) {
                Instruction::InvokeStatic { .. } => (1, 2),
                _ => (2, 3),
            };
            return Some(ConstructionSite::Call {
                invoke,
                info_index,
                objects_index,
            });
        }

        match (info_stores.as_slice(), objects_stores.as_slice()) {
            ([info_store], [objects_store]) => Some(ConstructionSite::FieldStores {
                info_store: *info_store,
                objects_store: *objects_store,
            }),
            ([], []) => None,
            _ => {
                debug_assert!(false, "unpaired schema field stores");
                None
            }
        }
    }

    /// Splices both fresh operands before an anchor instruction.
    fn splice_before(
        &self,
        ir: &mut MethodIr,
        anchor: InstrId,
        encoded: &EncodedSchema,
    ) -> (ValueId, ValueId) {
        let info = self.splice_info_before(ir, anchor, encoded);
        let objects = self.splice_objects_before(ir, anchor, encoded);
        (info, objects)
    }

    /// Inserts the fresh info constant before the anchor and returns its value.
    fn splice_info_before(
        &self,
        ir: &mut MethodIr,
        anchor: InstrId,
        encoded: &EncodedSchema,
    ) -> ValueId {
        let (block, index) = ir.locate(anchor).expect("anchor is attached");
        let dest = ir.new_value(Some(TypeRef::string()));
        let mut cursor = InstructionCursor::at(ir, block, index);
        cursor.insert_before(Instruction::ConstString {
            dest,
            value: encoded.info.clone(),
        });
        dest
    }

    /// Inserts the fresh array construction before the anchor and returns the array.
    ///
    /// The construction is the canonical generated shape: a constant size, the
    /// allocation, then one constant-index/materialize/store triple per object in
    /// encoding order.
    fn splice_objects_before(
        &self,
        ir: &mut MethodIr,
        anchor: InstrId,
        encoded: &EncodedSchema,
    ) -> ValueId {
        let (block, index) = ir.locate(anchor).expect("anchor is attached");
        let size = ir.new_value(None);
        let array = ir.new_value(Some(TypeRef::object_array()));
        {
            let mut cursor = InstructionCursor::at(ir, block, index);
            cursor.insert_before(Instruction::ConstNumber {
                dest: size,
                value: encoded.objects.len() as i64,
            });
            cursor.insert_before(Instruction::NewArray {
                dest: array,
                element_type: TypeRef::object(),
                size,
            });
        }
        for (slot, object) in encoded.objects.iter().enumerate() {
            let (block, index) = ir.locate(anchor).expect("anchor is attached");
            let index_value = ir.new_value(None);
            let mut cursor = InstructionCursor::at(ir, block, index);
            cursor.insert_before(Instruction::ConstNumber {
                dest: index_value,
                value: slot as i64,
            });
            let element = object.materialize(&mut cursor, self.facts);
            cursor.insert_before(Instruction::ArrayPut {
                array,
                index: index_value,
                value: element,
            });
        }
        array
    }
}

fn invoke_args_mut(instruction: &mut Instruction) -> Option<&mut Vec<ValueId>> {
    match instruction {
        Instruction::InvokeStatic { args, .. }
        | Instruction::InvokeDirect { args, .. }
        | Instruction::InvokeVirtual { args, .. }
        | Instruction::InvokeSuper { args, .. } => Some(args),
        _ => None,
    }
}
