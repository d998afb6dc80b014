//! Schema decoding: from IR operands to [`ProtoMessageInfo`].
//!
//! Decoding has two stages. The IR stage resolves the info operand to a constant string
//! and the objects operand to a freshly allocated, fully initialized fixed-size array;
//! the stream stage walks the packed integers and the object list in lockstep. Both
//! streams must be consumed exactly: leftover integers, missing objects or extra array
//! slots fail the decode, and the caller leaves the message unoptimized.

use crate::ir::instruction::Instruction;
use crate::ir::method::MethodIr;
use crate::ir::value::ValueId;
use crate::schema::field_type::ProtoFieldType;
use crate::schema::message_info::{ProtoFieldInfo, ProtoMessageInfo};
use crate::schema::object::SchemaObject;
use crate::schema::packed::PackedIntReader;
use crate::Result;

/// Decodes a schema from its IR operands.
///
/// `info` must alias-resolve to a constant string; `objects` to a fresh fixed-size
/// array whose declared size equals the number of elements stored into it by
/// constant-index element stores between the allocation and the block's first
/// control-flow transfer.
///
/// # Errors
///
/// Any shape violation yields [`Error::MalformedSchema`](crate::Error::MalformedSchema);
/// nothing is mutated on failure.
pub fn decode_from_ir(
    ir: &MethodIr,
    info: ValueId,
    objects: ValueId,
) -> Result<ProtoMessageInfo> {
    let units = ir
        .const_string(info)
        .ok_or_else(|| schema_error!("info operand does not resolve to a constant string"))?;
    let object_values = resolve_object_values(ir, objects)?;
    let mut resolved = Vec::with_capacity(object_values.len());
    for value in object_values {
        resolved.push(SchemaObject::from_value(ir, value)?);
    }
    decode_schema(units.as_slice(), resolved)
}

/// Resolves the objects operand to the stored element values, in index order.
fn resolve_object_values(ir: &MethodIr, objects: ValueId) -> Result<Vec<ValueId>> {
    let array = ir.aliased_value(objects);
    let (size_value, allocation) = match ir.definition_instr(array) {
        Some(Instruction::NewArray { size, .. }) => (*size, ir.definition(array).unwrap()),
        _ => {
            return Err(schema_error!(
                "objects operand does not resolve to a fresh array allocation"
            ))
        }
    };
    let size = ir
        .const_int(size_value)
        .ok_or_else(|| schema_error!("objects array has a non-constant size"))?;
    if size < 0 {
        return Err(schema_error!("objects array has negative size {size}"));
    }
    let size = size as usize;

    let (block, position) = allocation_site(ir, allocation)?;
    let mut elements: Vec<Option<ValueId>> = vec![None; size];
    let mut stored = 0usize;
    for &id in &ir.block_instructions(block)[position + 1..] {
        let instruction = ir.instruction(id);
        if instruction.is_control_flow() {
            break;
        }
        if let Instruction::ArrayPut {
            array: target,
            index,
            value,
        } = instruction
        {
            if ir.aliased_value(*target) != array {
                continue;
            }
            let index = ir
                .const_int(*index)
                .ok_or_else(|| schema_error!("objects array store with non-constant index"))?;
            let slot = usize::try_from(index)
                .ok()
                .filter(|&i| i < size)
                .ok_or_else(|| schema_error!("objects array store out of bounds: {index}"))?;
            if elements[slot].is_some() {
                return Err(schema_error!("objects array slot {slot} stored twice"));
            }
            elements[slot] = Some(*value);
            stored += 1;
        }
    }
    if stored != size {
        return Err(schema_error!(
            "objects array declares {size} elements but {stored} are stored"
        ));
    }
    Ok(elements.into_iter().map(Option::unwrap).collect())
}

fn allocation_site(
    ir: &MethodIr,
    allocation: crate::ir::instruction::InstrId,
) -> Result<(usize, usize)> {
    ir.locate(allocation)
        .ok_or_else(|| schema_error!("objects array allocation is detached from the method body"))
}

/// Decodes a schema from its raw parts: packed units plus the positional object list.
///
/// # Errors
///
/// Fails unless both streams are consumed exactly and every count is well formed.
pub fn decode_schema(units: &[u16], objects: Vec<SchemaObject>) -> Result<ProtoMessageInfo> {
    let mut reader = PackedIntReader::new(units);
    let mut objects = objects.into_iter();

    let flags = reader.next()?;
    let field_count = read_count(&mut reader, "field count")?;

    if field_count == 0 {
        if !reader.is_exhausted() {
            return Err(schema_error!("empty schema carries trailing integers"));
        }
        if objects.next().is_some() {
            return Err(schema_error!("empty schema carries objects"));
        }
        return Ok(ProtoMessageInfo::empty(flags));
    }

    let oneof_count = read_count(&mut reader, "oneof object count")?;
    let has_bits_count = read_count(&mut reader, "has-bits object count")?;
    // Six summary integers follow (min/max field number, entry count, map and repeated
    // field counts, check-initialized count). All are recomputable from the field list,
    // so they are validated for presence and discarded.
    for _ in 0..6 {
        reader.next()?;
    }

    let mut next_object = |what: &str| {
        objects
            .next()
            .ok_or_else(|| schema_error!("objects exhausted while reading {what}"))
    };

    let mut oneof_objects = Vec::with_capacity(oneof_count);
    for _ in 0..oneof_count {
        let case = next_object("oneof pair")?;
        let value = next_object("oneof pair")?;
        oneof_objects.push((case, value));
    }

    let mut has_bits_objects = Vec::with_capacity(has_bits_count);
    for _ in 0..has_bits_count {
        has_bits_objects.push(next_object("has-bits object")?);
    }

    let is_proto2 = flags & crate::schema::message_info::FLAG_IS_PROTO2 != 0;
    let mut fields = Vec::with_capacity(field_count);
    for _ in 0..field_count {
        let field_number = reader.next()?;
        let field_type = ProtoFieldType::from_tag(reader.next()?)?;
        let aux_data = if field_type.has_aux_data(is_proto2) {
            Some(reader.next()?)
        } else {
            None
        };
        let arity = field_type.number_of_objects(is_proto2);
        let mut field_objects = Vec::with_capacity(arity);
        for _ in 0..arity {
            field_objects.push(next_object("field objects")?);
        }
        fields.push(ProtoFieldInfo::new(
            field_number,
            field_type,
            aux_data,
            field_objects,
        ));
    }

    if !reader.is_exhausted() {
        return Err(schema_error!("trailing integers after the last field"));
    }
    if objects.next().is_some() {
        return Err(schema_error!("trailing objects after the last field"));
    }

    Ok(ProtoMessageInfo::new(
        flags,
        oneof_objects,
        has_bits_objects,
        fields,
    ))
}

fn read_count(reader: &mut PackedIntReader<'_>, what: &str) -> Result<usize> {
    let value = reader.next()?;
    usize::try_from(value).map_err(|_| schema_error!("negative {what}: {value}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use widestring::U16String;

    use crate::program::refs::TypeRef;
    use crate::schema::field_type::ProtoFieldKind;
    use crate::schema::message_info::FLAG_IS_PROTO2;
    use crate::schema::packed::pack;

    fn simple_units() -> Vec<u16> {
        // proto2, 1 field, no oneofs/has-bits, six summaries, then field 1 of kind
        // Int32 with a has-bits index.
        pack(&[FLAG_IS_PROTO2, 1, 0, 0, 1, 1, 1, 0, 0, 0, 1, 4, 0])
    }

    #[test]
    fn test_decode_simple_schema() {
        let info = decode_schema(&simple_units(), vec![SchemaObject::field_name("x_")]).unwrap();
        assert!(info.is_proto2());
        assert_eq!(info.fields().len(), 1);
        let field = &info.fields()[0];
        assert_eq!(field.field_number(), 1);
        assert_eq!(field.field_type().kind(), ProtoFieldKind::Int32);
        assert_eq!(field.aux_data(), Some(0));
        assert_eq!(field.objects().len(), 1);
    }

    #[test]
    fn test_decode_empty_schema() {
        let info = decode_schema(&pack(&[0, 0]), vec![]).unwrap();
        assert_eq!(info.fields().len(), 0);
        assert!(!info.is_proto2());
    }

    #[test]
    fn test_empty_schema_rejects_extras() {
        assert!(decode_schema(&pack(&[0, 0, 5]), vec![]).is_err());
        assert!(decode_schema(&pack(&[0, 0]), vec![SchemaObject::field_name("x_")]).is_err());
    }

    #[test]
    fn test_truncation_rejected_everywhere() {
        let units = simple_units();
        for cut in 1..=units.len() {
            let truncated = &units[..units.len() - cut];
            assert!(
                decode_schema(truncated, vec![SchemaObject::field_name("x_")]).is_err(),
                "truncating {cut} units must fail"
            );
        }
        // Missing object.
        assert!(decode_schema(&units, vec![]).is_err());
        // Extra object.
        assert!(decode_schema(
            &units,
            vec![
                SchemaObject::field_name("x_"),
                SchemaObject::field_name("y_"),
            ],
        )
        .is_err());
    }

    #[test]
    fn test_decode_from_ir() {
        use crate::ir::instruction::Instruction;

        let mut ir = MethodIr::new();
        let block = ir.new_block();
        let info = ir.new_value(None);
        let size = ir.new_value(None);
        let array = ir.new_value(None);
        let index = ir.new_value(None);
        let name = ir.new_value(None);

        ir.push(
            block,
            Instruction::ConstString {
                dest: info,
                value: U16String::from_vec(simple_units()),
            },
        );
        ir.push(block, Instruction::ConstNumber { dest: size, value: 1 });
        ir.push(
            block,
            Instruction::NewArray {
                dest: array,
                element_type: TypeRef::object(),
                size,
            },
        );
        ir.push(block, Instruction::ConstNumber { dest: index, value: 0 });
        ir.push(
            block,
            Instruction::ConstString {
                dest: name,
                value: U16String::from_str("x_"),
            },
        );
        ir.push(
            block,
            Instruction::ArrayPut {
                array,
                index,
                value: name,
            },
        );
        ir.push(block, Instruction::Return { value: None });

        let decoded = decode_from_ir(&ir, info, array).unwrap();
        assert_eq!(decoded.fields().len(), 1);
        assert_eq!(
            decoded.fields()[0].objects()[0],
            SchemaObject::field_name("x_")
        );
    }

    #[test]
    fn test_decode_from_ir_rejects_short_array_fill() {
        use crate::ir::instruction::Instruction;

        let mut ir = MethodIr::new();
        let block = ir.new_block();
        let info = ir.new_value(None);
        let size = ir.new_value(None);
        let array = ir.new_value(None);

        ir.push(
            block,
            Instruction::ConstString {
                dest: info,
                value: U16String::from_vec(simple_units()),
            },
        );
        ir.push(block, Instruction::ConstNumber { dest: size, value: 1 });
        ir.push(
            block,
            Instruction::NewArray {
                dest: array,
                element_type: TypeRef::object(),
                size,
            },
        );
        // No element store at all.
        ir.push(block, Instruction::Return { value: None });

        assert!(decode_from_ir(&ir, info, array).is_err());
    }

    #[test]
    fn test_decode_from_ir_stops_scan_at_control_flow() {
        use crate::ir::instruction::Instruction;

        let mut ir = MethodIr::new();
        let b0 = ir.new_block();
        let b1 = ir.new_block();
        let info = ir.new_value(None);
        let size = ir.new_value(None);
        let array = ir.new_value(None);
        let index = ir.new_value(None);
        let name = ir.new_value(None);

        ir.push(
            b0,
            Instruction::ConstString {
                dest: info,
                value: U16String::from_vec(simple_units()),
            },
        );
        ir.push(b0, Instruction::ConstNumber { dest: size, value: 1 });
        ir.push(
            b0,
            Instruction::NewArray {
                dest: array,
                element_type: TypeRef::object(),
                size,
            },
        );
        ir.push(b0, Instruction::Goto);
        // The store exists, but only after a control transfer; the scan must not see it.
        ir.push(b1, Instruction::ConstNumber { dest: index, value: 0 });
        ir.push(
            b1,
            Instruction::ConstString {
                dest: name,
                value: U16String::from_str("x_"),
            },
        );
        ir.push(
            b1,
            Instruction::ArrayPut {
                array,
                index,
                value: name,
            },
        );

        assert!(decode_from_ir(&ir, info, array).is_err());
    }

    #[test]
    fn test_oneof_and_has_bits_consumption() {
        // proto2, 1 field, 1 oneof pair, 1 has-bits object, summaries, then a oneof
        // string member of oneof 0.
        let oneof_string_tag = 51 + 8;
        let units = pack(&[
            FLAG_IS_PROTO2,
            1,
            1,
            1,
            1,
            1,
            1,
            0,
            0,
            0,
            1,
            oneof_string_tag,
            0,
        ]);
        let objects = vec![
            SchemaObject::field_name("myOneofCase_"),
            SchemaObject::field_name("myOneof_"),
            SchemaObject::field_name("bitField0_"),
        ];
        let info = decode_schema(&units, objects).unwrap();
        assert_eq!(info.number_of_oneof_objects(), 1);
        assert_eq!(info.number_of_has_bits_objects(), 1);
        assert_eq!(info.fields().len(), 1);
        assert!(info.fields()[0].field_type().is_oneof_member());
        assert_eq!(info.fields()[0].aux_data(), Some(0));
        assert!(info.fields()[0].objects().is_empty());
    }
}
