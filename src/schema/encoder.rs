//! Schema encoding: from [`ProtoMessageInfo`] back to raw parts.
//!
//! The encoder is the exact inverse of the decoder with one deliberate difference: the
//! six summary integers are recomputed fresh from the field list instead of copying the
//! decoded values, so a schema whose field list was narrowed re-encodes with summaries
//! that match its actual content.

use widestring::U16String;

use crate::schema::message_info::ProtoMessageInfo;
use crate::schema::object::SchemaObject;
use crate::schema::packed::pack_into;

/// The raw parts an encoded schema splices back into the IR.
#[derive(Debug, Clone)]
pub struct EncodedSchema {
    /// The packed integer payload.
    pub info: U16String,

    /// The objects, in the positional order the decoder consumes them.
    pub objects: Vec<SchemaObject>,
}

/// Encodes a schema model into its raw parts.
///
/// Round-trip property: decoding the result yields a model equal to the input up to the
/// discarded summary integers, which are recomputed here.
#[must_use]
pub fn encode_schema(message: &ProtoMessageInfo) -> EncodedSchema {
    let mut units: Vec<u16> = Vec::new();
    let mut objects: Vec<SchemaObject> = Vec::new();

    pack_into(&mut units, message.flags());
    pack_into(&mut units, message.entry_count());

    if message.fields().is_empty() {
        debug_assert_eq!(message.number_of_oneof_objects(), 0);
        debug_assert_eq!(message.number_of_has_bits_objects(), 0);
        return EncodedSchema {
            info: U16String::from_vec(units),
            objects,
        };
    }

    pack_into(&mut units, message.number_of_oneof_objects() as i32);
    pack_into(&mut units, message.number_of_has_bits_objects() as i32);
    pack_into(&mut units, message.min_field_number());
    pack_into(&mut units, message.max_field_number());
    pack_into(&mut units, message.entry_count());
    pack_into(&mut units, message.map_field_count());
    pack_into(&mut units, message.repeated_field_count());
    pack_into(&mut units, message.check_initialized_count());

    for (case, value) in message.oneof_objects() {
        objects.push(case.clone());
        objects.push(value.clone());
    }
    objects.extend(message.has_bits_objects().iter().cloned());

    let is_proto2 = message.is_proto2();
    for field in message.fields() {
        pack_into(&mut units, field.field_number());
        pack_into(&mut units, field.field_type().tag());
        if field.field_type().has_aux_data(is_proto2) {
            debug_assert!(
                field.aux_data().is_some(),
                "field {} requires aux data",
                field.field_number()
            );
            pack_into(&mut units, field.aux_data().unwrap_or(0));
        }
        debug_assert_eq!(
            field.objects().len(),
            field.field_type().number_of_objects(is_proto2),
            "field {} object arity mismatch",
            field.field_number()
        );
        objects.extend(field.objects().iter().cloned());
    }

    EncodedSchema {
        info: U16String::from_vec(units),
        objects,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::decoder::decode_schema;
    use crate::schema::field_type::{FieldTypeExtras, ProtoFieldKind, ProtoFieldType};
    use crate::schema::message_info::{ProtoFieldInfo, FLAG_IS_PROTO2};

    fn assert_round_trips(message: &ProtoMessageInfo) {
        let encoded = encode_schema(message);
        let decoded = decode_schema(encoded.info.as_slice(), encoded.objects.clone()).unwrap();

        assert_eq!(decoded.flags(), message.flags());
        assert_eq!(
            decoded.number_of_oneof_objects(),
            message.number_of_oneof_objects()
        );
        assert_eq!(
            decoded.number_of_has_bits_objects(),
            message.number_of_has_bits_objects()
        );
        assert_eq!(decoded.fields().len(), message.fields().len());
        for (a, b) in decoded.fields().iter().zip(message.fields()) {
            assert_eq!(a.field_number(), b.field_number());
            assert_eq!(a.field_type(), b.field_type());
            assert_eq!(a.aux_data(), b.aux_data());
            assert_eq!(a.objects(), b.objects());
        }
    }

    #[test]
    fn test_empty_round_trip() {
        assert_round_trips(&ProtoMessageInfo::empty(0));
        assert_round_trips(&ProtoMessageInfo::empty(FLAG_IS_PROTO2));
    }

    #[test]
    fn test_mixed_schema_round_trip() {
        let message = ProtoMessageInfo::new(
            FLAG_IS_PROTO2,
            vec![(
                SchemaObject::field_name("resultCase_"),
                SchemaObject::field_name("result_"),
            )],
            vec![SchemaObject::field_name("bitField0_")],
            vec![
                ProtoFieldInfo::new(
                    1,
                    ProtoFieldType::new(ProtoFieldKind::Int32, FieldTypeExtras::empty()),
                    Some(0),
                    vec![SchemaObject::field_name("id_")],
                ),
                ProtoFieldInfo::new(
                    2,
                    ProtoFieldType::new(ProtoFieldKind::Message, FieldTypeExtras::empty()),
                    Some(1),
                    vec![SchemaObject::field_name("payload_")],
                ),
                ProtoFieldInfo::new(
                    3,
                    ProtoFieldType::new(ProtoFieldKind::MessageList, FieldTypeExtras::empty()),
                    None,
                    vec![
                        SchemaObject::field_name("items_"),
                        SchemaObject::TypeLiteral(crate::program::refs::TypeRef::new(
                            "Lcom/example/Item;",
                        )),
                    ],
                ),
                ProtoFieldInfo::new(
                    900,
                    ProtoFieldType::oneof_member(
                        ProtoFieldKind::String,
                        FieldTypeExtras::empty(),
                    ),
                    Some(0),
                    vec![],
                ),
            ],
        );
        assert_round_trips(&message);
    }

    #[test]
    fn test_summaries_recomputed_not_copied() {
        // A schema decoded from a payload with stale summary integers re-encodes with
        // summaries matching the field list.
        let message = ProtoMessageInfo::new(
            0,
            vec![],
            vec![],
            vec![ProtoFieldInfo::new(
                41,
                ProtoFieldType::new(ProtoFieldKind::Int64, FieldTypeExtras::empty()),
                None,
                vec![SchemaObject::field_name("ts_")],
            )],
        );
        let encoded = encode_schema(&message);
        // flags, count, oneofs, hasbits, min, max, entries, maps, repeated, checkinit
        let mut reader = crate::schema::packed::PackedIntReader::new(encoded.info.as_slice());
        let header: Vec<i32> = (0..10).map(|_| reader.next().unwrap()).collect();
        assert_eq!(header, vec![0, 1, 0, 0, 41, 41, 1, 0, 0, 0]);
    }
}
