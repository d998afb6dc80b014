//! The structured schema model: message info and per-field info.
//!
//! [`ProtoMessageInfo`] is what a decoded schema looks like in memory: the flags word,
//! the oneof object pairs, the has-bits objects and the ordered field list. It is built
//! once by the decoder, never mutated, and discarded after the rewriter has re-encoded
//! it; no instance outlives a single message's rewrite.

use crate::schema::field_type::ProtoFieldType;
use crate::schema::object::SchemaObject;

/// Flag bit: the message uses proto2 semantics.
pub const FLAG_IS_PROTO2: i32 = 0x1;

/// One field's decoded metadata.
#[derive(Debug, Clone)]
pub struct ProtoFieldInfo {
    field_number: i32,
    field_type: ProtoFieldType,
    aux_data: Option<i32>,
    objects: Vec<SchemaObject>,
}

impl ProtoFieldInfo {
    /// Creates a field info record.
    #[must_use]
    pub fn new(
        field_number: i32,
        field_type: ProtoFieldType,
        aux_data: Option<i32>,
        objects: Vec<SchemaObject>,
    ) -> Self {
        ProtoFieldInfo {
            field_number,
            field_type,
            aux_data,
            objects,
        }
    }

    /// The field number, unique within its message.
    #[must_use]
    pub fn field_number(&self) -> i32 {
        self.field_number
    }

    /// The field's type.
    #[must_use]
    pub fn field_type(&self) -> &ProtoFieldType {
        &self.field_type
    }

    /// The auxiliary integer (has-bits index or oneof index), when the type carries one.
    #[must_use]
    pub fn aux_data(&self) -> Option<i32> {
        self.aux_data
    }

    /// The schema objects this field consumed, in stream order.
    #[must_use]
    pub fn objects(&self) -> &[SchemaObject] {
        &self.objects
    }
}

/// A decoded message schema.
#[derive(Debug, Clone, Default)]
pub struct ProtoMessageInfo {
    flags: i32,
    oneof_objects: Vec<(SchemaObject, SchemaObject)>,
    has_bits_objects: Vec<SchemaObject>,
    fields: Vec<ProtoFieldInfo>,
}

impl ProtoMessageInfo {
    /// Creates a schema model.
    #[must_use]
    pub fn new(
        flags: i32,
        oneof_objects: Vec<(SchemaObject, SchemaObject)>,
        has_bits_objects: Vec<SchemaObject>,
        fields: Vec<ProtoFieldInfo>,
    ) -> Self {
        ProtoMessageInfo {
            flags,
            oneof_objects,
            has_bits_objects,
            fields,
        }
    }

    /// Creates the empty schema with the given flags word.
    #[must_use]
    pub fn empty(flags: i32) -> Self {
        ProtoMessageInfo {
            flags,
            ..Default::default()
        }
    }

    /// The raw flags word.
    #[must_use]
    pub fn flags(&self) -> i32 {
        self.flags
    }

    /// Returns `true` for proto2 messages (flags bit 0).
    #[must_use]
    pub fn is_proto2(&self) -> bool {
        self.flags & FLAG_IS_PROTO2 != 0
    }

    /// The (oneof-case, oneof-value) object pairs, in declaration order.
    #[must_use]
    pub fn oneof_objects(&self) -> &[(SchemaObject, SchemaObject)] {
        &self.oneof_objects
    }

    /// The has-bits holder objects.
    #[must_use]
    pub fn has_bits_objects(&self) -> &[SchemaObject] {
        &self.has_bits_objects
    }

    /// The decoded fields, in encoded order.
    #[must_use]
    pub fn fields(&self) -> &[ProtoFieldInfo] {
        &self.fields
    }

    /// Number of oneof object pairs.
    #[must_use]
    pub fn number_of_oneof_objects(&self) -> usize {
        self.oneof_objects.len()
    }

    /// Number of has-bits objects.
    #[must_use]
    pub fn number_of_has_bits_objects(&self) -> usize {
        self.has_bits_objects.len()
    }

    /// Smallest field number, 0 for the empty schema.
    #[must_use]
    pub fn min_field_number(&self) -> i32 {
        self.fields
            .iter()
            .map(ProtoFieldInfo::field_number)
            .min()
            .unwrap_or(0)
    }

    /// Largest field number, 0 for the empty schema.
    #[must_use]
    pub fn max_field_number(&self) -> i32 {
        self.fields
            .iter()
            .map(ProtoFieldInfo::field_number)
            .max()
            .unwrap_or(0)
    }

    /// Number of field entries.
    #[must_use]
    pub fn entry_count(&self) -> i32 {
        self.fields.len() as i32
    }

    /// Number of map fields.
    #[must_use]
    pub fn map_field_count(&self) -> i32 {
        self.fields
            .iter()
            .filter(|f| f.field_type().is_map())
            .count() as i32
    }

    /// Number of repeated (list or packed list) fields; maps count separately.
    #[must_use]
    pub fn repeated_field_count(&self) -> i32 {
        self.fields
            .iter()
            .filter(|f| f.field_type().is_list() || f.field_type().is_packed_list())
            .count() as i32
    }

    /// Number of fields participating in the is-initialized check.
    #[must_use]
    pub fn check_initialized_count(&self) -> i32 {
        self.fields
            .iter()
            .filter(|f| {
                f.field_type().is_required() || f.field_type().needs_is_initialized_check()
            })
            .count() as i32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::field_type::{FieldTypeExtras, ProtoFieldKind};

    fn field(number: i32, kind: ProtoFieldKind, extras: FieldTypeExtras) -> ProtoFieldInfo {
        ProtoFieldInfo::new(
            number,
            ProtoFieldType::new(kind, extras),
            None,
            vec![SchemaObject::field_name("f_")],
        )
    }

    #[test]
    fn test_empty_schema_summaries() {
        let info = ProtoMessageInfo::empty(FLAG_IS_PROTO2);
        assert!(info.is_proto2());
        assert_eq!(info.min_field_number(), 0);
        assert_eq!(info.max_field_number(), 0);
        assert_eq!(info.entry_count(), 0);
    }

    #[test]
    fn test_summary_recomputation() {
        let info = ProtoMessageInfo::new(
            0,
            vec![],
            vec![],
            vec![
                field(7, ProtoFieldKind::Int32, FieldTypeExtras::empty()),
                field(2, ProtoFieldKind::Map, FieldTypeExtras::empty()),
                field(9, ProtoFieldKind::MessageList, FieldTypeExtras::empty()),
                field(4, ProtoFieldKind::Int64ListPacked, FieldTypeExtras::empty()),
                field(1, ProtoFieldKind::Message, FieldTypeExtras::CHECK_INITIALIZED),
                field(3, ProtoFieldKind::Bytes, FieldTypeExtras::REQUIRED),
            ],
        );
        assert!(!info.is_proto2());
        assert_eq!(info.min_field_number(), 1);
        assert_eq!(info.max_field_number(), 9);
        assert_eq!(info.entry_count(), 6);
        assert_eq!(info.map_field_count(), 1);
        assert_eq!(info.repeated_field_count(), 2);
        assert_eq!(info.check_initialized_count(), 2);
    }
}
