//! Field types of the compact schema encoding.
//!
//! Each field entry in the packed schema carries a type tag: the low byte is the field
//! kind, the bits above it are property flags. Kinds 0-17 are the singular protobuf
//! kinds, 18-34 their repeated (list) forms, 35-48 the packed list forms of the
//! packable kinds, 49 is the repeated group form, 50 the map form, and 51 upwards are
//! oneof members (tag minus 51 gives the member's singular kind).
//!
//! The kind set is fixed by the encoding format, so it is a closed sum type with
//! exhaustive matches; the per-kind aux-data and object-arity tables below are what the
//! decoder and encoder agree on.

use bitflags::bitflags;
use strum::{EnumIter, FromRepr};

use crate::Result;

/// First tag value denoting a oneof member.
const FIRST_ONEOF_ID: u8 = 51;

/// Highest valid oneof tag (`FIRST_ONEOF_ID` + the last singular kind).
const LAST_ONEOF_ID: u8 = FIRST_ONEOF_ID + 17;

bitflags! {
    /// Property bits carried above the kind byte of a field type tag.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct FieldTypeExtras: u32 {
        /// proto2 `required` field.
        const REQUIRED = 0x100;
        /// String field validated as UTF-8 on the wire.
        const ENFORCE_UTF8 = 0x200;
        /// Field participates in the message's is-initialized check.
        const CHECK_INITIALIZED = 0x400;
        /// Map field whose value type is a closed enum; carries a verifier object.
        const MAP_VALUE_CLOSED_ENUM = 0x800;
        /// Field tracks explicit presence with a has-bit even outside proto2.
        const EXPLICIT_PRESENCE = 0x1000;
    }
}

/// The closed set of field kinds, by encoded id.
///
/// Variant order and discriminants follow the encoding format exactly; the repeated and
/// packed blocks repeat the singular block's order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, FromRepr)]
#[repr(u8)]
#[allow(missing_docs)]
pub enum ProtoFieldKind {
    Double = 0,
    Float = 1,
    Int64 = 2,
    Uint64 = 3,
    Int32 = 4,
    Fixed64 = 5,
    Fixed32 = 6,
    Bool = 7,
    String = 8,
    Message = 9,
    Bytes = 10,
    Uint32 = 11,
    Enum = 12,
    Sfixed32 = 13,
    Sfixed64 = 14,
    Sint32 = 15,
    Sint64 = 16,
    Group = 17,
    DoubleList = 18,
    FloatList = 19,
    Int64List = 20,
    Uint64List = 21,
    Int32List = 22,
    Fixed64List = 23,
    Fixed32List = 24,
    BoolList = 25,
    StringList = 26,
    MessageList = 27,
    BytesList = 28,
    Uint32List = 29,
    EnumList = 30,
    Sfixed32List = 31,
    Sfixed64List = 32,
    Sint32List = 33,
    Sint64List = 34,
    DoubleListPacked = 35,
    FloatListPacked = 36,
    Int64ListPacked = 37,
    Uint64ListPacked = 38,
    Int32ListPacked = 39,
    Fixed64ListPacked = 40,
    Fixed32ListPacked = 41,
    BoolListPacked = 42,
    Uint32ListPacked = 43,
    EnumListPacked = 44,
    Sfixed32ListPacked = 45,
    Sfixed64ListPacked = 46,
    Sint32ListPacked = 47,
    Sint64ListPacked = 48,
    GroupList = 49,
    Map = 50,
}

impl ProtoFieldKind {
    /// The encoded id of this kind.
    #[must_use]
    pub fn id(self) -> u8 {
        self as u8
    }

    /// Returns `true` for the singular kinds (ids 0-17).
    #[must_use]
    pub fn is_singular(self) -> bool {
        self.id() <= 17
    }

    /// Returns `true` for the unpacked repeated kinds (ids 18-34 and 49).
    #[must_use]
    pub fn is_list(self) -> bool {
        matches!(self.id(), 18..=34 | 49)
    }

    /// Returns `true` for the packed repeated kinds (ids 35-48).
    #[must_use]
    pub fn is_packed_list(self) -> bool {
        matches!(self.id(), 35..=48)
    }

    /// Returns `true` for the map kind.
    #[must_use]
    pub fn is_map(self) -> bool {
        self == ProtoFieldKind::Map
    }
}

/// A decoded field type: kind (possibly wrapped as a oneof member) plus property bits.
///
/// # Examples
///
/// ```rust
/// use protoshrink::schema::field_type::{FieldTypeExtras, ProtoFieldKind, ProtoFieldType};
///
/// let ty = ProtoFieldType::new(ProtoFieldKind::Message, FieldTypeExtras::empty());
/// assert_eq!(ty.number_of_objects(true), 1);
/// assert!(ty.has_aux_data(true));
/// assert!(!ty.has_aux_data(false));
///
/// let oneof = ProtoFieldType::oneof_member(ProtoFieldKind::Message, FieldTypeExtras::empty());
/// assert!(oneof.is_oneof_member());
/// assert!(oneof.has_aux_data(false));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProtoFieldType {
    id: u8,
    extras: FieldTypeExtras,
}

impl ProtoFieldType {
    /// Creates a non-oneof field type.
    #[must_use]
    pub fn new(kind: ProtoFieldKind, extras: FieldTypeExtras) -> Self {
        ProtoFieldType {
            id: kind.id(),
            extras,
        }
    }

    /// Creates a oneof member of the given singular kind.
    ///
    /// # Panics
    ///
    /// Panics if the kind is not singular; only singular kinds occur inside oneofs.
    #[must_use]
    pub fn oneof_member(base: ProtoFieldKind, extras: FieldTypeExtras) -> Self {
        assert!(base.is_singular(), "oneof member of non-singular kind {base:?}");
        ProtoFieldType {
            id: FIRST_ONEOF_ID + base.id(),
            extras,
        }
    }

    /// Decodes a field type tag as read from the packed stream.
    ///
    /// # Errors
    ///
    /// Fails on unknown kind ids and on property bits outside the known set.
    pub fn from_tag(tag: i32) -> Result<Self> {
        if tag < 0 {
            return Err(schema_error!("negative field type tag {tag}"));
        }
        let id = (tag & 0xFF) as u8;
        if ProtoFieldKind::from_repr(id).is_none() && !(FIRST_ONEOF_ID..=LAST_ONEOF_ID).contains(&id)
        {
            return Err(schema_error!("unknown field kind id {id}"));
        }
        let high = (tag as u32) & !0xFF;
        let extras = FieldTypeExtras::from_bits(high)
            .ok_or_else(|| schema_error!("unknown field type property bits {high:#x}"))?;
        Ok(ProtoFieldType { id, extras })
    }

    /// Re-encodes the tag.
    #[must_use]
    pub fn tag(&self) -> i32 {
        (u32::from(self.id) | self.extras.bits()) as i32
    }

    /// The raw kind id, including the oneof bias.
    #[must_use]
    pub fn id(&self) -> u8 {
        self.id
    }

    /// The property bits.
    #[must_use]
    pub fn extras(&self) -> FieldTypeExtras {
        self.extras
    }

    /// Returns `true` if this is a oneof member.
    #[must_use]
    pub fn is_oneof_member(&self) -> bool {
        self.id >= FIRST_ONEOF_ID
    }

    /// The kind for non-oneof types, or the member's singular kind for oneof types.
    #[must_use]
    pub fn kind(&self) -> ProtoFieldKind {
        let id = if self.is_oneof_member() {
            self.id - FIRST_ONEOF_ID
        } else {
            self.id
        };
        ProtoFieldKind::from_repr(id).expect("validated on construction")
    }

    /// Returns `true` for singular, non-oneof fields.
    #[must_use]
    pub fn is_singular(&self) -> bool {
        !self.is_oneof_member() && self.kind().is_singular()
    }

    /// Returns `true` for unpacked repeated fields.
    #[must_use]
    pub fn is_list(&self) -> bool {
        !self.is_oneof_member() && self.kind().is_list()
    }

    /// Returns `true` for packed repeated fields.
    #[must_use]
    pub fn is_packed_list(&self) -> bool {
        !self.is_oneof_member() && self.kind().is_packed_list()
    }

    /// Returns `true` for map fields.
    #[must_use]
    pub fn is_map(&self) -> bool {
        !self.is_oneof_member() && self.kind().is_map()
    }

    /// Returns `true` for proto2 required fields.
    #[must_use]
    pub fn is_required(&self) -> bool {
        self.extras.contains(FieldTypeExtras::REQUIRED)
    }

    /// Returns `true` if the field participates in the is-initialized check.
    #[must_use]
    pub fn needs_is_initialized_check(&self) -> bool {
        self.extras.contains(FieldTypeExtras::CHECK_INITIALIZED)
    }

    /// Returns `true` if a field of this type carries an auxiliary integer.
    ///
    /// Oneof members always do (the oneof index). Singular fields carry a has-bits
    /// index under proto2, or under proto3 when the explicit-presence bit is set.
    /// Repeated and map fields never do.
    #[must_use]
    pub fn has_aux_data(&self, is_proto2: bool) -> bool {
        if self.is_oneof_member() {
            return true;
        }
        self.kind().is_singular()
            && (is_proto2 || self.extras.contains(FieldTypeExtras::EXPLICIT_PRESENCE))
    }

    /// Number of schema objects a field of this type consumes.
    ///
    /// This is the count the generated code supplies, not a free choice: every non-oneof
    /// field carries its field-name string; message and group lists add the element
    /// class; enum kinds add a verifier under proto2; maps add the map-entry descriptor
    /// and, for closed-enum values, a verifier. Oneof members carry no name (the oneof
    /// pair objects cover them) but keep the class/verifier extras of their base kind.
    #[must_use]
    pub fn number_of_objects(&self, is_proto2: bool) -> usize {
        if self.is_oneof_member() {
            return match self.kind() {
                ProtoFieldKind::Message | ProtoFieldKind::Group => 1,
                ProtoFieldKind::Enum => usize::from(is_proto2),
                _ => 0,
            };
        }
        match self.kind() {
            ProtoFieldKind::Map => {
                2 + usize::from(self.extras.contains(FieldTypeExtras::MAP_VALUE_CLOSED_ENUM))
            }
            ProtoFieldKind::MessageList | ProtoFieldKind::GroupList => 2,
            ProtoFieldKind::Enum | ProtoFieldKind::EnumList | ProtoFieldKind::EnumListPacked => {
                1 + usize::from(is_proto2)
            }
            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    /// The object counts generated code supplies, written out kind by kind.
    fn expected_objects(kind: ProtoFieldKind, is_proto2: bool) -> usize {
        use ProtoFieldKind::*;
        match kind {
            Map => 2,
            MessageList | GroupList => 2,
            Enum | EnumList | EnumListPacked => {
                if is_proto2 {
                    2
                } else {
                    1
                }
            }
            _ => 1,
        }
    }

    #[test]
    fn test_object_arity_table() {
        for kind in ProtoFieldKind::iter() {
            for is_proto2 in [false, true] {
                let ty = ProtoFieldType::new(kind, FieldTypeExtras::empty());
                assert_eq!(
                    ty.number_of_objects(is_proto2),
                    expected_objects(kind, is_proto2),
                    "kind {kind:?}, proto2={is_proto2}"
                );
            }
        }
    }

    #[test]
    fn test_oneof_object_arity_table() {
        for base in ProtoFieldKind::iter().filter(|k| k.is_singular()) {
            for is_proto2 in [false, true] {
                let ty = ProtoFieldType::oneof_member(base, FieldTypeExtras::empty());
                let expected = match base {
                    ProtoFieldKind::Message | ProtoFieldKind::Group => 1,
                    ProtoFieldKind::Enum => usize::from(is_proto2),
                    _ => 0,
                };
                assert_eq!(
                    ty.number_of_objects(is_proto2),
                    expected,
                    "oneof base {base:?}, proto2={is_proto2}"
                );
            }
        }
    }

    #[test]
    fn test_map_with_closed_enum_value() {
        let ty = ProtoFieldType::new(
            ProtoFieldKind::Map,
            FieldTypeExtras::MAP_VALUE_CLOSED_ENUM,
        );
        assert_eq!(ty.number_of_objects(true), 3);
        assert_eq!(ty.number_of_objects(false), 3);
    }

    #[test]
    fn test_aux_data_rules() {
        let singular = ProtoFieldType::new(ProtoFieldKind::Int32, FieldTypeExtras::empty());
        assert!(singular.has_aux_data(true));
        assert!(!singular.has_aux_data(false));

        let explicit = ProtoFieldType::new(
            ProtoFieldKind::Int32,
            FieldTypeExtras::EXPLICIT_PRESENCE,
        );
        assert!(explicit.has_aux_data(false));

        let repeated = ProtoFieldType::new(ProtoFieldKind::Int32List, FieldTypeExtras::empty());
        assert!(!repeated.has_aux_data(true));

        let map = ProtoFieldType::new(ProtoFieldKind::Map, FieldTypeExtras::empty());
        assert!(!map.has_aux_data(true));

        let oneof = ProtoFieldType::oneof_member(ProtoFieldKind::String, FieldTypeExtras::empty());
        assert!(oneof.has_aux_data(false));
    }

    #[test]
    fn test_tag_round_trip() {
        for kind in ProtoFieldKind::iter() {
            let ty = ProtoFieldType::new(kind, FieldTypeExtras::CHECK_INITIALIZED);
            let back = ProtoFieldType::from_tag(ty.tag()).unwrap();
            assert_eq!(ty, back);
        }
        let oneof = ProtoFieldType::oneof_member(
            ProtoFieldKind::Group,
            FieldTypeExtras::ENFORCE_UTF8,
        );
        assert_eq!(ProtoFieldType::from_tag(oneof.tag()).unwrap(), oneof);
    }

    #[test]
    fn test_invalid_tags_rejected() {
        // 69 is past the last oneof member id.
        assert!(ProtoFieldType::from_tag(69).is_err());
        assert!(ProtoFieldType::from_tag(-1).is_err());
        // Unknown property bit.
        assert!(ProtoFieldType::from_tag(0x2000 | 9).is_err());
    }

    #[test]
    fn test_classification() {
        assert!(ProtoFieldType::new(ProtoFieldKind::GroupList, FieldTypeExtras::empty()).is_list());
        assert!(ProtoFieldType::new(ProtoFieldKind::EnumListPacked, FieldTypeExtras::empty())
            .is_packed_list());
        assert!(ProtoFieldType::new(ProtoFieldKind::Map, FieldTypeExtras::empty()).is_map());
        let oneof = ProtoFieldType::oneof_member(ProtoFieldKind::Int32, FieldTypeExtras::empty());
        assert!(!oneof.is_singular());
        assert!(oneof.is_oneof_member());
        assert_eq!(oneof.kind(), ProtoFieldKind::Int32);
    }
}
