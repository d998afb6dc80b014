//! Round-trip and truncation properties of the schema codec.
//!
//! A deterministic generator sweeps schema shapes (field counts, field kinds, extras,
//! oneof/has-bits counts, object provenance) and checks that encoding followed by
//! decoding reproduces the model, and that truncating either stream by any positive
//! amount is rejected rather than silently accepted.

use protoshrink::prelude::*;
use protoshrink::schema::decoder::decode_schema;
use protoshrink::schema::encoder::encode_schema;

/// Small deterministic generator; no external randomness in the test suite.
struct Lcg(u64);

impl Lcg {
    fn new(seed: u64) -> Self {
        Lcg(seed.wrapping_mul(2862933555777941757).wrapping_add(3037000493))
    }

    fn next(&mut self) -> u32 {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        (self.0 >> 33) as u32
    }

    fn below(&mut self, bound: u32) -> u32 {
        self.next() % bound
    }
}

fn arbitrary_object(gen: &mut Lcg, tag: u32) -> SchemaObject {
    match gen.below(4) {
        0 => SchemaObject::field_name(&format!("field{tag}_")),
        1 => SchemaObject::TypeLiteral(TypeRef::new(&format!("Lcom/example/Gen{tag};"))),
        2 => SchemaObject::StaticRead(FieldRef::new(
            TypeRef::new(&format!("Lcom/example/Gen{tag};")),
            "defaultEntry",
            TypeRef::object(),
        )),
        _ => SchemaObject::StaticCall(MethodRef::new(
            TypeRef::new(&format!("Lcom/example/Gen{tag};")),
            "internalGetVerifier",
            vec![],
            TypeRef::new("Lcom/google/protobuf/Internal$EnumVerifier;"),
        )),
    }
}

fn arbitrary_field_type(gen: &mut Lcg) -> ProtoFieldType {
    use strum::IntoEnumIterator;
    let kinds: Vec<ProtoFieldKind> = ProtoFieldKind::iter().collect();

    if gen.below(5) == 0 {
        // A oneof member of a random singular base.
        let singular: Vec<ProtoFieldKind> =
            kinds.iter().copied().filter(|k| k.is_singular()).collect();
        let base = singular[gen.below(singular.len() as u32) as usize];
        return ProtoFieldType::oneof_member(base, FieldTypeExtras::empty());
    }

    let kind = kinds[gen.below(kinds.len() as u32) as usize];
    let mut extras = FieldTypeExtras::empty();
    if kind.is_singular() {
        if gen.below(4) == 0 {
            extras |= FieldTypeExtras::REQUIRED;
        }
        if gen.below(4) == 0 {
            extras |= FieldTypeExtras::EXPLICIT_PRESENCE;
        }
        if gen.below(4) == 0 {
            extras |= FieldTypeExtras::CHECK_INITIALIZED;
        }
    }
    if kind == ProtoFieldKind::Map && gen.below(2) == 0 {
        extras |= FieldTypeExtras::MAP_VALUE_CLOSED_ENUM;
    }
    ProtoFieldType::new(kind, extras)
}

fn arbitrary_schema(gen: &mut Lcg) -> ProtoMessageInfo {
    let flags = if gen.below(2) == 0 { 0 } else { 0x1 };
    let is_proto2 = flags & 0x1 != 0;
    let field_count = gen.below(8) as usize;

    if field_count == 0 {
        return ProtoMessageInfo::empty(flags);
    }

    let oneof_count = gen.below(3) as usize;
    let has_bits_count = gen.below(3) as usize;

    let oneofs = (0..oneof_count)
        .map(|i| {
            (
                SchemaObject::field_name(&format!("oneof{i}Case_")),
                SchemaObject::field_name(&format!("oneof{i}_")),
            )
        })
        .collect();
    let has_bits = (0..has_bits_count)
        .map(|i| SchemaObject::field_name(&format!("bitField{i}_")))
        .collect();

    let mut next_number = 1;
    let fields = (0..field_count)
        .map(|_| {
            let field_type = arbitrary_field_type(gen);
            let number = next_number;
            next_number += 1 + gen.below(64) as i32;
            let aux = field_type
                .has_aux_data(is_proto2)
                .then(|| gen.below(32) as i32);
            let objects = (0..field_type.number_of_objects(is_proto2))
                .map(|j| arbitrary_object(gen, number as u32 * 10 + j as u32))
                .collect();
            ProtoFieldInfo::new(number, field_type, aux, objects)
        })
        .collect();

    ProtoMessageInfo::new(flags, oneofs, has_bits, fields)
}

fn assert_models_equal(decoded: &ProtoMessageInfo, original: &ProtoMessageInfo) {
    assert_eq!(decoded.flags(), original.flags());
    assert_eq!(
        decoded.number_of_oneof_objects(),
        original.number_of_oneof_objects()
    );
    assert_eq!(
        decoded.number_of_has_bits_objects(),
        original.number_of_has_bits_objects()
    );
    assert_eq!(decoded.oneof_objects(), original.oneof_objects());
    assert_eq!(decoded.has_bits_objects(), original.has_bits_objects());
    assert_eq!(decoded.fields().len(), original.fields().len());
    for (a, b) in decoded.fields().iter().zip(original.fields()) {
        assert_eq!(a.field_number(), b.field_number());
        assert_eq!(a.field_type(), b.field_type());
        assert_eq!(a.aux_data(), b.aux_data());
        assert_eq!(a.objects(), b.objects());
    }
}

#[test]
fn generated_schemas_round_trip() {
    for seed in 0..500 {
        let mut gen = Lcg::new(seed);
        let original = arbitrary_schema(&mut gen);
        let encoded = encode_schema(&original);
        let decoded = decode_schema(encoded.info.as_slice(), encoded.objects.clone())
            .unwrap_or_else(|e| panic!("seed {seed}: decode failed: {e}"));
        assert_models_equal(&decoded, &original);
    }
}

#[test]
fn truncated_info_string_is_rejected() {
    for seed in 0..100 {
        let mut gen = Lcg::new(seed);
        let original = arbitrary_schema(&mut gen);
        if original.fields().is_empty() {
            continue;
        }
        let encoded = encode_schema(&original);
        let units = encoded.info.as_slice();
        for cut in 1..=units.len() {
            let truncated = &units[..units.len() - cut];
            assert!(
                decode_schema(truncated, encoded.objects.clone()).is_err(),
                "seed {seed}: truncating {cut} of {} units must fail",
                units.len()
            );
        }
    }
}

#[test]
fn truncated_objects_are_rejected() {
    for seed in 0..100 {
        let mut gen = Lcg::new(seed);
        let original = arbitrary_schema(&mut gen);
        let encoded = encode_schema(&original);
        if encoded.objects.is_empty() {
            continue;
        }
        for cut in 1..=encoded.objects.len() {
            let truncated = encoded.objects[..encoded.objects.len() - cut].to_vec();
            assert!(
                decode_schema(encoded.info.as_slice(), truncated).is_err(),
                "seed {seed}: dropping {cut} objects must fail"
            );
        }
        // A surplus object is just as malformed.
        let mut extended = encoded.objects.clone();
        extended.push(SchemaObject::field_name("extra_"));
        assert!(decode_schema(encoded.info.as_slice(), extended).is_err());
    }
}
