//! Variable-length integer packing for the schema info string.
//!
//! The generated code smuggles the schema's integer sequence through a string constant:
//! each signed 32-bit integer is split into 13-bit chunks, continuation chunks are biased
//! into the UTF-16 surrogate range (0xD800-0xDFFF), and the first non-surrogate code
//! unit terminates the integer, its bits left-shifted into the position the consumed
//! chunks left off at. Values that fit 13 bits and land below the surrogate range are a
//! single code unit.
//!
//! Wrap-around two's-complement arithmetic makes negative values round-trip: `-1` packs
//! as two continuation chunks of 0x1FFF followed by the terminator 0x3F at shift 26.
//!
//! Decoding must consume the unit sequence exactly; a trailing continuation chunk or
//! left-over units fail the whole decode.

use crate::Result;

/// Bits carried per chunk.
const CHUNK_BITS: u32 = 13;

/// Mask of one chunk's payload.
const CHUNK_MASK: u32 = 0x1FFF;

/// Start of the UTF-16 surrogate range; continuation chunks live in 0xD800-0xDFFF.
const CONTINUATION_BASE: u16 = 0xD800;

fn is_continuation(unit: u16) -> bool {
    (0xD800..=0xDFFF).contains(&unit)
}

/// Appends one packed integer to the output unit sequence.
pub fn pack_into(out: &mut Vec<u16>, value: i32) {
    let mut bits = value as u32;
    while bits & !CHUNK_MASK != 0 {
        out.push(CONTINUATION_BASE | (bits & CHUNK_MASK) as u16);
        bits >>= CHUNK_BITS;
    }
    out.push(bits as u16);
}

/// Packs a sequence of integers into code units.
#[must_use]
pub fn pack(values: &[i32]) -> Vec<u16> {
    let mut out = Vec::with_capacity(values.len());
    for &value in values {
        pack_into(&mut out, value);
    }
    out
}

/// Reader over a packed unit sequence.
///
/// # Examples
///
/// ```rust
/// use protoshrink::schema::packed::{pack, PackedIntReader};
///
/// let units = pack(&[1, -1, 40000]);
/// let mut reader = PackedIntReader::new(&units);
/// assert_eq!(reader.next().unwrap(), 1);
/// assert_eq!(reader.next().unwrap(), -1);
/// assert_eq!(reader.next().unwrap(), 40000);
/// assert!(reader.is_exhausted());
/// ```
#[derive(Debug)]
pub struct PackedIntReader<'a> {
    units: &'a [u16],
    position: usize,
}

impl<'a> PackedIntReader<'a> {
    /// Creates a reader over a unit sequence.
    #[must_use]
    pub fn new(units: &'a [u16]) -> Self {
        PackedIntReader { units, position: 0 }
    }

    /// Returns `true` once every unit has been consumed.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.position == self.units.len()
    }

    fn next_unit(&mut self) -> Result<u16> {
        let unit = self
            .units
            .get(self.position)
            .copied()
            .ok_or_else(|| schema_error!("packed integer stream is truncated"))?;
        self.position += 1;
        Ok(unit)
    }

    /// Decodes the next integer.
    ///
    /// # Errors
    ///
    /// Fails when the stream ends inside an integer or a value carries more
    /// continuation chunks than 32 bits can hold.
    pub fn next(&mut self) -> Result<i32> {
        let first = self.next_unit()?;
        if !is_continuation(first) {
            return Ok(i32::from(first));
        }
        let mut result = u32::from(first) & CHUNK_MASK;
        let mut shift = CHUNK_BITS;
        loop {
            let unit = self.next_unit()?;
            if shift >= 32 {
                return Err(schema_error!(
                    "packed integer has too many continuation chunks"
                ));
            }
            if is_continuation(unit) {
                result |= (u32::from(unit) & CHUNK_MASK) << shift;
                shift += CHUNK_BITS;
            } else {
                result |= u32::from(unit) << shift;
                return Ok(result as i32);
            }
        }
    }
}
