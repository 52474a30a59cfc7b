//! Fixed-width bit sequences.
//!
//! Every operand encoder funnels its value through [`resize`], which truncates
//! or extends a sequence to the exact width of the field it is written into.
//! Truncation is checked by re-extending the kept bits and comparing them
//! with the input, so positive and negative values of any width are validated
//! the same way.

use std::{cmp::Ordering, fmt::Display};

use bitvec::prelude::*;
use serde::{Serialize, Serializer};

use crate::diagnostic::ErrorKind;

/// A bit sequence, most significant bit first.
pub type Bits = BitVec<u8, Msb0>;

/// Width in bits of the values stored in the symbol table.
pub const ADDRESS_WIDTH: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Signedness {
    Signed,
    Unsigned,
}

impl Display for Signedness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Signedness::Signed => write!(f, "signed"),
            Signedness::Unsigned => write!(f, "unsigned"),
        }
    }
}

/// The low `width` bits of `value`, zero-filled above bit 127.
pub fn from_unsigned(value: u128, width: usize) -> Bits {
    (0..width)
        .rev()
        .map(|i| i < 128 && (value >> i) & 1 == 1)
        .collect()
}

/// The two's-complement representation of `value` in `width` bits.
pub fn from_signed(value: i128, width: usize) -> Bits {
    (0..width)
        .rev()
        .map(|i| (value >> i.min(127)) & 1 == 1)
        .collect()
}

/// Parses a string of `0`s and `1`s. Spaces and underscores are ignored.
pub fn from_bin(text: &str) -> Option<Bits> {
    text.chars()
        .filter(|c| !matches!(c, ' ' | '_'))
        .map(|c| match c {
            '0' => Some(false),
            '1' => Some(true),
            _ => None,
        })
        .collect()
}

/// Interprets the sequence as an unsigned integer.
/// Only the low 128 bits are significant.
pub fn to_unsigned(bits: &BitSlice<u8, Msb0>) -> u128 {
    bits.iter()
        .by_vals()
        .fold(0u128, |acc, bit| (acc << 1) | u128::from(bit))
}

/// Interprets the sequence as a two's-complement integer.
pub fn to_signed(bits: &BitSlice<u8, Msb0>) -> i128 {
    match bits.len() {
        0 => 0,
        len if len >= 128 => to_unsigned(bits) as i128,
        len => {
            let shift = 128 - len;
            ((to_unsigned(bits) << shift) as i128) >> shift
        }
    }
}

/// Widens `bits` to `width` by replicating the sign bit (signed)
/// or filling with zeros (unsigned).
/// Sequences already at least `width` long are returned unchanged.
pub fn extend(bits: &BitSlice<u8, Msb0>, width: usize, signedness: Signedness) -> Bits {
    let fill = signedness == Signedness::Signed && bits.first().is_some_and(|bit| *bit);
    let mut result = Bits::repeat(fill, width.saturating_sub(bits.len()));
    result.extend_from_bitslice(bits);
    result
}

/// Resizes `bits` to exactly `width` bits.
///
/// Shrinking keeps the low-order bits and fails with [`ErrorKind::Overflow`]
/// if they no longer denote the same value under `signedness`.
pub fn resize(
    bits: &BitSlice<u8, Msb0>,
    width: usize,
    signedness: Signedness,
) -> Result<Bits, ErrorKind> {
    match bits.len().cmp(&width) {
        Ordering::Greater => {
            let kept = &bits[bits.len() - width..];
            if extend(kept, bits.len(), signedness).as_bitslice() == bits {
                Ok(kept.to_bitvec())
            } else {
                Err(ErrorKind::Overflow {
                    value: describe(bits, signedness),
                    width,
                    signedness,
                })
            }
        }
        Ordering::Less => Ok(extend(bits, width, signedness)),
        Ordering::Equal => Ok(bits.to_bitvec()),
    }
}

/// Renders the value of `bits` for diagnostics.
pub fn describe(bits: &BitSlice<u8, Msb0>, signedness: Signedness) -> String {
    if bits.len() > 128 {
        return format!("0b{}", to_bin(bits));
    }
    match signedness {
        Signedness::Signed => to_signed(bits).to_string(),
        Signedness::Unsigned => to_unsigned(bits).to_string(),
    }
}

pub fn to_bin(bits: &BitSlice<u8, Msb0>) -> String {
    bits.iter()
        .by_vals()
        .map(|bit| if bit { '1' } else { '0' })
        .collect()
}

/// Upper-case hex digits, zero-padded on the left to a whole number of nibbles.
pub fn to_hex(bits: &BitSlice<u8, Msb0>) -> String {
    let padded = extend(bits, bits.len().div_ceil(4) * 4, Signedness::Unsigned);
    padded
        .chunks(4)
        .map(|nibble| format!("{:X}", nibble.load_be::<u8>()))
        .collect()
}

pub fn serialize_bin<S: Serializer>(bits: &Bits, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&to_bin(bits))
}
