//! Utility functions: DNA alphabet support and low-level archive primitives.

use std::io::{self, Read, Write};

//-----------------------------------------------------------------------------

// Size formatting for logs and space breakdowns.

const SIZE_UNITS: [(f64, &str); 6] = [
    (1.0, "B"),
    (1024.0, "KiB"),
    (1024.0 * 1024.0, "MiB"),
    (1024.0 * 1024.0 * 1024.0, "GiB"),
    (1024.0 * 1024.0 * 1024.0 * 1024.0, "TiB"),
    (1024.0 * 1024.0 * 1024.0 * 1024.0 * 1024.0, "PiB"),
];

/// Returns a human-readable representation of the given number of bytes.
pub fn human_readable_size(bytes: usize) -> String {
    let mut unit = 0;
    let value = bytes as f64;
    while unit + 1 < SIZE_UNITS.len() && value >= SIZE_UNITS[unit + 1].0 {
        unit += 1;
    }
    format!("{:.3} {}", value / SIZE_UNITS[unit].0, SIZE_UNITS[unit].1)
}

//-----------------------------------------------------------------------------

// DNA alphabet support.

/// The DNA alphabet in symbol order.
pub const ALPHABET: [u8; 4] = [b'A', b'C', b'G', b'T'];

/// Number of symbols in the DNA alphabet.
pub const SIGMA: usize = 4;

const fn generate_symbol_map() -> [u8; 256] {
    let mut result = [255u8; 256];
    result[b'a' as usize] = 0; result[b'A' as usize] = 0;
    result[b'c' as usize] = 1; result[b'C' as usize] = 1;
    result[b'g' as usize] = 2; result[b'G' as usize] = 2;
    result[b't' as usize] = 3; result[b'T' as usize] = 3;
    result
}

const SYMBOL_MAP: [u8; 256] = generate_symbol_map();

/// Maps `acgtACGT` to symbol ranks `0..4`; everything else to [`None`].
#[inline]
pub fn char_to_symbol(c: u8) -> Option<usize> {
    let symbol = SYMBOL_MAP[c as usize];
    if symbol < SIGMA as u8 { Some(symbol as usize) } else { None }
}

/// Returns `true` if every character of the slice is a DNA character.
pub fn is_dna(sequence: &[u8]) -> bool {
    sequence.iter().all(|&c| SYMBOL_MAP[c as usize] < SIGMA as u8)
}

const fn generate_complement_map() -> [u8; 256] {
    let mut result = [b'N'; 256];
    result[b'a' as usize] = b'T'; result[b'A' as usize] = b'T';
    result[b'c' as usize] = b'G'; result[b'C' as usize] = b'G';
    result[b'g' as usize] = b'C'; result[b'G' as usize] = b'C';
    result[b't' as usize] = b'A'; result[b'T' as usize] = b'A';
    result
}

const COMPLEMENT: [u8; 256] = generate_complement_map();

/// Returns the reverse complement of a DNA sequence.
///
/// Characters outside `acgtACGT` become `N`.
pub fn reverse_complement(sequence: &[u8]) -> Vec<u8> {
    sequence.iter().rev().map(|&c| COMPLEMENT[c as usize]).collect()
}

/// Number of bits needed to represent `value`: `⌈log₂(value + 1)⌉`.
///
/// Returns 0 for 0. Use [`int_width`] for the width of a packed integer
/// vector, which must be at least 1.
#[inline]
pub fn bit_width(value: u64) -> usize {
    (u64::BITS - value.leading_zeros()) as usize
}

/// Width of a packed integer vector holding values up to `max_value`.
#[inline]
pub fn int_width(max_value: u64) -> usize {
    bit_width(max_value).max(1)
}

//-----------------------------------------------------------------------------

// Archive primitives. All integers are little-endian; strings are stored as
// a `u64` length followed by the UTF-8 bytes.

/// Writes a `u64` in little-endian byte order.
pub fn write_u64<W: Write>(writer: &mut W, value: u64) -> io::Result<()> {
    writer.write_all(&value.to_le_bytes())
}

/// Reads a `u64` in little-endian byte order.
pub fn read_u64<R: Read>(reader: &mut R) -> io::Result<u64> {
    let mut buf = [0u8; 8];
    reader.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

/// Writes an `i64` in little-endian byte order.
pub fn write_i64<W: Write>(writer: &mut W, value: i64) -> io::Result<()> {
    writer.write_all(&value.to_le_bytes())
}

/// Reads an `i64` in little-endian byte order.
pub fn read_i64<R: Read>(reader: &mut R) -> io::Result<i64> {
    let mut buf = [0u8; 8];
    reader.read_exact(&mut buf)?;
    Ok(i64::from_le_bytes(buf))
}

/// Writes a length-prefixed UTF-8 string.
pub fn write_string<W: Write>(writer: &mut W, value: &str) -> io::Result<()> {
    write_u64(writer, value.len() as u64)?;
    writer.write_all(value.as_bytes())
}

/// Longest string [`read_string`] accepts. Variant tags and similar
/// identifiers are always short; a longer length means a corrupt archive.
pub const MAX_STRING_LEN: u64 = 1024;

/// Reads a string written with [`write_string`].
pub fn read_string<R: Read>(reader: &mut R) -> io::Result<String> {
    let len = read_u64(reader)?;
    if len > MAX_STRING_LEN {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("String length {} exceeds the limit {}", len, MAX_STRING_LEN),
        ));
    }
    let mut buf = vec![0u8; len as usize];
    reader.read_exact(&mut buf)?;
    String::from_utf8(buf).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

//-----------------------------------------------------------------------------


//-----------------------------------------------------------------------------
