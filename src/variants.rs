//! Alternative color set representations.
//!
//! Besides the concatenated hybrid layout of
//! [`ColorSetStorage`](crate::storage::ColorSetStorage), an archive can hold
//! its color sets in two other representations: roaring bitmaps and plain
//! per-set bitmaps. Both store the sets individually and share the same
//! append-then-freeze protocol as the hybrid storage.
//!
//! Roaring bitmaps come from the CRoaring library. The plain bitmap storage
//! serves archives written under the legacy `bitmagic-v0` tag; it stores
//! one uncompressed bitmap per set.

use std::collections::BTreeMap;
use std::io::{self, Read, Write};

use croaring::{Bitmap, Portable};

use simple_sds::raw_vector::{AccessRaw, PushRaw, RawVector};
use simple_sds::serialize::Serialize;

use crate::error::{ColoringError, Result};
use crate::utils;

#[cfg(test)]
mod tests;

//-----------------------------------------------------------------------------

// Colors in these representations live in a 32-bit universe.
fn check_color_range(colors: &[u64], representation: &str) -> Result<()> {
    if let Some(&max) = colors.last() {
        if max > u64::from(u32::MAX) {
            return Err(ColoringError::InputMalformed(format!(
                "{}: color {} does not fit in 32 bits",
                representation, max
            )));
        }
    }
    Ok(())
}

//-----------------------------------------------------------------------------

/// Distinct color sets stored as individual roaring bitmaps.
#[derive(Debug)]
pub struct RoaringColorSets {
    sets: Vec<Bitmap>,
}

impl RoaringColorSets {
    /// Creates an empty storage.
    pub fn new() -> Self {
        RoaringColorSets { sets: Vec::new() }
    }

    /// Appends a color set given as a sorted, distinct color list.
    ///
    /// # Errors
    ///
    /// Returns [`ColoringError::InputMalformed`] if a color does not fit in
    /// the 32-bit roaring universe.
    pub fn add_set(&mut self, colors: &[u64]) -> Result<()> {
        check_color_range(colors, "RoaringColorSets")?;
        let mut set = Bitmap::new();
        for &color in colors {
            set.add(color as u32);
        }
        set.run_optimize();
        self.sets.push(set);
        Ok(())
    }

    /// Freezes the storage.
    pub fn prepare_for_queries(&mut self) {
        self.sets.shrink_to_fit();
    }

    /// Number of color sets in the storage.
    pub fn len(&self) -> usize {
        self.sets.len()
    }

    /// Returns `true` if the storage contains no sets.
    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    /// Returns the color set with the given identifier.
    pub fn get(&self, id: usize) -> Result<&Bitmap> {
        self.sets.get(id).ok_or_else(|| {
            ColoringError::UsageError(format!(
                "RoaringColorSets: color set id {} out of range ({} sets)",
                id,
                self.sets.len()
            ))
        })
    }

    /// Returns an iterator over all stored sets in identifier order.
    pub fn iter(&self) -> impl Iterator<Item = &Bitmap> {
        self.sets.iter()
    }

    /// Returns the number of bytes the sets would take in the serialized
    /// archive.
    pub fn space_breakdown(&self) -> BTreeMap<String, usize> {
        let mut breakdown = BTreeMap::new();
        let bytes: usize = self
            .sets
            .iter()
            .map(|set| set.get_serialized_size_in_bytes::<Portable>() + 8)
            .sum();
        breakdown.insert(String::from("sets"), bytes + 8);
        breakdown
    }

    /// Writes the storage: a set count followed by length-prefixed portable
    /// bitmaps.
    pub fn serialize_into<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        utils::write_u64(writer, self.sets.len() as u64)?;
        for set in &self.sets {
            let bytes = set.serialize::<Portable>();
            utils::write_u64(writer, bytes.len() as u64)?;
            writer.write_all(&bytes)?;
        }
        Ok(())
    }

    /// Reads a storage written with [`RoaringColorSets::serialize_into`].
    pub fn load_from<R: Read>(reader: &mut R) -> io::Result<Self> {
        let count = utils::read_u64(reader)? as usize;
        let mut sets = Vec::with_capacity(count);
        for _ in 0..count {
            let len = utils::read_u64(reader)? as usize;
            let mut bytes = vec![0u8; len];
            reader.read_exact(&mut bytes)?;
            let set = Bitmap::try_deserialize::<Portable>(&bytes).ok_or_else(|| {
                io::Error::new(io::ErrorKind::InvalidData, "Invalid roaring bitmap")
            })?;
            sets.push(set);
        }
        Ok(RoaringColorSets { sets })
    }
}

impl Default for RoaringColorSets {
    fn default() -> Self {
        Self::new()
    }
}

//-----------------------------------------------------------------------------

/// Distinct color sets stored as individual plain bitmaps.
///
/// Each set is a bitmap over `0..max + 1`. This representation backs the
/// `bitmagic-v0` archive tag.
#[derive(Debug)]
pub struct PlainColorSets {
    sets: Vec<RawVector>,
}

impl PlainColorSets {
    /// Creates an empty storage.
    pub fn new() -> Self {
        PlainColorSets { sets: Vec::new() }
    }

    /// Appends a color set given as a sorted, distinct color list.
    ///
    /// # Errors
    ///
    /// Returns [`ColoringError::InputMalformed`] if a color does not fit in
    /// 32 bits; larger values would make the per-set bitmaps unreasonable.
    pub fn add_set(&mut self, colors: &[u64]) -> Result<()> {
        check_color_range(colors, "PlainColorSets")?;
        let universe = colors.last().map_or(0, |&max| max as usize + 1);
        let mut bits = RawVector::with_capacity(universe);
        let mut iter = colors.iter().peekable();
        for i in 0..(universe as u64) {
            let present = iter.peek() == Some(&&i);
            if present {
                iter.next();
            }
            bits.push_bit(present);
        }
        self.sets.push(bits);
        Ok(())
    }

    /// Freezes the storage.
    pub fn prepare_for_queries(&mut self) {
        self.sets.shrink_to_fit();
    }

    /// Number of color sets in the storage.
    pub fn len(&self) -> usize {
        self.sets.len()
    }

    /// Returns `true` if the storage contains no sets.
    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    /// Returns the color set with the given identifier.
    pub fn get(&self, id: usize) -> Result<&RawVector> {
        self.sets.get(id).ok_or_else(|| {
            ColoringError::UsageError(format!(
                "PlainColorSets: color set id {} out of range ({} sets)",
                id,
                self.sets.len()
            ))
        })
    }

    /// Returns an iterator over all stored sets in identifier order.
    pub fn iter(&self) -> impl Iterator<Item = &RawVector> {
        self.sets.iter()
    }

    /// Returns the number of bytes the sets would take in the serialized
    /// archive.
    pub fn space_breakdown(&self) -> BTreeMap<String, usize> {
        let mut breakdown = BTreeMap::new();
        let bytes: usize = self.sets.iter().map(|set| set.size_in_bytes()).sum();
        breakdown.insert(String::from("sets"), bytes + 8);
        breakdown
    }

    /// Writes the storage: a set count followed by the bitmaps.
    pub fn serialize_into<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        utils::write_u64(writer, self.sets.len() as u64)?;
        for set in &self.sets {
            set.serialize(writer)?;
        }
        Ok(())
    }

    /// Reads a storage written with [`PlainColorSets::serialize_into`].
    pub fn load_from<R: Read>(reader: &mut R) -> io::Result<Self> {
        let count = utils::read_u64(reader)? as usize;
        let mut sets = Vec::with_capacity(count);
        for _ in 0..count {
            sets.push(RawVector::load(reader)?);
        }
        Ok(PlainColorSets { sets })
    }
}

impl Default for PlainColorSets {
    fn default() -> Self {
        Self::new()
    }
}

//-----------------------------------------------------------------------------

// Operations on plain bitmap sets, shared by the reference and buffer types
// in the coloring facade.

pub(crate) fn plain_size(bits: &RawVector, len: usize) -> usize {
    (0..len).filter(|&i| bits.bit(i)).count()
}

pub(crate) fn plain_contains(bits: &RawVector, len: usize, color: u64) -> bool {
    (color as usize) < len && bits.bit(color as usize)
}

pub(crate) fn plain_to_vector(bits: &RawVector, len: usize) -> Vec<u64> {
    (0..len).filter(|&i| bits.bit(i)).map(|i| i as u64).collect()
}

//-----------------------------------------------------------------------------
