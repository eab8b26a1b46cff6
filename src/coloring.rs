//! The coloring of a succinct de Bruijn graph.
//!
//! [`Coloring`] binds together the distinct color sets, the sparse mapping
//! from core k-mers to color set identifiers, and a reference to the
//! external k-mer index. It answers, for any node of the graph, the set of
//! reference sequences whose k-mers the node represents.
//!
//! A node that has no entry in the mapping has out-degree one, and its
//! color set is the color set of its unique successor. Resolving a node
//! therefore follows forward edges until a node with an entry is reached;
//! the construction guarantees the walk is short (see
//! [`BuildParameters::sampling_distance`](crate::builder::BuildParameters)).
//!
//! # Archive format
//!
//! A serialized coloring starts with a length-prefixed representation tag,
//! one of `sdsl-hybrid-v4`, `roaring-v0`, and `bitmagic-v0`. The color set
//! payload, the node mapping, the largest color identifier, and the total
//! length of the distinct color sets follow, all little-endian.
//! [`Coloring::load`] dispatches on the tag and rejects unknown tags;
//! [`Coloring::load_expected`] instead fails with a catchable
//! [`ColoringError::WrongVariant`] when the archive holds a different
//! representation than the caller wants.

use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use croaring::Bitmap;

use simple_sds::raw_vector::{AccessRaw, PushRaw, RawVector};
use simple_sds::serialize::Serialize;

use crate::color_set::{ColorSet, ColorSetView};
use crate::error::{ColoringError, Result};
use crate::graph::KmerIndex;
use crate::node_map::NodeToColorSetMap;
use crate::storage::ColorSetStorage;
use crate::utils;
use crate::variants::{self, PlainColorSets, RoaringColorSets};

#[cfg(test)]
mod tests;

//-----------------------------------------------------------------------------

/// The color set representations an archive can hold.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColorSetType {
    /// Concatenated bitmap-or-array sets ([`ColorSetStorage`]).
    SdslHybrid,
    /// Individual roaring bitmaps ([`RoaringColorSets`]).
    Roaring,
    /// Individual plain bitmaps ([`PlainColorSets`]), under the legacy
    /// `bitmagic-v0` tag.
    PlainBitmap,
}

impl ColorSetType {
    /// The archive tag of the representation.
    pub fn tag(self) -> &'static str {
        match self {
            ColorSetType::SdslHybrid => "sdsl-hybrid-v4",
            ColorSetType::Roaring => "roaring-v0",
            ColorSetType::PlainBitmap => "bitmagic-v0",
        }
    }

    /// The representation for an archive tag, or [`None`] for an unknown
    /// tag.
    pub fn from_tag(tag: &str) -> Option<ColorSetType> {
        match tag {
            "sdsl-hybrid-v4" => Some(ColorSetType::SdslHybrid),
            "roaring-v0" => Some(ColorSetType::Roaring),
            "bitmagic-v0" => Some(ColorSetType::PlainBitmap),
            _ => None,
        }
    }
}

impl fmt::Display for ColorSetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tag())
    }
}

//-----------------------------------------------------------------------------

/// The distinct color sets of a coloring, in one of the known
/// representations.
///
/// The set of representations is closed, so the variants are dispatched
/// with an enum rather than through trait objects.
#[derive(Debug)]
pub enum ColorSets {
    /// Concatenated hybrid storage.
    Hybrid(ColorSetStorage),
    /// Roaring bitmaps.
    Roaring(RoaringColorSets),
    /// Plain per-set bitmaps.
    PlainBitmap(PlainColorSets),
}

impl ColorSets {
    /// The representation of the sets.
    pub fn color_set_type(&self) -> ColorSetType {
        match self {
            ColorSets::Hybrid(_) => ColorSetType::SdslHybrid,
            ColorSets::Roaring(_) => ColorSetType::Roaring,
            ColorSets::PlainBitmap(_) => ColorSetType::PlainBitmap,
        }
    }

    /// Number of distinct color sets.
    pub fn len(&self) -> usize {
        match self {
            ColorSets::Hybrid(storage) => storage.len(),
            ColorSets::Roaring(storage) => storage.len(),
            ColorSets::PlainBitmap(storage) => storage.len(),
        }
    }

    /// Returns `true` if there are no sets.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the color set with the given identifier.
    pub fn get(&self, id: usize) -> Result<ColorSetRef<'_>> {
        match self {
            ColorSets::Hybrid(storage) => Ok(ColorSetRef::Hybrid(storage.get(id)?)),
            ColorSets::Roaring(storage) => Ok(ColorSetRef::Roaring(storage.get(id)?)),
            ColorSets::PlainBitmap(storage) => Ok(ColorSetRef::PlainBitmap(storage.get(id)?)),
        }
    }

    /// Returns an iterator over all sets in identifier order.
    pub fn iter(&self) -> impl Iterator<Item = ColorSetRef<'_>> {
        (0..self.len()).filter_map(move |id| self.get(id).ok())
    }

    /// Returns the number of bytes each component would take in the
    /// serialized archive.
    pub fn space_breakdown(&self) -> BTreeMap<String, usize> {
        match self {
            ColorSets::Hybrid(storage) => storage.space_breakdown(),
            ColorSets::Roaring(storage) => storage.space_breakdown(),
            ColorSets::PlainBitmap(storage) => storage.space_breakdown(),
        }
    }

    // Construction-side surface, shared by the builder across the
    // representations.

    pub(crate) fn new_of_type(set_type: ColorSetType) -> Self {
        match set_type {
            ColorSetType::SdslHybrid => ColorSets::Hybrid(ColorSetStorage::new()),
            ColorSetType::Roaring => ColorSets::Roaring(RoaringColorSets::new()),
            ColorSetType::PlainBitmap => ColorSets::PlainBitmap(PlainColorSets::new()),
        }
    }

    pub(crate) fn add_set(&mut self, colors: &[u64]) -> Result<()> {
        match self {
            ColorSets::Hybrid(storage) => storage.add_set(colors),
            ColorSets::Roaring(storage) => storage.add_set(colors),
            ColorSets::PlainBitmap(storage) => storage.add_set(colors),
        }
    }

    pub(crate) fn prepare_for_queries(&mut self) -> Result<()> {
        match self {
            ColorSets::Hybrid(storage) => storage.prepare_for_queries(),
            ColorSets::Roaring(storage) => {
                storage.prepare_for_queries();
                Ok(())
            }
            ColorSets::PlainBitmap(storage) => {
                storage.prepare_for_queries();
                Ok(())
            }
        }
    }

    fn serialize_into<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        match self {
            ColorSets::Hybrid(storage) => storage.serialize(writer),
            ColorSets::Roaring(storage) => storage.serialize_into(writer),
            ColorSets::PlainBitmap(storage) => storage.serialize_into(writer),
        }
    }

    fn load_from<R: Read>(reader: &mut R, set_type: ColorSetType) -> io::Result<Self> {
        match set_type {
            ColorSetType::SdslHybrid => Ok(ColorSets::Hybrid(ColorSetStorage::load(reader)?)),
            ColorSetType::Roaring => Ok(ColorSets::Roaring(RoaringColorSets::load_from(reader)?)),
            ColorSetType::PlainBitmap => {
                Ok(ColorSets::PlainBitmap(PlainColorSets::load_from(reader)?))
            }
        }
    }
}

//-----------------------------------------------------------------------------

/// A non-owning reference to one color set, in any representation.
#[derive(Clone, Copy, Debug)]
pub enum ColorSetRef<'a> {
    /// A view into the hybrid storage.
    Hybrid(ColorSetView<'a>),
    /// A roaring bitmap.
    Roaring(&'a Bitmap),
    /// A plain bitmap.
    PlainBitmap(&'a RawVector),
}

impl<'a> ColorSetRef<'a> {
    /// Number of colors in the set.
    pub fn size(&self) -> usize {
        match self {
            ColorSetRef::Hybrid(view) => view.size(),
            ColorSetRef::Roaring(set) => set.cardinality() as usize,
            ColorSetRef::PlainBitmap(bits) => variants::plain_size(bits, bits.len()),
        }
    }

    /// Returns `true` if the set is empty.
    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Returns `true` if the set contains the color.
    pub fn contains(&self, color: u64) -> bool {
        match self {
            ColorSetRef::Hybrid(view) => view.contains(color),
            ColorSetRef::Roaring(set) => {
                color <= u64::from(u32::MAX) && set.contains(color as u32)
            }
            ColorSetRef::PlainBitmap(bits) => variants::plain_contains(bits, bits.len(), color),
        }
    }

    /// Returns the colors as a sorted vector.
    pub fn as_sorted_vector(&self) -> Vec<u64> {
        match self {
            ColorSetRef::Hybrid(view) => view.as_sorted_vector(),
            ColorSetRef::Roaring(set) => set.iter().map(u64::from).collect(),
            ColorSetRef::PlainBitmap(bits) => variants::plain_to_vector(bits, bits.len()),
        }
    }
}

//-----------------------------------------------------------------------------

/// An owned color set used as scratch space in query loops.
///
/// A buffer starts as a copy of a [`ColorSetRef`] and is then intersected
/// or unioned with further references, as in a pseudoalignment loop over
/// the k-mers of a query sequence. Operations between matching
/// representations work in place; mixing representations falls back to
/// materializing both sides.
#[derive(Clone, Debug)]
pub enum ColorSetBuffer {
    /// Owned hybrid set.
    Hybrid(ColorSet),
    /// Owned roaring bitmap.
    Roaring(Bitmap),
    /// Owned plain bitmap with its logical length.
    PlainBitmap {
        /// Backing bits; the allocation may be longer than `len`.
        bits: RawVector,
        /// Logical length in bits.
        len: usize,
    },
}

impl ColorSetBuffer {
    /// Creates a buffer holding a copy of the referenced set.
    pub fn from_ref(set: &ColorSetRef<'_>) -> Self {
        match set {
            ColorSetRef::Hybrid(view) => ColorSetBuffer::Hybrid(ColorSet::from_view(view)),
            ColorSetRef::Roaring(bitmap) => ColorSetBuffer::Roaring((*bitmap).clone()),
            ColorSetRef::PlainBitmap(source) => {
                let mut bits = RawVector::with_capacity(source.len());
                for i in 0..source.len() {
                    bits.push_bit(source.bit(i));
                }
                let len = source.len();
                ColorSetBuffer::PlainBitmap { bits, len }
            }
        }
    }

    /// Number of colors in the buffer.
    pub fn size(&self) -> usize {
        match self {
            ColorSetBuffer::Hybrid(set) => set.size(),
            ColorSetBuffer::Roaring(set) => set.cardinality() as usize,
            ColorSetBuffer::PlainBitmap { bits, len } => variants::plain_size(bits, *len),
        }
    }

    /// Returns `true` if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Returns `true` if the buffer contains the color.
    pub fn contains(&self, color: u64) -> bool {
        match self {
            ColorSetBuffer::Hybrid(set) => set.contains(color),
            ColorSetBuffer::Roaring(set) => {
                color <= u64::from(u32::MAX) && set.contains(color as u32)
            }
            ColorSetBuffer::PlainBitmap { bits, len } => variants::plain_contains(bits, *len, color),
        }
    }

    /// Returns the colors as a sorted vector.
    pub fn as_sorted_vector(&self) -> Vec<u64> {
        match self {
            ColorSetBuffer::Hybrid(set) => set.as_sorted_vector(),
            ColorSetBuffer::Roaring(set) => set.iter().map(u64::from).collect(),
            ColorSetBuffer::PlainBitmap { bits, len } => variants::plain_to_vector(bits, *len),
        }
    }

    /// Replaces the buffer with its intersection with the referenced set.
    pub fn intersect_with(&mut self, other: &ColorSetRef<'_>) {
        match &mut *self {
            ColorSetBuffer::Hybrid(set) => {
                if let ColorSetRef::Hybrid(view) = other {
                    set.intersect_with(view);
                    return;
                }
            }
            ColorSetBuffer::Roaring(set) => {
                if let ColorSetRef::Roaring(other_set) = other {
                    set.and_inplace(other_set);
                    return;
                }
            }
            ColorSetBuffer::PlainBitmap { bits, len } => {
                if let ColorSetRef::PlainBitmap(other_bits) = other {
                    let new_len = (*len).min(other_bits.len());
                    for i in 0..new_len {
                        let value = bits.bit(i) && other_bits.bit(i);
                        bits.set_bit(i, value);
                    }
                    *len = new_len;
                    return;
                }
            }
        }

        // Mixed representations: materialize both sides.
        let left = self.as_sorted_vector();
        let result: Vec<u64> = left.into_iter().filter(|&color| other.contains(color)).collect();
        self.replace_contents(&result);
    }

    /// Replaces the buffer with its union with the referenced set.
    pub fn union_with(&mut self, other: &ColorSetRef<'_>) {
        if let ColorSetBuffer::Roaring(set) = &mut *self {
            if let ColorSetRef::Roaring(other_set) = other {
                set.or_inplace(other_set);
                return;
            }
        }
        let mut result = self.as_sorted_vector();
        for color in other.as_sorted_vector() {
            if !result.contains(&color) {
                result.push(color);
            }
        }
        result.sort_unstable();
        self.replace_contents(&result);
    }

    // Rebuilds the buffer contents in its current representation.
    fn replace_contents(&mut self, colors: &[u64]) {
        match self {
            ColorSetBuffer::Hybrid(set) => *set = ColorSet::from_sorted(colors),
            ColorSetBuffer::Roaring(set) => {
                let mut replacement = Bitmap::new();
                for &color in colors {
                    debug_assert!(color <= u64::from(u32::MAX));
                    replacement.add(color as u32);
                }
                *set = replacement;
            }
            ColorSetBuffer::PlainBitmap { bits, len } => {
                let universe = colors.last().map_or(0, |&max| max as usize + 1);
                let mut replacement = RawVector::with_capacity(universe);
                let mut iter = colors.iter().peekable();
                for i in 0..(universe as u64) {
                    let present = iter.peek() == Some(&&i);
                    if present {
                        iter.next();
                    }
                    replacement.push_bit(present);
                }
                *bits = replacement;
                *len = universe;
            }
        }
    }
}

//-----------------------------------------------------------------------------

/// A colored succinct de Bruijn graph coloring, bound to its k-mer index.
///
/// The coloring is immutable: all accessors take `&self` and the structure
/// can be shared freely across threads once built or loaded.
pub struct Coloring<'a, G: KmerIndex> {
    sets: ColorSets,
    node_map: NodeToColorSetMap,
    index: &'a G,
    largest_color_id: u64,
    total_color_set_length: u64,
}

impl<'a, G: KmerIndex> Coloring<'a, G> {
    pub(crate) fn from_parts(
        sets: ColorSets,
        node_map: NodeToColorSetMap,
        index: &'a G,
        largest_color_id: u64,
        total_color_set_length: u64,
    ) -> Self {
        Coloring { sets, node_map, index, largest_color_id, total_color_set_length }
    }

    /// The k-mer index the coloring is bound to.
    pub fn kmer_index(&self) -> &'a G {
        self.index
    }

    /// The representation of the distinct color sets.
    pub fn color_set_type(&self) -> ColorSetType {
        self.sets.color_set_type()
    }

    /// The node to color set mapping.
    pub fn node_map(&self) -> &NodeToColorSetMap {
        &self.node_map
    }

    /// Returns `true` if the node has its color set identifier stored
    /// explicitly.
    pub fn is_core(&self, node: usize) -> bool {
        self.node_map.has(node)
    }

    /// Largest color identifier in the coloring.
    pub fn largest_color(&self) -> u64 {
        self.largest_color_id
    }

    /// Number of distinct color sets.
    pub fn number_of_distinct_color_sets(&self) -> usize {
        self.sets.len()
    }

    /// Sum of the sizes of the distinct color sets.
    pub fn total_color_set_length(&self) -> u64 {
        self.total_color_set_length
    }

    /// Returns the color set identifier of the node.
    ///
    /// If the node has no stored identifier, follows forward edges until a
    /// node with one is reached. Every node on the walk has out-degree one
    /// and shares its color set with the target.
    ///
    /// # Errors
    ///
    /// Returns [`ColoringError::UsageError`] if the node is out of range
    /// and [`ColoringError::StructuralInvariant`] if the walk hits a dead
    /// end or fails to terminate.
    pub fn color_set_id_of(&self, node: usize) -> Result<usize> {
        if node >= self.index.num_nodes() {
            return Err(ColoringError::UsageError(format!(
                "Coloring: node {} out of range ({} nodes)",
                node,
                self.index.num_nodes()
            )));
        }
        let mut current = node;
        let mut steps = 0;
        while !self.node_map.has(current) {
            current = self.index.successor(current).ok_or_else(|| {
                ColoringError::StructuralInvariant(format!(
                    "Coloring: dead end at node {} while resolving node {}",
                    current, node
                ))
            })?;
            steps += 1;
            if steps > self.index.num_nodes() {
                return Err(ColoringError::StructuralInvariant(format!(
                    "Coloring: the walk from node {} does not reach a stored color set",
                    node
                )));
            }
        }
        Ok(self.node_map.get(current)? as usize)
    }

    /// Returns the color set of the node.
    ///
    /// The returned reference is read-only and borrows from the coloring;
    /// copy it into a [`ColorSetBuffer`] for mutation.
    pub fn color_set_of(&self, node: usize) -> Result<ColorSetRef<'_>> {
        let id = self.color_set_id_of(node)?;
        self.sets.get(id)
    }

    /// Returns the color set of the node as a sorted vector.
    pub fn color_set_as_vector(&self, node: usize) -> Result<Vec<u64>> {
        Ok(self.color_set_of(node)?.as_sorted_vector())
    }

    /// Returns the color set with the given identifier.
    pub fn color_set_by_id(&self, id: usize) -> Result<ColorSetRef<'_>> {
        self.sets.get(id)
    }

    /// Returns an iterator over the distinct color sets in identifier
    /// order.
    pub fn distinct_color_sets(&self) -> impl Iterator<Item = ColorSetRef<'_>> {
        self.sets.iter()
    }

    /// Returns the number of bytes each component would take in the
    /// serialized archive.
    pub fn space_breakdown(&self) -> BTreeMap<String, usize> {
        let mut breakdown = BTreeMap::new();
        for (component, bytes) in self.sets.space_breakdown() {
            breakdown.insert(format!("color-set-storage-{}", component), bytes);
        }
        for (component, bytes) in self.node_map.space_breakdown() {
            breakdown.insert(format!("node-to-color-set-map-{}", component), bytes);
        }
        breakdown
    }
}

//-----------------------------------------------------------------------------

// Serialization.

impl<'a, G: KmerIndex> Coloring<'a, G> {
    /// Writes the coloring to the writer.
    pub fn serialize<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        utils::write_string(writer, self.color_set_type().tag())?;
        self.sets.serialize_into(writer)?;
        self.node_map.serialize(writer)?;
        utils::write_i64(writer, self.largest_color_id as i64)?;
        utils::write_i64(writer, self.total_color_set_length as i64)?;
        Ok(())
    }

    /// Writes the coloring to a file.
    pub fn serialize_to_file<P: AsRef<Path>>(&self, filename: P) -> Result<()> {
        let file = File::create(filename.as_ref())
            .map_err(|e| ColoringError::archive_io("Cannot create the archive", e))?;
        let mut writer = BufWriter::new(file);
        self.serialize(&mut writer)
            .map_err(|e| ColoringError::archive_io("Cannot write the archive", e))?;
        writer
            .flush()
            .map_err(|e| ColoringError::archive_io("Cannot write the archive", e))
    }

    /// Loads a coloring, dispatching on the representation tag of the
    /// archive.
    ///
    /// # Errors
    ///
    /// Returns [`ColoringError::InputMalformed`] if the tag is unknown or
    /// the archive is unreadable, and [`ColoringError::StructuralInvariant`]
    /// if the loaded structures are inconsistent with each other or with
    /// the index.
    pub fn load<R: Read>(reader: &mut R, index: &'a G) -> Result<Self> {
        let tag = utils::read_string(reader)
            .map_err(|e| ColoringError::archive_io("Cannot read the archive tag", e))?;
        let set_type = ColorSetType::from_tag(&tag)
            .ok_or_else(|| ColoringError::InputMalformed(format!("Unknown color set type: {}", tag)))?;
        Self::load_parts(reader, set_type, index)
    }

    /// Loads a coloring that is expected to hold a specific representation.
    ///
    /// # Errors
    ///
    /// Returns [`ColoringError::WrongVariant`] if the archive holds a
    /// different known representation. The error is a catchable sentinel:
    /// a caller probing for representations can match on it and retry.
    pub fn load_expected<R: Read>(
        reader: &mut R,
        index: &'a G,
        expected: ColorSetType,
    ) -> Result<Self> {
        let tag = utils::read_string(reader)
            .map_err(|e| ColoringError::archive_io("Cannot read the archive tag", e))?;
        if tag != expected.tag() {
            return Err(ColoringError::WrongVariant {
                expected: expected.tag().to_string(),
                found: tag,
            });
        }
        Self::load_parts(reader, expected, index)
    }

    /// Loads a coloring from a file, dispatching on the representation tag.
    pub fn load_from_file<P: AsRef<Path>>(filename: P, index: &'a G) -> Result<Self> {
        let file = File::open(filename.as_ref())
            .map_err(|e| ColoringError::archive_io("Cannot open the archive", e))?;
        let mut reader = BufReader::new(file);
        Self::load(&mut reader, index)
    }

    fn load_parts<R: Read>(reader: &mut R, set_type: ColorSetType, index: &'a G) -> Result<Self> {
        let sets = ColorSets::load_from(reader, set_type)
            .map_err(|e| ColoringError::archive_io("Cannot read the color sets", e))?;
        if let ColorSets::Hybrid(storage) = &sets {
            storage.check_invariants()?;
        }
        let node_map = NodeToColorSetMap::load(reader)
            .map_err(|e| ColoringError::archive_io("Cannot read the node mapping", e))?;
        node_map.check_invariants()?;
        if node_map.num_nodes() != index.num_nodes() {
            return Err(ColoringError::StructuralInvariant(format!(
                "Coloring: the archive covers {} nodes but the index has {}",
                node_map.num_nodes(),
                index.num_nodes()
            )));
        }
        let largest_color_id = utils::read_i64(reader)
            .map_err(|e| ColoringError::archive_io("Cannot read the archive statistics", e))?;
        let total_color_set_length = utils::read_i64(reader)
            .map_err(|e| ColoringError::archive_io("Cannot read the archive statistics", e))?;
        if largest_color_id < 0 || total_color_set_length < 0 {
            return Err(ColoringError::InputMalformed(String::from(
                "Negative color statistics in the archive",
            )));
        }
        Ok(Coloring {
            sets,
            node_map,
            index,
            largest_color_id: largest_color_id as u64,
            total_color_set_length: total_color_set_length as u64,
        })
    }
}

//-----------------------------------------------------------------------------
