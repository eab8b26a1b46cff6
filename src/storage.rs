//! An immutable container of distinct color sets.
//!
//! [`ColorSetStorage`] stores `n` color sets, identified by `0..n`, without
//! allocating any of them separately. There are two concatenations: all
//! bitmap payloads packed end to end and all array payloads packed end to
//! end at the minimal element width. A discriminator bitvector with rank
//! support tells which concatenation a set lives in, and two start offset
//! arrays (with a one-past-the-end sentinel) delimit the payloads.
//!
//! The container is filled with [`ColorSetStorage::add_set`] and frozen with
//! [`ColorSetStorage::prepare_for_queries`]. After freezing it is read-only
//! and can be queried, serialized, and shared freely.

use std::collections::BTreeMap;
use std::io;

use simple_sds::bit_vector::BitVector;
use simple_sds::int_vector::IntVector;
use simple_sds::ops::{Access, BitVec, Push, Rank, Vector};
use simple_sds::raw_vector::{PushRaw, RawVector};
use simple_sds::serialize::Serialize;

use crate::color_set::{self, ColorSetView};
use crate::error::{ColoringError, Result};
use crate::utils;


//-----------------------------------------------------------------------------

// Growable buffers used between `new` and `prepare_for_queries`.
#[derive(Debug)]
struct TransientBuffers {
    bitmap_concat: RawVector,
    bitmap_starts: Vec<usize>,
    array_concat: Vec<u64>,
    array_starts: Vec<usize>,
    is_bitmap: RawVector,
}

impl TransientBuffers {
    fn new() -> Self {
        TransientBuffers {
            bitmap_concat: RawVector::new(),
            bitmap_starts: Vec::new(),
            array_concat: Vec::new(),
            array_starts: Vec::new(),
            is_bitmap: RawVector::new(),
        }
    }
}

// The final bit-packed structures.
#[derive(Debug)]
struct FrozenStorage {
    bitmap_concat: BitVector,
    bitmap_starts: IntVector,
    array_concat: IntVector,
    array_starts: IntVector,
    is_bitmap: BitVector,
}

#[derive(Debug)]
enum State {
    Building(TransientBuffers),
    Frozen(FrozenStorage),
}

//-----------------------------------------------------------------------------

/// An append-then-freeze container of distinct color sets.
///
/// # Examples
///
/// ```
/// use sbwt_colors::ColorSetStorage;
///
/// let mut storage = ColorSetStorage::new();
/// storage.add_set(&[4, 1534, 4003, 8903]).unwrap();
/// storage.add_set(&[0, 1, 2, 3]).unwrap();
/// storage.prepare_for_queries().unwrap();
///
/// assert_eq!(storage.len(), 2);
/// let view = storage.get(0).unwrap();
/// assert!(view.contains(4003));
/// assert!(!view.contains(5000));
/// ```
#[derive(Debug)]
pub struct ColorSetStorage {
    state: State,
}

impl ColorSetStorage {
    /// Creates an empty storage ready for [`ColorSetStorage::add_set`].
    pub fn new() -> Self {
        ColorSetStorage { state: State::Building(TransientBuffers::new()) }
    }

    /// Returns `true` if [`ColorSetStorage::prepare_for_queries`] has been
    /// called.
    pub fn is_prepared(&self) -> bool {
        matches!(self.state, State::Frozen(_))
    }

    fn frozen(&self) -> Option<&FrozenStorage> {
        match &self.state {
            State::Frozen(frozen) => Some(frozen),
            State::Building(_) => None,
        }
    }

    /// Number of color sets in the storage.
    pub fn len(&self) -> usize {
        match &self.state {
            State::Building(buffers) => buffers.is_bitmap.len(),
            State::Frozen(frozen) => frozen.is_bitmap.len(),
        }
    }

    /// Returns `true` if the storage contains no sets.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Appends a color set given as a sorted, distinct color list.
    ///
    /// The representation is chosen per set: a bitmap when
    /// `⌈log₂(max + 1)⌉ · |S| ≥ max + 1`, an array otherwise. The set
    /// receives the next free identifier.
    ///
    /// # Errors
    ///
    /// Returns [`ColoringError::UsageError`] if the storage has already been
    /// frozen.
    pub fn add_set(&mut self, colors: &[u64]) -> Result<()> {
        debug_assert!(colors.windows(2).all(|pair| pair[0] < pair[1]));
        let buffers = match &mut self.state {
            State::Building(buffers) => buffers,
            State::Frozen(_) => {
                return Err(ColoringError::UsageError(String::from(
                    "ColorSetStorage: cannot add sets after prepare_for_queries",
                )));
            }
        };

        if color_set::array_is_smaller(colors) {
            buffers.is_bitmap.push_bit(false);
            buffers.array_starts.push(buffers.array_concat.len());
            buffers.array_concat.extend_from_slice(colors);
        } else {
            buffers.is_bitmap.push_bit(true);
            buffers.bitmap_starts.push(buffers.bitmap_concat.len());
            let universe = colors.last().map_or(0, |&max| max as usize + 1);
            let mut iter = colors.iter().peekable();
            for i in 0..(universe as u64) {
                let present = iter.peek() == Some(&&i);
                if present {
                    iter.next();
                }
                buffers.bitmap_concat.push_bit(present);
            }
        }
        Ok(())
    }

    /// Freezes the storage: packs the concatenations and start offsets into
    /// their final bit-packed form, appends the one-past-the-end sentinels,
    /// builds rank support on the discriminator, and releases the transient
    /// buffers.
    ///
    /// # Errors
    ///
    /// Returns [`ColoringError::UsageError`] if called twice.
    pub fn prepare_for_queries(&mut self) -> Result<()> {
        let state = std::mem::replace(&mut self.state, State::Building(TransientBuffers::new()));
        let mut buffers = match state {
            State::Building(buffers) => buffers,
            frozen @ State::Frozen(_) => {
                self.state = frozen;
                return Err(ColoringError::UsageError(String::from(
                    "ColorSetStorage: prepare_for_queries called twice",
                )));
            }
        };

        // The sentinels eliminate a special case when delimiting the last
        // set of each concatenation.
        buffers.bitmap_starts.push(buffers.bitmap_concat.len());
        buffers.array_starts.push(buffers.array_concat.len());

        let array_concat = pack_values(&buffers.array_concat)?;
        let bitmap_starts = pack_offsets(&buffers.bitmap_starts)?;
        let array_starts = pack_offsets(&buffers.array_starts)?;
        let bitmap_concat = BitVector::from(buffers.bitmap_concat);
        let mut is_bitmap = BitVector::from(buffers.is_bitmap);
        is_bitmap.enable_rank();

        self.state = State::Frozen(FrozenStorage {
            bitmap_concat,
            bitmap_starts,
            array_concat,
            array_starts,
            is_bitmap,
        });
        Ok(())
    }

    /// Returns a view of the color set with the given identifier.
    ///
    /// # Errors
    ///
    /// Returns [`ColoringError::UsageError`] if the storage has not been
    /// frozen or if the identifier is out of range.
    pub fn get(&self, id: usize) -> Result<ColorSetView<'_>> {
        let frozen = self.frozen().ok_or_else(|| {
            ColoringError::UsageError(String::from(
                "ColorSetStorage: queries require prepare_for_queries",
            ))
        })?;
        if id >= frozen.is_bitmap.len() {
            return Err(ColoringError::UsageError(format!(
                "ColorSetStorage: color set id {} out of range ({} sets)",
                id,
                frozen.is_bitmap.len()
            )));
        }
        Ok(view_of(frozen, id))
    }

    /// Returns an iterator over all stored sets in identifier order.
    ///
    /// The iterator is empty if the storage has not been frozen.
    pub fn iter(&self) -> impl Iterator<Item = ColorSetView<'_>> {
        let frozen = self.frozen();
        let count = frozen.map_or(0, |f| f.is_bitmap.len());
        (0..count).filter_map(move |id| frozen.map(|f| view_of(f, id)))
    }

    /// Checks the structural invariants of a frozen storage: strictly
    /// monotone start offsets with correct sentinels and a consistent
    /// discriminator rank.
    pub fn check_invariants(&self) -> Result<()> {
        let frozen = self.frozen().ok_or_else(|| {
            ColoringError::UsageError(String::from(
                "ColorSetStorage: invariants are defined for a frozen storage",
            ))
        })?;
        let bitmaps = frozen.is_bitmap.rank(frozen.is_bitmap.len());
        let arrays = frozen.is_bitmap.len() - bitmaps;
        if frozen.bitmap_starts.len() != bitmaps + 1 || frozen.array_starts.len() != arrays + 1 {
            return Err(ColoringError::StructuralInvariant(format!(
                "ColorSetStorage: {} bitmaps and {} arrays with start arrays of length {} and {}",
                bitmaps,
                arrays,
                frozen.bitmap_starts.len(),
                frozen.array_starts.len()
            )));
        }
        check_starts(&frozen.bitmap_starts, frozen.bitmap_concat.len(), "bitmap")?;
        check_starts(&frozen.array_starts, frozen.array_concat.len(), "array")?;
        Ok(())
    }

    /// Returns the number of bytes each component would take in the
    /// serialized archive.
    ///
    /// The breakdown is empty if the storage has not been frozen.
    pub fn space_breakdown(&self) -> BTreeMap<String, usize> {
        let mut breakdown = BTreeMap::new();
        if let Some(frozen) = self.frozen() {
            breakdown.insert(String::from("bitmap-concat"), frozen.bitmap_concat.size_in_bytes());
            breakdown.insert(String::from("bitmap-starts"), frozen.bitmap_starts.size_in_bytes());
            breakdown.insert(String::from("array-concat"), frozen.array_concat.size_in_bytes());
            breakdown.insert(String::from("array-starts"), frozen.array_starts.size_in_bytes());
            breakdown.insert(String::from("is-bitmap"), frozen.is_bitmap.size_in_bytes());
        }
        breakdown
    }
}

impl Default for ColorSetStorage {
    fn default() -> Self {
        Self::new()
    }
}

//-----------------------------------------------------------------------------

// Rank over the discriminator picks the concatenation and the position
// within it.
fn view_of(frozen: &FrozenStorage, id: usize) -> ColorSetView<'_> {
    if frozen.is_bitmap.get(id) {
        let index = frozen.is_bitmap.rank(id);
        let start = frozen.bitmap_starts.get(index) as usize;
        let end = frozen.bitmap_starts.get(index + 1) as usize;
        ColorSetView::Bitmap { bits: &frozen.bitmap_concat, start, len: end - start }
    } else {
        let index = id - frozen.is_bitmap.rank(id);
        let start = frozen.array_starts.get(index) as usize;
        let end = frozen.array_starts.get(index + 1) as usize;
        ColorSetView::Array { values: &frozen.array_concat, start, len: end - start }
    }
}

// Packs values into an IntVector at the minimal width.
fn pack_values(values: &[u64]) -> Result<IntVector> {
    let width = utils::int_width(values.iter().copied().max().unwrap_or(0));
    let mut packed = IntVector::with_capacity(values.len(), width)
        .map_err(|e| ColoringError::StructuralInvariant(format!("ColorSetStorage: {}", e)))?;
    for &value in values {
        packed.push(value);
    }
    Ok(packed)
}

// Packs start offsets into an IntVector at the minimal width.
fn pack_offsets(offsets: &[usize]) -> Result<IntVector> {
    let width = utils::int_width(offsets.iter().copied().max().unwrap_or(0) as u64);
    let mut packed = IntVector::with_capacity(offsets.len(), width)
        .map_err(|e| ColoringError::StructuralInvariant(format!("ColorSetStorage: {}", e)))?;
    for &offset in offsets {
        packed.push(offset as u64);
    }
    Ok(packed)
}

// Checks that a start offset array is strictly monotone and ends with the
// concatenation length.
fn check_starts(starts: &IntVector, concat_len: usize, name: &str) -> Result<()> {
    for i in 1..starts.len() {
        if starts.get(i - 1) >= starts.get(i) {
            return Err(ColoringError::StructuralInvariant(format!(
                "ColorSetStorage: {} start array is not strictly monotone at offset {}",
                name, i
            )));
        }
    }
    if starts.len() > 1 && starts.get(starts.len() - 1) != concat_len as u64 {
        return Err(ColoringError::StructuralInvariant(format!(
            "ColorSetStorage: {} start sentinel {} does not match concatenation length {}",
            name,
            starts.get(starts.len() - 1),
            concat_len
        )));
    }
    Ok(())
}

//-----------------------------------------------------------------------------

impl Serialize for ColorSetStorage {
    fn serialize_header<T: io::Write>(&self, _: &mut T) -> io::Result<()> {
        Ok(())
    }

    fn serialize_body<T: io::Write>(&self, writer: &mut T) -> io::Result<()> {
        let frozen = match &self.state {
            State::Frozen(frozen) => frozen,
            State::Building(_) => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "ColorSetStorage: cannot serialize before prepare_for_queries",
                ));
            }
        };
        frozen.bitmap_concat.serialize(writer)?;
        frozen.bitmap_starts.serialize(writer)?;
        frozen.array_concat.serialize(writer)?;
        frozen.array_starts.serialize(writer)?;
        frozen.is_bitmap.serialize(writer)?;
        Ok(())
    }

    fn load<T: io::Read>(reader: &mut T) -> io::Result<Self> {
        let bitmap_concat = BitVector::load(reader)?;
        let bitmap_starts = IntVector::load(reader)?;
        let array_concat = IntVector::load(reader)?;
        let array_starts = IntVector::load(reader)?;
        let mut is_bitmap = BitVector::load(reader)?;
        is_bitmap.enable_rank();
        Ok(ColorSetStorage {
            state: State::Frozen(FrozenStorage {
                bitmap_concat,
                bitmap_starts,
                array_concat,
                array_starts,
                is_bitmap,
            }),
        })
    }

    fn size_in_elements(&self) -> usize {
        match &self.state {
            State::Building(_) => 0,
            State::Frozen(frozen) => {
                frozen.bitmap_concat.size_in_elements()
                    + frozen.bitmap_starts.size_in_elements()
                    + frozen.array_concat.size_in_elements()
                    + frozen.array_starts.size_in_elements()
                    + frozen.is_bitmap.size_in_elements()
            }
        }
    }
}

//-----------------------------------------------------------------------------
