//! A single color set, stored either as a bitmap or as a sorted array.
//!
//! A color set is a finite set of nonnegative integers. Two representations
//! are used, chosen by the rule in [`ColorSet::from_sorted`]:
//!
//! * **bitmap**: a bit vector of length `max + 1` with bit `i` set iff color
//!   `i` is present; and
//! * **array**: the colors in strictly ascending order.
//!
//! [`ColorSet`] is the owned, mutable value used during construction and as
//! scratch space for intersections in a query loop. [`ColorSetView`] is a
//! non-owning, read-only window into one of the frozen concatenations of
//! [`ColorSetStorage`](crate::storage::ColorSetStorage). An owned set can be
//! built from a view with [`ColorSet::from_view`].
//!
//! The intersection kernels mutate the owned set in place and never shrink
//! the backing allocation, so repeated intersections in a query loop do not
//! reallocate.

use crate::utils;

use simple_sds::bit_vector::BitVector;
use simple_sds::int_vector::IntVector;
use simple_sds::ops::{Access, BitVec, Vector};
use simple_sds::raw_vector::{AccessRaw, PushRaw, RawVector};


//-----------------------------------------------------------------------------

/// Returns `true` if the sorted, distinct color list is cheaper to store as
/// an array than as a bitmap.
///
/// The cutoff is information-theoretic: an array costs
/// `|S| * ⌈log₂(max + 1)⌉` bits, a bitmap costs `max + 1` bits.
pub(crate) fn array_is_smaller(colors: &[u64]) -> bool {
    match colors.last() {
        None => true,
        Some(&max) => colors.len() * utils::bit_width(max) < (max as usize) + 1,
    }
}

// Builds a bitmap of length `max + 1` from a sorted, distinct color list.
fn bitmap_from_sorted(colors: &[u64]) -> RawVector {
    let universe = match colors.last() {
        None => 0,
        Some(&max) => max as usize + 1,
    };
    let mut bits = RawVector::with_capacity(universe);
    let mut iter = colors.iter().peekable();
    for i in 0..(universe as u64) {
        let present = iter.peek() == Some(&&i);
        if present {
            iter.next();
        }
        bits.push_bit(present);
    }
    bits
}

//-----------------------------------------------------------------------------

/// An owned, mutable color set.
///
/// Construction and the mutating set operations maintain the invariants that
/// the array representation is strictly sorted and distinct and that a
/// bitmap covers exactly the range `0..len`.
#[derive(Clone, Debug)]
pub enum ColorSet {
    /// Dense representation: bit `i` of `bits[0..len)` is set iff color `i`
    /// is present. The allocation may be longer than `len`.
    Bitmap {
        /// Backing bits.
        bits: RawVector,
        /// Logical length in bits.
        len: usize,
    },
    /// Sparse representation: the colors in strictly ascending order.
    Array {
        /// The colors.
        colors: Vec<u64>,
    },
}

impl ColorSet {
    /// Creates an empty color set.
    pub fn new() -> Self {
        ColorSet::Array { colors: Vec::new() }
    }

    /// Creates a color set from a sorted, distinct color list, choosing the
    /// cheaper representation.
    ///
    /// The behavior is unspecified if the list is not sorted or contains
    /// duplicates; callers are responsible for establishing that invariant.
    pub fn from_sorted(colors: &[u64]) -> Self {
        if array_is_smaller(colors) {
            ColorSet::Array { colors: colors.to_vec() }
        } else {
            let bits = bitmap_from_sorted(colors);
            let len = bits.len();
            ColorSet::Bitmap { bits, len }
        }
    }

    /// Creates an owned copy of a view, keeping the view's representation.
    pub fn from_view(view: &ColorSetView<'_>) -> Self {
        match *view {
            ColorSetView::Bitmap { bits, start, len } => {
                let mut copy = RawVector::with_capacity(len);
                for i in 0..len {
                    copy.push_bit(bits.get(start + i));
                }
                ColorSet::Bitmap { bits: copy, len }
            }
            ColorSetView::Array { values, start, len } => {
                let mut colors = Vec::with_capacity(len);
                for i in 0..len {
                    colors.push(values.get(start + i));
                }
                ColorSet::Array { colors }
            }
        }
    }

    /// Returns `true` if the set uses the bitmap representation.
    pub fn is_bitmap(&self) -> bool {
        matches!(self, ColorSet::Bitmap { .. })
    }

    /// Returns `true` if the set is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Raw length: number of bits for a bitmap, number of elements for an
    /// array.
    pub fn len(&self) -> usize {
        match self {
            ColorSet::Bitmap { len, .. } => *len,
            ColorSet::Array { colors } => colors.len(),
        }
    }

    /// Number of colors in the set.
    ///
    /// Takes O(len) time for a bitmap and O(1) time for an array.
    pub fn size(&self) -> usize {
        match self {
            ColorSet::Bitmap { bits, len } => (0..*len).filter(|&i| bits.bit(i)).count(),
            ColorSet::Array { colors } => colors.len(),
        }
    }

    /// Size of the payload in bits.
    pub fn size_in_bits(&self) -> usize {
        match self {
            ColorSet::Bitmap { len, .. } => *len,
            ColorSet::Array { colors } => {
                colors.len() * utils::int_width(colors.last().copied().unwrap_or(0))
            }
        }
    }

    /// Returns `true` if the set contains the color.
    ///
    /// O(1) for a bitmap, a linear scan for an array. Membership-heavy
    /// workloads should go through views of the frozen storage.
    pub fn contains(&self, color: u64) -> bool {
        match self {
            ColorSet::Bitmap { bits, len } => {
                (color as usize) < *len && bits.bit(color as usize)
            }
            ColorSet::Array { colors } => colors.iter().any(|&c| c == color),
        }
    }

    /// Returns the colors as a sorted vector.
    pub fn as_sorted_vector(&self) -> Vec<u64> {
        match self {
            ColorSet::Bitmap { bits, len } => {
                (0..*len).filter(|&i| bits.bit(i)).map(|i| i as u64).collect()
            }
            ColorSet::Array { colors } => colors.clone(),
        }
    }

    /// Replaces the set with its intersection with `other` and returns the
    /// new raw length.
    ///
    /// The operation works in place and never shrinks the backing
    /// allocation. Intersecting a bitmap with an array produces a subset of
    /// the array, so the result switches to the array representation.
    pub fn intersect_with(&mut self, other: &ColorSetView<'_>) -> usize {
        let current = std::mem::take(self);
        *self = match (current, other) {
            (ColorSet::Bitmap { mut bits, len }, ColorSetView::Bitmap { bits: other_bits, start, len: other_len }) => {
                let new_len = bitmap_vs_bitmap(&mut bits, len, other_bits, *start, *other_len);
                ColorSet::Bitmap { bits, len: new_len }
            }
            (ColorSet::Array { mut colors }, ColorSetView::Bitmap { bits, start, len }) => {
                array_vs_bitmap(&mut colors, bits, *start, *len);
                ColorSet::Array { colors }
            }
            (ColorSet::Bitmap { bits, len }, ColorSetView::Array { values, start, len: other_len }) => {
                // The result is a subset of the array operand.
                let mut colors = Vec::with_capacity(*other_len);
                for i in 0..*other_len {
                    let color = values.get(start + i);
                    if (color as usize) < len && bits.bit(color as usize) {
                        colors.push(color);
                    }
                }
                ColorSet::Array { colors }
            }
            (ColorSet::Array { mut colors }, ColorSetView::Array { values, start, len }) => {
                array_vs_array(&mut colors, values, *start, *len);
                ColorSet::Array { colors }
            }
        };
        self.len()
    }

    /// Replaces the set with its union with `other` and returns the new raw
    /// length.
    ///
    /// The union materializes both operands, merges them, and chooses the
    /// representation of the result from scratch.
    pub fn union_with(&mut self, other: &ColorSetView<'_>) -> usize {
        let left = self.as_sorted_vector();
        let right = other.as_sorted_vector();
        let merged = union_buffers(&left, &right);
        *self = ColorSet::from_sorted(&merged);
        self.len()
    }
}

impl Default for ColorSet {
    fn default() -> Self {
        Self::new()
    }
}

//-----------------------------------------------------------------------------

// Intersection kernels. Each writes the result into the left operand without
// shrinking its allocation and returns the new raw length.

// Bitmap vs bitmap: bitwise AND; the result covers the shorter range.
fn bitmap_vs_bitmap(
    bits: &mut RawVector, len: usize,
    other: &BitVector, start: usize, other_len: usize,
) -> usize {
    let new_len = len.min(other_len);
    for i in 0..new_len {
        let value = bits.bit(i) && other.get(start + i);
        bits.set_bit(i, value);
    }
    new_len
}

// Array vs bitmap: retain array elements that are set in the bitmap.
fn array_vs_bitmap(colors: &mut Vec<u64>, bits: &BitVector, start: usize, len: usize) {
    let mut tail = 0;
    for i in 0..colors.len() {
        let color = colors[i];
        if (color as usize) < len && bits.get(start + color as usize) {
            colors[tail] = color;
            tail += 1;
        }
    }
    colors.truncate(tail);
}

// Array vs array: linear merge of two sorted, distinct sequences.
fn array_vs_array(colors: &mut Vec<u64>, values: &IntVector, start: usize, len: usize) {
    let mut tail = 0;
    let mut j = 0;
    for i in 0..colors.len() {
        let color = colors[i];
        while j < len && values.get(start + j) < color {
            j += 1;
        }
        if j < len && values.get(start + j) == color {
            colors[tail] = color;
            tail += 1;
            j += 1;
        }
    }
    colors.truncate(tail);
}

// Merges two sorted, distinct sequences into their sorted, distinct union.
fn union_buffers(left: &[u64], right: &[u64]) -> Vec<u64> {
    let mut result = Vec::with_capacity(left.len() + right.len());
    let mut i = 0;
    let mut j = 0;
    while i < left.len() || j < right.len() {
        if j >= right.len() || (i < left.len() && left[i] < right[j]) {
            result.push(left[i]);
            i += 1;
        } else if i >= left.len() || right[j] < left[i] {
            result.push(right[j]);
            j += 1;
        } else {
            result.push(left[i]);
            i += 1;
            j += 1;
        }
    }
    result
}

//-----------------------------------------------------------------------------

/// A non-owning, read-only view of a color set within a frozen
/// concatenation.
///
/// A view stores a reference to the concatenation, a start offset, and a
/// raw length (bits for a bitmap, elements for an array). Views are cheap
/// to copy and valid for as long as the backing storage is borrowed.
#[derive(Clone, Copy, Debug)]
pub enum ColorSetView<'a> {
    /// A window of the bitmap concatenation.
    Bitmap {
        /// The bitmap concatenation.
        bits: &'a BitVector,
        /// First bit of the set.
        start: usize,
        /// Number of bits.
        len: usize,
    },
    /// A window of the array concatenation.
    Array {
        /// The array concatenation.
        values: &'a IntVector,
        /// First element of the set.
        start: usize,
        /// Number of elements.
        len: usize,
    },
}

impl<'a> ColorSetView<'a> {
    /// Returns `true` if the view is of the bitmap representation.
    pub fn is_bitmap(&self) -> bool {
        matches!(self, ColorSetView::Bitmap { .. })
    }

    /// Returns `true` if the set is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Raw length: number of bits for a bitmap, number of elements for an
    /// array.
    pub fn len(&self) -> usize {
        match self {
            ColorSetView::Bitmap { len, .. } => *len,
            ColorSetView::Array { len, .. } => *len,
        }
    }

    /// Number of colors in the set.
    pub fn size(&self) -> usize {
        match *self {
            ColorSetView::Bitmap { bits, start, len } => {
                (0..len).filter(|&i| bits.get(start + i)).count()
            }
            ColorSetView::Array { len, .. } => len,
        }
    }

    /// Size of the payload in bits.
    pub fn size_in_bits(&self) -> usize {
        match *self {
            ColorSetView::Bitmap { len, .. } => len,
            ColorSetView::Array { values, len, .. } => len * values.width(),
        }
    }

    /// Returns `true` if the set contains the color.
    pub fn contains(&self, color: u64) -> bool {
        match *self {
            ColorSetView::Bitmap { bits, start, len } => {
                (color as usize) < len && bits.get(start + color as usize)
            }
            ColorSetView::Array { values, start, len } => {
                (0..len).any(|i| values.get(start + i) == color)
            }
        }
    }

    /// Returns the colors as a sorted vector.
    pub fn as_sorted_vector(&self) -> Vec<u64> {
        match *self {
            ColorSetView::Bitmap { bits, start, len } => (0..len)
                .filter(|&i| bits.get(start + i))
                .map(|i| i as u64)
                .collect(),
            ColorSetView::Array { values, start, len } => {
                (0..len).map(|i| values.get(start + i)).collect()
            }
        }
    }
}

//-----------------------------------------------------------------------------
