//! A sparse mapping from k-mer nodes to color set identifiers.
//!
//! The mapping is defined exactly on the core k-mers of the graph. It is
//! backed by a presence bitvector with one bit per node and rank support,
//! plus a packed array holding a color set identifier for every present
//! node. A lookup is a rank query followed by an array access.

use std::collections::BTreeMap;
use std::io;

use simple_sds::bit_vector::BitVector;
use simple_sds::int_vector::IntVector;
use simple_sds::ops::{Access, BitVec, Push, Rank, Vector};
use simple_sds::raw_vector::{PushRaw, RawVector};
use simple_sds::serialize::Serialize;

use crate::error::{ColoringError, Result};
use crate::utils;


//-----------------------------------------------------------------------------

/// A read-only mapping from a subset of node identifiers to color set
/// identifiers.
///
/// # Examples
///
/// ```
/// use sbwt_colors::NodeToColorSetMap;
///
/// let map = NodeToColorSetMap::from_entries(8, &[(1, 0), (2, 1), (5, 0)]).unwrap();
/// assert_eq!(map.num_nodes(), 8);
/// assert_eq!(map.num_entries(), 3);
/// assert!(map.has(2));
/// assert_eq!(map.get(2).unwrap(), 1);
/// assert!(!map.has(3));
/// assert!(map.get(3).is_err());
/// ```
#[derive(Clone, Debug)]
pub struct NodeToColorSetMap {
    present: BitVector,
    values: IntVector,
}

impl NodeToColorSetMap {
    /// Builds the mapping from `(node, color set id)` entries.
    ///
    /// The entries must be sorted by node with distinct nodes in
    /// `[0, num_nodes)`.
    ///
    /// # Errors
    ///
    /// Returns [`ColoringError::UsageError`] if the entries are out of
    /// range, unsorted, or duplicated.
    pub fn from_entries(num_nodes: usize, entries: &[(usize, u64)]) -> Result<Self> {
        let mut bits = RawVector::with_capacity(num_nodes);
        let max_value = entries.iter().map(|&(_, value)| value).max().unwrap_or(0);
        let mut values = IntVector::with_capacity(entries.len(), utils::int_width(max_value))
            .map_err(|e| ColoringError::UsageError(format!("NodeToColorSetMap: {}", e)))?;

        let mut next = 0;
        for &(node, value) in entries {
            if node >= num_nodes {
                return Err(ColoringError::UsageError(format!(
                    "NodeToColorSetMap: node {} out of range ({} nodes)",
                    node, num_nodes
                )));
            }
            if node < next {
                return Err(ColoringError::UsageError(format!(
                    "NodeToColorSetMap: entries are not sorted by distinct nodes at node {}",
                    node
                )));
            }
            while next < node {
                bits.push_bit(false);
                next += 1;
            }
            bits.push_bit(true);
            next += 1;
            values.push(value);
        }
        while next < num_nodes {
            bits.push_bit(false);
            next += 1;
        }

        let mut present = BitVector::from(bits);
        present.enable_rank();
        Ok(NodeToColorSetMap { present, values })
    }

    /// Number of nodes the mapping is defined over.
    pub fn num_nodes(&self) -> usize {
        self.present.len()
    }

    /// Number of nodes with an entry.
    pub fn num_entries(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` if the node has an entry.
    ///
    /// Nodes outside `[0, num_nodes)` have no entries.
    pub fn has(&self, node: usize) -> bool {
        node < self.present.len() && self.present.get(node)
    }

    /// Returns the color set identifier stored for the node.
    ///
    /// # Errors
    ///
    /// Returns [`ColoringError::UsageError`] if the node has no entry.
    pub fn get(&self, node: usize) -> Result<u64> {
        if !self.has(node) {
            return Err(ColoringError::UsageError(format!(
                "NodeToColorSetMap: node {} has no color set id",
                node
            )));
        }
        Ok(self.values.get(self.present.rank(node)))
    }

    /// Checks that the presence bitvector and the value array agree.
    pub fn check_invariants(&self) -> Result<()> {
        if self.present.count_ones() != self.values.len() {
            return Err(ColoringError::StructuralInvariant(format!(
                "NodeToColorSetMap: {} present nodes with {} values",
                self.present.count_ones(),
                self.values.len()
            )));
        }
        Ok(())
    }

    /// Returns the number of bytes each component would take in the
    /// serialized archive.
    pub fn space_breakdown(&self) -> BTreeMap<String, usize> {
        let mut breakdown = BTreeMap::new();
        breakdown.insert(String::from("present"), self.present.size_in_bytes());
        breakdown.insert(String::from("values"), self.values.size_in_bytes());
        breakdown
    }
}

//-----------------------------------------------------------------------------

impl Serialize for NodeToColorSetMap {
    fn serialize_header<T: io::Write>(&self, _: &mut T) -> io::Result<()> {
        Ok(())
    }

    fn serialize_body<T: io::Write>(&self, writer: &mut T) -> io::Result<()> {
        self.present.serialize(writer)?;
        self.values.serialize(writer)?;
        Ok(())
    }

    fn load<T: io::Read>(reader: &mut T) -> io::Result<Self> {
        let mut present = BitVector::load(reader)?;
        present.enable_rank();
        let values = IntVector::load(reader)?;
        Ok(NodeToColorSetMap { present, values })
    }

    fn size_in_elements(&self) -> usize {
        self.present.size_in_elements() + self.values.size_in_elements()
    }
}

//-----------------------------------------------------------------------------
