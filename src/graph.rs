//! The k-mer index the coloring is attached to.
//!
//! The coloring layer does not implement a succinct de Bruijn graph of its
//! own. It only needs a narrow surface from one: the number of nodes, the
//! four per-symbol edge indicator columns with rank support, the C array,
//! suffix group boundaries, the unique in-edge of a node, and k-mer lookup.
//! That surface is the [`KmerIndex`] trait, and any SBWT implementation can
//! provide it.
//!
//! [`MatrixIndex`] is an in-memory realization of the trait: a plain-matrix
//! SBWT over the padded k-spectrum of a set of sequences. It exists for
//! construction-time marking passes and for tests; production indexes are
//! expected to wrap their own succinct structures instead.

use std::cmp::Ordering;
use std::ops::Range;

use simple_sds::bit_vector::BitVector;
use simple_sds::ops::{BitVec, Rank};
use simple_sds::raw_vector::{AccessRaw, PushRaw, RawVector};

use crate::error::{ColoringError, Result};
use crate::utils::{self, SIGMA};


//-----------------------------------------------------------------------------

/// The surface the coloring layer requires from a succinct k-mer index.
///
/// Nodes are identified by their colexicographic ranks in `[0, num_nodes)`.
/// The node set includes the technical dummy nodes of the SBWT; dummies
/// never match [`KmerIndex::lookup`] and never carry colors.
pub trait KmerIndex: Sync {
    /// Number of nodes, including technical dummy nodes.
    fn num_nodes(&self) -> usize;

    /// Length of the k-mers in the index.
    fn k(&self) -> usize;

    /// Start offset of each symbol's block in the node order.
    fn c_array(&self) -> &[usize; SIGMA];

    /// Returns `true` if the node has an outgoing edge with the given
    /// symbol.
    fn out_bit(&self, node: usize, symbol: usize) -> bool;

    /// Number of nodes strictly before `node` that have an outgoing edge
    /// with the given symbol.
    fn out_rank(&self, node: usize, symbol: usize) -> usize;

    /// Returns `true` if the node is the first member of its suffix group
    /// (the maximal run of nodes sharing a (k-1)-suffix).
    fn is_suffix_group_start(&self, node: usize) -> bool;

    /// The source of the unique incoming edge of the node, or [`None`] for
    /// the root.
    fn predecessor(&self, node: usize) -> Option<usize>;

    /// Node identifier of the k-mer, or [`None`] if the k-mer is not in the
    /// index.
    fn lookup(&self, kmer: &[u8]) -> Option<usize>;

    /// Follows the first outgoing edge of the node: the symbol-`X`
    /// successor is `C[X] + out_rank(node, X)`.
    ///
    /// This is the full successor set only at the start of a suffix group;
    /// the coloring layer follows edges only from nodes with out-degree
    /// one, where the condition holds.
    fn successor(&self, node: usize) -> Option<usize> {
        for symbol in 0..SIGMA {
            if self.out_bit(node, symbol) {
                return Some(self.c_array()[symbol] + self.out_rank(node, symbol));
            }
        }
        None
    }

    /// Number of outgoing edges recorded at the node.
    fn out_degree(&self, node: usize) -> usize {
        (0..SIGMA).filter(|&symbol| self.out_bit(node, symbol)).count()
    }

    /// The suffix group containing the node, as a node range.
    fn suffix_group(&self, node: usize) -> Range<usize> {
        let mut start = node;
        while !self.is_suffix_group_start(start) {
            start -= 1;
        }
        let mut end = node + 1;
        while end < self.num_nodes() && !self.is_suffix_group_start(end) {
            end += 1;
        }
        start..end
    }
}

//-----------------------------------------------------------------------------

/// An in-memory plain-matrix SBWT over the padded k-spectrum of a set of
/// sequences.
///
/// The node set contains every k-mer of the sequences (maximal runs of
/// `ACGT` only) plus the dummy nodes of the SBWT: the `$`-padded proper
/// prefixes of k-mers without a predecessor, and the root `$^k`. Nodes are
/// in colexicographic order with `$` before `A`.
///
/// # Examples
///
/// ```
/// use sbwt_colors::{KmerIndex, MatrixIndex};
///
/// let sequences: Vec<&[u8]> = vec![b"TACGA"];
/// let index = MatrixIndex::build(4, &sequences).unwrap();
/// let node = index.lookup(b"TACG").unwrap();
/// let next = index.successor(node).unwrap();
/// assert_eq!(next, index.lookup(b"ACGA").unwrap());
/// assert_eq!(index.lookup(b"CCCC"), None);
/// ```
#[derive(Debug)]
pub struct MatrixIndex {
    k: usize,
    // Padded node labels in colexicographic order.
    labels: Vec<Vec<u8>>,
    // Per-symbol outgoing edge indicators with rank support.
    columns: Vec<BitVector>,
    c_array: [usize; SIGMA],
    group_starts: RawVector,
    // Unique incoming edge sources; the root has none.
    predecessors: Vec<Option<usize>>,
}

// Colexicographic comparison: compare the reversed strings.
fn colex_cmp(a: &[u8], b: &[u8]) -> Ordering {
    a.iter().rev().cmp(b.iter().rev())
}

impl MatrixIndex {
    /// Builds the index over all k-mers of the sequences.
    ///
    /// Characters outside `acgtACGT` split a sequence into separate runs.
    ///
    /// # Errors
    ///
    /// Returns [`ColoringError::UsageError`] if `k < 2`.
    pub fn build<S: AsRef<[u8]>>(k: usize, sequences: &[S]) -> Result<Self> {
        if k < 2 {
            return Err(ColoringError::UsageError(String::from(
                "MatrixIndex: k must be at least 2",
            )));
        }

        // The distinct k-mers in colexicographic order.
        let mut kmers: Vec<Vec<u8>> = Vec::new();
        for sequence in sequences {
            for run in sequence.as_ref().split(|&c| utils::char_to_symbol(c).is_none()) {
                for kmer in run.windows(k) {
                    kmers.push(kmer.iter().map(|&c| c.to_ascii_uppercase()).collect());
                }
            }
        }
        kmers.sort_unstable_by(|a, b| colex_cmp(a, b));
        kmers.dedup();

        // Dummy nodes: $-padded proper prefixes of the k-mers that have no
        // predecessor, plus the root.
        let suffixes: Vec<&[u8]> = {
            let mut result: Vec<&[u8]> = kmers.iter().map(|kmer| &kmer[1..]).collect();
            result.sort_unstable_by(|a, b| colex_cmp(a, b));
            result.dedup();
            result
        };
        let mut nodes: Vec<Vec<u8>> = vec![vec![b'$'; k]];
        for kmer in &kmers {
            let is_source = suffixes
                .binary_search_by(|suffix| colex_cmp(suffix, &kmer[..k - 1]))
                .is_err();
            if is_source {
                for prefix_len in 1..k {
                    let mut label = vec![b'$'; k - prefix_len];
                    label.extend_from_slice(&kmer[..prefix_len]);
                    nodes.push(label);
                }
            }
        }
        nodes.extend(kmers);
        nodes.sort_unstable_by(|a, b| colex_cmp(a, b));
        nodes.dedup();

        Self::from_labels(k, nodes)
    }

    // Builds the matrix representation from the sorted node labels.
    fn from_labels(k: usize, labels: Vec<Vec<u8>>) -> Result<Self> {
        let num_nodes = labels.len();

        // Suffix groups: maximal runs of nodes sharing a (k-1)-suffix.
        let mut group_starts = RawVector::with_capacity(num_nodes);
        let mut groups: Vec<Range<usize>> = Vec::new();
        for node in 0..num_nodes {
            let starts_group = node == 0 || labels[node - 1][1..] != labels[node][1..];
            group_starts.push_bit(starts_group);
            if starts_group {
                if let Some(previous) = groups.last_mut() {
                    previous.end = node;
                }
                groups.push(node..num_nodes);
            }
        }

        // Outgoing edges are recorded at the first member of each suffix
        // group: the SBWT keeps one incoming edge per node, from the
        // colexicographically smallest predecessor.
        let mut columns: Vec<RawVector> = (0..SIGMA)
            .map(|_| {
                let mut bits = RawVector::with_capacity(num_nodes);
                for _ in 0..num_nodes {
                    bits.push_bit(false);
                }
                bits
            })
            .collect();
        let mut target = vec![0u8; k];
        for group in &groups {
            let suffix = &labels[group.start][1..];
            target[..k - 1].copy_from_slice(suffix);
            for symbol in 0..SIGMA {
                target[k - 1] = utils::ALPHABET[symbol];
                if labels
                    .binary_search_by(|label| colex_cmp(label, &target))
                    .is_ok()
                {
                    columns[symbol].set_bit(group.start, true);
                }
            }
        }

        // The unique incoming edge of a node comes from the first member of
        // the suffix group matching its (k-1)-prefix. Only the root lacks
        // one.
        let mut predecessors: Vec<Option<usize>> = Vec::with_capacity(num_nodes);
        for (node, label) in labels.iter().enumerate() {
            if label[k - 1] == b'$' {
                predecessors.push(None); // the root
                continue;
            }
            let group = groups
                .binary_search_by(|candidate| colex_cmp(&labels[candidate.start][1..], &label[..k - 1]))
                .map_err(|_| {
                    ColoringError::StructuralInvariant(format!(
                        "MatrixIndex: node {} has no incoming edge",
                        node
                    ))
                })?;
            predecessors.push(Some(groups[group].start));
        }

        // C array: the first node of each symbol's block in the node order.
        // The root is the only node whose label ends with '$'.
        let mut counts = [0usize; SIGMA];
        for label in &labels {
            if let Some(symbol) = utils::char_to_symbol(label[k - 1]) {
                counts[symbol] += 1;
            }
        }
        let mut c_array = [0usize; SIGMA];
        let mut cumulative = 1;
        for symbol in 0..SIGMA {
            c_array[symbol] = cumulative;
            cumulative += counts[symbol];
        }

        let columns: Vec<BitVector> = columns
            .into_iter()
            .map(|bits| {
                let mut column = BitVector::from(bits);
                column.enable_rank();
                column
            })
            .collect();

        Ok(MatrixIndex { k, labels, columns, c_array, group_starts, predecessors })
    }

    /// Returns the padded label of a node.
    pub fn label(&self, node: usize) -> &[u8] {
        &self.labels[node]
    }

    /// Returns `true` if the node is a technical dummy node rather than a
    /// k-mer of the input.
    pub fn is_dummy(&self, node: usize) -> bool {
        self.labels[node][0] == b'$'
    }
}

impl KmerIndex for MatrixIndex {
    fn num_nodes(&self) -> usize {
        self.labels.len()
    }

    fn k(&self) -> usize {
        self.k
    }

    fn c_array(&self) -> &[usize; SIGMA] {
        &self.c_array
    }

    fn out_bit(&self, node: usize, symbol: usize) -> bool {
        self.columns[symbol].get(node)
    }

    fn out_rank(&self, node: usize, symbol: usize) -> usize {
        self.columns[symbol].rank(node)
    }

    fn is_suffix_group_start(&self, node: usize) -> bool {
        self.group_starts.bit(node)
    }

    fn predecessor(&self, node: usize) -> Option<usize> {
        self.predecessors[node]
    }

    fn lookup(&self, kmer: &[u8]) -> Option<usize> {
        if kmer.len() != self.k || !utils::is_dna(kmer) {
            return None;
        }
        let query: Vec<u8> = kmer.iter().map(|&c| c.to_ascii_uppercase()).collect();
        self.labels
            .binary_search_by(|label| colex_cmp(label, &query))
            .ok()
    }
}

//-----------------------------------------------------------------------------
