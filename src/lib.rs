//! # sbwt-colors: the coloring layer of a colored de Bruijn graph index
//!
//! This crate stores, for every k-mer of a set of reference sequences, the
//! set of references ("colors") the k-mer appears in. It is the coloring
//! half of a colored succinct de Bruijn graph index: the underlying k-mer
//! index is an external collaborator behind the [`KmerIndex`] trait, and
//! this crate adds the compact storage of distinct color sets, a sparse
//! mapping from k-mer nodes to color sets, and the external memory
//! pipeline that builds both.
//!
//! ### Distinct color sets
//!
//! Millions of k-mers share a far smaller number of distinct color sets,
//! so the sets are deduplicated and stored by identifier. The reference
//! representation ([`ColorSetStorage`]) keeps every set in one of two
//! layouts, a bitmap or a sorted packed array, chosen per set by size, and
//! concatenates all payloads into two bit-packed buffers with rank support
//! for constant-time lookup. Roaring bitmaps and plain per-set bitmaps are
//! supported as alternative representations behind the same interface; an
//! archive records which representation it holds in its leading tag.
//!
//! ### Sparse node mapping
//!
//! Storing an identifier per node would dominate the index size. Instead,
//! identifiers are stored only for *core k-mers*: nodes whose color set
//! cannot be inferred from their successor. Every other node has out-degree
//! one and shares its color set with its successor, so a query follows
//! forward edges to the nearest stored entry. During construction, anchor
//! entries are added along long chains so that no query walks more than the
//! colorset sampling distance.
//!
//! ### Construction
//!
//! [`ColoringBuilder`] streams `(node, color)` pairs through a
//! bounded-memory external sort, groups them by node, deduplicates the
//! distinct sets through a content hash, and assembles the final
//! structures. Alternate ingest paths build from a unitig database or
//! rebuild an existing coloring in another representation.
//!
//! # Examples
//!
//! ```
//! use sbwt_colors::{BuildParameters, ColoringBuilder, KmerIndex, MatrixIndex};
//!
//! // Three tiny references; the k-mer index is built over the same data.
//! let references: Vec<&[u8]> = vec![b"AAAAAAAA", b"CCCCCCCC", b"AAAAAAC"];
//! let index = MatrixIndex::build(4, &references).unwrap();
//!
//! let builder = ColoringBuilder::new(BuildParameters::default()).unwrap();
//! let coloring = builder
//!     .build_from_sequences(
//!         &index,
//!         references.iter().map(|r| r.to_vec()),
//!         0..references.len() as u64,
//!     )
//!     .unwrap();
//!
//! // AAAA appears in references 0 and 2.
//! let node = index.lookup(b"AAAA").unwrap();
//! assert_eq!(coloring.color_set_as_vector(node).unwrap(), vec![0, 2]);
//! ```

pub mod builder;
pub mod color_set;
pub mod coloring;
mod em_sort;
pub mod error;
pub mod graph;
pub mod node_map;
pub mod storage;
pub mod utils;
pub mod variants;

pub use builder::{rebuild_as, BuildParameters, ColoringBuilder};
pub use color_set::{ColorSet, ColorSetView};
pub use coloring::{ColorSetBuffer, ColorSetRef, ColorSetType, ColorSets, Coloring};
pub use error::{ColoringError, Result};
pub use graph::{KmerIndex, MatrixIndex};
pub use node_map::NodeToColorSetMap;
pub use storage::ColorSetStorage;
pub use variants::{PlainColorSets, RoaringColorSets};
