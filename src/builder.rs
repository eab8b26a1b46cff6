//! External memory construction of a [`Coloring`].
//!
//! The builder turns a stream of sequences with color labels into a
//! deduplicated color set storage and a sparse node mapping:
//!
//! 1. Worker threads look up the k-mers of each sequence and emit
//!    `(node, color)` pairs, sorted in bounded-memory runs written to
//!    zstd-compressed temporary files.
//! 2. The runs go through multiway merge rounds until a streaming k-way
//!    merge can group the pairs by node.
//! 3. Each node's sorted, distinct color list is kept only if the node is a
//!    core k-mer; identical lists are deduplicated through a content hash,
//!    with identifiers assigned in first-seen order.
//! 4. Along chains of non-core nodes, an anchor entry is added every
//!    [`BuildParameters::sampling_distance`] nodes so that resolving any
//!    node stays cheap.
//!
//! Core k-mers are the nodes whose color set cannot be inferred from their
//! successor: members of suffix groups of size at least two, nodes whose
//! out-degree is not one, the last k-mer of every input run, and the
//! in-neighbors of the first k-mer of every input run.
//!
//! The memory budget bounds the sizes of the in-memory sort runs; the only
//! unbounded intermediate state lives in the temporary files, which remove
//! themselves both on success and on failure.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;

use simple_sds::raw_vector::{AccessRaw, PushRaw, RawVector};

use crate::coloring::{ColorSetType, ColorSets, Coloring};
use crate::em_sort::{self, MergeIter, PairRecord, TempFile};
use crate::error::{ColoringError, Result};
use crate::graph::KmerIndex;
use crate::node_map::NodeToColorSetMap;
use crate::utils;

#[cfg(test)]
mod tests;

//-----------------------------------------------------------------------------

/// Parameters for coloring construction.
#[derive(Clone, Debug)]
pub struct BuildParameters {
    /// Memory budget in bytes for the external sort.
    pub memory_bytes: usize,
    /// Number of worker threads for pair emission and merging.
    pub threads: usize,
    /// Maximum number of consecutive nodes without a stored color set
    /// identifier along a unitig.
    pub sampling_distance: usize,
    /// Number of temporary files to merge at once.
    pub files_per_merge: usize,
    /// Number of records buffered per file during merging.
    pub merge_buffer_size: usize,
    /// Also color the reverse complement of every sequence, under the same
    /// color.
    pub reverse_complements: bool,
    /// Representation of the distinct color sets.
    pub color_set_type: ColorSetType,
    /// Directory for temporary files; the process temp directory if unset.
    pub temp_dir: Option<PathBuf>,
}

impl BuildParameters {
    /// Default for `memory_bytes`: 1 GiB.
    pub const DEFAULT_MEMORY_BYTES: usize = 1 << 30;
    /// Smallest accepted `memory_bytes`: 64 KiB.
    pub const MIN_MEMORY_BYTES: usize = 1 << 16;
    /// Default for `sampling_distance`.
    pub const DEFAULT_SAMPLING_DISTANCE: usize = 64;
    /// Default for `files_per_merge`.
    pub const DEFAULT_FILES_PER_MERGE: usize = 32;
    /// Default for `merge_buffer_size`.
    pub const DEFAULT_MERGE_BUFFER_SIZE: usize = 1000;

    /// Validates the parameters.
    ///
    /// # Errors
    ///
    /// Returns [`ColoringError::UsageError`] naming the offending
    /// parameter.
    pub fn validate(&self) -> Result<()> {
        if self.memory_bytes < Self::MIN_MEMORY_BYTES {
            return Err(ColoringError::UsageError(format!(
                "BuildParameters: memory budget {} is below the minimum {}",
                self.memory_bytes,
                Self::MIN_MEMORY_BYTES
            )));
        }
        if self.threads == 0 {
            return Err(ColoringError::UsageError(String::from(
                "BuildParameters: threads must be greater than 0",
            )));
        }
        if self.sampling_distance == 0 {
            return Err(ColoringError::UsageError(String::from(
                "BuildParameters: sampling distance must be greater than 0",
            )));
        }
        if self.files_per_merge < 2 {
            return Err(ColoringError::UsageError(String::from(
                "BuildParameters: files_per_merge must be at least 2",
            )));
        }
        if self.merge_buffer_size == 0 {
            return Err(ColoringError::UsageError(String::from(
                "BuildParameters: merge_buffer_size must be greater than 0",
            )));
        }
        Ok(())
    }

    // Records per in-memory sort run: half the budget, split over the
    // workers, 16 bytes per record.
    fn records_per_run(&self) -> usize {
        (self.memory_bytes / 2 / 16 / self.threads).max(1024)
    }
}

impl Default for BuildParameters {
    fn default() -> Self {
        BuildParameters {
            memory_bytes: Self::DEFAULT_MEMORY_BYTES,
            threads: 1,
            sampling_distance: Self::DEFAULT_SAMPLING_DISTANCE,
            files_per_merge: Self::DEFAULT_FILES_PER_MERGE,
            merge_buffer_size: Self::DEFAULT_MERGE_BUFFER_SIZE,
            reverse_complements: false,
            color_set_type: ColorSetType::SdslHybrid,
            temp_dir: None,
        }
    }
}

//-----------------------------------------------------------------------------

/// Builds [`Coloring`] structures from labeled sequences, from a unitig
/// database, or from an existing coloring.
pub struct ColoringBuilder {
    params: BuildParameters,
}

impl ColoringBuilder {
    /// Creates a builder with the given parameters.
    ///
    /// # Errors
    ///
    /// Returns [`ColoringError::UsageError`] if the parameters are invalid.
    pub fn new(params: BuildParameters) -> Result<Self> {
        params.validate()?;
        Ok(ColoringBuilder { params })
    }

    /// The parameters of the builder.
    pub fn parameters(&self) -> &BuildParameters {
        &self.params
    }

    /// Builds a coloring from sequences and their colors.
    ///
    /// The color stream must yield exactly one color per sequence; all
    /// k-mers of a sequence share its color. With
    /// [`BuildParameters::reverse_complements`], the reverse complement of
    /// every sequence is colored as well, so the color labels both strands.
    ///
    /// # Errors
    ///
    /// Returns [`ColoringError::InputMalformed`] if the color count does
    /// not match the sequence count or if a k-mer of the input is missing
    /// from the index, and [`ColoringError::ResourceExhaustion`] if the
    /// temporary files cannot be written.
    pub fn build_from_sequences<'a, G, S, C>(
        &self,
        index: &'a G,
        sequences: S,
        colors: C,
    ) -> Result<Coloring<'a, G>>
    where
        G: KmerIndex,
        S: IntoIterator<Item = Vec<u8>>,
        C: IntoIterator<Item = u64>,
    {
        log::info!(
            "Building a coloring over {} nodes with k = {}",
            index.num_nodes(),
            index.k()
        );

        // Pair the streams, failing on a length mismatch.
        let mut sequence_iter = sequences.into_iter();
        let mut color_iter = colors.into_iter();
        let mut mismatch = false;
        let paired = std::iter::from_fn(move || {
            if mismatch {
                return None;
            }
            match (sequence_iter.next(), color_iter.next()) {
                (Some(sequence), Some(color)) => Some(Ok((sequence, color))),
                (None, None) => None,
                (Some(_), None) => {
                    mismatch = true;
                    Some(Err(ColoringError::InputMalformed(String::from(
                        "More sequences than colors",
                    ))))
                }
                (None, Some(_)) => {
                    mismatch = true;
                    Some(Err(ColoringError::InputMalformed(String::from(
                        "More colors than sequences",
                    ))))
                }
            }
        });

        let emitted = self.emit_pairs(index, paired, self.params.reverse_complements)?;
        log::info!(
            "Emitted {} pairs in {} runs",
            emitted.pairs,
            emitted.files.len()
        );

        let marks = core_marks(index, &emitted.boundary_marks);
        let merge = self.merge_runs(emitted.files)?;

        // Group the sorted pairs by node, strip duplicate colors, and keep
        // the color sets of core k-mers.
        let mut distinct = DistinctSets::new(self.params.color_set_type);
        let mut collector = GroupCollector::new();
        let mut current: Option<u64> = None;
        let mut colors: Vec<u64> = Vec::new();
        for record in merge {
            let record = record?;
            match current {
                Some(node) if node == record.key => {
                    if colors.last() != Some(&record.value) {
                        colors.push(record.value);
                    }
                }
                Some(node) => {
                    collector.flush_colors(node as usize, &colors, &marks, &mut distinct)?;
                    colors.clear();
                    colors.push(record.value);
                    current = Some(record.key);
                }
                None => {
                    colors.push(record.value);
                    current = Some(record.key);
                }
            }
        }
        if let Some(node) = current {
            collector.flush_colors(node as usize, &colors, &marks, &mut distinct)?;
        }

        let largest_color = distinct.largest_color.max(emitted.largest_color);
        self.finish(index, distinct, collector, largest_color)
    }

    /// Builds a coloring from a unitig database.
    ///
    /// Each unitig comes with the sorted, distinct colors of the sequences
    /// it originated from; all k-mers of the unitig share that color set.
    ///
    /// # Errors
    ///
    /// As [`ColoringBuilder::build_from_sequences`]; additionally returns
    /// [`ColoringError::StructuralInvariant`] if two unitigs share a k-mer.
    pub fn build_from_unitigs<'a, G, U>(&self, index: &'a G, unitigs: U) -> Result<Coloring<'a, G>>
    where
        G: KmerIndex,
        U: IntoIterator<Item = (Vec<u8>, Vec<u64>)>,
    {
        log::info!(
            "Building a coloring from unitigs over {} nodes with k = {}",
            index.num_nodes(),
            index.k()
        );

        // Deduplicate the per-unitig color sets up front; the pair stream
        // then carries color set identifiers instead of colors.
        let mut distinct = DistinctSets::new(self.params.color_set_type);
        let mut failed = false;
        let mut unitig_iter = unitigs.into_iter();
        let paired = std::iter::from_fn(|| {
            if failed {
                return None;
            }
            let (unitig, mut unitig_colors) = unitig_iter.next()?;
            unitig_colors.sort_unstable();
            unitig_colors.dedup();
            match distinct.id_of(&unitig_colors) {
                Ok(id) => Some(Ok((unitig, id))),
                Err(e) => {
                    failed = true;
                    Some(Err(e))
                }
            }
        });

        let emitted = self.emit_pairs(index, paired, false)?;
        log::info!(
            "Emitted {} pairs in {} runs",
            emitted.pairs,
            emitted.files.len()
        );

        let marks = core_marks(index, &emitted.boundary_marks);
        let merge = self.merge_runs(emitted.files)?;

        let mut collector = GroupCollector::new();
        let mut current: Option<u64> = None;
        let mut id: Option<u64> = None;
        for record in merge {
            let record = record?;
            if current == Some(record.key) {
                if id != Some(record.value) {
                    return Err(ColoringError::StructuralInvariant(format!(
                        "ColoringBuilder: node {} is shared by unitigs with different color sets",
                        record.key
                    )));
                }
            } else {
                if let (Some(node), Some(set_id)) = (current, id) {
                    collector.flush_id(node as usize, set_id, &marks);
                }
                current = Some(record.key);
                id = Some(record.value);
            }
        }
        if let (Some(node), Some(set_id)) = (current, id) {
            collector.flush_id(node as usize, set_id, &marks);
        }

        let largest_color = distinct.largest_color;
        self.finish(index, distinct, collector, largest_color)
    }

    //-------------------------------------------------------------------------

    // Stage 1: look up k-mers and write sorted (node, value) runs on worker
    // threads.
    fn emit_pairs<G, P>(&self, index: &G, paired: P, reverse_complements: bool) -> Result<Emitted>
    where
        G: KmerIndex,
        P: IntoIterator<Item = Result<(Vec<u8>, u64)>>,
    {
        let records_per_run = self.params.records_per_run();
        let temp_dir = self.params.temp_dir.as_deref();
        let threads = self.params.threads;
        let k = index.k();

        thread::scope(|scope| {
            let mut workers: Vec<Option<thread::ScopedJoinHandle<'_, Result<RunOutput>>>> =
                Vec::with_capacity(threads);
            for _ in 0..threads {
                workers.push(None);
            }
            let mut result = Emitted::default();
            let mut first_error: Option<ColoringError> = None;

            let mut join = |worker: Option<thread::ScopedJoinHandle<'_, Result<RunOutput>>>,
                            result: &mut Emitted,
                            first_error: &mut Option<ColoringError>| {
                if let Some(worker) = worker {
                    match worker.join() {
                        Ok(Ok(output)) => {
                            result.pairs += output.pairs;
                            result.largest_color = result.largest_color.max(output.largest_color);
                            result.boundary_marks.extend(output.boundary_marks);
                            if let Some(file) = output.file {
                                result.files.push(file);
                            }
                        }
                        Ok(Err(e)) => {
                            if first_error.is_none() {
                                *first_error = Some(e);
                            }
                        }
                        Err(_) => {
                            if first_error.is_none() {
                                *first_error = Some(ColoringError::ResourceExhaustion(
                                    String::from("A pair emission thread panicked"),
                                ));
                            }
                        }
                    }
                }
            };

            let mut batch: Vec<(Vec<u8>, u64)> = Vec::new();
            let mut estimated = 0;
            let mut batch_index = 0;
            for item in paired {
                if first_error.is_some() {
                    break;
                }
                let (sequence, color) = match item {
                    Ok(pair) => pair,
                    Err(e) => {
                        first_error = Some(e);
                        break;
                    }
                };
                estimated += sequence.len().saturating_sub(k - 1)
                    * if reverse_complements { 2 } else { 1 };
                batch.push((sequence, color));
                if estimated >= records_per_run {
                    let thread = batch_index % threads;
                    join(workers[thread].take(), &mut result, &mut first_error);
                    let work = std::mem::take(&mut batch);
                    workers[thread] = Some(scope.spawn(move || {
                        emit_batch(index, work, reverse_complements, temp_dir)
                    }));
                    estimated = 0;
                    batch_index += 1;
                }
            }
            if !batch.is_empty() && first_error.is_none() {
                let thread = batch_index % threads;
                join(workers[thread].take(), &mut result, &mut first_error);
                workers[thread] = Some(
                    scope.spawn(move || emit_batch(index, batch, reverse_complements, temp_dir)),
                );
            }
            for worker in workers {
                join(worker, &mut result, &mut first_error);
            }

            match first_error {
                Some(e) => Err(e),
                None => Ok(result),
            }
        })
    }

    // Stage 2: merge the runs down and open the final streaming merge.
    fn merge_runs(&self, files: Vec<Arc<TempFile>>) -> Result<MergeIter> {
        let files = em_sort::merge_rounds(
            files,
            self.params.files_per_merge,
            self.params.merge_buffer_size,
            self.params.threads,
            self.params.temp_dir.as_deref(),
            "color-pairs",
        )?;
        let merge = MergeIter::new(&files, self.params.merge_buffer_size)?;
        log::debug!("Merging {} records from {} files", merge.records(), files.len());
        Ok(merge)
    }

    // Stages 4 and 6: anchor sampling and assembly.
    fn finish<'a, G: KmerIndex>(
        &self,
        index: &'a G,
        mut distinct: DistinctSets,
        collector: GroupCollector,
        largest_color: u64,
    ) -> Result<Coloring<'a, G>> {
        let anchors = sample_anchors(
            index,
            &collector.core_entries,
            &collector.non_core_observed,
            self.params.sampling_distance,
        )?;
        log::info!(
            "{} distinct color sets, {} core entries, {} anchors",
            distinct.sets.len(),
            collector.core_entries.len(),
            anchors.len()
        );

        let entries = merge_entries(collector.core_entries, anchors);
        let node_map = NodeToColorSetMap::from_entries(index.num_nodes(), &entries)?;
        distinct.sets.prepare_for_queries()?;

        let coloring = Coloring::from_parts(
            distinct.sets,
            node_map,
            index,
            largest_color,
            distinct.total_length,
        );
        let space: usize = coloring.space_breakdown().values().sum();
        log::info!("Coloring size: {}", utils::human_readable_size(space));
        Ok(coloring)
    }
}

//-----------------------------------------------------------------------------

// Output of one emission batch.
struct RunOutput {
    file: Option<Arc<TempFile>>,
    boundary_marks: Vec<usize>,
    largest_color: u64,
    pairs: usize,
}

// Combined output of the emission stage.
#[derive(Default)]
struct Emitted {
    files: Vec<Arc<TempFile>>,
    boundary_marks: Vec<usize>,
    largest_color: u64,
    pairs: usize,
}

// Emits the (node, value) pairs of a batch and writes them as a sorted run.
fn emit_batch<G: KmerIndex>(
    index: &G,
    batch: Vec<(Vec<u8>, u64)>,
    reverse_complements: bool,
    temp_dir: Option<&Path>,
) -> Result<RunOutput> {
    let mut records: Vec<PairRecord> = Vec::new();
    let mut boundary_marks: Vec<usize> = Vec::new();
    let mut largest_color = 0;

    for (sequence, color) in &batch {
        largest_color = largest_color.max(*color);
        emit_sequence(index, sequence, *color, &mut records, &mut boundary_marks)?;
        if reverse_complements {
            let complement = utils::reverse_complement(sequence);
            emit_sequence(index, &complement, *color, &mut records, &mut boundary_marks)?;
        }
    }

    let pairs = records.len();
    let file = if records.is_empty() {
        None
    } else {
        Some(em_sort::write_run(records, temp_dir, "color-pairs")?)
    };
    Ok(RunOutput { file, boundary_marks, largest_color, pairs })
}

// Emits the pairs of one sequence and records its boundary core k-mers: the
// last k-mer of every maximal DNA run and the in-neighbor of the first one.
fn emit_sequence<G: KmerIndex>(
    index: &G,
    sequence: &[u8],
    value: u64,
    records: &mut Vec<PairRecord>,
    boundary_marks: &mut Vec<usize>,
) -> Result<()> {
    let k = index.k();
    for run in sequence.split(|&c| utils::char_to_symbol(c).is_none()) {
        if run.len() < k {
            continue;
        }
        let mut last_node = 0;
        for (offset, kmer) in run.windows(k).enumerate() {
            let node = index.lookup(kmer).ok_or_else(|| {
                ColoringError::InputMalformed(format!(
                    "A k-mer of the input ({}) is not in the index",
                    String::from_utf8_lossy(kmer)
                ))
            })?;
            records.push(PairRecord { key: node as u64, value });
            if offset == 0 {
                if let Some(predecessor) = index.predecessor(node) {
                    boundary_marks.push(predecessor);
                }
            }
            last_node = node;
        }
        boundary_marks.push(last_node);
    }
    Ok(())
}

//-----------------------------------------------------------------------------

// A bit per node, all unset.
fn empty_bits(len: usize) -> RawVector {
    let mut bits = RawVector::with_capacity(len);
    for _ in 0..len {
        bits.push_bit(false);
    }
    bits
}

// Marks the core k-mers: suffix groups of size at least two, nodes whose
// out-degree is not one, and the boundary nodes reported by the emission
// stage.
fn core_marks<G: KmerIndex>(index: &G, boundary_marks: &[usize]) -> RawVector {
    let num_nodes = index.num_nodes();
    let mut marks = empty_bits(num_nodes);

    let mut start = 0;
    while start < num_nodes {
        let mut end = start + 1;
        while end < num_nodes && !index.is_suffix_group_start(end) {
            end += 1;
        }
        // The edges of a suffix group are recorded at its first member.
        let degree = index.out_degree(start);
        if end - start > 1 || degree != 1 {
            for node in start..end {
                marks.set_bit(node, true);
            }
        }
        start = end;
    }

    for &node in boundary_marks {
        marks.set_bit(node, true);
    }
    marks
}

//-----------------------------------------------------------------------------

// The distinct color sets seen so far, with first-seen identifiers.
struct DistinctSets {
    sets: ColorSets,
    ids: HashMap<Box<[u64]>, u64>,
    total_length: u64,
    largest_color: u64,
}

impl DistinctSets {
    fn new(set_type: ColorSetType) -> Self {
        DistinctSets {
            sets: ColorSets::new_of_type(set_type),
            ids: HashMap::new(),
            total_length: 0,
            largest_color: 0,
        }
    }

    // The identifier of the color set, inserting it if new.
    fn id_of(&mut self, colors: &[u64]) -> Result<u64> {
        if let Some(&id) = self.ids.get(colors) {
            return Ok(id);
        }
        let id = self.ids.len() as u64;
        self.sets.add_set(colors)?;
        self.total_length += colors.len() as u64;
        if let Some(&max) = colors.last() {
            self.largest_color = self.largest_color.max(max);
        }
        self.ids.insert(colors.to_vec().into_boxed_slice(), id);
        Ok(id)
    }
}

// Entries produced by the grouping pass, split into stored core entries and
// observed non-core nodes for the anchor pass.
struct GroupCollector {
    core_entries: Vec<(usize, u64)>,
    non_core_observed: Vec<usize>,
}

impl GroupCollector {
    fn new() -> Self {
        GroupCollector { core_entries: Vec::new(), non_core_observed: Vec::new() }
    }

    // Sequence mode: deduplicate the color list and store it if the node is
    // core.
    fn flush_colors(
        &mut self,
        node: usize,
        colors: &[u64],
        marks: &RawVector,
        distinct: &mut DistinctSets,
    ) -> Result<()> {
        if marks.bit(node) {
            let id = distinct.id_of(colors)?;
            self.core_entries.push((node, id));
        } else {
            self.non_core_observed.push(node);
        }
        Ok(())
    }

    // Unitig mode: the value is a color set identifier already.
    fn flush_id(&mut self, node: usize, id: u64, marks: &RawVector) {
        if marks.bit(node) {
            self.core_entries.push((node, id));
        } else {
            self.non_core_observed.push(node);
        }
    }
}

//-----------------------------------------------------------------------------

// Walks every observed non-core chain forward to a stored entry and adds an
// anchor entry every `distance` nodes, so that no walk at query time takes
// more than `distance` steps.
fn sample_anchors<G: KmerIndex>(
    index: &G,
    core_entries: &[(usize, u64)],
    non_core_observed: &[usize],
    distance: usize,
) -> Result<Vec<(usize, u64)>> {
    let num_nodes = index.num_nodes();
    let mut has_entry = empty_bits(num_nodes);
    for &(node, _) in core_entries {
        has_entry.set_bit(node, true);
    }
    let mut visited = empty_bits(num_nodes);
    let mut anchors: Vec<(usize, u64)> = Vec::new();
    let mut anchor_ids: HashMap<usize, u64> = HashMap::new();

    let entry_id = |node: usize, anchor_ids: &HashMap<usize, u64>| -> Result<u64> {
        if let Some(&id) = anchor_ids.get(&node) {
            return Ok(id);
        }
        let offset = core_entries
            .binary_search_by_key(&node, |&(entry_node, _)| entry_node)
            .map_err(|_| {
                ColoringError::StructuralInvariant(format!(
                    "ColoringBuilder: no color set id stored for node {}",
                    node
                ))
            })?;
        Ok(core_entries[offset].1)
    };

    for &start in non_core_observed {
        if has_entry.bit(start) || visited.bit(start) {
            continue;
        }

        // Collect the chain up to the first node with an entry.
        let mut path: Vec<usize> = Vec::new();
        let mut current = start;
        let target;
        loop {
            path.push(current);
            let next = index.successor(current).ok_or_else(|| {
                ColoringError::StructuralInvariant(format!(
                    "ColoringBuilder: dead end at non-core node {}",
                    current
                ))
            })?;
            if has_entry.bit(next) {
                target = next;
                break;
            }
            if path.len() > num_nodes {
                return Err(ColoringError::StructuralInvariant(format!(
                    "ColoringBuilder: the chain from node {} does not reach a core k-mer",
                    start
                )));
            }
            current = next;
        }
        let id = entry_id(target, &anchor_ids)?;

        // Walk the chain backwards, anchoring every `distance` nodes.
        for (steps_before, &node) in path.iter().rev().enumerate() {
            visited.set_bit(node, true);
            let to_entry = steps_before + 1;
            if to_entry % distance == 0 && !has_entry.bit(node) {
                has_entry.set_bit(node, true);
                anchor_ids.insert(node, id);
                anchors.push((node, id));
            }
        }
    }

    anchors.sort_unstable();
    Ok(anchors)
}

// Merges the sorted core entries with the sorted anchor entries.
fn merge_entries(
    core_entries: Vec<(usize, u64)>,
    anchors: Vec<(usize, u64)>,
) -> Vec<(usize, u64)> {
    let mut result = Vec::with_capacity(core_entries.len() + anchors.len());
    let mut left = core_entries.into_iter().peekable();
    let mut right = anchors.into_iter().peekable();
    loop {
        match (left.peek(), right.peek()) {
            (Some(&(a, _)), Some(&(b, _))) => {
                if a <= b {
                    result.push(left.next().unwrap_or((a, 0)));
                } else {
                    result.push(right.next().unwrap_or((b, 0)));
                }
            }
            (Some(_), None) => {
                result.extend(left.by_ref());
            }
            (None, Some(_)) => {
                result.extend(right.by_ref());
            }
            (None, None) => break,
        }
    }
    result
}

//-----------------------------------------------------------------------------

/// Rebuilds a coloring in another color set representation.
///
/// Every distinct set is decompressed to a sorted vector and re-inserted in
/// identifier order; the node mapping is reused as-is.
pub fn rebuild_as<'a, G: KmerIndex>(
    coloring: &Coloring<'a, G>,
    set_type: ColorSetType,
) -> Result<Coloring<'a, G>> {
    let mut sets = ColorSets::new_of_type(set_type);
    let mut total_length = 0;
    for set in coloring.distinct_color_sets() {
        let colors = set.as_sorted_vector();
        total_length += colors.len() as u64;
        sets.add_set(&colors)?;
    }
    sets.prepare_for_queries()?;
    Ok(Coloring::from_parts(
        sets,
        coloring.node_map().clone(),
        coloring.kmer_index(),
        coloring.largest_color(),
        total_length,
    ))
}

//-----------------------------------------------------------------------------
