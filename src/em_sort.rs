//! External memory sorting of fixed-width record pairs.
//!
//! The construction pipeline sorts streams of `(node, color)` and
//! `(node, color set id)` pairs that do not fit in memory. The sorter
//! follows the usual multiway merge sort structure: the caller writes
//! sorted in-memory runs to zstd-compressed temporary files, worker threads
//! merge batches of files until few enough remain, and a final k-way merge
//! is consumed as an iterator.
//!
//! Temporary files delete themselves when dropped, so both successful and
//! failed builds clean up after themselves.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, VecDeque};
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use simple_sds::serialize;

use crate::error::{ColoringError, Result};

#[cfg(test)]
mod tests;

//-----------------------------------------------------------------------------

/// A sortable `(key, value)` record.
///
/// Records sort by key first and value second, so sorting `(node, color)`
/// pairs groups the colors of each node and keeps them sorted within the
/// group.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) struct PairRecord {
    pub(crate) key: u64,
    pub(crate) value: u64,
}

impl PairRecord {
    fn serialize<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_all(&self.key.to_le_bytes())?;
        writer.write_all(&self.value.to_le_bytes())?;
        Ok(())
    }

    fn deserialize<R: Read>(reader: &mut R) -> io::Result<Self> {
        let mut key_bytes = [0u8; 8];
        reader.read_exact(&mut key_bytes)?;
        let mut value_bytes = [0u8; 8];
        reader.read_exact(&mut value_bytes)?;
        Ok(PairRecord {
            key: u64::from_le_bytes(key_bytes),
            value: u64::from_le_bytes(value_bytes),
        })
    }
}

//-----------------------------------------------------------------------------

// Distinguishes temp files of concurrent builds in a shared directory.
static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// A zstd-compressed temporary file holding sorted records.
///
/// The file is removed from the file system when the last [`Arc`] to it is
/// dropped.
#[derive(Debug)]
pub(crate) struct TempFile {
    path: PathBuf,
    records: usize,
}

impl TempFile {
    /// Chooses a fresh file name, in `temp_dir` if given and in the process
    /// temp directory otherwise. No file is created yet.
    pub(crate) fn create(temp_dir: Option<&Path>, tag: &str) -> TempFile {
        let path = match temp_dir {
            Some(dir) => {
                let counter = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
                dir.join(format!("{}-{}-{}", tag, process::id(), counter))
            }
            None => serialize::temp_file_name(tag),
        };
        TempFile { path, records: 0 }
    }

    /// Opens the file for writing.
    fn writer(&self) -> io::Result<BufWriter<zstd::Encoder<'static, File>>> {
        let file = File::create(&self.path)?;
        let encoder = zstd::Encoder::new(file, 3)?;
        Ok(BufWriter::new(encoder))
    }

    /// Opens the file for reading.
    fn reader(&self) -> io::Result<zstd::Decoder<'static, BufReader<File>>> {
        let file = File::open(&self.path)?;
        zstd::Decoder::new(file)
    }
}

impl Drop for TempFile {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

//-----------------------------------------------------------------------------

/// Sorts the records and writes them to a new temporary file.
pub(crate) fn write_run(
    mut records: Vec<PairRecord>,
    temp_dir: Option<&Path>,
    tag: &str,
) -> Result<Arc<TempFile>> {
    records.sort_unstable();

    let mut temp = TempFile::create(temp_dir, tag);
    temp.records = records.len();
    let mut writer = temp
        .writer()
        .map_err(|e| ColoringError::temp_io("Cannot create a temporary file", e))?;
    for record in records {
        record
            .serialize(&mut writer)
            .map_err(|e| ColoringError::temp_io("Cannot write to a temporary file", e))?;
    }
    finish_writer(writer)?;
    Ok(Arc::new(temp))
}

// Flushes the zstd stream behind a buffered writer.
fn finish_writer(writer: BufWriter<zstd::Encoder<'static, File>>) -> Result<()> {
    let encoder = writer
        .into_inner()
        .map_err(|e| ColoringError::ResourceExhaustion(format!("Cannot finish a temporary file: {}", e)))?;
    encoder
        .finish()
        .map_err(|e| ColoringError::temp_io("Cannot finish a temporary file", e))?;
    Ok(())
}

//-----------------------------------------------------------------------------

// Reads up to `buffer_size` records into the buffer of the given source.
fn fill_buffer<R: Read>(
    reader: &mut R,
    buffer: &mut VecDeque<PairRecord>,
    remaining: &mut usize,
    buffer_size: usize,
) -> io::Result<()> {
    let count = (*remaining).min(buffer_size);
    for _ in 0..count {
        buffer.push_back(PairRecord::deserialize(reader)?);
    }
    *remaining -= count;
    Ok(())
}

/// Merges the input files into a new temporary file.
fn merge_files(
    inputs: Vec<Arc<TempFile>>,
    buffer_size: usize,
    temp_dir: Option<&Path>,
    tag: &str,
) -> Result<Arc<TempFile>> {
    let mut output = TempFile::create(temp_dir, tag);
    let mut writer = output
        .writer()
        .map_err(|e| ColoringError::temp_io("Cannot create a temporary file", e))?;

    let mut merge = MergeIter::new(&inputs, buffer_size)?;
    for record in &mut merge {
        let record = record?;
        record
            .serialize(&mut writer)
            .map_err(|e| ColoringError::temp_io("Cannot write to a temporary file", e))?;
        output.records += 1;
    }
    finish_writer(writer)?;
    Ok(Arc::new(output))
}

/// Merges batches of `files_per_merge` files on `threads` worker threads
/// until at most `files_per_merge` files remain.
pub(crate) fn merge_rounds(
    mut files: Vec<Arc<TempFile>>,
    files_per_merge: usize,
    buffer_size: usize,
    threads: usize,
    temp_dir: Option<&Path>,
    tag: &str,
) -> Result<Vec<Arc<TempFile>>> {
    let mut round = 0;
    while files.len() > files_per_merge {
        files = merge_round(files, round, files_per_merge, buffer_size, threads, temp_dir, tag)?;
        round += 1;
    }
    Ok(files)
}

// One round of merges over worker threads.
fn merge_round(
    inputs: Vec<Arc<TempFile>>,
    round: usize,
    files_per_merge: usize,
    buffer_size: usize,
    threads: usize,
    temp_dir: Option<&Path>,
    tag: &str,
) -> Result<Vec<Arc<TempFile>>> {
    log::debug!("Merge round {}: {} files", round, inputs.len());

    let mut workers: Vec<Option<JoinHandle<Result<Arc<TempFile>>>>> = Vec::with_capacity(threads);
    for _ in 0..threads {
        workers.push(None);
    }
    let mut outputs: Vec<Arc<TempFile>> = Vec::new();
    let mut first_error: Option<ColoringError> = None;

    let mut join = |worker: Option<JoinHandle<Result<Arc<TempFile>>>>,
                    outputs: &mut Vec<Arc<TempFile>>,
                    first_error: &mut Option<ColoringError>| {
        if let Some(worker) = worker {
            match worker.join() {
                Ok(Ok(merged)) => outputs.push(merged),
                Ok(Err(e)) => {
                    if first_error.is_none() {
                        *first_error = Some(e);
                    }
                }
                Err(_) => {
                    if first_error.is_none() {
                        *first_error = Some(ColoringError::ResourceExhaustion(String::from(
                            "A merge thread panicked",
                        )));
                    }
                }
            }
        }
    };

    let mut offset = 0;
    let mut batch = 0;
    while offset + 1 < inputs.len() && first_error.is_none() {
        let end = (offset + files_per_merge).min(inputs.len());
        let thread = batch % threads;
        if workers[thread].is_some() {
            join(workers[thread].take(), &mut outputs, &mut first_error);
        }
        let batch_files = inputs[offset..end].to_vec();
        let dir = temp_dir.map(Path::to_path_buf);
        let tag = tag.to_string();
        workers[thread] = Some(std::thread::spawn(move || {
            merge_files(batch_files, buffer_size, dir.as_deref(), &tag)
        }));
        offset = end;
        batch += 1;
    }

    for worker in workers {
        join(worker, &mut outputs, &mut first_error);
    }
    if let Some(e) = first_error {
        return Err(e);
    }
    if offset + 1 == inputs.len() {
        // A single leftover file goes to the next round as-is.
        outputs.push(inputs[offset].clone());
    }

    log::debug!("Merge round {} finished with {} files", round, outputs.len());
    Ok(outputs)
}

//-----------------------------------------------------------------------------

/// A streaming k-way merge over sorted temporary files.
///
/// Yields records in non-decreasing order. Duplicates are preserved.
pub(crate) struct MergeIter {
    readers: Vec<zstd::Decoder<'static, BufReader<File>>>,
    buffers: Vec<VecDeque<PairRecord>>,
    remaining: Vec<usize>,
    heap: BinaryHeap<Reverse<(PairRecord, usize)>>,
    buffer_size: usize,
    failed: bool,
    // Keeps the backing files alive (and on disk) while iterating.
    inputs: Vec<Arc<TempFile>>,
}

impl MergeIter {
    /// Opens the files and fills the initial buffers.
    pub(crate) fn new(inputs: &[Arc<TempFile>], buffer_size: usize) -> Result<Self> {
        let mut readers = Vec::with_capacity(inputs.len());
        for input in inputs {
            let reader = input
                .reader()
                .map_err(|e| ColoringError::temp_io("Cannot open a temporary file", e))?;
            readers.push(reader);
        }
        let mut buffers: Vec<VecDeque<PairRecord>> = vec![VecDeque::new(); inputs.len()];
        let mut remaining: Vec<usize> = inputs.iter().map(|input| input.records).collect();

        let mut heap = BinaryHeap::new();
        for source in 0..readers.len() {
            fill_buffer(&mut readers[source], &mut buffers[source], &mut remaining[source], buffer_size)
                .map_err(|e| ColoringError::temp_io("Cannot read a temporary file", e))?;
            if let Some(record) = buffers[source].pop_front() {
                heap.push(Reverse((record, source)));
            }
        }

        Ok(MergeIter {
            readers,
            buffers,
            remaining,
            heap,
            buffer_size,
            failed: false,
            inputs: inputs.to_vec(),
        })
    }

    /// Total number of records in the merge.
    pub(crate) fn records(&self) -> usize {
        self.inputs.iter().map(|input| input.records).sum()
    }
}

impl Iterator for MergeIter {
    type Item = Result<PairRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let Reverse((record, source)) = self.heap.pop()?;

        if self.buffers[source].is_empty() && self.remaining[source] > 0 {
            if let Err(e) = fill_buffer(
                &mut self.readers[source],
                &mut self.buffers[source],
                &mut self.remaining[source],
                self.buffer_size,
            ) {
                self.failed = true;
                return Some(Err(ColoringError::temp_io("Cannot read a temporary file", e)));
            }
        }
        if let Some(next) = self.buffers[source].pop_front() {
            self.heap.push(Reverse((next, source)));
        }
        Some(Ok(record))
    }
}

//-----------------------------------------------------------------------------
