use super::*;

//-----------------------------------------------------------------------------
// Helpers
//-----------------------------------------------------------------------------

// A deterministic pseudo-random record stream.
fn example_records(count: usize, seed: u64) -> Vec<PairRecord> {
    let mut state = seed.wrapping_mul(0x9E3779B97F4A7C15).wrapping_add(1);
    let mut records = Vec::with_capacity(count);
    for _ in 0..count {
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        let key = (state >> 33) % 997;
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        let value = (state >> 33) % 31;
        records.push(PairRecord { key, value });
    }
    records
}

// Splits records into runs, writes them, merges with the given parameters,
// and collects the output.
fn sort_via_files(
    records: &[PairRecord],
    run_size: usize,
    files_per_merge: usize,
    threads: usize,
) -> Vec<PairRecord> {
    let mut files = Vec::new();
    for run in records.chunks(run_size) {
        files.push(write_run(run.to_vec(), None, "em-sort-test").unwrap());
    }
    let files = merge_rounds(files, files_per_merge, 100, threads, None, "em-sort-test").unwrap();
    assert!(files.len() <= files_per_merge);

    let merge = MergeIter::new(&files, 100).unwrap();
    assert_eq!(merge.records(), records.len());
    merge.map(|record| record.unwrap()).collect()
}

fn assert_sorted_permutation(output: &[PairRecord], input: &[PairRecord]) {
    assert_eq!(output.len(), input.len(), "record count changed");
    for pair in output.windows(2) {
        assert!(pair[0] <= pair[1], "output is not sorted: {:?} before {:?}", pair[0], pair[1]);
    }
    let mut expected = input.to_vec();
    expected.sort_unstable();
    assert_eq!(output, &expected[..], "output is not a permutation of the input");
}

//-----------------------------------------------------------------------------

#[test]
fn record_round_trip() {
    let record = PairRecord { key: 0xDEADBEEF, value: 42 };
    let mut buffer: Vec<u8> = Vec::new();
    record.serialize(&mut buffer).unwrap();
    assert_eq!(buffer.len(), 16);
    let mut cursor = io::Cursor::new(buffer);
    assert_eq!(PairRecord::deserialize(&mut cursor).unwrap(), record);
}

#[test]
fn record_ordering() {
    let a = PairRecord { key: 1, value: 9 };
    let b = PairRecord { key: 2, value: 0 };
    let c = PairRecord { key: 2, value: 1 };
    assert!(a < b, "records should sort by key first");
    assert!(b < c, "ties should break on value");
}

#[test]
fn single_run() {
    let records = example_records(1000, 1);
    let output = sort_via_files(&records, 2000, 16, 1);
    assert_sorted_permutation(&output, &records);
}

// Multiple runs merged at once in the final merge.
#[test]
fn multi_run_single_round() {
    let records = example_records(5000, 2);
    let output = sort_via_files(&records, 500, 16, 1);
    assert_sorted_permutation(&output, &records);
}

// Small merge fan-in forces several merge rounds.
#[test]
fn multi_run_multi_round() {
    let records = example_records(5000, 3);
    let output = sort_via_files(&records, 250, 2, 1);
    assert_sorted_permutation(&output, &records);
}

#[test]
fn threaded_merge() {
    let records = example_records(8000, 4);
    let output = sort_via_files(&records, 250, 3, 4);
    assert_sorted_permutation(&output, &records);
}

// Duplicates must be preserved, not collapsed.
#[test]
fn preserves_duplicates() {
    let mut records = Vec::new();
    for _ in 0..100 {
        records.push(PairRecord { key: 7, value: 7 });
        records.push(PairRecord { key: 7, value: 8 });
    }
    let output = sort_via_files(&records, 16, 2, 2);
    assert_eq!(output.len(), 200);
    assert!(output[..100].iter().all(|r| r.value == 7));
    assert!(output[100..].iter().all(|r| r.value == 8));
}

#[test]
fn empty_input() {
    let merge = MergeIter::new(&[], 100).unwrap();
    assert_eq!(merge.records(), 0);
    assert_eq!(merge.count(), 0);
}

#[test]
fn temp_files_are_removed() {
    let path = {
        let file = write_run(example_records(100, 5), None, "em-sort-test").unwrap();
        file.path.clone()
    };
    assert!(!path.exists(), "temporary file should be removed on drop");
}

// A caller-supplied temp directory is honored.
#[test]
fn temp_dir_is_used() {
    let dir = std::env::temp_dir().join(format!("em-sort-test-dir-{}", process::id()));
    fs::create_dir_all(&dir).unwrap();

    let file = write_run(example_records(100, 6), Some(&dir), "run").unwrap();
    assert!(file.path.starts_with(&dir));
    let merge = MergeIter::new(&[file], 10).unwrap();
    assert_eq!(merge.count(), 100);

    let _ = fs::remove_dir_all(&dir);
}

//-----------------------------------------------------------------------------
