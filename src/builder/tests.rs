use super::*;

use std::collections::{BTreeSet, HashMap as StdHashMap};

use crate::graph::MatrixIndex;

//-----------------------------------------------------------------------------
// Helpers
//-----------------------------------------------------------------------------

fn builder() -> ColoringBuilder {
    ColoringBuilder::new(BuildParameters::default()).unwrap()
}

fn builder_with(params: BuildParameters) -> ColoringBuilder {
    ColoringBuilder::new(params).unwrap()
}

fn build<'a>(
    index: &'a MatrixIndex,
    sequences: &[&[u8]],
    params: BuildParameters,
) -> Coloring<'a, MatrixIndex> {
    let colors: Vec<u64> = (0..sequences.len() as u64).collect();
    builder_with(params)
        .build_from_sequences(index, sequences.iter().map(|s| s.to_vec()), colors)
        .unwrap()
}

// Ground truth: for each distinct k-mer, the sorted list of sequences
// containing it. Non-DNA characters split sequences into runs.
fn expected_colors(
    sequences: &[&[u8]],
    k: usize,
    reverse_complements: bool,
) -> StdHashMap<Vec<u8>, Vec<u64>> {
    let mut result: StdHashMap<Vec<u8>, BTreeSet<u64>> = StdHashMap::new();
    let mut add = |sequence: &[u8], color: u64| {
        for run in sequence.split(|&c| crate::utils::char_to_symbol(c).is_none()) {
            for kmer in run.windows(k) {
                let kmer: Vec<u8> = kmer.iter().map(|&c| c.to_ascii_uppercase()).collect();
                result.entry(kmer).or_default().insert(color);
            }
        }
    };
    for (color, sequence) in sequences.iter().enumerate() {
        add(sequence, color as u64);
        if reverse_complements {
            add(&crate::utils::reverse_complement(sequence), color as u64);
        }
    }
    result
        .into_iter()
        .map(|(kmer, colors)| (kmer, colors.into_iter().collect()))
        .collect()
}

// Checks every k-mer of the input against the ground truth.
fn check_against_reference(
    coloring: &Coloring<'_, MatrixIndex>,
    sequences: &[&[u8]],
    reverse_complements: bool,
) {
    let index = coloring.kmer_index();
    let expected = expected_colors(sequences, index.k(), reverse_complements);
    assert!(!expected.is_empty(), "the reference should cover some k-mers");
    for (kmer, colors) in &expected {
        let node = index.lookup(kmer).unwrap_or_else(|| {
            panic!("k-mer {} missing from the index", String::from_utf8_lossy(kmer))
        });
        let found = coloring.color_set_as_vector(node).unwrap();
        assert_eq!(
            &found, colors,
            "wrong color set for k-mer {}",
            String::from_utf8_lossy(kmer)
        );
    }
}

// A deterministic DNA string.
fn generated_sequence(len: usize, seed: u64) -> Vec<u8> {
    let mut state = seed.wrapping_mul(0x9E3779B97F4A7C15).wrapping_add(12345);
    let mut sequence = Vec::with_capacity(len);
    for _ in 0..len {
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        sequence.push(crate::utils::ALPHABET[(state >> 33) as usize % 4]);
    }
    sequence
}

//-----------------------------------------------------------------------------
// The documented end-to-end scenario
//-----------------------------------------------------------------------------

#[test]
fn three_references() {
    let sequences: Vec<&[u8]> = vec![b"AAAAAAAA", b"CCCCCCCC", b"AAAAAAC"];
    let index = MatrixIndex::build(4, &sequences).unwrap();
    let coloring = build(&index, &sequences, BuildParameters::default());

    let aaaa = index.lookup(b"AAAA").unwrap();
    let cccc = index.lookup(b"CCCC").unwrap();
    let aaac = index.lookup(b"AAAC").unwrap();
    assert_eq!(coloring.color_set_as_vector(aaaa).unwrap(), vec![0, 2]);
    assert_eq!(coloring.color_set_as_vector(cccc).unwrap(), vec![1]);
    assert_eq!(coloring.color_set_as_vector(aaac).unwrap(), vec![2]);
    assert_eq!(coloring.largest_color(), 2);
    assert_eq!(coloring.number_of_distinct_color_sets(), 3);

    // Serialization preserves the answers.
    let mut buffer: Vec<u8> = Vec::new();
    coloring.serialize(&mut buffer).unwrap();
    let mut cursor = std::io::Cursor::new(&buffer[..]);
    let loaded = Coloring::load(&mut cursor, &index).unwrap();
    assert_eq!(loaded.color_set_as_vector(aaaa).unwrap(), vec![0, 2]);
    assert_eq!(loaded.color_set_as_vector(cccc).unwrap(), vec![1]);
    assert_eq!(loaded.color_set_as_vector(aaac).unwrap(), vec![2]);
}

//-----------------------------------------------------------------------------
// Correctness against a reference implementation
//-----------------------------------------------------------------------------

#[test]
fn matches_reference_on_overlapping_sequences() {
    let sequences: Vec<&[u8]> = vec![
        b"TACGACGTT",
        b"ACGACGAAC",
        b"GTTACGACG",
        b"ACGTNACGA",
    ];
    let index = MatrixIndex::build(4, &sequences).unwrap();
    let coloring = build(&index, &sequences, BuildParameters::default());
    check_against_reference(&coloring, &sequences, false);
}

#[test]
fn matches_reference_on_generated_sequences() {
    let data: Vec<Vec<u8>> = (0..5).map(|seed| generated_sequence(120, seed)).collect();
    let sequences: Vec<&[u8]> = data.iter().map(|s| s.as_slice()).collect();
    let index = MatrixIndex::build(5, &sequences).unwrap();
    let coloring = build(&index, &sequences, BuildParameters::default());
    check_against_reference(&coloring, &sequences, false);
}

// Small sort runs and several workers must not change the result.
#[test]
fn matches_reference_with_external_runs_and_threads() {
    let data: Vec<Vec<u8>> = (0..6).map(|seed| generated_sequence(400, 100 + seed)).collect();
    let sequences: Vec<&[u8]> = data.iter().map(|s| s.as_slice()).collect();
    let index = MatrixIndex::build(5, &sequences).unwrap();

    let params = BuildParameters {
        memory_bytes: BuildParameters::MIN_MEMORY_BYTES,
        threads: 3,
        files_per_merge: 2,
        ..BuildParameters::default()
    };
    let coloring = build(&index, &sequences, params);
    check_against_reference(&coloring, &sequences, false);
}

#[test]
fn reverse_complements_share_the_color() {
    let sequences: Vec<&[u8]> = vec![b"AACGT"];
    // Index both strands, color only the forward sequence stream.
    let both: Vec<Vec<u8>> = vec![
        b"AACGT".to_vec(),
        crate::utils::reverse_complement(b"AACGT"),
    ];
    let index = MatrixIndex::build(4, &both).unwrap();

    let params = BuildParameters { reverse_complements: true, ..BuildParameters::default() };
    let colors: Vec<u64> = vec![0];
    let coloring = builder_with(params)
        .build_from_sequences(&index, sequences.iter().map(|s| s.to_vec()), colors)
        .unwrap();
    check_against_reference(&coloring, &sequences, true);

    // A k-mer present only on the reverse strand carries the color.
    let acgt = index.lookup(b"ACGT").unwrap();
    let cgtt = index.lookup(b"CGTT").unwrap();
    assert_eq!(coloring.color_set_as_vector(acgt).unwrap(), vec![0]);
    assert_eq!(coloring.color_set_as_vector(cgtt).unwrap(), vec![0]);
}

//-----------------------------------------------------------------------------
// Sampling distance
//-----------------------------------------------------------------------------

// Number of forward steps needed to reach a stored entry.
fn steps_to_entry(coloring: &Coloring<'_, MatrixIndex>, node: usize) -> usize {
    let index = coloring.kmer_index();
    let mut current = node;
    let mut steps = 0;
    while !coloring.is_core(current) {
        current = index.successor(current).unwrap();
        steps += 1;
        assert!(steps <= index.num_nodes(), "walk from node {} does not terminate", node);
    }
    steps
}

#[test]
fn sampling_distance_bounds_walks() {
    let data = generated_sequence(600, 42);
    let sequences: Vec<&[u8]> = vec![data.as_slice()];
    let index = MatrixIndex::build(6, &sequences).unwrap();

    for distance in [1, 2, 5] {
        let params = BuildParameters {
            sampling_distance: distance,
            ..BuildParameters::default()
        };
        let coloring = build(&index, &sequences, params);
        let expected = expected_colors(&sequences, 6, false);
        for kmer in expected.keys() {
            let node = index.lookup(kmer).unwrap();
            assert!(
                steps_to_entry(&coloring, node) < distance,
                "walk from k-mer {} exceeds the sampling distance {}",
                String::from_utf8_lossy(kmer),
                distance
            );
        }
        check_against_reference(&coloring, &sequences, false);
    }
}

// A node without a stored entry shares its color set with its unique
// successor.
#[test]
fn color_sets_propagate_to_successors() {
    let data = generated_sequence(300, 9);
    let sequences: Vec<&[u8]> = vec![data.as_slice()];
    let index = MatrixIndex::build(5, &sequences).unwrap();
    let coloring = build(&index, &sequences, BuildParameters::default());

    let expected = expected_colors(&sequences, 5, false);
    for kmer in expected.keys() {
        let node = index.lookup(kmer).unwrap();
        if !coloring.is_core(node) {
            let successor = index.successor(node).unwrap();
            assert_eq!(
                coloring.color_set_as_vector(node).unwrap(),
                coloring.color_set_as_vector(successor).unwrap(),
                "k-mer {} disagrees with its successor",
                String::from_utf8_lossy(kmer)
            );
        }
    }
}

#[test]
fn distance_one_stores_every_observed_node() {
    let data = generated_sequence(200, 7);
    let sequences: Vec<&[u8]> = vec![data.as_slice()];
    let index = MatrixIndex::build(5, &sequences).unwrap();
    let params = BuildParameters { sampling_distance: 1, ..BuildParameters::default() };
    let coloring = build(&index, &sequences, params);

    let expected = expected_colors(&sequences, 5, false);
    for kmer in expected.keys() {
        let node = index.lookup(kmer).unwrap();
        assert!(coloring.is_core(node), "k-mer {} lacks an entry", String::from_utf8_lossy(kmer));
    }
}

//-----------------------------------------------------------------------------
// Alternate ingest
//-----------------------------------------------------------------------------

#[test]
fn unitig_ingest() {
    // Two node-disjoint unitigs with known color sets.
    let sequences: Vec<&[u8]> = vec![b"AAAAAAA", b"CCCCCCC"];
    let index = MatrixIndex::build(4, &sequences).unwrap();
    let unitigs: Vec<(Vec<u8>, Vec<u64>)> = vec![
        (b"AAAAAAA".to_vec(), vec![0, 2]),
        (b"CCCCCCC".to_vec(), vec![1]),
    ];
    let coloring = builder().build_from_unitigs(&index, unitigs).unwrap();

    let aaaa = index.lookup(b"AAAA").unwrap();
    let cccc = index.lookup(b"CCCC").unwrap();
    assert_eq!(coloring.color_set_as_vector(aaaa).unwrap(), vec![0, 2]);
    assert_eq!(coloring.color_set_as_vector(cccc).unwrap(), vec![1]);
    assert_eq!(coloring.largest_color(), 2);
    assert_eq!(coloring.number_of_distinct_color_sets(), 2);
}

#[test]
fn unitig_color_sets_are_deduplicated() {
    let sequences: Vec<&[u8]> = vec![b"AAAAAAA", b"CCCCCCC"];
    let index = MatrixIndex::build(4, &sequences).unwrap();
    let unitigs: Vec<(Vec<u8>, Vec<u64>)> = vec![
        (b"AAAAAAA".to_vec(), vec![3, 5]),
        (b"CCCCCCC".to_vec(), vec![5, 3, 5]),
    ];
    let coloring = builder().build_from_unitigs(&index, unitigs).unwrap();
    assert_eq!(coloring.number_of_distinct_color_sets(), 1);
    let cccc = index.lookup(b"CCCC").unwrap();
    assert_eq!(coloring.color_set_as_vector(cccc).unwrap(), vec![3, 5]);
}

#[test]
fn overlapping_unitigs_are_rejected() {
    let sequences: Vec<&[u8]> = vec![b"AAAAAAA"];
    let index = MatrixIndex::build(4, &sequences).unwrap();
    let unitigs: Vec<(Vec<u8>, Vec<u64>)> = vec![
        (b"AAAAA".to_vec(), vec![0]),
        (b"AAAAAA".to_vec(), vec![1]),
    ];
    assert!(matches!(
        builder().build_from_unitigs(&index, unitigs),
        Err(ColoringError::StructuralInvariant(_))
    ));
}

#[test]
fn rebuild_between_representations() {
    let sequences: Vec<&[u8]> = vec![b"TACGACGTT", b"ACGACGAAC", b"GTTACGACG"];
    let index = MatrixIndex::build(4, &sequences).unwrap();
    let coloring = build(&index, &sequences, BuildParameters::default());
    assert_eq!(coloring.color_set_type(), ColorSetType::SdslHybrid);

    for set_type in [ColorSetType::Roaring, ColorSetType::PlainBitmap, ColorSetType::SdslHybrid] {
        let rebuilt = rebuild_as(&coloring, set_type).unwrap();
        assert_eq!(rebuilt.color_set_type(), set_type);
        assert_eq!(
            rebuilt.number_of_distinct_color_sets(),
            coloring.number_of_distinct_color_sets()
        );
        assert_eq!(rebuilt.largest_color(), coloring.largest_color());
        check_against_reference(&rebuilt, &sequences, false);
    }
}

#[test]
fn build_directly_into_roaring() {
    let sequences: Vec<&[u8]> = vec![b"AAAAAAAA", b"CCCCCCCC", b"AAAAAAC"];
    let index = MatrixIndex::build(4, &sequences).unwrap();
    let params = BuildParameters {
        color_set_type: ColorSetType::Roaring,
        ..BuildParameters::default()
    };
    let coloring = build(&index, &sequences, params);
    assert_eq!(coloring.color_set_type(), ColorSetType::Roaring);
    check_against_reference(&coloring, &sequences, false);
}

//-----------------------------------------------------------------------------
// Failures
//-----------------------------------------------------------------------------

#[test]
fn color_count_mismatch() {
    let sequences: Vec<&[u8]> = vec![b"AAAAAAAA", b"CCCCCCCC"];
    let index = MatrixIndex::build(4, &sequences).unwrap();

    let result = builder().build_from_sequences(
        &index,
        sequences.iter().map(|s| s.to_vec()),
        vec![0u64],
    );
    assert!(matches!(result, Err(ColoringError::InputMalformed(_))));

    let result = builder().build_from_sequences(
        &index,
        sequences.iter().map(|s| s.to_vec()),
        vec![0u64, 1, 2],
    );
    assert!(matches!(result, Err(ColoringError::InputMalformed(_))));
}

#[test]
fn missing_kmer_is_rejected() {
    let sequences: Vec<&[u8]> = vec![b"AAAAAAAA"];
    let index = MatrixIndex::build(4, &sequences).unwrap();
    let result = builder().build_from_sequences(
        &index,
        vec![b"GGGGGG".to_vec()],
        vec![0u64],
    );
    assert!(matches!(result, Err(ColoringError::InputMalformed(_))));
}

#[test]
fn invalid_parameters() {
    let cases = [
        BuildParameters { memory_bytes: 1024, ..BuildParameters::default() },
        BuildParameters { threads: 0, ..BuildParameters::default() },
        BuildParameters { sampling_distance: 0, ..BuildParameters::default() },
        BuildParameters { files_per_merge: 1, ..BuildParameters::default() },
        BuildParameters { merge_buffer_size: 0, ..BuildParameters::default() },
    ];
    for params in cases {
        assert!(matches!(
            ColoringBuilder::new(params),
            Err(ColoringError::UsageError(_))
        ));
    }
}

#[test]
fn empty_input() {
    let sequences: Vec<&[u8]> = vec![b"AAAAAAAA"];
    let index = MatrixIndex::build(4, &sequences).unwrap();
    let coloring = builder()
        .build_from_sequences(&index, Vec::<Vec<u8>>::new(), Vec::<u64>::new())
        .unwrap();
    assert_eq!(coloring.number_of_distinct_color_sets(), 0);
    assert_eq!(coloring.largest_color(), 0);
    assert_eq!(coloring.node_map().num_entries(), 0);
}

#[test]
fn sequences_shorter_than_k() {
    let sequences: Vec<&[u8]> = vec![b"AAAAAAAA"];
    let index = MatrixIndex::build(4, &sequences).unwrap();
    let coloring = builder()
        .build_from_sequences(
            &index,
            vec![b"AAAAAAAA".to_vec(), b"AC".to_vec()],
            vec![0u64, 1],
        )
        .unwrap();
    let aaaa = index.lookup(b"AAAA").unwrap();
    assert_eq!(coloring.color_set_as_vector(aaaa).unwrap(), vec![0]);
    // The short sequence still consumes its color.
    assert_eq!(coloring.largest_color(), 1);
}

//-----------------------------------------------------------------------------
