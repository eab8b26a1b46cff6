use super::*;

use crate::graph::MatrixIndex;
use crate::storage::ColorSetStorage;

//-----------------------------------------------------------------------------
// Helpers
//-----------------------------------------------------------------------------

fn example_sets() -> Vec<Vec<u64>> {
    vec![
        vec![0, 2],
        vec![1],
        (0..300).step_by(2).collect(),
        vec![7],
    ]
}

fn hybrid_sets(sets: &[Vec<u64>]) -> ColorSets {
    let mut storage = ColorSetStorage::new();
    for set in sets {
        storage.add_set(set).unwrap();
    }
    storage.prepare_for_queries().unwrap();
    ColorSets::Hybrid(storage)
}

fn sets_of_type(sets: &[Vec<u64>], set_type: ColorSetType) -> ColorSets {
    let mut result = ColorSets::new_of_type(set_type);
    for set in sets {
        result.add_set(set).unwrap();
    }
    result.prepare_for_queries().unwrap();
    result
}

// A single path TACG -> ACGA with a color set stored at the end.
fn path_index() -> MatrixIndex {
    let sequences: Vec<&[u8]> = vec![b"TACGA"];
    MatrixIndex::build(4, &sequences).unwrap()
}

fn path_coloring(index: &MatrixIndex) -> Coloring<'_, MatrixIndex> {
    let acga = index.lookup(b"ACGA").unwrap();
    let sets = hybrid_sets(&[vec![0]]);
    let node_map =
        crate::node_map::NodeToColorSetMap::from_entries(index.num_nodes(), &[(acga, 0)]).unwrap();
    Coloring::from_parts(sets, node_map, index, 0, 1)
}

//-----------------------------------------------------------------------------
// Tags
//-----------------------------------------------------------------------------

#[test]
fn tags_round_trip() {
    for set_type in [ColorSetType::SdslHybrid, ColorSetType::Roaring, ColorSetType::PlainBitmap] {
        assert_eq!(ColorSetType::from_tag(set_type.tag()), Some(set_type));
    }
    assert_eq!(ColorSetType::SdslHybrid.tag(), "sdsl-hybrid-v4");
    assert_eq!(ColorSetType::Roaring.tag(), "roaring-v0");
    assert_eq!(ColorSetType::PlainBitmap.tag(), "bitmagic-v0");
    assert_eq!(ColorSetType::from_tag("sdsl-hybrid-v5"), None);
    assert_eq!(ColorSetType::from_tag(""), None);
}

//-----------------------------------------------------------------------------
// The tagged union and references
//-----------------------------------------------------------------------------

#[test]
fn color_sets_across_representations() {
    let sets = example_sets();
    for set_type in [ColorSetType::SdslHybrid, ColorSetType::Roaring, ColorSetType::PlainBitmap] {
        let storage = sets_of_type(&sets, set_type);
        assert_eq!(storage.color_set_type(), set_type);
        assert_eq!(storage.len(), sets.len());
        for (id, set) in sets.iter().enumerate() {
            let set_ref = storage.get(id).unwrap();
            assert_eq!(set_ref.size(), set.len(), "{}: wrong size for set {}", set_type, id);
            assert_eq!(
                set_ref.as_sorted_vector(),
                *set,
                "{}: wrong contents for set {}",
                set_type, id
            );
            assert!(set_ref.contains(set[0]));
            assert!(!set_ref.contains(555));
        }
        assert!(storage.get(sets.len()).is_err());

        let collected: Vec<Vec<u64>> =
            storage.iter().map(|set_ref| set_ref.as_sorted_vector()).collect();
        assert_eq!(collected, sets, "{}: iterator disagrees", set_type);
    }
}

#[test]
fn buffer_intersection_within_representation() {
    let sets = vec![vec![1, 2, 3, 4, 5, 6], vec![2, 4, 6, 8]];
    for set_type in [ColorSetType::SdslHybrid, ColorSetType::Roaring, ColorSetType::PlainBitmap] {
        let storage = sets_of_type(&sets, set_type);
        let mut buffer = ColorSetBuffer::from_ref(&storage.get(0).unwrap());
        assert_eq!(buffer.size(), 6);
        buffer.intersect_with(&storage.get(1).unwrap());
        assert_eq!(buffer.as_sorted_vector(), vec![2, 4, 6], "{}: wrong intersection", set_type);
        assert!(buffer.contains(4));
        assert!(!buffer.contains(8));
    }
}

#[test]
fn buffer_union_within_representation() {
    let sets = vec![vec![1, 3], vec![2, 3, 10]];
    for set_type in [ColorSetType::SdslHybrid, ColorSetType::Roaring, ColorSetType::PlainBitmap] {
        let storage = sets_of_type(&sets, set_type);
        let mut buffer = ColorSetBuffer::from_ref(&storage.get(0).unwrap());
        buffer.union_with(&storage.get(1).unwrap());
        assert_eq!(buffer.as_sorted_vector(), vec![1, 2, 3, 10], "{}: wrong union", set_type);
    }
}

#[test]
fn buffer_mixed_representations() {
    let hybrid = sets_of_type(&[vec![1, 2, 3, 4]], ColorSetType::SdslHybrid);
    let roaring = sets_of_type(&[vec![2, 4, 8]], ColorSetType::Roaring);

    let mut buffer = ColorSetBuffer::from_ref(&hybrid.get(0).unwrap());
    buffer.intersect_with(&roaring.get(0).unwrap());
    assert_eq!(buffer.as_sorted_vector(), vec![2, 4]);

    let mut buffer = ColorSetBuffer::from_ref(&roaring.get(0).unwrap());
    buffer.union_with(&hybrid.get(0).unwrap());
    assert_eq!(buffer.as_sorted_vector(), vec![1, 2, 3, 4, 8]);
}

//-----------------------------------------------------------------------------
// The facade
//-----------------------------------------------------------------------------

#[test]
fn resolves_through_non_core_nodes() {
    let index = path_index();
    let coloring = path_coloring(&index);
    let tacg = index.lookup(b"TACG").unwrap();
    let acga = index.lookup(b"ACGA").unwrap();

    assert!(coloring.is_core(acga));
    assert!(!coloring.is_core(tacg));
    assert_eq!(coloring.color_set_id_of(acga).unwrap(), 0);
    // TACG has no stored entry; the walk follows the unique edge to ACGA.
    assert_eq!(coloring.color_set_id_of(tacg).unwrap(), 0);
    assert_eq!(coloring.color_set_as_vector(tacg).unwrap(), vec![0]);
    assert!(coloring.color_set_of(tacg).unwrap().contains(0));

    assert_eq!(coloring.largest_color(), 0);
    assert_eq!(coloring.number_of_distinct_color_sets(), 1);
    assert_eq!(coloring.total_color_set_length(), 1);
}

#[test]
fn out_of_range_node() {
    let index = path_index();
    let coloring = path_coloring(&index);
    assert!(matches!(
        coloring.color_set_id_of(index.num_nodes()),
        Err(ColoringError::UsageError(_))
    ));
}

#[test]
fn dead_end_is_fatal() {
    let index = path_index();
    let tacg = index.lookup(b"TACG").unwrap();
    let acga = index.lookup(b"ACGA").unwrap();
    // Store an entry only at TACG. Resolving ACGA (a dead end) then fails.
    let sets = hybrid_sets(&[vec![0]]);
    let node_map =
        crate::node_map::NodeToColorSetMap::from_entries(index.num_nodes(), &[(tacg, 0)]).unwrap();
    let coloring = Coloring::from_parts(sets, node_map, &index, 0, 1);
    assert!(matches!(
        coloring.color_set_id_of(acga),
        Err(ColoringError::StructuralInvariant(_))
    ));
}

#[test]
fn space_breakdown_prefixes() {
    let index = path_index();
    let coloring = path_coloring(&index);
    let breakdown = coloring.space_breakdown();
    assert!(breakdown.keys().any(|key| key.starts_with("color-set-storage-")));
    assert!(breakdown.keys().any(|key| key.starts_with("node-to-color-set-map-")));
    assert!(breakdown.values().all(|&bytes| bytes > 0));
}

//-----------------------------------------------------------------------------
// Archives
//-----------------------------------------------------------------------------

#[test]
fn archive_round_trip_all_variants() {
    let index = path_index();
    let acga = index.lookup(b"ACGA").unwrap();
    let tacg = index.lookup(b"TACG").unwrap();

    for set_type in [ColorSetType::SdslHybrid, ColorSetType::Roaring, ColorSetType::PlainBitmap] {
        let sets = sets_of_type(&[vec![0, 3], vec![1]], set_type);
        let node_map = crate::node_map::NodeToColorSetMap::from_entries(
            index.num_nodes(),
            &[(acga, 0), (tacg, 1)],
        )
        .unwrap();
        let coloring = Coloring::from_parts(sets, node_map, &index, 3, 3);

        let mut buffer: Vec<u8> = Vec::new();
        coloring.serialize(&mut buffer).unwrap();
        let mut cursor = io::Cursor::new(&buffer[..]);
        let loaded = Coloring::load(&mut cursor, &index).unwrap();

        assert_eq!(loaded.color_set_type(), set_type);
        assert_eq!(loaded.largest_color(), 3);
        assert_eq!(loaded.total_color_set_length(), 3);
        assert_eq!(loaded.number_of_distinct_color_sets(), 2);
        assert_eq!(loaded.color_set_as_vector(acga).unwrap(), vec![0, 3]);
        assert_eq!(loaded.color_set_as_vector(tacg).unwrap(), vec![1]);

        // The reloaded coloring serializes to the same bytes.
        let mut again: Vec<u8> = Vec::new();
        loaded.serialize(&mut again).unwrap();
        assert_eq!(buffer, again, "{}: archive changed after a round trip", set_type);
    }
}

#[test]
fn load_expected_surfaces_wrong_variant() {
    let index = path_index();
    let coloring = path_coloring(&index);
    let mut buffer: Vec<u8> = Vec::new();
    coloring.serialize(&mut buffer).unwrap();

    let mut cursor = io::Cursor::new(&buffer[..]);
    let result = Coloring::load_expected(&mut cursor, &index, ColorSetType::Roaring);
    match result {
        Err(ColoringError::WrongVariant { expected, found }) => {
            assert_eq!(expected, "roaring-v0");
            assert_eq!(found, "sdsl-hybrid-v4");
        }
        other => panic!("expected a WrongVariant error, got {:?}", other.map(|_| ())),
    }

    // The catchable sentinel supports probing for the stored variant.
    let mut loaded = None;
    for set_type in [ColorSetType::Roaring, ColorSetType::PlainBitmap, ColorSetType::SdslHybrid] {
        let mut cursor = io::Cursor::new(&buffer[..]);
        match Coloring::load_expected(&mut cursor, &index, set_type) {
            Ok(coloring) => {
                loaded = Some(coloring);
                break;
            }
            Err(ColoringError::WrongVariant { .. }) => continue,
            Err(e) => panic!("unexpected error: {}", e),
        }
    }
    let loaded = loaded.expect("probing should find the stored variant");
    assert_eq!(loaded.color_set_type(), ColorSetType::SdslHybrid);
}

#[test]
fn unknown_tag_is_rejected() {
    let index = path_index();
    let mut buffer: Vec<u8> = Vec::new();
    utils::write_string(&mut buffer, "sdsl-hybrid-v5").unwrap();
    let mut cursor = io::Cursor::new(&buffer[..]);
    assert!(matches!(
        Coloring::load(&mut cursor, &index),
        Err(ColoringError::InputMalformed(_))
    ));
}

#[test]
fn truncated_archive_is_rejected() {
    let index = path_index();
    let coloring = path_coloring(&index);
    let mut buffer: Vec<u8> = Vec::new();
    coloring.serialize(&mut buffer).unwrap();
    buffer.truncate(buffer.len() / 2);
    let mut cursor = io::Cursor::new(&buffer[..]);
    assert!(Coloring::load(&mut cursor, &index).is_err());
}

#[test]
fn archive_must_match_the_index() {
    let index = path_index();
    let coloring = path_coloring(&index);
    let mut buffer: Vec<u8> = Vec::new();
    coloring.serialize(&mut buffer).unwrap();

    // An index over different sequences has a different node count.
    let other_sequences: Vec<&[u8]> = vec![b"TACGA", b"GACGA", b"CCCCC"];
    let other_index = MatrixIndex::build(4, &other_sequences).unwrap();
    let mut cursor = io::Cursor::new(&buffer[..]);
    assert!(matches!(
        Coloring::load(&mut cursor, &other_index),
        Err(ColoringError::StructuralInvariant(_))
    ));
}

#[test]
fn file_round_trip() {
    let index = path_index();
    let coloring = path_coloring(&index);
    let filename = simple_sds::serialize::temp_file_name("coloring-archive");
    coloring.serialize_to_file(&filename).unwrap();
    let loaded = Coloring::load_from_file(&filename, &index).unwrap();
    assert_eq!(loaded.number_of_distinct_color_sets(), 1);
    let tacg = index.lookup(b"TACG").unwrap();
    assert_eq!(loaded.color_set_as_vector(tacg).unwrap(), vec![0]);
    let _ = std::fs::remove_file(&filename);
}

//-----------------------------------------------------------------------------
