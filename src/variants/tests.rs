use super::*;

//-----------------------------------------------------------------------------

fn example_sets() -> Vec<Vec<u64>> {
    vec![
        vec![4, 1534, 4003, 8903],
        (0..1000).step_by(3).collect(),
        vec![0],
        vec![7, 8, 9],
    ]
}

//-----------------------------------------------------------------------------

#[test]
fn roaring_store_and_retrieve() {
    let sets = example_sets();
    let mut storage = RoaringColorSets::new();
    for set in &sets {
        storage.add_set(set).unwrap();
    }
    storage.prepare_for_queries();

    assert_eq!(storage.len(), sets.len());
    for (id, set) in sets.iter().enumerate() {
        let bitmap = storage.get(id).unwrap();
        assert_eq!(bitmap.cardinality() as usize, set.len());
        let contents: Vec<u64> = bitmap.iter().map(u64::from).collect();
        assert_eq!(contents, *set, "wrong contents for set {}", id);
    }
    assert!(storage.get(sets.len()).is_err());
}

#[test]
fn roaring_serialization_round_trip() {
    let sets = example_sets();
    let mut storage = RoaringColorSets::new();
    for set in &sets {
        storage.add_set(set).unwrap();
    }
    storage.prepare_for_queries();

    let mut buffer: Vec<u8> = Vec::new();
    storage.serialize_into(&mut buffer).unwrap();
    let mut cursor = io::Cursor::new(buffer);
    let loaded = RoaringColorSets::load_from(&mut cursor).unwrap();

    assert_eq!(loaded.len(), storage.len());
    for (original, copy) in storage.iter().zip(loaded.iter()) {
        assert_eq!(original.to_vec(), copy.to_vec());
    }
}

#[test]
fn roaring_rejects_wide_colors() {
    let mut storage = RoaringColorSets::new();
    let result = storage.add_set(&[0, u64::from(u32::MAX) + 1]);
    assert!(matches!(result, Err(ColoringError::InputMalformed(_))));
}

//-----------------------------------------------------------------------------

#[test]
fn plain_store_and_retrieve() {
    let sets = example_sets();
    let mut storage = PlainColorSets::new();
    for set in &sets {
        storage.add_set(set).unwrap();
    }
    storage.prepare_for_queries();

    assert_eq!(storage.len(), sets.len());
    for (id, set) in sets.iter().enumerate() {
        let bits = storage.get(id).unwrap();
        assert_eq!(plain_size(bits, bits.len()), set.len());
        assert_eq!(plain_to_vector(bits, bits.len()), *set, "wrong contents for set {}", id);
        assert!(plain_contains(bits, bits.len(), set[0]));
        assert!(!plain_contains(bits, bits.len(), 1_000_000));
    }
    assert!(storage.get(sets.len()).is_err());
}

#[test]
fn plain_serialization_round_trip() {
    let sets = example_sets();
    let mut storage = PlainColorSets::new();
    for set in &sets {
        storage.add_set(set).unwrap();
    }
    storage.prepare_for_queries();

    let mut buffer: Vec<u8> = Vec::new();
    storage.serialize_into(&mut buffer).unwrap();
    let mut cursor = io::Cursor::new(buffer);
    let loaded = PlainColorSets::load_from(&mut cursor).unwrap();

    assert_eq!(loaded.len(), storage.len());
    for (id, set) in sets.iter().enumerate() {
        let bits = loaded.get(id).unwrap();
        assert_eq!(plain_to_vector(bits, bits.len()), *set);
    }
}

#[test]
fn empty_set_in_plain_storage() {
    let mut storage = PlainColorSets::new();
    storage.add_set(&[]).unwrap();
    storage.prepare_for_queries();
    let bits = storage.get(0).unwrap();
    assert_eq!(bits.len(), 0);
    assert_eq!(plain_size(bits, 0), 0);
}

//-----------------------------------------------------------------------------
