//! Allocation and release across every datatype and ranks 0 through 4

use typed_array::{
    access, allocate, allocate_overlay, default_elem_sizes, free, introspect, ArrayError, Arena,
    ArenaConfig, Datatype, HandleState, IdentityViolation,
};

const SHAPES: [&[usize]; 5] = [&[], &[5], &[3, 4], &[2, 3, 4], &[2, 2, 3, 2]];

#[test]
fn test_free_then_double_free_every_datatype_and_rank() {
    let mut arena = Arena::new();

    for &datatype in Datatype::all() {
        for dims in SHAPES {
            let sizes = default_elem_sizes(datatype, dims.len());
            let array = allocate(&mut arena, datatype, dims, &sizes).unwrap();

            assert_eq!(introspect::validate(&arena, array), HandleState::Live);
            assert_eq!(
                introspect::element_count(&arena, array).unwrap(),
                dims.iter().product::<usize>() as u64
            );

            free(&mut arena, array).unwrap();
            assert_eq!(introspect::validate(&arena, array), HandleState::Freed);

            match free(&mut arena, array) {
                Err(ArrayError::CorruptOrFreedHandle { state, .. }) => {
                    assert_eq!(state, IdentityViolation::Freed, "{} {:?}", datatype, dims)
                }
                other => panic!("double free of {} {:?} gave {:?}", datatype, dims, other),
            }
        }
    }

    assert_eq!(arena.stats().bytes_in_use, 0);
}

#[test]
fn test_uint16_matrix_scenario() {
    let mut arena = Arena::new();
    let array = allocate(&mut arena, Datatype::UInt16, &[3, 4], &[2, 8]).unwrap();

    access::set::<u16>(&mut arena, array, &[1, 2], 4242).unwrap();
    assert_eq!(access::get::<u16>(&arena, array, &[1, 2]).unwrap(), 4242);
    assert_eq!(introspect::element_count(&arena, array).unwrap(), 12);
    assert_eq!(introspect::byte_count(&arena, array).unwrap(), 24);
    assert_eq!(introspect::validate(&arena, array), HandleState::Live);

    free(&mut arena, array).unwrap();
    assert_eq!(introspect::validate(&arena, array), HandleState::Freed);
}

#[test]
fn test_borrowed_vector_survives_free() {
    let mut arena = Arena::new();
    let image = arena.alloc(6 * 8 * 2).unwrap();
    for (i, pixel) in arena
        .bytes_mut(image, 96)
        .unwrap()
        .chunks_exact_mut(2)
        .enumerate()
    {
        pixel.copy_from_slice(&(i as u16).to_ne_bytes());
    }

    for dims in [&[6usize, 8][..], &[2, 3, 8], &[2, 3, 2, 4]] {
        let sizes = default_elem_sizes(Datatype::UInt16, dims.len());
        let overlay = allocate_overlay(&mut arena, Datatype::UInt16, dims, &sizes, image).unwrap();
        assert!(overlay.is_borrowed());
        assert_eq!(introspect::base_vector(&arena, overlay).unwrap(), image);

        free(&mut arena, overlay).unwrap();
        assert!(arena.is_in_use(image));
    }

    let pixels = arena.bytes(image, 96).unwrap();
    assert_eq!(u16::from_ne_bytes([pixels[94], pixels[95]]), 47);
    arena.release(image).unwrap();
    assert_eq!(arena.stats().bytes_in_use, 0);
}

#[test]
fn test_foreign_address_is_not_an_array() {
    let mut arena = Arena::new();
    let block = arena.alloc(256).unwrap();
    let bogus = typed_array::TypedArray::from_raw(
        block.checked_add(128).unwrap(),
        typed_array::VectorOwnership::Owned,
    );

    assert_eq!(introspect::validate(&arena, bogus), HandleState::NotAnArray);
    assert!(matches!(
        free(&mut arena, bogus),
        Err(ArrayError::CorruptOrFreedHandle {
            state: IdentityViolation::NotAnArray,
            ..
        })
    ));
    assert!(arena.is_in_use(block));
}

#[test]
fn test_arena_limit_leaves_nothing_behind() {
    let mut arena = Arena::with_config(ArenaConfig {
        max_bytes: 2048,
        ..ArenaConfig::default()
    });

    let sizes = default_elem_sizes(Datatype::Double, 3);
    let result = allocate(&mut arena, Datatype::Double, &[4, 4, 16], &sizes);
    assert!(matches!(result, Err(ArrayError::OutOfMemory(_))));
    assert_eq!(arena.stats().bytes_in_use, 0);

    let small = allocate(&mut arena, Datatype::Double, &[2, 2, 2], &sizes).unwrap();
    free(&mut arena, small).unwrap();
    assert_eq!(arena.stats().bytes_in_use, 0);
}

#[test]
fn test_empty_axes() {
    let mut arena = Arena::new();
    for dims in [&[0usize][..], &[0, 4], &[3, 0], &[2, 0, 5]] {
        let sizes = default_elem_sizes(Datatype::Int32, dims.len());
        let array = allocate(&mut arena, Datatype::Int32, dims, &sizes).unwrap();
        assert_eq!(introspect::element_count(&arena, array).unwrap(), 0);
        free(&mut arena, array).unwrap();
    }
    assert_eq!(arena.stats().bytes_in_use, 0);
}

#[test]
fn test_random_churn_keeps_live_arrays_intact() {
    let mut arena = Arena::new();
    let mut live: Vec<(typed_array::TypedArray, Vec<usize>, i32)> = Vec::new();

    for round in 0..500 {
        if !live.is_empty() && rand::random::<usize>() % 3 == 0 {
            let idx = rand::random::<usize>() % live.len();
            let (array, dims, tag) = live.swap_remove(idx);
            let last: Vec<usize> = dims.iter().map(|d| d - 1).collect();
            assert_eq!(access::get::<i32>(&arena, array, &last).unwrap(), tag);
            free(&mut arena, array).unwrap();
            continue;
        }

        let rank = rand::random::<usize>() % 4 + 1;
        let dims: Vec<usize> = (0..rank).map(|_| rand::random::<usize>() % 5 + 1).collect();
        let sizes = default_elem_sizes(Datatype::Int32, rank);
        let array = allocate(&mut arena, Datatype::Int32, &dims, &sizes).unwrap();
        let last: Vec<usize> = dims.iter().map(|d| d - 1).collect();
        access::set::<i32>(&mut arena, array, &last, round).unwrap();
        live.push((array, dims, round));
    }

    for (array, dims, tag) in live {
        let last: Vec<usize> = dims.iter().map(|d| d - 1).collect();
        assert_eq!(access::get::<i32>(&arena, array, &last).unwrap(), tag);
        free(&mut arena, array).unwrap();
    }
    assert_eq!(arena.stats().bytes_in_use, 0);
}
