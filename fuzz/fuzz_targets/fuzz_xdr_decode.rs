#![no_main]
use libfuzzer_sys::{fuzz_target, arbitrary::{Arbitrary, Unstructured}};
use typed_array::{Datatype, Engine, HandleState};

#[derive(Debug, Arbitrary)]
struct DecodeInput {
    datatype_idx: u8,
    dims: Vec<u8>,
    wire: Vec<u8>,
}

// Arbitrary wire bytes must never corrupt the destination array
fuzz_target!(|input: &[u8]| {
    let mut u = Unstructured::new(input);
    let mut input: DecodeInput = match u.arbitrary() {
        Ok(input) => input,
        Err(_) => return,
    };

    let numeric: Vec<Datatype> = Datatype::all()
        .iter()
        .copied()
        .filter(|dt| dt.is_numeric() || *dt == Datatype::String)
        .collect();
    let datatype = numeric[input.datatype_idx as usize % numeric.len()];
    let dims: Vec<usize> = input.dims.iter().take(4).map(|&d| d as usize % 9).collect();

    let mut engine = Engine::new();
    let array = match engine.allocate(datatype, &dims) {
        Ok(array) => array,
        Err(_) => return,
    };
    let codec = engine.xdr();
    let _ = codec.decode(engine.arena_mut(), array, &mut input.wire);

    assert_eq!(engine.validate(array), HandleState::Live);
    engine.free(array).unwrap();
});
