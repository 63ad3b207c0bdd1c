#![no_main]
use libfuzzer_sys::{fuzz_target, arbitrary::{Arbitrary, Unstructured}};
use typed_array::{Datatype, Engine, EngineConfig, HandleState, LongWidth};

#[derive(Debug, Arbitrary)]
struct DecodeInput {
    datatype_idx: u8,
    long64: bool,
    dims: Vec<u8>,
    wire: Vec<u8>,
}

fuzz_target!(|input: &[u8]| {
    let mut u = Unstructured::new(input);
    let input: DecodeInput = match u.arbitrary() {
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

    let mut config = EngineConfig::default();
    if input.long64 {
        config.codec.long_wire_width = LongWidth::Bits64;
    }
    let mut engine = Engine::with_config(config);
    let array = match engine.allocate(datatype, &dims) {
        Ok(array) => array,
        Err(_) => return,
    };
    let codec = engine.native();
    let _ = codec.decode(engine.arena_mut(), array, &input.wire);

    assert_eq!(engine.validate(array), HandleState::Live);
    engine.free(array).unwrap();
});
