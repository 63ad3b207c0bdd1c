#![no_main]
use libfuzzer_sys::fuzz_target;
use typed_array::{Datatype, Engine, HandleState};

// Any text either parses or fails cleanly, for every token parser
fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    let mut engine = Engine::new();
    let ascii = engine.ascii();
    for &datatype in Datatype::all() {
        let dims: &[usize] = if datatype == Datatype::String { &[2, 16] } else { &[4] };
        let array = match engine.allocate(datatype, dims) {
            Ok(array) => array,
            Err(_) => continue,
        };
        if ascii.tokens_to_array(engine.arena_mut(), array, text).is_ok() {
            let _ = ascii.array_to_tokens(engine.arena(), array);
        }
        assert_eq!(engine.validate(array), HandleState::Live);
        engine.free(array).unwrap();
    }
});
