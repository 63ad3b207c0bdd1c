//! Token streams in and out of arrays

use typed_array::access::{get, read_elements, read_string, write_elements, write_string};
use typed_array::{ArrayError, AsciiBridge, AsciiOptions, Datatype, Engine, Tokenizer};

#[test]
fn test_row_major_order() {
    let mut engine = Engine::new();
    let cube = engine.allocate(Datatype::Int32, &[2, 2, 3]).unwrap();
    let ascii = engine.ascii();
    ascii
        .tokens_to_array(engine.arena_mut(), cube, "0 1 2\n3 4 5\n\n6 7 8\n9 10 11")
        .unwrap();

    assert_eq!(get::<i32>(engine.arena(), cube, &[1, 0, 2]).unwrap(), 8);
    assert_eq!(
        ascii.array_to_tokens(engine.arena(), cube).unwrap(),
        "0 1 2 3 4 5 6 7 8 9 10 11"
    );
}

#[test]
fn test_every_numeric_type_round_trips() {
    let mut engine = Engine::new();
    let ascii = engine.ascii();
    for &datatype in Datatype::all().iter().filter(|dt| dt.is_numeric()) {
        let text = match datatype {
            Datatype::Char | Datatype::UChar => "a b c",
            Datatype::Bool => "1 0 1",
            Datatype::Hex => "0x1 0xff 0x10000",
            Datatype::Float | Datatype::Double => "0.5 -1.25 3",
            dt if dt.is_signed() => "-1 0 1",
            _ => "0 1 2",
        };
        let array = engine.allocate(datatype, &[3]).unwrap();
        ascii.tokens_to_array(engine.arena_mut(), array, text).unwrap();
        assert_eq!(
            ascii.array_to_tokens(engine.arena(), array).unwrap(),
            text,
            "{}",
            datatype
        );
    }
}

#[test]
fn test_unsigned_accepts_negative_wraparound() {
    let mut engine = Engine::new();
    let array = engine.allocate(Datatype::UInt16, &[2]).unwrap();
    let ascii = engine.ascii();
    ascii.tokens_to_array(engine.arena_mut(), array, "-1 70000").unwrap();
    assert_eq!(
        read_elements::<u16>(engine.arena(), array).unwrap(),
        vec![65535, 70000u32 as u16]
    );
}

#[test]
fn test_bad_tokens() {
    let mut engine = Engine::new();
    let ascii = engine.ascii();
    let ints = engine.allocate(Datatype::Int32, &[2]).unwrap();
    assert!(matches!(
        ascii.tokens_to_array(engine.arena_mut(), ints, "1 two"),
        Err(ArrayError::UnparseableToken { ref token, .. }) if token == "two"
    ));

    let hex = engine.allocate(Datatype::Hex, &[]).unwrap();
    assert!(ascii.tokens_to_array(engine.arena_mut(), hex, "0xg").is_err());

    let text = engine.allocate(Datatype::String, &[8]).unwrap();
    assert!(ascii
        .tokens_to_array(engine.arena_mut(), text, "\"open ended")
        .is_err());
}

#[test]
fn test_token_length_limit() {
    let bridge = AsciiBridge::new(AsciiOptions {
        max_token_length: 4,
        ..AsciiOptions::default()
    });
    let mut engine = Engine::new();
    let array = engine.allocate(Datatype::UInt32, &[2]).unwrap();
    bridge
        .tokens_to_array(engine.arena_mut(), array, "123456 7")
        .unwrap();
    assert_eq!(read_elements::<u32>(engine.arena(), array).unwrap(), vec![1234, 7]);
}

#[test]
fn test_tokenizer_is_an_iterator() {
    let words: Vec<String> = Tokenizer::new("one \"two three\"\tfour", 400)
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(words, vec!["one", "two three", "four"]);
}

#[test]
fn test_quote_characters_round_trip() {
    let mut engine = Engine::new();
    let ascii = engine.ascii();
    let chars = engine.allocate(Datatype::Char, &[3]).unwrap();
    write_elements::<u8>(engine.arena_mut(), chars, b"a\"b").unwrap();

    let text = ascii.array_to_tokens(engine.arena(), chars).unwrap();
    assert_eq!(text, r#"a "\"" b"#);

    let copy = engine.allocate(Datatype::Char, &[3]).unwrap();
    assert_eq!(ascii.tokens_to_array(engine.arena_mut(), copy, &text).unwrap(), 3);
    assert_eq!(read_elements::<u8>(engine.arena(), copy).unwrap(), b"a\"b".to_vec());
}

#[test]
fn test_awkward_chars_stay_printable() {
    let mut engine = Engine::new();
    let ascii = engine.ascii();
    let chars = engine.allocate(Datatype::UChar, &[4]).unwrap();
    write_elements::<u8>(engine.arena_mut(), chars, &[0, b' ', b'\\', 0xe9]).unwrap();

    let text = ascii.array_to_tokens(engine.arena(), chars).unwrap();
    assert_eq!(text, "\"\" \" \" \\ \u{e9}");
    assert!(!text.contains('\0'));

    let copy = engine.allocate(Datatype::UChar, &[4]).unwrap();
    ascii.tokens_to_array(engine.arena_mut(), copy, &text).unwrap();
    assert_eq!(
        read_elements::<u8>(engine.arena(), copy).unwrap(),
        vec![0, b' ', b'\\', 0xe9]
    );
}

#[test]
fn test_strings_with_quotes_round_trip() {
    let mut engine = Engine::new();
    let ascii = engine.ascii();
    let rows = ["say \"hi\"", "\"lead", "back\\slash", "a \\ b"];
    let names = engine.allocate(Datatype::String, &[rows.len(), 16]).unwrap();
    for (i, row) in rows.iter().enumerate() {
        write_string(engine.arena_mut(), names, &[i], row).unwrap();
    }

    let text = ascii.array_to_tokens(engine.arena(), names).unwrap();
    let copy = engine.allocate(Datatype::String, &[rows.len(), 16]).unwrap();
    assert_eq!(ascii.tokens_to_array(engine.arena_mut(), copy, &text).unwrap(), 4);
    for (i, row) in rows.iter().enumerate() {
        assert_eq!(read_string(engine.arena(), copy, &[i]).unwrap(), *row);
    }
}
