//! XDR layout, round trips and truncation

use typed_array::access::{get, read_elements, read_string, write_elements, write_string};
use typed_array::{ArrayError, CodecOptions, Datatype, Engine, XdrCodec};

#[test]
fn test_double_matrix_round_trip() {
    let mut engine = Engine::new();
    let src = engine.allocate(Datatype::Double, &[3, 4]).unwrap();
    let values: Vec<f64> = (0..12).map(|i| i as f64 * 0.5 - 2.0).collect();
    write_elements::<f64>(engine.arena_mut(), src, &values).unwrap();

    let mut wire = engine.xdr().encode(engine.arena(), src).unwrap();
    // Three rows of: count word + four 8-byte doubles
    assert_eq!(wire.len(), 3 * (4 + 4 * 8));
    assert_eq!(&wire[..4], &[0, 0, 0, 4]);
    assert_eq!(&wire[4..12], &(-2.0f64).to_be_bytes());
    assert_eq!(&wire[36..40], &[0, 0, 0, 4]);

    let dst = engine.allocate(Datatype::Double, &[3, 4]).unwrap();
    let codec = engine.xdr();
    assert_eq!(codec.decode(engine.arena_mut(), dst, &mut wire).unwrap(), 108);
    assert_eq!(read_elements::<f64>(engine.arena(), dst).unwrap(), values);
}

#[test]
fn test_string_vector_padding() {
    let mut engine = Engine::new();
    for (text, expected_len) in [("", 4), ("a", 8), ("abcd", 8), ("abcdefg", 12)] {
        let src = engine.allocate(Datatype::String, &[7]).unwrap();
        write_string(engine.arena_mut(), src, &[], text).unwrap();

        let mut wire = engine.xdr().encode(engine.arena(), src).unwrap();
        // The slot is sized for the capacity, the count for the content
        assert_eq!(wire.len(), 12);
        assert_eq!(&wire[..4], &(text.len() as u32).to_be_bytes());
        assert_eq!(&wire[4..4 + text.len()], text.as_bytes());
        assert!(wire[4 + text.len()..].iter().all(|&b| b == 0));

        let dst = engine.allocate(Datatype::String, &[7]).unwrap();
        let codec = engine.xdr();
        let consumed = codec.decode(engine.arena_mut(), dst, &mut wire).unwrap();
        assert_eq!(consumed, expected_len);
        assert_eq!(read_string(engine.arena(), dst, &[]).unwrap(), text);
    }
}

#[test]
fn test_string_matrix_rows() {
    let mut engine = Engine::new();
    let src = engine.allocate(Datatype::String, &[2, 6]).unwrap();
    write_string(engine.arena_mut(), src, &[0], "x").unwrap();
    write_string(engine.arena_mut(), src, &[1], "hutch").unwrap();

    let mut wire = engine.xdr().encode(engine.arena(), src).unwrap();
    assert_eq!(wire.len(), 2 * 12);
    assert_eq!(&wire[12..16], &[0, 0, 0, 5]);
    assert_eq!(&wire[16..21], b"hutch");

    let dst = engine.allocate(Datatype::String, &[2, 6]).unwrap();
    let codec = engine.xdr();
    codec.decode(engine.arena_mut(), dst, &mut wire).unwrap();
    assert_eq!(read_string(engine.arena(), dst, &[0]).unwrap(), "x");
    assert_eq!(read_string(engine.arena(), dst, &[1]).unwrap(), "hutch");
}

#[test]
fn test_truncating_decode() {
    let mut engine = Engine::new();
    let src = engine.allocate(Datatype::Int16, &[10]).unwrap();
    let values: Vec<i16> = (1..=10).map(|v| v * -100).collect();
    write_elements::<i16>(engine.arena_mut(), src, &values).unwrap();
    let mut wire = engine.xdr().encode(engine.arena(), src).unwrap();
    assert_eq!(&wire[..4], &[0, 0, 0, 10]);

    let dst = engine.allocate(Datatype::Int16, &[4]).unwrap();
    let guard = engine.allocate(Datatype::Int16, &[4]).unwrap();
    write_elements::<i16>(engine.arena_mut(), guard, &[9, 9, 9, 9]).unwrap();

    let codec = engine.xdr();
    let consumed = codec.decode(engine.arena_mut(), dst, &mut wire).unwrap();
    assert_eq!(consumed, 4 + 4 * 4);
    assert_eq!(&wire[..4], &[0, 0, 0, 4]);
    assert_eq!(read_elements::<i16>(engine.arena(), dst).unwrap(), &values[..4]);
    assert_eq!(read_elements::<i16>(engine.arena(), guard).unwrap(), vec![9, 9, 9, 9]);
}

#[test]
fn test_bit_exact_scalars() {
    let mut engine = Engine::new();
    let cases: [(Datatype, &[u8]); 6] = [
        (Datatype::Char, &[0xff, 0xff, 0xff, 0xfe]),
        (Datatype::UChar, &[0, 0, 0, 0xfe]),
        (Datatype::Bool, &[0, 0, 0, 1]),
        (Datatype::Float, &[0xc0, 0, 0, 0]),
        (Datatype::Int64, &[0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xfe]),
        (Datatype::Double, &[0xc0, 0, 0, 0, 0, 0, 0, 0]),
    ];
    let ascii = engine.ascii();
    for (datatype, expected) in cases {
        let array = engine.allocate(datatype, &[]).unwrap();
        let token = match datatype {
            Datatype::Char | Datatype::UChar => "\u{fe}",
            Datatype::Bool => "1",
            _ => "-2",
        };
        ascii.tokens_to_array(engine.arena_mut(), array, token).unwrap();
        assert_eq!(
            engine.xdr().encode(engine.arena(), array).unwrap(),
            expected,
            "{}",
            datatype
        );
    }
}

#[test]
fn test_long_overflow_is_illegal() {
    let mut engine = Engine::new();
    let array = engine.allocate(Datatype::ULong, &[2]).unwrap();
    write_elements::<usize>(engine.arena_mut(), array, &[1, usize::MAX]).unwrap();

    let result = engine.xdr().encode(engine.arena(), array);
    if std::mem::size_of::<usize>() == 8 {
        assert!(matches!(result, Err(ArrayError::IllegalArgument(_))));
    } else {
        assert!(result.is_ok());
    }
}

#[test]
fn test_quiet_overflow() {
    let mut engine = Engine::new();
    let array = engine.allocate(Datatype::UInt32, &[2, 2]).unwrap();
    let mut buf = [0u8; 16];

    let loud = engine.xdr().encode_into(engine.arena(), array, &mut buf).unwrap_err();
    assert_eq!(loud.missing(), Some(8));
    assert!(!loud.is_quiet());

    let quiet = XdrCodec::new(CodecOptions::default().quiet());
    let err = quiet.encode_into(engine.arena(), array, &mut buf).unwrap_err();
    assert!(err.is_quiet());
}

#[test]
fn test_short_decode_input() {
    let mut engine = Engine::new();
    let array = engine.allocate(Datatype::Int32, &[3]).unwrap();
    let mut wire = vec![0, 0, 0, 3, 0, 0, 0, 1];
    let codec = engine.xdr();
    assert!(matches!(
        codec.decode(engine.arena_mut(), array, &mut wire),
        Err(ArrayError::WouldExceedLimit { needed: 16, available: 8, .. })
    ));

    let mut fewer = vec![0, 0, 0, 1, 0, 0, 0, 42];
    codec.decode(engine.arena_mut(), array, &mut fewer).unwrap();
    assert_eq!(get::<i32>(engine.arena(), array, &[0]).unwrap(), 42);
}
