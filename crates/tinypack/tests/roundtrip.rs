//! End-to-end coverage of the public API: derived types, polymorphic slots,
//! self-serializing types, and the wire-level properties callers rely on.

use std::io;

use tinypack::{
    delegate_serialization, marshal, marshal_into, register_as, type_name,
    unmarshal, ByteCodec, Decode, Decoder, Dynamic, Encode, TypeName,
};

fn roundtrip<T>(value: &T) -> Vec<u8>
where
    T: Encode + Decode + PartialEq + std::fmt::Debug,
{
    let bytes = marshal(value).unwrap();
    let mut decoder = Decoder::new(&bytes);
    let decoded: T = decoder.decode_value().unwrap();
    assert_eq!(&decoded, value);
    assert_eq!(decoder.consumed(), bytes.len());
    bytes
}

#[derive(Encode, Decode, TypeName, Default, PartialEq, Debug, Clone)]
struct Player {
    name: String,
    score: u64,
    friends: Vec<String>,
    location: Option<(f64, f64)>,
}

fn sample_player() -> Player {
    Player {
        name: "ada".to_string(),
        score: 4200,
        friends: vec!["grace".to_string(), "edsger".to_string()],
        location: Some((52.37, 4.89)),
    }
}

#[test]
fn derived_struct_roundtrips() {
    roundtrip(&sample_player());
    roundtrip(&Player::default());
}

#[derive(Encode, Decode, PartialEq, Debug)]
struct Id(u64);

#[derive(Encode, Decode, PartialEq, Debug)]
struct Marker;

#[test]
fn tuple_and_unit_structs_roundtrip() {
    roundtrip(&Id(9_999_999));
    assert!(marshal(&Marker).unwrap().is_empty());
    roundtrip(&Marker);
}

#[derive(Encode, Decode, PartialEq, Debug)]
enum Message {
    Quit,
    Move { x: i32, y: i32 },
    Write(String),
    Batch(Vec<Message>),
}

#[test]
fn enum_variants_roundtrip() {
    roundtrip(&Message::Quit);
    roundtrip(&Message::Move { x: -3, y: 7 });
    roundtrip(&Message::Write("hi".to_string()));
    roundtrip(&Message::Batch(vec![Message::Quit, Message::Write(String::new())]));
}

#[test]
fn unit_variant_is_one_byte() {
    assert_eq!(marshal(&Message::Quit).unwrap(), [0]);
}

#[test]
fn unknown_variant_index_is_a_data_error() {
    let mut dest = Message::Quit;
    // Variant index 99 does not exist.
    let err = unmarshal(&[99], &mut dest).unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    assert!(err.to_string().contains("Message"));
}

#[derive(Encode, Decode, Default, PartialEq, Debug)]
struct Cached {
    key: String,
    #[tinypack(skip)]
    cache: Vec<u8>,
}

#[test]
fn skipped_fields_contribute_no_bytes() {
    let with_cache = Cached { key: "k".to_string(), cache: vec![1, 2, 3] };
    let without = Cached { key: "k".to_string(), cache: Vec::new() };
    assert_eq!(marshal(&with_cache).unwrap(), marshal(&without).unwrap());
}

#[test]
fn skipped_fields_are_left_alone_by_in_place_decode() {
    let bytes = marshal(&Cached { key: "new".to_string(), cache: vec![9] }).unwrap();
    let mut dest = Cached { key: String::new(), cache: vec![42] };
    unmarshal(&bytes, &mut dest).unwrap();
    assert_eq!(dest.key, "new");
    assert_eq!(dest.cache, [42], "in-place decode must not touch skipped fields");
}

#[derive(Encode, Decode, TypeName, PartialEq, Debug)]
struct Pair<T> {
    first: T,
    second: T,
}

#[test]
fn generic_structs_roundtrip_and_name_structurally() {
    roundtrip(&Pair { first: 1u8, second: 2u8 });
    roundtrip(&Pair {
        first: vec!["a".to_string()],
        second: Vec::new(),
    });
    assert_eq!(
        type_name::<Pair<u32>>(),
        concat!(module_path!(), "::Pair<u32>"),
    );
}

// A nested record and its flattened equivalent must produce identical
// bytes: records carry no framing, only their fields in order.

#[derive(Encode)]
struct Point {
    x: u16,
    y: u16,
}

#[derive(Encode)]
struct NestedRecord {
    tag: u8,
    point: Point,
    flag: bool,
}

#[derive(Encode)]
struct FlatRecord {
    tag: u8,
    x: u16,
    y: u16,
    flag: bool,
}

#[test]
fn nested_and_flattened_records_encode_identically() {
    let nested = NestedRecord { tag: 7, point: Point { x: 300, y: 5 }, flag: true };
    let flat = FlatRecord { tag: 7, x: 300, y: 5, flag: true };
    assert_eq!(marshal(&nested).unwrap(), marshal(&flat).unwrap());
}

#[derive(Encode, Decode, Default, PartialEq, Debug)]
struct ListNode {
    value: i32,
    next: Option<Box<ListNode>>,
}

#[test]
fn self_referential_type_roundtrips_a_finite_chain() {
    let chain = ListNode {
        value: 1,
        next: Some(Box::new(ListNode {
            value: 2,
            next: Some(Box::new(ListNode { value: 3, next: None })),
        })),
    };
    roundtrip(&chain);
}

#[derive(Encode, Decode)]
struct NineFlags {
    a: bool,
    b: bool,
    c: bool,
    d: bool,
    e: bool,
    f: bool,
    g: bool,
    h: bool,
    i: bool,
    tail: u8,
}

#[test]
fn presence_bits_pack_across_fields() {
    let flags = NineFlags {
        a: true,
        b: false,
        c: true,
        d: false,
        e: true,
        f: false,
        g: true,
        h: false,
        i: true,
        tail: 0xAA,
    };
    let bytes = marshal(&flags).unwrap();
    // Eight booleans in the first control byte, the ninth in bit 0 of the
    // second, then the trailing data byte.
    assert_eq!(bytes, [0b0101_0101, 0b0000_0001, 0xAA]);
}

#[derive(Encode, Decode, TypeName, Default, PartialEq, Debug, Clone)]
struct Telemetry {
    series: String,
    points: Vec<i64>,
}

#[test]
fn polymorphic_slot_roundtrips_through_the_registry() {
    register_as::<Telemetry>("telemetry");

    let value = Telemetry {
        series: "cpu".to_string(),
        points: vec![1, -1, 2, -2],
    };
    let slot: Option<Box<dyn Dynamic>> = Some(Box::new(value.clone()));
    let bytes = marshal(&slot).unwrap();

    // Presence bit, then the registered alias as a length-prefixed string.
    assert_eq!(bytes[0], 0b0000_0001);
    assert_eq!(bytes[1] as usize, "telemetry".len());
    assert_eq!(&bytes[2..2 + "telemetry".len()], b"telemetry");

    let mut dest: Option<Box<dyn Dynamic>> = None;
    let consumed = unmarshal(&bytes, &mut dest).unwrap();
    assert_eq!(consumed, bytes.len());
    let decoded = dest.unwrap();
    let decoded = decoded.as_any().downcast_ref::<Telemetry>().unwrap();
    assert_eq!(decoded, &value);
}

#[test]
fn cleared_polymorphic_slot_decodes_as_none() {
    let bytes = marshal(&None::<Box<dyn Dynamic>>).unwrap();
    let mut dest: Option<Box<dyn Dynamic>> =
        Some(Box::new(Telemetry::default()));
    unmarshal(&bytes, &mut dest).unwrap();
    assert!(dest.is_none());
}

// A self-serializing type used as an ordinary field of a derived record.

#[derive(Default, PartialEq, Debug)]
struct Fixed6 {
    digits: [u8; 6],
}

impl ByteCodec for Fixed6 {
    fn encode_append(&self, mut buf: Vec<u8>) -> Vec<u8> {
        buf.extend_from_slice(&self.digits);
        buf
    }

    fn decode_prefix(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.digits.copy_from_slice(&buf[..6]);
        Ok(6)
    }
}

delegate_serialization!(Fixed6);

#[derive(Encode, Decode, Default, PartialEq, Debug)]
struct Ticket {
    serial: Fixed6,
    holder: String,
}

#[test]
fn self_serializing_field_inside_derived_record() {
    let ticket = Ticket {
        serial: Fixed6 { digits: [9, 8, 7, 6, 5, 4] },
        holder: "bran".to_string(),
    };
    let bytes = roundtrip(&ticket);
    // The bespoke bytes lead the record, unframed.
    assert_eq!(&bytes[..6], &[9, 8, 7, 6, 5, 4]);
}

#[test]
fn multiple_values_travel_as_a_tuple() {
    let player = sample_player();
    let values = (42u32, player.clone(), "trailer".to_string());
    let bytes = marshal(&values).unwrap();

    let mut dest = (0u32, Player::default(), String::new());
    let consumed = unmarshal(&bytes, &mut dest).unwrap();
    assert_eq!(consumed, bytes.len());
    assert_eq!(dest.0, 42);
    assert_eq!(dest.1, player);
    assert_eq!(dest.2, "trailer");
}

#[test]
fn append_encoding_extends_an_existing_buffer() {
    let first = marshal(&1u16).unwrap();
    let combined = marshal_into(first.clone(), &sample_player()).unwrap();
    assert_eq!(&combined[..first.len()], &first[..]);

    let mut decoder = Decoder::new(&combined);
    let mut n = 0u16;
    decoder.decode(&mut n).unwrap();
    let mut player = Player::default();
    decoder.decode(&mut player).unwrap();
    assert_eq!(n, 1);
    assert_eq!(player, sample_player());
    assert_eq!(decoder.consumed(), combined.len());
}

#[test]
fn reused_destination_converges_to_the_encoded_value() {
    let bytes = marshal(&sample_player()).unwrap();
    let mut dest = Player {
        name: "previous".to_string(),
        score: 1,
        friends: vec!["x".to_string(); 8],
        location: None,
    };
    unmarshal(&bytes, &mut dest).unwrap();
    assert_eq!(dest, sample_player());
}
