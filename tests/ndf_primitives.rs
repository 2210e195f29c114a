use std::io::Cursor;

use ndfkit::ndf::{Color, Graph, Object, Property};

#[test]
fn test_primitive_properties_round_trip_with_color_channel_swap() {
    let mut graph = Graph::new();
    let mut object = Object::new("O", "TDescriptor");
    object.push_property("b", Property::Bool(true));
    object.push_property("u", Property::UInt32(0xDEAD_BEEF));
    object.push_property("f", Property::Float32(1.5f32.into()));
    object.push_property("s", Property::String("hello".to_string()));
    object.push_property(
        "c",
        Property::Color(Color {
            r: 0x11,
            g: 0x22,
            b: 0x33,
            a: 0x44,
        }),
    );
    graph.add_object(object).unwrap();

    let mut buffer = Cursor::new(Vec::new());
    graph.encode(&mut buffer).unwrap();
    let bytes = buffer.into_inner();

    // The color payload is wire-ordered (b, g, r, a); scan for that exact
    // 4-byte run to confirm the channel swap happened on the wire.
    let wire_order = [0x33u8, 0x22, 0x11, 0x44];
    assert!(bytes.windows(4).any(|w| w == wire_order));

    let decoded = Graph::decode(&bytes).unwrap();
    let restored = decoded.get("O").unwrap();
    assert_eq!(restored.get_property("b"), Some(&Property::Bool(true)));
    assert_eq!(restored.get_property("u"), Some(&Property::UInt32(0xDEAD_BEEF)));
    assert_eq!(restored.get_property("f"), Some(&Property::Float32(1.5f32.into())));
    assert_eq!(restored.get_property("s"), Some(&Property::String("hello".to_string())));
    assert_eq!(
        restored.get_property("c"),
        Some(&Property::Color(Color {
            r: 0x11,
            g: 0x22,
            b: 0x33,
            a: 0x44
        }))
    );
}
