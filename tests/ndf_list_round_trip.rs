use std::io::Cursor;

use ndfkit::ndf::{Graph, Object, Property};

#[test]
fn test_list_of_uint32_round_trips() {
    let mut graph = Graph::new();
    let mut object = Object::new("O", "TDescriptor");
    object.push_property(
        "xs",
        Property::List(vec![
            Property::UInt32(1),
            Property::UInt32(2),
            Property::UInt32(3),
        ]),
    );
    graph.add_object(object).unwrap();

    let mut buffer = Cursor::new(Vec::new());
    graph.encode(&mut buffer).unwrap();
    let decoded = Graph::decode(&buffer.into_inner()).unwrap();

    let restored = decoded.get("O").unwrap();
    assert_eq!(
        restored.get_property("xs"),
        Some(&Property::List(vec![
            Property::UInt32(1),
            Property::UInt32(2),
            Property::UInt32(3),
        ]))
    );
}
