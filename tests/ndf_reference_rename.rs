use std::io::Cursor;

use ndfkit::ndf::{Graph, ImportReference, Object, ObjectReference, Property};

#[test]
fn test_rename_survives_an_encode_decode_cycle() {
    let mut graph = Graph::new();
    graph.add_object(Object::new("B", "T2")).unwrap();
    let mut a = Object::new("A", "T1");
    a.push_property(
        "ref",
        Property::ObjectReference(ObjectReference::Object("B".to_string())),
    );
    graph.add_object(a).unwrap();

    graph.rename("B", "C").unwrap();

    // No property anywhere in the graph should still target the old name.
    for object in graph.objects() {
        for (_, value) in &object.properties {
            assert_ne!(
                value,
                &Property::ObjectReference(ObjectReference::Object("B".to_string()))
            );
        }
    }

    let mut buffer = Cursor::new(Vec::new());
    graph.encode(&mut buffer).unwrap();
    let decoded = Graph::decode(&buffer.into_inner()).unwrap();

    assert!(decoded.get("B").is_err());
    assert!(decoded.get("C").is_ok());
    let a = decoded.get("A").unwrap();
    assert_eq!(
        a.get_property("ref"),
        Some(&Property::ObjectReference(ObjectReference::Object("C".to_string())))
    );
}

#[test]
fn test_rename_does_not_touch_import_references() {
    let mut graph = Graph::new();
    let mut object = Object::new("A", "T1");
    object.export_path = Some("B".to_string());
    object.push_property(
        "ref",
        Property::ImportReference(ImportReference::Import("B".to_string())),
    );
    graph.add_object(object).unwrap();
    graph.add_object(Object::new("B", "T2")).unwrap();

    graph.rename("B", "C").unwrap();

    // An ImportReference names another file's export path, not an object
    // name in this graph, so renaming "B" must not rewrite it even though
    // the import path happens to read "B" too.
    let a = graph.get("A").unwrap();
    assert_eq!(
        a.get_property("ref"),
        Some(&Property::ImportReference(ImportReference::Import("B".to_string())))
    );
}
