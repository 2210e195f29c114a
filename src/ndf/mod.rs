//
// Copyright 2020 ndfkit Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
//

//! NDFBin: a typed, heterogeneous object-graph binary format.

pub mod de;
pub mod document;
pub mod graph;
pub mod property;
pub mod ser;
pub mod tables;
pub mod trie;

pub use document::PropertyType;
pub use graph::{fix_references, Graph, Object};
pub use property::{
    Color, F32Vec2, F32Vec3, F32Vec4, ImportReference, ObjectReference, Property, S32Vec2, S32Vec3,
};

use std::io::{Seek, Write};

use crate::error::Result;

impl Graph {
    /// Decodes a complete NDFBin document.
    pub fn decode(bytes: &[u8]) -> Result<Graph> {
        de::decode(bytes)
    }

    /// Encodes this graph as a complete NDFBin document.
    pub fn encode<W: Write + Seek>(&self, writer: &mut W) -> Result<()> {
        ser::encode(self, writer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_round_trip_objects_with_references_and_containers() {
        let mut graph = Graph::new();

        let mut weapon = Object::new("Weapon_Rifle", "TWeaponDescriptor");
        weapon.push_property("Damage", Property::Float32(12.5.into()));
        weapon.push_property(
            "Tags",
            Property::List(vec![
                Property::String("Infantry".to_string()),
                Property::String("Standard".to_string()),
            ]),
        );
        weapon.is_top_object = true;
        graph.add_object(weapon).unwrap();

        let mut unit = Object::new("Unit_Soldier", "TUnitDescriptor");
        unit.push_property(
            "PrimaryWeapon",
            Property::ObjectReference(ObjectReference::Object("Weapon_Rifle".to_string())),
        );
        unit.push_property(
            "Tint",
            Property::Color(Color {
                r: 10,
                g: 20,
                b: 30,
                a: 255,
            }),
        );
        unit.push_property(
            "Budget",
            Property::Pair(
                Box::new(Property::String("Cost".to_string())),
                Box::new(Property::Int32(200)),
            ),
        );
        unit.is_top_object = true;
        unit.export_path = Some("Units/Soldier".to_string());
        graph.add_object(unit).unwrap();

        let mut buffer = Cursor::new(Vec::new());
        graph.encode(&mut buffer).unwrap();
        let decoded = Graph::decode(&buffer.into_inner()).unwrap();

        let weapon = decoded.get("Weapon_Rifle").unwrap();
        assert_eq!(weapon.get_property("Damage"), Some(&Property::Float32(12.5.into())));
        assert!(matches!(weapon.get_property("Tags"), Some(Property::List(items)) if items.len() == 2));

        let unit = decoded.get("Unit_Soldier").unwrap();
        assert_eq!(
            unit.get_property("PrimaryWeapon"),
            Some(&Property::ObjectReference(ObjectReference::Object(
                "Weapon_Rifle".to_string()
            )))
        );
        assert_eq!(
            unit.get_property("Tint"),
            Some(&Property::Color(Color {
                r: 10,
                g: 20,
                b: 30,
                a: 255
            }))
        );
        assert_eq!(unit.export_path.as_deref(), Some("Units/Soldier"));
    }

    #[test]
    fn test_round_trip_dangling_references_are_preserved() {
        let mut graph = Graph::new();
        let mut object = Object::new("Unit_Orphan", "TUnitDescriptor");
        object.push_property(
            "Leader",
            Property::ObjectReference(ObjectReference::Dangling),
        );
        object.push_property(
            "Template",
            Property::ImportReference(ImportReference::Dangling),
        );
        graph.add_object(object).unwrap();

        let mut buffer = Cursor::new(Vec::new());
        graph.encode(&mut buffer).unwrap();
        let decoded = Graph::decode(&buffer.into_inner()).unwrap();

        let object = decoded.get("Unit_Orphan").unwrap();
        assert_eq!(
            object.get_property("Leader"),
            Some(&Property::ObjectReference(ObjectReference::Dangling))
        );
        assert_eq!(
            object.get_property("Template"),
            Some(&Property::ImportReference(ImportReference::Dangling))
        );
    }

    #[test]
    fn test_round_trip_import_reference() {
        let mut graph = Graph::new();
        graph.imports.push("Common/Templates/BaseUnit".to_string());
        let mut object = Object::new("Unit_Child", "TUnitDescriptor");
        object.push_property(
            "Template",
            Property::ImportReference(ImportReference::Import(
                "Common/Templates/BaseUnit".to_string(),
            )),
        );
        graph.add_object(object).unwrap();

        let mut buffer = Cursor::new(Vec::new());
        graph.encode(&mut buffer).unwrap();
        let decoded = Graph::decode(&buffer.into_inner()).unwrap();

        assert_eq!(decoded.imports, vec!["Common/Templates/BaseUnit".to_string()]);
        let object = decoded.get("Unit_Child").unwrap();
        assert_eq!(
            object.get_property("Template"),
            Some(&Property::ImportReference(ImportReference::Import(
                "Common/Templates/BaseUnit".to_string()
            )))
        );
    }
}
