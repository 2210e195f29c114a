//
// Copyright 2020 ndfkit Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
//

//! The object graph and its edit operations: add, rename, copy, and
//! remove objects, plus reference fixup when a name changes underneath
//! any `ObjectReference`/`ImportReference` that points at it.

use std::collections::HashMap;

use crate::error::{Error, Result};

use super::property::{ImportReference, ObjectReference, Property};
use super::tables::Table;

/// A single object in the graph: a named, classed bag of ordered
/// properties, optionally exported under a hierarchical path.
#[derive(Debug, Clone)]
pub struct Object {
    pub name: String,
    pub class_name: String,
    pub export_path: Option<String>,
    pub is_top_object: bool,
    pub properties: Vec<(String, Property)>,
    /// Derived reverse index `property_name -> position`, rebuilt on load;
    /// never serialized.
    property_map: HashMap<String, usize>,
}

impl Object {
    pub fn new(name: impl Into<String>, class_name: impl Into<String>) -> Self {
        Object {
            name: name.into(),
            class_name: class_name.into(),
            export_path: None,
            is_top_object: false,
            properties: Vec::new(),
            property_map: HashMap::new(),
        }
    }

    /// Appends a property, keeping bit-for-bit property order and the
    /// derived name index in sync.
    pub fn push_property(&mut self, name: impl Into<String>, value: Property) {
        let name = name.into();
        self.property_map.insert(name.clone(), self.properties.len());
        self.properties.push((name, value));
    }

    /// Looks up a property by name via the derived reverse index.
    pub fn get_property(&self, name: &str) -> Option<&Property> {
        self.property_map.get(name).map(|&i| &self.properties[i].1)
    }

    fn rebuild_property_map(&mut self) {
        self.property_map = self
            .properties
            .iter()
            .enumerate()
            .map(|(i, (name, _))| (name.clone(), i))
            .collect();
    }
}

/// The full NDFBin object graph: an insertion-ordered collection of
/// [`Object`]s plus the interning tables and import/export tries needed to
/// round-trip a decode/encode cycle.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    objects: Vec<Object>,
    object_index: HashMap<String, usize>,
    pub class_names: Table,
    pub property_names: Table,
    pub strings: Table,
    pub tran_fragments: Table,
    /// Fully joined import paths, in declared order.
    pub imports: Vec<String>,
}

impl Graph {
    pub fn new() -> Self {
        Graph::default()
    }

    pub fn objects(&self) -> &[Object] {
        &self.objects
    }

    pub fn object_index_of(&self, name: &str) -> Option<usize> {
        self.object_index.get(name).copied()
    }

    pub fn get(&self, name: &str) -> Result<&Object> {
        self.object_index
            .get(name)
            .map(|&i| &self.objects[i])
            .ok_or_else(|| Error::ObjectNotFound(name.to_string()))
    }

    pub fn get_mut(&mut self, name: &str) -> Result<&mut Object> {
        let index = *self
            .object_index
            .get(name)
            .ok_or_else(|| Error::ObjectNotFound(name.to_string()))?;
        Ok(&mut self.objects[index])
    }

    /// Adds `object` to the graph. Fails if its name is already present.
    pub fn add_object(&mut self, object: Object) -> Result<()> {
        if self.object_index.contains_key(&object.name) {
            return Err(Error::ObjectAlreadyExists(object.name));
        }
        self.object_index.insert(object.name.clone(), self.objects.len());
        self.objects.push(object);
        Ok(())
    }

    /// Renames `old` to `new`, then rewrites every `ObjectReference` in the
    /// graph that pointed to `old`'s name to point at `new` instead.
    /// `ImportReference` values are untouched, since they name another
    /// file's export path rather than this graph's object names.
    pub fn rename(&mut self, old: &str, new: &str) -> Result<()> {
        if self.object_index.contains_key(new) {
            log::warn!("rename: object {new} already exists");
            return Err(Error::ObjectAlreadyExists(new.to_string()));
        }
        let index = *self
            .object_index
            .get(old)
            .ok_or_else(|| {
                log::warn!("rename: object {old} does not exist");
                Error::ObjectNotFound(old.to_string())
            })?;

        self.objects[index].name = new.to_string();
        self.object_index.remove(old);
        self.object_index.insert(new.to_string(), index);

        for object in &mut self.objects {
            fix_references(&mut object.properties, old, new);
        }

        Ok(())
    }

    /// Deep-copies `name`'s properties under `new_name`. Export path and
    /// top-object status are not inherited.
    pub fn copy(&mut self, name: &str, new_name: &str) -> Result<()> {
        if self.object_index.contains_key(new_name) {
            log::warn!("copy: object {new_name} already exists");
            return Err(Error::ObjectAlreadyExists(new_name.to_string()));
        }
        let source = self.get(name)?;
        let mut copy = Object::new(new_name, source.class_name.clone());
        copy.properties = source.properties.clone();
        copy.rebuild_property_map();
        self.add_object(copy)
    }

    /// Removes `name` from the graph. Any references pointing to it become
    /// dangling rather than being rewritten; callers that want integrity
    /// must scan before deleting.
    pub fn remove(&mut self, name: &str) -> Result<()> {
        let index = *self
            .object_index
            .get(name)
            .ok_or_else(|| {
                log::warn!("remove: object {name} does not exist");
                Error::ObjectNotFound(name.to_string())
            })?;
        self.objects.remove(index);
        self.object_index.remove(name);
        for (_, existing_index) in self.object_index.iter_mut() {
            if *existing_index > index {
                *existing_index -= 1;
            }
        }
        Ok(())
    }
}

/// Recursively walks `properties`, rewriting any `ObjectReference` pointing
/// to `old` to `new`, descending into `List`/`Map`/`Pair`. `ImportReference`
/// values are untouched: an import reference names another file's export
/// path, a separate namespace from the object name being renamed here.
pub fn fix_references(properties: &mut [(String, Property)], old: &str, new: &str) {
    for (_, property) in properties.iter_mut() {
        fix_reference(property, old, new);
    }
}

fn fix_reference(property: &mut Property, old: &str, new: &str) {
    match property {
        Property::ObjectReference(ObjectReference::Object(name)) if name == old => {
            *name = new.to_string();
        }
        Property::List(items) => {
            for item in items {
                fix_reference(item, old, new);
            }
        }
        Property::Map(pairs) => {
            for (key, value) in pairs {
                fix_reference(key, old, new);
                fix_reference(value, old, new);
            }
        }
        Property::Pair(first, second) => {
            fix_reference(first, old, new);
            fix_reference(second, old, new);
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_object_rejects_duplicate_name() {
        let mut graph = Graph::new();
        graph.add_object(Object::new("Unit_1", "TUnitDescriptor")).unwrap();
        assert!(matches!(
            graph.add_object(Object::new("Unit_1", "TUnitDescriptor")),
            Err(Error::ObjectAlreadyExists(_))
        ));
    }

    #[test]
    fn test_rename_updates_object_reference() {
        let mut graph = Graph::new();
        graph.add_object(Object::new("Unit_1", "TUnitDescriptor")).unwrap();
        let mut referrer = Object::new("Unit_2", "TUnitDescriptor");
        referrer.push_property(
            "Target",
            Property::ObjectReference(ObjectReference::Object("Unit_1".to_string())),
        );
        graph.add_object(referrer).unwrap();

        graph.rename("Unit_1", "Unit_Renamed").unwrap();

        assert!(graph.get("Unit_1").is_err());
        assert!(graph.get("Unit_Renamed").is_ok());
        let referrer = graph.get("Unit_2").unwrap();
        assert_eq!(
            referrer.get_property("Target"),
            Some(&Property::ObjectReference(ObjectReference::Object(
                "Unit_Renamed".to_string()
            )))
        );
    }

    #[test]
    fn test_rename_fails_if_target_exists() {
        let mut graph = Graph::new();
        graph.add_object(Object::new("A", "T")).unwrap();
        graph.add_object(Object::new("B", "T")).unwrap();
        assert!(matches!(
            graph.rename("A", "B"),
            Err(Error::ObjectAlreadyExists(_))
        ));
    }

    #[test]
    fn test_copy_does_not_inherit_export_path() {
        let mut graph = Graph::new();
        let mut source = Object::new("A", "T");
        source.export_path = Some("Some/Path".to_string());
        source.push_property("Value", Property::Bool(true));
        graph.add_object(source).unwrap();

        graph.copy("A", "B").unwrap();
        let copy = graph.get("B").unwrap();
        assert_eq!(copy.export_path, None);
        assert_eq!(copy.get_property("Value"), Some(&Property::Bool(true)));
    }

    #[test]
    fn test_remove_leaves_dangling_reference() {
        let mut graph = Graph::new();
        graph.add_object(Object::new("A", "T")).unwrap();
        let mut referrer = Object::new("B", "T");
        referrer.push_property(
            "Target",
            Property::ObjectReference(ObjectReference::Object("A".to_string())),
        );
        graph.add_object(referrer).unwrap();

        graph.remove("A").unwrap();

        assert!(graph.get("A").is_err());
        let referrer = graph.get("B").unwrap();
        assert_eq!(
            referrer.get_property("Target"),
            Some(&Property::ObjectReference(ObjectReference::Object("A".to_string())))
        );
    }

    #[test]
    fn test_fix_references_descends_into_list_and_pair() {
        let mut properties = vec![(
            "Items".to_string(),
            Property::List(vec![
                Property::ObjectReference(ObjectReference::Object("Old".to_string())),
                Property::Pair(
                    Box::new(Property::ObjectReference(ObjectReference::Object("Old".to_string()))),
                    Box::new(Property::Bool(false)),
                ),
            ]),
        )];
        fix_references(&mut properties, "Old", "New");
        if let Property::List(items) = &properties[0].1 {
            assert_eq!(
                items[0],
                Property::ObjectReference(ObjectReference::Object("New".to_string()))
            );
            if let Property::Pair(first, _) = &items[1] {
                assert_eq!(
                    **first,
                    Property::ObjectReference(ObjectReference::Object("New".to_string()))
                );
            } else {
                panic!("expected Pair");
            }
        } else {
            panic!("expected List");
        }
    }
}
