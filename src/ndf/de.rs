//
// Copyright 2020 ndfkit Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
//

//! NDFBin decode path.
//!
//! Sections are random-accessed via the section directory rather than
//! consumed in a single sequential pass: tables (`CLAS`/`PROP`/`STRG`/
//! `TRAN`) and the import trie are materialized first, so `OBJE` can
//! resolve string/class/import indices as it parses instead of deferring
//! them. Only `ObjectReference` must be patched in a second pass, since an
//! object may reference another object declared later in the stream.

use std::collections::HashMap;

use crate::error::{Error, Result};

use super::document::{
    PropertyType, HEADER_MAGIC_NUMBER, HEADER_VERSION, REFERENCE_DISCRIMINATOR_IMPORT,
    REFERENCE_DISCRIMINATOR_OBJECT, SECTION_CLAS, SECTION_COUNT, SECTION_EXPR, SECTION_IMPR,
    SECTION_OBJE, SECTION_PROP, SECTION_STRG, SECTION_TAGS, SECTION_TOPO, SECTION_TRAN,
    SENTINEL_INDEX,
};
use super::graph::{Graph, Object};
use super::property::{
    Color, F32Vec2, F32Vec3, F32Vec4, ImportReference, ObjectReference, Property, S32Vec2, S32Vec3,
};
use super::tables::Table;

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Cursor { bytes, pos: 0 }
    }

    fn at(bytes: &'a [u8], pos: usize) -> Self {
        Cursor { bytes, pos }
    }

    fn need(&self, n: usize) -> Result<()> {
        if self.bytes.len() < self.pos + n {
            return Err(Error::ShortRead {
                needed: self.pos + n,
                available: self.bytes.len(),
            });
        }
        Ok(())
    }

    fn u32(&mut self) -> Result<u32> {
        self.need(4)?;
        let v = u32::from_le_bytes(self.bytes[self.pos..self.pos + 4].try_into().unwrap());
        self.pos += 4;
        Ok(v)
    }

    fn i32(&mut self) -> Result<i32> {
        Ok(self.u32()? as i32)
    }

    fn u16(&mut self) -> Result<u16> {
        self.need(2)?;
        let v = u16::from_le_bytes(self.bytes[self.pos..self.pos + 2].try_into().unwrap());
        self.pos += 2;
        Ok(v)
    }

    fn i16(&mut self) -> Result<i16> {
        Ok(self.u16()? as i16)
    }

    fn u8(&mut self) -> Result<u8> {
        self.need(1)?;
        let v = self.bytes[self.pos];
        self.pos += 1;
        Ok(v)
    }

    fn f32(&mut self) -> Result<f32> {
        Ok(f32::from_bits(self.u32()?))
    }

    fn f64(&mut self) -> Result<f64> {
        self.need(8)?;
        let v = f64::from_bits(u64::from_le_bytes(
            self.bytes[self.pos..self.pos + 8].try_into().unwrap(),
        ));
        self.pos += 8;
        Ok(v)
    }

    fn bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        self.need(n)?;
        let slice = &self.bytes[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn fixed<const N: usize>(&mut self) -> Result<[u8; N]> {
        Ok(self.bytes(N)?.try_into().unwrap())
    }

    fn length_prefixed_string(&mut self) -> Result<String> {
        let len = self.u32()? as usize;
        let raw = self.bytes(len)?;
        Ok(String::from_utf8_lossy(raw).into_owned())
    }
}

fn parse_table(bytes: &[u8], offset: usize) -> Result<Table> {
    let mut cursor = Cursor::at(bytes, offset);
    let _length = cursor.u32()?;
    let count = cursor.u32()?;
    let mut table = Table::new();
    for _ in 0..count {
        let value = cursor.length_prefixed_string()?;
        table.intern(&value)?;
    }
    Ok(table)
}

/// A property value with object references left unresolved (stored as the
/// raw on-wire index), since the full object name list isn't known until
/// every `OBJE` entry has been parsed.
#[derive(Debug, Clone)]
enum RawProperty {
    Leaf(Property),
    ObjectReference(u32),
    List(Vec<RawProperty>),
    Map(Vec<(RawProperty, RawProperty)>),
    Pair(Box<RawProperty>, Box<RawProperty>),
}

fn resolve_raw(raw: RawProperty, object_names: &[String]) -> Result<Property> {
    Ok(match raw {
        RawProperty::Leaf(property) => property,
        RawProperty::ObjectReference(index) => {
            Property::ObjectReference(if index == SENTINEL_INDEX {
                ObjectReference::Dangling
            } else {
                match object_names.get(index as usize) {
                    Some(name) => ObjectReference::Object(name.clone()),
                    None => {
                        return Err(Error::DanglingObjectReference(format!(
                            "object index {index}"
                        )))
                    }
                }
            })
        }
        RawProperty::List(items) => Property::List(
            items
                .into_iter()
                .map(|p| resolve_raw(p, object_names))
                .collect::<Result<Vec<_>>>()?,
        ),
        RawProperty::Map(pairs) => Property::Map(
            pairs
                .into_iter()
                .map(|(k, v)| Ok((resolve_raw(k, object_names)?, resolve_raw(v, object_names)?)))
                .collect::<Result<Vec<_>>>()?,
        ),
        RawProperty::Pair(first, second) => Property::Pair(
            Box::new(resolve_raw(*first, object_names)?),
            Box::new(resolve_raw(*second, object_names)?),
        ),
    })
}

fn parse_property_value(
    cursor: &mut Cursor,
    property_type: PropertyType,
    strings: &Table,
    imports: &HashMap<u32, String>,
) -> Result<RawProperty> {
    use PropertyType::*;
    Ok(match property_type {
        Bool => RawProperty::Leaf(Property::Bool(cursor.u8()? != 0)),
        UInt8 => RawProperty::Leaf(Property::UInt8(cursor.u8()?)),
        Int32 => RawProperty::Leaf(Property::Int32(cursor.i32()?)),
        UInt32 => RawProperty::Leaf(Property::UInt32(cursor.u32()?)),
        Float32 => RawProperty::Leaf(Property::Float32(cursor.f32()?.into())),
        Float64 => RawProperty::Leaf(Property::Float64(cursor.f64()?.into())),
        String => {
            let index = cursor.u32()?;
            let value = strings.get(index, Error::StringIndexOutOfBounds)?.to_string();
            RawProperty::Leaf(Property::String(value))
        }
        WideString => {
            let byte_len = cursor.u32()? as usize;
            if byte_len % 2 != 0 {
                return Err(Error::OddWideStringLength(byte_len));
            }
            let raw = cursor.bytes(byte_len)?;
            let units: Vec<u16> = raw
                .chunks_exact(2)
                .map(|c| u16::from_le_bytes([c[0], c[1]]))
                .collect();
            let value = String::from_utf16_lossy(&units);
            RawProperty::Leaf(Property::WideString(value))
        }
        Reference => {
            let discriminator = cursor.u32()?;
            if discriminator == REFERENCE_DISCRIMINATOR_OBJECT {
                let object_index = cursor.u32()?;
                let _class_index = cursor.u32()?;
                RawProperty::ObjectReference(object_index)
            } else if discriminator == REFERENCE_DISCRIMINATOR_IMPORT {
                let import_index = cursor.u32()?;
                let reference = if import_index == SENTINEL_INDEX {
                    ImportReference::Dangling
                } else {
                    match imports.get(&import_index) {
                        Some(name) => ImportReference::Import(name.clone()),
                        None => return Err(Error::DanglingImportReference(import_index)),
                    }
                };
                RawProperty::Leaf(Property::ImportReference(reference))
            } else {
                return Err(Error::NotImplemented(discriminator));
            }
        }
        F32Vec3 => RawProperty::Leaf(Property::F32Vec3(super::property::F32Vec3 {
            x: cursor.f32()?,
            y: cursor.f32()?,
            z: cursor.f32()?,
        })),
        F32Vec4 => RawProperty::Leaf(Property::F32Vec4(F32Vec4 {
            x: cursor.f32()?,
            y: cursor.f32()?,
            z: cursor.f32()?,
            w: cursor.f32()?,
        })),
        Color => {
            let b = cursor.u8()?;
            let g = cursor.u8()?;
            let r = cursor.u8()?;
            let a = cursor.u8()?;
            RawProperty::Leaf(Property::Color(Color { r, g, b, a }))
        }
        S32Vec3 => RawProperty::Leaf(Property::S32Vec3(S32Vec3 {
            x: cursor.i32()?,
            y: cursor.i32()?,
            z: cursor.i32()?,
        })),
        List => {
            let count = cursor.u32()?;
            let mut items = Vec::with_capacity(count as usize);
            for _ in 0..count {
                let type_id = cursor.u32()?;
                let element_type = PropertyType::from_tag(type_id)?;
                items.push(parse_property_value(cursor, element_type, strings, imports)?);
            }
            RawProperty::List(items)
        }
        Map => {
            let count = cursor.u32()?;
            let mut pairs = Vec::with_capacity(count as usize);
            for _ in 0..count {
                let key_type = PropertyType::from_tag(cursor.u32()?)?;
                let key = parse_property_value(cursor, key_type, strings, imports)?;
                let value_type = PropertyType::from_tag(cursor.u32()?)?;
                let value = parse_property_value(cursor, value_type, strings, imports)?;
                pairs.push((key, value));
            }
            RawProperty::Map(pairs)
        }
        Int16 => RawProperty::Leaf(Property::Int16(cursor.i16()?)),
        UInt16 => RawProperty::Leaf(Property::UInt16(cursor.u16()?)),
        Guid => RawProperty::Leaf(Property::Guid(cursor.fixed::<16>()?)),
        PathReference => {
            let index = cursor.u32()?;
            let value = strings.get(index, Error::StringIndexOutOfBounds)?.to_string();
            RawProperty::Leaf(Property::PathReference(value))
        }
        LocalisationHash => RawProperty::Leaf(Property::LocalisationHash(cursor.fixed::<8>()?)),
        S32Vec2 => RawProperty::Leaf(Property::S32Vec2(S32Vec2 {
            x: cursor.i32()?,
            y: cursor.i32()?,
        })),
        F32Vec2 => RawProperty::Leaf(Property::F32Vec2(F32Vec2 {
            x: cursor.f32()?,
            y: cursor.f32()?,
        })),
        Pair => {
            let first_type = PropertyType::from_tag(cursor.u32()?)?;
            let first = parse_property_value(cursor, first_type, strings, imports)?;
            let second_type = PropertyType::from_tag(cursor.u32()?)?;
            let second = parse_property_value(cursor, second_type, strings, imports)?;
            RawProperty::Pair(Box::new(first), Box::new(second))
        }
        Hash => RawProperty::Leaf(Property::Hash(cursor.fixed::<16>()?)),
    })
}

/// Walks an import/export trie node, returning `(bytes_consumed, leaves)`
/// where each leaf is `(leaf_index, joined_path)`.
fn parse_trie_node(
    bytes: &[u8],
    offset: usize,
    tran_fragments: &Table,
    ancestors: &mut Vec<String>,
    leaves: &mut Vec<(u32, String)>,
) -> Result<usize> {
    let mut cursor = Cursor::at(bytes, offset);
    let tran_index = cursor.u32()?;
    let leaf_index = cursor.u32()?;
    let child_count = cursor.u32()?;

    let fragment = tran_fragments
        .get(tran_index, Error::TranIndexOutOfBounds)?
        .to_string();

    let mut child_offsets = Vec::with_capacity(child_count as usize);
    for _ in 0..child_count {
        child_offsets.push(cursor.u32()?);
    }
    let children_start = cursor.pos;

    ancestors.push(fragment.clone());
    let mut end = children_start;
    for &child_offset in &child_offsets {
        // child_offset is measured from the end of the offset array,
        // i.e. relative to children_start, not the array's own start.
        let actual = end - children_start;
        if actual as u32 != child_offset {
            return Err(Error::MalformedSectionDirectory);
        }
        let consumed = parse_trie_node(bytes, end, tran_fragments, ancestors, leaves)?;
        end += consumed;
    }
    ancestors.pop();

    if leaf_index != SENTINEL_INDEX {
        let mut path = ancestors.join("/");
        if !path.is_empty() {
            path.push('/');
        }
        path.push_str(&fragment);
        leaves.push((leaf_index, path));
    }

    Ok(end - offset)
}

fn parse_trie_section(bytes: &[u8], offset: usize, tran_fragments: &Table) -> Result<Vec<(u32, String)>> {
    let mut cursor = Cursor::at(bytes, offset);
    let _length = cursor.u32()?;
    let root_count = cursor.u32()?;
    let mut leaves = Vec::new();
    let mut ancestors = Vec::new();
    let mut pos = cursor.pos;
    for _ in 0..root_count {
        let consumed = parse_trie_node(bytes, pos, tran_fragments, &mut ancestors, &mut leaves)?;
        pos += consumed;
    }
    Ok(leaves)
}

struct Directory {
    offsets: [usize; SECTION_COUNT],
}

fn parse_header_and_directory(bytes: &[u8]) -> Result<Directory> {
    let mut cursor = Cursor::new(bytes);
    let magic = cursor.bytes(4)?;
    if magic != HEADER_MAGIC_NUMBER {
        return Err(Error::BadMagic {
            expected: HEADER_MAGIC_NUMBER,
            found: magic.to_vec(),
        });
    }
    let version = cursor.u32()?;
    if version != HEADER_VERSION {
        return Err(Error::UnsupportedVersion(version));
    }
    let section_count = cursor.u32()? as usize;
    if section_count != SECTION_COUNT {
        return Err(Error::MalformedSectionDirectory);
    }

    let mut offsets = [0usize; SECTION_COUNT];
    for (i, expected_tag) in SECTION_TAGS.iter().enumerate() {
        let tag = cursor.bytes(4)?;
        if tag != expected_tag.as_slice() {
            return Err(Error::MalformedSectionDirectory);
        }
        offsets[i] = cursor.u32()? as usize;
    }

    Ok(Directory { offsets })
}

/// Decodes a complete NDFBin document into a [`Graph`].
pub fn decode(bytes: &[u8]) -> Result<Graph> {
    let directory = parse_header_and_directory(bytes)?;

    let class_names = parse_table(bytes, directory.offsets[SECTION_CLAS])?;
    let property_names = parse_table(bytes, directory.offsets[SECTION_PROP])?;
    let strings = parse_table(bytes, directory.offsets[SECTION_STRG])?;
    let tran_fragments = parse_table(bytes, directory.offsets[SECTION_TRAN])?;

    let import_leaves = parse_trie_section(bytes, directory.offsets[SECTION_IMPR], &tran_fragments)?;
    let imports: HashMap<u32, String> = import_leaves.into_iter().collect();

    let mut cursor = Cursor::at(bytes, directory.offsets[SECTION_OBJE]);
    let _length = cursor.u32()?;
    let object_count = cursor.u32()?;

    let mut objects = Vec::with_capacity(object_count as usize);
    let mut raw_properties_per_object: Vec<Vec<(String, RawProperty)>> =
        Vec::with_capacity(object_count as usize);

    for _ in 0..object_count {
        let name_index = cursor.u32()?;
        let class_index = cursor.u32()?;
        let name = strings.get(name_index, Error::StringIndexOutOfBounds)?.to_string();
        let class_name = class_names
            .get(class_index, Error::ClassIndexOutOfBounds)?
            .to_string();

        log::debug!("NDFBin object {name:?} class {class_name:?}");

        let mut raw_properties = Vec::new();
        loop {
            let property_index = cursor.u32()?;
            if property_index == SENTINEL_INDEX {
                break;
            }
            let type_id = cursor.u32()?;
            let property_type = PropertyType::from_tag(type_id)?;
            let property_name = property_names
                .get(property_index, Error::PropertyNameIndexOutOfBounds)?
                .to_string();
            let value = parse_property_value(&mut cursor, property_type, &strings, &imports)?;
            raw_properties.push((property_name, value));
        }

        objects.push(Object::new(name, class_name));
        raw_properties_per_object.push(raw_properties);
    }

    let object_names: Vec<String> = objects.iter().map(|o| o.name.clone()).collect();
    for (object, raw_properties) in objects.iter_mut().zip(raw_properties_per_object) {
        for (name, raw) in raw_properties {
            object.push_property(name, resolve_raw(raw, &object_names)?);
        }
    }

    // TOPO: object indices that are top objects.
    let mut topo_cursor = Cursor::at(bytes, directory.offsets[SECTION_TOPO]);
    let _length = topo_cursor.u32()?;
    let top_count = topo_cursor.u32()?;
    for _ in 0..top_count {
        let index = topo_cursor.u32()?;
        match objects.get_mut(index as usize) {
            Some(object) => object.is_top_object = true,
            None => return Err(Error::ObjectIndexOutOfBounds(index)),
        }
    }

    // EXPR: leaf_index is an object index; assigns that object's export path.
    let export_leaves = parse_trie_section(bytes, directory.offsets[SECTION_EXPR], &tran_fragments)?;
    for (object_index, path) in export_leaves {
        match objects.get_mut(object_index as usize) {
            Some(object) => object.export_path = Some(path),
            None => return Err(Error::ObjectIndexOutOfBounds(object_index)),
        }
    }

    let mut graph = Graph::new();
    graph.class_names = class_names;
    graph.property_names = property_names;
    graph.strings = strings;
    graph.tran_fragments = tran_fragments;
    let mut import_pairs: Vec<(u32, String)> = imports.into_iter().collect();
    import_pairs.sort_by_key(|(index, _)| *index);
    graph.imports = import_pairs.into_iter().map(|(_, path)| path).collect();

    for object in objects {
        graph.add_object(object)?;
    }

    Ok(graph)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_table_reads_length_prefixed_strings() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&0u32.to_le_bytes()); // length, unchecked
        bytes.extend_from_slice(&2u32.to_le_bytes()); // count
        for s in ["alpha", "beta"] {
            bytes.extend_from_slice(&(s.len() as u32).to_le_bytes());
            bytes.extend_from_slice(s.as_bytes());
        }
        let table = parse_table(&bytes, 0).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.get(0, Error::StringIndexOutOfBounds).unwrap(), "alpha");
        assert_eq!(table.get(1, Error::StringIndexOutOfBounds).unwrap(), "beta");
    }
}
