//
// Copyright 2020 ndfkit Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
//

//! NDFBin encode path, the inverse of `de.rs`.
//!
//! Encoding is two passes. Pass one walks the graph to (re)build every
//! interning table and the import/export tries from scratch, ignoring
//! whatever a `Graph`'s tables held after decode: edits made through
//! `Object::push_property`/`Graph::rename`/etc. touch `Property` values
//! directly and never keep the tables in sync, so rebuilding is the only
//! way to guarantee every index the second pass emits is valid. Pass two
//! writes the header, a section directory with placeholder offsets, then
//! each section body, patching the directory once every offset is known.

use std::collections::{HashMap, HashSet};
use std::io::{Seek, SeekFrom, Write};

use crate::error::Result;

use super::document::{
    HEADER_MAGIC_NUMBER, HEADER_VERSION, REFERENCE_DISCRIMINATOR_IMPORT,
    REFERENCE_DISCRIMINATOR_OBJECT, SECTION_CLAS, SECTION_CHNK, SECTION_COUNT, SECTION_EXPR,
    SECTION_IMPR, SECTION_OBJE, SECTION_PROP, SECTION_STRG, SECTION_TAGS, SECTION_TOPO,
    SECTION_TRAN, SENTINEL_INDEX,
};
use super::graph::Graph;
use super::property::{Color, ImportReference, ObjectReference, Property};
use super::tables::Table;
use super::trie::TrieNode;

fn scan_property(value: &Property, strings: &mut Table) -> Result<()> {
    match value {
        Property::String(s) | Property::PathReference(s) => {
            strings.intern(s)?;
        }
        Property::List(items) => {
            for item in items {
                scan_property(item, strings)?;
            }
        }
        Property::Map(pairs) => {
            for (key, value) in pairs {
                scan_property(key, strings)?;
                scan_property(value, strings)?;
            }
        }
        Property::Pair(first, second) => {
            scan_property(first, strings)?;
            scan_property(second, strings)?;
        }
        _ => {}
    }
    Ok(())
}

fn scan_trie(node: &TrieNode, tran_fragments: &mut Table) -> Result<()> {
    tran_fragments.intern(&node.fragment)?;
    for child in &node.children {
        scan_trie(child, tran_fragments)?;
    }
    Ok(())
}

fn begin_section(writer: &mut (impl Write + Seek)) -> Result<u64> {
    let pos = writer.stream_position()?;
    writer.write_all(&0u32.to_le_bytes())?;
    Ok(pos)
}

fn end_section(writer: &mut (impl Write + Seek), length_pos: u64) -> Result<()> {
    let end = writer.stream_position()?;
    let length = (end - length_pos - 4) as u32;
    writer.seek(SeekFrom::Start(length_pos))?;
    writer.write_all(&length.to_le_bytes())?;
    writer.seek(SeekFrom::Start(end))?;
    Ok(())
}

fn write_length_prefixed_string(writer: &mut impl Write, value: &str) -> Result<()> {
    writer.write_all(&(value.len() as u32).to_le_bytes())?;
    writer.write_all(value.as_bytes())?;
    Ok(())
}

fn write_table_section(writer: &mut (impl Write + Seek), table: &Table) -> Result<()> {
    writer.write_all(&(table.len() as u32).to_le_bytes())?;
    for value in table.iter() {
        write_length_prefixed_string(writer, value)?;
    }
    Ok(())
}

fn write_property_value(
    writer: &mut (impl Write + Seek),
    value: &Property,
    strings: &mut Table,
    graph: &Graph,
    class_names: &mut Table,
    import_index_of: &HashMap<&str, u32>,
) -> Result<()> {
    match value {
        Property::Bool(b) => writer.write_all(&[*b as u8])?,
        Property::UInt8(v) => writer.write_all(&[*v])?,
        Property::Int32(v) => writer.write_all(&v.to_le_bytes())?,
        Property::UInt32(v) => writer.write_all(&v.to_le_bytes())?,
        Property::Float32(v) => writer.write_all(&v.into_inner().to_le_bytes())?,
        Property::Float64(v) => writer.write_all(&v.into_inner().to_le_bytes())?,
        Property::String(s) => {
            let index = strings.intern(s)?;
            writer.write_all(&index.to_le_bytes())?;
        }
        Property::WideString(s) => {
            let units: Vec<u16> = s.encode_utf16().collect();
            let byte_len = (units.len() * 2) as u32;
            writer.write_all(&byte_len.to_le_bytes())?;
            for unit in units {
                writer.write_all(&unit.to_le_bytes())?;
            }
        }
        Property::ObjectReference(reference) => {
            writer.write_all(&REFERENCE_DISCRIMINATOR_OBJECT.to_le_bytes())?;
            match reference {
                ObjectReference::Object(name) => {
                    let (object_index, class_index) = match (
                        graph.object_index_of(name),
                        graph.get(name).ok(),
                    ) {
                        (Some(index), Some(object)) => {
                            (index as u32, class_names.intern(&object.class_name)?)
                        }
                        _ => (SENTINEL_INDEX, SENTINEL_INDEX),
                    };
                    writer.write_all(&object_index.to_le_bytes())?;
                    writer.write_all(&class_index.to_le_bytes())?;
                }
                ObjectReference::Dangling => {
                    writer.write_all(&SENTINEL_INDEX.to_le_bytes())?;
                    writer.write_all(&SENTINEL_INDEX.to_le_bytes())?;
                }
            }
        }
        Property::ImportReference(reference) => {
            writer.write_all(&REFERENCE_DISCRIMINATOR_IMPORT.to_le_bytes())?;
            let import_index = match reference {
                ImportReference::Import(path) => {
                    import_index_of.get(path.as_str()).copied().unwrap_or(SENTINEL_INDEX)
                }
                ImportReference::Dangling => SENTINEL_INDEX,
            };
            writer.write_all(&import_index.to_le_bytes())?;
        }
        Property::F32Vec3(v) => {
            writer.write_all(&v.x.to_le_bytes())?;
            writer.write_all(&v.y.to_le_bytes())?;
            writer.write_all(&v.z.to_le_bytes())?;
        }
        Property::F32Vec4(v) => {
            writer.write_all(&v.x.to_le_bytes())?;
            writer.write_all(&v.y.to_le_bytes())?;
            writer.write_all(&v.z.to_le_bytes())?;
            writer.write_all(&v.w.to_le_bytes())?;
        }
        Property::Color(Color { r, g, b, a }) => {
            writer.write_all(&[*b, *g, *r, *a])?;
        }
        Property::S32Vec3(v) => {
            writer.write_all(&v.x.to_le_bytes())?;
            writer.write_all(&v.y.to_le_bytes())?;
            writer.write_all(&v.z.to_le_bytes())?;
        }
        Property::List(items) => {
            writer.write_all(&(items.len() as u32).to_le_bytes())?;
            for item in items {
                writer.write_all(&item.property_type().tag().to_le_bytes())?;
                write_property_value(writer, item, strings, graph, class_names, import_index_of)?;
            }
        }
        Property::Map(pairs) => {
            writer.write_all(&(pairs.len() as u32).to_le_bytes())?;
            for (key, value) in pairs {
                writer.write_all(&key.property_type().tag().to_le_bytes())?;
                write_property_value(writer, key, strings, graph, class_names, import_index_of)?;
                writer.write_all(&value.property_type().tag().to_le_bytes())?;
                write_property_value(writer, value, strings, graph, class_names, import_index_of)?;
            }
        }
        Property::Int16(v) => writer.write_all(&v.to_le_bytes())?,
        Property::UInt16(v) => writer.write_all(&v.to_le_bytes())?,
        Property::Guid(bytes) => writer.write_all(bytes)?,
        Property::PathReference(s) => {
            let index = strings.intern(s)?;
            writer.write_all(&index.to_le_bytes())?;
        }
        Property::LocalisationHash(bytes) => writer.write_all(bytes)?,
        Property::S32Vec2(v) => {
            writer.write_all(&v.x.to_le_bytes())?;
            writer.write_all(&v.y.to_le_bytes())?;
        }
        Property::F32Vec2(v) => {
            writer.write_all(&v.x.to_le_bytes())?;
            writer.write_all(&v.y.to_le_bytes())?;
        }
        Property::Pair(first, second) => {
            writer.write_all(&first.property_type().tag().to_le_bytes())?;
            write_property_value(writer, first, strings, graph, class_names, import_index_of)?;
            writer.write_all(&second.property_type().tag().to_le_bytes())?;
            write_property_value(writer, second, strings, graph, class_names, import_index_of)?;
        }
        Property::Hash(bytes) => writer.write_all(bytes)?,
    }
    Ok(())
}

/// Writes one trie node (and its descendants) using the
/// `tran_index, leaf_index, child_count, [child_offset]*` layout; child
/// offsets are placeholders until every descendant has been written, then
/// patched in place.
fn write_trie_node(
    writer: &mut (impl Write + Seek),
    node: &TrieNode,
    tran_fragments: &mut Table,
) -> Result<()> {
    let tran_index = tran_fragments.intern(&node.fragment)?;
    writer.write_all(&tran_index.to_le_bytes())?;
    writer.write_all(&node.leaf.unwrap_or(SENTINEL_INDEX).to_le_bytes())?;

    let children = node.sorted_children();
    writer.write_all(&(children.len() as u32).to_le_bytes())?;

    let offsets_pos = writer.stream_position()?;
    for _ in &children {
        writer.write_all(&0u32.to_le_bytes())?;
    }
    let children_start = writer.stream_position()?;

    let mut offsets = Vec::with_capacity(children.len());
    for child in &children {
        let start = writer.stream_position()?;
        offsets.push((start - children_start) as u32);
        write_trie_node(writer, child, tran_fragments)?;
    }

    let end = writer.stream_position()?;
    writer.seek(SeekFrom::Start(offsets_pos))?;
    for offset in offsets {
        writer.write_all(&offset.to_le_bytes())?;
    }
    writer.seek(SeekFrom::Start(end))?;
    Ok(())
}

fn write_trie_section(
    writer: &mut (impl Write + Seek),
    root: &TrieNode,
    tran_fragments: &mut Table,
) -> Result<()> {
    writer.write_all(&(root.children.len() as u32).to_le_bytes())?;
    for child in root.sorted_children() {
        write_trie_node(writer, child, tran_fragments)?;
    }
    Ok(())
}

/// Encodes `graph` as a complete NDFBin document.
pub fn encode<W: Write + Seek>(graph: &Graph, writer: &mut W) -> Result<()> {
    let mut class_names = Table::new();
    let mut property_names = Table::new();
    let mut strings = Table::new();
    let mut tran_fragments = Table::new();

    for object in graph.objects() {
        strings.intern(&object.name)?;
        class_names.intern(&object.class_name)?;
        for (name, value) in &object.properties {
            property_names.intern(name)?;
            scan_property(value, &mut strings)?;
        }
    }

    let import_index_of: HashMap<&str, u32> = graph
        .imports
        .iter()
        .enumerate()
        .map(|(index, path)| (path.as_str(), index as u32))
        .collect();

    let mut export_trie = TrieNode::root();
    for (index, object) in graph.objects().iter().enumerate() {
        if let Some(path) = &object.export_path {
            export_trie.insert(path, index as u32);
        }
    }
    let mut import_trie = TrieNode::root();
    for (index, path) in graph.imports.iter().enumerate() {
        import_trie.insert(path, index as u32);
    }
    for child in &export_trie.children {
        scan_trie(child, &mut tran_fragments)?;
    }
    for child in &import_trie.children {
        scan_trie(child, &mut tran_fragments)?;
    }

    log::debug!(
        "encoding NDFBin graph: {} objects, {} imports",
        graph.objects().len(),
        graph.imports.len()
    );

    writer.write_all(HEADER_MAGIC_NUMBER)?;
    writer.write_all(&HEADER_VERSION.to_le_bytes())?;
    writer.write_all(&(SECTION_COUNT as u32).to_le_bytes())?;

    let directory_pos = writer.stream_position()?;
    for tag in SECTION_TAGS {
        writer.write_all(tag.as_slice())?;
        writer.write_all(&0u32.to_le_bytes())?;
    }

    let mut section_offsets = [0u32; SECTION_COUNT];

    // OBJE
    section_offsets[SECTION_OBJE] = writer.stream_position()? as u32;
    let length_pos = begin_section(writer)?;
    writer.write_all(&(graph.objects().len() as u32).to_le_bytes())?;
    for object in graph.objects() {
        let name_index = strings.intern(&object.name)?;
        let class_index = class_names.intern(&object.class_name)?;
        writer.write_all(&name_index.to_le_bytes())?;
        writer.write_all(&class_index.to_le_bytes())?;
        for (name, value) in &object.properties {
            let property_index = property_names.intern(name)?;
            writer.write_all(&property_index.to_le_bytes())?;
            writer.write_all(&value.property_type().tag().to_le_bytes())?;
            write_property_value(
                writer,
                value,
                &mut strings,
                graph,
                &mut class_names,
                &import_index_of,
            )?;
        }
        writer.write_all(&SENTINEL_INDEX.to_le_bytes())?;
    }
    end_section(writer, length_pos)?;

    // TOPO
    section_offsets[SECTION_TOPO] = writer.stream_position()? as u32;
    let length_pos = begin_section(writer)?;
    let top_indices: Vec<u32> = graph
        .objects()
        .iter()
        .enumerate()
        .filter(|(_, object)| object.is_top_object)
        .map(|(index, _)| index as u32)
        .collect();
    writer.write_all(&(top_indices.len() as u32).to_le_bytes())?;
    for index in top_indices {
        writer.write_all(&index.to_le_bytes())?;
    }
    end_section(writer, length_pos)?;

    // CHNK: per-class, first-seen-order lists of property-name indices.
    section_offsets[SECTION_CHNK] = writer.stream_position()? as u32;
    let length_pos = begin_section(writer)?;
    let mut chunks: Vec<Vec<u32>> = vec![Vec::new(); class_names.len()];
    let mut seen: Vec<HashSet<u32>> = vec![HashSet::new(); class_names.len()];
    for object in graph.objects() {
        let class_index = class_names.intern(&object.class_name)? as usize;
        for (name, _) in &object.properties {
            let property_index = property_names.intern(name)?;
            if seen[class_index].insert(property_index) {
                chunks[class_index].push(property_index);
            }
        }
    }
    writer.write_all(&(chunks.len() as u32).to_le_bytes())?;
    for chunk in &chunks {
        writer.write_all(&(chunk.len() as u32).to_le_bytes())?;
        for property_index in chunk {
            writer.write_all(&property_index.to_le_bytes())?;
        }
    }
    end_section(writer, length_pos)?;

    // CLAS / PROP / STRG / TRAN
    section_offsets[SECTION_CLAS] = writer.stream_position()? as u32;
    let length_pos = begin_section(writer)?;
    write_table_section(writer, &class_names)?;
    end_section(writer, length_pos)?;

    section_offsets[SECTION_PROP] = writer.stream_position()? as u32;
    let length_pos = begin_section(writer)?;
    write_table_section(writer, &property_names)?;
    end_section(writer, length_pos)?;

    section_offsets[SECTION_STRG] = writer.stream_position()? as u32;
    let length_pos = begin_section(writer)?;
    write_table_section(writer, &strings)?;
    end_section(writer, length_pos)?;

    section_offsets[SECTION_TRAN] = writer.stream_position()? as u32;
    let length_pos = begin_section(writer)?;
    write_table_section(writer, &tran_fragments)?;
    end_section(writer, length_pos)?;

    // IMPR / EXPR
    section_offsets[SECTION_IMPR] = writer.stream_position()? as u32;
    let length_pos = begin_section(writer)?;
    write_trie_section(writer, &import_trie, &mut tran_fragments)?;
    end_section(writer, length_pos)?;

    section_offsets[SECTION_EXPR] = writer.stream_position()? as u32;
    let length_pos = begin_section(writer)?;
    write_trie_section(writer, &export_trie, &mut tran_fragments)?;
    end_section(writer, length_pos)?;

    let end = writer.stream_position()?;
    writer.seek(SeekFrom::Start(directory_pos))?;
    for (i, tag) in SECTION_TAGS.iter().enumerate() {
        writer.write_all(tag.as_slice())?;
        writer.write_all(&section_offsets[i].to_le_bytes())?;
    }
    writer.seek(SeekFrom::Start(end))?;

    Ok(())
}
