//
// Copyright 2020 ndfkit Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
//

//! EDat encode path: dictionary trie build with back-patched `entry_size`
//! fields, sector-aligned file-payload emission, and header finalization
//! for the dictionary and file-payload regions.

use std::io::{Seek, SeekFrom, Write};

use crate::error::Result;
use crate::md5::Md5;

use super::alphabet::compare_paths;
use super::document::{
    pad_to_sector, Header, FileEntry, DICTIONARY_PREAMBLE_PAD_SIZE, DICTIONARY_SENTINEL_EMPTY,
    DICTIONARY_SENTINEL_NON_EMPTY, FILE_ENTRY_SIZE, HEADER_MAGIC_NUMBER, HEADER_SIZE,
    HEADER_VERSION,
};
use super::trie::TrieNode;
use super::Archive;

/// Writes a path fragment as a 2-byte-aligned null-terminated string with
/// `/` converted to `\` on the wire, returning the bytes written.
fn write_aligned_cstring<W: Write>(writer: &mut W, fragment: &[u8]) -> Result<usize> {
    let mut bytes: Vec<u8> = fragment.iter().map(|&b| if b == b'/' { b'\\' } else { b }).collect();
    bytes.push(0);
    if bytes.len() % 2 != 0 {
        bytes.push(0);
    }
    writer.write_all(&bytes)?;
    Ok(bytes.len())
}

/// Recursively writes the trie depth-first, back-patching each interior
/// node's `entry_size` once its subtree has been written. Mirrors
/// `EDat::buildTrie`.
fn build_trie<W: Write + Seek>(
    writer: &mut W,
    node: &TrieNode,
    path: &str,
    archive: &Archive,
) -> Result<()> {
    let parts = node.get_parts();
    let last_index = parts.len().saturating_sub(1);

    for (i, (fragment, child)) in parts.into_iter().enumerate() {
        let is_last_item = i == last_index;

        if child.is_leaf() {
            let fragment_str = std::str::from_utf8(&fragment).expect("validated alphabet bytes");
            let mut current_path = path.to_string();
            current_path.push_str(fragment_str);

            let entry = archive
                .entries
                .get(&current_path)
                .unwrap_or_else(|| panic!("trie path {current_path:?} missing its file entry"));

            let path_size: u32 = 0;
            let entry_size: u32 = if is_last_item {
                0
            } else {
                (8 + FILE_ENTRY_SIZE) as u32 + aligned_len(&fragment)
            };

            writer.write_all(&path_size.to_le_bytes())?;
            writer.write_all(&entry_size.to_le_bytes())?;
            write_file_entry(writer, entry)?;
            write_aligned_cstring(writer, &fragment)?;
        } else {
            let offset_part = writer.stream_position()?;
            let path_size = (8 + aligned_len(&fragment)) as u32;
            let entry_size_placeholder: u32 = 0;

            writer.write_all(&path_size.to_le_bytes())?;
            writer.write_all(&entry_size_placeholder.to_le_bytes())?;
            write_aligned_cstring(writer, &fragment)?;

            let mut next_path = path.to_string();
            next_path.push_str(std::str::from_utf8(&fragment).expect("validated alphabet bytes"));
            build_trie(writer, child, &next_path, archive)?;

            if !is_last_item {
                let end_offset = writer.stream_position()?;
                let entry_size = (end_offset - offset_part) as u32;
                writer.seek(SeekFrom::Start(offset_part + 4))?;
                writer.write_all(&entry_size.to_le_bytes())?;
                writer.seek(SeekFrom::Start(end_offset))?;
            }
        }
    }

    Ok(())
}

fn aligned_len(fragment: &[u8]) -> u32 {
    let mut len = fragment.len() + 1;
    if len % 2 != 0 {
        len += 1;
    }
    len as u32
}

fn write_file_entry<W: Write>(writer: &mut W, entry: &FileEntry) -> Result<()> {
    writer.write_all(&entry.offset.to_le_bytes())?;
    writer.write_all(&0u32.to_le_bytes())?;
    writer.write_all(&entry.size.to_le_bytes())?;
    writer.write_all(&0u32.to_le_bytes())?;
    writer.write_all(&entry.checksum)?;
    Ok(())
}

fn write_header<W: Write + Seek>(writer: &mut W, header: &Header) -> Result<()> {
    writer.seek(SeekFrom::Start(0))?;
    writer.write_all(HEADER_MAGIC_NUMBER)?;
    writer.write_all(&HEADER_VERSION.to_le_bytes())?;
    writer.write_all(&[0u8; 17])?;
    writer.write_all(&header.offset_dictionary.to_le_bytes())?;
    writer.write_all(&header.size_dictionary.to_le_bytes())?;
    writer.write_all(&header.offset_files.to_le_bytes())?;
    writer.write_all(&header.size_files.to_le_bytes())?;
    writer.write_all(&[0u8; 4])?;
    writer.write_all(&header.sector_size.to_le_bytes())?;
    writer.write_all(&header.dictionary_md5)?;
    writer.write_all(&[0u8; 959])?;
    Ok(())
}

/// MD5 of `size` bytes of `content`, computed in `sector_size` chunks with
/// the tail chunk zero-padded before hashing.
pub fn checksum_padded(content: &[u8], sector_size: u32) -> [u8; 16] {
    let mut hasher = Md5::new();
    let sector_size = sector_size.max(1) as usize;
    let mut remaining = content;
    while !remaining.is_empty() {
        let chunk_len = remaining.len().min(sector_size);
        let (chunk, rest) = remaining.split_at(chunk_len);
        if chunk_len == sector_size {
            hasher.update(chunk);
        } else {
            let mut padded = chunk.to_vec();
            padded.resize(sector_size, 0);
            hasher.update(&padded);
        }
        remaining = rest;
    }
    hasher.finalize()
}

/// Encodes `archive` to `writer`, using `contents` to look up each entry's
/// file payload by path. Recomputes every offset, size, and checksum from
/// the provided content rather than trusting stale `FileEntry` values,
/// mirroring `EDat::build`'s `read_files` path.
pub fn encode<W: Write + std::io::Read + Seek>(
    writer: &mut W,
    archive: &Archive,
    contents: &dyn Fn(&str) -> Result<Vec<u8>>,
) -> Result<()> {
    let mut paths: Vec<String> = archive.entries.keys().cloned().collect();
    paths.sort_by(|a, b| compare_paths(a, b).expect("archive paths already validated"));

    let mut resolved = Archive::new(archive.sector_size);
    let mut current_offset: u32 = 0;
    for path in &paths {
        let bytes = contents(path)?;
        let size = bytes.len() as u32;
        let checksum = checksum_padded(&bytes, archive.sector_size);
        resolved.entries.insert(
            path.clone(),
            FileEntry {
                offset: current_offset,
                size,
                checksum,
            },
        );
        current_offset += pad_to_sector(size, archive.sector_size);
    }

    writer.seek(SeekFrom::Start(HEADER_SIZE as u64))?;

    let mut header = Header {
        offset_dictionary: HEADER_SIZE as u32,
        size_dictionary: 0,
        offset_files: 0,
        size_files: 0,
        sector_size: archive.sector_size,
        dictionary_md5: [0; 16],
    };

    let sentinel: u32 = if paths.is_empty() {
        DICTIONARY_SENTINEL_EMPTY
    } else {
        DICTIONARY_SENTINEL_NON_EMPTY
    };
    writer.write_all(&sentinel.to_le_bytes())?;
    writer.write_all(&[0u8; DICTIONARY_PREAMBLE_PAD_SIZE])?;

    let offset_trie = writer.stream_position()?;
    if !paths.is_empty() {
        let mut trie = TrieNode::new();
        for path in &paths {
            trie.insert(path);
        }
        build_trie(writer, &trie, "", &resolved)?;
    }
    let end_offset_trie = writer.stream_position()?;
    header.size_dictionary = (end_offset_trie - offset_trie) as u32 + 10;

    header.offset_files = pad_to_sector(
        writer.stream_position()? as u32,
        archive.sector_size,
    );

    // Dictionary MD5 covers the region starting at offset_dictionary,
    // spanning size_dictionary bytes (sentinel + pad + trie).
    writer.seek(SeekFrom::Start(header.offset_dictionary as u64))?;
    let mut dict_bytes = vec![0u8; header.size_dictionary as usize];
    // We just wrote this region in this same writer; re-read it back.
    read_exact_at(writer, header.offset_dictionary as u64, &mut dict_bytes)?;
    let mut hasher = Md5::new();
    hasher.update(&dict_bytes);
    header.dictionary_md5 = hasher.finalize();

    writer.seek(SeekFrom::Start(header.offset_files as u64))?;
    for path in &paths {
        let entry = resolved.entries.get(path).expect("just inserted");
        writer.seek(SeekFrom::Start(
            (header.offset_files + entry.offset) as u64,
        ))?;
        let bytes = contents(path)?;
        writer.write_all(&bytes)?;
        let padded = pad_to_sector(bytes.len() as u32, archive.sector_size) as usize;
        if padded > bytes.len() {
            writer.write_all(&vec![0u8; padded - bytes.len()])?;
        }
    }
    header.size_files = writer.stream_position()? as u32 - header.offset_files;

    write_header(writer, &header)?;

    Ok(())
}

fn read_exact_at<RW: std::io::Read + Seek>(
    stream: &mut RW,
    offset: u64,
    buf: &mut [u8],
) -> Result<()> {
    let current = stream.stream_position()?;
    stream.seek(SeekFrom::Start(offset))?;
    stream.read_exact(buf)?;
    stream.seek(SeekFrom::Start(current))?;
    Ok(())
}
