//
// Copyright 2020 ndfkit Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
//

//! EDat decode path: header validation, dictionary trie parse, and file
//! payload extraction from an archive.

use nom::bytes::complete::{tag, take};
use nom::number::complete::le_u32;
use nom::IResult;

use crate::error::{Error, Result};

use super::document::{
    Header, HEADER_MAGIC_NUMBER, HEADER_SIZE, HEADER_VERSION, DICTIONARY_SENTINEL_EMPTY,
    DICTIONARY_SENTINEL_NON_EMPTY, DICTIONARY_PREAMBLE_PAD_SIZE, FILE_ENTRY_SIZE, FileEntry,
};
use super::Archive;

fn parse_header(input: &[u8]) -> Result<Header> {
    fn inner(input: &[u8]) -> IResult<&[u8], Header> {
        let (input, _magic) = tag(HEADER_MAGIC_NUMBER)(input)?;
        let (input, _version) = le_u32(input)?;
        let (input, _pad0) = take(17usize)(input)?;
        let (input, offset_dictionary) = le_u32(input)?;
        let (input, size_dictionary) = le_u32(input)?;
        let (input, offset_files) = le_u32(input)?;
        let (input, size_files) = le_u32(input)?;
        let (input, _pad1) = take(4usize)(input)?;
        let (input, sector_size) = le_u32(input)?;
        let (input, checksum) = take(16usize)(input)?;
        let (input, _pad2) = take(959usize)(input)?;

        let mut dictionary_md5 = [0u8; 16];
        dictionary_md5.copy_from_slice(checksum);

        Ok((
            input,
            Header {
                offset_dictionary,
                size_dictionary,
                offset_files,
                size_files,
                sector_size,
                dictionary_md5,
            },
        ))
    }

    let (_, header) =
        inner(input).map_err(|_| Error::Eof("edat header"))?;
    Ok(header)
}

fn validate_header(bytes: &[u8], header: &Header) -> Result<()> {
    if &bytes[0..4] != HEADER_MAGIC_NUMBER {
        return Err(Error::BadMagic {
            expected: HEADER_MAGIC_NUMBER,
            found: bytes[0..4].to_vec(),
        });
    }
    let version = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
    if version != HEADER_VERSION {
        return Err(Error::UnsupportedVersion(version));
    }
    for (name, range) in [
        ("pad0", 8..25),
        ("pad1", 41..45),
        ("pad2", 65..HEADER_SIZE),
    ] {
        if bytes[range.clone()].iter().any(|&b| b != 0) {
            log::warn!("EDat header reserved region {name} contains non-zero bytes");
            return Err(Error::ReservedNotZero {
                offset: range.start,
            });
        }
    }
    if header.offset_dictionary != HEADER_SIZE as u32 {
        return Err(Error::MalformedTrieNode(0));
    }
    Ok(())
}

fn parse_file_entry(input: &[u8]) -> Result<FileEntry> {
    if input.len() < FILE_ENTRY_SIZE {
        return Err(Error::ShortRead {
            needed: FILE_ENTRY_SIZE,
            available: input.len(),
        });
    }
    let offset = u32::from_le_bytes([input[0], input[1], input[2], input[3]]);
    let size = u32::from_le_bytes([input[8], input[9], input[10], input[11]]);
    let mut checksum = [0u8; 16];
    checksum.copy_from_slice(&input[16..32]);
    Ok(FileEntry {
        offset,
        size,
        checksum,
    })
}

/// Reads a null-terminated string starting at `pos`, padding the cursor to
/// the next even offset after the terminator (the "2-byte-aligned"
/// fragment encoding used throughout the dictionary).
fn read_aligned_cstring(bytes: &[u8], pos: usize) -> Result<(String, usize)> {
    let nul = bytes[pos..]
        .iter()
        .position(|&b| b == 0)
        .ok_or(Error::Eof("null-terminated path fragment"))?;
    let raw = &bytes[pos..pos + nul];
    let mut end = pos + nul + 1;
    if (end - pos) % 2 != 0 {
        end += 1;
    }
    let text = raw
        .iter()
        .map(|&b| b as char)
        .collect::<String>()
        .replace('\\', "/");
    Ok((text, end))
}

/// Recursive depth-first dictionary parse, mirroring `EDat::parsePath`.
fn parse_path(
    bytes: &[u8],
    archive: &mut Archive,
    path: &str,
    mut pos: usize,
    ending: usize,
) -> Result<()> {
    while pos < ending {
        let node_start = pos;
        if bytes.len() < pos + 8 {
            return Err(Error::Eof("trie node header"));
        }
        let path_size = u32::from_le_bytes([bytes[pos], bytes[pos + 1], bytes[pos + 2], bytes[pos + 3]]);
        let entry_size = u32::from_le_bytes([
            bytes[pos + 4],
            bytes[pos + 5],
            bytes[pos + 6],
            bytes[pos + 7],
        ]);
        pos += 8;

        let endpos = if entry_size != 0 {
            node_start + entry_size as usize
        } else {
            ending
        };

        if path_size != 0 && pos != ending {
            let (fragment, next_pos) = read_aligned_cstring(bytes, pos)?;
            if next_pos != node_start + path_size as usize {
                return Err(Error::MalformedTrieNode(node_start));
            }
            let mut subpath = path.to_string();
            subpath.push_str(&fragment);
            parse_path(bytes, archive, &subpath, next_pos, endpos)?;
            pos = endpos;
        } else {
            let entry = parse_file_entry(&bytes[pos..])?;
            pos += FILE_ENTRY_SIZE;
            let (fragment, next_pos) = read_aligned_cstring(bytes, pos)?;

            let mut full_path = path.to_string();
            full_path.push_str(&fragment);
            log::debug!("EDat dictionary leaf {full_path:?} offset={:#x} size={:#x}", entry.offset, entry.size);
            archive.entries.insert(full_path, entry);

            pos = next_pos;
        }

        if pos != endpos {
            return Err(Error::MalformedTrieNode(node_start));
        }
    }
    Ok(())
}

/// Decodes a full EDat archive, returning its dictionary and raw payload
/// bytes (the caller decides whether/where to extract file contents).
pub fn decode(bytes: &[u8]) -> Result<(Archive, Vec<u8>)> {
    if bytes.len() < HEADER_SIZE {
        return Err(Error::ShortRead {
            needed: HEADER_SIZE,
            available: bytes.len(),
        });
    }
    let header = parse_header(&bytes[..HEADER_SIZE])?;
    validate_header(bytes, &header)?;

    let mut archive = Archive::new(header.sector_size);

    if header.size_dictionary == 0 {
        return Ok((archive, bytes[header.offset_files as usize..].to_vec()));
    }

    let dict_start = header.offset_dictionary as usize;
    if bytes.len() < dict_start + 4 {
        return Err(Error::Eof("dictionary sentinel"));
    }
    let sentinel = u32::from_le_bytes([
        bytes[dict_start],
        bytes[dict_start + 1],
        bytes[dict_start + 2],
        bytes[dict_start + 3],
    ]);

    if sentinel == DICTIONARY_SENTINEL_EMPTY {
        return Ok((archive, bytes[header.offset_files as usize..].to_vec()));
    }
    if sentinel != DICTIONARY_SENTINEL_NON_EMPTY {
        return Err(Error::BadDictionarySentinel(sentinel));
    }

    let pad_start = dict_start + 4;
    if bytes[pad_start..pad_start + DICTIONARY_PREAMBLE_PAD_SIZE]
        .iter()
        .any(|&b| b != 0)
    {
        return Err(Error::ReservedNotZero { offset: pad_start });
    }

    let trie_start = pad_start + DICTIONARY_PREAMBLE_PAD_SIZE;
    let dict_end = dict_start + header.size_dictionary as usize;

    parse_path(bytes, &mut archive, "", trie_start, dict_end)?;

    // Verify the dictionary MD5 against the header before trusting entries.
    let recomputed = {
        let mut hasher = crate::md5::Md5::new();
        hasher.update(&bytes[dict_start..dict_end]);
        hasher.finalize()
    };
    if recomputed != header.dictionary_md5 {
        log::warn!(
            "EDat dictionary checksum mismatch: header {}, recomputed {}",
            crate::md5::hex(&header.dictionary_md5),
            crate::md5::hex(&recomputed)
        );
    }

    Ok((archive, bytes[header.offset_files as usize..].to_vec()))
}

/// Extracts the content of a single file entry from the archive's
/// file-payload region, given the full archive bytes.
pub fn extract_file<'a>(bytes: &'a [u8], header: &Header, entry: &FileEntry) -> Result<&'a [u8]> {
    let start = header.offset_files as usize + entry.offset as usize;
    let end = start + entry.size as usize;
    if bytes.len() < end {
        return Err(Error::ShortRead {
            needed: end,
            available: bytes.len(),
        });
    }
    Ok(&bytes[start..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_aligned_cstring_pads_to_even() {
        let bytes = b"ab\0\0extra";
        let (text, end) = read_aligned_cstring(bytes, 0).unwrap();
        assert_eq!(text, "ab");
        assert_eq!(end, 4);
    }

    #[test]
    fn test_read_aligned_cstring_odd_length_needs_no_extra_pad() {
        // "abc\0" is 4 bytes, already even.
        let bytes = b"abc\0rest";
        let (text, end) = read_aligned_cstring(bytes, 0).unwrap();
        assert_eq!(text, "abc");
        assert_eq!(end, 4);
    }

    #[test]
    fn test_read_aligned_cstring_converts_backslash_to_slash() {
        let bytes = b"a\\b\0\0";
        let (text, _) = read_aligned_cstring(bytes, 0).unwrap();
        assert_eq!(text, "a/b");
    }
}
