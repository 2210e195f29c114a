//
// Copyright 2020 ndfkit Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
//

//! The EDat sector-aligned archive container engine.
//!
//! An [`Archive`] is a path → [`document::FileEntry`] dictionary plus a
//! sector size. [`Archive::decode`] parses a full archive image (dictionary
//! and payload region); [`Archive::encode`] rebuilds one from scratch,
//! recomputing offsets, sizes, and checksums from caller-supplied content.

pub mod alphabet;
pub mod de;
pub mod document;
pub mod ser;
pub mod trie;

use std::collections::BTreeMap;

use crate::error::Result;

pub use document::FileEntry;

/// An EDat archive's dictionary: every known path plus the sector size used
/// to align its payloads.
///
/// `entries` is keyed by path for lookup; on-disk ordering is always
/// recomputed from the canonical alphabet at encode time ([`ser::encode`]),
/// so the map's own iteration order is not load-bearing.
#[derive(Debug, Clone)]
pub struct Archive {
    pub sector_size: u32,
    pub entries: BTreeMap<String, FileEntry>,
}

impl Archive {
    /// Creates an empty archive with the given sector size.
    pub fn new(sector_size: u32) -> Self {
        Archive {
            sector_size,
            entries: BTreeMap::new(),
        }
    }

    /// Decodes a complete EDat image from `bytes`, returning the archive's
    /// dictionary plus the raw file-payload region (callers extract
    /// individual files from it via [`Archive::extract`]).
    pub fn decode(bytes: &[u8]) -> Result<(Archive, Vec<u8>)> {
        de::decode(bytes)
    }

    /// Extracts the payload bytes for `path` from a decoded payload region.
    pub fn extract<'a>(&self, payload: &'a [u8], path: &str) -> Result<&'a [u8]> {
        let entry = self
            .entries
            .get(path)
            .ok_or_else(|| crate::error::Error::ObjectNotFound(path.to_string()))?;
        let start = entry.offset as usize;
        let end = start + entry.size as usize;
        if payload.len() < end {
            return Err(crate::error::Error::ShortRead {
                needed: end,
                available: payload.len(),
            });
        }
        Ok(&payload[start..end])
    }

    /// Encodes this archive, looking up each entry's content via `contents`.
    pub fn encode<W: std::io::Write + std::io::Read + std::io::Seek>(
        &self,
        writer: &mut W,
        contents: &dyn Fn(&str) -> Result<Vec<u8>>,
    ) -> Result<()> {
        ser::encode(writer, self, contents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::collections::HashMap;

    #[test]
    fn test_round_trip_preserves_all_paths_and_content() {
        let mut files: HashMap<&str, &[u8]> = HashMap::new();
        files.insert("readme.txt", b"hello world");
        files.insert("data/units.ndf", b"some ndf content here");
        files.insert("data/weapons.ndf", b"more ndf content");

        let mut archive = Archive::new(8192);
        for path in files.keys() {
            archive.entries.insert(path.to_string(), FileEntry::default());
        }

        let mut cursor = Cursor::new(Vec::new());
        archive
            .encode(&mut cursor, &|path| {
                Ok(files
                    .get(path)
                    .unwrap_or_else(|| panic!("missing fixture content for {path}"))
                    .to_vec())
            })
            .unwrap();

        let bytes = cursor.into_inner();
        let (decoded, payload) = Archive::decode(&bytes).unwrap();

        assert_eq!(decoded.entries.len(), files.len());
        for (path, content) in &files {
            let extracted = decoded.extract(&payload, path).unwrap();
            assert_eq!(extracted, *content);
        }
    }

    #[test]
    fn test_empty_archive_round_trips() {
        let archive = Archive::new(8192);
        let mut cursor = Cursor::new(Vec::new());
        archive.encode(&mut cursor, &|_| Ok(Vec::new())).unwrap();
        let bytes = cursor.into_inner();
        let (decoded, _payload) = Archive::decode(&bytes).unwrap();
        assert!(decoded.entries.is_empty());
    }
}
