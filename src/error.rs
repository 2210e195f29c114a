//
// Copyright 2020 ndfkit Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
//

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced while decoding or encoding an EDat archive or an NDFBin
/// object graph.
///
/// Variants are grouped by the error taxonomy they belong to (format
/// violation, dangling reference, I/O failure, resource exhaustion,
/// not-implemented) rather than by which engine raised them. A checksum
/// mismatch is an integrity failure in that taxonomy too, but it never
/// raises an `Error` here: both checksums this crate handles are always
/// recomputed from content rather than checked against a caller-supplied
/// expectation, so decode only logs a warning on mismatch (see
/// `edat::de::decode`).
#[derive(Error, Debug)]
pub enum Error {
    // -- format-violation -----------------------------------------------
    #[error("bad magic number: expected {expected:?}, found {found:?}")]
    BadMagic {
        expected: &'static [u8],
        found: Vec<u8>,
    },

    #[error("unsupported format version: {0}")]
    UnsupportedVersion(u32),

    #[error("expected zeroed reserved region at offset {offset:#x}, found non-zero byte")]
    ReservedNotZero { offset: usize },

    #[error("expected dictionary sentinel 0x01 or 0x0A, found {0:#x}")]
    BadDictionarySentinel(u32),

    #[error("path byte {0:#04x} is outside the canonical EDat alphabet")]
    PathByteOutsideAlphabet(u8),

    #[error("two distinct paths compared equal under the canonical alphabet: {0:?} and {1:?}")]
    AmbiguousPathOrder(String, String),

    #[error("malformed trie node at byte offset {0}")]
    MalformedTrieNode(usize),

    #[error("odd byte length ({0}) for a WideString payload")]
    OddWideStringLength(usize),

    #[error("malformed NDFBin section directory")]
    MalformedSectionDirectory,

    #[error("unexpected end of input while parsing {0}")]
    Eof(&'static str),

    // -- reference-dangling -----------------------------------------------
    #[error("object reference to {0:?} does not resolve to any object in the graph")]
    DanglingObjectReference(String),

    #[error("import reference index {0} does not resolve to any entry in the import table")]
    DanglingImportReference(u32),

    // -- io-failure -----------------------------------------------------
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("short read: needed {needed} bytes, only {available} available")]
    ShortRead { needed: usize, available: usize },

    // -- resource-exhausted -----------------------------------------------
    #[error("table index would exceed u32 range")]
    TableIndexOverflow,

    // -- not-implemented -----------------------------------------------
    #[error("unknown or unimplemented NDFBin property type tag {0:#04x}")]
    NotImplemented(u32),

    // -- object graph API errors (format-violation at the API boundary) ---
    #[error("object {0:?} already exists in the graph")]
    ObjectAlreadyExists(String),

    #[error("object {0:?} does not exist in the graph")]
    ObjectNotFound(String),

    #[error("string table index {0} out of bounds")]
    StringIndexOutOfBounds(u32),

    #[error("class table index {0} out of bounds")]
    ClassIndexOutOfBounds(u32),

    #[error("transliteration fragment index {0} out of bounds")]
    TranIndexOutOfBounds(u32),

    #[error("property name index {0} out of bounds")]
    PropertyNameIndexOutOfBounds(u32),

    #[error("object index {0} out of bounds")]
    ObjectIndexOutOfBounds(u32),

    #[error("XML document root is not a <Graph> element")]
    InvalidXmlShape,

    #[error("XML interchange error: {0}")]
    Xml(String),
}
