use std::io::Cursor;

use ndfkit::edat::document::{DICTIONARY_SENTINEL_EMPTY, HEADER_SIZE};
use ndfkit::Archive;

#[test]
fn test_empty_archive_round_trips_byte_for_byte() {
    let archive = Archive::new(512);
    let mut buffer = Cursor::new(Vec::new());
    archive.encode(&mut buffer, &|_: &str| unreachable!()).unwrap();
    let bytes = buffer.into_inner();

    // The dictionary sentinel is a little-endian u32 immediately following
    // the fixed header.
    let sentinel = u32::from_le_bytes(bytes[HEADER_SIZE..HEADER_SIZE + 4].try_into().unwrap());
    assert_eq!(sentinel, DICTIONARY_SENTINEL_EMPTY);

    let (decoded, payload) = Archive::decode(&bytes).unwrap();
    assert!(decoded.entries.is_empty());
    assert!(payload.is_empty());

    // Re-encoding the decoded (still empty) archive reproduces the header
    // and sentinel exactly.
    let mut second = Cursor::new(Vec::new());
    decoded.encode(&mut second, &|_: &str| unreachable!()).unwrap();
    let second_bytes = second.into_inner();
    assert_eq!(second_bytes[..HEADER_SIZE + 4], bytes[..HEADER_SIZE + 4]);
}
