use std::io::Cursor;

use md5::{Digest, Md5};
use ndfkit::edat::document::FileEntry;
use ndfkit::Archive;

#[test]
fn test_single_file_gets_exact_offset_size_and_padded_checksum() {
    let mut archive = Archive::new(8192);
    archive.entries.insert("a.txt".to_string(), FileEntry::default());

    let mut buffer = Cursor::new(Vec::new());
    archive
        .encode(&mut buffer, &|path| {
            assert_eq!(path, "a.txt");
            Ok(b"hi".to_vec())
        })
        .unwrap();

    let bytes = buffer.into_inner();
    let (decoded, payload) = Archive::decode(&bytes).unwrap();

    let entry = decoded.entries.get("a.txt").unwrap();
    assert_eq!(entry.offset, 0);
    assert_eq!(entry.size, 2);

    let mut content = payload[entry.offset as usize..].to_vec();
    content.resize(8192, 0);
    assert_eq!(content.len(), 8192);
    assert_eq!(&content[..2], b"hi");
    assert!(content[2..].iter().all(|&b| b == 0));

    let mut hasher = Md5::new();
    hasher.update(&content);
    let expected: [u8; 16] = hasher.finalize().into();
    assert_eq!(entry.checksum, expected);
}
