//! MD5 digest primitive used by the EDat container engine for the
//! dictionary checksum and per-file content checksums.
//!
//! This is a thin wrapper around the `md-5` crate exposing exactly the
//! `new()` / `update()` / `finalize()` surface needed for the checksum
//! primitive, so callers never see the underlying `Digest` trait.

use md5::{Digest, Md5 as Inner};

/// Incremental MD5 hasher.
#[derive(Clone, Default)]
pub struct Md5 {
    inner: Inner,
}

impl Md5 {
    /// Creates a fresh hasher with no data absorbed yet.
    pub fn new() -> Self {
        Md5 {
            inner: Inner::new(),
        }
    }

    /// Feeds additional bytes into the running digest.
    pub fn update(&mut self, bytes: &[u8]) {
        self.inner.update(bytes);
    }

    /// Consumes the hasher and returns the 16-byte digest.
    pub fn finalize(self) -> [u8; 16] {
        self.inner.finalize().into()
    }
}

/// Formats a 16-byte digest as lowercase hex, for use in error messages.
pub fn hex(digest: &[u8; 16]) -> String {
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::Md5;

    #[test]
    fn test_md5_empty() {
        let digest = Md5::new().finalize();
        assert_eq!(
            digest,
            [
                0xd4, 0x1d, 0x8c, 0xd9, 0x8f, 0x00, 0xb2, 0x04, 0xe9, 0x80, 0x09, 0x98, 0xec,
                0xf8, 0x42, 0x7e
            ]
        );
    }

    #[test]
    fn test_md5_hi() {
        let mut hasher = Md5::new();
        hasher.update(b"hi");
        let digest = hasher.finalize();
        assert_eq!(
            digest,
            [
                0x49, 0xf6, 0x8a, 0xc9, 0xb2, 0x1d, 0x11, 0x73, 0x91, 0xc9, 0xcd, 0x8e, 0xfd,
                0xce, 0xdc, 0x45
            ]
        );
    }

    #[test]
    fn test_incremental_matches_single_shot() {
        let mut incremental = Md5::new();
        incremental.update(b"hello ");
        incremental.update(b"world");
        let mut single = Md5::new();
        single.update(b"hello world");
        assert_eq!(incremental.finalize(), single.finalize());
    }
}
