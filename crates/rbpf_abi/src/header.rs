//! rBPF image header.
//!
//! A program image is a flat byte string:
//!
//! ```text
//! +----------------+--------------+----------------+--------------+
//! | header (28 B)  | data         | rodata         | text         |
//! |                | data_len     | rodata_len     | text_len     |
//! +----------------+--------------+----------------+--------------+
//! ```
//!
//! All header fields are little-endian `u32`.

use zerocopy::little_endian::U32;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

/// Magic number at the start of every image ("rBPF").
pub const RBPF_MAGIC: u32 = 0x7242_5046;

/// Header version emitted by image builders.
pub const RBPF_VERSION: u32 = 0;

/// The image header, laid out exactly as it appears on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct RbpfHeader {
    pub magic: U32,
    /// Version of the application
    pub version: U32,
    pub flags: U32,
    /// Length of the data section in bytes
    pub data_len: U32,
    /// Length of the read-only data section in bytes
    pub rodata_len: U32,
    /// Length of the text section in bytes
    pub text_len: U32,
    /// Number of functions exported by the image
    pub function_count: U32,
}

impl RbpfHeader {
    /// Size of the header in bytes.
    pub const SIZE: usize = core::mem::size_of::<Self>();

    /// Create a header for sections of the given lengths.
    pub fn new(data_len: u32, rodata_len: u32, text_len: u32) -> Self {
        Self {
            magic: U32::new(RBPF_MAGIC),
            version: U32::new(RBPF_VERSION),
            flags: U32::ZERO,
            data_len: U32::new(data_len),
            rodata_len: U32::new(rodata_len),
            text_len: U32::new(text_len),
            function_count: U32::ZERO,
        }
    }

    pub fn with_version(mut self, version: u32) -> Self {
        self.version.set(version);
        self
    }

    /// Serialize the header.
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut out = [0u8; Self::SIZE];
        out.copy_from_slice(self.as_bytes());
        out
    }

    /// Read a header from the front of `bytes`.
    ///
    /// Returns `None` if `bytes` is shorter than [`RbpfHeader::SIZE`]. The
    /// magic number is not checked here.
    pub fn read(bytes: &[u8]) -> Option<Self> {
        Self::read_from_prefix(bytes).ok().map(|(header, _)| header)
    }

    pub fn has_valid_magic(&self) -> bool {
        self.magic.get() == RBPF_MAGIC
    }

    /// Total image length described by this header, or `None` on overflow.
    pub fn image_len(&self) -> Option<usize> {
        Self::SIZE
            .checked_add(self.data_len.get() as usize)?
            .checked_add(self.rodata_len.get() as usize)?
            .checked_add(self.text_len.get() as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_is_28_bytes() {
        assert_eq!(RbpfHeader::SIZE, 28);
    }

    #[test]
    fn header_is_little_endian() {
        let header = RbpfHeader::new(4, 8, 16);
        let bytes = header.as_bytes();
        assert_eq!(&bytes[0..4], &[0x46, 0x50, 0x42, 0x72]);
        assert_eq!(&bytes[12..16], &[4, 0, 0, 0]);
        assert_eq!(&bytes[20..24], &[16, 0, 0, 0]);
    }

    #[test]
    fn read_short_buffer() {
        assert!(RbpfHeader::read(&[0u8; 27]).is_none());
    }

    #[test]
    fn read_back() {
        let header = RbpfHeader::new(1, 2, 8);
        let parsed = RbpfHeader::read(header.as_bytes()).unwrap();
        assert!(parsed.has_valid_magic());
        assert_eq!(parsed.image_len(), Some(28 + 1 + 2 + 8));
    }
}
