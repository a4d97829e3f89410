//! Program Images
//!
//! A [`Program`] is a borrowed view of a flat image: header, data, rodata and
//! text. Parsing only checks that the sections fit inside the image; the
//! instruction stream itself is validated later by the verifier.

use alloc::vec::Vec;
use core::fmt;

use rbpf_abi::RbpfHeader;
use thiserror::Error;

use super::insn::{BpfInsn, WideInsn};

/// Errors that can occur when parsing a program image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ImageError {
    #[error("image of {len} bytes is shorter than the {} byte header", RbpfHeader::SIZE)]
    TooShort { len: usize },

    #[error("bad magic number {0:#010x}")]
    BadMagic(u32),

    #[error("sections need {needed} bytes but the image has {len}")]
    SectionOutOfBounds { needed: usize, len: usize },

    #[error("{section} section of {len} bytes does not fit a 32-bit length")]
    SectionTooLarge { section: &'static str, len: usize },
}

/// A parsed program image.
#[derive(Clone, Copy)]
pub struct Program<'a> {
    header: RbpfHeader,
    data: &'a [u8],
    rodata: &'a [u8],
    text: Text<'a>,
}

impl<'a> Program<'a> {
    /// Parse an image.
    ///
    /// Trailing bytes after the text section are ignored.
    pub fn parse(image: &'a [u8]) -> Result<Self, ImageError> {
        let header = RbpfHeader::read(image).ok_or(ImageError::TooShort { len: image.len() })?;
        if !header.has_valid_magic() {
            return Err(ImageError::BadMagic(header.magic.get()));
        }

        let needed = header
            .image_len()
            .ok_or(ImageError::SectionOutOfBounds {
                needed: usize::MAX,
                len: image.len(),
            })?;
        if needed > image.len() {
            return Err(ImageError::SectionOutOfBounds {
                needed,
                len: image.len(),
            });
        }

        let (data, rest) = image[RbpfHeader::SIZE..].split_at(header.data_len.get() as usize);
        let (rodata, rest) = rest.split_at(header.rodata_len.get() as usize);
        let text = &rest[..header.text_len.get() as usize];

        Ok(Self {
            header,
            data,
            rodata,
            text: Text(text),
        })
    }

    #[inline]
    pub fn header(&self) -> &RbpfHeader {
        &self.header
    }

    /// Initial contents of the data section.
    #[inline]
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    #[inline]
    pub fn rodata(&self) -> &'a [u8] {
        self.rodata
    }

    #[inline]
    pub fn text(&self) -> Text<'a> {
        self.text
    }
}

impl fmt::Debug for Program<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Program")
            .field("version", &self.header.version.get())
            .field("data_len", &self.data.len())
            .field("rodata_len", &self.rodata.len())
            .field("text_len", &self.text.len_bytes())
            .finish()
    }
}

/// The text section: a sequence of 8-byte instruction slots.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Text<'a>(&'a [u8]);

impl<'a> Text<'a> {
    #[inline]
    pub const fn new(bytes: &'a [u8]) -> Self {
        Self(bytes)
    }

    #[inline]
    pub const fn len_bytes(&self) -> usize {
        self.0.len()
    }

    /// Number of whole instruction slots.
    #[inline]
    pub const fn len(&self) -> usize {
        self.0.len() / BpfInsn::SIZE
    }

    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check that the section is non-empty and a whole number of slots.
    #[inline]
    pub const fn is_well_formed(&self) -> bool {
        !self.0.is_empty() && self.0.len() % BpfInsn::SIZE == 0
    }

    /// Decode the instruction in slot `idx`.
    #[inline]
    pub fn get(&self, idx: usize) -> Option<BpfInsn> {
        let start = idx.checked_mul(BpfInsn::SIZE)?;
        let bytes = self.0.get(start..start.checked_add(BpfInsn::SIZE)?)?;
        let mut raw = [0u8; BpfInsn::SIZE];
        raw.copy_from_slice(bytes);
        Some(BpfInsn::from_bytes(raw))
    }

    /// Iterate over all slots.
    pub fn iter(&self) -> impl Iterator<Item = BpfInsn> + 'a {
        self.0.chunks_exact(BpfInsn::SIZE).map(|chunk| {
            let mut raw = [0u8; BpfInsn::SIZE];
            raw.copy_from_slice(chunk);
            BpfInsn::from_bytes(raw)
        })
    }

    /// Iterate over instructions, pairing up wide loads.
    pub fn listing(&self) -> Listing<'a> {
        Listing { text: *self, idx: 0 }
    }
}

/// One line of a disassembly listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Line {
    Insn(BpfInsn),
    Wide(WideInsn),
    /// A wide load in the last slot, missing its second half.
    Truncated(BpfInsn),
}

impl fmt::Display for Line {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Insn(insn) => write!(f, "{}", insn),
            Self::Wide(wide) => write!(f, "{}", wide),
            Self::Truncated(insn) => write!(f, "{} <truncated>", insn),
        }
    }
}

/// Iterator returned by [`Text::listing`], yielding `(slot index, line)`.
pub struct Listing<'a> {
    text: Text<'a>,
    idx: usize,
}

impl Iterator for Listing<'_> {
    type Item = (usize, Line);

    fn next(&mut self) -> Option<Self::Item> {
        let idx = self.idx;
        let insn = self.text.get(idx)?;
        if !insn.is_wide() {
            self.idx += 1;
            return Some((idx, Line::Insn(insn)));
        }
        match self.text.get(idx + 1) {
            Some(next) => {
                self.idx += 2;
                Some((idx, Line::Wide(WideInsn::from_slots(insn, next))))
            }
            None => {
                self.idx += 1;
                Some((idx, Line::Truncated(insn)))
            }
        }
    }
}

/// Builder for program images.
///
/// Useful for tests, benchmarks and tooling that generate bytecode.
#[derive(Default)]
pub struct ImageBuilder {
    version: u32,
    data: Vec<u8>,
    rodata: Vec<u8>,
    text: Vec<u8>,
}

impl ImageBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    /// Append bytes to the data section.
    pub fn data(mut self, bytes: &[u8]) -> Self {
        self.data.extend_from_slice(bytes);
        self
    }

    /// Append bytes to the read-only data section.
    pub fn rodata(mut self, bytes: &[u8]) -> Self {
        self.rodata.extend_from_slice(bytes);
        self
    }

    /// Add an instruction.
    pub fn insn(mut self, insn: BpfInsn) -> Self {
        self.text.extend_from_slice(&insn.to_bytes());
        self
    }

    /// Add multiple instructions.
    pub fn insns(mut self, insns: impl IntoIterator<Item = BpfInsn>) -> Self {
        for insn in insns {
            self.text.extend_from_slice(&insn.to_bytes());
        }
        self
    }

    /// Add both slots of a wide load.
    pub fn wide(self, wide: WideInsn) -> Self {
        self.insn(wide.insn).insn(wide.next)
    }

    /// Add an exit instruction.
    pub fn exit(self) -> Self {
        self.insn(BpfInsn::exit())
    }

    /// Append raw bytes to the text section.
    pub fn raw_text(mut self, bytes: &[u8]) -> Self {
        self.text.extend_from_slice(bytes);
        self
    }

    /// Serialize the image.
    pub fn build(self) -> Result<Vec<u8>, ImageError> {
        let header = RbpfHeader::new(
            section_len("data", self.data.len())?,
            section_len("rodata", self.rodata.len())?,
            section_len("text", self.text.len())?,
        )
        .with_version(self.version);

        let mut image = Vec::with_capacity(
            RbpfHeader::SIZE + self.data.len() + self.rodata.len() + self.text.len(),
        );
        image.extend_from_slice(&header.to_bytes());
        image.extend_from_slice(&self.data);
        image.extend_from_slice(&self.rodata);
        image.extend_from_slice(&self.text);
        Ok(image)
    }
}

fn section_len(section: &'static str, len: usize) -> Result<u32, ImageError> {
    u32::try_from(len).map_err(|_| ImageError::SectionTooLarge { section, len })
}

#[cfg(test)]
mod tests {
    use alloc::format;
    use alloc::string::String;

    use super::*;

    fn minimal() -> Vec<u8> {
        ImageBuilder::new()
            .data(&[1, 2, 3, 4])
            .rodata(b"hi\0")
            .insn(BpfInsn::mov64_imm(0, 42))
            .exit()
            .build()
            .expect("image fits")
    }

    #[test]
    fn parse_sections() {
        let image = minimal();
        let program = Program::parse(&image).expect("valid image");

        assert_eq!(program.data(), &[1, 2, 3, 4]);
        assert_eq!(program.rodata(), b"hi\0");
        assert_eq!(program.text().len(), 2);
        assert!(program.text().is_well_formed());
        assert_eq!(program.text().get(0), Some(BpfInsn::mov64_imm(0, 42)));
        assert_eq!(program.text().get(2), None);
    }

    #[test]
    fn short_image_rejected() {
        let result = Program::parse(&[0u8; 10]);
        assert_eq!(result.err(), Some(ImageError::TooShort { len: 10 }));
    }

    #[test]
    fn bad_magic_rejected() {
        let mut image = minimal();
        image[0] = 0;
        assert!(matches!(
            Program::parse(&image),
            Err(ImageError::BadMagic(_))
        ));
    }

    #[test]
    fn truncated_section_rejected() {
        let image = minimal();
        let result = Program::parse(&image[..image.len() - 1]);
        assert!(matches!(
            result,
            Err(ImageError::SectionOutOfBounds { .. })
        ));
    }

    #[test]
    fn ragged_text_parses() {
        let image = ImageBuilder::new().raw_text(&[0x95, 0, 0]).build().expect("image fits");
        let program = Program::parse(&image).expect("parse ok");
        assert!(!program.text().is_well_formed());
        assert_eq!(program.text().len(), 0);
    }

    #[test]
    fn listing_pairs_wide_loads() {
        let image = ImageBuilder::new()
            .wide(WideInsn::ld_dw_imm(1, 0x1_0000_0002))
            .exit()
            .build()
            .expect("image fits");
        let program = Program::parse(&image).expect("valid image");

        let mut out = String::new();
        for (idx, line) in program.text().listing() {
            out.push_str(&format!("{}: {}\n", idx, line));
        }
        assert_eq!(out, "0: lddw r1, 0x100000002\n2: exit\n");
    }

    #[test]
    fn section_lengths_must_fit_header() {
        assert_eq!(section_len("data", 12), Ok(12));
        assert_eq!(section_len("text", u32::MAX as usize), Ok(u32::MAX));
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn oversized_section_is_an_error() {
        let len = u32::MAX as usize + 1;
        assert_eq!(
            section_len("rodata", len),
            Err(ImageError::SectionTooLarge {
                section: "rodata",
                len
            })
        );
    }
}
