//! EIF on-disk format: header and section sub-header codecs
//!
//! All multi-byte integers are big-endian. File layout:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │ Header (548 bytes)                                          │
//! │   - Magic: ".eif" (4 bytes)                                 │
//! │   - Version (2 bytes)                                       │
//! │   - Flags (2 bytes)                                         │
//! │   - Default memory (8 bytes)                                │
//! │   - Default cpus (8 bytes)                                  │
//! │   - Reserved (2 bytes)                                      │
//! │   - Section count (2 bytes)                                 │
//! │   - Section offsets (32 × 8 bytes)                          │
//! │   - Section sizes (32 × 8 bytes)                            │
//! │   - Unused (4 bytes)                                        │
//! │   - CRC32 (4 bytes)                                         │
//! ├─────────────────────────────────────────────────────────────┤
//! │ At each declared offset:                                    │
//! │   Section sub-header (12 bytes)                             │
//! │     - Type (2 bytes), Flags (2 bytes), Size (8 bytes)       │
//! │   Section payload (`size` bytes)                            │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! The codecs here are pure transformations over byte slices. Structural
//! validation (magic, section-count ceiling) lives in [`EifHeader::validate`]
//! and is invoked by the image reader right after decode, so that a decoded
//! header can still be inspected even when it is invalid.

use crate::error::{EifError, Result};

/// EIF magic bytes: ".eif" in ASCII
pub const EIF_MAGIC: [u8; 4] = *b".eif";

/// Fixed header size in bytes
pub const HEADER_SIZE: usize = 548;

/// Section sub-header size in bytes
pub const SECTION_HEADER_SIZE: usize = 12;

/// Maximum number of sections the header tables can describe
///
/// This is a hard structural ceiling of the format, not a soft limit: the
/// on-disk offset/size tables always occupy 32 slots each.
pub const MAX_SECTIONS: usize = 32;

/// Byte offset of the crc32 field within the header
const CRC32_OFFSET: usize = HEADER_SIZE - 4;

/// Checked big-endian reader over a byte slice
///
/// Tracks position and verifies remaining length before every read, so the
/// codecs never index past the end of the input.
struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
    context: &'static str,
}

impl<'a> ByteReader<'a> {
    fn new(data: &'a [u8], context: &'static str) -> Self {
        Self {
            data,
            pos: 0,
            context,
        }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self.pos + n;
        if end > self.data.len() {
            return Err(EifError::Truncated {
                context: self.context,
                needed: end,
                got: self.data.len(),
            });
        }
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn bytes4(&mut self) -> Result<[u8; 4]> {
        let slice = self.take(4)?;
        Ok([slice[0], slice[1], slice[2], slice[3]])
    }

    fn u16_be(&mut self) -> Result<u16> {
        let slice = self.take(2)?;
        Ok(u16::from_be_bytes([slice[0], slice[1]]))
    }

    fn u32_be(&mut self) -> Result<u32> {
        Ok(u32::from_be_bytes(self.bytes4()?))
    }

    fn u64_be(&mut self) -> Result<u64> {
        let slice = self.take(8)?;
        Ok(u64::from_be_bytes([
            slice[0], slice[1], slice[2], slice[3], slice[4], slice[5], slice[6], slice[7],
        ]))
    }
}

/// Section type tag from a section sub-header
///
/// Total over all `u16` values: tags the format does not define decode to
/// [`SectionType::Unknown`] carrying the raw value, so future section types
/// are a matchable state rather than a decode failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SectionType {
    /// Placeholder for an unused slot (0)
    Invalid,
    /// Kernel image (1)
    Kernel,
    /// Kernel command line (2)
    Cmdline,
    /// Ramdisk (3)
    Ramdisk,
    /// Cryptographic signature (4)
    Signature,
    /// JSON metadata (5)
    Metadata,
    /// Any tag not defined by the format
    Unknown(u16),
}

impl SectionType {
    /// Map a raw on-disk tag to a section type
    #[must_use]
    pub const fn from_raw(raw: u16) -> Self {
        match raw {
            0 => Self::Invalid,
            1 => Self::Kernel,
            2 => Self::Cmdline,
            3 => Self::Ramdisk,
            4 => Self::Signature,
            5 => Self::Metadata,
            other => Self::Unknown(other),
        }
    }

    /// The raw on-disk tag for this section type
    #[must_use]
    pub const fn as_raw(self) -> u16 {
        match self {
            Self::Invalid => 0,
            Self::Kernel => 1,
            Self::Cmdline => 2,
            Self::Ramdisk => 3,
            Self::Signature => 4,
            Self::Metadata => 5,
            Self::Unknown(raw) => raw,
        }
    }
}

impl std::fmt::Display for SectionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Invalid => "invalid",
            Self::Kernel => "kernel",
            Self::Cmdline => "cmdline",
            Self::Ramdisk => "ramdisk",
            Self::Signature => "signature",
            Self::Metadata => "metadata",
            Self::Unknown(_) => "unknown",
        };
        write!(f, "{name}")
    }
}

/// EIF file header (548 bytes)
///
/// Fields appear in on-disk order. The full 32-slot offset/size tables are
/// retained even past `section_count` so that encode/decode round-trips are
/// byte-exact; [`EifHeader::sections`] yields only the declared entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EifHeader {
    /// Magic bytes, `.eif` for a well-formed file
    pub magic: [u8; 4],
    /// Format revision; not validated (forward-compatibility placeholder)
    pub version: u16,
    /// Behavior flags; not interpreted here
    pub flags: u16,
    /// Default memory hint for the described payload
    pub default_memory: u64,
    /// Default CPU count hint
    pub default_cpus: u64,
    /// Reserved field, ignored
    pub reserved: u16,
    /// Number of valid entries in the section tables
    pub section_count: u16,
    /// Byte offsets of each section's sub-header
    pub section_offsets: [u64; MAX_SECTIONS],
    /// Declared payload size of each section
    pub section_sizes: [u64; MAX_SECTIONS],
    /// Unused field, ignored
    pub unused: u32,
    /// Stored CRC32; see [`crate::image::EifImage::verify_crc32`]
    pub crc32: u32,
}

impl EifHeader {
    /// Decode a header from the first 548 bytes of `data`
    ///
    /// Pure transformation: magic and section count are decoded but not
    /// validated here. Call [`EifHeader::validate`] before trusting the
    /// section tables.
    ///
    /// # Errors
    ///
    /// Returns [`EifError::Truncated`] if fewer than 548 bytes are supplied.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < HEADER_SIZE {
            return Err(EifError::Truncated {
                context: "EIF header",
                needed: HEADER_SIZE,
                got: data.len(),
            });
        }

        let mut reader = ByteReader::new(data, "EIF header");
        let magic = reader.bytes4()?;
        let version = reader.u16_be()?;
        let flags = reader.u16_be()?;
        let default_memory = reader.u64_be()?;
        let default_cpus = reader.u64_be()?;
        let reserved = reader.u16_be()?;
        let section_count = reader.u16_be()?;

        let mut section_offsets = [0u64; MAX_SECTIONS];
        for slot in &mut section_offsets {
            *slot = reader.u64_be()?;
        }
        let mut section_sizes = [0u64; MAX_SECTIONS];
        for slot in &mut section_sizes {
            *slot = reader.u64_be()?;
        }

        let unused = reader.u32_be()?;
        let crc32 = reader.u32_be()?;

        Ok(Self {
            magic,
            version,
            flags,
            default_memory,
            default_cpus,
            reserved,
            section_count,
            section_offsets,
            section_sizes,
            unused,
            crc32,
        })
    }

    /// Encode this header to its 548-byte on-disk form
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_SIZE);
        out.extend_from_slice(&self.magic);
        out.extend_from_slice(&self.version.to_be_bytes());
        out.extend_from_slice(&self.flags.to_be_bytes());
        out.extend_from_slice(&self.default_memory.to_be_bytes());
        out.extend_from_slice(&self.default_cpus.to_be_bytes());
        out.extend_from_slice(&self.reserved.to_be_bytes());
        out.extend_from_slice(&self.section_count.to_be_bytes());
        for offset in &self.section_offsets {
            out.extend_from_slice(&offset.to_be_bytes());
        }
        for size in &self.section_sizes {
            out.extend_from_slice(&size.to_be_bytes());
        }
        out.extend_from_slice(&self.unused.to_be_bytes());
        out.extend_from_slice(&self.crc32.to_be_bytes());
        debug_assert_eq!(out.len(), HEADER_SIZE);
        out
    }

    /// Check the structural invariants the decoder deliberately skips
    ///
    /// # Errors
    ///
    /// - [`EifError::BadMagic`] if the magic bytes are not `.eif`
    /// - [`EifError::TooManySections`] if `section_count` exceeds
    ///   [`MAX_SECTIONS`]
    pub fn validate(&self) -> Result<()> {
        if self.magic != EIF_MAGIC {
            return Err(EifError::BadMagic {
                found: self.magic,
                expected: EIF_MAGIC,
            });
        }
        if self.section_count as usize > MAX_SECTIONS {
            return Err(EifError::TooManySections {
                count: self.section_count,
                max: MAX_SECTIONS,
            });
        }
        Ok(())
    }

    /// The declared section table: (offset, size) pairs in table order
    ///
    /// Yields only the first `section_count` entries; slots past the count
    /// are retained in the struct but are not meaningful.
    pub fn sections(&self) -> impl Iterator<Item = (u64, u64)> + '_ {
        let count = (self.section_count as usize).min(MAX_SECTIONS);
        self.section_offsets[..count]
            .iter()
            .copied()
            .zip(self.section_sizes[..count].iter().copied())
    }
}

/// Section sub-header (12 bytes), found at each declared section offset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EifSectionHeader {
    /// Section type tag
    pub section_type: SectionType,
    /// Section-specific flags; not interpreted here
    pub flags: u16,
    /// Declared payload length, immediately following this sub-header
    pub section_size: u64,
}

impl EifSectionHeader {
    /// Decode a section sub-header from the first 12 bytes of `data`
    ///
    /// # Errors
    ///
    /// Returns [`EifError::Truncated`] if fewer than 12 bytes are supplied.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let mut reader = ByteReader::new(data, "section header");
        let section_type = SectionType::from_raw(reader.u16_be()?);
        let flags = reader.u16_be()?;
        let section_size = reader.u64_be()?;
        Ok(Self {
            section_type,
            flags,
            section_size,
        })
    }

    /// Encode this sub-header to its 12-byte on-disk form
    #[must_use]
    pub fn to_bytes(&self) -> [u8; SECTION_HEADER_SIZE] {
        let mut out = [0u8; SECTION_HEADER_SIZE];
        out[0..2].copy_from_slice(&self.section_type.as_raw().to_be_bytes());
        out[2..4].copy_from_slice(&self.flags.to_be_bytes());
        out[4..12].copy_from_slice(&self.section_size.to_be_bytes());
        out
    }
}

/// CRC32 checksum (IEEE polynomial 0xEDB88320)
fn crc32(seed: u32, data: &[u8]) -> u32 {
    const TABLE: [u32; 256] = {
        let mut table = [0u32; 256];
        let mut i = 0;
        while i < 256 {
            let mut crc = i as u32;
            let mut j = 0;
            while j < 8 {
                if crc & 1 != 0 {
                    crc = (crc >> 1) ^ 0xEDB8_8320;
                } else {
                    crc >>= 1;
                }
                j += 1;
            }
            table[i] = crc;
            i += 1;
        }
        table
    };

    let mut crc = !seed;
    for &byte in data {
        let idx = ((crc ^ u32::from(byte)) & 0xFF) as usize;
        crc = TABLE[idx] ^ (crc >> 8);
    }
    !crc
}

/// Compute the checksum the header's crc32 field is expected to store
///
/// Covers the entire file excluding the 4-byte crc32 field itself
/// (bytes 544..548). Returns `None` when `data` is shorter than a header.
#[must_use]
pub fn file_crc32(data: &[u8]) -> Option<u32> {
    if data.len() < HEADER_SIZE {
        return None;
    }
    let partial = crc32(0, &data[..CRC32_OFFSET]);
    Some(crc32(partial, &data[HEADER_SIZE..]))
}
