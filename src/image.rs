//! EIF image reader: parse, validate, and extract metadata
//!
//! Ties the two pure codecs in [`crate::eif`] together: decode the fixed
//! header, validate it, walk the declared section table in order, decode
//! each 12-byte sub-header, cross-check the redundant size fields, and
//! capture the first metadata payload.
//!
//! Every structural failure is fatal for the whole parse; there is no
//! partial-result mode. Size disagreements between the header table and a
//! section's own sub-header are advisory only and are collected as
//! [`SizeMismatch`] warnings on the result.

use std::borrow::Cow;
use std::fs::File;
use std::path::Path;

use memmap2::Mmap;

use crate::eif::{
    file_crc32, EifHeader, EifSectionHeader, SectionType, SECTION_HEADER_SIZE,
};
use crate::error::{EifError, Result};

/// Advisory warning: the header table and a section sub-header disagree
/// about that section's size
///
/// The two fields are independently authored metadata, not a
/// correctness-guaranteeing duplicate, so a mismatch never aborts the parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeMismatch {
    /// Index of the section in the header table
    pub index: usize,
    /// Size declared by the header table
    pub header_size: u64,
    /// Size declared by the section's own sub-header
    pub section_size: u64,
}

impl std::fmt::Display for SizeMismatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "section {} size mismatch: header declares {}, section header declares {}",
            self.index, self.header_size, self.section_size
        )
    }
}

/// Captured payload of the first metadata-typed section
///
/// Holds exactly the declared payload bytes plus one appended NUL
/// terminator. The reference tool read `section_size + 1` bytes from the
/// stream and overwrote the final byte; this reader reads exactly
/// `section_size` bytes and appends the terminator itself, so it never
/// consumes a byte belonging to whatever follows the section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataPayload {
    bytes: Vec<u8>,
}

impl MetadataPayload {
    fn new(payload: &[u8]) -> Self {
        let mut bytes = Vec::with_capacity(payload.len() + 1);
        bytes.extend_from_slice(payload);
        bytes.push(0);
        Self { bytes }
    }

    /// The payload bytes including the trailing NUL terminator
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Declared payload length (terminator excluded)
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len() - 1
    }

    /// Whether the section payload was empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The payload as text, terminator excluded, invalid UTF-8 replaced
    #[must_use]
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.bytes[..self.bytes.len() - 1])
    }
}

/// A fully parsed EIF image
///
/// Owns its data: the header record, one decoded sub-header per declared
/// section (table order), any advisory warnings, and the first metadata
/// payload if the image carries one.
#[derive(Debug, Clone)]
pub struct EifImage {
    /// Decoded and validated file header
    pub header: EifHeader,
    /// Section sub-headers in header-table order
    pub sections: Vec<EifSectionHeader>,
    /// Advisory size mismatches encountered during the walk
    pub warnings: Vec<SizeMismatch>,
    /// First metadata section's payload, if any
    pub metadata: Option<MetadataPayload>,
}

impl EifImage {
    /// Parse an EIF image from an in-memory byte slice
    ///
    /// # Errors
    ///
    /// - [`EifError::Truncated`] if the header, a sub-header, or the
    ///   metadata payload is cut short
    /// - [`EifError::BadMagic`] / [`EifError::TooManySections`] from header
    ///   validation
    /// - [`EifError::SeekFailed`] if a declared offset lies past the end of
    ///   the input
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let header = EifHeader::from_bytes(data)?;
        header.validate()?;

        let mut sections = Vec::with_capacity(header.section_count as usize);
        let mut warnings = Vec::new();
        let mut metadata = None;

        for (index, (offset, declared_size)) in header.sections().enumerate() {
            let start = usize::try_from(offset)
                .ok()
                .filter(|&s| s <= data.len())
                .ok_or(EifError::SeekFailed {
                    offset,
                    len: data.len(),
                })?;

            let section = EifSectionHeader::from_bytes(&data[start..])?;

            if declared_size != section.section_size {
                warnings.push(SizeMismatch {
                    index,
                    header_size: declared_size,
                    section_size: section.section_size,
                });
            }

            // First metadata section wins; later ones are decoded for the
            // section list but not retained.
            if metadata.is_none() && section.section_type == SectionType::Metadata {
                let payload_start = start + SECTION_HEADER_SIZE;
                // Saturate oversized declarations; the bounds check below
                // rejects them along with ordinary short reads.
                let payload_len = usize::try_from(section.section_size).unwrap_or(usize::MAX);
                let payload_end = payload_start
                    .checked_add(payload_len)
                    .filter(|&e| e <= data.len());
                let Some(payload_end) = payload_end else {
                    return Err(EifError::Truncated {
                        context: "metadata payload",
                        needed: payload_len,
                        got: data.len() - payload_start,
                    });
                };
                metadata = Some(MetadataPayload::new(&data[payload_start..payload_end]));
            }

            sections.push(section);
        }

        Ok(Self {
            header,
            sections,
            warnings,
            metadata,
        })
    }

    /// Parse an EIF image from a file on disk
    ///
    /// The file is memory-mapped for the duration of the parse and released
    /// on every exit path; the returned image owns all of its data.
    ///
    /// # Errors
    ///
    /// Returns [`EifError::Io`] if the file cannot be opened or mapped,
    /// plus everything [`EifImage::from_bytes`] can return.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        // SAFETY: the mapping is read-only and dropped before this function
        // returns; we never write through it.
        let mmap = unsafe { Mmap::map(&file)? };
        Self::from_bytes(&mmap)
    }

    /// Parse an EIF image from a file on disk and verify its stored CRC32
    ///
    /// Same as [`EifImage::from_path`] plus a [`EifImage::verify_crc32`]
    /// pass over the single mapping before it is released.
    ///
    /// # Errors
    ///
    /// Everything [`EifImage::from_path`] can return, plus
    /// [`EifError::ChecksumMismatch`].
    pub fn from_path_verified<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        // SAFETY: the mapping is read-only and dropped before this function
        // returns; we never write through it.
        let mmap = unsafe { Mmap::map(&file)? };
        let image = Self::from_bytes(&mmap)?;
        image.verify_crc32(&mmap)?;
        Ok(image)
    }

    /// Verify the stored header CRC32 against the file contents
    ///
    /// The checksum covers the entire file excluding the 4-byte crc field
    /// itself. The reference tool never verified this field, so the check
    /// is opt-in and the scan over `data` only happens when asked for;
    /// an unverified parse never touches the payload bytes.
    ///
    /// # Errors
    ///
    /// Returns [`EifError::ChecksumMismatch`] on disagreement, or
    /// [`EifError::Truncated`] if `data` is shorter than a header.
    pub fn verify_crc32(&self, data: &[u8]) -> Result<()> {
        let computed = file_crc32(data).ok_or(EifError::Truncated {
            context: "EIF header",
            needed: crate::eif::HEADER_SIZE,
            got: data.len(),
        })?;
        if self.header.crc32 != computed {
            return Err(EifError::ChecksumMismatch {
                stored: self.header.crc32,
                computed,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eif::{EIF_MAGIC, HEADER_SIZE, MAX_SECTIONS};

    /// Build an image file: header plus (type, flags, payload) sections laid
    /// out back to back after the header, offsets/sizes filled in.
    fn build_image(sections: &[(u16, u16, &[u8])]) -> Vec<u8> {
        let mut section_offsets = [0u64; MAX_SECTIONS];
        let mut section_sizes = [0u64; MAX_SECTIONS];
        let mut cursor = HEADER_SIZE as u64;
        for (i, (_, _, payload)) in sections.iter().enumerate() {
            section_offsets[i] = cursor;
            section_sizes[i] = payload.len() as u64;
            cursor += (SECTION_HEADER_SIZE + payload.len()) as u64;
        }

        let header = EifHeader {
            magic: EIF_MAGIC,
            version: 1,
            flags: 0,
            default_memory: 512,
            default_cpus: 1,
            reserved: 0,
            section_count: sections.len() as u16,
            section_offsets,
            section_sizes,
            unused: 0,
            crc32: 0,
        };

        let mut data = header.to_bytes();
        for (section_type, flags, payload) in sections {
            let sub = EifSectionHeader {
                section_type: SectionType::from_raw(*section_type),
                flags: *flags,
                section_size: payload.len() as u64,
            };
            data.extend_from_slice(&sub.to_bytes());
            data.extend_from_slice(payload);
        }
        data
    }

    #[test]
    fn test_parse_single_kernel_section() {
        let payload = vec![0xAAu8; 4096];
        let data = build_image(&[(1, 0, &payload)]);
        let image = EifImage::from_bytes(&data).unwrap();

        assert_eq!(image.sections.len(), 1);
        assert_eq!(image.sections[0].section_type, SectionType::Kernel);
        assert_eq!(image.sections[0].section_size, 4096);
        assert!(image.warnings.is_empty());
        assert!(image.metadata.is_none());
    }

    #[test]
    fn test_parse_empty_image() {
        let data = build_image(&[]);
        let image = EifImage::from_bytes(&data).unwrap();
        assert!(image.sections.is_empty());
        assert!(image.metadata.is_none());
    }

    #[test]
    fn test_bad_magic_rejected_before_sections() {
        let mut data = build_image(&[(1, 0, b"kern")]);
        data[0..4].copy_from_slice(b"eif.");
        assert!(matches!(
            EifImage::from_bytes(&data).unwrap_err(),
            EifError::BadMagic { .. }
        ));
    }

    #[test]
    fn test_metadata_captured_with_nul_terminator() {
        let json = br#"{"name":"demo"}"#;
        let data = build_image(&[(5, 0, json)]);
        let image = EifImage::from_bytes(&data).unwrap();

        let metadata = image.metadata.unwrap();
        assert_eq!(metadata.len(), json.len());
        assert_eq!(metadata.as_bytes().last(), Some(&0));
        assert_eq!(metadata.text(), r#"{"name":"demo"}"#);
    }

    #[test]
    fn test_metadata_first_wins() {
        let data = build_image(&[(5, 0, b"first"), (5, 0, b"second")]);
        let image = EifImage::from_bytes(&data).unwrap();

        // Both sections decoded, only the first payload captured
        assert_eq!(image.sections.len(), 2);
        assert_eq!(image.metadata.unwrap().text(), "first");
    }

    #[test]
    fn test_metadata_read_does_not_consume_following_byte() {
        // Metadata followed directly by another section: the capture must
        // stop exactly at the declared size, leaving the next sub-header
        // intact for decoding.
        let data = build_image(&[(5, 0, b"meta"), (2, 0, b"console=ttyS0")]);
        let image = EifImage::from_bytes(&data).unwrap();

        assert_eq!(image.metadata.unwrap().text(), "meta");
        assert_eq!(image.sections[1].section_type, SectionType::Cmdline);
        assert_eq!(image.sections[1].section_size, 13);
    }

    #[test]
    fn test_size_mismatch_is_advisory() {
        let mut data = build_image(&[(1, 0, &[0u8; 50])]);
        // Header claims 100 where the sub-header declares 50
        let size_field = 28 + MAX_SECTIONS * 8;
        data[size_field..size_field + 8].copy_from_slice(&100u64.to_be_bytes());

        let image = EifImage::from_bytes(&data).unwrap();
        assert_eq!(
            image.warnings,
            vec![SizeMismatch {
                index: 0,
                header_size: 100,
                section_size: 50
            }]
        );
        // The sub-header's own value is what the section list reports
        assert_eq!(image.sections[0].section_size, 50);
    }

    #[test]
    fn test_offset_past_end_is_seek_failure() {
        let mut data = build_image(&[(1, 0, b"kern")]);
        data[28..36].copy_from_slice(&0xFFFF_0000u64.to_be_bytes());
        assert!(matches!(
            EifImage::from_bytes(&data).unwrap_err(),
            EifError::SeekFailed {
                offset: 0xFFFF_0000,
                ..
            }
        ));
    }

    #[test]
    fn test_truncated_section_header_is_fatal() {
        let data = build_image(&[(1, 0, b"kern")]);
        // Cut the file inside the sub-header
        let result = EifImage::from_bytes(&data[..HEADER_SIZE + 6]);
        assert!(matches!(result.unwrap_err(), EifError::Truncated { .. }));
    }

    #[test]
    fn test_truncated_metadata_payload_is_fatal() {
        let data = build_image(&[(5, 0, b"metadata json body")]);
        let result = EifImage::from_bytes(&data[..data.len() - 1]);
        assert!(matches!(
            result.unwrap_err(),
            EifError::Truncated {
                context: "metadata payload",
                ..
            }
        ));
    }

    #[test]
    fn test_unknown_section_type_parses() {
        let data = build_image(&[(9, 0, b"future")]);
        let image = EifImage::from_bytes(&data).unwrap();
        assert_eq!(image.sections[0].section_type, SectionType::Unknown(9));
        assert_eq!(image.sections[0].section_type.to_string(), "unknown");
    }

    #[test]
    fn test_verify_crc32() {
        let mut data = build_image(&[(1, 0, b"kern")]);
        let expected = file_crc32(&data).unwrap();
        data[544..548].copy_from_slice(&expected.to_be_bytes());

        let image = EifImage::from_bytes(&data).unwrap();
        assert!(image.verify_crc32(&data).is_ok());

        // Flip a payload byte: stored crc no longer matches
        let last = data.len() - 1;
        data[last] ^= 0xFF;
        let tampered = EifImage::from_bytes(&data).unwrap();
        assert!(matches!(
            tampered.verify_crc32(&data).unwrap_err(),
            EifError::ChecksumMismatch { .. }
        ));
    }

    #[test]
    fn test_verify_crc32_is_opt_in() {
        // A stale crc field must not affect an unverified parse; the scan
        // only happens when verify_crc32 is called with the bytes.
        let data = build_image(&[(1, 0, b"kern")]);
        let image = EifImage::from_bytes(&data).unwrap();
        assert_eq!(image.header.crc32, 0);
        assert!(matches!(
            image.verify_crc32(&data).unwrap_err(),
            EifError::ChecksumMismatch { stored: 0, .. }
        ));
    }

    #[test]
    fn test_from_path_verified() {
        let mut data = build_image(&[(1, 0, b"kern")]);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("checked.eif");

        std::fs::write(&path, &data).unwrap();
        assert!(matches!(
            EifImage::from_path_verified(&path).unwrap_err(),
            EifError::ChecksumMismatch { .. }
        ));

        let expected = file_crc32(&data).unwrap();
        data[544..548].copy_from_slice(&expected.to_be_bytes());
        std::fs::write(&path, &data).unwrap();
        assert!(EifImage::from_path_verified(&path).is_ok());
    }

    #[test]
    fn test_from_path_matches_from_bytes() {
        let data = build_image(&[(5, 0, b"{\"k\":1}")]);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("demo.eif");
        std::fs::write(&path, &data).unwrap();

        let from_path = EifImage::from_path(&path).unwrap();
        let from_bytes = EifImage::from_bytes(&data).unwrap();
        assert_eq!(from_path.header, from_bytes.header);
        assert_eq!(from_path.sections, from_bytes.sections);
        assert_eq!(from_path.metadata, from_bytes.metadata);
    }

    #[test]
    fn test_from_path_missing_file() {
        let result = EifImage::from_path("/nonexistent/image.eif");
        assert!(matches!(result.unwrap_err(), EifError::Io(_)));
    }
}
