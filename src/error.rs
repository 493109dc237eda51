//! Error types for EIF parsing

use thiserror::Error;

/// Errors raised while decoding or validating an EIF image
///
/// Every variant here is fatal for the parse that raised it: there is no
/// partial-result mode and no retry path. Advisory conditions (section size
/// mismatches) are modelled separately as [`crate::image::SizeMismatch`]
/// warnings and never appear in this enum.
#[derive(Debug, Error)]
pub enum EifError {
    /// File does not start with the `.eif` magic bytes
    #[error("invalid EIF magic: expected {expected:?}, got {found:?}")]
    BadMagic {
        /// The four bytes found at the start of the file
        found: [u8; 4],
        /// The canonical magic (`.eif` in ASCII)
        expected: [u8; 4],
    },

    /// Header declares more sections than the format allows
    #[error("section count {count} exceeds maximum of {max}")]
    TooManySections {
        /// Declared section count
        count: u16,
        /// Structural ceiling (32)
        max: usize,
    },

    /// Input ended before a fixed-size structure could be read
    #[error("truncated input while reading {context}: need {needed} bytes, got {got}")]
    Truncated {
        /// What was being decoded when the input ran out
        context: &'static str,
        /// Bytes required
        needed: usize,
        /// Bytes available
        got: usize,
    },

    /// A section offset points past the end of the input
    #[error("cannot seek to section offset {offset}: beyond end of input ({len} bytes)")]
    SeekFailed {
        /// The offset the header declared
        offset: u64,
        /// Total input length
        len: usize,
    },

    /// Stored header CRC32 disagrees with the computed one (opt-in check)
    #[error("CRC32 mismatch: header stores {stored:#010x}, computed {computed:#010x}")]
    ChecksumMismatch {
        /// Checksum stored in the header
        stored: u32,
        /// Checksum computed over the file contents
        computed: u32,
    },

    /// Underlying I/O failure (open, map)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for EIF operations
pub type Result<T> = std::result::Result<T, EifError>;
