//! # eifdump
//!
//! Parser and inspector for the EIF enclave image container format: a fixed
//! 548-byte big-endian header, up to 32 sections addressed by parallel
//! offset/size tables, and one distinguished `metadata` section whose text
//! payload is captured for downstream tooling.
//!
//! ## Example
//!
//! ```rust
//! use eifdump::eif::{EifHeader, EIF_MAGIC, MAX_SECTIONS};
//!
//! let header = EifHeader {
//!     magic: EIF_MAGIC,
//!     version: 1,
//!     flags: 0,
//!     default_memory: 512 * 1024 * 1024,
//!     default_cpus: 2,
//!     reserved: 0,
//!     section_count: 0,
//!     section_offsets: [0; MAX_SECTIONS],
//!     section_sizes: [0; MAX_SECTIONS],
//!     unused: 0,
//!     crc32: 0,
//! };
//!
//! let decoded = EifHeader::from_bytes(&header.to_bytes()).unwrap();
//! assert_eq!(decoded, header);
//! ```
//!
//! ## Architecture
//!
//! - [`eif`] — pure codecs for the fixed header and section sub-headers
//! - [`image`] — orchestration: validation, the section walk, metadata
//!   capture, opt-in CRC32 verification
//! - [`cli`] — rendering and the `describe` command used by the binary
//!
//! The decoders are pure functions over byte slices; parses share no state,
//! so independent images may be parsed concurrently.

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::uninlined_format_args)]

pub mod cli;
pub mod eif;
pub mod error;
pub mod image;

// Re-exports for convenience
pub use error::{EifError, Result};
pub use image::EifImage;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
