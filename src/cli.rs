//! CLI command implementations (extracted for testability)
//!
//! Rendering is kept separate from parsing: the library hands back an
//! [`EifImage`] and the functions here turn it into text or JSON. Output
//! mirrors the classic `eifdump` text layout; advisory warnings go to
//! stderr so they never mix with the structured output.

use std::path::Path;

use crate::eif::{EifHeader, EifSectionHeader};
use crate::error::{EifError, Result};
use crate::image::EifImage;

/// Render the file header as the classic text block
#[must_use]
pub fn render_header(header: &EifHeader) -> String {
    let magic = String::from_utf8_lossy(&header.magic);
    let mut out = String::new();
    out.push_str("------EIF Header------\n");
    out.push_str(&format!("magic           {magic}\n"));
    out.push_str(&format!("version         {}\n", header.version));
    out.push_str(&format!("flags           {}\n", header.flags));
    out.push_str(&format!("default memory  {}\n", header.default_memory));
    out.push_str(&format!("default cpus    {}\n", header.default_cpus));
    out.push_str(&format!("section count   {}\n", header.section_count));
    out.push_str(&format!("crc32           {}\n", header.crc32));
    out.push_str("------EIF Header------\n");
    out
}

/// Render one section sub-header as the classic text block
#[must_use]
pub fn render_section(section: &EifSectionHeader) -> String {
    let mut out = String::new();
    out.push_str(&format!("section type    {}\n", section.section_type));
    out.push_str(&format!("flags           {}\n", section.flags));
    out.push_str(&format!("section size    {}\n", section.section_size));
    out
}

/// Render the whole image as a JSON value
#[must_use]
pub fn render_json(image: &EifImage) -> serde_json::Value {
    let header = &image.header;
    let sections: Vec<_> = image
        .sections
        .iter()
        .map(|s| {
            serde_json::json!({
                "type": s.section_type.to_string(),
                "raw_type": s.section_type.as_raw(),
                "flags": s.flags,
                "size": s.section_size,
            })
        })
        .collect();
    let warnings: Vec<String> = image.warnings.iter().map(ToString::to_string).collect();

    serde_json::json!({
        "header": {
            "magic": String::from_utf8_lossy(&header.magic),
            "version": header.version,
            "flags": header.flags,
            "default_memory": header.default_memory,
            "default_cpus": header.default_cpus,
            "section_count": header.section_count,
            "crc32": header.crc32,
        },
        "sections": sections,
        "warnings": warnings,
        "metadata": image.metadata.as_ref().map(|m| m.text()),
    })
}

/// Parse and print an image file
///
/// # Errors
///
/// Returns any fatal parse error, [`EifError::ChecksumMismatch`] when
/// `check_crc` is set and the stored CRC32 disagrees, or an I/O error from
/// opening the file. Advisory size-mismatch warnings are printed to stderr
/// and do not fail the command.
pub fn describe<P: AsRef<Path>>(path: P, check_crc: bool, format: &str) -> Result<()> {
    let image = if check_crc {
        EifImage::from_path_verified(path)?
    } else {
        EifImage::from_path(path)?
    };

    for warning in &image.warnings {
        eprintln!("Warning: {warning}");
    }

    match format {
        "json" => {
            println!(
                "{}",
                serde_json::to_string_pretty(&render_json(&image))
                    .unwrap_or_else(|_| "{}".to_string())
            );
        }
        _ => {
            println!("{}", render_header(&image.header));

            println!("------EIF Section Headers------\n");
            for section in &image.sections {
                println!("{}", render_section(section));
            }
            println!("------EIF Section Headers------\n");

            if let Some(metadata) = &image.metadata {
                println!("------metadata json------");
                println!("{}", metadata.text());
                println!("------metadata json------");
            }
        }
    }

    Ok(())
}

/// Reject output formats the CLI does not understand
///
/// # Errors
///
/// Returns an I/O-kinded error so `main` reports it like any other failure.
pub fn check_format(format: &str) -> Result<()> {
    match format {
        "text" | "json" => Ok(()),
        other => Err(EifError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("unknown output format '{other}' (expected 'text' or 'json')"),
        ))),
    }
}
