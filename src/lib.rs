//! Programmatic editor for Korean word-processor documents in the HWP 5.0
//! compound-binary format and the HWPX packaged-XML format.
//!
//! Both formats load into one document model that can be queried, mutated
//! through reference-addressed operations, validated, serialized back, or
//! converted HWP to HWPX. HWP mutations are minimum-diff record rewrites:
//! only the targeted paragraph's records (and the dependent DocInfo count
//! fields) change, so reference viewers keep accepting the output.
//!
//! Every operation runs to completion on the calling thread; a loaded
//! document is exclusively owned by its caller and holds no internal
//! locks, caches or process-wide state. Callers that share a document
//! across threads must serialize access themselves.

pub mod convert;
pub mod error;
pub mod hwpx;
pub mod model;
pub mod ops;
pub mod parser;
pub mod reader;
pub mod refs;
pub mod utils;
pub mod validate;
pub mod writer;

use std::path::Path;

pub use crate::error::{HwpError, Result};
pub use crate::model::{CharFormat, DocFormat, Document};
pub use crate::ops::{apply_operations, Operation, Placement};
pub use crate::refs::DocRef;
pub use crate::validate::{validate_file, ValidationReport};
pub use crate::writer::{HwpFile, InsertPosition, StyleSelector};
pub use crate::hwpx::HwpxEditor;

/// Load either format into the unified model, sniffing the container by
/// magic bytes.
pub fn open_document<P: AsRef<Path>>(path: P) -> Result<Document> {
    let bytes = std::fs::read(path)?;
    match ops::sniff_format(&bytes)? {
        DocFormat::Hwp => HwpFile::from_bytes(&bytes)?.decode(),
        DocFormat::Hwpx => HwpxEditor::from_bytes(&bytes)?.decode(),
    }
}

/// Create a blank document at `path`; the extension picks the format.
pub fn create_document<P: AsRef<Path>>(path: P) -> Result<()> {
    let path = path.as_ref();
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("hwpx") => {
            let package = hwpx::writer::create_blank()?;
            package.save_to_file(path)
        }
        Some(ext) if ext.eq_ignore_ascii_case("hwp") => {
            let file = writer::builder::blank_document(&[])?;
            file.save(path)
        }
        _ => Err(HwpError::Format(
            "create requires a .hwp or .hwpx destination".to_string(),
        )),
    }
}

/// Write `bytes` to `path` through a sibling temp file and a rename, so a
/// failed write never leaves a truncated document behind.
pub(crate) fn write_file_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = path.parent().filter(|p| !p.as_os_str().is_empty());
    let file_name = path
        .file_name()
        .ok_or_else(|| HwpError::Io(std::io::Error::other("path has no file name")))?;
    let mut tmp_name = std::ffi::OsString::from(".");
    tmp_name.push(file_name);
    tmp_name.push(".tmp~");
    let tmp_path = match dir {
        Some(dir) => dir.join(&tmp_name),
        None => std::path::PathBuf::from(&tmp_name),
    };

    std::fs::write(&tmp_path, bytes)?;
    if let Err(e) = std::fs::rename(&tmp_path, path) {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(HwpError::Io(e));
    }
    Ok(())
}
