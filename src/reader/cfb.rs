//! Compound-file (structured storage) adapter. The editor works on a
//! whole-container snapshot: every stream is read into an ordered
//! `(path, bytes)` entry set on load, and a save rebuilds the container
//! from the (mostly untouched) set, so unrelated streams round-trip
//! byte-identical.

use crate::error::{HwpError, Result};
use cfb::CompoundFile;
use std::collections::BTreeSet;
use std::io::{Cursor, Read, Write};
use std::path::Path;

/// Magic prefix of a compound-file container.
pub const CFB_MAGIC: [u8; 4] = [0xD0, 0xCF, 0x11, 0xE0];

/// Snapshot every stream of a compound container, in traversal order,
/// with the leading path separator stripped (`BodyText/Section0`, not
/// `/BodyText/Section0`).
pub fn read_container(bytes: &[u8]) -> Result<Vec<(String, Vec<u8>)>> {
    let mut cfb = CompoundFile::open(Cursor::new(bytes.to_vec()))
        .map_err(|e| HwpError::Format(format!("Not a compound file: {}", e)))?;

    let paths: Vec<String> = cfb
        .walk()
        .filter(|entry| entry.is_stream())
        .map(|entry| entry.path().display().to_string())
        .collect();

    let mut entries = Vec::with_capacity(paths.len());
    for path in paths {
        let mut stream = cfb.open_stream(&path).map_err(|e| {
            HwpError::Corrupt(format!("Stream '{}' unreadable: {}", path, e))
        })?;
        let mut data = Vec::new();
        stream.read_to_end(&mut data)?;
        let name = path.strip_prefix('/').unwrap_or(&path).to_string();
        entries.push((name, data));
    }
    Ok(entries)
}

/// Serialize an entry set into a fresh V3 (512-byte sector) compound
/// file, the version HWP readers expect. Parent storages are derived
/// from the entry paths.
pub fn write_container(entries: &[(String, Vec<u8>)]) -> Result<Vec<u8>> {
    let cursor = Cursor::new(Vec::new());
    let mut cfb = CompoundFile::create_with_version(cfb::Version::V3, cursor)
        .map_err(|e| HwpError::Io(std::io::Error::other(e)))?;

    let mut storages = BTreeSet::new();
    for (path, _) in entries {
        let mut parent = Path::new(path.as_str());
        while let Some(dir) = parent.parent() {
            if !dir.as_os_str().is_empty() {
                storages.insert(format!("/{}", dir.display()));
            }
            parent = dir;
        }
    }
    for storage in &storages {
        cfb.create_storage_all(storage)
            .map_err(|e| HwpError::Io(std::io::Error::other(e)))?;
    }

    for (path, bytes) in entries {
        let normalized = if path.starts_with('/') {
            path.clone()
        } else {
            format!("/{}", path)
        };
        let mut stream = cfb
            .create_stream(&normalized)
            .map_err(|e| HwpError::Io(std::io::Error::other(e)))?;
        stream.write_all(bytes)?;
        drop(stream);
    }

    cfb.flush()
        .map_err(|e| HwpError::Io(std::io::Error::other(e)))?;
    Ok(cfb.into_inner().into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_roundtrip() {
        let entries = vec![
            ("FileHeader".to_string(), vec![1u8; 256]),
            ("DocInfo".to_string(), vec![2u8, 3, 4]),
            ("BodyText/Section0".to_string(), vec![5u8; 32]),
        ];
        let bytes = write_container(&entries).unwrap();
        assert_eq!(&bytes[..4], &CFB_MAGIC);

        let reread = read_container(&bytes).unwrap();
        let doc_info = reread.iter().find(|(n, _)| n == "DocInfo").unwrap();
        assert_eq!(doc_info.1, vec![2, 3, 4]);
        let section = reread
            .iter()
            .find(|(n, _)| n == "BodyText/Section0")
            .unwrap();
        assert_eq!(section.1.len(), 32);
    }

    #[test]
    fn rejects_non_container_bytes() {
        assert!(matches!(
            read_container(b"PK\x03\x04 not a compound file"),
            Err(HwpError::Format(_))
        ));
    }
}
