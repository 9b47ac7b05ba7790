use crate::error::{HwpError, Result};
use std::io::{Cursor, Read, Write};
use std::path::Path;
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

/// An HWPX package: the ordered entry list of a ZIP archive, held in
/// memory so individual parts can be replaced while every other part is
/// written back byte-identical.
pub struct ZipPackage {
    entries: Vec<(String, Vec<u8>)>,
}

impl ZipPackage {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        Self::from_bytes(&bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut archive = ZipArchive::new(Cursor::new(bytes.to_vec()))
            .map_err(|e| HwpError::Format(format!("Invalid HWPX archive: {}", e)))?;

        let mut entries = Vec::with_capacity(archive.len());
        for i in 0..archive.len() {
            let mut file = archive
                .by_index(i)
                .map_err(|e| HwpError::Format(format!("Bad archive entry: {}", e)))?;
            if file.is_dir() {
                continue;
            }
            let name = file.name().to_string();
            let mut data = Vec::with_capacity(file.size() as usize);
            file.read_to_end(&mut data)?;
            entries.push((name, data));
        }
        Ok(Self { entries })
    }

    pub fn part(&self, name: &str) -> Option<&[u8]> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, d)| d.as_slice())
    }

    pub fn has_part(&self, name: &str) -> bool {
        self.entries.iter().any(|(n, _)| n == name)
    }

    pub fn part_names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    /// Replace an existing part, or append a new one at the end.
    pub fn put_part(&mut self, name: &str, data: Vec<u8>) {
        if let Some(entry) = self.entries.iter_mut().find(|(n, _)| n == name) {
            entry.1 = data;
        } else {
            self.entries.push((name.to_string(), data));
        }
    }

    pub fn remove_part(&mut self, name: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(n, _)| n != name);
        self.entries.len() != before
    }

    /// Number of `Contents/section<k>.xml` parts, counted from zero.
    pub fn section_count(&self) -> usize {
        let mut count = 0;
        while self.has_part(&format!("Contents/section{}.xml", count)) {
            count += 1;
        }
        count
    }

    /// Serialize the package. `mimetype` is always emitted first and
    /// Stored (uncompressed); all other entries are Deflated.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let stored =
            SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
        let deflated =
            SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

        if let Some(mime) = self.part("mimetype") {
            zip.start_file("mimetype", stored)
                .map_err(|e| HwpError::Io(std::io::Error::other(e)))?;
            zip.write_all(mime)?;
        }

        for (name, data) in &self.entries {
            if name == "mimetype" {
                continue;
            }
            let options = if name.starts_with("BinData/") {
                stored
            } else {
                deflated
            };
            zip.start_file(name.as_str(), options)
                .map_err(|e| HwpError::Io(std::io::Error::other(e)))?;
            zip.write_all(data)?;
        }

        let cursor = zip
            .finish()
            .map_err(|e| HwpError::Io(std::io::Error::other(e)))?;
        Ok(cursor.into_inner())
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let bytes = self.to_bytes()?;
        crate::write_file_atomic(path.as_ref(), &bytes)
    }
}

impl Default for ZipPackage {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn part_roundtrip() {
        let mut package = ZipPackage::new();
        package.put_part("mimetype", b"application/hwp+zip".to_vec());
        package.put_part("Contents/section0.xml", b"<sec/>".to_vec());

        let bytes = package.to_bytes().unwrap();
        assert_eq!(&bytes[..2], b"PK");

        let reread = ZipPackage::from_bytes(&bytes).unwrap();
        assert_eq!(reread.part("mimetype").unwrap(), b"application/hwp+zip");
        assert_eq!(reread.section_count(), 1);
    }

    #[test]
    fn put_replaces_in_place() {
        let mut package = ZipPackage::new();
        package.put_part("a", vec![1]);
        package.put_part("b", vec![2]);
        package.put_part("a", vec![3]);
        assert_eq!(package.part("a").unwrap(), &[3]);
        assert_eq!(package.entries.len(), 2);
    }
}
