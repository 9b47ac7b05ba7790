use crate::error::{HwpError, Result};
use byteorder::{LittleEndian, WriteBytesExt};

/// Borrowing cursor over a record payload. All scalars are little-endian;
/// strings are UTF-16LE and measured in 16-bit code units, the way the
/// record formats declare them. Running off the end of the payload is a
/// single failure mode: the record is corrupt.
pub struct StreamReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> StreamReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Borrow the next `len` bytes, advancing the cursor.
    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self.pos.checked_add(len).filter(|e| *e <= self.data.len());
        match end {
            Some(end) => {
                let slice = &self.data[self.pos..end];
                self.pos = end;
                Ok(slice)
            }
            None => Err(HwpError::Corrupt(format!(
                "Record payload ends after {} bytes, needed {} more at offset {}",
                self.data.len(),
                len,
                self.pos
            ))),
        }
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        let b = self.take(4)?;
        Ok(i32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        self.take(len)
    }

    pub fn skip(&mut self, len: usize) -> Result<()> {
        self.take(len).map(|_| ())
    }

    /// Read a UTF-16LE string of `units` code units, trimming trailing
    /// NULs padded in by some writers.
    pub fn read_utf16(&mut self, units: usize) -> Result<String> {
        let bytes = self.take(units * 2)?;
        let s = crate::utils::encoding::utf16le_to_string(bytes)?;
        Ok(s.trim_end_matches('\0').to_string())
    }

    /// The length-prefixed string convention shared by FACE_NAME, STYLE
    /// and BIN_DATA records: a u16 code-unit count followed by the text.
    pub fn read_utf16_prefixed(&mut self) -> Result<String> {
        let units = self.read_u16()? as usize;
        self.read_utf16(units)
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn is_at_end(&self) -> bool {
        self.pos >= self.data.len()
    }
}

/// Write-side twin for building record payloads. Writes to a growable
/// buffer never fail, so the API stays infallible.
pub struct StreamWriter {
    data: Vec<u8>,
}

impl StreamWriter {
    pub fn new() -> Self {
        Self { data: Vec::new() }
    }

    pub fn write_u8(&mut self, v: u8) {
        self.data.push(v);
    }

    pub fn write_u16(&mut self, v: u16) {
        self.data.write_u16::<LittleEndian>(v).expect("vec write");
    }

    pub fn write_u32(&mut self, v: u32) {
        self.data.write_u32::<LittleEndian>(v).expect("vec write");
    }

    pub fn write_i32(&mut self, v: i32) {
        self.data.write_i32::<LittleEndian>(v).expect("vec write");
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    pub fn write_zeros(&mut self, len: usize) {
        self.data.resize(self.data.len() + len, 0);
    }

    /// Counterpart of `StreamReader::read_utf16_prefixed`.
    pub fn write_prefixed_string(&mut self, s: &str) {
        let encoded = crate::utils::encoding::string_to_utf16le(s);
        self.write_u16((encoded.len() / 2) as u16);
        self.write_bytes(&encoded);
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl Default for StreamWriter {
    fn default() -> Self {
        Self::new()
    }
}
