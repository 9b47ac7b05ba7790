use crate::error::{HwpError, Result};
use crate::reader::StreamReader;

const HWP_SIGNATURE: &[u8] = b"HWP Document File";

#[derive(Debug, Clone)]
pub struct FileHeader {
    pub signature: [u8; 32],
    pub version: u32,
    pub flags: u32,
    pub reserved: [u8; 216],
}

impl FileHeader {
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < 256 {
            return Err(HwpError::Format(
                "FileHeader must be 256 bytes".to_string(),
            ));
        }

        let mut reader = StreamReader::new(data);

        let mut signature = [0u8; 32];
        signature.copy_from_slice(reader.read_bytes(32)?);

        if &signature[..17] != HWP_SIGNATURE {
            return Err(HwpError::Format("Invalid HWP signature".to_string()));
        }

        let version = reader.read_u32()?;
        let flags = reader.read_u32()?;

        let mut reserved = [0u8; 216];
        reserved.copy_from_slice(reader.read_bytes(216)?);

        Ok(Self {
            signature,
            version,
            flags,
            reserved,
        })
    }

    pub fn is_compressed(&self) -> bool {
        (self.flags & 0x01) != 0
    }

    pub fn is_encrypted(&self) -> bool {
        (self.flags & 0x02) != 0
    }

    pub fn is_distribute(&self) -> bool {
        (self.flags & 0x04) != 0
    }

    pub fn version_string(&self) -> String {
        let major = (self.version >> 24) & 0xFF;
        let minor = (self.version >> 16) & 0xFF;
        let build = (self.version >> 8) & 0xFF;
        let revision = self.version & 0xFF;

        format!("{major}.{minor}.{build}.{revision}")
    }

    /// Default header for documents this crate fabricates: HWP 5.0.5.1,
    /// compression on.
    pub fn new_default() -> Self {
        let mut signature = [0u8; 32];
        signature[..17].copy_from_slice(HWP_SIGNATURE);

        Self {
            signature,
            version: 0x05050114,
            flags: 0x01,
            reserved: [0u8; 216],
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(256);
        bytes.extend_from_slice(&self.signature);
        bytes.extend_from_slice(&self.version.to_le_bytes());
        bytes.extend_from_slice(&self.flags.to_le_bytes());
        bytes.extend_from_slice(&self.reserved);
        bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_header_roundtrip() {
        let header = FileHeader::new_default();
        let bytes = header.to_bytes();
        assert_eq!(bytes.len(), 256);

        let parsed = FileHeader::parse(&bytes).unwrap();
        assert!(parsed.is_compressed());
        assert!(!parsed.is_encrypted());
        assert_eq!(parsed.version_string(), "5.5.1.20");
    }

    #[test]
    fn rejects_bad_signature() {
        let bytes = vec![0u8; 256];
        assert!(FileHeader::parse(&bytes).is_err());
    }
}
