use crate::error::{HwpError, Result};
use crate::model::{Alignment, CharFormat};
use crate::parser::record::{tag, RecordStream, RecordView};
use crate::reader::{StreamReader, StreamWriter};

/// Slot indices inside the ID_MAPPINGS count table. The seven font slots
/// (one per language category) follow bin-data; their sum is the number of
/// FACE_NAME records in the stream.
pub mod id_slot {
    pub const BIN_DATA: usize = 0;
    pub const FONT_FIRST: usize = 1;
    pub const FONT_LAST: usize = 7;
    pub const BORDER_FILL: usize = 8;
    pub const CHAR_SHAPE: usize = 9;
    pub const TAB_DEF: usize = 10;
    pub const NUMBERING: usize = 11;
    pub const BULLET: usize = 12;
    pub const PARA_SHAPE: usize = 13;
    pub const STYLE: usize = 14;
}

/// The ID_MAPPINGS count table, kept as raw u32 slots so unknown trailing
/// slots survive a rewrite untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdMappings {
    pub counts: Vec<u32>,
}

impl IdMappings {
    pub fn from_payload(payload: &[u8]) -> Self {
        let counts = payload
            .chunks_exact(4)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        Self { counts }
    }

    pub fn to_payload(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.counts.len() * 4);
        for c in &self.counts {
            out.extend_from_slice(&c.to_le_bytes());
        }
        out
    }

    fn slot(&self, idx: usize) -> u32 {
        self.counts.get(idx).copied().unwrap_or(0)
    }

    pub fn set_slot(&mut self, idx: usize, value: u32) {
        if self.counts.len() <= idx {
            self.counts.resize(idx + 1, 0);
        }
        self.counts[idx] = value;
    }

    pub fn bin_data_count(&self) -> u32 {
        self.slot(id_slot::BIN_DATA)
    }

    pub fn font_count(&self) -> u32 {
        (id_slot::FONT_FIRST..=id_slot::FONT_LAST)
            .map(|i| self.slot(i))
            .sum()
    }

    pub fn border_fill_count(&self) -> u32 {
        self.slot(id_slot::BORDER_FILL)
    }

    pub fn char_shape_count(&self) -> u32 {
        self.slot(id_slot::CHAR_SHAPE)
    }

    pub fn tab_def_count(&self) -> u32 {
        self.slot(id_slot::TAB_DEF)
    }

    pub fn numbering_count(&self) -> u32 {
        self.slot(id_slot::NUMBERING)
    }

    pub fn bullet_count(&self) -> u32 {
        self.slot(id_slot::BULLET)
    }

    pub fn para_shape_count(&self) -> u32 {
        self.slot(id_slot::PARA_SHAPE)
    }

    pub fn style_count(&self) -> u32 {
        self.slot(id_slot::STYLE)
    }
}

/// A FACE_NAME record. The payload starts with an attribute byte flagging
/// optional sub-fields; the length-prefixed UTF-16LE font name follows that
/// byte, not the record start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaceName {
    pub properties: u8,
    pub name: String,
}

impl FaceName {
    pub fn from_payload(payload: &[u8]) -> Result<Self> {
        let mut reader = StreamReader::new(payload);
        if reader.remaining() < 3 {
            return Err(HwpError::Corrupt("FACE_NAME record too small".to_string()));
        }
        let properties = reader.read_u8()?;
        let name = reader.read_utf16_prefixed()?;
        Ok(Self { properties, name })
    }

    pub fn to_payload(&self) -> Vec<u8> {
        let mut writer = StreamWriter::new();
        writer.write_u8(self.properties);
        writer.write_prefixed_string(&self.name);
        writer.into_bytes()
    }
}

/// A CHAR_SHAPE record held as its raw 72-byte payload. Keeping the raw
/// bytes makes reuse-by-equality and minimum-diff patching exact; the
/// accessors below decode only the fields the editor interprets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharShapeRecord {
    pub raw: Vec<u8>,
}

mod cs_off {
    pub const FACE_NAME_IDS: usize = 0;
    pub const BASE_SIZE: usize = 42;
    pub const PROPERTIES: usize = 46;
    pub const TEXT_COLOR: usize = 52;
}

const CS_PROP_BOLD: u32 = 0x01;
const CS_PROP_ITALIC: u32 = 0x02;
// Underline kind lives in bits 2-4; 1 marks a plain bottom underline.
const CS_PROP_UNDERLINE_MASK: u32 = 0x7 << 2;
const CS_PROP_UNDERLINE_BOTTOM: u32 = 0x1 << 2;

impl CharShapeRecord {
    pub const MIN_LEN: usize = 70;

    pub fn from_payload(payload: &[u8]) -> Result<Self> {
        if payload.len() < Self::MIN_LEN {
            return Err(HwpError::Corrupt(format!(
                "CHAR_SHAPE record too small: {} bytes",
                payload.len()
            )));
        }
        Ok(Self {
            raw: payload.to_vec(),
        })
    }

    pub fn new_default() -> Self {
        let mut writer = StreamWriter::new();
        for _ in 0..7 {
            writer.write_u16(0); // face name ids: first font
        }
        for _ in 0..7 {
            writer.write_u8(100); // ratios
        }
        for _ in 0..7 {
            writer.write_u8(0); // char spacing
        }
        for _ in 0..7 {
            writer.write_u8(100); // relative sizes
        }
        for _ in 0..7 {
            writer.write_u8(0); // offsets
        }
        writer.write_i32(1000); // 10pt, 100 units per point
        writer.write_u32(0); // properties
        writer.write_u8(0); // shadow gap x
        writer.write_u8(0); // shadow gap y
        writer.write_u32(0x000000); // text color
        writer.write_u32(0x000000); // underline color
        writer.write_u32(0xFFFFFF); // shade color
        writer.write_u32(0x808080); // shadow color
        writer.write_u16(0); // border fill id
        writer.write_u16(0); // reserved, pads to 72 bytes
        Self {
            raw: writer.into_bytes(),
        }
    }

    fn u16_at(&self, off: usize) -> u16 {
        u16::from_le_bytes([self.raw[off], self.raw[off + 1]])
    }

    fn u32_at(&self, off: usize) -> u32 {
        u32::from_le_bytes([
            self.raw[off],
            self.raw[off + 1],
            self.raw[off + 2],
            self.raw[off + 3],
        ])
    }

    fn set_u32_at(&mut self, off: usize, v: u32) {
        self.raw[off..off + 4].copy_from_slice(&v.to_le_bytes());
    }

    pub fn font_ref(&self) -> u16 {
        self.u16_at(cs_off::FACE_NAME_IDS)
    }

    pub fn base_size(&self) -> i32 {
        self.u32_at(cs_off::BASE_SIZE) as i32
    }

    /// Size in points; the wire stores hundredths of a point.
    pub fn size_pt(&self) -> u32 {
        (self.base_size() / 100).max(0) as u32
    }

    pub fn properties(&self) -> u32 {
        self.u32_at(cs_off::PROPERTIES)
    }

    pub fn is_bold(&self) -> bool {
        self.properties() & CS_PROP_BOLD != 0
    }

    pub fn is_italic(&self) -> bool {
        self.properties() & CS_PROP_ITALIC != 0
    }

    pub fn is_underline(&self) -> bool {
        self.properties() & CS_PROP_UNDERLINE_MASK != 0
    }

    pub fn text_color(&self) -> u32 {
        self.u32_at(cs_off::TEXT_COLOR) & 0xFFFFFF
    }

    /// Derive a new record by applying format deltas to this one. Fields
    /// the format leaves `None` keep their current value.
    pub fn with_format(&self, format: &CharFormat) -> Self {
        let mut shape = self.clone();
        let mut properties = shape.properties();
        if let Some(bold) = format.bold {
            if bold {
                properties |= CS_PROP_BOLD;
            } else {
                properties &= !CS_PROP_BOLD;
            }
        }
        if let Some(italic) = format.italic {
            if italic {
                properties |= CS_PROP_ITALIC;
            } else {
                properties &= !CS_PROP_ITALIC;
            }
        }
        if let Some(underline) = format.underline {
            properties &= !CS_PROP_UNDERLINE_MASK;
            if underline {
                properties |= CS_PROP_UNDERLINE_BOTTOM;
            }
        }
        shape.set_u32_at(cs_off::PROPERTIES, properties);
        if let Some(size_pt) = format.size_pt {
            shape.set_u32_at(cs_off::BASE_SIZE, size_pt.saturating_mul(100));
        }
        if let Some(color) = format.color {
            shape.set_u32_at(cs_off::TEXT_COLOR, color & 0xFFFFFF);
        }
        shape
    }
}

/// A PARA_SHAPE record held raw, with the alignment and heading bits of
/// `properties1` decoded on demand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParaShapeRecord {
    pub raw: Vec<u8>,
}

const PS_ALIGN_SHIFT: u32 = 2;
const PS_ALIGN_MASK: u32 = 0x7 << PS_ALIGN_SHIFT;
const PS_HEADING_TYPE_SHIFT: u32 = 23;
const PS_HEADING_TYPE_MASK: u32 = 0x3 << PS_HEADING_TYPE_SHIFT;
const PS_HEADING_TYPE_OUTLINE: u32 = 1;
const PS_HEADING_LEVEL_SHIFT: u32 = 25;
const PS_HEADING_LEVEL_MASK: u32 = 0x7 << PS_HEADING_LEVEL_SHIFT;

impl ParaShapeRecord {
    pub const MIN_LEN: usize = 54;

    pub fn from_payload(payload: &[u8]) -> Result<Self> {
        if payload.len() < Self::MIN_LEN {
            return Err(HwpError::Corrupt(format!(
                "PARA_SHAPE record too small: {} bytes",
                payload.len()
            )));
        }
        Ok(Self {
            raw: payload.to_vec(),
        })
    }

    pub fn new_default() -> Self {
        let mut writer = StreamWriter::new();
        writer.write_u32(0); // properties1: left alignment
        writer.write_i32(0); // left margin
        writer.write_i32(0); // right margin
        writer.write_i32(0); // indent
        writer.write_i32(0); // space above
        writer.write_i32(0); // space below
        writer.write_i32(160); // line spacing 160%
        writer.write_u16(0); // tab def id
        writer.write_u16(0); // numbering id
        writer.write_u16(0); // border fill id
        writer.write_u16(0); // border spacing left
        writer.write_u16(0); // right
        writer.write_u16(0); // top
        writer.write_u16(0); // bottom
        writer.write_u32(0); // properties2
        writer.write_u32(0); // properties3
        writer.write_u32(0); // line spacing type: percent
        Self {
            raw: writer.into_bytes(),
        }
    }

    pub fn new_heading(level: u8) -> Self {
        let mut shape = Self::new_default();
        shape.set_heading_level(Some(level));
        shape
    }

    fn properties1(&self) -> u32 {
        u32::from_le_bytes([self.raw[0], self.raw[1], self.raw[2], self.raw[3]])
    }

    fn set_properties1(&mut self, v: u32) {
        self.raw[0..4].copy_from_slice(&v.to_le_bytes());
    }

    pub fn alignment(&self) -> Alignment {
        match (self.properties1() & PS_ALIGN_MASK) >> PS_ALIGN_SHIFT {
            1 => Alignment::Center,
            2 => Alignment::Right,
            3 => Alignment::Justify,
            _ => Alignment::Left,
        }
    }

    pub fn set_alignment(&mut self, align: Alignment) {
        let value: u32 = match align {
            Alignment::Left => 0,
            Alignment::Center => 1,
            Alignment::Right => 2,
            Alignment::Justify => 3,
        };
        let props = (self.properties1() & !PS_ALIGN_MASK) | (value << PS_ALIGN_SHIFT);
        self.set_properties1(props);
    }

    /// Outline level 1..=7, present when the heading type bits mark an
    /// outline paragraph. The wire stores level-1 in bits 25-27.
    pub fn heading_level(&self) -> Option<u8> {
        let props = self.properties1();
        let kind = (props & PS_HEADING_TYPE_MASK) >> PS_HEADING_TYPE_SHIFT;
        if kind != PS_HEADING_TYPE_OUTLINE {
            return None;
        }
        let level = ((props & PS_HEADING_LEVEL_MASK) >> PS_HEADING_LEVEL_SHIFT) as u8;
        Some(level + 1)
    }

    pub fn set_heading_level(&mut self, level: Option<u8>) {
        let mut props = self.properties1() & !(PS_HEADING_TYPE_MASK | PS_HEADING_LEVEL_MASK);
        if let Some(level) = level {
            let level = level.clamp(1, 7) as u32 - 1;
            props |= PS_HEADING_TYPE_OUTLINE << PS_HEADING_TYPE_SHIFT;
            props |= level << PS_HEADING_LEVEL_SHIFT;
        }
        self.set_properties1(props);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleRecord {
    pub name: String,
    pub english_name: String,
    pub properties: u8,
    pub next_style_id: u8,
    pub lang_id: u16,
    pub para_shape_id: u16,
    pub char_shape_id: u16,
}

impl StyleRecord {
    pub fn from_payload(payload: &[u8]) -> Result<Self> {
        let mut reader = StreamReader::new(payload);
        if reader.remaining() < 10 {
            return Err(HwpError::Corrupt(format!(
                "STYLE record too small: {} bytes",
                reader.remaining()
            )));
        }

        let name = reader.read_utf16_prefixed()?;
        let english_name = if reader.remaining() >= 2 {
            reader.read_utf16_prefixed()?
        } else {
            String::new()
        };

        if reader.remaining() < 8 {
            return Err(HwpError::Corrupt(
                "STYLE record missing property fields".to_string(),
            ));
        }

        Ok(Self {
            name,
            english_name,
            properties: reader.read_u8()?,
            next_style_id: reader.read_u8()?,
            lang_id: reader.read_u16()?,
            para_shape_id: reader.read_u16()?,
            char_shape_id: reader.read_u16()?,
        })
    }

    pub fn to_payload(&self) -> Vec<u8> {
        let mut writer = StreamWriter::new();
        writer.write_prefixed_string(&self.name);
        writer.write_prefixed_string(&self.english_name);
        writer.write_u8(self.properties);
        writer.write_u8(self.next_style_id);
        writer.write_u16(self.lang_id);
        writer.write_u16(self.para_shape_id);
        writer.write_u16(self.char_shape_id);
        writer.into_bytes()
    }

    /// Paragraph styles have type 0 in the low property bits.
    pub fn is_para_style(&self) -> bool {
        self.properties & 0x7 == 0
    }
}

/// A BIN_DATA record describing one binary attachment. Embedded data lives
/// in the container's `BinData/` storage, not in the record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinDataEntry {
    pub properties: u16,
    pub abs_name: String,
    pub rel_name: String,
    pub bin_id: u16,
    pub extension: String,
}

impl BinDataEntry {
    pub fn from_payload(payload: &[u8]) -> Result<Self> {
        let mut reader = StreamReader::new(payload);
        if reader.remaining() < 2 {
            return Err(HwpError::Corrupt("BIN_DATA record too small".to_string()));
        }
        let properties = reader.read_u16()?;

        let mut abs_name = String::new();
        let mut rel_name = String::new();
        let mut bin_id = 0;
        let mut extension = String::new();

        if properties & 0x3 == 0 {
            // Link: absolute and relative source paths.
            for target in [&mut abs_name, &mut rel_name] {
                if reader.remaining() >= 2 {
                    *target = reader.read_utf16_prefixed()?;
                }
            }
        } else {
            // Embedding or storage: id plus extension.
            if reader.remaining() >= 2 {
                bin_id = reader.read_u16()?;
            }
            if reader.remaining() >= 2 {
                extension = reader.read_utf16_prefixed()?;
            }
        }

        Ok(Self {
            properties,
            abs_name,
            rel_name,
            bin_id,
            extension,
        })
    }

    pub fn new_embedding(bin_id: u16, extension: &str, compressed: bool) -> Self {
        let mut properties = 0x1; // embedding
        if compressed {
            properties |= 0x4;
        }
        Self {
            properties,
            abs_name: String::new(),
            rel_name: String::new(),
            bin_id,
            extension: extension.to_string(),
        }
    }

    pub fn to_payload(&self) -> Vec<u8> {
        let mut writer = StreamWriter::new();
        writer.write_u16(self.properties);
        if self.properties & 0x3 == 0 {
            writer.write_prefixed_string(&self.abs_name);
            writer.write_prefixed_string(&self.rel_name);
        } else {
            writer.write_u16(self.bin_id);
            writer.write_prefixed_string(&self.extension);
        }
        writer.into_bytes()
    }

    pub fn is_embedding(&self) -> bool {
        self.properties & 0x3 == 1
    }

    pub fn is_compressed(&self) -> bool {
        self.properties & 0x4 != 0
    }

    /// Container stream path of the embedded payload.
    pub fn storage_path(&self) -> String {
        if self.extension.is_empty() {
            format!("BinData/BIN{:04X}", self.bin_id)
        } else {
            format!("BinData/BIN{:04X}.{}", self.bin_id, self.extension)
        }
    }

    pub fn is_image(&self) -> bool {
        matches!(
            self.extension.to_lowercase().as_str(),
            "bmp" | "gif" | "jpg" | "jpeg" | "png" | "tif" | "tiff"
        )
    }
}

/// Result of one pass over the DocInfo stream: every id-mapped record with
/// its position, so callers can both read the tables and patch them in
/// place. Positions go stale after any stream mutation; rescan.
#[derive(Debug, Default)]
pub struct DocInfoScan {
    pub id_mappings: Option<(RecordView, IdMappings)>,
    pub face_names: Vec<(RecordView, FaceName)>,
    pub char_shapes: Vec<(RecordView, CharShapeRecord)>,
    pub para_shapes: Vec<(RecordView, ParaShapeRecord)>,
    pub styles: Vec<(RecordView, StyleRecord)>,
    pub bin_data: Vec<(RecordView, BinDataEntry)>,
    pub border_fill_count: usize,
    pub tab_def_count: usize,
    pub numbering_count: usize,
    pub bullet_count: usize,
}

pub fn scan_doc_info(stream: &RecordStream) -> Result<DocInfoScan> {
    let mut scan = DocInfoScan::default();

    for view in stream.iter() {
        let view = view?;
        let payload = stream.payload(&view);
        match view.tag_id {
            tag::ID_MAPPINGS => {
                scan.id_mappings = Some((view, IdMappings::from_payload(payload)));
            }
            tag::FACE_NAME => {
                scan.face_names.push((view, FaceName::from_payload(payload)?));
            }
            tag::CHAR_SHAPE => {
                scan.char_shapes
                    .push((view, CharShapeRecord::from_payload(payload)?));
            }
            tag::PARA_SHAPE => {
                scan.para_shapes
                    .push((view, ParaShapeRecord::from_payload(payload)?));
            }
            tag::STYLE => {
                scan.styles.push((view, StyleRecord::from_payload(payload)?));
            }
            tag::BIN_DATA => {
                scan.bin_data
                    .push((view, BinDataEntry::from_payload(payload)?));
            }
            tag::BORDER_FILL => scan.border_fill_count += 1,
            tag::TAB_DEF => scan.tab_def_count += 1,
            tag::NUMBERING => scan.numbering_count += 1,
            tag::BULLET => scan.bullet_count += 1,
            _ => {}
        }
    }

    Ok(scan)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn char_shape_format_patch() {
        let base = CharShapeRecord::new_default();
        assert!(!base.is_bold());
        assert_eq!(base.size_pt(), 10);

        let bold = base.with_format(&CharFormat {
            bold: Some(true),
            size_pt: Some(14),
            ..Default::default()
        });
        assert!(bold.is_bold());
        assert_eq!(bold.size_pt(), 14);
        assert_ne!(bold.raw, base.raw);

        // Reverting the deltas restores byte equality.
        let reverted = bold.with_format(&CharFormat {
            bold: Some(false),
            size_pt: Some(10),
            ..Default::default()
        });
        assert_eq!(reverted.raw, base.raw);
    }

    #[test]
    fn para_shape_heading_bits() {
        let mut shape = ParaShapeRecord::new_default();
        assert_eq!(shape.heading_level(), None);

        shape.set_heading_level(Some(3));
        assert_eq!(shape.heading_level(), Some(3));

        shape.set_heading_level(None);
        assert_eq!(shape.heading_level(), None);
        assert_eq!(shape.alignment(), Alignment::Left);
    }

    #[test]
    fn style_payload_roundtrip() {
        let style = StyleRecord {
            name: "개요 1".to_string(),
            english_name: "Outline 1".to_string(),
            properties: 0,
            next_style_id: 1,
            lang_id: 0x0412,
            para_shape_id: 1,
            char_shape_id: 0,
        };
        let payload = style.to_payload();
        let parsed = StyleRecord::from_payload(&payload).unwrap();
        assert_eq!(parsed, style);
    }

    #[test]
    fn bin_data_embedding_roundtrip() {
        let entry = BinDataEntry::new_embedding(3, "png", true);
        let parsed = BinDataEntry::from_payload(&entry.to_payload()).unwrap();
        assert_eq!(parsed, entry);
        assert_eq!(parsed.storage_path(), "BinData/BIN0003.png");
        assert!(parsed.is_image());
    }

    #[test]
    fn face_name_skips_attribute_byte() {
        let face = FaceName {
            properties: 0,
            name: "맑은 고딕".to_string(),
        };
        let parsed = FaceName::from_payload(&face.to_payload()).unwrap();
        assert_eq!(parsed.name, "맑은 고딕");
    }
}
