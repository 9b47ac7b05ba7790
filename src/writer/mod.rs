//! HWP container wrapper and the minimum-diff record mutator. Every edit
//! rewrites only the records of the targeted paragraph (plus the DocInfo
//! count table where required); untouched streams are carried back to the
//! container byte-identical.

pub mod builder;

use crate::error::{HwpError, Result};
use crate::model::{CharFormat, DocFormat, Document, Font, CharStyle, ParaStyle, Style, StyleKind};
use crate::parser::body_text::{scan_section, section_from_scan, ParaScan, SectionScan};
use crate::parser::doc_info::{
    id_slot, scan_doc_info, BinDataEntry, DocInfoScan, ParaShapeRecord, StyleRecord,
};
use crate::parser::file_header::FileHeader;
use crate::parser::record::{tag, RecordStream};
use crate::reader::cfb::{read_container, write_container};
use crate::refs::{CellRef, DocRef, RefTarget};
use crate::utils::compression::{compress_stream, decompress_stream};
use crate::utils::encoding::{string_to_utf16le, units_to_bytes};
use log::{debug, warn};
use std::path::Path;

/// Where an inserted paragraph or table lands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertPosition {
    Before(DocRef),
    After(DocRef),
    End(usize),
}

impl InsertPosition {
    pub fn section(&self) -> usize {
        match self {
            Self::Before(r) | Self::After(r) => r.section,
            Self::End(section) => *section,
        }
    }
}

/// Style selection for `add_paragraph`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StyleSelector {
    Id(u16),
    Name(String),
}

/// One binary attachment as the container sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageEntry {
    pub path: String,
    pub extension: String,
    pub compressed: bool,
}

/// A loaded HWP 5.0 document: the parsed FileHeader, the decompressed
/// DocInfo and section record streams, and every container stream as
/// originally read so a save can round-trip unrelated streams untouched.
pub struct HwpFile {
    file_header: FileHeader,
    doc_info: RecordStream,
    sections: Vec<RecordStream>,
    entries: Vec<(String, Vec<u8>)>,
    doc_info_dirty: bool,
    sections_dirty: Vec<bool>,
}

impl HwpFile {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        Self::from_bytes(&bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Self::from_entries(read_container(bytes)?)
    }

    /// Assemble from a raw entry set (container stream bytes). Used by the
    /// container reader and by the blank-document builder.
    pub fn from_entries(entries: Vec<(String, Vec<u8>)>) -> Result<Self> {
        let header_bytes = entries
            .iter()
            .find(|(n, _)| n == "FileHeader")
            .map(|(_, b)| b.as_slice())
            .ok_or_else(|| HwpError::Corrupt("Missing FileHeader stream".to_string()))?;
        let file_header = FileHeader::parse(header_bytes)?;

        if file_header.is_encrypted() {
            return Err(HwpError::Unsupported(
                "Encrypted documents are not supported".to_string(),
            ));
        }

        let compressed = file_header.is_compressed();
        let read_stream = |name: &str| -> Option<Result<Vec<u8>>> {
            entries.iter().find(|(n, _)| n == name).map(|(_, b)| {
                if compressed {
                    decompress_stream(b)
                } else {
                    Ok(b.clone())
                }
            })
        };

        let doc_info_bytes = read_stream("DocInfo")
            .ok_or_else(|| HwpError::Corrupt("Missing DocInfo stream".to_string()))??;
        let doc_info = RecordStream::new(doc_info_bytes);

        let mut sections = Vec::new();
        loop {
            let name = format!("BodyText/Section{}", sections.len());
            match read_stream(&name) {
                Some(bytes) => sections.push(RecordStream::new(bytes?)),
                None => break,
            }
        }
        if sections.is_empty() {
            return Err(HwpError::Corrupt("No BodyText sections found".to_string()));
        }

        debug!(
            "loaded HWP: version {}, {} sections, compressed={}",
            file_header.version_string(),
            sections.len(),
            compressed
        );

        let section_count = sections.len();
        Ok(Self {
            file_header,
            doc_info,
            sections,
            entries,
            doc_info_dirty: false,
            sections_dirty: vec![false; section_count],
        })
    }

    pub fn file_header(&self) -> &FileHeader {
        &self.file_header
    }

    pub fn doc_info(&self) -> &RecordStream {
        &self.doc_info
    }

    pub fn section_count(&self) -> usize {
        self.sections.len()
    }

    pub fn section(&self, index: usize) -> Result<&RecordStream> {
        self.sections.get(index).ok_or_else(|| {
            HwpError::bad_ref(
                format!("s{}", index),
                format!(
                    "section {} does not exist (document has sections 0..{})",
                    index,
                    self.sections.len()
                ),
            )
        })
    }

    fn section_mut(&mut self, index: usize) -> Result<&mut RecordStream> {
        let count = self.sections.len();
        if let Some(dirty) = self.sections_dirty.get_mut(index) {
            *dirty = true;
        }
        self.sections.get_mut(index).ok_or_else(|| {
            HwpError::bad_ref(
                format!("s{}", index),
                format!(
                    "section {} does not exist (document has sections 0..{})",
                    index, count
                ),
            )
        })
    }

    /// Decode into the unified model.
    pub fn decode(&self) -> Result<Document> {
        let di = scan_doc_info(&self.doc_info)?;
        let mut document = Document::new(DocFormat::Hwp);
        document.header = header_tables_from_scan(&di);

        for stream in &self.sections {
            let scan = scan_section(stream)?;
            document.sections.push(section_from_scan(&scan, &di)?);
        }
        Ok(document)
    }

    /// Serialize back into a compound-file byte stream. Clean streams are
    /// written from their original bytes; mutated ones are re-compressed.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let compressed = self.file_header.is_compressed();
        let any_dirty = self.doc_info_dirty || self.sections_dirty.iter().any(|d| *d);

        let pack = |stream: &RecordStream| -> Result<Vec<u8>> {
            if compressed {
                compress_stream(stream.as_bytes())
            } else {
                Ok(stream.as_bytes().to_vec())
            }
        };

        let mut out = Vec::with_capacity(self.entries.len());
        for (name, raw) in &self.entries {
            let bytes = if name == "FileHeader" {
                self.file_header.to_bytes()
            } else if name == "DocInfo" {
                if self.doc_info_dirty {
                    pack(&self.doc_info)?
                } else {
                    raw.clone()
                }
            } else if let Some(section_idx) = name
                .strip_prefix("BodyText/Section")
                .and_then(|s| s.parse::<usize>().ok())
            {
                if self.sections_dirty.get(section_idx).copied().unwrap_or(false) {
                    pack(&self.sections[section_idx])?
                } else {
                    raw.clone()
                }
            } else if name == "PrvText" && any_dirty {
                // Keep the preview pane in sync with the mutated body.
                let text = self.decode().map(|d| d.plain_text()).unwrap_or_default();
                let preview: String = text.chars().take(1000).collect();
                string_to_utf16le(preview.trim_end_matches('\n'))
            } else {
                raw.clone()
            };
            out.push((name.clone(), bytes));
        }
        write_container(&out)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let bytes = self.to_bytes()?;
        crate::write_file_atomic(path.as_ref(), &bytes)
    }

    /// Replace a paragraph's text, leaving every surrounding record
    /// byte-identical. The paragraph may be a top-level one, a table-cell
    /// paragraph or a text-box paragraph, depending on the reference.
    pub fn set_text(&mut self, target: &DocRef, text: &str) -> Result<()> {
        let section_idx = target.section;
        self.section(section_idx)?;

        // Drop inline control codes from the replacement; the wire text
        // of the paragraph becomes exactly the visible text.
        let clean: String = text.chars().filter(|c| *c as u32 >= 0x20).collect();
        let units: Vec<u16> = clean.encode_utf16().collect();

        let stream = self.section_mut(section_idx)?;
        let scan = scan_section(stream)?;
        let para = locate_paragraph(&scan, target)?.clone();

        rewrite_paragraph_text(stream, &para, &units)?;
        debug!("set_text {}: {} code units", target, units.len());
        Ok(())
    }

    /// Apply character-format deltas over `[start, end)` unit offsets of a
    /// paragraph (whole paragraph when `range` is `None`). A CharShape
    /// equal to the result is reused; otherwise one is appended to DocInfo
    /// and the declared count bumped.
    pub fn apply_format(
        &mut self,
        target: &DocRef,
        range: Option<(usize, usize)>,
        format: &CharFormat,
    ) -> Result<()> {
        let section_idx = target.section;
        self.section(section_idx)?;

        let para = {
            let stream = self.section(section_idx)?;
            let scan = scan_section(stream)?;
            locate_paragraph(&scan, target)?.clone()
        };

        let unit_len = para.wire_units.len();
        let (start, end) = match range {
            Some((s, e)) => {
                if s >= unit_len {
                    return Err(HwpError::bad_ref(
                        target.to_string(),
                        format!(
                            "range start {} is past the end of the text (0..{})",
                            s, unit_len
                        ),
                    ));
                }
                (s as u32, (e.min(unit_len)) as u32)
            }
            None => (0, unit_len as u32),
        };

        // Normalized existing pairs: sorted, starting at position 0.
        let mut pairs: Vec<(u32, u16)> = para.shape_pairs.clone();
        pairs.sort_by_key(|p| p.0);
        if pairs.first().map(|p| p.0) != Some(0) {
            let first_id = pairs.first().map(|p| p.1).unwrap_or(0);
            pairs.insert(0, (0, first_id));
        }
        let shape_at = |pos: u32| -> u16 {
            pairs
                .iter()
                .take_while(|p| p.0 <= pos)
                .last()
                .map(|p| p.1)
                .unwrap_or(0)
        };
        let base_id = shape_at(start);
        let resume_id = shape_at(end);

        let target_id = self.find_or_append_char_shape(base_id, format)?;

        let mut map = std::collections::BTreeMap::new();
        for (pos, id) in &pairs {
            if *pos < start || *pos >= end {
                map.insert(*pos, *id);
            }
        }
        map.insert(start, target_id);
        if (end as usize) < unit_len {
            map.entry(end).or_insert(resume_id);
        }

        // Strictly increasing positions with adjacent duplicates merged.
        let mut new_pairs: Vec<(u32, u16)> = Vec::with_capacity(map.len());
        for (pos, id) in map {
            if new_pairs.last().map(|p| p.1) == Some(id) {
                continue;
            }
            new_pairs.push((pos, id));
        }

        let mut payload = Vec::with_capacity(new_pairs.len() * 8);
        for (pos, id) in &new_pairs {
            payload.extend(builder::shape_pair(*pos, *id));
        }

        let stream = self.section_mut(section_idx)?;
        match &para.char_shape {
            Some(view) => {
                stream.replace_payload(view.offset, &payload)?;
            }
            None => {
                let at = para
                    .text
                    .map(|t| t.end())
                    .unwrap_or_else(|| para.header.end());
                stream.insert_record(at, tag::PARA_CHAR_SHAPE, para.level + 1, &payload);
            }
        }
        stream.patch_payload(
            para.header.offset,
            12,
            &(new_pairs.len() as u16).to_le_bytes(),
        )?;

        debug!(
            "apply_format {}: [{}, {}) -> shape {}",
            target, start, end, target_id
        );
        Ok(())
    }

    /// Insert a new top-level paragraph. `heading` and `style` are
    /// mutually exclusive; either resolves through the style tables,
    /// appending new entries only when nothing matches.
    pub fn add_paragraph(
        &mut self,
        position: &InsertPosition,
        text: &str,
        heading: Option<u8>,
        style: Option<&StyleSelector>,
    ) -> Result<()> {
        if heading.is_some() && style.is_some() {
            return Err(HwpError::Conflicting(
                "heading and style are mutually exclusive".to_string(),
            ));
        }

        let (style_id, para_shape_id, char_shape_id) = self.resolve_paragraph_style(heading, style)?;
        let bytes = builder::paragraph_records(
            text,
            0,
            para_shape_id,
            style_id as u8,
            char_shape_id,
            false,
        );

        let section_idx = position.section();
        self.section(section_idx)?;
        let stream = self.section_mut(section_idx)?;
        let offset = insert_offset(stream, position)?;
        stream.insert_raw(offset, &bytes);
        debug!("add_paragraph at s{} offset {}", section_idx, offset);
        Ok(())
    }

    /// Insert an inline table hosted by a fresh paragraph.
    pub fn add_table(
        &mut self,
        position: &InsertPosition,
        rows: usize,
        cols: usize,
        data: Option<&[Vec<String>]>,
    ) -> Result<()> {
        if rows == 0 || cols == 0 {
            return Err(HwpError::Conflicting(
                "table must have at least one row and one column".to_string(),
            ));
        }
        let bytes = builder::table_records(rows, cols, data, 0);
        let section_idx = position.section();
        self.section(section_idx)?;
        let stream = self.section_mut(section_idx)?;
        let offset = insert_offset(stream, position)?;
        stream.insert_raw(offset, &bytes);
        debug!(
            "add_table {}x{} at s{} offset {}",
            rows, cols, section_idx, offset
        );
        Ok(())
    }

    /// Binary attachments declared in DocInfo.
    pub fn list_images(&self) -> Result<Vec<ImageEntry>> {
        let scan = scan_doc_info(&self.doc_info)?;
        Ok(scan
            .bin_data
            .iter()
            .map(|(_, e)| ImageEntry {
                path: e.storage_path(),
                extension: e.extension.clone(),
                compressed: e.is_compressed(),
            })
            .collect())
    }

    /// Decompressed bytes of an attachment by its container path.
    pub fn image_data(&self, path: &str) -> Result<Vec<u8>> {
        let scan = scan_doc_info(&self.doc_info)?;
        let entry = scan
            .bin_data
            .iter()
            .map(|(_, e)| e)
            .find(|e| e.storage_path() == path)
            .ok_or_else(|| HwpError::Corrupt(format!("No attachment at '{}'", path)))?;
        let raw = self
            .entries
            .iter()
            .find(|(n, _)| n == path)
            .map(|(_, b)| b.clone())
            .ok_or_else(|| {
                HwpError::Corrupt(format!("Attachment stream '{}' missing from container", path))
            })?;
        if entry.is_compressed() {
            return decompress_stream(&raw);
        }
        if self.file_header.is_compressed() {
            // Entries without an explicit compression flag follow the
            // document default; some writers still store them raw.
            return match decompress_stream(&raw) {
                Ok(data) => Ok(data),
                Err(_) => {
                    warn!("attachment '{}' is not deflate despite the document flag", path);
                    Ok(raw)
                }
            };
        }
        Ok(raw)
    }

    /// Add an image attachment; returns its container path. Only the
    /// binary attachment set is touched - synthesizing an inline picture
    /// record is out of scope for HWP.
    pub fn insert_image(&mut self, data: &[u8]) -> Result<String> {
        let format = crate::model::ImageFormat::from_bytes(data).ok_or_else(|| {
            HwpError::Unsupported(
                "Unrecognized image format; png, jpg and gif are supported".to_string(),
            )
        })?;

        let scan = scan_doc_info(&self.doc_info)?;
        let next_id = scan
            .bin_data
            .iter()
            .map(|(_, e)| e.bin_id)
            .max()
            .unwrap_or(0)
            + 1;
        let compressed = self.file_header.is_compressed();
        let entry = BinDataEntry::new_embedding(next_id, format.extension(), compressed);
        let path = entry.storage_path();

        let insert_at = scan
            .bin_data
            .last()
            .map(|(v, _)| v.end())
            .or_else(|| scan.id_mappings.as_ref().map(|(v, _)| v.end()))
            .unwrap_or(self.doc_info.len());
        self.doc_info
            .insert_record(insert_at, tag::BIN_DATA, 1, &entry.to_payload());
        self.doc_info_dirty = true;
        self.sync_id_mappings()?;

        let stored = if compressed {
            compress_stream(data)?
        } else {
            data.to_vec()
        };
        self.entries.push((path.clone(), stored));
        debug!("insert_image -> {}", path);
        Ok(path)
    }

    /// Anchoring a new picture inside a paragraph requires synthesizing a
    /// GSO subtree with layout fields this crate does not compute;
    /// attachments can only be added to the container's binary set.
    pub fn insert_image_inline(&mut self, target: &DocRef, _data: &[u8]) -> Result<String> {
        Err(HwpError::Unsupported(format!(
            "inline picture synthesis is not supported on HWP (target {}); \
             use insert_image to add the attachment only",
            target
        )))
    }

    /// Replace an existing attachment's bytes in place.
    pub fn replace_image(&mut self, path: &str, data: &[u8]) -> Result<()> {
        let scan = scan_doc_info(&self.doc_info)?;
        let entry = scan
            .bin_data
            .iter()
            .map(|(_, e)| e)
            .find(|e| e.storage_path() == path)
            .ok_or_else(|| HwpError::Corrupt(format!("No attachment at '{}'", path)))?;
        let stored = if entry.is_compressed() || self.file_header.is_compressed() {
            compress_stream(data)?
        } else {
            data.to_vec()
        };
        let slot = self
            .entries
            .iter_mut()
            .find(|(n, _)| n == path)
            .ok_or_else(|| {
                HwpError::Corrupt(format!("Attachment stream '{}' missing from container", path))
            })?;
        slot.1 = stored;
        Ok(())
    }

    /// Reconcile every ID_MAPPINGS count slot with the records actually
    /// present. Font slots keep their per-language split; the first slot
    /// absorbs any difference.
    pub fn sync_id_mappings(&mut self) -> Result<()> {
        let scan = scan_doc_info(&self.doc_info)?;
        let (view, mut mappings) = match &scan.id_mappings {
            Some((v, m)) => (*v, m.clone()),
            None => return Ok(()),
        };

        mappings.set_slot(id_slot::BIN_DATA, scan.bin_data.len() as u32);
        mappings.set_slot(id_slot::BORDER_FILL, scan.border_fill_count as u32);
        mappings.set_slot(id_slot::CHAR_SHAPE, scan.char_shapes.len() as u32);
        mappings.set_slot(id_slot::TAB_DEF, scan.tab_def_count as u32);
        mappings.set_slot(id_slot::NUMBERING, scan.numbering_count as u32);
        mappings.set_slot(id_slot::BULLET, scan.bullet_count as u32);
        mappings.set_slot(id_slot::PARA_SHAPE, scan.para_shapes.len() as u32);
        mappings.set_slot(id_slot::STYLE, scan.styles.len() as u32);

        let other_fonts: u32 = (id_slot::FONT_FIRST + 1..=id_slot::FONT_LAST)
            .map(|i| mappings.counts.get(i).copied().unwrap_or(0))
            .sum();
        let total = scan.face_names.len() as u32;
        mappings.set_slot(id_slot::FONT_FIRST, total.saturating_sub(other_fonts));

        let payload = mappings.to_payload();
        if payload.len() == view.size as usize {
            self.doc_info.patch_payload(view.offset, 0, &payload)?;
        } else {
            self.doc_info.replace_payload(view.offset, &payload)?;
        }
        self.doc_info_dirty = true;
        Ok(())
    }

    /// Find a CharShape equal to `base` with `format` applied, appending a
    /// new CHAR_SHAPE record (directly after the existing run of them, so
    /// they stay contiguous) when none matches.
    fn find_or_append_char_shape(&mut self, base_id: u16, format: &CharFormat) -> Result<u16> {
        let scan = scan_doc_info(&self.doc_info)?;
        let base = scan
            .char_shapes
            .get(base_id as usize)
            .map(|(_, s)| s.clone())
            .ok_or_else(|| {
                HwpError::Corrupt(format!(
                    "Dangling charShapeRef {} (document has {})",
                    base_id,
                    scan.char_shapes.len()
                ))
            })?;
        let wanted = base.with_format(format);

        for (idx, (_, shape)) in scan.char_shapes.iter().enumerate() {
            if shape.raw == wanted.raw {
                return Ok(idx as u16);
            }
        }

        let new_id = scan.char_shapes.len() as u16;
        let insert_at = scan
            .char_shapes
            .last()
            .map(|(v, _)| v.end())
            .unwrap_or(self.doc_info.len());
        self.doc_info
            .insert_record(insert_at, tag::CHAR_SHAPE, 1, &wanted.raw);
        self.doc_info_dirty = true;
        self.sync_id_mappings()?;
        Ok(new_id)
    }

    /// Resolve heading/style inputs to (style id, para shape id, char
    /// shape id) for a new paragraph.
    fn resolve_paragraph_style(
        &mut self,
        heading: Option<u8>,
        style: Option<&StyleSelector>,
    ) -> Result<(u16, u16, u16)> {
        let scan = scan_doc_info(&self.doc_info)?;

        if let Some(level) = heading {
            if !(1..=7).contains(&level) {
                return Err(HwpError::Conflicting(format!(
                    "heading level must be 1..7, got {}",
                    level
                )));
            }
            // A style backed by a paragraph shape with this outline
            // level, or carrying the conventional outline name.
            for (idx, (_, st)) in scan.styles.iter().enumerate() {
                let by_shape = scan
                    .para_shapes
                    .get(st.para_shape_id as usize)
                    .and_then(|(_, ps)| ps.heading_level())
                    == Some(level);
                if by_shape || st.name == format!("개요 {}", level) {
                    return Ok((idx as u16, st.para_shape_id, st.char_shape_id));
                }
            }
            return self.append_heading_style(level);
        }

        if let Some(selector) = style {
            let found = match selector {
                StyleSelector::Id(id) => scan
                    .styles
                    .get(*id as usize)
                    .map(|(_, st)| (*id, st.clone())),
                StyleSelector::Name(name) => scan
                    .styles
                    .iter()
                    .enumerate()
                    .find(|(_, (_, st))| st.name == *name || st.english_name == *name)
                    .map(|(idx, (_, st))| (idx as u16, st.clone())),
            };
            return match found {
                Some((id, st)) => Ok((id, st.para_shape_id, st.char_shape_id)),
                None => {
                    let label = match selector {
                        StyleSelector::Id(id) => id.to_string(),
                        StyleSelector::Name(name) => name.clone(),
                    };
                    Err(HwpError::bad_ref(
                        label,
                        format!("no such style (document has styles 0..{})", scan.styles.len()),
                    ))
                }
            };
        }

        let base = scan.styles.first().map(|(_, st)| st.clone());
        Ok(match base {
            Some(st) => (0, st.para_shape_id, st.char_shape_id),
            None => (0, 0, 0),
        })
    }

    /// Append a heading paragraph shape and its outline style, keeping the
    /// declared counts in step. Returns the new (style, para shape, char
    /// shape) triple.
    fn append_heading_style(&mut self, level: u8) -> Result<(u16, u16, u16)> {
        let scan = scan_doc_info(&self.doc_info)?;

        let para_shape_id = scan.para_shapes.len() as u16;
        let shape = ParaShapeRecord::new_heading(level);
        let shape_at = scan
            .para_shapes
            .last()
            .map(|(v, _)| v.end())
            .unwrap_or(self.doc_info.len());
        self.doc_info
            .insert_record(shape_at, tag::PARA_SHAPE, 1, &shape.raw);

        // Styles sit after paragraph shapes; rescan for fresh offsets.
        let scan = scan_doc_info(&self.doc_info)?;
        let style_id = scan.styles.len() as u16;
        let record = StyleRecord {
            name: format!("개요 {}", level),
            english_name: format!("Outline {}", level),
            properties: 0,
            next_style_id: style_id as u8,
            lang_id: 0x0412,
            para_shape_id,
            char_shape_id: 0,
        };
        let style_at = scan
            .styles
            .last()
            .map(|(v, _)| v.end())
            .unwrap_or(self.doc_info.len());
        self.doc_info
            .insert_record(style_at, tag::STYLE, 1, &record.to_payload());

        self.doc_info_dirty = true;
        self.sync_id_mappings()?;
        Ok((style_id, para_shape_id, 0))
    }
}

/// Byte offset for an insertion position within a section stream.
fn insert_offset(stream: &RecordStream, position: &InsertPosition) -> Result<usize> {
    match position {
        InsertPosition::End(_) => Ok(stream.len()),
        InsertPosition::Before(r) | InsertPosition::After(r) => {
            let index = match &r.target {
                RefTarget::Paragraph { index, .. } => *index,
                _ => {
                    return Err(HwpError::bad_ref(
                        r.to_string(),
                        "insert position must name a top-level paragraph",
                    ))
                }
            };
            let scan = scan_section(stream)?;
            let para = scan.paragraphs.get(index).ok_or_else(|| {
                HwpError::bad_ref(
                    r.to_string(),
                    format!(
                        "paragraph {} does not exist (section has paragraphs 0..{})",
                        index,
                        scan.paragraphs.len()
                    ),
                )
            })?;
            Ok(match position {
                InsertPosition::Before(_) => para.header.offset,
                _ => para.span_end,
            })
        }
    }
}

/// Resolve a reference to the paragraph scan it addresses, descending
/// through table cells and text boxes.
fn locate_paragraph<'a>(scan: &'a SectionScan, target: &DocRef) -> Result<&'a ParaScan> {
    let reference = target.to_string();
    match &target.target {
        RefTarget::Paragraph { index, .. } => scan.paragraphs.get(*index).ok_or_else(|| {
            HwpError::bad_ref(
                &reference,
                format!(
                    "paragraph {} does not exist (section has paragraphs 0..{})",
                    index,
                    scan.paragraphs.len()
                ),
            )
        }),
        RefTarget::Table { index, cell } => {
            let table = scan.tables.get(*index).ok_or_else(|| {
                HwpError::bad_ref(
                    &reference,
                    format!(
                        "table {} does not exist (section has tables 0..{})",
                        index,
                        scan.tables.len()
                    ),
                )
            })?;
            let CellRef {
                row,
                col,
                paragraph,
            } = (*cell).ok_or_else(|| {
                HwpError::bad_ref(&reference, "a cell reference is required for cell edits")
            })?;

            let cell_scan = table
                .cells
                .iter()
                .find(|c| c.addr == Some((col as u16, row as u16)))
                .or_else(|| {
                    let cols = table.col_count.max(1) as usize;
                    table.cells.get(row * cols + col)
                })
                .ok_or_else(|| {
                    HwpError::bad_ref(
                        &reference,
                        format!(
                            "cell r{}c{} does not exist ({}x{} table)",
                            row, col, table.row_count, table.col_count
                        ),
                    )
                })?;

            let para_idx = paragraph.unwrap_or(0);
            cell_scan.paragraphs.get(para_idx).ok_or_else(|| {
                HwpError::bad_ref(
                    &reference,
                    format!(
                        "paragraph {} does not exist (cell has paragraphs 0..{})",
                        para_idx,
                        cell_scan.paragraphs.len()
                    ),
                )
            })
        }
        RefTarget::TextBox { index, paragraph } => {
            let text_box = scan.text_boxes.get(*index).ok_or_else(|| {
                HwpError::bad_ref(
                    &reference,
                    format!(
                        "text box {} does not exist (section has text boxes 0..{})",
                        index,
                        scan.text_boxes.len()
                    ),
                )
            })?;
            let para_idx = paragraph.unwrap_or(0);
            text_box.paragraphs.get(para_idx).ok_or_else(|| {
                HwpError::bad_ref(
                    &reference,
                    format!(
                        "paragraph {} does not exist (text box has paragraphs 0..{})",
                        para_idx,
                        text_box.paragraphs.len()
                    ),
                )
            })
        }
        _ => Err(HwpError::bad_ref(
            &reference,
            "reference does not address a paragraph",
        )),
    }
}

/// The record-level text replacement shared by every set-text path.
/// Structural edits are applied in descending offset order so earlier
/// offsets stay valid; the PARA_HEADER field patches are fixed-size and
/// come last.
fn rewrite_paragraph_text(
    stream: &mut RecordStream,
    para: &ParaScan,
    units: &[u16],
) -> Result<()> {
    enum Op {
        TruncatePairs(usize, u16),
        SwapText(usize, Vec<u8>),
        RemoveText(usize),
        InsertText(usize, Vec<u8>),
    }

    let mut ops: Vec<(usize, Op)> = Vec::new();
    if let Some(cs) = &para.char_shape {
        let first_id = para.shape_pairs.first().map(|p| p.1).unwrap_or(0);
        ops.push((cs.offset, Op::TruncatePairs(cs.offset, first_id)));
    }
    if units.is_empty() {
        // An empty paragraph omits PARA_TEXT entirely rather than
        // carrying a zero-sized record.
        if let Some(text) = &para.text {
            ops.push((text.offset, Op::RemoveText(text.offset)));
        }
    } else {
        let payload = units_to_bytes(units);
        match &para.text {
            Some(text) => ops.push((text.offset, Op::SwapText(text.offset, payload))),
            None => ops.push((para.header.end(), Op::InsertText(para.header.end(), payload))),
        }
    }

    ops.sort_by(|a, b| b.0.cmp(&a.0));
    for (_, op) in ops {
        match op {
            Op::TruncatePairs(offset, first_id) => {
                stream.replace_payload(offset, &builder::shape_pair(0, first_id))?;
            }
            Op::SwapText(offset, payload) => {
                stream.replace_payload(offset, &payload)?;
            }
            Op::RemoveText(offset) => {
                stream.remove_record(offset)?;
            }
            Op::InsertText(offset, payload) => {
                stream.insert_record(offset, tag::PARA_TEXT, para.level + 1, &payload);
            }
        }
    }

    let n_chars = (units.len() as u32) | (para.n_chars_raw & 0x8000_0000);
    stream.patch_payload(para.header.offset, 0, &n_chars.to_le_bytes())?;
    if para.char_shape.is_some() {
        stream.patch_payload(para.header.offset, 12, &1u16.to_le_bytes())?;
    }
    Ok(())
}

/// Model header tables from a DocInfo scan.
pub fn header_tables_from_scan(scan: &DocInfoScan) -> crate::model::HeaderTables {
    let mut header = crate::model::HeaderTables::default();
    for (idx, (_, face)) in scan.face_names.iter().enumerate() {
        header.fonts.push(Font {
            id: idx as u16,
            name: face.name.clone(),
        });
    }
    for (idx, (_, shape)) in scan.char_shapes.iter().enumerate() {
        header.char_shapes.push(CharStyle {
            id: idx as u16,
            font_ref: shape.font_ref(),
            size_pt: shape.size_pt(),
            bold: shape.is_bold(),
            italic: shape.is_italic(),
            underline: shape.is_underline(),
            color: shape.text_color(),
        });
    }
    for (idx, (_, shape)) in scan.para_shapes.iter().enumerate() {
        header.para_shapes.push(ParaStyle {
            id: idx as u16,
            align: shape.alignment(),
            heading_level: shape.heading_level(),
        });
    }
    for (idx, (_, style)) in scan.styles.iter().enumerate() {
        header.styles.push(Style {
            id: idx as u16,
            name: style.name.clone(),
            english_name: style.english_name.clone(),
            char_shape_ref: style.char_shape_id,
            para_shape_ref: style.para_shape_id,
            kind: if style.is_para_style() {
                StyleKind::Para
            } else {
                StyleKind::Char
            },
        });
    }
    header
}
