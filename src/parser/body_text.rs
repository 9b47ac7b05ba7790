use crate::error::{HwpError, Result};
use crate::model::{
    Anchor, AnchorKind, Image, ImageFormat, Paragraph, Run, Section, Table, TableCell, TableRow,
    TextBox,
};
use crate::parser::doc_info::DocInfoScan;
use crate::parser::record::{ctrl_id, tag, RecordStream, RecordView};
use crate::utils::encoding::{bytes_to_units, slice_runs, wire_units_to_plain};
use log::warn;

/// Decoded positions and fields of one paragraph in a section stream.
/// `span_end` covers the paragraph's whole subtree, nested controls
/// included. Positions go stale after any stream mutation; rescan.
#[derive(Debug, Clone)]
pub struct ParaScan {
    pub header: RecordView,
    pub level: u16,
    pub n_chars_raw: u32,
    pub para_shape_id: u16,
    pub style_id: u8,
    pub char_shape_count: u16,
    pub text: Option<RecordView>,
    pub char_shape: Option<RecordView>,
    pub span_end: usize,
    pub wire_units: Vec<u16>,
    pub shape_pairs: Vec<(u32, u16)>,
}

impl ParaScan {
    /// Declared character count with the reserved high bit masked off.
    pub fn n_chars(&self) -> u32 {
        self.n_chars_raw & 0x7FFF_FFFF
    }

    pub fn plain_text(&self) -> Result<String> {
        wire_units_to_plain(&self.wire_units)
    }
}

#[derive(Debug, Clone)]
pub struct CellScan {
    pub list_header: RecordView,
    pub addr: Option<(u16, u16)>,
    pub col_span: u16,
    pub row_span: u16,
    pub paragraphs: Vec<ParaScan>,
}

#[derive(Debug, Clone)]
pub struct TableScan {
    pub ctrl: RecordView,
    pub host_para: usize,
    pub row_count: u16,
    pub col_count: u16,
    pub cells: Vec<CellScan>,
}

#[derive(Debug, Clone)]
pub struct TextBoxScan {
    pub ctrl: RecordView,
    pub host_para: usize,
    pub paragraphs: Vec<ParaScan>,
}

#[derive(Debug, Clone)]
pub struct PictureScan {
    pub record: RecordView,
    pub host_para: usize,
    pub bin_data_ref: Option<u16>,
    pub width: u32,
    pub height: u32,
}

/// One pass over a section stream: top-level paragraphs plus the table,
/// text-box and picture subtrees hanging off them, each with enough byte
/// positions for a minimum-diff rewrite.
#[derive(Debug, Default)]
pub struct SectionScan {
    pub paragraphs: Vec<ParaScan>,
    pub tables: Vec<TableScan>,
    pub text_boxes: Vec<TextBoxScan>,
    pub pictures: Vec<PictureScan>,
}

fn parse_para_header_payload(payload: &[u8]) -> Result<(u32, u16, u8, u16)> {
    if payload.len() < 14 {
        return Err(HwpError::Corrupt(format!(
            "PARA_HEADER record too small: {} bytes",
            payload.len()
        )));
    }
    let n_chars = u32::from_le_bytes([payload[0], payload[1], payload[2], payload[3]]);
    let para_shape_id = u16::from_le_bytes([payload[8], payload[9]]);
    let style_id = payload[10];
    let char_shape_count = u16::from_le_bytes([payload[12], payload[13]]);
    Ok((n_chars, para_shape_id, style_id, char_shape_count))
}

fn parse_shape_pairs(payload: &[u8]) -> Vec<(u32, u16)> {
    payload
        .chunks_exact(8)
        .map(|pair| {
            let position = u32::from_le_bytes([pair[0], pair[1], pair[2], pair[3]]);
            let shape_id = u32::from_le_bytes([pair[4], pair[5], pair[6], pair[7]]) as u16;
            (position, shape_id)
        })
        .collect()
}

/// Parse the paragraph whose PARA_HEADER is `records[start]`, consuming
/// its direct children; the span runs until the next record at or above
/// the header's level.
fn scan_paragraph(
    stream: &RecordStream,
    records: &[RecordView],
    start: usize,
    stream_len: usize,
) -> Result<(ParaScan, usize)> {
    let header = records[start];
    let (n_chars_raw, para_shape_id, style_id, char_shape_count) =
        parse_para_header_payload(stream.payload(&header))?;

    let mut text = None;
    let mut char_shape = None;
    let mut i = start + 1;
    while i < records.len() && records[i].level > header.level {
        let child = records[i];
        if child.level > header.level + 1 && child.tag_id == tag::PARA_TEXT && text.is_none() {
            // A child nested deeper than expected; tolerated, but it does
            // not belong to this paragraph directly.
            warn!(
                "record level skip: PARA_TEXT at level {} under paragraph level {}",
                child.level, header.level
            );
        }
        if child.level == header.level + 1 {
            match child.tag_id {
                tag::PARA_TEXT if text.is_none() => text = Some(child),
                tag::PARA_CHAR_SHAPE if char_shape.is_none() => char_shape = Some(child),
                _ => {}
            }
        }
        i += 1;
    }
    let span_end = if i < records.len() {
        records[i].offset
    } else {
        stream_len
    };

    let wire_units = match &text {
        Some(view) => bytes_to_units(stream.payload(view)),
        None => Vec::new(),
    };
    let shape_pairs = match &char_shape {
        Some(view) => parse_shape_pairs(stream.payload(view)),
        None => Vec::new(),
    };

    Ok((
        ParaScan {
            header,
            level: header.level,
            n_chars_raw,
            para_shape_id,
            style_id,
            char_shape_count,
            text,
            char_shape,
            span_end,
            wire_units,
            shape_pairs,
        },
        i,
    ))
}

/// Parse the LIST_HEADER cell attributes our writer emits: list fields
/// (para count, flags, property) then cell address, span, size, margins
/// and border fill. Foreign layouts that are too short simply yield no
/// address.
fn parse_cell_attrs(payload: &[u8]) -> (Option<(u16, u16)>, u16, u16) {
    if payload.len() < 16 {
        return (None, 1, 1);
    }
    let col = u16::from_le_bytes([payload[8], payload[9]]);
    let row = u16::from_le_bytes([payload[10], payload[11]]);
    let col_span = u16::from_le_bytes([payload[12], payload[13]]).max(1);
    let row_span = u16::from_le_bytes([payload[14], payload[15]]).max(1);
    (Some((col, row)), col_span, row_span)
}

/// Paragraph sub-stream under a LIST_HEADER: PARA_HEADER records one
/// level below the list header, until the subtree ends.
fn scan_list_paragraphs(
    stream: &RecordStream,
    records: &[RecordView],
    list_idx: usize,
    subtree_end: usize,
    stream_len: usize,
) -> Result<Vec<ParaScan>> {
    let list_level = records[list_idx].level;
    let mut paragraphs = Vec::new();
    let mut i = list_idx + 1;
    while i < subtree_end && records[i].level > list_level {
        if records[i].tag_id == tag::PARA_HEADER && records[i].level == list_level + 1 {
            let (para, next) = scan_paragraph(stream, records, i, stream_len)?;
            paragraphs.push(para);
            i = next;
        } else {
            i += 1;
        }
    }
    Ok(paragraphs)
}

fn scan_table_ctrl(
    stream: &RecordStream,
    records: &[RecordView],
    ctrl_idx: usize,
    subtree_end: usize,
    host_para: usize,
    stream_len: usize,
) -> Result<TableScan> {
    let ctrl = records[ctrl_idx];
    let mut row_count = 0;
    let mut col_count = 0;
    let mut cells = Vec::new();

    let mut i = ctrl_idx + 1;
    while i < subtree_end {
        let record = records[i];
        match record.tag_id {
            tag::TABLE => {
                let payload = stream.payload(&record);
                if payload.len() >= 8 {
                    row_count = u16::from_le_bytes([payload[4], payload[5]]);
                    col_count = u16::from_le_bytes([payload[6], payload[7]]);
                }
                i += 1;
            }
            tag::LIST_HEADER => {
                let (addr, col_span, row_span) = parse_cell_attrs(stream.payload(&record));
                let paragraphs =
                    scan_list_paragraphs(stream, records, i, subtree_end, stream_len)?;
                // Advance past the whole cell subtree.
                let list_level = record.level;
                let mut next = i + 1;
                while next < subtree_end && records[next].level > list_level {
                    next += 1;
                }
                cells.push(CellScan {
                    list_header: record,
                    addr,
                    col_span,
                    row_span,
                    paragraphs,
                });
                i = next;
            }
            _ => i += 1,
        }
    }

    Ok(TableScan {
        ctrl,
        host_para,
        row_count,
        col_count,
        cells,
    })
}

fn scan_shape_ctrl(
    stream: &RecordStream,
    records: &[RecordView],
    ctrl_idx: usize,
    subtree_end: usize,
    host_para: usize,
    stream_len: usize,
) -> Result<(Option<TextBoxScan>, Option<PictureScan>)> {
    let ctrl = records[ctrl_idx];
    let mut text_box = None;
    let mut picture = None;

    let mut i = ctrl_idx + 1;
    let mut seen_rectangle = false;
    while i < subtree_end {
        let record = records[i];
        match record.tag_id {
            tag::SHAPE_COMPONENT_RECTANGLE => {
                seen_rectangle = true;
                i += 1;
            }
            tag::LIST_HEADER if seen_rectangle && text_box.is_none() => {
                let paragraphs =
                    scan_list_paragraphs(stream, records, i, subtree_end, stream_len)?;
                let list_level = record.level;
                let mut next = i + 1;
                while next < subtree_end && records[next].level > list_level {
                    next += 1;
                }
                text_box = Some(TextBoxScan {
                    ctrl,
                    host_para,
                    paragraphs,
                });
                i = next;
            }
            tag::SHAPE_COMPONENT_PICTURE if picture.is_none() => {
                let payload = stream.payload(&record);
                // Picture info trails the border, corner, crop and margin
                // fields; the bin-data reference sits behind three
                // one-byte effect fields.
                let bin_data_ref = if payload.len() >= 73 {
                    Some(u16::from_le_bytes([payload[71], payload[72]]))
                } else {
                    None
                };
                picture = Some(PictureScan {
                    record,
                    host_para,
                    bin_data_ref,
                    width: 0,
                    height: 0,
                });
                i += 1;
            }
            _ => i += 1,
        }
    }

    // Pull width/height for a picture from the first SHAPE_COMPONENT.
    if let Some(pic) = picture.as_mut() {
        for record in &records[ctrl_idx + 1..subtree_end] {
            if record.tag_id == tag::SHAPE_COMPONENT {
                let payload = stream.payload(record);
                if payload.len() >= 32 {
                    pic.width = u32::from_le_bytes([
                        payload[24], payload[25], payload[26], payload[27],
                    ]);
                    pic.height = u32::from_le_bytes([
                        payload[28], payload[29], payload[30], payload[31],
                    ]);
                }
                break;
            }
        }
    }

    Ok((text_box, picture))
}

/// Scan a decompressed section stream.
pub fn scan_section(stream: &RecordStream) -> Result<SectionScan> {
    let records = stream.records()?;
    let stream_len = stream.len();
    let mut scan = SectionScan::default();

    let mut prev_level: i32 = -1;
    for record in &records {
        if record.level as i32 > prev_level + 1 {
            warn!(
                "record 0x{:02X} at offset {} skips from level {} to {}",
                record.tag_id, record.offset, prev_level, record.level
            );
        }
        prev_level = record.level as i32;
    }

    let mut i = 0;
    while i < records.len() {
        let record = records[i];
        if record.tag_id == tag::PARA_HEADER && record.level == 0 {
            let para_idx = scan.paragraphs.len();
            let (para, next) = scan_paragraph(stream, &records, i, stream_len)?;

            // Controls directly under this paragraph.
            let mut j = i + 1;
            while j < next {
                let child = records[j];
                if child.tag_id == tag::CTRL_HEADER && child.level == record.level + 1 {
                    let payload = stream.payload(&child);
                    let id = if payload.len() >= 4 {
                        u32::from_le_bytes([payload[0], payload[1], payload[2], payload[3]])
                    } else {
                        0
                    };
                    let ctrl_level = child.level;
                    let mut subtree_end = j + 1;
                    while subtree_end < next && records[subtree_end].level > ctrl_level {
                        subtree_end += 1;
                    }
                    match id {
                        ctrl_id::TABLE => {
                            let table = scan_table_ctrl(
                                stream,
                                &records,
                                j,
                                subtree_end,
                                para_idx,
                                stream_len,
                            )?;
                            scan.tables.push(table);
                        }
                        ctrl_id::SHAPE_OBJECT => {
                            let (text_box, picture) = scan_shape_ctrl(
                                stream,
                                &records,
                                j,
                                subtree_end,
                                para_idx,
                                stream_len,
                            )?;
                            if let Some(tb) = text_box {
                                scan.text_boxes.push(tb);
                            }
                            if let Some(pic) = picture {
                                scan.pictures.push(pic);
                            }
                        }
                        _ => {}
                    }
                    j = subtree_end;
                } else {
                    j += 1;
                }
            }

            scan.paragraphs.push(para);
            i = next;
        } else {
            i += 1;
        }
    }

    Ok(scan)
}

fn paragraph_from_scan(para: &ParaScan) -> Result<Paragraph> {
    let mut runs = Vec::new();
    if para.shape_pairs.is_empty() {
        let text = wire_units_to_plain(&para.wire_units)?;
        runs.push(Run {
            text,
            char_shape_ref: 0,
        });
    } else {
        let positions: Vec<u32> = para.shape_pairs.iter().map(|(p, _)| *p).collect();
        let texts = slice_runs(&para.wire_units, &positions)?;
        for (text, (_, shape_id)) in texts.into_iter().zip(&para.shape_pairs) {
            runs.push(Run {
                text,
                char_shape_ref: *shape_id,
            });
        }
        // Collapse run fragments that strip to nothing, but keep one run
        // so the paragraph stays addressable.
        if runs.iter().all(|r| r.text.is_empty()) {
            runs.truncate(1);
        } else {
            runs.retain(|r| !r.text.is_empty());
        }
    }

    Ok(Paragraph {
        runs,
        para_shape_ref: para.para_shape_id,
        style_ref: para.style_id as u16,
        anchors: Vec::new(),
    })
}

/// Build the model section from a scan, resolving picture bin-data
/// references against the DocInfo attachment table.
pub fn section_from_scan(scan: &SectionScan, doc_info: &DocInfoScan) -> Result<Section> {
    let mut section = Section::default();

    for para in &scan.paragraphs {
        section.paragraphs.push(paragraph_from_scan(para)?);
    }

    for (table_idx, table_scan) in scan.tables.iter().enumerate() {
        let table = table_from_scan(table_scan)?;
        if let Some(host) = section.paragraphs.get_mut(table_scan.host_para) {
            host.anchors.push(Anchor {
                kind: AnchorKind::Table,
                index: table_idx,
            });
        }
        section.tables.push(table);
    }

    for (tb_idx, tb_scan) in scan.text_boxes.iter().enumerate() {
        let mut text_box = TextBox::default();
        for para in &tb_scan.paragraphs {
            text_box.paragraphs.push(paragraph_from_scan(para)?);
        }
        if let Some(host) = section.paragraphs.get_mut(tb_scan.host_para) {
            host.anchors.push(Anchor {
                kind: AnchorKind::TextBox,
                index: tb_idx,
            });
        }
        section.text_boxes.push(text_box);
    }

    for pic in &scan.pictures {
        let entry = pic.bin_data_ref.and_then(|id| {
            doc_info
                .bin_data
                .iter()
                .map(|(_, e)| e)
                .find(|e| e.bin_id == id)
        });
        let (path, format) = match entry {
            Some(entry) => (
                entry.storage_path(),
                ImageFormat::from_extension(&entry.extension).unwrap_or(ImageFormat::Png),
            ),
            None => continue,
        };
        let image_idx = section.images.len();
        if let Some(host) = section.paragraphs.get_mut(pic.host_para) {
            host.anchors.push(Anchor {
                kind: AnchorKind::Image,
                index: image_idx,
            });
        }
        section.images.push(Image {
            bin_data_path: path,
            width: pic.width,
            height: pic.height,
            format,
        });
    }

    Ok(section)
}

fn table_from_scan(table_scan: &TableScan) -> Result<Table> {
    let mut table = Table::default();
    let rows = table_scan.row_count.max(1) as usize;
    let cols = table_scan.col_count.max(1) as usize;

    // Lay cells out by their stored address; sequential fill when a cell
    // carries no address.
    let mut grid: Vec<Vec<Option<TableCell>>> = vec![vec![None; cols]; rows];
    let mut cursor = 0usize;
    for cell_scan in &table_scan.cells {
        let mut cell = TableCell {
            paragraphs: Vec::new(),
            col_span: cell_scan.col_span,
            row_span: cell_scan.row_span,
        };
        for para in &cell_scan.paragraphs {
            cell.paragraphs.push(paragraph_from_scan(para)?);
        }
        if cell.paragraphs.is_empty() {
            cell.paragraphs.push(Paragraph::from_text("", 0));
        }

        let (col, row) = match cell_scan.addr {
            Some((c, r)) => (c as usize, r as usize),
            None => (cursor % cols, cursor / cols),
        };
        cursor += 1;
        if row < rows && col < cols {
            grid[row][col] = Some(cell);
        }
    }

    for row_cells in grid {
        let mut row = TableRow::default();
        for cell in row_cells.into_iter().flatten() {
            row.cells.push(cell);
        }
        table.rows.push(row);
    }

    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::record::encode_record;
    use crate::utils::encoding::string_to_utf16le;

    fn para_header_payload(n_chars: u32, char_shape_count: u16) -> Vec<u8> {
        let mut payload = Vec::new();
        payload.extend_from_slice(&n_chars.to_le_bytes());
        payload.extend_from_slice(&0u32.to_le_bytes()); // control mask
        payload.extend_from_slice(&0u16.to_le_bytes()); // para shape
        payload.push(0); // style
        payload.push(0); // divide
        payload.extend_from_slice(&char_shape_count.to_le_bytes());
        payload.extend_from_slice(&0u16.to_le_bytes()); // range tags
        payload.extend_from_slice(&1u16.to_le_bytes()); // line aligns
        payload.extend_from_slice(&0u32.to_le_bytes()); // instance id
        payload
    }

    fn simple_section(texts: &[&str]) -> RecordStream {
        let mut data = Vec::new();
        for text in texts {
            let wire = string_to_utf16le(text);
            data.extend(encode_record(
                tag::PARA_HEADER,
                0,
                &para_header_payload((wire.len() / 2) as u32, 1),
            ));
            data.extend(encode_record(tag::PARA_TEXT, 1, &wire));
            let mut pairs = Vec::new();
            pairs.extend_from_slice(&0u32.to_le_bytes());
            pairs.extend_from_slice(&0u32.to_le_bytes());
            data.extend(encode_record(tag::PARA_CHAR_SHAPE, 1, &pairs));
        }
        RecordStream::new(data)
    }

    #[test]
    fn scans_top_level_paragraphs() {
        let stream = simple_section(&["첫 문단", "둘째 문단"]);
        let scan = scan_section(&stream).unwrap();
        assert_eq!(scan.paragraphs.len(), 2);
        assert_eq!(scan.paragraphs[0].plain_text().unwrap(), "첫 문단");
        assert_eq!(scan.paragraphs[1].plain_text().unwrap(), "둘째 문단");
        assert_eq!(scan.paragraphs[0].n_chars(), 4);
    }

    #[test]
    fn model_runs_follow_shape_pairs() {
        let wire = string_to_utf16le("Hello World");
        let mut data = Vec::new();
        data.extend(encode_record(
            tag::PARA_HEADER,
            0,
            &para_header_payload(11, 2),
        ));
        data.extend(encode_record(tag::PARA_TEXT, 1, &wire));
        let mut pairs = Vec::new();
        pairs.extend_from_slice(&0u32.to_le_bytes());
        pairs.extend_from_slice(&1u32.to_le_bytes());
        pairs.extend_from_slice(&5u32.to_le_bytes());
        pairs.extend_from_slice(&0u32.to_le_bytes());
        data.extend(encode_record(tag::PARA_CHAR_SHAPE, 1, &pairs));
        let stream = RecordStream::new(data);

        let scan = scan_section(&stream).unwrap();
        let section = section_from_scan(&scan, &DocInfoScan::default()).unwrap();
        let para = &section.paragraphs[0];
        assert_eq!(para.runs.len(), 2);
        assert_eq!(para.runs[0].text, "Hello");
        assert_eq!(para.runs[0].char_shape_ref, 1);
        assert_eq!(para.runs[1].text, " World");
        assert_eq!(para.runs[1].char_shape_ref, 0);
    }

    #[test]
    fn nested_table_cells_are_not_top_level() {
        // Host paragraph with a table control: ctrl header, descriptor,
        // one cell with one nested paragraph.
        let mut data = Vec::new();
        data.extend(encode_record(tag::PARA_HEADER, 0, &para_header_payload(1, 1)));
        data.extend(encode_record(tag::PARA_TEXT, 1, &string_to_utf16le("x")));

        let mut ctrl = Vec::new();
        ctrl.extend_from_slice(&ctrl_id::TABLE.to_le_bytes());
        ctrl.extend_from_slice(&[0u8; 8]);
        data.extend(encode_record(tag::CTRL_HEADER, 1, &ctrl));

        let mut descriptor = vec![0u8; 28];
        descriptor[4..6].copy_from_slice(&1u16.to_le_bytes());
        descriptor[6..8].copy_from_slice(&1u16.to_le_bytes());
        data.extend(encode_record(tag::TABLE, 2, &descriptor));

        let mut list = vec![0u8; 34];
        list[0..2].copy_from_slice(&1u16.to_le_bytes()); // one paragraph
        list[12..14].copy_from_slice(&1u16.to_le_bytes()); // col span
        list[14..16].copy_from_slice(&1u16.to_le_bytes()); // row span
        data.extend(encode_record(tag::LIST_HEADER, 2, &list));

        data.extend(encode_record(tag::PARA_HEADER, 3, &para_header_payload(4, 1)));
        data.extend(encode_record(tag::PARA_TEXT, 4, &string_to_utf16le("cell")));

        let stream = RecordStream::new(data);
        let scan = scan_section(&stream).unwrap();

        assert_eq!(scan.paragraphs.len(), 1, "nested paragraph leaked to top level");
        assert_eq!(scan.tables.len(), 1);
        assert_eq!(scan.tables[0].cells.len(), 1);
        assert_eq!(
            scan.tables[0].cells[0].paragraphs[0].plain_text().unwrap(),
            "cell"
        );

        let section = section_from_scan(&scan, &DocInfoScan::default()).unwrap();
        assert_eq!(section.tables.len(), 1);
        assert_eq!(section.tables[0].cell(0, 0).unwrap().plain_text(), "cell");
        assert_eq!(
            section.paragraphs[0].anchors,
            vec![Anchor {
                kind: AnchorKind::Table,
                index: 0
            }]
        );
    }
}
