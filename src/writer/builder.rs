//! Record scaffolding for documents and paragraphs this crate fabricates
//! itself: the blank-document stream set and the building blocks the
//! mutator inserts into existing streams.

use crate::error::Result;
use crate::model::Alignment;
use crate::parser::doc_info::{
    CharShapeRecord, FaceName, ParaShapeRecord, StyleRecord,
};
use crate::parser::file_header::FileHeader;
use crate::parser::record::{ctrl_id, encode_record, tag};
use crate::reader::StreamWriter;
use crate::utils::compression::compress_stream;
use crate::utils::encoding::{string_to_utf16le, CH_PARA_BREAK};
use crate::writer::HwpFile;

pub const DEFAULT_FONT: &str = "맑은 고딕";
const LANG_ID_KOREAN: u16 = 0x0412;

/// Page geometry and note-layout defaults, shared with the XML side's
/// section template: A4 portrait, 30 mm side margins, 20 mm top, 15 mm
/// bottom and header/footer bands.
pub mod layout {
    use crate::utils::mm_to_hwpunit;

    pub const PAGE_WIDTH_MM: f64 = 210.0;
    pub const PAGE_HEIGHT_MM: f64 = 297.0;
    pub const MARGIN_SIDE_MM: f64 = 30.0;
    pub const MARGIN_TOP_MM: f64 = 20.0;
    pub const MARGIN_BOTTOM_MM: f64 = 15.0;

    /// Gap between columns (4 mm).
    pub const COLUMN_GAP: u16 = 1134;
    pub const DEFAULT_TAB_STOP: u16 = 8000;
    /// Note divider spacing: above the divider, below it, between notes.
    pub const NOTE_GAP_ABOVE: u16 = 850;
    pub const NOTE_GAP_BELOW: u16 = 567;
    pub const NOTE_GAP_BETWEEN: u16 = 283;
    /// Page border inset (5 mm).
    pub const PAGE_BORDER_OFFSET: u16 = 1417;
    /// Footnote divider sentinel: one fifth of the column width.
    pub const FOOTNOTE_DIVIDER: u32 = u32::MAX;
    /// Endnote divider sentinel: the full text width.
    pub const ENDNOTE_DIVIDER: u32 = 14_692_344;

    pub fn page_width() -> u32 {
        mm_to_hwpunit(PAGE_WIDTH_MM)
    }

    pub fn page_height() -> u32 {
        mm_to_hwpunit(PAGE_HEIGHT_MM)
    }

    pub fn margin_side() -> u32 {
        mm_to_hwpunit(MARGIN_SIDE_MM)
    }

    pub fn margin_top() -> u32 {
        mm_to_hwpunit(MARGIN_TOP_MM)
    }

    pub fn margin_bottom() -> u32 {
        mm_to_hwpunit(MARGIN_BOTTOM_MM)
    }

    /// Width of the text area between the side margins.
    pub fn text_width() -> u32 {
        page_width() - 2 * margin_side()
    }
}

/// PARA_HEADER payload: character count (with the reserved high bit),
/// control mask, shape/style ids, child-record counts, instance id and the
/// 5.0.3.2+ track-merge field.
pub fn para_header_payload(
    n_chars_raw: u32,
    control_mask: u32,
    para_shape_id: u16,
    style_id: u8,
    char_shape_count: u16,
) -> Vec<u8> {
    let mut w = StreamWriter::new();
    w.write_u32(n_chars_raw);
    w.write_u32(control_mask);
    w.write_u16(para_shape_id);
    w.write_u8(style_id);
    w.write_u8(0); // divide sort
    w.write_u16(char_shape_count);
    w.write_u16(0); // range tag count
    w.write_u16(1); // line align count
    w.write_u32(0); // instance id
    w.write_u16(0); // merged-by-track
    w.into_bytes()
}

/// One PARA_CHAR_SHAPE pair.
pub fn shape_pair(position: u32, char_shape_id: u16) -> Vec<u8> {
    let mut w = StreamWriter::new();
    w.write_u32(position);
    w.write_u32(char_shape_id as u32);
    w.into_bytes()
}

/// PARA_LINE_SEG for one default-height line spanning the text area.
/// Viewers recompute layout, but the record must be present and
/// well-formed.
pub fn line_seg_payload() -> Vec<u8> {
    let mut w = StreamWriter::new();
    w.write_u32(0); // text start position
    w.write_u32(0); // vertical position
    w.write_u32(1000); // line height
    w.write_u32(1000); // text height
    w.write_u32(850); // baseline gap
    w.write_u32(600); // line spacing
    w.write_u32(0); // start margin
    w.write_u32(layout::text_width()); // segment width
    w.write_u32(0x0006_0000); // line tag: first and last line of its area
    w.into_bytes()
}

/// Extended-control anchor in wire text: the control character, the
/// control id in two units, four reserved units, and the control
/// character repeated.
pub fn anchor_units(control_char: u16, id: u32) -> Vec<u16> {
    let bytes = id.to_le_bytes();
    vec![
        control_char,
        u16::from_le_bytes([bytes[0], bytes[1]]),
        u16::from_le_bytes([bytes[2], bytes[3]]),
        0,
        0,
        0,
        0,
        control_char,
    ]
}

/// Encode the standard record triple (header, text, char shape, line seg)
/// of a plain paragraph at `level`. The fabricated text keeps the trailing
/// paragraph mark.
pub fn paragraph_records(
    text: &str,
    level: u16,
    para_shape_id: u16,
    style_id: u8,
    char_shape_id: u16,
    last_in_list: bool,
) -> Vec<u8> {
    let mut wire: Vec<u16> = text.encode_utf16().collect();
    wire.push(CH_PARA_BREAK);
    let mut n_chars = wire.len() as u32;
    if last_in_list {
        n_chars |= 0x8000_0000;
    }

    let mut out = Vec::new();
    out.extend(encode_record(
        tag::PARA_HEADER,
        level,
        &para_header_payload(n_chars, 0, para_shape_id, style_id, 1),
    ));
    out.extend(encode_record(
        tag::PARA_TEXT,
        level + 1,
        &crate::utils::encoding::units_to_bytes(&wire),
    ));
    out.extend(encode_record(
        tag::PARA_CHAR_SHAPE,
        level + 1,
        &shape_pair(0, char_shape_id),
    ));
    out.extend(encode_record(
        tag::PARA_LINE_SEG,
        level + 1,
        &line_seg_payload(),
    ));
    out
}

/// LIST_HEADER payload for a table cell: list fields, then the cell
/// address, span, size, inner margins and border fill.
pub fn cell_list_header_payload(
    para_count: u16,
    col: u16,
    row: u16,
    col_span: u16,
    row_span: u16,
    width: u32,
    height: u32,
) -> Vec<u8> {
    let mut w = StreamWriter::new();
    w.write_u16(para_count);
    w.write_u16(0); // flags
    w.write_u32(0); // list properties
    w.write_u16(col);
    w.write_u16(row);
    w.write_u16(col_span);
    w.write_u16(row_span);
    w.write_u32(width);
    w.write_u32(height);
    for _ in 0..4 {
        w.write_u16(141); // inner margins
    }
    w.write_u16(0); // border fill id
    w.into_bytes()
}

/// TABLE descriptor: properties, geometry, cell spacing and outer margins.
pub fn table_descriptor_payload(rows: u16, cols: u16) -> Vec<u8> {
    let mut w = StreamWriter::new();
    w.write_u32(0x3004); // properties: fixed width, cell lines
    w.write_u16(rows);
    w.write_u16(cols);
    w.write_u16(0); // cell spacing
    w.write_i32(141); // left margin
    w.write_i32(141); // right margin
    w.write_i32(141); // top margin
    w.write_i32(141); // bottom margin
    w.into_bytes()
}

/// CTRL_HEADER payload for an inline object control.
pub fn ctrl_header_payload(id: u32) -> Vec<u8> {
    let mut w = StreamWriter::new();
    w.write_u32(id);
    w.write_u32(0); // properties
    w.write_u32(0); // vertical offset
    w.write_u32(0); // horizontal offset
    w.write_u32(0); // instance id
    w.into_bytes()
}

/// Records of a complete inline table: host-paragraph anchor text plus the
/// control subtree, one cell list per table cell, each holding one
/// paragraph.
pub fn table_records(
    rows: usize,
    cols: usize,
    data: Option<&[Vec<String>]>,
    para_shape_id: u16,
) -> Vec<u8> {
    let mut wire = anchor_units(crate::utils::encoding::CH_OBJECT_ANCHOR, ctrl_id::TABLE);
    wire.push(CH_PARA_BREAK);

    let mut out = Vec::new();
    out.extend(encode_record(
        tag::PARA_HEADER,
        0,
        &para_header_payload(wire.len() as u32, 0x04, para_shape_id, 0, 1),
    ));
    out.extend(encode_record(
        tag::PARA_TEXT,
        1,
        &crate::utils::encoding::units_to_bytes(&wire),
    ));
    out.extend(encode_record(tag::PARA_CHAR_SHAPE, 1, &shape_pair(0, 0)));
    out.extend(encode_record(tag::PARA_LINE_SEG, 1, &line_seg_payload()));

    out.extend(encode_record(
        tag::CTRL_HEADER,
        1,
        &ctrl_header_payload(ctrl_id::TABLE),
    ));
    out.extend(encode_record(
        tag::TABLE,
        2,
        &table_descriptor_payload(rows as u16, cols as u16),
    ));

    let cell_width = 41954 / cols.max(1) as u32;
    for r in 0..rows {
        for c in 0..cols {
            out.extend(encode_record(
                tag::LIST_HEADER,
                2,
                &cell_list_header_payload(1, c as u16, r as u16, 1, 1, cell_width, 1000),
            ));
            let text = data
                .and_then(|d| d.get(r))
                .and_then(|d| d.get(c))
                .map(|s| s.as_str())
                .unwrap_or("");
            out.extend(paragraph_records(text, 3, 0, 0, 0, true));
        }
    }
    out
}

/// PAGE_DEF for the default page: dimensions, margins, header/footer
/// bands, gutter and orientation flags.
fn page_def_payload() -> Vec<u8> {
    let mut w = StreamWriter::new();
    w.write_u32(layout::page_width());
    w.write_u32(layout::page_height());
    w.write_u32(layout::margin_side()); // left
    w.write_u32(layout::margin_side()); // right
    w.write_u32(layout::margin_top());
    w.write_u32(layout::margin_bottom());
    w.write_u32(layout::margin_bottom()); // header band
    w.write_u32(layout::margin_bottom()); // footer band
    w.write_u32(0); // gutter
    w.write_u32(0); // properties: portrait, single-sided
    w.into_bytes()
}

/// FOOTNOTE_SHAPE: numbering (arabic, `)` suffix, from 1) and divider
/// geometry. The same record shape carries the endnote variant with a
/// different divider length and note gap.
fn note_shape_payload(divider_length: u32, gap_between: u16) -> Vec<u8> {
    let mut w = StreamWriter::new();
    w.write_u32(0); // numbering properties
    w.write_u16(0); // user symbol
    w.write_u16(0); // prefix
    w.write_u16(')' as u16); // suffix
    w.write_u16(1); // start number
    w.write_u32(divider_length);
    w.write_u16(layout::NOTE_GAP_ABOVE);
    w.write_u16(layout::NOTE_GAP_BELOW);
    w.write_u16(gap_between);
    w.write_u8(1); // divider line type: solid
    w.write_u8(1); // divider thickness
    w.write_u32(0); // divider color
    w.into_bytes()
}

/// PAGE_BORDER_FILL: border anchored to the paper edge, inset on all
/// four sides, filled from entry 1 of the border-fill table.
fn page_border_fill_payload() -> Vec<u8> {
    let mut w = StreamWriter::new();
    w.write_u32(1); // position criterion: paper
    for _ in 0..4 {
        w.write_u16(layout::PAGE_BORDER_OFFSET);
    }
    w.write_u16(1); // border fill id
    w.into_bytes()
}

/// CTRL_HEADER('secd'): section properties - column gap, grids, the
/// default tab stop and the starting page number.
fn section_ctrl_payload() -> Vec<u8> {
    let mut w = StreamWriter::new();
    w.write_u32(ctrl_id::SECTION_DEF);
    w.write_u32(0); // properties
    w.write_u16(layout::COLUMN_GAP);
    w.write_u16(0); // vertical line grid
    w.write_u16(0); // horizontal line grid
    w.write_u16(layout::DEFAULT_TAB_STOP);
    w.write_u16(0); // numbering shape id
    w.write_u16(1); // starting page number
    w.write_zeros(18); // image fill and border options
    w.into_bytes()
}

/// CTRL_HEADER('cold'): newspaper layout, one column, equal widths.
fn column_ctrl_payload() -> Vec<u8> {
    let mut w = StreamWriter::new();
    w.write_u32(ctrl_id::COLUMN_DEF);
    w.write_u16(0x1004); // kind and count: newspaper, 1 column, same size
    w.write_u16(0); // column gap
    w.write_zeros(8); // divider line
    w.into_bytes()
}

/// The section-definition paragraph every body stream opens with: one
/// paragraph whose text anchors the `secd` and `cold` controls, followed
/// by the control subtrees carrying the page geometry.
pub fn section_definition_records() -> Vec<u8> {
    let mut wire = anchor_units(
        crate::utils::encoding::CH_SECTION_COLUMN_DEF,
        ctrl_id::SECTION_DEF,
    );
    wire.extend(anchor_units(
        crate::utils::encoding::CH_SECTION_COLUMN_DEF,
        ctrl_id::COLUMN_DEF,
    ));
    wire.push(CH_PARA_BREAK);

    let mut out = Vec::new();
    out.extend(encode_record(
        tag::PARA_HEADER,
        0,
        &para_header_payload(wire.len() as u32, 0x04, 0, 0, 1),
    ));
    out.extend(encode_record(
        tag::PARA_TEXT,
        1,
        &crate::utils::encoding::units_to_bytes(&wire),
    ));
    out.extend(encode_record(tag::PARA_CHAR_SHAPE, 1, &shape_pair(0, 0)));
    out.extend(encode_record(tag::PARA_LINE_SEG, 1, &line_seg_payload()));

    out.extend(encode_record(tag::CTRL_HEADER, 1, &section_ctrl_payload()));
    out.extend(encode_record(tag::PAGE_DEF, 2, &page_def_payload()));
    out.extend(encode_record(
        tag::FOOTNOTE_SHAPE,
        2,
        &note_shape_payload(layout::FOOTNOTE_DIVIDER, layout::NOTE_GAP_BETWEEN),
    ));
    out.extend(encode_record(
        tag::FOOTNOTE_SHAPE,
        2,
        &note_shape_payload(layout::ENDNOTE_DIVIDER, 0),
    ));
    for _ in 0..3 {
        out.extend(encode_record(
            tag::PAGE_BORDER_FILL,
            2,
            &page_border_fill_payload(),
        ));
    }
    out.extend(encode_record(tag::CTRL_HEADER, 1, &column_ctrl_payload()));

    out
}

fn document_properties_payload(section_count: u16) -> Vec<u8> {
    let mut w = StreamWriter::new();
    w.write_u16(section_count.max(1));
    for _ in 0..5 {
        w.write_u16(1); // page/footnote/endnote/picture/table start numbers
    }
    w.write_u16(0); // equation start number
    w.write_u32(0); // list id
    w.write_u32(0); // bullet id
    w.write_u32(0); // caret position
    w.into_bytes()
}

fn id_mappings_payload(
    bin_data: u32,
    fonts: u32,
    char_shapes: u32,
    para_shapes: u32,
    styles: u32,
) -> Vec<u8> {
    let mut w = StreamWriter::new();
    w.write_u32(bin_data);
    w.write_u32(fonts); // Korean
    for _ in 0..6 {
        w.write_u32(0); // other language categories
    }
    w.write_u32(1); // border fill
    w.write_u32(char_shapes);
    w.write_u32(1); // tab def
    w.write_u32(0); // numbering
    w.write_u32(0); // bullet
    w.write_u32(para_shapes);
    w.write_u32(styles);
    w.write_u32(0); // memo shape
    w.write_u32(0); // track change author
    w.write_u32(0); // track change
    w.into_bytes()
}

fn border_fill_payload() -> Vec<u8> {
    let mut w = StreamWriter::new();
    w.write_u16(0); // properties
    for _ in 0..5 {
        w.write_u8(0); // line type
        w.write_u8(0); // thickness
        w.write_u32(0); // color
    }
    w.write_u8(0); // fill type: none
    w.write_u32(0xFFFFFF); // back color
    w.write_u32(0); // pattern color
    w.write_u8(0); // pattern type
    w.into_bytes()
}

fn tab_def_payload() -> Vec<u8> {
    let mut w = StreamWriter::new();
    w.write_u32(0); // properties
    w.write_u32(0); // tab count
    w.into_bytes()
}

/// DocInfo stream of a fresh document: properties, id mappings and the
/// default table set including the Normal style and the seven outline
/// heading styles.
pub fn blank_doc_info(section_count: u16) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend(encode_record(
        tag::DOCUMENT_PROPERTIES,
        0,
        &document_properties_payload(section_count),
    ));
    out.extend(encode_record(
        tag::ID_MAPPINGS,
        0,
        &id_mappings_payload(0, 1, 1, 8, 8),
    ));

    let face = FaceName {
        properties: 0,
        name: DEFAULT_FONT.to_string(),
    };
    out.extend(encode_record(tag::FACE_NAME, 1, &face.to_payload()));
    out.extend(encode_record(tag::BORDER_FILL, 1, &border_fill_payload()));
    out.extend(encode_record(
        tag::CHAR_SHAPE,
        1,
        &CharShapeRecord::new_default().raw,
    ));
    out.extend(encode_record(tag::TAB_DEF, 1, &tab_def_payload()));

    let mut base_shape = ParaShapeRecord::new_default();
    base_shape.set_alignment(Alignment::Justify);
    out.extend(encode_record(tag::PARA_SHAPE, 1, &base_shape.raw));
    for level in 1..=7u8 {
        out.extend(encode_record(
            tag::PARA_SHAPE,
            1,
            &ParaShapeRecord::new_heading(level).raw,
        ));
    }

    let normal = StyleRecord {
        name: "바탕글".to_string(),
        english_name: "Normal".to_string(),
        properties: 0,
        next_style_id: 0,
        lang_id: LANG_ID_KOREAN,
        para_shape_id: 0,
        char_shape_id: 0,
    };
    out.extend(encode_record(tag::STYLE, 1, &normal.to_payload()));
    for level in 1..=7u8 {
        let style = StyleRecord {
            name: format!("개요 {}", level),
            english_name: format!("Outline {}", level),
            properties: 0,
            next_style_id: level,
            lang_id: LANG_ID_KOREAN,
            para_shape_id: level as u16,
            char_shape_id: 0,
        };
        out.extend(encode_record(tag::STYLE, 1, &style.to_payload()));
    }

    out.extend(encode_record(tag::COMPATIBLE_DOCUMENT, 0, &[0u8; 4]));
    out.extend(encode_record(tag::LAYOUT_COMPATIBILITY, 1, &[0u8; 20]));
    out
}

/// Body stream of a fresh section: the section-definition paragraph plus
/// the given content paragraphs (at least one, possibly empty).
pub fn blank_section(paragraphs: &[&str]) -> Vec<u8> {
    let mut out = section_definition_records();
    if paragraphs.is_empty() {
        out.extend(paragraph_records("", 0, 0, 0, 0, true));
    } else {
        for (i, text) in paragraphs.iter().enumerate() {
            let last = i == paragraphs.len() - 1;
            out.extend(paragraph_records(text, 0, 0, 0, 0, last));
        }
    }
    out
}

fn doc_options_payload() -> Vec<u8> {
    let mut w = StreamWriter::new();
    w.write_u32(1); // version
    w.write_u32(0); // view mode
    w.write_u32(100); // zoom
    w.write_u32(0); // view flags
    w.write_u32(1); // edit mode
    w.write_u32(0); // edit flags
    w.into_bytes()
}

fn jscript_version_payload() -> Vec<u8> {
    vec![0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00]
}

/// Default JScript stub Hanword expects in Scripts/DefaultJScript:
/// length-prefixed UTF-16LE source binding the document objects, closed by
/// an empty-section terminator.
fn default_jscript_payload() -> Vec<u8> {
    let source = "var Documents = XHwpDocuments;\r\nvar Document = Documents.Active_XHwpDocument;\r\n";
    let body = "function OnDocument_New()\r\n{\r\n\t//todo : \r\n}\r\n\r\n";

    let mut out = Vec::new();
    let source_units = source.encode_utf16().count() as u32;
    out.extend_from_slice(&source_units.to_le_bytes());
    out.extend(string_to_utf16le(source));
    // Section separator: '/' marker then the handler body.
    out.extend(string_to_utf16le("/"));
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend(string_to_utf16le(body));
    out.extend_from_slice(&[0x00, 0x00, 0x00, 0x00, 0x00, 0x00]);
    out.extend_from_slice(&[0xFF, 0xFF, 0xFF, 0xFF]);
    out
}

/// Build a complete blank HWP file with one section.
pub fn blank_document(paragraphs: &[&str]) -> Result<HwpFile> {
    let file_header = FileHeader::new_default();
    let doc_info = blank_doc_info(1);
    let section = blank_section(paragraphs);

    let preview: String = paragraphs.join("\n");

    let entries = vec![
        ("FileHeader".to_string(), file_header.to_bytes()),
        ("DocInfo".to_string(), compress_stream(&doc_info)?),
        ("BodyText/Section0".to_string(), compress_stream(&section)?),
        ("PrvText".to_string(), string_to_utf16le(&preview)),
        ("PrvImage".to_string(), Vec::new()),
        ("DocOptions/_LinkDoc".to_string(), doc_options_payload()),
        (
            "Scripts/JScriptVersion".to_string(),
            jscript_version_payload(),
        ),
        (
            "Scripts/DefaultJScript".to_string(),
            default_jscript_payload(),
        ),
    ];

    HwpFile::from_entries(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::body_text::scan_section;
    use crate::parser::doc_info::scan_doc_info;
    use crate::parser::record::RecordStream;

    #[test]
    fn blank_doc_info_counts_match_records() {
        let stream = RecordStream::new(blank_doc_info(1));
        let scan = scan_doc_info(&stream).unwrap();
        let (_, mappings) = scan.id_mappings.as_ref().unwrap();
        assert_eq!(mappings.font_count() as usize, scan.face_names.len());
        assert_eq!(mappings.char_shape_count() as usize, scan.char_shapes.len());
        assert_eq!(mappings.para_shape_count() as usize, scan.para_shapes.len());
        assert_eq!(mappings.style_count() as usize, scan.styles.len());
        assert_eq!(scan.styles.len(), 8);
        assert_eq!(scan.styles[0].1.english_name, "Normal");
        assert_eq!(scan.styles[2].1.name, "개요 2");
        assert_eq!(scan.para_shapes[3].1.heading_level(), Some(3));
    }

    #[test]
    fn blank_section_n_chars_law_holds() {
        let stream = RecordStream::new(blank_section(&["첫 문단", ""]));
        let scan = scan_section(&stream).unwrap();
        // Section-definition paragraph plus two content paragraphs.
        assert_eq!(scan.paragraphs.len(), 3);
        for para in &scan.paragraphs {
            let actual = para.wire_units.len() as u32;
            assert_eq!(para.n_chars(), actual);
        }
        assert_eq!(scan.paragraphs[0].plain_text().unwrap(), "");
        assert_eq!(scan.paragraphs[1].plain_text().unwrap(), "첫 문단");
    }

    #[test]
    fn table_records_scan_back() {
        let data = vec![
            vec!["a".to_string(), "b".to_string()],
            vec!["c".to_string(), "d".to_string()],
        ];
        let mut bytes = blank_section(&["host"]);
        bytes.extend(table_records(2, 2, Some(&data), 0));
        let stream = RecordStream::new(bytes);
        let scan = scan_section(&stream).unwrap();
        assert_eq!(scan.tables.len(), 1);
        let table = &scan.tables[0];
        assert_eq!(table.row_count, 2);
        assert_eq!(table.col_count, 2);
        assert_eq!(table.cells.len(), 4);
        assert_eq!(table.cells[3].paragraphs[0].plain_text().unwrap(), "d");
    }
}
