use crate::error::{HwpError, Result};
use crate::hwpx::xml_types::{
    self, Head, SubList, XmlParagraph, XmlSection, XmlTable,
};
use crate::model::{
    Alignment, Anchor, AnchorKind, CharStyle, DocFormat, Document, Font, HeaderTables, Image,
    ImageFormat, Paragraph, ParaStyle, Run, Section, Style, StyleKind, Table, TableCell, TableRow,
    TextBox,
};
use crate::reader::ZipPackage;
use log::debug;

fn part_to_string(package: &ZipPackage, name: &str) -> Result<String> {
    let bytes = package
        .part(name)
        .ok_or_else(|| HwpError::Corrupt(format!("Missing part '{}'", name)))?;
    String::from_utf8(bytes.to_vec())
        .map_err(|_| HwpError::Encoding(format!("Part '{}' is not valid UTF-8", name)))
}

/// Colors appear as decimal 24-bit integers; `#RRGGBB` and `none` are
/// accepted for compatibility with other writers.
pub fn parse_color(value: &str) -> Option<u32> {
    let value = value.trim();
    if let Some(hex) = value.strip_prefix('#') {
        return u32::from_str_radix(hex, 16).ok().map(|c| c & 0xFFFFFF);
    }
    if value.eq_ignore_ascii_case("none") {
        return Some(0x000000);
    }
    value.parse::<u32>().ok().map(|c| c & 0xFFFFFF)
}

/// Model header tables from a parsed `header.xml`.
pub fn header_tables_from_xml(head: &Head) -> HeaderTables {
    let mut header = HeaderTables::default();
    let Some(ref_list) = &head.ref_list else {
        return header;
    };

    if let Some(fontfaces) = &ref_list.fontfaces {
        for fontface in &fontfaces.items {
            for font in &fontface.fonts {
                let id = font.id as u16;
                if header.fonts.iter().all(|f| f.id != id) {
                    header.fonts.push(Font {
                        id,
                        name: font.face.clone(),
                    });
                }
            }
        }
        header.fonts.sort_by_key(|f| f.id);
    }

    if let Some(char_properties) = &ref_list.char_properties {
        for char_pr in &char_properties.items {
            header.char_shapes.push(CharStyle {
                id: char_pr.id as u16,
                font_ref: char_pr.font_ref.unwrap_or(0) as u16,
                size_pt: char_pr.height.unwrap_or(1000) / 100,
                bold: char_pr.bold.unwrap_or(false),
                italic: char_pr.italic.unwrap_or(false),
                underline: char_pr
                    .underline
                    .as_deref()
                    .map(|u| !u.eq_ignore_ascii_case("NONE"))
                    .unwrap_or(false),
                color: char_pr
                    .text_color
                    .as_deref()
                    .and_then(parse_color)
                    .unwrap_or(0),
            });
        }
    }

    if let Some(para_properties) = &ref_list.para_properties {
        for para_pr in &para_properties.items {
            let align_token = para_pr
                .align
                .as_deref()
                .or_else(|| {
                    para_pr
                        .align_element
                        .as_ref()
                        .and_then(|a| a.horizontal.as_deref())
                })
                .unwrap_or("LEFT");
            let heading_level = para_pr.heading.as_ref().and_then(|h| {
                let outline = h
                    .kind
                    .as_deref()
                    .map(|k| k.eq_ignore_ascii_case("OUTLINE"))
                    .unwrap_or(false);
                if outline {
                    h.level.filter(|l| (1..=7).contains(l))
                } else {
                    None
                }
            });
            header.para_shapes.push(ParaStyle {
                id: para_pr.id as u16,
                align: Alignment::from_token(align_token).unwrap_or(Alignment::Left),
                heading_level,
            });
        }
    }

    if let Some(styles) = &ref_list.styles {
        for style in &styles.items {
            header.styles.push(Style {
                id: style.id as u16,
                name: style.name.clone().unwrap_or_default(),
                english_name: style.eng_name.clone().unwrap_or_default(),
                char_shape_ref: style.char_pr_id_ref.unwrap_or(0) as u16,
                para_shape_ref: style.para_pr_id_ref.unwrap_or(0) as u16,
                kind: match style.kind.as_deref() {
                    Some(kind) if kind.eq_ignore_ascii_case("CHAR") => StyleKind::Char,
                    _ => StyleKind::Para,
                },
            });
        }
    }

    header
}

/// Preserve the original `<hp:secPr>` block of a section part verbatim so
/// a re-emit does not lose page geometry this crate does not model.
pub fn extract_sec_pr(xml: &str) -> Option<String> {
    let start = xml.find("<hp:secPr")?;
    if let Some(end) = xml[start..].find("</hp:secPr>") {
        return Some(xml[start..start + end + "</hp:secPr>".len()].to_string());
    }
    // Self-closing form.
    let close = xml[start..].find("/>")?;
    Some(xml[start..start + close + 2].to_string())
}

fn paragraph_from_xml(
    xml_para: &XmlParagraph,
    section: &mut Section,
    bin_items: &[(String, String, Option<ImageFormat>)],
) -> Paragraph {
    let mut para = Paragraph {
        runs: Vec::new(),
        para_shape_ref: xml_para.para_pr_id_ref.unwrap_or(0) as u16,
        style_ref: xml_para.style_id_ref.unwrap_or(0) as u16,
        anchors: Vec::new(),
    };

    for run in &xml_para.runs {
        let char_ref = run.char_pr_id_ref.unwrap_or(0) as u16;

        if let Some(table) = &run.table {
            let index = section.tables.len();
            let model_table = table_from_xml(table, section, bin_items);
            section.tables.push(model_table);
            para.anchors.push(Anchor {
                kind: AnchorKind::Table,
                index,
            });
        }
        if let Some(rect) = &run.rect {
            let paragraphs = rect
                .draw_text
                .as_ref()
                .and_then(|d| d.sub_list.as_ref())
                .map(|s| sublist_paragraphs(s, section, bin_items))
                .unwrap_or_default();
            let index = section.text_boxes.len();
            section.text_boxes.push(TextBox { paragraphs });
            para.anchors.push(Anchor {
                kind: AnchorKind::TextBox,
                index,
            });
        }
        if let Some(picture) = &run.picture {
            let item_ref = picture
                .img
                .as_ref()
                .and_then(|i| i.binary_item_id_ref.as_deref());
            if let Some((_, src, format)) = item_ref
                .and_then(|id| bin_items.iter().find(|(item_id, _, _)| item_id == id))
            {
                let index = section.images.len();
                section.images.push(Image {
                    bin_data_path: src.clone(),
                    width: picture.img_rect.as_ref().and_then(|r| r.cx).unwrap_or(0),
                    height: picture.img_rect.as_ref().and_then(|r| r.cy).unwrap_or(0),
                    format: format.unwrap_or(ImageFormat::Png),
                });
                para.anchors.push(Anchor {
                    kind: AnchorKind::Image,
                    index,
                });
            }
        }
        if let Some(text) = &run.text {
            para.runs.push(Run {
                text: text.clone(),
                char_shape_ref: char_ref,
            });
        }
    }

    if para.runs.is_empty() {
        para.runs.push(Run {
            text: String::new(),
            char_shape_ref: 0,
        });
    }
    para
}

fn sublist_paragraphs(
    sub_list: &SubList,
    section: &mut Section,
    bin_items: &[(String, String, Option<ImageFormat>)],
) -> Vec<Paragraph> {
    sub_list
        .paragraphs
        .iter()
        .map(|p| paragraph_from_xml(p, section, bin_items))
        .collect()
}

fn table_from_xml(
    xml_table: &XmlTable,
    section: &mut Section,
    bin_items: &[(String, String, Option<ImageFormat>)],
) -> Table {
    let mut table = Table::default();
    for xml_row in &xml_table.rows {
        let mut row = TableRow::default();
        for xml_cell in &xml_row.cells {
            let paragraphs = xml_cell
                .sub_list
                .as_ref()
                .map(|s| sublist_paragraphs(s, section, bin_items))
                .unwrap_or_else(|| vec![Paragraph::from_text("", 0)]);
            row.cells.push(TableCell {
                paragraphs,
                col_span: xml_cell
                    .cell_span
                    .as_ref()
                    .and_then(|s| s.col_span)
                    .unwrap_or(1) as u16,
                row_span: xml_cell
                    .cell_span
                    .as_ref()
                    .and_then(|s| s.row_span)
                    .unwrap_or(1) as u16,
            });
        }
        table.rows.push(row);
    }
    table
}

/// Bin-data items declared by the header: `(id, src, format)`.
pub fn bin_items_from_head(head: &Head) -> Vec<(String, String, Option<ImageFormat>)> {
    head.ref_list
        .as_ref()
        .and_then(|r| r.bin_data_items.as_ref())
        .map(|items| {
            items
                .items
                .iter()
                .filter_map(|item| {
                    let id = item.id.clone()?;
                    let src = item.src.clone()?;
                    let format = item
                        .format
                        .as_deref()
                        .and_then(ImageFormat::from_extension);
                    Some((id, src, format))
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Decode one section part into the model.
pub fn section_from_xml(
    xml_section: &XmlSection,
    bin_items: &[(String, String, Option<ImageFormat>)],
) -> Section {
    let mut section = Section::default();
    let mut paragraphs = Vec::with_capacity(xml_section.paragraphs.len());
    for xml_para in &xml_section.paragraphs {
        let para = paragraph_from_xml(xml_para, &mut section, bin_items);
        paragraphs.push(para);
    }
    section.paragraphs = paragraphs;
    section
}

/// Decode a whole HWPX package into the unified model.
pub fn decode_package(package: &ZipPackage) -> Result<Document> {
    if let Some(mime) = package.part("mimetype") {
        if mime != b"application/hwp+zip" {
            return Err(HwpError::Format(
                "mimetype is not application/hwp+zip".to_string(),
            ));
        }
    }

    let header_xml = part_to_string(package, "Contents/header.xml")?;
    let head = xml_types::parse_head(&header_xml)
        .map_err(|e| HwpError::Corrupt(format!("Failed to parse header.xml: {}", e)))?;

    let mut document = Document::new(DocFormat::Hwpx);
    document.header = header_tables_from_xml(&head);
    let bin_items = bin_items_from_head(&head);

    let section_count = package.section_count();
    if section_count == 0 {
        return Err(HwpError::Corrupt(
            "No section parts found in package".to_string(),
        ));
    }
    for idx in 0..section_count {
        let name = format!("Contents/section{}.xml", idx);
        let xml = part_to_string(package, &name)?;
        let xml_section = xml_types::parse_section(&xml)
            .map_err(|e| HwpError::Corrupt(format!("Failed to parse {}: {}", name, e)))?;
        document
            .sections
            .push(section_from_xml(&xml_section, &bin_items));
    }

    debug!(
        "decoded HWPX package: {} sections, {} styles",
        document.sections.len(),
        document.header.styles.len()
    );
    Ok(document)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sec_pr_extraction() {
        let xml = r#"<hs:sec><hp:p><hp:run><hp:secPr id="" textDirection="HORIZONTAL"><hp:pagePr width="1"/></hp:secPr></hp:run></hp:p></hs:sec>"#;
        let block = extract_sec_pr(xml).unwrap();
        assert!(block.starts_with("<hp:secPr"));
        assert!(block.ends_with("</hp:secPr>"));
        assert!(block.contains("pagePr"));
    }

    #[test]
    fn color_forms() {
        assert_eq!(parse_color("0"), Some(0));
        assert_eq!(parse_color("16711680"), Some(0xFF0000));
        assert_eq!(parse_color("#00FF00"), Some(0x00FF00));
        assert_eq!(parse_color("none"), Some(0));
        assert_eq!(parse_color("bogus"), None);
    }
}
