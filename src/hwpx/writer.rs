//! HWPX package emission and the part-level editor. A mutation re-emits
//! only the affected part (`Contents/section<k>.xml`, or a spliced
//! `Contents/header.xml` for table extensions); every other part is
//! carried back byte-identical.

use crate::error::{HwpError, Result};
use crate::hwpx::reader::{
    bin_items_from_head, decode_package, extract_sec_pr, header_tables_from_xml, section_from_xml,
};
use crate::hwpx::xml_types::{parse_head, parse_section};
use crate::model::{
    Anchor, AnchorKind, CharFormat, CharStyle, Document, HeaderTables, ImageFormat, Paragraph,
    ParaStyle, Run, Section, Style, StyleKind, Table,
};
use crate::reader::ZipPackage;
use crate::refs::{CellRef, DocRef, RefTarget};
use crate::writer::{InsertPosition, StyleSelector};
use log::debug;
use std::path::Path;

pub const MIMETYPE: &[u8] = b"application/hwp+zip";
pub const DEFAULT_FONT: &str = "맑은 고딕";

// Namespace bindings of the 2011 HWPML package format.
const HWPX_NAMESPACES: &str = concat!(
    r#"xmlns:ha="http://www.hancom.co.kr/hwpml/2011/app" "#,
    r#"xmlns:hp="http://www.hancom.co.kr/hwpml/2011/paragraph" "#,
    r#"xmlns:hp10="http://www.hancom.co.kr/hwpml/2016/paragraph" "#,
    r#"xmlns:hs="http://www.hancom.co.kr/hwpml/2011/section" "#,
    r#"xmlns:hc="http://www.hancom.co.kr/hwpml/2011/core" "#,
    r#"xmlns:hh="http://www.hancom.co.kr/hwpml/2011/head" "#,
    r#"xmlns:hhs="http://www.hancom.co.kr/hwpml/2011/history" "#,
    r#"xmlns:hm="http://www.hancom.co.kr/hwpml/2011/master-page" "#,
    r#"xmlns:hpf="http://www.hancom.co.kr/schema/2011/hpf" "#,
    r#"xmlns:hv="http://www.hancom.co.kr/hwpml/2011/version" "#,
    r#"xmlns:dc="http://purl.org/dc/elements/1.1/" "#,
    r#"xmlns:opf="http://www.idpf.org/2007/opf/" "#,
    r#"xmlns:manifest="urn:oasis:names:tc:opendocument:xmlns:manifest:1.0" "#,
    r#"xmlns:config="urn:oasis:names:tc:opendocument:xmlns:config:1.0""#
);

fn escape_xml(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

pub(crate) fn generate_version_xml() -> String {
    concat!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes" ?>"#,
        r#"<hv:HCFVersion xmlns:hv="http://www.hancom.co.kr/hwpml/2011/version" "#,
        r#"tagetApplication="WORDPROCESSOR" major="5" minor="1" micro="1" "#,
        r#"buildNumber="0" os="1" xmlVersion="1.5" application="Hancom Office Hangul" "#,
        r#"appVersion="12, 0, 0, 0"/>"#
    )
    .to_string()
}

pub(crate) fn generate_settings_xml() -> String {
    concat!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes" ?>"#,
        r#"<ha:HWPApplicationSetting xmlns:ha="http://www.hancom.co.kr/hwpml/2011/app" "#,
        r#"xmlns:config="urn:oasis:names:tc:opendocument:xmlns:config:1.0">"#,
        r#"<ha:CaretPosition listIDRef="0" paraIDRef="0" pos="0"/>"#,
        r#"</ha:HWPApplicationSetting>"#
    )
    .to_string()
}

pub(crate) fn generate_container_xml() -> String {
    concat!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes" ?>"#,
        r#"<ocf:container xmlns:ocf="urn:oasis:names:tc:opendocument:xmlns:container" "#,
        r#"xmlns:hpf="http://www.hancom.co.kr/schema/2011/hpf">"#,
        r#"<ocf:rootfiles>"#,
        r#"<ocf:rootfile full-path="Contents/content.hpf" media-type="application/hwpml-package+xml"/>"#,
        r#"<ocf:rootfile full-path="Preview/PrvText.txt" media-type="text/plain"/>"#,
        r#"</ocf:rootfiles></ocf:container>"#
    )
    .to_string()
}

pub(crate) fn generate_manifest_xml() -> String {
    concat!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes" ?>"#,
        r#"<manifest:manifest xmlns:manifest="urn:oasis:names:tc:opendocument:xmlns:manifest:1.0"/>"#
    )
    .to_string()
}

pub(crate) fn generate_content_hpf(section_count: usize) -> String {
    let mut items = String::new();
    let mut spine = String::new();
    for idx in 0..section_count {
        items.push_str(&format!(
            r#"<opf:item id="section{0}" href="Contents/section{0}.xml" media-type="application/xml"/>"#,
            idx
        ));
        spine.push_str(&format!(
            r#"<opf:itemref idref="section{}" linear="yes"/>"#,
            idx
        ));
    }

    format!(
        concat!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes" ?>"#,
            r#"<opf:package {} version="" unique-identifier="" id="">"#,
            r#"<opf:metadata><opf:title></opf:title><opf:language>ko</opf:language></opf:metadata>"#,
            r#"<opf:manifest>"#,
            r#"<opf:item id="header" href="Contents/header.xml" media-type="application/xml"/>"#,
            "{}",
            r#"<opf:item id="settings" href="settings.xml" media-type="application/xml"/>"#,
            r#"</opf:manifest>"#,
            r#"<opf:spine>"#,
            r#"<opf:itemref idref="header" linear="yes"/>"#,
            "{}",
            r#"</opf:spine></opf:package>"#
        ),
        HWPX_NAMESPACES, items, spine
    )
}

fn format_char_pr(style: &CharStyle) -> String {
    let mut attrs = String::new();
    if style.bold {
        attrs.push_str(r#" bold="true""#);
    }
    if style.italic {
        attrs.push_str(r#" italic="true""#);
    }
    if style.underline {
        attrs.push_str(r#" underline="BOTTOM""#);
    }
    format!(
        r#"<hh:charPr id="{}" height="{}" textColor="{}" fontRef="{}"{}/>"#,
        style.id,
        style.size_pt * 100,
        style.color & 0xFFFFFF,
        style.font_ref,
        attrs
    )
}

fn format_para_pr(style: &ParaStyle) -> String {
    let heading = match style.heading_level {
        Some(level) => format!(r#"<hh:heading type="OUTLINE" idRef="0" level="{}"/>"#, level),
        None => r#"<hh:heading type="NONE" idRef="0" level="0"/>"#.to_string(),
    };
    format!(
        r#"<hh:paraPr id="{}" align="{}">{}</hh:paraPr>"#,
        style.id,
        style.align.as_token(),
        heading
    )
}

fn format_style(style: &Style) -> String {
    let kind = match style.kind {
        StyleKind::Para => "PARA",
        StyleKind::Char => "CHAR",
    };
    format!(
        r#"<hh:style id="{}" type="{}" name="{}" engName="{}" paraPrIDRef="{}" charPrIDRef="{}" nextStyleIDRef="{}" langID="1042" lockForm="0"/>"#,
        style.id,
        kind,
        escape_xml(&style.name),
        escape_xml(&style.english_name),
        style.para_shape_ref,
        style.char_shape_ref,
        style.id
    )
}

fn format_bin_data_item(id: &str, src: &str, format: Option<ImageFormat>) -> String {
    let fmt = format.map(|f| f.extension().to_uppercase()).unwrap_or_default();
    format!(
        r#"<hh:binDataItem id="{}" src="{}" format="{}" isEmbeded="1"/>"#,
        escape_xml(id),
        escape_xml(src),
        fmt
    )
}

const BORDER_FILLS_TEMPLATE: &str = concat!(
    r#"<hh:borderFills itemCnt="2">"#,
    r#"<hh:borderFill id="1" threeD="0" shadow="0" centerLine="NONE" breakCellSeparateLine="0">"#,
    r#"<hh:slash type="NONE" Crooked="0" isCounter="0"/><hh:backSlash type="NONE" Crooked="0" isCounter="0"/>"#,
    "<hh:leftBorder type=\"NONE\" width=\"0.1 mm\" color=\"#000000\"/><hh:rightBorder type=\"NONE\" width=\"0.1 mm\" color=\"#000000\"/>",
    "<hh:topBorder type=\"NONE\" width=\"0.1 mm\" color=\"#000000\"/><hh:bottomBorder type=\"NONE\" width=\"0.1 mm\" color=\"#000000\"/>",
    "<hh:diagonal type=\"SOLID\" width=\"0.1 mm\" color=\"#000000\"/></hh:borderFill>",
    r#"<hh:borderFill id="2" threeD="0" shadow="0" centerLine="NONE" breakCellSeparateLine="0">"#,
    r#"<hh:slash type="NONE" Crooked="0" isCounter="0"/><hh:backSlash type="NONE" Crooked="0" isCounter="0"/>"#,
    "<hh:leftBorder type=\"SOLID\" width=\"0.12 mm\" color=\"#000000\"/><hh:rightBorder type=\"SOLID\" width=\"0.12 mm\" color=\"#000000\"/>",
    "<hh:topBorder type=\"SOLID\" width=\"0.12 mm\" color=\"#000000\"/><hh:bottomBorder type=\"SOLID\" width=\"0.12 mm\" color=\"#000000\"/>",
    "<hh:diagonal type=\"SOLID\" width=\"0.1 mm\" color=\"#000000\"/>",
    "<hc:fillBrush><hc:winBrush faceColor=\"none\" hatchColor=\"#999999\" alpha=\"0\"/></hc:fillBrush></hh:borderFill>",
    r#"</hh:borderFills>"#
);

/// Emit a complete `Contents/header.xml`. refList children keep the
/// required order: fontfaces, charProperties, paraProperties, styles.
pub fn emit_header_xml(
    header: &HeaderTables,
    bin_items: &[(String, String, Option<ImageFormat>)],
    section_count: usize,
) -> String {
    let mut xml = String::new();
    xml.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes" ?>"#);
    xml.push_str("<hh:head ");
    xml.push_str(HWPX_NAMESPACES);
    xml.push_str(&format!(r#" version="1.5" secCnt="{}">"#, section_count.max(1)));
    xml.push_str(
        r#"<hh:beginNum page="1" footnote="1" endnote="1" pic="1" tbl="1" equation="1"/>"#,
    );
    xml.push_str("<hh:refList>");

    xml.push_str(&format!(
        r#"<hh:fontfaces itemCnt="{}">"#,
        header.fonts.len().max(1)
    ));
    xml.push_str(r#"<hh:fontface lang="HANGUL" fontCnt=""#);
    xml.push_str(&header.fonts.len().max(1).to_string());
    xml.push_str(r#"">"#);
    if header.fonts.is_empty() {
        xml.push_str(&format!(
            r#"<hh:font id="0" face="{}" type="TTF" isEmbedded="0"/>"#,
            DEFAULT_FONT
        ));
    } else {
        for font in &header.fonts {
            xml.push_str(&format!(
                r#"<hh:font id="{}" face="{}" type="TTF" isEmbedded="0"/>"#,
                font.id,
                escape_xml(&font.name)
            ));
        }
    }
    xml.push_str("</hh:fontface></hh:fontfaces>");

    xml.push_str(BORDER_FILLS_TEMPLATE);

    xml.push_str(&format!(
        r#"<hh:charProperties itemCnt="{}">"#,
        header.char_shapes.len()
    ));
    for style in &header.char_shapes {
        xml.push_str(&format_char_pr(style));
    }
    xml.push_str("</hh:charProperties>");

    xml.push_str(&format!(
        r#"<hh:paraProperties itemCnt="{}">"#,
        header.para_shapes.len()
    ));
    for style in &header.para_shapes {
        xml.push_str(&format_para_pr(style));
    }
    xml.push_str("</hh:paraProperties>");

    xml.push_str(&format!(r#"<hh:styles itemCnt="{}">"#, header.styles.len()));
    for style in &header.styles {
        xml.push_str(&format_style(style));
    }
    xml.push_str("</hh:styles>");

    if !bin_items.is_empty() {
        xml.push_str(&format!(
            r#"<hh:binDataItems itemCnt="{}">"#,
            bin_items.len()
        ));
        for (id, src, format) in bin_items {
            xml.push_str(&format_bin_data_item(id, src, *format));
        }
        xml.push_str("</hh:binDataItems>");
    }

    xml.push_str("</hh:refList></hh:head>");
    xml
}

/// Default section properties for sections this crate fabricates,
/// carrying the same page geometry the binary builder writes into
/// PAGE_DEF.
pub fn default_sec_pr() -> String {
    use crate::writer::builder::layout;
    format!(
        concat!(
            r#"<hp:secPr id="" textDirection="HORIZONTAL" spaceColumns="{gap}" tabStop="{tab}" tabStopVal="4000" tabStopUnit="HWPUNIT" outlineShapeIDRef="1" memoShapeIDRef="0" textVerticalWidthHead="0" masterPageCnt="0">"#,
            r#"<hp:grid lineGrid="0" charGrid="0" wonggojiFormat="0"/>"#,
            r#"<hp:startNum pageStartsOn="BOTH" page="0" pic="0" tbl="0" equation="0"/>"#,
            r#"<hp:visibility hideFirstHeader="0" hideFirstFooter="0" hideFirstMasterPage="0" border="SHOW_ALL" fill="SHOW_ALL" hideFirstPageNum="0" hideFirstEmptyLine="0" showLineNumber="0"/>"#,
            r#"<hp:pagePr landscape="WIDELY" width="{width}" height="{height}" gutterType="LEFT_ONLY">"#,
            r#"<hp:margin header="{bottom}" footer="{bottom}" gutter="0" left="{side}" right="{side}" top="{top}" bottom="{bottom}"/></hp:pagePr>"#,
            r#"</hp:secPr>"#
        ),
        gap = layout::COLUMN_GAP,
        tab = layout::DEFAULT_TAB_STOP,
        width = layout::page_width(),
        height = layout::page_height(),
        side = layout::margin_side(),
        top = layout::margin_top(),
        bottom = layout::margin_bottom(),
    )
}

fn emit_table(
    table: &Table,
    section: &Section,
    bin_items: &[(String, String, Option<ImageFormat>)],
) -> String {
    let mut xml = format!(
        r#"<hp:tbl id="" zOrder="0" numberingType="TABLE" textWrap="TOP_AND_BOTTOM" repeatHeader="1" rowCnt="{}" colCnt="{}" cellSpacing="0" borderFillIDRef="2" noAdjust="0">"#,
        table.row_count(),
        table.col_count()
    );
    for (row_idx, row) in table.rows.iter().enumerate() {
        xml.push_str("<hp:tr>");
        for (col_idx, cell) in row.cells.iter().enumerate() {
            xml.push_str(r#"<hp:tc name="" header="0" hasMargin="0" protect="0" editable="0" dirty="0" borderFillIDRef="2">"#);
            xml.push_str(&format!(
                r#"<hp:cellAddr colAddr="{}" rowAddr="{}"/>"#,
                col_idx, row_idx
            ));
            xml.push_str(&format!(
                r#"<hp:cellSpan colSpan="{}" rowSpan="{}"/>"#,
                cell.col_span.max(1),
                cell.row_span.max(1)
            ));
            xml.push_str(r#"<hp:subList id="" textDirection="HORIZONTAL" lineWrap="BREAK" vertAlign="CENTER" linkListIDRef="0" linkListNextIDRef="0" textWidth="0" textHeight="0" hasTextRef="0" hasNumRef="0">"#);
            for (idx, para) in cell.paragraphs.iter().enumerate() {
                emit_paragraph(&mut xml, para, section, idx, None, bin_items);
            }
            xml.push_str("</hp:subList></hp:tc>");
        }
        xml.push_str("</hp:tr>");
    }
    xml.push_str("</hp:tbl>");
    xml
}

fn emit_anchor(
    xml: &mut String,
    anchor: &Anchor,
    section: &Section,
    bin_items: &[(String, String, Option<ImageFormat>)],
) {
    match anchor.kind {
        AnchorKind::Table => {
            if let Some(table) = section.tables.get(anchor.index) {
                xml.push_str(r#"<hp:run charPrIDRef="0">"#);
                xml.push_str(&emit_table(table, section, bin_items));
                xml.push_str("</hp:run>");
            }
        }
        AnchorKind::Image => {
            if let Some(image) = section.images.get(anchor.index) {
                let item_id = bin_items
                    .iter()
                    .find(|(_, src, _)| *src == image.bin_data_path)
                    .map(|(id, _, _)| id.clone())
                    .unwrap_or_else(|| image.bin_data_path.clone());
                xml.push_str(r#"<hp:run charPrIDRef="0"><hp:pic reverse="0">"#);
                xml.push_str(&format!(
                    r#"<hp:imgRect cx="{}" cy="{}"/>"#,
                    image.width, image.height
                ));
                xml.push_str(&format!(
                    r#"<hc:img binaryItemIDRef="{}"/>"#,
                    escape_xml(&item_id)
                ));
                xml.push_str("</hp:pic></hp:run>");
            }
        }
        AnchorKind::TextBox => {
            if let Some(text_box) = section.text_boxes.get(anchor.index) {
                xml.push_str(r#"<hp:run charPrIDRef="0"><hp:rect ratio="0"><hp:drawText lock="0">"#);
                xml.push_str(r#"<hp:subList id="" textDirection="HORIZONTAL" lineWrap="BREAK" vertAlign="CENTER">"#);
                for (idx, para) in text_box.paragraphs.iter().enumerate() {
                    emit_paragraph(xml, para, section, idx, None, bin_items);
                }
                xml.push_str("</hp:subList></hp:drawText></hp:rect></hp:run>");
            }
        }
    }
}

fn emit_paragraph(
    xml: &mut String,
    para: &Paragraph,
    section: &Section,
    id: usize,
    sec_pr: Option<&str>,
    bin_items: &[(String, String, Option<ImageFormat>)],
) {
    xml.push_str(&format!(
        r#"<hp:p id="{}" paraPrIDRef="{}" styleIDRef="{}" pageBreak="0" columnBreak="0" merged="0">"#,
        id, para.para_shape_ref, para.style_ref
    ));

    if let Some(sec_pr) = sec_pr {
        xml.push_str(r#"<hp:run charPrIDRef="0">"#);
        xml.push_str(sec_pr);
        xml.push_str("</hp:run>");
        xml.push_str(r#"<hp:ctrl><hp:colPr id="" type="NEWSPAPER" layout="LEFT" colCount="1" sameSz="1" sameGap="0"/></hp:ctrl>"#);
    }

    for anchor in &para.anchors {
        emit_anchor(xml, anchor, section, bin_items);
    }

    if para.runs.is_empty() {
        xml.push_str(r#"<hp:run charPrIDRef="0"><hp:t/></hp:run>"#);
    } else {
        for run in &para.runs {
            if run.text.is_empty() {
                xml.push_str(&format!(
                    r#"<hp:run charPrIDRef="{}"><hp:t/></hp:run>"#,
                    run.char_shape_ref
                ));
            } else {
                xml.push_str(&format!(
                    r#"<hp:run charPrIDRef="{}"><hp:t>{}</hp:t></hp:run>"#,
                    run.char_shape_ref,
                    escape_xml(&run.text)
                ));
            }
        }
    }
    xml.push_str("</hp:p>");
}

/// Emit a complete section part. The original `<hp:secPr>` block, when
/// provided, rides in the first paragraph's first run.
pub fn emit_section_xml(
    section: &Section,
    sec_pr: Option<&str>,
    bin_items: &[(String, String, Option<ImageFormat>)],
) -> String {
    let default_pr;
    let sec_pr = match sec_pr {
        Some(pr) => pr,
        None => {
            default_pr = default_sec_pr();
            &default_pr
        }
    };

    let mut xml = format!(
        concat!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes" ?>"#,
            r#"<hs:sec {}>"#
        ),
        HWPX_NAMESPACES
    );

    if section.paragraphs.is_empty() {
        let empty = Paragraph::from_text("", 0);
        emit_paragraph(&mut xml, &empty, section, 0, Some(sec_pr), bin_items);
    } else {
        for (idx, para) in section.paragraphs.iter().enumerate() {
            let pr = if idx == 0 { Some(sec_pr) } else { None };
            emit_paragraph(&mut xml, para, section, idx, pr, bin_items);
        }
    }

    xml.push_str("</hs:sec>");
    xml
}

/// Create a blank single-section package with the provisioned header
/// (one font, base char shape, Normal plus the seven outline styles).
pub fn create_blank() -> Result<ZipPackage> {
    let mut header = HeaderTables::default();
    header.provision_defaults(DEFAULT_FONT);

    let section = Section {
        paragraphs: vec![Paragraph::from_text("", 0)],
        ..Default::default()
    };

    let mut package = ZipPackage::new();
    package.put_part("mimetype", MIMETYPE.to_vec());
    package.put_part("version.xml", generate_version_xml().into_bytes());
    package.put_part(
        "Contents/header.xml",
        emit_header_xml(&header, &[], 1).into_bytes(),
    );
    package.put_part(
        "Contents/section0.xml",
        emit_section_xml(&section, None, &[]).into_bytes(),
    );
    package.put_part(
        "Contents/content.hpf",
        generate_content_hpf(1).into_bytes(),
    );
    package.put_part("settings.xml", generate_settings_xml().into_bytes());
    package.put_part(
        "META-INF/container.xml",
        generate_container_xml().into_bytes(),
    );
    package.put_part(
        "META-INF/manifest.xml",
        generate_manifest_xml().into_bytes(),
    );
    package.put_part("Preview/PrvText.txt", Vec::new());
    Ok(package)
}

/// Insert `item` before the closing tag of a refList block, bumping the
/// block's `itemCnt`. When the block is absent entirely, a fresh one is
/// spliced in before `</hh:refList>`.
fn splice_header_item(
    xml: &str,
    open_prefix: &str,
    close_tag: &str,
    block_name: &str,
    item: &str,
) -> Result<String> {
    if let Some(close_at) = xml.find(close_tag) {
        let mut out = String::with_capacity(xml.len() + item.len());
        out.push_str(&xml[..close_at]);
        out.push_str(item);
        out.push_str(&xml[close_at..]);

        // Bump itemCnt inside the opening tag.
        if let Some(open_at) = out.find(open_prefix) {
            let tag_end = out[open_at..].find('>').map(|e| open_at + e);
            if let Some(tag_end) = tag_end {
                let tag = out[open_at..tag_end].to_string();
                if let Some(cnt_at) = tag.find("itemCnt=\"") {
                    let val_start = cnt_at + "itemCnt=\"".len();
                    if let Some(val_len) = tag[val_start..].find('"') {
                        let old: u32 = tag[val_start..val_start + val_len]
                            .parse()
                            .unwrap_or(0);
                        let new_tag = format!(
                            "{}itemCnt=\"{}\"{}",
                            &tag[..cnt_at],
                            old + 1,
                            &tag[val_start + val_len + 1..]
                        );
                        out.replace_range(open_at..tag_end, &new_tag);
                    }
                }
            }
        }
        return Ok(out);
    }

    let ref_list_close = xml.find("</hh:refList>").ok_or_else(|| {
        HwpError::Corrupt("header.xml has no refList element".to_string())
    })?;
    let block = format!(
        r#"<{} itemCnt="1">{}{}"#,
        block_name, item, close_tag
    );
    let mut out = String::with_capacity(xml.len() + block.len());
    out.push_str(&xml[..ref_list_close]);
    out.push_str(&block);
    out.push_str(&xml[ref_list_close..]);
    Ok(out)
}

/// Part-level HWPX editor (C10): mirrors the HWP mutator's operations,
/// rewriting only the section part a mutation touches and splicing header
/// table extensions in place.
pub struct HwpxEditor {
    package: ZipPackage,
}

impl HwpxEditor {
    pub fn new(package: ZipPackage) -> Self {
        Self { package }
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::new(ZipPackage::from_file(path)?))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(Self::new(ZipPackage::from_bytes(bytes)?))
    }

    pub fn package(&self) -> &ZipPackage {
        &self.package
    }

    pub fn into_package(self) -> ZipPackage {
        self.package
    }

    pub fn decode(&self) -> Result<Document> {
        decode_package(&self.package)
    }

    fn header_xml(&self) -> Result<String> {
        let bytes = self
            .package
            .part("Contents/header.xml")
            .ok_or_else(|| HwpError::Corrupt("Missing Contents/header.xml".to_string()))?;
        String::from_utf8(bytes.to_vec())
            .map_err(|_| HwpError::Encoding("header.xml is not valid UTF-8".to_string()))
    }

    fn header_tables(&self) -> Result<HeaderTables> {
        let xml = self.header_xml()?;
        let head = parse_head(&xml)
            .map_err(|e| HwpError::Corrupt(format!("Failed to parse header.xml: {}", e)))?;
        Ok(header_tables_from_xml(&head))
    }

    fn bin_items(&self) -> Result<Vec<(String, String, Option<ImageFormat>)>> {
        let xml = self.header_xml()?;
        let head = parse_head(&xml)
            .map_err(|e| HwpError::Corrupt(format!("Failed to parse header.xml: {}", e)))?;
        Ok(bin_items_from_head(&head))
    }

    fn load_section(&self, index: usize) -> Result<(Section, Option<String>)> {
        let name = format!("Contents/section{}.xml", index);
        let bytes = self.package.part(&name).ok_or_else(|| {
            HwpError::bad_ref(
                format!("s{}", index),
                format!(
                    "section {} does not exist (package has sections 0..{})",
                    index,
                    self.package.section_count()
                ),
            )
        })?;
        let xml = String::from_utf8(bytes.to_vec())
            .map_err(|_| HwpError::Encoding(format!("{} is not valid UTF-8", name)))?;
        let parsed = parse_section(&xml)
            .map_err(|e| HwpError::Corrupt(format!("Failed to parse {}: {}", name, e)))?;
        let bin_items = self.bin_items()?;
        Ok((section_from_xml(&parsed, &bin_items), extract_sec_pr(&xml)))
    }

    fn store_section(
        &mut self,
        index: usize,
        section: &Section,
        sec_pr: Option<&str>,
    ) -> Result<()> {
        let bin_items = self.bin_items()?;
        let xml = emit_section_xml(section, sec_pr, &bin_items);
        self.package
            .put_part(&format!("Contents/section{}.xml", index), xml.into_bytes());
        Ok(())
    }

    /// Replace a paragraph's text, collapsing it to one run that keeps the
    /// first run's character shape.
    pub fn set_text(&mut self, target: &DocRef, text: &str) -> Result<()> {
        // Inline control characters are dropped, as on the binary side;
        // they are not representable in XML text anyway.
        let clean: String = text.chars().filter(|c| *c as u32 >= 0x20).collect();
        let (mut section, sec_pr) = self.load_section(target.section)?;
        {
            let para = locate_paragraph_mut(&mut section, target)?;
            let char_ref = para.runs.first().map(|r| r.char_shape_ref).unwrap_or(0);
            para.runs = vec![Run {
                text: clean,
                char_shape_ref: char_ref,
            }];
        }
        self.store_section(target.section, &section, sec_pr.as_deref())?;
        debug!("hwpx set_text {}", target);
        Ok(())
    }

    /// Apply character-format deltas over `[start, end)` UTF-16 offsets of
    /// the paragraph text, extending the charProperties table in place
    /// when no existing entry matches.
    pub fn apply_format(
        &mut self,
        target: &DocRef,
        range: Option<(usize, usize)>,
        format: &CharFormat,
    ) -> Result<()> {
        let mut header = self.header_tables()?;
        let (mut section, sec_pr) = self.load_section(target.section)?;

        let (runs, text_units) = {
            let para = locate_paragraph_mut(&mut section, target)?;
            let units: usize = para.runs.iter().map(|r| r.text.encode_utf16().count()).sum();
            (para.runs.clone(), units)
        };

        let (start, end) = match range {
            Some((s, e)) => {
                if s >= text_units {
                    return Err(HwpError::bad_ref(
                        target.to_string(),
                        format!(
                            "range start {} is past the end of the text (0..{})",
                            s, text_units
                        ),
                    ));
                }
                (s, e.min(text_units))
            }
            None => (0, text_units),
        };

        // Character style covering the range start.
        let mut cursor = 0usize;
        let mut base_ref = runs.first().map(|r| r.char_shape_ref).unwrap_or(0);
        for run in &runs {
            let len = run.text.encode_utf16().count();
            if start < cursor + len || len == 0 && start == cursor {
                base_ref = run.char_shape_ref;
                break;
            }
            cursor += len;
        }

        let base = header
            .char_shapes
            .get(base_ref as usize)
            .cloned()
            .unwrap_or_else(|| CharStyle::new_default(0));
        let wanted = base.apply(format);

        let existing = header
            .char_shapes
            .iter()
            .find(|c| c.same_shape(&wanted))
            .map(|c| c.id);
        let target_id = match existing {
            Some(id) => id,
            None => {
                let id = header.find_or_add_char_style(wanted.clone());
                // Extend the header part in place rather than re-emitting
                // it, so foreign blocks survive untouched.
                let mut wanted = wanted;
                wanted.id = id;
                let xml = self.header_xml()?;
                let spliced = splice_header_item(
                    &xml,
                    "<hh:charProperties",
                    "</hh:charProperties>",
                    "hh:charProperties",
                    &format_char_pr(&wanted),
                )?;
                self.package
                    .put_part("Contents/header.xml", spliced.into_bytes());
                id
            }
        };

        // Re-slice the runs at the range boundaries.
        let mut new_runs: Vec<Run> = Vec::new();
        let mut offset = 0usize;
        for run in &runs {
            let units: Vec<u16> = run.text.encode_utf16().collect();
            let len = units.len();
            let run_start = offset;
            let run_end = offset + len;
            offset = run_end;

            let mut cuts = vec![run_start, run_end];
            for cut in [start, end] {
                if cut > run_start && cut < run_end {
                    cuts.push(cut);
                }
            }
            cuts.sort_unstable();
            cuts.dedup();

            for window in cuts.windows(2) {
                let (seg_start, seg_end) = (window[0], window[1]);
                let seg_units = &units[seg_start - run_start..seg_end - run_start];
                let seg_text = String::from_utf16(seg_units).map_err(|_| {
                    HwpError::Encoding("Range split an astral character in half".to_string())
                })?;
                let seg_ref = if seg_start >= start && seg_end <= end {
                    target_id
                } else {
                    run.char_shape_ref
                };
                match new_runs.last_mut() {
                    Some(last) if last.char_shape_ref == seg_ref => {
                        last.text.push_str(&seg_text)
                    }
                    _ => new_runs.push(Run {
                        text: seg_text,
                        char_shape_ref: seg_ref,
                    }),
                }
            }
        }
        if new_runs.is_empty() {
            new_runs.push(Run {
                text: String::new(),
                char_shape_ref: target_id,
            });
        }

        {
            let para = locate_paragraph_mut(&mut section, target)?;
            para.runs = new_runs;
        }
        self.store_section(target.section, &section, sec_pr.as_deref())?;
        debug!("hwpx apply_format {} [{}, {})", target, start, end);
        Ok(())
    }

    /// Insert a new top-level paragraph; `heading` and `style` resolve
    /// through the header tables, extending them only when nothing
    /// matches.
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

        let header = self.header_tables()?;
        let (style_ref, para_shape_ref, char_ref) = match (heading, style) {
            (Some(level), None) => {
                if !(1..=7).contains(&level) {
                    return Err(HwpError::Conflicting(format!(
                        "heading level must be 1..7, got {}",
                        level
                    )));
                }
                match header.heading_style(level) {
                    Some(st) => (st.id, st.para_shape_ref, st.char_shape_ref),
                    None => self.append_heading_style(&header, level)?,
                }
            }
            (None, Some(selector)) => {
                let found = match selector {
                    StyleSelector::Id(id) => header.styles.get(*id as usize),
                    StyleSelector::Name(name) => header.style_by_name(name),
                };
                match found {
                    Some(st) => (st.id, st.para_shape_ref, st.char_shape_ref),
                    None => {
                        let label = match selector {
                            StyleSelector::Id(id) => id.to_string(),
                            StyleSelector::Name(name) => name.clone(),
                        };
                        return Err(HwpError::bad_ref(
                            label,
                            format!(
                                "no such style (document has styles 0..{})",
                                header.styles.len()
                            ),
                        ));
                    }
                }
            }
            (None, None) => header
                .styles
                .first()
                .map(|st| (st.id, st.para_shape_ref, st.char_shape_ref))
                .unwrap_or((0, 0, 0)),
            (Some(_), Some(_)) => unreachable!(),
        };

        let section_idx = position.section();
        let (mut section, sec_pr) = self.load_section(section_idx)?;

        let mut para = Paragraph::from_text(text, char_ref);
        para.style_ref = style_ref;
        para.para_shape_ref = para_shape_ref;

        let at = paragraph_insert_index(&section, position)?;
        section.paragraphs.insert(at, para);
        self.store_section(section_idx, &section, sec_pr.as_deref())?;
        debug!("hwpx add_paragraph at s{} index {}", section_idx, at);
        Ok(())
    }

    /// Append a heading paraPr and its outline style to header.xml.
    fn append_heading_style(
        &mut self,
        header: &HeaderTables,
        level: u8,
    ) -> Result<(u16, u16, u16)> {
        let para_shape_id = header.para_shapes.len() as u16;
        let style_id = header.styles.len() as u16;

        let xml = self.header_xml()?;
        let shape = ParaStyle {
            id: para_shape_id,
            align: crate::model::Alignment::Left,
            heading_level: Some(level),
        };
        let spliced = splice_header_item(
            &xml,
            "<hh:paraProperties",
            "</hh:paraProperties>",
            "hh:paraProperties",
            &format_para_pr(&shape),
        )?;
        let style = Style {
            id: style_id,
            name: format!("개요 {}", level),
            english_name: format!("Outline {}", level),
            char_shape_ref: 0,
            para_shape_ref: para_shape_id,
            kind: StyleKind::Para,
        };
        let spliced = splice_header_item(
            &spliced,
            "<hh:styles",
            "</hh:styles>",
            "hh:styles",
            &format_style(&style),
        )?;
        self.package
            .put_part("Contents/header.xml", spliced.into_bytes());
        Ok((style_id, para_shape_id, 0))
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
        let section_idx = position.section();
        let (mut section, sec_pr) = self.load_section(section_idx)?;

        let table_idx = section.tables.len();
        section.tables.push(Table::with_size(rows, cols, data));

        let mut host = Paragraph::from_text("", 0);
        host.anchors.push(Anchor {
            kind: AnchorKind::Table,
            index: table_idx,
        });

        let at = paragraph_insert_index(&section, position)?;
        section.paragraphs.insert(at, host);
        self.store_section(section_idx, &section, sec_pr.as_deref())?;
        debug!("hwpx add_table {}x{} at s{}", rows, cols, section_idx);
        Ok(())
    }

    /// Binary attachment parts under `BinData/`.
    pub fn list_images(&self) -> Vec<String> {
        self.package
            .part_names()
            .filter(|n| n.starts_with("BinData/"))
            .map(|n| n.to_string())
            .collect()
    }

    pub fn image_data(&self, path: &str) -> Result<Vec<u8>> {
        self.package
            .part(path)
            .map(|b| b.to_vec())
            .ok_or_else(|| HwpError::Corrupt(format!("No attachment at '{}'", path)))
    }

    /// Store image bytes as a new `BinData/` part and declare it in the
    /// header's binDataItems; returns the part path.
    pub fn insert_image(&mut self, data: &[u8]) -> Result<String> {
        let format = ImageFormat::from_bytes(data).ok_or_else(|| {
            HwpError::Unsupported(
                "Unrecognized image format; png, jpg and gif are supported".to_string(),
            )
        })?;
        let n = self.list_images().len() + 1;
        let path = format!("BinData/image{}.{}", n, format.extension());
        let item_id = format!("IMG{}", n);

        self.package.put_part(&path, data.to_vec());

        let xml = self.header_xml()?;
        let spliced = splice_header_item(
            &xml,
            "<hh:binDataItems",
            "</hh:binDataItems>",
            "hh:binDataItems",
            &format_bin_data_item(&item_id, &path, Some(format)),
        )?;
        self.package
            .put_part("Contents/header.xml", spliced.into_bytes());
        debug!("hwpx insert_image -> {}", path);
        Ok(path)
    }

    pub fn replace_image(&mut self, path: &str, data: &[u8]) -> Result<()> {
        if !self.package.has_part(path) {
            return Err(HwpError::Corrupt(format!("No attachment at '{}'", path)));
        }
        self.package.put_part(path, data.to_vec());
        Ok(())
    }

    pub fn to_bytes(&mut self) -> Result<Vec<u8>> {
        self.refresh_preview();
        self.package.to_bytes()
    }

    pub fn save<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let bytes = self.to_bytes()?;
        crate::write_file_atomic(path.as_ref(), &bytes)
    }

    fn refresh_preview(&mut self) {
        if !self.package.has_part("Preview/PrvText.txt") {
            return;
        }
        if let Ok(document) = self.decode() {
            let text = document.plain_text();
            let preview: String = text.chars().take(1000).collect();
            self.package.put_part(
                "Preview/PrvText.txt",
                preview.trim_end_matches('\n').as_bytes().to_vec(),
            );
        }
    }
}

/// Insert index for a new top-level paragraph.
fn paragraph_insert_index(section: &Section, position: &InsertPosition) -> Result<usize> {
    match position {
        InsertPosition::End(_) => Ok(section.paragraphs.len()),
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
            if index >= section.paragraphs.len() {
                return Err(HwpError::bad_ref(
                    r.to_string(),
                    format!(
                        "paragraph {} does not exist (section has paragraphs 0..{})",
                        index,
                        section.paragraphs.len()
                    ),
                ));
            }
            Ok(match position {
                InsertPosition::Before(_) => index,
                _ => index + 1,
            })
        }
    }
}

/// Resolve a reference to the model paragraph it addresses.
fn locate_paragraph_mut<'a>(
    section: &'a mut Section,
    target: &DocRef,
) -> Result<&'a mut Paragraph> {
    let reference = target.to_string();
    match &target.target {
        RefTarget::Paragraph { index, .. } => {
            let len = section.paragraphs.len();
            section.paragraphs.get_mut(*index).ok_or_else(|| {
                HwpError::bad_ref(
                    &reference,
                    format!(
                        "paragraph {} does not exist (section has paragraphs 0..{})",
                        index, len
                    ),
                )
            })
        }
        RefTarget::Table { index, cell } => {
            let table_count = section.tables.len();
            let table = section.tables.get_mut(*index).ok_or_else(|| {
                HwpError::bad_ref(
                    &reference,
                    format!(
                        "table {} does not exist (section has tables 0..{})",
                        index, table_count
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
            let row_count = table.rows.len();
            let table_row = table.rows.get_mut(row).ok_or_else(|| {
                HwpError::bad_ref(
                    &reference,
                    format!("row {} does not exist (table has rows 0..{})", row, row_count),
                )
            })?;
            let cell_count = table_row.cells.len();
            let table_cell = table_row.cells.get_mut(col).ok_or_else(|| {
                HwpError::bad_ref(
                    &reference,
                    format!("cell {} does not exist (row has cells 0..{})", col, cell_count),
                )
            })?;
            let para_idx = paragraph.unwrap_or(0);
            let para_count = table_cell.paragraphs.len();
            table_cell.paragraphs.get_mut(para_idx).ok_or_else(|| {
                HwpError::bad_ref(
                    &reference,
                    format!(
                        "paragraph {} does not exist (cell has paragraphs 0..{})",
                        para_idx, para_count
                    ),
                )
            })
        }
        RefTarget::TextBox { index, paragraph } => {
            let tb_count = section.text_boxes.len();
            let text_box = section.text_boxes.get_mut(*index).ok_or_else(|| {
                HwpError::bad_ref(
                    &reference,
                    format!(
                        "text box {} does not exist (section has text boxes 0..{})",
                        index, tb_count
                    ),
                )
            })?;
            let para_idx = paragraph.unwrap_or(0);
            let para_count = text_box.paragraphs.len();
            text_box.paragraphs.get_mut(para_idx).ok_or_else(|| {
                HwpError::bad_ref(
                    &reference,
                    format!(
                        "paragraph {} does not exist (text box has paragraphs 0..{})",
                        para_idx, para_count
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_package_decodes() {
        let package = create_blank().unwrap();
        let document = decode_package(&package).unwrap();
        assert_eq!(document.sections.len(), 1);
        assert_eq!(document.sections[0].paragraphs.len(), 1);
        assert_eq!(document.header.styles.len(), 8);
        assert_eq!(document.header.styles[0].english_name, "Normal");
        assert!(!document.header.fonts.is_empty());
    }

    #[test]
    fn splice_bumps_item_cnt() {
        let xml = r#"<hh:head><hh:refList><hh:charProperties itemCnt="1"><hh:charPr id="0" height="1000"/></hh:charProperties></hh:refList></hh:head>"#;
        let out = splice_header_item(
            xml,
            "<hh:charProperties",
            "</hh:charProperties>",
            "hh:charProperties",
            r#"<hh:charPr id="1" height="1200"/>"#,
        )
        .unwrap();
        assert!(out.contains(r#"itemCnt="2""#));
        assert!(out.contains(r#"<hh:charPr id="1""#));
        let pos0 = out.find(r#"id="0""#).unwrap();
        let pos1 = out.find(r#"id="1""#).unwrap();
        assert!(pos0 < pos1);
    }

    #[test]
    fn splice_creates_missing_block() {
        let xml = r#"<hh:head><hh:refList><hh:styles itemCnt="1"/></hh:refList></hh:head>"#;
        let out = splice_header_item(
            xml,
            "<hh:binDataItems",
            "</hh:binDataItems>",
            "hh:binDataItems",
            r#"<hh:binDataItem id="IMG1" src="BinData/image1.png" format="PNG" isEmbeded="1"/>"#,
        )
        .unwrap();
        assert!(out.contains("<hh:binDataItems itemCnt=\"1\">"));
        assert!(out.contains("</hh:binDataItems></hh:refList>"));
    }

    #[test]
    fn escape_handles_special_chars() {
        assert_eq!(escape_xml("<a & 'b'>"), "&lt;a &amp; &apos;b&apos;&gt;");
        assert_eq!(escape_xml("\"quote\""), "&quot;quote&quot;");
    }
}
