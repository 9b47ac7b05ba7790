//! serde parse types for the HWPX parts this crate reads. Element names
//! carry the canonical namespace prefixes (`hh`/`hp`/`hs`/`hc`/`hv`),
//! which the format fixes; attributes are unprefixed.

use quick_xml::de::from_str;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct HcfVersion {
    #[serde(rename = "@tagetApplication", default)]
    pub target_application: Option<String>,
    #[serde(rename = "@major", default)]
    pub major: Option<String>,
    #[serde(rename = "@minor", default)]
    pub minor: Option<String>,
    #[serde(rename = "@xmlVersion", default)]
    pub xml_version: Option<String>,
    #[serde(rename = "@application", default)]
    pub application: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Head {
    #[serde(rename = "hh:beginNum", default)]
    pub begin_num: Option<BeginNum>,
    #[serde(rename = "hh:refList", default)]
    pub ref_list: Option<RefList>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BeginNum {
    #[serde(rename = "@page", default)]
    pub page: Option<u32>,
    #[serde(rename = "@footnote", default)]
    pub footnote: Option<u32>,
    #[serde(rename = "@endnote", default)]
    pub endnote: Option<u32>,
    #[serde(rename = "@pic", default)]
    pub pic: Option<u32>,
    #[serde(rename = "@tbl", default)]
    pub tbl: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RefList {
    #[serde(rename = "hh:fontfaces", default)]
    pub fontfaces: Option<Fontfaces>,
    #[serde(rename = "hh:charProperties", default)]
    pub char_properties: Option<CharProperties>,
    #[serde(rename = "hh:paraProperties", default)]
    pub para_properties: Option<ParaProperties>,
    #[serde(rename = "hh:styles", default)]
    pub styles: Option<StylesXml>,
    #[serde(rename = "hh:binDataItems", default)]
    pub bin_data_items: Option<BinDataItems>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Fontfaces {
    #[serde(rename = "hh:fontface", default)]
    pub items: Vec<Fontface>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Fontface {
    #[serde(rename = "@lang", default)]
    pub lang: Option<String>,
    #[serde(rename = "hh:font", default)]
    pub fonts: Vec<FontXml>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FontXml {
    #[serde(rename = "@id")]
    pub id: u32,
    #[serde(rename = "@face")]
    pub face: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CharProperties {
    #[serde(rename = "@itemCnt", default)]
    pub item_cnt: Option<u32>,
    #[serde(rename = "hh:charPr", default)]
    pub items: Vec<CharPr>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CharPr {
    #[serde(rename = "@id")]
    pub id: u32,
    #[serde(rename = "@height", default)]
    pub height: Option<u32>,
    #[serde(rename = "@textColor", default)]
    pub text_color: Option<String>,
    #[serde(rename = "@bold", default)]
    pub bold: Option<bool>,
    #[serde(rename = "@italic", default)]
    pub italic: Option<bool>,
    #[serde(rename = "@underline", default)]
    pub underline: Option<String>,
    #[serde(rename = "@fontRef", default)]
    pub font_ref: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ParaProperties {
    #[serde(rename = "@itemCnt", default)]
    pub item_cnt: Option<u32>,
    #[serde(rename = "hh:paraPr", default)]
    pub items: Vec<ParaPr>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ParaPr {
    #[serde(rename = "@id")]
    pub id: u32,
    #[serde(rename = "@align", default)]
    pub align: Option<String>,
    #[serde(rename = "hh:heading", default)]
    pub heading: Option<HeadingXml>,
    #[serde(rename = "hh:align", default)]
    pub align_element: Option<AlignXml>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HeadingXml {
    #[serde(rename = "@type", default)]
    pub kind: Option<String>,
    #[serde(rename = "@level", default)]
    pub level: Option<u8>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AlignXml {
    #[serde(rename = "@horizontal", default)]
    pub horizontal: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StylesXml {
    #[serde(rename = "@itemCnt", default)]
    pub item_cnt: Option<u32>,
    #[serde(rename = "hh:style", default)]
    pub items: Vec<StyleXml>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StyleXml {
    #[serde(rename = "@id")]
    pub id: u32,
    #[serde(rename = "@type", default)]
    pub kind: Option<String>,
    #[serde(rename = "@name", default)]
    pub name: Option<String>,
    #[serde(rename = "@engName", default)]
    pub eng_name: Option<String>,
    #[serde(rename = "@paraPrIDRef", default)]
    pub para_pr_id_ref: Option<u32>,
    #[serde(rename = "@charPrIDRef", default)]
    pub char_pr_id_ref: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BinDataItems {
    #[serde(rename = "hh:binDataItem", default)]
    pub items: Vec<BinDataItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BinDataItem {
    #[serde(rename = "@id", default)]
    pub id: Option<String>,
    #[serde(rename = "@src", default)]
    pub src: Option<String>,
    #[serde(rename = "@format", default)]
    pub format: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct XmlSection {
    #[serde(rename = "hp:p", default)]
    pub paragraphs: Vec<XmlParagraph>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct XmlParagraph {
    #[serde(rename = "@id", default)]
    pub id: Option<u32>,
    #[serde(rename = "@paraPrIDRef", default)]
    pub para_pr_id_ref: Option<u32>,
    #[serde(rename = "@styleIDRef", default)]
    pub style_id_ref: Option<u32>,
    #[serde(rename = "hp:run", default)]
    pub runs: Vec<XmlRun>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct XmlRun {
    #[serde(rename = "@charPrIDRef", default)]
    pub char_pr_id_ref: Option<u32>,
    #[serde(rename = "hp:t", default)]
    pub text: Option<String>,
    #[serde(rename = "hp:tbl", default)]
    pub table: Option<XmlTable>,
    #[serde(rename = "hp:pic", default)]
    pub picture: Option<XmlPicture>,
    #[serde(rename = "hp:rect", default)]
    pub rect: Option<XmlRect>,
    #[serde(rename = "hp:secPr", default)]
    pub sec_pr: Option<XmlSecPr>,
}

/// Presence marker only; the raw secPr block is preserved as text.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct XmlSecPr {}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct XmlTable {
    #[serde(rename = "@rowCnt", default)]
    pub row_cnt: Option<u32>,
    #[serde(rename = "@colCnt", default)]
    pub col_cnt: Option<u32>,
    #[serde(rename = "hp:tr", default)]
    pub rows: Vec<XmlTableRow>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct XmlTableRow {
    #[serde(rename = "hp:tc", default)]
    pub cells: Vec<XmlTableCell>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct XmlTableCell {
    #[serde(rename = "hp:cellAddr", default)]
    pub cell_addr: Option<CellAddr>,
    #[serde(rename = "hp:cellSpan", default)]
    pub cell_span: Option<CellSpan>,
    #[serde(rename = "hp:subList", default)]
    pub sub_list: Option<SubList>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CellAddr {
    #[serde(rename = "@colAddr", default)]
    pub col_addr: Option<u32>,
    #[serde(rename = "@rowAddr", default)]
    pub row_addr: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CellSpan {
    #[serde(rename = "@colSpan", default)]
    pub col_span: Option<u32>,
    #[serde(rename = "@rowSpan", default)]
    pub row_span: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubList {
    #[serde(rename = "hp:p", default)]
    pub paragraphs: Vec<XmlParagraph>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct XmlPicture {
    #[serde(rename = "hc:img", default)]
    pub img: Option<XmlImg>,
    #[serde(rename = "hp:imgRect", default)]
    pub img_rect: Option<XmlImgRect>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct XmlImg {
    #[serde(rename = "@binaryItemIDRef", default)]
    pub binary_item_id_ref: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct XmlImgRect {
    #[serde(rename = "@cx", default)]
    pub cx: Option<u32>,
    #[serde(rename = "@cy", default)]
    pub cy: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct XmlRect {
    #[serde(rename = "hp:drawText", default)]
    pub draw_text: Option<DrawText>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DrawText {
    #[serde(rename = "hp:subList", default)]
    pub sub_list: Option<SubList>,
}

pub fn parse_version(xml: &str) -> Result<HcfVersion, quick_xml::DeError> {
    from_str(xml)
}

pub fn parse_head(xml: &str) -> Result<Head, quick_xml::DeError> {
    from_str(xml)
}

pub fn parse_section(xml: &str) -> Result<XmlSection, quick_xml::DeError> {
    from_str(xml)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_prefixed_section() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes" ?>
        <hs:sec xmlns:hs="x" xmlns:hp="y">
            <hp:p id="0" paraPrIDRef="0" styleIDRef="0">
                <hp:run charPrIDRef="0"><hp:t>Hello &amp; World</hp:t></hp:run>
            </hp:p>
        </hs:sec>"#;
        let section = parse_section(xml).unwrap();
        assert_eq!(section.paragraphs.len(), 1);
        assert_eq!(
            section.paragraphs[0].runs[0].text.as_deref(),
            Some("Hello & World")
        );
    }

    #[test]
    fn parse_head_tables() {
        let xml = r#"<?xml version="1.0"?>
        <hh:head xmlns:hh="h">
          <hh:beginNum page="1" pic="1" tbl="1"/>
          <hh:refList>
            <hh:fontfaces><hh:fontface lang="HANGUL"><hh:font id="0" face="맑은 고딕"/></hh:fontface></hh:fontfaces>
            <hh:charProperties itemCnt="1"><hh:charPr id="0" height="1000" textColor="0" bold="true"/></hh:charProperties>
            <hh:paraProperties itemCnt="1"><hh:paraPr id="0" align="JUSTIFY"><hh:heading type="OUTLINE" level="2"/></hh:paraPr></hh:paraProperties>
            <hh:styles itemCnt="1"><hh:style id="0" type="PARA" name="바탕글" engName="Normal" paraPrIDRef="0" charPrIDRef="0"/></hh:styles>
          </hh:refList>
        </hh:head>"#;
        let head = parse_head(xml).unwrap();
        let refs = head.ref_list.unwrap();
        assert_eq!(refs.char_properties.unwrap().items[0].bold, Some(true));
        let para_pr = &refs.para_properties.unwrap().items[0];
        assert_eq!(para_pr.align.as_deref(), Some("JUSTIFY"));
        assert_eq!(para_pr.heading.as_ref().unwrap().level, Some(2));
        assert_eq!(
            refs.styles.unwrap().items[0].eng_name.as_deref(),
            Some("Normal")
        );
    }

    #[test]
    fn parse_table_cells() {
        let xml = r#"<hs:sec>
          <hp:p><hp:run charPrIDRef="0"><hp:tbl rowCnt="1" colCnt="1">
            <hp:tr><hp:tc>
              <hp:cellAddr colAddr="0" rowAddr="0"/><hp:cellSpan colSpan="1" rowSpan="1"/>
              <hp:subList><hp:p><hp:run charPrIDRef="0"><hp:t>cell</hp:t></hp:run></hp:p></hp:subList>
            </hp:tc></hp:tr>
          </hp:tbl></hp:run></hp:p>
        </hs:sec>"#;
        let section = parse_section(xml).unwrap();
        let table = section.paragraphs[0].runs[0].table.as_ref().unwrap();
        assert_eq!(table.rows.len(), 1);
        let cell = &table.rows[0].cells[0];
        assert_eq!(
            cell.sub_list.as_ref().unwrap().paragraphs[0].runs[0]
                .text
                .as_deref(),
            Some("cell")
        );
    }
}
