use crate::model::paragraph::Section;

/// Default body style name (바탕글 renders as "Normal" in English UIs).
pub const STYLE_NAME_NORMAL: &str = "Normal";
/// Korean name prefix of the seven outline heading styles.
pub const STYLE_NAME_OUTLINE_PREFIX: &str = "개요";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocFormat {
    Hwp,
    Hwpx,
}

/// In-memory document: one shared header plus ordered sections. Built by a
/// decoder, queried and mutated through the edit executor, serialized by an
/// encoder, then discarded.
#[derive(Debug, Clone)]
pub struct Document {
    pub format: DocFormat,
    pub header: HeaderTables,
    pub sections: Vec<Section>,
}

impl Document {
    pub fn new(format: DocFormat) -> Self {
        Self {
            format,
            header: HeaderTables::default(),
            sections: Vec::new(),
        }
    }

    /// Plain text of the whole document: top-level paragraphs in order,
    /// one line per paragraph.
    pub fn plain_text(&self) -> String {
        let mut out = String::new();
        for section in &self.sections {
            for para in &section.paragraphs {
                out.push_str(&para.plain_text());
                out.push('\n');
            }
        }
        out
    }

    /// Find paragraphs whose text contains `needle`, returning
    /// `(reference, paragraph text)` pairs in document order.
    pub fn find_text(&self, needle: &str) -> Vec<(String, String)> {
        let mut hits = Vec::new();
        for (si, section) in self.sections.iter().enumerate() {
            for (pi, para) in section.paragraphs.iter().enumerate() {
                let text = para.plain_text();
                if text.contains(needle) {
                    hits.push((format!("s{}.p{}", si, pi), text));
                }
            }
        }
        hits
    }

    /// Heading level of a paragraph, resolved through its style's
    /// paragraph shape.
    pub fn heading_level(&self, para: &crate::model::Paragraph) -> Option<u8> {
        let style = self.header.styles.get(para.style_ref as usize)?;
        let shape = self
            .header
            .para_shapes
            .get(style.para_shape_ref as usize)?;
        shape.heading_level
    }
}

/// The four ordered tables shared by every section. Ids are dense from 0
/// and equal each entry's position; formatting operations extend the
/// tables strictly by append so existing references stay valid.
#[derive(Debug, Clone, Default)]
pub struct HeaderTables {
    pub fonts: Vec<Font>,
    pub char_shapes: Vec<CharStyle>,
    pub para_shapes: Vec<ParaStyle>,
    pub styles: Vec<Style>,
}

impl HeaderTables {
    /// Find a char style equal to `wanted` (ignoring id), or append it.
    /// Returns the id either way.
    pub fn find_or_add_char_style(&mut self, mut wanted: CharStyle) -> u16 {
        for existing in &self.char_shapes {
            if existing.same_shape(&wanted) {
                return existing.id;
            }
        }
        let id = self.char_shapes.len() as u16;
        wanted.id = id;
        self.char_shapes.push(wanted);
        id
    }

    pub fn find_or_add_para_style(&mut self, mut wanted: ParaStyle) -> u16 {
        for existing in &self.para_shapes {
            if existing.align == wanted.align && existing.heading_level == wanted.heading_level {
                return existing.id;
            }
        }
        let id = self.para_shapes.len() as u16;
        wanted.id = id;
        self.para_shapes.push(wanted);
        id
    }

    /// Style id for outline level `level`, by heading level first, then by
    /// the conventional `개요 N` name.
    pub fn heading_style(&self, level: u8) -> Option<&Style> {
        let by_shape = self.styles.iter().find(|s| {
            self.para_shapes
                .get(s.para_shape_ref as usize)
                .and_then(|ps| ps.heading_level)
                == Some(level)
        });
        by_shape.or_else(|| {
            let name = format!("{} {}", STYLE_NAME_OUTLINE_PREFIX, level);
            self.styles.iter().find(|s| s.name == name)
        })
    }

    pub fn style_by_name(&self, name: &str) -> Option<&Style> {
        self.styles
            .iter()
            .find(|s| s.name == name || s.english_name == name)
    }

    /// Provision the default table set of a fresh document: one font, one
    /// base char shape, the Normal style and the seven outline heading
    /// styles, each backed by a paragraph shape carrying its level.
    pub fn provision_defaults(&mut self, font_name: &str) {
        self.fonts.push(Font {
            id: 0,
            name: font_name.to_string(),
        });
        self.char_shapes.push(CharStyle::new_default(0));
        self.para_shapes.push(ParaStyle {
            id: 0,
            align: Alignment::Left,
            heading_level: None,
        });
        self.styles.push(Style {
            id: 0,
            name: "바탕글".to_string(),
            english_name: STYLE_NAME_NORMAL.to_string(),
            para_shape_ref: 0,
            char_shape_ref: 0,
            kind: StyleKind::Para,
        });
        for level in 1..=7u8 {
            self.para_shapes.push(ParaStyle {
                id: level as u16,
                align: Alignment::Left,
                heading_level: Some(level),
            });
            self.styles.push(Style {
                id: level as u16,
                name: format!("{} {}", STYLE_NAME_OUTLINE_PREFIX, level),
                english_name: format!("Outline {}", level),
                para_shape_ref: level as u16,
                char_shape_ref: 0,
                kind: StyleKind::Para,
            });
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Font {
    pub id: u16,
    pub name: String,
}

/// Character properties. Sizes are points in the model; wire formats that
/// demand hundredths multiply by 100 at the codec boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharStyle {
    pub id: u16,
    pub font_ref: u16,
    pub size_pt: u32,
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub color: u32,
}

impl CharStyle {
    pub fn new_default(id: u16) -> Self {
        Self {
            id,
            font_ref: 0,
            size_pt: 10,
            bold: false,
            italic: false,
            underline: false,
            color: 0x000000,
        }
    }

    /// Field equality ignoring the id, for reuse-before-append searches.
    pub fn same_shape(&self, other: &Self) -> bool {
        self.font_ref == other.font_ref
            && self.size_pt == other.size_pt
            && self.bold == other.bold
            && self.italic == other.italic
            && self.underline == other.underline
            && self.color == other.color
    }

    pub fn apply(&self, format: &CharFormat) -> Self {
        Self {
            id: self.id,
            font_ref: self.font_ref,
            size_pt: format.size_pt.unwrap_or(self.size_pt),
            bold: format.bold.unwrap_or(self.bold),
            italic: format.italic.unwrap_or(self.italic),
            underline: format.underline.unwrap_or(self.underline),
            color: format.color.unwrap_or(self.color),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParaStyle {
    pub id: u16,
    pub align: Alignment,
    pub heading_level: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Style {
    pub id: u16,
    pub name: String,
    pub english_name: String,
    pub char_shape_ref: u16,
    pub para_shape_ref: u16,
    pub kind: StyleKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StyleKind {
    Para,
    Char,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alignment {
    Left,
    Center,
    Right,
    Justify,
}

impl Alignment {
    /// Uppercase wire token used by the XML codec.
    pub fn as_token(&self) -> &'static str {
        match self {
            Self::Left => "LEFT",
            Self::Center => "CENTER",
            Self::Right => "RIGHT",
            Self::Justify => "JUSTIFY",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        match token.to_ascii_uppercase().as_str() {
            "LEFT" => Some(Self::Left),
            "CENTER" => Some(Self::Center),
            "RIGHT" => Some(Self::Right),
            "JUSTIFY" => Some(Self::Justify),
            _ => None,
        }
    }
}

/// Format deltas for a character-format operation; `None` fields leave the
/// underlying shape untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CharFormat {
    pub bold: Option<bool>,
    pub italic: Option<bool>,
    pub underline: Option<bool>,
    pub size_pt: Option<u32>,
    pub color: Option<u32>,
}

impl CharFormat {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provisioned_header_has_eight_styles() {
        let mut header = HeaderTables::default();
        header.provision_defaults("맑은 고딕");
        assert_eq!(header.styles.len(), 8);
        assert_eq!(header.styles[0].english_name, STYLE_NAME_NORMAL);
        assert_eq!(header.styles[3].name, "개요 3");
        assert_eq!(
            header
                .para_shapes
                .get(header.styles[3].para_shape_ref as usize)
                .unwrap()
                .heading_level,
            Some(3)
        );
    }

    #[test]
    fn char_style_reuse_before_append() {
        let mut header = HeaderTables::default();
        header.provision_defaults("바탕");
        let bold = header.char_shapes[0].apply(&CharFormat {
            bold: Some(true),
            ..Default::default()
        });

        let id1 = header.find_or_add_char_style(bold.clone());
        let id2 = header.find_or_add_char_style(bold);
        assert_eq!(id1, id2);
        assert_eq!(header.char_shapes.len(), 2);
    }

    #[test]
    fn heading_style_lookup() {
        let mut header = HeaderTables::default();
        header.provision_defaults("바탕");
        let style = header.heading_style(5).unwrap();
        assert_eq!(style.id, 5);
        assert_eq!(style.name, "개요 5");
    }
}
