use crate::model::image::Image;
use crate::model::table::Table;
use crate::model::text_box::TextBox;

/// One body section. Tables, images and text boxes are children of a host
/// paragraph in the record tree; the model flattens them into per-section
/// collections addressed by index, and the host paragraph keeps ordered
/// anchors pointing back at them.
#[derive(Debug, Clone, Default)]
pub struct Section {
    pub paragraphs: Vec<Paragraph>,
    pub tables: Vec<Table>,
    pub images: Vec<Image>,
    pub text_boxes: Vec<TextBox>,
}

impl Section {
    pub fn plain_text(&self) -> String {
        let mut out = String::new();
        for para in &self.paragraphs {
            out.push_str(&para.plain_text());
            out.push('\n');
        }
        out
    }
}

/// A top-level or nested paragraph. Only top-level paragraphs appear in
/// `Section::paragraphs`; nested ones are reachable through their
/// enclosing cell or text box.
#[derive(Debug, Clone, Default)]
pub struct Paragraph {
    pub runs: Vec<Run>,
    pub para_shape_ref: u16,
    pub style_ref: u16,
    pub anchors: Vec<Anchor>,
}

impl Paragraph {
    pub fn from_text(text: &str, char_shape_ref: u16) -> Self {
        Self {
            runs: vec![Run {
                text: text.to_string(),
                char_shape_ref,
            }],
            ..Default::default()
        }
    }

    /// Visible text: the concatenation of the run texts.
    pub fn plain_text(&self) -> String {
        self.runs.iter().map(|r| r.text.as_str()).collect()
    }
}

/// A maximal contiguous substring sharing one character shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Run {
    pub text: String,
    pub char_shape_ref: u16,
}

/// An inline object anchored in a paragraph, indexing into the section's
/// flattened collection of that kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Anchor {
    pub kind: AnchorKind,
    pub index: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnchorKind {
    Table,
    Image,
    TextBox,
}
