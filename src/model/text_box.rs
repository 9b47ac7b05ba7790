use crate::model::paragraph::Paragraph;

/// A text box: the rectangular shape component of a generic shape object
/// whose content is its own paragraph sub-stream.
#[derive(Debug, Clone, Default)]
pub struct TextBox {
    pub paragraphs: Vec<Paragraph>,
}

impl TextBox {
    pub fn plain_text(&self) -> String {
        self.paragraphs
            .iter()
            .map(|p| p.plain_text())
            .collect::<Vec<_>>()
            .join("\n")
    }
}
