pub mod document;
pub mod image;
pub mod paragraph;
pub mod table;
pub mod text_box;

pub use self::document::{
    Alignment, CharFormat, CharStyle, DocFormat, Document, Font, HeaderTables, ParaStyle, Style,
    StyleKind,
};
pub use self::image::{Image, ImageFormat};
pub use self::paragraph::{Anchor, AnchorKind, Paragraph, Run, Section};
pub use self::table::{Table, TableCell, TableRow};
pub use self::text_box::TextBox;
