mod reader;
pub mod writer;
mod xml_types;

pub use reader::{decode_package, extract_sec_pr, header_tables_from_xml};
pub use writer::HwpxEditor;
pub use xml_types::*;
