pub mod body_text;
pub mod doc_info;
pub mod file_header;
pub mod record;

pub use file_header::FileHeader;
pub use record::{RecordStream, RecordView};
