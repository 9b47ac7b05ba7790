pub mod archive;
pub mod cfb;
pub mod stream;

pub use archive::ZipPackage;
pub use stream::{StreamReader, StreamWriter};
