pub mod adts;
pub mod boxes;
pub mod decoders;
pub mod error;
pub mod extract;
pub mod fourcc;
pub mod reader;
pub mod sample_table;
pub mod track;

pub use boxes::{BoxHeader, BoxKind, BoxNode, parse, read_box_header, walk};
pub use error::{Error, Result};
pub use fourcc::FourCC;
pub use reader::BodyReader;
pub use sample_table::{SampleDescriptor, build_descriptors};
pub use track::{MediaKind, Track, TrackRegistry};
