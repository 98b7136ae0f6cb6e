pub mod frame;
pub mod source;

pub use frame::{Frame, RawFrame};
pub use source::{
    extract_uniform, open_source, sample_indices, FrameSource, ImageDirectorySource, MemorySource,
    SourceError,
};
