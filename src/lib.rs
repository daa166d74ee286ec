pub mod core;
pub mod convert;
pub mod inspect;
pub mod manifest;

// Re-exports for easy access
pub use crate::convert::{Converter, PairOutcome, SkipReason, SplitStats};
pub use crate::core::lookup::{ColorLookupTable, UNMAPPED_CLASS};
pub use crate::core::mask::{decode_mask, ChannelOrder, LabelGrid};
pub use crate::core::palette::{ClassPalette, PaletteEntry};
pub use crate::core::record::{build_record, BuildOutcome, SegmentationRecord};
pub use crate::core::tfrecord::{RecordReader, RecordWriter};
pub use crate::manifest::ImagePair;
