pub mod channels;
pub mod sample;
pub mod store;

pub use sample::{DecodeError, Sample, ShapeError, decode_record, decode_text, value_to_array};
pub use store::{SampleLookup, SampleStore};
