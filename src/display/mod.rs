pub mod decoder;
pub mod segment_map;

pub use decoder::decode;
