//! TOON reader and writer.
//!
//! The reader turns indentation-structured TOON text into a [`Value`] tree;
//! the writer picks the shortest lossless form for each array (inline,
//! tabular, or expanded list) and quotes strings only where the active
//! delimiter makes them ambiguous. `decode(encode(v)) == v` holds for every
//! value the engine can produce.
//!
//! [`Value`]: crate::value::Value

mod decoder;
mod encoder;

pub use decoder::decode;
pub use encoder::encode;
