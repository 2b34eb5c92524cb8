//! PPTX (Office Open XML) document-model provider.
//!
//! Parses .pptx files, which are ZIP archives of XML parts, into the
//! presentation model consumed by `deck2md-core`.

pub mod parser;
pub mod rels;
mod shapes;

pub use parser::PptxParser;
