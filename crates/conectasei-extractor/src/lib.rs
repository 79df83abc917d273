pub mod extractor;
pub mod merge;
mod worker;

pub use extractor::{Extractor, ExtractorDeps};
