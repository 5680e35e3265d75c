pub mod ocr;

pub use ocr::{extract_text_and_meta, ExtractedMeta};
