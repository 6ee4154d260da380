pub mod file_type;
pub mod mime_probe;

pub use file_type::{ExtractionRequest, FileTypeClassifier, FormatTag, TargetFile};
pub use mime_probe::{FileCommandProbe, MimeProbe};
