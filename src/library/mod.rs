pub mod content;

pub use content::{ContentError, ContentFile, ContentLibrary, validate_content_filename};
