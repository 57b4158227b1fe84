pub mod config;
pub mod files;
pub mod types;

pub use config::Config;
pub use files::{
    file_type_for_extension, filename_from_content_disposition, filename_from_url,
    generated_filename, sanitize_filename, FileCategory,
};
pub use types::*;
