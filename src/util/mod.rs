pub mod files;
pub mod text;

pub use files::{append_text, overwrite_text, read_csv_column, read_lines, read_text};
pub use text::{
    between, collapse_whitespace, decode_unicode_escapes, is_digits, random_string, unique_id,
};
