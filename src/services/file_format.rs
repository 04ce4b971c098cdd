//! Pure helpers deriving display data from attachment metadata.
//!
//! - `classify` maps a MIME type to a coarse [`Category`].
//! - `format_size` renders a byte count as a short human-readable string.

use crate::models::attachment::Category;

const SIZE_UNITS: [&str; 7] = ["Bytes", "KB", "MB", "GB", "TB", "PB", "EB"];
const KIB: u64 = 1024;

/// Classify a MIME type.
///
/// The checks run in a fixed priority order because several Office MIME
/// types contain more than one of the matched substrings.
pub fn classify(mimetype: &str) -> Category {
    if mimetype.starts_with("image/") {
        Category::Image
    } else if mimetype == "application/pdf" {
        Category::Pdf
    } else if mimetype.contains("excel")
        || mimetype.contains("spreadsheet")
        || mimetype == "text/csv"
    {
        Category::Spreadsheet
    } else if mimetype.contains("powerpoint") || mimetype.contains("presentation") {
        Category::Presentation
    } else if mimetype.contains("word")
        || mimetype.contains("document")
        || mimetype == "text/plain"
    {
        Category::Document
    } else {
        Category::Other
    }
}

/// Format a byte count, e.g. `1536 -> "1.5 KB"`.
///
/// The unit index is `floor(log1024(bytes))`, computed on integers so exact
/// powers of 1024 never land one unit short. The value is rounded to two
/// decimals and trailing zeros are dropped.
pub fn format_size(bytes: u64) -> String {
    if bytes == 0 {
        return "0 Bytes".to_string();
    }

    let mut index = 0;
    let mut scaled = bytes;
    while scaled >= KIB && index < SIZE_UNITS.len() - 1 {
        scaled /= KIB;
        index += 1;
    }

    let value = bytes as f64 / (KIB as f64).powi(index as i32);
    let rounded = format!("{:.2}", value);
    let trimmed = rounded.trim_end_matches('0').trim_end_matches('.');
    format!("{} {}", trimmed, SIZE_UNITS[index])
}

/// Convenience for sizes stored as signed database integers.
pub fn format_stored_size(bytes: i64) -> String {
    format_size(u64::try_from(bytes).unwrap_or(0))
}
