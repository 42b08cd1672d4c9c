//! # Utility Functions Module
//!
//! Small helpers shared by the transcoder, the configuration and the CLI:
//! argument-vector building for external tools and byte-size conversions.

/// Bytes in one megabyte, as the upload limits are expressed.
pub const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Converts an iterable of string-like items to `Vec<String>`.
///
/// # Example
/// ```rust
/// use video_prep::utils::to_string_vec;
///
/// let crf = 30;
/// let args = to_string_vec(["-crf", &crf.to_string(), "-preset", "veryfast"]);
/// ```
pub fn to_string_vec<T, I>(items: I) -> Vec<String>
where
    T: ToString,
    I: IntoIterator<Item = T>,
{
    items.into_iter().map(|item| item.to_string()).collect()
}

/// Macro for building argument vectors of mixed types.
///
/// # Example
/// ```rust
/// use video_prep::args;
///
/// let crf = 32;
/// let args = args!["-crf", crf, "-movflags", "+faststart"];
/// ```
#[macro_export]
macro_rules! args {
    [$($item:expr),* $(,)?] => {
        $crate::utils::to_string_vec([$($item.to_string()),*])
    };
}

/// Convert a megabyte figure to bytes, rounding down.
pub fn mb_to_bytes(mb: f64) -> u64 {
    (mb * BYTES_PER_MB).floor() as u64
}

/// Get human-readable file size
pub fn format_size(size: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = size as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", size as u64, UNITS[unit_index])
    } else {
        format!("{:.2} {}", size, UNITS[unit_index])
    }
}

/// Calculate percentage reduction
pub fn calculate_reduction(original_size: u64, new_size: u64) -> f64 {
    if original_size == 0 {
        0.0
    } else {
        ((original_size as f64 - new_size as f64) / original_size as f64) * 100.0
    }
}
