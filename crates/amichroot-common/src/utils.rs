//! Shared utility functions for image names and paths.

/// Shortest image name the registration API accepts.
pub const IMAGE_NAME_MIN_LEN: usize = 3;

/// Longest image name the registration API accepts.
pub const IMAGE_NAME_MAX_LEN: usize = 128;

/// Returns true if `c` may appear in a registered image name.
pub const fn is_image_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric()
        || matches!(c, '(' | ')' | '[' | ']' | ' ' | '.' | '/' | '-' | '\'' | '@' | '_')
}

/// Replaces every character that is not allowed in an image name with `-`.
pub fn clean_image_name(input: &str) -> String {
    input
        .chars()
        .map(|c| if is_image_name_char(c) { c } else { '-' })
        .collect()
}

/// Returns true for a non-empty absolute unix path.
pub fn is_absolute_path(path: &str) -> bool {
    path.starts_with('/')
}
