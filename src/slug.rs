use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Filename used when a title has no usable characters
pub const FALLBACK_SLUG: &str = "audio";

/// Convert a track title to an ASCII filename stem
/// - Strips diacritics via Unicode NFD decomposition
/// - Keeps ASCII letters, digits, `-` and `_`
/// - Replaces every other run of characters with a single underscore
/// - Trims leading/trailing underscores
pub fn slugify(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut pending_separator = false;

    for ch in input.nfd() {
        if is_combining_mark(ch) {
            continue;
        }

        if ch.is_ascii_alphanumeric() || ch == '-' {
            if pending_separator && !result.is_empty() {
                result.push('_');
            }
            pending_separator = false;
            result.push(ch);
        } else {
            // '_' itself joins the run so "a__b" and "a _ b" both become "a_b"
            pending_separator = true;
        }
    }

    result
}

/// [`slugify`], falling back to [`FALLBACK_SLUG`] when nothing is left
pub fn filename_stem(title: &str) -> String {
    let slug = slugify(title);
    if slug.is_empty() {
        FALLBACK_SLUG.to_string()
    } else {
        slug
    }
}
