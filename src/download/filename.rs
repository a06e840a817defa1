//! Filename sanitization for downloaded books.

use std::sync::LazyLock;

use regex::Regex;

use crate::resolver::compile_static_regex;

/// Anything that is not a word character, whitespace or hyphen.
static DISALLOWED_RE: LazyLock<Regex> = LazyLock::new(|| compile_static_regex(r"[^\w\s-]"));

/// Runs of whitespace and hyphens.
static SEPARATOR_RUN_RE: LazyLock<Regex> = LazyLock::new(|| compile_static_regex(r"[-\s]+"));

/// Extension used when the catalog record has none.
pub const DEFAULT_EXTENSION: &str = "pdf";

/// Upper bound on the stem length in UTF-8 bytes. With the extension cap the
/// whole name stays under the common 255-byte filesystem limit.
const MAX_STEM_BYTES: usize = 200;

/// Upper bound on the extension length in UTF-8 bytes.
const MAX_EXTENSION_BYTES: usize = 16;

/// Strips characters outside word characters, whitespace and hyphen, then
/// collapses whitespace/hyphen runs into a single underscore.
///
/// ```
/// use libgen_core::sanitize_filename;
///
/// assert_eq!(sanitize_filename("The Rust Book: 2nd ed."), "The_Rust_Book_2nd_ed");
/// ```
#[must_use]
pub fn sanitize_filename(value: &str) -> String {
    let stripped = DISALLOWED_RE.replace_all(value, "");
    SEPARATOR_RUN_RE
        .replace_all(stripped.trim(), "_")
        .into_owned()
}

/// Builds `<title>_<author>.<ext>` from catalog fields.
///
/// Empty parts are dropped; an empty title becomes `untitled` and an empty
/// extension becomes [`DEFAULT_EXTENSION`].
#[must_use]
pub fn book_filename(title: &str, author: &str, extension: &str) -> String {
    let title = sanitize_filename(title);
    let author = sanitize_filename(author);
    let mut stem = match (title.is_empty(), author.is_empty()) {
        (false, false) => format!("{title}_{author}"),
        (false, true) => title,
        (true, false) => format!("untitled_{author}"),
        (true, true) => "untitled".to_string(),
    };
    if stem.len() > MAX_STEM_BYTES {
        stem = truncate_on_char_boundary(&stem, MAX_STEM_BYTES)
            .trim_end_matches('_')
            .to_string();
    }

    let extension = sanitize_filename(extension).to_lowercase();
    let extension = truncate_on_char_boundary(&extension, MAX_EXTENSION_BYTES);
    let extension = if extension.is_empty() {
        DEFAULT_EXTENSION
    } else {
        extension
    };
    format!("{stem}.{extension}")
}

/// Longest prefix of `value` that fits in `max_bytes` without splitting a char.
fn truncate_on_char_boundary(value: &str, max_bytes: usize) -> &str {
    if value.len() <= max_bytes {
        return value;
    }
    let mut end = max_bytes;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    &value[..end]
}
