//! Landing page resolution: turns a mirror page into the real download URL.
//!
//! Library Genesis mirrors do not serve the book directly. Each mirror URL
//! points at an HTML landing page carrying a link labelled `GET` that leads
//! to the binary. This module finds that link.
//!
//! # Architecture
//!
//! - [`LinkResolver`] - Trait the downloader calls for every landing page
//! - [`GetLinkResolver`] - Default implementation (first `<a>` whose visible label is exactly `GET`)
//! - [`resolve_download_link`] - Free-function form of the default behavior
//!
//! # Example
//!
//! ```
//! use libgen_core::resolver::resolve_download_link;
//!
//! let html = r#"<h2><a href="https://cdn.example/book.pdf">GET</a></h2>"#;
//! assert_eq!(resolve_download_link(html).unwrap(), "https://cdn.example/book.pdf");
//! ```

mod error;
mod utils;

pub use error::ResolveError;
pub use utils::{absolutize_url, decode_entities, href_from_attrs, text_content};

pub(crate) use utils::compile_static_regex;

use std::sync::LazyLock;

use regex::Regex;

/// Visible label of the download link on mirror landing pages.
pub const DOWNLOAD_LINK_LABEL: &str = "GET";

/// Any anchor element. Group 1 is the attribute list (quoted values may
/// contain `>`), group 2 the raw content.
static ANCHOR_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile_static_regex(r#"(?is)<a\b((?:[^>"']|"[^"]*"|'[^']*')*)>(.*?)</a\s*>"#)
});

static COMMENT_RE: LazyLock<Regex> = LazyLock::new(|| compile_static_regex(r"(?s)<!--.*?-->"));

/// Extracts the download URL from one mirror landing page.
///
/// Implementations must be pure: no I/O, no state changes.
pub trait LinkResolver: Send + Sync {
    /// Returns the resolver's name for logging.
    fn name(&self) -> &str;

    /// Returns the link target found in `html`.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::NotFound`] when the page has no usable link.
    fn resolve(&self, html: &str) -> Result<String, ResolveError>;
}

/// Resolver for the `GET` anchor used by Library Genesis mirrors.
#[derive(Debug, Default, Clone, Copy)]
pub struct GetLinkResolver;

impl GetLinkResolver {
    /// Creates a new `GetLinkResolver`.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl LinkResolver for GetLinkResolver {
    fn name(&self) -> &'static str {
        "get-link"
    }

    fn resolve(&self, html: &str) -> Result<String, ResolveError> {
        resolve_download_link(html)
    }
}

/// Returns the `href` of the first link whose visible label is exactly `GET`.
///
/// The label may be wrapped in elements that are the only child of their
/// parent (`<a><b>GET</b></a>`), but any other text or whitespace around it
/// disqualifies the link. Commented-out markup is ignored, and anchors
/// labelled `GET` that carry no `href` are skipped.
///
/// # Errors
///
/// Returns [`ResolveError::NotFound`] when no such link exists.
pub fn resolve_download_link(html: &str) -> Result<String, ResolveError> {
    let html = COMMENT_RE.replace_all(html, "");
    ANCHOR_RE
        .captures_iter(&html)
        .filter(|caps| {
            caps.get(2)
                .is_some_and(|content| visible_label(content.as_str()) == DOWNLOAD_LINK_LABEL)
        })
        .filter_map(|caps| caps.get(1).and_then(|attrs| href_from_attrs(attrs.as_str())))
        .find(|href| !href.is_empty())
        .ok_or_else(|| ResolveError::not_found(DOWNLOAD_LINK_LABEL))
}

/// Peels elements that wrap the whole content, so `<b><i>GET</i></b>` reads as `GET`.
fn visible_label(content: &str) -> &str {
    let mut label = content;
    while let Some(inner) = unwrap_single_element(label) {
        label = inner;
    }
    label
}

/// Returns the content of `value` when it is exactly one element `<x ...>...</x>`.
fn unwrap_single_element(value: &str) -> Option<&str> {
    let rest = value.strip_prefix('<')?;
    let name_len = rest.find(|c: char| !(c.is_ascii_alphanumeric() || c == '-'))?;
    let name = &rest[..name_len];
    if !name.starts_with(|c: char| c.is_ascii_alphabetic()) {
        return None;
    }
    let body = &rest[rest.find('>')? + 1..];
    let close_start = body.rfind("</")?;
    let closing = body[close_start + 2..].strip_suffix('>')?.trim_end();
    closing.eq_ignore_ascii_case(name).then_some(&body[..close_start])
}
