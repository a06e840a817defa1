//! Search result page extraction.
//!
//! The catalog renders results as `<table class="c">`. The first row is the
//! header; every other row is one book with cells in this order:
//! id, author, title, publisher, year, pages, language, size, extension,
//! mirror 1, mirror 2, edit.

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

use super::BookRecord;
use crate::resolver::{absolutize_url, compile_static_regex, href_from_attrs, text_content};

static RESULTS_TABLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile_static_regex(r#"(?is)<table\b[^>]*\bclass\s*=\s*(?:"c"|'c'|c\b)[^>]*>(.*?)</table>"#)
});

static ROW_RE: LazyLock<Regex> = LazyLock::new(|| compile_static_regex(r"(?is)<tr\b[^>]*>(.*?)</tr>"));

static CELL_RE: LazyLock<Regex> =
    LazyLock::new(|| compile_static_regex(r"(?is)<td\b[^>]*>(.*?)</td>"));

static ANCHOR_RE: LazyLock<Regex> = LazyLock::new(|| compile_static_regex(r"(?is)<a\b([^>]*)>"));

static YEAR_RE: LazyLock<Regex> = LazyLock::new(|| compile_static_regex(r"\d{1,4}"));

const AUTHOR_CELL: usize = 1;
const TITLE_CELL: usize = 2;
const PUBLISHER_CELL: usize = 3;
const YEAR_CELL: usize = 4;
const PAGES_CELL: usize = 5;
const LANGUAGE_CELL: usize = 6;
const SIZE_CELL: usize = 7;
const EXTENSION_CELL: usize = 8;
const MIRROR_CELLS: [usize; 2] = [9, 10];

/// Parses a search result page into book records, in page order.
///
/// Relative mirror links are resolved against `base_url`. A page without the
/// results table yields an empty list; rows with too few cells are skipped.
#[must_use]
pub fn parse_search_results(html: &str, base_url: &Url) -> Vec<BookRecord> {
    let Some(table) = RESULTS_TABLE_RE
        .captures(html)
        .and_then(|caps| caps.get(1))
    else {
        return Vec::new();
    };

    ROW_RE
        .captures_iter(table.as_str())
        .skip(1)
        .filter_map(|row| row.get(1).and_then(|inner| parse_row(inner.as_str(), base_url)))
        .collect()
}

fn parse_row(row_html: &str, base_url: &Url) -> Option<BookRecord> {
    let cells: Vec<&str> = CELL_RE
        .captures_iter(row_html)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
        .collect();
    if cells.len() <= MIRROR_CELLS[0] {
        return None;
    }

    let text = |index: usize| cells.get(index).map(|c| text_content(c)).unwrap_or_default();

    let mut mirrors: Vec<String> = Vec::new();
    for index in MIRROR_CELLS {
        let Some(cell) = cells.get(index) else {
            continue;
        };
        for anchor in ANCHOR_RE.captures_iter(cell) {
            let Some(href) = anchor.get(1).and_then(|attrs| href_from_attrs(attrs.as_str())) else {
                continue;
            };
            let Some(absolute) = absolutize_url(&href, base_url) else {
                continue;
            };
            if !mirrors.contains(&absolute) {
                mirrors.push(absolute);
            }
        }
    }

    Some(BookRecord {
        title: text(TITLE_CELL),
        author: text(AUTHOR_CELL),
        publisher: text(PUBLISHER_CELL),
        year: parse_year(&text(YEAR_CELL)),
        pages: text(PAGES_CELL),
        language: text(LANGUAGE_CELL),
        size: text(SIZE_CELL),
        extension: text(EXTENSION_CELL),
        mirrors,
    })
}

fn parse_year(value: &str) -> Option<u32> {
    YEAR_RE
        .find(value)
        .and_then(|m| m.as_str().parse::<u32>().ok())
        .filter(|year| *year > 0)
}
