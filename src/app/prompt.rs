//! Interactive prompts: query input, result picker, save directory.

use std::path::PathBuf;

use anyhow::Result;
use console::{Color, Style};
use dialoguer::theme::ColorfulTheme;
use dialoguer::{Input, Select};

use libgen_core::{AppConfig, BookRecord, StyleConfig, expand_home};

const ELLIPSIS: &str = "...";

/// Builds the prompt theme from the configured style strings.
pub(crate) fn build_theme(style: &StyleConfig) -> ColorfulTheme {
    let base = ColorfulTheme::default();
    ColorfulTheme {
        prompt_style: parse_style(&style.question),
        values_style: parse_style(&style.answer),
        active_item_style: parse_style(&style.highlighted),
        inactive_item_style: parse_style(&style.text),
        active_item_prefix: parse_style(&style.pointer).apply_to("❯".to_string()),
        ..base
    }
}

/// Parses `fg:<color> bg:<color> bold` into a console style. Unknown tokens
/// are ignored.
pub(crate) fn parse_style(value: &str) -> Style {
    value.split_whitespace().fold(Style::new(), |style, token| {
        if token.eq_ignore_ascii_case("bold") {
            style.bold()
        } else if let Some(color) = token.strip_prefix("fg:").and_then(parse_color) {
            style.fg(color)
        } else if let Some(color) = token.strip_prefix("bg:").and_then(parse_color) {
            style.bg(color)
        } else {
            style
        }
    })
}

fn parse_color(value: &str) -> Option<Color> {
    if let Some(hex) = value.strip_prefix('#') {
        return parse_hex_color(hex).map(|(r, g, b)| Color::Color256(nearest_xterm256(r, g, b)));
    }
    match value.to_ascii_lowercase().as_str() {
        "black" => Some(Color::Black),
        "red" => Some(Color::Red),
        "green" => Some(Color::Green),
        "yellow" => Some(Color::Yellow),
        "blue" => Some(Color::Blue),
        "magenta" | "purple" => Some(Color::Magenta),
        "cyan" => Some(Color::Cyan),
        "white" => Some(Color::White),
        _ => None,
    }
}

fn parse_hex_color(hex: &str) -> Option<(u8, u8, u8)> {
    if hex.len() != 6 || !hex.is_ascii() {
        return None;
    }
    let channel = |range: std::ops::Range<usize>| u8::from_str_radix(&hex[range], 16).ok();
    Some((channel(0..2)?, channel(2..4)?, channel(4..6)?))
}

/// Maps an RGB color onto the 6x6x6 cube of the xterm 256-color palette.
fn nearest_xterm256(r: u8, g: u8, b: u8) -> u8 {
    let level = |c: u8| (u16::from(c) * 5 + 127) / 255;
    let index = 16 + 36 * level(r) + 6 * level(g) + level(b);
    u8::try_from(index).unwrap_or(u8::MAX)
}

/// Picker label: `[year] [ext] title (author)`, or `[0000] title (author)`
/// when the year is unknown.
pub(crate) fn choice_label(book: &BookRecord, config: &AppConfig) -> String {
    let title = display_title(&book.title, config);
    match book.year {
        Some(year) => format!("[{year}] [{}] {title} ({})", book.extension, book.author),
        None => format!("[0000] {title} ({})", book.author),
    }
}

fn display_title(title: &str, config: &AppConfig) -> String {
    if !config.truncate_titles || title.chars().count() <= config.max_title_length {
        return title.to_string();
    }
    let keep = config.max_title_length.saturating_sub(ELLIPSIS.len());
    let mut shortened: String = title.chars().take(keep).collect();
    shortened.push_str(ELLIPSIS);
    shortened
}

pub(crate) fn prompt_query(theme: &ColorfulTheme) -> Result<String> {
    let query: String = Input::with_theme(theme)
        .with_prompt("Enter a search query")
        .interact_text()?;
    Ok(query)
}

/// Shows the result picker. `None` when the user backs out with Esc or `q`.
pub(crate) fn select_book(
    theme: &ColorfulTheme,
    books: &[BookRecord],
    config: &AppConfig,
) -> Result<Option<usize>> {
    let labels: Vec<String> = books.iter().map(|book| choice_label(book, config)).collect();
    let selection = Select::with_theme(theme)
        .with_prompt("📖 Search for a book")
        .items(&labels)
        .default(0)
        .interact_opt()?;
    Ok(selection)
}

/// Asks for the save directory and returns it with `~` expanded.
pub(crate) fn prompt_save_dir(theme: &ColorfulTheme, default: &str) -> Result<PathBuf> {
    let answer: String = Input::with_theme(theme)
        .with_prompt("Where would you like to save the book?")
        .default(default.to_string())
        .interact_text()?;
    Ok(expand_home(answer.trim()))
}
