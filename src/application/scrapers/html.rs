//! Text helpers shared by the HTML-scraped platforms.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

static WHITESPACE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+").expect("whitespace pattern is valid"));

/// Parse a selector literal. Only used for compile-time constants.
pub(crate) fn selector(css: &'static str) -> Selector {
    Selector::parse(css).expect("static selector is valid")
}

/// All visible text of an element with whitespace collapsed to single spaces.
pub(crate) fn element_text(element: ElementRef<'_>) -> String {
    let joined = element.text().collect::<Vec<_>>().join(" ");
    WHITESPACE.replace_all(joined.trim(), " ").into_owned()
}

/// Flattened text of the whole document, used as the regex fallback surface.
pub(crate) fn document_text(document: &Html) -> String {
    element_text(document.root_element())
}

/// Text of the first element matching `selector`, if it has any.
pub(crate) fn select_text(document: &Html, selector: &Selector) -> Option<String> {
    document
        .select(selector)
        .map(element_text)
        .find(|text| !text.is_empty())
}

/// First integer in `text`, tolerating thousands separators (`1,234`).
pub(crate) fn first_number(text: &str) -> Option<u64> {
    let digits: String = text
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit() || *c == ',')
        .filter(char::is_ascii_digit)
        .collect();
    digits.parse().ok()
}

/// First capture group of `pattern` in `text`, parsed as an integer.
pub(crate) fn capture_number(pattern: &Regex, text: &str) -> Option<u64> {
    pattern
        .captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| first_number(m.as_str()))
}

pub(crate) fn clamp_u32(value: u64) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_number_skips_prefix_and_separators() {
        assert_eq!(first_number("Global Rank: 12,345"), Some(12_345));
        assert_eq!(first_number("1783?"), Some(1783));
        assert_eq!(first_number("Inactive"), None);
    }

    #[test]
    fn document_text_collapses_whitespace() {
        let html = Html::parse_document("<div>\n  Coding   Score </div><div>\t321</div>");
        assert_eq!(document_text(&html), "Coding Score 321");
    }

    #[test]
    fn capture_number_reads_first_group() {
        let pattern = Regex::new(r"Total Problems Solved:\s*([\d,]+)").unwrap();
        assert_eq!(
            capture_number(&pattern, "Total Problems Solved: 1,024 more"),
            Some(1024)
        );
        assert_eq!(capture_number(&pattern, "nothing here"), None);
    }
}
