// src/core/html.rs
use scraper::{ElementRef, Html, Selector};

use super::sanitize::normalize_ws;

pub fn parse_document(body: &str) -> Html {
    Html::parse_document(body)
}

/// All descendant text, whitespace collapsed and trimmed.
pub fn element_text(el: ElementRef<'_>) -> String {
    normalize_ws(&el.text().collect::<String>())
}

/// Walk an ordered selector chain and return the first non-empty text.
/// Each selector contributes only its first match inside `el`.
pub fn first_text(el: ElementRef<'_>, chain: &[Selector]) -> Option<String> {
    chain.iter().find_map(|sel| {
        let text = element_text(el.select(sel).next()?);
        (!text.is_empty()).then_some(text)
    })
}

/// Does any element picked by `sel` carry one of the (lowercase) markers?
pub fn has_marker(doc: &Html, sel: &Selector, markers: &[String]) -> bool {
    if markers.is_empty() {
        return false;
    }
    doc.select(sel).any(|el| {
        let text = element_text(el).to_lowercase();
        markers.iter().any(|m| text.contains(m.as_str()))
    })
}
