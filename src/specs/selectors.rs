// src/specs/selectors.rs
//! Data-driven page description for the search-results page.
//!
//! Every selector chain is ordered most specific first; the first chain entry
//! yielding a non-empty result wins. Page-format drift is patched here (or in the
//! `page` section of `options.json`), not in the extraction logic.

use scraper::Selector;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::consts::LISTING_PATH_PREFIX;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid selector '{selector}': {message}")]
pub struct SpecError {
    pub selector: String,
    pub message: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageSpec {
    /// One match per listing card.
    pub listing_container: String,
    pub listing_path_prefix: String,
    pub link_selectors: Vec<String>,
    pub title_selector: String,
    pub price_selectors: Vec<String>,
    pub description_selectors: Vec<String>,
    /// Hosts of partner marketplaces whose cards are skipped as "external".
    pub external_markers: Vec<String>,
    pub no_results_selector: String,
    pub no_results_markers: Vec<String>,
    pub free_keywords: Vec<String>,
    pub negotiable_keywords: Vec<String>,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for PageSpec {
    fn default() -> Self {
        Self {
            listing_container: "div.mui-style-qlw8p1".into(),
            listing_path_prefix: LISTING_PATH_PREFIX.into(),
            link_selectors: strings(&[
                r#"a[href^="/de/vi/"]"#,
                r#"h2 a[href^="/de/vi/"]"#,
                r#"a[href*="/de/vi/"]"#,
            ]),
            title_selector: "h2".into(),
            price_selectors: strings(&[
                "div.mui-style-1fhgjcy span.mui-style-1nqm73u",
                r#"span[class*="price"]"#,
                r#"div[class*="price"]"#,
            ]),
            description_selectors: strings(&[
                "div.mui-style-xe4gv6 span.mui-style-1nqm73u",
                "div.mui-style-xe4gv6",
                r#"p[class*="description"]"#,
                r#"div[class*="description"]"#,
            ]),
            external_markers: strings(&["ricardo.ch", "anibis.ch"]),
            no_results_selector: "div, p, h3, span".into(),
            no_results_markers: strings(&["keine resultate", "no results"]),
            free_keywords: strings(&["gratis", "free", "kostenlos", "zu verschenken"]),
            negotiable_keywords: strings(&[
                "anfrage", "vb", "verhandelbar", "verhandlung", "on request", "negotiable", "obo",
            ]),
        }
    }
}

/// [`PageSpec`] with every selector parsed. Keyword tables are lowercased once.
#[derive(Debug, Clone)]
pub struct CompiledPageSpec {
    pub listing_container: Selector,
    pub listing_path_prefix: String,
    pub link_selectors: Vec<Selector>,
    pub title_selector: Selector,
    pub img_selector: Selector,
    pub anchor_selector: Selector,
    pub price_selectors: Vec<Selector>,
    pub description_selectors: Vec<Selector>,
    pub external_markers: Vec<String>,
    pub no_results_selector: Selector,
    pub no_results_markers: Vec<String>,
    pub free_keywords: Vec<String>,
    pub negotiable_keywords: Vec<String>,
}

impl CompiledPageSpec {
    pub fn compile(spec: &PageSpec) -> Result<Self, SpecError> {
        Ok(Self {
            listing_container: parse(&spec.listing_container)?,
            listing_path_prefix: spec.listing_path_prefix.clone(),
            link_selectors: parse_all(&spec.link_selectors)?,
            title_selector: parse(&spec.title_selector)?,
            img_selector: parse("img[alt]")?,
            anchor_selector: parse("a[href]")?,
            price_selectors: parse_all(&spec.price_selectors)?,
            description_selectors: parse_all(&spec.description_selectors)?,
            external_markers: lowered(&spec.external_markers),
            no_results_selector: parse(&spec.no_results_selector)?,
            no_results_markers: lowered(&spec.no_results_markers),
            free_keywords: lowered(&spec.free_keywords),
            negotiable_keywords: lowered(&spec.negotiable_keywords),
        })
    }
}

pub fn parse(css: &str) -> Result<Selector, SpecError> {
    Selector::parse(css).map_err(|e| SpecError { selector: css.to_string(), message: e.to_string() })
}

fn parse_all(list: &[String]) -> Result<Vec<Selector>, SpecError> {
    list.iter().map(|s| parse(s)).collect()
}

fn lowered(list: &[String]) -> Vec<String> {
    list.iter()
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_spec_compiles() {
        let c = CompiledPageSpec::compile(&PageSpec::default()).unwrap();
        assert_eq!(c.link_selectors.len(), 3);
        assert_eq!(c.description_selectors.len(), 4);
        assert!(c.negotiable_keywords.contains(&"on request".to_string()));
    }

    #[test]
    fn broken_selector_is_reported_by_name() {
        let spec = PageSpec { title_selector: "h2[".into(), ..PageSpec::default() };
        let err = CompiledPageSpec::compile(&spec).unwrap_err();
        assert_eq!(err.selector, "h2[");
    }

    #[test]
    fn partial_page_section_keeps_defaults() {
        let spec: PageSpec = serde_json::from_str(r#"{ "listing_container": "article" }"#).unwrap();
        assert_eq!(spec.listing_container, "article");
        assert_eq!(spec.title_selector, "h2");
    }
}
