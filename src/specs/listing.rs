// src/specs/listing.rs
//! Extractor: one listing card → [`ListingRecord`].
//!
//! Everything here is a pure function of the card node and the compiled page spec.
//! Ambiguous input degrades to "unknown" / empty / placeholder, never to an error.

use std::fmt;

use scraper::ElementRef;
use url::Url;

use super::selectors::CompiledPageSpec;
use crate::core::html::{element_text, first_text};

/// A price, or the explicit "unknown" sentinel (distinct from 0 = free).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Price {
    Known(u64),
    Unknown,
}

impl Price {
    /// Unknown never passes a ceiling.
    pub fn is_within(self, max: u64) -> bool {
        matches!(self, Price::Known(p) if p <= max)
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Price::Known(p) => write!(f, "{p}"),
            Price::Unknown => f.write_str("unknown"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ListingRecord {
    pub title: String,
    /// Absolute, fragment-free; the listing's identity across runs and terms.
    pub url: String,
    pub price: Price,
    pub description: String,
}

/// How a card's link resolved.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Identity {
    Listing { url: String, title: String },
    /// Card points at a partner marketplace.
    External(String),
    Unparseable,
}

/// Resolve link + title for the card at 1-based `ordinal`.
pub fn extract_identity(card: ElementRef<'_>, ordinal: usize, spec: &CompiledPageSpec, base: &Url) -> Identity {
    let found = spec.link_selectors.iter().find_map(|sel| {
        card.select(sel).find_map(|a| {
            let href = a.value().attr("href")?;
            listing_url(href, spec, base).map(|url| (a, url))
        })
    });

    let Some((link, url)) = found else {
        let external = card
            .select(&spec.anchor_selector)
            .filter_map(|a| a.value().attr("href"))
            .find(|href| {
                let lc = href.to_lowercase();
                spec.external_markers.iter().any(|m| lc.contains(m.as_str()))
            });
        return match external {
            Some(href) => Identity::External(href.to_string()),
            None => Identity::Unparseable,
        };
    };

    let title = first_text(card, std::slice::from_ref(&spec.title_selector))
        .or_else(|| Some(element_text(link)).filter(|t| !t.is_empty()))
        .or_else(|| {
            link.select(&spec.img_selector)
                .filter_map(|img| img.value().attr("alt"))
                .map(str::trim)
                .find(|alt| !alt.is_empty())
                .map(str::to_string)
        })
        .unwrap_or_else(|| format!("Listing {ordinal} (title not extractable)"));

    Identity::Listing { url, title }
}

/// Absolute listing URL for `href`, if it is a same-site listing link.
fn listing_url(href: &str, spec: &CompiledPageSpec, base: &Url) -> Option<String> {
    let mut url = base.join(href.trim()).ok()?;
    if url.host_str() != base.host_str() || !url.path().starts_with(&spec.listing_path_prefix) {
        return None;
    }
    url.set_fragment(None);
    Some(url.into())
}

pub fn extract_price(card: ElementRef<'_>, spec: &CompiledPageSpec) -> Price {
    match first_text(card, &spec.price_selectors) {
        Some(text) => parse_price(&text, spec),
        None => Price::Unknown,
    }
}

/// Classify a raw price label.
///
/// free keyword → 0; negotiable keyword → unknown; otherwise the leading digit
/// run of the digits/separators left after stripping everything else. A
/// separator followed by exactly three digits (then end or another separator)
/// is a thousands group: "1.200" → 1200, "12.50" → 12.
pub fn parse_price(text: &str, spec: &CompiledPageSpec) -> Price {
    let lc = text.to_lowercase();
    if spec.free_keywords.iter().any(|k| lc.contains(k.as_str())) {
        return Price::Known(0);
    }
    if spec.negotiable_keywords.iter().any(|k| lc.contains(k.as_str())) {
        return Price::Unknown;
    }
    let cleaned: String = lc.chars().filter(|c| c.is_ascii_digit() || *c == ',' || *c == '.').collect();
    match leading_amount(&cleaned) {
        Some(p) => Price::Known(p),
        None => Price::Unknown,
    }
}

fn leading_amount(cleaned: &str) -> Option<u64> {
    let b = cleaned.as_bytes();
    let lead = b.iter().take_while(|c| c.is_ascii_digit()).count();
    if lead == 0 {
        return None;
    }
    let mut digits = cleaned[..lead].to_string();
    let mut i = lead;
    // b[i] is always a separator here; the group ends at the next one (or the end)
    while i < b.len() {
        let run = b[i + 1..].iter().take_while(|c| c.is_ascii_digit()).count();
        let end = i + 1 + run;
        if run != 3 {
            break;
        }
        digits.push_str(&cleaned[i + 1..end]);
        i = end;
    }
    digits.parse().ok()
}

/// Empty when nothing matches.
pub fn extract_description(card: ElementRef<'_>, spec: &CompiledPageSpec) -> String {
    first_text(card, &spec.description_selectors).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::html::parse_document;
    use crate::specs::selectors::{PageSpec, parse};

    fn spec() -> CompiledPageSpec {
        CompiledPageSpec::compile(&PageSpec::default()).unwrap()
    }

    fn base() -> Url {
        Url::parse("https://www.example.ch").unwrap()
    }

    #[test]
    fn price_labels() {
        let s = spec();
        assert_eq!(parse_price("CHF 1'200.-", &s), Price::Known(1200));
        assert_eq!(parse_price("Gratis", &s), Price::Known(0));
        assert_eq!(parse_price("Zu verschenken", &s), Price::Known(0));
        assert_eq!(parse_price("Preis auf Anfrage", &s), Price::Unknown);
        assert_eq!(parse_price("CHF 90.- VB", &s), Price::Unknown);
        assert_eq!(parse_price("150", &s), Price::Known(150));
        assert_eq!(parse_price("CHF 45.-", &s), Price::Known(45));
        assert_eq!(parse_price("", &s), Price::Unknown);
        assert_eq!(parse_price("CHF -.-", &s), Price::Unknown);
    }

    #[test]
    fn thousands_groups_versus_decimals() {
        let s = spec();
        assert_eq!(parse_price("1.200", &s), Price::Known(1200));
        assert_eq!(parse_price("CHF 1,200.-", &s), Price::Known(1200));
        assert_eq!(parse_price("12.50", &s), Price::Known(12));
        assert_eq!(parse_price("12,5", &s), Price::Known(12));
        assert_eq!(parse_price("1.200.50", &s), Price::Known(1200));
        assert_eq!(parse_price("1.2000", &s), Price::Known(1));
        assert_eq!(parse_price("2'450'000", &s), Price::Known(2_450_000));
    }

    #[test]
    fn unknown_price_never_fits() {
        assert!(!Price::Unknown.is_within(u64::MAX));
        assert!(Price::Known(80).is_within(80));
        assert!(!Price::Known(81).is_within(80));
    }

    fn card(html: &str) -> scraper::Html {
        parse_document(&format!(r#"<div class="card">{html}</div>"#))
    }

    fn identity(html: &str) -> Identity {
        let doc = card(html);
        let el = doc.select(&parse("div.card").unwrap()).next().unwrap();
        extract_identity(el, 3, &spec(), &base())
    }

    #[test]
    fn relative_link_with_heading() {
        let id = identity(r#"<a href="/de/vi/nike-air/123#photos"><h2> Nike   Air </h2></a>"#);
        assert_eq!(
            id,
            Identity::Listing { url: "https://www.example.ch/de/vi/nike-air/123".into(), title: "Nike Air".into() }
        );
    }

    #[test]
    fn title_falls_back_to_link_text_then_alt_then_placeholder() {
        let id = identity(r#"<a href="/de/vi/1">Lampe</a>"#);
        assert!(matches!(id, Identity::Listing { title, .. } if title == "Lampe"));
        let id = identity(r#"<a href="/de/vi/1"><img alt=" Stehlampe " src="x.jpg"></a>"#);
        assert!(matches!(id, Identity::Listing { title, .. } if title == "Stehlampe"));
        let id = identity(r#"<a href="/de/vi/1"><img src="x.jpg"></a>"#);
        assert!(matches!(id, Identity::Listing { title, .. } if title == "Listing 3 (title not extractable)"));
    }

    #[test]
    fn absolute_same_site_link_is_accepted() {
        let id = identity(r#"<a href="https://www.example.ch/de/vi/9"><h2>X</h2></a>"#);
        assert!(matches!(id, Identity::Listing { url, .. } if url == "https://www.example.ch/de/vi/9"));
    }

    #[test]
    fn external_and_unparseable_are_told_apart() {
        let id = identity(r#"<a href="https://www.ricardo.ch/de/a/777">Partner</a>"#);
        assert_eq!(id, Identity::External("https://www.ricardo.ch/de/a/777".into()));
        assert_eq!(identity(r#"<a href="/de/help">Hilfe</a>"#), Identity::Unparseable);
        assert_eq!(identity("<span>no link</span>"), Identity::Unparseable);
        // right path, wrong host
        assert_eq!(identity(r#"<a href="https://evil.example/de/vi/1">x</a>"#), Identity::Unparseable);
    }

    #[test]
    fn card_fields() {
        let doc = card(
            r#"<a href="/de/vi/5"><h2>Jacke</h2></a>
               <div class="mui-style-1fhgjcy"><span class="mui-style-1nqm73u">CHF 60.-</span></div>
               <div class="mui-style-xe4gv6"><span class="mui-style-1nqm73u">Grösse M, wie neu</span></div>"#,
        );
        let el = doc.select(&parse("div.card").unwrap()).next().unwrap();
        let spec = spec();
        assert!(matches!(extract_identity(el, 1, &spec, &base()), Identity::Listing { title, .. } if title == "Jacke"));
        assert_eq!(extract_price(el, &spec), Price::Known(60));
        assert_eq!(extract_description(el, &spec), "Grösse M, wie neu");
    }
}
