// src/pipeline.rs
//! MatchPipeline: one search term's result page → the listings worth telling about.
//!
//! Per card, in page order: identity → known? → duplicate in this page? → price →
//! (lazily) description → category attribute filter. The seen set is only read;
//! recording matches is the caller's job once delivery went through.

use std::collections::HashSet;

use log::{debug, info, warn};
use scraper::Html;
use url::Url;

use crate::config::SearchProfile;
use crate::config::profile::Priority;
use crate::core::html::has_marker;
use crate::core::sanitize::preview;
use crate::filter::AttributeFilter;
use crate::specs::listing::{self, Identity, ListingRecord};
use crate::specs::selectors::CompiledPageSpec;
use crate::store::Seen;

/// A new listing that passed every filter of a profile.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Match {
    pub profile_name: String,
    pub term: String,
    pub record: ListingRecord,
    pub priority: Priority,
}

/// What the listing-container selector found.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PageOutcome {
    Listings,
    /// Zero cards and the page says so.
    ConfirmedEmpty,
    /// Zero cards and no "no results" marker: the selectors probably broke.
    StructureChanged,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SkipStats {
    pub unparseable: usize,
    pub external: usize,
    pub known: usize,
    pub duplicate: usize,
    pub price_rejected: usize,
    pub attribute_rejected: usize,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PageReport {
    pub candidates: usize,
    pub outcome: PageOutcome,
    pub matches: Vec<Match>,
    pub skipped: SkipStats,
}

pub struct MatchPipeline<'a> {
    spec: &'a CompiledPageSpec,
    filter: &'a AttributeFilter,
    base: &'a Url,
}

impl<'a> MatchPipeline<'a> {
    pub fn new(spec: &'a CompiledPageSpec, filter: &'a AttributeFilter, base: &'a Url) -> Self {
        Self { spec, filter, base }
    }

    pub fn run(&self, page: &Html, profile: &SearchProfile, term: &str, seen: &dyn Seen) -> PageReport {
        let cards: Vec<_> = page.select(&self.spec.listing_container).collect();
        info!("    {} candidate listing element(s) on the page", cards.len());

        let mut report = PageReport {
            candidates: cards.len(),
            outcome: PageOutcome::Listings,
            matches: Vec::new(),
            skipped: SkipStats::default(),
        };

        if cards.is_empty() {
            report.outcome = if has_marker(page, &self.spec.no_results_selector, &self.spec.no_results_markers) {
                info!("    No listings (the page confirms there are no results)");
                PageOutcome::ConfirmedEmpty
            } else {
                warn!("    No listing elements and no 'no results' notice. Page structure may have changed");
                PageOutcome::StructureChanged
            };
            return report;
        }

        let mut emitted: HashSet<String> = HashSet::new();
        let stats = &mut report.skipped;

        for (i, card) in cards.into_iter().enumerate() {
            let ordinal = i + 1;
            let (url, title) = match listing::extract_identity(card, ordinal, self.spec, self.base) {
                Identity::Listing { url, title } => (url, title),
                Identity::External(href) => {
                    debug!("      #{ordinal} links to an external marketplace ({href}); skipping");
                    stats.external += 1;
                    continue;
                }
                Identity::Unparseable => {
                    warn!("      #{ordinal}: no usable listing link; skipping");
                    stats.unparseable += 1;
                    continue;
                }
            };

            if seen.contains(&url) {
                debug!("      '{title}' ({url}) already known");
                stats.known += 1;
                continue;
            }
            if emitted.contains(&url) {
                debug!("      '{title}' ({url}) listed twice on this page; skipping duplicate");
                stats.duplicate += 1;
                continue;
            }

            info!("    >> New candidate: '{title}'");
            info!("       URL: {url}");

            let price = listing::extract_price(card, self.spec);
            if !price.is_within(profile.max_price) {
                info!("      -> price filter failed ({price} vs max {})", profile.max_price);
                stats.price_rejected += 1;
                continue;
            }

            let description = listing::extract_description(card, self.spec);
            if self.filter.is_active(profile.category) {
                match self.filter.find_match(profile.category, &title, &description) {
                    Some(token) => info!("      -> {} filter ok ('{token}')", profile.category),
                    None => {
                        info!(
                            "      -> {} filter failed (none of {:?} in '{}')",
                            profile.category,
                            self.filter.targets(profile.category),
                            preview(&description, 80)
                        );
                        stats.attribute_rejected += 1;
                        continue;
                    }
                }
            }

            emitted.insert(url.clone());
            report.matches.push(Match {
                profile_name: profile.name.clone(),
                term: term.to_string(),
                record: ListingRecord { title, url, price, description },
                priority: profile.priority,
            });
        }

        report
    }
}
