// src/specs/mod.rs
//! # Page specs
//!
//! Everything that knows *where the ground truth lives in the HTML* of the
//! marketplace's search-results page.
//!
//! ## What lives here
//! - `selectors`: the data table ([`selectors::PageSpec`]) of container, link, price and
//!   description selectors plus the keyword lists used to read price labels, and its
//!   compiled form. Selector chains are ordered most specific first.
//! - `listing`: the Extractor. One card node in, one [`listing::ListingRecord`] (or a
//!   classified skip: external / unparseable) out. Pure; no logging of its own beyond
//!   what the caller decides.
//!
//! ## What does **not** live here
//! - Fetching the page (`core::net`), dedup state (`store`), filter policy
//!   (`pipeline`, `filter`).
//!
//! ## Testing notes
//! - Specs are tested offline against captured fixtures (`tests/fixtures/*.html`).
//! - Keep selectors resilient to whitespace, attribute order and harmless markup noise.
//!
//! In short: **`specs` knows how to read the page.** Other layers decide what to
//! keep, whom to tell and when to look again.
pub mod listing;
pub mod selectors;

pub use listing::{Identity, ListingRecord, Price};
pub use selectors::{CompiledPageSpec, PageSpec, SpecError};
