// src/config/profile.rs
//
// Search profiles: the operator's monitoring intents.
// The file is read as loose JSON and validated entry by entry so that one
// broken profile never stops the others from running.

use std::fmt;

use log::warn;
use serde_json::{Map, Value};
use thiserror::Error;

use super::ConfigError;
use super::consts::{HIGHEST_PRIORITY, LOWEST_PRIORITY};
use crate::filter::Category;

/// Notification tier. 1 is the most important channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Priority(u8);

impl Priority {
    pub const HIGHEST: Priority = Priority(HIGHEST_PRIORITY);
    pub const LOWEST: Priority = Priority(LOWEST_PRIORITY);

    pub fn new(ordinal: u8) -> Self { Self(ordinal) }
    pub fn ordinal(self) -> u8 { self.0 }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One validated monitoring intent. Immutable for the lifetime of a run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SearchProfile {
    pub name: String,
    pub category: Category,
    pub max_price: u64,
    /// Never empty; every term is trimmed and non-blank.
    pub search_terms: Vec<String>,
    pub priority: Priority,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProfileError {
    #[error("entry is not a JSON object")]
    NotAnObject,
    #[error("no 'max_price' defined")]
    MissingMaxPrice,
    #[error("invalid 'max_price' ({0}); expected a non-negative whole number")]
    InvalidMaxPrice(String),
    #[error("'search_terms' must be a non-empty list")]
    MissingSearchTerms,
    #[error("'search_terms' contains invalid or empty entries")]
    InvalidSearchTerm,
    #[error("unknown type {0}")]
    UnknownCategory(String),
}

/// Result of validating a profile list.
#[derive(Clone, Debug, Default)]
pub struct ProfileSet {
    pub profiles: Vec<SearchProfile>,
    pub skipped: usize,
}

/// Validate every entry of the top-level array. Invalid entries are logged and skipped.
/// Profiles without a usable `priority` get `lowest`.
pub fn parse_profiles(value: &Value, lowest: Priority) -> Result<ProfileSet, ConfigError> {
    let entries = value.as_array().ok_or(ConfigError::NotAList { found: json_kind(value) })?;

    let mut set = ProfileSet::default();
    for (i, entry) in entries.iter().enumerate() {
        let name = profile_name(entry, i);
        match parse_profile(entry, i, lowest) {
            Ok(profile) => set.profiles.push(profile),
            Err(e) => {
                warn!("Skipping profile '{name}': {e}");
                set.skipped += 1;
            }
        }
    }
    Ok(set)
}

/// Validate one profile object. `index` is its 0-based position in the file.
pub fn parse_profile(entry: &Value, index: usize, lowest: Priority) -> Result<SearchProfile, ProfileError> {
    let obj = entry.as_object().ok_or(ProfileError::NotAnObject)?;
    let name = profile_name(entry, index);

    let category = match obj.get("type") {
        None | Some(Value::Null) => Category::Generic,
        Some(Value::String(s)) => s
            .parse::<Category>()
            .map_err(|_| ProfileError::UnknownCategory(format!("'{s}'")))?,
        Some(other) => return Err(ProfileError::UnknownCategory(other.to_string())),
    };

    let max_price = parse_max_price(obj)?;
    let search_terms = parse_search_terms(obj)?;
    let priority = parse_priority(obj, &name, lowest);

    Ok(SearchProfile { name, category, max_price, search_terms, priority })
}

fn profile_name(entry: &Value, index: usize) -> String {
    entry
        .get("name")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("Unnamed profile #{}", index + 1))
}

fn parse_max_price(obj: &Map<String, Value>) -> Result<u64, ProfileError> {
    let raw = match obj.get("max_price") {
        None | Some(Value::Null) => return Err(ProfileError::MissingMaxPrice),
        Some(v) => v,
    };
    let invalid = || ProfileError::InvalidMaxPrice(raw.to_string());
    match raw {
        Value::Number(n) => {
            if let Some(v) = n.as_u64() {
                return Ok(v);
            }
            // 150.0 is fine, 149.5 and -1 are not
            match n.as_f64() {
                Some(f) if f >= 0.0 && f.fract() == 0.0 && f <= u64::MAX as f64 => Ok(f as u64),
                _ => Err(invalid()),
            }
        }
        Value::String(s) => s.trim().parse::<u64>().map_err(|_| invalid()),
        _ => Err(invalid()),
    }
}

fn parse_search_terms(obj: &Map<String, Value>) -> Result<Vec<String>, ProfileError> {
    let list = match obj.get("search_terms") {
        Some(Value::Array(list)) if !list.is_empty() => list,
        _ => return Err(ProfileError::MissingSearchTerms),
    };
    list.iter()
        .map(|term| match term.as_str().map(str::trim) {
            Some(t) if !t.is_empty() => Ok(t.to_string()),
            _ => Err(ProfileError::InvalidSearchTerm),
        })
        .collect()
}

/// Priority is optional; anything unusable falls back to the lowest tier.
fn parse_priority(obj: &Map<String, Value>, name: &str, lowest: Priority) -> Priority {
    let raw = match obj.get("priority") {
        None | Some(Value::Null) => return lowest,
        Some(v) => v,
    };
    let ordinal = match raw {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    };
    match ordinal.and_then(|v| u8::try_from(v).ok()).filter(|v| *v >= HIGHEST_PRIORITY) {
        Some(v) => Priority::new(v),
        None => {
            warn!("Profile '{name}': invalid 'priority' ({raw}); using {lowest}");
            lowest
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}
