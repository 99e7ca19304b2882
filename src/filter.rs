// src/filter.rs
//! Category-specific attribute filter.
//!
//! A heuristic whole-word search over `title + description`: a listing passes when
//! any configured target token (size, chip generation, ...) appears, optionally
//! glued to a unit/label prefix such as "Gr." or "EU". False positives and
//! negatives are expected; a miss is a normal filter outcome, never an error.

use std::fmt;
use std::str::FromStr;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::options::{AttributeRules, CategoryRule};

/// Closed set of profile categories; each one selects its own matching strategy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    #[default]
    Generic,
    Shoes,
    Clothing,
    Laptop,
}

impl Category {
    pub fn as_str(self) -> &'static str {
        match self {
            Category::Generic => "generic",
            Category::Shoes => "shoes",
            Category::Clothing => "clothing",
            Category::Laptop => "laptop",
        }
    }

    /// Shoe sizes must not run into further digits ("42" inside "42.5" or "425").
    fn trailing_guard(self) -> TrailingGuard {
        match self {
            Category::Shoes => TrailingGuard::NoFollowingDigit,
            _ => TrailingGuard::None,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownCategory(pub String);

impl fmt::Display for UnknownCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown category '{}'", self.0)
    }
}

impl std::error::Error for UnknownCategory {}

impl FromStr for Category {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "generic" | "global" => Ok(Category::Generic),
            "shoes" => Ok(Category::Shoes),
            "clothing" => Ok(Category::Clothing),
            "laptop" | "macbook" => Ok(Category::Laptop),
            _ => Err(UnknownCategory(s.to_string())),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum TrailingGuard {
    None,
    NoFollowingDigit,
}

impl TrailingGuard {
    fn allows(self, rest: &str) -> bool {
        match self {
            TrailingGuard::None => true,
            TrailingGuard::NoFollowingDigit => {
                let mut chars = rest.chars();
                match chars.next() {
                    Some(c) if c.is_ascii_digit() => false,
                    Some('.') | Some(',') => !chars.next().is_some_and(|c| c.is_ascii_digit()),
                    _ => true,
                }
            }
        }
    }
}

/// One compiled target token.
#[derive(Debug, Clone)]
struct TargetMatcher {
    token: String,
    regex: Regex,
    guard: TrailingGuard,
}

impl TargetMatcher {
    fn new(token: &str, prefixes: &[String], guard: TrailingGuard) -> Result<Self, regex::Error> {
        Ok(Self { token: token.to_string(), regex: Regex::new(&token_pattern(token, prefixes))?, guard })
    }

    fn is_match(&self, text: &str) -> bool {
        self.regex.find_iter(text).any(|m| self.guard.allows(&text[m.end()..]))
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// `\b(?:(?:prefix|...)\s*)?tok\s*en\b`, case-insensitive.
/// Internal whitespace of the token matches any amount of whitespace (including none).
fn token_pattern(token: &str, prefixes: &[String]) -> String {
    let body = token.split_whitespace().map(regex::escape).collect::<Vec<_>>().join(r"\s*");

    let mut alts: Vec<String> = prefixes
        .iter()
        .map(|p| p.trim().to_lowercase())
        .filter(|p| !p.is_empty())
        .map(|p| regex::escape(&p))
        .collect();
    // longest first so "gr." wins over "gr"
    alts.sort_by(|a, b| b.len().cmp(&a.len()));
    let prefix = if alts.is_empty() { String::new() } else { format!(r"(?:(?:{})\s*)?", alts.join("|")) };

    let lead = if token.chars().next().is_some_and(is_word_char) { r"\b" } else { "" };
    let trail = if token.chars().last().is_some_and(is_word_char) { r"\b" } else { "" };
    format!("(?i){lead}{prefix}{body}{trail}")
}

/// Compiled per-category matchers. Built once from [`AttributeRules`].
#[derive(Debug, Clone)]
pub struct AttributeFilter {
    shoes: Vec<TargetMatcher>,
    clothing: Vec<TargetMatcher>,
    laptop: Vec<TargetMatcher>,
}

impl AttributeFilter {
    pub fn new(rules: &AttributeRules) -> Result<Self, regex::Error> {
        Ok(Self {
            shoes: compile(&rules.shoes, Category::Shoes)?,
            clothing: compile(&rules.clothing, Category::Clothing)?,
            laptop: compile(&rules.laptop, Category::Laptop)?,
        })
    }

    fn matchers(&self, category: Category) -> &[TargetMatcher] {
        match category {
            Category::Generic => &[],
            Category::Shoes => &self.shoes,
            Category::Clothing => &self.clothing,
            Category::Laptop => &self.laptop,
        }
    }

    /// Whether this category filters at all.
    pub fn is_active(&self, category: Category) -> bool {
        !self.matchers(category).is_empty()
    }

    pub fn targets(&self, category: Category) -> Vec<&str> {
        self.matchers(category).iter().map(|m| m.token.as_str()).collect()
    }

    /// First target token found in `title + description`, if any.
    pub fn find_match(&self, category: Category, title: &str, description: &str) -> Option<&str> {
        let text = format!("{title} {description}").to_lowercase();
        self.matchers(category)
            .iter()
            .find(|m| m.is_match(&text))
            .map(|m| m.token.as_str())
    }

    /// No targets ⇒ always true. Otherwise true when any target is present.
    pub fn matches(&self, category: Category, title: &str, description: &str) -> bool {
        !self.is_active(category) || self.find_match(category, title, description).is_some()
    }
}

fn compile(rule: &CategoryRule, category: Category) -> Result<Vec<TargetMatcher>, regex::Error> {
    let guard = category.trailing_guard();
    rule.targets
        .iter()
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .map(|t| TargetMatcher::new(&t, &rule.prefixes, guard))
        .collect()
}
