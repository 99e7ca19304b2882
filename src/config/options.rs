// src/config/options.rs
use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::consts::*;
use super::profile::Priority;
use crate::specs::selectors::PageSpec;

/// Everything the pipeline and loop need besides the profile list.
/// Built once at startup and handed to the constructors; every section
/// falls back to its defaults so a partial `options.json` is fine.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorOptions {
    pub site: SiteOptions,
    pub timing: TimingOptions,
    pub attributes: AttributeRules,
    pub telegram: TelegramOptions,
    pub page: PageSpec,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteOptions {
    pub base_url: String,
    /// Path + query template; `{query}` is replaced by the encoded search term.
    pub search_path: String,
    pub user_agent: String,
    pub request_timeout_secs: u64,
    pub currency: String,
}

impl Default for SiteOptions {
    fn default() -> Self {
        Self {
            base_url: BASE_URL.to_string(),
            search_path: SEARCH_PATH.to_string(),
            user_agent: USER_AGENT.to_string(),
            request_timeout_secs: REQUEST_TIMEOUT_SECS,
            currency: CURRENCY.to_string(),
        }
    }
}

impl SiteOptions {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingOptions {
    pub check_interval_secs: u64,
    pub inter_request_delay_ms: u64,
    pub inter_profile_delay_ms: u64,
    pub error_delay_ms: u64,
}

impl Default for TimingOptions {
    fn default() -> Self {
        Self {
            check_interval_secs: CHECK_INTERVAL_SECS,
            inter_request_delay_ms: INTER_REQUEST_DELAY_MS,
            inter_profile_delay_ms: INTER_PROFILE_DELAY_MS,
            error_delay_ms: ERROR_DELAY_MS,
        }
    }
}

impl TimingOptions {
    /// No waiting at all. Used by tests and one-shot runs.
    pub fn immediate() -> Self {
        Self {
            check_interval_secs: 0,
            inter_request_delay_ms: 0,
            inter_profile_delay_ms: 0,
            error_delay_ms: 0,
        }
    }

    /// Idle time between the end of one cycle and the start of the next.
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }

    pub fn inter_request_delay(&self) -> Duration {
        Duration::from_millis(self.inter_request_delay_ms)
    }

    pub fn inter_profile_delay(&self) -> Duration {
        Duration::from_millis(self.inter_profile_delay_ms)
    }

    /// Elevated pause after a term failed unexpectedly.
    pub fn error_delay(&self) -> Duration {
        Duration::from_millis(self.error_delay_ms)
    }
}

/// Target tokens plus the unit/label words that may directly precede them.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CategoryRule {
    pub targets: Vec<String>,
    pub prefixes: Vec<String>,
}

impl CategoryRule {
    fn new(targets: &[&str], prefixes: &[&str]) -> Self {
        Self {
            targets: targets.iter().map(|s| s.to_string()).collect(),
            prefixes: prefixes.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Per-category attribute rules. `generic` has no entry: it never filters.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttributeRules {
    pub shoes: CategoryRule,
    pub clothing: CategoryRule,
    pub laptop: CategoryRule,
}

impl Default for AttributeRules {
    fn default() -> Self {
        Self {
            shoes: CategoryRule::new(
                &["42", "42.5", "42 2/3", "42. 2/3"],
                &["gr.", "gr", "eur", "eu", "size", "größe", "grösse", "groesse", "us", "uk", "fr"],
            ),
            clothing: CategoryRule::new(
                &["m", "s"],
                &["size", "gr.", "gr", "größe", "grösse", "groesse", "taille", "taglia"],
            ),
            laptop: CategoryRule::new(&["m1", "m2", "m3", "m4"], &[]),
        }
    }
}

impl AttributeRules {
    /// Same rules with every target list cleared; handy for tests.
    pub fn none() -> Self {
        Self {
            shoes: CategoryRule::default(),
            clothing: CategoryRule::default(),
            laptop: CategoryRule::default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramOptions {
    pub chat_id: String,
    /// Priority ordinal -> bot token. Lower ordinal = more important channel.
    pub bot_tokens: BTreeMap<u8, String>,
    pub api_base: String,
    pub timeout_secs: u64,
}

impl Default for TelegramOptions {
    fn default() -> Self {
        Self {
            chat_id: String::new(),
            bot_tokens: BTreeMap::new(),
            api_base: TELEGRAM_API_BASE.to_string(),
            timeout_secs: TELEGRAM_TIMEOUT_SECS,
        }
    }
}

impl TelegramOptions {
    /// A chat id that is set (and not the template placeholder) plus at least one real token.
    pub fn is_configured(&self) -> bool {
        let chat = self.chat_id.trim();
        !chat.is_empty() && !chat.starts_with(PLACEHOLDER_PREFIX) && self.bot_tokens.values().any(|t| is_real_token(t))
    }

    /// Least important tier with a real token; the default tier without any.
    pub fn lowest_priority(&self) -> Priority {
        self.bot_tokens
            .iter()
            .filter(|(ordinal, token)| **ordinal >= HIGHEST_PRIORITY && is_real_token(token))
            .map(|(ordinal, _)| *ordinal)
            .max()
            .map_or(Priority::LOWEST, Priority::new)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn is_real_token(token: &str) -> bool {
    !token.trim().is_empty() && !token.starts_with(PLACEHOLDER_PREFIX)
}
