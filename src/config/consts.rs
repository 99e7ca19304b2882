// src/config/consts.rs

// Files
pub const DEFAULT_CONFIG_FILE: &str = "monitoring_config.json";
pub const DEFAULT_OPTIONS_FILE: &str = "options.json";
pub const DEFAULT_SEEN_FILE: &str = "seen_items.json";
pub const TEMPLATE_SUFFIX: &str = ".example";

// Site
pub const BASE_URL: &str = "https://www.deine_gebrauchtplatform.ch";
pub const SEARCH_PATH: &str = "/de/q?query={query}";
pub const QUERY_PLACEHOLDER: &str = "{query}";
pub const LISTING_PATH_PREFIX: &str = "/de/vi/";
pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";
pub const REQUEST_TIMEOUT_SECS: u64 = 20;
pub const CURRENCY: &str = "CHF";

// Timing
pub const CHECK_INTERVAL_SECS: u64 = 1800;
pub const INTER_REQUEST_DELAY_MS: u64 = 1500;
pub const INTER_PROFILE_DELAY_MS: u64 = 3000;
pub const ERROR_DELAY_MS: u64 = 5000;

// Notifications
pub const TELEGRAM_API_BASE: &str = "https://api.telegram.org";
pub const TELEGRAM_TIMEOUT_SECS: u64 = 15;
pub const PLACEHOLDER_PREFIX: &str = "YOUR_";

// Priority tiers: 1 = most important, 3 = least important
pub const HIGHEST_PRIORITY: u8 = 1;
pub const LOWEST_PRIORITY: u8 = 3;
