// src/cli.rs
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Instant;

use clap::Parser;
use color_eyre::eyre::eyre;
use log::{error, info, warn};

use crate::config::{self, MonitorOptions, consts::*};
use crate::core::net::HttpFetcher;
use crate::notify::Dispatcher;
use crate::progress::ConsoleProgress;
use crate::runner::{Exit, Monitor};
use crate::store::SeenStore;

/// Watch marketplace searches and get a message once per new matching listing.
#[derive(Parser, Debug, Clone)]
#[command(name = "market_watch", version, about)]
pub struct Cli {
    /// Search profile list (JSON array).
    #[arg(long, short = 'c', default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// Optional runtime options (site, timing, attribute rules, Telegram, page selectors).
    #[arg(long, default_value = DEFAULT_OPTIONS_FILE)]
    pub options: PathBuf,

    /// Persisted set of already reported listing URLs.
    #[arg(long, default_value = DEFAULT_SEEN_FILE)]
    pub seen: PathBuf,

    /// Stop after N cycles (default: run until interrupted).
    #[arg(long, conflicts_with = "once")]
    pub cycles: Option<u64>,

    /// Run a single cycle and exit.
    #[arg(long)]
    pub once: bool,

    /// Log filter, RUST_LOG syntax.
    #[arg(long, env = "RUST_LOG", default_value = "info")]
    pub log_level: String,

    /// Append log lines to this file instead of stderr.
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    #[arg(long, env = "MARKET_WATCH_TELEGRAM_CHAT_ID")]
    pub telegram_chat_id: Option<String>,

    /// Bot tokens per priority, e.g. `1=123:abc,3=456:def`.
    #[arg(long, env = "MARKET_WATCH_TELEGRAM_TOKENS", value_parser = parse_tokens)]
    pub telegram_tokens: Option<BTreeMap<u8, String>>,

    /// Do not send the "monitor started" message.
    #[arg(long)]
    pub no_startup_message: bool,
}

impl Cli {
    pub fn cycles(&self) -> Option<u64> {
        if self.once { Some(1) } else { self.cycles }
    }

    /// Command line / environment wins over `options.json`.
    pub fn apply_overrides(&self, options: &mut MonitorOptions) {
        if let Some(chat) = &self.telegram_chat_id {
            options.telegram.chat_id = chat.clone();
        }
        if let Some(tokens) = &self.telegram_tokens {
            options.telegram.bot_tokens = tokens.clone();
        }
    }
}

fn parse_tokens(s: &str) -> Result<BTreeMap<u8, String>, String> {
    let mut out = BTreeMap::new();
    for pair in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (prio, token) = pair
            .split_once('=')
            .ok_or_else(|| format!("expected PRIORITY=TOKEN, got '{pair}'"))?;
        let prio: u8 = prio
            .trim()
            .parse()
            .map_err(|_| format!("invalid priority '{}'", prio.trim()))?;
        out.insert(prio, token.trim().to_string());
    }
    Ok(out)
}

/// Resolves on Ctrl-C; never resolves if the handler cannot be installed.
async fn interrupted() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Ctrl+C handler unavailable: {e}");
        std::future::pending::<()>().await;
    }
}

pub async fn run(cli: Cli) -> color_eyre::Result<()> {
    crate::log::init(&cli.log_level, cli.log_file.as_deref())?;
    crate::log::capture_panic_traces();
    let started = Instant::now();
    info!("--- ==== market_watch {} started ==== ---", env!("CARGO_PKG_VERSION"));

    let mut options = config::load_options(&cli.options)?;
    cli.apply_overrides(&mut options);

    let profiles = match config::load_profiles(&cli.config, options.telegram.lowest_priority()) {
        Ok(set) => set.profiles,
        Err(e) => {
            error!("{e}");
            return Err(e.into());
        }
    };

    let store = SeenStore::open(&cli.seen);
    let fetcher = HttpFetcher::new(&options.site)?;
    let dispatcher = Dispatcher::from_options(&options.telegram, &options.site.currency)?;
    let mut monitor = Monitor::new(options, profiles, Box::new(fetcher), dispatcher, store)?;

    if !cli.no_startup_message {
        monitor.announce_startup().await;
    }

    let mut progress = ConsoleProgress;
    let exit = monitor.run_until(&mut progress, cli.cycles(), interrupted()).await;
    info!(
        "--- ==== market_watch stopped (runtime {:.0}s) ==== ---",
        started.elapsed().as_secs_f64()
    );

    match exit {
        Exit::Crashed(msg) => Err(eyre!("monitor loop crashed: {msg}")),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_list_parses() {
        let t = parse_tokens("1=aaa:bbb, 3 = ccc").unwrap();
        assert_eq!(t.get(&1).map(String::as_str), Some("aaa:bbb"));
        assert_eq!(t.get(&3).map(String::as_str), Some("ccc"));
        assert!(parse_tokens("one=x").is_err());
        assert!(parse_tokens("1:x").is_err());
    }

    #[test]
    fn once_means_one_cycle() {
        let cli = Cli::try_parse_from(["market_watch", "--once"]).unwrap();
        assert_eq!(cli.cycles(), Some(1));
        assert_eq!(cli.config, PathBuf::from(DEFAULT_CONFIG_FILE));
        assert!(Cli::try_parse_from(["market_watch", "--once", "--cycles", "3"]).is_err());
    }

    #[test]
    fn overrides_replace_telegram_settings() {
        let cli = Cli::try_parse_from([
            "market_watch",
            "--telegram-chat-id",
            "777",
            "--telegram-tokens",
            "2=tok",
        ])
        .unwrap();
        let mut opts = MonitorOptions::default();
        cli.apply_overrides(&mut opts);
        assert_eq!(opts.telegram.chat_id, "777");
        assert!(opts.telegram.is_configured());
    }
}
