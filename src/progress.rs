// src/progress.rs
use crate::pipeline::Match;
use crate::specs::listing::Price;

/// Lightweight progress reporting used by the monitoring loop.
/// Frontends implement this to surface status; all methods default to no-ops.
pub trait Progress {
    /// Start of cycle `n` (1-based).
    fn cycle_begin(&mut self, _cycle: u64) {}

    /// A new match was found (before it is dispatched).
    fn matched(&mut self, _m: &Match, _currency: &str) {}

    /// One search term finished; `matches` counts what it produced.
    fn term_done(&mut self, _profile: &str, _term: &str, _matches: usize) {}

    /// End of a cycle with the number of newly recorded listings.
    fn cycle_finish(&mut self, _cycle: u64, _recorded: usize) {}
}

/// A no-op progress sink.
pub struct NullProgress;
impl Progress for NullProgress {}

/// Prints a green banner per match to stdout.
pub struct ConsoleProgress;

const GREEN: &str = "\x1b[92m";
const RESET: &str = "\x1b[0m";

impl Progress for ConsoleProgress {
    fn matched(&mut self, m: &Match, currency: &str) {
        let price = match m.record.price {
            Price::Known(p) => format!("{p} {currency}"),
            Price::Unknown => "n/a".to_string(),
        };
        let line = "=".repeat(60);
        println!(
            "\n{GREEN}{line}\n  MATCH for '{}' (priority {})\n  Title: {}\n  Price: {price}\n  URL:   {}\n{line}{RESET}\n",
            m.profile_name, m.priority, m.record.title, m.record.url
        );
    }
}
