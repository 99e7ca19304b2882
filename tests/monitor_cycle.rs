// tests/monitor_cycle.rs
//
// Drives whole cycles with a scripted fetcher and a recording notifier.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use market_watch::config::options::TimingOptions;
use market_watch::config::profile::{Priority, parse_profiles};
use market_watch::core::net::{FetchError, Fetcher};
use market_watch::notify::{NotifyError, OutboundMessage};
use market_watch::progress::{NullProgress, Progress};
use market_watch::runner::{Exit, TermOutcome};
use market_watch::store::{SeenStore, load_seen};
use market_watch::{Dispatcher, Match, Monitor, MonitorOptions, Notifier, SearchProfile};

const SEARCH_RESULTS: &str = include_str!("fixtures/search_results.html");
const NO_RESULTS: &str = include_str!("fixtures/no_results.html");

/// Serves canned pages per term. `None` = timeout, "boom" panics.
#[derive(Clone, Default)]
struct ScriptedFetcher {
    pages: HashMap<String, Option<String>>,
    calls: Arc<Mutex<Vec<String>>>,
    /// When set, the seen file's size is sampled on every fetch.
    watch: Option<PathBuf>,
    on_disk: Arc<Mutex<Vec<usize>>>,
}

impl ScriptedFetcher {
    fn page(mut self, term: &str, body: &str) -> Self {
        self.pages.insert(term.to_string(), Some(body.to_string()));
        self
    }

    fn down(mut self, term: &str) -> Self {
        self.pages.insert(term.to_string(), None);
        self
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    async fn fetch(&self, term: &str) -> Result<String, FetchError> {
        self.calls.lock().unwrap().push(term.to_string());
        if let Some(path) = &self.watch {
            self.on_disk.lock().unwrap().push(load_seen(path).len());
        }
        if term == "boom" {
            panic!("selector engine exploded");
        }
        match self.pages.get(term) {
            Some(Some(body)) => Ok(body.clone()),
            Some(None) => Err(FetchError::Timeout(term.to_string())),
            None => Ok(NO_RESULTS.to_string()),
        }
    }
}

#[derive(Clone, Default)]
struct RecordingNotifier {
    sent: Arc<Mutex<Vec<OutboundMessage>>>,
    failing: Arc<AtomicBool>,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn deliver(&self, message: &OutboundMessage) -> Result<(), NotifyError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(NotifyError::Timeout);
        }
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }
}

#[derive(Default)]
struct MatchLog(Vec<String>);

impl Progress for MatchLog {
    fn matched(&mut self, m: &Match, _currency: &str) {
        self.0.push(format!("{}|{}", m.profile_name, m.record.url));
    }
}

fn options() -> MonitorOptions {
    let mut o = MonitorOptions::default();
    o.site.base_url = "https://www.example.ch".into();
    o.timing = TimingOptions::immediate();
    o
}

fn profiles(value: serde_json::Value) -> Vec<SearchProfile> {
    parse_profiles(&value, Priority::LOWEST).unwrap().profiles
}

fn monitor(
    profiles: Vec<SearchProfile>,
    fetcher: ScriptedFetcher,
    notifier: &RecordingNotifier,
    seen: &Path,
) -> Monitor {
    let dispatcher = Dispatcher::new(Box::new(notifier.clone()), "CHF");
    Monitor::new(options(), profiles, Box::new(fetcher), dispatcher, SeenStore::open(seen)).unwrap()
}

#[tokio::test]
async fn profiles_and_terms_are_visited_in_configuration_order() {
    let dir = tempfile::tempdir().unwrap();
    let fetcher = ScriptedFetcher::default();
    let notifier = RecordingNotifier::default();
    let list = profiles(json!([
        { "name": "A", "max_price": 10, "search_terms": ["a1", "a2"] },
        { "name": "B", "max_price": 10, "search_terms": ["b1"] },
        { "name": "C", "max_price": 10, "search_terms": ["c1", "c2", "c3"] }
    ]));
    let mut m = monitor(list, fetcher.clone(), &notifier, &dir.path().join("seen.json"));

    let summary = m.run_cycle(&mut NullProgress).await;
    assert_eq!(fetcher.calls(), vec!["a1", "a2", "b1", "c1", "c2", "c3"]);
    assert_eq!(summary.cycle, 1);
    assert_eq!(summary.recorded, 0);
    assert!(notifier.sent.lock().unwrap().is_empty());
}

#[tokio::test]
async fn invalid_profile_is_skipped_while_the_rest_run() {
    let dir = tempfile::tempdir().unwrap();
    let fetcher = ScriptedFetcher::default().page("lampe", SEARCH_RESULTS);
    let notifier = RecordingNotifier::default();
    let list = profiles(json!([
        { "name": "no ceiling", "search_terms": ["broken"] },
        { "name": "Lampen", "type": "generic", "max_price": 100, "search_terms": ["lampe"] }
    ]));
    assert_eq!(list.len(), 1);

    let mut m = monitor(list, fetcher.clone(), &notifier, &dir.path().join("seen.json"));
    let summary = m.run_cycle(&mut NullProgress).await;
    assert_eq!(fetcher.calls(), vec!["lampe"]);
    assert_eq!(summary.recorded, 4);
    assert_eq!(notifier.sent.lock().unwrap().len(), 4);
}

#[tokio::test]
async fn matches_are_notified_recorded_and_saved_per_term() {
    let dir = tempfile::tempdir().unwrap();
    let seen = dir.path().join("seen.json");
    let fetcher = ScriptedFetcher { watch: Some(seen.clone()), ..ScriptedFetcher::default() }
        .page("sneaker 42", SEARCH_RESULTS)
        .page("sneaker 42 gratis", SEARCH_RESULTS);
    let notifier = RecordingNotifier::default();
    let list = profiles(json!([
        { "name": "Sneakers", "type": "shoes", "max_price": 100,
          "search_terms": ["sneaker 42", "sneaker 42 gratis"], "priority": 1 }
    ]));

    let mut m = monitor(list, fetcher.clone(), &notifier, &seen);
    let mut log = MatchLog::default();
    let summary = m.run_cycle(&mut log).await;

    // the second term sees the same page, but its matches are known by then
    assert_eq!(summary.recorded, 3);
    assert_eq!(log.0.len(), 3);
    // the first term's matches were on disk before the second fetch
    assert_eq!(*fetcher.on_disk.lock().unwrap(), vec![0, 3]);
    assert_eq!(load_seen(&seen).len(), 3);

    let sent = notifier.sent.lock().unwrap().clone();
    assert!(sent.iter().all(|msg| msg.priority.ordinal() == 1));
    assert!(sent[0].text.starts_with("[Nike Air Max 90]:\n[80 CHF]\n\n"));
    assert!(sent[1].text.contains("[free]"));
}

#[tokio::test]
async fn failed_delivery_is_retried_next_cycle() {
    let dir = tempfile::tempdir().unwrap();
    let seen = dir.path().join("seen.json");
    let fetcher = ScriptedFetcher::default().page("sneaker", SEARCH_RESULTS);
    let notifier = RecordingNotifier::default();
    notifier.failing.store(true, Ordering::SeqCst);
    let list = profiles(json!([
        { "name": "Sneakers", "type": "shoes", "max_price": 100, "search_terms": ["sneaker"] }
    ]));
    let mut m = monitor(list, fetcher, &notifier, &seen);

    let first = m.run_cycle(&mut NullProgress).await;
    assert_eq!(first.recorded, 0);
    assert!(load_seen(&seen).is_empty());

    notifier.failing.store(false, Ordering::SeqCst);
    let second = m.run_cycle(&mut NullProgress).await;
    assert_eq!(second.recorded, 3);
    assert_eq!(notifier.sent.lock().unwrap().len(), 3);

    // and never again
    let third = m.run_cycle(&mut NullProgress).await;
    assert_eq!(third.recorded, 0);
    assert_eq!(notifier.sent.lock().unwrap().len(), 3);
    assert_eq!(m.cycles_done(), 3);
}

#[tokio::test]
async fn fetch_errors_and_panics_do_not_stop_the_cycle() {
    let dir = tempfile::tempdir().unwrap();
    let fetcher = ScriptedFetcher::default().down("offline").page("sneaker", SEARCH_RESULTS);
    let notifier = RecordingNotifier::default();
    let list = profiles(json!([
        { "name": "Flaky", "max_price": 100, "search_terms": ["offline", "boom"] },
        { "name": "Sneakers", "type": "shoes", "max_price": 100, "search_terms": ["sneaker"] }
    ]));
    let mut m = monitor(list.clone(), fetcher.clone(), &notifier, &dir.path().join("seen.json"));

    let summary = m.run_cycle(&mut NullProgress).await;
    assert_eq!(fetcher.calls(), vec!["offline", "boom", "sneaker"]);
    assert_eq!(summary.failed_terms, 2);
    assert_eq!(summary.recorded, 3);

    let outcome = m.run_term(&list[0], "boom", &mut NullProgress).await;
    assert!(matches!(outcome, TermOutcome::Crashed(_)));
    let outcome = m.run_term(&list[0], "offline", &mut NullProgress).await;
    assert!(matches!(outcome, TermOutcome::FetchFailed(FetchError::Timeout(_))));
}

#[tokio::test]
async fn disabled_notifications_still_record_matches() {
    let dir = tempfile::tempdir().unwrap();
    let seen = dir.path().join("seen.json");
    let fetcher = ScriptedFetcher::default().page("sneaker", SEARCH_RESULTS);
    let list = profiles(json!([
        { "name": "Sneakers", "type": "shoes", "max_price": 100, "search_terms": ["sneaker"] }
    ]));
    let mut m = Monitor::new(
        options(),
        list,
        Box::new(fetcher),
        Dispatcher::disabled("CHF"),
        SeenStore::open(&seen),
    )
    .unwrap();

    let mut log = MatchLog::default();
    assert_eq!(m.run_cycle(&mut log).await.recorded, 3);
    assert_eq!(log.0.len(), 3);
    m.flush().unwrap();

    // a restart picks up where the last run stopped
    let fetcher = ScriptedFetcher::default().page("sneaker", SEARCH_RESULTS);
    let list = profiles(json!([
        { "name": "Sneakers", "type": "shoes", "max_price": 100, "search_terms": ["sneaker"] }
    ]));
    let mut again =
        Monitor::new(options(), list, Box::new(fetcher), Dispatcher::disabled("CHF"), SeenStore::open(&seen)).unwrap();
    assert_eq!(again.store().len(), 3);
    assert_eq!(again.run_cycle(&mut NullProgress).await.recorded, 0);
}

#[tokio::test]
async fn bounded_run_stops_after_the_requested_cycles() {
    let dir = tempfile::tempdir().unwrap();
    let fetcher = ScriptedFetcher::default();
    let notifier = RecordingNotifier::default();
    let list = profiles(json!([{ "name": "A", "max_price": 1, "search_terms": ["a"] }]));
    let mut m = monitor(list, fetcher.clone(), &notifier, &dir.path().join("seen.json"));

    m.run(&mut NullProgress, Some(2)).await;
    assert_eq!(m.cycles_done(), 2);
    assert_eq!(fetcher.calls(), vec!["a", "a"]);
}

/// Blows up outside any single term, at the end of the first cycle.
struct FailingAfterCycle;

impl Progress for FailingAfterCycle {
    fn cycle_finish(&mut self, _cycle: u64, _recorded: usize) {
        panic!("status display went away");
    }
}

#[tokio::test]
async fn loop_crash_alerts_at_top_priority_and_keeps_the_seen_set() {
    let dir = tempfile::tempdir().unwrap();
    let seen = dir.path().join("seen.json");
    let fetcher = ScriptedFetcher::default().page("sneaker", SEARCH_RESULTS);
    let notifier = RecordingNotifier::default();
    let list = profiles(json!([
        { "name": "Sneakers", "type": "shoes", "max_price": 100, "search_terms": ["sneaker"], "priority": 2 }
    ]));
    let mut m = monitor(list, fetcher, &notifier, &seen);

    let exit = m.run_until(&mut FailingAfterCycle, None, std::future::pending()).await;
    assert_eq!(exit, Exit::Crashed("status display went away".into()));

    let sent = notifier.sent.lock().unwrap().clone();
    assert_eq!(sent.len(), 4);
    let alert = &sent[3];
    assert_eq!(alert.priority.ordinal(), 1);
    assert!(alert.text.starts_with("[CRITICAL: marketplace monitor stopped]:"));
    assert!(alert.text.contains("status display went away"));
    assert_eq!(load_seen(&seen).len(), 3);
}

#[tokio::test]
async fn shutdown_stops_the_loop_between_cycles() {
    let dir = tempfile::tempdir().unwrap();
    let seen = dir.path().join("seen.json");
    let fetcher = ScriptedFetcher::default().page("sneaker", SEARCH_RESULTS);
    let notifier = RecordingNotifier::default();
    let list = profiles(json!([
        { "name": "Sneakers", "type": "shoes", "max_price": 100, "search_terms": ["sneaker"] }
    ]));
    let mut opts = options();
    opts.timing.check_interval_secs = 3600;
    let dispatcher = Dispatcher::new(Box::new(notifier.clone()), "CHF");
    let mut m =
        Monitor::new(opts, list, Box::new(fetcher.clone()), dispatcher, SeenStore::open(&seen)).unwrap();

    let exit = m.run_until(&mut NullProgress, None, tokio::time::sleep(Duration::from_millis(50))).await;
    assert_eq!(exit, Exit::Interrupted);
    assert_eq!(m.cycles_done(), 1);
    assert_eq!(fetcher.calls(), vec!["sneaker"]);
    // no crash alert, only the three matches
    assert_eq!(notifier.sent.lock().unwrap().len(), 3);
    assert_eq!(load_seen(&seen).len(), 3);
}

#[tokio::test]
async fn shutdown_that_is_already_due_wins_before_any_fetch() {
    let dir = tempfile::tempdir().unwrap();
    let fetcher = ScriptedFetcher::default();
    let notifier = RecordingNotifier::default();
    let list = profiles(json!([{ "name": "A", "max_price": 1, "search_terms": ["a"] }]));
    let mut m = monitor(list, fetcher.clone(), &notifier, &dir.path().join("seen.json"));

    assert_eq!(m.run_until(&mut NullProgress, Some(1), std::future::ready(())).await, Exit::Interrupted);
    assert!(fetcher.calls().is_empty());
    assert_eq!(m.cycles_done(), 0);
}
