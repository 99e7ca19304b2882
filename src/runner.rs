// src/runner.rs
//! Scheduler/Loop: profiles in configuration order, terms in order, one at a time.
//!
//! Suspension points are the fetch, the notification and the fixed delays; an
//! outer `select!` on Ctrl-C can therefore stop the loop at any of them. The seen
//! set is saved right after every term that recorded something.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::{Duration, Instant};

use futures_util::FutureExt;
use log::{debug, error, info, warn};
use thiserror::Error;
use url::Url;

use crate::config::options::MonitorOptions;
use crate::config::profile::{Priority, SearchProfile};
use crate::core::html::parse_document;
use crate::core::net::{FetchError, Fetcher};
use crate::filter::AttributeFilter;
use crate::notify::{Delivery, Dispatcher, Notification};
use crate::pipeline::{MatchPipeline, PageOutcome, PageReport, SkipStats};
use crate::progress::Progress;
use crate::specs::selectors::{CompiledPageSpec, SpecError};
use crate::store::{SeenStore, StoreError};

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error(transparent)]
    Spec(#[from] SpecError),
    #[error("invalid attribute target: {0}")]
    Filter(#[from] regex::Error),
    #[error("invalid base url '{url}': {source}")]
    BaseUrl { url: String, source: url::ParseError },
    #[error("evaluating '{term}' for '{profile}' panicked: {message}")]
    TermPanicked { profile: String, term: String, message: String },
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// What one search term produced.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TermSummary {
    pub candidates: usize,
    pub outcome: PageOutcome,
    pub skipped: SkipStats,
    pub matches: usize,
    /// Matches now in the seen set.
    pub recorded: usize,
    /// Matches left unrecorded because delivery failed; retried next cycle.
    pub failed_deliveries: usize,
}

#[derive(Debug)]
pub enum TermOutcome {
    Checked(TermSummary),
    FetchFailed(FetchError),
    Crashed(MonitorError),
}

/// How [`Monitor::run_until`] ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Exit {
    Finished,
    Interrupted,
    /// The loop itself panicked; carries the panic message.
    Crashed(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CycleSummary {
    pub cycle: u64,
    pub duration: Duration,
    pub recorded: usize,
    pub failed_terms: usize,
    pub total_seen: usize,
}

pub struct Monitor {
    options: MonitorOptions,
    profiles: Vec<SearchProfile>,
    spec: CompiledPageSpec,
    filter: AttributeFilter,
    base: Url,
    fetcher: Box<dyn Fetcher>,
    dispatcher: Dispatcher,
    store: SeenStore,
    cycle: u64,
}

impl Monitor {
    pub fn new(
        options: MonitorOptions,
        profiles: Vec<SearchProfile>,
        fetcher: Box<dyn Fetcher>,
        dispatcher: Dispatcher,
        store: SeenStore,
    ) -> Result<Self, MonitorError> {
        let spec = CompiledPageSpec::compile(&options.page)?;
        let filter = AttributeFilter::new(&options.attributes)?;
        let base = Url::parse(&options.site.base_url)
            .map_err(|source| MonitorError::BaseUrl { url: options.site.base_url.clone(), source })?;
        Ok(Self { options, profiles, spec, filter, base, fetcher, dispatcher, store, cycle: 0 })
    }

    pub fn store(&self) -> &SeenStore {
        &self.store
    }

    pub fn cycles_done(&self) -> u64 {
        self.cycle
    }

    pub async fn announce_startup(&mut self) -> Delivery {
        let body = format!("Monitoring {} search profile(s).", self.profiles.len());
        let lowest = self.options.telegram.lowest_priority();
        self.dispatcher.announce("Marketplace monitor started", &body, lowest).await
    }

    pub async fn announce_crash(&mut self, reason: &str) -> Delivery {
        self.dispatcher
            .announce("CRITICAL: marketplace monitor stopped", reason, Priority::HIGHEST)
            .await
    }

    /// Run cycles until `cycles` is reached (forever when `None`).
    pub async fn run(&mut self, progress: &mut dyn Progress, cycles: Option<u64>) {
        info!(
            "Starting periodic monitoring every {}s. Press Ctrl+C to stop.",
            self.options.timing.check_interval_secs
        );
        loop {
            self.run_cycle(progress).await;
            if cycles.is_some_and(|n| self.cycle >= n) {
                break;
            }
            info!("Waiting {}s until the next cycle...", self.options.timing.check_interval_secs);
            pause(self.options.timing.check_interval()).await;
        }
    }

    /// Run until the requested cycles are done, `shutdown` resolves or the loop
    /// panics. A crash is announced at the highest priority; the seen set is
    /// flushed on every path.
    pub async fn run_until(
        &mut self,
        progress: &mut dyn Progress,
        cycles: Option<u64>,
        shutdown: impl Future<Output = ()>,
    ) -> Exit {
        let exit = tokio::select! {
            biased;
            _ = shutdown => Exit::Interrupted,
            res = AssertUnwindSafe(self.run(progress, cycles)).catch_unwind() => match res {
                Ok(()) => Exit::Finished,
                Err(panic) => Exit::Crashed(panic_message(panic.as_ref())),
            },
        };

        match &exit {
            Exit::Finished => info!("Finished after {} cycle(s)", self.cycle),
            Exit::Interrupted => info!("Monitoring stopped by user (Ctrl+C)"),
            Exit::Crashed(msg) => {
                error!("CRITICAL: unexpected error in the main loop: {msg}");
                if let Some(trace) = crate::log::take_panic_trace() {
                    error!("{trace}");
                }
                let reason = format!("Unexpected error: {msg}\nThe monitor has stopped.");
                self.announce_crash(&reason).await;
            }
        }

        info!("Saving seen items before exit...");
        if let Err(e) = self.flush() {
            error!("{e}");
        }
        exit
    }

    /// One full pass over every profile and term.
    pub async fn run_cycle(&mut self, progress: &mut dyn Progress) -> CycleSummary {
        self.cycle += 1;
        let cycle = self.cycle;
        progress.cycle_begin(cycle);
        info!("--- === Cycle #{cycle} started === ---");

        let started = Instant::now();
        let before = self.store.len();
        let mut failed_terms = 0;

        let profiles = self.profiles.clone();
        for profile in &profiles {
            debug!("Profile '{}': {} term(s)", profile.name, profile.search_terms.len());
            let mut found = false;

            for term in &profile.search_terms {
                match self.run_term(profile, term, progress).await {
                    TermOutcome::Checked(s) => {
                        found |= s.recorded > 0;
                        pause(self.options.timing.inter_request_delay()).await;
                    }
                    TermOutcome::FetchFailed(e) => {
                        warn!("    Skipping '{term}' this cycle: {e}");
                        failed_terms += 1;
                        pause(self.options.timing.inter_request_delay()).await;
                    }
                    TermOutcome::Crashed(e) => {
                        error!("!! {e}");
                        error!("   -> continuing with the next term/profile");
                        failed_terms += 1;
                        pause(self.options.timing.error_delay()).await;
                    }
                }
            }

            if found {
                info!("-> New listing(s) for profile '{}' in this cycle", profile.name);
            }
            pause(self.options.timing.inter_profile_delay()).await;
        }

        // a save may have failed mid-cycle; try again
        if self.store.is_dirty() {
            self.save_store();
        }

        let summary = CycleSummary {
            cycle,
            duration: started.elapsed(),
            recorded: self.store.len() - before,
            failed_terms,
            total_seen: self.store.len(),
        };
        info!("--- === Cycle #{cycle} finished ({:.2}s) === ---", summary.duration.as_secs_f64());
        if summary.recorded > 0 {
            info!("   >>> {} new matching listing(s) recorded in this cycle", summary.recorded);
        } else {
            info!("   No *new* matching listings in this cycle");
        }
        info!("Total known listings: {}", summary.total_seen);
        progress.cycle_finish(cycle, summary.recorded);
        summary
    }

    /// Fetch, evaluate, notify and record one term. Never panics outward.
    pub async fn run_term(&mut self, profile: &SearchProfile, term: &str, progress: &mut dyn Progress) -> TermOutcome {
        info!(
            "---> Searching '{term}' (profile '{}', {}, max {} {})",
            profile.name, profile.category, profile.max_price, self.options.site.currency
        );
        let attempt = AssertUnwindSafe(self.evaluate_term(profile, term, progress))
            .catch_unwind()
            .await;
        match attempt {
            Ok(outcome) => outcome,
            Err(panic) => {
                if let Some(trace) = crate::log::take_panic_trace() {
                    error!("{trace}");
                }
                TermOutcome::Crashed(MonitorError::TermPanicked {
                    profile: profile.name.clone(),
                    term: term.to_string(),
                    message: panic_message(panic.as_ref()),
                })
            }
        }
    }

    async fn evaluate_term(&mut self, profile: &SearchProfile, term: &str, progress: &mut dyn Progress) -> TermOutcome {
        let body = match self.fetcher.fetch(term).await {
            Ok(body) => body,
            Err(e) => return TermOutcome::FetchFailed(e),
        };

        // the parse tree is not Send; keep it out of any await
        let report: PageReport = {
            let page = parse_document(&body);
            MatchPipeline::new(&self.spec, &self.filter, &self.base).run(&page, profile, term, &self.store)
        };

        let mut summary = TermSummary {
            candidates: report.candidates,
            outcome: report.outcome,
            skipped: report.skipped,
            matches: report.matches.len(),
            recorded: 0,
            failed_deliveries: 0,
        };

        for m in &report.matches {
            progress.matched(m, &self.options.site.currency);
            match self.dispatcher.dispatch(&Notification::from(m)).await {
                Delivery::Delivered | Delivery::Disabled => {
                    if self.store.insert(m.record.url.clone()) {
                        summary.recorded += 1;
                    }
                }
                Delivery::Failed => {
                    warn!("      '{}' not recorded; it will be retried next cycle", m.record.title);
                    summary.failed_deliveries += 1;
                }
            }
        }

        if summary.recorded > 0 {
            self.save_store();
        }
        progress.term_done(&profile.name, term, summary.matches);
        TermOutcome::Checked(summary)
    }

    fn save_store(&mut self) {
        if let Err(e) = self.store.save() {
            error!("{e}; keeping {} item(s) in memory", self.store.len());
        }
    }

    /// Final best-effort persistence.
    pub fn flush(&mut self) -> Result<(), MonitorError> {
        if !self.store.is_dirty() {
            debug!("Seen set unchanged since last save");
            return Ok(());
        }
        self.store.save()?;
        info!("Seen set saved to '{}' ({} item(s))", self.store.path().display(), self.store.len());
        Ok(())
    }
}

async fn pause(d: Duration) {
    if !d.is_zero() {
        tokio::time::sleep(d).await;
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
