// src/lib.rs

pub mod cli;
pub mod config;
pub mod core;
pub mod specs;

pub mod file;
pub mod filter;
pub mod log;
pub mod notify;
pub mod pipeline;
pub mod progress;
pub mod runner;
pub mod store;

pub use config::{MonitorOptions, SearchProfile};
pub use filter::{AttributeFilter, Category};
pub use notify::{Delivery, Dispatcher, Notifier};
pub use pipeline::{Match, MatchPipeline, PageOutcome, PageReport};
pub use runner::Monitor;
pub use store::SeenStore;
