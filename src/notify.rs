// src/notify.rs
//! NotificationDispatcher: a match becomes a priority-routed chat message.
//!
//! Delivery failures are logged and reported as [`Delivery::Failed`]; they never
//! propagate further. The transport sits behind [`Notifier`] so the loop can be
//! tested without a network.

use std::collections::BTreeMap;

use async_trait::async_trait;
use log::{error, info, warn};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use thiserror::Error;

use crate::config::consts::PLACEHOLDER_PREFIX;
use crate::config::options::TelegramOptions;
use crate::config::profile::Priority;
use crate::core::sanitize::escape_html;
use crate::pipeline::Match;
use crate::specs::listing::Price;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("timed out talking to the notification service")]
    Timeout,
    #[error("network error: {0}")]
    Transport(String),
    #[error("HTTP {status}: {body}")]
    Http { status: StatusCode, body: String },
    #[error("rejected by the notification service (code {code}): {description}")]
    Rejected { code: i64, description: String },
    #[error("no destination configured for priority {0}")]
    NoRoute(Priority),
    #[error("could not build HTTP client: {0}")]
    Client(String),
}

/// Everything a listing notification needs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Notification<'a> {
    pub title: &'a str,
    pub url: &'a str,
    pub price: Price,
    pub profile_name: &'a str,
    pub priority: Priority,
}

impl<'a> From<&'a Match> for Notification<'a> {
    fn from(m: &'a Match) -> Self {
        Self {
            title: &m.record.title,
            url: &m.record.url,
            price: m.record.price,
            profile_name: &m.profile_name,
            priority: m.priority,
        }
    }
}

pub fn price_label(price: Price, currency: &str) -> String {
    match price {
        Price::Known(0) => "free".to_string(),
        Price::Known(p) => format!("{p} {currency}"),
        Price::Unknown => "price unknown".to_string(),
    }
}

impl Notification<'_> {
    /// HTML parse-mode body; every page-derived value is escaped.
    pub fn render(&self, currency: &str) -> String {
        format!(
            "[{}]:\n[{}]\n\n{}",
            escape_html(self.title),
            escape_html(&price_label(self.price, currency)),
            escape_html(self.url)
        )
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutboundMessage {
    pub priority: Priority,
    pub text: String,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn deliver(&self, message: &OutboundMessage) -> Result<(), NotifyError>;
}

/// Telegram Bot API transport: one bot per priority tier, one shared chat.
pub struct TelegramNotifier {
    client: Client,
    api_base: String,
    chat_id: String,
    tokens: BTreeMap<u8, String>,
}

#[derive(Debug, Deserialize)]
struct TelegramReply {
    ok: bool,
    #[serde(default)]
    error_code: Option<i64>,
    #[serde(default)]
    description: Option<String>,
}

impl TelegramNotifier {
    pub fn new(opts: &TelegramOptions) -> Result<Self, NotifyError> {
        let client = Client::builder()
            .timeout(opts.timeout())
            .build()
            .map_err(|e| NotifyError::Client(e.to_string()))?;
        let tokens = opts
            .bot_tokens
            .iter()
            .filter(|(_, t)| !t.trim().is_empty() && !t.starts_with(PLACEHOLDER_PREFIX))
            .map(|(k, t)| (*k, t.trim().to_string()))
            .collect();
        Ok(Self {
            client,
            api_base: opts.api_base.trim_end_matches('/').to_string(),
            chat_id: opts.chat_id.trim().to_string(),
            tokens,
        })
    }

    /// Token for `priority`; an unknown tier goes to the least important configured one.
    pub fn token_for(&self, priority: Priority) -> Option<&str> {
        route(&self.tokens, priority)
    }
}

fn route(tokens: &BTreeMap<u8, String>, priority: Priority) -> Option<&str> {
    tokens
        .get(&priority.ordinal())
        .or_else(|| tokens.values().next_back())
        .map(String::as_str)
}

fn transport_error(e: reqwest::Error) -> NotifyError {
    if e.is_timeout() { NotifyError::Timeout } else { NotifyError::Transport(e.to_string()) }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn deliver(&self, message: &OutboundMessage) -> Result<(), NotifyError> {
        let token = self.token_for(message.priority).ok_or(NotifyError::NoRoute(message.priority))?;
        let endpoint = format!("{}/bot{}/sendMessage", self.api_base, token);
        let form = [
            ("chat_id", self.chat_id.as_str()),
            ("text", message.text.as_str()),
            ("parse_mode", "HTML"),
            ("disable_web_page_preview", "false"),
        ];

        let response = self.client.post(&endpoint).form(&form).send().await.map_err(transport_error)?;
        let status = response.status();
        let body = response.text().await.map_err(transport_error)?;

        match serde_json::from_str::<TelegramReply>(&body) {
            Ok(reply) if !reply.ok => Err(NotifyError::Rejected {
                code: reply.error_code.unwrap_or_else(|| i64::from(status.as_u16())),
                description: reply.description.unwrap_or_else(|| "no description".to_string()),
            }),
            _ if !status.is_success() => Err(NotifyError::Http { status, body }),
            Ok(_) => Ok(()),
            Err(e) => {
                warn!("  -> unreadable reply from Telegram ({e}); assuming delivered");
                Ok(())
            }
        }
    }
}

/// Result of one dispatch as seen by the loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Delivery {
    Delivered,
    Failed,
    /// Notifications are switched off; nothing was attempted.
    Disabled,
}

enum DispatchState {
    Enabled(Box<dyn Notifier>),
    Disabled { warned: bool },
}

pub struct Dispatcher {
    state: DispatchState,
    currency: String,
}

impl Dispatcher {
    pub fn new(notifier: Box<dyn Notifier>, currency: impl Into<String>) -> Self {
        Self { state: DispatchState::Enabled(notifier), currency: currency.into() }
    }

    pub fn disabled(currency: impl Into<String>) -> Self {
        Self { state: DispatchState::Disabled { warned: false }, currency: currency.into() }
    }

    /// Telegram when configured, otherwise a disabled dispatcher.
    pub fn from_options(opts: &TelegramOptions, currency: &str) -> Result<Self, NotifyError> {
        if !opts.is_configured() {
            warn!("Telegram notifications are DISABLED (no chat id or bot token configured)");
            return Ok(Self::disabled(currency));
        }
        let notifier = TelegramNotifier::new(opts)?;
        info!(
            "Telegram notifications are ENABLED ({} priority channel(s))",
            notifier.tokens.len()
        );
        Ok(Self::new(Box::new(notifier), currency))
    }

    pub async fn dispatch(&mut self, notification: &Notification<'_>) -> Delivery {
        let text = notification.render(&self.currency);
        info!("Sending notification for '{}': '{}'", notification.profile_name, notification.title);
        self.send(OutboundMessage { priority: notification.priority, text }).await
    }

    /// Operational message (startup, crash).
    pub async fn announce(&mut self, title: &str, body: &str, priority: Priority) -> Delivery {
        let text = format!("[{}]:\n{}", escape_html(title), escape_html(body));
        self.send(OutboundMessage { priority, text }).await
    }

    async fn send(&mut self, message: OutboundMessage) -> Delivery {
        match &mut self.state {
            DispatchState::Disabled { warned } => {
                if !*warned {
                    warn!("Notifications are disabled; skipping");
                    *warned = true;
                }
                Delivery::Disabled
            }
            DispatchState::Enabled(notifier) => match notifier.deliver(&message).await {
                Ok(()) => {
                    info!("  -> notification sent (priority {})", message.priority);
                    Delivery::Delivered
                }
                Err(e) => {
                    error!("  -> notification failed: {e}");
                    Delivery::Failed
                }
            },
        }
    }
}
