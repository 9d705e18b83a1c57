//! Topic subscribers.
//!
//! A [`Subscriber`] drains one topic and hands each decoded event to an
//! [`EventHandler`]. The handler classifies the result instead of swallowing
//! it:
//!
//! - `Handled` / `Skipped`: done, nothing else happens
//! - `Retry`: processed again with exponential backoff up to the policy limit
//! - `Failed`, retry exhaustion or an undecodable payload: the message goes to
//!   the subscriber's [`DeadLetterQueue`]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::{IntegrationEvent, Message};

/// How a handler disposed of one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandleOutcome {
    Handled,

    /// Duplicate or stale delivery; expected and harmless.
    Skipped { reason: String },

    /// Transient failure; worth another attempt.
    Retry { reason: String },

    /// Permanent failure; retrying cannot help.
    Failed { reason: String },
}

impl HandleOutcome {
    pub fn skipped(reason: impl Into<String>) -> Self {
        HandleOutcome::Skipped {
            reason: reason.into(),
        }
    }

    pub fn retry(reason: impl Into<String>) -> Self {
        HandleOutcome::Retry {
            reason: reason.into(),
        }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        HandleOutcome::Failed {
            reason: reason.into(),
        }
    }

    fn label(&self) -> &'static str {
        match self {
            HandleOutcome::Handled => "handled",
            HandleOutcome::Skipped { .. } => "skipped",
            HandleOutcome::Retry { .. } => "retry",
            HandleOutcome::Failed { .. } => "failed",
        }
    }
}

/// Reacts to integration events from one topic.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Name used in logs, metrics and dead letters.
    fn name(&self) -> &'static str;

    async fn handle(&self, event: &IntegrationEvent) -> HandleOutcome;
}

/// Retry limits for transient failures.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Attempts after the first one.
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    /// Backoff before retry number `retry` (1-based): `base * 2^(retry - 1)`.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        self.base_delay.saturating_mul(factor)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(100))
    }
}

/// A message a subscriber gave up on.
#[derive(Debug, Clone)]
pub struct DeadLetter {
    pub message: Message,
    pub handler: &'static str,
    pub reason: String,
    /// Processing attempts made, including the first.
    pub attempts: u32,
    pub failed_at: DateTime<Utc>,
}

/// Shared, inspectable record of dead-lettered messages.
#[derive(Debug, Clone, Default)]
pub struct DeadLetterQueue {
    entries: Arc<Mutex<Vec<DeadLetter>>>,
}

impl DeadLetterQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, letter: DeadLetter) {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(letter);
    }

    pub fn entries(&self) -> Vec<DeadLetter> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Consumes one topic sequentially until cancelled or the channel closes.
///
/// While a message is being processed, including retry backoff, later
/// messages wait in the subscriber's queue and are never dropped.
pub struct Subscriber {
    receiver: mpsc::Receiver<Message>,
    handler: Arc<dyn EventHandler>,
    policy: RetryPolicy,
    dead_letters: DeadLetterQueue,
    shutdown: CancellationToken,
}

impl Subscriber {
    pub fn new(
        receiver: mpsc::Receiver<Message>,
        handler: Arc<dyn EventHandler>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            receiver,
            handler,
            policy: RetryPolicy::default(),
            dead_letters: DeadLetterQueue::new(),
            shutdown,
        }
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_dead_letters(mut self, dead_letters: DeadLetterQueue) -> Self {
        self.dead_letters = dead_letters;
        self
    }

    pub fn dead_letters(&self) -> DeadLetterQueue {
        self.dead_letters.clone()
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    pub async fn run(mut self) {
        let name = self.handler.name();
        tracing::info!(handler = name, "subscriber started");

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    tracing::info!(handler = name, "subscriber shutting down");
                    break;
                }

                received = self.receiver.recv() => match received {
                    Some(message) => {
                        self.process(&message).await;
                    }
                    None => {
                        tracing::info!(handler = name, "channel closed");
                        break;
                    }
                }
            }
        }

        tracing::info!(handler = name, "subscriber stopped");
    }

    /// Processes one message to completion, retrying and dead-lettering per
    /// policy. Returns the final outcome.
    pub async fn process(&self, message: &Message) -> HandleOutcome {
        let name = self.handler.name();

        let event = match message.decode() {
            Ok(event) => event,
            Err(e) => {
                let outcome = HandleOutcome::failed(e.to_string());
                self.dead_letter(message, &e.to_string(), 1);
                record(name, &outcome);
                return outcome;
            }
        };

        let mut retries = 0;
        loop {
            let outcome = self.handler.handle(&event).await;
            match &outcome {
                HandleOutcome::Handled => {
                    tracing::info!(handler = name, key = %message.key, event = event.type_name(), "event handled");
                }
                HandleOutcome::Skipped { reason } => {
                    tracing::info!(handler = name, key = %message.key, %reason, "event skipped");
                }
                HandleOutcome::Failed { reason } => {
                    self.dead_letter(message, reason, retries + 1);
                }
                HandleOutcome::Retry { reason } => {
                    retries += 1;
                    if retries > self.policy.max_retries {
                        tracing::error!(handler = name, key = %message.key, retries, %reason, "max retries exceeded");
                        self.dead_letter(message, reason, retries);
                        let outcome = HandleOutcome::failed(reason.clone());
                        record(name, &outcome);
                        return outcome;
                    }

                    let delay = self.policy.delay_for(retries);
                    tracing::warn!(
                        handler = name,
                        key = %message.key,
                        retries,
                        delay_ms = delay.as_millis() as u64,
                        %reason,
                        "retrying event"
                    );
                    tokio::select! {
                        _ = self.shutdown.cancelled() => {
                            tracing::warn!(handler = name, key = %message.key, "shutdown during retry backoff");
                            return outcome;
                        }
                        _ = tokio::time::sleep(delay) => {}
                    }
                    continue;
                }
            }
            record(name, &outcome);
            return outcome;
        }
    }

    fn dead_letter(&self, message: &Message, reason: &str, attempts: u32) {
        let handler = self.handler.name();
        tracing::error!(
            handler,
            topic = %message.topic,
            key = %message.key,
            attempts,
            %reason,
            "sending message to dead letter queue"
        );
        metrics::counter!("events_dead_lettered_total", "handler" => handler).increment(1);
        self.dead_letters.push(DeadLetter {
            message: message.clone(),
            handler,
            reason: reason.to_string(),
            attempts,
            failed_at: Utc::now(),
        });
    }
}

fn record(handler: &'static str, outcome: &HandleOutcome) {
    metrics::counter!("events_processed_total", "handler" => handler, "outcome" => outcome.label())
        .increment(1);
}
