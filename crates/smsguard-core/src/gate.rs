//! Interception gate consulted by the inbound transport for every message.
//!
//! The gate fails open: if the blocklist cannot be read, the message is
//! delivered and the failure is logged.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, error};

use crate::blocklist::{BlocklistEngine, RetentionStore};
use crate::time::{Clock, SystemClock};

/// What the transport should do with an inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Hand the message to the delivery pipeline.
    Deliver,
    /// Stop processing; the message must not be stored or shown.
    Suppress,
}

impl Verdict {
    /// Returns true if the message must be dropped.
    #[must_use]
    pub const fn is_suppressed(self) -> bool {
        matches!(self, Self::Suppress)
    }

    const fn as_str(self) -> &'static str {
        match self {
            Self::Deliver => "deliver",
            Self::Suppress => "suppress",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One part of an inbound delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessagePart {
    /// Originating address as reported by the transport.
    pub sender: String,
    /// Message text. Never persisted.
    pub body: String,
}

impl MessagePart {
    /// Creates a message part.
    #[must_use]
    pub fn new(sender: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
            body: body.into(),
        }
    }
}

/// A delivery that may arrive split into several parts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InboundMessage {
    /// Parts in arrival order.
    pub parts: Vec<MessagePart>,
}

impl InboundMessage {
    /// Creates a single-part message.
    #[must_use]
    pub fn single(sender: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            parts: vec![MessagePart::new(sender, body)],
        }
    }
}

/// Allow/suppress decision point for inbound messages.
pub struct InterceptionGate<S, C = SystemClock> {
    engine: Arc<BlocklistEngine<S, C>>,
}

impl<S, C> Clone for InterceptionGate<S, C> {
    fn clone(&self) -> Self {
        Self {
            engine: Arc::clone(&self.engine),
        }
    }
}

impl<S: RetentionStore, C: Clock> InterceptionGate<S, C> {
    /// Creates a gate reading from a shared engine.
    #[must_use]
    pub const fn new(engine: Arc<BlocklistEngine<S, C>>) -> Self {
        Self { engine }
    }

    /// Returns true if messages from `sender` must be suppressed.
    ///
    /// Never fails: a storage error is logged and the message is delivered.
    pub async fn should_suppress(&self, sender: &str) -> bool {
        if sender.trim().is_empty() {
            debug!("Inbound message has no sender, delivering");
            return false;
        }

        match self.engine.is_blocked(sender).await {
            Ok(true) => {
                debug!("Suppressing message from {sender}");
                true
            }
            Ok(false) => false,
            Err(e) => {
                error!("Blocklist lookup failed for {sender}, delivering message: {e}");
                false
            }
        }
    }

    /// Decide on a whole delivery. Any blocked part suppresses all of it.
    pub async fn inspect(&self, message: &InboundMessage) -> Verdict {
        for part in &message.parts {
            if self.should_suppress(&part.sender).await {
                return Verdict::Suppress;
            }
        }
        Verdict::Deliver
    }
}
