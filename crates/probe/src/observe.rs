//! Observation log fed by browser console and error events

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use tracing::debug;

/// Default number of observations retained per session
pub const DEFAULT_LOG_CAPACITY: usize = 500;

/// Where an observation came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Channel {
    ConsoleLog,
    ConsoleError,
    ConsoleWarning,
    PageError,
    RequestFailed,
}

impl Channel {
    /// Map a browser console message type onto a channel
    pub fn from_console_type(kind: &str) -> Self {
        match kind {
            "error" | "assert" => Channel::ConsoleError,
            "warning" | "warn" => Channel::ConsoleWarning,
            _ => Channel::ConsoleLog,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::ConsoleLog => "console-log",
            Channel::ConsoleError => "console-error",
            Channel::ConsoleWarning => "console-warning",
            Channel::PageError => "page-error",
            Channel::RequestFailed => "request-failed",
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Channel::ConsoleError | Channel::PageError)
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub channel: Channel,
    pub message: String,
    pub at: DateTime<Utc>,
}

impl fmt::Display for Observation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.channel, self.message)
    }
}

/// Bounded, append-only log of observations for one session.
///
/// Once `capacity` entries are held the oldest one is evicted. Per-channel
/// totals keep counting evicted entries.
#[derive(Debug, Clone)]
pub struct ObservationLog {
    entries: VecDeque<Observation>,
    capacity: usize,
    totals: BTreeMap<Channel, usize>,
}

impl ObservationLog {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
            totals: BTreeMap::new(),
        }
    }

    pub fn push(&mut self, channel: Channel, message: impl Into<String>) {
        let message = message.into();
        debug!(%channel, %message, "browser event");

        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(Observation {
            channel,
            message,
            at: Utc::now(),
        });
        *self.totals.entry(channel).or_default() += 1;
    }

    /// Entries currently retained, oldest first
    pub fn iter(&self) -> impl Iterator<Item = &Observation> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The last `n` retained entries, oldest first
    pub fn tail(&self, n: usize) -> Vec<Observation> {
        let skip = self.entries.len().saturating_sub(n);
        self.entries.iter().skip(skip).cloned().collect()
    }

    /// Everything appended on `channel`, including evicted entries
    pub fn total(&self, channel: Channel) -> usize {
        self.totals.get(&channel).copied().unwrap_or(0)
    }

    pub fn totals(&self) -> BTreeMap<Channel, usize> {
        self.totals.clone()
    }

    /// Retained console errors and page errors
    pub fn errors(&self) -> Vec<&Observation> {
        self.entries.iter().filter(|o| o.channel.is_error()).collect()
    }

    pub fn on_channel(&self, channel: Channel) -> Vec<&Observation> {
        self.entries.iter().filter(|o| o.channel == channel).collect()
    }
}

impl Default for ObservationLog {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_CAPACITY)
    }
}
