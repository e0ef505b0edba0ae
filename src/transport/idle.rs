//! Multi-level idle-timeout tracking.
//!
//! Sessions do not die abruptly: an idle tunnel first reaches a warning
//! level (notify the operator, send a keep-alive), then a soft-close level
//! (drain gracefully), then a forced close. Keep-alive probes run on their
//! own interval, and too many unanswered probes mark the connection dead
//! independently of the level thresholds.
//!
//! The tracker holds no callbacks and never reads the clock: the owner
//! records activity with explicit timestamps and polls [`IdleTimeout::check`],
//! which reports level transitions as values.

use std::time::{Duration, Instant};

/// Escalating idle severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum IdleLevel {
    /// Recent activity.
    None,
    /// Warning threshold crossed.
    Warning,
    /// Graceful close should begin.
    SoftClose,
    /// Immediate termination.
    ForcedClose,
}

/// What kind of traffic refreshed the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityKind {
    /// Payload received.
    Receive,
    /// Payload sent.
    Transmit,
    /// Heartbeat received.
    Heartbeat,
    /// Keep-alive response received.
    Keepalive,
}

/// Thresholds for idle escalation and keep-alive probing.
#[derive(Debug, Clone, Copy)]
pub struct IdleTimeoutConfig {
    /// Idle time before the warning level.
    pub warning_threshold: Duration,
    /// Idle time before graceful close.
    pub soft_close_threshold: Duration,
    /// Idle time before forced close.
    pub forced_close_threshold: Duration,
    /// Gap between keep-alive probes.
    pub keepalive_interval: Duration,
    /// Unanswered probes before the connection counts as dead.
    pub max_missed_probes: u32,
    /// Whether probing is enabled at all.
    pub enable_keepalive: bool,
}

impl Default for IdleTimeoutConfig {
    fn default() -> Self {
        Self {
            warning_threshold: Duration::from_secs(270),
            soft_close_threshold: Duration::from_secs(300),
            forced_close_threshold: Duration::from_secs(330),
            keepalive_interval: Duration::from_secs(30),
            max_missed_probes: 3,
            enable_keepalive: true,
        }
    }
}

/// A level transition reported by [`IdleTimeout::check`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdleEvent {
    /// The warning threshold was crossed since the last check.
    Warning,
    /// The soft-close threshold was crossed since the last check.
    SoftClose,
    /// The forced-close threshold was crossed since the last check.
    ForcedClose,
}

/// Tracks idleness for one session.
#[derive(Debug)]
pub struct IdleTimeout {
    config: IdleTimeoutConfig,
    last_activity: Instant,
    last_receive: Instant,
    last_transmit: Instant,
    last_probe_sent: Option<Instant>,
    missed_probes: u32,
    warning_reported: bool,
    soft_close_reported: bool,
    forced_close_reported: bool,
}

impl IdleTimeout {
    /// A tracker considering `now` the moment of last activity.
    pub fn new(config: IdleTimeoutConfig, now: Instant) -> Self {
        Self {
            config,
            last_activity: now,
            last_receive: now,
            last_transmit: now,
            last_probe_sent: None,
            missed_probes: 0,
            warning_reported: false,
            soft_close_reported: false,
            forced_close_reported: false,
        }
    }

    /// Record session activity; resets idle escalation.
    pub fn record_activity(&mut self, kind: ActivityKind, now: Instant) {
        self.last_activity = now;
        match kind {
            ActivityKind::Receive | ActivityKind::Heartbeat => self.last_receive = now,
            ActivityKind::Transmit => self.last_transmit = now,
            ActivityKind::Keepalive => {
                self.last_receive = now;
                self.missed_probes = 0;
                self.last_probe_sent = None;
            }
        }
        self.warning_reported = false;
        self.soft_close_reported = false;
        self.forced_close_reported = false;
    }

    /// Record that a keep-alive probe went out; an unanswered probe counts
    /// as missed once the next one is due.
    pub fn record_probe_sent(&mut self, now: Instant) {
        if self.last_probe_sent.is_some() {
            self.missed_probes += 1;
        }
        self.last_probe_sent = Some(now);
    }

    /// Poll for newly crossed levels. Each level is reported once per idle
    /// episode; activity rearms all of them.
    pub fn check(&mut self, now: Instant) -> Vec<IdleEvent> {
        let idle = self.idle_duration(now);
        let mut events = Vec::new();

        if idle >= self.config.warning_threshold && !self.warning_reported {
            self.warning_reported = true;
            events.push(IdleEvent::Warning);
        }
        if idle >= self.config.soft_close_threshold && !self.soft_close_reported {
            self.soft_close_reported = true;
            events.push(IdleEvent::SoftClose);
        }
        if idle >= self.config.forced_close_threshold && !self.forced_close_reported {
            self.forced_close_reported = true;
            events.push(IdleEvent::ForcedClose);
        }
        events
    }

    /// Current level without reporting transitions.
    pub fn current_level(&self, now: Instant) -> IdleLevel {
        let idle = self.idle_duration(now);
        if idle >= self.config.forced_close_threshold {
            IdleLevel::ForcedClose
        } else if idle >= self.config.soft_close_threshold {
            IdleLevel::SoftClose
        } else if idle >= self.config.warning_threshold {
            IdleLevel::Warning
        } else {
            IdleLevel::None
        }
    }

    /// Whether a keep-alive probe is due.
    pub fn should_send_probe(&self, now: Instant) -> bool {
        if !self.config.enable_keepalive || self.is_dead() {
            return false;
        }
        let since_traffic = now.saturating_duration_since(self.last_receive);
        let probe_due = match self.last_probe_sent {
            Some(sent) => now.saturating_duration_since(sent) >= self.config.keepalive_interval,
            None => true,
        };
        since_traffic >= self.config.keepalive_interval && probe_due
    }

    /// Whether too many probes went unanswered.
    pub fn is_dead(&self) -> bool {
        self.missed_probes >= self.config.max_missed_probes
    }

    /// Time since the last recorded activity.
    pub fn idle_duration(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_activity)
    }

    /// Probes sent without an answer.
    pub fn missed_probes(&self) -> u32 {
        self.missed_probes
    }

    /// Last time anything was received.
    pub fn last_receive(&self) -> Instant {
        self.last_receive
    }

    /// Last time anything was sent.
    pub fn last_transmit(&self) -> Instant {
        self.last_transmit
    }
}
