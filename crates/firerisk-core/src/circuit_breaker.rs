//! Per-source circuit breaker.
//!
//! A breaker counts consecutive failed calls to one upstream. Once the count
//! reaches [`CircuitBreakerConfig::failure_threshold`] the circuit opens and
//! calls are refused without touching the network. After
//! [`CircuitBreakerConfig::open_timeout`] exactly one trial call is admitted;
//! its outcome closes or reopens the circuit.
//!
//! Timeouts are enforced by the orchestrator, which drops the in-flight call.
//! A dropped call never reaches [`CircuitBreaker::record_failure`], so the
//! orchestrator reports it through [`CircuitBreaker::record_timeout`]. A trial
//! whose outcome is never reported lapses after another `open_timeout` and the
//! next caller becomes the trial.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::ProviderId;

/// Externally visible circuit state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    /// One trial call has been admitted and its outcome is pending.
    HalfOpen,
}

/// Circuit breaker thresholds and timers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub open_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            open_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Phase {
    Closed,
    Open { since: Instant },
    Trial { since: Instant },
}

#[derive(Debug)]
struct Tally {
    phase: Phase,
    failures: u32,
}

/// Thread-safe breaker shared by every request that reaches one source.
#[derive(Debug)]
pub struct CircuitBreaker {
    source: ProviderId,
    config: CircuitBreakerConfig,
    tally: Mutex<Tally>,
}

impl CircuitBreaker {
    pub fn new(source: ProviderId, config: CircuitBreakerConfig) -> Self {
        Self {
            source,
            config,
            tally: Mutex::new(Tally {
                phase: Phase::Closed,
                failures: 0,
            }),
        }
    }

    pub fn with_defaults(source: ProviderId) -> Self {
        Self::new(source, CircuitBreakerConfig::default())
    }

    /// Returns `true` if the caller may contact the upstream now.
    ///
    /// While the circuit is open or a trial is pending this returns `false`,
    /// except for the single caller that becomes the next trial.
    pub fn try_admit(&self) -> bool {
        let mut tally = self.tally();
        match tally.phase {
            Phase::Closed => true,
            Phase::Open { since } | Phase::Trial { since }
                if since.elapsed() >= self.config.open_timeout =>
            {
                debug!(source = %self.source, "circuit admitting a trial call");
                tally.phase = Phase::Trial {
                    since: Instant::now(),
                };
                true
            }
            Phase::Open { .. } | Phase::Trial { .. } => false,
        }
    }

    pub fn record_success(&self) {
        let mut tally = self.tally();
        if !matches!(tally.phase, Phase::Closed) {
            debug!(source = %self.source, "circuit closed");
        }
        tally.phase = Phase::Closed;
        tally.failures = 0;
    }

    pub fn record_failure(&self) {
        self.count_failure("failure");
    }

    /// Counts a call the orchestrator abandoned after `budget`.
    pub fn record_timeout(&self, budget: Duration) {
        debug!(
            source = %self.source,
            budget_ms = u64::try_from(budget.as_millis()).unwrap_or(u64::MAX),
            "upstream call abandoned"
        );
        self.count_failure("timeout");
    }

    pub fn state(&self) -> CircuitState {
        match self.tally().phase {
            Phase::Closed => CircuitState::Closed,
            Phase::Open { .. } => CircuitState::Open,
            Phase::Trial { .. } => CircuitState::HalfOpen,
        }
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.tally().failures
    }

    fn count_failure(&self, cause: &'static str) {
        let mut tally = self.tally();
        tally.failures = tally.failures.saturating_add(1);
        let trips = match tally.phase {
            Phase::Closed => tally.failures >= self.config.failure_threshold,
            Phase::Trial { .. } => true,
            Phase::Open { .. } => false,
        };
        if trips {
            warn!(
                source = %self.source,
                failures = tally.failures,
                cause,
                "circuit opened"
            );
            tally.phase = Phase::Open {
                since: Instant::now(),
            };
        }
    }

    // A panic while holding the lock cannot leave the tally half-updated.
    fn tally(&self) -> MutexGuard<'_, Tally> {
        self.tally.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
