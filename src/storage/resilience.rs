//! Circuit breaking for playbook stores.
//!
//! A store that keeps failing is rejected fast instead of stalling every
//! message that needs an access lookup.
//!
//! ```text
//! +--------+   failures >= threshold   +------+
//! | Closed | ------------------------> | Open |
//! +--------+                           +------+
//!     ^                                    |
//!     | success                            | reset timeout elapsed
//!     |                                    v
//!     +--------------------------- +-----------+
//!                                  | Half-Open |
//!                                  +-----------+
//! ```
//!
//! Only backend failures ([`Error::OperationFailed`], [`Error::Timeout`])
//! count towards tripping; not-found and invalid-input errors are the
//! caller's and pass through without touching the breaker state.

use super::PlaybookStore;
use crate::models::{
    GetPlaybooksResults, Playbook, PlaybookFilterOptions, PlaybookId, RequesterInfo,
};
use crate::{Error, Result};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Circuit breaker settings for a wrapped store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreResilienceConfig {
    /// Consecutive failures before opening the circuit.
    pub failure_threshold: u32,
    /// How long the circuit stays open before a trial call.
    pub reset_timeout_ms: u64,
    /// Trial calls allowed while half-open.
    pub half_open_max_calls: u32,
}

impl Default for StoreResilienceConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout_ms: 30_000,
            half_open_max_calls: 1,
        }
    }
}

impl StoreResilienceConfig {
    /// Loads settings from `PLAYBOOK_SIGNAL_STORE_BREAKER_*` variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    /// Applies overrides from a variable lookup.
    #[must_use]
    pub fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("PLAYBOOK_SIGNAL_STORE_BREAKER_FAILURE_THRESHOLD")
            && let Ok(parsed) = v.parse::<u32>()
        {
            self.failure_threshold = parsed.max(1);
        }
        if let Some(v) = lookup("PLAYBOOK_SIGNAL_STORE_BREAKER_RESET_MS")
            && let Ok(parsed) = v.parse::<u64>()
        {
            self.reset_timeout_ms = parsed;
        }
        if let Some(v) = lookup("PLAYBOOK_SIGNAL_STORE_BREAKER_HALF_OPEN_MAX_CALLS")
            && let Ok(parsed) = v.parse::<u32>()
        {
            self.half_open_max_calls = parsed.max(1);
        }
        self
    }

    /// Sets the failure threshold.
    #[must_use]
    pub const fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold;
        self
    }

    /// Sets the reset timeout in milliseconds.
    #[must_use]
    pub const fn with_reset_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.reset_timeout_ms = timeout_ms;
        self
    }
}

#[derive(Debug)]
enum BreakerState {
    Closed { failures: u32 },
    Open { since: Instant },
    HalfOpen { trials: u32 },
}

/// Closed/open/half-open state machine.
#[derive(Debug)]
pub struct CircuitBreaker {
    state: BreakerState,
    failure_threshold: u32,
    reset_timeout: Duration,
    half_open_max_calls: u32,
    store_name: &'static str,
}

impl CircuitBreaker {
    /// Creates a closed breaker.
    #[must_use]
    pub fn new(config: &StoreResilienceConfig, store_name: &'static str) -> Self {
        Self {
            state: BreakerState::Closed { failures: 0 },
            failure_threshold: config.failure_threshold.max(1),
            reset_timeout: Duration::from_millis(config.reset_timeout_ms),
            half_open_max_calls: config.half_open_max_calls.max(1),
            store_name,
        }
    }

    /// Returns `true` if a call may proceed.
    pub fn allow(&mut self) -> bool {
        match self.state {
            BreakerState::Closed { .. } => true,
            BreakerState::Open { since } => {
                if since.elapsed() < self.reset_timeout {
                    return false;
                }
                tracing::info!(store = self.store_name, "Store circuit half-open");
                self.state = BreakerState::HalfOpen { trials: 1 };
                true
            },
            BreakerState::HalfOpen { ref mut trials } => {
                if *trials >= self.half_open_max_calls {
                    false
                } else {
                    *trials += 1;
                    true
                }
            },
        }
    }

    /// Records a success; closes the circuit.
    pub fn on_success(&mut self) {
        if !matches!(self.state, BreakerState::Closed { failures: 0 }) {
            tracing::info!(store = self.store_name, "Store circuit closed");
        }
        self.state = BreakerState::Closed { failures: 0 };
    }

    /// Records a caller error; the state is kept and a half-open trial slot
    /// is handed back.
    pub fn on_caller_error(&mut self) {
        if let BreakerState::HalfOpen { ref mut trials } = self.state {
            *trials = trials.saturating_sub(1);
        }
    }

    /// Records a failure; returns `true` if this call tripped the circuit.
    pub fn on_failure(&mut self) -> bool {
        let trip = match self.state {
            BreakerState::Closed { ref mut failures } => {
                *failures += 1;
                *failures >= self.failure_threshold
            },
            BreakerState::HalfOpen { .. } => true,
            BreakerState::Open { .. } => false,
        };
        if trip {
            tracing::warn!(
                store = self.store_name,
                threshold = self.failure_threshold,
                "Store circuit opened"
            );
            self.state = BreakerState::Open {
                since: Instant::now(),
            };
        }
        trip
    }

    /// 0 = closed, 1 = open, 2 = half-open.
    #[must_use]
    pub const fn state_value(&self) -> u8 {
        match self.state {
            BreakerState::Closed { .. } => 0,
            BreakerState::Open { .. } => 1,
            BreakerState::HalfOpen { .. } => 2,
        }
    }
}

/// Store wrapper that fails fast while its backend is unhealthy.
pub struct ResilientPlaybookStore<S: PlaybookStore> {
    inner: S,
    breaker: Mutex<CircuitBreaker>,
    store_name: &'static str,
}

impl<S: PlaybookStore> ResilientPlaybookStore<S> {
    /// Wraps a store.
    #[must_use]
    pub fn new(inner: S, config: StoreResilienceConfig, store_name: &'static str) -> Self {
        Self {
            inner,
            breaker: Mutex::new(CircuitBreaker::new(&config, store_name)),
            store_name,
        }
    }

    /// Current breaker state (see [`CircuitBreaker::state_value`]).
    pub fn state_value(&self) -> u8 {
        self.breaker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .state_value()
    }

    fn execute<T, F>(&self, operation: &'static str, call: F) -> Result<T>
    where
        F: FnOnce() -> Result<T>,
    {
        let allowed = self
            .breaker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .allow();
        if !allowed {
            self.record(operation, "circuit_open");
            return Err(Error::OperationFailed {
                operation: format!("store_{operation}"),
                cause: format!("circuit breaker open for store '{}'", self.store_name),
            });
        }

        let result = call();

        let mut breaker = self.breaker.lock().unwrap_or_else(PoisonError::into_inner);
        match &result {
            Err(Error::OperationFailed { .. } | Error::Timeout { .. }) => {
                let tripped = breaker.on_failure();
                drop(breaker);
                self.record(operation, "error");
                if tripped {
                    metrics::counter!(
                        "store_circuit_breaker_trips_total",
                        "store" => self.store_name,
                        "operation" => operation
                    )
                    .increment(1);
                }
            },
            Err(_) => {
                breaker.on_caller_error();
                drop(breaker);
                self.record(operation, "caller_error");
            },
            Ok(_) => {
                breaker.on_success();
                drop(breaker);
                self.record(operation, "success");
            },
        }
        result
    }

    fn record(&self, operation: &'static str, status: &'static str) {
        metrics::counter!(
            "store_requests_total",
            "store" => self.store_name,
            "operation" => operation,
            "status" => status
        )
        .increment(1);
        metrics::gauge!("store_circuit_breaker_state", "store" => self.store_name)
            .set(f64::from(self.state_value()));
    }
}

impl<S: PlaybookStore> PlaybookStore for ResilientPlaybookStore<S> {
    fn create(&self, playbook: &Playbook) -> Result<PlaybookId> {
        self.execute("create", || self.inner.create(playbook))
    }

    fn get(&self, id: &PlaybookId) -> Result<Playbook> {
        self.execute("get", || self.inner.get(id))
    }

    fn get_playbooks(&self) -> Result<Vec<Playbook>> {
        self.execute("get_playbooks", || self.inner.get_playbooks())
    }

    fn get_playbooks_for_team(
        &self,
        requester: &RequesterInfo,
        team_id: &str,
        options: PlaybookFilterOptions,
    ) -> Result<GetPlaybooksResults> {
        self.execute("get_playbooks_for_team", || {
            self.inner.get_playbooks_for_team(requester, team_id, options)
        })
    }

    fn get_num_playbooks_for_team(&self, team_id: &str) -> Result<usize> {
        self.execute("get_num_playbooks_for_team", || {
            self.inner.get_num_playbooks_for_team(team_id)
        })
    }

    fn get_playbook_ids_for_user(&self, user_id: &str, team_id: &str) -> Result<Vec<PlaybookId>> {
        self.execute("get_playbook_ids_for_user", || {
            self.inner.get_playbook_ids_for_user(user_id, team_id)
        })
    }

    fn update(&self, playbook: &Playbook) -> Result<()> {
        self.execute("update", || self.inner.update(playbook))
    }

    fn delete(&self, id: &PlaybookId) -> Result<()> {
        self.execute("delete", || self.inner.delete(id))
    }
}
