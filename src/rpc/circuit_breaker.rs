//! The three-state circuit breaker.
//!
//! Direct translation of `psygo/rpc/breaker/breaker.go`'s `CircuitBreaker`:
//! same state machine, same generational counters (a generation rollover
//! invalidates any in-flight `afterRequest` call that started under a
//! now-stale state), same default policy. This guards state behind a
//! single `std::sync::Mutex` rather than lock-free atomics: the source's
//! `NewGeneration`/`SetState` each touch state, counts, and expiry
//! together as one atomic step, and a CAS loop over three fields would be
//! more error-prone here than a short, synchronous critical section.

use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::clock::{Clock, MonotonicClock};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Closed,
    Open,
    HalfOpen,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            State::Closed => write!(f, "closed"),
            State::Open => write!(f, "open"),
            State::HalfOpen => write!(f, "half-open"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counts {
    pub requests: u32,
    pub total_successes: u32,
    pub total_failures: u32,
    pub consecutive_successes: u32,
    pub consecutive_failures: u32,
}

impl Counts {
    fn on_request(&mut self) {
        self.requests += 1;
    }

    fn on_success(&mut self) {
        self.total_successes += 1;
        self.consecutive_successes += 1;
        self.consecutive_failures = 0;
    }

    fn on_fail(&mut self) {
        self.total_failures += 1;
        self.consecutive_failures += 1;
        self.consecutive_successes = 0;
    }

    fn clear(&mut self) {
        *self = Counts::default();
    }
}

/// Error surfaced by [`CircuitBreaker::execute`], generic over the
/// caller's own error type, hand-written rather than `thiserror`-derived
/// since a derive cannot express "wrap any `E`" without forcing
/// `E: std::error::Error` at the derive site.
#[derive(Debug)]
pub enum BreakerError<E> {
    /// The breaker is open (or half-open and already at its probe cap):
    /// the call was short-circuited without running `op`.
    Melted { consecutive_failures: u32 },
    /// `op` ran and failed.
    Inner(E),
}

impl<E: Clone> Clone for BreakerError<E> {
    fn clone(&self) -> Self {
        match self {
            Self::Melted { consecutive_failures } => Self::Melted { consecutive_failures: *consecutive_failures },
            Self::Inner(e) => Self::Inner(e.clone()),
        }
    }
}

impl<E: PartialEq> PartialEq for BreakerError<E> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Melted { consecutive_failures: a }, Self::Melted { consecutive_failures: b }) => a == b,
            (Self::Inner(a), Self::Inner(b)) => a == b,
            _ => false,
        }
    }
}

impl<E: fmt::Display> fmt::Display for BreakerError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Melted { consecutive_failures } => {
                write!(f, "server are melted, please try it later ({consecutive_failures} consecutive failures)")
            }
            Self::Inner(e) => write!(f, "{e}"),
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for BreakerError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Inner(e) => Some(e),
            Self::Melted { .. } => None,
        }
    }
}

impl<E> BreakerError<E> {
    pub fn is_melted(&self) -> bool {
        matches!(self, Self::Melted { .. })
    }

    pub fn into_inner(self) -> Option<E> {
        match self {
            Self::Inner(e) => Some(e),
            Self::Melted { .. } => None,
        }
    }
}

struct Inner {
    state: State,
    generation: u64,
    counts: Counts,
    expiry_millis: Option<u64>,
}

/// Policy knobs, mirroring [`crate::config::BreakerSettings`] plus the two
/// callbacks the settings struct can't carry (it needs to stay
/// `Serialize`/`Deserialize`).
pub struct BreakerSettings {
    pub name: String,
    pub max_requests: u32,
    pub interval: Duration,
    pub timeout: Duration,
    pub ready_to_trip: Box<dyn Fn(&Counts) -> bool + Send + Sync>,
    pub on_state_change: Option<Box<dyn Fn(&str, State, State) + Send + Sync>>,
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self {
            name: String::new(),
            max_requests: 2,
            interval: Duration::ZERO,
            timeout: Duration::from_secs(10),
            ready_to_trip: Box::new(|counts| counts.consecutive_failures > 5),
            on_state_change: None,
        }
    }
}

impl From<&crate::config::BreakerSettings> for BreakerSettings {
    fn from(settings: &crate::config::BreakerSettings) -> Self {
        let threshold = settings.consecutive_failure_threshold;
        Self {
            max_requests: settings.max_requests,
            interval: settings.interval(),
            timeout: settings.timeout(),
            ready_to_trip: Box::new(move |counts| counts.consecutive_failures > threshold),
            ..Default::default()
        }
    }
}

pub struct CircuitBreaker {
    name: String,
    max_requests: u32,
    interval: Duration,
    timeout: Duration,
    ready_to_trip: Box<dyn Fn(&Counts) -> bool + Send + Sync>,
    on_state_change: Option<Box<dyn Fn(&str, State, State) + Send + Sync>>,
    inner: Mutex<Inner>,
    clock: Arc<dyn Clock>,
}

impl CircuitBreaker {
    pub fn new(settings: BreakerSettings) -> Self {
        Self::with_clock(settings, Arc::new(MonotonicClock::default()))
    }

    pub fn with_clock(settings: BreakerSettings, clock: Arc<dyn Clock>) -> Self {
        let breaker = Self {
            name: settings.name,
            max_requests: if settings.max_requests == 0 { 2 } else { settings.max_requests },
            interval: settings.interval,
            timeout: if settings.timeout.is_zero() { Duration::from_secs(10) } else { settings.timeout },
            ready_to_trip: settings.ready_to_trip,
            on_state_change: settings.on_state_change,
            inner: Mutex::new(Inner { state: State::Closed, generation: 0, counts: Counts::default(), expiry_millis: None }),
            clock,
        };
        breaker.new_generation(&mut breaker.inner.lock().expect("breaker mutex poisoned"));
        breaker
    }

    pub fn state(&self) -> State {
        let mut guard = self.inner.lock().expect("breaker mutex poisoned");
        self.current_state(&mut guard)
    }

    pub fn counts(&self) -> Counts {
        self.inner.lock().expect("breaker mutex poisoned").counts
    }

    /// Run `op` through the breaker. `op` only runs when the breaker
    /// admits the call (Closed, or HalfOpen under the probe cap); an
    /// admitted call always counts toward the generation's `Counts` once
    /// it completes, whether it succeeds or fails.
    pub async fn execute<T, E, Fut, Op>(&self, op: Op) -> Result<T, BreakerError<E>>
    where
        Fut: Future<Output = Result<T, E>>,
        Op: FnOnce() -> Fut,
    {
        let generation = match self.before_request() {
            Ok(generation) => generation,
            Err(failures) => return Err(BreakerError::Melted { consecutive_failures: failures }),
        };

        let result = op().await;
        self.after_request(generation, result.is_ok());
        result.map_err(BreakerError::Inner)
    }

    /// `counts.requests` is bumped in `after_request`, once `op` has
    /// actually run, not here: a HalfOpen probe only counts against the
    /// cap after it completes, so `requests > max_requests` (strict) lets
    /// `max_requests + 1` probes be admitted per generation.
    fn before_request(&self) -> Result<u64, u32> {
        let mut guard = self.inner.lock().expect("breaker mutex poisoned");
        let state = self.current_state(&mut guard);
        match state {
            State::Open => Err(guard.counts.consecutive_failures),
            State::HalfOpen if guard.counts.requests > self.max_requests => Err(guard.counts.consecutive_failures),
            _ => Ok(guard.generation),
        }
    }

    fn after_request(&self, before_generation: u64, success: bool) {
        let mut guard = self.inner.lock().expect("breaker mutex poisoned");
        let state = self.current_state(&mut guard);
        if guard.generation != before_generation {
            return;
        }
        guard.counts.on_request();
        if success {
            self.on_success(&mut guard, state);
        } else {
            self.on_fail(&mut guard, state);
        }
    }

    fn on_success(&self, guard: &mut Inner, state: State) {
        match state {
            State::Closed => guard.counts.on_success(),
            State::HalfOpen => {
                guard.counts.on_success();
                if guard.counts.consecutive_successes > self.max_requests {
                    self.set_state(guard, State::Closed);
                }
            }
            State::Open => {}
        }
    }

    fn on_fail(&self, guard: &mut Inner, state: State) {
        match state {
            State::Closed => {
                guard.counts.on_fail();
                if (self.ready_to_trip)(&guard.counts) {
                    self.set_state(guard, State::Open);
                }
            }
            State::HalfOpen => self.set_state(guard, State::Open),
            State::Open => {}
        }
    }

    /// Resolve the externally-visible state, lazily promoting Open to
    /// HalfOpen or rolling Closed's generation when their expiry has
    /// passed. No background timer drives this; every read lazily
    /// settles the state first.
    fn current_state(&self, guard: &mut Inner) -> State {
        let now = self.clock.now_millis();
        match guard.state {
            State::Closed => {
                if let Some(expiry) = guard.expiry_millis {
                    if expiry < now {
                        self.new_generation(guard);
                    }
                }
            }
            State::Open => {
                if guard.expiry_millis.map(|e| e < now).unwrap_or(false) {
                    self.set_state(guard, State::HalfOpen);
                }
            }
            State::HalfOpen => {}
        }
        guard.state
    }

    fn set_state(&self, guard: &mut Inner, target: State) {
        if guard.state == target {
            return;
        }
        let before = guard.state;
        guard.state = target;
        self.new_generation(guard);
        if let Some(callback) = &self.on_state_change {
            callback(&self.name, before, target);
        }
    }

    fn new_generation(&self, guard: &mut Inner) {
        guard.generation += 1;
        guard.counts.clear();
        let now = self.clock.now_millis();
        guard.expiry_millis = match guard.state {
            State::Closed => {
                if self.interval.is_zero() {
                    None
                } else {
                    Some(now + self.interval.as_millis() as u64)
                }
            }
            State::Open => Some(now + self.timeout.as_millis() as u64),
            State::HalfOpen => None,
        };
    }
}
