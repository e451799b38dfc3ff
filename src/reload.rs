//! Retry/Reload Policy
//!
//! Each dashboard section gets a small bounded-retry lifecycle. A fetch can
//! succeed at the transport level and still hand back an unusable value
//! (None, NaN), so "bad data" is tracked separately from hard errors but
//! retried the same way.
//!
//! ```text
//! Loading ──good──▶ Success
//!    │
//!    └──bad/err──▶ Retry ──bad/err (attempts < max)──▶ Retry
//!                    │  └──bad/err (attempts == max)──▶ Failed
//!                    └──good──▶ Success
//! ```
//!
//! Delays are fixed, not exponential.

use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, warn};

// ============================================
// CONSTANTS
// ============================================

/// Refetches before giving up
pub const MAX_ATTEMPTS: u32 = 2;

/// Delay before the first refetch
pub const FIRST_RETRY_DELAY: Duration = Duration::from_millis(3000);

/// Delay before every later refetch
pub const RETRY_DELAY: Duration = Duration::from_millis(5000);

// ============================================
// STATE
// ============================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LoadingState {
    Loading,
    Retry,
    Failed,
    Success,
}

impl LoadingState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, LoadingState::Failed | LoadingState::Success)
    }
}

impl fmt::Display for LoadingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadingState::Loading => write!(f, "LOADING"),
            LoadingState::Retry => write!(f, "RETRY"),
            LoadingState::Failed => write!(f, "FAILED"),
            LoadingState::Success => write!(f, "SUCCESS"),
        }
    }
}

/// How one fetch attempt ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    Good,
    BadData,
    Error,
}

/// What the driver should do next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadAction {
    Refetch { after: Duration },
    Done(LoadingState),
}

#[derive(Debug, Clone, Copy)]
pub struct ReloadPolicy {
    pub max_attempts: u32,
    pub first_delay: Duration,
    pub delay: Duration,
    /// Accept whatever the first fetch returns
    pub no_retry: bool,
}

impl Default for ReloadPolicy {
    fn default() -> Self {
        Self {
            max_attempts: MAX_ATTEMPTS,
            first_delay: FIRST_RETRY_DELAY,
            delay: RETRY_DELAY,
            no_retry: false,
        }
    }
}

/// The state machine itself, free of any timer
#[derive(Debug, Clone)]
pub struct ReloadTracker {
    policy: ReloadPolicy,
    state: LoadingState,
    attempts: u32,
    history: Vec<LoadingState>,
}

impl ReloadTracker {
    pub fn new(policy: ReloadPolicy) -> Self {
        Self {
            policy,
            state: LoadingState::Loading,
            attempts: 0,
            history: vec![LoadingState::Loading],
        }
    }

    pub fn state(&self) -> LoadingState {
        self.state
    }

    /// Refetches issued so far
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Every state entered, starting with Loading
    pub fn history(&self) -> &[LoadingState] {
        &self.history
    }

    fn enter(&mut self, state: LoadingState) {
        self.state = state;
        self.history.push(state);
    }

    /// Feed the outcome of the latest attempt
    pub fn on_outcome(&mut self, outcome: FetchOutcome) -> ReloadAction {
        if self.state.is_terminal() {
            return ReloadAction::Done(self.state);
        }

        let retryable = match outcome {
            FetchOutcome::Good => false,
            FetchOutcome::BadData => !self.policy.no_retry,
            FetchOutcome::Error => true,
        };

        if !retryable {
            self.enter(LoadingState::Success);
            return ReloadAction::Done(LoadingState::Success);
        }

        if self.attempts >= self.policy.max_attempts {
            self.enter(LoadingState::Failed);
            return ReloadAction::Done(LoadingState::Failed);
        }

        let after = if self.attempts == 0 {
            self.policy.first_delay
        } else {
            self.policy.delay
        };
        self.attempts += 1;
        self.enter(LoadingState::Retry);

        ReloadAction::Refetch { after }
    }
}

// ============================================
// TIMER
// ============================================

/// Injectable sleep so tests never wait on a real clock
#[async_trait]
pub trait Timer: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Real timer on the tokio runtime
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioTimer;

#[async_trait]
impl Timer for TokioTimer {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

// ============================================
// DRIVER
// ============================================

/// Final result of a reload cycle
#[derive(Debug)]
pub struct Reloaded<T> {
    pub state: LoadingState,
    pub value: Option<T>,
    pub refetches: u32,
}

/// Runs a section fetch under a [`ReloadPolicy`]
pub struct Reloader<'a> {
    name: String,
    policy: ReloadPolicy,
    timer: &'a dyn Timer,
}

impl<'a> Reloader<'a> {
    pub fn new(name: impl Into<String>, policy: ReloadPolicy, timer: &'a dyn Timer) -> Self {
        Self {
            name: name.into(),
            policy,
            timer,
        }
    }

    /// Fetch, classify, and refetch until a terminal state.
    ///
    /// `is_good` decides whether a successfully fetched value is usable. When
    /// retry is suppressed a bad value is still returned as the final value.
    pub async fn run<T, F, Fut>(&self, mut fetch: F, is_good: impl Fn(&T) -> bool) -> Reloaded<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = eyre::Result<T>>,
    {
        let mut tracker = ReloadTracker::new(self.policy);
        let mut last = None;

        loop {
            let outcome = match fetch().await {
                Ok(value) => {
                    let outcome = if is_good(&value) {
                        FetchOutcome::Good
                    } else {
                        FetchOutcome::BadData
                    };
                    last = Some(value);
                    outcome
                }
                Err(e) => {
                    warn!("{}: fetch failed: {}", self.name, e);
                    last = None;
                    FetchOutcome::Error
                }
            };

            match tracker.on_outcome(outcome) {
                ReloadAction::Refetch { after } => {
                    info!(
                        "{}: data temporarily unavailable, retrying in {:?} (attempt {}/{})",
                        self.name,
                        after,
                        tracker.attempts(),
                        self.policy.max_attempts
                    );
                    self.timer.sleep(after).await;
                }
                ReloadAction::Done(state) => {
                    debug!("{}: {} after {} refetches", self.name, state, tracker.attempts());
                    return Reloaded {
                        state,
                        value: if state == LoadingState::Success { last } else { None },
                        refetches: tracker.attempts(),
                    };
                }
            }
        }
    }
}
