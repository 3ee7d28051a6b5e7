use std::time::Duration;

use crate::store::StorageBackend;

pub const DEFAULT_MAX_CONNECT_ATTEMPTS: u32 = 30;
pub const DEFAULT_CONNECT_RETRY_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectRetryPolicy {
    max_attempts: u32,
    delay: Duration,
}

impl ConnectRetryPolicy {
    /// `max_attempts` below one is raised to one; the gate always probes once.
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }
}

impl Default for ConnectRetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CONNECT_ATTEMPTS, DEFAULT_CONNECT_RETRY_DELAY)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryState {
    attempts: u32,
    max_attempts: u32,
}

impl RetryState {
    pub fn new(policy: &ConnectRetryPolicy) -> Self {
        Self {
            attempts: 0,
            max_attempts: policy.max_attempts(),
        }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Claims the next attempt number, or `None` once the budget is spent.
    pub fn begin_attempt(&mut self) -> Option<u32> {
        if self.is_exhausted() {
            return None;
        }
        self.attempts += 1;
        Some(self.attempts)
    }

    pub fn is_exhausted(&self) -> bool {
        self.attempts >= self.max_attempts
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateOutcome {
    Ready {
        attempts: u32,
        waited: Duration,
    },
    TimedOut {
        attempts: u32,
        waited: Duration,
        last_error: String,
    },
}

impl GateOutcome {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready { .. })
    }

    pub fn attempts(&self) -> u32 {
        match self {
            Self::Ready { attempts, .. } | Self::TimedOut { attempts, .. } => *attempts,
        }
    }

    pub fn waited(&self) -> Duration {
        match self {
            Self::Ready { waited, .. } | Self::TimedOut { waited, .. } => *waited,
        }
    }
}

/// Probes `storage` until it answers or the policy's attempt budget is spent.
///
/// Sleeps the fixed delay between failed probes only; a successful probe
/// returns immediately and the final failure does not sleep.
pub async fn await_ready<S>(storage: &S, policy: &ConnectRetryPolicy) -> GateOutcome
where
    S: StorageBackend + ?Sized,
{
    let mut state = RetryState::new(policy);
    let mut waited = Duration::ZERO;
    let mut last_error = String::new();

    while let Some(attempt) = state.begin_attempt() {
        match storage.probe() {
            Ok(()) => {
                tracing::info!(
                    attempt,
                    max_attempts = policy.max_attempts(),
                    "database connection established"
                );
                return GateOutcome::Ready {
                    attempts: attempt,
                    waited,
                };
            }
            Err(error) => {
                tracing::warn!(
                    attempt,
                    max_attempts = policy.max_attempts(),
                    error = %error,
                    "database not ready"
                );
                last_error = error.to_string();
                if !state.is_exhausted() {
                    tokio::time::sleep(policy.delay()).await;
                    waited += policy.delay();
                }
            }
        }
    }

    tracing::error!(
        attempts = state.attempts(),
        error = %last_error,
        "database connection timed out"
    );
    GateOutcome::TimedOut {
        attempts: state.attempts(),
        waited,
        last_error,
    }
}
