use crate::engine::session::{Session, SessionProvider};
use std::time::Duration;
use thiserror::Error;

/// Reconnect attempts ran out. The run cannot continue.
#[derive(Debug, Error)]
#[error("browser reconnect failed after {attempts} attempts: {last_error}")]
pub struct ReconnectFailed {
    pub attempts: usize,
    pub last_error: String,
}

/// When and how hard to reconnect
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReconnectPolicy {
    /// Back-to-back transient failures that trigger a reconnect
    pub max_consecutive_errors: usize,
    /// Session acquisitions tried per reconnect
    pub attempts: usize,
    /// Sleep between acquisitions
    pub delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_consecutive_errors: 3,
            attempts: 3,
            delay: Duration::from_secs(1),
        }
    }
}

/// Counts consecutive transient failures and re-acquires the session when
/// they pile up
#[derive(Debug, Clone)]
pub struct ConnectionSupervisor {
    policy: ReconnectPolicy,
    consecutive_errors: usize,
    reconnects: usize,
}

impl ConnectionSupervisor {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self {
            policy,
            consecutive_errors: 0,
            reconnects: 0,
        }
    }

    pub fn record_failure(&mut self) {
        self.consecutive_errors += 1;
    }

    pub fn record_success(&mut self) {
        self.consecutive_errors = 0;
    }

    pub fn should_reconnect(&self) -> bool {
        self.consecutive_errors >= self.policy.max_consecutive_errors
    }

    pub fn consecutive_errors(&self) -> usize {
        self.consecutive_errors
    }

    /// Successful reconnects so far
    pub fn reconnects(&self) -> usize {
        self.reconnects
    }

    /// Acquire a fresh session, trying up to `policy.attempts` times.
    ///
    /// The caller replaces its session with the returned one. On success the
    /// failure counter is reset.
    pub fn reconnect<S: SessionProvider>(
        &mut self,
        provider: &S,
    ) -> std::result::Result<Session<S::Handle, S::Page>, ReconnectFailed> {
        log::warn!(
            "{} consecutive failures, reconnecting to the browser",
            self.consecutive_errors
        );

        let mut last_error = String::from("no attempts configured");
        for attempt in 1..=self.policy.attempts {
            match Session::open(provider) {
                Ok(session) => {
                    log::info!("Browser reconnected on attempt {}/{}", attempt, self.policy.attempts);
                    self.consecutive_errors = 0;
                    self.reconnects += 1;
                    return Ok(session);
                }
                Err(e) => {
                    log::error!("Reconnect attempt {}/{} failed: {}", attempt, self.policy.attempts, e);
                    last_error = e.to_string();
                    if attempt < self.policy.attempts && !self.policy.delay.is_zero() {
                        std::thread::sleep(self.policy.delay);
                    }
                }
            }
        }

        Err(ReconnectFailed {
            attempts: self.policy.attempts,
            last_error,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::memory::{MemoryPage, MemoryProvider};

    fn policy() -> ReconnectPolicy {
        ReconnectPolicy {
            delay: Duration::ZERO,
            ..Default::default()
        }
    }

    #[test]
    fn test_threshold() {
        let mut supervisor = ConnectionSupervisor::new(policy());
        supervisor.record_failure();
        supervisor.record_failure();
        assert!(!supervisor.should_reconnect());
        supervisor.record_failure();
        assert!(supervisor.should_reconnect());

        supervisor.record_success();
        assert_eq!(supervisor.consecutive_errors(), 0);
        assert!(!supervisor.should_reconnect());
    }

    #[test]
    fn test_reconnect_success_resets() {
        let page = MemoryPage::new();
        page.disconnect();
        let provider = MemoryProvider::new(page);
        let mut supervisor = ConnectionSupervisor::new(policy());
        for _ in 0..3 {
            supervisor.record_failure();
        }

        let session = supervisor.reconnect(&provider).unwrap();
        assert_eq!(session.handle, 1);
        assert_eq!(supervisor.consecutive_errors(), 0);
        assert_eq!(supervisor.reconnects(), 1);
    }

    #[test]
    fn test_reconnect_exhausts_attempts() {
        let provider = MemoryProvider::new(MemoryPage::new());
        provider.refuse_connections(true);
        let mut supervisor = ConnectionSupervisor::new(policy());

        let err = supervisor.reconnect(&provider).err().unwrap();
        assert_eq!(err.attempts, 3);
        assert!(err.last_error.contains("refused"));
        assert_eq!(provider.connect_attempts(), 3);
    }
}
