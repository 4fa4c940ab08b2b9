//! Retry state machine for a test session.
//!
//! The transition function is pure: given the attempt that just finished and
//! the keep-alive policy, it decides whether the session ends or reruns the
//! failed specs.

/// Total attempts per session, including the first run.
pub const MAX_ATTEMPTS: u32 = 3;

/// One spawn-and-wait cycle of the test runner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attempt {
    /// 1-based attempt number.
    pub number: u32,
    /// Specs selected for this attempt.
    pub specs: Vec<String>,
    /// Captured stdout, complete once the child has exited.
    pub output: Vec<u8>,
    /// `None` while running, or when the child was killed by a signal.
    pub exit_code: Option<i32>,
}

impl Attempt {
    pub fn new(number: u32, specs: Vec<String>) -> Self {
        Self {
            number,
            specs,
            output: Vec::new(),
            exit_code: None,
        }
    }

    pub fn succeeded(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Exit code reported to the host for a failed attempt.
    pub fn failure_code(&self) -> i32 {
        match self.exit_code {
            Some(code) if code != 0 => code,
            _ => 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Running { attempt: u32 },
    RetryPending { attempt: u32, specs: Vec<String> },
    Success,
    /// The run failed and keep-alive is off.
    Failed { exit_code: i32 },
    /// Every attempt failed.
    GaveUp { exit_code: i32 },
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionState::Success | SessionState::Failed { .. } | SessionState::GaveUp { .. }
        )
    }
}

/// Decide what follows a finished attempt.
///
/// `failed_specs` are the (already remapped) specs extracted from the
/// attempt's output. An empty list on a non-zero exit still retries, which
/// reruns the entrypoint with an empty spec selection.
pub fn after_attempt(attempt: &Attempt, keep_alive: bool, failed_specs: Vec<String>) -> SessionState {
    if attempt.succeeded() {
        return SessionState::Success;
    }
    let exit_code = attempt.failure_code();
    if !keep_alive {
        return SessionState::Failed { exit_code };
    }
    if attempt.number >= MAX_ATTEMPTS {
        return SessionState::GaveUp { exit_code };
    }
    SessionState::RetryPending {
        attempt: attempt.number + 1,
        specs: failed_specs,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finished(number: u32, exit_code: Option<i32>) -> Attempt {
        Attempt {
            exit_code,
            ..Attempt::new(number, vec!["a.js".to_string()])
        }
    }

    #[test]
    fn zero_exit_is_success() {
        let state = after_attempt(&finished(2, Some(0)), true, Vec::new());
        assert_eq!(state, SessionState::Success);
        assert!(state.is_terminal());
    }

    #[test]
    fn failure_without_keep_alive_is_terminal() {
        let state = after_attempt(&finished(1, Some(1)), false, vec!["a.js".to_string()]);
        assert_eq!(state, SessionState::Failed { exit_code: 1 });
    }

    #[test]
    fn failure_with_keep_alive_retries_failed_specs() {
        let state = after_attempt(&finished(1, Some(2)), true, vec!["b.js".to_string()]);
        assert_eq!(
            state,
            SessionState::RetryPending {
                attempt: 2,
                specs: vec!["b.js".to_string()]
            }
        );
        assert!(!state.is_terminal());
    }

    #[test]
    fn last_attempt_gives_up_with_its_exit_code() {
        let state = after_attempt(&finished(MAX_ATTEMPTS, Some(7)), true, Vec::new());
        assert_eq!(state, SessionState::GaveUp { exit_code: 7 });
    }

    // Known edge: a crash with no recognizable failures still retries, with
    // nothing selected.
    #[test]
    fn empty_failed_set_still_retries() {
        let state = after_attempt(&finished(1, Some(1)), true, Vec::new());
        assert_eq!(
            state,
            SessionState::RetryPending {
                attempt: 2,
                specs: Vec::new()
            }
        );
    }

    #[test]
    fn signal_termination_reports_generic_failure() {
        let state = after_attempt(&finished(1, None), false, Vec::new());
        assert_eq!(state, SessionState::Failed { exit_code: 1 });
    }
}
