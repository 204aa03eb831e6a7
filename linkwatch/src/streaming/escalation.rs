use super::types::StreamError;

/// Consecutive errors after which the stream is shut down
pub const ESCALATION_THRESHOLD: u32 = 3;

/// What the watcher should do after an error was recorded
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EscalationAction {
    /// Log only
    Absorb,
    /// Tell the consumer, keep the stream open
    Warn(String),
    /// Tell the consumer and force the stream closed
    HardStop(String),
}

/// Counts consecutive stream errors and decides when to give up
///
/// The count is reset by every successful connect. Only the first and the
/// third error of a run produce an action; the second is absorbed, and so
/// is anything after the third (the stream is already closing by then).
#[derive(Debug, Clone, Default)]
pub struct ErrorEscalationPolicy {
    consecutive_errors: u32,
}

impl ErrorEscalationPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn consecutive_errors(&self) -> u32 {
        self.consecutive_errors
    }

    pub fn reset(&mut self) {
        self.consecutive_errors = 0;
    }

    /// Record one error and decide the action for it
    pub fn record_error(&mut self, error: &StreamError) -> EscalationAction {
        self.consecutive_errors = self.consecutive_errors.saturating_add(1);

        match self.consecutive_errors {
            1 if error.is_authentication_failure() => EscalationAction::Warn(format!(
                "WARNING: Unable to authenticate the feed stream ({}). Make sure the \
                 credentials are correct and the system clock is accurate. The stream \
                 will attempt to authenticate two more times.",
                error
            )),
            ESCALATION_THRESHOLD if error.is_authentication_failure() => {
                EscalationAction::HardStop(format!(
                    "ERROR: Unable to authenticate the feed credentials ({}). Make sure the \
                     credentials are correct and the system clock is accurate. The feed has \
                     been shut down; you must reconnect manually.",
                    error
                ))
            }
            ESCALATION_THRESHOLD => EscalationAction::HardStop(format!(
                "ERROR: Disconnected from the streaming service ({}). The feed has been \
                 shut down; you must reconnect manually.",
                error
            )),
            _ => EscalationAction::Absorb,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generic() -> StreamError {
        StreamError::new("Connection reset")
    }

    fn auth() -> StreamError {
        StreamError::authentication("Unauthorized")
    }

    #[test]
    fn test_generic_errors_escalate_on_third() {
        let mut policy = ErrorEscalationPolicy::new();

        assert_eq!(policy.record_error(&generic()), EscalationAction::Absorb);
        assert_eq!(policy.record_error(&generic()), EscalationAction::Absorb);
        let action = policy.record_error(&generic());
        assert!(matches!(action, EscalationAction::HardStop(ref m) if m.contains("shut down")));
        assert_eq!(policy.consecutive_errors(), 3);
    }

    #[test]
    fn test_auth_failure_warns_then_stops() {
        let mut policy = ErrorEscalationPolicy::new();

        let first = policy.record_error(&auth());
        assert!(matches!(first, EscalationAction::Warn(ref m) if m.contains("two more times")));
        assert_eq!(policy.record_error(&auth()), EscalationAction::Absorb);
        let third = policy.record_error(&auth());
        assert!(matches!(third, EscalationAction::HardStop(ref m) if m.contains("credentials")));
    }

    #[test]
    fn test_classification_uses_the_threshold_error() {
        let mut policy = ErrorEscalationPolicy::new();
        policy.record_error(&auth());
        policy.record_error(&auth());

        let third = policy.record_error(&generic());
        assert!(matches!(third, EscalationAction::HardStop(ref m) if m.contains("Disconnected")));
    }

    #[test]
    fn test_errors_past_threshold_are_absorbed() {
        let mut policy = ErrorEscalationPolicy::new();
        for _ in 0..3 {
            policy.record_error(&generic());
        }
        assert_eq!(policy.record_error(&generic()), EscalationAction::Absorb);
        assert_eq!(policy.record_error(&auth()), EscalationAction::Absorb);
    }

    #[test]
    fn test_reset_restarts_the_count() {
        let mut policy = ErrorEscalationPolicy::new();
        policy.record_error(&generic());
        policy.record_error(&generic());
        policy.reset();

        assert_eq!(policy.consecutive_errors(), 0);
        assert_eq!(policy.record_error(&generic()), EscalationAction::Absorb);
        assert_eq!(policy.record_error(&generic()), EscalationAction::Absorb);
    }
}
