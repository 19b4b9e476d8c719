/// Failure reported by the browser boundary or raised inside an attempt.
///
/// Faults are plain values so the retry controller can hand the exact last
/// error back to its caller.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Fault {
    #[error("transient UI fault: {0}")]
    Transient(String),

    #[error("element not found: {0}")]
    ElementNotFound(String),

    #[error("posting no longer available: {0}")]
    PostingGone(String),

    #[error("unanswerable question: {0}")]
    Unanswerable(String),

    #[error("browser session lost: {0}")]
    SessionLost(String),

    #[error("application form did not reach review within {0} pages")]
    FormLoop(u32),

    /// The platform refuses further applications today.
    #[error("platform daily application limit reached: {0}")]
    DailyLimit(String),
}

impl Fault {
    /// Whether another try of the same unit may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Fault::Transient(_) | Fault::ElementNotFound(_))
    }

    /// Whether the run itself must stop.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Fault::SessionLost(_) | Fault::DailyLimit(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_ui_flakes_are_retryable() {
        assert!(Fault::Transient("timeout".into()).is_retryable());
        assert!(Fault::ElementNotFound("#apply".into()).is_retryable());
        assert!(!Fault::PostingGone("J1".into()).is_retryable());
        assert!(!Fault::Unanswerable("Salary?".into()).is_retryable());
        assert!(!Fault::FormLoop(10).is_retryable());
        assert!(Fault::SessionLost("gone".into()).is_fatal());
        assert!(!Fault::SessionLost("gone".into()).is_retryable());
        assert!(Fault::DailyLimit("come back tomorrow".into()).is_fatal());
        assert!(!Fault::DailyLimit("come back tomorrow".into()).is_retryable());
    }
}
