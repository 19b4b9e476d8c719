//! Bounded retry with randomized pacing, used for single UI actions and for
//! whole application attempts alike.
use crate::driver::{BrowserDriver, Pacer, Screenshot};
use crate::fault::Fault;
use hireloop_config::RetryConfig;
use rand::rngs::OsRng;
use rand::Rng;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total tries, including the first one.
    pub attempts: u32,
    pub min_delay: Duration,
    pub max_delay: Duration,
    pub capture_screenshots: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            min_delay: Duration::from_millis(500),
            max_delay: Duration::from_millis(2_000),
            capture_screenshots: true,
        }
    }
}

impl RetryPolicy {
    /// Policy for single UI actions.
    pub fn for_actions(config: &RetryConfig) -> Self {
        Self {
            attempts: config.attempts.max(1),
            min_delay: config.min_delay(),
            max_delay: config.max_delay(),
            capture_screenshots: config.error_screenshot,
        }
    }

    /// Policy for whole application attempts. Screenshots are already taken
    /// by the action-level supervisor.
    pub fn for_attempts(config: &RetryConfig) -> Self {
        Self {
            attempts: config.attempts_per_job.max(1),
            capture_screenshots: false,
            ..Self::for_actions(config)
        }
    }

    fn next_delay(&self) -> Duration {
        let min = self.min_delay.as_millis() as u64;
        let max = (self.max_delay.as_millis() as u64).max(min);
        Duration::from_millis(OsRng.gen_range(min..=max))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Supervised<T> {
    Succeeded {
        value: T,
        /// Failed tries before the successful one.
        retries: u32,
    },
    Escalated {
        /// The last error, exactly as the unit returned it.
        error: Fault,
        attempts: u32,
        screenshot: Option<Screenshot>,
    },
}

pub struct RetryController {
    policy: RetryPolicy,
    pacer: Arc<dyn Pacer>,
    screenshots: Option<Arc<dyn BrowserDriver>>,
}

impl RetryController {
    pub fn new(policy: RetryPolicy, pacer: Arc<dyn Pacer>) -> Self {
        Self {
            policy,
            pacer,
            screenshots: None,
        }
    }

    /// Request a diagnostic capture from `driver` when a unit escalates.
    pub fn with_screenshots(mut self, driver: Arc<dyn BrowserDriver>) -> Self {
        self.screenshots = Some(driver);
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run `unit` until it succeeds, fails with a non-retryable fault, or the
    /// policy's tries are used up.
    pub async fn supervise<T, F, Fut>(&self, label: &str, mut unit: F) -> Supervised<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, Fault>>,
    {
        let mut tried = 0;
        loop {
            tried += 1;

            let error = match unit().await {
                Ok(value) => {
                    return Supervised::Succeeded {
                        value,
                        retries: tried - 1,
                    }
                }
                Err(error) => error,
            };

            if self.allow_retry(label, tried, &error).await {
                continue;
            }

            warn!(label, tried, error = %error, "retry.escalated");
            let screenshot = self.capture(label).await;
            return Supervised::Escalated {
                error,
                attempts: tried,
                screenshot,
            };
        }
    }

    /// Whether a unit that failed its `tried`-th try with `error` may run
    /// again. Pauses before returning `true`.
    ///
    /// For units that cannot be wrapped in a closure, such as a posting
    /// stream that must be re-queried.
    pub async fn allow_retry(&self, label: &str, tried: u32, error: &Fault) -> bool {
        let attempts = self.policy.attempts.max(1);
        if !error.is_retryable() || tried >= attempts {
            return false;
        }
        warn!(label, tried, attempts, error = %error, "retry.failed_try");
        let delay = self.policy.next_delay();
        debug!(label, tried, delay_ms = delay.as_millis() as u64, "retry.backoff");
        self.pacer.pause(delay).await;
        true
    }

    async fn capture(&self, label: &str) -> Option<Screenshot> {
        if !self.policy.capture_screenshots {
            return None;
        }
        let driver = self.screenshots.as_ref()?;
        match driver.capture_screenshot(label).await {
            Ok(shot) => Some(shot),
            Err(err) => {
                warn!(label, error = %err, "retry.screenshot_failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{Action, ActionOutput, InstantPacer};
    use crate::posting::{JobPosting, SearchFacet};
    use async_trait::async_trait;
    use futures::stream::{self, BoxStream, StreamExt};
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn policy(attempts: u32) -> RetryPolicy {
        RetryPolicy {
            attempts,
            min_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(300),
            capture_screenshots: true,
        }
    }

    /// Fails the first `failures` calls with a transient fault.
    async fn flaky(calls: &AtomicU32, failures: u32) -> Result<&'static str, Fault> {
        let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
        if n <= failures {
            Err(Fault::Transient(format!("try {n}")))
        } else {
            Ok("done")
        }
    }

    struct CameraDriver {
        broken: bool,
    }

    #[async_trait]
    impl BrowserDriver for CameraDriver {
        fn fetch_postings<'a>(
            &'a self,
            _facet: &'a SearchFacet,
            _known: &'a HashSet<String>,
        ) -> BoxStream<'a, Result<JobPosting, Fault>> {
            stream::empty().boxed()
        }

        async fn perform(&self, _action: &Action) -> Result<ActionOutput, Fault> {
            Ok(ActionOutput::Done)
        }

        async fn capture_screenshot(&self, label: &str) -> anyhow::Result<Screenshot> {
            if self.broken {
                anyhow::bail!("camera broken");
            }
            Ok(Screenshot {
                location: format!("/tmp/{label}.png"),
            })
        }
    }

    #[tokio::test]
    async fn succeeds_after_one_fewer_failures_than_attempts() {
        let pacer = Arc::new(InstantPacer::default());
        let controller = RetryController::new(policy(3), pacer.clone());
        let calls = AtomicU32::new(0);

        let result = controller.supervise("click", || flaky(&calls, 2)).await;

        assert_eq!(
            result,
            Supervised::Succeeded {
                value: "done",
                retries: 2
            }
        );
        let delays = pacer.requested();
        assert_eq!(delays.len(), 2);
        assert!(delays
            .iter()
            .all(|d| *d >= Duration::from_millis(100) && *d <= Duration::from_millis(300)));
    }

    #[tokio::test]
    async fn exhausting_attempts_returns_the_last_error_unchanged() {
        let controller = RetryController::new(policy(3), Arc::new(InstantPacer::default()))
            .with_screenshots(Arc::new(CameraDriver { broken: false }));
        let calls = AtomicU32::new(0);

        let result = controller.supervise("click", || flaky(&calls, 3)).await;

        assert_eq!(
            result,
            Supervised::Escalated {
                error: Fault::Transient("try 3".into()),
                attempts: 3,
                screenshot: Some(Screenshot {
                    location: "/tmp/click.png".into()
                }),
            }
        );
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn non_retryable_faults_escalate_immediately() {
        let pacer = Arc::new(InstantPacer::default());
        let controller = RetryController::new(policy(5), pacer.clone());
        let calls = AtomicU32::new(0);

        let result: Supervised<()> = controller
            .supervise("open", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(Fault::PostingGone("J1".into()))
            })
            .await;

        assert!(matches!(
            result,
            Supervised::Escalated { error: Fault::PostingGone(_), attempts: 1, .. }
        ));
        assert!(pacer.requested().is_empty());
    }

    #[tokio::test]
    async fn manual_retries_follow_the_same_budget() {
        let pacer = Arc::new(InstantPacer::default());
        let controller = RetryController::new(policy(3), pacer.clone());
        let flake = Fault::Transient("page load timeout".into());

        assert!(controller.allow_retry("fetch", 1, &flake).await);
        assert!(controller.allow_retry("fetch", 2, &flake).await);
        assert!(!controller.allow_retry("fetch", 3, &flake).await);
        assert!(
            !controller
                .allow_retry("fetch", 1, &Fault::SessionLost("gone".into()))
                .await
        );
        assert_eq!(pacer.requested().len(), 2);
    }

    #[tokio::test]
    async fn screenshot_failures_never_abort_supervision() {
        let controller = RetryController::new(policy(1), Arc::new(InstantPacer::default()))
            .with_screenshots(Arc::new(CameraDriver { broken: true }));
        let calls = AtomicU32::new(0);

        let result = controller.supervise("submit", || flaky(&calls, 1)).await;

        assert_eq!(
            result,
            Supervised::Escalated {
                error: Fault::Transient("try 1".into()),
                attempts: 1,
                screenshot: None,
            }
        );
    }
}
