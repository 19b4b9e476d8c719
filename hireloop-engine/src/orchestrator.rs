//! The top-level run loop.
//!
//! One worker, one browser session, strictly sequential: pick a facet, stream
//! its postings, filter them, apply to the admitted ones and record every
//! terminal outcome before touching the next posting.
use crate::answers::{AnswerBook, AnswerCache};
use crate::attempt::{ApplicationAttempt, ApplicationFlow, AttemptEnd, AttemptState};
use crate::cycler::{CyclerStep, FacetCycler};
use crate::driver::{AnswerProvider, BrowserDriver, Pacer};
use crate::fault::Fault;
use crate::filter::{evaluate, history_blocks, DecisionReason};
use crate::history::{HistoryRecord, HistoryStore, Outcome};
use crate::posting::{JobPosting, SearchFacet};
use crate::retry::{RetryController, RetryPolicy, Supervised};
use anyhow::Result;
use chrono::{DateTime, Local, Utc};
use futures::StreamExt;
use hireloop_config::RunConfig;
use rand::rngs::OsRng;
use rand::Rng;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    Exhausted,
    VolumeCap,
    /// Today's submissions, across runs, reached the configured daily cap.
    DailyCap,
    /// The platform itself refused further applications today.
    PlatformLimit,
    TimeBudget,
    Cancelled,
    SessionLost(String),
}

impl StopReason {
    /// The stop a fault forces on the whole run, if any.
    fn for_fault(fault: &Fault) -> Option<Self> {
        match fault {
            Fault::SessionLost(_) => Some(StopReason::SessionLost(fault.to_string())),
            Fault::DailyLimit(_) => Some(StopReason::PlatformLimit),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    /// Seed of the term permutation, when it was randomized.
    pub seed: Option<u64>,
    pub submitted: u32,
    pub rejected: u32,
    pub duplicates: u32,
    pub failed: u32,
    pub skipped: u32,
    pub paused_for_review: u32,
    pub stop_reason: StopReason,
    pub paused_jobs: Vec<String>,
}

impl RunReport {
    fn new(run_id: Uuid, seed: Option<u64>) -> Self {
        Self {
            run_id,
            seed,
            submitted: 0,
            rejected: 0,
            duplicates: 0,
            failed: 0,
            skipped: 0,
            paused_for_review: 0,
            stop_reason: StopReason::Exhausted,
            paused_jobs: Vec::new(),
        }
    }

    /// Process exit code: non-zero only when the browser session died.
    pub fn exit_code(&self) -> i32 {
        match self.stop_reason {
            StopReason::SessionLost(_) => 1,
            _ => 0,
        }
    }
}

/// Terminal result of one admitted posting.
struct Settled {
    state: AttemptState,
    /// What goes into history; `None` leaves the job untouched for a later day.
    outcome: Option<Outcome>,
    reason: Option<String>,
    /// Set when nothing else can run after this attempt.
    stop: Option<StopReason>,
}

pub struct RunOrchestrator {
    config: Arc<RunConfig>,
    driver: Arc<dyn BrowserDriver>,
    history: HistoryStore,
    cycler: FacetCycler,
    flow: ApplicationFlow,
    jobs: RetryController,
    fetches: RetryController,
    pacer: Arc<dyn Pacer>,
    run_id: Uuid,
    seed: Option<u64>,
    /// Submissions recorded since local midnight before this run started.
    submitted_earlier_today: u32,
    cancel: CancellationToken,
}

impl RunOrchestrator {
    /// Wire the run together. Persisted answers are loaded into the cache.
    pub async fn new(
        config: Arc<RunConfig>,
        driver: Arc<dyn BrowserDriver>,
        provider: Arc<dyn AnswerProvider>,
        pacer: Arc<dyn Pacer>,
        history: HistoryStore,
        cancel: CancellationToken,
    ) -> Result<Self> {
        let (cycler, seed) = FacetCycler::from_config(&config.search);
        let cache = if config.answers.persist {
            AnswerCache::from_records(history.load_answers().await?)
        } else {
            AnswerCache::default()
        };

        let actions = RetryController::new(RetryPolicy::for_actions(&config.retry), pacer.clone())
            .with_screenshots(driver.clone());
        let flow = ApplicationFlow::new(
            driver.clone(),
            AnswerBook::new(&config.answers, &config.profile),
            provider,
            config.profile.clone(),
            config.application.clone(),
            actions,
            cache,
        );
        let jobs = RetryController::new(RetryPolicy::for_attempts(&config.retry), pacer.clone());
        let fetches = RetryController::new(RetryPolicy::for_actions(&config.retry), pacer.clone());

        Ok(Self {
            config,
            driver,
            history,
            cycler,
            flow,
            jobs,
            fetches,
            pacer,
            run_id: Uuid::new_v4(),
            seed,
            submitted_earlier_today: 0,
            cancel,
        })
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    pub async fn run(&mut self) -> Result<RunReport> {
        let started = Instant::now();
        let mut report = RunReport::new(self.run_id, self.seed);
        let mut attempted: HashSet<String> = HashSet::new();
        let mut last_pass = 0;
        if self.config.limits.max_applications_per_day.is_some() {
            self.submitted_earlier_today = self.history.submitted_since(start_of_local_day()).await?;
        }
        info!(
            run_id = %self.run_id,
            known_jobs = self.history.len(),
            submitted_today = self.submitted_earlier_today,
            "orchestrator.run.start"
        );

        'facets: loop {
            if let Some(reason) = self.should_stop(started, &report) {
                report.stop_reason = reason;
                break;
            }
            let facet = match self.cycler.next() {
                CyclerStep::Facet(facet) => facet,
                CyclerStep::Exhausted => {
                    report.stop_reason = StopReason::Exhausted;
                    break;
                }
            };
            if facet.pass > last_pass {
                if last_pass > 0 {
                    self.pause_between_passes(facet.pass).await;
                    if let Some(reason) = self.should_stop(started, &report) {
                        report.stop_reason = reason;
                        break;
                    }
                }
                last_pass = facet.pass;
            }
            info!(facet = %facet, "orchestrator.facet.start");

            let driver = self.driver.clone();
            let mut fetch_tries = 0;
            'fetch: loop {
                fetch_tries += 1;
                let known = self.known_ids(&attempted);
                let mut postings = driver.fetch_postings(&facet, &known);
                while let Some(item) = postings.next().await {
                    if let Some(reason) = self.should_stop(started, &report) {
                        report.stop_reason = reason;
                        break 'facets;
                    }
                    let posting = match item {
                        Ok(posting) => posting,
                        Err(fault) => {
                            if let Some(reason) = StopReason::for_fault(&fault) {
                                warn!(facet = %facet, error = %fault, "orchestrator.fetch_stopped_run");
                                report.stop_reason = reason;
                                break 'facets;
                            }
                            if self.fetches.allow_retry("fetch_postings", fetch_tries, &fault).await {
                                continue 'fetch;
                            }
                            warn!(facet = %facet, tries = fetch_tries, error = %fault, "orchestrator.fetch_failed");
                            break 'fetch;
                        }
                    };

                    if self.config.search.easy_apply_only && !posting.easy_apply {
                        debug!(job_id = %posting.id, "orchestrator.posting.not_easy_apply");
                        continue;
                    }
                    if !attempted.insert(posting.id.clone()) {
                        report.duplicates += 1;
                        continue;
                    }

                    let decision = evaluate(&posting, &self.config.filters, &self.history);
                    if !decision.admit {
                        if decision.reason == DecisionReason::AlreadyProcessed {
                            debug!(job_id = %posting.id, "orchestrator.posting.duplicate");
                            report.duplicates += 1;
                        } else {
                            info!(job_id = %posting.id, reason = %decision.describe(), "orchestrator.posting.rejected");
                            report.rejected += 1;
                            self.record(&posting, &facet, Outcome::Rejected, Some(decision.describe()))
                                .await?;
                        }
                        continue;
                    }
                    if let Some(signal) = &decision.company_signal {
                        debug!(job_id = %posting.id, signal = ?signal, "orchestrator.company_signal");
                    }

                    let settled = self.apply(&posting).await?;
                    if let Some(outcome) = settled.outcome {
                        self.record(&posting, &facet, outcome, settled.reason.clone())
                            .await?;
                    }
                    self.persist_answers().await?;

                    match settled.state {
                        AttemptState::Submitted => {
                            report.submitted += 1;
                            self.cycler.record_application();
                        }
                        AttemptState::PausedForReview => {
                            report.paused_for_review += 1;
                            report.paused_jobs.push(posting.id.clone());
                        }
                        AttemptState::Skipped => report.skipped += 1,
                        _ => report.failed += 1,
                    }

                    if let Some(reason) = settled.stop {
                        report.stop_reason = reason;
                        break 'facets;
                    }
                    if let Some(reason) = self.should_stop(started, &report) {
                        report.stop_reason = reason;
                        break 'facets;
                    }
                    if self.cycler.term_quota_met() {
                        info!(
                            term = %facet.term,
                            applied = self.cycler.applications_this_term(),
                            "orchestrator.term.quota_met"
                        );
                        break 'fetch;
                    }
                }
                break;
            }
        }

        info!(
            run_id = %self.run_id,
            submitted = report.submitted,
            rejected = report.rejected,
            failed = report.failed,
            skipped = report.skipped,
            paused = report.paused_for_review,
            stop = ?report.stop_reason,
            "orchestrator.run.stop"
        );
        Ok(report)
    }

    fn should_stop(&self, started: Instant, report: &RunReport) -> Option<StopReason> {
        if self.cancel.is_cancelled() {
            return Some(StopReason::Cancelled);
        }
        let limits = &self.config.limits;
        if let Some(budget) = limits.time_budget() {
            if started.elapsed() >= budget {
                return Some(StopReason::TimeBudget);
            }
        }
        if let Some(cap) = limits.max_applications_per_day {
            if self.submitted_earlier_today + report.submitted >= cap {
                return Some(StopReason::DailyCap);
            }
        }
        match limits.max_applications {
            Some(cap) if report.submitted >= cap => Some(StopReason::VolumeCap),
            _ => None,
        }
    }

    /// Ids a search can pass over without opening: settled in history or
    /// already seen during this run.
    fn known_ids(&self, attempted: &HashSet<String>) -> HashSet<String> {
        self.history
            .outcomes()
            .filter(|(_, outcome)| history_blocks(*outcome, &self.config.filters))
            .map(|(job_id, _)| job_id.to_string())
            .chain(attempted.iter().cloned())
            .collect()
    }

    /// Rest between non-stop passes. Cancellation cuts the rest short.
    async fn pause_between_passes(&self, pass: u32) {
        let search = &self.config.search;
        let min = search.cycle_pause_min().as_millis() as u64;
        let max = (search.cycle_pause_max().as_millis() as u64).max(min);
        let delay = Duration::from_millis(OsRng.gen_range(min..=max));
        info!(pass, delay_secs = delay.as_secs(), "orchestrator.pass.pause");
        tokio::select! {
            _ = self.pacer.pause(delay) => {}
            _ = self.cancel.cancelled() => {}
        }
    }

    /// Drive one admitted posting to a terminal state.
    async fn apply(&self, posting: &JobPosting) -> Result<Settled> {
        let mut attempt = ApplicationAttempt::new(posting.id.clone());
        attempt.transition(AttemptState::Eligible)?;
        attempt.transition(AttemptState::Applying)?;
        info!(job_id = %posting.id, title = %posting.title, company = %posting.company, "orchestrator.attempt.start");

        let supervised = self
            .jobs
            .supervise("application", || self.flow.try_once(posting))
            .await;

        let mut stop = None;
        let (state, outcome, reason) = match supervised {
            Supervised::Succeeded { value, retries } => {
                attempt.attempt_count = retries + 1;
                match value {
                    AttemptEnd::Submitted => {
                        (AttemptState::Submitted, Some(Outcome::Submitted), None)
                    }
                    AttemptEnd::PausedForReview { reason } => (
                        AttemptState::PausedForReview,
                        Some(Outcome::PausedForReview),
                        Some(reason),
                    ),
                }
            }
            Supervised::Escalated {
                error, attempts, ..
            } => {
                attempt.attempt_count = attempts;
                stop = StopReason::for_fault(&error);
                let mut reason = error.to_string();
                if let Some(shot) = self.flow.take_screenshot() {
                    reason = format!("{reason} (screenshot: {})", shot.location);
                }
                match error {
                    Fault::PostingGone(_) => (
                        AttemptState::Skipped,
                        Some(Outcome::Failed),
                        Some(format!("skipped: {reason}")),
                    ),
                    Fault::DailyLimit(_) => (AttemptState::Skipped, None, Some(reason)),
                    Fault::Unanswerable(_) => (
                        AttemptState::PausedForReview,
                        Some(Outcome::PausedForReview),
                        Some(reason),
                    ),
                    _ => (AttemptState::Failed, Some(Outcome::Failed), Some(reason)),
                }
            }
        };

        attempt.finish(state, reason.clone())?;
        info!(
            job_id = %attempt.job_id,
            state = ?attempt.state,
            tries = attempt.attempt_count,
            reason = ?attempt.last_error,
            "orchestrator.attempt.finished"
        );
        Ok(Settled {
            state,
            outcome,
            reason,
            stop,
        })
    }

    async fn record(
        &mut self,
        posting: &JobPosting,
        facet: &SearchFacet,
        outcome: Outcome,
        reason: Option<String>,
    ) -> Result<()> {
        let record = HistoryRecord {
            job_id: posting.id.clone(),
            outcome,
            recorded_at: Utc::now(),
            facet: Some(facet.clone()),
            title: posting.title.clone(),
            company: posting.company.clone(),
            reason,
            run_id: self.run_id,
        };
        self.history.record(&record).await?;
        Ok(())
    }

    async fn persist_answers(&self) -> Result<()> {
        let fresh = self.flow.take_new_answers();
        if !self.config.answers.persist {
            return Ok(());
        }
        for qa in &fresh {
            self.history.save_answer(qa).await?;
        }
        Ok(())
    }
}

/// Local midnight as UTC; a day back from now when midnight does not exist locally.
fn start_of_local_day() -> DateTime<Utc> {
    Local::now()
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .and_then(|midnight| midnight.and_local_timezone(Local).earliest())
        .map(|midnight| midnight.with_timezone(&Utc))
        .unwrap_or_else(|| Utc::now() - chrono::Duration::hours(24))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{Action, FormStage, InstantPacer, NoAnswerProvider};
    use crate::fakes::{page, posting, text_question, ScriptedDriver};
    use async_trait::async_trait;
    use serde_json::json;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn memory_store() -> HistoryStore {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        HistoryStore::from_pool(pool).await.unwrap()
    }

    fn config(extra: serde_json::Value) -> Arc<RunConfig> {
        let mut value = json!({
            "search": { "terms": ["Rust", "Go"], "switch_threshold": 0 },
            "application": { "pause_before_submit": false },
            "retry": { "min_delay_ms": 1, "max_delay_ms": 2 }
        });
        if let (Some(base), Some(extra)) = (value.as_object_mut(), extra.as_object()) {
            for (key, section) in extra {
                base.insert(key.clone(), section.clone());
            }
        }
        Arc::new(serde_json::from_value(value).unwrap())
    }

    async fn orchestrator(
        config: Arc<RunConfig>,
        driver: Arc<ScriptedDriver>,
        history: HistoryStore,
        cancel: CancellationToken,
    ) -> RunOrchestrator {
        paced_orchestrator(config, driver, history, cancel, Arc::new(InstantPacer::default())).await
    }

    async fn paced_orchestrator(
        config: Arc<RunConfig>,
        driver: Arc<ScriptedDriver>,
        history: HistoryStore,
        cancel: CancellationToken,
        pacer: Arc<dyn Pacer>,
    ) -> RunOrchestrator {
        RunOrchestrator::new(config, driver, Arc::new(NoAnswerProvider), pacer, history, cancel)
            .await
            .unwrap()
    }

    fn earlier(job_id: &str, outcome: Outcome, hours_ago: i64) -> HistoryRecord {
        HistoryRecord {
            job_id: job_id.into(),
            outcome,
            recorded_at: Utc::now() - chrono::Duration::hours(hours_ago),
            facet: None,
            title: String::new(),
            company: String::new(),
            reason: None,
            run_id: Uuid::new_v4(),
        }
    }

    /// Records every pause, then cancels the run.
    struct CancellingPacer {
        paused: InstantPacer,
        cancel: CancellationToken,
    }

    #[async_trait]
    impl Pacer for CancellingPacer {
        async fn pause(&self, delay: Duration) {
            self.paused.pause(delay).await;
            self.cancel.cancel();
        }
    }

    #[tokio::test]
    async fn submits_each_job_once_across_facets_and_runs() {
        let driver = Arc::new(ScriptedDriver::new());
        driver.add_postings("Rust", vec![posting("J1", "Acme"), posting("J2", "Initech")]);
        driver.add_postings("Go", vec![posting("J2", "Initech"), posting("J3", "Hooli")]);
        let config = config(json!({}));

        let mut run = orchestrator(config.clone(), driver.clone(), memory_store().await, CancellationToken::new()).await;
        let report = run.run().await.unwrap();

        assert_eq!(report.submitted, 3);
        assert_eq!(report.duplicates, 0);
        assert_eq!(report.stop_reason, StopReason::Exhausted);
        assert_eq!(report.exit_code(), 0);
        assert_eq!(driver.opened(), vec!["J1", "J2", "J3"]);
        assert_eq!(driver.passed_over(), vec!["J2"]);
        let submitted = run.history().records(Some(Outcome::Submitted)).await.unwrap();
        assert_eq!(submitted.len(), 3);
        assert!(submitted.iter().all(|r| r.run_id == run.run_id()));
    }

    #[tokio::test]
    async fn previously_submitted_jobs_are_not_reopened() {
        let mut history = memory_store().await;
        history.record(&earlier("J1", Outcome::Submitted, 0)).await.unwrap();
        history.record(&earlier("J2", Outcome::PausedForReview, 0)).await.unwrap();
        let driver = Arc::new(ScriptedDriver::new());
        driver.add_postings("Rust", vec![posting("J1", "Acme"), posting("J2", "Initech")]);

        let mut run = orchestrator(config(json!({})), driver.clone(), history, CancellationToken::new()).await;
        let report = run.run().await.unwrap();

        assert_eq!(report.submitted, 1);
        assert_eq!(report.duplicates, 0);
        assert_eq!(driver.passed_over(), vec!["J1"]);
        assert_eq!(driver.opened(), vec!["J2"]);
    }

    #[tokio::test]
    async fn rejections_are_recorded_with_their_reason() {
        let driver = Arc::new(ScriptedDriver::new());
        driver.add_postings("Rust", vec![posting("J1", "Evil Corp"), posting("J2", "Acme")]);
        let config = config(json!({ "filters": { "blocked_companies": ["evil corp"] } }));

        let mut run = orchestrator(config, driver.clone(), memory_store().await, CancellationToken::new()).await;
        let report = run.run().await.unwrap();

        assert_eq!((report.rejected, report.submitted), (1, 1));
        let rejected = run.history().records(Some(Outcome::Rejected)).await.unwrap();
        assert_eq!(rejected[0].job_id, "J1");
        assert!(rejected[0]
            .reason
            .as_deref()
            .is_some_and(|r| r.starts_with("company not allowed")));
        assert_eq!(driver.opened(), vec!["J2"]);
    }

    #[tokio::test]
    async fn volume_cap_stops_the_run() {
        let driver = Arc::new(ScriptedDriver::new());
        driver.add_postings(
            "Rust",
            vec![posting("J1", "A"), posting("J2", "B"), posting("J3", "C")],
        );
        let config = config(json!({ "limits": { "max_applications": 2 } }));

        let mut run = orchestrator(config, driver.clone(), memory_store().await, CancellationToken::new()).await;
        let report = run.run().await.unwrap();

        assert_eq!(report.submitted, 2);
        assert_eq!(report.stop_reason, StopReason::VolumeCap);
        assert_eq!(driver.opened().len(), 2);
    }

    #[tokio::test]
    async fn term_quota_rotates_to_the_next_term() {
        let driver = Arc::new(ScriptedDriver::new());
        driver.add_postings("Rust", vec![posting("J1", "A"), posting("J2", "B")]);
        driver.add_postings("Go", vec![posting("J3", "C")]);
        let config = config(json!({
            "search": { "terms": ["Rust", "Go"], "switch_threshold": 1 }
        }));

        let mut run = orchestrator(config, driver.clone(), memory_store().await, CancellationToken::new()).await;
        run.run().await.unwrap();

        assert_eq!(driver.opened(), vec!["J1", "J3"]);
        let terms: Vec<_> = driver.searched().into_iter().map(|f| f.term).collect();
        assert_eq!(terms, vec!["Rust", "Go"]);
    }

    #[tokio::test]
    async fn vanished_postings_are_skipped_and_stored_as_failed() {
        let driver = Arc::new(ScriptedDriver::new());
        driver.add_postings("Rust", vec![posting("J1", "A"), posting("J2", "B")]);
        driver.fail_job("J1", Fault::PostingGone("J1".into()));

        let mut run = orchestrator(config(json!({})), driver.clone(), memory_store().await, CancellationToken::new()).await;
        let report = run.run().await.unwrap();

        assert_eq!((report.skipped, report.submitted), (1, 1));
        assert_eq!(run.history().contains("J1"), Some(Outcome::Failed));
        let failed = run.history().records(Some(Outcome::Failed)).await.unwrap();
        assert!(failed[0]
            .reason
            .as_deref()
            .is_some_and(|r| r.starts_with("skipped:")));
    }

    #[tokio::test]
    async fn lost_session_stops_with_a_failing_exit_code() {
        let driver = Arc::new(ScriptedDriver::new());
        driver.add_postings("Rust", vec![posting("J1", "A"), posting("J2", "B")]);
        driver.fail_job("J1", Fault::SessionLost("browser closed".into()));

        let mut run = orchestrator(config(json!({})), driver.clone(), memory_store().await, CancellationToken::new()).await;
        let report = run.run().await.unwrap();

        assert!(matches!(report.stop_reason, StopReason::SessionLost(_)));
        assert_eq!(report.exit_code(), 1);
        assert_eq!(report.failed, 1);
        assert_eq!(driver.opened(), vec!["J1"]);
    }

    #[tokio::test]
    async fn paused_jobs_are_listed_and_never_submitted() {
        let driver = Arc::new(ScriptedDriver::new());
        driver.add_postings("Rust", vec![posting("J1", "A")]);
        let config = config(json!({ "application": { "pause_before_submit": true } }));

        let mut run = orchestrator(config, driver.clone(), memory_store().await, CancellationToken::new()).await;
        let report = run.run().await.unwrap();

        assert_eq!(report.paused_for_review, 1);
        assert_eq!(report.paused_jobs, vec!["J1"]);
        assert!(!driver.performed().contains(&Action::Submit));
        assert_eq!(run.history().contains("J1"), Some(Outcome::PausedForReview));
    }

    #[tokio::test]
    async fn cancelled_runs_stop_before_searching() {
        let driver = Arc::new(ScriptedDriver::new());
        driver.add_postings("Rust", vec![posting("J1", "A")]);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let mut run = orchestrator(config(json!({})), driver.clone(), memory_store().await, cancel).await;
        let report = run.run().await.unwrap();

        assert_eq!(report.stop_reason, StopReason::Cancelled);
        assert!(driver.searched().is_empty());
    }

    #[tokio::test]
    async fn interrupted_searches_are_queried_again() {
        let driver = Arc::new(ScriptedDriver::new());
        driver.add_postings("Rust", vec![posting("J1", "Acme")]);
        driver.fail_fetch("Rust", 0, Fault::Transient("results did not load".into()), 1);

        let mut run = orchestrator(config(json!({})), driver.clone(), memory_store().await, CancellationToken::new()).await;
        let report = run.run().await.unwrap();

        assert_eq!(report.submitted, 1);
        assert_eq!(driver.opened(), vec!["J1"]);
        let terms: Vec<_> = driver.searched().into_iter().map(|f| f.term).collect();
        assert_eq!(terms, vec!["Rust", "Rust", "Go"]);
    }

    #[tokio::test]
    async fn search_requeries_skip_seen_jobs_and_give_up_after_the_retry_budget() {
        let driver = Arc::new(ScriptedDriver::new());
        driver.add_postings("Rust", vec![posting("J1", "Acme")]);
        driver.add_postings("Go", vec![posting("J2", "Hooli")]);
        driver.fail_fetch("Rust", 1, Fault::Transient("results did not load".into()), u32::MAX);
        let config = config(json!({
            "retry": { "attempts": 3, "min_delay_ms": 1, "max_delay_ms": 2 }
        }));

        let mut run = orchestrator(config, driver.clone(), memory_store().await, CancellationToken::new()).await;
        let report = run.run().await.unwrap();

        assert_eq!(report.submitted, 2);
        assert_eq!(report.stop_reason, StopReason::Exhausted);
        assert_eq!(driver.opened(), vec!["J1", "J2"]);
        assert_eq!(driver.passed_over(), vec!["J1", "J1"]);
        let rust = driver.searched().iter().filter(|f| f.term == "Rust").count();
        assert_eq!(rust, 3);
    }

    #[tokio::test]
    async fn cancellation_is_honoured_between_rejected_postings() {
        let driver = Arc::new(ScriptedDriver::new());
        driver.add_postings(
            "Rust",
            (1..=5).map(|n| posting(&format!("J{n}"), "Evil Corp")).collect(),
        );
        let cancel = CancellationToken::new();
        driver.cancel_after(2, cancel.clone());
        let config = config(json!({ "filters": { "blocked_companies": ["evil corp"] } }));

        let mut run = orchestrator(config, driver.clone(), memory_store().await, cancel).await;
        let report = run.run().await.unwrap();

        assert_eq!(report.stop_reason, StopReason::Cancelled);
        assert_eq!(report.rejected, 1);
        assert_eq!(run.history().records(Some(Outcome::Rejected)).await.unwrap().len(), 1);
        assert_eq!(driver.searched().len(), 1);
    }

    #[tokio::test]
    async fn non_stop_runs_rest_between_passes() {
        let driver = Arc::new(ScriptedDriver::new());
        let cancel = CancellationToken::new();
        let pacer = Arc::new(CancellingPacer {
            paused: InstantPacer::default(),
            cancel: cancel.clone(),
        });
        let config = config(json!({
            "search": {
                "terms": ["Rust", "Go"],
                "switch_threshold": 0,
                "run_non_stop": true,
                "cycle_pause_min_secs": 60,
                "cycle_pause_max_secs": 120
            }
        }));

        let mut run = paced_orchestrator(config, driver.clone(), memory_store().await, cancel, pacer.clone()).await;
        let report = run.run().await.unwrap();

        assert_eq!(report.stop_reason, StopReason::Cancelled);
        let pauses = pacer.paused.requested();
        assert_eq!(pauses.len(), 1);
        assert!(pauses[0] >= Duration::from_secs(60) && pauses[0] <= Duration::from_secs(120));
        assert!(!driver.searched().is_empty());
        assert!(driver.searched().iter().all(|f| f.pass == 1));
    }

    #[tokio::test]
    async fn daily_cap_counts_submissions_from_earlier_runs_today() {
        let mut history = memory_store().await;
        history.record(&earlier("J1", Outcome::Submitted, 0)).await.unwrap();
        history.record(&earlier("J2", Outcome::Submitted, 48)).await.unwrap();
        let driver = Arc::new(ScriptedDriver::new());
        driver.add_postings("Rust", vec![posting("J3", "A"), posting("J4", "B")]);
        let config = config(json!({ "limits": { "max_applications_per_day": 2 } }));

        let mut run = orchestrator(config, driver.clone(), history, CancellationToken::new()).await;
        let report = run.run().await.unwrap();

        assert_eq!(report.submitted, 1);
        assert_eq!(report.stop_reason, StopReason::DailyCap);
        assert_eq!(report.exit_code(), 0);
        assert_eq!(driver.opened(), vec!["J3"]);
    }

    #[tokio::test]
    async fn platform_daily_limit_stops_without_settling_the_job() {
        let driver = Arc::new(ScriptedDriver::new());
        driver.add_postings("Rust", vec![posting("J1", "A"), posting("J2", "B")]);
        driver.fail_job("J1", Fault::DailyLimit("You have reached today's limit".into()));

        let mut run = orchestrator(config(json!({})), driver.clone(), memory_store().await, CancellationToken::new()).await;
        let report = run.run().await.unwrap();

        assert_eq!(report.stop_reason, StopReason::PlatformLimit);
        assert_eq!(report.exit_code(), 0);
        assert_eq!(report.skipped, 1);
        assert_eq!(run.history().contains("J1"), None);
        assert_eq!(driver.opened(), vec!["J1"]);
    }

    #[tokio::test]
    async fn unanswerable_questions_leave_the_job_paused() {
        let driver = Arc::new(ScriptedDriver::with_pages(vec![page(
            vec![text_question("q1", "What is your favourite colour?")],
            FormStage::Review,
        )]));
        driver.add_postings("Rust", vec![posting("J1", "Acme")]);

        let mut run = orchestrator(config(json!({})), driver.clone(), memory_store().await, CancellationToken::new()).await;
        let report = run.run().await.unwrap();

        assert_eq!(report.paused_jobs, vec!["J1"]);
        assert!(!driver.performed().contains(&Action::Submit));
        let paused = run.history().records(Some(Outcome::PausedForReview)).await.unwrap();
        assert!(paused[0]
            .reason
            .as_deref()
            .is_some_and(|r| r.contains("favourite colour")));
    }
}
