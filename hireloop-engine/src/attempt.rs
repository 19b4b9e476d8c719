//! Per-posting application workflow.
//!
//! [`ApplicationAttempt`] tracks the lifecycle of one posting within a run and
//! refuses illegal transitions. [`ApplicationFlow`] performs the `Applying`
//! sub-steps against the browser driver, each under action-level retry.
use crate::answers::{
    fit_to_options, is_placeholder, normalize_question, AnswerBook, AnswerCache, AnswerSource,
    QuestionAnswer,
};
use crate::driver::{
    Action, ActionOutput, AnswerProvider, BrowserDriver, FormPage, FormQuestion, FormStage,
    QuestionKind, Screenshot,
};
use crate::fault::Fault;
use crate::posting::JobPosting;
use crate::retry::{RetryController, Supervised};
use chrono::{DateTime, Utc};
use hireloop_config::{ApplicantProfile, ApplicationConfig};
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptState {
    Discovered,
    Eligible,
    Rejected,
    Applying,
    Submitted,
    Failed,
    Skipped,
    PausedForReview,
}

impl AttemptState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AttemptState::Rejected
                | AttemptState::Submitted
                | AttemptState::Failed
                | AttemptState::Skipped
                | AttemptState::PausedForReview
        )
    }

    pub fn can_become(&self, next: AttemptState) -> bool {
        use AttemptState::*;
        matches!(
            (self, next),
            (Discovered, Eligible | Rejected)
                | (Eligible, Applying)
                | (Applying, Submitted | Failed | Skipped | PausedForReview)
        )
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("job {job_id}: illegal transition {from:?} -> {to:?}")]
pub struct TransitionError {
    pub job_id: String,
    pub from: AttemptState,
    pub to: AttemptState,
}

#[derive(Debug, Clone, Serialize)]
pub struct ApplicationAttempt {
    pub job_id: String,
    pub state: AttemptState,
    pub attempt_count: u32,
    pub last_error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl ApplicationAttempt {
    pub fn new(job_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            state: AttemptState::Discovered,
            attempt_count: 0,
            last_error: None,
            started_at: Utc::now(),
            completed_at: None,
        }
    }

    pub fn transition(&mut self, next: AttemptState) -> Result<(), TransitionError> {
        if !self.state.can_become(next) {
            return Err(TransitionError {
                job_id: self.job_id.clone(),
                from: self.state,
                to: next,
            });
        }
        debug!(job_id = %self.job_id, from = ?self.state, to = ?next, "attempt.transition");
        self.state = next;
        if next.is_terminal() {
            self.completed_at = Some(Utc::now());
        }
        Ok(())
    }

    /// Move to a terminal state, remembering why.
    pub fn finish(
        &mut self,
        next: AttemptState,
        reason: Option<String>,
    ) -> Result<(), TransitionError> {
        self.transition(next)?;
        self.last_error = reason;
        Ok(())
    }
}

/// How a single pass through the form ended without a fault. A question
/// nothing can answer ends the pass with [`Fault::Unanswerable`] instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptEnd {
    Submitted,
    PausedForReview { reason: String },
}

pub struct ApplicationFlow {
    driver: Arc<dyn BrowserDriver>,
    book: AnswerBook,
    provider: Arc<dyn AnswerProvider>,
    profile: ApplicantProfile,
    policy: ApplicationConfig,
    actions: RetryController,
    cache: Mutex<AnswerCache>,
    last_screenshot: Mutex<Option<Screenshot>>,
}

impl ApplicationFlow {
    pub fn new(
        driver: Arc<dyn BrowserDriver>,
        book: AnswerBook,
        provider: Arc<dyn AnswerProvider>,
        profile: ApplicantProfile,
        policy: ApplicationConfig,
        actions: RetryController,
        cache: AnswerCache,
    ) -> Self {
        Self {
            driver,
            book,
            provider,
            profile,
            policy,
            actions,
            cache: Mutex::new(cache),
            last_screenshot: Mutex::new(None),
        }
    }

    /// Walk the application for `posting` once: open, start, answer every
    /// page, then submit or pause at review.
    pub async fn try_once(&self, posting: &JobPosting) -> Result<AttemptEnd, Fault> {
        self.step(Action::OpenPosting {
            job_id: posting.id.clone(),
        })
        .await?;
        self.step(Action::StartApplication).await?;

        for page_no in 1..=self.policy.max_form_pages {
            let page = self.read_page().await?;
            debug!(
                job_id = %posting.id,
                page = page_no,
                questions = page.questions.len(),
                stage = ?page.stage,
                "attempt.form_page"
            );

            for question in &page.questions {
                if question.prefilled.is_some() && !self.policy.overwrite_previous_answers {
                    continue;
                }
                match self.resolve(question).await {
                    Some(value) => {
                        self.step(Action::Answer {
                            question_id: question.id.clone(),
                            value,
                        })
                        .await?;
                    }
                    None if !question.required && !self.policy.pause_at_failed_question => {
                        debug!(question = %question.label, "attempt.question.left_blank");
                    }
                    None => {
                        info!(job_id = %posting.id, question = %question.label, "attempt.paused.question");
                        self.discard().await;
                        return Err(Fault::Unanswerable(question.label.clone()));
                    }
                }
            }

            if page.stage == FormStage::Review {
                if self.policy.pause_before_submit {
                    info!(job_id = %posting.id, "attempt.paused.review");
                    self.discard().await;
                    return Ok(AttemptEnd::PausedForReview {
                        reason: "paused before submit".to_string(),
                    });
                }
                self.step(Action::Submit).await?;
                return Ok(AttemptEnd::Submitted);
            }
            self.step(Action::AdvancePage).await?;
        }

        self.discard().await;
        Err(Fault::FormLoop(self.policy.max_form_pages))
    }

    /// Screenshot captured by the most recent action-level escalation.
    pub fn take_screenshot(&self) -> Option<Screenshot> {
        lock(&self.last_screenshot).take()
    }

    /// Answers learned since the last call.
    pub fn take_new_answers(&self) -> Vec<QuestionAnswer> {
        lock(&self.cache).take_unsaved()
    }

    async fn step(&self, action: Action) -> Result<ActionOutput, Fault> {
        let label = action.label();
        match self
            .actions
            .supervise(label, || self.driver.perform(&action))
            .await
        {
            Supervised::Succeeded { value, .. } => Ok(value),
            Supervised::Escalated {
                error, screenshot, ..
            } => {
                if screenshot.is_some() {
                    *lock(&self.last_screenshot) = screenshot;
                }
                Err(error)
            }
        }
    }

    async fn read_page(&self) -> Result<FormPage, Fault> {
        match self
            .actions
            .supervise("read_form_page", || async {
                match self.driver.perform(&Action::ReadFormPage).await? {
                    ActionOutput::Page(page) => Ok(page),
                    ActionOutput::Done => {
                        Err(Fault::Transient("form page not rendered yet".to_string()))
                    }
                }
            })
            .await
        {
            Supervised::Succeeded { value, .. } => Ok(value),
            Supervised::Escalated {
                error, screenshot, ..
            } => {
                if screenshot.is_some() {
                    *lock(&self.last_screenshot) = screenshot;
                }
                Err(error)
            }
        }
    }

    async fn discard(&self) {
        if let Err(err) = self.driver.perform(&Action::Discard).await {
            warn!(error = %err, "attempt.discard_failed");
        }
    }

    /// Cache, configured answers, provider, then (when allowed) a guess.
    async fn resolve(&self, question: &FormQuestion) -> Option<String> {
        let key = normalize_question(&question.label);
        let cached = lock(&self.cache).get(&key).map(|qa| qa.answer.clone());
        if !self.policy.overwrite_previous_answers {
            if let Some(answer) = cached.clone() {
                return Some(answer);
            }
        }

        if let Some(answer) = self.book.lookup(question) {
            self.remember(&key, &answer, AnswerSource::Configured);
            return Some(answer);
        }

        match self.provider.answer(question, &self.profile).await {
            Ok(Some(raw)) => {
                if let Some(answer) = fit_to_options(&raw, question.options()) {
                    self.remember(&key, &answer, AnswerSource::Provider);
                    return Some(answer);
                }
                debug!(question = %question.label, raw = %raw, "attempt.provider.answer_not_an_option");
            }
            Ok(None) => {}
            Err(err) => warn!(question = %question.label, error = %err, "attempt.provider.failed"),
        }

        if let Some(answer) = cached {
            return Some(answer);
        }
        if self.policy.pause_at_failed_question {
            return None;
        }
        guess(question)
    }

    fn remember(&self, key: &str, answer: &str, source: AnswerSource) {
        lock(&self.cache).insert(QuestionAnswer {
            question: key.to_string(),
            answer: answer.to_string(),
            source,
        });
    }
}

/// Last-resort answer: the first real option of a choice question, or a
/// ticked box. Free text is never invented.
fn guess(question: &FormQuestion) -> Option<String> {
    match &question.kind {
        QuestionKind::Select { options } | QuestionKind::Radio { options } => {
            options.iter().find(|o| !is_placeholder(o)).cloned()
        }
        QuestionKind::Checkbox => Some("true".to_string()),
        _ => None,
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
