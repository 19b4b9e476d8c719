//! Seams between the engine and its external collaborators.
//!
//! The engine never touches a browser, a clock or a language model directly.
//! It talks to a [`BrowserDriver`] for UI work, an [`AnswerProvider`] for
//! questions nothing else can answer, and a [`Pacer`] for deliberate delays.
use crate::fault::Fault;
use crate::posting::{JobPosting, SearchFacet};
use async_trait::async_trait;
use futures::stream::BoxStream;
use hireloop_config::ApplicantProfile;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Mutex;
use std::time::Duration;

/// A single UI step requested by the application flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    OpenPosting { job_id: String },
    StartApplication,
    ReadFormPage,
    Answer { question_id: String, value: String },
    AdvancePage,
    Submit,
    /// Close the application without submitting.
    Discard,
}

impl Action {
    pub fn label(&self) -> &'static str {
        match self {
            Action::OpenPosting { .. } => "open_posting",
            Action::StartApplication => "start_application",
            Action::ReadFormPage => "read_form_page",
            Action::Answer { .. } => "answer_question",
            Action::AdvancePage => "advance_page",
            Action::Submit => "submit",
            Action::Discard => "discard",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutput {
    Done,
    Page(FormPage),
}

/// Where the application form currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormStage {
    /// More pages follow; advance after answering.
    Continue,
    /// Final review; the next step is submitting.
    Review,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormPage {
    pub questions: Vec<FormQuestion>,
    pub stage: FormStage,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuestionKind {
    Text,
    Numeric,
    TextArea,
    Select { options: Vec<String> },
    Radio { options: Vec<String> },
    Checkbox,
    FileUpload,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormQuestion {
    /// Driver-specific handle used when answering.
    pub id: String,
    pub label: String,
    pub kind: QuestionKind,
    pub prefilled: Option<String>,
    pub required: bool,
}

impl FormQuestion {
    pub fn options(&self) -> &[String] {
        match &self.kind {
            QuestionKind::Select { options } | QuestionKind::Radio { options } => options,
            _ => &[],
        }
    }
}

/// Opaque handle to a diagnostic capture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Screenshot {
    pub location: String,
}

/// Browser-driven access to the job platform.
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    /// Lazily enumerate postings for a facet. Re-calling restarts the query.
    /// Results whose id is in `known` are passed over without being opened.
    fn fetch_postings<'a>(
        &'a self,
        facet: &'a SearchFacet,
        known: &'a HashSet<String>,
    ) -> BoxStream<'a, Result<JobPosting, Fault>>;

    async fn perform(&self, action: &Action) -> Result<ActionOutput, Fault>;

    /// Best-effort diagnostic capture.
    async fn capture_screenshot(&self, label: &str) -> anyhow::Result<Screenshot>;
}

/// Source of answers for questions the configured rules do not cover.
#[async_trait]
pub trait AnswerProvider: Send + Sync {
    /// `Ok(None)` means the provider cannot answer.
    async fn answer(
        &self,
        question: &FormQuestion,
        profile: &ApplicantProfile,
    ) -> anyhow::Result<Option<String>>;
}

/// Provider used when no answer helper is configured.
pub struct NoAnswerProvider;

#[async_trait]
impl AnswerProvider for NoAnswerProvider {
    async fn answer(
        &self,
        _question: &FormQuestion,
        _profile: &ApplicantProfile,
    ) -> anyhow::Result<Option<String>> {
        Ok(None)
    }
}

#[async_trait]
pub trait Pacer: Send + Sync {
    async fn pause(&self, delay: Duration);
}

pub struct TokioPacer;

#[async_trait]
impl Pacer for TokioPacer {
    async fn pause(&self, delay: Duration) {
        tokio::time::sleep(delay).await;
    }
}

/// Returns immediately and remembers every requested delay.
#[derive(Default)]
pub struct InstantPacer {
    requested: Mutex<Vec<Duration>>,
}

impl InstantPacer {
    pub fn requested(&self) -> Vec<Duration> {
        self.requested
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Pacer for InstantPacer {
    async fn pause(&self, delay: Duration) {
        if let Ok(mut guard) = self.requested.lock() {
            guard.push(delay);
        }
    }
}
