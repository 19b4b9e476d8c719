//! Job search and application orchestration.
//!
//! The engine decides which searches to run, which postings to apply to, how
//! each application proceeds, when to retry and when to give up. Everything
//! it needs from the outside world comes through the traits in [`driver`].
pub mod answers;
pub mod attempt;
pub mod cycler;
pub mod driver;
pub mod fault;
pub mod filter;
pub mod history;
pub mod orchestrator;
pub mod posting;
pub mod provider;
pub mod retry;

#[cfg(test)]
mod fakes;

pub use answers::{AnswerBook, AnswerCache, AnswerSource, QuestionAnswer};
pub use attempt::{ApplicationAttempt, ApplicationFlow, AttemptEnd, AttemptState, TransitionError};
pub use cycler::{CyclerStep, FacetCycler};
pub use driver::{
    Action, ActionOutput, AnswerProvider, BrowserDriver, FormPage, FormQuestion, FormStage,
    InstantPacer, NoAnswerProvider, Pacer, QuestionKind, Screenshot, TokioPacer,
};
pub use fault::Fault;
pub use filter::{evaluate, CompanySignal, Decision, DecisionReason};
pub use history::{HistoryLookup, HistoryRecord, HistoryStore, Outcome};
pub use orchestrator::{RunOrchestrator, RunReport, StopReason};
pub use posting::{ApplicantBand, JobPosting, SalaryRange, SearchFacet};
pub use provider::LlmAnswerProvider;
pub use retry::{RetryController, RetryPolicy, Supervised};
