//! Scripted collaborators for unit tests.
use crate::driver::{
    Action, ActionOutput, AnswerProvider, BrowserDriver, FormPage, FormQuestion, FormStage,
    QuestionKind, Screenshot,
};
use crate::fault::Fault;
use crate::posting::{JobPosting, SearchFacet};
use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use hireloop_config::ApplicantProfile;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use tokio_util::sync::CancellationToken;

pub fn page(questions: Vec<FormQuestion>, stage: FormStage) -> FormPage {
    FormPage { questions, stage }
}

pub fn text_question(id: &str, label: &str) -> FormQuestion {
    FormQuestion {
        id: id.into(),
        label: label.into(),
        kind: QuestionKind::Text,
        prefilled: None,
        required: true,
    }
}

pub fn posting(id: &str, company: &str) -> JobPosting {
    JobPosting {
        id: id.into(),
        title: format!("Engineer {id}"),
        company: company.into(),
        location: "Remote".into(),
        easy_apply: true,
        ..JobPosting::default()
    }
}

/// Browser double driven by a script of postings, form pages and failures.
#[derive(Default)]
pub struct ScriptedDriver {
    postings: Mutex<HashMap<String, Vec<JobPosting>>>,
    pages: Mutex<VecDeque<FormPage>>,
    /// Served once `pages` runs dry.
    fallback: Option<FormPage>,
    action_failures: Mutex<HashMap<&'static str, (Fault, u32)>>,
    job_failures: Mutex<HashMap<String, Fault>>,
    /// Per term: postings served before the fault, the fault, and how many
    /// searches still fail.
    fetch_failures: Mutex<HashMap<String, (usize, Fault, u32)>>,
    /// Cancelled once a search has handed out this many postings.
    cancel_after: Mutex<Option<(usize, CancellationToken)>>,
    performed: Mutex<Vec<Action>>,
    searched: Mutex<Vec<SearchFacet>>,
    passed_over: Mutex<Vec<String>>,
}

impl ScriptedDriver {
    /// Every application is a single empty review page.
    pub fn new() -> Self {
        Self {
            fallback: Some(page(vec![], FormStage::Review)),
            ..Self::default()
        }
    }

    pub fn with_pages(pages: Vec<FormPage>) -> Self {
        Self {
            pages: Mutex::new(pages.into()),
            ..Self::default()
        }
    }

    pub fn add_postings(&self, term: &str, postings: Vec<JobPosting>) {
        self.postings
            .lock()
            .unwrap()
            .entry(term.to_string())
            .or_default()
            .extend(postings);
    }

    /// Fail the next `times` actions with this label.
    pub fn fail_action(&self, label: &'static str, fault: Fault, times: u32) {
        self.action_failures
            .lock()
            .unwrap()
            .insert(label, (fault, times));
    }

    /// Opening this posting always fails.
    pub fn fail_job(&self, job_id: &str, fault: Fault) {
        self.job_failures
            .lock()
            .unwrap()
            .insert(job_id.to_string(), fault);
    }

    /// The next `times` searches for `term` fail after `after` postings.
    pub fn fail_fetch(&self, term: &str, after: usize, fault: Fault, times: u32) {
        self.fetch_failures
            .lock()
            .unwrap()
            .insert(term.to_string(), (after, fault, times));
    }

    /// Cancel `token` as soon as a search has yielded `after` postings.
    pub fn cancel_after(&self, after: usize, token: CancellationToken) {
        *self.cancel_after.lock().unwrap() = Some((after, token));
    }

    pub fn performed(&self) -> Vec<Action> {
        self.performed.lock().unwrap().clone()
    }

    pub fn searched(&self) -> Vec<SearchFacet> {
        self.searched.lock().unwrap().clone()
    }

    /// Ids left out of a search because the caller already knew them.
    pub fn passed_over(&self) -> Vec<String> {
        self.passed_over.lock().unwrap().clone()
    }

    pub fn opened(&self) -> Vec<String> {
        self.performed()
            .into_iter()
            .filter_map(|a| match a {
                Action::OpenPosting { job_id } => Some(job_id),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl BrowserDriver for ScriptedDriver {
    fn fetch_postings<'a>(
        &'a self,
        facet: &'a SearchFacet,
        known: &'a HashSet<String>,
    ) -> BoxStream<'a, Result<JobPosting, Fault>> {
        self.searched.lock().unwrap().push(facet.clone());
        let found = self
            .postings
            .lock()
            .unwrap()
            .get(&facet.term)
            .cloned()
            .unwrap_or_default();

        let mut items = Vec::new();
        for posting in found {
            if known.contains(&posting.id) {
                self.passed_over.lock().unwrap().push(posting.id);
            } else {
                items.push(Ok(posting));
            }
        }
        if let Some((after, fault, remaining)) =
            self.fetch_failures.lock().unwrap().get_mut(&facet.term)
        {
            if *remaining > 0 {
                *remaining -= 1;
                items.insert((*after).min(items.len()), Err(fault.clone()));
            }
        }

        let cancel = self.cancel_after.lock().unwrap().clone();
        let mut yielded = 0;
        stream::iter(items)
            .inspect(move |_| {
                yielded += 1;
                if let Some((after, token)) = &cancel {
                    if yielded == *after {
                        token.cancel();
                    }
                }
            })
            .boxed()
    }

    async fn perform(&self, action: &Action) -> Result<ActionOutput, Fault> {
        self.performed.lock().unwrap().push(action.clone());

        if let Action::OpenPosting { job_id } = action {
            if let Some(fault) = self.job_failures.lock().unwrap().get(job_id) {
                return Err(fault.clone());
            }
        }
        {
            let mut failures = self.action_failures.lock().unwrap();
            if let Some((fault, remaining)) = failures.get_mut(action.label()) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(fault.clone());
                }
            }
        }

        match action {
            Action::ReadFormPage => {
                let next = self.pages.lock().unwrap().pop_front();
                next.or_else(|| self.fallback.clone())
                    .map(ActionOutput::Page)
                    .ok_or_else(|| Fault::Transient("no form on screen".into()))
            }
            _ => Ok(ActionOutput::Done),
        }
    }

    async fn capture_screenshot(&self, label: &str) -> anyhow::Result<Screenshot> {
        Ok(Screenshot {
            location: format!("memory://{label}"),
        })
    }
}

/// Provider that always gives the same answer and counts its calls.
pub struct StaticProvider {
    answer: Option<String>,
    calls: AtomicU32,
}

impl StaticProvider {
    pub fn new(answer: Option<&str>) -> Self {
        Self {
            answer: answer.map(str::to_string),
            calls: AtomicU32::new(0),
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AnswerProvider for StaticProvider {
    async fn answer(
        &self,
        _question: &FormQuestion,
        _profile: &ApplicantProfile,
    ) -> anyhow::Result<Option<String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.answer.clone())
    }
}
