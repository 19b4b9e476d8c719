//! Configured answers, profile-derived answers, and the per-run answer cache.
use crate::driver::{FormQuestion, QuestionKind};
use crate::filter::contains_phrase;
use hireloop_config::{AnswersConfig, ApplicantProfile};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Canonical cache key for a question label: lowercase words, single spaces,
/// punctuation dropped.
pub fn normalize_question(text: &str) -> String {
    text.chars()
        .map(|c| {
            if c.is_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                ' '
            }
        })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnswerSource {
    Configured,
    Provider,
    Manual,
}

impl AnswerSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnswerSource::Configured => "configured",
            AnswerSource::Provider => "provider",
            AnswerSource::Manual => "manual",
        }
    }
}

impl fmt::Display for AnswerSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnswerSource {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "configured" => Ok(AnswerSource::Configured),
            "provider" => Ok(AnswerSource::Provider),
            "manual" => Ok(AnswerSource::Manual),
            other => Err(anyhow::anyhow!("unknown answer source: {other:?}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionAnswer {
    /// Normalized question text.
    pub question: String,
    pub answer: String,
    pub source: AnswerSource,
}

/// Answers known before the run starts: explicit overrides first, then
/// keyword rules over the applicant profile.
pub struct AnswerBook {
    overrides: HashMap<String, String>,
    profile: ApplicantProfile,
}

impl AnswerBook {
    pub fn new(config: &AnswersConfig, profile: &ApplicantProfile) -> Self {
        let overrides = config
            .overrides
            .iter()
            .map(|o| (normalize_question(&o.question), o.answer.clone()))
            .collect();
        Self {
            overrides,
            profile: profile.clone(),
        }
    }

    /// Answer `question` from configuration alone. Choice questions only
    /// accept answers that name one of their options.
    pub fn lookup(&self, question: &FormQuestion) -> Option<String> {
        let key = normalize_question(&question.label);
        let raw = self
            .overrides
            .get(&key)
            .cloned()
            .or_else(|| self.from_profile(&key, &question.kind))?;
        fit_to_options(&raw, question.options())
    }

    fn from_profile(&self, label: &str, kind: &QuestionKind) -> Option<String> {
        let p = &self.profile;
        let has = |words: &[&str]| words.iter().any(|w| contains_phrase(label, w));

        if matches!(kind, QuestionKind::FileUpload) {
            return p
                .resume_path
                .as_ref()
                .map(|path| path.display().to_string());
        }
        if has(&["linkedin"]) {
            return p.linkedin_url.clone();
        }
        if has(&["website", "portfolio", "github"]) {
            return p.website.clone();
        }
        if has(&["email"]) {
            return p.email.clone();
        }
        if has(&["phone", "mobile"]) {
            return p.phone.clone();
        }
        if has(&["first name"]) {
            return p.first_name.clone();
        }
        if has(&["last name", "surname"]) {
            return p.last_name.clone();
        }
        if has(&["full name"]) || label == "name" {
            return p.full_name();
        }
        if has(&["city", "location"]) {
            return p.city.clone();
        }
        if has(&["cover letter"]) {
            return p.cover_letter.clone();
        }
        if has(&["summary", "headline"]) {
            return p.summary.clone();
        }
        if has(&["sponsorship", "visa"]) {
            return p.require_visa.map(yes_no);
        }
        if has(&["notice"]) {
            return p.notice_period_days.map(|d| d.to_string());
        }
        if has(&["salary", "compensation", "ctc"]) {
            let figure = if has(&["current"]) {
                p.current_salary.or(p.expected_salary)
            } else {
                p.expected_salary.or(p.current_salary)
            };
            return figure.map(|s| s.to_string());
        }
        if has(&["experience", "how many years"]) {
            return p.years_of_experience.map(|y| y.to_string());
        }
        None
    }
}

fn yes_no(flag: bool) -> String {
    let label = if flag { "Yes" } else { "No" };
    label.to_string()
}

/// Map an answer onto the option list, or pass it through when there is none.
pub fn fit_to_options(answer: &str, options: &[String]) -> Option<String> {
    if options.is_empty() {
        return Some(answer.to_string());
    }
    let wanted = answer.trim();
    options
        .iter()
        .find(|o| o.trim().eq_ignore_ascii_case(wanted))
        .or_else(|| {
            let lowered = wanted.to_lowercase();
            options
                .iter()
                .filter(|o| !is_placeholder(o))
                .find(|o| o.to_lowercase().starts_with(&lowered))
        })
        .cloned()
}

/// Options like "Select an option" that only prompt for a choice.
pub fn is_placeholder(option: &str) -> bool {
    let o = option.trim().to_lowercase();
    o.is_empty() || o.starts_with("select") || o.starts_with("choose") || o == "--" || o == "-"
}

/// Answers learned during the run, keyed by normalized question.
#[derive(Default)]
pub struct AnswerCache {
    entries: HashMap<String, QuestionAnswer>,
    unsaved: Vec<QuestionAnswer>,
}

impl AnswerCache {
    pub fn from_records(records: Vec<QuestionAnswer>) -> Self {
        Self {
            entries: records
                .into_iter()
                .map(|qa| (qa.question.clone(), qa))
                .collect(),
            unsaved: Vec::new(),
        }
    }

    pub fn get(&self, question: &str) -> Option<&QuestionAnswer> {
        self.entries.get(question)
    }

    pub fn insert(&mut self, qa: QuestionAnswer) {
        let changed = self
            .entries
            .get(&qa.question)
            .map_or(true, |existing| existing != &qa);
        if changed {
            self.unsaved.push(qa.clone());
            self.entries.insert(qa.question.clone(), qa);
        }
    }

    /// Answers added since the last call, for persisting.
    pub fn take_unsaved(&mut self) -> Vec<QuestionAnswer> {
        std::mem::take(&mut self.unsaved)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
