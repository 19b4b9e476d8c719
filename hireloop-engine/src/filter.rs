//! Posting eligibility.
//!
//! [`evaluate`] is a pure function of the posting, the filter configuration
//! and the history lookup. Rules run in a fixed order and the first failing
//! rule names the rejection.
use crate::history::{HistoryLookup, Outcome};
use crate::posting::JobPosting;
use hireloop_config::FilterConfig;
use serde::Serialize;
use std::fmt;

/// Terms that mark a posting as requiring a security clearance.
pub const CLEARANCE_TERMS: [&str; 3] = ["clearance", "polygraph", "secret"];

/// Extra years credited to candidates with a master's degree.
const MASTERS_BONUS_YEARS: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionReason {
    Admitted,
    AlreadyProcessed,
    AttributeMismatch,
    CompanyNotAllowed,
    BlacklistedCompany,
}

impl fmt::Display for DecisionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            DecisionReason::Admitted => "admitted",
            DecisionReason::AlreadyProcessed => "already processed",
            DecisionReason::AttributeMismatch => "attribute mismatch",
            DecisionReason::CompanyNotAllowed => "company not allowed",
            DecisionReason::BlacklistedCompany => "blacklisted company",
        };
        f.write_str(label)
    }
}

/// Advisory result of the company keyword scan; never rejects on its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CompanySignal {
    GoodKeyword(String),
    NoGoodKeyword,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Decision {
    pub admit: bool,
    pub reason: DecisionReason,
    /// Which rule fired, for history and logs.
    pub detail: Option<String>,
    pub company_signal: Option<CompanySignal>,
}

impl Decision {
    fn reject(reason: DecisionReason, detail: impl Into<String>) -> Self {
        Self {
            admit: false,
            reason,
            detail: Some(detail.into()),
            company_signal: None,
        }
    }

    /// Human-readable summary, e.g. `attribute mismatch: job type Contract`.
    pub fn describe(&self) -> String {
        match &self.detail {
            Some(detail) => format!("{}: {detail}", self.reason),
            None => self.reason.to_string(),
        }
    }
}

/// Whether a recorded outcome rules the job out of further attempts.
pub fn history_blocks(outcome: Outcome, config: &FilterConfig) -> bool {
    match outcome {
        Outcome::Submitted | Outcome::Rejected => true,
        Outcome::Failed => !config.retry_failed_jobs,
        Outcome::PausedForReview => false,
    }
}

pub fn evaluate(
    posting: &JobPosting,
    config: &FilterConfig,
    history: &dyn HistoryLookup,
) -> Decision {
    if let Some(outcome) = history.contains(&posting.id) {
        if history_blocks(outcome, config) {
            return Decision::reject(
                DecisionReason::AlreadyProcessed,
                format!("history holds {outcome}"),
            );
        }
    }

    if let Some(mismatch) = attribute_mismatch(posting, config) {
        return Decision::reject(DecisionReason::AttributeMismatch, mismatch);
    }

    if !config.companies.is_empty()
        && !config
            .companies
            .iter()
            .any(|c| same_company(c, &posting.company))
    {
        return Decision::reject(
            DecisionReason::CompanyNotAllowed,
            format!("{} is not on the allow list", posting.company),
        );
    }
    if config
        .blocked_companies
        .iter()
        .any(|c| same_company(c, &posting.company))
    {
        return Decision::reject(
            DecisionReason::CompanyNotAllowed,
            format!("{} is on the deny list", posting.company),
        );
    }

    let about = posting
        .company_description
        .as_deref()
        .unwrap_or_default()
        .to_lowercase();
    let good = first_term(&about, &config.about_company_good_words);
    if good.is_none() {
        if let Some(bad) = first_term(&about, &config.about_company_bad_words) {
            return Decision::reject(
                DecisionReason::BlacklistedCompany,
                format!("company description mentions {bad:?}"),
            );
        }
    }

    let company_signal = match good {
        Some(word) => Some(CompanySignal::GoodKeyword(word.to_string())),
        None if !config.about_company_good_words.is_empty() => Some(CompanySignal::NoGoodKeyword),
        None => None,
    };

    Decision {
        admit: true,
        reason: DecisionReason::Admitted,
        detail: None,
        company_signal,
    }
}

fn attribute_mismatch(posting: &JobPosting, config: &FilterConfig) -> Option<String> {
    if !config.experience_level.is_empty() {
        match posting.experience_level {
            Some(level) if config.experience_level.contains(&level) => {}
            Some(level) => return Some(format!("experience level {level}")),
            None => return Some("experience level not disclosed".to_string()),
        }
    }
    if !config.job_type.is_empty() {
        match posting.job_type {
            Some(kind) if config.job_type.contains(&kind) => {}
            Some(kind) => return Some(format!("job type {kind}")),
            None => return Some("job type not disclosed".to_string()),
        }
    }
    if !config.workplace.is_empty() {
        match posting.workplace {
            Some(place) if config.workplace.contains(&place) => {}
            Some(place) => return Some(format!("workplace {place}")),
            None => return Some("workplace not disclosed".to_string()),
        }
    }
    if let Some(floor) = config.min_salary {
        match posting.salary {
            Some(range) if range.high >= floor => {}
            Some(range) => return Some(format!("salary up to {} below {floor}", range.high)),
            None => return Some("salary not disclosed".to_string()),
        }
    }
    if let Some(ceiling) = config.max_applicants {
        match posting.applicants {
            Some(band) if band.low <= ceiling => {}
            Some(band) => return Some(format!("{}+ applicants above {ceiling}", band.low)),
            None => return Some("applicant count not disclosed".to_string()),
        }
    }
    if let (Some(current), Some(required)) = (config.current_experience, posting.required_years) {
        let credited = current + if config.did_masters { MASTERS_BONUS_YEARS } else { 0 };
        if required > credited {
            return Some(format!("requires {required} years, have {credited}"));
        }
    }

    let description = posting
        .description
        .as_deref()
        .unwrap_or_default()
        .to_lowercase();
    if !config.allow_security_clearance {
        let terms = CLEARANCE_TERMS.map(String::from);
        if let Some(term) = first_term(&description, &terms) {
            return Some(format!("mentions {term:?}"));
        }
    }
    first_term(&description, &config.bad_words).map(|word| format!("description mentions {word:?}"))
}

fn same_company(configured: &str, company: &str) -> bool {
    configured.trim().eq_ignore_ascii_case(company.trim())
}

/// First configured term found in `haystack` (already lowercase) as a whole
/// word or phrase.
fn first_term<'a>(haystack: &str, terms: &'a [String]) -> Option<&'a str> {
    terms
        .iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .find(|t| contains_phrase(haystack, &t.to_lowercase()))
}

/// Whether `needle` occurs in `haystack` as whole words.
pub(crate) fn contains_phrase(haystack: &str, needle: &str) -> bool {
    haystack.match_indices(needle).any(|(start, _)| {
        let before = haystack[..start].chars().next_back();
        let after = haystack[start + needle.len()..].chars().next();
        !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
    })
}
