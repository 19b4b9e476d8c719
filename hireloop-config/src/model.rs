//! Strongly typed run configuration.
//!
//! A [`RunConfig`] is loaded once, validated, and then shared read-only by
//! every component of the run. Sections other than `search` are optional and
//! fall back to the defaults documented on each field.
use hireloop_common::observability::{default_data_dir, LogFormat};
use hireloop_common::{DatePosted, ExperienceLevel, JobType, SortBy, WorkplaceType};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Immutable configuration snapshot for one run.
#[derive(Debug, Clone, Deserialize)]
pub struct RunConfig {
    pub version: Option<String>,
    pub search: SearchConfig,
    #[serde(default)]
    pub filters: FilterConfig,
    #[serde(default)]
    pub application: ApplicationConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub answers: AnswersConfig,
    #[serde(default)]
    pub profile: ApplicantProfile,
    #[serde(default)]
    pub browser: BrowserConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub llm: Option<LlmConfig>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Search terms and facet cycling rules.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    pub terms: Vec<String>,
    #[serde(default)]
    pub location: Option<String>,
    /// Starting (and, without cycling, only) date bucket.
    #[serde(default = "default_date_posted")]
    pub date_posted: DatePosted,
    #[serde(default = "default_sort_by")]
    pub sort_by: SortBy,
    /// Narrow the date bucket from `date_posted` down to the last 24 hours.
    #[serde(default)]
    pub cycle_date_posted: bool,
    /// After the first pass, stay on the narrowest bucket.
    #[serde(default = "default_true")]
    pub stop_date_cycle_at_24hr: bool,
    #[serde(default)]
    pub alternate_sort_by: bool,
    #[serde(default)]
    pub randomize_search_order: bool,
    /// Seed for the term permutation; a random seed is drawn when unset.
    #[serde(default)]
    pub seed: Option<u64>,
    /// Submitted applications after which the cycler moves to the next term (0 = never).
    #[serde(default = "default_switch_threshold")]
    pub switch_threshold: u32,
    #[serde(default)]
    pub run_non_stop: bool,
    /// Pause before each non-stop pass after the first, drawn from this window.
    #[serde(default = "default_cycle_pause_min_secs")]
    pub cycle_pause_min_secs: u64,
    #[serde(default = "default_cycle_pause_max_secs")]
    pub cycle_pause_max_secs: u64,
    #[serde(default = "default_true")]
    pub easy_apply_only: bool,
}

impl SearchConfig {
    pub fn cycle_pause_min(&self) -> Duration {
        Duration::from_secs(self.cycle_pause_min_secs)
    }

    pub fn cycle_pause_max(&self) -> Duration {
        Duration::from_secs(self.cycle_pause_max_secs)
    }
}

/// Inclusion/exclusion rules applied to every posting.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub experience_level: Vec<ExperienceLevel>,
    pub job_type: Vec<JobType>,
    #[serde(alias = "on_site")]
    pub workplace: Vec<WorkplaceType>,
    /// Minimum acceptable salary (upper end of the disclosed range).
    pub min_salary: Option<u64>,
    /// Maximum acceptable applicant count (lower end of the applicant band).
    pub max_applicants: Option<u32>,
    /// When false, postings mentioning clearance, polygraph or secret are skipped.
    pub allow_security_clearance: bool,
    /// Words that disqualify a posting when found in its description.
    pub bad_words: Vec<String>,
    /// Company allow list; empty admits every company.
    pub companies: Vec<String>,
    pub blocked_companies: Vec<String>,
    pub about_company_bad_words: Vec<String>,
    pub about_company_good_words: Vec<String>,
    /// Candidate's years of experience; unset disables the requirement check.
    pub current_experience: Option<u32>,
    pub did_masters: bool,
    /// Re-attempt jobs whose only history is a failure.
    pub retry_failed_jobs: bool,
}

/// Policy switches for the application flow.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApplicationConfig {
    pub pause_before_submit: bool,
    pub pause_at_failed_question: bool,
    pub overwrite_previous_answers: bool,
    /// Form pages to walk before the attempt is declared stuck.
    pub max_form_pages: u32,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            pause_before_submit: true,
            pause_at_failed_question: true,
            overwrite_previous_answers: false,
            max_form_pages: 10,
        }
    }
}

/// Retry & recovery policy knobs.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Tries per UI action, including the first one.
    pub attempts: u32,
    pub min_delay_ms: u64,
    pub max_delay_ms: u64,
    pub error_screenshot: bool,
    /// Tries per whole application attempt.
    pub attempts_per_job: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: 3,
            min_delay_ms: 500,
            max_delay_ms: 2_000,
            error_screenshot: true,
            attempts_per_job: 1,
        }
    }
}

impl RetryConfig {
    pub fn min_delay(&self) -> Duration {
        Duration::from_millis(self.min_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }
}

/// Volume and time budgets for the run.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Submitted applications per run.
    pub max_applications: Option<u32>,
    /// Submitted applications per local calendar day, counted across runs.
    pub max_applications_per_day: Option<u32>,
    pub time_budget_minutes: Option<u64>,
}

impl LimitsConfig {
    pub fn time_budget(&self) -> Option<Duration> {
        self.time_budget_minutes
            .map(|mins| Duration::from_secs(mins.saturating_mul(60)))
    }
}

/// Configured answers and cache persistence.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AnswersConfig {
    pub persist: bool,
    pub overrides: Vec<AnswerOverride>,
}

/// A fixed answer for a question; matching ignores case and punctuation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AnswerOverride {
    pub question: String,
    pub answer: String,
}

impl Default for AnswersConfig {
    fn default() -> Self {
        Self {
            persist: true,
            overrides: Vec::new(),
        }
    }
}

/// Facts about the applicant used to answer form questions.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ApplicantProfile {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub city: Option<String>,
    pub years_of_experience: Option<u32>,
    pub require_visa: Option<bool>,
    pub notice_period_days: Option<u32>,
    pub expected_salary: Option<u64>,
    pub current_salary: Option<u64>,
    pub summary: Option<String>,
    pub cover_letter: Option<String>,
    pub linkedin_url: Option<String>,
    pub website: Option<String>,
    pub resume_path: Option<PathBuf>,
}

impl ApplicantProfile {
    pub fn full_name(&self) -> Option<String> {
        match (&self.first_name, &self.last_name) {
            (Some(first), Some(last)) => Some(format!("{first} {last}")),
            (Some(first), None) => Some(first.clone()),
            (None, Some(last)) => Some(last.clone()),
            (None, None) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StealthLevel {
    Lightweight,
    #[default]
    Balanced,
    Maximum,
}

/// WebDriver session settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    pub webdriver_url: String,
    pub base_url: String,
    pub headless: bool,
    pub stealth: StealthLevel,
    pub username: Option<String>,
    pub password: Option<String>,
    pub screenshot_dir: PathBuf,
    pub min_action_delay_ms: u64,
    pub max_action_delay_ms: u64,
    pub wait_timeout_secs: u64,
    /// Result pages to walk per facet.
    pub max_result_pages: u32,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            webdriver_url: "http://localhost:9515".into(),
            base_url: "https://www.linkedin.com".into(),
            headless: false,
            stealth: StealthLevel::default(),
            username: None,
            password: None,
            screenshot_dir: default_data_dir("hireloop").join("screenshots"),
            min_action_delay_ms: 300,
            max_action_delay_ms: 1_200,
            wait_timeout_secs: 10,
            max_result_pages: 5,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub database_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_data_dir("hireloop").join("hireloop.db"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "provider", rename_all = "lowercase")]
pub enum LlmConfig {
    Openai {
        model: String,
        api_key: String,
        #[serde(default)]
        temperature: Option<f32>,
        #[serde(default)]
        max_tokens: Option<u32>,
        #[serde(default = "default_openai_endpoint")]
        endpoint: String,
    },
    Ollama {
        model: String,
        #[serde(default = "default_ollama_endpoint")]
        endpoint: String,
        #[serde(default)]
        temperature: Option<f32>,
        #[serde(default)]
        max_tokens: Option<u32>,
    },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub format: LogFormat,
    pub dir: Option<PathBuf>,
    pub stderr: bool,
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Text,
            dir: None,
            stderr: true,
            filter: "info".into(),
        }
    }
}

fn default_openai_endpoint() -> String {
    "https://api.openai.com/v1".into()
}
fn default_ollama_endpoint() -> String {
    "http://localhost:11434".into()
}
fn default_date_posted() -> DatePosted {
    DatePosted::Past24Hours
}
fn default_sort_by() -> SortBy {
    SortBy::MostRecent
}
fn default_switch_threshold() -> u32 {
    25
}
fn default_true() -> bool {
    true
}
fn default_cycle_pause_min_secs() -> u64 {
    300
}
fn default_cycle_pause_max_secs() -> u64 {
    600
}

impl RunConfig {
    /// Check cross-field rules that serde cannot express.
    ///
    /// Every violation is collected so a user sees all problems at once.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut problems = Vec::new();

        if self.search.terms.iter().all(|t| t.trim().is_empty()) {
            problems.push("search.terms must contain at least one non-empty term".to_string());
        }
        if self.retry.attempts == 0 {
            problems.push("retry.attempts must be at least 1".to_string());
        }
        if self.retry.attempts_per_job == 0 {
            problems.push("retry.attempts_per_job must be at least 1".to_string());
        }
        if self.retry.min_delay_ms > self.retry.max_delay_ms {
            problems.push(format!(
                "retry.min_delay_ms ({}) exceeds retry.max_delay_ms ({})",
                self.retry.min_delay_ms, self.retry.max_delay_ms
            ));
        }
        if self.browser.min_action_delay_ms > self.browser.max_action_delay_ms {
            problems.push(format!(
                "browser.min_action_delay_ms ({}) exceeds browser.max_action_delay_ms ({})",
                self.browser.min_action_delay_ms, self.browser.max_action_delay_ms
            ));
        }
        if self.application.max_form_pages == 0 {
            problems.push("application.max_form_pages must be at least 1".to_string());
        }
        if self.search.cycle_pause_min_secs > self.search.cycle_pause_max_secs {
            problems.push(format!(
                "search.cycle_pause_min_secs ({}) exceeds search.cycle_pause_max_secs ({})",
                self.search.cycle_pause_min_secs, self.search.cycle_pause_max_secs
            ));
        }
        if self.limits.max_applications == Some(0) {
            problems.push("limits.max_applications must be positive when set".to_string());
        }
        if self.limits.max_applications_per_day == Some(0) {
            problems.push("limits.max_applications_per_day must be positive when set".to_string());
        }
        if self.browser.username.is_some() != self.browser.password.is_some() {
            problems.push("browser.username and browser.password must be set together".to_string());
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(problems)
        }
    }
}
