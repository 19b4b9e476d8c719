use crate::browser::{
    behavioral::BehavioralEngine,
    page::{child, children, classify, text, BrowserPage},
    stealth::{chrome_arguments, pick_profile},
};
use crate::extract::{
    is_daily_limit_notice, location_from_primary, parse_applicants, parse_insights, parse_salary,
    required_years,
};
use anyhow::{anyhow, Context, Result};
use async_stream::stream;
use async_trait::async_trait;
use fantoccini::elements::Element;
use fantoccini::ClientBuilder;
use futures::stream::BoxStream;
use hireloop_common::{DatePosted, SortBy};
use hireloop_config::{BrowserConfig, SearchConfig};
use hireloop_engine::answers::is_placeholder;
use hireloop_engine::{
    Action, ActionOutput, BrowserDriver, Fault, FormPage, FormQuestion, FormStage, JobPosting,
    QuestionKind, Screenshot, SearchFacet,
};
use serde_json::json;
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;
use uuid::Uuid;
use webdriver::capabilities::Capabilities;

const RESULTS_PER_PAGE: usize = 25;

const RESULT_CARD: &str = "li[data-occludable-job-id]";
const JOB_TITLE: &str = ".job-details-jobs-unified-top-card__job-title h1, h1.t-24";
const COMPANY_NAME: &str = ".job-details-jobs-unified-top-card__company-name";
const PRIMARY_DESCRIPTION: &str =
    ".job-details-jobs-unified-top-card__primary-description-container";
const INSIGHT_PILLS: &str =
    ".job-details-jobs-unified-top-card__job-insight, .job-details-preferences-and-skills__pill";
const DESCRIPTION: &str = ".jobs-box__html-content";
const COMPANY_BOX: &str = ".jobs-company__box";
const EASY_APPLY_BUTTON: &str = "button.jobs-apply-button[aria-label*='Easy']";
const CLOSED_NOTICE: &str = ".jobs-details-top-card__apply-error";

const MODAL: &str = ".jobs-easy-apply-modal";
const FORM_ELEMENT: &str = "div[data-test-form-element]";
const NEXT_BUTTON: &str = "button[aria-label='Continue to next step']";
const REVIEW_BUTTON: &str = "button[aria-label='Review your application']";
const SUBMIT_BUTTON: &str = "button[aria-label='Submit application']";
const DISMISS_BUTTON: &str = "button[aria-label='Dismiss']";
const DISCARD_CONFIRM: &str = "button[data-control-name='discard_application_confirm_btn']";
const SELECTED_RESUME: &str = ".jobs-document-upload-redesign-card__container--selected";
const NOTICES: &str = ".artdeco-inline-feedback__message, .artdeco-toast-item__message";

const LOGIN_USERNAME: &str = "#username";
const LOGIN_PASSWORD: &str = "#password";
const LOGIN_SUBMIT: &str = "button[type='submit']";
const NAV_BAR: &str = "#global-nav";

/// Job platform session driving the Easy Apply flow through WebDriver.
pub struct EasyApplyDriver {
    page: BrowserPage,
    base_url: String,
    location: Option<String>,
    easy_apply_only: bool,
    max_result_pages: u32,
    screenshot_dir: PathBuf,
}

impl EasyApplyDriver {
    /// Start a browser session and, when credentials are configured, log in.
    pub async fn connect(browser: &BrowserConfig, search: &SearchConfig) -> Result<Self> {
        let profile = pick_profile();
        let mut caps = Capabilities::new();
        caps.insert(
            "goog:chromeOptions".to_string(),
            json!({ "args": chrome_arguments(browser.stealth, &profile, browser.headless) }),
        );

        let client = ClientBuilder::native()
            .capabilities(caps)
            .connect(&browser.webdriver_url)
            .await
            .with_context(|| format!("failed to connect to WebDriver at {}", browser.webdriver_url))?;
        info!(
            webdriver = %browser.webdriver_url,
            stealth = ?browser.stealth,
            headless = browser.headless,
            "browser.session.start"
        );

        let page = BrowserPage::new(
            client,
            browser.stealth,
            profile,
            BehavioralEngine::from_config(browser),
            Duration::from_secs(browser.wait_timeout_secs),
        );
        let driver = Self {
            page,
            base_url: browser.base_url.clone(),
            location: search.location.clone(),
            easy_apply_only: search.easy_apply_only,
            max_result_pages: browser.max_result_pages.max(1),
            screenshot_dir: browser.screenshot_dir.clone(),
        };

        if let (Some(username), Some(password)) = (&browser.username, &browser.password) {
            driver.login(username, password).await?;
        }
        Ok(driver)
    }

    async fn login(&self, username: &str, password: &str) -> Result<()> {
        self.page.goto(&format!("{}/login", self.base_url)).await?;
        let user_field = self.page.wait_for(LOGIN_USERNAME).await?;
        self.page.fill(&user_field, username).await?;
        let password_field = self.page.wait_for(LOGIN_PASSWORD).await?;
        self.page.fill(&password_field, password).await?;
        self.page.click(LOGIN_SUBMIT).await?;

        self.page.wait_for(NAV_BAR).await.map_err(|_| {
            anyhow!("login did not complete; check the credentials or clear the security check in the browser")
        })?;
        info!(user = %username, "browser.login");
        Ok(())
    }

    /// End the WebDriver session.
    pub async fn close(self) -> Result<()> {
        self.page.client().clone().close().await?;
        Ok(())
    }

    fn job_url(&self, job_id: &str) -> String {
        format!("{}/jobs/view/{job_id}/", self.base_url)
    }

    async fn result_ids(&self) -> Result<Vec<String>, Fault> {
        match self.page.wait_for(RESULT_CARD).await {
            Ok(_) => {}
            Err(Fault::ElementNotFound(_)) => return Ok(Vec::new()),
            Err(fault) => return Err(fault),
        }
        let mut ids = Vec::new();
        for card in self.page.find_all(RESULT_CARD).await? {
            let id = card
                .attr("data-occludable-job-id")
                .await
                .map_err(|err| classify(RESULT_CARD, err))?;
            if let Some(id) = id.filter(|id| !id.is_empty()) {
                ids.push(id);
            }
        }
        Ok(ids)
    }

    /// Open the detail page; a missing title means the posting is gone.
    async fn open_detail(&self, job_id: &str) -> Result<String, Fault> {
        self.page.goto(&self.job_url(job_id)).await?;
        let title = match self.page.wait_for(JOB_TITLE).await {
            Ok(element) => text(&element, JOB_TITLE).await?,
            Err(Fault::ElementNotFound(_)) => return Err(Fault::PostingGone(job_id.to_string())),
            Err(fault) => return Err(fault),
        };
        if self.page.find(CLOSED_NOTICE).await?.is_some() {
            return Err(Fault::PostingGone(format!("{job_id} no longer accepts applications")));
        }
        Ok(title)
    }

    async fn read_posting(&self, job_id: &str) -> Result<JobPosting, Fault> {
        let title = self.open_detail(job_id).await?;
        let company = self.page.text_of(COMPANY_NAME).await?.unwrap_or_default();
        let primary = self
            .page
            .text_of(PRIMARY_DESCRIPTION)
            .await?
            .unwrap_or_default();
        let pills = self.page.texts_of(INSIGHT_PILLS).await?;
        let description = self.page.text_of(DESCRIPTION).await?;
        let company_description = self.page.text_of(COMPANY_BOX).await?;
        let easy_apply = self.page.find(EASY_APPLY_BUTTON).await?.is_some();

        let insights = parse_insights(pills.iter().map(String::as_str));
        Ok(JobPosting {
            id: job_id.to_string(),
            title,
            company,
            location: location_from_primary(&primary),
            experience_level: insights.experience_level,
            job_type: insights.job_type,
            workplace: insights.workplace,
            salary: pills.iter().find_map(|pill| parse_salary(pill)),
            applicants: parse_applicants(&primary),
            required_years: description.as_deref().and_then(required_years),
            company_description,
            description,
            easy_apply,
        })
    }

    async fn read_form_page(&self) -> Result<FormPage, Fault> {
        let modal = self.page.wait_for(MODAL).await?;
        let mut questions = Vec::new();
        for (index, element) in children(&modal, FORM_ELEMENT).await?.iter().enumerate() {
            if let Some(question) = read_question(index, element).await? {
                questions.push(question);
            }
        }

        let stage = if child(&modal, SUBMIT_BUTTON).await?.is_some() {
            FormStage::Review
        } else if child(&modal, NEXT_BUTTON).await?.is_some()
            || child(&modal, REVIEW_BUTTON).await?.is_some()
        {
            FormStage::Continue
        } else {
            return Err(Fault::ElementNotFound("form navigation button".into()));
        };
        debug!(questions = questions.len(), stage = ?stage, "browser.form.read");
        Ok(FormPage { questions, stage })
    }

    async fn answer(&self, question_id: &str, value: &str) -> Result<(), Fault> {
        let modal = self.page.wait_for(MODAL).await?;
        let index: usize = question_id
            .parse()
            .map_err(|_| Fault::ElementNotFound(format!("question {question_id}")))?;
        let elements = children(&modal, FORM_ELEMENT).await?;
        let element = elements
            .get(index)
            .ok_or_else(|| Fault::ElementNotFound(format!("question {question_id}")))?;

        if let Some(select) = child(element, "select").await? {
            select
                .select_by_label(value)
                .await
                .map_err(|err| classify("select option", err))?;
        } else if !children(element, "input[type='radio']").await?.is_empty() {
            let label = find_label(element, value).await?;
            label
                .click()
                .await
                .map_err(|err| classify("radio option", err))?;
        } else if let Some(file) = child(element, "input[type='file']").await? {
            file.send_keys(value)
                .await
                .map_err(|err| classify("file upload", err))?;
        } else if let Some(checkbox) = child(element, "input[type='checkbox']").await? {
            let wanted = is_truthy(value);
            let checked = checkbox
                .is_selected()
                .await
                .map_err(|err| classify("checkbox", err))?;
            if wanted != checked {
                let target = child(element, "label").await?.unwrap_or(checkbox);
                target
                    .click()
                    .await
                    .map_err(|err| classify("checkbox", err))?;
            }
        } else if let Some(field) = child(element, "textarea, input").await? {
            self.page.fill(&field, value).await?;
        } else {
            return Err(Fault::ElementNotFound(format!("control for question {question_id}")));
        }
        self.page.behavior().pause().await;
        Ok(())
    }

    async fn advance(&self) -> Result<(), Fault> {
        if self.page.find(NEXT_BUTTON).await?.is_some() {
            self.page.click(NEXT_BUTTON).await
        } else {
            self.page.click(REVIEW_BUTTON).await
        }
    }

    async fn start_application(&self) -> Result<(), Fault> {
        self.page.click(EASY_APPLY_BUTTON).await?;
        match self.page.wait_for(MODAL).await {
            Ok(_) => Ok(()),
            Err(fault @ Fault::ElementNotFound(_)) => {
                self.check_daily_limit().await?;
                Err(fault)
            }
            Err(fault) => Err(fault),
        }
    }

    /// Fails with [`Fault::DailyLimit`] when a visible notice says the
    /// platform takes no more applications today.
    async fn check_daily_limit(&self) -> Result<(), Fault> {
        for notice in self.page.texts_of(NOTICES).await? {
            if is_daily_limit_notice(&notice) {
                info!(notice = %notice, "browser.daily_limit");
                return Err(Fault::DailyLimit(notice));
            }
        }
        Ok(())
    }

    async fn submit(&self) -> Result<(), Fault> {
        self.page.click(SUBMIT_BUTTON).await?;
        self.page.behavior().pause().await;
        self.check_daily_limit().await?;
        // Post-submit confirmation dialog; absent on some flows.
        if let Some(dismiss) = self.page.find(DISMISS_BUTTON).await? {
            if let Err(err) = dismiss.click().await {
                debug!(error = %err, "browser.submit.dismiss_failed");
            }
        }
        Ok(())
    }

    async fn discard(&self) -> Result<(), Fault> {
        if self.page.find(DISMISS_BUTTON).await?.is_none() {
            return Ok(());
        }
        self.page.click(DISMISS_BUTTON).await?;
        if self.page.find(DISCARD_CONFIRM).await?.is_some() {
            self.page.click(DISCARD_CONFIRM).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl BrowserDriver for EasyApplyDriver {
    fn fetch_postings<'a>(
        &'a self,
        facet: &'a SearchFacet,
        known: &'a HashSet<String>,
    ) -> BoxStream<'a, Result<JobPosting, Fault>> {
        Box::pin(stream! {
            for page_no in 0..self.max_result_pages {
                let start = page_no * RESULTS_PER_PAGE as u32;
                let url = match search_url(
                    &self.base_url,
                    facet,
                    self.location.as_deref(),
                    self.easy_apply_only,
                    start,
                ) {
                    Ok(url) => url,
                    Err(err) => {
                        yield Err(Fault::Transient(format!("invalid search url: {err}")));
                        return;
                    }
                };
                info!(facet = %facet, page = page_no + 1, "browser.search.page");
                if let Err(fault) = self.page.goto(url.as_str()).await {
                    yield Err(fault);
                    return;
                }
                let ids = match self.result_ids().await {
                    Ok(ids) => ids,
                    Err(fault) => {
                        yield Err(fault);
                        return;
                    }
                };
                let count = ids.len();
                for id in ids {
                    if known.contains(&id) {
                        debug!(job_id = %id, "browser.posting.known");
                        continue;
                    }
                    match self.read_posting(&id).await {
                        Ok(posting) => {
                            yield Ok(posting);
                        }
                        Err(Fault::PostingGone(_)) => {
                            debug!(job_id = %id, "browser.posting.gone");
                        }
                        Err(fault) => {
                            yield Err(fault);
                            return;
                        }
                    }
                }
                if count < RESULTS_PER_PAGE {
                    break;
                }
            }
        })
    }

    async fn perform(&self, action: &Action) -> Result<ActionOutput, Fault> {
        debug!(action = action.label(), "browser.perform");
        match action {
            Action::OpenPosting { job_id } => {
                self.open_detail(job_id).await?;
                if self.page.find(EASY_APPLY_BUTTON).await?.is_none() {
                    return Err(Fault::PostingGone(format!("{job_id} has no Easy Apply button")));
                }
            }
            Action::StartApplication => self.start_application().await?,
            Action::ReadFormPage => return self.read_form_page().await.map(ActionOutput::Page),
            Action::Answer { question_id, value } => self.answer(question_id, value).await?,
            Action::AdvancePage => self.advance().await?,
            Action::Submit => self.submit().await?,
            Action::Discard => self.discard().await?,
        }
        Ok(ActionOutput::Done)
    }

    async fn capture_screenshot(&self, label: &str) -> Result<Screenshot> {
        let png = self.page.screenshot().await?;
        tokio::fs::create_dir_all(&self.screenshot_dir)
            .await
            .with_context(|| format!("failed to create {}", self.screenshot_dir.display()))?;
        let path = self
            .screenshot_dir
            .join(format!("{}-{}.png", file_stem(label), Uuid::new_v4()));
        tokio::fs::write(&path, png).await?;
        info!(path = %path.display(), "browser.screenshot");
        Ok(Screenshot {
            location: path.display().to_string(),
        })
    }
}

/// Search results URL for one facet and result offset.
pub fn search_url(
    base_url: &str,
    facet: &SearchFacet,
    location: Option<&str>,
    easy_apply_only: bool,
    start: u32,
) -> Result<Url, url::ParseError> {
    let mut url = Url::parse(base_url)?.join("/jobs/search/")?;
    {
        let mut query = url.query_pairs_mut();
        query.append_pair("keywords", &facet.term);
        if let Some(location) = location {
            query.append_pair("location", location);
        }
        if let Some(window) = posted_within(facet.date_posted) {
            query.append_pair("f_TPR", window);
        }
        query.append_pair("sortBy", sort_code(facet.sort_by));
        if easy_apply_only {
            query.append_pair("f_AL", "true");
        }
        if start > 0 {
            query.append_pair("start", &start.to_string());
        }
    }
    Ok(url)
}

fn posted_within(bucket: DatePosted) -> Option<&'static str> {
    match bucket {
        DatePosted::AnyTime => None,
        DatePosted::PastMonth => Some("r2592000"),
        DatePosted::PastWeek => Some("r604800"),
        DatePosted::Past24Hours => Some("r86400"),
    }
}

fn sort_code(sort: SortBy) -> &'static str {
    match sort {
        SortBy::MostRecent => "DD",
        SortBy::MostRelevant => "R",
    }
}

async fn read_question(index: usize, element: &Element) -> Result<Option<FormQuestion>, Fault> {
    let raw_label = match child(element, "label, legend").await? {
        Some(label) => text(&label, "question label").await?,
        None => String::new(),
    };
    let label = clean_label(&raw_label);

    let (kind, prefilled, required_attr) = if let Some(select) = child(element, "select").await? {
        let mut options = Vec::new();
        let mut chosen = None;
        for option in children(&select, "option").await? {
            let value = text(&option, "select option").await?;
            let selected = option
                .is_selected()
                .await
                .map_err(|err| classify("select option", err))?;
            if selected && !is_placeholder(&value) {
                chosen = Some(value.clone());
            }
            options.push(value);
        }
        let required = attr(&select, "aria-required").await?;
        (QuestionKind::Select { options }, chosen, required)
    } else if let Some(first_radio) = child(element, "input[type='radio']").await? {
        let mut options = Vec::new();
        let mut chosen = None;
        let radios = children(element, "input[type='radio']").await?;
        for (radio, label) in radios.iter().zip(children(element, "label").await?) {
            let value = text(&label, "radio label").await?;
            if radio
                .is_selected()
                .await
                .map_err(|err| classify("radio option", err))?
            {
                chosen = Some(value.clone());
            }
            options.push(value);
        }
        let required = attr(&first_radio, "aria-required").await?;
        (QuestionKind::Radio { options }, chosen, required)
    } else if let Some(file) = child(element, "input[type='file']").await? {
        let uploaded = child(element, SELECTED_RESUME)
            .await?
            .map(|_| "uploaded".to_string());
        (QuestionKind::FileUpload, uploaded, attr(&file, "aria-required").await?)
    } else if let Some(checkbox) = child(element, "input[type='checkbox']").await? {
        let checked = checkbox
            .is_selected()
            .await
            .map_err(|err| classify("checkbox", err))?;
        let required = attr(&checkbox, "aria-required").await?;
        (QuestionKind::Checkbox, checked.then(|| "true".to_string()), required)
    } else if let Some(area) = child(element, "textarea").await? {
        let value = prop(&area, "value").await?;
        (QuestionKind::TextArea, value, attr(&area, "aria-required").await?)
    } else if let Some(input) = child(element, "input").await? {
        let id = attr(&input, "id").await?.unwrap_or_default();
        let kind = if id.contains("numeric") {
            QuestionKind::Numeric
        } else {
            QuestionKind::Text
        };
        let value = prop(&input, "value").await?;
        (kind, value, attr(&input, "aria-required").await?)
    } else {
        return Ok(None);
    };

    Ok(Some(FormQuestion {
        id: index.to_string(),
        required: raw_label.contains('*') || required_attr.as_deref() == Some("true"),
        label,
        kind,
        prefilled: prefilled.filter(|v| !v.trim().is_empty()),
    }))
}

async fn find_label(element: &Element, value: &str) -> Result<Element, Fault> {
    for label in children(element, "label").await? {
        if text(&label, "radio label").await?.eq_ignore_ascii_case(value.trim()) {
            return Ok(label);
        }
    }
    Err(Fault::ElementNotFound(format!("option {value:?}")))
}

async fn attr(element: &Element, name: &str) -> Result<Option<String>, Fault> {
    element
        .attr(name)
        .await
        .map_err(|err| classify(name, err))
}

async fn prop(element: &Element, name: &str) -> Result<Option<String>, Fault> {
    element
        .prop(name)
        .await
        .map_err(|err| classify(name, err))
}

/// First line of a question label, without the required marker.
fn clean_label(raw: &str) -> String {
    raw.lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or_default()
        .trim_end_matches('*')
        .trim()
        .to_string()
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "yes" | "y" | "1" | "checked"
    )
}

fn file_stem(label: &str) -> String {
    label
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}
