//! Language-model backed [`AnswerProvider`].
use crate::driver::{AnswerProvider, FormQuestion, QuestionKind};
use async_trait::async_trait;
use hireloop_config::ApplicantProfile;
use hireloop_llm::traits::LlmClient;
use std::sync::Arc;
use tracing::debug;

pub struct LlmAnswerProvider {
    client: Arc<dyn LlmClient>,
}

impl LlmAnswerProvider {
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl AnswerProvider for LlmAnswerProvider {
    async fn answer(
        &self,
        question: &FormQuestion,
        profile: &ApplicantProfile,
    ) -> anyhow::Result<Option<String>> {
        // Nothing a model says can stand in for a file.
        if question.kind == QuestionKind::FileUpload {
            return Ok(None);
        }
        let facts = candidate_facts(profile);
        let answer = self
            .client
            .answer_application_question(&question.label, question.options(), &facts)
            .await?;
        debug!(
            question = %question.label,
            model = self.client.model_name(),
            answered = answer.is_some(),
            "provider.answer"
        );
        Ok(answer)
    }
}

/// Render the profile as `key: value` lines, skipping unset fields.
pub fn candidate_facts(profile: &ApplicantProfile) -> String {
    let mut facts: Vec<String> = Vec::new();
    let mut push = |key: &str, value: Option<String>| {
        if let Some(value) = value.filter(|v| !v.trim().is_empty()) {
            facts.push(format!("{key}: {value}"));
        }
    };

    push("name", profile.full_name());
    push("email", profile.email.clone());
    push("phone", profile.phone.clone());
    push("city", profile.city.clone());
    push(
        "years of experience",
        profile.years_of_experience.map(|y| y.to_string()),
    );
    push(
        "requires visa sponsorship",
        profile
            .require_visa
            .map(|v| if v { "yes" } else { "no" }.to_string()),
    );
    push(
        "notice period (days)",
        profile.notice_period_days.map(|d| d.to_string()),
    );
    push(
        "expected salary",
        profile.expected_salary.map(|s| s.to_string()),
    );
    push("current salary", profile.current_salary.map(|s| s.to_string()));
    push("linkedin", profile.linkedin_url.clone());
    push("website", profile.website.clone());
    push("summary", profile.summary.clone());

    facts.join("\n")
}
