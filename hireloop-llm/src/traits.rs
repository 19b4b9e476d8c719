use async_trait::async_trait;
use hireloop_common::Result;
use serde::{Deserialize, Serialize};

/// Marker a model returns when it cannot answer from the supplied facts.
pub const UNKNOWN_ANSWER: &str = "UNKNOWN";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmResponse {
    pub text: String,
    pub model: Option<String>,
    pub tokens_used: Option<u32>,
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Generate a response to the given prompt with optional system prompt
    async fn generate(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
        max_tokens: Option<u32>,
        temperature: Option<f32>,
    ) -> Result<LlmResponse>;

    /// Check if the LLM service is available
    async fn health_check(&self) -> Result<bool>;

    /// Get the model name being used
    fn model_name(&self) -> &str;

    fn application_system_prompt(&self) -> &str {
        r#"You fill in job application forms on behalf of a candidate.

Rules:
- Answer only from the candidate facts you are given.
- Reply with the answer alone, no explanation or punctuation around it.
- Numeric questions get a bare whole number.
- When options are listed, reply with exactly one of them.
- If the facts do not answer the question, reply with UNKNOWN."#
    }

    /// Answer one application form question for the candidate.
    ///
    /// Returns `None` when the model declines or picks something outside
    /// `options`.
    async fn answer_application_question(
        &self,
        question: &str,
        options: &[String],
        candidate_facts: &str,
    ) -> Result<Option<String>> {
        let mut prompt = format!("CANDIDATE:\n{candidate_facts}\n\nQUESTION: \"{question}\"\n");
        if !options.is_empty() {
            prompt.push_str("OPTIONS:\n");
            for option in options {
                prompt.push_str(&format!("- {option}\n"));
            }
        }
        prompt.push_str("\nAnswer:");

        tracing::debug!(target: "llm", question, model = self.model_name(), "llm.answer_question");
        let response = self
            .generate(
                &prompt,
                Some(self.application_system_prompt()),
                Some(120),
                Some(0.1),
            )
            .await?;

        Ok(parse_answer(&response.text, options))
    }
}

/// Interpret raw model output as a form answer.
pub fn parse_answer(raw: &str, options: &[String]) -> Option<String> {
    let text = raw
        .trim()
        .trim_matches(|c: char| c == '"' || c == '\'' || c == '`')
        .trim();
    if text.is_empty() || text.eq_ignore_ascii_case(UNKNOWN_ANSWER) {
        return None;
    }
    if options.is_empty() {
        return Some(text.to_string());
    }

    let lowered = text.to_lowercase();
    options
        .iter()
        .find(|o| o.eq_ignore_ascii_case(text))
        .or_else(|| {
            options
                .iter()
                .find(|o| lowered.contains(&o.to_lowercase()))
        })
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn unknown_and_blank_mean_no_answer() {
        assert_eq!(parse_answer(" UNKNOWN\n", &[]), None);
        assert_eq!(parse_answer("\"unknown\"", &[]), None);
        assert_eq!(parse_answer("   ", &[]), None);
    }

    #[test]
    fn free_text_is_trimmed() {
        assert_eq!(parse_answer("  \"5\" ", &[]), Some("5".to_string()));
    }

    #[test]
    fn choices_must_match_an_option() {
        let options = opts(&["Yes", "No"]);
        assert_eq!(parse_answer("yes", &options), Some("Yes".to_string()));
        assert_eq!(
            parse_answer("The answer is No.", &options),
            Some("No".to_string())
        );
        assert_eq!(parse_answer("Maybe", &options), None);
    }
}
