//! Follow-up questions
//!
//! When the form still needs information the driver asks for exactly one
//! missing field. [`TemplateQuestionWriter`] uses the configured phrasing;
//! [`LlmQuestionWriter`] has the model write the question in the
//! conversation language and falls back to the template on any failure.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::llm::LlmClient;
use crate::record::{FieldSpec, Record};

/// What the writer knows about the conversation
#[derive(Debug, Clone, Copy)]
pub struct QuestionContext<'a> {
    pub language: &'a str,
    /// Latest user message, when there is one
    pub utterance: Option<&'a str>,
    pub record: &'a Record,
}

#[async_trait]
pub trait QuestionWriter: Send + Sync {
    /// One polite question about `field`, never mentioning its identifier
    async fn ask(&self, field: &FieldSpec, ctx: &QuestionContext<'_>) -> Result<String>;
}

/// Configured question, or one built from the field label
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateQuestionWriter;

impl TemplateQuestionWriter {
    pub fn question_for(field: &FieldSpec) -> String {
        match field.question.as_deref().map(str::trim) {
            Some(q) if !q.is_empty() => q.to_string(),
            _ => format!("Could you tell me your {}?", field.label),
        }
    }
}

#[async_trait]
impl QuestionWriter for TemplateQuestionWriter {
    async fn ask(&self, field: &FieldSpec, _ctx: &QuestionContext<'_>) -> Result<String> {
        Ok(Self::question_for(field))
    }
}

/// Model-written questions
pub struct LlmQuestionWriter {
    client: Arc<dyn LlmClient>,
    fallback: TemplateQuestionWriter,
}

impl LlmQuestionWriter {
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self {
            client,
            fallback: TemplateQuestionWriter,
        }
    }

    pub fn build_prompt(field: &FieldSpec, ctx: &QuestionContext<'_>) -> (String, String) {
        let system = format!(
            "You are taking a pizza order. Reply in {}. \
Ask the user for one piece of information only. \
Do not greet the user, do not list what you already know, \
and do not mention field names or variable names.",
            ctx.language
        );

        let about = if field.description.trim().is_empty() {
            field.label.clone()
        } else {
            field.description.trim().to_string()
        };
        let mut user = format!("Ask the user for the following information: {}", about);
        if let Some(utterance) = ctx.utterance.filter(|u| !u.trim().is_empty()) {
            user.push_str(&format!("\n\nThe user's last message was: {}", utterance));
        }
        (system, user)
    }
}

#[async_trait]
impl QuestionWriter for LlmQuestionWriter {
    async fn ask(&self, field: &FieldSpec, ctx: &QuestionContext<'_>) -> Result<String> {
        let (system, user) = Self::build_prompt(field, ctx);
        match self.client.chat(&system, &user).await {
            Ok(text) if !text.trim().is_empty() => Ok(text.trim().to_string()),
            Ok(_) => {
                tracing::warn!(field = %field.name, "LLM returned an empty question, using template");
                self.fallback.ask(field, ctx).await
            }
            Err(e) => {
                tracing::warn!(field = %field.name, error = %e, "LLM question failed, using template");
                self.fallback.ask(field, ctx).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{ToolCallResult, ToolDefinition};
    use crate::record::RecordSchema;
    use crate::validator::FieldValidator;

    struct Canned(Option<&'static str>);

    #[async_trait]
    impl LlmClient for Canned {
        async fn chat(&self, _: &str, _: &str) -> Result<String> {
            self.0
                .map(str::to_string)
                .ok_or_else(|| anyhow::anyhow!("rate limited"))
        }
        async fn chat_json(&self, s: &str, u: &str) -> Result<String> {
            self.chat(s, u).await
        }
        async fn chat_with_tool(&self, _: &str, _: &str, _: &ToolDefinition) -> Result<ToolCallResult> {
            anyhow::bail!("unsupported")
        }
        fn model_name(&self) -> &str {
            "canned"
        }
        fn provider_name(&self) -> &str {
            "canned"
        }
    }

    fn phone() -> FieldSpec {
        FieldSpec::new("phone", FieldValidator::NonEmpty)
            .with_label("phone number")
            .with_description("The telephone number to call in case of need.")
    }

    fn record() -> Record {
        Record::empty(&RecordSchema::new(vec![phone()]).unwrap())
    }

    #[tokio::test]
    async fn test_template_prefers_configured_question() {
        let record = record();
        let ctx = QuestionContext { language: "English", utterance: None, record: &record };
        let field = phone().with_question("What number can we reach you at?");
        let q = TemplateQuestionWriter.ask(&field, &ctx).await.unwrap();
        assert_eq!(q, "What number can we reach you at?");

        let q = TemplateQuestionWriter.ask(&phone(), &ctx).await.unwrap();
        assert_eq!(q, "Could you tell me your phone number?");
        assert!(!q.contains("phone_"));
    }

    #[test]
    fn test_prompt_carries_language_and_description() {
        let record = record();
        let ctx = QuestionContext {
            language: "Italian",
            utterance: Some("una margherita"),
            record: &record,
        };
        let (system, user) = LlmQuestionWriter::build_prompt(&phone(), &ctx);
        assert!(system.contains("Reply in Italian"));
        assert!(system.contains("one piece of information only"));
        assert!(user.contains("telephone number"));
        assert!(user.ends_with("una margherita"));
    }

    #[tokio::test]
    async fn test_llm_writer_falls_back_on_error_and_empty_output() {
        let record = record();
        let ctx = QuestionContext { language: "English", utterance: None, record: &record };

        let writer = LlmQuestionWriter::new(Arc::new(Canned(None)));
        assert_eq!(writer.ask(&phone(), &ctx).await.unwrap(), "Could you tell me your phone number?");

        let writer = LlmQuestionWriter::new(Arc::new(Canned(Some("  "))));
        assert_eq!(writer.ask(&phone(), &ctx).await.unwrap(), "Could you tell me your phone number?");

        let writer = LlmQuestionWriter::new(Arc::new(Canned(Some(" Your number, please? \n"))));
        assert_eq!(writer.ask(&phone(), &ctx).await.unwrap(), "Your number, please?");
    }
}
