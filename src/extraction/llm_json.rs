//! Few-shot JSON update extractor
//!
//! Shows the model the current record as JSON and asks for the updated JSON
//! after reading the user's sentence. One worked example per field is built
//! from the field's configured examples.

use std::sync::Arc;

use async_trait::async_trait;

use super::{parse_candidates, CandidateFields, Extractor};
use crate::error::ExtractionError;
use crate::llm::LlmClient;
use crate::record::{Record, RecordSchema};

const SYSTEM_PROMPT: &str = "You update a JSON object with information extracted from a sentence. \
Keep every existing value unless the sentence changes it. \
Use null for anything the sentence does not mention. \
Reply with the updated JSON object only.";

pub struct LlmJsonExtractor {
    client: Arc<dyn LlmClient>,
    schema: Arc<RecordSchema>,
}

impl LlmJsonExtractor {
    pub fn new(client: Arc<dyn LlmClient>, schema: Arc<RecordSchema>) -> Self {
        Self { client, schema }
    }

    fn pretty(record: &Record) -> String {
        serde_json::to_string_pretty(record).unwrap_or_default()
    }

    /// Prompt with one worked example per field, then the live sentence
    pub fn build_prompt(&self, utterance: &str, record: &Record) -> String {
        let mut prompt =
            String::from("Update the following JSON with information extracted from the Sentence:\n\n");

        let blank = Record::empty(&self.schema);
        for field in self.schema.fields() {
            let Some(example) = field.examples.first() else {
                continue;
            };
            let filled =
                Record::with_values(&self.schema, [(field.name.as_str(), example.value.as_str())]);

            prompt.push_str(&format!(
                "Sentence: {}\nJSON: {}\nUpdated JSON: {}\n\n",
                example.text,
                Self::pretty(&blank),
                Self::pretty(&filled)
            ));
        }

        prompt.push_str(&format!(
            "Sentence: {}\nJSON: {}\nUpdated JSON:",
            utterance,
            Self::pretty(record)
        ));
        prompt
    }
}

#[async_trait]
impl Extractor for LlmJsonExtractor {
    async fn extract(
        &self,
        utterance: &str,
        record: &Record,
    ) -> Result<CandidateFields, ExtractionError> {
        let prompt = self.build_prompt(utterance, record);
        let response = self
            .client
            .chat_json(SYSTEM_PROMPT, &prompt)
            .await
            .map_err(ExtractionError::backend)?;

        tracing::debug!(
            provider = self.client.provider_name(),
            response = %response,
            "LLM JSON extraction"
        );
        parse_candidates(&response)
    }

    fn name(&self) -> &str {
        "llm-json"
    }
}
