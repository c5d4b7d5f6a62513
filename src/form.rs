//! Slot-filling form
//!
//! The state machine behind a multi-turn order. Each utterance goes through
//! the same steps:
//!
//! ```text
//! utterance → extract → drop empty candidates → merge
//!           → unchanged?  → NoChange
//!           → validate    → Invalid (record untouched)
//!           → commit      → Completed | NeedsMoreInfo
//! ```
//!
//! The form never returns an error. Extractor failures become
//! [`Outcome::ExtractionFailed`] and leave the record untouched.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::extraction::{CandidateFields, Extractor};
use crate::record::{Record, RecordSchema};
use crate::session::SessionId;
use crate::validator::ValidationFailure;

/// Result of applying one utterance to the form
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    /// Nothing new was extracted; `repeats` counts consecutive such turns
    NoChange { repeats: u32 },
    /// Merged record failed validation on `field`; nothing was committed
    Invalid { field: String, message: String },
    /// Committed, but required fields are still missing (declaration order)
    NeedsMoreInfo { missing: Vec<String> },
    /// Committed and every required field is filled
    Completed { record: Record },
    /// Extractor could not produce a usable field map
    ExtractionFailed { reason: String },
}

impl Outcome {
    pub fn status(&self) -> &'static str {
        match self {
            Outcome::NoChange { .. } => "no_change",
            Outcome::Invalid { .. } => "invalid",
            Outcome::NeedsMoreInfo { .. } => "needs_more_info",
            Outcome::Completed { .. } => "completed",
            Outcome::ExtractionFailed { .. } => "extraction_failed",
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Outcome::Completed { .. })
    }
}

/// One in-progress form, owned by a single dialogue session
pub struct SlotFillingForm {
    session_id: SessionId,
    schema: Arc<RecordSchema>,
    extractor: Arc<dyn Extractor>,
    record: Record,
    language: String,
    no_progress: u32,
}

impl SlotFillingForm {
    /// Empty form for a new session
    pub fn new(
        session_id: SessionId,
        schema: Arc<RecordSchema>,
        extractor: Arc<dyn Extractor>,
    ) -> Self {
        let record = Record::empty(&schema);
        Self {
            session_id,
            schema,
            extractor,
            record,
            language: "English".to_string(),
            no_progress: 0,
        }
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    /// Resume from a previously collected record.
    ///
    /// Fields the schema does not declare are dropped. The rest must pass
    /// validation, otherwise the first failure is returned.
    pub fn with_record(mut self, record: &Record) -> Result<Self, ValidationFailure> {
        let values: CandidateFields = record
            .iter()
            .map(|(name, value)| (name.to_string(), value.map(str::to_string)))
            .collect();
        let restored = Record::empty(&self.schema).merged_with(&values);
        self.schema.validate(&restored)?;
        self.record = restored;
        Ok(self)
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn schema(&self) -> &RecordSchema {
        &self.schema
    }

    pub fn record(&self) -> &Record {
        &self.record
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    /// Consecutive turns that produced nothing new
    pub fn no_progress_count(&self) -> u32 {
        self.no_progress
    }

    /// Every required field is filled
    pub fn is_complete(&self) -> bool {
        self.schema.is_complete(&self.record)
    }

    /// Empty fields, required or optional, in declaration order
    pub fn missing_fields(&self) -> Vec<String> {
        self.schema.missing(&self.record)
    }

    /// Empty required fields, in declaration order
    pub fn missing_required_fields(&self) -> Vec<String> {
        self.schema.missing_required(&self.record)
    }

    /// Process one utterance
    pub async fn apply(&mut self, utterance: &str) -> Outcome {
        if utterance.trim().is_empty() {
            return self.no_change();
        }

        let candidates = match self.extractor.extract(utterance, &self.record).await {
            Ok(candidates) => candidates,
            Err(e) => {
                tracing::warn!(
                    session_id = %self.session_id,
                    extractor = self.extractor.name(),
                    error = %e,
                    "Extraction failed"
                );
                return Outcome::ExtractionFailed {
                    reason: e.to_string(),
                };
            }
        };

        tracing::debug!(
            session_id = %self.session_id,
            extractor = self.extractor.name(),
            candidates = ?candidates,
            "Extracted candidates"
        );

        let merged = self.record.merged_with(&candidates);
        if merged == self.record {
            return self.no_change();
        }
        self.no_progress = 0;

        if let Err(failure) = self.schema.validate(&merged) {
            tracing::info!(
                session_id = %self.session_id,
                field = %failure.field,
                reason = %failure.message,
                "Rejected update"
            );
            return Outcome::Invalid {
                field: failure.field,
                message: failure.message,
            };
        }

        self.record = merged;
        tracing::info!(session_id = %self.session_id, record = ?self.record, "Form updated");

        if self.is_complete() {
            Outcome::Completed {
                record: self.record.clone(),
            }
        } else {
            Outcome::NeedsMoreInfo {
                missing: self.missing_required_fields(),
            }
        }
    }

    fn no_change(&mut self) -> Outcome {
        self.no_progress = self.no_progress.saturating_add(1);
        tracing::debug!(
            session_id = %self.session_id,
            repeats = self.no_progress,
            "No new information"
        );
        Outcome::NoChange {
            repeats: self.no_progress,
        }
    }
}

impl fmt::Debug for SlotFillingForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlotFillingForm")
            .field("session_id", &self.session_id)
            .field("record", &self.record)
            .field("language", &self.language)
            .field("extractor", &self.extractor.name())
            .field("no_progress", &self.no_progress)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExtractionError;
    use crate::record::FieldSpec;
    use crate::validator::FieldValidator;
    use async_trait::async_trait;

    /// Returns the same candidates for every utterance
    struct Fixed(Result<CandidateFields, ExtractionError>);

    #[async_trait]
    impl Extractor for Fixed {
        async fn extract(&self, _: &str, _: &Record) -> Result<CandidateFields, ExtractionError> {
            self.0.clone()
        }
        fn name(&self) -> &str {
            "fixed"
        }
    }

    fn schema() -> Arc<RecordSchema> {
        Arc::new(
            RecordSchema::new(vec![
                FieldSpec::new("pizza_type", FieldValidator::one_of(["Margherita"], "{value} is not present in the menu")),
                FieldSpec::new("notes", FieldValidator::NonEmpty).optional(),
            ])
            .unwrap(),
        )
    }

    fn form(result: Result<CandidateFields, ExtractionError>) -> SlotFillingForm {
        SlotFillingForm::new(SessionId::from("s1"), schema(), Arc::new(Fixed(result)))
    }

    fn fields(pairs: &[(&str, &str)]) -> CandidateFields {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), Some(v.to_string())))
            .collect()
    }

    #[tokio::test]
    async fn test_blank_utterance_is_no_change() {
        let mut form = form(Ok(fields(&[("pizza_type", "Margherita")])));
        assert_eq!(form.apply("   ").await, Outcome::NoChange { repeats: 1 });
        assert!(form.missing_fields().contains(&"pizza_type".to_string()));
    }

    #[tokio::test]
    async fn test_repeats_count_and_reset() {
        let mut form = form(Ok(CandidateFields::new()));
        assert_eq!(form.apply("hi").await, Outcome::NoChange { repeats: 1 });
        assert_eq!(form.apply("hi").await, Outcome::NoChange { repeats: 2 });
        assert_eq!(form.no_progress_count(), 2);

        form.extractor = Arc::new(Fixed(Ok(fields(&[("notes", "no onions")]))));
        assert_eq!(
            form.apply("no onions").await,
            Outcome::NeedsMoreInfo {
                missing: vec!["pizza_type".to_string()]
            }
        );
        assert_eq!(form.no_progress_count(), 0);
    }

    #[tokio::test]
    async fn test_extraction_failure_leaves_record() {
        let mut form = form(Err(ExtractionError::Backend("timeout".to_string())));
        let before = form.record().clone();
        let outcome = form.apply("a Margherita").await;
        assert_eq!(
            outcome,
            Outcome::ExtractionFailed {
                reason: "Extraction backend failed: timeout".to_string()
            }
        );
        assert_eq!(form.record(), &before);
    }

    #[tokio::test]
    async fn test_optional_field_does_not_block_completion() {
        let mut form = form(Ok(fields(&[("pizza_type", "Margherita")])));
        let outcome = form.apply("a Margherita").await;
        assert!(outcome.is_completed());
        assert_eq!(form.missing_fields(), vec!["notes"]);
        assert!(form.missing_required_fields().is_empty());
    }

    #[test]
    fn test_with_record_drops_unknown_fields() {
        let other = RecordSchema::new(vec![
            FieldSpec::new("pizza_type", FieldValidator::NonEmpty),
            FieldSpec::new("colour", FieldValidator::NonEmpty),
        ])
        .unwrap();
        let previous = Record::with_values(&other, [("pizza_type", "Margherita"), ("colour", "red")]);
        let form = form(Ok(CandidateFields::new()))
            .with_record(&previous)
            .unwrap();
        assert_eq!(form.record().get("pizza_type"), Some("Margherita"));
        assert_eq!(form.record().iter().count(), 2);
        assert!(form.is_complete());
    }

    #[test]
    fn test_with_record_rejects_invalid_values() {
        let other = RecordSchema::new(vec![FieldSpec::new("pizza_type", FieldValidator::NonEmpty)])
            .unwrap();
        let previous = Record::with_values(&other, [("pizza_type", "Calzone")]);
        let failure = form(Ok(CandidateFields::new()))
            .with_record(&previous)
            .unwrap_err();
        assert_eq!(failure.field, "pizza_type");
        assert_eq!(failure.message, "Calzone is not present in the menu");
    }

    #[test]
    fn test_outcome_serializes_with_status_tag() {
        let outcome = Outcome::Invalid {
            field: "pizza_type".to_string(),
            message: "Calzone is not present in the menu".to_string(),
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "invalid");
        assert_eq!(json["field"], "pizza_type");
        assert_eq!(outcome.status(), "invalid");
    }
}
