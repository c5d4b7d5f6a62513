//! Dialogue driver
//!
//! Owns the session store and turns each [`Outcome`] into a user-facing
//! [`Reply`]. Sessions are created by [`DialogueDriver::start_order`] and
//! destroyed on completion or [`DialogueDriver::cancel`].
//!
//! | Outcome            | Reply                                          |
//! |--------------------|------------------------------------------------|
//! | `NoChange`         | last question again, plus an offer to cancel once stalled |
//! | `Invalid`          | validator message verbatim                     |
//! | `NeedsMoreInfo`    | one question about the first missing field     |
//! | `Completed`        | completion action output; session removed once it succeeds |
//! | `ExtractionFailed` | request to rephrase                            |

use std::sync::Arc;

use anyhow::{anyhow, Result};
use serde::Serialize;

use crate::completion::{CompletionAction, OrderReceipt};
use crate::config::FormConfig;
use crate::extraction::Extractor;
use crate::form::{Outcome, SlotFillingForm};
use crate::question::{QuestionContext, QuestionWriter, TemplateQuestionWriter};
use crate::record::RecordSchema;
use crate::session::{FormSession, InMemorySessionStore, SessionHandle, SessionId, SessionStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyKind {
    /// Asking for a missing field
    Question,
    /// Same question again after a turn with no new information
    Repeat,
    /// Repeated question plus an offer to cancel
    Stalled,
    Invalid,
    Rephrase,
    Completed,
    Cancelled,
    Menu,
    NoActiveOrder,
}

/// What the host should say back to the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reply {
    pub kind: ReplyKind,
    pub text: String,
    /// Field the reply is about, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl Reply {
    pub fn new(kind: ReplyKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
            field: None,
        }
    }

    fn about(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }
}

pub struct DialogueDriver {
    config: Arc<FormConfig>,
    schema: Arc<RecordSchema>,
    extractor: Arc<dyn Extractor>,
    questions: Arc<dyn QuestionWriter>,
    completion: Arc<dyn CompletionAction>,
    store: Arc<dyn SessionStore>,
}

impl DialogueDriver {
    /// Driver with template questions, the order receipt and in-memory sessions
    pub fn new(config: FormConfig, extractor: Arc<dyn Extractor>) -> Result<Self> {
        let schema = config.schema()?;
        let completion = OrderReceipt::new(config.receipt.clone(), schema.clone());
        Ok(Self {
            config: Arc::new(config),
            schema: Arc::new(schema),
            extractor,
            questions: Arc::new(TemplateQuestionWriter),
            completion: Arc::new(completion),
            store: Arc::new(InMemorySessionStore::new()),
        })
    }

    pub fn with_question_writer(mut self, questions: Arc<dyn QuestionWriter>) -> Self {
        self.questions = questions;
        self
    }

    pub fn with_completion_action(mut self, completion: Arc<dyn CompletionAction>) -> Self {
        self.completion = completion;
        self
    }

    pub fn with_session_store(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.store = store;
        self
    }

    pub fn config(&self) -> &FormConfig {
        &self.config
    }

    pub fn extractor_name(&self) -> &str {
        self.extractor.name()
    }

    pub async fn is_active(&self, id: &SessionId) -> bool {
        self.store.get(id).await.is_some()
    }

    pub async fn active_sessions(&self) -> usize {
        self.store.len().await
    }

    /// Open a fresh form for `id` and apply the utterance that started it.
    ///
    /// An order already in progress for `id` is discarded.
    pub async fn start_order(&self, id: SessionId, utterance: &str) -> Result<Reply> {
        let form = SlotFillingForm::new(id.clone(), self.schema.clone(), self.extractor.clone())
            .with_language(self.config.language.as_str());

        if self.store.put(id.clone(), FormSession::new(form)).await.is_some() {
            tracing::info!(session_id = %id, "Replaced order in progress");
        } else {
            tracing::info!(session_id = %id, "Order started");
        }

        let handle = self
            .store
            .get(&id)
            .await
            .ok_or_else(|| anyhow!("Session {} vanished right after creation", id))?;
        self.turn(&id, &handle, utterance)
            .await?
            .ok_or_else(|| anyhow!("Session {} was closed while starting", id))
    }

    /// Route an utterance to the active form.
    ///
    /// Returns `None` when `id` has no order in progress, so the host can
    /// carry on with its normal conversation.
    pub async fn handle(&self, id: &SessionId, utterance: &str) -> Result<Option<Reply>> {
        let Some(handle) = self.store.get(id).await else {
            return Ok(None);
        };
        self.turn(id, &handle, utterance).await
    }

    /// Discard the order in progress without touching the form
    pub async fn cancel(&self, id: &SessionId) -> Reply {
        match self.store.remove(id).await {
            Some(_) => {
                tracing::info!(session_id = %id, "Order cancelled");
                Reply::new(ReplyKind::Cancelled, self.config.messages.cancelled.as_str())
            }
            None => Reply::new(
                ReplyKind::NoActiveOrder,
                self.config.messages.no_active_order.as_str(),
            ),
        }
    }

    pub fn menu(&self) -> Reply {
        Reply::new(
            ReplyKind::Menu,
            self.config.menu.listing(&self.config.messages.menu_header),
        )
    }

    /// Apply one utterance; `None` if the session closed while waiting for its lock
    async fn turn(
        &self,
        id: &SessionId,
        handle: &SessionHandle,
        utterance: &str,
    ) -> Result<Option<Reply>> {
        let mut session = handle.lock().await;
        let current = self.store.get(id).await;
        if !current.is_some_and(|h| Arc::ptr_eq(&h, handle)) {
            return Ok(None);
        }
        session.touch();

        let mut outcome = session.form.apply(utterance).await;
        // A complete form left behind by a failed finalize is retried
        if matches!(outcome, Outcome::NoChange { .. }) && session.form.is_complete() {
            outcome = Outcome::Completed {
                record: session.form.record().clone(),
            };
        }
        tracing::debug!(session_id = %id, status = outcome.status(), "Turn processed");

        let reply = match outcome {
            Outcome::NoChange { repeats } => {
                let mut reply = match session.last_question.clone() {
                    Some(question) => {
                        let mut reply = Reply::new(ReplyKind::Repeat, question);
                        reply.field = session.last_field.clone();
                        reply
                    }
                    None => self.ask_next(&mut session, utterance).await?,
                };
                if repeats >= self.config.max_no_progress {
                    tracing::info!(session_id = %id, repeats, "Order stalled");
                    reply.kind = ReplyKind::Stalled;
                    reply.text = format!("{} {}", reply.text, self.config.messages.stalled);
                }
                reply
            }
            Outcome::Invalid { field, message } => {
                Reply::new(ReplyKind::Invalid, message).about(field)
            }
            Outcome::NeedsMoreInfo { .. } => self.ask_next(&mut session, utterance).await?,
            Outcome::Completed { record } => {
                let text = match self.completion.finalize(&record).await {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::warn!(session_id = %id, error = %e, "Finalize failed; order kept for retry");
                        return Err(e);
                    }
                };
                self.store.remove_handle(id, handle).await;
                tracing::info!(session_id = %id, "Order finalized");
                Reply::new(ReplyKind::Completed, text)
            }
            Outcome::ExtractionFailed { .. } => Reply::new(
                ReplyKind::Rephrase,
                self.config.messages.rephrase.as_str(),
            ),
        };
        Ok(Some(reply))
    }

    /// Ask about the first missing required field and remember the question
    async fn ask_next(&self, session: &mut FormSession, utterance: &str) -> Result<Reply> {
        let missing = session.form.missing_required_fields();
        let Some(field) = missing.first().and_then(|name| self.schema.field(name)) else {
            return Ok(Reply::new(
                ReplyKind::Rephrase,
                self.config.messages.rephrase.as_str(),
            ));
        };

        let ctx = QuestionContext {
            language: session.form.language(),
            utterance: Some(utterance),
            record: session.form.record(),
        };
        let question = self.questions.ask(field, &ctx).await?;

        session.last_question = Some(question.clone());
        session.last_field = Some(field.name.clone());
        Ok(Reply::new(ReplyKind::Question, question).about(field.name.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::PatternExtractor;

    fn driver() -> DialogueDriver {
        let config = FormConfig::pizza_default().unwrap();
        let extractor = Arc::new(PatternExtractor::from_config(&config).unwrap());
        DialogueDriver::new(config, extractor).unwrap()
    }

    fn question(driver: &DialogueDriver, field: &str) -> String {
        driver.config().field(field).unwrap().question.clone().unwrap()
    }

    #[tokio::test]
    async fn test_full_order() {
        let driver = driver();
        let id = SessionId::from("user-1");

        let reply = driver.start_order(id.clone(), "I want a margherita pizza").await.unwrap();
        assert_eq!(reply.kind, ReplyKind::Question);
        assert_eq!(reply.field.as_deref(), Some("address"));
        assert_eq!(reply.text, question(&driver, "address"));

        let reply = driver
            .handle(&id, "my address is Via Roma 1, my phone is 333123123")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reply.kind, ReplyKind::Completed);
        assert!(reply.text.contains("Margherita"));
        assert!(!driver.is_active(&id).await);
        assert!(driver.handle(&id, "hello").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_no_progress_repeats_then_stalls() {
        let driver = driver();
        let id = SessionId::from("user-2");

        let first = driver.start_order(id.clone(), "I'd like to order").await.unwrap();
        assert_eq!(first.kind, ReplyKind::Question);
        assert_eq!(first.field.as_deref(), Some("pizza_type"));

        let again = driver.handle(&id, "hmm").await.unwrap().unwrap();
        assert_eq!(again.kind, ReplyKind::Repeat);
        assert_eq!(again.text, first.text);

        let stalled = driver.handle(&id, "hmm").await.unwrap().unwrap();
        assert_eq!(stalled.kind, ReplyKind::Stalled);
        assert!(stalled.text.starts_with(&first.text));
        assert!(stalled.text.ends_with(&driver.config().messages.stalled));
    }

    #[tokio::test]
    async fn test_cancel_and_menu() {
        let driver = driver();
        let id = SessionId::from("user-3");

        assert_eq!(driver.cancel(&id).await.kind, ReplyKind::NoActiveOrder);

        driver.start_order(id.clone(), "a diavola").await.unwrap();
        assert!(driver.is_active(&id).await);
        let reply = driver.cancel(&id).await;
        assert_eq!(reply.kind, ReplyKind::Cancelled);
        assert_eq!(reply.text, driver.config().messages.cancelled);
        assert_eq!(driver.active_sessions().await, 0);

        let menu = driver.menu();
        assert_eq!(menu.kind, ReplyKind::Menu);
        assert!(menu.text.starts_with("The available pizzas are the following:"));
        assert!(menu.text.contains(" - Margherita with the following ingredients:"));
    }

    #[tokio::test]
    async fn test_start_order_replaces_existing_form() {
        let driver = driver();
        let id = SessionId::from("user-4");

        driver.start_order(id.clone(), "a diavola").await.unwrap();
        let reply = driver.start_order(id.clone(), "hello").await.unwrap();
        assert_eq!(reply.field.as_deref(), Some("pizza_type"));
        assert_eq!(driver.active_sessions().await, 1);
    }

    #[test]
    fn test_reply_serialization() {
        let reply = Reply::new(ReplyKind::NoActiveOrder, "nothing to cancel");
        let json = serde_json::to_value(&reply).unwrap();
        assert_eq!(json["kind"], "no_active_order");
        assert!(json.get("field").is_none());
    }
}
