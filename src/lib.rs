//! Pizza Form - slot-filling conversational order taking
//!
//! Collects a structured pizza order (pizza type, delivery address, phone)
//! from free-text utterances across several conversation turns.
//!
//! ## Turn flow
//!
//! ```text
//! utterance → DialogueDriver → SlotFillingForm::apply → Extractor
//!                                   │ merge, validate
//!                                   ▼
//!                                Outcome → Reply (question / error / receipt)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use pizza_form::{DialogueDriver, FormConfig, PatternExtractor, SessionId};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let config = FormConfig::pizza_default()?;
//! let extractor = Arc::new(PatternExtractor::from_config(&config)?);
//! let driver = DialogueDriver::new(config, extractor)?;
//!
//! let id = SessionId::generate();
//! let reply = driver.start_order(id.clone(), "I'd like a Margherita").await?;
//! println!("{}", reply.text);
//! # Ok(())
//! # }
//! ```

// Error types
pub mod error;

// Record model and validation
pub mod menu;
pub mod record;
pub mod validator;

// YAML form configuration
pub mod config;

// The state machine
pub mod form;

// Extraction backends and the LLM clients behind them
pub mod extraction;
pub mod llm;

// Driver collaborators
pub mod completion;
pub mod question;
pub mod session;

pub mod driver;

pub use completion::{CompletionAction, OrderReceipt};
pub use config::{FieldConfig, FormConfig, Messages, ReceiptConfig, ReceiptFormat, ValidatorConfig};
pub use driver::{DialogueDriver, Reply, ReplyKind};
pub use error::{ConfigError, ExtractionError};
pub use extraction::{
    CandidateFields, Extractor, ExtractorKind, LlmJsonExtractor, PatternExtractor,
    SchemaToolExtractor,
};
pub use form::{Outcome, SlotFillingForm};
pub use llm::{create_llm_client, LlmBackend, LlmClient};
pub use menu::{Menu, MenuItem};
pub use question::{LlmQuestionWriter, QuestionContext, QuestionWriter, TemplateQuestionWriter};
pub use record::{FieldExample, FieldSpec, Record, RecordSchema};
pub use session::{FormSession, InMemorySessionStore, SessionId, SessionStore};
pub use validator::{FieldValidator, ValidationFailure};
