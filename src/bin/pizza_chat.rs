//! Interactive pizza ordering in the terminal
//!
//! Usage:
//!   cargo run --features cli --bin pizza_chat
//!   cargo run --features cli --bin pizza_chat -- --extractor llm-json --questions llm
//!   cargo run --features cli --bin pizza_chat -- --config my_form.yaml --language English
//!
//! Type `menu` to see the pizzas, `cancel` to drop the order, `quit` to leave.
//! Anything mentioning an order or a pizza starts one.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use pizza_form::{
    create_llm_client, DialogueDriver, Extractor, ExtractorKind, FormConfig, LlmJsonExtractor,
    LlmQuestionWriter, PatternExtractor, SchemaToolExtractor, SessionId,
};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum QuestionMode {
    Template,
    Llm,
}

#[derive(Parser)]
#[command(name = "pizza_chat")]
#[command(about = "Order a pizza through a slot-filling conversation")]
struct Args {
    /// Form definition (YAML); the built-in pizza order when omitted
    #[arg(short = 'c', long, env = "PIZZA_FORM_CONFIG")]
    config: Option<PathBuf>,

    /// Extraction strategy (pattern, llm-json, schema-tool)
    #[arg(short = 'e', long, default_value = "pattern")]
    extractor: ExtractorKind,

    /// How follow-up questions are written
    #[arg(short = 'q', long, value_enum, default_value = "template")]
    questions: QuestionMode,

    /// Override the conversation language
    #[arg(short = 'l', long)]
    language: Option<String>,
}

enum Command {
    Quit,
    Menu,
    Cancel,
    Start,
    Say,
}

fn classify(line: &str) -> Command {
    let lower = line.trim().to_lowercase();
    match lower.as_str() {
        "quit" | "exit" | "/quit" => return Command::Quit,
        "menu" | "/menu" => return Command::Menu,
        "cancel" | "stop" | "/cancel" => return Command::Cancel,
        _ => {}
    }
    if lower.contains("menu") {
        Command::Menu
    } else if lower.contains("cancel") {
        Command::Cancel
    } else if ["order", "pizza", "ordinare"].iter().any(|w| lower.contains(w)) {
        Command::Start
    } else {
        Command::Say
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => FormConfig::load_from_file(path)?,
        None => FormConfig::pizza_default()?,
    };
    if let Some(language) = args.language {
        config = config.with_language(language);
    }
    let schema = Arc::new(config.schema()?);

    let needs_llm = args.extractor.needs_llm() || matches!(args.questions, QuestionMode::Llm);
    let llm = if needs_llm { Some(create_llm_client()?) } else { None };

    let extractor: Arc<dyn Extractor> = match (args.extractor, &llm) {
        (ExtractorKind::LlmJson, Some(client)) => {
            Arc::new(LlmJsonExtractor::new(client.clone(), schema.clone()))
        }
        (ExtractorKind::SchemaTool, Some(client)) => {
            Arc::new(SchemaToolExtractor::new(client.clone(), &schema))
        }
        _ => Arc::new(PatternExtractor::from_config(&config)?),
    };

    let mut driver = DialogueDriver::new(config, extractor)?;
    if let (QuestionMode::Llm, Some(client)) = (args.questions, &llm) {
        driver = driver.with_question_writer(Arc::new(LlmQuestionWriter::new(client.clone())));
    }

    let session = SessionId::generate();
    tracing::info!(session_id = %session, extractor = driver.extractor_name(), "Chat started");

    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    stdout
        .write_all(b"Hi! Ask for the menu or tell me which pizza you would like.\n> ")
        .await?;
    stdout.flush().await?;

    while let Some(line) = lines.next_line().await? {
        let active = driver.is_active(&session).await;
        let reply = match classify(&line) {
            Command::Quit => break,
            Command::Menu => Some(driver.menu()),
            Command::Cancel => Some(driver.cancel(&session).await),
            Command::Start if !active => {
                Some(driver.start_order(session.clone(), &line).await?)
            }
            Command::Start | Command::Say => driver.handle(&session, &line).await?,
        };

        let text = reply.map(|r| r.text).unwrap_or_else(|| {
            "I can take a pizza order for you. Just tell me what you would like.".to_string()
        });
        stdout.write_all(format!("{}\n> ", text).as_bytes()).await?;
        stdout.flush().await?;
    }

    Ok(())
}
