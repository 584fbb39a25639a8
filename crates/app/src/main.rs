use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use pdf_qa_core::{
    load_pdf, Answer, CharacterNgramEmbedder, DocumentId, Embedder, GenerationMode, Generator,
    HttpEmbedder, HttpEmbedderConfig, HttpGenerator, HttpGeneratorConfig, IngestOutcome,
    LopdfExtractor, QaCoordinator, RagOptions, SessionStore, DEFAULT_EMBEDDING_DIMENSIONS,
};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

type DynEmbedder = Box<dyn Embedder + Send + Sync>;
type DynGenerator = Box<dyn Generator + Send + Sync>;
type Coordinator = QaCoordinator<DynEmbedder, DynGenerator>;

#[derive(Parser)]
#[command(name = "pdf-qa", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Embedding backend.
    #[arg(long, value_enum, env = "PDF_QA_EMBEDDER", default_value = "ngram")]
    embedder: EmbedderKind,

    /// Base URL of an OpenAI-compatible embeddings API (http embedder only)
    #[arg(long, env = "PDF_QA_EMBEDDING_URL", default_value = "http://localhost:8080/v1")]
    embedding_url: String,

    /// Embedding model name
    #[arg(long, env = "PDF_QA_EMBEDDING_MODEL", default_value = "all-MiniLM-L12-v2")]
    embedding_model: String,

    /// Embedding vector dimension
    #[arg(long, env = "PDF_QA_EMBEDDING_DIMENSIONS", default_value_t = DEFAULT_EMBEDDING_DIMENSIONS)]
    embedding_dimensions: usize,

    /// Base URL of an OpenAI-compatible completions API
    #[arg(long, env = "PDF_QA_LLM_URL", default_value = "http://localhost:8080/v1")]
    llm_url: String,

    /// Generation model name
    #[arg(long, env = "PDF_QA_LLM_MODEL", default_value = "Llama-3.2-1B-Instruct")]
    llm_model: String,

    /// Bearer token sent to both APIs
    #[arg(long, env = "PDF_QA_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Request timeout in seconds for remote models
    #[arg(long, env = "PDF_QA_TIMEOUT_SECS", default_value_t = 120)]
    timeout_secs: u64,

    /// Words per chunk
    #[arg(long, default_value_t = 180)]
    window_size: usize,

    /// Words shared by consecutive chunks
    #[arg(long, default_value_t = 30)]
    overlap: usize,

    /// Drop retrieved passages scoring below this similarity.
    #[arg(long)]
    min_score: Option<f32>,

    /// Print results as JSON.
    #[arg(long, default_value_t = false)]
    json: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum EmbedderKind {
    /// Offline hashed character trigrams.
    Ngram,
    /// Remote OpenAI-compatible embeddings endpoint.
    Http,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ModeArg {
    Qa,
    Mcq,
}

impl From<ModeArg> for GenerationMode {
    fn from(value: ModeArg) -> Self {
        match value {
            ModeArg::Qa => GenerationMode::Qa,
            ModeArg::Mcq => GenerationMode::Mcq,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Index a PDF and generate 10 Q/A pairs or MCQs from its opening pages.
    Generate {
        #[arg(long)]
        pdf: PathBuf,
        #[arg(long, value_enum, default_value = "qa")]
        mode: ModeArg,
    },
    /// Index a PDF and answer one question from it.
    ///
    /// Indexing also generates the mode's content, so a failing model fails
    /// the whole command before the question is asked.
    Ask {
        #[arg(long)]
        pdf: PathBuf,
        #[arg(long)]
        question: String,
        /// Content generated while indexing, logged at debug level.
        #[arg(long, value_enum, default_value = "qa")]
        mode: ModeArg,
        /// Number of passages handed to the model.
        #[arg(long, default_value_t = 3)]
        top_k: usize,
    },
    /// Index a PDF, then answer questions read from stdin until EOF or `exit`.
    Chat {
        #[arg(long)]
        pdf: PathBuf,
        #[arg(long, value_enum, default_value = "qa")]
        mode: ModeArg,
        #[arg(long, default_value_t = 3)]
        top_k: usize,
    },
    /// Check that the configured models can be constructed.
    Health,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer().with_writer(io::stderr))
        .init();

    let cli = Cli::parse();
    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        "pdf-qa boot"
    );

    // The core and its HTTP clients are blocking, keep them off the async workers.
    tokio::task::spawn_blocking(move || run(cli)).await?
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let coordinator = build_coordinator(&cli)?;

    match &cli.command {
        Command::Generate { pdf, mode } => {
            let outcome = ingest(&coordinator, pdf, (*mode).into())?;
            print_outcome(&outcome, cli.json)?;
        }
        Command::Ask {
            pdf,
            question,
            mode,
            top_k,
        } => {
            let outcome = ingest(&coordinator, pdf, (*mode).into())?;
            debug!(content = %outcome.generated_content, "content generated while indexing");
            let answer = coordinator.ask_with_k(&outcome.document_id, question, *top_k)?;
            print_answer(&answer, cli.json)?;
        }
        Command::Chat { pdf, mode, top_k } => {
            let outcome = ingest(&coordinator, pdf, (*mode).into())?;
            print_outcome(&outcome, cli.json)?;
            chat(&coordinator, &outcome.document_id, *top_k, cli.json)?;
        }
        Command::Health => {
            let health = coordinator.health();
            println!("{}", serde_json::to_string_pretty(&health)?);
        }
    }

    Ok(())
}

fn build_coordinator(cli: &Cli) -> anyhow::Result<Coordinator> {
    if cli.overlap >= cli.window_size {
        anyhow::bail!(
            "--overlap ({}) must be smaller than --window-size ({})",
            cli.overlap,
            cli.window_size
        );
    }
    let timeout = Duration::from_secs(cli.timeout_secs);

    let embedder: DynEmbedder = match cli.embedder {
        EmbedderKind::Ngram => Box::new(CharacterNgramEmbedder {
            dimensions: cli.embedding_dimensions,
        }),
        EmbedderKind::Http => Box::new(HttpEmbedder::new(HttpEmbedderConfig {
            base_url: cli.embedding_url.clone(),
            model: cli.embedding_model.clone(),
            api_key: cli.api_key.clone(),
            dimensions: cli.embedding_dimensions,
            timeout,
        })?),
    };

    let generator: DynGenerator = Box::new(HttpGenerator::new(HttpGeneratorConfig {
        base_url: cli.llm_url.clone(),
        model: cli.llm_model.clone(),
        api_key: cli.api_key.clone(),
        timeout,
    })?);

    let options = RagOptions {
        window_size: cli.window_size,
        overlap: cli.overlap,
        min_score: cli.min_score,
        ..RagOptions::default()
    };

    // A CLI run owns a single document, so one slot is enough.
    let store = SessionStore::with_capacity(Some(1));
    Ok(QaCoordinator::with_options(embedder, generator, store, options))
}

fn ingest(coordinator: &Coordinator, pdf: &Path, mode: GenerationMode) -> anyhow::Result<IngestOutcome> {
    let is_pdf = pdf
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
    if !is_pdf {
        anyhow::bail!("only PDF files are supported: {}", pdf.display());
    }

    let document = load_pdf(&LopdfExtractor, pdf)?;
    let empty_pages = document.pages.iter().filter(|page| page.is_empty()).count();
    if empty_pages > 0 {
        warn!(path = %pdf.display(), empty_pages, "pages without extractable text");
    }

    let outcome = coordinator.ingest_document(document, mode)?;
    info!(
        document_id = %outcome.document_id,
        chunk_count = outcome.chunk_count,
        "document ready"
    );
    Ok(outcome)
}

fn chat(
    coordinator: &Coordinator,
    document_id: &DocumentId,
    top_k: usize,
    json: bool,
) -> anyhow::Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        write!(stdout, "> ")?;
        stdout.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if matches!(question, "exit" | "quit") {
            break;
        }

        match coordinator.ask_with_k(document_id, question, top_k) {
            Ok(answer) => print_answer(&answer, json)?,
            Err(error) => warn!(%error, "question failed"),
        }
    }

    Ok(())
}

fn print_outcome(outcome: &IngestOutcome, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(outcome)?);
        return Ok(());
    }

    println!("{}", outcome.message);
    println!("file_id: {}", outcome.document_id);
    println!(
        "pages={} chunks={}",
        outcome.page_count, outcome.chunk_count
    );
    println!();
    println!("{}", outcome.generated_content);
    Ok(())
}

fn print_answer(answer: &Answer, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(answer)?);
        return Ok(());
    }

    println!("{}", answer.text);
    for source in &answer.sources {
        println!(
            "  [p{}] chunk={} score={:.4}",
            source.chunk.page, source.chunk.id, source.score
        );
    }
    Ok(())
}
