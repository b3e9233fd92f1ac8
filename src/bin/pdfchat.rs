//! Interactive terminal front end for pdfchat.
//!
//! A thin shim over the library's [`Session`]: CLI flags map onto
//! `PdfChatConfig`, each input line is either a `/command` or a question.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use pdfchat::{
    AskOutcome, EmbeddingProviderKind, PdfChatConfig, PdfChatError, ProcessOutcome,
    ProcessingProgressCallback, ProgressCallback, Session, SessionState, Stage, VectorIndex,
};
use std::io::{self, Write};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress display: a stage-labelled status line per stage and a
/// live bar for extracted pages and embedded chunks.
///
/// A fresh bar is created for every processing run; [`CliProgressCallback::clear`]
/// tears it down when a run ends early with an error.
struct CliProgressCallback {
    bar: Mutex<Option<ProgressBar>>,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            bar: Mutex::new(None),
        })
    }

    fn slot(&self) -> MutexGuard<'_, Option<ProgressBar>> {
        self.bar.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// The current bar, created as a spinner on first use.
    fn bar(&self) -> ProgressBar {
        let mut slot = self.slot();
        if let Some(ref bar) = *slot {
            return bar.clone();
        }
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);
        bar.set_style(spinner_style);
        bar.enable_steady_tick(Duration::from_millis(80));
        *slot = Some(bar.clone());
        bar
    }

    /// Switch to a counting bar once the total is known.
    fn activate_counter(&self, prefix: &'static str, unit: &str, total: usize) {
        let bar = self.bar();
        let template = format!(
            "{{spinner:.cyan}} {{prefix:.bold}}  \
             [{{bar:42.green/238}}] {{percent:>3}}%  {{pos:>4}}/{{len}} {unit}  {{msg:.dim}}"
        );
        let style = ProgressStyle::with_template(&template)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  ")
            .tick_strings(TICKS);
        bar.set_length(total as u64);
        bar.set_position(0);
        bar.set_style(style);
        bar.set_prefix(prefix);
        bar.reset_eta();
    }

    fn clear(&self) {
        if let Some(bar) = self.slot().take() {
            bar.finish_and_clear();
        }
    }
}

impl ProcessingProgressCallback for CliProgressCallback {
    fn on_stage(&self, stage: Stage) {
        let bar = self.bar();
        bar.println(format!("{} {}", cyan("◆"), bold(&stage.to_string())));
        match stage {
            Stage::Extracting => bar.set_prefix("Extracting"),
            Stage::Chunking => {
                bar.set_prefix("Chunking");
                bar.set_message("");
            }
            Stage::Indexing => {
                bar.set_prefix("Indexing");
                bar.set_message("embedding chunks…");
            }
        }
    }

    fn on_extraction_start(&self, total_pages: usize) {
        self.activate_counter("Extracting", "pages", total_pages);
    }

    fn on_page_extracted(&self, pages_processed: usize, _total_pages: usize, document: &str) {
        let bar = self.bar();
        bar.set_position(pages_processed as u64);
        bar.set_message(document.to_string());
    }

    fn on_extraction_complete(&self, total_pages: usize) {
        self.bar().println(format!(
            "  {} {} pages extracted",
            green("✓"),
            bold(&total_pages.to_string())
        ));
    }

    fn on_chunks_embedded(&self, chunks_embedded: usize, total_chunks: usize) {
        if self.bar().length() != Some(total_chunks as u64) {
            self.activate_counter("Indexing", "chunks", total_chunks);
        }
        self.bar().set_position(chunks_embedded as u64);
    }

    fn on_processing_complete(&self, chunk_count: usize, cache_hit: bool) {
        self.clear();
        if cache_hit {
            eprintln!(
                "{} Documents unchanged; reusing the existing index ({} chunks)",
                green("✔"),
                bold(&chunk_count.to_string())
            );
        } else {
            eprintln!(
                "{} Index built with {} chunks",
                green("✔"),
                bold(&chunk_count.to_string())
            );
        }
    }
}

// ── Command line ─────────────────────────────────────────────────────────────

const AFTER_HELP: &str = r#"COMMANDS (inside the session):
  /upload <path|url>...   Add one or more PDFs (quote paths with spaces)
  /remove <name>          Drop an uploaded PDF
  /files                  List uploaded PDFs
  /process                Extract, chunk and index the uploaded PDFs
  /status                 Show session state and index location
  /help                   Show this list
  /quit                   Leave the session
  anything else           Ask a question about the processed PDFs

EXAMPLES:
  # Start with two PDFs already uploaded
  pdfchat report.pdf appendix.pdf

  # Upload and process straight away
  pdfchat --process https://arxiv.org/pdf/1706.03762

  # OpenAI for both embeddings and answers
  pdfchat --embedding-provider openai --provider openai --model gpt-4.1-mini

ENVIRONMENT VARIABLES:
  GEMINI_API_KEY          Google Gemini API key (embeddings and answers)
  GOOGLE_API_KEY          Accepted in place of GEMINI_API_KEY
  OPENAI_API_KEY          OpenAI API key
  EDGEQUAKE_LLM_PROVIDER  Override chat provider (gemini, openai, anthropic, ollama)
  EDGEQUAKE_MODEL         Override chat model ID
  RUST_LOG                Log filter (overrides --verbose)

A .env file in the working directory is loaded at startup.
"#;

/// Chat with your PDF documents.
#[derive(Parser, Debug)]
#[command(
    name = "pdfchat",
    version,
    about = "Ask questions about your PDF documents",
    long_about = "Upload PDF documents, process them into a local vector index, then ask \
questions in plain language. Answers are written by a hosted chat model from the most \
relevant passages and name the document and page they came from.",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// PDF files or URLs to upload at startup.
    files: Vec<String>,

    /// Process the startup files immediately.
    #[arg(long)]
    process: bool,

    /// Directory holding the vector index.
    #[arg(long, env = "PDFCHAT_INDEX_DIR", default_value = pdfchat::config::DEFAULT_INDEX_DIR)]
    index_dir: std::path::PathBuf,

    /// Embedding backend: gemini or openai.
    #[arg(long, env = "PDFCHAT_EMBEDDING_PROVIDER", default_value = "gemini")]
    embedding_provider: String,

    /// Embedding model ID.
    #[arg(long, env = "PDFCHAT_EMBEDDING_MODEL", default_value = "models/embedding-001")]
    embedding_model: String,

    /// Base URL for an OpenAI-compatible or proxied embedding endpoint.
    #[arg(long, env = "PDFCHAT_EMBEDDING_BASE_URL")]
    embedding_base_url: Option<String>,

    /// Chunks per embedding request.
    #[arg(long, env = "PDFCHAT_EMBEDDING_BATCH_SIZE", default_value_t = 100)]
    embedding_batch_size: usize,

    /// Chat provider: gemini, openai, anthropic, ollama.
    #[arg(
        long,
        env = "PDFCHAT_PROVIDER",
        long_help = "Chat provider. Auto-detected from API key env vars if not set."
    )]
    provider: Option<String>,

    /// Chat model ID.
    #[arg(long, env = "PDFCHAT_MODEL", default_value = "gemini-1.5-flash")]
    model: String,

    /// Maximum chunk length in characters.
    #[arg(long, env = "PDFCHAT_CHUNK_SIZE", default_value_t = 1000)]
    chunk_size: usize,

    /// Characters shared by consecutive chunks.
    #[arg(long, env = "PDFCHAT_CHUNK_OVERLAP", default_value_t = 200)]
    chunk_overlap: usize,

    /// Chunks retrieved per question.
    #[arg(long, env = "PDFCHAT_TOP_K", default_value_t = 4)]
    top_k: usize,

    /// Chat model temperature (0.0–2.0).
    #[arg(long, env = "PDFCHAT_TEMPERATURE", default_value_t = 0.7)]
    temperature: f32,

    /// Max answer tokens.
    #[arg(long, env = "PDFCHAT_MAX_TOKENS", default_value_t = 2048)]
    max_tokens: usize,

    /// Path to a text file with a custom prompt ({context} and {question} placeholders).
    #[arg(long, env = "PDFCHAT_PROMPT")]
    prompt: Option<std::path::PathBuf>,

    /// Always rebuild the index, even for unchanged documents.
    #[arg(long, env = "PDFCHAT_NO_CACHE")]
    no_cache: bool,

    /// Show retrieved passages under each answer.
    #[arg(long, env = "PDFCHAT_SHOW_SOURCES")]
    show_sources: bool,

    /// Disable progress bar.
    #[arg(long, env = "PDFCHAT_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDFCHAT_VERBOSE")]
    verbose: bool,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "PDFCHAT_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Embedding request timeout in seconds.
    #[arg(long, env = "PDFCHAT_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,
}

// ── Session commands ─────────────────────────────────────────────────────────

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Upload(Vec<String>),
    Remove(String),
    Files,
    Process,
    Status,
    Help,
    Quit,
    Ask(String),
    Empty,
    Unknown(String),
}

fn parse_command(line: &str) -> Command {
    let line = line.trim();
    if line.is_empty() {
        return Command::Empty;
    }
    if !line.starts_with('/') {
        return Command::Ask(line.to_string());
    }

    let (name, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    let rest = rest.trim();
    match name {
        "/upload" | "/u" => Command::Upload(split_args(rest)),
        "/remove" | "/rm" => Command::Remove(rest.to_string()),
        "/files" | "/ls" => Command::Files,
        "/process" | "/p" => Command::Process,
        "/status" => Command::Status,
        "/help" | "/?" => Command::Help,
        "/quit" | "/exit" | "/q" => Command::Quit,
        other => Command::Unknown(other.to_string()),
    }
}

/// Split on whitespace, keeping `"double"` or `'single'` quoted runs together
/// so paths with spaces survive.
fn split_args(rest: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut in_arg = false;

    for c in rest.chars() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => current.push(c),
            None if c == '"' || c == '\'' => {
                quote = Some(c);
                in_arg = true;
            }
            None if c.is_whitespace() => {
                if in_arg {
                    args.push(std::mem::take(&mut current));
                    in_arg = false;
                }
            }
            None => {
                current.push(c);
                in_arg = true;
            }
        }
    }
    if in_arg {
        args.push(current);
    }
    args
}

fn print_commands() {
    println!("{}", dim("  /upload <path|url>...  /remove <name>  /files  /process"));
    println!("{}", dim("  /status  /help  /quit   (anything else is a question)"));
}

fn print_idle_banner() {
    println!();
    println!("{}", bold("📚 Chat with your PDFs"));
    println!("  1. Upload your PDFs        {}", cyan("/upload report.pdf"));
    println!("  2. Process them            {}", cyan("/process"));
    println!("  3. Ask about their content {}", cyan("What was the revenue in 2023?"));
    print_commands();
    println!();
}

fn print_ready_banner() {
    println!();
    println!(
        "{} {}",
        green("✔"),
        bold("Documents processed. Ask anything about them.")
    );
    println!();
}

fn warn_line(msg: &str) {
    println!("{} {}", yellow("⚠"), yellow(msg));
}

fn report_error(err: &PdfChatError) {
    if err.is_not_ready() {
        warn_line(&err.to_string());
    } else {
        eprintln!("{} {}", red("✘"), red(&err.to_string()));
    }
}

// ── Main ─────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    // The Gemini provider reads GEMINI_API_KEY; accept the Google name too.
    if std::env::var("GEMINI_API_KEY").is_err() {
        if let Ok(key) = std::env::var("GOOGLE_API_KEY") {
            std::env::set_var("GEMINI_API_KEY", key);
        }
    }

    // ── Logging setup ────────────────────────────────────────────────────
    // Keep library INFO logs out of the way while the progress bar is active.
    let show_progress = !cli.no_progress;
    let filter = if cli.verbose {
        "debug"
    } else if show_progress {
        "warn"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let progress = show_progress.then(CliProgressCallback::new);
    let config = build_config(
        &cli,
        progress
            .clone()
            .map(|cb| cb as Arc<dyn ProcessingProgressCallback>),
    )
    .await?;
    let mut session = Session::new(config);

    print_idle_banner();
    for input in &cli.files {
        upload(&mut session, input).await;
    }
    if cli.process {
        process(&mut session, progress.as_deref()).await;
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print_prompt(session.state())?;
        let Some(line) = lines.next_line().await.context("Failed to read stdin")? else {
            break;
        };

        match parse_command(&line) {
            Command::Empty => {}
            Command::Upload(inputs) if inputs.is_empty() => {
                warn_line("Usage: /upload <path|url>...");
            }
            Command::Upload(inputs) => {
                for input in &inputs {
                    upload(&mut session, input).await;
                }
            }
            Command::Remove(name) => match session.remove(&name) {
                Some(doc) => println!("{} Removed {}", green("✓"), doc.name),
                None => warn_line(&format!("No uploaded document named '{name}'")),
            },
            Command::Files => print_files(&session),
            Command::Process => process(&mut session, progress.as_deref()).await,
            Command::Status => print_status(&session),
            Command::Help => print_commands(),
            Command::Quit => break,
            Command::Unknown(name) => {
                warn_line(&format!("Unknown command '{name}'. Type /help for the list."));
            }
            Command::Ask(question) => ask(&session, &question, cli.show_sources).await,
        }
    }

    Ok(())
}

fn print_prompt(state: SessionState) -> Result<()> {
    let marker = match state {
        SessionState::Idle => dim("pdfchat ›"),
        SessionState::Ready => cyan("pdfchat ›"),
    };
    print!("{marker} ");
    io::stdout().flush().context("Failed to flush stdout")
}

async fn upload(session: &mut Session, input: &str) {
    match session.upload_from(input).await {
        Ok(doc) => println!(
            "{} Uploaded {}  {}",
            green("✓"),
            bold(&doc.name),
            dim(&format!("{} KB", doc.bytes.len().div_ceil(1024)))
        ),
        Err(e) => report_error(&e),
    }
}

async fn process(session: &mut Session, progress: Option<&CliProgressCallback>) {
    let was_ready = session.is_processed();
    let result = session.process().await;
    if let Some(cb) = progress {
        cb.clear();
    }

    match result {
        Ok(ProcessOutcome::NoDocuments) => {
            warn_line("Upload at least one PDF before processing.");
        }
        Ok(ProcessOutcome::Processed(report)) => {
            if progress.is_none() {
                println!(
                    "{} {} pages, {} chunks{}",
                    green("✔"),
                    report.page_count,
                    report.chunk_count,
                    if report.cache_hit { " (cached)" } else { "" }
                );
            }
            println!(
                "   {}",
                dim(&format!(
                    "{} documents  ·  fingerprint {}  ·  {}ms",
                    report.documents.len(),
                    &report.fingerprint[..report.fingerprint.len().min(12)],
                    report.total_duration_ms
                ))
            );
            if !was_ready {
                print_ready_banner();
            }
        }
        Err(e) => report_error(&e),
    }
}

async fn ask(session: &Session, question: &str, show_sources: bool) {
    if session.state() == SessionState::Idle {
        // Same warning the session returns; skip the spinner.
        warn_line("Process your PDFs before asking questions.");
        return;
    }

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS),
    );
    spinner.set_message("Thinking…");
    spinner.enable_steady_tick(Duration::from_millis(80));
    let result = session.ask(question).await;
    spinner.finish_and_clear();

    match result {
        Ok(AskOutcome::Answered(answer)) => {
            println!();
            println!("{}", answer.text.trim_end());
            println!();
            println!(
                "   {}",
                dim(&format!(
                    "{} passages  ·  {} tokens in / {} out  ·  {}ms",
                    answer.sources.len(),
                    answer.input_tokens,
                    answer.output_tokens,
                    answer.duration_ms
                ))
            );
            if show_sources {
                for source in &answer.sources {
                    println!(
                        "   {} {}",
                        cyan(&format!("[{}]", source.rank + 1)),
                        dim(&format!("distance {:.4}", source.distance))
                    );
                    for line in source.text.lines().take(6) {
                        println!("       {}", dim(line));
                    }
                }
            }
            println!();
        }
        Ok(AskOutcome::NotProcessed) => warn_line("Process your PDFs before asking questions."),
        Ok(AskOutcome::IndexMissing { path }) => {
            report_error(&PdfChatError::IndexMissing { path });
        }
        Err(e) => report_error(&e),
    }
}

fn print_files(session: &Session) {
    if session.uploads().is_empty() {
        println!("{}", dim("  (no uploads)"));
        return;
    }
    for (i, doc) in session.uploads().iter().enumerate() {
        println!(
            "  {:>2}. {}  {}",
            i + 1,
            doc.name,
            dim(&format!("{} KB", doc.bytes.len().div_ceil(1024)))
        );
    }
}

fn print_status(session: &Session) {
    let config = session.config();
    let state = match session.state() {
        SessionState::Idle => yellow("idle (not processed)"),
        SessionState::Ready => green("ready"),
    };
    println!("  State:    {state}");
    println!("  Uploads:  {}", session.uploads().len());
    let index = if VectorIndex::exists(&config.index_dir) {
        green("present")
    } else {
        dim("absent")
    };
    println!("  Index:    {}  {}", config.index_dir.display(), index);
    println!(
        "  Models:   {} (embeddings), {} (answers)",
        config.embedding_model, config.chat_model
    );
}

/// Map CLI args to `PdfChatConfig`.
async fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<PdfChatConfig> {
    let embedding_provider = EmbeddingProviderKind::parse(&cli.embedding_provider)
        .context("Invalid --embedding-provider")?;

    let mut builder = PdfChatConfig::builder()
        .index_dir(&cli.index_dir)
        .chunk_size(cli.chunk_size)
        .chunk_overlap(cli.chunk_overlap)
        .top_k(cli.top_k)
        .embedding_provider(embedding_provider)
        .embedding_model(&cli.embedding_model)
        .embedding_batch_size(cli.embedding_batch_size)
        .chat_model(&cli.model)
        .temperature(cli.temperature)
        .max_tokens(cli.max_tokens)
        .api_timeout_secs(cli.api_timeout)
        .download_timeout_secs(cli.download_timeout)
        .reuse_cached_index(!cli.no_cache);

    if let Some(ref url) = cli.embedding_base_url {
        builder = builder.embedding_base_url(url);
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.chat_provider(provider);
    }
    if let Some(ref path) = cli.prompt {
        let template = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read prompt template from {:?}", path))?;
        builder = builder.prompt_template(template);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
