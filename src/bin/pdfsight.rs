//! CLI binary for pdfsight.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `AnalyzerConfig` and prints results.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use pdfsight::{
    AnalysisProgressCallback, AnalysisRequest, AnalyzerConfig, PdfAnalyzer, ProgressCallback,
};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
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

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a live bar for the scan stage, then a spinner
/// while the analysis model works. Handles pages completing out of order.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    /// Create a callback whose bar length is set by `on_scan_start` once the
    /// page count is known.
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);

        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Opening PDF…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self { bar })
    }

    fn spinner(&self, prefix: &'static str, msg: &'static str) {
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        self.bar.set_style(style);
        self.bar.set_prefix(prefix);
        self.bar.set_message(msg);
    }
}

impl AnalysisProgressCallback for CliProgressCallback {
    fn on_scan_start(&self, total_pages: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} pages  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        self.bar.set_length(total_pages as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Scanning");
        self.bar.reset_eta();
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Scanning {total_pages} pages…"))
        ));
    }

    fn on_page_complete(&self, page_num: usize, total: usize, text_len: usize) {
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}",
            green("✓"),
            page_num,
            total,
            dim(&format!("{text_len:>5} chars")),
        ));
        self.bar.inc(1);
    }

    fn on_analysis_start(&self) {
        self.spinner("Analyzing", "waiting for the language model…");
    }

    fn on_complete(&self, outcome: Result<usize, &str>) {
        self.bar.finish_and_clear();
        match outcome {
            Ok(analysis_len) => eprintln!(
                "{} analysis ready ({} chars)",
                green("✔"),
                bold(&analysis_len.to_string())
            ),
            Err(msg) => eprintln!("{} failed during {}", red("✘"), red(msg)),
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Analyse a document with the default models
  pdfsight analyze report.pdf

  # Pick the models for each stage
  pdfsight analyze --scan-model qwen2.5vl:latest --analysis-model gemma3:4b report.pdf

  # Ask a specific question instead of the default summary
  pdfsight analyze --prompt "List every invoice total in this document" invoices.pdf

  # Structured JSON output
  pdfsight analyze --json report.pdf > result.json

  # List models known to the local Ollama instance
  pdfsight models

ENVIRONMENT VARIABLES:
  PDFSIGHT_OLLAMA_URL   Base URL of the Ollama instance (default http://localhost:11434)
  RUST_LOG              Tracing filter, e.g. RUST_LOG=pdfsight=debug

SETUP:
  1. Start Ollama:       ollama serve
  2. Pull the models:    ollama pull qwen2.5vl && ollama pull gemma3:4b
  3. Analyse:            pdfsight analyze document.pdf
"#;

/// Analyse PDF documents with local vision and language models.
#[derive(Parser, Debug)]
#[command(
    name = "pdfsight",
    version,
    about = "Analyse PDF documents with local vision and language models",
    long_about = "Extract the text of a PDF page-by-page with a local vision model, then run a \
language model over the assembled document to answer a question or produce a summary. \
Both stages talk to a local Ollama instance; nothing leaves the machine.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Base URL of the Ollama instance.
    #[arg(
        long,
        global = true,
        env = "PDFSIGHT_OLLAMA_URL",
        default_value = "http://localhost:11434"
    )]
    url: String,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "PDFSIGHT_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors and results.
    #[arg(short, long, global = true, env = "PDFSIGHT_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the models known to the local model registry.
    Models {
        /// Output the model list as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Analyse a PDF file.
    Analyze {
        /// Local PDF file path.
        input: PathBuf,

        /// Vision model for the per-page scan stage.
        #[arg(long, env = "PDFSIGHT_SCAN_MODEL")]
        scan_model: Option<String>,

        /// Language model for the analysis stage.
        #[arg(long, env = "PDFSIGHT_ANALYSIS_MODEL")]
        analysis_model: Option<String>,

        /// Analysis instruction; defaults to a summary of the document.
        #[arg(long)]
        prompt: Option<String>,

        /// Write the analysis to this file instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output the structured result as JSON (includes the extracted text).
        #[arg(long)]
        json: bool,

        /// Number of concurrent vision-model calls during the scan stage.
        #[arg(short, long, env = "PDFSIGHT_CONCURRENCY", default_value_t = 2)]
        concurrency: usize,

        /// Retries per model call on transient failure.
        #[arg(long, env = "PDFSIGHT_MAX_RETRIES", default_value_t = 3)]
        max_retries: u32,

        /// Model temperature (0.0–2.0).
        #[arg(long, env = "PDFSIGHT_TEMPERATURE", default_value_t = 0.1)]
        temperature: f32,

        /// Max model output tokens per call.
        #[arg(long, env = "PDFSIGHT_MAX_TOKENS", default_value_t = 4096)]
        max_tokens: u32,

        /// Deadline for the whole scan stage in seconds.
        #[arg(long, env = "PDFSIGHT_SCAN_TIMEOUT", default_value_t = 600)]
        scan_timeout: u64,

        /// Deadline for the analysis stage in seconds.
        #[arg(long, env = "PDFSIGHT_ANALYSIS_TIMEOUT", default_value_t = 180)]
        analysis_timeout: u64,

        /// Disable the progress bar.
        #[arg(long, env = "PDFSIGHT_NO_PROGRESS")]
        no_progress: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Suppress INFO-level library logs when the progress bar is active; the
    // bar provides all the feedback that matters to the user.
    let show_progress = matches!(
        &cli.command,
        Command::Analyze {
            no_progress: false,
            json: false,
            ..
        }
    ) && !cli.quiet;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_writer(io::stderr)
        .init();

    match cli.command {
        Command::Models { json } => run_models(&cli.url, json).await,
        Command::Analyze {
            ref input,
            ref scan_model,
            ref analysis_model,
            ref prompt,
            ref output,
            json,
            concurrency,
            max_retries,
            temperature,
            max_tokens,
            scan_timeout,
            analysis_timeout,
            ..
        } => {
            let config = AnalyzerConfig::builder()
                .ollama_base_url(&cli.url)
                .scan_concurrency(concurrency)
                .max_retries(max_retries)
                .temperature(temperature)
                .max_tokens(max_tokens)
                .scan_timeout_secs(scan_timeout)
                .analysis_timeout_secs(analysis_timeout)
                .build()
                .context("Invalid configuration")?;

            run_analyze(RunArgs {
                config,
                input,
                scan_model: scan_model.clone(),
                analysis_model: analysis_model.clone(),
                prompt: prompt.clone(),
                output: output.as_deref(),
                json,
                show_progress,
                quiet: cli.quiet,
            })
            .await
        }
    }
}

async fn run_models(url: &str, json: bool) -> Result<()> {
    let config = AnalyzerConfig::builder()
        .ollama_base_url(url)
        .build()
        .context("Invalid configuration")?;
    let analyzer = PdfAnalyzer::new(config).context("Failed to initialise the model client")?;

    let models = analyzer
        .list_models()
        .await
        .context("Failed to query the model registry")?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&models).context("Failed to serialise model list")?
        );
    } else if models.is_empty() {
        eprintln!("No models installed — try `ollama pull qwen2.5vl`");
    } else {
        for m in &models {
            println!("{}", m.name);
        }
    }
    Ok(())
}

struct RunArgs<'a> {
    config: AnalyzerConfig,
    input: &'a PathBuf,
    scan_model: Option<String>,
    analysis_model: Option<String>,
    prompt: Option<String>,
    output: Option<&'a std::path::Path>,
    json: bool,
    show_progress: bool,
    quiet: bool,
}

async fn run_analyze(args: RunArgs<'_>) -> Result<()> {
    let file = tokio::fs::read(args.input)
        .await
        .with_context(|| format!("Failed to read {}", args.input.display()))?;
    let filename = args
        .input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload.pdf".to_string());

    let mut analyzer =
        PdfAnalyzer::new(args.config).context("Failed to initialise the model client")?;

    if args.show_progress {
        let cb = CliProgressCallback::new_dynamic();
        analyzer = analyzer.with_progress(cb as ProgressCallback);
    }

    let mut request = AnalysisRequest::new(filename, file);
    if let Some(m) = args.scan_model {
        request = request.scan_model(m);
    }
    if let Some(m) = args.analysis_model {
        request = request.analysis_model(m);
    }
    if let Some(p) = args.prompt {
        request = request.custom_prompt(p);
    }

    let result = analyzer.analyze(request).await.context("Analysis failed")?;

    let rendered = if args.json {
        serde_json::to_string_pretty(&result).context("Failed to serialise result")?
    } else {
        result.analysis.clone()
    };

    if let Some(path) = args.output {
        tokio::fs::write(path, &rendered)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        if !args.quiet {
            eprintln!(
                "{}  {} pages  →  {}",
                green("✔"),
                result.page_count,
                bold(&path.display().to_string()),
            );
        }
    } else {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        handle
            .write_all(rendered.as_bytes())
            .context("Failed to write to stdout")?;
        if !rendered.ends_with('\n') {
            handle.write_all(b"\n").ok();
        }
        if !args.quiet && !args.show_progress && !args.json {
            eprintln!(
                "Analysed {} pages with {} / {}",
                result.page_count,
                dim(&result.scan_model_used),
                dim(&result.analysis_model_used),
            );
        }
    }

    Ok(())
}
