//! CLI binary for docforge.
//!
//! A thin shim over the library crate that maps subcommands to client
//! calls and prints results.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use docforge::workflow::{stage, WorkflowBuilder};
use docforge::{
    BinaryOutput, Client, ClientConfig, DryRunOptions, ExecuteOptions, FileInput, ImageFormat,
    OfficeFormat, PageRange,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use url::Url;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Count pages locally (no API key needed)
  docforge pages report.pdf

  # Merge documents into one PDF
  docforge merge cover.pdf body.docx appendix.pdf -o combined.pdf

  # Split by 0-based inclusive page ranges
  docforge split report.pdf --ranges 0-2,3-5 -o part

  # Convert between formats
  docforge convert report.docx --to pdf -o report.pdf
  docforge convert scan.pdf --to markdown -o scan.md

  # Remote inputs work everywhere
  docforge merge https://example.com/cover.pdf body.pdf -o book.pdf

  # Predict cost without building
  docforge convert thesis.pdf --to pdfa --dry-run

OUTPUT FORMATS (--to):
  pdf, pdfa, pdfua, png, jpeg, webp, docx, xlsx, pptx, html, markdown, json

ENVIRONMENT VARIABLES:
  DOCFORGE_API_KEY   API key (required for everything except `pages`)
  DOCFORGE_BASE_URL  Override the service base URL
"#;

/// Assemble, transform, and convert documents via the build service.
#[derive(Parser, Debug)]
#[command(
    name = "docforge",
    version,
    about = "Assemble, transform, and convert documents via the build service",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// API key for the service.
    #[arg(long, global = true, env = "DOCFORGE_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Override the service base URL.
    #[arg(long, global = true, env = "DOCFORGE_BASE_URL")]
    base_url: Option<Url>,

    /// Request timeout in seconds.
    #[arg(long, global = true, default_value_t = 60)]
    timeout: u64,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Disable the progress bar.
    #[arg(long, global = true)]
    no_progress: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Count a PDF's pages locally, without contacting the service.
    Pages {
        /// Local PDF file path or HTTP(S) URL.
        input: String,
    },
    /// Merge documents into a single PDF, in argument order.
    Merge {
        /// Two or more input files or URLs.
        #[arg(required = true, num_args = 2..)]
        inputs: Vec<String>,

        /// Write the merged PDF here.
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Split a PDF into one output per page range.
    Split {
        /// Local PDF file path or HTTP(S) URL.
        input: String,

        /// Comma-separated 0-based inclusive ranges, e.g. 0-2,3-5.
        #[arg(long)]
        ranges: String,

        /// Output filename prefix; each range writes <prefix>_<n>.pdf.
        #[arg(short, long, default_value = "split")]
        output: PathBuf,
    },
    /// Convert a document to another format.
    Convert {
        /// Local file path or HTTP(S) URL.
        input: String,

        /// Target format (see OUTPUT FORMATS below).
        #[arg(long)]
        to: String,

        /// Write here; binary formats default to the service filename,
        /// text formats to stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Analyze cost and required features without producing a document.
        #[arg(long)]
        dry_run: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = if cli.quiet {
        "error"
    } else if cli.verbose {
        "debug"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    match &cli.command {
        Command::Pages { input } => run_pages(&cli, input).await,
        Command::Merge { inputs, output } => run_merge(&cli, inputs, output).await,
        Command::Split {
            input,
            ranges,
            output,
        } => run_split(&cli, input, ranges, output).await,
        Command::Convert {
            input,
            to,
            output,
            dry_run,
        } => run_convert(&cli, input, to, output.as_deref(), *dry_run).await,
    }
}

// ── Subcommands ──────────────────────────────────────────────────────────────

async fn run_pages(cli: &Cli, input: &str) -> Result<()> {
    let normalized =
        docforge::workflow::normalize(FileInput::from(input), Duration::from_secs(cli.timeout))
            .await
            .context("Failed to read input")?;
    let count = docforge::pdf::count_pages_file(&normalized)
        .await
        .context("Failed to count pages")?;

    if cli.quiet {
        println!("{count}");
    } else {
        println!("File:   {input}");
        println!("Pages:  {count}");
    }
    Ok(())
}

async fn run_merge(cli: &Cli, inputs: &[String], output: &Path) -> Result<()> {
    let client = build_client(cli)?;
    let files = inputs
        .iter()
        .map(|input| FileInput::from(input.as_str()))
        .collect();

    let (options, bar) = progress_options(cli);
    let result = client.merge(files, options).await?;
    if let Some(bar) = bar {
        bar.finish_and_clear();
    }

    let binary = result.into_output().context("Merge failed")?;
    tokio::fs::write(output, &binary.buffer)
        .await
        .with_context(|| format!("Failed to write {}", output.display()))?;
    if !cli.quiet {
        eprintln!(
            "{} {} → {}",
            green("✔"),
            human_bytes(binary.buffer.len()),
            bold(&output.display().to_string()),
        );
    }
    Ok(())
}

async fn run_split(cli: &Cli, input: &str, ranges: &str, output: &Path) -> Result<()> {
    let ranges = parse_ranges(ranges)?;
    let client = build_client(cli)?;

    // No bar here: the concurrent per-range workflows would interleave on
    // one counter.
    let results = client
        .split(FileInput::from(input), &ranges, ExecuteOptions::default())
        .await?;

    let mut failures = 0;
    for (index, result) in results.into_iter().enumerate() {
        match result.into_output() {
            Ok(binary) => {
                let path = split_output_path(output, index);
                tokio::fs::write(&path, &binary.buffer)
                    .await
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                if !cli.quiet {
                    eprintln!(
                        "  {} range {index} → {}",
                        green("✓"),
                        path.display()
                    );
                }
            }
            Err(e) => {
                failures += 1;
                eprintln!("  {} range {index} failed: {e}", red("✗"));
            }
        }
    }
    if failures > 0 {
        bail!("{failures} range(s) failed");
    }
    Ok(())
}

async fn run_convert(
    cli: &Cli,
    input: &str,
    to: &str,
    output: Option<&Path>,
    dry_run: bool,
) -> Result<()> {
    let client = build_client(cli)?;
    let to = to.trim().to_lowercase();
    let builder = client.workflow().add_file_part(FileInput::from(input));

    if dry_run {
        let options = DryRunOptions::default();
        let result = if let Some(target) = binary_target(&to) {
            select_binary(builder, target).dry_run(options).await?
        } else {
            match to.as_str() {
                "html" => builder.output_html().dry_run(options).await?,
                "markdown" | "md" => builder.output_markdown().dry_run(options).await?,
                "json" => builder.output_json_content().dry_run(options).await?,
                other => bail!("Unknown output format '{other}'"),
            }
        };
        if !result.success {
            let detail = result
                .errors
                .first()
                .map(|e| e.error.to_string())
                .unwrap_or_else(|| "unknown error".into());
            bail!("Analysis failed: {detail}");
        }
        if let Some(analysis) = result.analysis {
            println!("Cost:               {}", analysis.cost);
            if !analysis.required_features.is_empty() {
                println!(
                    "Required features:  {}",
                    analysis.required_features.join(", ")
                );
            }
        }
        return Ok(());
    }

    let (options, bar) = progress_options(cli);
    let rendered = if let Some(target) = binary_target(&to) {
        let result = select_binary(builder, target).execute(options).await?;
        Rendered::Binary(result.into_output().context("Build failed")?)
    } else {
        match to.as_str() {
            "html" => {
                let result = builder.output_html().execute(options).await?;
                Rendered::Text(result.into_output().context("Build failed")?.content)
            }
            "markdown" | "md" => {
                let result = builder.output_markdown().execute(options).await?;
                Rendered::Text(result.into_output().context("Build failed")?.content)
            }
            "json" => {
                let result = builder.output_json_content().execute(options).await?;
                let data = result.into_output().context("Build failed")?.data;
                let pretty = serde_json::to_string_pretty(&data)
                    .context("Failed to serialize JSON content")?;
                Rendered::Text(pretty)
            }
            other => bail!(
                "Unknown output format '{other}' (expected pdf, pdfa, pdfua, png, jpeg, \
                 webp, docx, xlsx, pptx, html, markdown, json)"
            ),
        }
    };
    if let Some(bar) = bar {
        bar.finish_and_clear();
    }

    match rendered {
        Rendered::Binary(binary) => {
            let path = output
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from(&binary.filename));
            tokio::fs::write(&path, &binary.buffer)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
            if !cli.quiet {
                eprintln!(
                    "{} {} ({}) → {}",
                    green("✔"),
                    human_bytes(binary.buffer.len()),
                    binary.mime_type,
                    bold(&path.display().to_string()),
                );
            }
        }
        Rendered::Text(content) => write_text(output, &content, cli.quiet).await?,
    }
    Ok(())
}

enum Rendered {
    Binary(BinaryOutput),
    Text(String),
}

// ── Helpers ──────────────────────────────────────────────────────────────────

enum BinaryTarget {
    Pdf,
    Pdfa,
    Pdfua,
    Image(ImageFormat),
    Office(OfficeFormat),
}

fn binary_target(format: &str) -> Option<BinaryTarget> {
    match format {
        "pdf" => Some(BinaryTarget::Pdf),
        "pdfa" => Some(BinaryTarget::Pdfa),
        "pdfua" => Some(BinaryTarget::Pdfua),
        "png" => Some(BinaryTarget::Image(ImageFormat::Png)),
        "jpg" | "jpeg" => Some(BinaryTarget::Image(ImageFormat::Jpeg)),
        "webp" => Some(BinaryTarget::Image(ImageFormat::Webp)),
        "docx" => Some(BinaryTarget::Office(OfficeFormat::Docx)),
        "xlsx" => Some(BinaryTarget::Office(OfficeFormat::Xlsx)),
        "pptx" => Some(BinaryTarget::Office(OfficeFormat::Pptx)),
        _ => None,
    }
}

fn select_binary(
    builder: WorkflowBuilder<stage::HasParts>,
    target: BinaryTarget,
) -> WorkflowBuilder<stage::Ready<BinaryOutput>> {
    match target {
        BinaryTarget::Pdf => builder.output_pdf(),
        BinaryTarget::Pdfa => builder.output_pdfa(),
        BinaryTarget::Pdfua => builder.output_pdfua(),
        BinaryTarget::Image(format) => builder.output_image(format),
        BinaryTarget::Office(format) => builder.output_office(format),
    }
}

fn build_client(cli: &Cli) -> Result<Client> {
    let Some(key) = cli.api_key.clone() else {
        bail!("An API key is required: pass --api-key or set DOCFORGE_API_KEY");
    };
    let mut builder = ClientConfig::builder(key).timeout(Duration::from_secs(cli.timeout));
    if let Some(url) = cli.base_url.clone() {
        builder = builder.base_url(url);
    }
    let config = builder.build().context("Invalid configuration")?;
    Client::new(config).context("Failed to create client")
}

/// Execute options with an indicatif bar wired to the progress callback.
fn progress_options(cli: &Cli) -> (ExecuteOptions, Option<ProgressBar>) {
    if cli.quiet || cli.no_progress {
        return (ExecuteOptions::default(), None);
    }

    let bar = ProgressBar::new(0);
    bar.set_style(
        ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {pos}/{len} steps",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  "),
    );
    bar.set_prefix("Building");
    bar.enable_steady_tick(Duration::from_millis(80));

    let hook = bar.clone();
    let options = ExecuteOptions::default().on_progress(move |current, total| {
        if hook.length().unwrap_or(0) != u64::from(total) {
            hook.set_length(u64::from(total));
        }
        hook.set_position(u64::from(current));
    });
    (options, Some(bar))
}

/// Parse `--ranges` into page ranges: `0-2,5,7-9`.
fn parse_ranges(s: &str) -> Result<Vec<PageRange>> {
    let mut ranges = Vec::new();
    for piece in s.split(',') {
        let piece = piece.trim();
        if piece.is_empty() {
            continue;
        }
        let range = if let Some((start, end)) = piece.split_once('-') {
            let start: u32 = start
                .trim()
                .parse()
                .with_context(|| format!("Invalid start page in '{piece}'"))?;
            let end: u32 = end
                .trim()
                .parse()
                .with_context(|| format!("Invalid end page in '{piece}'"))?;
            if start > end {
                bail!("Invalid range '{piece}': start must be <= end");
            }
            PageRange::new(start, end)
        } else {
            let page: u32 = piece
                .parse()
                .with_context(|| format!("Invalid page number '{piece}'"))?;
            PageRange::single(page)
        };
        ranges.push(range);
    }
    if ranges.is_empty() {
        bail!("No page ranges given");
    }
    Ok(ranges)
}

fn split_output_path(prefix: &Path, index: usize) -> PathBuf {
    let stem = prefix
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("split");
    prefix.with_file_name(format!("{stem}_{index}.pdf"))
}

async fn write_text(output: Option<&Path>, content: &str, quiet: bool) -> Result<()> {
    match output {
        Some(path) => {
            tokio::fs::write(path, content)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
            if !quiet {
                eprintln!(
                    "{} {} → {}",
                    green("✔"),
                    human_bytes(content.len()),
                    bold(&path.display().to_string()),
                );
            }
        }
        None => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            handle
                .write_all(content.as_bytes())
                .context("Failed to write to stdout")?;
            // Ensure a trailing newline on stdout.
            if !content.ends_with('\n') {
                handle.write_all(b"\n").ok();
            }
        }
    }
    Ok(())
}

fn human_bytes(len: usize) -> String {
    if len >= 1_048_576 {
        format!("{:.1} MiB", len as f64 / 1_048_576.0)
    } else if len >= 1024 {
        format!("{:.1} KiB", len as f64 / 1024.0)
    } else {
        format!("{len} B")
    }
}
