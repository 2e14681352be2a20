//! # docforge
//!
//! Compile fluent document-assembly workflows into single requests for a
//! remote document build service, and interpret the responses into typed
//! results.
//!
//! ## Why this crate?
//!
//! The service consumes one multipart request: a JSON instruction tree that
//! references binary payloads by generated keys, plus those payloads as form
//! fields. Writing that request by hand means allocating reference keys,
//! normalizing heterogeneous inputs (paths, buffers, URLs), and re-parsing
//! structured error bodies. This crate does all of it behind a staged
//! builder, and adds a dependency-free PDF page counter so page-oriented
//! operations can validate indices before spending a round trip.
//!
//! ## Pipeline Overview
//!
//! ```text
//! parts / actions / output
//!  │
//!  ├─ 1. Normalize  paths existence-checked, URLs fetched, buffers named
//!  ├─ 2. Compile    reference keys allocated, instruction tree built
//!  ├─ 3. Dispatch   one multipart POST (payloads + instructions field)
//!  └─ 4. Interpret  typed output, or step-attributed errors
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use docforge::{BuildAction, Client, ExecuteOptions};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Client::with_key(std::env::var("DOCFORGE_API_KEY")?)?;
//!     let result = client
//!         .workflow()
//!         .add_file_part("cover.pdf")
//!         .add_file_part("report.docx")
//!         .apply_action(BuildAction::ocr("english"))
//!         .output_pdf()
//!         .execute(ExecuteOptions::default())
//!         .await?;
//!     if let Some(output) = result.output {
//!         std::fs::write(&output.filename, &output.buffer)?;
//!     }
//!     Ok(())
//! }
//! ```
//!
//! The builder is staged: output selection is unreachable until a part has
//! been added, and `execute`/`dry_run` are unreachable until an output is
//! selected. Illegal call orders do not compile.
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `docforge` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only deps:
//! ```toml
//! docforge = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod client;
pub mod config;
pub mod error;
pub mod ops;
pub mod pdf;
pub mod result;
pub mod transport;
pub mod workflow;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use client::Client;
pub use config::{ApiKey, ApiKeyResolver, ClientConfig, ClientConfigBuilder};
pub use error::{Error, ErrorKind, PdfScanError};
pub use ops::PagePosition;
pub use result::{
    BinaryOutput, BuildAnalysis, DryRunOptions, DryRunResult, ExecuteOptions, JsonOutput,
    OutputPayload, ProgressFn, StepError, TextOutput, WorkflowResult,
};
pub use workflow::{
    BuildAction, FileInput, ImageFormat, JsonObject, OfficeFormat, PageRange, RedactionStrategy,
    WorkflowBuilder,
};
