//! Error types for the docforge library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`Error`]: everything the client can report, from local validation
//!   (missing files, empty workflows, out-of-range pages) to transport
//!   failures surfaced by the service. Each variant belongs to exactly one
//!   [`ErrorKind`] category, so callers can branch on `error.kind()` without
//!   matching every variant.
//!
//! * [`PdfScanError`]: the structural failures of the minimal PDF object
//!   scan in [`crate::pdf`]. Wrapped into [`Error::PdfScan`] together with
//!   the originating filename so a failure on one of many inputs is
//!   diagnosable.
//!
//! Inside `execute()`/`dry_run()`, operational failures (auth, API, network)
//! are captured into the result's `errors` array rather than returned as
//! `Err`; builder-usage violations are returned as `Err` synchronously since
//! they are programming errors, not operational ones.

use std::path::PathBuf;
use thiserror::Error;

/// Coarse category of an [`Error`], mirroring how the service distinguishes
/// failures on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed input, builder misuse, or a structural PDF scan failure.
    /// Raised locally, before any network attempt where possible.
    Validation,
    /// The service rejected the credentials (HTTP 401/403).
    Authentication,
    /// The service accepted the request but refused the job (other 4xx/5xx).
    Api,
    /// The request never completed: connection failure or timeout.
    Network,
}

/// All errors returned by the docforge library.
#[derive(Debug, Error)]
pub enum Error {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("File not found: '{path}'")]
    FileNotFound { path: PathBuf },

    /// Reading an input file failed after the existence check passed.
    #[error("Failed to read '{path}': {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The input is not a usable file shape (unparseable URL, directory
    /// path, unsupported scheme, ...). The shape goes into `detail`.
    #[error("Invalid file input provided")]
    InvalidFileInput { detail: String },

    /// A remote input URL could not be fetched.
    #[error("Failed to fetch '{url}': {reason}")]
    RemoteFetch { url: String, reason: String },

    // ── Builder-usage errors ──────────────────────────────────────────────
    /// `compile()` was called on a workflow with no parts.
    #[error("At least one part must be added to build a document")]
    EmptyWorkflow,

    /// A requested page index exceeds the document's page count.
    #[error("Page index {index} is out of range (document has {count} pages)")]
    PageIndexOutOfRange { index: u32, count: u32 },

    /// A page range runs backwards.
    #[error("Invalid page range: start {start} is greater than end {end}")]
    InvalidPageRange { start: u32, end: u32 },

    /// A page-level operation was given an unusable selection
    /// (no indexes, zero blank pages, deleting every page, ...).
    #[error("Invalid page selection: {detail}")]
    InvalidSelection { detail: String },

    // ── PDF scan errors ───────────────────────────────────────────────────
    /// The minimal object scan could not determine a page count.
    #[error("Failed to count pages in '{filename}': {source}")]
    PdfScan {
        filename: String,
        #[source]
        source: PdfScanError,
    },

    // ── Transport errors ──────────────────────────────────────────────────
    /// The service rejected the credentials.
    #[error("Authentication failed (HTTP {status}): {message}")]
    Authentication { status: u16, message: String },

    /// The service refused the build.
    #[error("Document build failed (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    /// The request never reached the service or the connection broke.
    #[error("Network error: {reason}")]
    Network { reason: String },

    /// The transport round-trip exceeded the time budget.
    #[error("Request timed out after {secs}s")]
    Timeout { secs: u64 },

    /// A 2xx response carried a body the client could not decode.
    #[error("Failed to decode service response: {detail}")]
    ResponseDecode { detail: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// The coarse category this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::FileNotFound { .. }
            | Error::FileRead { .. }
            | Error::InvalidFileInput { .. }
            | Error::RemoteFetch { .. }
            | Error::EmptyWorkflow
            | Error::PageIndexOutOfRange { .. }
            | Error::InvalidPageRange { .. }
            | Error::InvalidSelection { .. }
            | Error::PdfScan { .. }
            | Error::InvalidConfig(_)
            | Error::Internal(_) => ErrorKind::Validation,
            Error::Authentication { .. } => ErrorKind::Authentication,
            Error::Api { .. } | Error::ResponseDecode { .. } => ErrorKind::Api,
            Error::Network { .. } | Error::Timeout { .. } => ErrorKind::Network,
        }
    }
}

/// Structural failures of the minimal PDF object scan.
///
/// The scan is deliberately not a full parser: encrypted documents,
/// compressed cross-reference streams, and object streams all surface as one
/// of these variants rather than being parsed around.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PdfScanError {
    /// No `<n> <g> obj` header was found anywhere in the input.
    #[error("Could not find any objects in PDF")]
    NoObjects,

    /// No recorded object contains both `/Type` and `/Catalog`.
    #[error("Could not find /Catalog object in PDF")]
    MissingCatalog,

    /// The catalog carries no `/Pages <n> <g> R` reference.
    #[error("Could not find /Pages reference in /Catalog")]
    MissingPagesRef,

    /// The `/Pages` reference names an object that was never recorded.
    #[error("Could not find root /Pages object")]
    MissingPagesObject,

    /// The root pages object carries no `/Count <integer>`.
    #[error("Could not find /Count in root /Pages object")]
    MissingCount,
}
