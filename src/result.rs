//! Result types and response interpretation.
//!
//! Execution never surfaces operational failures as `Err`: whatever the
//! service or network does, the caller gets a [`WorkflowResult`] whose
//! `success` flag and step-attributed errors tell the story. `Err` from
//! `execute`/`dry_run` is reserved for builder misuse caught before any
//! network traffic.
//!
//! Interpretation of a completed HTTP exchange also lives here, in one
//! place, so the production transport and test stubs exercise identical
//! logic: 2xx becomes a typed output, 401/403 an authentication error,
//! anything else an API error with the service's own message and failing
//! step attribution when the body carries one.

use crate::error::Error;
use crate::transport::ApiResponse;
use crate::workflow::instructions::OutputNode;
use bytes::Bytes;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Most body text ever copied into an error message.
const MAX_ERROR_BODY: usize = 1024;

static RE_PART_INDEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"parts\[(\d+)\]").unwrap());

// ── Typed outputs ───────────────────────────────────────────────────────────

/// Document bytes plus what the service said about them.
#[derive(Debug, Clone)]
pub struct BinaryOutput {
    pub buffer: Bytes,
    pub mime_type: String,
    pub filename: String,
}

/// Structured content extraction (`json-content` output).
#[derive(Debug, Clone)]
pub struct JsonOutput {
    pub data: serde_json::Value,
}

/// Text rendition (`html` / `markdown` outputs).
#[derive(Debug, Clone)]
pub struct TextOutput {
    pub content: String,
}

/// A response payload matching one family of output formats.
///
/// Implemented by [`BinaryOutput`], [`JsonOutput`], and [`TextOutput`];
/// the output-selection methods on the builder pin which one `execute`
/// produces.
pub trait OutputPayload: Sized + private::Sealed {
    fn from_response(response: ApiResponse, requested: &OutputNode) -> Result<Self, Error>;
}

mod private {
    pub trait Sealed {}
    impl Sealed for super::BinaryOutput {}
    impl Sealed for super::JsonOutput {}
    impl Sealed for super::TextOutput {}
}

impl OutputPayload for BinaryOutput {
    fn from_response(response: ApiResponse, requested: &OutputNode) -> Result<Self, Error> {
        let mime_type = response
            .header("content-type")
            .map(strip_mime_params)
            .unwrap_or_else(|| requested.default_mime().to_string());
        let filename = response
            .header("content-disposition")
            .and_then(filename_from_disposition)
            .unwrap_or_else(|| requested.default_filename());
        Ok(BinaryOutput {
            buffer: response.body,
            mime_type,
            filename,
        })
    }
}

impl OutputPayload for JsonOutput {
    fn from_response(response: ApiResponse, _requested: &OutputNode) -> Result<Self, Error> {
        let data = serde_json::from_slice(&response.body).map_err(|e| Error::ResponseDecode {
            detail: format!("invalid JSON content payload: {e}"),
        })?;
        Ok(JsonOutput { data })
    }
}

impl OutputPayload for TextOutput {
    fn from_response(response: ApiResponse, _requested: &OutputNode) -> Result<Self, Error> {
        let content = std::str::from_utf8(&response.body)
            .map_err(|e| Error::ResponseDecode {
                detail: format!("text payload is not valid UTF-8: {e}"),
            })?
            .to_string();
        Ok(TextOutput { content })
    }
}

/// Drop any `; charset=...` style parameters from a content type.
fn strip_mime_params(value: &str) -> String {
    value.split(';').next().unwrap_or(value).trim().to_string()
}

/// Pull the `filename` token out of a `Content-Disposition` value.
fn filename_from_disposition(value: &str) -> Option<String> {
    value.split(';').find_map(|segment| {
        let (name, raw) = segment.trim().split_once('=')?;
        if !name.trim().eq_ignore_ascii_case("filename") {
            return None;
        }
        let cleaned = raw.trim().trim_matches('"');
        if cleaned.is_empty() {
            None
        } else {
            Some(cleaned.to_string())
        }
    })
}

// ── Workflow result ─────────────────────────────────────────────────────────

/// An error attributed to one step of the submitted build.
///
/// Steps index the instruction tree's parts (0-based); failures the service
/// does not attribute to a part carry step 0.
#[derive(Debug)]
pub struct StepError {
    pub step: u32,
    pub error: Error,
}

/// Outcome of one executed workflow.
#[derive(Debug)]
pub struct WorkflowResult<O> {
    pub success: bool,
    pub output: Option<O>,
    pub errors: Vec<StepError>,
}

impl<O> WorkflowResult<O> {
    pub(crate) fn succeeded(output: O) -> Self {
        WorkflowResult {
            success: true,
            output: Some(output),
            errors: Vec::new(),
        }
    }

    pub(crate) fn failed(step: u32, error: Error) -> Self {
        WorkflowResult {
            success: false,
            output: None,
            errors: vec![StepError { step, error }],
        }
    }

    /// Collapse into a plain `Result`, surfacing the first recorded error.
    pub fn into_output(self) -> Result<O, Error> {
        if let Some(output) = self.output {
            return Ok(output);
        }
        let mut errors = self.errors;
        if errors.is_empty() {
            Err(Error::Internal(
                "workflow result carried neither output nor errors".into(),
            ))
        } else {
            Err(errors.remove(0).error)
        }
    }
}

// ── Dry run ─────────────────────────────────────────────────────────────────

/// What the analysis endpoint predicts about a build.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BuildAnalysis {
    /// Credit cost the build would incur.
    #[serde(default)]
    pub cost: f64,
    /// Service features the build would exercise.
    #[serde(default, alias = "requiredFeatures")]
    pub required_features: Vec<String>,
}

/// Outcome of a dry run. No document is produced.
#[derive(Debug)]
pub struct DryRunResult {
    pub success: bool,
    pub analysis: Option<BuildAnalysis>,
    pub errors: Vec<StepError>,
}

impl DryRunResult {
    pub(crate) fn succeeded(analysis: BuildAnalysis) -> Self {
        DryRunResult {
            success: true,
            analysis: Some(analysis),
            errors: Vec::new(),
        }
    }

    pub(crate) fn failed(step: u32, error: Error) -> Self {
        DryRunResult {
            success: false,
            analysis: None,
            errors: vec![StepError { step, error }],
        }
    }
}

// ── Execution options ───────────────────────────────────────────────────────

/// Progress callback: `(current, total)`, 1-based, monotonically
/// non-decreasing within one execution.
pub type ProgressFn = Arc<dyn Fn(u32, u32) + Send + Sync>;

/// Options for [`execute`](crate::workflow::WorkflowBuilder::execute).
#[derive(Clone, Default)]
pub struct ExecuteOptions {
    /// Overrides the configured transport timeout for this call.
    pub timeout: Option<Duration>,
    /// Invoked as the execution advances through its steps.
    pub on_progress: Option<ProgressFn>,
}

impl ExecuteOptions {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn on_progress(mut self, callback: impl Fn(u32, u32) + Send + Sync + 'static) -> Self {
        self.on_progress = Some(Arc::new(callback));
        self
    }
}

// The callback is not `Debug`; report only whether one is attached.
impl fmt::Debug for ExecuteOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecuteOptions")
            .field("timeout", &self.timeout)
            .field("on_progress", &self.on_progress.is_some())
            .finish()
    }
}

/// Options for [`dry_run`](crate::workflow::WorkflowBuilder::dry_run).
#[derive(Debug, Clone, Default)]
pub struct DryRunOptions {
    /// Overrides the configured transport timeout for this call.
    pub timeout: Option<Duration>,
}

impl DryRunOptions {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

// ── Failure interpretation ──────────────────────────────────────────────────

/// Error body the service answers failed builds with.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiErrorBody {
    #[serde(default)]
    details: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    failing_paths: Vec<FailingPath>,
}

#[derive(Debug, Deserialize)]
struct FailingPath {
    #[serde(default)]
    path: Option<String>,
    #[serde(default)]
    details: Option<String>,
}

/// A non-success response mapped to an error and the step it blames.
#[derive(Debug)]
pub(crate) struct InterpretedFailure {
    pub step: u32,
    pub error: Error,
}

/// Classify a completed, non-success HTTP exchange.
pub(crate) fn interpret_failure(response: &ApiResponse) -> InterpretedFailure {
    let status = response.status;
    let parsed: Option<ApiErrorBody> = serde_json::from_slice(&response.body).ok();

    let mut step = 0;
    let mut message = None;
    if let Some(body) = &parsed {
        message = body.details.clone().or_else(|| body.message.clone());
        if let Some(failing) = body.failing_paths.first() {
            if let Some(path) = &failing.path {
                if let Some(caps) = RE_PART_INDEX.captures(path) {
                    step = caps[1].parse().unwrap_or(0);
                }
            }
            if message.is_none() {
                message = failing.details.clone();
            }
        }
    }
    let message = message.unwrap_or_else(|| fallback_message(status, &response.body));

    let error = if status == 401 || status == 403 {
        Error::Authentication { status, message }
    } else {
        Error::Api { status, message }
    };
    InterpretedFailure { step, error }
}

/// Readable message for bodies that are not the structured error shape.
fn fallback_message(status: u16, body: &[u8]) -> String {
    let text: String = String::from_utf8_lossy(body)
        .chars()
        .take(MAX_ERROR_BODY)
        .collect();
    let text = text.trim();
    if text.is_empty() {
        format!("HTTP {status}")
    } else {
        format!("HTTP {status}: {text}")
    }
}
