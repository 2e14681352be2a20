//! Staged workflow builder.
//!
//! The builder walks a fixed sequence of interface states so that illegal
//! call orders fail at compile time rather than at the service:
//!
//! 1. [`stage::Empty`]: only part-adding methods exist.
//! 2. [`stage::HasParts`]: more parts, document-level actions, and every
//!    `output_*` method.
//! 3. [`stage::Ready<O>`]: output may still be swapped, and `execute` /
//!    `dry_run` become available. `O` is already pinned to the payload type
//!    the chosen output produces.
//! 4. Terminal: `execute` and `dry_run` take `self` by value; move
//!    semantics retire the builder.
//!
//! Each transition returns `WorkflowBuilder<NextStage>` carrying the same
//! accumulated compiler state; the stage parameter is phantom and costs
//! nothing at runtime.

use crate::client::Client;
use crate::error::Error;
use crate::result::{
    interpret_failure, BinaryOutput, BuildAnalysis, DryRunOptions, DryRunResult, ExecuteOptions,
    JsonOutput, OutputPayload, ProgressFn, TextOutput, WorkflowResult,
};
use crate::transport::ApiRequest;
use crate::workflow::compiler::{FileRegistry, InstructionCompiler};
use crate::workflow::input::{normalize, FileInput, FilePayload};
use crate::workflow::instructions::{
    BuildAction, ImageFormat, JsonObject, OfficeFormat, OutputNode, PageRange,
};
use std::marker::PhantomData;
use tracing::{debug, info, warn};

/// Marker types naming the builder's interface states.
pub mod stage {
    use std::marker::PhantomData;

    /// No parts added yet.
    #[derive(Debug)]
    pub enum Empty {}

    /// At least one part accumulated.
    #[derive(Debug)]
    pub enum HasParts {}

    /// Output selected; `O` is the payload type it will produce.
    #[derive(Debug)]
    pub struct Ready<O> {
        _output: PhantomData<O>,
    }
}

mod sealed {
    pub trait Sealed {}
    impl Sealed for super::stage::Empty {}
    impl Sealed for super::stage::HasParts {}
    impl<O> Sealed for super::stage::Ready<O> {}
}

/// Stages that still accept parts.
pub trait BuildStage: sealed::Sealed {}
impl BuildStage for stage::Empty {}
impl BuildStage for stage::HasParts {}

/// Stages that accept an output selection.
pub trait OutputStage: sealed::Sealed {}
impl OutputStage for stage::HasParts {}
impl<O> OutputStage for stage::Ready<O> {}

/// Fluent front end over the instruction compiler.
///
/// Obtained from [`Client::workflow`]; see the crate docs for a full
/// chained example.
#[derive(Debug)]
pub struct WorkflowBuilder<S> {
    client: Client,
    compiler: InstructionCompiler,
    _stage: PhantomData<S>,
}

impl WorkflowBuilder<stage::Empty> {
    pub(crate) fn new(client: Client) -> Self {
        WorkflowBuilder {
            client,
            compiler: InstructionCompiler::new(),
            _stage: PhantomData,
        }
    }
}

impl<S> WorkflowBuilder<S> {
    fn transition<T>(self) -> WorkflowBuilder<T> {
        WorkflowBuilder {
            client: self.client,
            compiler: self.compiler,
            _stage: PhantomData,
        }
    }
}

// ── Part-adding stage ───────────────────────────────────────────────────────

impl<S: BuildStage> WorkflowBuilder<S> {
    /// Append a file part: a document in any service-supported format.
    pub fn add_file_part(self, file: impl Into<FileInput>) -> WorkflowBuilder<stage::HasParts> {
        self.add_file_part_with(file, None, Vec::new())
    }

    /// Append a file part restricted to a page range, with per-part actions
    /// applied to it before assembly.
    pub fn add_file_part_with(
        mut self,
        file: impl Into<FileInput>,
        pages: Option<PageRange>,
        actions: Vec<BuildAction>,
    ) -> WorkflowBuilder<stage::HasParts> {
        self.compiler.add_file_part(file.into(), pages, actions);
        self.transition()
    }

    /// Append an HTML part rendered to pages by the service.
    pub fn add_html_part(self, html: impl Into<FileInput>) -> WorkflowBuilder<stage::HasParts> {
        self.add_html_part_with(html, None)
    }

    pub fn add_html_part_with(
        mut self,
        html: impl Into<FileInput>,
        layout: Option<JsonObject>,
    ) -> WorkflowBuilder<stage::HasParts> {
        self.compiler.add_html_part(html.into(), layout);
        self.transition()
    }

    /// Append a single blank page.
    pub fn add_new_page(self) -> WorkflowBuilder<stage::HasParts> {
        self.add_new_page_with(None, None)
    }

    pub fn add_new_page_with(
        mut self,
        page_count: Option<u32>,
        layout: Option<JsonObject>,
    ) -> WorkflowBuilder<stage::HasParts> {
        self.compiler.add_new_page(page_count, layout);
        self.transition()
    }

    /// Append a reference to a document already stored by the service.
    pub fn add_document_part(self, id: impl Into<String>) -> WorkflowBuilder<stage::HasParts> {
        self.add_document_part_with(id, None)
    }

    pub fn add_document_part_with(
        mut self,
        id: impl Into<String>,
        pages: Option<PageRange>,
    ) -> WorkflowBuilder<stage::HasParts> {
        self.compiler.add_document_part(id, pages);
        self.transition()
    }
}

// ── Action stage ────────────────────────────────────────────────────────────

impl WorkflowBuilder<stage::HasParts> {
    /// Apply an action to the fully assembled document.
    pub fn apply_action(mut self, action: BuildAction) -> Self {
        self.compiler.add_action(action);
        self
    }

    /// Apply several document-level actions in order.
    pub fn apply_actions(mut self, actions: impl IntoIterator<Item = BuildAction>) -> Self {
        for action in actions {
            self.compiler.add_action(action);
        }
        self
    }
}

// ── Output stage ────────────────────────────────────────────────────────────

impl<S: OutputStage> WorkflowBuilder<S> {
    fn select<O>(mut self, output: OutputNode) -> WorkflowBuilder<stage::Ready<O>> {
        self.compiler.set_output(output);
        self.transition()
    }

    /// Produce a PDF.
    pub fn output_pdf(self) -> WorkflowBuilder<stage::Ready<BinaryOutput>> {
        self.output_pdf_with(JsonObject::new())
    }

    pub fn output_pdf_with(
        self,
        options: JsonObject,
    ) -> WorkflowBuilder<stage::Ready<BinaryOutput>> {
        self.select(OutputNode::Pdf { options })
    }

    /// Produce an archival PDF/A.
    pub fn output_pdfa(self) -> WorkflowBuilder<stage::Ready<BinaryOutput>> {
        self.output_pdfa_with(JsonObject::new())
    }

    pub fn output_pdfa_with(
        self,
        options: JsonObject,
    ) -> WorkflowBuilder<stage::Ready<BinaryOutput>> {
        self.select(OutputNode::Pdfa { options })
    }

    /// Produce an accessible PDF/UA.
    pub fn output_pdfua(self) -> WorkflowBuilder<stage::Ready<BinaryOutput>> {
        self.select(OutputNode::Pdfua {
            options: JsonObject::new(),
        })
    }

    /// Rasterize to an image.
    pub fn output_image(self, format: ImageFormat) -> WorkflowBuilder<stage::Ready<BinaryOutput>> {
        self.output_image_with(format, JsonObject::new())
    }

    pub fn output_image_with(
        self,
        format: ImageFormat,
        options: JsonObject,
    ) -> WorkflowBuilder<stage::Ready<BinaryOutput>> {
        self.select(OutputNode::Image { format, options })
    }

    /// Convert to an Office document.
    pub fn output_office(
        self,
        format: OfficeFormat,
    ) -> WorkflowBuilder<stage::Ready<BinaryOutput>> {
        self.select(OutputNode::Office { format })
    }

    /// Extract structured content as JSON.
    pub fn output_json_content(self) -> WorkflowBuilder<stage::Ready<JsonOutput>> {
        self.output_json_content_with(JsonObject::new())
    }

    pub fn output_json_content_with(
        self,
        options: JsonObject,
    ) -> WorkflowBuilder<stage::Ready<JsonOutput>> {
        self.select(OutputNode::JsonContent { options })
    }

    /// Render to HTML text.
    pub fn output_html(self) -> WorkflowBuilder<stage::Ready<TextOutput>> {
        self.select(OutputNode::Html)
    }

    /// Render to Markdown text.
    pub fn output_markdown(self) -> WorkflowBuilder<stage::Ready<TextOutput>> {
        self.select(OutputNode::Markdown)
    }
}

// ── Execution stage ─────────────────────────────────────────────────────────

impl<O: OutputPayload> WorkflowBuilder<stage::Ready<O>> {
    /// Compile, dispatch, and interpret the response.
    ///
    /// Operational failures (unreadable inputs, network trouble, service
    /// rejections) are reported inside the returned [`WorkflowResult`];
    /// `Err` is reserved for builder misuse detected before dispatch.
    pub async fn execute(self, options: ExecuteOptions) -> Result<WorkflowResult<O>, Error> {
        let WorkflowBuilder {
            client, compiler, ..
        } = self;

        // ── 1. Compile ──
        let compiled = compiler.compile()?;
        let requested = match compiled.instructions.output.clone() {
            Some(output) => output,
            None => return Err(Error::Internal("no output selected".into())),
        };
        info!(
            "Executing workflow: {} parts, {} payloads",
            compiled.instructions.parts.len(),
            compiled.files.len()
        );
        let total = compiled.files.len() as u32 + 2;
        let mut progress = ProgressReporter::new(options.on_progress.clone(), total);
        progress.advance();

        // ── 2. Resolve payloads ──
        let files = match resolve_payloads(&client, compiled.files, &mut progress).await {
            Ok(files) => files,
            Err((step, error)) => {
                warn!("Payload {step} failed to resolve: {error}");
                return Ok(WorkflowResult::failed(step, error));
            }
        };

        // ── 3. Dispatch ──
        let request =
            ApiRequest::build(compiled.instructions, files).with_timeout(options.timeout);
        let response = match client.transport().dispatch(request).await {
            Ok(response) => response,
            Err(error) => {
                warn!("Dispatch failed: {error}");
                return Ok(WorkflowResult::failed(0, error));
            }
        };

        // ── 4. Interpret ──
        progress.advance();
        if response.is_success() {
            match O::from_response(response, &requested) {
                Ok(output) => Ok(WorkflowResult::succeeded(output)),
                Err(error) => Ok(WorkflowResult::failed(0, error)),
            }
        } else {
            let failure = interpret_failure(&response);
            warn!("Build rejected: {}", failure.error);
            Ok(WorkflowResult::failed(failure.step, failure.error))
        }
    }

    /// Submit for analysis only: predicted cost and required features.
    ///
    /// Same compile-and-dispatch path as [`execute`](Self::execute), against
    /// the analysis endpoint; no document is produced.
    pub async fn dry_run(self, options: DryRunOptions) -> Result<DryRunResult, Error> {
        let WorkflowBuilder {
            client, compiler, ..
        } = self;

        let compiled = compiler.compile()?;
        debug!(
            "Analyzing workflow: {} parts, {} payloads",
            compiled.instructions.parts.len(),
            compiled.files.len()
        );
        let mut progress = ProgressReporter::new(None, 0);
        let files = match resolve_payloads(&client, compiled.files, &mut progress).await {
            Ok(files) => files,
            Err((step, error)) => return Ok(DryRunResult::failed(step, error)),
        };

        let request =
            ApiRequest::analyze(compiled.instructions, files).with_timeout(options.timeout);
        let response = match client.transport().dispatch(request).await {
            Ok(response) => response,
            Err(error) => return Ok(DryRunResult::failed(0, error)),
        };

        if response.is_success() {
            match serde_json::from_slice::<BuildAnalysis>(&response.body) {
                Ok(analysis) => Ok(DryRunResult::succeeded(analysis)),
                Err(e) => Ok(DryRunResult::failed(
                    0,
                    Error::ResponseDecode {
                        detail: format!("invalid analysis payload: {e}"),
                    },
                )),
            }
        } else {
            let failure = interpret_failure(&response);
            Ok(DryRunResult::failed(failure.step, failure.error))
        }
    }
}

/// Normalize and materialize every registry entry, in allocation order.
///
/// The failing entry's registry index becomes the reported step.
async fn resolve_payloads(
    client: &Client,
    files: FileRegistry,
    progress: &mut ProgressReporter,
) -> Result<Vec<(String, FilePayload)>, (u32, Error)> {
    let fetch_timeout = client.config().fetch_timeout;
    let mut resolved = Vec::new();
    for (index, (key, input)) in files.into_entries().into_iter().enumerate() {
        let step = index as u32;
        let normalized = normalize(input, fetch_timeout)
            .await
            .map_err(|e| (step, e))?;
        let payload = normalized.into_payload().await.map_err(|e| (step, e))?;
        debug!("Resolved payload '{key}' ({} bytes)", payload.data.len());
        resolved.push((key, payload));
        progress.advance();
    }
    Ok(resolved)
}

/// 1-based, monotonically non-decreasing step counter.
struct ProgressReporter {
    callback: Option<ProgressFn>,
    total: u32,
    current: u32,
}

impl ProgressReporter {
    fn new(callback: Option<ProgressFn>, total: u32) -> Self {
        ProgressReporter {
            callback,
            total,
            current: 0,
        }
    }

    fn advance(&mut self) {
        self.current += 1;
        if let Some(callback) = &self.callback {
            callback(self.current, self.total);
        }
    }
}
