//! Workflow construction: from file-like inputs to a dispatched build.
//!
//! Each submodule owns exactly one stage of that journey, so each is
//! independently testable and the typestate surface stays separate from the
//! accumulation logic underneath it.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ compiler ──▶ builder ──▶ transport
//! (normalize) (keys+tree)  (stages)   (multipart POST)
//! ```
//!
//! 1. [`input`]: accept paths, bytes, and URLs; normalize to named byte
//!    sources with deferred validation
//! 2. [`instructions`]: the serde wire tree the service consumes
//! 3. [`compiler`]: allocate reference keys, accumulate parts and actions,
//!    snapshot into a dispatchable build
//! 4. [`builder`]: the staged front end; compile, dispatch, interpret

pub mod builder;
pub mod compiler;
pub mod input;
pub mod instructions;

pub use builder::{stage, BuildStage, OutputStage, WorkflowBuilder};
pub use compiler::{CompiledBuild, FileRegistry, InstructionCompiler};
pub use input::{normalize, FileInput, FilePayload, NormalizedFile};
pub use instructions::{
    ActionNode, BuildAction, DocumentRef, ImageFormat, Instructions, JsonObject, NewPageTag,
    OfficeFormat, OutputNode, PageRange, PartNode, RedactionStrategy,
};
