//! Instruction compiler: accumulates parts, actions, and an output choice,
//! and snapshots them into a wire-ready instruction tree plus the registry
//! of payloads the tree refers to.
//!
//! Reference keys come from one monotonically increasing counter shared by
//! parts and payload-bearing actions, assigned at the moment the payload is
//! added. The accumulated state is append-only, so compiling is a pure
//! snapshot and may happen any number of times.

use crate::error::Error;
use crate::workflow::input::FileInput;
use crate::workflow::instructions::{
    ActionNode, BuildAction, DocumentRef, Instructions, JsonObject, NewPageTag, OutputNode,
    PageRange, PartNode,
};
use tracing::debug;

const FILE_TAG: &str = "file";
const HTML_TAG: &str = "html";

/// Ordered map from generated reference key to the input backing it.
///
/// Entries are inserted as parts and actions are added and consumed once at
/// dispatch, in insertion order, to build the wire payload.
#[derive(Debug, Clone, Default)]
pub struct FileRegistry {
    entries: Vec<(String, FileInput)>,
}

impl FileRegistry {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FileInput)> {
        self.entries.iter().map(|(key, input)| (key.as_str(), input))
    }

    pub(crate) fn into_entries(self) -> Vec<(String, FileInput)> {
        self.entries
    }

    fn insert(&mut self, key: String, input: FileInput) {
        self.entries.push((key, input));
    }
}

/// A compiled snapshot: the instruction tree and the payloads it references.
#[derive(Debug, Clone)]
pub struct CompiledBuild {
    pub instructions: Instructions,
    pub files: FileRegistry,
}

/// Mutable accumulator behind the staged builder.
#[derive(Debug, Default)]
pub struct InstructionCompiler {
    parts: Vec<PartNode>,
    actions: Vec<ActionNode>,
    output: Option<OutputNode>,
    files: FileRegistry,
    next_key: u32,
}

impl InstructionCompiler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of payload entries accumulated so far.
    pub fn payload_count(&self) -> usize {
        self.files.len()
    }

    pub fn add_file_part(
        &mut self,
        file: FileInput,
        pages: Option<PageRange>,
        actions: Vec<BuildAction>,
    ) {
        let key = self.allocate_key(FILE_TAG);
        self.files.insert(key.clone(), file);
        let actions = if actions.is_empty() {
            None
        } else {
            Some(
                actions
                    .into_iter()
                    .map(|action| self.compile_action(action))
                    .collect(),
            )
        };
        self.parts.push(PartNode::File {
            file: key,
            pages,
            actions,
        });
    }

    pub fn add_html_part(&mut self, html: FileInput, layout: Option<JsonObject>) {
        let key = self.allocate_key(HTML_TAG);
        self.files.insert(key.clone(), html);
        self.parts.push(PartNode::Html { html: key, layout });
    }

    pub fn add_new_page(&mut self, page_count: Option<u32>, layout: Option<JsonObject>) {
        self.parts.push(PartNode::NewPage {
            page: NewPageTag,
            page_count,
            layout,
        });
    }

    pub fn add_document_part(&mut self, id: impl Into<String>, pages: Option<PageRange>) {
        self.parts.push(PartNode::Document {
            document: DocumentRef { id: id.into() },
            pages,
        });
    }

    /// Append a document-scope action, applied after all parts are assembled.
    pub fn add_action(&mut self, action: BuildAction) {
        let node = self.compile_action(action);
        self.actions.push(node);
    }

    /// Select the output, replacing any previous choice.
    pub fn set_output(&mut self, output: OutputNode) {
        self.output = Some(output);
    }

    /// Snapshot the accumulated state into a dispatchable build.
    ///
    /// Fails before any network interaction when no parts were ever added.
    pub fn compile(&self) -> Result<CompiledBuild, Error> {
        if self.parts.is_empty() {
            return Err(Error::EmptyWorkflow);
        }
        debug!(
            "Compiled instructions: {} parts, {} document actions, {} payloads",
            self.parts.len(),
            self.actions.len(),
            self.files.len()
        );
        Ok(CompiledBuild {
            instructions: Instructions {
                parts: self.parts.clone(),
                actions: self.actions.clone(),
                output: self.output.clone(),
            },
            files: self.files.clone(),
        })
    }

    /// Next key from the shared counter. Keys are never reused or renumbered.
    fn allocate_key(&mut self, tag: &str) -> String {
        let key = format!("{tag}_{}", self.next_key);
        self.next_key += 1;
        key
    }

    /// Lower a user-facing action, registering any payload it embeds.
    fn compile_action(&mut self, action: BuildAction) -> ActionNode {
        match action {
            BuildAction::Ocr { language } => ActionNode::Ocr { language },
            BuildAction::Rotate { degrees } => ActionNode::Rotate { rotate_by: degrees },
            BuildAction::Flatten => ActionNode::Flatten,
            BuildAction::WatermarkText { text, options } => ActionNode::Watermark {
                text: Some(text),
                image: None,
                options,
            },
            BuildAction::WatermarkImage { image, options } => {
                let key = self.allocate_key(FILE_TAG);
                self.files.insert(key.clone(), image);
                ActionNode::Watermark {
                    text: None,
                    image: Some(key),
                    options,
                }
            }
            BuildAction::CreateRedactions { strategy, options } => ActionNode::CreateRedactions {
                strategy,
                strategy_options: options,
            },
            BuildAction::ApplyRedactions => ActionNode::ApplyRedactions,
            BuildAction::ApplyInstantJson { file } => {
                let key = self.allocate_key(FILE_TAG);
                self.files.insert(key.clone(), file);
                ActionNode::ApplyInstantJson { file: key }
            }
            BuildAction::ApplyXfdf { file } => {
                let key = self.allocate_key(FILE_TAG);
                self.files.insert(key.clone(), file);
                ActionNode::ApplyXfdf { file: key }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use serde_json::{json, to_value};

    fn registry_keys(files: &FileRegistry) -> Vec<&str> {
        files.iter().map(|(key, _)| key).collect()
    }

    #[test]
    fn keys_follow_insertion_order() {
        let mut compiler = InstructionCompiler::new();
        compiler.add_file_part(FileInput::bytes(vec![1]), None, vec![]);
        compiler.add_html_part(FileInput::bytes(b"<p>hi</p>".to_vec()), None);
        compiler.add_file_part(FileInput::bytes(vec![2]), None, vec![]);

        let build = compiler.compile().unwrap();
        assert_eq!(
            registry_keys(&build.files),
            vec!["file_0", "html_1", "file_2"]
        );
        assert_eq!(
            to_value(&build.instructions.parts).unwrap(),
            json!([{"file": "file_0"}, {"html": "html_1"}, {"file": "file_2"}])
        );
    }

    #[test]
    fn payload_actions_share_the_counter() {
        let mut compiler = InstructionCompiler::new();
        compiler.add_file_part(FileInput::bytes(vec![1]), None, vec![]);
        compiler.add_action(BuildAction::apply_xfdf(FileInput::bytes(b"<xfdf/>".to_vec())));
        compiler.add_html_part(FileInput::bytes(b"<p/>".to_vec()), None);

        let build = compiler.compile().unwrap();
        assert_eq!(
            registry_keys(&build.files),
            vec!["file_0", "file_1", "html_2"]
        );
        assert_eq!(
            to_value(&build.instructions.actions).unwrap(),
            json!([{"type": "applyXfdf", "file": "file_1"}])
        );
    }

    #[test]
    fn part_actions_register_embedded_payloads() {
        let mut compiler = InstructionCompiler::new();
        compiler.add_file_part(
            FileInput::bytes(vec![1]),
            Some(PageRange::new(0, 1)),
            vec![
                BuildAction::rotate(180),
                BuildAction::watermark_image(FileInput::bytes(vec![2]), JsonObject::new()),
            ],
        );

        let build = compiler.compile().unwrap();
        assert_eq!(registry_keys(&build.files), vec!["file_0", "file_1"]);
        assert_eq!(
            to_value(&build.instructions.parts).unwrap(),
            json!([{
                "file": "file_0",
                "pages": {"start": 0, "end": 1},
                "actions": [
                    {"type": "rotate", "rotateBy": 180},
                    {"type": "watermark", "image": "file_1"},
                ],
            }])
        );
    }

    #[test]
    fn document_parts_allocate_no_key() {
        let mut compiler = InstructionCompiler::new();
        compiler.add_document_part("doc_abc", None);
        compiler.add_new_page(Some(2), None);
        compiler.add_file_part(FileInput::bytes(vec![1]), None, vec![]);

        let build = compiler.compile().unwrap();
        assert_eq!(registry_keys(&build.files), vec!["file_0"]);
        assert_eq!(
            to_value(&build.instructions.parts).unwrap(),
            json!([
                {"document": {"id": "doc_abc"}},
                {"page": "new", "pageCount": 2},
                {"file": "file_0"},
            ])
        );
    }

    #[test]
    fn compile_without_parts_fails_eagerly() {
        let compiler = InstructionCompiler::new();
        let err = compiler.compile().unwrap_err();
        assert_eq!(
            err.to_string(),
            "At least one part must be added to build a document"
        );
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn compile_twice_is_identical() {
        let mut compiler = InstructionCompiler::new();
        compiler.add_file_part(FileInput::bytes(vec![1]), None, vec![BuildAction::ocr("english")]);
        compiler.add_action(BuildAction::flatten());
        compiler.set_output(OutputNode::Pdf {
            options: JsonObject::new(),
        });

        let first = compiler.compile().unwrap();
        let second = compiler.compile().unwrap();
        assert_eq!(first.instructions, second.instructions);
        assert_eq!(
            to_value(&first.instructions).unwrap(),
            to_value(&second.instructions).unwrap()
        );
    }

    #[test]
    fn later_output_choice_wins() {
        let mut compiler = InstructionCompiler::new();
        compiler.add_file_part(FileInput::bytes(vec![1]), None, vec![]);
        compiler.set_output(OutputNode::Pdf {
            options: JsonObject::new(),
        });
        compiler.set_output(OutputNode::Markdown);

        let build = compiler.compile().unwrap();
        assert_eq!(build.instructions.output, Some(OutputNode::Markdown));
    }
}
