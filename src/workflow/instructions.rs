//! Wire shapes for the build instruction tree.
//!
//! Two layers live here. [`BuildAction`] is the user-facing action set and
//! may carry raw file inputs; the `*Node` types are the exact JSON the
//! service receives, where every embedded payload has already been replaced
//! by a generated reference key. The compiler performs that translation.
//!
//! Option bags (`layout`, watermark styling, redaction presets, output
//! tuning) are deliberately untyped [`JsonObject`]s passed through untouched;
//! the service owns their schema and versions it independently of this crate.

use crate::workflow::input::FileInput;
use serde::{Serialize, Serializer};

/// An open-ended JSON option bag forwarded to the service verbatim.
pub type JsonObject = serde_json::Map<String, serde_json::Value>;

// ── Pages ───────────────────────────────────────────────────────────────────

/// An inclusive, zero-based page selection.
///
/// Either bound may be omitted; the service then substitutes the document
/// edge on that side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageRange {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<u32>,
}

impl PageRange {
    /// Pages `start..=end`.
    pub fn new(start: u32, end: u32) -> Self {
        PageRange {
            start: Some(start),
            end: Some(end),
        }
    }

    /// Exactly one page.
    pub fn single(index: u32) -> Self {
        PageRange::new(index, index)
    }

    /// From `start` through the last page.
    pub fn from_start(start: u32) -> Self {
        PageRange {
            start: Some(start),
            end: None,
        }
    }

    /// From the first page through `end`.
    pub fn up_to(end: u32) -> Self {
        PageRange {
            start: None,
            end: Some(end),
        }
    }
}

// ── Actions ─────────────────────────────────────────────────────────────────

/// A document transformation, attachable to a single part or to the whole
/// assembled document.
///
/// Variants that embed a file ([`WatermarkImage`], [`ApplyInstantJson`],
/// [`ApplyXfdf`]) hold the raw input here; the compiler swaps it for a
/// reference key when the instruction tree is built.
///
/// [`WatermarkImage`]: BuildAction::WatermarkImage
/// [`ApplyInstantJson`]: BuildAction::ApplyInstantJson
/// [`ApplyXfdf`]: BuildAction::ApplyXfdf
#[derive(Debug, Clone)]
pub enum BuildAction {
    /// Run OCR in the given language.
    Ocr { language: String },
    /// Rotate every selected page by the given number of degrees.
    Rotate { degrees: i32 },
    /// Flatten annotations and form fields into page content.
    Flatten,
    /// Stamp a text watermark; styling knobs go in `options`.
    WatermarkText { text: String, options: JsonObject },
    /// Stamp an image watermark; styling knobs go in `options`.
    WatermarkImage {
        image: FileInput,
        options: JsonObject,
    },
    /// Mark content for redaction without removing it yet.
    CreateRedactions {
        strategy: RedactionStrategy,
        options: JsonObject,
    },
    /// Irreversibly apply previously created redactions.
    ApplyRedactions,
    /// Import an Instant JSON annotation payload.
    ApplyInstantJson { file: FileInput },
    /// Import an XFDF annotation payload.
    ApplyXfdf { file: FileInput },
}

impl BuildAction {
    pub fn ocr(language: impl Into<String>) -> Self {
        BuildAction::Ocr {
            language: language.into(),
        }
    }

    pub fn rotate(degrees: i32) -> Self {
        BuildAction::Rotate { degrees }
    }

    pub fn flatten() -> Self {
        BuildAction::Flatten
    }

    pub fn watermark_text(text: impl Into<String>, options: JsonObject) -> Self {
        BuildAction::WatermarkText {
            text: text.into(),
            options,
        }
    }

    pub fn watermark_image(image: impl Into<FileInput>, options: JsonObject) -> Self {
        BuildAction::WatermarkImage {
            image: image.into(),
            options,
        }
    }

    pub fn create_redactions(strategy: RedactionStrategy, options: JsonObject) -> Self {
        BuildAction::CreateRedactions { strategy, options }
    }

    /// Redact every literal occurrence of `text`.
    pub fn redact_text(text: impl Into<String>) -> Self {
        let mut options = JsonObject::new();
        options.insert("text".into(), text.into().into());
        BuildAction::CreateRedactions {
            strategy: RedactionStrategy::Text,
            options,
        }
    }

    /// Redact every match of a service-side regular expression.
    pub fn redact_regex(pattern: impl Into<String>) -> Self {
        let mut options = JsonObject::new();
        options.insert("regex".into(), pattern.into().into());
        BuildAction::CreateRedactions {
            strategy: RedactionStrategy::Regex,
            options,
        }
    }

    /// Redact matches of a named service-side preset (e.g. `email-address`).
    pub fn redact_preset(preset: impl Into<String>) -> Self {
        let mut options = JsonObject::new();
        options.insert("preset".into(), preset.into().into());
        BuildAction::CreateRedactions {
            strategy: RedactionStrategy::Preset,
            options,
        }
    }

    pub fn apply_redactions() -> Self {
        BuildAction::ApplyRedactions
    }

    pub fn apply_instant_json(file: impl Into<FileInput>) -> Self {
        BuildAction::ApplyInstantJson { file: file.into() }
    }

    pub fn apply_xfdf(file: impl Into<FileInput>) -> Self {
        BuildAction::ApplyXfdf { file: file.into() }
    }
}

/// How `createRedactions` decides what to mark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RedactionStrategy {
    Text,
    Regex,
    Preset,
}

/// Compiled action: payload inputs replaced by reference keys.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ActionNode {
    Ocr {
        language: String,
    },
    #[serde(rename_all = "camelCase")]
    Rotate {
        rotate_by: i32,
    },
    Flatten,
    Watermark {
        #[serde(skip_serializing_if = "Option::is_none")]
        text: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        image: Option<String>,
        #[serde(flatten)]
        options: JsonObject,
    },
    #[serde(rename_all = "camelCase")]
    CreateRedactions {
        strategy: RedactionStrategy,
        strategy_options: JsonObject,
    },
    ApplyRedactions,
    ApplyInstantJson {
        file: String,
    },
    ApplyXfdf {
        file: String,
    },
}

// ── Parts ───────────────────────────────────────────────────────────────────

/// Compiled part: payload inputs replaced by reference keys.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PartNode {
    File {
        file: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        pages: Option<PageRange>,
        #[serde(skip_serializing_if = "Option::is_none")]
        actions: Option<Vec<ActionNode>>,
    },
    Html {
        html: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        layout: Option<JsonObject>,
    },
    #[serde(rename_all = "camelCase")]
    NewPage {
        page: NewPageTag,
        #[serde(skip_serializing_if = "Option::is_none")]
        page_count: Option<u32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        layout: Option<JsonObject>,
    },
    Document {
        document: DocumentRef,
        #[serde(skip_serializing_if = "Option::is_none")]
        pages: Option<PageRange>,
    },
}

/// Marker that serializes as the literal string `"new"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NewPageTag;

impl Serialize for NewPageTag {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str("new")
    }
}

/// Reference to a document already stored by the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentRef {
    pub id: String,
}

// ── Output ──────────────────────────────────────────────────────────────────

/// Raster format for image output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Png,
    Jpeg,
    Webp,
}

impl ImageFormat {
    pub(crate) fn mime(self) -> &'static str {
        match self {
            ImageFormat::Png => "image/png",
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Webp => "image/webp",
        }
    }

    pub(crate) fn extension(self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Jpeg => "jpeg",
            ImageFormat::Webp => "webp",
        }
    }
}

/// Office document format for office output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OfficeFormat {
    Docx,
    Xlsx,
    Pptx,
}

impl OfficeFormat {
    pub(crate) fn mime(self) -> &'static str {
        match self {
            OfficeFormat::Docx => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
            OfficeFormat::Xlsx => {
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            }
            OfficeFormat::Pptx => {
                "application/vnd.openxmlformats-officedocument.presentationml.presentation"
            }
        }
    }

    pub(crate) fn extension(self) -> &'static str {
        match self {
            OfficeFormat::Docx => "docx",
            OfficeFormat::Xlsx => "xlsx",
            OfficeFormat::Pptx => "pptx",
        }
    }
}

/// Requested output format, with untyped tuning options where the service
/// accepts them.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum OutputNode {
    Pdf {
        #[serde(flatten)]
        options: JsonObject,
    },
    Pdfa {
        #[serde(flatten)]
        options: JsonObject,
    },
    Pdfua {
        #[serde(flatten)]
        options: JsonObject,
    },
    Image {
        format: ImageFormat,
        #[serde(flatten)]
        options: JsonObject,
    },
    Office {
        format: OfficeFormat,
    },
    #[serde(rename = "json-content")]
    JsonContent {
        #[serde(flatten)]
        options: JsonObject,
    },
    Html,
    Markdown,
}

impl OutputNode {
    /// Content type assumed when the response omits one.
    pub(crate) fn default_mime(&self) -> &'static str {
        match self {
            OutputNode::Pdf { .. } | OutputNode::Pdfa { .. } | OutputNode::Pdfua { .. } => {
                "application/pdf"
            }
            OutputNode::Image { format, .. } => format.mime(),
            OutputNode::Office { format } => format.mime(),
            OutputNode::JsonContent { .. } => "application/json",
            OutputNode::Html => "text/html",
            OutputNode::Markdown => "text/markdown",
        }
    }

    /// Filename assumed when the response names none.
    pub(crate) fn default_filename(&self) -> String {
        let extension = match self {
            OutputNode::Pdf { .. } | OutputNode::Pdfa { .. } | OutputNode::Pdfua { .. } => "pdf",
            OutputNode::Image { format, .. } => format.extension(),
            OutputNode::Office { format } => format.extension(),
            OutputNode::JsonContent { .. } => "json",
            OutputNode::Html => "html",
            OutputNode::Markdown => "md",
        };
        format!("output.{extension}")
    }
}

// ── Instruction tree ────────────────────────────────────────────────────────

/// The compiled instruction tree sent alongside the payload map.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Instructions {
    pub parts: Vec<PartNode>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<ActionNode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<OutputNode>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, to_value};

    fn obj(value: serde_json::Value) -> JsonObject {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn file_part_shape() {
        let part = PartNode::File {
            file: "file_0".into(),
            pages: Some(PageRange::new(0, 4)),
            actions: Some(vec![ActionNode::Rotate { rotate_by: 90 }]),
        };
        assert_eq!(
            to_value(&part).unwrap(),
            json!({
                "file": "file_0",
                "pages": {"start": 0, "end": 4},
                "actions": [{"type": "rotate", "rotateBy": 90}],
            })
        );
    }

    #[test]
    fn bare_file_part_omits_optionals() {
        let part = PartNode::File {
            file: "file_3".into(),
            pages: None,
            actions: None,
        };
        assert_eq!(to_value(&part).unwrap(), json!({"file": "file_3"}));
    }

    #[test]
    fn html_and_new_page_part_shapes() {
        let html = PartNode::Html {
            html: "html_1".into(),
            layout: Some(obj(json!({"size": "A4"}))),
        };
        assert_eq!(
            to_value(&html).unwrap(),
            json!({"html": "html_1", "layout": {"size": "A4"}})
        );

        let blank = PartNode::NewPage {
            page: NewPageTag,
            page_count: Some(3),
            layout: None,
        };
        assert_eq!(
            to_value(&blank).unwrap(),
            json!({"page": "new", "pageCount": 3})
        );
    }

    #[test]
    fn document_part_shape() {
        let part = PartNode::Document {
            document: DocumentRef {
                id: "doc_abc".into(),
            },
            pages: Some(PageRange::from_start(2)),
        };
        assert_eq!(
            to_value(&part).unwrap(),
            json!({"document": {"id": "doc_abc"}, "pages": {"start": 2}})
        );
    }

    #[test]
    fn action_node_shapes() {
        assert_eq!(
            to_value(ActionNode::Ocr {
                language: "english".into()
            })
            .unwrap(),
            json!({"type": "ocr", "language": "english"})
        );
        assert_eq!(
            to_value(ActionNode::Flatten).unwrap(),
            json!({"type": "flatten"})
        );
        assert_eq!(
            to_value(ActionNode::ApplyXfdf {
                file: "file_2".into()
            })
            .unwrap(),
            json!({"type": "applyXfdf", "file": "file_2"})
        );
    }

    #[test]
    fn watermark_flattens_styling_options() {
        let node = ActionNode::Watermark {
            text: Some("DRAFT".into()),
            image: None,
            options: obj(json!({"width": 200, "opacity": 0.5})),
        };
        assert_eq!(
            to_value(&node).unwrap(),
            json!({
                "type": "watermark",
                "text": "DRAFT",
                "width": 200,
                "opacity": 0.5,
            })
        );
    }

    #[test]
    fn redaction_nodes_use_camel_case() {
        let node = ActionNode::CreateRedactions {
            strategy: RedactionStrategy::Regex,
            strategy_options: obj(json!({"regex": "\\d{4}"})),
        };
        assert_eq!(
            to_value(&node).unwrap(),
            json!({
                "type": "createRedactions",
                "strategy": "regex",
                "strategyOptions": {"regex": "\\d{4}"},
            })
        );
        assert_eq!(
            to_value(ActionNode::ApplyRedactions).unwrap(),
            json!({"type": "applyRedactions"})
        );
    }

    #[test]
    fn output_node_shapes() {
        assert_eq!(
            to_value(OutputNode::Pdf {
                options: JsonObject::new()
            })
            .unwrap(),
            json!({"type": "pdf"})
        );
        assert_eq!(
            to_value(OutputNode::Pdfa {
                options: obj(json!({"conformance": "pdfa-2b"}))
            })
            .unwrap(),
            json!({"type": "pdfa", "conformance": "pdfa-2b"})
        );
        assert_eq!(
            to_value(OutputNode::Image {
                format: ImageFormat::Png,
                options: obj(json!({"dpi": 300}))
            })
            .unwrap(),
            json!({"type": "image", "format": "png", "dpi": 300})
        );
        assert_eq!(
            to_value(OutputNode::Office {
                format: OfficeFormat::Docx
            })
            .unwrap(),
            json!({"type": "office", "format": "docx"})
        );
        assert_eq!(
            to_value(OutputNode::JsonContent {
                options: obj(json!({"tables": true}))
            })
            .unwrap(),
            json!({"type": "json-content", "tables": true})
        );
        assert_eq!(to_value(OutputNode::Markdown).unwrap(), json!({"type": "markdown"}));
    }

    #[test]
    fn instructions_omit_empty_sections() {
        let bare = Instructions {
            parts: vec![PartNode::File {
                file: "file_0".into(),
                pages: None,
                actions: None,
            }],
            actions: vec![],
            output: None,
        };
        assert_eq!(
            to_value(&bare).unwrap(),
            json!({"parts": [{"file": "file_0"}]})
        );
    }

    #[test]
    fn page_range_constructors() {
        assert_eq!(to_value(PageRange::single(5)).unwrap(), json!({"start": 5, "end": 5}));
        assert_eq!(to_value(PageRange::up_to(9)).unwrap(), json!({"end": 9}));
    }

    #[test]
    fn redaction_helpers_fill_strategy_options() {
        let BuildAction::CreateRedactions { strategy, options } =
            BuildAction::redact_preset("email-address")
        else {
            panic!("expected CreateRedactions");
        };
        assert_eq!(strategy, RedactionStrategy::Preset);
        assert_eq!(options.get("preset"), Some(&json!("email-address")));
    }

    #[test]
    fn default_filenames_follow_format() {
        assert_eq!(
            OutputNode::Pdf {
                options: JsonObject::new()
            }
            .default_filename(),
            "output.pdf"
        );
        assert_eq!(
            OutputNode::Image {
                format: ImageFormat::Webp,
                options: JsonObject::new()
            }
            .default_filename(),
            "output.webp"
        );
        assert_eq!(
            OutputNode::Office {
                format: OfficeFormat::Xlsx
            }
            .default_mime(),
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
        );
    }
}
