//! Input normalization: turn any supported file-like input into one shape.
//!
//! ## Why eager URL fetches?
//!
//! The compiler must forward every payload as a single self-contained wire
//! attachment with a known size, so remote inputs are fully buffered at
//! normalization time rather than streamed through. Local paths go the other
//! way: normalization only confirms existence, and the bytes are read at
//! dispatch, so a workflow holding fifty file parts does not keep fifty
//! files' worth of memory alive while the user is still chaining calls.

use crate::error::Error;
use bytes::Bytes;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

/// Filename given to unnamed in-memory inputs.
pub(crate) const DEFAULT_MEMORY_FILENAME: &str = "data.bin";

/// Filename given to remote inputs whose URL has no usable last segment.
pub(crate) const DEFAULT_REMOTE_FILENAME: &str = "download.bin";

/// A file-like input accepted by the workflow builder.
///
/// Plain strings auto-detect: anything starting with `http://` or `https://`
/// becomes [`FileInput::Remote`], everything else a local path. Use the
/// explicit constructors to disambiguate a path that happens to look like a
/// URL (or the reverse).
///
/// Validation is deferred to normalization at dispatch time; constructing a
/// `FileInput` never fails.
#[derive(Debug, Clone)]
pub enum FileInput {
    /// A file on the local filesystem.
    Path(PathBuf),
    /// An in-memory buffer, optionally named and typed.
    Memory {
        data: Bytes,
        filename: Option<String>,
        content_type: Option<String>,
    },
    /// A resource fetched over HTTP(S) during normalization.
    Remote(String),
}

impl FileInput {
    /// A local filesystem path, regardless of what the string looks like.
    pub fn path(path: impl Into<PathBuf>) -> Self {
        FileInput::Path(path.into())
    }

    /// A remote URL, regardless of what the string looks like.
    pub fn url(url: impl Into<String>) -> Self {
        FileInput::Remote(url.into())
    }

    /// An unnamed in-memory buffer.
    pub fn bytes(data: impl Into<Bytes>) -> Self {
        FileInput::Memory {
            data: data.into(),
            filename: None,
            content_type: None,
        }
    }

    /// An in-memory buffer with a filename and optional content type.
    pub fn bytes_named(
        data: impl Into<Bytes>,
        filename: impl Into<String>,
        content_type: Option<String>,
    ) -> Self {
        FileInput::Memory {
            data: data.into(),
            filename: Some(filename.into()),
            content_type,
        }
    }
}

impl From<&str> for FileInput {
    fn from(value: &str) -> Self {
        if is_url(value) {
            FileInput::Remote(value.to_string())
        } else {
            FileInput::Path(PathBuf::from(value))
        }
    }
}

impl From<String> for FileInput {
    fn from(value: String) -> Self {
        FileInput::from(value.as_str())
    }
}

impl From<PathBuf> for FileInput {
    fn from(value: PathBuf) -> Self {
        FileInput::Path(value)
    }
}

impl From<&Path> for FileInput {
    fn from(value: &Path) -> Self {
        FileInput::Path(value.to_path_buf())
    }
}

impl From<Bytes> for FileInput {
    fn from(value: Bytes) -> Self {
        FileInput::bytes(value)
    }
}

impl From<Vec<u8>> for FileInput {
    fn from(value: Vec<u8>) -> Self {
        FileInput::bytes(value)
    }
}

/// Check if the input string looks like a URL.
pub(crate) fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// A normalized input: a named byte source plus optional content type.
#[derive(Debug, Clone)]
pub struct NormalizedFile {
    pub filename: String,
    pub content_type: Option<String>,
    source: ByteSource,
}

#[derive(Debug, Clone)]
enum ByteSource {
    /// Existence already confirmed; bytes read lazily at dispatch.
    Disk(PathBuf),
    /// Fully buffered (in-memory inputs and fetched URLs).
    Buffered(Bytes),
}

impl NormalizedFile {
    /// Materialize the source into owned bytes.
    pub async fn read(&self) -> Result<Bytes, Error> {
        match &self.source {
            ByteSource::Disk(path) => match tokio::fs::read(path).await {
                Ok(bytes) => Ok(Bytes::from(bytes)),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(Error::FileNotFound {
                    path: path.clone(),
                }),
                Err(e) => Err(Error::FileRead {
                    path: path.clone(),
                    source: e,
                }),
            },
            ByteSource::Buffered(bytes) => Ok(bytes.clone()),
        }
    }

    /// Materialize into the wire-attachment shape.
    pub async fn into_payload(self) -> Result<FilePayload, Error> {
        let data = self.read().await?;
        Ok(FilePayload {
            filename: self.filename,
            content_type: self.content_type,
            data,
        })
    }
}

/// A fully materialized wire attachment: one multipart field's worth.
#[derive(Debug, Clone)]
pub struct FilePayload {
    pub filename: String,
    pub content_type: Option<String>,
    pub data: Bytes,
}

/// Normalize a file-like input into a named byte source.
///
/// Local paths are existence-checked here and read later; remote URLs are
/// fetched eagerly and fully buffered; in-memory buffers pass through with
/// a generic filename unless one was supplied.
pub async fn normalize(input: FileInput, fetch_timeout: Duration) -> Result<NormalizedFile, Error> {
    match input {
        FileInput::Path(path) => normalize_path(path).await,
        FileInput::Memory {
            data,
            filename,
            content_type,
        } => {
            let filename = filename.unwrap_or_else(|| DEFAULT_MEMORY_FILENAME.to_string());
            let content_type = content_type.or_else(|| infer_content_type(&filename));
            Ok(NormalizedFile {
                filename,
                content_type,
                source: ByteSource::Buffered(data),
            })
        }
        FileInput::Remote(url) => fetch_remote(&url, fetch_timeout).await,
    }
}

/// Confirm the path exists before promising lazily-readable bytes.
async fn normalize_path(path: PathBuf) -> Result<NormalizedFile, Error> {
    let meta = tokio::fs::metadata(&path)
        .await
        .map_err(|_| Error::FileNotFound { path: path.clone() })?;
    if !meta.is_file() {
        return Err(Error::InvalidFileInput {
            detail: format!("'{}' is not a regular file", path.display()),
        });
    }

    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| DEFAULT_MEMORY_FILENAME.to_string());
    let content_type = infer_content_type(&filename);

    debug!("Normalized local file: {}", path.display());
    Ok(NormalizedFile {
        filename,
        content_type,
        source: ByteSource::Disk(path),
    })
}

/// Fetch a URL into an owned, fully-buffered byte source.
async fn fetch_remote(url: &str, timeout: Duration) -> Result<NormalizedFile, Error> {
    let parsed = Url::parse(url).map_err(|e| Error::InvalidFileInput {
        detail: format!("'{url}' is not a valid URL: {e}"),
    })?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(Error::InvalidFileInput {
            detail: format!("unsupported URL scheme '{}'", parsed.scheme()),
        });
    }

    info!("Fetching remote input: {}", url);

    let client = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| Error::RemoteFetch {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client
        .get(parsed.clone())
        .send()
        .await
        .map_err(|e| Error::RemoteFetch {
            url: url.to_string(),
            reason: if e.is_timeout() {
                format!("timed out after {}s", timeout.as_secs())
            } else {
                e.to_string()
            },
        })?;

    if !response.status().is_success() {
        return Err(Error::RemoteFetch {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let header_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(';').next().unwrap_or(v).trim().to_string());

    let bytes = response.bytes().await.map_err(|e| Error::RemoteFetch {
        url: url.to_string(),
        reason: e.to_string(),
    })?;

    let filename = extract_filename(&parsed);
    let content_type = header_type.or_else(|| infer_content_type(&filename));

    info!("Fetched {} bytes from {}", bytes.len(), url);
    Ok(NormalizedFile {
        filename,
        content_type,
        source: ByteSource::Buffered(bytes),
    })
}

/// Extract a reasonable filename from the URL's last path segment.
fn extract_filename(url: &Url) -> String {
    if let Some(mut segments) = url.path_segments() {
        if let Some(last) = segments.next_back() {
            if !last.is_empty() && last.contains('.') {
                return last.to_string();
            }
        }
    }
    DEFAULT_REMOTE_FILENAME.to_string()
}

/// Best-effort content type from the filename extension.
///
/// Only the formats the service commonly sees; everything else falls back to
/// the transport's `application/octet-stream` default.
fn infer_content_type(filename: &str) -> Option<String> {
    let ext = filename.rsplit_once('.')?.1.to_ascii_lowercase();
    let mime = match ext.as_str() {
        "pdf" => "application/pdf",
        "html" | "htm" => "text/html",
        "md" => "text/markdown",
        "json" => "application/json",
        "xfdf" => "application/vnd.adobe.xfdf",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "pptx" => "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        _ => return None,
    };
    Some(mime.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/doc.pdf"));
        assert!(is_url("http://example.com/doc.pdf"));
        assert!(!is_url("/tmp/doc.pdf"));
        assert!(!is_url("doc.pdf"));
        assert!(!is_url(""));
    }

    #[test]
    fn strings_auto_detect() {
        assert!(matches!(
            FileInput::from("https://example.com/a.pdf"),
            FileInput::Remote(_)
        ));
        assert!(matches!(FileInput::from("/tmp/a.pdf"), FileInput::Path(_)));
    }

    #[test]
    fn explicit_constructors_override_detection() {
        // A path that looks like a URL stays a path when asked.
        assert!(matches!(
            FileInput::path("https://example.com/a.pdf"),
            FileInput::Path(_)
        ));
        assert!(matches!(FileInput::url("./local.pdf"), FileInput::Remote(_)));
    }

    #[tokio::test]
    async fn unnamed_bytes_get_generic_filename() {
        let normalized = normalize(FileInput::bytes(vec![1, 2, 3]), Duration::from_secs(5))
            .await
            .expect("in-memory input normalizes");
        assert_eq!(normalized.filename, "data.bin");
        assert_eq!(normalized.content_type, None);
        assert_eq!(normalized.read().await.unwrap().as_ref(), &[1, 2, 3]);
    }

    #[tokio::test]
    async fn named_bytes_keep_name_and_infer_type() {
        let input = FileInput::bytes_named(vec![0u8; 4], "scan.pdf", None);
        let normalized = normalize(input, Duration::from_secs(5)).await.unwrap();
        assert_eq!(normalized.filename, "scan.pdf");
        assert_eq!(normalized.content_type.as_deref(), Some("application/pdf"));
    }

    #[tokio::test]
    async fn missing_path_fails_with_not_found() {
        let err = normalize(
            FileInput::path("/definitely/not/a/real/file.pdf"),
            Duration::from_secs(5),
        )
        .await
        .expect_err("missing file must fail");
        assert!(err.to_string().contains("File not found"), "got: {err}");
    }

    #[tokio::test]
    async fn directory_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = normalize(FileInput::path(dir.path()), Duration::from_secs(5))
            .await
            .expect_err("directory must be rejected");
        assert_eq!(err.to_string(), "Invalid file input provided");
    }

    #[tokio::test]
    async fn local_file_reads_lazily() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.pdf");
        std::fs::write(&path, b"%PDF-1.4").unwrap();

        let normalized = normalize(FileInput::path(&path), Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(normalized.filename, "doc.pdf");
        assert_eq!(normalized.content_type.as_deref(), Some("application/pdf"));
        assert_eq!(normalized.read().await.unwrap().as_ref(), b"%PDF-1.4");
    }

    #[tokio::test]
    async fn unparseable_url_is_invalid_input() {
        let err = normalize(FileInput::url("http://"), Duration::from_secs(5))
            .await
            .expect_err("bad URL must fail");
        assert_eq!(err.to_string(), "Invalid file input provided");
    }

    #[test]
    fn filename_from_url_segments() {
        let with_ext = Url::parse("https://cdn.example.com/docs/report.pdf").unwrap();
        assert_eq!(extract_filename(&with_ext), "report.pdf");

        let no_ext = Url::parse("https://cdn.example.com/docs/report").unwrap();
        assert_eq!(extract_filename(&no_ext), "download.bin");

        let bare = Url::parse("https://cdn.example.com/").unwrap();
        assert_eq!(extract_filename(&bare), "download.bin");
    }

    #[test]
    fn content_type_inference() {
        assert_eq!(
            infer_content_type("a.PDF").as_deref(),
            Some("application/pdf")
        );
        assert_eq!(infer_content_type("page.htm").as_deref(), Some("text/html"));
        assert_eq!(infer_content_type("mystery.zzz"), None);
        assert_eq!(infer_content_type("no_extension"), None);
    }
}
