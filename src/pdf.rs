//! Minimal PDF page counting without a PDF library.
//!
//! ## Why not a real parser?
//!
//! The only structural fact the client needs is the page count, so page-range
//! operations can validate indices before compiling instructions. Pulling in
//! a full PDF parser for that one integer would dwarf the rest of the crate.
//! Instead this module walks the low-level object graph just far enough:
//! find the `/Catalog`, follow its `/Pages` reference, read `/Count`.
//!
//! ## Scan structure
//!
//! The input is first split on the literal `endobj` delimiter; every regex
//! then runs over one small chunk, never over the whole unbounded input.
//! This split-then-match shape is load-bearing: a single free regex over
//! attacker-supplied bytes is where catastrophic backtracking lives.
//!
//! Limits (accepted, not bugs): encrypted documents, compressed
//! cross-reference streams, and object streams are out of scope; they fail
//! with an explicit [`PdfScanError`] rather than a wrong answer. A root
//! `/Pages` object without a direct `/Count` is an error too; there is no
//! fallback walk of `/Kids`.

use crate::error::{Error, PdfScanError};
use crate::workflow::input::NormalizedFile;
use once_cell::sync::Lazy;
use regex::bytes::Regex;
use std::collections::BTreeMap;
use tracing::debug;

/// `<number> <generation> obj` header opening an indirect object.
static RE_OBJ_HEADER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+)\s+(\d+)\s+obj").unwrap());

/// `/Pages <number> <generation> R` indirect reference inside the catalog.
static RE_PAGES_REF: Lazy<Regex> = Lazy::new(|| Regex::new(r"/Pages\s+(\d+)\s+(\d+)\s+R").unwrap());

/// `/Count <integer>` entry of the page-tree root.
static RE_COUNT: Lazy<Regex> = Lazy::new(|| Regex::new(r"/Count\s+(\d+)").unwrap());

/// Count the pages of a PDF given its raw bytes.
///
/// Deterministic: the same bytes always yield the same count. Incremental
/// updates are honoured: when an object number/generation pair appears more
/// than once, the later occurrence wins, matching how PDF readers apply
/// appended revisions.
pub fn count_pages(bytes: &[u8]) -> Result<u32, PdfScanError> {
    // Each chunk holds at most one object body. Later duplicates overwrite.
    let mut objects: BTreeMap<(u32, u32), &[u8]> = BTreeMap::new();
    for chunk in split_on(bytes, b"endobj") {
        if let Some(caps) = RE_OBJ_HEADER.captures(chunk) {
            let (Some(num), Some(generation)) = (parse_int(&caps[1]), parse_int(&caps[2])) else {
                continue;
            };
            let body_start = caps.get(0).map_or(0, |m| m.end());
            objects.insert((num, generation), &chunk[body_start..]);
        }
    }

    if objects.is_empty() {
        return Err(PdfScanError::NoObjects);
    }

    let catalog = objects
        .values()
        .find(|body| contains(body, b"/Type") && contains(body, b"/Catalog"))
        .ok_or(PdfScanError::MissingCatalog)?;

    let pages_ref = RE_PAGES_REF
        .captures(catalog)
        .ok_or(PdfScanError::MissingPagesRef)?;
    let key = match (parse_int(&pages_ref[1]), parse_int(&pages_ref[2])) {
        (Some(num), Some(generation)) => (num, generation),
        _ => return Err(PdfScanError::MissingPagesRef),
    };

    let pages = objects.get(&key).ok_or(PdfScanError::MissingPagesObject)?;

    let count = RE_COUNT
        .captures(pages)
        .and_then(|caps| parse_int(&caps[1]))
        .ok_or(PdfScanError::MissingCount)?;

    debug!("Scanned {} objects, page count {}", objects.len(), count);
    Ok(count)
}

/// Count the pages of a normalized input, attaching its filename to any
/// scan failure.
pub async fn count_pages_file(file: &NormalizedFile) -> Result<u32, Error> {
    let bytes = file.read().await?;
    count_pages(&bytes).map_err(|source| Error::PdfScan {
        filename: file.filename.clone(),
        source,
    })
}

/// Split `haystack` on every occurrence of `delimiter`.
fn split_on<'a>(haystack: &'a [u8], delimiter: &'a [u8]) -> impl Iterator<Item = &'a [u8]> {
    let step = delimiter.len();
    let mut rest = haystack;
    let mut done = false;
    std::iter::from_fn(move || {
        if done {
            return None;
        }
        match find(rest, delimiter) {
            Some(pos) => {
                let chunk = &rest[..pos];
                rest = &rest[pos + step..];
                Some(chunk)
            }
            None => {
                done = true;
                Some(rest)
            }
        }
    })
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    find(haystack, needle).is_some()
}

fn parse_int(digits: &[u8]) -> Option<u32> {
    std::str::from_utf8(digits).ok()?.parse().ok()
}
