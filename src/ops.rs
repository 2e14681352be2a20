//! Page-oriented convenience operations on [`Client`].
//!
//! Every operation that takes page indices counts the source document's
//! pages locally first and validates the request against that count, so a
//! bad index fails fast with the offending value and the actual count
//! instead of burning a service round trip.
//!
//! The source is materialized exactly once; each generated workflow gets its
//! own in-memory handle onto the same bytes, never a shared consumed stream.
//! Fan-out operations run their workflows concurrently and join on all of
//! them; one range failing does not cancel its siblings.

use crate::client::Client;
use crate::error::Error;
use crate::pdf;
use crate::result::{BinaryOutput, ExecuteOptions, WorkflowResult};
use crate::workflow::input::{normalize, FileInput};
use crate::workflow::instructions::PageRange;
use bytes::Bytes;
use futures::future::join_all;
use std::collections::BTreeSet;
use tracing::info;

/// Where [`Client::add_blank_pages`] inserts the blank run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PagePosition {
    /// Before the first page.
    Start,
    /// After the last page.
    End,
    /// Before the 0-based page index; an index equal to the page count
    /// appends at the end.
    Index(u32),
}

/// A counted, fully-buffered source document.
struct SourceDocument {
    data: Bytes,
    filename: String,
    content_type: Option<String>,
    pages: u32,
}

impl SourceDocument {
    /// Fresh input handle over the shared bytes.
    fn input(&self) -> FileInput {
        FileInput::bytes_named(
            self.data.clone(),
            self.filename.clone(),
            self.content_type.clone(),
        )
    }
}

impl Client {
    /// Concatenate several documents into one PDF, in argument order.
    pub async fn merge(
        &self,
        files: Vec<FileInput>,
        options: ExecuteOptions,
    ) -> Result<WorkflowResult<BinaryOutput>, Error> {
        let mut files = files.into_iter();
        let Some(first) = files.next() else {
            return Err(Error::EmptyWorkflow);
        };
        let mut builder = self.workflow().add_file_part(first);
        for file in files {
            builder = builder.add_file_part(file);
        }
        builder.output_pdf().execute(options).await
    }

    /// Extract each page range into its own PDF.
    ///
    /// Ranges may overlap and are produced concurrently; each range reports
    /// success or failure independently, in input order.
    pub async fn split(
        &self,
        file: impl Into<FileInput>,
        ranges: &[PageRange],
        options: ExecuteOptions,
    ) -> Result<Vec<WorkflowResult<BinaryOutput>>, Error> {
        if ranges.is_empty() {
            return Err(Error::InvalidSelection {
                detail: "at least one page range is required".into(),
            });
        }
        let source = self.load_source(file.into()).await?;
        for range in ranges {
            validate_range(range, source.pages)?;
        }

        info!(
            "Splitting '{}' ({} pages) into {} ranges",
            source.filename,
            source.pages,
            ranges.len()
        );
        let jobs = ranges.iter().map(|range| {
            self.workflow()
                .add_file_part_with(source.input(), Some(*range), Vec::new())
                .output_pdf()
                .execute(options.clone())
        });
        join_all(jobs).await.into_iter().collect()
    }

    /// Build a PDF whose pages are the given indices of the source, in the
    /// given order. Indices may repeat, so this both reorders and
    /// duplicates.
    pub async fn duplicate_pages(
        &self,
        file: impl Into<FileInput>,
        indexes: &[u32],
        options: ExecuteOptions,
    ) -> Result<WorkflowResult<BinaryOutput>, Error> {
        if indexes.is_empty() {
            return Err(Error::InvalidSelection {
                detail: "at least one page index is required".into(),
            });
        }
        let source = self.load_source(file.into()).await?;
        for &index in indexes {
            if index >= source.pages {
                return Err(Error::PageIndexOutOfRange {
                    index,
                    count: source.pages,
                });
            }
        }

        let mut builder = self.workflow().add_file_part_with(
            source.input(),
            Some(PageRange::single(indexes[0])),
            Vec::new(),
        );
        for &index in &indexes[1..] {
            builder = builder.add_file_part_with(
                source.input(),
                Some(PageRange::single(index)),
                Vec::new(),
            );
        }
        builder.output_pdf().execute(options).await
    }

    /// Remove the given 0-based pages, keeping everything else in order.
    pub async fn delete_pages(
        &self,
        file: impl Into<FileInput>,
        indexes: &[u32],
        options: ExecuteOptions,
    ) -> Result<WorkflowResult<BinaryOutput>, Error> {
        if indexes.is_empty() {
            return Err(Error::InvalidSelection {
                detail: "at least one page index is required".into(),
            });
        }
        let source = self.load_source(file.into()).await?;
        for &index in indexes {
            if index >= source.pages {
                return Err(Error::PageIndexOutOfRange {
                    index,
                    count: source.pages,
                });
            }
        }
        let mut kept = kept_ranges(indexes, source.pages).into_iter();
        let Some(first) = kept.next() else {
            return Err(Error::InvalidSelection {
                detail: "deleting every page would leave an empty document".into(),
            });
        };
        let mut builder =
            self.workflow()
                .add_file_part_with(source.input(), Some(first), Vec::new());
        for range in kept {
            builder = builder.add_file_part_with(source.input(), Some(range), Vec::new());
        }
        builder.output_pdf().execute(options).await
    }

    /// Insert `count` blank pages at the given position.
    pub async fn add_blank_pages(
        &self,
        file: impl Into<FileInput>,
        position: PagePosition,
        count: u32,
        options: ExecuteOptions,
    ) -> Result<WorkflowResult<BinaryOutput>, Error> {
        if count == 0 {
            return Err(Error::InvalidSelection {
                detail: "blank page count must be at least 1".into(),
            });
        }
        let source = self.load_source(file.into()).await?;

        let index = match position {
            PagePosition::Start => 0,
            PagePosition::End => source.pages,
            PagePosition::Index(index) => {
                if index > source.pages {
                    return Err(Error::PageIndexOutOfRange {
                        index,
                        count: source.pages,
                    });
                }
                index
            }
        };

        let builder = if index == 0 {
            self.workflow()
                .add_new_page_with(Some(count), None)
                .add_file_part(source.input())
        } else if index == source.pages {
            self.workflow()
                .add_file_part(source.input())
                .add_new_page_with(Some(count), None)
        } else {
            self.workflow()
                .add_file_part_with(
                    source.input(),
                    Some(PageRange::new(0, index - 1)),
                    Vec::new(),
                )
                .add_new_page_with(Some(count), None)
                .add_file_part_with(
                    source.input(),
                    Some(PageRange::new(index, source.pages - 1)),
                    Vec::new(),
                )
        };
        builder.output_pdf().execute(options).await
    }

    /// Count the pages of a PDF locally, without contacting the service.
    pub async fn page_count(&self, file: impl Into<FileInput>) -> Result<u32, Error> {
        let source = self.load_source(file.into()).await?;
        Ok(source.pages)
    }

    /// Normalize, buffer, and count the source exactly once.
    async fn load_source(&self, file: FileInput) -> Result<SourceDocument, Error> {
        let normalized = normalize(file, self.config().fetch_timeout).await?;
        let data = normalized.read().await?;
        let pages = pdf::count_pages(&data).map_err(|source| Error::PdfScan {
            filename: normalized.filename.clone(),
            source,
        })?;
        Ok(SourceDocument {
            data,
            filename: normalized.filename,
            content_type: normalized.content_type,
            pages,
        })
    }
}

/// Check a selection range against the counted pages.
fn validate_range(range: &PageRange, count: u32) -> Result<(), Error> {
    let start = range.start.unwrap_or(0);
    let end = range.end.unwrap_or(count.saturating_sub(1));
    if start > end {
        return Err(Error::InvalidPageRange { start, end });
    }
    for index in [start, end] {
        if index >= count {
            return Err(Error::PageIndexOutOfRange { index, count });
        }
    }
    Ok(())
}

/// Complement of the deleted set, as maximal contiguous kept ranges.
fn kept_ranges(deleted: &[u32], count: u32) -> Vec<PageRange> {
    let deleted: BTreeSet<u32> = deleted.iter().copied().collect();
    let mut ranges = Vec::new();
    let mut run_start: Option<u32> = None;
    for page in 0..count {
        if deleted.contains(&page) {
            if let Some(start) = run_start.take() {
                ranges.push(PageRange::new(start, page - 1));
            }
        } else if run_start.is_none() {
            run_start = Some(page);
        }
    }
    if let Some(start) = run_start {
        ranges.push(PageRange::new(start, count - 1));
    }
    ranges
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn kept_ranges_complement_the_deletions() {
        assert_eq!(
            kept_ranges(&[1, 2], 6),
            vec![PageRange::new(0, 0), PageRange::new(3, 5)]
        );
        assert_eq!(kept_ranges(&[0], 6), vec![PageRange::new(1, 5)]);
        assert_eq!(kept_ranges(&[5], 6), vec![PageRange::new(0, 4)]);
        assert_eq!(
            kept_ranges(&[0, 2, 4], 5),
            vec![PageRange::new(1, 1), PageRange::new(3, 3)]
        );
    }

    #[test]
    fn kept_ranges_tolerate_unordered_duplicates() {
        assert_eq!(
            kept_ranges(&[3, 1, 3], 5),
            vec![
                PageRange::new(0, 0),
                PageRange::new(2, 2),
                PageRange::new(4, 4)
            ]
        );
    }

    #[test]
    fn deleting_every_page_leaves_nothing() {
        assert!(kept_ranges(&[0, 1, 2], 3).is_empty());
    }

    #[test]
    fn range_validation_names_the_problem() {
        assert!(validate_range(&PageRange::new(0, 2), 6).is_ok());
        assert!(validate_range(&PageRange::up_to(5), 6).is_ok());
        assert!(validate_range(&PageRange::from_start(4), 6).is_ok());

        let reversed = validate_range(&PageRange::new(4, 1), 6).unwrap_err();
        assert_eq!(reversed.kind(), ErrorKind::Validation);
        assert!(reversed.to_string().contains("start 4"));

        let beyond = validate_range(&PageRange::new(0, 6), 6).unwrap_err();
        assert_eq!(
            beyond.to_string(),
            "Page index 6 is out of range (document has 6 pages)"
        );
    }
}
