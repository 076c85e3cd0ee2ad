//! Paginated listings
//!
//! Every listing operation returns a [`ListingChunk`]. A chunk without a
//! continuation marker is the end of the listing; a truncated page must carry
//! a marker, which [`RawListingPage::into_chunk`] enforces.

use crate::error::{Result, ServiceError};
use std::future::Future;

/// Which listing a chunk came from (used in diagnostics)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingKind {
    Objects,
    Distributions,
    StreamingDistributions,
    Invalidations,
    OriginAccessIdentities,
    MultipartUploads,
    MultipartParts,
}

impl ListingKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ListingKind::Objects => "object",
            ListingKind::Distributions => "distribution",
            ListingKind::StreamingDistributions => "streaming distribution",
            ListingKind::Invalidations => "invalidation",
            ListingKind::OriginAccessIdentities => "origin access identity",
            ListingKind::MultipartUploads => "multipart upload",
            ListingKind::MultipartParts => "multipart part",
        }
    }
}

/// One page (or the concatenation of several pages) of a listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingChunk<T, M = String> {
    pub prefix: Option<String>,
    pub delimiter: Option<String>,
    pub items: Vec<T>,
    pub common_prefixes: Vec<String>,
    /// `None` means the listing is complete
    pub continuation_marker: Option<M>,
}

impl<T, M> ListingChunk<T, M> {
    pub fn is_complete(&self) -> bool {
        self.continuation_marker.is_none()
    }
}

/// A decoded listing page before the truncation invariant is checked
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawListingPage<T, M = String> {
    pub prefix: Option<String>,
    pub delimiter: Option<String>,
    pub items: Vec<T>,
    pub common_prefixes: Vec<String>,
    pub is_truncated: bool,
    /// Marker to resume from; only consulted when the page is truncated
    pub next_marker: Option<M>,
}

impl<T, M> Default for RawListingPage<T, M> {
    fn default() -> Self {
        Self {
            prefix: None,
            delimiter: None,
            items: Vec::new(),
            common_prefixes: Vec::new(),
            is_truncated: false,
            next_marker: None,
        }
    }
}

impl<T, M> RawListingPage<T, M> {
    /// Convert to a chunk; a truncated page without a marker is an error
    pub fn into_chunk(self, kind: ListingKind) -> Result<ListingChunk<T, M>> {
        let continuation_marker = if self.is_truncated {
            match self.next_marker {
                Some(marker) => Some(marker),
                None => {
                    return Err(ServiceError::MissingContinuationMarker {
                        kind: kind.as_str(),
                    })
                }
            }
        } else {
            None
        };

        Ok(ListingChunk {
            prefix: self.prefix,
            delimiter: self.delimiter,
            items: self.items,
            common_prefixes: self.common_prefixes,
            continuation_marker,
        })
    }
}

/// Fetch chunks starting at `prior_marker` until the listing is complete.
///
/// Items and common prefixes are concatenated in encounter order without
/// de-duplication. Prefix and delimiter are taken from the first chunk.
pub async fn collect_complete<T, M, F, Fut>(
    kind: ListingKind,
    prior_marker: Option<M>,
    mut fetch: F,
) -> Result<ListingChunk<T, M>>
where
    F: FnMut(Option<M>) -> Fut,
    Fut: Future<Output = Result<ListingChunk<T, M>>>,
{
    let mut marker = prior_marker;
    let mut combined: Option<ListingChunk<T, M>> = None;
    let mut pages = 0u32;

    loop {
        let chunk = fetch(marker.take()).await?;
        pages += 1;
        marker = chunk.continuation_marker;

        match combined.as_mut() {
            None => {
                combined = Some(ListingChunk {
                    prefix: chunk.prefix,
                    delimiter: chunk.delimiter,
                    items: chunk.items,
                    common_prefixes: chunk.common_prefixes,
                    continuation_marker: None,
                });
            }
            Some(all) => {
                all.items.extend(chunk.items);
                all.common_prefixes.extend(chunk.common_prefixes);
            }
        }

        if marker.is_none() {
            break;
        }
        tracing::debug!(kind = kind.as_str(), pages, "Listing truncated, fetching next page");
    }

    combined.ok_or_else(|| ServiceError::InvalidResponse("listing returned no pages".to_string()))
}
