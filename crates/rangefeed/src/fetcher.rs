#![forbid(unsafe_code)]

use bytes::Bytes;
use rangefeed_net::Net;
use tracing::{debug, trace};
use url::Url;

use crate::{error::LoaderError, plan::ByteRange};

/// Domain-facing wrapper over the transport.
///
/// Maps the raw HTTP surface onto the loader's two operations: the
/// content-length probe and the ranged segment fetch. No retries and no
/// partial-body reassembly; the transport yields the full requested
/// range or the whole request fails.
#[derive(Clone, Debug)]
pub struct RangeFetcher<N> {
    net: N,
}

impl<N: Net> RangeFetcher<N> {
    pub fn new(net: N) -> Self {
        Self { net }
    }

    /// Discover the total resource size via the Content-Length header.
    ///
    /// # Errors
    ///
    /// `MissingContentLength` when the header is absent or non-numeric;
    /// `FetchFailed` on transport failure. A zero length is passed
    /// through so the planner can refuse it as an empty resource.
    pub async fn probe_size(&self, url: &Url) -> Result<u64, LoaderError> {
        debug!(url = %url, "probing content length");
        let headers = self.net.head(url.clone(), None).await?;

        headers
            .get("content-length")
            .or_else(|| headers.get("Content-Length"))
            .and_then(|v| v.parse::<u64>().ok())
            .ok_or(LoaderError::MissingContentLength)
    }

    /// Fetch one segment's byte range.
    ///
    /// # Errors
    ///
    /// `FetchFailed` carrying the transport's message.
    pub async fn fetch_range(&self, url: &Url, range: ByteRange) -> Result<Bytes, LoaderError> {
        trace!(url = %url, start = range.start, end = range.end, "fetching segment range");
        let bytes = self.net.get_range(url.clone(), range.into(), None).await?;
        trace!(bytes = bytes.len(), "segment range fetched");
        Ok(bytes)
    }
}
