use async_trait::async_trait;
use bytes::Bytes;
use url::Url;

use crate::{
    error::NetError,
    types::{Headers, RangeSpec},
};

/// Transport seam used by the loader.
///
/// `get_range` returns the whole requested range or fails the request;
/// there is no partial-body reassembly and no retrying at this layer.
#[async_trait]
pub trait Net: Send + Sync {
    /// Get all bytes from a URL
    async fn get_bytes(&self, url: Url, headers: Option<Headers>) -> Result<Bytes, NetError>;

    /// Get a range of bytes from a URL
    async fn get_range(
        &self,
        url: Url,
        range: RangeSpec,
        headers: Option<Headers>,
    ) -> Result<Bytes, NetError>;

    /// Fetch response headers for a URL without the body
    async fn head(&self, url: Url, headers: Option<Headers>) -> Result<Headers, NetError>;
}
