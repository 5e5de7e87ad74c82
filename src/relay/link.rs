//! Shareable → streamable link rewriting.

/// Query marker Dropbox appends to links that open the HTML preview page
pub const PREVIEW_MARKER: &str = "?dl=0";

/// Query marker that makes Dropbox serve the raw file bytes
pub const RAW_MARKER: &str = "?raw=1";

/// Provider-issued link that opens a preview page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareableLink(pub String);

/// Link that streams the file content directly
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamableLink(String);

impl ShareableLink {
    /// Rewrite into a [`StreamableLink`] with [`derive_streamable`].
    #[must_use]
    pub fn to_streamable(&self) -> StreamableLink {
        StreamableLink(derive_streamable(&self.0))
    }
}

impl StreamableLink {
    /// The link as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for StreamableLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Replace the first [`PREVIEW_MARKER`] with [`RAW_MARKER`].
///
/// Plain substring substitution: the URL is neither parsed nor validated, and
/// input without the marker is returned unchanged.
///
/// # Examples
///
/// ```
/// use dropbox_stream_bot::relay::link::derive_streamable;
///
/// assert_eq!(
///     derive_streamable("https://example.com/s/abc?dl=0"),
///     "https://example.com/s/abc?raw=1"
/// );
/// assert_eq!(derive_streamable("https://example.com/x"), "https://example.com/x");
/// ```
#[must_use]
pub fn derive_streamable(shareable_url: &str) -> String {
    shareable_url.replacen(PREVIEW_MARKER, RAW_MARKER, 1)
}
