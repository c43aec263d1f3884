//! Error taxonomy shared by the session, the decoder contract and the surface.

/// Failure reported by the document decoder.
///
/// Used both for document-level open failures (fatal to the session) and for
/// per-page decode failures (captured into that page's slot). Cloneable so a
/// failed slot can keep its error for display.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("corrupt document: {0}")]
    Corrupt(String),
    #[error("unsupported document feature: {0}")]
    Unsupported(String),
    #[error("invalid decoder configuration: {0}")]
    Configuration(String),
    #[error("decoder backend error: {0}")]
    Backend(String),
}

/// Contract violations on the document session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("page {page} out of range (page_count={page_count})")]
    OutOfRange { page: u32, page_count: u32 },
}
