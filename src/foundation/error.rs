/// Convenience alias for results carrying [`PlatenError`].
pub type PlatenResult<T> = Result<T, PlatenError>;

/// Error taxonomy for the job engine and renderer.
///
/// The variants mirror how callers are expected to react:
/// - [`PlatenError::InvalidRequest`], [`PlatenError::NotFound`] and
///   [`PlatenError::Forbidden`] are caller mistakes; retrying cannot help.
/// - [`PlatenError::NotReady`], [`PlatenError::Expired`] and
///   [`PlatenError::InvalidState`] are lifecycle errors; poll again or accept
///   the loss.
/// - [`PlatenError::TransientIo`] is a source or artifact read/write failure;
///   the whole job is safe to retry once.
/// - [`PlatenError::UnsupportedKind`] signals a programming or configuration
///   error.
#[derive(thiserror::Error, Debug)]
pub enum PlatenError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("not ready: {0}")]
    NotReady(String),

    #[error("expired: {0}")]
    Expired(String),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("transient io error: {0}")]
    TransientIo(String),

    #[error("unsupported kind: {0}")]
    UnsupportedKind(String),

    #[error("render error: {0}")]
    Render(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PlatenError {
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn not_ready(msg: impl Into<String>) -> Self {
        Self::NotReady(msg.into())
    }

    pub fn expired(msg: impl Into<String>) -> Self {
        Self::Expired(msg.into())
    }

    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    pub fn transient_io(msg: impl Into<String>) -> Self {
        Self::TransientIo(msg.into())
    }

    pub fn unsupported_kind(msg: impl Into<String>) -> Self {
        Self::UnsupportedKind(msg.into())
    }

    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render(msg.into())
    }

    /// Whether retrying the whole job once is reasonable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::TransientIo(_))
    }

    /// Stable machine-readable tag for the variant, recorded on failed jobs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) => "invalid_request",
            Self::NotFound(_) => "not_found",
            Self::Forbidden(_) => "forbidden",
            Self::NotReady(_) => "not_ready",
            Self::Expired(_) => "expired",
            Self::InvalidState(_) => "invalid_state",
            Self::TransientIo(_) => "transient_io",
            Self::UnsupportedKind(_) => "unsupported_kind",
            Self::Render(_) => "render",
            Self::Other(_) => "other",
        }
    }
}
