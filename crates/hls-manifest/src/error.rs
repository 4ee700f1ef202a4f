#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("invalid manifest URL `{input}`: {reason}")]
    InvalidUrl { input: String, reason: String },

    #[error("failed to fetch manifest from {url}: {reason}")]
    Fetch { url: String, reason: String },

    #[error("manifest request to {url} returned HTTP {status}")]
    HttpStatus { url: String, status: u16 },

    #[error("failed to parse manifest from {url}: {reason}")]
    Parse { url: String, reason: String },

    #[error("failed to build HTTP client: {reason}")]
    Client { reason: String },
}

impl ManifestError {
    pub fn invalid_url(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidUrl {
            input: input.into(),
            reason: reason.into(),
        }
    }

    pub fn fetch(url: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::Fetch {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    pub fn parse(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Parse {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Transport failures and non-success statuses both count as fetch errors.
    pub fn is_fetch(&self) -> bool {
        matches!(self, Self::Fetch { .. } | Self::HttpStatus { .. })
    }

    pub fn is_parse(&self) -> bool {
        matches!(self, Self::Parse { .. })
    }

    /// Whether retrying the same request might succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Fetch { .. } => true,
            Self::HttpStatus { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}
