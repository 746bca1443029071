use thiserror::Error;

/// Failures raised by a single extraction strategy. The dispatcher treats
/// these as "try the next strategy"; only a service outage surfaces to the
/// caller, and only when no other strategy produced text.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("pdf parse error: {0}")]
    PdfParse(String),

    #[error("docx read error: {0}")]
    Docx(String),

    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("page rasterization failed: {0}")]
    Rasterize(String),

    #[error("{service} unavailable: {details}")]
    ServiceUnavailable {
        service: &'static str,
        details: String,
    },

    #[error("not plain text: {0}")]
    NotText(String),
}

impl ExtractError {
    pub fn unavailable(service: &'static str, details: impl ToString) -> Self {
        Self::ServiceUnavailable {
            service,
            details: details.to_string(),
        }
    }

    /// True when the remote service behind a strategy failed, not the document.
    pub fn is_service_outage(&self) -> bool {
        matches!(self, Self::ServiceUnavailable { .. })
    }
}

#[derive(Debug, Error)]
pub enum MatchError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("no extractor produced text for {mime} input")]
    ExtractionFailed { mime: String },

    #[error("{dependency} unavailable: {details}")]
    DependencyUnavailable { dependency: String, details: String },

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl MatchError {
    pub fn unavailable(dependency: impl Into<String>, details: impl ToString) -> Self {
        Self::DependencyUnavailable {
            dependency: dependency.into(),
            details: details.to_string(),
        }
    }

    /// True when a collaborator (embedding, OCR, storage, vector index) failed
    /// rather than the request itself being wrong.
    pub fn is_dependency_failure(&self) -> bool {
        matches!(self, Self::DependencyUnavailable { .. })
    }
}

pub type Result<T, E = MatchError> = std::result::Result<T, E>;
