use std::path::PathBuf;

/// Errors raised by dependency resolution and the install pipeline.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A declared dependency does not exist in the registry.
    #[error("dependency not found: {id}")]
    DependencyNotFound { id: String },

    /// A dependency exists but its version does not satisfy the declared range.
    #[error("version mismatch for '{id}': required {required}, found {found}")]
    VersionMismatch {
        id: String,
        required: String,
        found: String,
    },

    /// The requested package does not exist in the registry.
    #[error("package not found: {id}")]
    PackageNotFound { id: String },

    /// The id cannot be used as a single directory name.
    #[error("invalid package id '{id}'")]
    InvalidPackageId { id: String },

    /// The registry entry has no archive to download.
    #[error("package '{id}' has no download URL")]
    MissingDownloadUrl { id: String },

    /// All download attempts failed.
    #[error("download of {url} failed: {reason}")]
    DownloadFailed { url: String, reason: String },

    /// A download attempt exceeded its time budget.
    #[error("Download timeout after {timeout_ms}ms ({url})")]
    DownloadTimeout { url: String, timeout_ms: u64 },

    /// Archive digest differs from the registry's checksum.
    #[error("checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    /// Archive could not be decoded or written out.
    #[error("failed to extract {path}: {reason}")]
    ExtractionFailed { path: PathBuf, reason: String },

    /// Archive extension is neither tar.gz/tgz nor zip.
    #[error("unsupported archive format: {path}")]
    UnsupportedArchiveFormat { path: PathBuf },

    /// The package is not present in the installed manifest.
    #[error("package '{id}' is not installed")]
    NotInstalled { id: String },

    /// Other installed packages still depend on the package being removed.
    #[error("cannot remove '{id}': required by {}", dependents.join(", "))]
    HasDependents { id: String, dependents: Vec<String> },

    /// Registry transport or decoding failure.
    #[error("registry error: {message}")]
    Registry { message: String },

    /// Failure while resolving or installing one dependency.
    #[error("dependency '{id}' failed: {source}")]
    Dependency {
        id: String,
        #[source]
        source: Box<Error>,
    },

    /// Install failure reported after rollback.
    #[error("failed to install '{id}' after {elapsed_ms}ms: {source}")]
    InstallFailed {
        id: String,
        elapsed_ms: u64,
        #[source]
        source: Box<Error>,
    },

    #[error(transparent)]
    Fs(#[from] market_fs::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Wrap an error with the id of the dependency it came from.
    pub fn in_dependency(id: impl Into<String>, source: Error) -> Self {
        Self::Dependency {
            id: id.into(),
            source: Box::new(source),
        }
    }

    /// Follow `Dependency` and `InstallFailed` wrappers to the innermost error.
    pub fn root_cause(&self) -> &Error {
        match self {
            Self::Dependency { source, .. } | Self::InstallFailed { source, .. } => {
                source.root_cause()
            }
            other => other,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
