use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialize error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    /// Timeout, connection failure or non-2xx status.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The downloaded archive is corrupt.
    #[error("Integrity error: {0}")]
    Integrity(String),

    /// The archive or install source does not have the expected layout.
    #[error("Structural error: {0}")]
    Structural(String),

    /// Copy, move or permission failure while installing.
    #[error("Filesystem error: {0}")]
    Filesystem(String),

    /// Failure outside the per-package scope of a batch.
    #[error("Critical error: {0}")]
    Critical(String),

    #[error("No download found for package: {0}\n\n\
             Hint: every API tier, page pattern and version probe came back empty.\n\
             Check that the URL opens a package page in your browser:\n\
             https://thunderstore.io/c/<community>/p/<author>/<name>/")]
    PackageNotFound(String),

    #[error("Not a package URL: {0}\n\n\
             Hint: package URLs look like\n\
             https://thunderstore.io/c/webfishing/p/TeamLure/LureRefreshed/")]
    InvalidUrl(String),

    #[error("Invalid preset: {0}")]
    InvalidPreset(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Transport failures only ever cost one cascade strategy or one package.
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Transport(_) | Error::Http(_))
    }
}
