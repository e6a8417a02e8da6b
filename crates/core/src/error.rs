// crates/core/src/error.rs
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while turning user-supplied cookies into a file the
/// external tool can read.
#[derive(Debug, Error)]
pub enum CookieError {
    #[error("malformed cookie JSON: {0}")]
    MalformedJson(#[from] serde_json::Error),

    #[error("IO error writing cookie file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors raised while parsing the metadata dump of the external tool.
#[derive(Debug, Error)]
pub enum MediaInfoError {
    #[error("malformed metadata JSON: {0}")]
    MalformedJson(#[from] serde_json::Error),
}

/// Errors raised while validating a download request before any work starts.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RequestError {
    #[error("url is required")]
    MissingUrl,

    #[error("invalid url {0:?}")]
    InvalidUrl(String),

    #[error("invalid quality {0:?} for {1}")]
    InvalidQuality(String, &'static str),

    #[error("invalid subtitle language {0:?}")]
    InvalidSubtitleLanguage(String),
}

impl CookieError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
