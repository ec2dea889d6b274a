use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomError {
    #[error("invalid selector '{0}'")]
    InvalidSelector(String),
    #[error("document has no <{0}> element")]
    MissingElement(&'static str),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read engine config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

#[derive(Debug, Error)]
pub enum ContentError {
    #[error("failed to read content file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse JSON content: {0}")]
    Json(#[from] serde_json::Error),
    #[error("failed to parse YAML content: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("unsupported content format '{0}'")]
    UnsupportedFormat(String),
    #[error("content source reported failure")]
    Rejected,
}

#[derive(Debug, Error)]
pub enum ViewerError {
    #[error(transparent)]
    Content(#[from] ContentError),
    #[error(transparent)]
    Dom(#[from] DomError),
    #[error("content source returned no descriptors")]
    NoContent,
}
