use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum RefseqError {
    #[error("invalid branch name: {0}")]
    InvalidBranch(String),

    #[error("invalid assembly level: {0}")]
    InvalidLevel(String),

    #[error("invalid taxonomy id: {0}")]
    InvalidTaxId(String),

    #[error("number of processes must be at least 1, got {0}")]
    #[diagnostic(help("pass a positive integer to -p/--processes"))]
    InvalidConcurrency(usize),

    #[error("assembly summary not found for branch '{branch}' at {path}")]
    #[diagnostic(help("run without --offline to download it, or check --genomes-dir"))]
    ManifestMissing { branch: String, path: PathBuf },

    #[error("failed to read manifest {path}: {message}")]
    ManifestRead { path: PathBuf, message: String },

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("failed to read taxonomy id file {path}: {message}")]
    TaxIdFileRead { path: PathBuf, message: String },

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("required tool not found: {0}")]
    MissingTool(String),

    #[error("remote source not found: {0}")]
    SourceNotFound(String),

    #[error("transfer failed: {0}")]
    Transfer(String),

    #[error("remote returned status {status}: {message}")]
    TransferStatus { status: u16, message: String },

    #[error("malformed sequence file {path}: {message}")]
    SequenceFormat { path: PathBuf, message: String },

    #[error("worker pool could not be started: {0}")]
    Pool(String),
}
