//! Error types for tree-forge operations.
//!
//! Defines error types for the major subsystems:
//! - Parameter validation
//! - Tree planning and on-disk generation
//! - Report persistence and verification

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while validating generation parameters.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("The tree_depth must be greater than 0, has been set: {0}")]
    InvalidDepth(usize),

    #[error("Owners have not been set, you can use the current user: {suggestion}")]
    NoOwners { suggestion: String },

    #[error("At least one file size class must be set")]
    NoFileSizes,

    #[error("Unknown file size class '{0}', expected one of: large, medium, small")]
    UnknownSizeClass(String),

    #[error("The dirs_count must be greater than 0, has been set: {0}")]
    InvalidDirsCount(usize),

    #[error("With --random the following values must be set: {missing}")]
    MissingRandomBounds { missing: String },

    #[error("The min_{what}_count ({min}) must not be greater than max_{what}_count ({max})")]
    InvalidRange {
        what: &'static str,
        min: usize,
        max: usize,
    },

    #[error("--seed must be more than 0")]
    InvalidSeed,

    #[error("--default_time must not be less than {min} (1.1.1975), has been set: {value}")]
    DefaultTimeTooEarly { value: i64, min: i64 },

    #[error("--default_time must not be greater than {max} (30.12.9999), has been set: {value}")]
    DefaultTimeTooLate { value: i64, max: i64 },

    #[error("The worker count must be greater than 0")]
    InvalidWorkers,

    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that can occur while planning or materializing a tree.
#[derive(Debug, Error)]
pub enum GeneratorError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("User '{0}' does not exist on this system")]
    UnknownOwner(String),

    #[error("Cannot create {count} hard links: the tree contains no files")]
    NoHardLinkTargets { count: usize },

    #[error("Failed to create '{path}' (owner {owner}): {source}")]
    Create {
        path: PathBuf,
        owner: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to link '{link}' to '{target}': {source}")]
    Link {
        link: PathBuf,
        target: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Generation worker failed: {0}")]
    Worker(String),

    #[error("Report error: {0}")]
    Report(#[from] ReportError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that can occur while saving, loading or checking reports.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Report '{0}' not found")]
    NotFound(PathBuf),

    #[error("Text reports cannot be loaded back: {0}")]
    NotLoadable(PathBuf),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("YAML parse error: {0}")]
    YamlScan(#[from] yaml_rust2::ScanError),

    #[error("Malformed YAML report: {0}")]
    InvalidYaml(String),

    #[error("Walk error: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
