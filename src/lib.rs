//! tree-forge: reproducible synthetic file trees for filesystem testing.
//!
//! This library plans directory hierarchies with files, hard links and
//! symlinks from a seed, creates them on disk with the requested owners and
//! timestamps, and records everything in a report that can be used to
//! reproduce or verify the tree.

pub mod cleanup;
pub mod cli;
pub mod config;
pub mod error;
pub mod generator;
pub mod node;
pub mod platform;
pub mod report;
pub mod verify;

// Re-export commonly used types
pub use config::{CountMode, SizeClass, TreeConfig};
pub use error::{ConfigError, GeneratorError, ReportError};
pub use generator::{GenerationOutcome, TreeGenerator};
pub use node::Directory;
pub use report::{ReportFormat, TreeReport};
