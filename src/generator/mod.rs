//! Tree generation pipeline for tree-forge.
//!
//! This module turns a validated [`TreeConfig`] into a tree on disk:
//!
//! 1. **Sampling** - Every random decision comes from one seeded stream
//! 2. **Planning** - The complete tree is built in memory
//! 3. **Materialization** - The plan is written concurrently, stage by stage
//! 4. **Reporting** - The plan, seed and parameters are saved for reproduction
//!
//! # Example
//!
//! ```ignore
//! use tree_forge::config::TreeConfig;
//! use tree_forge::generator::TreeGenerator;
//!
//! let config = TreeConfig { tree_depth: 3, ..TreeConfig::default() };
//! let generator = TreeGenerator::new(config)?;
//! let outcome = generator.generate("tree-forge generate --tree-depth 3").await?;
//! println!("{}", outcome.summary());
//! ```

pub mod materializer;
pub mod planner;
pub mod sampler;
pub mod summary;

pub use materializer::Materializer;
pub use planner::TreePlanner;
pub use sampler::TreeSampler;
pub use summary::GenerationSummary;

use std::path::PathBuf;
use std::time::{Duration, Instant};

use tracing::info;

use crate::config::TreeConfig;
use crate::error::GeneratorError;
use crate::node::Directory;
use crate::platform;
use crate::report::TreeReport;

/// Result type alias for generator operations.
pub type Result<T> = std::result::Result<T, GeneratorError>;

/// Everything a finished generation produced.
#[derive(Debug, Clone)]
pub struct GenerationOutcome {
    pub root: Directory,
    pub seed: u64,
    pub default_time: i64,
    pub elapsed: Duration,
    pub report_path: PathBuf,
    pub config: TreeConfig,
}

impl GenerationOutcome {
    /// Closing log block for this run.
    pub fn summary(&self) -> GenerationSummary<'_> {
        GenerationSummary::new(self)
    }
}

/// High-level generator combining planning, materialization and reporting.
pub struct TreeGenerator {
    config: TreeConfig,
    seed: u64,
    default_time: i64,
}

impl TreeGenerator {
    /// Prepares the configuration and fixes the seed and base timestamp.
    ///
    /// A missing seed is drawn from the clock and a missing base timestamp
    /// is the current time, so the run stays reproducible from its report.
    pub fn new(config: TreeConfig) -> Result<Self> {
        let config = config.prepare()?;
        let now = chrono::Utc::now();
        let seed = config
            .seed
            .unwrap_or_else(|| (now.timestamp_micros().unsigned_abs()).max(1));
        let default_time = config.default_time.unwrap_or_else(|| now.timestamp());
        Ok(Self {
            config,
            seed,
            default_time,
        })
    }

    pub fn config(&self) -> &TreeConfig {
        &self.config
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn default_time(&self) -> i64 {
        self.default_time
    }

    /// Builds the tree in memory without touching the filesystem.
    pub fn plan(&self) -> Result<Directory> {
        TreePlanner::new(&self.config, self.seed, self.default_time).plan()
    }

    /// Plans the tree and writes only the report.
    pub fn dry_run(&self, command_line: &str) -> Result<GenerationOutcome> {
        let started = Instant::now();
        let root = self.plan()?;
        let report_path = self.save_report(command_line, &root)?;
        Ok(self.outcome(root, started.elapsed(), report_path))
    }

    /// Plans the tree, creates it on disk and saves the report.
    ///
    /// # Errors
    ///
    /// Fails before any filesystem change when an owner does not exist or the
    /// plan is impossible; fails with the path and owner in play when a
    /// filesystem operation is rejected.
    pub async fn generate(&self, command_line: &str) -> Result<GenerationOutcome> {
        let started = Instant::now();
        let owners = platform::resolve_owners(&self.config.owners)?;
        let mut root = self.plan()?;
        info!(
            "Tree {} planned with seed {}, creating it",
            root.full_path().display(),
            self.seed
        );

        Materializer::new(self.config.workers, owners)
            .materialize(&mut root)
            .await?;

        let report_path = self.save_report(command_line, &root)?;
        Ok(self.outcome(root, started.elapsed(), report_path))
    }

    fn save_report(&self, command_line: &str, root: &Directory) -> Result<PathBuf> {
        let report = TreeReport {
            command_line: command_line.to_string(),
            default_time: self.default_time,
            seed: self.seed,
            parameters: self.config.clone(),
            tree_structure: root.clone(),
        };
        let path = self.config.report_file();
        report.save(&path, self.config.report_format)?;
        info!("Report has been saved to {}", path.display());
        Ok(path)
    }

    fn outcome(
        &self,
        root: Directory,
        elapsed: Duration,
        report_path: PathBuf,
    ) -> GenerationOutcome {
        GenerationOutcome {
            root,
            seed: self.seed,
            default_time: self.default_time,
            elapsed,
            report_path,
            config: self.config.clone(),
        }
    }
}
