//! CLI command definitions for tree-forge.
//!
//! This module provides the command-line interface for generating synthetic
//! file trees, reproducing them from reports, verifying them on disk and
//! removing them.

use crate::cleanup;
use crate::config::{CountMode, SizeClass, TreeConfig};
use crate::error::ConfigError;
use crate::generator::TreeGenerator;
use crate::report::{ReportFormat, TreeReport};
use crate::verify;
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, warn};

/// Synthetic file tree generator for filesystem test data.
#[derive(Parser)]
#[command(name = "tree-forge")]
#[command(about = "Generate reproducible synthetic file trees for filesystem testing")]
#[command(version)]
#[command(
    long_about = "tree-forge creates directory hierarchies with sparse files of varying sizes, owners and timestamps, plus hard links and symlinks.\n\nEvery run writes a report holding the seed and parameters, so a tree can be reproduced or verified later.\n\nExample usage:\n  tree-forge generate --dest /mnt/test --tree-depth 3 --dirs-count 4 --files-count 10 --owners root"
)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: String,
}

/// Available CLI subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Generate a new file tree.
    #[command(alias = "gen")]
    Generate(GenerateArgs),

    /// Recreate a tree from a JSON or YAML report.
    Reproduce(ReproduceArgs),

    /// Compare a tree on disk with its report.
    Verify(VerifyArgs),

    /// Remove a generated tree.
    Remove(RemoveArgs),
}

/// Arguments for `tree-forge generate`.
///
/// Unset values fall back to `TREE_FORGE_*` environment variables, then to
/// built-in defaults.
#[derive(Parser, Debug)]
pub struct GenerateArgs {
    /// Directory the tree is created in.
    #[arg(long)]
    pub dest: Option<PathBuf>,

    /// Number of directory levels below the root [default: 1].
    #[arg(long, alias = "tree_depth")]
    pub tree_depth: Option<usize>,

    /// Sub-directories per directory in fixed mode [default: 1].
    #[arg(long, alias = "dirs_count")]
    pub dirs_count: Option<usize>,

    /// Files per directory in fixed mode [default: 1].
    #[arg(long, alias = "files_count")]
    pub files_count: Option<usize>,

    /// Hard links spread over the tree [default: 0].
    #[arg(long, alias = "hard_links_count")]
    pub hard_links_count: Option<usize>,

    /// Symlinks spread over the tree [default: 0].
    #[arg(long, alias = "sym_links_count")]
    pub sym_links_count: Option<usize>,

    /// Lower bound of sub-directories per directory with --random.
    #[arg(long, alias = "min_dirs_count")]
    pub min_dirs_count: Option<usize>,

    /// Upper bound of sub-directories per directory with --random.
    #[arg(long, alias = "max_dirs_count")]
    pub max_dirs_count: Option<usize>,

    /// Lower bound of files per directory with --random.
    #[arg(long, alias = "min_files_count")]
    pub min_files_count: Option<usize>,

    /// Upper bound of files per directory with --random.
    #[arg(long, alias = "max_files_count")]
    pub max_files_count: Option<usize>,

    /// Candidate owners of generated entries [default: root admin].
    ///
    /// Given without names, the run fails and suggests the current user.
    #[arg(long, num_args = 0..)]
    pub owners: Option<Vec<String>>,

    /// Size classes of generated files [default: large medium small].
    #[arg(long, alias = "file_sizes", num_args = 1..)]
    pub file_sizes: Vec<SizeClass>,

    /// Name of the tree root directory [default: Test_tree].
    #[arg(long, alias = "tree_name")]
    pub tree_name: Option<String>,

    /// Directory for the report [default: --dest].
    #[arg(long, alias = "report_path")]
    pub report_path: Option<PathBuf>,

    /// Report encoding [default: json].
    #[arg(long, alias = "report_format", value_enum)]
    pub report_format: Option<ReportFormat>,

    /// Base epoch second file timestamps are drawn backwards from [default: now].
    #[arg(long, alias = "default_time")]
    pub default_time: Option<i64>,

    /// Draw per-directory counts from the min/max bounds.
    #[arg(long)]
    pub random: bool,

    /// Random seed [default: drawn from the clock].
    #[arg(long)]
    pub seed: Option<u64>,

    /// Concurrent filesystem jobs [default: 10].
    #[arg(long)]
    pub workers: Option<usize>,

    /// Plan the tree and write the report without creating anything.
    #[arg(long)]
    pub dry_run: bool,
}

impl GenerateArgs {
    /// Layers these arguments over the environment-derived configuration.
    pub fn into_config(self) -> Result<TreeConfig, ConfigError> {
        self.apply_to(TreeConfig::from_env()?)
    }

    fn apply_to(self, mut config: TreeConfig) -> Result<TreeConfig, ConfigError> {
        if let Some(dest) = self.dest {
            config.dest = dest;
        }
        if let Some(depth) = self.tree_depth {
            config.tree_depth = depth;
        }
        config.counts = if self.random {
            CountMode::random_from_bounds(
                self.min_dirs_count,
                self.max_dirs_count,
                self.min_files_count,
                self.max_files_count,
            )?
        } else {
            CountMode::Fixed {
                dirs: self.dirs_count.unwrap_or(1),
                files: self.files_count.unwrap_or(1),
            }
        };
        if let Some(count) = self.hard_links_count {
            config.hard_links = count;
        }
        if let Some(count) = self.sym_links_count {
            config.symlinks = count;
        }
        if let Some(owners) = self.owners {
            config.owners = owners;
        }
        if !self.file_sizes.is_empty() {
            config.file_sizes = self.file_sizes;
        }
        if let Some(name) = self.tree_name {
            config.tree_name = name;
        }
        if self.report_path.is_some() {
            config.report_path = self.report_path;
        }
        if let Some(format) = self.report_format {
            config.report_format = format;
        }
        if self.default_time.is_some() {
            config.default_time = self.default_time;
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        Ok(config)
    }
}

/// Arguments for `tree-forge reproduce`.
#[derive(Parser, Debug)]
pub struct ReproduceArgs {
    /// JSON or YAML report of the tree to recreate.
    #[arg(long)]
    pub report: PathBuf,

    /// Create the tree (and its new report) under this directory instead.
    #[arg(long)]
    pub dest: Option<PathBuf>,

    /// Concurrent filesystem jobs.
    #[arg(long)]
    pub workers: Option<usize>,
}

/// Arguments for `tree-forge verify`.
#[derive(Parser, Debug)]
pub struct VerifyArgs {
    /// JSON or YAML report of the tree to check.
    #[arg(long)]
    pub report: PathBuf,
}

/// Arguments for `tree-forge remove`.
#[derive(Parser, Debug)]
pub struct RemoveArgs {
    /// Root directory of the tree to remove.
    #[arg(long)]
    pub path: PathBuf,
}

/// Parse CLI arguments without running any command.
///
/// This allows the caller to access CLI options (like log_level) before running.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Run the CLI by parsing arguments and executing the command.
pub async fn run() -> anyhow::Result<()> {
    run_with_cli(parse_cli()).await
}

/// Run the CLI with the parsed arguments.
///
/// This is the main entry point for the tree-forge CLI.
pub async fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Generate(args) => run_generate_command(args).await,
        Commands::Reproduce(args) => run_reproduce_command(args).await,
        Commands::Verify(args) => run_verify_command(args),
        Commands::Remove(args) => run_remove_command(args),
    }
}

fn command_line() -> String {
    std::env::args().collect::<Vec<_>>().join(" ")
}

// ============================================================================
// Generate Command Implementation
// ============================================================================

async fn run_generate_command(args: GenerateArgs) -> anyhow::Result<()> {
    let dry_run = args.dry_run;
    let config = args.into_config()?;
    run_generator(TreeGenerator::new(config)?, dry_run).await
}

async fn run_generator(generator: TreeGenerator, dry_run: bool) -> anyhow::Result<()> {
    let config = generator.config();
    if let (Some(dirs), Some(files)) = (
        config.expected_dirs_count(),
        config.expected_files_count(),
    ) {
        info!("Number of directories to be created in the tree: {}", dirs);
        info!("Number of files to be created in the tree: {}", files);
    }

    let outcome = if dry_run {
        info!("Dry run: planning {} only", config.full_path().display());
        generator.dry_run(&command_line())?
    } else {
        generator.generate(&command_line()).await?
    };

    info!("{}", outcome.summary());
    info!(
        "Report on the generated file tree: {}",
        outcome.report_path.display()
    );
    Ok(())
}

// ============================================================================
// Reproduce / Verify / Remove
// ============================================================================

async fn run_reproduce_command(args: ReproduceArgs) -> anyhow::Result<()> {
    let report = TreeReport::load(&args.report)?;
    info!(
        "Reproducing {} from {} (seed {})",
        report.tree_structure.name,
        args.report.display(),
        report.seed
    );

    let mut config = report.parameters;
    config.seed = Some(report.seed);
    config.default_time = Some(report.default_time);
    if let Some(dest) = args.dest {
        config.dest = dest;
        config.report_path = None;
    }
    if let Some(workers) = args.workers {
        config.workers = workers;
    }

    let generator = TreeGenerator::new(config)?;
    if generator.config().report_file() == args.report {
        warn!(
            "Report {} will be overwritten by the reproduced run",
            args.report.display()
        );
    }
    run_generator(generator, false).await
}

fn run_verify_command(args: VerifyArgs) -> anyhow::Result<()> {
    let report = TreeReport::load(&args.report)?;
    let verification = verify::verify_tree(&report.tree_structure)?;
    println!("{}", verification);
    if !verification.is_match() {
        anyhow::bail!(
            "Tree {} does not match report {}",
            verification.root.display(),
            args.report.display()
        );
    }
    Ok(())
}

fn run_remove_command(args: RemoveArgs) -> anyhow::Result<()> {
    if !cleanup::remove_tree(&args.path)? {
        warn!("Nothing to remove at {}", args.path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn parse_generate(args: &[&str]) -> GenerateArgs {
        let cli = Cli::try_parse_from(args).expect("should parse");
        match cli.command {
            Commands::Generate(args) => args,
            _ => panic!("Expected Generate command"),
        }
    }

    #[test]
    fn test_cli_parses() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_generate_command_defaults() {
        let args = parse_generate(&["tree-forge", "generate"]);
        assert!(args.dest.is_none());
        assert!(args.owners.is_none());
        assert!(!args.random);
        assert!(!args.dry_run);

        let config = args.apply_to(TreeConfig::default()).expect("config");
        assert_eq!(config, TreeConfig::default());
    }

    #[test]
    fn test_generate_command_with_all_options() {
        let args = parse_generate(&[
            "tree-forge",
            "generate",
            "--dest",
            "/mnt/data",
            "--tree-depth",
            "3",
            "--dirs-count",
            "4",
            "--files-count",
            "10",
            "--hard-links-count",
            "2",
            "--sym-links-count",
            "5",
            "--owners",
            "alice",
            "bob",
            "--file-sizes",
            "small",
            "medium",
            "--tree-name",
            "Tree",
            "--report-path",
            "/tmp/reports",
            "--report-format",
            "yaml",
            "--default-time",
            "1662707899",
            "--seed",
            "42",
            "--workers",
            "4",
            "--dry-run",
        ]);
        assert!(args.dry_run);

        let config = args.apply_to(TreeConfig::default()).expect("config");
        assert_eq!(config.dest, PathBuf::from("/mnt/data"));
        assert_eq!(config.tree_depth, 3);
        assert_eq!(config.counts, CountMode::Fixed { dirs: 4, files: 10 });
        assert_eq!(config.hard_links, 2);
        assert_eq!(config.symlinks, 5);
        assert_eq!(config.owners, vec!["alice", "bob"]);
        assert_eq!(config.file_sizes, vec![SizeClass::Small, SizeClass::Medium]);
        assert_eq!(config.tree_name, "Tree");
        assert_eq!(config.report_path, Some(PathBuf::from("/tmp/reports")));
        assert_eq!(config.report_format, ReportFormat::Yaml);
        assert_eq!(config.default_time, Some(1_662_707_899));
        assert_eq!(config.seed, Some(42));
        assert_eq!(config.workers, 4);
    }

    #[test]
    fn test_underscore_aliases() {
        let args = parse_generate(&[
            "tree-forge",
            "gen",
            "--tree_depth",
            "2",
            "--dirs_count",
            "3",
            "--sym_links_count",
            "1",
            "--tree_name",
            "/abs_name",
        ]);
        assert_eq!(args.tree_depth, Some(2));
        assert_eq!(args.dirs_count, Some(3));
        assert_eq!(args.sym_links_count, Some(1));
        assert_eq!(args.tree_name.as_deref(), Some("/abs_name"));
    }

    #[test]
    fn test_random_mode_requires_all_bounds() {
        let args = parse_generate(&[
            "tree-forge",
            "generate",
            "--random",
            "--min-dirs-count",
            "1",
            "--max-files-count",
            "5",
        ]);
        let err = args.apply_to(TreeConfig::default()).unwrap_err();
        match err {
            ConfigError::MissingRandomBounds { missing } => {
                assert_eq!(missing, "max_dirs_count, min_files_count");
            }
            other => panic!("unexpected error: {other}"),
        }

        let args = parse_generate(&[
            "tree-forge",
            "generate",
            "--random",
            "--min-dirs-count",
            "1",
            "--max-dirs-count",
            "3",
            "--min-files-count",
            "0",
            "--max-files-count",
            "5",
        ]);
        let config = args.apply_to(TreeConfig::default()).expect("config");
        assert!(config.counts.is_random());
    }

    #[test]
    fn test_bare_owners_flag_reports_no_owners() {
        let args = parse_generate(&["tree-forge", "generate", "--owners", "--tree-depth", "2"]);
        assert_eq!(args.owners, Some(Vec::new()));
        assert_eq!(args.tree_depth, Some(2));

        let config = args.apply_to(TreeConfig::default()).expect("config");
        assert!(config.owners.is_empty());
        assert!(matches!(
            config.validate(),
            Err(ConfigError::NoOwners { .. })
        ));
    }

    #[test]
    fn test_unknown_size_class_rejected() {
        let result = Cli::try_parse_from(["tree-forge", "generate", "--file-sizes", "huge"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_other_subcommands_parse() {
        let cli = Cli::try_parse_from([
            "tree-forge",
            "reproduce",
            "--report",
            "/tmp/Test_tree_report.json",
            "--dest",
            "/tmp/copy",
        ])
        .expect("should parse");
        match cli.command {
            Commands::Reproduce(args) => {
                assert_eq!(args.report, PathBuf::from("/tmp/Test_tree_report.json"));
                assert_eq!(args.dest, Some(PathBuf::from("/tmp/copy")));
            }
            _ => panic!("Expected Reproduce command"),
        }

        let cli = Cli::try_parse_from(["tree-forge", "verify", "--report", "r.json", "-l", "debug"])
            .expect("should parse");
        assert_eq!(cli.log_level, "debug");
        assert!(matches!(cli.command, Commands::Verify(_)));

        let cli = Cli::try_parse_from(["tree-forge", "remove", "--path", "/tmp/tree"])
            .expect("should parse");
        assert!(matches!(cli.command, Commands::Remove(_)));
    }
}
