//! Generation parameters for a file tree.
//!
//! A [`TreeConfig`] is assembled in layers: built-in defaults, then
//! `TREE_FORGE_*` environment variables, then explicit CLI arguments. It must
//! go through [`TreeConfig::prepare`] before it is handed to the generator.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::ConfigError;
use crate::report::ReportFormat;

/// Nominal size of a small file (100 KiB).
pub const SIZE_SMALL: u64 = 1024 * 100;
/// Nominal size of a medium file (100 MiB).
pub const SIZE_MEDIUM: u64 = SIZE_SMALL * 1024;
/// Nominal size of a large file (100 GiB, sparse on disk).
pub const SIZE_LARGE: u64 = SIZE_MEDIUM * 1024;

/// Lowest accepted base timestamp (1975-01-01). File times are drawn up to
/// five years before it.
pub const MIN_DEFAULT_TIME: i64 = 157_766_400;

/// Highest accepted base timestamp (9999-12-30 UTC). Report times keep a
/// four-digit year in every time zone.
pub const MAX_DEFAULT_TIME: i64 = 253_402_128_000;

/// Trees at least this deep use two-character names.
pub const DEEP_TREE_DEPTH: usize = 50;

/// Default number of concurrent filesystem jobs.
pub const DEFAULT_WORKERS: usize = 10;

/// Size class of generated files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SizeClass {
    Small,
    Medium,
    Large,
}

impl SizeClass {
    /// Nominal size in bytes; actual sizes vary by +/-30% around it.
    pub fn nominal_size(self) -> u64 {
        match self {
            SizeClass::Small => SIZE_SMALL,
            SizeClass::Medium => SIZE_MEDIUM,
            SizeClass::Large => SIZE_LARGE,
        }
    }
}

impl FromStr for SizeClass {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "small" => Ok(SizeClass::Small),
            "medium" => Ok(SizeClass::Medium),
            "large" => Ok(SizeClass::Large),
            other => Err(ConfigError::UnknownSizeClass(other.to_string())),
        }
    }
}

/// How many directories and files each directory receives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum CountMode {
    /// Exactly `dirs` sub-directories and `files` files per directory.
    Fixed { dirs: usize, files: usize },
    /// Counts drawn uniformly (inclusive) per directory.
    Random {
        min_dirs: usize,
        max_dirs: usize,
        min_files: usize,
        max_files: usize,
    },
}

impl CountMode {
    /// Builds random-mode bounds, naming every missing value.
    pub fn random_from_bounds(
        min_dirs: Option<usize>,
        max_dirs: Option<usize>,
        min_files: Option<usize>,
        max_files: Option<usize>,
    ) -> Result<Self, ConfigError> {
        match (min_dirs, max_dirs, min_files, max_files) {
            (Some(min_dirs), Some(max_dirs), Some(min_files), Some(max_files)) => {
                Ok(CountMode::Random {
                    min_dirs,
                    max_dirs,
                    min_files,
                    max_files,
                })
            }
            _ => {
                let missing: Vec<&str> = [
                    ("min_dirs_count", min_dirs),
                    ("max_dirs_count", max_dirs),
                    ("min_files_count", min_files),
                    ("max_files_count", max_files),
                ]
                .into_iter()
                .filter(|(_, value)| value.is_none())
                .map(|(name, _)| name)
                .collect();
                Err(ConfigError::MissingRandomBounds {
                    missing: missing.join(", "),
                })
            }
        }
    }

    pub fn is_random(&self) -> bool {
        matches!(self, CountMode::Random { .. })
    }
}

/// Validated parameters for one generated tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeConfig {
    /// Directory the tree root is created in.
    pub dest: PathBuf,
    /// Name of the tree root directory.
    pub tree_name: String,
    /// Number of directory levels below the root.
    pub tree_depth: usize,
    pub counts: CountMode,
    pub hard_links: usize,
    pub symlinks: usize,
    /// Candidate owners; every name must exist in the user database.
    pub owners: Vec<String>,
    pub file_sizes: Vec<SizeClass>,
    /// Directory for the report, `dest` when unset.
    pub report_path: Option<PathBuf>,
    pub report_format: ReportFormat,
    /// Base epoch second all file timestamps are drawn backwards from.
    pub default_time: Option<i64>,
    pub seed: Option<u64>,
    /// Concurrent filesystem jobs.
    #[serde(default = "default_workers")]
    pub workers: usize,
}

fn default_workers() -> usize {
    DEFAULT_WORKERS
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            dest: PathBuf::from("."),
            tree_name: "Test_tree".to_string(),
            tree_depth: 1,
            counts: CountMode::Fixed { dirs: 1, files: 1 },
            hard_links: 0,
            symlinks: 0,
            owners: vec!["root".to_string(), "admin".to_string()],
            file_sizes: vec![SizeClass::Large, SizeClass::Medium, SizeClass::Small],
            report_path: None,
            report_format: ReportFormat::Json,
            default_time: None,
            seed: None,
            workers: DEFAULT_WORKERS,
        }
    }
}

impl TreeConfig {
    /// Creates a configuration from defaults overridden by the environment.
    ///
    /// # Environment Variables
    ///
    /// - `TREE_FORGE_WORKERS`: concurrent filesystem jobs (default: 10)
    /// - `TREE_FORGE_OWNERS`: comma-separated owner names (default: root,admin)
    /// - `TREE_FORGE_FILE_SIZES`: comma-separated size classes (default: large,medium,small)
    /// - `TREE_FORGE_REPORT_FORMAT`: json, yaml or text (default: json)
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable has an invalid value.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Same as [`TreeConfig::from_env`] with variables read through `lookup`.
    pub fn from_vars<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(val) = lookup("TREE_FORGE_WORKERS") {
            config.workers = parse_env_value(&val, "TREE_FORGE_WORKERS")?;
        }

        if let Some(val) = lookup("TREE_FORGE_OWNERS") {
            config.owners = split_list(&val);
        }

        if let Some(val) = lookup("TREE_FORGE_FILE_SIZES") {
            config.file_sizes = split_list(&val)
                .iter()
                .map(|s| s.parse())
                .collect::<Result<_, _>>()?;
        }

        if let Some(val) = lookup("TREE_FORGE_REPORT_FORMAT") {
            config.report_format =
                val.parse()
                    .map_err(|message: String| ConfigError::InvalidValue {
                        key: "TREE_FORGE_REPORT_FORMAT".to_string(),
                        message,
                    })?;
        }

        Ok(config)
    }

    /// Normalizes and validates the configuration.
    pub fn prepare(mut self) -> Result<Self, ConfigError> {
        self.normalize()?;
        self.validate()?;
        Ok(self)
    }

    /// Strips leading slashes from the tree name, makes paths absolute and
    /// defaults the report path to `dest`.
    pub fn normalize(&mut self) -> Result<(), ConfigError> {
        if self.tree_name.starts_with('/') {
            self.tree_name = self.tree_name.trim_start_matches('/').to_string();
            warn!(
                "The value of the tree_name parameter has been changed to {}",
                self.tree_name
            );
        }
        if self.tree_name.is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "tree_name".to_string(),
                message: "must not be empty".to_string(),
            });
        }

        self.dest = absolutize(&self.dest)?;
        let report_path = match self.report_path.take() {
            Some(path) => absolutize(&path)?,
            None => self.dest.clone(),
        };
        self.report_path = Some(report_path);
        Ok(())
    }

    /// Checks value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tree_depth < 1 {
            return Err(ConfigError::InvalidDepth(self.tree_depth));
        }

        if self.owners.is_empty() {
            return Err(ConfigError::NoOwners {
                suggestion: crate::platform::current_username()
                    .unwrap_or_else(|| "<unknown>".to_string()),
            });
        }

        if self.file_sizes.is_empty() {
            return Err(ConfigError::NoFileSizes);
        }

        match self.counts {
            CountMode::Fixed { dirs, .. } => {
                if dirs < 1 {
                    return Err(ConfigError::InvalidDirsCount(dirs));
                }
            }
            CountMode::Random {
                min_dirs,
                max_dirs,
                min_files,
                max_files,
            } => {
                if max_files < min_files {
                    return Err(ConfigError::InvalidRange {
                        what: "files",
                        min: min_files,
                        max: max_files,
                    });
                }
                if max_dirs < min_dirs {
                    return Err(ConfigError::InvalidRange {
                        what: "dirs",
                        min: min_dirs,
                        max: max_dirs,
                    });
                }
            }
        }

        if self.seed == Some(0) {
            return Err(ConfigError::InvalidSeed);
        }

        if let Some(value) = self.default_time {
            if value < MIN_DEFAULT_TIME {
                return Err(ConfigError::DefaultTimeTooEarly {
                    value,
                    min: MIN_DEFAULT_TIME,
                });
            }
            if value > MAX_DEFAULT_TIME {
                return Err(ConfigError::DefaultTimeTooLate {
                    value,
                    max: MAX_DEFAULT_TIME,
                });
            }
        }

        if self.workers < 1 {
            return Err(ConfigError::InvalidWorkers);
        }

        Ok(())
    }

    /// Length of generated names; deep trees get shorter names to keep
    /// paths manageable.
    pub fn name_length(&self) -> usize {
        if self.tree_depth >= DEEP_TREE_DEPTH {
            2
        } else {
            4
        }
    }

    /// Full path of the tree root.
    pub fn full_path(&self) -> PathBuf {
        self.dest.join(&self.tree_name)
    }

    /// Full path of the report file.
    pub fn report_file(&self) -> PathBuf {
        self.report_path
            .as_deref()
            .unwrap_or(&self.dest)
            .join(format!(
                "{}_report.{}",
                self.tree_name,
                self.report_format.extension()
            ))
    }

    /// Number of directories a fixed-mode tree will contain, root included.
    ///
    /// Returns `None` in random mode. Saturates at `u64::MAX`.
    pub fn expected_dirs_count(&self) -> Option<u64> {
        let CountMode::Fixed { dirs, .. } = self.counts else {
            return None;
        };
        let dirs = dirs as u64;
        let levels = self.tree_depth as u64 + 1;
        if dirs > 1 {
            let power = u32::try_from(levels)
                .ok()
                .and_then(|exp| dirs.checked_pow(exp));
            Some(match power {
                Some(power) => (power - 1) / (dirs - 1),
                None => u64::MAX,
            })
        } else {
            Some(dirs.saturating_mul(levels))
        }
    }

    /// Number of files, hard links and symlinks a fixed-mode tree will contain.
    pub fn expected_files_count(&self) -> Option<u64> {
        let CountMode::Fixed { files, .. } = self.counts else {
            return None;
        };
        let dirs = self.expected_dirs_count()?;
        Some(
            dirs.saturating_mul(files as u64)
                .saturating_add(self.hard_links as u64)
                .saturating_add(self.symlinks as u64),
        )
    }
}

fn absolutize(path: &Path) -> Result<PathBuf, ConfigError> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split([',', ' '])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parses an environment variable value into the target type.
fn parse_env_value<T: FromStr>(value: &str, key: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    value.parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        key: key.to_string(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn fixed(depth: usize, dirs: usize, files: usize) -> TreeConfig {
        TreeConfig {
            tree_depth: depth,
            counts: CountMode::Fixed { dirs, files },
            ..TreeConfig::default()
        }
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(TreeConfig::default().validate().is_ok());
    }

    #[test]
    fn test_zero_depth_rejected() {
        let err = fixed(0, 1, 1).validate().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidDepth(0)));
    }

    #[test]
    fn test_empty_owners_rejected() {
        let config = TreeConfig {
            owners: vec![],
            ..TreeConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::NoOwners { .. })
        ));
    }

    #[test]
    fn test_fixed_mode_requires_dirs() {
        assert!(matches!(
            fixed(2, 0, 3).validate(),
            Err(ConfigError::InvalidDirsCount(0))
        ));
    }

    #[test]
    fn test_random_mode_range_checks() {
        let config = TreeConfig {
            counts: CountMode::Random {
                min_dirs: 1,
                max_dirs: 2,
                min_files: 5,
                max_files: 4,
            },
            ..TreeConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidRange { what: "files", .. })
        ));

        let config = TreeConfig {
            counts: CountMode::Random {
                min_dirs: 3,
                max_dirs: 2,
                min_files: 0,
                max_files: 4,
            },
            ..TreeConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidRange { what: "dirs", .. })
        ));
    }

    #[test]
    fn test_random_bounds_report_missing_values() {
        let err = CountMode::random_from_bounds(Some(1), None, Some(2), None).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("max_dirs_count"));
        assert!(message.contains("max_files_count"));
        assert!(!message.contains("min_dirs_count"));
    }

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_parse_env_value() {
        assert_eq!(
            parse_env_value::<usize>("16", "TREE_FORGE_WORKERS").unwrap(),
            16
        );
        match parse_env_value::<usize>("x", "TREE_FORGE_WORKERS") {
            Err(ConfigError::InvalidValue { key, .. }) => assert_eq!(key, "TREE_FORGE_WORKERS"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_env_layering() {
        let config = TreeConfig::from_vars(vars(&[
            ("TREE_FORGE_WORKERS", "3"),
            ("TREE_FORGE_OWNERS", "alice, bob"),
            ("TREE_FORGE_FILE_SIZES", "small,MEDIUM"),
            ("TREE_FORGE_REPORT_FORMAT", "yml"),
        ]))
        .expect("valid variables");
        assert_eq!(config.workers, 3);
        assert_eq!(config.owners, vec!["alice", "bob"]);
        assert_eq!(config.file_sizes, vec![SizeClass::Small, SizeClass::Medium]);
        assert_eq!(config.report_format, ReportFormat::Yaml);

        let config = TreeConfig::from_vars(vars(&[])).expect("no variables");
        assert_eq!(config, TreeConfig::default());
    }

    #[test]
    fn test_invalid_env_values_are_config_errors() {
        let err = TreeConfig::from_vars(vars(&[("TREE_FORGE_WORKERS", "many")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));

        let err = TreeConfig::from_vars(vars(&[("TREE_FORGE_FILE_SIZES", "small,huge")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownSizeClass(ref name) if name == "huge"));

        let err =
            TreeConfig::from_vars(vars(&[("TREE_FORGE_REPORT_FORMAT", "xml")])).unwrap_err();
        match err {
            ConfigError::InvalidValue { key, message } => {
                assert_eq!(key, "TREE_FORGE_REPORT_FORMAT");
                assert!(message.contains("xml"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_seed_and_default_time_bounds() {
        let config = TreeConfig {
            seed: Some(0),
            ..TreeConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::InvalidSeed)));

        let config = TreeConfig {
            default_time: Some(MIN_DEFAULT_TIME - 1),
            ..TreeConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::DefaultTimeTooEarly { .. })
        ));

        let config = TreeConfig {
            default_time: Some(10_000_000_000_000),
            ..TreeConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::DefaultTimeTooLate { .. })
        ));

        let config = TreeConfig {
            default_time: Some(MAX_DEFAULT_TIME),
            ..TreeConfig::default()
        };
        assert!(config.validate().is_ok());

        let config = TreeConfig {
            default_time: Some(1_662_707_899),
            seed: Some(7),
            ..TreeConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_normalize_strips_slashes_and_defaults_report_path() {
        let mut config = TreeConfig {
            dest: PathBuf::from("/tmp/forge"),
            tree_name: "//nested".to_string(),
            ..TreeConfig::default()
        };
        config.normalize().expect("normalize should succeed");
        assert_eq!(config.tree_name, "nested");
        assert_eq!(config.report_path, Some(PathBuf::from("/tmp/forge")));
        assert_eq!(
            config.report_file(),
            PathBuf::from("/tmp/forge/nested_report.json")
        );
    }

    #[test]
    fn test_normalize_makes_dest_absolute() {
        let mut config = TreeConfig {
            dest: PathBuf::from("relative/dir"),
            ..TreeConfig::default()
        };
        config.normalize().expect("normalize should succeed");
        assert!(config.dest.is_absolute());
        assert!(config.dest.ends_with("relative/dir"));
    }

    #[test]
    fn test_expected_counts() {
        // 1 + 3 + 9 directories, 2 files each, plus links
        let mut config = fixed(2, 3, 2);
        config.hard_links = 4;
        config.symlinks = 1;
        assert_eq!(config.expected_dirs_count(), Some(13));
        assert_eq!(config.expected_files_count(), Some(13 * 2 + 5));

        let config = fixed(5, 1, 10);
        assert_eq!(config.expected_dirs_count(), Some(6));
        assert_eq!(config.expected_files_count(), Some(60));

        let config = fixed(200, 10, 1);
        assert_eq!(config.expected_dirs_count(), Some(u64::MAX));
    }

    #[test]
    fn test_expected_counts_unknown_in_random_mode() {
        let config = TreeConfig {
            counts: CountMode::Random {
                min_dirs: 1,
                max_dirs: 1,
                min_files: 1,
                max_files: 1,
            },
            ..TreeConfig::default()
        };
        assert_eq!(config.expected_dirs_count(), None);
        assert_eq!(config.expected_files_count(), None);
    }

    #[test]
    fn test_name_length_shrinks_for_deep_trees() {
        assert_eq!(fixed(49, 1, 0).name_length(), 4);
        assert_eq!(fixed(50, 1, 0).name_length(), 2);
    }

    #[test]
    fn test_size_class_parsing() {
        assert_eq!("Large".parse::<SizeClass>().unwrap(), SizeClass::Large);
        assert_eq!(SizeClass::Medium.nominal_size(), 100 * 1024 * 1024);
        assert!("huge".parse::<SizeClass>().is_err());
    }

    #[test]
    fn test_split_list() {
        assert_eq!(split_list("root, admin  ,user"), vec!["root", "admin", "user"]);
        assert_eq!(split_list("root admin"), vec!["root", "admin"]);
    }
}
