//! Generation reports.
//!
//! A report stores the full planned tree together with the command line,
//! seed, base timestamp and parameters of the run. JSON and YAML reports can
//! be loaded back to reproduce or verify a tree; text reports are for people.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use yaml_rust2::{Yaml, YamlLoader};

use crate::config::TreeConfig;
use crate::error::ReportError;
use crate::node::{format_timestamp, Directory};

/// On-disk report encoding.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    #[default]
    Json,
    Yaml,
    Text,
}

impl ReportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ReportFormat::Json => "json",
            ReportFormat::Yaml => "yaml",
            ReportFormat::Text => "txt",
        }
    }

    /// Guesses the format of an existing report from its extension.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml") | Some("yml") => ReportFormat::Yaml,
            Some("txt") => ReportFormat::Text,
            _ => ReportFormat::Json,
        }
    }
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportFormat::Json => write!(f, "json"),
            ReportFormat::Yaml => write!(f, "yaml"),
            ReportFormat::Text => write!(f, "text"),
        }
    }
}

impl FromStr for ReportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "json" => Ok(ReportFormat::Json),
            "yaml" | "yml" => Ok(ReportFormat::Yaml),
            "text" | "txt" => Ok(ReportFormat::Text),
            other => Err(format!(
                "unknown report format '{}', expected json, yaml or text",
                other
            )),
        }
    }
}

/// Everything needed to describe and reproduce one generated tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeReport {
    pub command_line: String,
    pub default_time: i64,
    pub seed: u64,
    pub parameters: TreeConfig,
    pub tree_structure: Directory,
}

impl TreeReport {
    /// Writes the report, creating the parent directory when needed.
    pub fn save(&self, path: &Path, format: ReportFormat) -> Result<(), ReportError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = match format {
            ReportFormat::Json => serde_json::to_string_pretty(self)?,
            ReportFormat::Yaml => serde_yaml::to_string(self)?,
            ReportFormat::Text => self.to_string(),
        };
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Reads a JSON or YAML report; the format follows the file extension.
    pub fn load(path: &Path) -> Result<Self, ReportError> {
        if !path.exists() {
            return Err(ReportError::NotFound(path.to_path_buf()));
        }
        match ReportFormat::from_path(path) {
            ReportFormat::Text => Err(ReportError::NotLoadable(path.to_path_buf())),
            ReportFormat::Yaml => Self::from_yaml(&std::fs::read_to_string(path)?),
            ReportFormat::Json => Self::from_json(&std::fs::read_to_string(path)?),
        }
    }

    /// Parses a JSON report. Each tree level nests two containers deep, so
    /// the parser runs without a recursion limit on a growable stack.
    pub fn from_json(content: &str) -> Result<Self, ReportError> {
        let mut de = serde_json::Deserializer::from_str(content);
        de.disable_recursion_limit();
        let report = Self::deserialize(serde_stacker::Deserializer::new(&mut de))?;
        de.end()?;
        Ok(report)
    }

    /// Parses a YAML report.
    ///
    /// `serde_yaml` caps nesting at 128 levels, which a tree about 62 levels
    /// deep already exceeds. The document is parsed with `yaml-rust2` instead
    /// and converted to a JSON value before deserializing.
    pub fn from_yaml(content: &str) -> Result<Self, ReportError> {
        let mut docs = YamlLoader::load_from_str(content)?;
        if docs.len() != 1 {
            return Err(ReportError::InvalidYaml(format!(
                "expected one document, found {}",
                docs.len()
            )));
        }
        let value = yaml_to_json(docs.remove(0))?;
        Self::deserialize(serde_stacker::Deserializer::new(value))
            .map_err(|e| ReportError::InvalidYaml(e.to_string()))
    }
}

fn yaml_to_json(yaml: Yaml) -> Result<serde_json::Value, ReportError> {
    use serde_json::Value;

    Ok(match yaml {
        Yaml::Null => Value::Null,
        Yaml::Boolean(b) => Value::Bool(b),
        Yaml::Integer(i) => Value::from(i),
        Yaml::Real(text) => real_to_json(&text)?,
        Yaml::String(s) => Value::String(s),
        Yaml::Array(items) => Value::Array(
            items
                .into_iter()
                .map(yaml_to_json)
                .collect::<Result<_, _>>()?,
        ),
        Yaml::Hash(hash) => {
            let mut map = serde_json::Map::with_capacity(hash.len());
            for (key, value) in hash {
                let key = match key {
                    Yaml::String(s) | Yaml::Real(s) => s,
                    Yaml::Integer(i) => i.to_string(),
                    Yaml::Boolean(b) => b.to_string(),
                    other => {
                        return Err(ReportError::InvalidYaml(format!(
                            "unsupported mapping key {:?}",
                            other
                        )))
                    }
                };
                map.insert(key, yaml_to_json(value)?);
            }
            Value::Object(map)
        }
        other => {
            return Err(ReportError::InvalidYaml(format!(
                "unsupported node {:?}",
                other
            )))
        }
    })
}

/// Integers beyond `i64` reach us as reals; `u64` seeds must stay exact.
fn real_to_json(text: &str) -> Result<serde_json::Value, ReportError> {
    if let Ok(unsigned) = text.parse::<u64>() {
        return Ok(serde_json::Value::from(unsigned));
    }
    text.parse::<f64>()
        .ok()
        .and_then(serde_json::Number::from_f64)
        .map(serde_json::Value::Number)
        .ok_or_else(|| ReportError::InvalidYaml(format!("unsupported number '{}'", text)))
}

impl fmt::Display for TreeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Command line: {}", self.command_line)?;
        writeln!(
            f,
            "Initial timestamp: {} ({})",
            self.default_time,
            format_timestamp(self.default_time)
        )?;
        writeln!(f, "Random seed: {}", self.seed)?;
        writeln!(f)?;
        write!(f, "{}", self.tree_structure)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{File, Node};
    use tempfile::TempDir;

    fn report(dest: &Path) -> TreeReport {
        let mut root = Directory::new(dest, "Test_tree", "root", vec!["root".to_string()]);
        root.add_node(Node::File(File {
            dest: root.full_path(),
            name: "F世界.Pнr".to_string(),
            owner: "root".to_string(),
            size: 1024,
            atime: 1_600_000_000,
            mtime: 1_600_000_000,
        }));
        TreeReport {
            command_line: "tree-forge generate --seed 3".to_string(),
            default_time: 1_662_707_899,
            seed: 3,
            parameters: TreeConfig {
                dest: dest.to_path_buf(),
                seed: Some(3),
                ..TreeConfig::default()
            },
            tree_structure: root,
        }
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("JSON".parse::<ReportFormat>(), Ok(ReportFormat::Json));
        assert_eq!("yml".parse::<ReportFormat>(), Ok(ReportFormat::Yaml));
        assert_eq!("text".parse::<ReportFormat>(), Ok(ReportFormat::Text));
        assert!("xml".parse::<ReportFormat>().is_err());
        assert_eq!(
            ReportFormat::from_path(Path::new("a/b_report.yaml")),
            ReportFormat::Yaml
        );
    }

    #[test]
    fn test_json_report_keeps_unicode_and_loads_back() {
        let temp_dir = TempDir::new().expect("temp dir");
        let original = report(temp_dir.path());
        let path = temp_dir.path().join("reports/Test_tree_report.json");
        original.save(&path, ReportFormat::Json).expect("save");

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("F世界.Pнr"));
        assert!(content.contains("\"total_files_count\": 1"));
        assert!(content.contains("\"metrics_by_owners\""));

        let loaded = TreeReport::load(&path).expect("load");
        assert_eq!(loaded, original);
    }

    #[test]
    fn test_yaml_report_loads_back() {
        let temp_dir = TempDir::new().expect("temp dir");
        let original = report(temp_dir.path());
        let path = temp_dir.path().join("Test_tree_report.yaml");
        original.save(&path, ReportFormat::Yaml).expect("save");
        assert_eq!(TreeReport::load(&path).expect("load"), original);
    }

    #[test]
    fn test_yaml_report_keeps_large_seed() {
        let temp_dir = TempDir::new().expect("temp dir");
        let mut original = report(temp_dir.path());
        original.seed = u64::MAX;
        original.parameters.seed = Some(u64::MAX);
        let path = temp_dir.path().join("Test_tree_report.yml");
        original.save(&path, ReportFormat::Yaml).expect("save");
        assert_eq!(TreeReport::load(&path).expect("load"), original);
    }

    #[test]
    fn test_malformed_yaml_is_rejected() {
        assert!(matches!(
            TreeReport::from_yaml("seed: 1\n---\nseed: 2\n"),
            Err(ReportError::InvalidYaml(_))
        ));
        assert!(matches!(
            TreeReport::from_yaml("seed: [1, 2"),
            Err(ReportError::YamlScan(_))
        ));
    }

    #[test]
    fn test_text_report_is_not_loadable() {
        let temp_dir = TempDir::new().expect("temp dir");
        let path = temp_dir.path().join("Test_tree_report.txt");
        report(temp_dir.path())
            .save(&path, ReportFormat::Text)
            .expect("save");
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("Command line: tree-forge generate --seed 3"));
        assert!(content.contains("Random seed: 3"));

        assert!(matches!(
            TreeReport::load(&path),
            Err(ReportError::NotLoadable(_))
        ));
        assert!(matches!(
            TreeReport::load(&temp_dir.path().join("missing.json")),
            Err(ReportError::NotFound(_))
        ));
    }
}
