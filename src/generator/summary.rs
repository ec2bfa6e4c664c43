//! Closing log block of a generation run.

use std::fmt;

use crate::config::CountMode;
use crate::generator::GenerationOutcome;
use crate::node::format_timestamp;

/// Human-readable account of what a run created.
pub struct GenerationSummary<'a> {
    outcome: &'a GenerationOutcome,
}

impl<'a> GenerationSummary<'a> {
    pub fn new(outcome: &'a GenerationOutcome) -> Self {
        Self { outcome }
    }
}

impl fmt::Display for GenerationSummary<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let outcome = self.outcome;
        let config = &outcome.config;
        let root = &outcome.root;

        writeln!(
            f,
            "It took {} sec to make content in {} with the following parameters:",
            outcome.elapsed.as_secs_f64().round(),
            root.name
        )?;
        write!(f, "tree_depth={}, ", config.tree_depth)?;
        match config.counts {
            CountMode::Fixed { dirs, files } => {
                write!(f, "dirs_count={}, files_count={}, ", dirs, files)?
            }
            CountMode::Random {
                min_dirs,
                max_dirs,
                min_files,
                max_files,
            } => write!(
                f,
                "min_dirs_count={}, max_dirs_count={}, min_files_count={}, max_files_count={}, ",
                min_dirs, max_dirs, min_files, max_files
            )?,
        }
        writeln!(
            f,
            "hard links={} symlinks={}",
            config.hard_links, config.symlinks
        )?;
        writeln!(f, "random seed={}", outcome.seed)?;
        writeln!(
            f,
            "initial timestamp={} ({})",
            outcome.default_time,
            format_timestamp(outcome.default_time)
        )?;
        writeln!(f)?;

        let files = root.total_files_count();
        let hard_links = root.total_hard_links_count();
        writeln!(f, "Have been created:")?;
        writeln!(f, "Files(including symlinks): {}", files)?;
        writeln!(f, "Dirs: {}", root.total_sub_dirs_count() + 1)?;
        writeln!(f, "Hard links: {}", hard_links)?;
        writeln!(f, "Sym links: {}", root.total_symlinks_count())?;
        writeln!(f, "Files + Hard links + Symlinks: {}", files + hard_links)?;
        writeln!(f, "Total entries: {}", root.total_entries() + 1)?;
        write!(f, "Total size of all files: {}", root.total_size_all_files())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TreeConfig;
    use crate::node::{Directory, File, Node};
    use std::time::Duration;

    #[test]
    fn test_summary_counts_root() {
        let mut root = Directory::new("/tmp", "Test_tree", "root", vec!["root".to_string()]);
        root.add_node(Node::File(File {
            dest: root.full_path(),
            name: "Fa.txt".to_string(),
            owner: "root".to_string(),
            size: 42,
            atime: 1_600_000_000,
            mtime: 1_600_000_000,
        }));
        let outcome = GenerationOutcome {
            root,
            seed: 5,
            default_time: 1_662_707_899,
            elapsed: Duration::from_millis(1600),
            report_path: "/tmp/Test_tree_report.json".into(),
            config: TreeConfig::default(),
        };

        let text = outcome.summary().to_string();
        assert!(text.starts_with("It took 2 sec to make content in Test_tree"));
        assert!(text.contains("dirs_count=1, files_count=1"));
        assert!(text.contains("random seed=5"));
        assert!(text.contains("Dirs: 1\n"));
        assert!(text.contains("Files(including symlinks): 1\n"));
        assert!(text.contains("Total entries: 2\n"));
        assert!(text.ends_with("Total size of all files: 42"));
    }
}
