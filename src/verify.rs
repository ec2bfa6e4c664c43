//! Compares a tree on disk with the plan stored in its report.

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

use crate::error::ReportError;
use crate::node::{Directory, NodeKind};

/// Entry counts below a tree root, the root itself excluded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TreeCounts {
    pub dirs: usize,
    /// Files and hard links.
    pub regular_files: usize,
    pub symlinks: usize,
}

impl TreeCounts {
    /// Counts a planned tree.
    pub fn planned(root: &Directory) -> Self {
        Self {
            dirs: root.total_sub_dirs_count(),
            regular_files: root.all_nodes_count(Some(NodeKind::File))
                + root.total_hard_links_count(),
            symlinks: root.total_symlinks_count(),
        }
    }
}

impl fmt::Display for TreeCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "dirs={} regular files={} symlinks={}",
            self.dirs, self.regular_files, self.symlinks
        )
    }
}

/// Result of comparing a plan with the filesystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verification {
    pub root: PathBuf,
    pub expected: TreeCounts,
    pub actual: TreeCounts,
    /// Planned paths (relative to the root) not found on disk.
    pub missing: Vec<PathBuf>,
    /// Paths on disk that are not part of the plan.
    pub unexpected: Vec<PathBuf>,
}

impl Verification {
    pub fn is_match(&self) -> bool {
        self.expected == self.actual && self.missing.is_empty() && self.unexpected.is_empty()
    }
}

impl fmt::Display for Verification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Tree: {}", self.root.display())?;
        writeln!(f, "Expected: {}", self.expected)?;
        writeln!(f, "Found:    {}", self.actual)?;
        for path in &self.missing {
            writeln!(f, "missing: {}", path.display())?;
        }
        for path in &self.unexpected {
            writeln!(f, "unexpected: {}", path.display())?;
        }
        write!(
            f,
            "{}",
            if self.is_match() { "OK" } else { "MISMATCH" }
        )
    }
}

/// Walks the tree planned by `root` without following links and compares
/// it with the plan.
pub fn verify_tree(root: &Directory) -> Result<Verification, ReportError> {
    let root_path = root.full_path();
    if !root_path.is_dir() {
        return Err(ReportError::NotFound(root_path));
    }

    let expected_paths: BTreeSet<PathBuf> = root
        .iter_sub_nodes(None, true)
        .filter_map(|node| relative(&root_path, &node.full_path()))
        .collect();

    let mut actual = TreeCounts::default();
    let mut actual_paths = BTreeSet::new();
    for entry in WalkDir::new(&root_path).min_depth(1).follow_links(false) {
        let entry = entry?;
        let file_type = entry.file_type();
        if file_type.is_symlink() {
            actual.symlinks += 1;
        } else if file_type.is_dir() {
            actual.dirs += 1;
        } else if file_type.is_file() {
            actual.regular_files += 1;
        }
        if let Some(path) = relative(&root_path, entry.path()) {
            actual_paths.insert(path);
        }
    }
    debug!(
        "Walked {}: {} entries on disk",
        root_path.display(),
        actual_paths.len()
    );

    Ok(Verification {
        expected: TreeCounts::planned(root),
        actual,
        missing: expected_paths.difference(&actual_paths).cloned().collect(),
        unexpected: actual_paths.difference(&expected_paths).cloned().collect(),
        root: root_path,
    })
}

fn relative(root: &Path, path: &Path) -> Option<PathBuf> {
    path.strip_prefix(root).ok().map(Path::to_path_buf)
}
