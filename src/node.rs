//! In-memory model of a generated file tree.
//!
//! A [`Directory`] owns its entries as [`Node`]s. Every aggregate the report
//! exposes (counts, sizes, per-owner metrics) is computed from the tree on
//! demand, so the model never carries stale totals.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, NaiveDateTime, TimeZone};
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};

/// Bytes added to the measured symlink length when recording its size.
pub const SYMLINK_SIZE_PADDING: u64 = 2;

/// Timestamps appear in reports as local time in this format.
pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Local times that occur twice (the repeated hour when clocks go back) carry
/// their UTC offset.
const TIME_FORMAT_WITH_OFFSET: &str = "%Y-%m-%d %H:%M:%S %z";

/// Formats an epoch second in local time using [`TIME_FORMAT`].
///
/// An epoch chrono cannot represent is written as the plain number.
pub fn format_timestamp(epoch: i64) -> String {
    let Some(local) = Local.timestamp_opt(epoch, 0).single() else {
        return epoch.to_string();
    };
    if Local
        .from_local_datetime(&local.naive_local())
        .single()
        .is_some()
    {
        local.format(TIME_FORMAT).to_string()
    } else {
        local.format(TIME_FORMAT_WITH_OFFSET).to_string()
    }
}

/// Parses a timestamp written by [`format_timestamp`] back into epoch seconds.
pub fn parse_timestamp(value: &str) -> Option<i64> {
    if let Ok(with_offset) = DateTime::parse_from_str(value, TIME_FORMAT_WITH_OFFSET) {
        return Some(with_offset.timestamp());
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(value, TIME_FORMAT) {
        return Local
            .from_local_datetime(&naive)
            .earliest()
            .map(|local| local.timestamp());
    }
    value.parse().ok()
}

mod report_time {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(epoch: &i64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_timestamp(*epoch))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
        let value = String::deserialize(deserializer)?;
        super::parse_timestamp(&value)
            .ok_or_else(|| D::Error::custom(format!("invalid timestamp '{}'", value)))
    }
}

/// A regular file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct File {
    pub dest: PathBuf,
    pub name: String,
    pub owner: String,
    pub size: u64,
    /// Access time, epoch seconds.
    #[serde(with = "report_time")]
    pub atime: i64,
    /// Modification time, epoch seconds.
    #[serde(with = "report_time")]
    pub mtime: i64,
}

/// A hard link to a file elsewhere in the tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HardLink {
    pub dest: PathBuf,
    pub name: String,
    pub owner: String,
    pub file_obj: File,
}

/// Identity of a directory a symlink points at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryRef {
    pub name: String,
    pub dest: PathBuf,
    pub owner: String,
}

impl DirectoryRef {
    pub fn full_path(&self) -> PathBuf {
        self.dest.join(&self.name)
    }
}

/// What a symlink points at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LinkTarget {
    File(File),
    Directory(DirectoryRef),
}

impl LinkTarget {
    pub fn name(&self) -> &str {
        match self {
            LinkTarget::File(file) => &file.name,
            LinkTarget::Directory(dir) => &dir.name,
        }
    }

    pub fn full_path(&self) -> PathBuf {
        match self {
            LinkTarget::File(file) => file.full_path(),
            LinkTarget::Directory(dir) => dir.full_path(),
        }
    }

    pub fn is_dir(&self) -> bool {
        matches!(self, LinkTarget::Directory(_))
    }
}

/// A symbolic link to a file or directory elsewhere in the tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymLink {
    pub dest: PathBuf,
    pub name: String,
    pub owner: String,
    pub file_obj: LinkTarget,
    pub size: u64,
    #[serde(with = "report_time")]
    pub atime: i64,
    #[serde(with = "report_time")]
    pub mtime: i64,
}

macro_rules! impl_full_path {
    ($($ty:ty),*) => {
        $(impl $ty {
            /// Full path of the entry: `dest/name`.
            pub fn full_path(&self) -> PathBuf {
                self.dest.join(&self.name)
            }
        })*
    };
}

impl_full_path!(File, HardLink, SymLink);

/// Discriminant used to filter traversals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Directory,
    File,
    HardLink,
    SymLink,
}

/// Any entry of a directory.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Directory(Directory),
    File(File),
    HardLink(HardLink),
    SymLink(SymLink),
}

impl Node {
    pub fn kind(&self) -> NodeKind {
        match self {
            Node::Directory(_) => NodeKind::Directory,
            Node::File(_) => NodeKind::File,
            Node::HardLink(_) => NodeKind::HardLink,
            Node::SymLink(_) => NodeKind::SymLink,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Node::Directory(d) => &d.name,
            Node::File(f) => &f.name,
            Node::HardLink(h) => &h.name,
            Node::SymLink(s) => &s.name,
        }
    }

    pub fn owner(&self) -> &str {
        match self {
            Node::Directory(d) => &d.owner,
            Node::File(f) => &f.owner,
            Node::HardLink(h) => &h.owner,
            Node::SymLink(s) => &s.owner,
        }
    }

    pub fn dest(&self) -> &Path {
        match self {
            Node::Directory(d) => &d.dest,
            Node::File(f) => &f.dest,
            Node::HardLink(h) => &h.dest,
            Node::SymLink(s) => &s.dest,
        }
    }

    pub fn full_path(&self) -> PathBuf {
        self.dest().join(self.name())
    }

    /// Size counted in the report: files and symlinks only.
    fn reported_size(&self) -> Option<u64> {
        match self {
            Node::File(f) => Some(f.size),
            Node::SymLink(s) => Some(s.size),
            _ => None,
        }
    }
}

/// Per-owner aggregates of a directory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerMetrics {
    pub own_files_size: u64,
    pub sub_files_size: u64,
    pub own_files_count: u64,
    pub sub_files_count: u64,
    pub own_dirs_count: u64,
    pub sub_dirs_count: u64,
}

/// A directory and everything below it.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "DirectoryRecord")]
pub struct Directory {
    pub dest: PathBuf,
    pub name: String,
    pub owner: String,
    /// Owners entries below this directory may be assigned.
    pub possible_owners: Vec<String>,
    entries: Vec<Node>,
}

impl Directory {
    pub fn new(
        dest: impl Into<PathBuf>,
        name: impl Into<String>,
        owner: impl Into<String>,
        possible_owners: Vec<String>,
    ) -> Self {
        Self {
            dest: dest.into(),
            name: name.into(),
            owner: owner.into(),
            possible_owners,
            entries: Vec::new(),
        }
    }

    pub fn full_path(&self) -> PathBuf {
        self.dest.join(&self.name)
    }

    pub fn add_node(&mut self, node: Node) {
        self.entries.push(node);
    }

    pub fn entries(&self) -> &[Node] {
        &self.entries
    }

    /// Whether a direct entry already uses `name`.
    pub fn contains_name(&self, name: &str) -> bool {
        self.entries.iter().any(|node| node.name() == name)
    }

    pub fn sub_dirs(&self) -> impl Iterator<Item = &Directory> {
        self.entries.iter().filter_map(|node| match node {
            Node::Directory(d) => Some(d),
            _ => None,
        })
    }

    pub fn sub_dirs_mut(&mut self) -> impl Iterator<Item = &mut Directory> {
        self.entries.iter_mut().filter_map(|node| match node {
            Node::Directory(d) => Some(d),
            _ => None,
        })
    }

    pub fn files(&self) -> impl Iterator<Item = &File> {
        self.entries.iter().filter_map(|node| match node {
            Node::File(f) => Some(f),
            _ => None,
        })
    }

    pub fn hard_links(&self) -> impl Iterator<Item = &HardLink> {
        self.entries.iter().filter_map(|node| match node {
            Node::HardLink(h) => Some(h),
            _ => None,
        })
    }

    pub fn symlinks(&self) -> impl Iterator<Item = &SymLink> {
        self.entries.iter().filter_map(|node| match node {
            Node::SymLink(s) => Some(s),
            _ => None,
        })
    }

    pub fn symlinks_mut(&mut self) -> impl Iterator<Item = &mut SymLink> {
        self.entries.iter_mut().filter_map(|node| match node {
            Node::SymLink(s) => Some(s),
            _ => None,
        })
    }

    /// Iterates over entries, optionally filtered by kind.
    ///
    /// With `recursive`, each directory entry is followed by its own
    /// descendants (pre-order).
    pub fn iter_sub_nodes(&self, kind: Option<NodeKind>, recursive: bool) -> SubNodes<'_> {
        SubNodes {
            stack: vec![self.entries.iter()],
            kind,
            recursive,
        }
    }

    /// Number of direct entries of `kind` (all entries when `None`).
    pub fn nodes_count(&self, kind: Option<NodeKind>) -> usize {
        self.iter_sub_nodes(kind, false).count()
    }

    /// Number of entries of `kind` anywhere below this directory.
    pub fn all_nodes_count(&self, kind: Option<NodeKind>) -> usize {
        self.iter_sub_nodes(kind, true).count()
    }

    /// Every directory below this one, pre-order, excluding `self`.
    pub fn all_dirs(&self) -> Vec<&Directory> {
        self.iter_sub_nodes(Some(NodeKind::Directory), true)
            .filter_map(|node| match node {
                Node::Directory(d) => Some(d),
                _ => None,
            })
            .collect()
    }

    /// Every regular file below this one.
    pub fn all_files(&self) -> Vec<&File> {
        self.iter_sub_nodes(Some(NodeKind::File), true)
            .filter_map(|node| match node {
                Node::File(f) => Some(f),
                _ => None,
            })
            .collect()
    }

    /// Files and symlinks in this directory.
    pub fn current_dir_files_count(&self) -> usize {
        self.nodes_count(Some(NodeKind::File)) + self.nodes_count(Some(NodeKind::SymLink))
    }

    /// Files and symlinks in this directory and all sub-directories.
    pub fn total_files_count(&self) -> usize {
        self.all_nodes_count(Some(NodeKind::File)) + self.all_nodes_count(Some(NodeKind::SymLink))
    }

    pub fn sub_dirs_files_count(&self) -> usize {
        self.total_files_count() - self.current_dir_files_count()
    }

    pub fn sub_dirs_count(&self) -> usize {
        self.nodes_count(Some(NodeKind::Directory))
    }

    pub fn total_sub_dirs_count(&self) -> usize {
        self.all_nodes_count(Some(NodeKind::Directory))
    }

    pub fn current_dir_hard_links_count(&self) -> usize {
        self.nodes_count(Some(NodeKind::HardLink))
    }

    pub fn total_hard_links_count(&self) -> usize {
        self.all_nodes_count(Some(NodeKind::HardLink))
    }

    pub fn sub_dirs_hard_links_count(&self) -> usize {
        self.total_hard_links_count() - self.current_dir_hard_links_count()
    }

    pub fn current_dir_symlinks_count(&self) -> usize {
        self.nodes_count(Some(NodeKind::SymLink))
    }

    pub fn total_symlinks_count(&self) -> usize {
        self.all_nodes_count(Some(NodeKind::SymLink))
    }

    pub fn sub_dirs_symlinks_count(&self) -> usize {
        self.total_symlinks_count() - self.current_dir_symlinks_count()
    }

    /// Size of files and symlinks in this directory.
    pub fn total_file_size_in_dir(&self) -> u64 {
        self.entries.iter().filter_map(Node::reported_size).sum()
    }

    /// Size of files and symlinks in this directory and below.
    pub fn total_size_all_files(&self) -> u64 {
        self.iter_sub_nodes(None, true)
            .filter_map(Node::reported_size)
            .sum()
    }

    /// Size of files and symlinks in sub-directories only.
    pub fn sub_directories_files_size(&self) -> u64 {
        self.all_dirs()
            .iter()
            .map(|dir| dir.total_file_size_in_dir())
            .sum()
    }

    /// Files, hard links and directories below this directory.
    pub fn total_entries(&self) -> usize {
        self.total_files_count() + self.total_hard_links_count() + self.total_sub_dirs_count()
    }

    /// Aggregates keyed by every possible owner.
    pub fn metrics_by_owners(&self) -> BTreeMap<String, OwnerMetrics> {
        let mut metrics: BTreeMap<String, OwnerMetrics> = self
            .possible_owners
            .iter()
            .map(|owner| (owner.clone(), OwnerMetrics::default()))
            .collect();

        for node in &self.entries {
            match node {
                Node::Directory(dir) => {
                    metrics.entry(dir.owner.clone()).or_default().own_dirs_count += 1;
                }
                Node::File(_) | Node::SymLink(_) => {
                    let size = node.reported_size().unwrap_or(0);
                    let entry = metrics.entry(node.owner().to_string()).or_default();
                    entry.own_files_size += size;
                    entry.sub_files_size += size;
                    entry.own_files_count += 1;
                    entry.sub_files_count += 1;
                }
                Node::HardLink(_) => {}
            }
        }

        for dir in self.all_dirs() {
            metrics.entry(dir.owner.clone()).or_default().sub_dirs_count += 1;
            for node in dir.entries() {
                if let Some(size) = node.reported_size() {
                    let entry = metrics.entry(node.owner().to_string()).or_default();
                    entry.sub_files_size += size;
                    entry.sub_files_count += 1;
                }
            }
        }

        metrics
    }

    /// Follows a path of sub-directory indices down from this directory.
    pub fn descendant_mut(&mut self, address: &[usize]) -> Option<&mut Directory> {
        let mut current = self;
        for &index in address {
            current = current.sub_dirs_mut().nth(index)?;
        }
        Some(current)
    }

    /// Mutable references to every directory exactly `depth` levels below
    /// this one (`self` for depth 0), in pre-order.
    pub fn level_mut(&mut self, depth: usize) -> Vec<&mut Directory> {
        fn collect<'d>(dir: &'d mut Directory, depth: usize, out: &mut Vec<&'d mut Directory>) {
            if depth == 0 {
                out.push(dir);
                return;
            }
            for sub_dir in dir.sub_dirs_mut() {
                collect(sub_dir, depth - 1, out);
            }
        }

        let mut out = Vec::new();
        collect(self, depth, &mut out);
        out
    }

    /// Addresses (sub-directory index paths) of this directory and every
    /// directory below it, pre-order with `self` first.
    pub fn dir_addresses(&self) -> Vec<Vec<usize>> {
        fn collect(dir: &Directory, prefix: &mut Vec<usize>, out: &mut Vec<Vec<usize>>) {
            out.push(prefix.clone());
            for (index, sub_dir) in dir.sub_dirs().enumerate() {
                prefix.push(index);
                collect(sub_dir, prefix, out);
                prefix.pop();
            }
        }

        let mut out = Vec::new();
        collect(self, &mut Vec::new(), &mut out);
        out
    }
}

/// Pre-order iterator over the entries of a [`Directory`].
pub struct SubNodes<'a> {
    stack: Vec<std::slice::Iter<'a, Node>>,
    kind: Option<NodeKind>,
    recursive: bool,
}

impl<'a> Iterator for SubNodes<'a> {
    type Item = &'a Node;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let top = self.stack.last_mut()?;
            let Some(node) = top.next() else {
                self.stack.pop();
                continue;
            };
            if self.recursive {
                if let Node::Directory(dir) = node {
                    self.stack.push(dir.entries.iter());
                }
            }
            if self.kind.map_or(true, |kind| node.kind() == kind) {
                return Some(node);
            }
        }
    }
}

impl Serialize for Directory {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Directory", 24)?;
        state.serialize_field("dest", &self.dest)?;
        state.serialize_field("name", &self.name)?;
        state.serialize_field("owner", &self.owner)?;
        state.serialize_field("possible_owners", &self.possible_owners)?;
        state.serialize_field("sub_dirs", &self.sub_dirs().collect::<Vec<_>>())?;
        state.serialize_field("files", &self.files().collect::<Vec<_>>())?;
        state.serialize_field("hard_links", &self.hard_links().collect::<Vec<_>>())?;
        state.serialize_field("symlinks", &self.symlinks().collect::<Vec<_>>())?;
        state.serialize_field("total_files_count", &self.total_files_count())?;
        state.serialize_field("current_dir_files_count", &self.current_dir_files_count())?;
        state.serialize_field("sub_dirs_files_count", &self.sub_dirs_files_count())?;
        state.serialize_field("total_sub_dirs_count", &self.total_sub_dirs_count())?;
        state.serialize_field("sub_dirs_count", &self.sub_dirs_count())?;
        state.serialize_field("total_hard_links_count", &self.total_hard_links_count())?;
        state.serialize_field("total_symlinks_count", &self.total_symlinks_count())?;
        state.serialize_field(
            "current_dir_hard_links_count",
            &self.current_dir_hard_links_count(),
        )?;
        state.serialize_field(
            "current_dir_symlinks_count",
            &self.current_dir_symlinks_count(),
        )?;
        state.serialize_field("sub_dirs_hard_links_count", &self.sub_dirs_hard_links_count())?;
        state.serialize_field("sub_dirs_symlinks_count", &self.sub_dirs_symlinks_count())?;
        state.serialize_field("total_size_all_files", &self.total_size_all_files())?;
        state.serialize_field("total_file_size_in_dir", &self.total_file_size_in_dir())?;
        state.serialize_field(
            "sub_directories_files_size",
            &self.sub_directories_files_size(),
        )?;
        state.serialize_field("total_entries", &self.total_entries())?;
        state.serialize_field("metrics_by_owners", &self.metrics_by_owners())?;
        state.end()
    }
}

/// Report shape of a directory; aggregate fields are ignored on load.
#[derive(Deserialize)]
struct DirectoryRecord {
    dest: PathBuf,
    name: String,
    owner: String,
    #[serde(default)]
    possible_owners: Vec<String>,
    #[serde(default)]
    sub_dirs: Vec<Directory>,
    #[serde(default)]
    files: Vec<File>,
    #[serde(default)]
    hard_links: Vec<HardLink>,
    #[serde(default)]
    symlinks: Vec<SymLink>,
}

impl From<DirectoryRecord> for Directory {
    fn from(record: DirectoryRecord) -> Self {
        let mut dir = Directory::new(
            record.dest,
            record.name,
            record.owner,
            record.possible_owners,
        );
        dir.entries.extend(record.sub_dirs.into_iter().map(Node::Directory));
        dir.entries.extend(record.files.into_iter().map(Node::File));
        dir.entries.extend(record.hard_links.into_iter().map(Node::HardLink));
        dir.entries.extend(record.symlinks.into_iter().map(Node::SymLink));
        dir
    }
}

impl fmt::Display for Directory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn write_entries(dir: &Directory, depth: usize, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            for node in dir.entries() {
                let indent = "  ".repeat(depth);
                match node {
                    Node::Directory(sub_dir) => {
                        writeln!(f, "{}{}/ ({})", indent, sub_dir.name, sub_dir.owner)?;
                        write_entries(sub_dir, depth + 1, f)?;
                    }
                    Node::File(file) => writeln!(
                        f,
                        "{}{} ({}, {} bytes, atime {}, mtime {})",
                        indent,
                        file.name,
                        file.owner,
                        file.size,
                        format_timestamp(file.atime),
                        format_timestamp(file.mtime)
                    )?,
                    Node::HardLink(link) => writeln!(
                        f,
                        "{}{} => {} ({})",
                        indent,
                        link.name,
                        link.file_obj.full_path().display(),
                        link.owner
                    )?,
                    Node::SymLink(link) => writeln!(
                        f,
                        "{}{} -> {} ({}, {} bytes)",
                        indent,
                        link.name,
                        link.file_obj.full_path().display(),
                        link.owner,
                        link.size
                    )?,
                }
            }
            Ok(())
        }

        writeln!(f, "Directory dest: {}", self.dest.display())?;
        writeln!(f, "Directory name: {}", self.name)?;
        writeln!(f, "Owner: {}", self.owner)?;
        writeln!(f, "Sub dirs: {}", self.total_sub_dirs_count())?;
        writeln!(f, "Files: {}", self.total_files_count())?;
        writeln!(f, "Hard Links: {}", self.total_hard_links_count())?;
        writeln!(f, "SymLinks: {}", self.total_symlinks_count())?;
        writeln!(f, "Total size: {}", self.total_size_all_files())?;
        writeln!(f)?;
        write_entries(self, 0, f)
    }
}
