//! Builds the in-memory plan of a tree without touching the filesystem.

use tracing::debug;

use crate::config::TreeConfig;
use crate::error::GeneratorError;
use crate::generator::sampler::TreeSampler;
use crate::generator::Result;
use crate::node::{
    Directory, DirectoryRef, File, HardLink, LinkTarget, Node, SymLink, SYMLINK_SIZE_PADDING,
};

/// Failed name draws before the name grows by one character.
const NAME_ATTEMPTS_PER_LENGTH: usize = 100;

/// Plans a tree from a validated configuration, a seed and a base timestamp.
pub struct TreePlanner<'a> {
    config: &'a TreeConfig,
    sampler: TreeSampler,
    default_time: i64,
    name_length: usize,
}

impl<'a> TreePlanner<'a> {
    pub fn new(config: &'a TreeConfig, seed: u64, default_time: i64) -> Self {
        Self {
            config,
            sampler: TreeSampler::new(
                seed,
                config.counts.clone(),
                config.owners.clone(),
                config.file_sizes.clone(),
            ),
            default_time,
            name_length: config.name_length(),
        }
    }

    /// Produces the complete tree: directories level by level, files in
    /// every directory, then hard links and symlinks spread over the tree.
    pub fn plan(mut self) -> Result<Directory> {
        let start = self.sampler.level_params();
        let root_owner = self.sampler.pick_from(&start.owners);
        let mut root = Directory::new(
            self.config.dest.clone(),
            self.config.tree_name.clone(),
            root_owner,
            self.config.owners.clone(),
        );

        self.add_dirs(&mut root, start.dirs_count);
        self.add_files(&mut root, start.files_count);

        let depth = self.config.tree_depth;
        for level in 1..=depth {
            for dir in root.level_mut(level) {
                let params = self.sampler.level_params();
                if level < depth {
                    self.add_dirs(dir, params.dirs_count);
                }
                self.add_files(dir, params.files_count);
            }
            debug!("Planned level {} of {}", level, depth);
        }

        self.add_hard_links(&mut root)?;
        self.add_symlinks(&mut root);
        Ok(root)
    }

    fn add_dirs(&mut self, parent: &mut Directory, count: usize) {
        let parent_path = parent.full_path();
        for _ in 0..count {
            let owner = self.sampler.pick_owner();
            let name = self.unique_name(parent, |sampler, len| format!("D{}", sampler.name(len)));
            parent.add_node(Node::Directory(Directory::new(
                parent_path.clone(),
                name,
                owner,
                self.config.owners.clone(),
            )));
        }
    }

    fn add_files(&mut self, parent: &mut Directory, count: usize) {
        let parent_path = parent.full_path();
        for _ in 0..count {
            let owner = self.sampler.pick_owner();
            let mut size = 0;
            let name = self.unique_name(parent, |sampler, len| {
                let params = sampler.file_params();
                size = params.size;
                format!("F{}.{}", sampler.name(len), params.extension)
            });
            let atime = self.sampler.timestamp(self.default_time);
            let mtime = self.sampler.timestamp(self.default_time);
            parent.add_node(Node::File(File {
                dest: parent_path.clone(),
                name,
                owner,
                size,
                atime,
                mtime,
            }));
        }
    }

    /// Draws names until one is free in `parent`, growing the length when a
    /// level is saturated.
    fn unique_name<F>(&mut self, parent: &Directory, mut draw: F) -> String
    where
        F: FnMut(&mut TreeSampler, usize) -> String,
    {
        let mut length = self.name_length;
        let mut attempts = 0;
        loop {
            let name = draw(&mut self.sampler, length);
            if !parent.contains_name(&name) {
                return name;
            }
            attempts += 1;
            if attempts % NAME_ATTEMPTS_PER_LENGTH == 0 {
                length += 1;
            }
        }
    }

    fn add_hard_links(&mut self, root: &mut Directory) -> Result<()> {
        let count = self.config.hard_links;
        if count == 0 {
            return Ok(());
        }

        let addresses = root.dir_addresses();
        let files: Vec<File> = root.all_files().into_iter().cloned().collect();
        if files.is_empty() {
            return Err(GeneratorError::NoHardLinkTargets { count });
        }

        for num in 0..count {
            let address = &addresses[self.sampler.index(addresses.len())];
            let target = files[self.sampler.index(files.len())].clone();
            if let Some(dir) = root.descendant_mut(address) {
                dir.add_node(Node::HardLink(HardLink {
                    dest: dir.full_path(),
                    name: format!("HL{}_{}", num, target.name),
                    owner: target.owner.clone(),
                    file_obj: target,
                }));
            }
        }
        Ok(())
    }

    fn add_symlinks(&mut self, root: &mut Directory) {
        let count = self.config.symlinks;
        if count == 0 {
            return;
        }

        let addresses = root.dir_addresses();
        let mut targets: Vec<LinkTarget> = std::iter::once(&*root)
            .chain(root.all_dirs())
            .map(|dir| {
                LinkTarget::Directory(DirectoryRef {
                    name: dir.name.clone(),
                    dest: dir.dest.clone(),
                    owner: dir.owner.clone(),
                })
            })
            .collect();
        targets.extend(root.all_files().into_iter().cloned().map(LinkTarget::File));

        for num in 0..count {
            let address = &addresses[self.sampler.index(addresses.len())];
            let target = targets[self.sampler.index(targets.len())].clone();
            let atime = self.sampler.timestamp(self.default_time);
            let mtime = self.sampler.timestamp(self.default_time);
            let owner = self.sampler.pick_owner();
            let size = target.full_path().as_os_str().len() as u64 + SYMLINK_SIZE_PADDING;
            if let Some(dir) = root.descendant_mut(address) {
                dir.add_node(Node::SymLink(SymLink {
                    dest: dir.full_path(),
                    name: format!("SL{}_{}", num, target.name()),
                    owner,
                    file_obj: target,
                    size,
                    atime,
                    mtime,
                }));
            }
        }
    }
}
