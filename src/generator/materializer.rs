//! Writes a planned tree to disk.
//!
//! Work is split into ordered stages (root, each directory level, files,
//! hard links, symlinks). Inside a stage every entry is an independent
//! blocking job; a semaphore bounds how many run at once.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, info, warn};

use crate::cleanup;
use crate::error::GeneratorError;
use crate::generator::Result;
use crate::node::{Directory, Node, SYMLINK_SIZE_PADDING};
use crate::platform::{self, UserIds};

/// One filesystem operation.
#[derive(Debug)]
enum Job {
    Dir {
        path: PathBuf,
        owner: String,
        ids: UserIds,
    },
    File {
        path: PathBuf,
        owner: String,
        ids: UserIds,
        size: u64,
        atime: i64,
        mtime: i64,
    },
    HardLink {
        target: PathBuf,
        link: PathBuf,
    },
    SymLink {
        target: PathBuf,
        link: PathBuf,
        owner: String,
        ids: UserIds,
        atime: i64,
        mtime: i64,
    },
}

impl Job {
    /// Runs the job; symlinks report their recorded size.
    fn run(self) -> Result<Option<(PathBuf, u64)>> {
        match self {
            Job::Dir { path, owner, ids } => {
                std::fs::create_dir(&path)
                    .and_then(|_| platform::set_owner(&path, ids, true))
                    .map_err(|source| GeneratorError::Create {
                        path: path.clone(),
                        owner,
                        source,
                    })?;
                debug!("Has been created directory: {}", path.display());
                Ok(None)
            }
            Job::File {
                path,
                owner,
                ids,
                size,
                atime,
                mtime,
            } => {
                platform::create_sparse_file(&path, size)
                    .and_then(|_| platform::set_times(&path, atime, mtime, true))
                    .and_then(|_| platform::set_owner(&path, ids, true))
                    .map_err(|source| GeneratorError::Create {
                        path: path.clone(),
                        owner,
                        source,
                    })?;
                debug!("Has been created file: {}", path.display());
                Ok(None)
            }
            Job::HardLink { target, link } => {
                std::fs::hard_link(&target, &link).map_err(|source| GeneratorError::Link {
                    link: link.clone(),
                    target: target.clone(),
                    source,
                })?;
                debug!("Has been created hard link: {}", link.display());
                Ok(None)
            }
            Job::SymLink {
                target,
                link,
                owner,
                ids,
                atime,
                mtime,
            } => {
                std::os::unix::fs::symlink(&target, &link).map_err(|source| {
                    GeneratorError::Link {
                        link: link.clone(),
                        target: target.clone(),
                        source,
                    }
                })?;
                let size = std::fs::symlink_metadata(&link)
                    .and_then(|meta| {
                        platform::set_times(&link, atime, mtime, false)?;
                        platform::set_owner(&link, ids, false)?;
                        Ok(meta.len() + SYMLINK_SIZE_PADDING)
                    })
                    .map_err(|source| GeneratorError::Create {
                        path: link.clone(),
                        owner: owner.clone(),
                        source,
                    })?;
                debug!("Has been created symlink: {}, owner {}", link.display(), owner);
                Ok(Some((link, size)))
            }
        }
    }
}

/// Creates planned trees on disk.
pub struct Materializer {
    workers: usize,
    owners: HashMap<String, UserIds>,
}

impl Materializer {
    /// `owners` must contain every owner name used by the plans.
    pub fn new(workers: usize, owners: HashMap<String, UserIds>) -> Self {
        Self {
            workers: workers.max(1),
            owners,
        }
    }

    /// Creates every entry of `root` on disk and records measured symlink
    /// sizes back into the plan.
    ///
    /// An existing root directory is reused. When this call created the
    /// root and a later stage fails, the whole tree is removed again.
    pub async fn materialize(&self, root: &mut Directory) -> Result<()> {
        let root_path = root.full_path();
        let root_ids = self.ids(&root.owner)?;
        let mut stages = StageJobs::default();
        self.collect_jobs(root, 0, &mut stages)?;

        let created_root = if root_path.exists() {
            warn!(
                "Root directory {} already exists, generating inside it",
                root_path.display()
            );
            false
        } else {
            let job = Job::Dir {
                path: root_path.clone(),
                owner: root.owner.clone(),
                ids: root_ids,
            };
            self.run_stage("root", vec![job]).await?;
            true
        };

        let result = self.run_stages(stages, root).await;
        if result.is_err() && created_root {
            remove_partial_tree(root_path).await;
        }
        result
    }

    async fn run_stages(&self, stages: StageJobs, root: &mut Directory) -> Result<()> {
        for (depth, jobs) in stages.levels.into_iter().enumerate() {
            self.run_stage(&format!("directories at level {}", depth + 1), jobs)
                .await?;
        }
        self.run_stage("files", stages.files).await?;
        self.run_stage("hard links", stages.hard_links).await?;
        let sizes: HashMap<PathBuf, u64> = self
            .run_stage("symlinks", stages.symlinks)
            .await?
            .into_iter()
            .collect();
        apply_symlink_sizes(root, &sizes);
        Ok(())
    }

    /// Walks the plan and sorts its entries into stage job lists.
    fn collect_jobs(&self, dir: &Directory, depth: usize, stages: &mut StageJobs) -> Result<()> {
        for node in dir.entries() {
            match node {
                Node::Directory(sub_dir) => {
                    if stages.levels.len() <= depth {
                        stages.levels.resize_with(depth + 1, Vec::new);
                    }
                    stages.levels[depth].push(Job::Dir {
                        path: sub_dir.full_path(),
                        owner: sub_dir.owner.clone(),
                        ids: self.ids(&sub_dir.owner)?,
                    });
                    self.collect_jobs(sub_dir, depth + 1, stages)?;
                }
                Node::File(file) => stages.files.push(Job::File {
                    path: file.full_path(),
                    owner: file.owner.clone(),
                    ids: self.ids(&file.owner)?,
                    size: file.size,
                    atime: file.atime,
                    mtime: file.mtime,
                }),
                Node::HardLink(link) => stages.hard_links.push(Job::HardLink {
                    target: link.file_obj.full_path(),
                    link: link.full_path(),
                }),
                Node::SymLink(link) => stages.symlinks.push(Job::SymLink {
                    target: link.file_obj.full_path(),
                    link: link.full_path(),
                    owner: link.owner.clone(),
                    ids: self.ids(&link.owner)?,
                    atime: link.atime,
                    mtime: link.mtime,
                }),
            }
        }
        Ok(())
    }

    fn ids(&self, owner: &str) -> Result<UserIds> {
        self.owners
            .get(owner)
            .copied()
            .ok_or_else(|| GeneratorError::UnknownOwner(owner.to_string()))
    }

    /// Runs a stage's jobs with at most `workers` in flight. After the first
    /// failure no new job starts; running ones are awaited before returning.
    async fn run_stage(&self, stage: &str, jobs: Vec<Job>) -> Result<Vec<(PathBuf, u64)>> {
        if jobs.is_empty() {
            return Ok(Vec::new());
        }
        info!("Creating {} ({} entries)", stage, jobs.len());

        let semaphore = Arc::new(Semaphore::new(self.workers));
        let failed = Arc::new(AtomicBool::new(false));
        let mut tasks = JoinSet::new();
        let mut collected = StageResults::default();

        for job in jobs {
            if failed.load(Ordering::Relaxed) {
                break;
            }
            let Ok(permit) = semaphore.clone().acquire_owned().await else {
                break;
            };
            let failed = failed.clone();
            tasks.spawn_blocking(move || {
                let _permit = permit;
                let result = job.run();
                if result.is_err() {
                    failed.store(true, Ordering::Relaxed);
                }
                result
            });
        }

        while let Some(joined) = tasks.join_next().await {
            collected.record(joined);
        }
        collected.finish()
    }
}

/// Jobs of every stage in execution order. `levels[d]` holds the
/// directories `d + 1` levels below the root.
#[derive(Default)]
struct StageJobs {
    levels: Vec<Vec<Job>>,
    files: Vec<Job>,
    hard_links: Vec<Job>,
    symlinks: Vec<Job>,
}

#[derive(Default)]
struct StageResults {
    measured: Vec<(PathBuf, u64)>,
    first_error: Option<GeneratorError>,
}

impl StageResults {
    fn record(
        &mut self,
        joined: std::result::Result<Result<Option<(PathBuf, u64)>>, JoinError>,
    ) {
        match joined {
            Ok(Ok(Some(measurement))) => self.measured.push(measurement),
            Ok(Ok(None)) => {}
            Ok(Err(e)) => {
                self.first_error.get_or_insert(e);
            }
            Err(e) => {
                self.first_error
                    .get_or_insert(GeneratorError::Worker(e.to_string()));
            }
        }
    }

    fn finish(self) -> Result<Vec<(PathBuf, u64)>> {
        match self.first_error {
            Some(e) => Err(e),
            None => Ok(self.measured),
        }
    }
}

fn apply_symlink_sizes(dir: &mut Directory, sizes: &HashMap<PathBuf, u64>) {
    if sizes.is_empty() {
        return;
    }
    for link in dir.symlinks_mut() {
        if let Some(size) = sizes.get(&link.full_path()) {
            link.size = *size;
        }
    }
    for sub_dir in dir.sub_dirs_mut() {
        apply_symlink_sizes(sub_dir, sizes);
    }
}

async fn remove_partial_tree(root_path: PathBuf) {
    let shown = root_path.display().to_string();
    match tokio::task::spawn_blocking(move || cleanup::remove_tree(Path::new(&root_path))).await {
        Ok(Ok(true)) => warn!("Removed partially generated tree {}", shown),
        Ok(Ok(false)) => {}
        Ok(Err(e)) => warn!("Failed to remove partially generated tree {}: {}", shown, e),
        Err(e) => warn!("Cleanup of {} did not complete: {}", shown, e),
    }
}
