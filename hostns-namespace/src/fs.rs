//! Host filesystem operations routed through the namespace executor

use std::fs::{File, Metadata};
use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;

use hostns_core::{DiskStat, Error, ProcessName, Result, ResultExt};
use nix::fcntl::Flock;

use crate::executor::NamespaceExecutor;
use crate::util::{self, DirEntryInfo};

/// Minimum number of normal components a path must have before it may be
/// copied or removed recursively
pub const MIN_DESTRUCTIVE_DEPTH: usize = 2;

/// Absolute, lexically normalized form of `path`
///
/// Relative paths are resolved against the current directory of the caller,
/// before any namespace switch.
///
/// # Errors
/// Returns error if the current directory cannot be read
pub fn absolute_path(path: &Path) -> Result<PathBuf> {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };

    let mut clean = PathBuf::from("/");
    for component in joined.components() {
        match component {
            Component::Normal(part) => clean.push(part),
            Component::ParentDir => {
                clean.pop();
            }
            Component::RootDir | Component::CurDir | Component::Prefix(_) => {}
        }
    }
    Ok(clean)
}

/// Reject `/` and its direct children
///
/// # Errors
/// Returns [`Error::ProhibitedPath`] for top level paths
pub fn ensure_not_top_level(path: &Path) -> Result<PathBuf> {
    let path = absolute_path(path)?;
    let depth = path
        .components()
        .filter(|c| matches!(c, Component::Normal(_)))
        .count();

    if depth < MIN_DESTRUCTIVE_DEPTH {
        return Err(Error::ProhibitedPath { path });
    }
    Ok(path)
}

/// Filesystem operations performed in the namespace of one process
#[derive(Debug, Clone)]
pub struct HostFs {
    executor: NamespaceExecutor,
    process: ProcessName,
}

impl HostFs {
    /// Bind an executor to a process
    #[must_use]
    pub fn new(executor: NamespaceExecutor, process: ProcessName) -> Self {
        Self { executor, process }
    }

    /// Process whose namespace is used
    #[must_use]
    pub fn process(&self) -> &ProcessName {
        &self.process
    }

    /// Underlying executor
    #[must_use]
    pub fn executor(&self) -> &NamespaceExecutor {
        &self.executor
    }

    fn run<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce() -> Result<T> + Send,
        T: Send,
    {
        self.executor.run(&self.process, f)
    }

    /// Copy a directory tree; both ends must be below the top level
    ///
    /// # Errors
    /// Returns error if either path is prohibited or the copy fails
    pub fn copy_directory(
        &self,
        source: impl AsRef<Path>,
        destination: impl AsRef<Path>,
        overwrite: bool,
    ) -> Result<()> {
        let (source, destination) = (source.as_ref(), destination.as_ref());
        let context = || {
            format!(
                "failed to copy host content from {} to {}",
                source.display(),
                destination.display()
            )
        };

        let src = ensure_not_top_level(source).context(context)?;
        let dst = ensure_not_top_level(destination).context(context)?;
        self.run(|| util::copy_files(&src, &dst, overwrite))
            .context(context)
    }

    /// Copy files from `source` to `destination`
    ///
    /// # Errors
    /// Returns error if either path is prohibited or the copy fails
    pub fn copy_files(
        &self,
        source: impl AsRef<Path>,
        destination: impl AsRef<Path>,
        overwrite: bool,
    ) -> Result<()> {
        let (source, destination) = (source.as_ref(), destination.as_ref());
        let context = || {
            format!(
                "failed to copy files from {} to {}",
                source.display(),
                destination.display()
            )
        };

        let src = ensure_not_top_level(source).context(context)?;
        let dst = ensure_not_top_level(destination).context(context)?;
        self.run(|| util::copy_files(&src, &dst, overwrite))
            .context(context)
    }

    /// Create a directory and its parents with the given modification time
    ///
    /// # Errors
    /// Returns error if the directory cannot be created
    pub fn create_directory(&self, path: impl AsRef<Path>, mod_time: SystemTime) -> Result<PathBuf> {
        let path = path.as_ref();
        let context = || format!("failed to create directory {}", path.display());

        let target = absolute_path(path).context(context)?;
        self.run(|| util::create_directory(&target, mod_time))
            .context(context)
    }

    /// Remove a directory tree; a missing directory counts as removed
    ///
    /// # Errors
    /// Returns error if the path is prohibited or removal fails
    pub fn delete_directory(&self, directory: impl AsRef<Path>) -> Result<()> {
        let directory = directory.as_ref();
        let context = || format!("failed to remove host directory {}", directory.display());

        let dir = ensure_not_top_level(directory).context(context)?;
        self.run(|| util::remove_directory(&dir)).context(context)
    }

    /// Remove a file or directory tree
    ///
    /// # Errors
    /// Returns error if the path is prohibited or removal fails
    pub fn delete_path(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let context = || format!("failed to delete path {}", path.display());

        let target = ensure_not_top_level(path).context(context)?;
        self.run(|| util::remove_path(&target)).context(context)
    }

    /// List a directory, sorted by name
    ///
    /// # Errors
    /// Returns error if the directory cannot be read
    pub fn read_directory(&self, directory: impl AsRef<Path>) -> Result<Vec<DirEntryInfo>> {
        let directory = directory.as_ref();
        let context = || format!("failed to read directory {}", directory.display());

        let dir = absolute_path(directory).context(context)?;
        self.run(|| util::read_directory(&dir)).context(context)
    }

    /// Read a whole file as text
    ///
    /// # Errors
    /// Returns error if the file cannot be read or is not UTF-8
    pub fn read_file_content(&self, path: impl AsRef<Path>) -> Result<String> {
        let path = path.as_ref();
        let context = || format!("failed to read file content of {}", path.display());

        let file = absolute_path(path).context(context)?;
        self.run(|| util::read_file_content(&file)).context(context)
    }

    /// Replace a file's content
    ///
    /// # Errors
    /// Returns error if the file cannot be written
    pub fn write_file(&self, path: impl AsRef<Path>, data: impl AsRef<[u8]>) -> Result<()> {
        let (path, data) = (path.as_ref(), data.as_ref());
        let context = || format!("failed to write file {}", path.display());

        let file = absolute_path(path).context(context)?;
        self.run(|| util::write_file(&file, data)).context(context)
    }

    /// Flush a file to disk
    ///
    /// # Errors
    /// Returns error if the file cannot be opened or synced
    pub fn sync_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let context = || format!("failed to sync file {}", path.display());

        let file = absolute_path(path).context(context)?;
        self.run(|| util::sync_file(&file)).context(context)
    }

    /// Metadata of a path
    ///
    /// # Errors
    /// Returns error if the path cannot be stat'ed
    pub fn get_file_info(&self, path: impl AsRef<Path>) -> Result<Metadata> {
        let path = path.as_ref();
        let context = || format!("failed to get file info of {}", path.display());

        let file = absolute_path(path).context(context)?;
        self.run(|| util::file_info(&file)).context(context)
    }

    /// Empty regular files below a directory
    ///
    /// # Errors
    /// Returns error if the tree cannot be walked
    pub fn get_empty_files(&self, directory: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
        let directory = directory.as_ref();
        let context = || format!("failed to get empty files in {}", directory.display());

        let dir = absolute_path(directory).context(context)?;
        self.run(|| util::empty_files(&dir)).context(context)
    }

    /// Usage of the filesystem holding a path
    ///
    /// # Errors
    /// Returns error if statvfs(3) fails
    pub fn get_disk_stat(&self, path: impl AsRef<Path>) -> Result<DiskStat> {
        let path = path.as_ref();
        let context = || format!("failed to get disk stat {}", path.display());

        let target = absolute_path(path).context(context)?;
        self.run(|| util::disk_stat(&target)).context(context)
    }

    /// Open and exclusively lock a file, blocking until granted
    ///
    /// # Errors
    /// Returns error if the file cannot be opened or locked
    pub fn lock_file(&self, path: impl AsRef<Path>) -> Result<Flock<File>> {
        let path = path.as_ref();
        let context = || format!("failed to lock file {}", path.display());

        let file = absolute_path(path).context(context)?;
        self.run(|| util::lock_file(&file)).context(context)
    }
}
