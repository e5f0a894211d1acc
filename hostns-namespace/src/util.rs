//! Plain filesystem helpers
//!
//! None of these switch namespaces; they act in whatever namespace the
//! calling thread is in. [`crate::fs::HostFs`] decides where they run.

use std::fs::{self, DirBuilder, File, FileTimes, OpenOptions};
use std::io;
use std::os::unix::fs::{DirBuilderExt, OpenOptionsExt, PermissionsExt};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use hostns_core::constants::DEFAULT_FILE_MODE;
use hostns_core::{DiskStat, Result};
use nix::fcntl::{Flock, FlockArg};
use nix::sys::statvfs::statvfs;
use serde::Serialize;

/// Kind of a directory entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    /// Regular file
    File,
    /// Directory
    Dir,
    /// Symbolic link
    Symlink,
    /// Device, socket or fifo
    Other,
}

impl From<fs::FileType> for EntryKind {
    fn from(file_type: fs::FileType) -> Self {
        if file_type.is_symlink() {
            Self::Symlink
        } else if file_type.is_dir() {
            Self::Dir
        } else if file_type.is_file() {
            Self::File
        } else {
            Self::Other
        }
    }
}

/// Directory entry captured inside the namespace it was read from
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirEntryInfo {
    /// File name, lossily converted to UTF-8
    pub name: String,
    /// Full path
    pub path: PathBuf,
    /// Entry kind
    pub kind: EntryKind,
}

/// Copy `source` to `destination`, recursing into directories
///
/// Existing destination files are kept unless `overwrite` is set.
/// Non-regular files are skipped.
pub fn copy_files(source: &Path, destination: &Path, overwrite: bool) -> Result<()> {
    let metadata = fs::symlink_metadata(source)?;

    if metadata.is_dir() {
        DirBuilder::new()
            .recursive(true)
            .mode(metadata.permissions().mode())
            .create(destination)?;
        for entry in fs::read_dir(source)? {
            let entry = entry?;
            copy_files(&entry.path(), &destination.join(entry.file_name()), overwrite)?;
        }
        return Ok(());
    }

    if !metadata.is_file() {
        tracing::warn!(path = %source.display(), "Skipping non-regular file");
        return Ok(());
    }

    if !overwrite && destination.exists() {
        tracing::warn!(path = %destination.display(), "File already exists, not overwriting");
        return Ok(());
    }

    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::copy(source, destination)?;
    Ok(())
}

/// Create `path` and its parents, stamping access and modification times
pub fn create_directory(path: &Path, mod_time: SystemTime) -> Result<PathBuf> {
    fs::create_dir_all(path)?;
    let times = FileTimes::new().set_accessed(mod_time).set_modified(mod_time);
    File::open(path)?.set_times(times)?;
    Ok(path.to_path_buf())
}

/// Remove a directory tree; a missing directory is not an error
pub fn remove_directory(path: &Path) -> Result<()> {
    match fs::symlink_metadata(path) {
        Ok(_) => Ok(fs::remove_dir_all(path)?),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Remove a file or directory tree; a missing path is not an error
pub fn remove_path(path: &Path) -> Result<()> {
    let result = match fs::symlink_metadata(path) {
        Ok(metadata) if metadata.is_dir() => fs::remove_dir_all(path),
        Ok(_) => fs::remove_file(path),
        Err(e) => Err(e),
    };

    match result {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => Ok(other?),
    }
}

/// Entries of `path`, sorted by name
pub fn read_directory(path: &Path) -> Result<Vec<DirEntryInfo>> {
    let mut entries = fs::read_dir(path)?
        .map(|entry| -> io::Result<DirEntryInfo> {
            let entry = entry?;
            Ok(DirEntryInfo {
                name: entry.file_name().to_string_lossy().into_owned(),
                path: entry.path(),
                kind: entry.file_type()?.into(),
            })
        })
        .collect::<io::Result<Vec<_>>>()?;

    entries.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(entries)
}

/// Whole file as text
pub fn read_file_content(path: &Path) -> Result<String> {
    Ok(fs::read_to_string(path)?)
}

/// Replace the content of `path`, creating it with mode 0644
pub fn write_file(path: &Path, data: &[u8]) -> Result<()> {
    use std::io::Write;

    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(DEFAULT_FILE_MODE)
        .open(path)?;
    file.write_all(data)?;
    Ok(())
}

/// Flush file content and metadata to disk
pub fn sync_file(path: &Path) -> Result<()> {
    File::open(path)?.sync_all()?;
    Ok(())
}

/// Metadata of `path`, following symlinks
pub fn file_info(path: &Path) -> Result<fs::Metadata> {
    Ok(fs::metadata(path)?)
}

/// Paths of all empty regular files under `directory`, sorted
pub fn empty_files(directory: &Path) -> Result<Vec<PathBuf>> {
    fn walk(dir: &Path, found: &mut Vec<PathBuf>) -> io::Result<()> {
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let file_type = entry.file_type()?;
            if file_type.is_dir() {
                walk(&entry.path(), found)?;
            } else if file_type.is_file() && entry.metadata()?.len() == 0 {
                found.push(entry.path());
            }
        }
        Ok(())
    }

    let mut found = Vec::new();
    walk(directory, &mut found)?;
    found.sort();
    Ok(found)
}

/// Usage of the filesystem holding `path`
#[allow(clippy::useless_conversion)]
pub fn disk_stat(path: &Path) -> Result<DiskStat> {
    let stat = statvfs(path)?;
    Ok(DiskStat::from_blocks(
        path,
        u64::from(stat.filesystem_id()),
        u64::from(stat.fragment_size()),
        u64::from(stat.blocks()),
        u64::from(stat.blocks_free()),
        u64::from(stat.blocks_available()),
    ))
}

/// Open (creating if needed) and exclusively `flock(2)` a file
///
/// Blocks until the lock is granted.
pub fn lock_file(path: &Path) -> Result<Flock<File>> {
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .mode(DEFAULT_FILE_MODE)
        .open(path)?;

    Flock::lock(file, FlockArg::LockExclusive).map_err(|(_, errno)| errno.into())
}

/// Release a lock taken by [`lock_file`] and close the file
pub fn unlock_file(lock: Flock<File>) -> Result<()> {
    lock.unlock().map_err(|(_, errno)| errno)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_copy_files_recursive() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();
        fs::create_dir_all(src.path().join("a/b")).unwrap();
        fs::write(src.path().join("a/b/c.txt"), "hello").unwrap();
        fs::write(src.path().join("top.txt"), "top").unwrap();

        let target = dst.path().join("copy");
        copy_files(src.path(), &target, false).unwrap();

        assert_eq!(fs::read_to_string(target.join("a/b/c.txt")).unwrap(), "hello");
        assert_eq!(fs::read_to_string(target.join("top.txt")).unwrap(), "top");
    }

    #[test]
    fn test_copy_files_respects_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src.txt");
        let dst = dir.path().join("dst.txt");
        fs::write(&src, "new").unwrap();
        fs::write(&dst, "old").unwrap();

        copy_files(&src, &dst, false).unwrap();
        assert_eq!(fs::read_to_string(&dst).unwrap(), "old");

        copy_files(&src, &dst, true).unwrap();
        assert_eq!(fs::read_to_string(&dst).unwrap(), "new");
    }

    #[test]
    fn test_create_directory_sets_mtime() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x/y");
        let mtime = SystemTime::UNIX_EPOCH + Duration::from_secs(1_600_000_000);

        let created = create_directory(&path, mtime).unwrap();

        assert_eq!(created, path);
        assert!(path.is_dir());
        assert_eq!(fs::metadata(&path).unwrap().modified().unwrap(), mtime);
    }

    #[test]
    fn test_remove_missing_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        remove_directory(&dir.path().join("gone")).unwrap();
        remove_path(&dir.path().join("gone")).unwrap();
    }

    #[test]
    fn test_remove_path_file_and_tree() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("f");
        let tree = dir.path().join("t/u");
        fs::write(&file, "x").unwrap();
        fs::create_dir_all(&tree).unwrap();

        remove_path(&file).unwrap();
        remove_path(&dir.path().join("t")).unwrap();

        assert!(!file.exists());
        assert!(!tree.exists());
    }

    #[test]
    fn test_read_directory_sorted() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b"), "").unwrap();
        fs::write(dir.path().join("a"), "").unwrap();
        fs::create_dir(dir.path().join("c")).unwrap();

        let entries = read_directory(dir.path()).unwrap();
        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();

        assert_eq!(names, ["a", "b", "c"]);
        assert_eq!(entries[2].kind, EntryKind::Dir);
        assert_eq!(entries[0].kind, EntryKind::File);
    }

    #[test]
    fn test_write_file_mode_and_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data");

        write_file(&path, b"first").unwrap();
        write_file(&path, b"2").unwrap();

        assert_eq!(read_file_content(&path).unwrap(), "2");
        let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode & 0o700, 0o600);
        assert_eq!(mode & 0o111, 0);
        sync_file(&path).unwrap();
    }

    #[test]
    fn test_empty_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("empty"), "").unwrap();
        fs::write(dir.path().join("sub/also-empty"), "").unwrap();
        fs::write(dir.path().join("full"), "data").unwrap();

        let found = empty_files(dir.path()).unwrap();

        assert_eq!(
            found,
            vec![dir.path().join("empty"), dir.path().join("sub/also-empty")]
        );
    }

    #[test]
    fn test_disk_stat() {
        let dir = tempfile::tempdir().unwrap();
        let stat = disk_stat(dir.path()).unwrap();

        assert_eq!(stat.path, dir.path());
        assert!(stat.block_size > 0);
        assert!(stat.storage_maximum >= stat.storage_available);
    }

    #[test]
    fn test_lock_and_unlock_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lock");

        let lock = lock_file(&path).unwrap();
        assert!(path.exists());

        let other = File::open(&path).unwrap();
        let contended = Flock::lock(other, FlockArg::LockExclusiveNonblock);
        assert!(contended.is_err());

        unlock_file(lock).unwrap();

        let other = File::open(&path).unwrap();
        assert!(Flock::lock(other, FlockArg::LockExclusiveNonblock).is_ok());
    }
}
