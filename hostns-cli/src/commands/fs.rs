//! Host filesystem commands

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use hostns_namespace::{EntryKind, HostFs};
use serde::Serialize;

/// `stat` output
#[derive(Debug, Serialize)]
struct FileInfo {
    path: PathBuf,
    kind: &'static str,
    size: u64,
    mode: String,
    modified: Option<u64>,
}

pub fn list(host: &HostFs, path: &Path) -> Result<()> {
    let entries = host.read_directory(path)?;
    for entry in entries {
        let kind = match entry.kind {
            EntryKind::File => "file",
            EntryKind::Dir => "dir",
            EntryKind::Symlink => "symlink",
            EntryKind::Other => "other",
        };
        println!("{kind:<8}{}", entry.name);
    }
    Ok(())
}

pub fn cat(host: &HostFs, path: &Path) -> Result<()> {
    print!("{}", host.read_file_content(path)?);
    Ok(())
}

pub fn write(host: &HostFs, path: &Path, data: &[u8], sync: bool) -> Result<()> {
    host.write_file(path, data)?;
    if sync {
        host.sync_file(path)?;
    }
    tracing::info!(path = %path.display(), bytes = data.len(), "Wrote file");
    Ok(())
}

pub fn mkdir(host: &HostFs, path: &Path, mtime: Option<u64>) -> Result<()> {
    let mod_time = mtime.map_or_else(SystemTime::now, |secs| UNIX_EPOCH + Duration::from_secs(secs));
    let created = host.create_directory(path, mod_time)?;
    println!("{}", created.display());
    Ok(())
}

pub fn remove(host: &HostFs, path: &Path, recursive_dir: bool) -> Result<()> {
    if recursive_dir {
        host.delete_directory(path)?;
    } else {
        host.delete_path(path)?;
    }
    Ok(())
}

pub fn copy(host: &HostFs, source: &Path, destination: &Path, overwrite: bool) -> Result<()> {
    host.copy_directory(source, destination, overwrite)?;
    Ok(())
}

pub fn stat(host: &HostFs, path: &Path) -> Result<()> {
    let metadata = host.get_file_info(path)?;
    let kind = if metadata.is_dir() {
        "dir"
    } else if metadata.is_file() {
        "file"
    } else {
        "other"
    };

    let info = FileInfo {
        path: path.to_path_buf(),
        kind,
        size: metadata.len(),
        mode: format!("{:o}", metadata.permissions().mode() & 0o7777),
        modified: metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_secs()),
    };

    println!("{}", serde_json::to_string_pretty(&info)?);
    Ok(())
}

pub fn disk_usage(host: &HostFs, path: &Path) -> Result<()> {
    let stat = host.get_disk_stat(path)?;
    tracing::debug!(
        path = %path.display(),
        total = %stat.storage_maximum,
        available = %stat.storage_available,
        "Disk usage"
    );
    println!(
        "{}",
        serde_json::to_string_pretty(&stat).context("Failed to encode disk stat")?
    );
    Ok(())
}

pub fn empty_files(host: &HostFs, path: &Path) -> Result<()> {
    for file in host.get_empty_files(path)? {
        println!("{}", file.display());
    }
    Ok(())
}
