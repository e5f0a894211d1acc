//! Lock command implementation

use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use hostns_namespace::HostEnvironment;

pub async fn execute(env: &HostEnvironment, path: &Path, hold: Duration) -> Result<()> {
    let mut lock = env.file_lock(path, None);
    tracing::debug!(path = %path.display(), timeout = ?lock.timeout(), "Acquiring file lock");

    lock.lock().await?;
    println!("locked {}", path.display());

    tokio::time::sleep(hold).await;

    lock.unlock_and_wait().await?;
    println!("released {}", path.display());
    Ok(())
}
