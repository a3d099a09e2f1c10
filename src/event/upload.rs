//! Uploading local files and directory trees.

use std::collections::HashSet;
use std::path::PathBuf;

use camino::Utf8Path;
use tokio::fs;
use tracing::{debug, warn};

use crate::session::{RemoteSession, SessionError};

use super::CopiedPaths;

/// Uploads `local` to `remote`, walking directories.
///
/// Every file that reaches the remote is registered in `copied` as soon as
/// it lands, so a partially uploaded tree can still be cleaned up.
/// Directory creation errors are ignored because the directory may already
/// exist; faults are not. Symbolic links are followed, and a directory
/// reached twice through links is walked once.
pub(super) async fn upload_path<S: RemoteSession + ?Sized>(
    session: &S,
    local: &Utf8Path,
    remote: &str,
    copied: &mut CopiedPaths,
) -> Result<usize, SessionError> {
    let metadata = fs::metadata(local)
        .await
        .map_err(|err| SessionError::transfer(local.as_str(), err.to_string()))?;

    if !metadata.is_dir() {
        session.upload_file(local, remote).await?;
        copied.insert(remote);
        return Ok(1);
    }

    let mut uploaded = 0;
    let mut visited: HashSet<PathBuf> = HashSet::new();
    let mut pending = vec![(local.to_path_buf(), remote.to_owned())];
    while let Some((local_dir, remote_dir)) = pending.pop() {
        let real = fs::canonicalize(&local_dir)
            .await
            .map_err(|err| SessionError::transfer(local_dir.as_str(), err.to_string()))?;
        if !visited.insert(real) {
            warn!(path = %local_dir, "skipping directory already uploaded through a link");
            continue;
        }
        ensure_remote_dir(session, &remote_dir).await?;

        let (files, dirs) = list_dir(&local_dir).await?;
        for name in files {
            let remote_file = join_remote(&remote_dir, &name);
            session
                .upload_file(&local_dir.join(&name), &remote_file)
                .await?;
            copied.insert(remote_file);
            uploaded += 1;
        }
        // Reversed so that popping visits subdirectories in name order.
        for name in dirs.into_iter().rev() {
            pending.push((local_dir.join(&name), join_remote(&remote_dir, &name)));
        }
    }

    Ok(uploaded)
}

async fn ensure_remote_dir<S: RemoteSession + ?Sized>(
    session: &S,
    remote_dir: &str,
) -> Result<(), SessionError> {
    match session.make_dir(remote_dir).await {
        Err(err) if err.is_fault() => Err(err),
        Err(err) => {
            debug!(path = remote_dir, error = %err, "ignoring remote mkdir failure");
            Ok(())
        }
        Ok(()) => Ok(()),
    }
}

/// Returns the sorted file and subdirectory names directly under `dir`.
///
/// Entries are classified by what they point at, so a link to a directory
/// is listed as a directory.
async fn list_dir(dir: &Utf8Path) -> Result<(Vec<String>, Vec<String>), SessionError> {
    let read_error = |err: std::io::Error| SessionError::transfer(dir.as_str(), err.to_string());

    let mut files = Vec::new();
    let mut dirs = Vec::new();
    let mut reader = fs::read_dir(dir).await.map_err(read_error)?;
    while let Some(item) = reader.next_entry().await.map_err(read_error)? {
        let name = item.file_name().into_string().map_err(|raw| {
            SessionError::transfer(
                dir.as_str(),
                format!("file name {} is not valid UTF-8", raw.to_string_lossy()),
            )
        })?;
        let target = fs::metadata(item.path())
            .await
            .map_err(|err| SessionError::transfer(dir.join(&name).as_str(), err.to_string()))?;
        if target.is_dir() {
            dirs.push(name);
        } else {
            files.push(name);
        }
    }
    files.sort();
    dirs.sort();
    Ok((files, dirs))
}

fn join_remote(dir: &str, name: &str) -> String {
    if dir.is_empty() {
        name.to_owned()
    } else {
        format!("{}/{name}", dir.trim_end_matches('/'))
    }
}
