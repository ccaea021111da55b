//! Best-effort watcher for the session description file ffmpeg writes when
//! streaming with `-sdp_file`.

use std::path::{Path, PathBuf};

use fj_core::config::ArtifactPollConfig;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::progress::ArtifactFn;

/// Check for `path` every `config.interval()` up to `config.attempts` times
/// and invoke `callback` the first time it exists.
///
/// Returns whether the callback fired. Stops early when `cancel` fires.
pub async fn poll_for_artifact(
    path: &Path,
    callback: &ArtifactFn,
    config: ArtifactPollConfig,
    cancel: &CancellationToken,
) -> bool {
    for attempt in 0..config.attempts {
        if tokio::fs::try_exists(path).await.unwrap_or(false) {
            tracing::debug!("session description {} ready after {attempt} polls", path.display());
            callback(path);
            return true;
        }
        tokio::select! {
            _ = cancel.cancelled() => return false,
            _ = tokio::time::sleep(config.interval()) => {}
        }
    }
    tracing::debug!("session description {} never appeared", path.display());
    false
}

/// Run [`poll_for_artifact`] on its own task.
pub fn spawn_artifact_poller(
    path: PathBuf,
    callback: ArtifactFn,
    config: ArtifactPollConfig,
    cancel: CancellationToken,
) -> JoinHandle<bool> {
    tokio::spawn(async move { poll_for_artifact(&path, &callback, config, &cancel).await })
}
