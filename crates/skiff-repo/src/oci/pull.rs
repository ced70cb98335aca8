//! Bounded concurrent layer pulls

use futures::{StreamExt, TryStreamExt};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use skiff_core::archive;
use skiff_core::checksums::hash_bytes;
use skiff_core::oci::Descriptor;

use super::PackageRemote;
use crate::error::{RepoError, Result};

const PROGRESS_INTERVAL: Duration = Duration::from_millis(200);

/// Bytes written so far against the expected total
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PullProgress {
    pub written: u64,
    pub total: u64,
}

pub type ProgressFn = Arc<dyn Fn(PullProgress) + Send + Sync>;

/// Pull `layers` into `dest`, each to the path in its title annotation, with
/// at most `concurrency` fetches in flight.
///
/// When `progress` is given, a polling task reports the size of `dest` until
/// the pull finishes; it is always joined before returning.
pub async fn pull_layers(
    remote: &dyn PackageRemote,
    dest: &Path,
    layers: &[Descriptor],
    concurrency: usize,
    progress: Option<ProgressFn>,
) -> Result<()> {
    let total = layers.iter().map(|l| l.size.max(0) as u64).sum();
    tracing::debug!(
        reference = remote.reference(),
        layers = layers.len(),
        total,
        concurrency,
        "pulling layers"
    );
    tokio::fs::create_dir_all(dest).await?;

    let reporter = progress.map(|report| ProgressTask::spawn(dest.to_path_buf(), total, report));

    let pulls: Vec<_> = layers.iter().map(|layer| pull_layer(remote, dest, layer)).collect();
    let result = futures::stream::iter(pulls)
        .buffer_unordered(concurrency.max(1))
        .try_collect::<Vec<()>>()
        .await;

    if let Some(reporter) = reporter {
        reporter.finish().await?;
    }
    result.map(|_| ())
}

async fn pull_layer(remote: &dyn PackageRemote, dest: &Path, layer: &Descriptor) -> Result<()> {
    let title = layer.title().ok_or_else(|| RepoError::OciError {
        message: format!("layer {} has no title annotation", layer.digest),
    })?;
    let rel = Path::new(title);
    if !rel.components().all(|c| matches!(c, Component::Normal(_))) {
        return Err(RepoError::OciError {
            message: format!("layer title {title:?} escapes the package directory"),
        });
    }

    let data = remote.fetch_blob(layer).await?;
    if layer.digest.starts_with("sha256:") {
        let actual = format!("sha256:{}", hash_bytes(&data));
        if actual != layer.digest {
            return Err(RepoError::DigestMismatch {
                path: title.to_string(),
                expected: layer.digest.clone(),
                actual,
            });
        }
    }

    let path = dest.join(rel);
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(&path, &data).await?;
    tracing::debug!(path = title, size = data.len(), "pulled layer");
    Ok(())
}

struct ProgressTask {
    done: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

impl ProgressTask {
    fn spawn(dir: PathBuf, total: u64, report: ProgressFn) -> Self {
        let (done, mut stop) = oneshot::channel();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(PROGRESS_INTERVAL);
            loop {
                tokio::select! {
                    _ = &mut stop => break,
                    _ = ticker.tick() => {
                        report(PullProgress { written: measure(&dir).await, total });
                    }
                }
            }
            report(PullProgress {
                written: measure(&dir).await,
                total,
            });
        });
        Self { done, handle }
    }

    async fn finish(self) -> Result<()> {
        // The task may already have exited; a closed channel is fine.
        let _ = self.done.send(());
        self.handle.await?;
        Ok(())
    }
}

async fn measure(dir: &Path) -> u64 {
    let dir = dir.to_path_buf();
    match tokio::task::spawn_blocking(move || archive::dir_size(&dir)).await {
        Ok(Ok(size)) => size,
        _ => 0,
    }
}
