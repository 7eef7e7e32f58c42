//! Concurrent transfers of staged files to the image container.

use std::sync::Arc;

use imagedrop_storage::{ContainerAccessor, ContainerHandle, PutOutput};
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use tokio::task::JoinSet;

use crate::service::StagedFile;

/// Tracing target for transfer operations.
const TRACING_TARGET: &str = "imagedrop_server::service::transfer";

/// Whether an upload response waits for its transfers.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "config", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum TransferPolicy {
    /// Respond once every transfer has finished and report the counts.
    Wait,
    /// Respond immediately; a background task drains and logs the transfers.
    #[default]
    Detach,
}

/// Counts of a finished upload batch.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TransferSummary {
    /// Transfers that stored their blob.
    pub succeeded: usize,
    /// Files that were skipped while staging or failed to transfer.
    pub failed: usize,
}

/// Outcome of a single transfer.
#[derive(Debug)]
struct TransferOutcome {
    name: String,
    result: imagedrop_storage::Result<PutOutput>,
}

/// Starts transfers to the image container.
#[derive(Debug, Clone)]
pub struct TransferService {
    images: ContainerAccessor,
    policy: TransferPolicy,
}

impl TransferService {
    /// Creates a transfer service for the image container.
    pub fn new(images: ContainerAccessor, policy: TransferPolicy) -> Self {
        Self { images, policy }
    }

    /// Configured policy.
    pub fn policy(&self) -> TransferPolicy {
        self.policy
    }

    /// Starts a new batch, one per upload request.
    pub fn batch(&self) -> TransferBatch {
        TransferBatch {
            images: self.images.clone(),
            handle: Arc::new(OnceCell::new()),
            policy: self.policy,
            tasks: JoinSet::new(),
            skipped: 0,
        }
    }
}

/// Transfers belonging to one upload request.
///
/// Each staged file is transferred by its own task as soon as it is added, so
/// a slow or failing transfer never holds back the others. The image
/// container is opened at most once per batch.
#[derive(Debug)]
pub struct TransferBatch {
    images: ContainerAccessor,
    handle: Arc<OnceCell<ContainerHandle>>,
    policy: TransferPolicy,
    tasks: JoinSet<TransferOutcome>,
    skipped: usize,
}

impl TransferBatch {
    /// Starts transferring a staged file.
    pub fn spawn(&mut self, staged: StagedFile) {
        let images = self.images.clone();
        let handle = self.handle.clone();

        self.tasks.spawn(async move {
            let result = async {
                let container = handle.get_or_try_init(|| images.open()).await?;
                container.upload_file(&staged.name, &staged.path).await
            }
            .await;

            TransferOutcome {
                name: staged.name,
                result,
            }
        });
    }

    /// Records a file that never reached the transfer stage.
    pub fn skip(&mut self) {
        self.skipped += 1;
    }

    /// Number of transfers started so far.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Returns `true` if no transfer was started.
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Completes the batch according to the policy.
    ///
    /// With [`TransferPolicy::Wait`] this waits for every transfer and
    /// returns the counts. With [`TransferPolicy::Detach`] the transfers keep
    /// running in a background task and `None` is returned.
    pub async fn finish(self) -> Option<TransferSummary> {
        let Self {
            policy,
            tasks,
            skipped,
            ..
        } = self;

        match policy {
            TransferPolicy::Wait => Some(drain(tasks, skipped).await),
            TransferPolicy::Detach => {
                tokio::spawn(drain(tasks, skipped));
                None
            }
        }
    }
}

async fn drain(mut tasks: JoinSet<TransferOutcome>, skipped: usize) -> TransferSummary {
    let mut summary = TransferSummary {
        succeeded: 0,
        failed: skipped,
    };

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(TransferOutcome {
                name,
                result: Ok(output),
            }) => {
                summary.succeeded += 1;
                tracing::info!(
                    target: TRACING_TARGET,
                    file = %name,
                    size = output.size,
                    status = output.status,
                    e_tag = output.e_tag.as_deref().unwrap_or_default(),
                    "file transferred"
                );
            }
            Ok(TransferOutcome {
                name,
                result: Err(err),
            }) => {
                summary.failed += 1;
                tracing::error!(
                    target: TRACING_TARGET,
                    file = %name,
                    error = %err,
                    status = ?err.status(),
                    "file transfer failed"
                );
            }
            Err(err) => {
                summary.failed += 1;
                tracing::error!(
                    target: TRACING_TARGET,
                    error = %err,
                    "file transfer task aborted"
                );
            }
        }
    }

    tracing::debug!(
        target: TRACING_TARGET,
        succeeded = summary.succeeded,
        failed = summary.failed,
        "transfer batch completed"
    );

    summary
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use imagedrop_storage::{Error as StorageError, MemoryContainer};

    use super::*;

    async fn staged(dir: &std::path::Path, name: &str, data: &[u8]) -> StagedFile {
        let path = dir.join(name);
        tokio::fs::write(&path, data).await.unwrap();
        StagedFile {
            name: name.to_owned(),
            path,
            size: data.len() as u64,
        }
    }

    #[tokio::test]
    async fn one_failure_does_not_block_others() {
        let dir = tempfile::tempdir().unwrap();
        let images = Arc::new(MemoryContainer::new("images"));
        images.fail_put("bad.png", StorageError::transport("quota exceeded").with_status(403));

        let service = TransferService::new(ContainerAccessor::new(images.clone()), TransferPolicy::Wait);
        let mut batch = service.batch();
        batch.spawn(staged(dir.path(), "good.png", b"ok").await);
        batch.spawn(staged(dir.path(), "bad.png", b"no").await);
        assert_eq!(batch.len(), 2);

        let summary = batch.finish().await.unwrap();

        assert_eq!(summary, TransferSummary { succeeded: 1, failed: 1 });
        assert_eq!(images.blob_names(), vec!["good.png"]);
        assert_eq!(images.create_calls(), 1);
    }

    #[tokio::test]
    async fn skipped_files_count_as_failed() {
        let images = Arc::new(MemoryContainer::new("images"));
        let service = TransferService::new(ContainerAccessor::new(images), TransferPolicy::Wait);

        let mut batch = service.batch();
        batch.skip();
        assert!(batch.is_empty());

        let summary = batch.finish().await.unwrap();
        assert_eq!(summary, TransferSummary { succeeded: 0, failed: 1 });
    }

    #[tokio::test]
    async fn detached_batch_completes_in_background() {
        let dir = tempfile::tempdir().unwrap();
        let images = Arc::new(MemoryContainer::new("images"));
        let service = TransferService::new(ContainerAccessor::new(images.clone()), TransferPolicy::Detach);

        let mut batch = service.batch();
        batch.spawn(staged(dir.path(), "cat.png", b"meow").await);
        assert!(batch.finish().await.is_none());

        for _ in 0..100 {
            if images.blob("cat.png").is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(images.blob("cat.png").as_deref(), Some(&b"meow"[..]));
    }
}
