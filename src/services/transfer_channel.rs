//! Upload queue: runs file uploads concurrently and reports their lifecycle
//!
//! Each enqueued path gets its own [`UploadId`] and tokio task. The task
//! waits for a concurrency slot, uploads through [`UploadApi`], and sends
//! [`TransferEvent`]s over an unbounded channel. Events of different files
//! interleave freely.

use crate::model::file_record::format_size;
use crate::model::transfer_event::TransferEvent;
use crate::model::upload_item::UploadId;
use crate::services::api_client::{file_name, ProgressFn, UploadApi};
use crate::services::task_registry::TaskRegistry;
use crate::settings::app_config::AppConfig;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::Semaphore;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UploadOptions {
    /// Uploads allowed to run at the same time
    pub concurrency: usize,
    /// Larger files fail without touching the network
    pub max_file_size: u64,
    pub is_private: bool,
}

impl Default for UploadOptions {
    fn default() -> Self {
        UploadOptions {
            concurrency: 3,
            max_file_size: 10 * 1024 * 1024,
            is_private: true,
        }
    }
}

impl From<&AppConfig> for UploadOptions {
    fn from(config: &AppConfig) -> Self {
        UploadOptions {
            concurrency: config.upload_concurrency.max(1),
            max_file_size: config.max_file_size,
            is_private: config.private_uploads,
        }
    }
}

pub struct UploadQueue {
    api: Arc<dyn UploadApi>,
    options: UploadOptions,
    registry: TaskRegistry,
    permits: Arc<Semaphore>,
    events: UnboundedSender<TransferEvent>,
}

impl UploadQueue {
    pub fn new(
        api: Arc<dyn UploadApi>,
        options: UploadOptions,
    ) -> (Self, UnboundedReceiver<TransferEvent>) {
        let (events, events_rx) = mpsc::unbounded_channel();
        let queue = UploadQueue {
            api,
            options,
            registry: TaskRegistry::new(),
            permits: Arc::new(Semaphore::new(options.concurrency.max(1))),
            events,
        };
        (queue, events_rx)
    }

    pub fn options(&self) -> UploadOptions {
        self.options
    }

    /// Start uploading `paths`. `Started` is sent for each before this returns.
    pub async fn enqueue(&self, paths: Vec<PathBuf>) -> Vec<UploadId> {
        let mut ids = Vec::with_capacity(paths.len());
        for path in paths {
            let id = UploadId::generate();
            let name = file_name(&path);
            tracing::info!("queueing {} as {}", path.display(), id);
            let _ = self.events.send(TransferEvent::Started {
                id,
                file_name: name.clone(),
            });

            let job = UploadJob {
                id,
                path,
                api: self.api.clone(),
                options: self.options,
                events: self.events.clone(),
            };
            let permits = self.permits.clone();
            let registry = self.registry.clone();
            let events = self.events.clone();
            self.registry
                .spawn_tracked(id, name, async move {
                    let event = match permits.acquire_owned().await {
                        Ok(_permit) => job.run().await,
                        Err(_) => TransferEvent::Failed {
                            id,
                            message: "Upload queue closed".to_string(),
                        },
                    };
                    if registry.finish(id).await {
                        let _ = events.send(event);
                    }
                })
                .await;
            ids.push(id);
        }
        ids
    }

    /// Abort one upload. Returns false if it had already finished.
    pub async fn cancel(&self, id: UploadId) -> bool {
        if self.registry.cancel(id).await {
            tracing::info!("cancelled {}", id);
            let _ = self.events.send(TransferEvent::Cancelled { id });
            true
        } else {
            false
        }
    }

    pub async fn cancel_all(&self) -> Vec<UploadId> {
        let cancelled = self.registry.cancel_all().await;
        for id in &cancelled {
            let _ = self.events.send(TransferEvent::Cancelled { id: *id });
        }
        if !cancelled.is_empty() {
            tracing::info!("cancelled {} uploads", cancelled.len());
        }
        cancelled
    }

    pub async fn active_count(&self) -> usize {
        self.registry.active_count().await
    }
}

struct UploadJob {
    id: UploadId,
    path: PathBuf,
    api: Arc<dyn UploadApi>,
    options: UploadOptions,
    events: UnboundedSender<TransferEvent>,
}

impl UploadJob {
    /// Upload the file and return its terminal event
    async fn run(self) -> TransferEvent {
        let id = self.id;
        let size = match tokio::fs::metadata(&self.path).await {
            Ok(metadata) => metadata.len(),
            Err(e) => {
                tracing::warn!("cannot read {}: {}", self.path.display(), e);
                return TransferEvent::Failed {
                    id,
                    message: format!("Cannot read file: {}", e),
                };
            }
        };
        if size > self.options.max_file_size {
            return TransferEvent::Failed {
                id,
                message: format!(
                    "File is too large ({}), the maximum is {}",
                    format_size(size as i64),
                    format_size(self.options.max_file_size as i64)
                ),
            };
        }

        let events = self.events.clone();
        let last_sent = Arc::new(AtomicU64::new(0));
        let on_progress: ProgressFn = Arc::new(move |sent, total| {
            let pct = if total == 0 { 100 } else { (sent.min(total) * 100) / total };
            // one event per whole percent
            if last_sent.fetch_max(pct, Ordering::SeqCst) < pct {
                let _ = events.send(TransferEvent::Progress {
                    id,
                    completed: pct as f64,
                });
            }
        });

        match self
            .api
            .upload_file(self.path.clone(), self.options.is_private, on_progress)
            .await
        {
            Ok(reply) => {
                tracing::info!("{} finished with status {}", id, reply.status);
                TransferEvent::Finished { id, reply }
            }
            Err(e) => {
                tracing::warn!("{} failed: {}", id, e);
                TransferEvent::Failed {
                    id,
                    message: e.upload_message(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::error::{ApiError, ApiResult};
    use crate::model::transfer_event::UploadReply;
    use async_trait::async_trait;
    use std::io::Write;
    use std::path::Path;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;
    use tempfile::TempDir;

    /// Fake transport: reports progress in quarters, then answers
    struct FakeUploader {
        delay: Duration,
        status: u16,
        calls: AtomicUsize,
        running: AtomicUsize,
        peak: AtomicUsize,
    }

    impl FakeUploader {
        fn new(delay: Duration, status: u16) -> Arc<Self> {
            Arc::new(FakeUploader {
                delay,
                status,
                calls: AtomicUsize::new(0),
                running: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl UploadApi for FakeUploader {
        async fn upload_file(
            &self,
            _path: PathBuf,
            _is_private: bool,
            on_progress: ProgressFn,
        ) -> ApiResult<UploadReply> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            for sent in [25, 50, 50, 75, 100] {
                on_progress(sent, 100);
                tokio::time::sleep(self.delay / 4).await;
            }
            self.running.fetch_sub(1, Ordering::SeqCst);
            if (200..300).contains(&self.status) {
                Ok(UploadReply::new(self.status, r#"{"success":true,"files":[]}"#))
            } else {
                Err(ApiError::from_status(self.status, r#"{"error":"disk full"}"#))
            }
        }
    }

    fn write_file(dir: &TempDir, name: &str, len: usize) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(&vec![b'x'; len]).unwrap();
        path
    }

    async fn drain(rx: &mut UnboundedReceiver<TransferEvent>, terminal: usize) -> Vec<TransferEvent> {
        let mut events = Vec::new();
        let mut seen = 0;
        while seen < terminal {
            let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
                .await
                .expect("timed out waiting for transfer events")
                .expect("channel closed");
            if event.is_terminal() {
                seen += 1;
            }
            events.push(event);
        }
        events
    }

    fn events_for(events: &[TransferEvent], id: UploadId) -> Vec<&TransferEvent> {
        events.iter().filter(|e| e.id() == id).collect()
    }

    #[tokio::test]
    async fn test_successful_upload_lifecycle() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "a.txt", 16);
        let (queue, mut rx) = UploadQueue::new(FakeUploader::new(Duration::from_millis(4), 201), UploadOptions::default());

        let ids = queue.enqueue(vec![path]).await;
        let events = drain(&mut rx, 1).await;

        assert!(matches!(&events[0], TransferEvent::Started { file_name, .. } if file_name == "a.txt"));
        let progress: Vec<f64> = events
            .iter()
            .filter_map(|e| match e {
                TransferEvent::Progress { completed, .. } => Some(*completed),
                _ => None,
            })
            .collect();
        assert_eq!(progress, vec![25.0, 50.0, 75.0, 100.0]);
        assert!(matches!(events.last(), Some(TransferEvent::Finished { id, reply }) if *id == ids[0] && reply.status == 201));
    }

    #[tokio::test]
    async fn test_oversized_file_fails_without_network() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "big.bin", 2048);
        let api = FakeUploader::new(Duration::from_millis(1), 201);
        let options = UploadOptions {
            max_file_size: 1024,
            ..UploadOptions::default()
        };
        let (queue, mut rx) = UploadQueue::new(api.clone(), options);

        queue.enqueue(vec![path]).await;
        let events = drain(&mut rx, 1).await;

        assert!(matches!(events.last(), Some(TransferEvent::Failed { message, .. }) if message.contains("too large")));
        assert_eq!(api.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_server_rejection_carries_message() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "a.txt", 16);
        let (queue, mut rx) = UploadQueue::new(FakeUploader::new(Duration::from_millis(1), 500), UploadOptions::default());

        queue.enqueue(vec![path]).await;
        let events = drain(&mut rx, 1).await;
        assert!(matches!(events.last(), Some(TransferEvent::Failed { message, .. }) if message == "disk full"));
    }

    #[tokio::test]
    async fn test_missing_file_fails() {
        let (queue, mut rx) = UploadQueue::new(FakeUploader::new(Duration::from_millis(1), 201), UploadOptions::default());
        queue.enqueue(vec![Path::new("/no/such/file.txt").to_path_buf()]).await;
        let events = drain(&mut rx, 1).await;
        assert!(matches!(events.last(), Some(TransferEvent::Failed { .. })));
    }

    #[tokio::test]
    async fn test_cancel_emits_single_terminal_event() {
        let dir = TempDir::new().unwrap();
        let slow = write_file(&dir, "slow.txt", 16);
        let fast = write_file(&dir, "fast.txt", 16);
        let options = UploadOptions {
            concurrency: 1,
            ..UploadOptions::default()
        };
        let (queue, mut rx) = UploadQueue::new(FakeUploader::new(Duration::from_millis(400), 201), options);

        let ids = queue.enqueue(vec![slow, fast]).await;
        assert!(queue.cancel(ids[0]).await);
        assert!(!queue.cancel(ids[0]).await);

        let events = drain(&mut rx, 2).await;
        let slow_terminal: Vec<_> = events_for(&events, ids[0])
            .into_iter()
            .filter(|e| e.is_terminal())
            .collect();
        assert_eq!(slow_terminal, vec![&TransferEvent::Cancelled { id: ids[0] }]);
        assert!(events_for(&events, ids[1])
            .iter()
            .any(|e| matches!(e, TransferEvent::Finished { .. })));
    }

    #[tokio::test]
    async fn test_concurrency_limit() {
        let dir = TempDir::new().unwrap();
        let paths: Vec<_> = (0..4).map(|i| write_file(&dir, &format!("{}.txt", i), 8)).collect();
        let api = FakeUploader::new(Duration::from_millis(20), 201);
        let options = UploadOptions {
            concurrency: 2,
            ..UploadOptions::default()
        };
        let (queue, mut rx) = UploadQueue::new(api.clone(), options);

        queue.enqueue(paths).await;
        drain(&mut rx, 4).await;
        assert_eq!(api.calls.load(Ordering::SeqCst), 4);
        assert!(api.peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_cancel_all() {
        let dir = TempDir::new().unwrap();
        let paths: Vec<_> = (0..3).map(|i| write_file(&dir, &format!("{}.txt", i), 8)).collect();
        let (queue, mut rx) = UploadQueue::new(FakeUploader::new(Duration::from_secs(5), 201), UploadOptions::default());

        let ids = queue.enqueue(paths).await;
        assert_eq!(queue.cancel_all().await, ids);
        let events = drain(&mut rx, 3).await;
        assert!(events
            .iter()
            .filter(|e| e.is_terminal())
            .all(|e| matches!(e, TransferEvent::Cancelled { .. })));
        assert_eq!(queue.active_count().await, 0);
    }
}
