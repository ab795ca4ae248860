use indicatif::ProgressBar;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::{UploadConfig, default_parallelism};
use crate::s3::{S3UploadError, StorageClient, UploadJob, UploadResult, upload_file};

/// Aggregate outcome of a dispatch run, results in listing order
#[derive(Debug)]
pub struct RunReport {
    pub results: Vec<UploadResult>,
    pub elapsed: Duration,
}

impl RunReport {
    pub fn failed(&self) -> usize {
        self.results.iter().filter(|r| !r.is_success()).count()
    }

    pub fn succeeded(&self) -> usize {
        self.results.len() - self.failed()
    }

    /// True when every job succeeded, including the zero-job case
    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }
}

/// Fixed pool of upload workers fed from one shared FIFO queue
pub struct Dispatcher {
    client: Arc<dyn StorageClient>,
    config: Arc<UploadConfig>,
    cancel: CancellationToken,
    progress: Option<ProgressBar>,
}

impl Dispatcher {
    pub fn new(client: Arc<dyn StorageClient>, config: UploadConfig) -> Self {
        Self {
            client,
            config: Arc::new(config),
            cancel: CancellationToken::new(),
            progress: None,
        }
    }

    /// Advance `pb` once per finished job
    pub fn with_progress(mut self, pb: ProgressBar) -> Self {
        self.progress = Some(pb);
        self
    }

    /// Token that stops workers from starting further jobs
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Number of workers `run` starts; 0 means one per logical CPU
    pub fn worker_count(&self) -> usize {
        match self.config.parallelism {
            0 => default_parallelism(),
            n => n,
        }
    }

    /// Upload every path and wait for all workers to finish.
    ///
    /// Failed jobs never stop their siblings. Paths are enqueued in order;
    /// completion order is whatever the I/O produces.
    pub async fn run(&self, paths: Vec<String>) -> RunReport {
        let start = Instant::now();
        let parallelism = self.worker_count();

        if self.config.keys.is_fixed() && paths.len() > 1 {
            warn!(
                "A fixed target key is set but {} files matched; they will all be written to the same object",
                paths.len()
            );
        }

        info!(
            "Uploading {} file(s) to bucket {} with {} workers",
            paths.len(),
            self.config.bucket,
            parallelism
        );

        // Capacity 1 keeps the producer at most one job ahead of the workers
        let (work_tx, work_rx) = mpsc::channel::<UploadJob>(1);
        let (result_tx, mut result_rx) = mpsc::unbounded_channel::<UploadResult>();
        let work_rx = Arc::new(Mutex::new(work_rx));

        let mut workers = Vec::with_capacity(parallelism);
        for _ in 0..parallelism {
            let work_rx = Arc::clone(&work_rx);
            let client = Arc::clone(&self.client);
            let config = Arc::clone(&self.config);
            let cancel = self.cancel.clone();
            let progress = self.progress.clone();
            let result_tx = result_tx.clone();

            workers.push(tokio::spawn(async move {
                loop {
                    let job = {
                        let mut rx_guard = work_rx.lock().await;
                        rx_guard.recv().await
                    };

                    let Some(job) = job else {
                        break; // Channel closed
                    };

                    let result = if cancel.is_cancelled() {
                        UploadResult::failed(
                            &job,
                            None,
                            S3UploadError::Cancelled {
                                path: job.path.clone(),
                            },
                        )
                    } else {
                        upload_file(&job, &config, client.as_ref()).await
                    };

                    if let Some(e) = &result.error {
                        error!("Upload failed for {}: {}", result.path, e);
                    }
                    if let Some(pb) = &progress {
                        pb.inc(1);
                    }

                    let _ = result_tx.send(result);
                }
            }));
        }
        drop(result_tx); // Drop original sender

        // Producer: enqueue every path, then close the queue
        let total = paths.len();
        for (index, path) in paths.into_iter().enumerate() {
            if work_tx.send(UploadJob::new(index, path)).await.is_err() {
                error!("All upload workers exited before the queue was drained");
                break;
            }
        }
        drop(work_tx);

        for worker in workers {
            if let Err(e) = worker.await {
                error!("Upload worker panicked: {}", e);
            }
        }

        let mut results = Vec::with_capacity(total);
        while let Some(result) = result_rx.recv().await {
            results.push(result);
        }
        results.sort_by_key(|r| r.index);

        let report = RunReport {
            results,
            elapsed: start.elapsed(),
        };
        info!(
            "Finished: {} succeeded, {} failed in {:.2?}",
            report.succeeded(),
            report.failed(),
            report.elapsed
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::s3::UploadStatus;
    use crate::s3::upload::tests::{RecordingClient, test_config};
    use std::fs;
    use std::sync::atomic::Ordering;
    use tempfile::TempDir;

    fn write_files(dir: &TempDir, names: &[&str]) -> Vec<String> {
        names
            .iter()
            .map(|name| {
                let path = dir.path().join(name);
                fs::create_dir_all(path.parent().unwrap()).unwrap();
                fs::write(&path, name.as_bytes()).unwrap();
                path.to_string_lossy().to_string()
            })
            .collect()
    }

    fn strip(dir: &TempDir) -> String {
        format!("{}/", dir.path().display())
    }

    #[tokio::test]
    async fn test_every_job_reported_once_in_listing_order() {
        let dir = TempDir::new().unwrap();
        let names: Vec<String> = (0..25).map(|i| format!("f{:02}.txt", i)).collect();
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let paths = write_files(&dir, &refs);

        let mut config = test_config("", &strip(&dir));
        config.parallelism = 4;
        let client = Arc::new(RecordingClient::default());
        let dispatcher = Dispatcher::new(client.clone(), config);

        let report = dispatcher.run(paths.clone()).await;

        assert!(report.is_success());
        assert_eq!(report.results.len(), 25);
        for (i, result) in report.results.iter().enumerate() {
            assert_eq!(result.index, i);
            assert_eq!(result.path, paths[i]);
        }

        let mut keys: Vec<String> = client.recorded().into_iter().map(|p| p.key).collect();
        keys.sort();
        assert_eq!(keys, names);
    }

    #[tokio::test]
    async fn test_failures_do_not_stop_siblings() {
        let dir = TempDir::new().unwrap();
        let mut paths = write_files(&dir, &["a.txt", "c.txt"]);
        // Vanishes between match and upload
        paths.insert(1, dir.path().join("b.txt").to_string_lossy().to_string());

        let mut config = test_config("", &strip(&dir));
        config.parallelism = 1;
        let client = Arc::new(RecordingClient::default());
        let report = Dispatcher::new(client.clone(), config).run(paths).await;

        assert!(!report.is_success());
        assert_eq!(report.failed(), 1);
        assert_eq!(report.succeeded(), 2);
        assert_eq!(report.results[1].error.as_ref().unwrap().kind(), "stat");
        assert_eq!(client.recorded().len(), 2);
    }

    #[tokio::test]
    async fn test_storage_rejection_is_isolated() {
        let dir = TempDir::new().unwrap();
        let paths = write_files(&dir, &["a.txt", "b.txt", "sub/c.txt"]);

        let mut config = test_config("rel", &strip(&dir));
        config.parallelism = 3;
        let client = Arc::new(RecordingClient::failing(&["rel/b.txt"]));
        let report = Dispatcher::new(client.clone(), config).run(paths).await;

        assert_eq!(report.failed(), 1);
        assert_eq!(report.results[1].status, UploadStatus::Failed);
        assert_eq!(report.results[2].key.as_deref(), Some("rel/sub/c.txt"));
        assert_eq!(client.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_dry_run_and_directories_never_reach_storage() {
        let dir = TempDir::new().unwrap();
        let mut paths = write_files(&dir, &["a.txt", "sub/b.txt"]);
        paths.insert(1, dir.path().join("sub").to_string_lossy().to_string());

        let mut config = test_config("", &strip(&dir));
        config.dry_run = true;
        let client = Arc::new(RecordingClient::default());
        let report = Dispatcher::new(client.clone(), config).run(paths).await;

        assert!(report.is_success());
        let statuses: Vec<UploadStatus> = report.results.iter().map(|r| r.status).collect();
        assert_eq!(
            statuses,
            vec![
                UploadStatus::DryRun,
                UploadStatus::SkippedDirectory,
                UploadStatus::DryRun
            ]
        );
        assert_eq!(client.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_zero_parallelism_uses_cpu_count() {
        let dir = TempDir::new().unwrap();
        let paths = write_files(&dir, &["a.txt", "b.txt", "c.txt"]);

        let client = Arc::new(RecordingClient::default());
        let config = UploadConfig {
            bucket: "test-bucket".to_string(),
            ..Default::default()
        };
        assert_eq!(config.parallelism, 0);

        let dispatcher = Dispatcher::new(client.clone(), config);
        let cpus = std::thread::available_parallelism().unwrap().get();
        assert_eq!(dispatcher.worker_count(), cpus);

        let mut explicit = test_config("", "");
        explicit.parallelism = 7;
        assert_eq!(Dispatcher::new(client.clone(), explicit).worker_count(), 7);

        let report = dispatcher.run(paths).await;
        assert!(report.is_success());
        assert_eq!(client.recorded().len(), 3);
    }

    #[tokio::test]
    async fn test_empty_run_succeeds() {
        let client = Arc::new(RecordingClient::default());
        let report = Dispatcher::new(client, test_config("", "")).run(Vec::new()).await;

        assert!(report.is_success());
        assert!(report.results.is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_jobs_are_reported_not_dropped() {
        let dir = TempDir::new().unwrap();
        let paths = write_files(&dir, &["a.txt", "b.txt", "c.txt"]);

        let client = Arc::new(RecordingClient::default());
        let dispatcher = Dispatcher::new(client.clone(), test_config("", &strip(&dir)));
        dispatcher.cancel_token().cancel();

        let report = dispatcher.run(paths).await;

        assert_eq!(report.results.len(), 3);
        assert_eq!(report.failed(), 3);
        assert!(
            report
                .results
                .iter()
                .all(|r| r.error.as_ref().map(|e| e.kind()) == Some("cancelled"))
        );
        assert_eq!(client.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_progress_advances_per_job() {
        let dir = TempDir::new().unwrap();
        let paths = write_files(&dir, &["a.txt", "b.txt"]);

        let pb = ProgressBar::hidden();
        let client = Arc::new(RecordingClient::default());
        Dispatcher::new(client, test_config("", &strip(&dir)))
            .with_progress(pb.clone())
            .run(paths)
            .await;

        assert_eq!(pb.position(), 2);
    }
}
