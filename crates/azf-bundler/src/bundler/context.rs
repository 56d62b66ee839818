use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use super::watcher::FileWatcher;
use super::{BuildOptions, BuildResult, Bundler, run_pass};
use crate::error::Result;

/// Window in which repeated events for one path count as a single change.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(100);

/// Options and engine kept together so the same build can be run repeatedly.
pub struct BuildContext {
    engine: Arc<dyn Bundler>,
    options: BuildOptions,
    root: PathBuf,
    debounce: Duration,
}

impl BuildContext {
    pub(crate) fn new(engine: Arc<dyn Bundler>, options: BuildOptions, root: PathBuf) -> Self {
        Self {
            engine,
            options,
            root,
            debounce: DEFAULT_DEBOUNCE,
        }
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    pub fn options(&self) -> &BuildOptions {
        &self.options
    }

    /// Run one pass through the plugin pipeline. Build errors are returned
    /// inside the result, not as `Err`.
    pub async fn rebuild(&self) -> Result<BuildResult> {
        let started = Instant::now();
        let result = run_pass(self.engine.as_ref(), &self.options).await;
        tracing::debug!(elapsed_ms = started.elapsed().as_millis() as u64, "build pass finished");
        result
    }

    /// Run an initial pass, then rebuild whenever a file under the root changes.
    ///
    /// Failed passes never stop the loop. Events arriving while a pass runs
    /// are folded into the next one.
    ///
    /// # Errors
    ///
    /// Fails if the initial pass cannot run the engine at all, or if the file
    /// watcher cannot be started.
    pub async fn watch(self) -> Result<WatchHandle> {
        self.rebuild().await?;

        let ignored = vec![absolute(&self.options.outdir)];
        let (watcher, mut changes) = FileWatcher::new(self.root.clone(), ignored, self.debounce)?;
        tracing::debug!(root = %watcher.root().display(), "watching for changes");

        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();

        let task = tokio::spawn(async move {
            let _watcher = watcher;
            loop {
                tokio::select! {
                    _ = &mut stop_rx => break,
                    change = changes.recv() => {
                        let Some(change) = change else { break };
                        tracing::debug!(?change, "change detected");
                        while changes.try_recv().is_ok() {}

                        if let Err(err) = self.rebuild().await {
                            tracing::error!("rebuild pass could not run: {err}");
                        }
                    }
                }
            }
        });

        Ok(WatchHandle {
            stop: Some(stop_tx),
            task: Some(task),
        })
    }
}

/// Running watch loop. Dropping the handle also stops the loop.
pub struct WatchHandle {
    stop: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl WatchHandle {
    /// Wait until the loop ends on its own.
    pub async fn stopped(&mut self) {
        if let Some(task) = self.task.as_mut() {
            if let Err(err) = task.await {
                tracing::error!("watch loop terminated abnormally: {err}");
            }
            self.task = None;
        }
    }

    /// Stop watching and wait for the current pass to finish.
    pub async fn stop(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        self.stopped().await;
    }
}

fn absolute(path: &std::path::Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundler::{Message, OutputFile};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    struct CountingEngine {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Bundler for CountingEngine {
        async fn bundle(&self, _options: &BuildOptions) -> Result<BuildResult> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(BuildResult {
                errors: vec![Message::new("broken")],
                output_files: Some(vec![OutputFile::new("dist/a.mjs", "a")]),
                ..BuildResult::default()
            })
        }
    }

    #[tokio::test]
    async fn test_rebuild_returns_errors_in_result() {
        let engine = Arc::new(CountingEngine {
            calls: AtomicUsize::new(0),
        });
        let ctx = BuildContext::new(engine.clone(), BuildOptions::default(), PathBuf::from("."));

        let result = ctx.rebuild().await.unwrap();
        assert_eq!(result.errors.len(), 1);
        assert_eq!(engine.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_watch_runs_initial_pass_and_stops() {
        let dir = TempDir::new().unwrap();
        let engine = Arc::new(CountingEngine {
            calls: AtomicUsize::new(0),
        });
        let options = BuildOptions {
            outdir: dir.path().join("dist"),
            ..BuildOptions::default()
        };

        let handle = BuildContext::new(engine.clone(), options, dir.path().to_path_buf())
            .watch()
            .await
            .unwrap();

        assert_eq!(engine.calls.load(Ordering::SeqCst), 1);
        handle.stop().await;
    }
}
