//! Background model import
//!
//! Decoding a model file can be slow, so it runs on a small pool of worker
//! threads. Submitting work returns an [`ImportHandle`] the caller polls once
//! per frame or waits on. Workers only ever produce plain vertex/index data;
//! GPU registration stays on the thread that owns the device.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam::channel::{bounded, unbounded, Receiver, RecvTimeoutError, Sender, TryRecvError};

use crate::assets::obj_loader::{ImportedScene, ObjLoader};
use crate::assets::AssetError;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Result delivered by an import job
pub type ImportResult = Result<ImportedScene, AssetError>;

/// Fixed-size pool of import worker threads
pub struct ImportPool {
    workers: Vec<Worker>,
    sender: Option<Sender<Job>>,
}

impl ImportPool {
    /// Spawn `size` workers (at least one)
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        let (sender, receiver) = unbounded::<Job>();

        let workers = (0..size).map(|id| Worker::new(id, receiver.clone())).collect();
        log::debug!("Import pool started with {} worker(s)", size);

        Self { workers, sender: Some(sender) }
    }

    /// Number of worker threads
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Queue an OBJ import of `path`
    pub fn submit(&self, path: impl AsRef<Path>) -> ImportHandle {
        let path = path.as_ref().to_path_buf();
        let job_path = path.clone();
        self.submit_with(path, move || load_scene(&job_path))
    }

    /// Queue an arbitrary import job labelled by `path`
    pub fn submit_with<F>(&self, path: PathBuf, import: F) -> ImportHandle
    where
        F: FnOnce() -> ImportResult + Send + 'static,
    {
        let (result_tx, result_rx) = bounded::<ImportResult>(1);
        let cancelled = Arc::new(AtomicBool::new(false));
        let handle = ImportHandle { path: path.clone(), receiver: result_rx, cancelled: Arc::clone(&cancelled) };

        let job: Job = Box::new(move || {
            let result = if cancelled.load(Ordering::Acquire) {
                Err(AssetError::Cancelled(path.display().to_string()))
            } else {
                import()
            };
            // The handle may already be gone; nobody is waiting then.
            let _ = result_tx.send(result);
        });

        match &self.sender {
            Some(sender) if sender.send(job).is_ok() => {}
            _ => log::error!("Import pool is shut down; {:?} will never complete", handle.path),
        }
        handle
    }
}

impl Drop for ImportPool {
    fn drop(&mut self) {
        drop(self.sender.take());
        for worker in self.workers.drain(..) {
            if let Some(thread) = worker.thread {
                if thread.join().is_err() {
                    log::error!("Import worker {} panicked", worker.id);
                }
            }
        }
    }
}

struct Worker {
    id: usize,
    thread: Option<thread::JoinHandle<()>>,
}

impl Worker {
    fn new(id: usize, receiver: Receiver<Job>) -> Self {
        let thread = thread::Builder::new()
            .name(format!("import-{}", id))
            .spawn(move || {
                while let Ok(job) = receiver.recv() {
                    job();
                }
                log::trace!("Import worker {} exiting", id);
            })
            .map_err(|e| log::error!("Failed to spawn import worker {}: {}", id, e))
            .ok();
        Self { id, thread }
    }
}

/// Pending result of a submitted import
pub struct ImportHandle {
    path: PathBuf,
    receiver: Receiver<ImportResult>,
    cancelled: Arc<AtomicBool>,
}

impl ImportHandle {
    /// File being imported
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Non-blocking check; `None` while the job is still running
    pub fn poll(&self) -> Option<ImportResult> {
        match self.receiver.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(AssetError::Disconnected(self.path.display().to_string()))),
        }
    }

    /// Block until the job finishes
    pub fn wait(self) -> ImportResult {
        self.receiver
            .recv()
            .unwrap_or_else(|_| Err(AssetError::Disconnected(self.path.display().to_string())))
    }

    /// Block for at most `timeout`
    pub fn wait_timeout(&self, timeout: Duration) -> ImportResult {
        match self.receiver.recv_timeout(timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => Err(AssetError::Timeout(self.path.display().to_string())),
            Err(RecvTimeoutError::Disconnected) => Err(AssetError::Disconnected(self.path.display().to_string())),
        }
    }

    /// Ask the pool to skip this job if it has not started yet
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }
}

fn load_scene(path: &Path) -> ImportResult {
    if !path.exists() {
        log::error!("Model file not found: {:?}", path);
        return Err(AssetError::NotFound(path.display().to_string()));
    }
    let scene = ObjLoader::load_obj(path).map_err(|e| {
        log::error!("Failed to import {:?}: {}", path, e);
        AssetError::from(e)
    })?;
    if scene.meshes.is_empty() {
        return Err(AssetError::EmptyScene(path.display().to_string()));
    }
    log::info!("Imported {:?}: {} mesh(es), {} vertices", path, scene.meshes.len(), scene.vertex_count());
    Ok(scene)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn test_import_from_file() {
        let dir = std::env::temp_dir().join(format!("tav_import_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("tri.obj");
        std::fs::write(&path, "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n").unwrap();

        let pool = ImportPool::new(2);
        let scene = pool.submit(&path).wait().unwrap();
        assert_eq!(scene.meshes.len(), 1);
        assert_eq!(scene.vertex_count(), 3);
    }

    #[test]
    fn test_missing_file_reports_not_found() {
        let pool = ImportPool::new(1);
        let result = pool.submit("does/not/exist.obj").wait();
        assert!(matches!(result, Err(AssetError::NotFound(_))));
    }

    #[test]
    fn test_poll_then_complete() {
        let pool = ImportPool::new(1);
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let handle = pool.submit_with(PathBuf::from("gated"), move || {
            let _ = release_rx.recv();
            Ok(ImportedScene::default())
        });

        assert!(handle.poll().is_none());
        release_tx.send(()).unwrap();
        assert!(handle.wait_timeout(Duration::from_secs(5)).is_ok());
    }

    #[test]
    fn test_timeout_and_cancel() {
        let pool = ImportPool::new(1);
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let blocker = pool.submit_with(PathBuf::from("blocker"), move || {
            let _ = release_rx.recv();
            Ok(ImportedScene::default())
        });
        let queued = pool.submit_with(PathBuf::from("queued"), || Ok(ImportedScene::default()));

        assert!(matches!(blocker.wait_timeout(Duration::from_millis(20)), Err(AssetError::Timeout(_))));
        queued.cancel();
        release_tx.send(()).unwrap();

        assert!(blocker.wait().is_ok());
        assert!(matches!(queued.wait(), Err(AssetError::Cancelled(_))));
    }
}
