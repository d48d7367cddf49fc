//! Local transfer session: hashes files on a worker pool and keeps an
//! in-memory transfer registry. Results are delivered as [`SessionEvent`]s on
//! the channel given at construction.

use super::{SessionEvent, TransferSession};
use crate::config::HashingConfig;
use crate::error::{ResolveError, TransferError};
use crate::tree::hasher::compute_content_id;
use crate::types::{ContentId, RequestToken};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{debug, info, warn};

struct Job {
    token: RequestToken,
    path: PathBuf,
    cancel: Arc<AtomicBool>,
}

type PendingMap = Arc<Mutex<HashMap<RequestToken, Arc<AtomicBool>>>>;

/// Transfer session backed by the local filesystem
pub struct LocalTransferSession {
    jobs: Mutex<Option<mpsc::Sender<Job>>>,
    events: Mutex<mpsc::Sender<SessionEvent>>,
    pending: PendingMap,
    transfers: RwLock<HashMap<ContentId, PathBuf>>,
    next_token: AtomicU64,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl LocalTransferSession {
    /// Start a session with `config.workers` hashing threads.
    pub fn new(
        config: &HashingConfig,
        events: mpsc::Sender<SessionEvent>,
    ) -> std::io::Result<Self> {
        let (job_tx, job_rx) = mpsc::channel::<Job>();
        let job_rx = Arc::new(Mutex::new(job_rx));
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));

        let workers = (0..config.workers.max(1))
            .map(|index| -> std::io::Result<JoinHandle<()>> {
                let job_rx = Arc::clone(&job_rx);
                let pending = Arc::clone(&pending);
                let events = events.clone();
                let buffer_size = config.buffer_size;
                std::thread::Builder::new()
                    .name(format!("sharetree-hash-{}", index))
                    .spawn(move || worker_loop(job_rx, pending, events, buffer_size))
            })
            .collect::<std::io::Result<Vec<_>>>()?;

        Ok(Self {
            jobs: Mutex::new(Some(job_tx)),
            events: Mutex::new(events),
            pending,
            transfers: RwLock::new(HashMap::new()),
            next_token: AtomicU64::new(1),
            workers: Mutex::new(workers),
        })
    }

    /// Registered transfers, sorted by identity
    pub fn transfers(&self) -> Vec<(ContentId, PathBuf)> {
        let mut list: Vec<_> = self
            .transfers
            .read()
            .iter()
            .map(|(id, path)| (*id, path.clone()))
            .collect();
        list.sort();
        list
    }

    pub fn has_transfer(&self, identity: &ContentId) -> bool {
        self.transfers.read().contains_key(identity)
    }

    /// Number of resolutions still running
    pub fn in_flight(&self) -> usize {
        self.pending.lock().len()
    }

    /// Register a transfer that completed outside the tree's control and
    /// announce it with `TransferFinished`.
    pub fn attach_finished(&self, identity: ContentId, path: &Path) {
        self.transfers.write().insert(identity, path.to_path_buf());
        self.emit(SessionEvent::TransferFinished {
            identity,
            path: path.to_path_buf(),
        });
    }

    /// Drop a transfer on the session's own initiative.
    pub fn drop_transfer(&self, identity: &ContentId) {
        if self.transfers.write().remove(identity).is_some() {
            self.emit(SessionEvent::TransferDeleted {
                identity: *identity,
            });
        }
    }

    fn emit(&self, event: SessionEvent) {
        if self.events.lock().send(event).is_err() {
            debug!("Session event dropped: receiver closed");
        }
    }
}

impl TransferSession for LocalTransferSession {
    fn resolve_identity_async(&self, path: &Path) -> RequestToken {
        let token = RequestToken(self.next_token.fetch_add(1, Ordering::SeqCst));
        let cancel = Arc::new(AtomicBool::new(false));
        self.pending.lock().insert(token, Arc::clone(&cancel));

        let job = Job {
            token,
            path: path.to_path_buf(),
            cancel,
        };
        let queued = self
            .jobs
            .lock()
            .as_ref()
            .map(|jobs| jobs.send(job).is_ok())
            .unwrap_or(false);
        if !queued {
            warn!(%token, "Hashing pool is shut down; resolution not queued");
            self.pending.lock().remove(&token);
            self.emit(SessionEvent::ResolutionCompleted {
                token,
                result: Err(ResolveError::Canceled),
            });
        } else {
            debug!(%token, path = ?path, "Queued identity resolution");
        }
        token
    }

    fn cancel_resolution(&self, token: RequestToken) {
        if let Some(flag) = self.pending.lock().get(&token) {
            flag.store(true, Ordering::Relaxed);
            debug!(%token, "Canceled identity resolution");
        }
    }

    fn create_transfer(&self, identity: &ContentId, path: &Path) -> Result<(), TransferError> {
        let mut transfers = self.transfers.write();
        if transfers.contains_key(identity) {
            return Err(TransferError::Duplicate(*identity));
        }
        transfers.insert(*identity, path.to_path_buf());
        info!(%identity, path = ?path, "Transfer created");
        Ok(())
    }

    fn delete_transfer(&self, identity: &ContentId, keep_local_data: bool) {
        let removed = self.transfers.write().remove(identity);
        let Some(path) = removed else {
            return;
        };
        if !keep_local_data {
            if let Err(e) = std::fs::remove_file(&path) {
                warn!(%identity, path = ?path, "Failed to remove transfer data: {}", e);
            }
        }
        info!(%identity, keep_local_data, "Transfer deleted");
    }
}

impl Drop for LocalTransferSession {
    fn drop(&mut self) {
        for flag in self.pending.lock().values() {
            flag.store(true, Ordering::Relaxed);
        }
        self.jobs.lock().take();
        for handle in self.workers.lock().drain(..) {
            let _ = handle.join();
        }
    }
}

fn worker_loop(
    jobs: Arc<Mutex<mpsc::Receiver<Job>>>,
    pending: PendingMap,
    events: mpsc::Sender<SessionEvent>,
    buffer_size: usize,
) {
    loop {
        let job = {
            let rx = jobs.lock();
            match rx.recv() {
                Ok(job) => job,
                Err(_) => break,
            }
        };

        let result = compute_content_id(&job.path, buffer_size, &job.cancel);
        pending.lock().remove(&job.token);
        if let Err(e) = &result {
            debug!(token = %job.token, path = ?job.path, "Resolution failed: {}", e);
        }
        let event = SessionEvent::ResolutionCompleted {
            token: job.token,
            result,
        };
        if events.send(event).is_err() {
            break;
        }
    }
}
