//! Deadline wrapper for encoder calls.
//!
//! Batches run on one long-lived worker thread fed through a channel. If a
//! batch does not report back before its deadline the caller gets
//! `Error::EncodingTimeout`. The worker finishes whatever it is running, but
//! skips queued batches whose callers have already given up, so repeated
//! timeouts cost at most one stuck call and never more threads.

use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use hiverag_core::traits::Embedder;
use hiverag_core::{Error, Result};

struct Job {
    texts: Vec<String>,
    deadline: Instant,
    reply: Sender<Result<Vec<Vec<f32>>>>,
}

pub struct TimeoutEmbedder {
    inner: Arc<dyn Embedder>,
    timeout: Duration,
    jobs: Mutex<Sender<Job>>,
}

impl TimeoutEmbedder {
    /// Starts the worker thread; it exits when the embedder is dropped.
    pub fn new(inner: Arc<dyn Embedder>, timeout: Duration) -> Result<Self> {
        let (jobs, queue) = mpsc::channel::<Job>();
        let worker = Arc::clone(&inner);
        thread::Builder::new()
            .name("hiverag-encode".to_string())
            .spawn(move || {
                for job in queue {
                    if Instant::now() >= job.deadline {
                        tracing::debug!(texts = job.texts.len(), "skipping encoder batch past its deadline");
                        continue;
                    }
                    let result = panic::catch_unwind(AssertUnwindSafe(|| worker.embed_batch(&job.texts)))
                        .unwrap_or_else(|_| Err(Error::Encoding("encoder panicked".into())));
                    // The caller may have timed out meanwhile.
                    let _ = job.reply.send(result);
                }
            })
            .map_err(|e| Error::Encoding(format!("failed to spawn encoder worker: {e}")))?;
        Ok(Self { inner, timeout, jobs: Mutex::new(jobs) })
    }

    /// Wrap `inner` when a timeout is configured, otherwise pass it through.
    pub fn wrap(inner: Arc<dyn Embedder>, timeout: Option<Duration>) -> Result<Arc<dyn Embedder>> {
        Ok(match timeout {
            Some(t) => Arc::new(Self::new(inner, t)?),
            None => inner,
        })
    }
}

impl Embedder for TimeoutEmbedder {
    fn model_id(&self) -> &str { self.inner.model_id() }
    fn dim(&self) -> usize { self.inner.dim() }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let (reply, rx) = mpsc::channel();
        let job = Job { texts: texts.to_vec(), deadline: Instant::now() + self.timeout, reply };
        self.jobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .send(job)
            .map_err(|_| Error::Encoding("encoder worker has exited".into()))?;
        match rx.recv_timeout(self.timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => {
                tracing::warn!(timeout = ?self.timeout, "encoder call timed out");
                Err(Error::EncodingTimeout(self.timeout))
            }
            Err(RecvTimeoutError::Disconnected) => Err(Error::Encoding("encoder worker exited without a result".into())),
        }
    }
}
