//! Mutation coordinator
//!
//! Owns the index store and a pool of worker tasks. Each submitted mutation
//! becomes one job on the worker shard that owns its page URL; the worker
//! runs the mutation as a single store transaction (page row, link diff,
//! every URIInfo/DomainStats delta) and retries the whole transaction with
//! backoff when the substrate reports a write conflict. A mutation that
//! fails leaves the index at its last committed state.

use crate::config::Config;
use crate::model::{Mutation, MutationOutcome};
use crate::propagate::RetryPolicy;
use crate::store::{IndexEntry, IndexStore, SqliteIndexStore};
use crate::{config, mutation, propagate, IndexError, Result};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, oneshot, Notify};
use tokio::task::JoinHandle;

struct Job {
    mutation: Mutation,
    reply: oneshot::Sender<Result<MutationOutcome>>,
}

/// Handle to a mutation that has been enqueued but may not have committed
/// yet. Resolves to the mutation's final outcome.
pub struct PendingMutation {
    rx: oneshot::Receiver<Result<MutationOutcome>>,
}

impl PendingMutation {
    /// Waits for the mutation to commit or fail.
    pub async fn outcome(self) -> Result<MutationOutcome> {
        self.rx.await.map_err(|_| IndexError::Shutdown)?
    }
}

/// The indexer: submission API over the derived index store.
pub struct Indexer {
    store: Arc<Mutex<SqliteIndexStore>>,
    senders: Vec<mpsc::UnboundedSender<Job>>,
    handles: Vec<JoinHandle<()>>,
    pending: Arc<AtomicUsize>,
    settled: Arc<Notify>,
}

impl Indexer {
    /// Opens an indexer over the database named in the configuration.
    pub fn open(cfg: &Config) -> Result<Self> {
        config::validate(cfg)?;
        let store = SqliteIndexStore::new(Path::new(&cfg.storage.database_path))?;
        Ok(Self::from_store(store, cfg))
    }

    /// Opens an indexer over an in-memory database.
    pub fn open_in_memory(cfg: &Config) -> Result<Self> {
        config::validate(cfg)?;
        let store = SqliteIndexStore::open_in_memory()?;
        Ok(Self::from_store(store, cfg))
    }

    fn from_store(store: SqliteIndexStore, cfg: &Config) -> Self {
        let store = Arc::new(Mutex::new(store));
        let pending = Arc::new(AtomicUsize::new(0));
        let settled = Arc::new(Notify::new());
        let retry = RetryPolicy::from_config(&cfg.propagation);

        let mut senders = Vec::with_capacity(cfg.propagation.workers);
        let mut handles = Vec::with_capacity(cfg.propagation.workers);
        for shard in 0..cfg.propagation.workers {
            let (tx, rx) = mpsc::unbounded_channel();
            senders.push(tx);
            handles.push(tokio::spawn(worker_loop(
                shard,
                rx,
                Arc::clone(&store),
                Arc::clone(&pending),
                Arc::clone(&settled),
                retry,
            )));
        }
        tracing::info!(workers = cfg.propagation.workers, "Indexer started");

        Self {
            store,
            senders,
            handles,
            pending,
            settled,
        }
    }

    /// Enqueues a mutation without waiting for it, enabling batched
    /// submission. The returned handle resolves to the mutation's outcome.
    pub fn enqueue(&self, mutation: Mutation) -> Result<PendingMutation> {
        let shard = self.shard_for(mutation.url());
        let (tx, rx) = oneshot::channel();

        // Count the job before it can possibly complete
        self.pending.fetch_add(1, Ordering::AcqRel);
        if self.senders[shard]
            .send(Job {
                mutation,
                reply: tx,
            })
            .is_err()
        {
            self.pending.fetch_sub(1, Ordering::AcqRel);
            return Err(IndexError::Shutdown);
        }
        Ok(PendingMutation { rx })
    }

    /// Submits one mutation and waits for it to commit or fail.
    pub async fn submit(&self, mutation: Mutation) -> Result<MutationOutcome> {
        self.enqueue(mutation)?.outcome().await
    }

    /// Blocks until every transaction and cascade triggered by previously
    /// enqueued mutations has committed (or failed). Needed before
    /// comparing against a batch snapshot.
    pub async fn wait_until_settled(&self) {
        loop {
            let notified = self.settled.notified();
            if self.pending.load(Ordering::Acquire) == 0 {
                return;
            }
            notified.await;
        }
    }

    /// Scans the committed index state as a fresh sorted entry sequence.
    pub fn scan_all(&self) -> Result<Vec<IndexEntry>> {
        let store = self.store.lock().unwrap();
        Ok(store.scan_all()?)
    }

    /// Seeds the (empty) store from a batch-computed snapshot.
    pub fn bulk_load(&self, entries: &[IndexEntry]) -> Result<()> {
        let mut store = self.store.lock().unwrap();
        Ok(store.bulk_load(entries)?)
    }

    /// Stops the workers and waits for them to drain. Jobs enqueued before
    /// shutdown still complete.
    pub async fn shutdown(mut self) {
        self.senders.clear();
        for handle in std::mem::take(&mut self.handles) {
            let _ = handle.await;
        }
        tracing::info!("Indexer shut down");
    }

    fn shard_for(&self, url: &str) -> usize {
        let mut hasher = DefaultHasher::new();
        url.hash(&mut hasher);
        (hasher.finish() as usize) % self.senders.len()
    }
}

async fn worker_loop(
    shard: usize,
    mut rx: mpsc::UnboundedReceiver<Job>,
    store: Arc<Mutex<SqliteIndexStore>>,
    pending: Arc<AtomicUsize>,
    settled: Arc<Notify>,
    retry: RetryPolicy,
) {
    tracing::debug!(shard, "Worker started");
    while let Some(job) = rx.recv().await {
        let result = apply_with_retry(&store, &job.mutation, retry).await;
        if let Err(e) = &result {
            tracing::debug!(shard, url = job.mutation.url(), error = %e, "Mutation failed");
        }

        pending.fetch_sub(1, Ordering::AcqRel);
        settled.notify_waiters();

        // The submitter may have dropped its handle; that is not an error
        let _ = job.reply.send(result);
    }
    tracing::debug!(shard, "Worker stopped");
}

/// Runs a mutation as one transaction, retrying the whole thing on write
/// conflict. Every retry re-reads the stored link set, so increments from
/// independent mutations compose regardless of arrival order.
async fn apply_with_retry(
    store: &Arc<Mutex<SqliteIndexStore>>,
    mutation: &Mutation,
    retry: RetryPolicy,
) -> Result<MutationOutcome> {
    let mut attempt: u32 = 0;
    loop {
        match run_transaction(store, mutation) {
            Ok(outcome) => return Ok(outcome),
            Err(e) if e.is_retryable() => {
                attempt += 1;
                if attempt >= retry.max_attempts() {
                    tracing::warn!(
                        url = mutation.url(),
                        attempts = attempt,
                        "Giving up after repeated transaction conflicts"
                    );
                    return Err(IndexError::ConflictExhausted { attempts: attempt });
                }
                let delay = retry.delay(attempt - 1);
                tracing::warn!(
                    url = mutation.url(),
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "Transaction conflict, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}

/// One attempt: page row + link diff + every derived delta, committed
/// atomically. Any error rolls the transaction back untouched.
fn run_transaction(
    store: &Arc<Mutex<SqliteIndexStore>>,
    mutation: &Mutation,
) -> Result<MutationOutcome> {
    let mut store = store.lock().unwrap();
    let tx = store.begin()?;
    let applied = mutation::apply(&tx, mutation)?;
    propagate::apply_deltas(&tx, &applied.deltas)?;
    tx.commit()?;
    Ok(applied.outcome)
}
