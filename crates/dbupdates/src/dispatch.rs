//! Dispatch loop
//!
//! Feeds ordered batches from per-partition sources into the started
//! processors. Each `(namespace, partition)` source gets its own worker task;
//! a worker hands batches to its processor one at a time and acknowledges a
//! batch's last position only after the processor completed it. Batches of
//! one partition are therefore never processed concurrently, while different
//! partitions and namespaces proceed in parallel.
//!
//! A worker stops at the first batch it cannot process as a whole. Because a
//! commit acknowledges everything up to its position, carrying on would let
//! the next good batch acknowledge the skipped one; stopping leaves it to be
//! redelivered.

use crate::processor::{BatchReport, Processor};
use crate::registry::ProcessorRegistry;
use async_trait::async_trait;
use dbupdates_core::{
    config::DbUpdatesConfig,
    error::{DbUpdatesError, Result},
    types::{EventRecord, Position},
};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// An ordered run of records from one partition of one namespace
#[derive(Debug, Clone)]
pub struct Batch {
    pub namespace: String,
    pub partition: u32,
    pub records: Vec<EventRecord>,
}

impl Batch {
    pub fn new(namespace: impl Into<String>, partition: u32, records: Vec<EventRecord>) -> Self {
        Self {
            namespace: namespace.into(),
            partition,
            records,
        }
    }

    /// Position to acknowledge once the batch is done
    pub fn last_position(&self) -> Option<Position> {
        self.records.last().map(|r| r.position)
    }
}

/// Source of batches for a single worker
#[async_trait]
pub trait BatchSource: Send {
    /// Next batch, or `None` once the source is exhausted
    async fn next_batch(&mut self) -> Option<Batch>;

    /// Acknowledge everything up to and including `position`
    async fn commit(&mut self, partition: u32, position: Position) -> Result<()>;
}

/// Last acknowledged position per partition, shared with the owner of a
/// [`ChannelSource`]
#[derive(Debug, Clone, Default)]
pub struct CommittedPositions(Arc<Mutex<BTreeMap<u32, Position>>>);

impl CommittedPositions {
    pub fn get(&self, partition: u32) -> Option<Position> {
        self.0.lock().get(&partition).copied()
    }

    pub fn snapshot(&self) -> BTreeMap<u32, Position> {
        self.0.lock().clone()
    }

    fn set(&self, partition: u32, position: Position) {
        self.0.lock().insert(partition, position);
    }
}

/// In-memory [`BatchSource`] fed through a tokio channel
pub struct ChannelSource {
    rx: mpsc::Receiver<Batch>,
    committed: CommittedPositions,
}

impl ChannelSource {
    /// Create a bounded channel and the source reading from it
    pub fn channel(capacity: usize) -> (mpsc::Sender<Batch>, Self) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (
            tx,
            Self {
                rx,
                committed: CommittedPositions::default(),
            },
        )
    }

    pub fn committed(&self) -> CommittedPositions {
        self.committed.clone()
    }
}

#[async_trait]
impl BatchSource for ChannelSource {
    async fn next_batch(&mut self) -> Option<Batch> {
        self.rx.recv().await
    }

    async fn commit(&mut self, partition: u32, position: Position) -> Result<()> {
        self.committed.set(partition, position);
        Ok(())
    }
}

/// Binds a source to the namespace and partition its batches belong to
pub struct SourceBinding {
    pub namespace: String,
    pub partition: u32,
    pub source: Box<dyn BatchSource>,
}

impl SourceBinding {
    pub fn new(namespace: impl Into<String>, partition: u32, source: impl BatchSource + 'static) -> Self {
        Self {
            namespace: namespace.into(),
            partition,
            source: Box::new(source),
        }
    }
}

/// What one worker did before it stopped
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WorkerStats {
    pub namespace: String,
    pub partition: u32,
    pub batches: u64,
    pub records: u64,
    pub applied: u64,
    pub failed: u64,
    pub skipped: u64,
    /// Why the worker stopped early, if it did. The batch it stopped on was
    /// not acknowledged.
    pub rejected: Option<String>,
    pub last_committed: Option<Position>,
}

impl WorkerStats {
    fn new(namespace: &str, partition: u32) -> Self {
        Self {
            namespace: namespace.to_string(),
            partition,
            ..Default::default()
        }
    }

    fn absorb(&mut self, report: &BatchReport) {
        self.batches += 1;
        self.records += report.records as u64;
        self.applied += report.applied as u64;
        self.failed += report.failed as u64;
        self.skipped += report.skipped as u64;
    }
}

/// Runs the started processors against their batch sources
pub struct Dispatcher {
    config: Arc<DbUpdatesConfig>,
    processors: BTreeMap<String, Arc<dyn Processor>>,
    cancel: CancellationToken,
}

impl Dispatcher {
    /// Build and start the processor of every configured namespace
    ///
    /// A namespace without a registered processor, a constructor error or a
    /// start error aborts startup; no partially started dispatcher is
    /// returned.
    pub fn start(config: Arc<DbUpdatesConfig>, registry: Arc<ProcessorRegistry>) -> Result<Self> {
        config.validate()?;

        let mut processors: BTreeMap<String, Arc<dyn Processor>> = BTreeMap::new();
        for namespace in &config.namespaces {
            let mut processor = registry.build(&namespace.name, config.clone())?;
            if let Err(e) = processor.start() {
                error!(processor = %namespace.name, error = %e, "Processor failed to start");
                return Err(e);
            }
            info!(
                processor = %namespace.name,
                topic = %config.topic_for(&namespace.name),
                partitions = namespace.partitions,
                group = namespace.group.as_deref().unwrap_or("-"),
                "Processor started"
            );
            processors.insert(namespace.name.clone(), Arc::from(processor));
        }

        info!(
            instance = config.instance,
            processors = processors.len(),
            "Dispatcher started"
        );

        Ok(Self {
            config,
            processors,
            cancel: CancellationToken::new(),
        })
    }

    pub fn processor(&self, namespace: &str) -> Option<&Arc<dyn Processor>> {
        self.processors.get(namespace)
    }

    pub fn namespaces(&self) -> Vec<&str> {
        self.processors.keys().map(String::as_str).collect()
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Signal every worker to stop after its current record
    pub fn shutdown(&self) {
        info!("Dispatcher shutdown requested");
        self.cancel.cancel();
    }

    /// Run one worker per binding until every source is exhausted or the
    /// dispatcher is shut down
    pub async fn run(&self, bindings: Vec<SourceBinding>) -> Result<Vec<WorkerStats>> {
        let mut workers = Vec::with_capacity(bindings.len());
        for binding in &bindings {
            self.check_binding(binding)?;
        }

        for binding in bindings {
            let processor = match self.processors.get(&binding.namespace) {
                Some(p) => p.clone(),
                None => return Err(DbUpdatesError::NotFound(binding.namespace)),
            };
            let cancel = self.cancel.child_token();
            let namespace = binding.namespace.clone();
            let partition = binding.partition;
            let handle = tokio::spawn(run_worker(processor, binding, cancel));
            workers.push((namespace, partition, handle));
        }

        let mut stats = Vec::with_capacity(workers.len());
        let mut panicked = Vec::new();
        for (namespace, partition, handle) in workers {
            match handle.await {
                Ok(worker_stats) => stats.push(worker_stats),
                Err(e) => {
                    error!(processor = %namespace, partition, error = %e, "Worker task failed");
                    panicked.push(format!("{}/{}", namespace, partition));
                }
            }
        }

        if !panicked.is_empty() {
            return Err(DbUpdatesError::InvalidState(format!(
                "worker tasks failed: {}",
                panicked.join(", ")
            )));
        }
        Ok(stats)
    }

    fn check_binding(&self, binding: &SourceBinding) -> Result<()> {
        let namespace = self
            .config
            .namespaces
            .iter()
            .find(|n| n.name == binding.namespace)
            .ok_or_else(|| DbUpdatesError::NotFound(binding.namespace.clone()))?;
        if binding.partition >= namespace.partitions {
            return Err(DbUpdatesError::Config(format!(
                "namespace '{}' has {} partitions, got partition {}",
                namespace.name, namespace.partitions, binding.partition
            )));
        }
        Ok(())
    }
}

async fn run_worker(
    processor: Arc<dyn Processor>,
    binding: SourceBinding,
    cancel: CancellationToken,
) -> WorkerStats {
    let SourceBinding {
        namespace,
        partition,
        mut source,
    } = binding;
    let mut stats = WorkerStats::new(&namespace, partition);
    debug!(processor = %namespace, partition, "Worker started");

    loop {
        let batch = tokio::select! {
            _ = cancel.cancelled() => break,
            next = source.next_batch() => match next {
                Some(batch) => batch,
                None => break,
            },
        };

        if batch.namespace != namespace || batch.partition != partition {
            error!(
                processor = %namespace,
                partition,
                batch_namespace = %batch.namespace,
                batch_partition = batch.partition,
                "Batch routed to the wrong worker, stopping"
            );
            stats.rejected = Some(format!(
                "batch for {}/{} routed to this worker",
                batch.namespace, batch.partition
            ));
            break;
        }

        match processor.process(&cancel, &batch.records).await {
            Ok(report) => {
                stats.absorb(&report);
                let Some(position) = batch.last_position() else {
                    continue;
                };
                match source.commit(partition, position).await {
                    Ok(()) => stats.last_committed = Some(position),
                    Err(e) => {
                        error!(processor = %namespace, partition, position, error = %e, "Failed to commit position");
                    }
                }
            }
            Err(DbUpdatesError::Cancelled) => break,
            Err(e) => {
                error!(
                    processor = %namespace,
                    partition,
                    first_position = ?batch.records.first().map(|r| r.position),
                    error = %e,
                    "Batch rejected, stopping worker"
                );
                stats.rejected = Some(e.to_string());
                break;
            }
        }
    }

    info!(
        processor = %namespace,
        partition,
        batches = stats.batches,
        applied = stats.applied,
        failed = stats.failed,
        skipped = stats.skipped,
        last_committed = ?stats.last_committed,
        rejected = ?stats.rejected,
        "Worker stopped"
    );
    stats
}
