//! Apply command implementation
//!
//! Reads JSON lines, cuts each `(namespace, partition)` stream into batches
//! of at most `dispatch.max_batch_records`, and runs them through the
//! dispatcher with one channel source per stream.

use anyhow::{bail, Context, Result};
use dbupdates::prelude::*;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Deserialize)]
struct InputLine {
    namespace: String,
    key: String,
    #[serde(default)]
    partition: u32,
    position: Position,
    payload: EventPayload,
}

type StreamKey = (String, u32);

pub fn execute(config: Arc<DbUpdatesConfig>, input: PathBuf) -> Result<()> {
    let streams = read_batches(&input, config.dispatch.max_batch_records)?;
    if streams.is_empty() {
        println!("No records in {}", input.display());
        return Ok(());
    }

    for (namespace, partition) in streams.keys() {
        if !config.namespaces.iter().any(|n| &n.name == namespace) {
            bail!(
                "{}: namespace '{}' (partition {}) is not configured",
                input.display(),
                namespace,
                partition
            );
        }
    }

    let runtime = tokio::runtime::Runtime::new().context("Failed to start runtime")?;
    runtime.block_on(run(config, streams))
}

async fn run(config: Arc<DbUpdatesConfig>, streams: BTreeMap<StreamKey, Vec<Batch>>) -> Result<()> {
    let registry = Arc::new(ProcessorRegistry::builtin()?);
    let dispatcher =
        Dispatcher::start(config.clone(), registry).context("Failed to start processors")?;

    let token = dispatcher.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, stopping workers");
            token.cancel();
        }
    });

    let mut bindings = Vec::with_capacity(streams.len());
    let mut committed = Vec::with_capacity(streams.len());
    for ((namespace, partition), batches) in streams {
        let (tx, source) = ChannelSource::channel(config.dispatch.channel_capacity);
        committed.push(((namespace.clone(), partition), source.committed()));
        bindings.push(SourceBinding::new(namespace, partition, source));

        tokio::spawn(async move {
            for batch in batches {
                if tx.send(batch).await.is_err() {
                    break;
                }
            }
        });
    }

    let stats = dispatcher.run(bindings).await.context("Dispatch failed")?;

    println!("\nWorker Stats");
    println!("{}", "=".repeat(60));
    for s in &stats {
        println!(
            "  {}/{}: {} batches, {} records, {} applied, {} failed, {} skipped",
            s.namespace, s.partition, s.batches, s.records, s.applied, s.failed, s.skipped
        );
        if let Some(reason) = &s.rejected {
            println!("    stopped on a rejected batch: {}", reason);
        }
    }

    println!("\nCommitted Positions");
    println!("{}", "=".repeat(60));
    for ((namespace, partition), positions) in committed {
        match positions.get(partition) {
            Some(position) => println!("  {}/{}: {}", namespace, partition, position),
            None => println!("  {}/{}: -", namespace, partition),
        }
    }

    Ok(())
}

fn read_batches(path: &Path, max_batch_records: usize) -> Result<BTreeMap<StreamKey, Vec<Batch>>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;

    let mut pending: BTreeMap<StreamKey, Vec<EventRecord>> = BTreeMap::new();
    let mut streams: BTreeMap<StreamKey, Vec<Batch>> = BTreeMap::new();

    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line = line.with_context(|| format!("Failed to read {}", path.display()))?;
        if line.trim().is_empty() {
            continue;
        }
        let parsed: InputLine = serde_json::from_str(&line)
            .with_context(|| format!("{}:{}: invalid record", path.display(), index + 1))?;

        let stream = (parsed.namespace, parsed.partition);
        let record = EventRecord::new(parsed.key, parsed.position, parsed.payload)
            .with_partition(parsed.partition);

        let records = pending.entry(stream.clone()).or_default();
        records.push(record);
        if records.len() >= max_batch_records {
            let records = std::mem::take(records);
            streams
                .entry(stream.clone())
                .or_default()
                .push(Batch::new(stream.0, stream.1, records));
        }
    }

    for ((namespace, partition), records) in pending {
        if records.is_empty() {
            continue;
        }
        streams
            .entry((namespace.clone(), partition))
            .or_default()
            .push(Batch::new(namespace, partition, records));
    }

    Ok(streams)
}
