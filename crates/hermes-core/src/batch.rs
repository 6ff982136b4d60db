//! Batch driving of the geocoding orchestrator.
//!
//! Sequential by default: records are resolved in input order, with a
//! progress event after each one and cancellation polled at record
//! boundaries (an in-flight provider call always completes). With
//! `parallelism > 1`, the input is split into contiguous shards, each owned
//! by one worker task running the same sequential loop; workers communicate
//! `(index, result)` pairs over a channel and the collector merges by
//! original index, so completion order across workers never leaks into the
//! output.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::cache::CacheStore;
use crate::geocode::GeocodeService;
use crate::models::{AddressRecord, GeocodeResult};
use crate::traits::Geocoder;

/// Events emitted by the batch pipeline for monitoring/progress.
#[derive(Debug, Clone)]
pub enum BatchEvent<'a> {
    Started {
        batch_id: Uuid,
        total: usize,
    },
    /// Emitted after every resolved record. `completed` counts resolved
    /// records so far; `index` is the record's position in the input.
    RecordCompleted {
        index: usize,
        completed: usize,
        total: usize,
        result: &'a GeocodeResult,
    },
    Cancelled {
        completed: usize,
        total: usize,
    },
    Finished {
        succeeded: usize,
        total: usize,
    },
}

/// Trait for receiving batch events (decoupled logging/progress UI).
pub trait BatchReporter: Send + Sync {
    fn report(&self, event: BatchEvent<'_>) {
        let _ = event;
    }
}

/// Reporter that ignores all events.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullReporter;

impl BatchReporter for NullReporter {}

/// Reporter that uses the `tracing` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingBatchReporter;

impl BatchReporter for TracingBatchReporter {
    fn report(&self, event: BatchEvent<'_>) {
        match event {
            BatchEvent::Started { batch_id, total } => {
                tracing::info!(%batch_id, total, "Batch started");
            }
            BatchEvent::RecordCompleted {
                index,
                completed,
                total,
                result,
            } => {
                tracing::info!(
                    index,
                    progress = format!("{completed}/{total}"),
                    success = result.success,
                    level = %result.match_level,
                    "Record geocoded"
                );
            }
            BatchEvent::Cancelled { completed, total } => {
                tracing::warn!(completed, total, "Batch cancelled, returning partial results");
            }
            BatchEvent::Finished { succeeded, total } => {
                tracing::info!(succeeded, total, "Batch finished");
            }
        }
    }
}

/// Configuration for a batch run.
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Number of worker tasks. 1 means strictly sequential processing.
    pub parallelism: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self { parallelism: 1 }
    }
}

impl BatchConfig {
    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = parallelism.max(1);
        self
    }
}

/// A worker's slice of the batch: a contiguous run of records starting at
/// `start` in the original input.
struct Shard {
    start: usize,
    records: Vec<AddressRecord>,
}

/// Drives the orchestrator across a list of records.
pub struct BatchPipeline<G, S>
where
    G: Geocoder + 'static,
    S: CacheStore + 'static,
{
    service: Arc<GeocodeService<G, S>>,
    config: BatchConfig,
}

impl<G, S> BatchPipeline<G, S>
where
    G: Geocoder + 'static,
    S: CacheStore + 'static,
{
    pub fn new(service: GeocodeService<G, S>) -> Self {
        Self {
            service: Arc::new(service),
            config: BatchConfig::default(),
        }
    }

    pub fn with_config(mut self, config: BatchConfig) -> Self {
        self.config = config;
        self
    }

    pub fn service(&self) -> &GeocodeService<G, S> {
        &self.service
    }

    /// Process all records, in input order.
    ///
    /// The returned list covers the processed prefix (all records unless
    /// cancelled) and `results[i]` always corresponds to `records[i]`.
    /// Individual provider failures never abort the run; every processed
    /// record comes back with an explicit classification.
    pub async fn process<R: BatchReporter>(
        &self,
        records: Vec<AddressRecord>,
        cancel: &CancellationToken,
        reporter: &R,
    ) -> Vec<GeocodeResult> {
        let total = records.len();
        reporter.report(BatchEvent::Started {
            batch_id: Uuid::new_v4(),
            total,
        });

        let results = if self.config.parallelism > 1 && total > 1 {
            self.process_sharded(records, cancel, reporter).await
        } else {
            self.process_sequential(records, cancel, reporter).await
        };

        if results.len() < total {
            reporter.report(BatchEvent::Cancelled {
                completed: results.len(),
                total,
            });
        } else {
            reporter.report(BatchEvent::Finished {
                succeeded: results.iter().filter(|r| r.success).count(),
                total,
            });
        }

        results
    }

    async fn process_sequential<R: BatchReporter>(
        &self,
        records: Vec<AddressRecord>,
        cancel: &CancellationToken,
        reporter: &R,
    ) -> Vec<GeocodeResult> {
        let total = records.len();
        let mut results = Vec::with_capacity(total);

        for (index, record) in records.iter().enumerate() {
            if cancel.is_cancelled() {
                return results;
            }

            let result = self.service.resolve(record).await;
            reporter.report(BatchEvent::RecordCompleted {
                index,
                completed: results.len() + 1,
                total,
                result: &result,
            });
            results.push(result);
        }

        results
    }

    async fn process_sharded<R: BatchReporter>(
        &self,
        records: Vec<AddressRecord>,
        cancel: &CancellationToken,
        reporter: &R,
    ) -> Vec<GeocodeResult> {
        let total = records.len();
        let workers = self.config.parallelism.min(total);
        let shard_len = total.div_ceil(workers);

        let mut shards = Vec::with_capacity(workers);
        let mut rest = records;
        let mut start = 0;
        while !rest.is_empty() {
            let tail = rest.split_off(shard_len.min(rest.len()));
            shards.push(Shard {
                start,
                records: rest,
            });
            start += shard_len;
            rest = tail;
        }

        let (tx, mut rx) = mpsc::unbounded_channel::<(usize, GeocodeResult)>();
        let mut handles = Vec::with_capacity(shards.len());

        for shard in shards {
            let service = self.service.clone();
            let cancel = cancel.clone();
            let tx = tx.clone();
            handles.push(tokio::spawn(async move {
                for (offset, record) in shard.records.iter().enumerate() {
                    if cancel.is_cancelled() {
                        break;
                    }
                    let result = service.resolve(record).await;
                    if tx.send((shard.start + offset, result)).is_err() {
                        break;
                    }
                }
            }));
        }
        drop(tx);

        let mut indexed: Vec<(usize, GeocodeResult)> = Vec::with_capacity(total);
        while let Some((index, result)) = rx.recv().await {
            reporter.report(BatchEvent::RecordCompleted {
                index,
                completed: indexed.len() + 1,
                total,
                result: &result,
            });
            indexed.push((index, result));
        }

        for handle in handles {
            if let Err(err) = handle.await {
                tracing::error!(error = %err, "Batch worker panicked");
            }
        }

        indexed.sort_by_key(|(index, _)| *index);
        indexed.into_iter().map(|(_, result)| result).collect()
    }
}
