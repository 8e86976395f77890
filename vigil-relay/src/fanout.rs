//! One reader, many bounded writers.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// What a sink does when its queue is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropPolicy {
    /// Drop the item being delivered and count it.
    DropNewest,
    /// Wait for the sink to make room. Stalls every other sink meanwhile.
    Backpressure,
}

/// Shared counter of items a sink has dropped.
#[derive(Debug, Clone, Default)]
pub struct DropCounter(Arc<AtomicU64>);

impl DropCounter {
    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }

    pub fn increment(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }
}

struct Sink<T> {
    name: String,
    tx: mpsc::Sender<T>,
    policy: DropPolicy,
    dropped: DropCounter,
}

/// Delivers every item read from a single source channel to N sinks.
///
/// Sinks whose receiver has been dropped are removed. [`Fanout::run`] returns
/// once the source closes, which in turn closes every sink.
pub struct Fanout<T> {
    name: &'static str,
    source: mpsc::Receiver<T>,
    sinks: Vec<Sink<T>>,
}

impl<T: Clone + Send + 'static> Fanout<T> {
    pub fn new(name: &'static str, source: mpsc::Receiver<T>) -> Self {
        Self {
            name,
            source,
            sinks: Vec::new(),
        }
    }

    /// Register a sink with its own bounded queue.
    pub fn add_sink(
        &mut self,
        name: impl Into<String>,
        capacity: usize,
        policy: DropPolicy,
    ) -> (mpsc::Receiver<T>, DropCounter) {
        let dropped = DropCounter::default();
        let rx = self.add_sink_with_counter(name, capacity, policy, dropped.clone());
        (rx, dropped)
    }

    /// Register a sink that reports drops into an existing counter.
    pub fn add_sink_with_counter(
        &mut self,
        name: impl Into<String>,
        capacity: usize,
        policy: DropPolicy,
        dropped: DropCounter,
    ) -> mpsc::Receiver<T> {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        self.sinks.push(Sink {
            name: name.into(),
            tx,
            policy,
            dropped,
        });
        rx
    }

    pub fn sink_count(&self) -> usize {
        self.sinks.len()
    }

    pub async fn run(mut self) {
        while let Some(item) = self.source.recv().await {
            self.deliver(item).await;
        }
        tracing::debug!(fanout = self.name, "fanout source closed");
    }

    async fn deliver(&mut self, item: T) {
        let mut closed = Vec::new();
        for (i, sink) in self.sinks.iter().enumerate() {
            match sink.policy {
                DropPolicy::DropNewest => match sink.tx.try_send(item.clone()) {
                    Ok(()) => {}
                    Err(TrySendError::Full(_)) => {
                        sink.dropped.increment();
                        tracing::warn!(
                            fanout = self.name,
                            sink = %sink.name,
                            dropped = sink.dropped.get(),
                            "sink full, dropping newest item"
                        );
                    }
                    Err(TrySendError::Closed(_)) => closed.push(i),
                },
                DropPolicy::Backpressure => {
                    if sink.tx.send(item.clone()).await.is_err() {
                        closed.push(i);
                    }
                }
            }
        }
        for i in closed.into_iter().rev() {
            let sink = self.sinks.remove(i);
            tracing::debug!(fanout = self.name, sink = %sink.name, "sink closed, removing");
        }
    }
}
