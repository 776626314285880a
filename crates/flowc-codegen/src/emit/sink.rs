//! Record sinks bound to output slots.

use std::fmt;
use std::sync::Mutex;

use flowc_core::Record;

use crate::error::RuntimeError;

/// Receives records pushed by a processor.
pub trait Sink: Send + Sync + fmt::Debug {
    fn add(&self, record: Record) -> Result<(), RuntimeError>;
}

/// Keeps every record it receives.
#[derive(Debug, Default)]
pub struct CollectingSink {
    records: Mutex<Vec<Record>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the received records, in arrival order.
    pub fn records(&self) -> Vec<Record> {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn take(&self) -> Vec<Record> {
        std::mem::take(
            &mut *self
                .records
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner()),
        )
    }

    pub fn len(&self) -> usize {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Sink for CollectingSink {
    fn add(&self, record: Record) -> Result<(), RuntimeError> {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(record);
        Ok(())
    }
}

/// Adapts a closure into a sink.
pub struct FnSink<F>(pub F);

impl<F> fmt::Debug for FnSink<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FnSink")
    }
}

impl<F> Sink for FnSink<F>
where
    F: Fn(Record) -> Result<(), RuntimeError> + Send + Sync,
{
    fn add(&self, record: Record) -> Result<(), RuntimeError> {
        (self.0)(record)
    }
}
