//! In-memory execution history.
//!
//! Records are appended when an execution starts and finalized in place when
//! it finishes. Once the configured capacity is reached the oldest appended
//! record is dropped. Nothing survives a process restart.

use std::collections::VecDeque;
use std::sync::{PoisonError, RwLock};

use crate::types::ExecutionRecord;

/// Append-only, size-capped log of execution records.
pub struct HistoryLedger {
    records: RwLock<VecDeque<ExecutionRecord>>,
    capacity: usize,
}

impl HistoryLedger {
    /// Create a ledger keeping at most `capacity` records (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            records: RwLock::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append a record, evicting the oldest one when full.
    pub fn append(&self, record: ExecutionRecord) {
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        records.push_back(record);
        while records.len() > self.capacity {
            records.pop_front();
        }
    }

    /// Replace the stored copy of a running record with its finalized form.
    ///
    /// Returns `false` if the record was already evicted or already finished.
    pub fn update(&self, record: &ExecutionRecord) -> bool {
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        // Running records sit near the back, search from there.
        match records
            .iter_mut()
            .rev()
            .find(|r| r.execution_id == record.execution_id)
        {
            Some(stored) if !stored.status.is_terminal() => {
                *stored = record.clone();
                true
            }
            _ => false,
        }
    }

    /// Query records, most recent start time first.
    ///
    /// Filters by `job_id` when given and returns at most `limit` records.
    pub fn query(&self, job_id: Option<&str>, limit: usize) -> Vec<ExecutionRecord> {
        let records = self.records.read().unwrap_or_else(PoisonError::into_inner);
        // Newest appended first so ties on start_time stay newest-first
        // through the stable sort.
        let mut matching: Vec<ExecutionRecord> = records
            .iter()
            .rev()
            .filter(|r| job_id.is_none_or(|id| r.job_id == id))
            .cloned()
            .collect();
        drop(records);

        matching.sort_by(|a, b| b.start_time.cmp(&a.start_time));
        matching.truncate(limit);
        matching
    }
}
