use crate::{Outcome, SequencerObserver};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

#[derive(Debug)]
pub struct HarnessMetrics {
    reads: AtomicU64,
    writes: AtomicU64,
    wait_cycles: AtomicU64,
    polls: AtomicU64,
    cases: AtomicU64,
    start_time: Instant,
}

/// Point-in-time copy of the counters, for reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub reads: u64,
    pub writes: u64,
    pub wait_cycles: u64,
    pub polls: u64,
    pub cases: u64,
}

impl Default for HarnessMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl HarnessMetrics {
    pub fn new() -> Self {
        Self {
            reads: AtomicU64::new(0),
            writes: AtomicU64::new(0),
            wait_cycles: AtomicU64::new(0),
            polls: AtomicU64::new(0),
            cases: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn reset(&self) {
        self.reads.store(0, Ordering::SeqCst);
        self.writes.store(0, Ordering::SeqCst);
        self.wait_cycles.store(0, Ordering::SeqCst);
        self.polls.store(0, Ordering::SeqCst);
        self.cases.store(0, Ordering::SeqCst);
    }

    pub fn get_reads(&self) -> u64 {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn get_writes(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn get_wait_cycles(&self) -> u64 {
        self.wait_cycles.load(Ordering::SeqCst)
    }

    pub fn get_polls(&self) -> u64 {
        self.polls.load(Ordering::SeqCst)
    }

    pub fn get_cases(&self) -> u64 {
        self.cases.load(Ordering::SeqCst)
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.start_time.elapsed().as_secs_f64()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            reads: self.get_reads(),
            writes: self.get_writes(),
            wait_cycles: self.get_wait_cycles(),
            polls: self.get_polls(),
            cases: self.get_cases(),
        }
    }
}

impl SequencerObserver for HarnessMetrics {
    fn on_case_end(&self, _name: &str, _outcome: Outcome) {
        self.cases.fetch_add(1, Ordering::SeqCst);
    }

    fn on_register_write(&self, _addr: u64, _value: u32) {
        self.writes.fetch_add(1, Ordering::SeqCst);
    }

    fn on_register_read(&self, _addr: u64, _value: u32) {
        self.reads.fetch_add(1, Ordering::SeqCst);
    }

    // Status polls go straight to the bus, so they are counted here rather
    // than as register reads.
    fn on_wait_end(&self, cycles: u64, polls: u32) {
        self.wait_cycles.fetch_add(cycles, Ordering::SeqCst);
        self.polls.fetch_add(polls as u64, Ordering::SeqCst);
    }
}
