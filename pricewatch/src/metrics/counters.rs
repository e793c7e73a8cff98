use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Minimal counters for operational visibility.
#[derive(Clone, Default)]
pub struct Counters {
    pub cycles_started: Arc<AtomicU64>,
    pub cycles_completed: Arc<AtomicU64>,
    pub cycles_failed: Arc<AtomicU64>,
    pub cycles_skipped: Arc<AtomicU64>,

    pub fetch_failures: Arc<AtomicU64>,
    pub products_changed: Arc<AtomicU64>,
    pub history_failures: Arc<AtomicU64>,

    pub notifications_sent: Arc<AtomicU64>,
    pub notifications_failed: Arc<AtomicU64>,

    pub metadata_updates: Arc<AtomicU64>,
}

impl Counters {
    pub fn add(counter: &AtomicU64, n: usize) {
        counter.fetch_add(n as u64, Ordering::Relaxed);
    }

    pub fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get(counter: &AtomicU64) -> u64 {
        counter.load(Ordering::Relaxed)
    }
}
