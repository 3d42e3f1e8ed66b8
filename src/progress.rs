use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Snapshot returned to the status reader.
///
/// `seconds_since_progress` lets the caller apply its own stuck threshold;
/// the engine never self-cancels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProgressRecord {
    pub total_batches: usize,
    pub completed_batches: usize,
    pub error: bool,
    pub seconds_since_progress: u64,
}

struct ProgressEntry {
    total_batches: usize,
    completed_batches: usize,
    error: bool,
    last_progress: Instant,
    finished_at: Option<Instant>,
}

/// Process-wide map from progress-id to the state of a running request.
///
/// Writers are the request entry (total, error, finish) and the executor
/// workers (completed increments). The one reader is the external status
/// endpoint. A plain mutex serializes all of it; records linger for a grace
/// period after the request finishes and are collected opportunistically.
#[derive(Clone)]
pub struct ProgressStore {
    inner: Arc<Mutex<HashMap<String, ProgressEntry>>>,
    linger: Duration,
}

impl Default for ProgressStore {
    fn default() -> Self {
        Self::new(Duration::from_secs(300))
    }
}

impl ProgressStore {
    pub fn new(linger: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(HashMap::new())),
            linger,
        }
    }

    /// Register a request. Resets any stale record under the same id.
    pub fn start(&self, progress_id: &str) {
        let mut map = self.inner.lock().expect("progress store poisoned");
        Self::purge(&mut map, self.linger);
        map.insert(
            progress_id.to_string(),
            ProgressEntry {
                total_batches: 0,
                completed_batches: 0,
                error: false,
                last_progress: Instant::now(),
                finished_at: None,
            },
        );
    }

    pub fn set_total(&self, progress_id: &str, total_batches: usize) {
        let mut map = self.inner.lock().expect("progress store poisoned");
        if let Some(entry) = map.get_mut(progress_id) {
            entry.total_batches = total_batches;
            entry.last_progress = Instant::now();
        }
    }

    /// One batch finished (successfully or not). Counters only move forward.
    pub fn complete_one(&self, progress_id: &str) {
        let mut map = self.inner.lock().expect("progress store poisoned");
        if let Some(entry) = map.get_mut(progress_id) {
            entry.completed_batches += 1;
            entry.last_progress = Instant::now();
        }
    }

    pub fn set_error(&self, progress_id: &str) {
        let mut map = self.inner.lock().expect("progress store poisoned");
        if let Some(entry) = map.get_mut(progress_id) {
            entry.error = true;
            entry.last_progress = Instant::now();
        }
    }

    /// Mark the request terminated; the record stays readable for the linger
    /// period so late status polls still resolve.
    pub fn finish(&self, progress_id: &str) {
        let mut map = self.inner.lock().expect("progress store poisoned");
        if let Some(entry) = map.get_mut(progress_id) {
            entry.finished_at = Some(Instant::now());
        }
    }

    /// Unknown ids return `None` — the caller's not-found signal.
    pub fn get(&self, progress_id: &str) -> Option<ProgressRecord> {
        let mut map = self.inner.lock().expect("progress store poisoned");
        Self::purge(&mut map, self.linger);
        map.get(progress_id).map(|entry| ProgressRecord {
            total_batches: entry.total_batches,
            completed_batches: entry.completed_batches,
            error: entry.error,
            seconds_since_progress: entry.last_progress.elapsed().as_secs(),
        })
    }

    fn purge(map: &mut HashMap<String, ProgressEntry>, linger: Duration) {
        map.retain(|_, entry| match entry.finished_at {
            Some(at) => at.elapsed() < linger,
            None => true,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_id_is_none() {
        let store = ProgressStore::default();
        assert!(store.get("nope").is_none());
    }

    #[test]
    fn counters_advance_and_error_flag_sticks() {
        let store = ProgressStore::default();
        store.start("req-1");
        store.set_total("req-1", 3);
        store.complete_one("req-1");
        store.complete_one("req-1");
        let rec = store.get("req-1").unwrap();
        assert_eq!(rec.total_batches, 3);
        assert_eq!(rec.completed_batches, 2);
        assert!(!rec.error);

        store.set_error("req-1");
        assert!(store.get("req-1").unwrap().error);
    }

    #[test]
    fn finished_records_are_purged_after_linger() {
        let store = ProgressStore::new(Duration::from_millis(0));
        store.start("req-2");
        store.finish("req-2");
        std::thread::sleep(Duration::from_millis(5));
        assert!(store.get("req-2").is_none());
    }

    #[test]
    fn unfinished_records_survive_purge() {
        let store = ProgressStore::new(Duration::from_millis(0));
        store.start("req-3");
        assert!(store.get("req-3").is_some());
    }
}
