use std::sync::{Arc, RwLock};

use acq400_shared::StatusVector;

/// Thread-safe cell holding the latest status snapshot.
///
/// Written only by the status poller, always as a whole vector, so a reader
/// never sees fields from two different records.
#[derive(Clone, Debug, Default)]
pub struct StatusCell {
    inner: Arc<RwLock<StatusVector>>,
}

impl StatusCell {
    pub fn new(status: StatusVector) -> Self {
        Self {
            inner: Arc::new(RwLock::new(status)),
        }
    }

    /// Replace the stored snapshot.
    pub fn store(&self, status: StatusVector) {
        match self.inner.write() {
            Ok(mut w) => *w = status,
            Err(poisoned) => *poisoned.into_inner() = status,
        }
    }

    /// Copy out the latest snapshot.
    pub fn load(&self) -> StatusVector {
        match self.inner.read() {
            Ok(r) => *r,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn readers_see_whole_records() {
        let cell = StatusCell::new(StatusVector::new(0, 0, 0, 0, 0));
        let writer = {
            let cell = cell.clone();
            std::thread::spawn(move || {
                for i in 1..=2000 {
                    cell.store(StatusVector::new(i, i, i, i, i));
                }
            })
        };
        for _ in 0..2000 {
            let v = cell.load();
            assert!(v.pre == v.state && v.post == v.state && v.elapsed == v.state);
            assert_eq!(v.demux, v.state);
        }
        writer.join().unwrap();
        assert_eq!(cell.load(), StatusVector::new(2000, 2000, 2000, 2000, 2000));
    }
}
