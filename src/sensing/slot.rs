use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crossbeam::atomic::AtomicCell;

#[derive(Debug, Clone, Copy)]
struct Stamped<T> {
    epoch: u64,
    value: T,
}

/// Single-value buffer shared between a sensor callback and the owner thread.
///
/// Writers replace the whole value at once, so a reader never sees a torn
/// reading. Every subscription gets a fresh epoch; values published under an
/// older epoch are invisible, which keeps a late sample from a cancelled
/// subscription out of the next session.
///
/// Reads are lock-free. Writers and epoch changes are serialized, so a
/// publish from an older epoch can never replace a fresher value.
#[derive(Debug)]
pub struct ReadingSlot<T: Copy> {
    epoch: AtomicU64,
    cell: AtomicCell<Option<Stamped<T>>>,
    writer: Mutex<()>,
}

impl<T: Copy> ReadingSlot<T> {
    pub fn new() -> Self {
        Self {
            epoch: AtomicU64::new(0),
            cell: AtomicCell::new(None),
            writer: Mutex::new(()),
        }
    }

    /// Starts a new epoch with an empty slot and returns it.
    pub fn begin_epoch(&self) -> u64 {
        self.begin_epoch_with(|| {})
    }

    /// Like [`begin_epoch`](Self::begin_epoch), running `reset` before any
    /// writer can publish into the new epoch.
    pub fn begin_epoch_with<F: FnOnce()>(&self, reset: F) -> u64 {
        let _guard = self.lock_writers();
        let epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        self.cell.store(None);
        reset();
        epoch
    }

    pub fn current_epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    /// Last write wins within an epoch. Returns false, leaving the slot
    /// untouched, when `epoch` is no longer current.
    pub fn publish(&self, epoch: u64, value: T) -> bool {
        self.publish_with(epoch, value, |_| {})
    }

    /// Publishes and runs `notify` while epoch changes are held off, so
    /// anything it forwards the value to is ordered with the slot.
    pub fn publish_with<F: FnOnce(T)>(&self, epoch: u64, value: T, notify: F) -> bool {
        let _guard = self.lock_writers();
        if epoch != self.current_epoch() {
            return false;
        }
        self.cell.store(Some(Stamped { epoch, value }));
        notify(value);
        true
    }

    pub fn latest(&self) -> Option<T> {
        let current = self.current_epoch();
        self.cell
            .load()
            .filter(|stamped| stamped.epoch == current)
            .map(|stamped| stamped.value)
    }

    fn lock_writers(&self) -> MutexGuard<'_, ()> {
        // The guarded section only touches atomics; a poisoned lock is still sound.
        self.writer.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: Copy> Default for ReadingSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use rand::{rngs::StdRng, Rng, SeedableRng};

    use super::*;

    #[test]
    fn empty_until_first_publish() {
        let slot = ReadingSlot::<f32>::new();
        let epoch = slot.begin_epoch();
        assert_eq!(slot.latest(), None);

        slot.publish(epoch, 1001.5);
        assert_eq!(slot.latest(), Some(1001.5));
    }

    #[test]
    fn stale_epochs_are_ignored() {
        let slot = ReadingSlot::<f32>::new();
        let old = slot.begin_epoch();
        slot.publish(old, 990.0);

        let _fresh = slot.begin_epoch();
        assert_eq!(slot.latest(), None);

        assert!(!slot.publish(old, 995.0));
        assert_eq!(slot.latest(), None);
    }

    #[test]
    fn late_publish_cannot_replace_a_fresh_value() {
        let slot = ReadingSlot::<f32>::new();
        let old = slot.begin_epoch();
        let fresh = slot.begin_epoch();

        assert!(slot.publish(fresh, 1013.0));
        assert!(!slot.publish(old, 990.0));

        assert_eq!(slot.latest(), Some(1013.0));
    }

    #[test]
    fn stale_writers_racing_an_epoch_change_never_win() {
        let slot = Arc::new(ReadingSlot::<f32>::new());
        let old = slot.begin_epoch();
        let stale_slot = Arc::clone(&slot);

        let stale = thread::spawn(move || {
            for i in 0..20_000u32 {
                stale_slot.publish(old, i as f32);
            }
        });

        let fresh = slot.begin_epoch();
        assert!(slot.publish(fresh, -1.0));
        stale.join().unwrap();

        assert_eq!(slot.latest(), Some(-1.0));
    }

    #[test]
    fn notify_only_runs_for_accepted_values() {
        let slot = ReadingSlot::<f32>::new();
        let old = slot.begin_epoch();
        let fresh = slot.begin_epoch();
        let mut seen = Vec::new();

        slot.publish_with(old, 1.0, |value| seen.push(value));
        slot.publish_with(fresh, 2.0, |value| seen.push(value));

        assert_eq!(seen, [2.0]);
    }

    #[test]
    fn last_write_wins_for_random_sequences() {
        let mut rng = StdRng::seed_from_u64(7);
        let slot = ReadingSlot::<[f32; 3]>::new();

        for _ in 0..100 {
            let epoch = slot.begin_epoch();
            let count = rng.gen_range(1..50);
            let mut last = [0.0; 3];
            for _ in 0..count {
                last = [rng.gen(), rng.gen(), rng.gen()];
                slot.publish(epoch, last);
            }
            assert_eq!(slot.latest(), Some(last));
        }
    }

    #[test]
    fn concurrent_reads_never_observe_torn_values() {
        let slot = Arc::new(ReadingSlot::<[f32; 3]>::new());
        let epoch = slot.begin_epoch();
        let writer_slot = Arc::clone(&slot);

        let writer = thread::spawn(move || {
            for i in 0..20_000u32 {
                let v = i as f32;
                writer_slot.publish(epoch, [v, v, v]);
            }
        });

        while !writer.is_finished() {
            if let Some([x, y, z]) = slot.latest() {
                assert!(x == y && y == z, "torn read: {x} {y} {z}");
            }
        }
        writer.join().unwrap();

        assert_eq!(slot.latest(), Some([19_999.0; 3]));
    }
}
