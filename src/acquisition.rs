//! Double-buffered slot handoff between the sampling callback and the
//! consumer loop.
//!
//! [`slot_pair`] builds a single-producer single-consumer pair over two
//! fixed-size flat buffers (slots). The sampling callback appends readings
//! into its active slot with [`SlotWriter::record`]; when the slot fills, the
//! writer publishes it and moves on to a free slot in one atomic transition.
//! The consumer claims the published slot with [`SlotReader::try_claim`] and
//! holds it through a [`ClaimedSlot`] guard while ingesting.
//!
//! # Slot ownership
//!
//! Every slot is owned by exactly one party at all times:
//!
//! ```text
//!   writer active ──publish──▶ published ──claim──▶ claimed (guard)
//!        ▲                        │                    │
//!        └────────── spare ◀──────┼────────release─────┘
//!                      ▲          │
//!                      └──(writer takes spare or replaces a
//!                          stale publication on the next fill)
//! ```
//!
//! The writer never blocks and never touches a claimed slot. When a slot
//! completes and no free slot is available, data is dropped and the shared
//! overrun counter is incremented, once per lost slice:
//!
//! - a publication the consumer never claimed is replaced by the fresh slot
//!   (the stale slice is lost);
//! - if the consumer is still holding the other slot, the fresh slice is
//!   dropped in place and the active slot reused.
//!
//! Overruns are counted producer-side and reported consumer-side only, via
//! [`SlotReader::take_overruns`].

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Sentinel for an empty handoff cell.
const EMPTY: usize = usize::MAX;

/// Poll interval used by [`SlotReader::wait_claim`].
const POLL_INTERVAL: Duration = Duration::from_micros(500);

/// State shared between the writer and reader halves.
struct SlotShared {
    /// The two slots. Access is serialized by the ownership protocol: a slot
    /// is written only while owned by the writer and read only while claimed.
    slots: [UnsafeCell<Box<[f32]>>; 2],
    /// Index of the published slot awaiting claim, or [`EMPTY`].
    ready: AtomicUsize,
    /// Index of the slot the consumer has released back, or [`EMPTY`].
    released: AtomicUsize,
    /// Slices lost because no handoff was possible.
    overruns: AtomicU64,
    /// Set when the writer half is dropped; no further publications follow.
    shutdown: AtomicBool,
}

// SAFETY: slot contents are only ever accessed by the party that currently
// owns the slot index. Ownership moves through `ready` and `released` with
// Release/Acquire ordering, so writes made by the previous owner are visible
// to the next.
unsafe impl Send for SlotShared {}
// SAFETY: see above; concurrent access to the same slot cannot occur.
unsafe impl Sync for SlotShared {}

/// Producer half of the slot pair.
///
/// Owned by the sampling callback. [`record`](Self::record) is non-blocking
/// and allocation-free.
pub struct SlotWriter {
    shared: Arc<SlotShared>,
    /// Slot currently owned by the writer. Always a valid index.
    active: usize,
    /// Values written into the active slot so far.
    fill: usize,
    slot_len: usize,
}

/// Consumer half of the slot pair.
pub struct SlotReader {
    shared: Arc<SlotShared>,
    slot_len: usize,
}

/// Exclusive view of a claimed slot.
///
/// While the guard lives the producer cannot write this slot; dropping it
/// returns the slot to the writer's free pool.
pub struct ClaimedSlot<'a> {
    reader: &'a mut SlotReader,
    idx: usize,
}

/// Create a writer/reader pair over two slots of `slot_len` values each.
///
/// `slot_len` must be non-zero and a multiple of the reading length passed
/// to [`SlotWriter::record`].
pub fn slot_pair(slot_len: usize) -> (SlotWriter, SlotReader) {
    assert!(slot_len > 0, "slot length must be non-zero");

    let shared = Arc::new(SlotShared {
        slots: [
            UnsafeCell::new(vec![0.0; slot_len].into_boxed_slice()),
            UnsafeCell::new(vec![0.0; slot_len].into_boxed_slice()),
        ],
        ready: AtomicUsize::new(EMPTY),
        // Slot 1 starts as the writer's spare.
        released: AtomicUsize::new(1),
        overruns: AtomicU64::new(0),
        shutdown: AtomicBool::new(false),
    });

    let writer = SlotWriter {
        shared: Arc::clone(&shared),
        active: 0,
        fill: 0,
        slot_len,
    };
    let reader = SlotReader { shared, slot_len };
    (writer, reader)
}

impl SlotWriter {
    /// Append one interleaved reading to the active slot.
    ///
    /// Never blocks. When the reading completes the slot, the slot is
    /// published for the consumer and the writer switches to a free slot;
    /// if none is free the slice is dropped and an overrun counted.
    #[inline]
    pub fn record(&mut self, reading: &[f32]) {
        // SAFETY: `active` is owned by the writer until published; no other
        // party reads or writes it.
        let slot = unsafe { &mut *self.shared.slots[self.active].get() };
        slot[self.fill..self.fill + reading.len()].copy_from_slice(reading);
        self.fill += reading.len();

        if self.fill == self.slot_len {
            self.fill = 0;
            self.publish();
        }
    }

    /// Values written into the active slot so far.
    pub fn fill(&self) -> usize {
        self.fill
    }

    /// Slot length in values.
    pub fn slot_len(&self) -> usize {
        self.slot_len
    }

    /// Hand the full active slot to the consumer and pick the next writable
    /// slot, without ever blocking.
    fn publish(&mut self) {
        let shared = &self.shared;

        // Fast path: the consumer has released a slot; publish and take it.
        let spare = shared.released.swap(EMPTY, Ordering::Acquire);
        if spare != EMPTY {
            // With the spare in hand the writer briefly owns both slots, so
            // the ready cell cannot be occupied.
            let prev = shared.ready.swap(self.active, Ordering::AcqRel);
            debug_assert_eq!(prev, EMPTY);
            self.active = spare;
            return;
        }

        // No spare. If a stale publication sits unclaimed, replace it with
        // the fresh slot; the stale slice is lost.
        let stale = shared.ready.swap(EMPTY, Ordering::Acquire);
        if stale != EMPTY {
            let prev = shared.ready.swap(self.active, Ordering::AcqRel);
            debug_assert_eq!(prev, EMPTY);
            self.active = stale;
            shared.overruns.fetch_add(1, Ordering::Relaxed);
            return;
        }

        // The consumer is holding the other slot. Drop this slice in place
        // and keep the active slot writable.
        shared.overruns.fetch_add(1, Ordering::Relaxed);
    }
}

impl Drop for SlotWriter {
    fn drop(&mut self) {
        // The Release pairs with the reader's disconnect check, making a
        // final publication visible before the disconnect is.
        self.shared.shutdown.store(true, Ordering::Release);
    }
}

impl SlotReader {
    /// Claim the published slot, if any, clearing its readiness.
    pub fn try_claim(&mut self) -> Option<ClaimedSlot<'_>> {
        let idx = self.claim_index()?;
        Some(ClaimedSlot { reader: self, idx })
    }

    /// Claim the published slot, waiting up to `timeout` for one to appear.
    ///
    /// Returns early with `None` once the writer has disconnected and no
    /// publication is pending.
    pub fn wait_claim(&mut self, timeout: Duration) -> Option<ClaimedSlot<'_>> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(idx) = self.claim_index() {
                return Some(ClaimedSlot { reader: self, idx });
            }
            if self.is_disconnected() {
                // One more attempt catches a publication racing the drop.
                let idx = self.claim_index()?;
                return Some(ClaimedSlot { reader: self, idx });
            }
            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            thread::sleep(POLL_INTERVAL.min(deadline - now));
        }
    }

    /// Whether a slot is currently published.
    pub fn has_ready(&self) -> bool {
        self.shared.ready.load(Ordering::Acquire) != EMPTY
    }

    /// Drain the overrun counter: slices lost since the last call.
    pub fn take_overruns(&self) -> u64 {
        self.shared.overruns.swap(0, Ordering::Relaxed)
    }

    /// Whether the writer half has been dropped.
    ///
    /// A pending publication may still be claimable; drain with
    /// [`try_claim`](Self::try_claim) before treating the pair as finished.
    pub fn is_disconnected(&self) -> bool {
        self.shared.shutdown.load(Ordering::Acquire)
    }

    /// Slot length in values.
    pub fn slot_len(&self) -> usize {
        self.slot_len
    }

    fn claim_index(&mut self) -> Option<usize> {
        // Clearing `ready` is the claim itself; the Acquire pairs with the
        // writer's publish so the slot contents are visible.
        let idx = self.shared.ready.swap(EMPTY, Ordering::Acquire);
        (idx != EMPTY).then_some(idx)
    }
}

impl ClaimedSlot<'_> {
    /// The claimed slice, in arrival order.
    pub fn values(&self) -> &[f32] {
        // SAFETY: the claim removed this index from `ready`; the writer
        // cannot select it again until the guard drops and releases it.
        unsafe { &*self.reader.shared.slots[self.idx].get() }
    }

    /// Slot length in values.
    pub fn len(&self) -> usize {
        self.reader.slot_len
    }

    /// Whether the slot is empty (never the case for a valid pair).
    pub fn is_empty(&self) -> bool {
        self.reader.slot_len == 0
    }
}

impl Drop for ClaimedSlot<'_> {
    fn drop(&mut self) {
        // The consumer can hold at most one slot, so the released cell is
        // necessarily empty here.
        let prev = self
            .reader
            .shared
            .released
            .swap(self.idx, Ordering::Release);
        debug_assert_eq!(prev, EMPTY);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Fill one slot with a recognizable ramp starting at `base`.
    fn fill_slot(writer: &mut SlotWriter, base: f32) {
        let len = writer.slot_len();
        for i in (0..len).step_by(2) {
            writer.record(&[base + i as f32, base + i as f32 + 1.0]);
        }
    }

    #[test]
    fn test_nominal_alternation_no_overruns() {
        let (mut writer, mut reader) = slot_pair(6);

        for round in 0..10 {
            let base = (round * 100) as f32;
            fill_slot(&mut writer, base);

            let slot = reader.try_claim().expect("slot should be published");
            let expected: Vec<f32> = (0..6).map(|i| base + i as f32).collect();
            assert_eq!(slot.values(), expected.as_slice());
            drop(slot);
        }

        assert_eq!(reader.take_overruns(), 0);
    }

    #[test]
    fn test_fill_tracks_partial_slot() {
        let (mut writer, reader) = slot_pair(4);
        assert_eq!(writer.fill(), 0);

        writer.record(&[1.0, 2.0]);
        assert_eq!(writer.fill(), 2);

        // Completing the slot publishes it and leaves the writer on an
        // empty one.
        writer.record(&[3.0, 4.0]);
        assert_eq!(writer.fill(), 0);
        assert!(reader.has_ready());
    }

    #[test]
    fn test_claim_clears_readiness() {
        let (mut writer, mut reader) = slot_pair(4);
        writer.record(&[1.0, 2.0, 3.0, 4.0]);

        assert!(reader.has_ready());
        let slot = reader.try_claim().expect("published");
        drop(slot);
        assert!(!reader.has_ready());
        assert!(reader.try_claim().is_none());
    }

    #[test]
    fn test_stale_publication_replaced_and_counted() {
        let (mut writer, mut reader) = slot_pair(4);

        // Two slots complete with no claim in between: the first is lost.
        writer.record(&[1.0, 1.0, 1.0, 1.0]);
        writer.record(&[2.0, 2.0, 2.0, 2.0]);

        let slot = reader.try_claim().expect("fresh slice published");
        assert_eq!(slot.values(), &[2.0, 2.0, 2.0, 2.0]);
        drop(slot);

        assert_eq!(reader.take_overruns(), 1);
        assert_eq!(reader.take_overruns(), 0);
    }

    #[test]
    fn test_held_claim_never_blocks_writer() {
        let (mut writer, mut reader) = slot_pair(2);

        writer.record(&[1.0, 1.0]);
        let held = reader.try_claim().expect("published");

        // Writer keeps completing slices while the consumer sits on its
        // claim; each one is dropped promptly, never deadlocking.
        let start = Instant::now();
        writer.record(&[2.0, 2.0]);
        writer.record(&[3.0, 3.0]);
        writer.record(&[4.0, 4.0]);
        assert!(start.elapsed() < Duration::from_millis(100));

        // The held slot was never touched.
        assert_eq!(held.values(), &[1.0, 1.0]);
        drop(held);

        assert_eq!(reader.take_overruns(), 3);

        // Handoff resumes cleanly after release.
        writer.record(&[5.0, 5.0]);
        let slot = reader.try_claim().expect("published after release");
        assert_eq!(slot.values(), &[5.0, 5.0]);
        drop(slot);
        assert_eq!(reader.take_overruns(), 0);
    }

    #[test]
    fn test_wait_claim_times_out_when_idle() {
        let (_writer, mut reader) = slot_pair(4);

        let start = Instant::now();
        assert!(reader.wait_claim(Duration::from_millis(30)).is_none());
        assert!(start.elapsed() >= Duration::from_millis(25));
    }

    #[test]
    fn test_disconnect_drains_final_slice_then_returns_early() {
        let (mut writer, mut reader) = slot_pair(4);
        writer.record(&[1.0, 2.0, 3.0, 4.0]);
        drop(writer);

        assert!(reader.is_disconnected());

        // The publication made before the drop is still claimable.
        let slot = reader
            .wait_claim(Duration::from_millis(50))
            .expect("final slice");
        assert_eq!(slot.values(), &[1.0, 2.0, 3.0, 4.0]);
        drop(slot);

        // After the drain, waiting returns well before the deadline.
        let start = Instant::now();
        assert!(reader.wait_claim(Duration::from_secs(5)).is_none());
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_threaded_handoff_slices_arrive_intact_and_in_order() {
        const SLOT_LEN: usize = 8;
        const SLICES: usize = 200;

        let (mut writer, mut reader) = slot_pair(SLOT_LEN);

        let producer = thread::spawn(move || {
            for slice in 0..SLICES {
                let base = (slice * SLOT_LEN) as f32;
                for i in 0..SLOT_LEN {
                    writer.record(&[base + i as f32]);
                }
                // Pace the producer so the consumer keeps up most of the
                // time; occasional losses are fine and accounted for.
                thread::sleep(Duration::from_micros(200));
            }
        });

        // Each slice must be internally consistent (no torn writes) and
        // slices must arrive oldest-first.
        fn check_slice(values: &[f32], received: &mut Vec<f32>) {
            for pair in values.windows(2) {
                assert_eq!(pair[1], pair[0] + 1.0);
            }
            if let Some(&last) = received.last() {
                assert!(values[0] > last);
            }
            received.push(values[0]);
        }

        let mut received: Vec<f32> = Vec::new();

        while let Some(slot) = reader.wait_claim(Duration::from_millis(50)) {
            check_slice(slot.values(), &mut received);
        }
        producer.join().expect("producer thread");

        // Pick up anything published after the wait gave up.
        while let Some(slot) = reader.try_claim() {
            check_slice(slot.values(), &mut received);
        }
        let lost = reader.take_overruns();

        assert_eq!(received.len() as u64 + lost, SLICES as u64);
        assert!(!received.is_empty());
    }
}
