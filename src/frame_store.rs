use crate::error::FrameStoreError;
use crate::frame::{FrameSample, SourceId};
use image::RgbImage;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::{debug, trace};

/// A single source's slot: the latest sample, if any
struct FrameSlot {
    latest: Mutex<Option<FrameSample>>,
    publishes: AtomicU64,
    reads: AtomicU64,
}

impl FrameSlot {
    fn new() -> Self {
        Self {
            latest: Mutex::new(None),
            publishes: AtomicU64::new(0),
            reads: AtomicU64::new(0),
        }
    }
}

/// Registry of per-source "latest frame wins" slots.
///
/// Built once at startup from the configured source list and shared by every
/// worker (writers) and the presentation loop (reader). Each slot holds at
/// most one sample; the lock is held only to swap or clone the `Arc`'d sample,
/// never across I/O.
pub struct FrameStore {
    slots: BTreeMap<SourceId, FrameSlot>,
}

/// Per-slot counters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotStats {
    pub source_id: SourceId,
    pub publishes: u64,
    pub reads: u64,
    pub occupied: bool,
}

impl FrameStore {
    pub fn new<I>(source_ids: I) -> Self
    where
        I: IntoIterator<Item = SourceId>,
    {
        let slots: BTreeMap<SourceId, FrameSlot> = source_ids
            .into_iter()
            .map(|id| (id, FrameSlot::new()))
            .collect();

        debug!("Created frame store with {} slots", slots.len());

        Self { slots }
    }

    fn slot(&self, source_id: SourceId) -> Result<&FrameSlot, FrameStoreError> {
        self.slots
            .get(&source_id)
            .ok_or(FrameStoreError::UnknownSource { source_id })
    }

    /// Replace the slot for `source_id` with a freshly captured buffer
    pub fn publish(
        &self,
        source_id: SourceId,
        image: RgbImage,
        captured_at: Instant,
    ) -> Result<(), FrameStoreError> {
        self.publish_sample(FrameSample::new(source_id, image, captured_at))
    }

    /// Replace the slot with an already built sample
    pub fn publish_sample(&self, sample: FrameSample) -> Result<(), FrameStoreError> {
        let slot = self.slot(sample.source_id)?;
        let source_id = sample.source_id;

        let previous = {
            let mut latest = slot.latest.lock();
            latest.replace(sample)
        };
        // The replaced sample is dropped outside the lock
        drop(previous);

        slot.publishes.fetch_add(1, Ordering::Relaxed);
        trace!("Published frame for source {}", source_id);
        Ok(())
    }

    /// Copy of the latest sample for `source_id`, or `None` when the source
    /// has never published or is not currently connected
    pub fn read(&self, source_id: SourceId) -> Result<Option<FrameSample>, FrameStoreError> {
        let slot = self.slot(source_id)?;
        let sample = slot.latest.lock().clone();
        slot.reads.fetch_add(1, Ordering::Relaxed);
        Ok(sample)
    }

    /// Empty the slot, e.g. when its source disconnects
    pub fn clear(&self, source_id: SourceId) -> Result<(), FrameStoreError> {
        let slot = self.slot(source_id)?;
        let previous = slot.latest.lock().take();
        if previous.is_some() {
            debug!("Cleared frame slot for source {}", source_id);
        }
        Ok(())
    }

    /// Read every slot in source order
    pub fn read_all(&self) -> Vec<(SourceId, Option<FrameSample>)> {
        self.slots
            .iter()
            .map(|(id, slot)| {
                slot.reads.fetch_add(1, Ordering::Relaxed);
                (*id, slot.latest.lock().clone())
            })
            .collect()
    }

    pub fn source_ids(&self) -> impl Iterator<Item = SourceId> + '_ {
        self.slots.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn stats(&self) -> Vec<SlotStats> {
        self.slots
            .iter()
            .map(|(id, slot)| SlotStats {
                source_id: *id,
                publishes: slot.publishes.load(Ordering::Relaxed),
                reads: slot.reads.load(Ordering::Relaxed),
                occupied: slot.latest.lock().is_some(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    fn filled(value: u8) -> RgbImage {
        RgbImage::from_pixel(64, 48, Rgb([value, value, value]))
    }

    #[test]
    fn test_read_absent_before_publish() {
        let store = FrameStore::new([SourceId(1), SourceId(2)]);
        assert!(store.read(SourceId(1)).unwrap().is_none());
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_unknown_source() {
        let store = FrameStore::new([SourceId(1)]);
        let err = store
            .publish(SourceId(9), filled(0), Instant::now())
            .unwrap_err();
        assert_eq!(err, FrameStoreError::UnknownSource { source_id: SourceId(9) });
        assert!(store.read(SourceId(9)).is_err());
    }

    #[test]
    fn test_latest_write_wins() {
        let store = FrameStore::new([SourceId(1)]);
        let base = Instant::now();

        for i in 0..10u8 {
            store
                .publish(SourceId(1), filled(i), base + Duration::from_millis(i as u64))
                .unwrap();
        }

        let sample = store.read(SourceId(1)).unwrap().unwrap();
        assert_eq!(sample.image.get_pixel(0, 0), &Rgb([9, 9, 9]));
        assert_eq!(sample.captured_at, base + Duration::from_millis(9));

        let stats = store.stats();
        assert_eq!(stats[0].publishes, 10);
        assert!(stats[0].occupied);
    }

    #[test]
    fn test_reader_copy_independent_of_later_publish() {
        let store = FrameStore::new([SourceId(1)]);
        store.publish(SourceId(1), filled(10), Instant::now()).unwrap();

        let held = store.read(SourceId(1)).unwrap().unwrap();
        store.publish(SourceId(1), filled(20), Instant::now()).unwrap();

        assert_eq!(held.image.get_pixel(5, 5), &Rgb([10, 10, 10]));
        let fresh = store.read(SourceId(1)).unwrap().unwrap();
        assert_eq!(fresh.image.get_pixel(5, 5), &Rgb([20, 20, 20]));
    }

    #[test]
    fn test_clear_makes_slot_absent() {
        let store = FrameStore::new([SourceId(1)]);
        store.publish(SourceId(1), filled(1), Instant::now()).unwrap();
        store.clear(SourceId(1)).unwrap();
        assert!(store.read(SourceId(1)).unwrap().is_none());
    }

    #[test]
    fn test_read_all_in_source_order() {
        let store = FrameStore::new([SourceId(3), SourceId(1), SourceId(2)]);
        store.publish(SourceId(2), filled(2), Instant::now()).unwrap();

        let all = store.read_all();
        let ids: Vec<SourceId> = all.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec![SourceId(1), SourceId(2), SourceId(3)]);
        assert!(all[0].1.is_none());
        assert!(all[1].1.is_some());
    }

    #[test]
    fn test_no_torn_reads_under_concurrency() {
        let store = Arc::new(FrameStore::new([SourceId(1)]));
        let base = Instant::now();

        let writers: Vec<_> = (0..4u8)
            .map(|w| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for i in 0..200u32 {
                        let value = w.wrapping_mul(50).wrapping_add((i % 50) as u8);
                        let stamp = base + Duration::from_micros(value as u64);
                        store.publish(SourceId(1), filled(value), stamp).unwrap();
                    }
                })
            })
            .collect();

        let reader = {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for _ in 0..2000 {
                    if let Some(sample) = store.read(SourceId(1)).unwrap() {
                        let first = sample.image.get_pixel(0, 0)[0];
                        assert!(sample.image.pixels().all(|p| p.0 == [first, first, first]));
                        assert_eq!(
                            sample.captured_at,
                            base + Duration::from_micros(first as u64)
                        );
                    }
                }
            })
        };

        for writer in writers {
            writer.join().unwrap();
        }
        reader.join().unwrap();
    }
}
