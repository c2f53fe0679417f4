//! Shared Sample Store with Lock-Free Snapshot Publication
//!
//! ## Overview
//!
//! [`SampleStore`] holds the last `size` values of every recorded variable,
//! one fixed-capacity ring per variable, all addressed by the same circular
//! window. One designated writer (the simulation stepping loop) records a
//! sample per variable per tick; any number of readers - visualization,
//! export, network publication - poll the store at their own cadence.
//!
//! ## Why No Locks?
//!
//! The hot path exchanges data through two mechanisms, neither of which
//! can block or tear:
//!
//! 1. **Atomic slots**: every sample cell is an `AtomicU64` bit pattern.
//!    A reader polling mid-write sees either the previous or the new
//!    value, never a torn one.
//! 2. **Snapshot publication**: the window geometry lives in an
//!    [`ArcSwap`], and the writer publishes a new immutable
//!    [`BufferProperties`] only after every slot of the tick is written.
//!    A reader that loaded the previous snapshot has no index through
//!    which the half-recorded tick is reachable.
//!
//! ```text
//! Writer (per tick)                 Readers (own cadence)
//!   begin_tick ──┐                        │
//!   write slot 0 │ unpublished       load snapshot ── sees tick N
//!   write slot 1 │                        │
//!   ...          │                   read slots inside
//!   commit ──────┘ publish tick N+1  snapshot window
//! ```
//!
//! ## Exclusive Operations
//!
//! `resize` is the single operation requiring exclusivity: it relinearizes
//! the active window into fresh arrays off to the side, then publishes the
//! whole new state in one swap. A tick in flight makes it fail fast with
//! `ConcurrentResizeViolation` instead of blocking. Crop changes
//! (`set_in_point`, `set_out_point`, `resume_sliding`) are writer-side
//! configuration and must not race resize; they are atomic publications
//! themselves and never disturb readers.
//!
//! ## Slot Directory
//!
//! Slots are interned by variable name: a writer registry and any number
//! of reader registries bridging the same variable all resolve to the same
//! slot. Slot creation is append-only and safe concurrently with ongoing
//! recording - existing entries are never mutated.

use alloc::boxed::Box;
use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use arc_swap::ArcSwap;

use crate::errors::{RecordError, RecordResult};
use crate::properties::{BufferProperties, Tick, WindowMode};

// Macro for optional logging
#[cfg(feature = "log")]
macro_rules! log_debug {
    ($($arg:tt)*) => { log::debug!($($arg)*) };
}

#[cfg(not(feature = "log"))]
macro_rules! log_debug {
    ($($arg:tt)*) => {};
}

/// Handle to one variable's ring inside a [`SampleStore`].
///
/// Slot ids are stable for the life of the session; slots are never
/// destroyed individually.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotId(pub(crate) usize);

/// One variable's fixed-capacity ring of raw sample bits.
struct SlotArray {
    /// Sample bit patterns, index-addressed modulo the session capacity
    bits: Box<[AtomicU64]>,
    /// First absolute tick for which this slot holds data
    valid_from: Tick,
}

impl SlotArray {
    fn new(size: usize, valid_from: Tick) -> Self {
        let bits: Vec<AtomicU64> = (0..size).map(|_| AtomicU64::new(0)).collect();
        Self {
            bits: bits.into_boxed_slice(),
            valid_from,
        }
    }
}

/// The complete published state: window geometry plus the slot list.
///
/// Immutable once published; every change builds a successor and swaps it
/// in whole, so readers never observe geometry from one tick and slots
/// from another.
struct StoreState {
    props: BufferProperties,
    slots: Vec<Arc<SlotArray>>,
    directory: BTreeMap<String, usize>,
}

/// Fixed-capacity circular sample store shared by one writer and N readers.
///
/// See the module docs for the concurrency contract. All methods take
/// `&self`; share the store between threads as `Arc<SampleStore>`.
pub struct SampleStore {
    state: ArcSwap<StoreState>,
    /// Writer exclusivity flag: held while a tick is recorded or a resize
    /// runs. Never contended on the reader path.
    writer_flag: AtomicBool,
}

/// RAII writer-exclusivity token.
struct WriterFlag<'a>(&'a AtomicBool);

impl<'a> WriterFlag<'a> {
    fn acquire(flag: &'a AtomicBool) -> RecordResult<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| RecordError::ConcurrentResizeViolation)?;
        Ok(Self(flag))
    }
}

impl Drop for WriterFlag<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// One tick being recorded.
///
/// Holds writer exclusivity from [`SampleStore::begin_tick`] until it is
/// committed or dropped. [`commit`](Self::commit) publishes the advanced
/// window in one atomic swap; dropping the guard without committing aborts
/// the tick - nothing is published and the next tick overwrites the
/// partial samples.
pub struct TickGuard<'a> {
    store: &'a SampleStore,
    props: BufferProperties,
    _flag: WriterFlag<'a>,
}

impl TickGuard<'_> {
    /// Index every variable writes its sample to during this tick.
    pub fn index(&self) -> usize {
        self.props.current_index
    }

    /// Absolute tick number being recorded.
    pub fn tick(&self) -> Tick {
        self.props.tick
    }

    /// Publish the tick: readers loading the snapshot from here on see the
    /// advanced window and every sample written under this guard.
    pub fn commit(self) {
        let props = self.props;
        self.store.state.rcu(|state| StoreState {
            props,
            slots: state.slots.clone(),
            directory: state.directory.clone(),
        });
    }
}

impl SampleStore {
    /// Create a store with the given capacity, recording in
    /// [`WindowMode::Sliding`].
    pub fn new(size: usize) -> RecordResult<Self> {
        Self::with_mode(size, WindowMode::Sliding)
    }

    /// Create a store with an explicit initial window mode.
    pub fn with_mode(size: usize, mode: WindowMode) -> RecordResult<Self> {
        let props = BufferProperties::new(size, mode)?;
        Ok(Self {
            state: ArcSwap::from_pointee(StoreState {
                props,
                slots: Vec::new(),
                directory: BTreeMap::new(),
            }),
            writer_flag: AtomicBool::new(false),
        })
    }

    /// Current immutable window snapshot.
    ///
    /// This is the sole publication channel between writer and readers: a
    /// snapshot captured before a tick never reflects that tick.
    pub fn properties(&self) -> BufferProperties {
        self.state.load().props
    }

    /// Current window mode.
    pub fn mode(&self) -> WindowMode {
        self.properties().mode
    }

    /// Current capacity.
    pub fn size(&self) -> usize {
        self.properties().size
    }

    /// Number of slots created so far.
    pub fn slot_count(&self) -> usize {
        self.state.load().slots.len()
    }

    /// Look up the slot recorded for `name`, if any.
    pub fn slot_named(&self, name: &str) -> Option<SlotId> {
        self.state.load().directory.get(name).copied().map(SlotId)
    }

    /// Intern a slot for `name`, creating a zero-initialized ring if the
    /// name is new.
    ///
    /// Append-only and safe concurrently with ongoing recording: existing
    /// slots and the published geometry are never touched. A slot created
    /// after recording started holds data only from the next tick on;
    /// pulls that resolve to earlier ticks fail with
    /// `UnlinkedVariableAccess`.
    pub fn create_slot(&self, name: &str) -> SlotId {
        let mut id = 0;
        let mut created = false;
        self.state.rcu(|state| {
            if let Some(&existing) = state.directory.get(name) {
                id = existing;
                created = false;
                return Arc::clone(state);
            }
            let props = state.props;
            let valid_from = if props.is_empty() { 0 } else { props.tick + 1 };
            let mut slots = state.slots.clone();
            let mut directory = state.directory.clone();
            id = slots.len();
            created = true;
            slots.push(Arc::new(SlotArray::new(props.size, valid_from)));
            directory.insert(String::from(name), id);
            Arc::new(StoreState {
                props,
                slots,
                directory,
            })
        });
        if created {
            log_debug!("created slot {} for variable {:?}", id, name);
        }
        SlotId(id)
    }

    /// Begin recording one tick.
    ///
    /// Acquires writer exclusivity and computes - without publishing - the
    /// advanced window. Write every variable's sample at
    /// [`TickGuard::index`], then [`TickGuard::commit`]. Fails with
    /// `ConcurrentResizeViolation` if another exclusive operation is in
    /// flight.
    pub fn begin_tick(&self) -> RecordResult<TickGuard<'_>> {
        let flag = WriterFlag::acquire(&self.writer_flag)?;
        let props = self.state.load().props.advanced();
        Ok(TickGuard {
            store: self,
            props,
            _flag: flag,
        })
    }

    /// Store a sample unconditionally at a valid index.
    ///
    /// No value validation; writing past the window start is the natural
    /// ring overwrite.
    pub fn write(&self, slot: SlotId, index: usize, bits: u64) -> RecordResult<()> {
        let state = self.state.load();
        let size = state.props.size;
        if index >= size {
            return Err(RecordError::IndexOutOfRange { index, size });
        }
        let array = state
            .slots
            .get(slot.0)
            .ok_or(RecordError::UnlinkedVariableAccess)?;
        array.bits[index].store(bits, Ordering::Release);
        Ok(())
    }

    /// Load the raw sample bits stored at `index`.
    ///
    /// The export surface: any index inside a snapshot's active window may
    /// be read and serialized. Fails with `IndexOutOfRange` outside
    /// `[0, size)`.
    pub fn read(&self, slot: SlotId, index: usize) -> RecordResult<u64> {
        let state = self.state.load();
        let size = state.props.size;
        if index >= size {
            return Err(RecordError::IndexOutOfRange { index, size });
        }
        let array = state
            .slots
            .get(slot.0)
            .ok_or(RecordError::UnlinkedVariableAccess)?;
        Ok(array.bits[index].load(Ordering::Acquire))
    }

    /// Load the sample at `index`, enforcing the tick axis.
    ///
    /// Like [`read`](Self::read), but a cursor that resolves to a tick
    /// recorded before the slot existed fails with
    /// `UnlinkedVariableAccess`. This is the pull-side read.
    pub fn sample_at(&self, slot: SlotId, index: usize) -> RecordResult<u64> {
        let state = self.state.load();
        let props = state.props;
        if index >= props.size {
            return Err(RecordError::IndexOutOfRange { index, size: props.size });
        }
        let array = state
            .slots
            .get(slot.0)
            .ok_or(RecordError::UnlinkedVariableAccess)?;
        if let Some(tick) = props.tick_at(index) {
            if tick < array.valid_from {
                return Err(RecordError::UnlinkedVariableAccess);
            }
        }
        Ok(array.bits[index].load(Ordering::Acquire))
    }

    /// Pin the in-point of the crop window; switches to
    /// [`WindowMode::Hold`]. Returns the published snapshot.
    pub fn set_in_point(&self, index: usize) -> RecordResult<BufferProperties> {
        self.publish_props(|props| props.with_in_point(index))
    }

    /// Pin the out-point of the crop window; switches to
    /// [`WindowMode::Hold`]. Returns the published snapshot.
    pub fn set_out_point(&self, index: usize) -> RecordResult<BufferProperties> {
        self.publish_props(|props| props.with_out_point(index))
    }

    /// Leave a user-held crop and resume live window tracking.
    pub fn resume_sliding(&self) -> BufferProperties {
        // Infallible: resumed() derives the window from recorded state.
        self.publish_props(|props| Ok(props.resumed()))
            .unwrap_or_else(|_| self.properties())
    }

    /// Reallocate every slot to `new_size`, preserving the active window.
    ///
    /// The circular active window is walked from in-point to out-point and
    /// copied, in order, into fresh arrays starting at offset 0; the new
    /// window is `[0, active_length - 1]` with `current_index` at the same
    /// logical offset. Built entirely off to the side and published in one
    /// swap - no reader observes a half-relinearized buffer.
    ///
    /// Fails with `ConcurrentResizeViolation` if a tick is in flight and
    /// `InsufficientCapacity` if the active window does not fit. Snapshots
    /// captured before a resize refer to the old geometry and must not be
    /// used to index the store afterwards.
    pub fn resize(&self, new_size: usize) -> RecordResult<()> {
        let _flag = WriterFlag::acquire(&self.writer_flag)?;
        let props = self.state.load().props;
        let required = props.active_length().max(1);
        if new_size < required {
            return Err(RecordError::InsufficientCapacity {
                requested: new_size,
                required,
            });
        }
        self.state.rcu(|state| relocate(state, new_size));
        log_debug!(
            "resized store {} -> {} (active window {})",
            props.size,
            new_size,
            props.active_length(),
        );
        Ok(())
    }

    /// Validate-and-publish helper for crop changes. The closure runs
    /// against the current snapshot and its result is published whole.
    fn publish_props<F>(&self, f: F) -> RecordResult<BufferProperties>
    where
        F: Fn(&BufferProperties) -> RecordResult<BufferProperties>,
    {
        let mut outcome = Err(RecordError::IndexOutOfRange { index: 0, size: 0 });
        self.state.rcu(|state| match f(&state.props) {
            Ok(props) => {
                outcome = Ok(props);
                Arc::new(StoreState {
                    props,
                    slots: state.slots.clone(),
                    directory: state.directory.clone(),
                })
            }
            Err(e) => {
                outcome = Err(e);
                Arc::clone(state)
            }
        });
        outcome
    }
}

/// Build the relinearized successor state for a resize.
fn relocate(state: &Arc<StoreState>, new_size: usize) -> StoreState {
    let props = state.props;
    let active = props.active_length();

    let mut slots = Vec::with_capacity(state.slots.len());
    for slot in &state.slots {
        let fresh = SlotArray::new(new_size, slot.valid_from);
        for (offset, index) in props.iter_window().enumerate() {
            let bits = slot.bits[index].load(Ordering::Acquire);
            fresh.bits[offset].store(bits, Ordering::Release);
        }
        slots.push(Arc::new(fresh));
    }

    let mut next = props;
    next.size = new_size;
    next.in_point = 0;
    next.out_point = active.saturating_sub(1);
    if active == 0 {
        next.current_index = 0;
        next.len = 0;
    } else if props.contains(props.current_index) {
        let offset = (props.current_index + props.size - props.in_point) % props.size;
        next.current_index = offset;
        // Only the relocated segment up to the write head keeps a provable
        // tick mapping; anything a held crop kept ahead of the head is
        // value-preserved but no longer tick-addressed.
        next.len = offset + 1;
    } else {
        // A held crop left the write head outside the window; park it on
        // the window end.
        next.current_index = active - 1;
        next.len = active;
        if let Some(tick) = props.tick_at(props.out_point) {
            next.tick = tick;
        }
    }

    StoreState {
        props: next,
        slots,
        directory: state.directory.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slots_are_interned_by_name() {
        let store = SampleStore::new(8).unwrap();
        let a = store.create_slot("joint.q");
        let b = store.create_slot("joint.dq");
        let again = store.create_slot("joint.q");
        assert_eq!(a, again);
        assert_ne!(a, b);
        assert_eq!(store.slot_count(), 2);
        assert_eq!(store.slot_named("joint.dq"), Some(b));
        assert_eq!(store.slot_named("missing"), None);
    }

    #[test]
    fn write_and_read_bounds() {
        let store = SampleStore::new(4).unwrap();
        let slot = store.create_slot("v");
        store.write(slot, 2, 42).unwrap();
        assert_eq!(store.read(slot, 2), Ok(42));
        assert_eq!(
            store.write(slot, 4, 1),
            Err(RecordError::IndexOutOfRange { index: 4, size: 4 }),
        );
        assert_eq!(
            store.read(slot, 9),
            Err(RecordError::IndexOutOfRange { index: 9, size: 4 }),
        );
    }

    #[test]
    fn commit_publishes_and_abort_does_not() {
        let store = SampleStore::new(4).unwrap();
        let slot = store.create_slot("v");

        let tick = store.begin_tick().unwrap();
        store.write(slot, tick.index(), 7).unwrap();
        // Not yet visible to snapshot holders.
        assert!(store.properties().is_empty());
        tick.commit();
        assert_eq!(store.properties().len, 1);

        // Abort: drop without commit leaves the published snapshot alone.
        let aborted = store.begin_tick().unwrap();
        store.write(slot, aborted.index(), 99).unwrap();
        drop(aborted);
        assert_eq!(store.properties().len, 1);
        assert_eq!(store.properties().tick, 0);

        // The next tick reuses the aborted index.
        let tick = store.begin_tick().unwrap();
        assert_eq!(tick.index(), 1);
        store.write(slot, tick.index(), 8).unwrap();
        tick.commit();
        assert_eq!(store.read(slot, 1), Ok(8));
    }

    #[test]
    fn second_writer_fails_fast() {
        let store = SampleStore::new(4).unwrap();
        let _tick = store.begin_tick().unwrap();
        assert!(matches!(
            store.begin_tick(),
            Err(RecordError::ConcurrentResizeViolation),
        ));
    }

    #[test]
    fn resize_rejects_in_flight_tick() {
        let store = SampleStore::new(4).unwrap();
        let _tick = store.begin_tick().unwrap();
        assert_eq!(
            store.resize(8),
            Err(RecordError::ConcurrentResizeViolation),
        );
    }

    #[test]
    fn resize_rejects_insufficient_capacity() {
        let store = SampleStore::new(4).unwrap();
        let slot = store.create_slot("v");
        for n in 0..4 {
            let tick = store.begin_tick().unwrap();
            store.write(slot, tick.index(), n).unwrap();
            tick.commit();
        }
        assert_eq!(
            store.resize(3),
            Err(RecordError::InsufficientCapacity {
                requested: 3,
                required: 4,
            }),
        );
    }

    #[test]
    fn resize_relinearizes_active_window() {
        let store = SampleStore::new(4).unwrap();
        let slot = store.create_slot("v");
        // Six ticks: ring holds ticks 2..=5 as [4, 5, 2, 3].
        for n in 0..6u64 {
            let tick = store.begin_tick().unwrap();
            store.write(slot, tick.index(), n + 1).unwrap();
            tick.commit();
        }

        store.resize(6).unwrap();
        let props = store.properties();
        assert_eq!(props.size, 6);
        assert_eq!(props.in_point, 0);
        assert_eq!(props.out_point, 3);
        assert_eq!(props.current_index, 3);
        assert_eq!(props.active_length(), 4);
        assert_eq!(props.tick, 5);

        let window: Vec<u64> = props
            .iter_window()
            .map(|i| store.read(slot, i).unwrap())
            .collect();
        assert_eq!(window, [3, 4, 5, 6]);

        // Recording continues seamlessly after the relocation.
        let tick = store.begin_tick().unwrap();
        assert_eq!(tick.index(), 4);
        assert_eq!(tick.tick(), 6);
        store.write(slot, tick.index(), 7).unwrap();
        tick.commit();
        assert_eq!(store.properties().active_length(), 5);
    }

    #[test]
    fn late_slot_rejects_pre_link_ticks() {
        let store = SampleStore::new(8).unwrap();
        let early = store.create_slot("early");
        for n in 0..3 {
            let tick = store.begin_tick().unwrap();
            store.write(early, tick.index(), n).unwrap();
            tick.commit();
        }

        let late = store.create_slot("late");
        // Indices 0..=2 hold ticks 0..=2, all before the late slot existed.
        for index in 0..3 {
            assert_eq!(
                store.sample_at(late, index),
                Err(RecordError::UnlinkedVariableAccess),
            );
            assert!(store.sample_at(early, index).is_ok());
        }

        let tick = store.begin_tick().unwrap();
        store.write(late, tick.index(), 42).unwrap();
        store.write(early, tick.index(), 3).unwrap();
        tick.commit();
        assert_eq!(store.sample_at(late, 3), Ok(42));
    }

    #[test]
    fn crop_switches_to_hold_and_back() {
        let store = SampleStore::new(4).unwrap();
        let slot = store.create_slot("v");
        for n in 0..4 {
            let tick = store.begin_tick().unwrap();
            store.write(slot, tick.index(), n).unwrap();
            tick.commit();
        }

        let props = store.set_in_point(1).unwrap();
        assert_eq!(props.mode, WindowMode::Hold);
        let props = store.set_out_point(2).unwrap();
        assert_eq!(props.active_length(), 2);
        assert_eq!(
            store.set_out_point(11),
            Err(RecordError::IndexOutOfRange { index: 11, size: 4 }),
        );

        let tick = store.begin_tick().unwrap();
        store.write(slot, tick.index(), 9).unwrap();
        tick.commit();
        // Window stayed pinned while recording continued.
        let props = store.properties();
        assert_eq!((props.in_point, props.out_point), (1, 2));

        let resumed = store.resume_sliding();
        assert_eq!(resumed.mode, WindowMode::Sliding);
        assert_eq!(resumed.out_point, resumed.current_index);
    }
}
