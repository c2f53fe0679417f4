//! Push/Pull Bridge Between a Live Variable and Its Recorded Slot
//!
//! ## Overview
//!
//! A [`LinkedVariable`] owns one end of the recording bridge: a reference
//! to a live [`Variable`] and the [`SlotId`] of its ring in the shared
//! store. The writer side calls [`push`](LinkedVariable::push) once per
//! tick to record the live value; each reader side holds its *own*
//! `LinkedVariable` for the same slot and calls
//! [`pull`](LinkedVariable::pull) at whatever rate suits it.
//!
//! ## Change Detection Is Per Reader
//!
//! Readers progress at independent rates, so dirtiness cannot be a global
//! property of the sample. Every `LinkedVariable` carries its own
//! `last_pulled` bits; a pull compares against them, mirrors the sample
//! into the live variable only on change, and reports whether it did.
//! Comparing raw bit patterns keeps the check exact - NaN payloads and
//! signed zeros round-trip without surprises.
//!
//! ## State Machine
//!
//! ```text
//! Unlinked ──link──▶ Linked-Clean ◀──pull── Linked-Dirty
//!                          │                     ▲
//!                          └────────push─────────┘
//! ```
//!
//! Push and pull against an `Unlinked` instance fail with
//! `UnlinkedVariableAccess`; a link, once made, lives for the session.

use alloc::sync::Arc;
use alloc::vec::Vec;

use crate::errors::{RecordError, RecordResult};
use crate::properties::BufferProperties;
use crate::store::{SampleStore, SlotId};
use crate::traits::{SampleValue, Variable};

/// Link lifecycle of one bridged variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// Created but not yet bound to a slot
    Unlinked,
    /// Bound; the holder has observed the latest sample it pulled
    Clean,
    /// Bound; a sample was recorded that this holder has not pulled
    Dirty,
}

/// Bridges one live variable to one recorded slot.
///
/// Owned by exactly one [`LinkedRegistry`](crate::registry::LinkedRegistry);
/// never shared between writer and readers - each side links its own
/// instance against the same named slot.
pub struct LinkedVariable {
    variable: Arc<dyn Variable>,
    slot: Option<SlotId>,
    state: LinkState,
    last_pushed: Option<u64>,
    last_pulled: Option<u64>,
}

impl LinkedVariable {
    /// Wrap a live variable, not yet bound to a slot.
    pub fn new(variable: Arc<dyn Variable>) -> Self {
        Self {
            variable,
            slot: None,
            state: LinkState::Unlinked,
            last_pushed: None,
            last_pulled: None,
        }
    }

    /// Bind this instance to its slot in the store.
    pub fn link(&mut self, slot: SlotId) {
        self.slot = Some(slot);
        self.state = LinkState::Clean;
    }

    /// The bridged live variable.
    pub fn variable(&self) -> &Arc<dyn Variable> {
        &self.variable
    }

    /// Bound slot, if linked.
    pub fn slot(&self) -> Option<SlotId> {
        self.slot
    }

    /// Current link state.
    pub fn state(&self) -> LinkState {
        self.state
    }

    /// Last value this instance recorded, if any.
    pub fn last_pushed(&self) -> Option<SampleValue> {
        self.last_pushed
            .map(|bits| SampleValue::from_bits(bits, self.variable.kind()))
    }

    /// Last value this instance mirrored, if any.
    pub fn last_pulled(&self) -> Option<SampleValue> {
        self.last_pulled
            .map(|bits| SampleValue::from_bits(bits, self.variable.kind()))
    }

    /// Record the live variable's current value at the tick's write index.
    ///
    /// Writer-side, once per tick, after all per-tick computation. Never
    /// blocks. Fails with `UnlinkedVariableAccess` before linking and
    /// `IndexOutOfRange` for an invalid index.
    pub fn push(&mut self, store: &SampleStore, index: usize) -> RecordResult<()> {
        let slot = self.slot.ok_or(RecordError::UnlinkedVariableAccess)?;
        let bits = self.variable.get().to_bits();
        store.write(slot, index, bits)?;
        self.last_pushed = Some(bits);
        self.state = LinkState::Dirty;
        Ok(())
    }

    /// Refresh the live mirror from the sample at `cursor`.
    ///
    /// Reader-side, any rate. The cursor may differ from the live write
    /// index, e.g. while scrubbing historical data. Returns `true` iff the
    /// sample differed from the last pull, in which case the live variable
    /// was updated. Idempotent: pulling the same cursor again without an
    /// intervening push returns `false`.
    pub fn pull(&mut self, store: &SampleStore, cursor: usize) -> RecordResult<bool> {
        let slot = self.slot.ok_or(RecordError::UnlinkedVariableAccess)?;
        let bits = store.sample_at(slot, cursor)?;
        if self.last_pulled == Some(bits) {
            self.state = LinkState::Clean;
            return Ok(false);
        }
        self.variable
            .set(SampleValue::from_bits(bits, self.variable.kind()));
        self.last_pulled = Some(bits);
        self.state = LinkState::Clean;
        Ok(true)
    }

    /// Decode this variable's samples across the active window of a
    /// chosen snapshot, oldest first.
    ///
    /// The serialization surface handed to a persistence collaborator.
    /// The snapshot must not predate the store's last resize.
    pub fn export_window(
        &self,
        store: &SampleStore,
        props: &BufferProperties,
    ) -> RecordResult<Vec<SampleValue>> {
        let slot = self.slot.ok_or(RecordError::UnlinkedVariableAccess)?;
        let kind = self.variable.kind();
        let mut samples = Vec::with_capacity(props.active_length());
        for index in props.iter_window() {
            let bits = store.read(slot, index)?;
            samples.push(SampleValue::from_bits(bits, kind));
        }
        Ok(samples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::ScalarVariable;

    fn linked(store: &SampleStore, name: &str, initial: f64) -> LinkedVariable {
        let mut link = LinkedVariable::new(Arc::new(ScalarVariable::new(name, initial)));
        link.link(store.create_slot(name));
        link
    }

    #[test]
    fn unlinked_access_fails() {
        let store = SampleStore::new(4).unwrap();
        let mut link = LinkedVariable::new(Arc::new(ScalarVariable::new("v", 0.0)));
        assert_eq!(link.state(), LinkState::Unlinked);
        assert_eq!(
            link.push(&store, 0),
            Err(RecordError::UnlinkedVariableAccess),
        );
        assert_eq!(
            link.pull(&store, 0),
            Err(RecordError::UnlinkedVariableAccess),
        );
    }

    #[test]
    fn push_records_and_marks_dirty() {
        let store = SampleStore::new(4).unwrap();
        let mut link = linked(&store, "v", 1.5);

        let tick = store.begin_tick().unwrap();
        link.push(&store, tick.index()).unwrap();
        tick.commit();

        assert_eq!(link.state(), LinkState::Dirty);
        assert_eq!(link.last_pushed(), Some(SampleValue::Scalar(1.5)));
        assert_eq!(store.read(link.slot().unwrap(), 0), Ok(1.5f64.to_bits()));
    }

    #[test]
    fn pull_is_idempotent_per_cursor() {
        let store = SampleStore::new(4).unwrap();
        let mut writer = linked(&store, "v", 2.0);
        let tick = store.begin_tick().unwrap();
        writer.push(&store, tick.index()).unwrap();
        tick.commit();

        let mirror = Arc::new(ScalarVariable::mirror("v", 0.0));
        let mut reader = LinkedVariable::new(mirror.clone() as Arc<dyn Variable>);
        reader.link(store.slot_named("v").unwrap());

        assert_eq!(reader.pull(&store, 0), Ok(true));
        assert_eq!(mirror.value(), 2.0);
        assert_eq!(reader.pull(&store, 0), Ok(false));
        assert_eq!(reader.state(), LinkState::Clean);
    }

    #[test]
    fn pull_tracks_cursor_movement() {
        let store = SampleStore::new(4).unwrap();
        let live = Arc::new(ScalarVariable::new("v", 0.0));
        let mut writer = LinkedVariable::new(live.clone() as Arc<dyn Variable>);
        writer.link(store.create_slot("v"));

        for value in [10.0, 20.0, 30.0] {
            live.set_value(value);
            let tick = store.begin_tick().unwrap();
            writer.push(&store, tick.index()).unwrap();
            tick.commit();
        }

        let mirror = Arc::new(ScalarVariable::mirror("v", 0.0));
        let mut reader = LinkedVariable::new(mirror.clone() as Arc<dyn Variable>);
        reader.link(store.slot_named("v").unwrap());

        // Scrub backwards through history.
        assert_eq!(reader.pull(&store, 2), Ok(true));
        assert_eq!(mirror.value(), 30.0);
        assert_eq!(reader.pull(&store, 0), Ok(true));
        assert_eq!(mirror.value(), 10.0);
        // Same cursor, same sample: no change reported.
        assert_eq!(reader.pull(&store, 0), Ok(false));
    }

    #[test]
    fn export_preserves_recording_order() {
        let store = SampleStore::new(3).unwrap();
        let live = Arc::new(ScalarVariable::new("v", 0.0));
        let mut writer = LinkedVariable::new(live.clone() as Arc<dyn Variable>);
        writer.link(store.create_slot("v"));

        for value in [1.0, 2.0, 3.0, 4.0] {
            live.set_value(value);
            let tick = store.begin_tick().unwrap();
            writer.push(&store, tick.index()).unwrap();
            tick.commit();
        }

        let props = store.properties();
        let window = writer.export_window(&store, &props).unwrap();
        assert_eq!(
            window,
            [
                SampleValue::Scalar(2.0),
                SampleValue::Scalar(3.0),
                SampleValue::Scalar(4.0),
            ],
        );
    }
}
