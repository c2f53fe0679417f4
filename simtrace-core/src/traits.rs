//! Variable Model Abstractions
//!
//! The recording core never owns the simulation's variables; it bridges
//! them. This module defines the two traits that bridge crosses -
//! [`Variable`] for one live scalar and [`VariableTree`] for an enumerable,
//! append-only collection of them - plus the typed value that moves across
//! it, [`SampleValue`].
//!
//! Ready-made implementations are provided for the common cases:
//! [`ScalarVariable`] and [`DiscreteVariable`] are atomic cells any thread
//! can read or mirror into, and [`VariableGroup`] is a growable collection
//! for models that attach new subsystems at runtime.

use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicU32, AtomicU64, Ordering};

/// The two shapes a recorded slot can take.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum VariableKind {
    /// Continuous numeric value (positions, velocities, torques)
    Scalar,
    /// Enumerated value stored by ordinal (contact state, gait phase)
    Discrete,
}

/// One recorded value, typed.
///
/// The store itself is typeless and holds raw 64-bit patterns; encoding and
/// decoding happen at the linking layer where the variable's kind is known.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SampleValue {
    /// Continuous numeric sample
    Scalar(f64),
    /// Enumerated sample by ordinal
    Discrete(u32),
}

impl SampleValue {
    /// Raw 64-bit storage pattern for this value.
    ///
    /// Scalars keep their IEEE-754 bits so NaN payloads survive a round
    /// trip; ordinals are zero-extended.
    pub fn to_bits(self) -> u64 {
        match self {
            SampleValue::Scalar(v) => v.to_bits(),
            SampleValue::Discrete(ordinal) => ordinal as u64,
        }
    }

    /// Decode a raw storage pattern as `kind`.
    pub fn from_bits(bits: u64, kind: VariableKind) -> Self {
        match kind {
            VariableKind::Scalar => SampleValue::Scalar(f64::from_bits(bits)),
            VariableKind::Discrete => SampleValue::Discrete(bits as u32),
        }
    }

    /// The kind this value decodes as.
    pub fn kind(&self) -> VariableKind {
        match self {
            SampleValue::Scalar(_) => VariableKind::Scalar,
            SampleValue::Discrete(_) => VariableKind::Discrete,
        }
    }
}

/// One live, named, typed scalar owned by the surrounding simulation model.
///
/// `get` and `set` take `&self`: implementations are expected to be atomic
/// cells (or equivalent) so the writer and mirroring readers never block
/// each other. Writer-owned variables are the ones whose values the
/// stepping loop computes; mirrors held by visualization or export
/// consumers report `false` from [`is_writer_owned`](Self::is_writer_owned)
/// and are only ever written by pulls.
pub trait Variable: Send + Sync {
    /// Stable name, unique within one session's variable set.
    fn name(&self) -> &str;

    /// Shape of this variable's recorded slot.
    fn kind(&self) -> VariableKind;

    /// Current live value.
    fn get(&self) -> SampleValue;

    /// Overwrite the live value (used by pulls to refresh a mirror).
    fn set(&self, value: SampleValue);

    /// Whether the recording writer owns this variable's value.
    fn is_writer_owned(&self) -> bool {
        true
    }
}

/// An enumerable, append-only set of variables.
///
/// The recording core scans this at defined points (session start, tick
/// boundaries) to discover variables that appeared since the last scan.
/// Implementations must be append-only: a variable, once enumerated, keeps
/// its name and stays in the set for the life of the session.
pub trait VariableTree: Send + Sync {
    /// Every variable currently in the set, in a stable order with
    /// additions at the end.
    fn variables(&self) -> Vec<Arc<dyn Variable>>;
}

/// Continuous variable backed by an atomic cell.
///
/// Stores the value's bit pattern in an `AtomicU64`, so concurrent readers
/// always see whole values. Relaxed ordering suffices: cross-variable
/// consistency comes from the store's snapshot publication, not from the
/// live cells.
#[derive(Debug)]
pub struct ScalarVariable {
    name: String,
    bits: AtomicU64,
    writer_owned: bool,
}

impl ScalarVariable {
    /// Writer-owned scalar with an initial value.
    pub fn new(name: impl Into<String>, initial: f64) -> Self {
        Self {
            name: name.into(),
            bits: AtomicU64::new(initial.to_bits()),
            writer_owned: true,
        }
    }

    /// Reader-side mirror of a scalar recorded elsewhere.
    pub fn mirror(name: impl Into<String>, initial: f64) -> Self {
        Self {
            name: name.into(),
            bits: AtomicU64::new(initial.to_bits()),
            writer_owned: false,
        }
    }

    /// Current value as `f64`.
    pub fn value(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Relaxed))
    }

    /// Update the live value.
    pub fn set_value(&self, value: f64) {
        self.bits.store(value.to_bits(), Ordering::Relaxed);
    }
}

impl Variable for ScalarVariable {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> VariableKind {
        VariableKind::Scalar
    }

    fn get(&self) -> SampleValue {
        SampleValue::Scalar(self.value())
    }

    fn set(&self, value: SampleValue) {
        // A kind mismatch is a linking bug; the value is dropped.
        if let SampleValue::Scalar(v) = value {
            self.set_value(v);
        }
    }

    fn is_writer_owned(&self) -> bool {
        self.writer_owned
    }
}

/// Enumerated variable backed by an atomic ordinal.
#[derive(Debug)]
pub struct DiscreteVariable {
    name: String,
    ordinal: AtomicU32,
    writer_owned: bool,
}

impl DiscreteVariable {
    /// Writer-owned enum slot with an initial ordinal.
    pub fn new(name: impl Into<String>, initial: u32) -> Self {
        Self {
            name: name.into(),
            ordinal: AtomicU32::new(initial),
            writer_owned: true,
        }
    }

    /// Reader-side mirror of an enum recorded elsewhere.
    pub fn mirror(name: impl Into<String>, initial: u32) -> Self {
        Self {
            name: name.into(),
            ordinal: AtomicU32::new(initial),
            writer_owned: false,
        }
    }

    /// Current ordinal.
    pub fn ordinal(&self) -> u32 {
        self.ordinal.load(Ordering::Relaxed)
    }

    /// Update the live ordinal.
    pub fn set_ordinal(&self, ordinal: u32) {
        self.ordinal.store(ordinal, Ordering::Relaxed);
    }
}

impl Variable for DiscreteVariable {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> VariableKind {
        VariableKind::Discrete
    }

    fn get(&self) -> SampleValue {
        SampleValue::Discrete(self.ordinal())
    }

    fn set(&self, value: SampleValue) {
        if let SampleValue::Discrete(ordinal) = value {
            self.set_ordinal(ordinal);
        }
    }

    fn is_writer_owned(&self) -> bool {
        self.writer_owned
    }
}

/// Growable, append-only variable collection.
///
/// Models a robot model that attaches new subsystems at runtime. The lock
/// only guards attachment and enumeration, which happen at tick boundaries;
/// the per-tick hot path goes through the atomic cells, never through here.
#[cfg(feature = "std")]
#[derive(Default)]
pub struct VariableGroup {
    vars: std::sync::RwLock<Vec<Arc<dyn Variable>>>,
}

#[cfg(feature = "std")]
impl VariableGroup {
    /// Empty group.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a variable. Names are expected to be unique within the
    /// group; duplicates link to the same recorded slot.
    pub fn attach(&self, variable: Arc<dyn Variable>) {
        self.vars
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(variable);
    }

    /// Number of attached variables.
    pub fn len(&self) -> usize {
        self.vars
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }

    /// True if nothing has been attached yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(feature = "std")]
impl VariableTree for VariableGroup {
    fn variables(&self) -> Vec<Arc<dyn Variable>> {
        self.vars
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_bits_round_trip() {
        let value = SampleValue::Scalar(-273.15);
        let decoded = SampleValue::from_bits(value.to_bits(), VariableKind::Scalar);
        assert_eq!(decoded, value);
    }

    #[test]
    fn discrete_bits_round_trip() {
        let value = SampleValue::Discrete(7);
        let decoded = SampleValue::from_bits(value.to_bits(), VariableKind::Discrete);
        assert_eq!(decoded, value);
    }

    #[test]
    fn nan_pattern_survives_storage() {
        let bits = f64::NAN.to_bits() | 0xdead;
        let value = SampleValue::from_bits(bits, VariableKind::Scalar);
        assert_eq!(value.to_bits(), bits);
    }

    #[test]
    fn mirror_is_not_writer_owned() {
        let live = ScalarVariable::new("joint.q", 0.5);
        let mirror = ScalarVariable::mirror("joint.q", 0.0);
        assert!(live.is_writer_owned());
        assert!(!mirror.is_writer_owned());

        mirror.set(live.get());
        assert_eq!(mirror.value(), 0.5);
    }

    #[cfg(feature = "std")]
    #[test]
    fn group_enumerates_in_attach_order() {
        let group = VariableGroup::new();
        group.attach(Arc::new(ScalarVariable::new("a", 1.0)));
        group.attach(Arc::new(DiscreteVariable::new("b", 2)));
        let names: Vec<_> = group.variables().iter().map(|v| String::from(v.name())).collect();
        assert_eq!(names, ["a", "b"]);
    }
}
