//! Recording core for simtrace
//!
//! Records a complete time-history sample of every scalar variable in a
//! robot simulation at every discrete step, and lets one writer (the
//! stepping loop) and any number of independently-paced readers
//! (visualization, export, network publication) exchange samples without
//! per-sample locking and without readers ever observing a partially
//! written tick.
//!
//! Key constraints:
//! - Bounded, non-blocking hot path: push/pull never wait on I/O or each
//!   other
//! - Readers only see whole published snapshots, never a half-recorded
//!   tick
//! - The variable set may grow at runtime; recorded history survives
//!   resize and crop operations
//!
//! ```
//! use simtrace_core::{
//!     LinkedRegistry, RecordingLinkFactory, SampleStore, ScalarVariable, VariableGroup,
//! };
//! use std::sync::Arc;
//!
//! let store = Arc::new(SampleStore::new(512)?);
//! let model = Arc::new(VariableGroup::new());
//! model.attach(Arc::new(ScalarVariable::new("base.x", 0.0)));
//!
//! let mut recorder = LinkedRegistry::bind(
//!     store.clone(),
//!     model.clone(),
//!     Arc::new(RecordingLinkFactory),
//! )?;
//!
//! // Once per simulation step, after all state updates:
//! recorder.push_all()?;
//! assert_eq!(store.properties().active_length(), 1);
//! # Ok::<(), simtrace_core::RecordError>(())
//! ```

#![cfg_attr(not(feature = "std"), no_std)]
#![deny(unsafe_code)]
#![warn(missing_docs)]

extern crate alloc;

pub mod errors;
pub mod properties;
pub mod traits;

#[cfg(feature = "store")]
pub mod factory;
#[cfg(feature = "store")]
pub mod link;
#[cfg(feature = "store")]
pub mod registry;
#[cfg(feature = "store")]
pub mod store;

// Public API
pub use errors::{RecordError, RecordResult};
pub use properties::{BufferProperties, Tick, WindowIter, WindowMode};
pub use traits::{DiscreteVariable, SampleValue, ScalarVariable, Variable, VariableKind, VariableTree};

#[cfg(feature = "std")]
pub use traits::VariableGroup;

#[cfg(feature = "store")]
pub use factory::{LinkFactory, RecordingLinkFactory};
#[cfg(feature = "store")]
pub use link::{LinkState, LinkedVariable};
#[cfg(feature = "store")]
pub use registry::LinkedRegistry;
#[cfg(feature = "store")]
pub use store::{SampleStore, SlotId, TickGuard};

/// Crate version string
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
