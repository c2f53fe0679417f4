//! Linked Registry: Dynamic Attach and Aggregate Push/Pull
//!
//! ## Overview
//!
//! A [`LinkedRegistry`] maintains the 1:1 mapping from the live variables
//! of one subtree to their [`LinkedVariable`] bridges, and drives them as
//! a unit: [`push_all`](LinkedRegistry::push_all) records one mutually
//! consistent cross-variable sample per tick,
//! [`pull_all`](LinkedRegistry::pull_all) refreshes a consumer's mirrors
//! and reports whether anything changed.
//!
//! ## Growth Is Reconciliation, Not Polling
//!
//! Simulation models attach new robots and subsystems at runtime. The
//! registry discovers them through an explicit reconciliation pass,
//! [`link_new_variables`](LinkedRegistry::link_new_variables), invoked at
//! defined points (session start, tick boundaries). The pass is
//! append-only: existing links are never touched, so it is safe to run
//! while other registries keep pushing and pulling against the same
//! store. The registry never shrinks; removal is unsupported.
//!
//! ## One Registry Per Role
//!
//! The writer's registry pushes from the simulation's variable tree; each
//! reader binds its own registry over its own mirror tree. Change
//! detection state lives in the links, so every reader tracks its own
//! dirty/clean transitions at its own pace. A registry is single-owner
//! (`&mut self`); concurrency exists between registries sharing one
//! store, never within one.

use alloc::collections::BTreeSet;
use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;

use crate::errors::RecordResult;
use crate::factory::LinkFactory;
use crate::link::LinkedVariable;
use crate::store::SampleStore;
use crate::traits::VariableTree;

// Macro for optional logging
#[cfg(feature = "log")]
macro_rules! log_debug {
    ($($arg:tt)*) => { log::debug!($($arg)*) };
}

#[cfg(not(feature = "log"))]
macro_rules! log_debug {
    ($($arg:tt)*) => {};
}

/// Ordered, append-only collection of linked variables for one subtree.
pub struct LinkedRegistry {
    store: Arc<SampleStore>,
    tree: Arc<dyn VariableTree>,
    factory: Arc<dyn LinkFactory>,
    links: Vec<LinkedVariable>,
    linked_names: BTreeSet<String>,
}

impl LinkedRegistry {
    /// Bind a registry to a subtree, linking every variable that exists
    /// now. Later additions are picked up by
    /// [`link_new_variables`](Self::link_new_variables).
    pub fn bind(
        store: Arc<SampleStore>,
        tree: Arc<dyn VariableTree>,
        factory: Arc<dyn LinkFactory>,
    ) -> RecordResult<Self> {
        let mut registry = Self {
            store,
            tree,
            factory,
            links: Vec::new(),
            linked_names: BTreeSet::new(),
        };
        registry.link_new_variables()?;
        Ok(registry)
    }

    /// The store this registry records into.
    pub fn store(&self) -> &Arc<SampleStore> {
        &self.store
    }

    /// Number of linked variables.
    pub fn len(&self) -> usize {
        self.links.len()
    }

    /// True if no variable has been linked yet.
    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// The linked variables, in linking order.
    pub fn links(&self) -> &[LinkedVariable] {
        &self.links
    }

    /// Reconcile the bound subtree: create and register a link for every
    /// variable that has none yet. Returns how many were added.
    ///
    /// Append-only - existing entries are never mutated, which is what
    /// makes running this concurrently with other registries' push/pull
    /// safe.
    pub fn link_new_variables(&mut self) -> RecordResult<usize> {
        let mut added = 0;
        for variable in self.tree.variables() {
            if self.linked_names.contains(variable.name()) {
                continue;
            }
            let name = String::from(variable.name());
            let link = self.factory.link_variable(&self.store, variable)?;
            self.linked_names.insert(name);
            self.links.push(link);
            added += 1;
        }
        if added > 0 {
            log_debug!("registry linked {} new variable(s), {} total", added, self.links.len());
        }
        Ok(added)
    }

    /// Record one tick: every writer-owned variable's current value lands
    /// at the same buffer index, then the advanced window is published as
    /// a unit.
    ///
    /// Call exactly once per simulation step, strictly after all state
    /// updates for that step. An error from any link aborts the tick;
    /// nothing is published.
    pub fn push_all(&mut self) -> RecordResult<()> {
        let tick = self.store.begin_tick()?;
        let index = tick.index();
        for link in &mut self.links {
            if link.variable().is_writer_owned() {
                link.push(&self.store, index)?;
            }
        }
        tick.commit();
        Ok(())
    }

    /// Refresh every mirror from the sample at `cursor`. Returns `true`
    /// if at least one variable changed since this registry's previous
    /// pull - the signal that a full consumer refresh is warranted.
    pub fn pull_all(&mut self, cursor: usize) -> RecordResult<bool> {
        let mut changed = false;
        for link in &mut self.links {
            changed |= link.pull(&self.store, cursor)?;
        }
        Ok(changed)
    }
}
