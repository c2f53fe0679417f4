//! Linking Strategy Extension Point
//!
//! Construction of the bridge between a live variable and its recorded
//! slot goes through the [`LinkFactory`] trait, so alternate linking
//! strategies - filtered recording, renamed slots, instrumented links -
//! can be substituted without the registry depending on a concrete
//! implementation. [`RecordingLinkFactory`] is the default: every
//! discovered variable gets a slot interned under its own name.

use alloc::sync::Arc;

use crate::errors::RecordResult;
use crate::link::LinkedVariable;
use crate::registry::LinkedRegistry;
use crate::store::SampleStore;
use crate::traits::{Variable, VariableTree};

/// Builds linked variables and registries bound to one sample store.
pub trait LinkFactory: Send + Sync {
    /// Create a linked variable for `variable`, bound to its slot in
    /// `store`.
    fn link_variable(
        &self,
        store: &Arc<SampleStore>,
        variable: Arc<dyn Variable>,
    ) -> RecordResult<LinkedVariable>;

    /// Obtain a registry for `tree`, linked through this factory.
    ///
    /// Every variable existing in the subtree now is linked immediately;
    /// later additions are picked up by
    /// [`LinkedRegistry::link_new_variables`].
    fn bind_registry(
        self: Arc<Self>,
        store: Arc<SampleStore>,
        tree: Arc<dyn VariableTree>,
    ) -> RecordResult<LinkedRegistry>
    where
        Self: Sized + 'static,
    {
        LinkedRegistry::bind(store, tree, self)
    }
}

/// Default linking strategy: one slot per variable, interned by name.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecordingLinkFactory;

impl LinkFactory for RecordingLinkFactory {
    fn link_variable(
        &self,
        store: &Arc<SampleStore>,
        variable: Arc<dyn Variable>,
    ) -> RecordResult<LinkedVariable> {
        let slot = store.create_slot(variable.name());
        let mut link = LinkedVariable::new(variable);
        link.link(slot);
        Ok(link)
    }
}
