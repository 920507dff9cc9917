//! Attribute initialization tracking.
//!
//! Each entity instance owns one [`AttributeTracker`]. It records whether the
//! instance itself is hydrated and, for every lazily fetched attribute,
//! whether its value has been materialized. Eager attributes carry no entry
//! and always read as initialized.
//!
//! Nothing in this module ever loads data. Queries are pure reads over the
//! tracker; the only mutation is the one-way `Uninitialized -> Initialized`
//! transition.


use crate::{entity::EntityInstance, model::entity::EntityModel};
use derive_more::Display;
use std::collections::BTreeMap;
use thiserror::Error as ThisError;

///
/// TrackerError
///

#[derive(Debug, ThisError)]
pub enum TrackerError {
    #[error("unknown attribute '{attribute}' on entity '{entity}'")]
    UnknownAttribute {
        entity: &'static str,
        attribute: String,
    },
}

impl TrackerError {
    pub(crate) fn unknown(model: &EntityModel, attribute: &str) -> Self {
        Self::UnknownAttribute {
            entity: model.path,
            attribute: attribute.to_string(),
        }
    }
}

///
/// InitState
///

#[derive(Clone, Copy, Debug, Display, Eq, PartialEq)]
pub enum InitState {
    Uninitialized,
    Initialized,
}

///
/// AttributeTracker
///
/// Per-instance initialization record.
/// The lazy map is keyed by field slot index and holds lazy fields only.
///

#[derive(Clone, Debug)]
pub struct AttributeTracker {
    model: &'static EntityModel,
    hydrated: bool,
    lazy: BTreeMap<usize, InitState>,
}

impl AttributeTracker {
    /// Tracker for an instance loaded from storage: hydrated, every lazy
    /// attribute uninitialized.
    #[must_use]
    pub fn loaded(model: &'static EntityModel) -> Self {
        Self::with_lazy_state(model, true, InitState::Uninitialized)
    }

    /// Tracker for an instance constructed in memory and not yet persisted:
    /// every attribute is initialized by construction.
    #[must_use]
    pub fn transient(model: &'static EntityModel) -> Self {
        Self::with_lazy_state(model, true, InitState::Initialized)
    }

    /// Tracker for an unhydrated placeholder holding only its identity.
    #[must_use]
    pub fn placeholder(model: &'static EntityModel) -> Self {
        Self::with_lazy_state(model, false, InitState::Uninitialized)
    }

    fn with_lazy_state(model: &'static EntityModel, hydrated: bool, state: InitState) -> Self {
        let lazy = model.lazy_fields().map(|(i, _)| (i, state)).collect();

        Self {
            model,
            hydrated,
            lazy,
        }
    }

    #[must_use]
    pub const fn model(&self) -> &'static EntityModel {
        self.model
    }

    /// Whether the instance itself is hydrated (as opposed to a placeholder).
    #[must_use]
    pub const fn is_initialized(&self) -> bool {
        self.hydrated
    }

    /// Whether the named attribute is eager, or lazy and already initialized.
    pub fn is_attribute_initialized(&self, name: &str) -> Result<bool, TrackerError> {
        let index = self.index_of(name)?;

        Ok(self.is_index_initialized(index))
    }

    /// Tracked state of a lazy attribute; `None` for eager attributes.
    pub fn state(&self, name: &str) -> Result<Option<InitState>, TrackerError> {
        let index = self.index_of(name)?;

        Ok(self.lazy.get(&index).copied())
    }

    /// Record that the named attribute now holds an authoritative value.
    /// Marking an already-initialized or eager attribute is a no-op.
    pub fn mark_initialized(&mut self, name: &str) -> Result<(), TrackerError> {
        let index = self.index_of(name)?;
        self.mark_index_initialized(index);

        Ok(())
    }

    /// Names of lazy attributes still waiting for a fetch.
    pub fn uninitialized(&self) -> impl Iterator<Item = &'static str> + '_ {
        let fields = self.model.fields;

        self.lazy
            .iter()
            .filter(|(_, state)| **state == InitState::Uninitialized)
            .map(move |(i, _)| fields[*i].name)
    }

    pub(crate) fn is_index_initialized(&self, index: usize) -> bool {
        self.lazy
            .get(&index)
            .is_none_or(|state| *state == InitState::Initialized)
    }

    pub(crate) fn mark_index_initialized(&mut self, index: usize) {
        if let Some(state) = self.lazy.get_mut(&index) {
            *state = InitState::Initialized;
        }
    }

    pub(crate) const fn mark_hydrated(&mut self) {
        self.hydrated = true;
    }

    fn index_of(&self, name: &str) -> Result<usize, TrackerError> {
        self.model
            .field_index(name)
            .ok_or_else(|| TrackerError::unknown(self.model, name))
    }
}

// ============================================================================
// Instance-level queries
// ============================================================================

/// Whether the instance is hydrated. Never loads.
#[must_use]
pub fn is_initialized(instance: &EntityInstance) -> bool {
    instance.tracker().is_initialized()
}

/// Whether the named attribute of the instance is materialized. Never loads.
pub fn is_attribute_initialized(
    instance: &EntityInstance,
    name: &str,
) -> Result<bool, TrackerError> {
    instance.tracker().is_attribute_initialized(name)
}

/// Record the `Uninitialized -> Initialized` transition. Idempotent.
pub fn mark_initialized(instance: &mut EntityInstance, name: &str) -> Result<(), TrackerError> {
    instance.tracker_mut().mark_initialized(name)
}
