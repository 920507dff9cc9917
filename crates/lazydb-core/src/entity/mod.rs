//! Entity instances and the unit-of-work handle that owns them.


use crate::{
    model::{entity::EntityModel, field::FieldKind},
    tracker::{AttributeTracker, TrackerError},
    value::{Key, Value},
};
use derive_more::Display;
use std::{
    cell::Cell,
    collections::BTreeSet,
    rc::{Rc, Weak},
    sync::atomic::{AtomicU64, Ordering},
};
use thiserror::Error as ThisError;

static NEXT_UNIT_OF_WORK: AtomicU64 = AtomicU64::new(1);

///
/// EntityError
///

#[derive(Debug, ThisError)]
pub enum EntityError {
    #[error("entity '{entity}' key is already {current}; cannot reassign to {attempted}")]
    KeyReassigned {
        entity: &'static str,
        current: Key,
        attempted: Key,
    },

    #[error("attribute '{attribute}' of entity '{entity}' cannot hold this value as a key")]
    InvalidKey {
        entity: &'static str,
        attribute: &'static str,
    },

    #[error("attribute '{attribute}' of entity '{entity}' expects {expected}")]
    KindMismatch {
        entity: &'static str,
        attribute: &'static str,
        expected: FieldKind,
    },

    #[error(transparent)]
    Tracker(#[from] TrackerError),
}

///
/// UnitOfWorkId
///

#[derive(Clone, Copy, Debug, Display, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct UnitOfWorkId(u64);

///
/// UnitOfWork
///
/// Liveness handle for one session scope. Instances keep a weak link to it;
/// once it ends (or is dropped) lazy reads on those instances fail.
///

#[derive(Debug)]
pub struct UnitOfWork {
    id: UnitOfWorkId,
    active: Cell<bool>,
}

impl UnitOfWork {
    #[must_use]
    pub fn begin() -> Rc<Self> {
        Rc::new(Self {
            id: UnitOfWorkId(NEXT_UNIT_OF_WORK.fetch_add(1, Ordering::Relaxed)),
            active: Cell::new(true),
        })
    }

    #[must_use]
    pub const fn id(&self) -> UnitOfWorkId {
        self.id
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.get()
    }

    pub fn end(&self) {
        self.active.set(false);
    }
}

///
/// EntityInstance
///
/// One mutable record: identity, a value slot per declared attribute, and
/// the tracker describing which slots are materialized.
///

#[derive(Debug)]
pub struct EntityInstance {
    model: &'static EntityModel,
    key: Option<Key>,
    values: Vec<Value>,
    tracker: AttributeTracker,
    dirty: BTreeSet<usize>,
    owner: Weak<UnitOfWork>,
    persisted: bool,
}

impl EntityInstance {
    /// New, not-yet-persisted instance. Every attribute is initialized.
    #[must_use]
    pub fn new(model: &'static EntityModel) -> Self {
        Self {
            model,
            key: None,
            values: vec![Value::Null; model.fields.len()],
            tracker: AttributeTracker::transient(model),
            dirty: BTreeSet::new(),
            owner: Weak::new(),
            persisted: false,
        }
    }

    /// New instance with its identity assigned. The key must match the
    /// primary key's declared kind.
    pub fn with_key(
        model: &'static EntityModel,
        key: impl Into<Key>,
    ) -> Result<Self, EntityError> {
        let mut instance = Self::new(model);
        instance.assign_key(key.into())?;

        Ok(instance)
    }

    /// Instance materialized from a stored row. `None` slots were not
    /// fetched and stay uninitialized.
    pub(crate) fn loaded(
        model: &'static EntityModel,
        key: Key,
        row: Vec<Option<Value>>,
        owner: &Rc<UnitOfWork>,
    ) -> Self {
        let mut instance = Self {
            model,
            key: Some(key),
            values: vec![Value::Null; model.fields.len()],
            tracker: AttributeTracker::loaded(model),
            dirty: BTreeSet::new(),
            owner: Rc::downgrade(owner),
            persisted: true,
        };
        instance.apply_row(row);

        instance
    }

    /// Unhydrated placeholder carrying only its identity.
    pub(crate) fn placeholder(
        model: &'static EntityModel,
        key: Key,
        owner: &Rc<UnitOfWork>,
    ) -> Result<Self, EntityError> {
        let mut instance = Self {
            model,
            key: None,
            values: vec![Value::Null; model.fields.len()],
            tracker: AttributeTracker::placeholder(model),
            dirty: BTreeSet::new(),
            owner: Rc::downgrade(owner),
            persisted: true,
        };
        instance.assign_key(key)?;

        Ok(instance)
    }

    #[must_use]
    pub const fn model(&self) -> &'static EntityModel {
        self.model
    }

    #[must_use]
    pub const fn key(&self) -> Option<&Key> {
        self.key.as_ref()
    }

    #[must_use]
    pub const fn tracker(&self) -> &AttributeTracker {
        &self.tracker
    }

    pub(crate) const fn tracker_mut(&mut self) -> &mut AttributeTracker {
        &mut self.tracker
    }

    #[must_use]
    pub const fn is_persisted(&self) -> bool {
        self.persisted
    }

    pub(crate) const fn mark_persisted(&mut self) {
        self.persisted = true;
    }

    /// Assign the identity. Re-assigning the same key is accepted.
    pub fn set_key(&mut self, key: impl Into<Key>) -> Result<(), EntityError> {
        let key = key.into();
        match &self.key {
            Some(current) if *current != key => Err(EntityError::KeyReassigned {
                entity: self.model.path,
                current: current.clone(),
                attempted: key,
            }),
            Some(_) => Ok(()),
            None => self.assign_key(key),
        }
    }

    fn assign_key(&mut self, key: Key) -> Result<(), EntityError> {
        if let Some(pk) = self.model.primary_key_index() {
            let field = &self.model.fields[pk];
            let value = Value::from(key.clone());
            if !value.conforms_to(field.kind) {
                return Err(EntityError::KindMismatch {
                    entity: self.model.path,
                    attribute: field.name,
                    expected: field.kind,
                });
            }
            self.values[pk] = value;
        }
        self.key = Some(key);

        Ok(())
    }

    /// In-memory value of an attribute, or `None` if it was never fetched.
    /// Never loads.
    pub fn loaded_value(&self, name: &str) -> Result<Option<&Value>, TrackerError> {
        let index = self
            .model
            .field_index(name)
            .ok_or_else(|| TrackerError::unknown(self.model, name))?;

        Ok(self.loaded_value_at(index))
    }

    pub(crate) fn loaded_value_at(&self, index: usize) -> Option<&Value> {
        (self.tracker.is_initialized() && self.tracker.is_index_initialized(index))
            .then(|| &self.values[index])
    }

    pub(crate) fn slot(&self, index: usize) -> &Value {
        &self.values[index]
    }

    pub(crate) fn values(&self) -> &[Value] {
        &self.values
    }

    /// Store a fetched value and record the transition.
    pub(crate) fn store_fetched(&mut self, index: usize, value: Value) {
        self.values[index] = value;
        self.tracker.mark_index_initialized(index);
    }

    /// Merge a fetched row into the slots and mark the instance hydrated.
    /// Slots written in memory keep their value.
    pub(crate) fn apply_row(&mut self, row: Vec<Option<Value>>) {
        let width = self.values.len();

        for (index, value) in row.into_iter().enumerate().take(width) {
            let Some(value) = value else { continue };
            if self.dirty.contains(&index) {
                continue;
            }

            self.store_fetched(index, value);
        }
        self.tracker.mark_hydrated();
    }

    /// Write a slot, mark it initialized and dirty.
    pub(crate) fn store_written(&mut self, index: usize, value: Value) -> Result<(), EntityError> {
        let field = &self.model.fields[index];
        if !value.conforms_to(field.kind) {
            return Err(EntityError::KindMismatch {
                entity: self.model.path,
                attribute: field.name,
                expected: field.kind,
            });
        }

        if self.model.primary_key_index() == Some(index) {
            let key = Key::from_value(&value).ok_or(EntityError::InvalidKey {
                entity: self.model.path,
                attribute: field.name,
            })?;
            self.set_key(key)?;
        } else {
            self.values[index] = value;
        }

        self.tracker.mark_index_initialized(index);
        self.dirty.insert(index);

        Ok(())
    }

    /// Slot indexes written since load (or since the last flush).
    pub fn dirty_fields(&self) -> impl Iterator<Item = &'static str> + '_ {
        let fields = self.model.fields;

        self.dirty.iter().map(move |i| fields[*i].name)
    }

    #[must_use]
    pub fn is_dirty(&self) -> bool {
        !self.dirty.is_empty()
    }

    pub(crate) const fn dirty_indexes(&self) -> &BTreeSet<usize> {
        &self.dirty
    }

    pub(crate) fn clear_dirty(&mut self) {
        self.dirty.clear();
    }

    /// Identity of the live unit of work owning this instance, if any.
    #[must_use]
    pub fn unit_of_work(&self) -> Option<UnitOfWorkId> {
        self.owner
            .upgrade()
            .filter(|uow| uow.is_active())
            .map(|uow| uow.id())
    }

    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.unit_of_work().is_some()
    }

    pub(crate) fn attach(&mut self, owner: &Rc<UnitOfWork>) {
        self.owner = Rc::downgrade(owner);
    }

    pub(crate) fn detach(&mut self) {
        self.owner = Weak::new();
    }
}
