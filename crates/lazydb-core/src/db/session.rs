use crate::{
    db::{
        Db,
        statement::Statement,
        store::{DataKey, RawRow},
    },
    entity::{EntityInstance, UnitOfWork, UnitOfWorkId},
    error::Error,
    intercept::{AttributeFetcher, FetchError, InterceptError, LazyInterceptor},
    model::{entity::EntityModel, field::EntityFieldModel, registry::RegistryError},
    validate::{ValidationSummary, validate_entity},
    value::{Key, Value},
};
use derive_more::Display;
use std::{collections::BTreeMap, rc::Rc};
use thiserror::Error as ThisError;

///
/// SessionError
///

#[derive(Debug, ThisError)]
pub enum SessionError {
    #[error("no managed instance for handle {0}")]
    UnknownHandle(EntityHandle),

    #[error("instance of entity '{0}' has no key assigned")]
    MissingKey(&'static str),

    #[error("duplicate key: entity={entity} key={key}")]
    DuplicateKey { entity: &'static str, key: Key },

    #[error("detached instance passed to persist: entity={entity} key={key}")]
    AlreadyPersisted { entity: &'static str, key: Key },

    #[error("row vanished before update: entity={entity} key={key}")]
    RowMissing { entity: &'static str, key: Key },
}

///
/// EntityHandle
/// Index of a managed instance inside its session.
///

#[derive(Clone, Copy, Debug, Display, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct EntityHandle(usize);

///
/// WriteOp
///

#[derive(Clone, Copy, Debug)]
enum WriteOp {
    Insert,
    Update,
}

///
/// StagedWrite
/// Encoded row and statement for one pending write.
///

struct StagedWrite {
    slot: usize,
    entity_path: &'static str,
    data_key: DataKey,
    row: RawRow,
    statement: Statement,
}

///
/// Session
///
/// One unit of work. Owns the instances it loads or persists; every
/// attribute access goes through the lazy interceptor; `commit` validates
/// each pending instance before issuing its write statement.
///

pub struct Session<'db> {
    db: &'db Db,
    unit_of_work: Rc<UnitOfWork>,
    managed: Vec<Option<EntityInstance>>,
    identity: BTreeMap<DataKey, EntityHandle>,
}

impl<'db> Session<'db> {
    pub(crate) fn new(db: &'db Db) -> Self {
        Self {
            db,
            unit_of_work: UnitOfWork::begin(),
            managed: Vec::new(),
            identity: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn unit_of_work(&self) -> UnitOfWorkId {
        self.unit_of_work.id()
    }

    // ======================================================================
    // Instance lifecycle
    // ======================================================================

    /// Make a new instance managed. It is inserted on commit.
    pub fn persist(&mut self, mut instance: EntityInstance) -> Result<EntityHandle, Error> {
        let model = self.registered(instance.model())?;
        let key = instance
            .key()
            .cloned()
            .ok_or(SessionError::MissingKey(model.path))?;

        if instance.is_persisted() {
            return Err(SessionError::AlreadyPersisted {
                entity: model.path,
                key,
            }
            .into());
        }

        let data_key = DataKey::new(model.path, key.clone());
        if self.identity.contains_key(&data_key) {
            return Err(SessionError::DuplicateKey {
                entity: model.path,
                key,
            }
            .into());
        }

        instance.attach(&self.unit_of_work);

        Ok(self.manage(data_key, instance))
    }

    /// Load an instance by key. Lazy attributes outside the default fetch
    /// group stay unfetched. Returns the same handle for repeated finds, and
    /// `None` when no row is stored, even if a reference was taken first.
    pub fn find(
        &mut self,
        model: &'static EntityModel,
        key: impl Into<Key>,
    ) -> Result<Option<EntityHandle>, Error> {
        let model = self.registered(model)?;
        let key = key.into();
        let data_key = DataKey::new(model.path, key.clone());

        if let Some(handle) = self.identity.get(&data_key).copied() {
            // a placeholder hydrates on its first read
            return match self.read(handle, model.primary_key.name) {
                Ok(_) => Ok(Some(handle)),
                Err(Error::Intercept(InterceptError::Fetch(FetchError::RowNotFound { .. }))) => {
                    Ok(None)
                }
                Err(err) => Err(err),
            };
        }

        self.db.statements.record(
            model.path,
            Statement::Select {
                entity: model.entity_name,
                key: key.clone(),
            },
        );
        let Some(values) = self.db.read_row(model, &key)? else {
            return Ok(None);
        };
        let row = self.db.project_row(model, values);
        let instance = EntityInstance::loaded(model, key, row, &self.unit_of_work);

        Ok(Some(self.manage(data_key, instance)))
    }

    /// Managed placeholder for a key, without touching storage. It hydrates
    /// on first attribute access.
    pub fn get_reference(
        &mut self,
        model: &'static EntityModel,
        key: impl Into<Key>,
    ) -> Result<EntityHandle, Error> {
        let model = self.registered(model)?;
        let key = key.into();
        let data_key = DataKey::new(model.path, key.clone());

        if let Some(handle) = self.identity.get(&data_key).copied() {
            return Ok(handle);
        }
        let instance = EntityInstance::placeholder(model, key, &self.unit_of_work)?;

        Ok(self.manage(data_key, instance))
    }

    /// Detach an instance from this unit of work. Its tracker survives, but
    /// lazy reads on it now fail.
    pub fn evict(&mut self, handle: EntityHandle) -> Result<EntityInstance, SessionError> {
        let mut instance = self
            .managed
            .get_mut(handle.0)
            .and_then(Option::take)
            .ok_or(SessionError::UnknownHandle(handle))?;

        self.identity.retain(|_, h| *h != handle);
        instance.detach();

        Ok(instance)
    }

    /// Borrow a managed instance without any interception.
    pub fn instance(&self, handle: EntityHandle) -> Result<&EntityInstance, SessionError> {
        self.managed
            .get(handle.0)
            .and_then(Option::as_ref)
            .ok_or(SessionError::UnknownHandle(handle))
    }

    // ======================================================================
    // Mediated attribute access
    // ======================================================================

    /// Read an attribute through the lazy interceptor.
    pub fn read(&mut self, handle: EntityHandle, name: &str) -> Result<&Value, Error> {
        let fetcher = self.fetcher();
        let instance = self.instance_mut(handle)?;

        Ok(LazyInterceptor::new(&fetcher).on_read(instance, name)?)
    }

    /// Write an attribute through the lazy interceptor.
    pub fn write(
        &mut self,
        handle: EntityHandle,
        name: &str,
        value: impl Into<Value>,
    ) -> Result<(), Error> {
        let fetcher = self.fetcher();
        let instance = self.instance_mut(handle)?;

        LazyInterceptor::new(&fetcher).on_write(instance, name, value.into())?;

        Ok(())
    }

    /// Run the validation pass on one managed instance.
    pub fn validate(&self, handle: EntityHandle) -> Result<ValidationSummary, Error> {
        let instance = self.instance(handle)?;

        Ok(validate_entity(instance, &self.db.resolver)?)
    }

    // ======================================================================
    // Commit
    // ======================================================================

    /// Flush pending inserts and updates, then end the unit of work.
    ///
    /// Every pending instance passes the validation hook and has its row
    /// encoded before any statement is issued; one failure aborts the whole
    /// commit with the store untouched.
    pub fn commit(mut self) -> Result<(), Error> {
        let validates = self.db.config.validation_mode.validates();
        let mut staged = Vec::new();

        for (slot, instance) in self.managed.iter().enumerate() {
            let Some(instance) = instance else { continue };

            let op = if !instance.is_persisted() {
                WriteOp::Insert
            } else if instance.is_dirty() {
                WriteOp::Update
            } else {
                continue;
            };

            if matches!(op, WriteOp::Insert) {
                self.ensure_insertable(instance)?;
            }
            if validates {
                validate_entity(instance, &self.db.resolver)?;
            }

            staged.push(self.stage(slot, instance, op)?);
        }

        for write in staged {
            self.apply(write);
        }
        self.unit_of_work.end();

        Ok(())
    }

    fn ensure_insertable(&self, instance: &EntityInstance) -> Result<(), Error> {
        let model = instance.model();
        let key = instance
            .key()
            .cloned()
            .ok_or(SessionError::MissingKey(model.path))?;
        let data_key = DataKey::new(model.path, key.clone());

        if self.db.with_store(|store| store.contains(&data_key)) {
            return Err(SessionError::DuplicateKey {
                entity: model.path,
                key,
            }
            .into());
        }

        Ok(())
    }

    /// Build the row and statement for one pending write without touching
    /// the store.
    fn stage(
        &self,
        slot: usize,
        instance: &EntityInstance,
        op: WriteOp,
    ) -> Result<StagedWrite, Error> {
        let model = instance.model();
        let key = instance
            .key()
            .cloned()
            .ok_or(SessionError::MissingKey(model.path))?;

        let (row, statement) = match op {
            WriteOp::Insert => (
                RawRow::encode(instance.values())?,
                Statement::Insert {
                    entity: model.entity_name,
                    key: key.clone(),
                },
            ),
            WriteOp::Update => {
                let mut values =
                    self.db
                        .read_row(model, &key)?
                        .ok_or_else(|| SessionError::RowMissing {
                            entity: model.path,
                            key: key.clone(),
                        })?;
                for &index in instance.dirty_indexes() {
                    values[index] = instance.slot(index).clone();
                }

                (
                    RawRow::encode(&values)?,
                    Statement::Update {
                        entity: model.entity_name,
                        key: key.clone(),
                        attributes: instance.dirty_fields().collect(),
                    },
                )
            }
        };

        Ok(StagedWrite {
            slot,
            entity_path: model.path,
            data_key: DataKey::new(model.path, key),
            row,
            statement,
        })
    }

    fn apply(&mut self, write: StagedWrite) {
        let StagedWrite {
            slot,
            entity_path,
            data_key,
            row,
            statement,
        } = write;

        self.db.statements.record(entity_path, statement);
        self.db.with_store_mut(|store| store.insert(data_key, row));

        if let Some(instance) = self.managed.get_mut(slot).and_then(Option::as_mut) {
            instance.mark_persisted();
            instance.clear_dirty();
        }
    }

    // ======================================================================
    // Helpers
    // ======================================================================

    fn fetcher(&self) -> SessionFetcher<'db> {
        SessionFetcher {
            db: self.db,
            unit_of_work: self.unit_of_work.id(),
        }
    }

    fn instance_mut(&mut self, handle: EntityHandle) -> Result<&mut EntityInstance, SessionError> {
        self.managed
            .get_mut(handle.0)
            .and_then(Option::as_mut)
            .ok_or(SessionError::UnknownHandle(handle))
    }

    fn manage(&mut self, data_key: DataKey, instance: EntityInstance) -> EntityHandle {
        let handle = EntityHandle(self.managed.len());
        self.managed.push(Some(instance));
        self.identity.insert(data_key, handle);

        handle
    }

    fn registered(&self, model: &'static EntityModel) -> Result<&'static EntityModel, RegistryError> {
        if self.db.registry.contains(model) {
            Ok(model)
        } else {
            Err(RegistryError::UnknownEntity(model.path.to_string()))
        }
    }
}

impl Drop for Session<'_> {
    fn drop(&mut self) {
        self.unit_of_work.end();
    }
}

///
/// SessionFetcher
/// Attribute fetcher bound to one session's unit of work.
///

struct SessionFetcher<'db> {
    db: &'db Db,
    unit_of_work: UnitOfWorkId,
}

impl SessionFetcher<'_> {
    fn stored_row(
        &self,
        instance: &EntityInstance,
        statement: impl FnOnce(&'static str, Key) -> Statement,
    ) -> Result<Vec<Value>, FetchError> {
        let model = instance.model();
        let key = instance
            .key()
            .cloned()
            .ok_or(FetchError::MissingKey(model.path))?;

        self.db
            .statements
            .record(model.path, statement(model.entity_name, key.clone()));

        self.db
            .read_row(model, &key)?
            .ok_or(FetchError::RowNotFound {
                entity: model.path,
                key,
            })
    }
}

impl AttributeFetcher for SessionFetcher<'_> {
    fn unit_of_work(&self) -> UnitOfWorkId {
        self.unit_of_work
    }

    fn fetch_attribute(
        &self,
        instance: &EntityInstance,
        field: &'static EntityFieldModel,
    ) -> Result<Value, FetchError> {
        let index = instance
            .model()
            .field_index(field.name)
            .ok_or_else(|| FetchError::Store(format!("undeclared attribute '{}'", field.name)))?;
        let values = self.stored_row(instance, |entity, key| Statement::SelectAttribute {
            entity,
            key,
            attribute: field.name,
        })?;

        Ok(values.into_iter().nth(index).unwrap_or_default())
    }

    fn fetch_row(&self, instance: &EntityInstance) -> Result<Vec<Option<Value>>, FetchError> {
        let values =
            self.stored_row(instance, |entity, key| Statement::Select { entity, key })?;

        Ok(self.db.project_row(instance.model(), values))
    }
}
