//! Persistence engine: an in-memory row store, statement log, and the
//! session (unit of work) that mediates every attribute access and runs the
//! pre-insert / pre-update validation hook.

mod session;
mod statement;
mod store;


pub use session::{EntityHandle, Session, SessionError};
pub use statement::{Statement, StatementLog};
pub use store::{DataKey, DataStore, MAX_ROW_BYTES, RawRow};

use crate::{
    config::RuntimeConfig,
    error::Error,
    intercept::FetchError,
    model::{entity::EntityModel, registry::EntityRegistry},
    resolve::ReachabilityResolver,
    value::{Key, Value},
};
use std::cell::RefCell;

///
/// Db
///
/// Session factory. Owns the registry, configuration, backing store and the
/// statement log shared by every session it opens.
///

pub struct Db {
    registry: EntityRegistry,
    config: RuntimeConfig,
    store: RefCell<DataStore>,
    statements: StatementLog,
    resolver: ReachabilityResolver,
}

impl Db {
    #[must_use]
    pub fn new(registry: EntityRegistry, config: RuntimeConfig) -> Self {
        let statements = StatementLog::new(config.show_sql);

        Self {
            registry,
            config,
            store: RefCell::new(DataStore::new()),
            statements,
            resolver: ReachabilityResolver::new(),
        }
    }

    #[must_use]
    pub const fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    #[must_use]
    pub const fn registry(&self) -> &EntityRegistry {
        &self.registry
    }

    #[must_use]
    pub const fn statements(&self) -> &StatementLog {
        &self.statements
    }

    #[must_use]
    pub const fn resolver(&self) -> &ReachabilityResolver {
        &self.resolver
    }

    /// Open a new unit of work.
    #[must_use]
    pub fn session(&self) -> Session<'_> {
        Session::new(self)
    }

    /// Run `f` in a fresh session and commit it if `f` succeeds.
    /// On error nothing is flushed.
    pub fn in_transaction<T>(
        &self,
        f: impl FnOnce(&mut Session<'_>) -> Result<T, Error>,
    ) -> Result<T, Error> {
        let mut session = self.session();
        let out = f(&mut session)?;
        session.commit()?;

        Ok(out)
    }

    /// Read and decode a stored row.
    pub(crate) fn read_row(
        &self,
        model: &'static EntityModel,
        key: &Key,
    ) -> Result<Option<Vec<Value>>, FetchError> {
        let store = self.store.borrow();
        let Some(raw) = store.get(&DataKey::new(model.path, key.clone())) else {
            return Ok(None);
        };

        Ok(Some(raw.decode()?))
    }

    /// Keep the slots fetched together with the row; lazy slots outside the
    /// default fetch group become `None`.
    pub(crate) fn project_row(
        &self,
        model: &'static EntityModel,
        values: Vec<Value>,
    ) -> Vec<Option<Value>> {
        values
            .into_iter()
            .zip(model.fields)
            .map(|(value, field)| {
                let with_row = !field.is_lazy()
                    || !self.config.lazy_loading
                    || (self.config.collections_in_default_fetch_group
                        && field.kind.is_collection());

                with_row.then_some(value)
            })
            .collect()
    }

    pub(crate) fn with_store<R>(&self, f: impl FnOnce(&DataStore) -> R) -> R {
        f(&self.store.borrow())
    }

    pub(crate) fn with_store_mut<R>(&self, f: impl FnOnce(&mut DataStore) -> R) -> R {
        f(&mut self.store.borrow_mut())
    }
}
