//! Lazy attribute interception.
//!
//! Every attribute read or write on a managed instance goes through
//! [`LazyInterceptor`]. Reads of materialized attributes return the in-memory
//! value; reads of unfetched lazy attributes issue one fetch through the
//! [`AttributeFetcher`] boundary, store the result and flip the tracker.
//!
//! `on_read` borrows the instance mutably for the whole fetch, so a second
//! read of the same instance cannot start while one is in flight.


use crate::{
    entity::{EntityError, EntityInstance, UnitOfWorkId},
    model::field::EntityFieldModel,
    obs::sink::{MetricsEvent, record},
    serialize::SerializeError,
    tracker::TrackerError,
    value::{Key, Value},
};
use thiserror::Error as ThisError;

///
/// FetchError
/// Failure reported by the persistence engine while fetching.
///

#[derive(Debug, ThisError)]
pub enum FetchError {
    #[error("row not found: entity={entity} key={key}")]
    RowNotFound { entity: &'static str, key: Key },

    #[error("instance of entity '{0}' has no key assigned")]
    MissingKey(&'static str),

    #[error("store error: {0}")]
    Store(String),

    #[error(transparent)]
    Serialize(#[from] SerializeError),
}

///
/// InterceptError
///

#[derive(Debug, ThisError)]
pub enum InterceptError {
    #[error(
        "failed to lazily initialize attribute '{attribute}' of entity '{entity}': no active unit of work"
    )]
    LazyInitialization {
        entity: &'static str,
        attribute: &'static str,
    },

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Tracker(#[from] TrackerError),

    #[error(transparent)]
    Entity(#[from] EntityError),
}

///
/// AttributeFetcher
///
/// Persistence-engine boundary used to materialize unloaded data.
/// Implementations issue storage reads; they never touch trackers.
///

pub trait AttributeFetcher {
    /// Unit of work on whose behalf fetches are issued.
    fn unit_of_work(&self) -> UnitOfWorkId;

    /// Fetch the stored value of one attribute.
    fn fetch_attribute(
        &self,
        instance: &EntityInstance,
        field: &'static EntityFieldModel,
    ) -> Result<Value, FetchError>;

    /// Fetch the row backing a placeholder. Slots that the engine does not
    /// fetch with the row are `None`.
    fn fetch_row(&self, instance: &EntityInstance) -> Result<Vec<Option<Value>>, FetchError>;
}

///
/// LazyInterceptor
///

pub struct LazyInterceptor<'f, F: ?Sized> {
    fetcher: &'f F,
}

impl<'f, F> LazyInterceptor<'f, F>
where
    F: AttributeFetcher + ?Sized,
{
    #[must_use]
    pub const fn new(fetcher: &'f F) -> Self {
        Self { fetcher }
    }

    /// Read an attribute, fetching it first if it is lazy and unfetched.
    pub fn on_read<'i>(
        &self,
        instance: &'i mut EntityInstance,
        name: &str,
    ) -> Result<&'i Value, InterceptError> {
        let model = instance.model();
        let index = model
            .field_index(name)
            .ok_or_else(|| TrackerError::unknown(model, name))?;
        let field = &model.fields[index];

        if !instance.tracker().is_initialized() {
            self.hydrate(instance, field)?;
        }
        if !instance.tracker().is_index_initialized(index) {
            self.fetch(instance, index, field)?;
        }

        Ok(instance.slot(index))
    }

    /// Write an attribute. A write always counts as initializing it.
    pub fn on_write(
        &self,
        instance: &mut EntityInstance,
        name: &str,
        value: Value,
    ) -> Result<(), InterceptError> {
        let model = instance.model();
        let index = model
            .field_index(name)
            .ok_or_else(|| TrackerError::unknown(model, name))?;

        if !instance.tracker().is_initialized() {
            self.hydrate(instance, &model.fields[index])?;
        }
        instance.store_written(index, value)?;

        Ok(())
    }

    fn ensure_owned(
        &self,
        instance: &EntityInstance,
        field: &'static EntityFieldModel,
    ) -> Result<(), InterceptError> {
        if instance.unit_of_work() == Some(self.fetcher.unit_of_work()) {
            Ok(())
        } else {
            Err(InterceptError::LazyInitialization {
                entity: instance.model().path,
                attribute: field.name,
            })
        }
    }

    fn hydrate(
        &self,
        instance: &mut EntityInstance,
        field: &'static EntityFieldModel,
    ) -> Result<(), InterceptError> {
        self.ensure_owned(instance, field)?;

        let row = self.fetcher.fetch_row(instance)?;
        instance.apply_row(row);

        Ok(())
    }

    fn fetch(
        &self,
        instance: &mut EntityInstance,
        index: usize,
        field: &'static EntityFieldModel,
    ) -> Result<(), InterceptError> {
        self.ensure_owned(instance, field)?;
        let entity_path = instance.model().path;

        match self.fetcher.fetch_attribute(instance, field) {
            Ok(value) => {
                instance.store_fetched(index, value);
                record(MetricsEvent::LazyFetch {
                    entity_path,
                    attribute: field.name,
                });

                Ok(())
            }
            Err(err) => {
                // tracker untouched: a later read in a live unit of work retries
                record(MetricsEvent::LazyFetchFailed {
                    entity_path,
                    attribute: field.name,
                });

                Err(err.into())
            }
        }
    }
}

/// Write through the interceptor's bookkeeping on an instance that has no
/// unit of work yet (new instances are fully initialized and never fetch).
pub fn write_detached(
    instance: &mut EntityInstance,
    name: &str,
    value: Value,
) -> Result<(), InterceptError> {
    let model = instance.model();
    let index = model
        .field_index(name)
        .ok_or_else(|| TrackerError::unknown(model, name))?;

    if !instance.tracker().is_initialized() {
        return Err(InterceptError::LazyInitialization {
            entity: model.path,
            attribute: model.fields[index].name,
        });
    }
    instance.store_written(index, value)?;

    Ok(())
}
