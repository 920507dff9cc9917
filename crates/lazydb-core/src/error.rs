use crate::{
    db::SessionError,
    entity::EntityError,
    intercept::{FetchError, InterceptError},
    model::registry::RegistryError,
    serialize::SerializeError,
    tracker::TrackerError,
    validate::ValidateError,
};
use derive_more::Display;
use thiserror::Error as ThisError;

///
/// Error
///
/// Top-level runtime error. Subsystem errors convert into it unchanged so
/// callers can still match on the precise cause.
///

#[derive(Debug, ThisError)]
pub enum Error {
    #[error(transparent)]
    Tracker(#[from] TrackerError),

    #[error(transparent)]
    Intercept(#[from] InterceptError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Validate(#[from] ValidateError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Entity(#[from] EntityError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Serialize(#[from] SerializeError),
}

impl Error {
    /// Stable classification independent of message text.
    #[must_use]
    pub const fn class(&self) -> ErrorClass {
        match self {
            Self::Tracker(_) | Self::Entity(_) | Self::Registry(_) => ErrorClass::Usage,
            Self::Intercept(InterceptError::LazyInitialization { .. }) => ErrorClass::LazyInitialization,
            Self::Intercept(InterceptError::Tracker(_) | InterceptError::Entity(_)) => {
                ErrorClass::Usage
            }
            Self::Intercept(InterceptError::Fetch(FetchError::Serialize(_)))
            | Self::Fetch(FetchError::Serialize(_))
            | Self::Serialize(
                SerializeError::Deserialize(_)
                | SerializeError::DeserializeSizeLimitExceeded { .. },
            ) => ErrorClass::Corruption,
            Self::Intercept(InterceptError::Fetch(_))
            | Self::Fetch(_)
            | Self::Serialize(SerializeError::Serialize(_)) => ErrorClass::Storage,
            Self::Validate(_) => ErrorClass::Validation,
            Self::Session(_) => ErrorClass::Conflict,
        }
    }

    /// Whether this error is a lazy read attempted outside its unit of work.
    #[must_use]
    pub const fn is_lazy_initialization(&self) -> bool {
        matches!(self.class(), ErrorClass::LazyInitialization)
    }
}

///
/// ErrorClass
///
/// Usage              : caller asked about something that is not declared
/// LazyInitialization : lazy read outside an active unit of work (fatal)
/// Storage            : the persistence engine failed to fetch or encode a row
/// Validation         : constraints rejected a write
/// Conflict           : session state prevents the operation
/// Corruption         : stored bytes could not be decoded
///

#[derive(Clone, Copy, Debug, Display, Eq, PartialEq)]
pub enum ErrorClass {
    Usage,
    LazyInitialization,
    Storage,
    Validation,
    Conflict,
    Corruption,
}
