//! Core runtime for LazyDB: per-instance attribute initialization tracking,
//! the lazy-loading interceptor, and the reachability resolver that lets
//! validation skip attributes that were never fetched.
#![warn(unreachable_pub)]

// public exports are one module level down
pub mod db;
pub mod entity;
pub mod error;
pub mod intercept;
pub mod model;
pub mod obs;
pub mod resolve;
pub mod serialize;
pub mod tracker;
pub mod validate;
pub mod value;
pub mod visitor;

// test
#[cfg(test)]
pub(crate) mod test_support;

pub use lazydb_config as config;

///
/// Prelude
///
/// Prelude contains only domain vocabulary.
/// No executors, stores, or serializers are re-exported here.
///

pub mod prelude {
    pub use crate::{
        entity::EntityInstance,
        model::{
            entity::EntityModel,
            field::{EntityFieldModel, FetchMode, FieldKind},
        },
        resolve::PathNode,
        tracker::InitState,
        validate::Constraint,
        value::{Key, Value},
    };
}
