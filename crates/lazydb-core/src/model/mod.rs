//! Runtime data model definitions.
//!
//! Types in `model` are static, process-wide descriptors. They are built once
//! per entity type, registered, and then only ever read. Per-instance state
//! (values, initialization tracking) lives in `entity` and `tracker`.
//!
//! In general:
//! - `model` describes *what is declared*
//! - `tracker` records *what is loaded*
pub mod entity;
pub mod field;
pub mod registry;
