use crate::{
    serialize::{SerializeError, deserialize_bounded, serialize},
    value::{Key, Value},
};
use std::collections::BTreeMap;

/// Upper bound for one encoded row.
pub const MAX_ROW_BYTES: usize = 4 * 1024 * 1024;

///
/// DataKey
///

#[derive(Clone, Debug, Eq, Ord, PartialEq, PartialOrd)]
pub struct DataKey {
    pub entity: &'static str,
    pub key: Key,
}

impl DataKey {
    #[must_use]
    pub const fn new(entity: &'static str, key: Key) -> Self {
        Self { entity, key }
    }
}

///
/// RawRow
/// CBOR-encoded slot values of one row, in field order.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RawRow(Vec<u8>);

impl RawRow {
    pub fn encode(values: &[Value]) -> Result<Self, SerializeError> {
        serialize(&values).map(Self)
    }

    /// Wrap bytes read back from a backend. Nothing is checked until `decode`.
    #[must_use]
    pub const fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn decode(&self) -> Result<Vec<Value>, SerializeError> {
        deserialize_bounded(&self.0, MAX_ROW_BYTES)
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

///
/// DataStore
/// In-memory row storage standing in for the relational backend.
///

#[derive(Debug, Default)]
pub struct DataStore {
    rows: BTreeMap<DataKey, RawRow>,
}

impl DataStore {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            rows: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn get(&self, key: &DataKey) -> Option<&RawRow> {
        self.rows.get(key)
    }

    #[must_use]
    pub fn contains(&self, key: &DataKey) -> bool {
        self.rows.contains_key(key)
    }

    pub fn insert(&mut self, key: DataKey, row: RawRow) -> Option<RawRow> {
        self.rows.insert(key, row)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn clear(&mut self) {
        self.rows.clear();
    }
}
