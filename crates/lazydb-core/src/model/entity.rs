use crate::model::field::EntityFieldModel;

///
/// EntityModel
/// Static runtime model for one entity type.
///

#[derive(Debug)]
pub struct EntityModel {
    /// Fully-qualified type path (for dispatch and diagnostics).
    pub path: &'static str,
    /// Stable external name used in statements and row keys.
    pub entity_name: &'static str,
    /// Primary key field (points at an entry in `fields`).
    pub primary_key: &'static EntityFieldModel,
    /// Ordered field list; slot indexes on instances follow this order.
    pub fields: &'static [EntityFieldModel],
}

impl EntityModel {
    /// Position of a declared attribute, if any.
    #[must_use]
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|field| field.name == name)
    }

    #[must_use]
    pub fn field(&self, name: &str) -> Option<&'static EntityFieldModel> {
        self.fields.iter().find(|field| field.name == name)
    }

    /// Slot index of the primary key.
    #[must_use]
    pub fn primary_key_index(&self) -> Option<usize> {
        self.fields
            .iter()
            .position(|field| std::ptr::eq(field, self.primary_key))
    }

    /// Lazily fetched attributes, in declaration order.
    pub fn lazy_fields(&self) -> impl Iterator<Item = (usize, &'static EntityFieldModel)> {
        self.fields
            .iter()
            .enumerate()
            .filter(|(_, field)| field.is_lazy())
    }
}
