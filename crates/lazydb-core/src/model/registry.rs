use crate::model::entity::EntityModel;
use std::collections::BTreeMap;
use thiserror::Error as ThisError;

///
/// RegistryError
///

#[derive(Debug, ThisError)]
pub enum RegistryError {
    #[error("entity '{0}' is already registered")]
    DuplicateEntity(&'static str),

    #[error("entity '{entity}' declares primary key '{field}' outside its field list")]
    PrimaryKeyNotDeclared {
        entity: &'static str,
        field: &'static str,
    },

    #[error("entity '{entity}' declares lazily fetched primary key '{field}'")]
    LazyPrimaryKey {
        entity: &'static str,
        field: &'static str,
    },

    #[error("entity '{entity}' declares attribute '{field}' more than once")]
    DuplicateField {
        entity: &'static str,
        field: &'static str,
    },

    #[error("entity '{0}' is not registered")]
    UnknownEntity(String),
}

///
/// EntityRegistry
///
/// Read-only map from entity path to its static model.
/// Populated at type-registration time, then only queried.
///

#[derive(Debug, Default)]
pub struct EntityRegistry {
    entities: BTreeMap<&'static str, &'static EntityModel>,
}

impl EntityRegistry {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entities: BTreeMap::new(),
        }
    }

    /// Register an entity model after checking its structural invariants.
    pub fn register(&mut self, model: &'static EntityModel) -> Result<(), RegistryError> {
        if self.entities.contains_key(model.path) {
            return Err(RegistryError::DuplicateEntity(model.path));
        }

        for (i, field) in model.fields.iter().enumerate() {
            if model.fields[..i].iter().any(|prev| prev.name == field.name) {
                return Err(RegistryError::DuplicateField {
                    entity: model.path,
                    field: field.name,
                });
            }
        }

        if model.primary_key_index().is_none() {
            return Err(RegistryError::PrimaryKeyNotDeclared {
                entity: model.path,
                field: model.primary_key.name,
            });
        }
        if model.primary_key.is_lazy() {
            return Err(RegistryError::LazyPrimaryKey {
                entity: model.path,
                field: model.primary_key.name,
            });
        }

        self.entities.insert(model.path, model);

        Ok(())
    }

    #[must_use]
    pub fn get(&self, path: &str) -> Option<&'static EntityModel> {
        self.entities.get(path).copied()
    }

    pub fn try_get(&self, path: &str) -> Result<&'static EntityModel, RegistryError> {
        self.get(path)
            .ok_or_else(|| RegistryError::UnknownEntity(path.to_string()))
    }

    #[must_use]
    pub fn contains(&self, model: &EntityModel) -> bool {
        self.get(model.path).is_some_and(|m| std::ptr::eq(m, model))
    }

    pub fn iter(&self) -> impl Iterator<Item = &'static EntityModel> + '_ {
        self.entities.values().copied()
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        model::field::{EntityFieldModel, FieldKind},
        test_support::MY_ENTITY,
    };

    static DUP_FIELDS: [EntityFieldModel; 2] = [
        EntityFieldModel::eager("id", FieldKind::Int),
        EntityFieldModel::eager("id", FieldKind::Text),
    ];
    static DUP_ENTITY: EntityModel = EntityModel {
        path: "registry::tests::Dup",
        entity_name: "Dup",
        primary_key: &DUP_FIELDS[0],
        fields: &DUP_FIELDS,
    };

    static LAZY_PK_FIELDS: [EntityFieldModel; 1] = [EntityFieldModel::lazy("id", FieldKind::Int)];
    static LAZY_PK_ENTITY: EntityModel = EntityModel {
        path: "registry::tests::LazyPk",
        entity_name: "LazyPk",
        primary_key: &LAZY_PK_FIELDS[0],
        fields: &LAZY_PK_FIELDS,
    };

    static STRAY_PK: EntityFieldModel = EntityFieldModel::eager("id", FieldKind::Int);
    static STRAY_PK_ENTITY: EntityModel = EntityModel {
        path: "registry::tests::StrayPk",
        entity_name: "StrayPk",
        primary_key: &STRAY_PK,
        fields: &LAZY_PK_FIELDS,
    };

    #[test]
    fn registered_models_resolve_by_path() {
        let mut registry = EntityRegistry::new();
        registry.register(&MY_ENTITY).expect("registration should succeed");

        assert!(registry.contains(&MY_ENTITY));
        assert!(registry.get(MY_ENTITY.path).is_some());
        assert!(matches!(
            registry.try_get("missing::Entity"),
            Err(RegistryError::UnknownEntity(_))
        ));
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut registry = EntityRegistry::new();
        registry.register(&MY_ENTITY).expect("first registration should succeed");

        assert!(matches!(
            registry.register(&MY_ENTITY),
            Err(RegistryError::DuplicateEntity(_))
        ));
    }

    #[test]
    fn structural_invariants_are_checked() {
        let mut registry = EntityRegistry::new();

        assert!(matches!(
            registry.register(&DUP_ENTITY),
            Err(RegistryError::DuplicateField { field: "id", .. })
        ));
        assert!(matches!(
            registry.register(&LAZY_PK_ENTITY),
            Err(RegistryError::LazyPrimaryKey { .. })
        ));
        assert!(matches!(
            registry.register(&STRAY_PK_ENTITY),
            Err(RegistryError::PrimaryKeyNotDeclared { .. })
        ));
    }
}
