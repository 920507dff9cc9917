use crate::{
    db::Db,
    entity::{EntityInstance, UnitOfWork, UnitOfWorkId},
    intercept::{AttributeFetcher, FetchError},
    model::{
        entity::EntityModel,
        field::{EntityFieldModel, FieldKind},
        registry::EntityRegistry,
    },
    validate::Constraint,
    value::Value,
};
use lazydb_config::RuntimeConfig;
use std::{cell::Cell, rc::Rc};

///
/// MyEntity
///
/// id            : eager key
/// lazy_cols     : lazy list, at most 3 elements
/// mutable_field : eager int
///

const LAZY_COLS_CONSTRAINTS: &[Constraint] = &[Constraint::MaxLen(3)];
const LABEL_CONSTRAINTS: &[Constraint] = &[Constraint::Required, Constraint::MaxLen(8)];
const TAG_ELEMENT_CONSTRAINTS: &[Constraint] = &[Constraint::MaxLen(4)];

pub(crate) static MY_ENTITY_FIELDS: [EntityFieldModel; 3] = [
    EntityFieldModel::eager("id", FieldKind::Int),
    EntityFieldModel::lazy("lazy_cols", FieldKind::List).with_constraints(LAZY_COLS_CONSTRAINTS),
    EntityFieldModel::eager("mutable_field", FieldKind::Int),
];

pub(crate) static MY_ENTITY: EntityModel = EntityModel {
    path: "test_support::MyEntity",
    entity_name: "MyEntity",
    primary_key: &MY_ENTITY_FIELDS[0],
    fields: &MY_ENTITY_FIELDS,
};

///
/// Document
///
/// Wider fixture: a constrained eager label, an unconstrained lazy body and
/// a lazy tag list whose elements are bounded.
///

pub(crate) static DOCUMENT_FIELDS: [EntityFieldModel; 4] = [
    EntityFieldModel::eager("id", FieldKind::Text),
    EntityFieldModel::eager("label", FieldKind::Text).with_constraints(LABEL_CONSTRAINTS),
    EntityFieldModel::lazy("body", FieldKind::Text),
    EntityFieldModel::lazy("tags", FieldKind::List)
        .with_element_constraints(TAG_ELEMENT_CONSTRAINTS),
];

pub(crate) static DOCUMENT: EntityModel = EntityModel {
    path: "test_support::Document",
    entity_name: "Document",
    primary_key: &DOCUMENT_FIELDS[0],
    fields: &DOCUMENT_FIELDS,
};

pub(crate) fn test_registry() -> EntityRegistry {
    let mut registry = EntityRegistry::new();
    registry
        .register(&MY_ENTITY)
        .expect("MyEntity registration should succeed");
    registry
        .register(&DOCUMENT)
        .expect("Document registration should succeed");

    registry
}

pub(crate) fn test_db() -> Db {
    Db::new(test_registry(), RuntimeConfig::default())
}

pub(crate) fn test_db_with(config: RuntimeConfig) -> Db {
    Db::new(test_registry(), config)
}

/// New `MyEntity` with the given key and lazy list contents.
pub(crate) fn my_entity(id: i64, cols: &[&str]) -> EntityInstance {
    let mut instance =
        EntityInstance::with_key(&MY_ENTITY, id).expect("int key fits the id slot");
    crate::intercept::write_detached(
        &mut instance,
        "lazy_cols",
        Value::from(cols.to_vec()),
    )
    .expect("lazy_cols write should succeed");
    crate::intercept::write_detached(&mut instance, "mutable_field", Value::Int(0))
        .expect("mutable_field write should succeed");

    instance
}

///
/// StubFetcher
///
/// Serves attribute values from a fixed row and counts fetches.
/// Can be told to fail the next N fetches.
///

pub(crate) struct StubFetcher {
    unit_of_work: Rc<UnitOfWork>,
    row: Vec<Value>,
    pub(crate) attribute_fetches: Cell<usize>,
    pub(crate) row_fetches: Cell<usize>,
    failures_left: Cell<usize>,
}

impl StubFetcher {
    pub(crate) fn new(row: Vec<Value>) -> Self {
        Self {
            unit_of_work: UnitOfWork::begin(),
            row,
            attribute_fetches: Cell::new(0),
            row_fetches: Cell::new(0),
            failures_left: Cell::new(0),
        }
    }

    pub(crate) const fn unit_of_work_handle(&self) -> &Rc<UnitOfWork> {
        &self.unit_of_work
    }

    pub(crate) fn fail_next(&self, n: usize) {
        self.failures_left.set(n);
    }

    /// Instance of `model` loaded on behalf of this fetcher's unit of work,
    /// with only eager slots fetched.
    pub(crate) fn load(&self, model: &'static EntityModel) -> EntityInstance {
        let key = crate::value::Key::from_value(&self.row[0]).expect("fixture key");
        let row = self
            .row
            .iter()
            .zip(model.fields)
            .map(|(v, f)| (!f.is_lazy()).then(|| v.clone()))
            .collect();

        EntityInstance::loaded(model, key, row, &self.unit_of_work)
    }

    fn take_failure(&self) -> bool {
        let left = self.failures_left.get();
        if left > 0 {
            self.failures_left.set(left - 1);
            true
        } else {
            false
        }
    }
}

impl AttributeFetcher for StubFetcher {
    fn unit_of_work(&self) -> UnitOfWorkId {
        self.unit_of_work.id()
    }

    fn fetch_attribute(
        &self,
        instance: &EntityInstance,
        field: &'static EntityFieldModel,
    ) -> Result<Value, FetchError> {
        self.attribute_fetches.set(self.attribute_fetches.get() + 1);
        if self.take_failure() {
            return Err(FetchError::Store("injected failure".to_string()));
        }

        let index = instance
            .model()
            .field_index(field.name)
            .expect("fixture field");

        Ok(self.row[index].clone())
    }

    fn fetch_row(&self, instance: &EntityInstance) -> Result<Vec<Option<Value>>, FetchError> {
        self.row_fetches.set(self.row_fetches.get() + 1);
        if self.take_failure() {
            return Err(FetchError::Store("injected failure".to_string()));
        }

        Ok(self
            .row
            .iter()
            .zip(instance.model().fields)
            .map(|(v, f)| (!f.is_lazy()).then(|| v.clone()))
            .collect())
    }
}

///
/// PanickingFetcher
/// Fails the test on any storage access.
///

pub(crate) struct PanickingFetcher {
    unit_of_work: Rc<UnitOfWork>,
}

impl PanickingFetcher {
    pub(crate) fn new() -> Self {
        Self {
            unit_of_work: UnitOfWork::begin(),
        }
    }

    pub(crate) fn adopt(&self, instance: &mut EntityInstance) {
        instance.attach(&self.unit_of_work);
    }
}

impl AttributeFetcher for PanickingFetcher {
    fn unit_of_work(&self) -> UnitOfWorkId {
        self.unit_of_work.id()
    }

    fn fetch_attribute(
        &self,
        _: &EntityInstance,
        field: &'static EntityFieldModel,
    ) -> Result<Value, FetchError> {
        panic!("unexpected attribute fetch: {}", field.name);
    }

    fn fetch_row(&self, _: &EntityInstance) -> Result<Vec<Option<Value>>, FetchError> {
        panic!("unexpected row fetch");
    }
}
