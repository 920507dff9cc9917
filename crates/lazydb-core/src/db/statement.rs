use crate::{
    obs::sink::{MetricsEvent, StatementKind, record},
    value::Key,
};
use std::{cell::RefCell, fmt};

///
/// Statement
/// One storage statement issued by the engine.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Statement {
    Select {
        entity: &'static str,
        key: Key,
    },
    SelectAttribute {
        entity: &'static str,
        key: Key,
        attribute: &'static str,
    },
    Insert {
        entity: &'static str,
        key: Key,
    },
    Update {
        entity: &'static str,
        key: Key,
        attributes: Vec<&'static str>,
    },
}

impl Statement {
    #[must_use]
    pub const fn kind(&self) -> StatementKind {
        match self {
            Self::Select { .. } => StatementKind::Select,
            Self::SelectAttribute { .. } => StatementKind::SelectAttribute,
            Self::Insert { .. } => StatementKind::Insert,
            Self::Update { .. } => StatementKind::Update,
        }
    }

    #[must_use]
    pub const fn is_write(&self) -> bool {
        matches!(self, Self::Insert { .. } | Self::Update { .. })
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Select { entity, key } => write!(f, "select * from {entity} where id = {key}"),
            Self::SelectAttribute {
                entity,
                key,
                attribute,
            } => write!(f, "select {attribute} from {entity} where id = {key}"),
            Self::Insert { entity, key } => write!(f, "insert into {entity} values (id = {key})"),
            Self::Update {
                entity,
                key,
                attributes,
            } => write!(
                f,
                "update {entity} set {} where id = {key}",
                attributes.join(", ")
            ),
        }
    }
}

///
/// StatementLog
///
/// Collects every statement the engine executes, in order.
/// Tests use it to assert exactly which reads and writes a scenario issued.
///

#[derive(Debug, Default)]
pub struct StatementLog {
    executed: RefCell<Vec<Statement>>,
    echo: bool,
}

impl StatementLog {
    #[must_use]
    pub const fn new(echo: bool) -> Self {
        Self {
            executed: RefCell::new(Vec::new()),
            echo,
        }
    }

    pub(crate) fn record(&self, entity_path: &'static str, statement: Statement) {
        record(MetricsEvent::StatementExecuted {
            kind: statement.kind(),
            entity_path,
        });
        if self.echo {
            record(MetricsEvent::SqlEcho {
                sql: statement.to_string(),
            });
        }

        self.executed.borrow_mut().push(statement);
    }

    pub fn clear(&self) {
        self.executed.borrow_mut().clear();
    }

    #[must_use]
    pub fn executed_count(&self) -> usize {
        self.executed.borrow().len()
    }

    #[must_use]
    pub fn count_of(&self, kind: StatementKind) -> usize {
        self.executed
            .borrow()
            .iter()
            .filter(|s| s.kind() == kind)
            .count()
    }

    #[must_use]
    pub fn statements(&self) -> Vec<Statement> {
        self.executed.borrow().clone()
    }
}
