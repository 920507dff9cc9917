use crate::validate::Constraint;
use derive_more::Display;

///
/// EntityFieldModel
/// Runtime attribute metadata used by tracking, loading and validation.
///

#[derive(Debug)]
pub struct EntityFieldModel {
    /// Attribute name as used by accessors and validation paths.
    pub name: &'static str,
    /// Runtime value shape.
    pub kind: FieldKind,
    /// Whether the attribute is fetched with its row or on first access.
    pub fetch: FetchMode,
    /// Constraints evaluated against the attribute value itself.
    pub constraints: &'static [Constraint],
    /// Constraints evaluated against each element of a collection value.
    pub element_constraints: &'static [Constraint],
}

impl EntityFieldModel {
    #[must_use]
    pub const fn new(name: &'static str, kind: FieldKind, fetch: FetchMode) -> Self {
        Self {
            name,
            kind,
            fetch,
            constraints: &[],
            element_constraints: &[],
        }
    }

    #[must_use]
    pub const fn eager(name: &'static str, kind: FieldKind) -> Self {
        Self::new(name, kind, FetchMode::Eager)
    }

    #[must_use]
    pub const fn lazy(name: &'static str, kind: FieldKind) -> Self {
        Self::new(name, kind, FetchMode::Lazy)
    }

    #[must_use]
    pub const fn with_constraints(mut self, constraints: &'static [Constraint]) -> Self {
        self.constraints = constraints;
        self
    }

    #[must_use]
    pub const fn with_element_constraints(mut self, constraints: &'static [Constraint]) -> Self {
        self.element_constraints = constraints;
        self
    }

    #[must_use]
    pub const fn is_lazy(&self) -> bool {
        matches!(self.fetch, FetchMode::Lazy)
    }

    #[must_use]
    pub const fn is_constrained(&self) -> bool {
        !self.constraints.is_empty() || !self.element_constraints.is_empty()
    }
}

///
/// FetchMode
///

#[derive(Clone, Copy, Debug, Display, Eq, PartialEq)]
pub enum FetchMode {
    Eager,
    Lazy,
}

///
/// FieldKind
///
/// Minimal type surface needed by the interceptor and validator.
/// Aligned with `Value` variants.
///

#[derive(Clone, Copy, Debug, Display, Eq, PartialEq)]
pub enum FieldKind {
    Bool,
    Int,
    Text,
    List,
}

impl FieldKind {
    #[must_use]
    pub const fn is_collection(self) -> bool {
        matches!(self, Self::List)
    }
}
