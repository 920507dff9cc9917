//! Validation reachability.
//!
//! The validation engine asks [`ReachabilityResolver::is_reachable`] once per
//! path step before it looks at a value. The resolver answers from the
//! tracker alone: "is this already in memory", never "fetch this". An
//! unfetched lazy attribute is therefore skipped instead of loaded.


use crate::{
    entity::EntityInstance,
    model::field::FieldKind,
    obs::sink::{MetricsEvent, record},
    tracker,
    value::Value,
};

///
/// PathNode
///
/// One step of a validation traversal.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum PathNode<'a> {
    /// A declared attribute of the traversed instance.
    Property { name: &'a str },

    /// An element inside a container attribute.
    ContainerElement {
        name: &'a str,
        index: Option<usize>,
        key: Option<&'a Value>,
    },

    /// A probe that does not come from a model walk; may name anything,
    /// or nothing at all.
    Synthetic { name: Option<&'a str> },
}

impl<'a> PathNode<'a> {
    #[must_use]
    pub const fn property(name: &'a str) -> Self {
        Self::Property { name }
    }

    #[must_use]
    pub const fn element(name: &'a str, index: usize) -> Self {
        Self::ContainerElement {
            name,
            index: Some(index),
            key: None,
        }
    }

    #[must_use]
    pub const fn synthetic(name: &'a str) -> Self {
        Self::Synthetic { name: Some(name) }
    }

    /// Attribute name this step refers to, if any.
    #[must_use]
    pub const fn name(&self) -> Option<&'a str> {
        match self {
            Self::Property { name } | Self::ContainerElement { name, .. } => Some(name),
            Self::Synthetic { name } => *name,
        }
    }

    #[must_use]
    pub const fn is_in_iterable(&self) -> bool {
        matches!(self, Self::ContainerElement { .. })
    }
}

///
/// ReachabilityResolver
///

#[derive(Clone, Copy, Debug, Default)]
pub struct ReachabilityResolver;

impl ReachabilityResolver {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Whether the engine may examine the value behind `node`.
    ///
    /// `path_to_node` is the path from the instance root to the object that
    /// owns `node`; when it is non-empty its first step names the root
    /// attribute that governs reachability. `container` is the kind of the
    /// enclosing container, if the step sits inside one; it does not change
    /// the answer.
    #[must_use]
    pub fn is_reachable(
        &self,
        instance: &EntityInstance,
        node: &PathNode<'_>,
        _container: Option<FieldKind>,
        path_to_node: &[PathNode<'_>],
    ) -> bool {
        let root = path_to_node.first().unwrap_or(node);
        let reachable = tracker::is_initialized(instance)
            && root.name().is_some_and(|name| {
                matches!(tracker::is_attribute_initialized(instance, name), Ok(true))
            });

        if !reachable {
            record(MetricsEvent::ReachabilitySkipped {
                entity_path: instance.model().path,
            });
        }

        reachable
    }

    /// Whether the engine may descend into the elements behind `node`.
    /// Only reachable collection attributes cascade.
    #[must_use]
    pub fn is_cascadable(
        &self,
        instance: &EntityInstance,
        node: &PathNode<'_>,
        container: Option<FieldKind>,
        path_to_node: &[PathNode<'_>],
    ) -> bool {
        let is_collection = node
            .name()
            .and_then(|name| instance.model().field(name))
            .is_some_and(|field| field.kind.is_collection());

        is_collection && self.is_reachable(instance, node, container, path_to_node)
    }
}
