use std::fmt::Debug;

use serde::{Deserialize, Serialize};

use crate::condition::{Condition, ConditionFactory, PropertyId, PropertyValue};
use crate::errors::AutomationError;
use crate::find::FindBuilder;

/// Which part of the tree, relative to an element, a single search looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TreeScope {
    /// The element itself.
    Element,
    /// Immediate children only.
    Children,
    Descendants,
    /// The element and its descendants.
    Subtree,
    Parent,
    Ancestors,
}

/// A node of an accessibility tree.
///
/// Implementors are cheap handles (clone = new reference to the same node).
/// Only attribute lookup and the two navigation primitives are required: the
/// search operations have tree-walking defaults which a provider backed by a
/// native search API can override.
pub trait Element: Clone + Debug + Send + Sync + 'static {
    fn property(&self, id: PropertyId) -> Result<Option<PropertyValue>, AutomationError>;

    fn children(&self) -> Result<Vec<Self>, AutomationError>;

    fn parent(&self) -> Result<Option<Self>, AutomationError>;

    fn first_child(&self) -> Result<Option<Self>, AutomationError> {
        Ok(self.children()?.into_iter().next())
    }

    /// Whether the handle still refers to a node in the live tree. Windows get
    /// destroyed and recreated, which leaves old handles dangling.
    fn is_alive(&self) -> bool {
        true
    }

    fn condition_factory(&self) -> ConditionFactory {
        ConditionFactory
    }

    fn find_first(
        &self,
        scope: TreeScope,
        condition: &Condition,
    ) -> Result<Option<Self>, AutomationError> {
        Ok(search_tree(self, scope, condition, Some(1))?.into_iter().next())
    }

    fn find_all(&self, scope: TreeScope, condition: &Condition) -> Result<Vec<Self>, AutomationError> {
        search_tree(self, scope, condition, None)
    }

    /// Descends one level per condition: condition `i` must match a child of
    /// the element matched by condition `i - 1`. Backtracks across siblings,
    /// so the result is the first element of [`Element::find_all_nested`].
    /// An empty path yields the element itself.
    fn find_first_nested(&self, conditions: &[Condition]) -> Result<Option<Self>, AutomationError> {
        let Some((condition, rest)) = conditions.split_first() else {
            return Ok(Some(self.clone()));
        };
        for child in self.find_all(TreeScope::Children, condition)? {
            if let Some(found) = child.find_first_nested(rest)? {
                return Ok(Some(found));
            }
        }
        Ok(None)
    }

    /// Every element reachable through the nested path, in tree order.
    fn find_all_nested(&self, conditions: &[Condition]) -> Result<Vec<Self>, AutomationError> {
        let mut frontier = vec![self.clone()];
        for condition in conditions {
            let mut next = Vec::new();
            for element in &frontier {
                next.extend(element.find_all(TreeScope::Children, condition)?);
            }
            if next.is_empty() {
                return Ok(next);
            }
            frontier = next;
        }
        Ok(frontier)
    }

    /// Starts a fluent query anchored at this element.
    fn build_find(&self) -> FindBuilder<Self> {
        FindBuilder::new(self.clone())
    }
}

/// Walks `scope` around `root` collecting matches, stopping after `limit`.
fn search_tree<E: Element>(
    root: &E,
    scope: TreeScope,
    condition: &Condition,
    limit: Option<usize>,
) -> Result<Vec<E>, AutomationError> {
    let mut found = Vec::new();
    let full = |found: &Vec<E>| limit.is_some_and(|l| found.len() >= l);

    match scope {
        TreeScope::Element => {
            if condition.matches(root)? {
                found.push(root.clone());
            }
        }
        TreeScope::Children => {
            for child in root.children()? {
                if condition.matches(&child)? {
                    found.push(child);
                    if full(&found) {
                        break;
                    }
                }
            }
        }
        TreeScope::Descendants | TreeScope::Subtree => {
            let mut stack = if scope == TreeScope::Subtree {
                vec![root.clone()]
            } else {
                let mut children = root.children()?;
                children.reverse();
                children
            };
            // pre-order
            while let Some(element) = stack.pop() {
                if condition.matches(&element)? {
                    found.push(element.clone());
                    if full(&found) {
                        break;
                    }
                }
                let mut children = element.children()?;
                children.reverse();
                stack.extend(children);
            }
        }
        TreeScope::Parent => {
            if let Some(parent) = root.parent()? {
                if condition.matches(&parent)? {
                    found.push(parent);
                }
            }
        }
        TreeScope::Ancestors => {
            let mut current = root.parent()?;
            while let Some(element) = current {
                if condition.matches(&element)? {
                    found.push(element.clone());
                    if full(&found) {
                        break;
                    }
                }
                current = element.parent()?;
            }
        }
    }

    Ok(found)
}
