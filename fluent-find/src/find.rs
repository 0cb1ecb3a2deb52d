//! Fluent, retryable element queries.
//!
//! ```
//! use std::time::Duration;
//! use fluent_find::{ControlType, Element, MemoryElement};
//!
//! let window = MemoryElement::new(ControlType::Window).with_name("Untitled - Notepad");
//! window.append(MemoryElement::new(ControlType::Button).with_name("Save"))?;
//!
//! let save = window
//!     .build_find()
//!     .in_descendants()
//!     .by_name("Save")
//!     .retry(Duration::from_secs(3))
//!     .first()?;
//! assert_eq!(save.name().as_deref(), Some("Save"));
//! # Ok::<(), fluent_find::AutomationError>(())
//! ```

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::clock::{Clock, SystemClock};
use crate::condition::{Condition, ConditionFactory, ControlType};
use crate::element::{Element, TreeScope};
use crate::errors::AutomationError;
use crate::observer::{FindEvent, FindObserver, FindOutcome, FindResult, QueryInfo};
use crate::retry::{poll_until_found_with, RetryPolicy};

/// Region of the tree a query searches, relative to its anchor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Scope {
    /// No search: the anchor itself.
    #[default]
    Anchor,
    Element,
    /// Nested descent, one level per condition.
    Children,
    Descendants,
    Subtree,
    Parent,
    Ancestors,
}

impl Scope {
    /// Scopes that take exactly one condition, mapped to the provider scope.
    fn flat(self) -> Option<TreeScope> {
        match self {
            Scope::Element => Some(TreeScope::Element),
            Scope::Descendants => Some(TreeScope::Descendants),
            Scope::Subtree => Some(TreeScope::Subtree),
            Scope::Parent => Some(TreeScope::Parent),
            Scope::Ancestors => Some(TreeScope::Ancestors),
            Scope::Anchor | Scope::Children => None,
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// A hop applied to a search result after the search succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Navigation {
    Parent,
    /// First immediate child.
    Child,
}

impl Navigation {
    fn apply<E: Element>(self, element: &E) -> Result<Option<E>, AutomationError> {
        match self {
            Navigation::Parent => element.parent(),
            Navigation::Child => element.first_child(),
        }
    }
}

/// A fully resolved search.
///
/// Constructing one directly rules out condition-count mistakes; builders
/// resolve their scope and conditions into one when executed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Search {
    Anchor,
    Nested(Vec<Condition>),
    Scoped {
        scope: TreeScope,
        condition: Condition,
    },
}

impl Search {
    pub fn nested(conditions: impl IntoIterator<Item = Condition>) -> Self {
        Search::Nested(conditions.into_iter().collect())
    }

    pub fn scoped(scope: TreeScope, condition: Condition) -> Self {
        Search::Scoped { scope, condition }
    }

    /// Interprets a condition list under `scope`.
    ///
    /// `Children` reads the list positionally, `Anchor` takes none and every
    /// other scope takes exactly one.
    pub fn resolve(scope: Scope, conditions: &[Condition]) -> Result<Self, AutomationError> {
        match scope {
            Scope::Anchor if conditions.is_empty() => return Ok(Search::Anchor),
            Scope::Anchor => {
                return Err(AutomationError::InvalidQuery(format!(
                    "{} condition(s) given but no search scope was chosen",
                    conditions.len()
                )))
            }
            Scope::Children => return Ok(Search::Nested(conditions.to_vec())),
            _ => {}
        }

        match (scope.flat(), conditions) {
            (Some(tree_scope), [condition]) => Ok(Search::scoped(tree_scope, condition.clone())),
            _ => Err(AutomationError::InvalidQuery(format!(
                "scope {scope} takes exactly one condition, got {}",
                conditions.len()
            ))),
        }
    }

    pub fn first<E: Element>(&self, anchor: &E) -> Result<Option<E>, AutomationError> {
        match self {
            Search::Anchor => Ok(Some(anchor.clone())),
            Search::Nested(conditions) => anchor.find_first_nested(conditions),
            Search::Scoped { scope, condition } => anchor.find_first(*scope, condition),
        }
    }

    pub fn all<E: Element>(&self, anchor: &E) -> Result<Vec<E>, AutomationError> {
        match self {
            Search::Anchor => Ok(vec![anchor.clone()]),
            Search::Nested(conditions) => anchor.find_all_nested(conditions),
            Search::Scoped { scope, condition } => anchor.find_all(*scope, condition),
        }
    }
}

/// Accumulates scope, conditions, navigation and retry settings for one query,
/// then executes them on a terminal call.
///
/// Terminal calls (`first`, `first_or_default`, `all` and their variants)
/// consume the builder.
pub struct FindBuilder<E: Element> {
    id: Uuid,
    element: E,
    scope: Scope,
    conditions: Vec<Condition>,
    actions: Vec<Navigation>,
    retry: Option<RetryPolicy>,
    modifiers: Vec<String>,
    observers: Vec<Arc<dyn FindObserver<E>>>,
    clock: Arc<dyn Clock>,
}

impl<E: Element> FindBuilder<E> {
    pub fn new(element: E) -> Self {
        Self {
            id: Uuid::new_v4(),
            element,
            scope: Scope::default(),
            conditions: Vec::new(),
            actions: Vec::new(),
            retry: None,
            modifiers: Vec::new(),
            observers: Vec::new(),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// The element the query is anchored at.
    pub fn element(&self) -> &E {
        &self.element
    }

    pub fn modifiers(&self) -> &[String] {
        &self.modifiers
    }

    pub fn info(&self) -> QueryInfo {
        QueryInfo {
            id: self.id,
            scope: self.scope,
            modifiers: self.modifiers.clone(),
        }
    }

    // Scope

    /// Sets the search scope. Only the last scope set before execution counts.
    pub fn scope(mut self, scope: Scope) -> Self {
        self.modifiers.push(format!("Scope: {scope}"));
        self.scope = scope;
        self
    }

    pub fn in_self(self) -> Self {
        self.scope(Scope::Element)
    }

    /// Nested descent: each condition selects a child of the previous match.
    pub fn in_children(self) -> Self {
        self.scope(Scope::Children)
    }

    pub fn in_descendants(self) -> Self {
        self.scope(Scope::Descendants)
    }

    pub fn in_subtree(self) -> Self {
        self.scope(Scope::Subtree)
    }

    pub fn in_parent(self) -> Self {
        self.scope(Scope::Parent)
    }

    pub fn in_ancestors(self) -> Self {
        self.scope(Scope::Ancestors)
    }

    // Conditions

    fn push_condition(mut self, modifier: String, condition: Condition) -> Self {
        self.modifiers.push(modifier);
        self.conditions.push(condition);
        self
    }

    /// Adds a condition built from the anchor's condition factory.
    pub fn by<F>(self, build: F) -> Self
    where
        F: FnOnce(&ConditionFactory) -> Condition,
    {
        let condition = build(&self.element.condition_factory());
        self.push_condition(format!("Condition: {condition}"), condition)
    }

    pub fn by_name(self, value: &str) -> Self {
        let condition = self.element.condition_factory().by_name(value);
        self.push_condition(format!("Name: {value}"), condition)
    }

    pub fn by_class_name(self, value: &str) -> Self {
        let condition = self.element.condition_factory().by_class_name(value);
        self.push_condition(format!("ClassName: {value}"), condition)
    }

    pub fn by_help_text(self, value: &str) -> Self {
        let condition = self.element.condition_factory().by_help_text(value);
        self.push_condition(format!("HelpText: {value}"), condition)
    }

    pub fn by_automation_id(self, value: &str) -> Self {
        let condition = self.element.condition_factory().by_automation_id(value);
        self.push_condition(format!("AutomationId: {value}"), condition)
    }

    pub fn by_text(self, value: &str) -> Self {
        let condition = self.element.condition_factory().by_text(value);
        self.push_condition(format!("Text: {value}"), condition)
    }

    pub fn by_control_type(self, value: ControlType) -> Self {
        let condition = self.element.condition_factory().by_control_type(value);
        self.push_condition(format!("ControlType: {value}"), condition)
    }

    pub fn by_framework_id(self, value: &str) -> Self {
        let condition = self.element.condition_factory().by_framework_id(value);
        self.push_condition(format!("FrameworkId: {value}"), condition)
    }

    pub fn by_process_id(self, value: u32) -> Self {
        let condition = self.element.condition_factory().by_process_id(value);
        self.push_condition(format!("ProcessId: {value}"), condition)
    }

    pub fn by_localized_control_type(self, value: &str) -> Self {
        let condition = self.element.condition_factory().by_localized_control_type(value);
        self.push_condition(format!("LocalizedControlType: {value}"), condition)
    }

    // Navigation

    pub fn parent(mut self) -> Self {
        self.modifiers.push("Action: Parent".to_string());
        self.actions.push(Navigation::Parent);
        self
    }

    pub fn child(mut self) -> Self {
        self.modifiers.push("Action: Child".to_string());
        self.actions.push(Navigation::Child);
        self
    }

    // Retry and instrumentation

    /// Polls the search until it matches or the policy times out. A bare
    /// `Duration` becomes a policy with the default interval.
    pub fn retry(mut self, policy: impl Into<RetryPolicy>) -> Self {
        let policy = policy.into();
        self.modifiers.push(format!("Retry: {policy}"));
        self.retry = Some(policy);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn observe(self, observer: impl FindObserver<E> + 'static) -> Self {
        self.observe_shared(Arc::new(observer))
    }

    pub fn observe_shared(mut self, observer: Arc<dyn FindObserver<E>>) -> Self {
        self.observers.push(observer);
        self
    }

    // Execution

    fn navigate(&self, mut value: Option<E>) -> Result<Option<E>, AutomationError> {
        for action in &self.actions {
            value = match value {
                Some(current) => action.apply(&current)?,
                None => return Ok(None),
            };
        }
        Ok(value)
    }

    fn locate_first(
        &self,
        search: &Search,
        policy: Option<&RetryPolicy>,
    ) -> Result<Option<E>, AutomationError> {
        let found = match policy {
            Some(policy) => {
                poll_until_found_with(|| search.first(&self.element), policy, self.clock.as_ref())?
            }
            None => search.first(&self.element)?,
        };
        self.navigate(found)
    }

    fn locate_all(&self, search: &Search) -> Result<Vec<E>, AutomationError> {
        let found = match &self.retry {
            Some(policy) => poll_until_found_with(
                || {
                    search
                        .all(&self.element)
                        .map(|all| (!all.is_empty()).then_some(all))
                },
                policy,
                self.clock.as_ref(),
            )?
            .unwrap_or_default(),
            None => search.all(&self.element)?,
        };

        let mut navigated = Vec::with_capacity(found.len());
        for element in found {
            if let Some(element) = self.navigate(Some(element))? {
                navigated.push(element);
            }
        }
        Ok(navigated)
    }

    fn notify(&self, query: &QueryInfo, result: FindResult<'_, E>) {
        let event = FindEvent { query, result };
        for observer in &self.observers {
            observer.on_find(&event);
        }
    }

    fn finish_single(self, value: Option<E>) -> FindOutcome<Option<E>> {
        let query = self.info();
        self.notify(&query, FindResult::Single(value.as_ref()));
        FindOutcome { query, value }
    }

    /// Like [`first_or_default`](Self::first_or_default), returning the query
    /// alongside the value.
    #[instrument(level = "debug", skip(self), fields(query = %self.id, scope = %self.scope))]
    pub fn run_first_or_default(self) -> Result<FindOutcome<Option<E>>, AutomationError> {
        let search = Search::resolve(self.scope, &self.conditions)?;
        let value = self.locate_first(&search, self.retry.as_ref())?;
        debug!(found = value.is_some(), "first_or_default finished");
        Ok(self.finish_single(value))
    }

    #[instrument(level = "debug", skip(self), fields(query = %self.id, scope = %self.scope))]
    pub fn run_all(self) -> Result<FindOutcome<Vec<E>>, AutomationError> {
        let search = Search::resolve(self.scope, &self.conditions)?;
        let value = self.locate_all(&search)?;
        debug!(count = value.len(), "all finished");

        let query = self.info();
        self.notify(&query, FindResult::All(&value));
        Ok(FindOutcome { query, value })
    }

    #[instrument(level = "debug", skip(self), fields(query = %self.id, scope = %self.scope))]
    pub fn run_first(self) -> Result<FindOutcome<E>, AutomationError> {
        let search = Search::resolve(self.scope, &self.conditions)?;
        let mut value = self.locate_first(&search, self.retry.as_ref())?;

        // The polling loop may have given up on a stale miss; one direct look
        // decides against the current tree.
        if let Some(policy) = self.retry.filter(|_| value.is_none()) {
            debug!("retry budget exhausted, searching once more");
            value = match self.locate_first(&search, None) {
                Ok(found) => found,
                Err(e) if policy.ignore_errors => {
                    debug!(error = %e, "ignoring error from the final lookup");
                    None
                }
                Err(e) => return Err(e),
            };
        }

        let FindOutcome { query, value } = self.finish_single(value);
        match value {
            Some(element) => Ok(FindOutcome {
                query,
                value: element,
            }),
            None => Err(AutomationError::ElementNotFound(format!(
                "first() found no element. {query}"
            ))),
        }
    }

    /// The first match after navigation, or `None`.
    pub fn first_or_default(self) -> Result<Option<E>, AutomationError> {
        self.run_first_or_default().map(|outcome| outcome.value)
    }

    /// Every match after navigation; empty if nothing matched.
    pub fn all(self) -> Result<Vec<E>, AutomationError> {
        self.run_all().map(|outcome| outcome.value)
    }

    /// The first match after navigation, or an `ElementNotFound` error listing
    /// every modifier of the query.
    pub fn first(self) -> Result<E, AutomationError> {
        self.run_first().map(|outcome| outcome.value)
    }

    // Async facade: the blocking search runs on tokio's blocking pool.

    pub async fn first_async(self) -> Result<E, AutomationError> {
        run_blocking(move || self.first()).await
    }

    pub async fn first_or_default_async(self) -> Result<Option<E>, AutomationError> {
        run_blocking(move || self.first_or_default()).await
    }

    pub async fn all_async(self) -> Result<Vec<E>, AutomationError> {
        run_blocking(move || self.all()).await
    }
}

async fn run_blocking<T, F>(task: F) -> Result<T, AutomationError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, AutomationError> + Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|e| AutomationError::Internal(format!("Task join error: {e}")))?
}

impl<E: Element> fmt::Display for FindBuilder<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.info())
    }
}

impl<E: Element> fmt::Debug for FindBuilder<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FindBuilder")
            .field("id", &self.id)
            .field("element", &self.element)
            .field("scope", &self.scope)
            .field("conditions", &self.conditions)
            .field("actions", &self.actions)
            .field("retry", &self.retry)
            .field("observers", &self.observers.len())
            .finish()
    }
}
