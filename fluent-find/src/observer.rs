//! Observation of executed queries.
//!
//! Every terminal call on a [`FindBuilder`](crate::FindBuilder) reports
//! exactly once to its observers, and the `run_*` terminal variants hand the
//! same information back as a [`FindOutcome`].

use std::fmt;

use serde::Serialize;
use uuid::Uuid;

use crate::find::Scope;

/// Identity and diagnostic trail of one query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryInfo {
    pub id: Uuid,
    pub scope: Scope,
    /// One entry per configuration call, in call order.
    pub modifiers: Vec<String>,
}

impl fmt::Display for QueryInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.modifiers.is_empty() {
            return write!(f, "Query modifiers: (none)");
        }
        write!(f, "Query modifiers:")?;
        for (i, modifier) in self.modifiers.iter().enumerate() {
            write!(f, "\n{}. {}", i + 1, modifier)?;
        }
        Ok(())
    }
}

/// The final, post-navigation result of a terminal call.
#[derive(Debug)]
pub enum FindResult<'a, E> {
    Single(Option<&'a E>),
    All(&'a [E]),
}

#[derive(Debug)]
pub struct FindEvent<'a, E> {
    pub query: &'a QueryInfo,
    pub result: FindResult<'a, E>,
}

pub trait FindObserver<E>: Send + Sync {
    fn on_find(&self, event: &FindEvent<'_, E>);
}

impl<E, F> FindObserver<E> for F
where
    F: Fn(&FindEvent<'_, E>) + Send + Sync,
{
    fn on_find(&self, event: &FindEvent<'_, E>) {
        self(event)
    }
}

/// A terminal call's value together with the query that produced it.
#[derive(Debug, Clone)]
pub struct FindOutcome<T> {
    pub query: QueryInfo,
    pub value: T,
}
