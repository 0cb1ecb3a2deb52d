//! Fluent, retryable queries over accessibility trees
//!
//! GUI tests spend most of their code locating controls in a window that is
//! still being built, animated or redrawn. This crate turns "find this control
//! in this window" into a chainable query that can poll until the control
//! shows up, and reports exactly what it was looking for when it does not.
//!
//! Providers plug in through the [`Element`] and [`Application`] traits;
//! [`MemoryElement`] and [`MemoryApplication`] are an in-memory provider for
//! tests.

pub mod application;
pub mod clock;
pub mod condition;
pub mod element;
pub mod errors;
pub mod find;
pub mod memory;
pub mod observer;
pub mod retry;
#[cfg(test)]
mod tests;

pub use application::{wait_root_element, wait_root_element_with, Application};
pub use clock::{Clock, ManualClock, SystemClock};
pub use condition::{Condition, ConditionFactory, ControlType, PropertyId, PropertyValue};
pub use element::{Element, TreeScope};
pub use errors::AutomationError;
pub use find::{FindBuilder, Navigation, Scope, Search};
pub use memory::{ElementAttributes, ElementSnapshot, MemoryApplication, MemoryElement};
pub use observer::{FindEvent, FindObserver, FindOutcome, FindResult, QueryInfo};
pub use retry::{
    poll_until_found, poll_until_found_with, wait_until, wait_until_with, RetryPolicy,
    DEFAULT_RETRY_INTERVAL,
};
