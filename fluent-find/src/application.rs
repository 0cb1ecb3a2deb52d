//! Waiting for an application's main window to settle.

use std::time::Duration;

use tracing::{debug, instrument};

use crate::clock::{Clock, SystemClock};
use crate::element::Element;
use crate::errors::AutomationError;
use crate::find::FindBuilder;
use crate::retry::{poll_until_found_with, wait_until_with, RetryPolicy};

/// A launched application process.
pub trait Application {
    type Element: Element;

    /// The current main window, `None` while it has not been created yet.
    fn main_window(&self) -> Result<Option<Self::Element>, AutomationError>;

    fn has_exited(&self) -> Result<bool, AutomationError>;

    /// Asks the application to close without waiting for it to exit.
    fn close(&self) -> Result<(), AutomationError>;

    /// Waits until the main window exists and `configure`'d query against it
    /// matches, then returns the main window.
    fn wait_main_window<F>(
        &self,
        configure: F,
        policy: impl Into<RetryPolicy>,
    ) -> Result<Self::Element, AutomationError>
    where
        F: FnMut(FindBuilder<Self::Element>) -> FindBuilder<Self::Element>,
    {
        wait_root_element(|| self.main_window(), configure, &policy.into())
    }

    /// Closes the application and waits for the process to exit. Returns
    /// whether it exited within `timeout`.
    fn close_and_wait(&self, timeout: Duration) -> Result<bool, AutomationError> {
        self.close()?;
        let policy = RetryPolicy::with_timeout(timeout).ignore_errors(true);
        wait_until_with(|| self.has_exited(), &policy, &SystemClock)
    }
}

/// See [`wait_root_element_with`].
pub fn wait_root_element<E, G, F>(
    get_root: G,
    configure: F,
    policy: &RetryPolicy,
) -> Result<E, AutomationError>
where
    E: Element,
    G: FnMut() -> Result<Option<E>, AutomationError>,
    F: FnMut(FindBuilder<E>) -> FindBuilder<E>,
{
    wait_root_element_with(get_root, configure, policy, &SystemClock)
}

/// Polls until a root element exists and the query built by `configure`
/// finds something under it, then returns the root.
///
/// The root is kept between ticks and only re-acquired through `get_root`
/// once it is no longer alive or the query against it failed. When the
/// timeout passes without a root, `RootNotFound` is returned; when a root
/// exists but the query never matched, the query is run once more directly
/// so that its `ElementNotFound` error (with the modifier list) reaches the
/// caller.
#[instrument(level = "debug", skip_all, fields(policy = %policy))]
pub fn wait_root_element_with<E, G, F>(
    mut get_root: G,
    mut configure: F,
    policy: &RetryPolicy,
    clock: &dyn Clock,
) -> Result<E, AutomationError>
where
    E: Element,
    G: FnMut() -> Result<Option<E>, AutomationError>,
    F: FnMut(FindBuilder<E>) -> FindBuilder<E>,
{
    let mut root: Option<E> = None;
    // Set when the query against the cached root failed; the handle may be
    // dangling even if the provider cannot tell.
    let mut stale = false;

    let matched = poll_until_found_with(
        || {
            if stale || !root.as_ref().is_some_and(|r| r.is_alive()) {
                if root.is_some() {
                    debug!("root element went stale, acquiring it again");
                }
                root = get_root()?;
                stale = false;
            }
            match root.as_ref() {
                Some(current) => {
                    let result = configure(current.build_find()).first_or_default();
                    stale = result.is_err();
                    result
                }
                None => Ok(None),
            }
        },
        policy,
        clock,
    )?;

    let Some(root) = root else {
        return Err(AutomationError::RootNotFound(format!(
            "no root element appeared ({policy})"
        )));
    };

    if matched.is_none() {
        debug!("root element present but its query never matched, checking once more");
        configure(root.build_find()).first()?;
    }

    Ok(root)
}
