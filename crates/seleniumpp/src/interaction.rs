//! Guarded element interaction.
//!
//! Every mutating action first checks that its handle is attached, displayed
//! and enabled, and fails without touching the element otherwise. Actions on
//! handles resolved inside a frame re-enter that frame for their duration.
//!
//! | action    | retried | on failure            |
//! |-----------|---------|-----------------------|
//! | `fill`    | never   | surfaced              |
//! | `select`  | never   | surfaced              |
//! | `click`   | policy  | last failure surfaced |
//! | `hover`   | never   | logged, swallowed     |

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::driver::{Driver, ElementHandle};
use crate::frame::FrameGuard;
use crate::result::{ErrorKind, SeleniumError, SeleniumResult};

/// Default number of click attempts
pub const DEFAULT_CLICK_ATTEMPTS: u32 = 3;

/// Default pause between click attempts (100ms)
pub const DEFAULT_RETRY_DELAY_MS: u64 = 100;

// =============================================================================
// RETRY POLICY
// =============================================================================

/// How many times an action is attempted and which failures earn another try
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts, including the first (at least 1)
    pub attempts: u32,
    /// Error kinds swallowed on every attempt but the last
    pub retryable: Vec<ErrorKind>,
    /// Pause between attempts in milliseconds
    pub delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: DEFAULT_CLICK_ATTEMPTS,
            retryable: vec![ErrorKind::StaleElement, ErrorKind::ElementNotInteractable],
            delay_ms: DEFAULT_RETRY_DELAY_MS,
        }
    }
}

impl RetryPolicy {
    /// Default retryable kinds with `attempts` attempts
    #[must_use]
    pub fn new(attempts: u32) -> Self {
        Self::default().with_attempts(attempts)
    }

    /// A single attempt, nothing retried
    #[must_use]
    pub fn no_retry() -> Self {
        Self {
            attempts: 1,
            retryable: Vec::new(),
            delay_ms: 0,
        }
    }

    /// Set the attempt count (clamped to at least 1)
    #[must_use]
    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts.max(1);
        self
    }

    /// Set the pause between attempts
    #[must_use]
    pub fn with_delay_ms(mut self, delay_ms: u64) -> Self {
        self.delay_ms = delay_ms;
        self
    }

    /// Replace the retryable kinds
    #[must_use]
    pub fn with_retryable(mut self, kinds: impl IntoIterator<Item = ErrorKind>) -> Self {
        self.retryable = kinds.into_iter().collect();
        self
    }

    /// Whether `err` is of a retryable kind
    #[must_use]
    pub fn is_retryable(&self, err: &SeleniumError) -> bool {
        self.retryable.contains(&err.kind())
    }

    /// Whether a failure on attempt `attempt` (1-based) should be retried
    #[must_use]
    pub fn should_retry(&self, err: &SeleniumError, attempt: u32) -> bool {
        attempt < self.attempts.max(1) && self.is_retryable(err)
    }

    /// Pause between attempts
    #[must_use]
    pub const fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

// =============================================================================
// TARGET
// =============================================================================

/// Re-resolving callback used by [`Target::Relocate`]
pub type Relocator<'a, D> = Box<dyn FnMut(&mut D) -> SeleniumResult<ElementHandle> + 'a>;

/// What a retried action acts on
pub enum Target<'a, D: ?Sized> {
    /// A fixed handle; a stale handle stays stale across attempts
    Handle(ElementHandle),
    /// Resolve a fresh handle before every attempt
    Relocate(Relocator<'a, D>),
}

impl<'a, D: ?Sized> Target<'a, D> {
    /// Target a fixed handle
    #[must_use]
    pub const fn handle(handle: ElementHandle) -> Self {
        Self::Handle(handle)
    }

    /// Target whatever `relocate` resolves on each attempt
    pub fn relocate(relocate: impl FnMut(&mut D) -> SeleniumResult<ElementHandle> + 'a) -> Self {
        Self::Relocate(Box::new(relocate))
    }

    fn current(&mut self, driver: &mut D) -> SeleniumResult<ElementHandle> {
        match self {
            Self::Handle(handle) => Ok(handle.clone()),
            Self::Relocate(relocate) => relocate(driver),
        }
    }
}

impl<D: ?Sized> From<ElementHandle> for Target<'_, D> {
    fn from(handle: ElementHandle) -> Self {
        Self::Handle(handle)
    }
}

impl<D: ?Sized> fmt::Debug for Target<'_, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Handle(handle) => f.debug_tuple("Handle").field(handle).finish(),
            Self::Relocate(_) => f.write_str("Relocate(..)"),
        }
    }
}

// =============================================================================
// GUARD
// =============================================================================

/// Performs actions on resolved handles
#[derive(Debug, Clone, Default)]
pub struct InteractionGuard {
    policy: RetryPolicy,
}

impl InteractionGuard {
    /// Create a guard whose clicks follow `policy`
    #[must_use]
    pub const fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    /// The click retry policy
    #[must_use]
    pub const fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Fail unless `element` is attached, displayed and enabled
    pub fn check_interactable<D: Driver + ?Sized>(
        driver: &mut D,
        element: &ElementHandle,
    ) -> SeleniumResult<()> {
        check_visible(driver, element)?;
        if !driver.is_enabled(element)? {
            return Err(SeleniumError::not_interactable(&element.id, "not enabled"));
        }
        Ok(())
    }

    /// Clear the field, then type `text`. Never retried.
    pub fn fill<D: Driver + ?Sized>(
        &self,
        driver: &mut D,
        element: &ElementHandle,
        text: &str,
    ) -> SeleniumResult<()> {
        in_frame(driver, element, |driver| {
            Self::check_interactable(driver, element)?;
            driver.clear(element)?;
            driver.type_text(element, text)
        })?;
        info!(element = %element, chars = text.chars().count(), "filled field");
        Ok(())
    }

    /// Select the option whose visible text is `text`
    pub fn select_by_text<D: Driver + ?Sized>(
        &self,
        driver: &mut D,
        element: &ElementHandle,
        text: &str,
    ) -> SeleniumResult<()> {
        in_frame(driver, element, |driver| {
            Self::check_interactable(driver, element)?;
            driver.select_by_visible_text(element, text)
        })?;
        info!(element = %element, option = text, "selected option by text");
        Ok(())
    }

    /// Select the option whose `value` is `value`
    pub fn select_by_value<D: Driver + ?Sized>(
        &self,
        driver: &mut D,
        element: &ElementHandle,
        value: &str,
    ) -> SeleniumResult<()> {
        in_frame(driver, element, |driver| {
            Self::check_interactable(driver, element)?;
            driver.select_by_value(element, value)
        })?;
        info!(element = %element, value, "selected option by value");
        Ok(())
    }

    /// Click under the guard's retry policy
    pub fn click<'a, D: Driver + ?Sized>(
        &self,
        driver: &mut D,
        target: impl Into<Target<'a, D>>,
    ) -> SeleniumResult<()> {
        self.click_with_policy(driver, target.into(), &self.policy)
    }

    /// Click with `attempts` attempts and the guard's retryable kinds
    pub fn click_with_retries<'a, D: Driver + ?Sized>(
        &self,
        driver: &mut D,
        target: impl Into<Target<'a, D>>,
        attempts: u32,
    ) -> SeleniumResult<()> {
        let policy = self.policy.clone().with_attempts(attempts);
        self.click_with_policy(driver, target.into(), &policy)
    }

    fn click_with_policy<D: Driver + ?Sized>(
        &self,
        driver: &mut D,
        mut target: Target<'_, D>,
        policy: &RetryPolicy,
    ) -> SeleniumResult<()> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let outcome = target.current(driver).and_then(|element| {
                in_frame(driver, &element, |driver| {
                    Self::check_interactable(driver, &element)?;
                    driver.click(&element)
                })
                .map(|()| element)
            });
            match outcome {
                Ok(element) => {
                    debug!(element = %element, attempt, "clicked");
                    return Ok(());
                }
                Err(err) if policy.should_retry(&err, attempt) => {
                    warn!(attempt, attempts = policy.attempts, error = %err, "click failed, retrying");
                    if !policy.delay().is_zero() {
                        std::thread::sleep(policy.delay());
                    }
                }
                Err(err) => {
                    debug!(attempt, error = %err, "click failed");
                    return Err(err);
                }
            }
        }
    }

    /// Move the pointer over `element`.
    ///
    /// Best-effort: failures are logged and reported as `false`, never raised.
    pub fn hover<D: Driver + ?Sized>(&self, driver: &mut D, element: &ElementHandle) -> bool {
        let outcome = in_frame(driver, element, |driver| {
            check_visible(driver, element)?;
            driver.hover(element)
        });
        match outcome {
            Ok(()) => {
                debug!(element = %element, "hovered");
                true
            }
            Err(err) => {
                warn!(element = %element, error = %err, "hover failed");
                false
            }
        }
    }
}

fn check_visible<D: Driver + ?Sized>(driver: &mut D, element: &ElementHandle) -> SeleniumResult<()> {
    if driver.is_stale(element)? {
        return Err(SeleniumError::stale(&element.id));
    }
    if !driver.is_displayed(element)? {
        return Err(SeleniumError::not_interactable(&element.id, "not displayed"));
    }
    Ok(())
}

/// Run `action` with the session switched into the element's frame
fn in_frame<D, T>(
    driver: &mut D,
    element: &ElementHandle,
    action: impl FnOnce(&mut D) -> SeleniumResult<T>,
) -> SeleniumResult<T>
where
    D: Driver + ?Sized,
{
    let mut scope = FrameGuard::enter(driver, &element.frame)?;
    action(&mut scope)
}
