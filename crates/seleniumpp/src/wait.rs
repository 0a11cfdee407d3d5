//! Polling waits.
//!
//! A wait is a three-state machine: it starts `Polling`, evaluates its probe
//! once per poll interval, and ends either `Satisfied` (the probe produced a
//! value) or `Failed` (the deadline passed, or the probe raised a terminal
//! error). Probes that raise a transient error ([`SeleniumError::is_transient`])
//! are treated as "not yet" and polled again.
//!
//! The sleep before each poll is clamped to the time left, so a wait never
//! blocks past `timeout + poll interval` and never probes after the deadline.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::driver::{Driver, ElementHandle};
use crate::frame::FrameContext;
use crate::locator::Locator;
use crate::result::{SeleniumError, SeleniumResult};

// =============================================================================
// CONSTANTS
// =============================================================================

/// Default timeout for wait operations (10 seconds)
pub const DEFAULT_WAIT_TIMEOUT_MS: u64 = 10_000;

/// Default polling interval (250ms)
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 250;

// =============================================================================
// PREDICATES
// =============================================================================

/// What a wait is waiting for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredicateKind {
    /// At least one matching node still attached to the document
    #[default]
    PresenceOf,
    /// A matching node that is attached, displayed and enabled
    ClickableOf,
    /// A non-empty set of matching nodes, all attached
    AllPresent,
    /// A text fragment somewhere in the page source
    PageContains,
}

impl PredicateKind {
    /// Whether this predicate is evaluated against a locator
    #[must_use]
    pub const fn targets_elements(&self) -> bool {
        !matches!(self, Self::PageContains)
    }
}

impl fmt::Display for PredicateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::PresenceOf => "presence",
            Self::ClickableOf => "clickable state",
            Self::AllPresent => "presence of all",
            Self::PageContains => "page text",
        };
        f.write_str(name)
    }
}

// =============================================================================
// WAIT SPEC
// =============================================================================

/// Timeout, cadence and predicate of one wait
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitSpec {
    /// Timeout in milliseconds
    pub timeout_ms: u64,
    /// Polling interval in milliseconds
    pub poll_interval_ms: u64,
    /// Predicate to poll
    pub predicate: PredicateKind,
}

impl Default for WaitSpec {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_WAIT_TIMEOUT_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            predicate: PredicateKind::PresenceOf,
        }
    }
}

impl WaitSpec {
    /// Default timing with the given predicate
    #[must_use]
    pub fn new(predicate: PredicateKind) -> Self {
        Self {
            predicate,
            ..Self::default()
        }
    }

    /// Set timeout in milliseconds
    #[must_use]
    pub const fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Set polling interval in milliseconds
    #[must_use]
    pub const fn with_poll_interval(mut self, poll_interval_ms: u64) -> Self {
        self.poll_interval_ms = poll_interval_ms;
        self
    }

    /// Set the predicate
    #[must_use]
    pub const fn with_predicate(mut self, predicate: PredicateKind) -> Self {
        self.predicate = predicate;
        self
    }

    /// Get timeout as Duration
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Get poll interval as Duration
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Check `0 < poll_interval_ms <= timeout_ms`
    pub fn validate(&self) -> SeleniumResult<()> {
        if self.timeout_ms == 0 {
            return Err(SeleniumError::invalid_wait("timeout must be greater than zero"));
        }
        if self.poll_interval_ms == 0 {
            return Err(SeleniumError::invalid_wait("poll interval must be greater than zero"));
        }
        if self.poll_interval_ms > self.timeout_ms {
            return Err(SeleniumError::invalid_wait(format!(
                "poll interval {}ms exceeds timeout {}ms",
                self.poll_interval_ms, self.timeout_ms
            )));
        }
        Ok(())
    }
}

// =============================================================================
// WAIT STATE & RESULT
// =============================================================================

/// State of a running wait
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WaitState {
    /// Deadline not reached, predicate not yet satisfied
    Polling,
    /// Predicate satisfied
    Satisfied,
    /// Deadline passed or terminal error
    Failed,
}

/// Value produced by a satisfied wait
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaitResult<T> {
    /// What the probe produced
    pub value: T,
    /// Time from the first poll to satisfaction
    pub elapsed: Duration,
    /// Number of probe evaluations
    pub polls: u32,
}

impl<T> WaitResult<T> {
    /// Discard the timing
    pub fn into_value(self) -> T {
        self.value
    }
}

// =============================================================================
// WAITER
// =============================================================================

/// Runs polling waits
#[derive(Debug, Clone, Copy, Default)]
pub struct Waiter;

impl Waiter {
    /// Create a waiter
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Poll `probe` until it yields `Some`, fails terminally, or `spec` times out.
    ///
    /// `target` and `scope` only feed diagnostics.
    pub fn poll<T, F>(
        &self,
        spec: &WaitSpec,
        target: &str,
        scope: &FrameContext,
        mut probe: F,
    ) -> SeleniumResult<WaitResult<T>>
    where
        F: FnMut() -> SeleniumResult<Option<T>>,
    {
        spec.validate()?;
        let timeout = spec.timeout();
        let poll_interval = spec.poll_interval();
        let start = Instant::now();
        let mut polls = 0_u32;
        let mut state = WaitState::Polling;
        let mut satisfied = None;

        while state == WaitState::Polling {
            polls += 1;
            match probe() {
                Ok(Some(value)) => {
                    satisfied = Some(value);
                    state = WaitState::Satisfied;
                    continue;
                }
                Ok(None) => {}
                Err(err) if err.is_transient() => {
                    debug!(
                        wait_target = target,
                        poll = polls,
                        error = %err,
                        "transient failure, polling again"
                    );
                }
                Err(err) => {
                    debug!(wait_target = target, poll = polls, error = %err, "wait failed");
                    return Err(err);
                }
            }

            let elapsed = start.elapsed();
            if elapsed >= timeout {
                state = WaitState::Failed;
            } else {
                std::thread::sleep(poll_interval.min(timeout - elapsed));
            }
        }

        let elapsed = start.elapsed();
        match satisfied {
            Some(value) => {
                debug!(
                    wait_target = target,
                    predicate = %spec.predicate,
                    polls,
                    elapsed_ms = duration_ms(elapsed),
                    "wait satisfied"
                );
                Ok(WaitResult {
                    value,
                    elapsed,
                    polls,
                })
            }
            None => {
                debug!(wait_target = target, predicate = %spec.predicate, polls, "wait timed out");
                Err(SeleniumError::Timeout {
                    target: target.to_string(),
                    predicate: spec.predicate,
                    scope: scope.to_string(),
                    timeout_ms: spec.timeout_ms,
                    elapsed_ms: duration_ms(elapsed),
                })
            }
        }
    }

    /// Wait until `locator` satisfies an element predicate in the current scope.
    ///
    /// Returns every qualifying node in document order: the attached ones for
    /// [`PredicateKind::PresenceOf`], the interactable ones for
    /// [`PredicateKind::ClickableOf`], and the full match set for
    /// [`PredicateKind::AllPresent`].
    pub fn until_located<D: Driver + ?Sized>(
        &self,
        driver: &mut D,
        locator: &Locator,
        spec: &WaitSpec,
        scope: &FrameContext,
    ) -> SeleniumResult<WaitResult<Vec<ElementHandle>>> {
        if !spec.predicate.targets_elements() {
            return Err(SeleniumError::invalid_wait(format!(
                "{} predicate cannot locate elements",
                spec.predicate
            )));
        }
        let target = locator.to_string();
        self.poll(spec, &target, scope, || {
            probe_elements(driver, locator, spec.predicate)
        })
    }

    /// Wait until `text` appears in the page source
    pub fn until_page_contains<D: Driver + ?Sized>(
        &self,
        driver: &mut D,
        text: &str,
        spec: &WaitSpec,
        scope: &FrameContext,
    ) -> SeleniumResult<WaitResult<()>> {
        if text.is_empty() {
            return Err(SeleniumError::invalid_wait("empty page text"));
        }
        let spec = spec.with_predicate(PredicateKind::PageContains);
        self.poll(&spec, text, scope, || {
            Ok(driver.page_source()?.contains(text).then_some(()))
        })
    }
}

/// One evaluation of an element predicate
fn probe_elements<D: Driver + ?Sized>(
    driver: &mut D,
    locator: &Locator,
    predicate: PredicateKind,
) -> SeleniumResult<Option<Vec<ElementHandle>>> {
    let found = driver.find_all(locator)?;
    if found.is_empty() {
        return Ok(None);
    }

    let mut qualifying = Vec::with_capacity(found.len());
    for handle in found {
        if driver.is_stale(&handle)? {
            if predicate == PredicateKind::AllPresent {
                return Ok(None);
            }
            continue;
        }
        if predicate == PredicateKind::ClickableOf
            && !(driver.is_displayed(&handle)? && driver.is_enabled(&handle)?)
        {
            continue;
        }
        qualifying.push(handle);
    }
    Ok((!qualifying.is_empty()).then_some(qualifying))
}

pub(crate) fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    fn fast(timeout_ms: u64) -> WaitSpec {
        WaitSpec::default()
            .with_timeout(timeout_ms)
            .with_poll_interval(10)
    }

    mod predicate_tests {
        use super::*;

        #[test]
        fn test_display() {
            assert_eq!(PredicateKind::PresenceOf.to_string(), "presence");
            assert_eq!(PredicateKind::ClickableOf.to_string(), "clickable state");
        }

        #[test]
        fn test_targets_elements() {
            assert!(PredicateKind::AllPresent.targets_elements());
            assert!(!PredicateKind::PageContains.targets_elements());
        }
    }

    mod wait_spec_tests {
        use super::*;

        #[test]
        fn test_defaults() {
            let spec = WaitSpec::default();
            assert_eq!(spec.timeout_ms, DEFAULT_WAIT_TIMEOUT_MS);
            assert_eq!(spec.poll_interval_ms, DEFAULT_POLL_INTERVAL_MS);
            assert_eq!(spec.predicate, PredicateKind::PresenceOf);
        }

        #[test]
        fn test_builders() {
            let spec = WaitSpec::new(PredicateKind::ClickableOf)
                .with_timeout(2_000)
                .with_poll_interval(100);
            assert_eq!(spec.timeout(), Duration::from_secs(2));
            assert_eq!(spec.poll_interval(), Duration::from_millis(100));
            assert_eq!(spec.predicate, PredicateKind::ClickableOf);
        }

        #[test]
        fn test_zero_timeout_rejected() {
            let err = WaitSpec::default().with_timeout(0).validate().unwrap_err();
            assert!(matches!(err, SeleniumError::InvalidWait { .. }));
        }

        #[test]
        fn test_poll_longer_than_timeout_rejected() {
            let spec = WaitSpec::default().with_timeout(100).with_poll_interval(200);
            assert!(spec.validate().is_err());
            assert!(spec.with_poll_interval(100).validate().is_ok());
        }

        #[test]
        fn test_zero_poll_interval_rejected() {
            let spec = WaitSpec::default().with_timeout(50).with_poll_interval(0);
            let err = spec.validate().unwrap_err();
            assert!(matches!(err, SeleniumError::InvalidWait { .. }));
            assert!(spec.with_poll_interval(1).validate().is_ok());
        }

        #[test]
        fn test_zero_poll_interval_never_polls() {
            let mut calls = 0;
            let spec = WaitSpec::default().with_timeout(50).with_poll_interval(0);
            let err = Waiter::new()
                .poll::<(), _>(&spec, "t", &FrameContext::default(), || {
                    calls += 1;
                    Ok(None)
                })
                .unwrap_err();
            assert!(matches!(err, SeleniumError::InvalidWait { .. }));
            assert_eq!(calls, 0);
        }
    }

    mod poll_tests {
        use super::*;

        #[test]
        fn test_immediate_success() {
            let result = Waiter::new()
                .poll(&fast(500), "t", &FrameContext::default(), || Ok(Some(7)))
                .unwrap();
            assert_eq!(result.value, 7);
            assert_eq!(result.polls, 1);
        }

        #[test]
        fn test_succeeds_after_some_polls() {
            let mut calls = 0;
            let result = Waiter::new()
                .poll(&fast(1_000), "t", &FrameContext::default(), || {
                    calls += 1;
                    Ok((calls >= 3).then_some(calls))
                })
                .unwrap();
            assert_eq!(result.into_value(), 3);
        }

        #[test]
        fn test_timeout_carries_context() {
            let err = Waiter::new()
                .poll::<(), _>(&fast(60), "id=missing", &FrameContext::default(), || {
                    Ok(None)
                })
                .unwrap_err();
            match err {
                SeleniumError::Timeout {
                    target,
                    predicate,
                    scope,
                    timeout_ms,
                    elapsed_ms,
                } => {
                    assert_eq!(target, "id=missing");
                    assert_eq!(predicate, PredicateKind::PresenceOf);
                    assert_eq!(scope, "default content");
                    assert_eq!(timeout_ms, 60);
                    assert!(elapsed_ms >= 60);
                }
                other => panic!("expected timeout, got {other:?}"),
            }
        }

        #[test]
        fn test_never_blocks_past_timeout_plus_poll() {
            let spec = WaitSpec::default().with_timeout(120).with_poll_interval(50);
            let start = Instant::now();
            let result =
                Waiter::new().poll::<(), _>(&spec, "t", &FrameContext::default(), || Ok(None));
            let elapsed = start.elapsed();
            assert!(result.is_err());
            assert!(elapsed >= Duration::from_millis(120));
            assert!(elapsed < Duration::from_millis(120 + 50 + 100));
        }

        #[test]
        fn test_transient_errors_keep_polling() {
            let mut calls = 0;
            let result = Waiter::new().poll(&fast(1_000), "t", &FrameContext::default(), || {
                calls += 1;
                if calls < 3 {
                    Err(SeleniumError::stale("node-1"))
                } else {
                    Ok(Some(()))
                }
            });
            assert!(result.is_ok());
            assert_eq!(calls, 3);
        }

        #[test]
        fn test_terminal_error_stops_immediately() {
            let mut calls = 0;
            let err = Waiter::new()
                .poll::<(), _>(&fast(1_000), "t", &FrameContext::default(), || {
                    calls += 1;
                    Err(SeleniumError::driver("session closed"))
                })
                .unwrap_err();
            assert!(matches!(err, SeleniumError::Driver { .. }));
            assert_eq!(calls, 1);
        }

        #[test]
        fn test_invalid_spec_never_probes() {
            let mut called = false;
            let result = Waiter::new().poll::<(), _>(
                &WaitSpec::default().with_timeout(0),
                "t",
                &FrameContext::default(),
                || {
                    called = true;
                    Ok(None)
                },
            );
            assert!(result.is_err());
            assert!(!called);
        }

        #[test]
        fn test_never_succeeds_before_predicate_is_true() {
            let flag = Arc::new(AtomicBool::new(false));
            let setter = Arc::clone(&flag);
            let start = Instant::now();
            let handle = std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(80));
                setter.store(true, Ordering::SeqCst);
            });
            let result = Waiter::new()
                .poll(&fast(2_000), "t", &FrameContext::default(), || {
                    Ok(flag.load(Ordering::SeqCst).then(Instant::now))
                })
                .unwrap();
            handle.join().unwrap();
            assert!(result.value.duration_since(start) >= Duration::from_millis(80));
        }
    }

    #[cfg(feature = "mock")]
    mod element_wait_tests {
        use super::*;
        use crate::mock::{MockDriver, MockElement, MockPage, Mutation};

        #[test]
        fn test_presence_returns_attached_nodes_in_order() {
            let mut driver = MockDriver::new(
                MockPage::new()
                    .with(MockElement::new("li").text("a"))
                    .with(MockElement::new("li").text("b")),
            );
            let locator = Locator::tag_name("li").unwrap();
            let found = Waiter::new()
                .until_located(&mut driver, &locator, &fast(200), &FrameContext::default())
                .unwrap()
                .into_value();
            assert_eq!(found.len(), 2);
        }

        #[test]
        fn test_clickable_skips_hidden_and_disabled() {
            let mut driver = MockDriver::new(
                MockPage::new()
                    .with(MockElement::new("button").attr("id", "a").hidden())
                    .with(MockElement::new("button").attr("id", "b").disabled())
                    .with(MockElement::new("button").attr("id", "c")),
            );
            let locator = Locator::tag_name("button").unwrap();
            let spec = fast(200).with_predicate(PredicateKind::ClickableOf);
            let found = Waiter::new()
                .until_located(&mut driver, &locator, &spec, &FrameContext::default())
                .unwrap()
                .into_value();
            assert_eq!(found.len(), 1);
            assert_eq!(driver.dom_id_of(&found[0]).as_deref(), Some("c"));
        }

        #[test]
        fn test_clickable_waits_for_enable() {
            let mut driver = MockDriver::new(
                MockPage::new().with(MockElement::new("button").attr("id", "go").disabled()),
            );
            driver.schedule(Duration::from_millis(50), Mutation::Enable("go".into()));
            let locator = Locator::id("go").unwrap();
            let spec = fast(1_000).with_predicate(PredicateKind::ClickableOf);
            let result = Waiter::new()
                .until_located(&mut driver, &locator, &spec, &FrameContext::default())
                .unwrap();
            assert!(result.elapsed >= Duration::from_millis(50));
            assert!(result.polls > 1);
        }

        #[test]
        fn test_presence_waits_for_attach() {
            let mut driver = MockDriver::new(
                MockPage::new().with(MockElement::new("div").attr("id", "late").detached()),
            );
            driver.schedule(Duration::from_millis(40), Mutation::Attach("late".into()));
            let locator = Locator::id("late").unwrap();
            let result =
                Waiter::new().until_located(&mut driver, &locator, &fast(1_000), &FrameContext::default());
            assert!(result.is_ok());
        }

        #[test]
        fn test_page_contains() {
            let mut driver =
                MockDriver::new(MockPage::new().with(MockElement::new("h1").text("Welcome back")));
            let ok = Waiter::new().until_page_contains(
                &mut driver,
                "Welcome",
                &fast(200),
                &FrameContext::default(),
            );
            assert!(ok.is_ok());
            let err = Waiter::new()
                .until_page_contains(&mut driver, "Goodbye", &fast(50), &FrameContext::default())
                .unwrap_err();
            match err {
                SeleniumError::Timeout { predicate, .. } => {
                    assert_eq!(predicate, PredicateKind::PageContains);
                }
                other => panic!("expected timeout, got {other:?}"),
            }
        }

        #[test]
        fn test_page_contains_predicate_rejected_for_locators() {
            let mut driver = MockDriver::new(MockPage::new());
            let spec = fast(50).with_predicate(PredicateKind::PageContains);
            let err = Waiter::new()
                .until_located(
                    &mut driver,
                    &Locator::id("x").unwrap(),
                    &spec,
                    &FrameContext::default(),
                )
                .unwrap_err();
            assert!(matches!(err, SeleniumError::InvalidWait { .. }));
        }
    }
}
