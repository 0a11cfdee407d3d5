//! Element resolution with cross-frame fallback.
//!
//! ```text
//! resolve(locator, spec, scope)
//!   │
//!   ├─ wait in `scope` ───────────────────────────── match ──► Resolution
//!   │     │ Timeout
//!   │     ▼
//!   ├─ frame fallback enabled?  no ──────────────────────────► ElementNotFound
//!   │     │ yes
//!   │     ▼
//!   └─ for each iframe of `scope` (document order):
//!         enter frame ─► wait (frame timeout) ─► leave frame
//!           match ─► Resolution (handles carry the frame)
//!         exhausted ─────────────────────────────────────────► ElementNotFound
//! ```
//!
//! The cheap same-document search always runs first; frames are only
//! entered after it has timed out.

use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::debug;

use crate::driver::{Driver, ElementHandle};
use crate::frame::{FrameContext, FrameGuard};
use crate::locator::Locator;
use crate::result::{SeleniumError, SeleniumResult};
use crate::wait::{duration_ms, PredicateKind, WaitSpec, Waiter};

/// Default per-frame timeout during frame fallback (2 seconds)
pub const DEFAULT_FRAME_TIMEOUT_MS: u64 = 2_000;

/// Resolver behaviour switches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolverOptions {
    /// Search iframes after the scope itself times out
    pub frame_fallback: bool,
    /// Upper bound on the wait inside each frame
    pub frame_timeout_ms: u64,
    /// Fail single-element lookups that match more than one node
    pub strict: bool,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            frame_fallback: true,
            frame_timeout_ms: DEFAULT_FRAME_TIMEOUT_MS,
            strict: false,
        }
    }
}

impl ResolverOptions {
    /// Enable or disable frame fallback
    #[must_use]
    pub const fn with_frame_fallback(mut self, enabled: bool) -> Self {
        self.frame_fallback = enabled;
        self
    }

    /// Set the per-frame timeout
    #[must_use]
    pub const fn with_frame_timeout(mut self, timeout_ms: u64) -> Self {
        self.frame_timeout_ms = timeout_ms;
        self
    }

    /// Enable or disable strict mode
    #[must_use]
    pub const fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }
}

/// Outcome of a successful resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// First match of a single-element lookup
    One(ElementHandle),
    /// Every match, in document order (never empty)
    Many(Vec<ElementHandle>),
}

impl Resolution {
    /// First handle
    #[must_use]
    pub fn first(&self) -> Option<&ElementHandle> {
        match self {
            Self::One(handle) => Some(handle),
            Self::Many(handles) => handles.first(),
        }
    }

    /// Number of handles
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::One(_) => 1,
            Self::Many(handles) => handles.len(),
        }
    }

    /// Whether there are no handles
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All handles
    #[must_use]
    pub fn into_handles(self) -> Vec<ElementHandle> {
        match self {
            Self::One(handle) => vec![handle],
            Self::Many(handles) => handles,
        }
    }
}

/// Turns a locator plus wait spec into live handles
#[derive(Debug, Clone, Copy, Default)]
pub struct ElementResolver {
    options: ResolverOptions,
    waiter: Waiter,
}

impl ElementResolver {
    /// Create a resolver
    #[must_use]
    pub const fn new(options: ResolverOptions) -> Self {
        Self {
            options,
            waiter: Waiter::new(),
        }
    }

    /// Resolver options
    #[must_use]
    pub const fn options(&self) -> &ResolverOptions {
        &self.options
    }

    /// Resolve `locator` in `scope`, falling back to its frames.
    ///
    /// [`PredicateKind::AllPresent`] yields [`Resolution::Many`]; presence and
    /// clickability yield [`Resolution::One`] holding the first match.
    pub fn resolve<D: Driver + ?Sized>(
        &self,
        driver: &mut D,
        locator: &Locator,
        spec: &WaitSpec,
        scope: &FrameContext,
    ) -> SeleniumResult<Resolution> {
        spec.validate()?;
        if !spec.predicate.targets_elements() {
            return Err(SeleniumError::invalid_wait(format!(
                "cannot resolve elements with the {} predicate",
                spec.predicate
            )));
        }

        let start = Instant::now();
        let mut scopes_searched = 1;
        debug!(locator = %locator, scope = %scope, predicate = %spec.predicate, "resolving");
        match self.search(driver, locator, spec, scope) {
            Ok(found) => return self.shape(locator, spec.predicate, found),
            Err(SeleniumError::Timeout { .. }) => {}
            Err(err) => return Err(err),
        }

        if self.options.frame_fallback {
            let frames = {
                let mut guard = FrameGuard::enter(driver, scope)?;
                guard.enumerate_frames()?
            };
            let frame_spec = self.frame_spec(spec);
            debug!(locator = %locator, frames = frames.len(), "falling back to frames");
            for frame in frames {
                scopes_searched += 1;
                let frame_scope = scope.child(frame);
                match self.search(driver, locator, &frame_spec, &frame_scope) {
                    Ok(found) => return self.shape(locator, spec.predicate, found),
                    Err(err) if matches!(err, SeleniumError::Timeout { .. }) || err.is_transient() => {
                        debug!(scope = %frame_scope, error = %err, "no match in frame");
                    }
                    Err(err) => return Err(err),
                }
            }
        }

        Err(SeleniumError::ElementNotFound {
            locator: locator.to_string(),
            scopes_searched,
            elapsed_ms: duration_ms(start.elapsed()),
        })
    }

    /// First node matching `locator` (presence or clickability)
    pub fn resolve_one<D: Driver + ?Sized>(
        &self,
        driver: &mut D,
        locator: &Locator,
        spec: &WaitSpec,
        scope: &FrameContext,
    ) -> SeleniumResult<ElementHandle> {
        let spec = match spec.predicate {
            PredicateKind::AllPresent => spec.with_predicate(PredicateKind::PresenceOf),
            _ => *spec,
        };
        let resolution = self.resolve(driver, locator, &spec, scope)?;
        resolution
            .into_handles()
            .into_iter()
            .next()
            .ok_or_else(|| SeleniumError::ElementNotFound {
                locator: locator.to_string(),
                scopes_searched: 0,
                elapsed_ms: 0,
            })
    }

    /// Every node matching `locator`, in document order
    pub fn resolve_all<D: Driver + ?Sized>(
        &self,
        driver: &mut D,
        locator: &Locator,
        spec: &WaitSpec,
        scope: &FrameContext,
    ) -> SeleniumResult<Vec<ElementHandle>> {
        let spec = match spec.predicate {
            PredicateKind::PresenceOf => spec.with_predicate(PredicateKind::AllPresent),
            _ => *spec,
        };
        Ok(self.resolve(driver, locator, &spec, scope)?.into_handles())
    }

    /// Wait for `locator` inside `scope` and stamp the handles with it
    fn search<D: Driver + ?Sized>(
        &self,
        driver: &mut D,
        locator: &Locator,
        spec: &WaitSpec,
        scope: &FrameContext,
    ) -> SeleniumResult<Vec<ElementHandle>> {
        let mut guard = FrameGuard::enter(driver, scope)?;
        let found = self.waiter.until_located(&mut *guard, locator, spec, scope)?;
        Ok(found
            .into_value()
            .into_iter()
            .map(|handle| handle.in_frame(scope.clone()))
            .collect())
    }

    fn frame_spec(&self, spec: &WaitSpec) -> WaitSpec {
        let timeout_ms = spec.timeout_ms.min(self.options.frame_timeout_ms).max(1);
        spec.with_timeout(timeout_ms)
            .with_poll_interval(spec.poll_interval_ms.min(timeout_ms))
    }

    fn shape(
        &self,
        locator: &Locator,
        predicate: PredicateKind,
        mut found: Vec<ElementHandle>,
    ) -> SeleniumResult<Resolution> {
        if predicate == PredicateKind::AllPresent {
            return Ok(Resolution::Many(found));
        }
        if self.options.strict && found.len() > 1 {
            return Err(SeleniumError::AmbiguousMatch {
                locator: locator.to_string(),
                count: found.len(),
            });
        }
        if found.is_empty() {
            return Err(SeleniumError::ElementNotFound {
                locator: locator.to_string(),
                scopes_searched: 1,
                elapsed_ms: 0,
            });
        }
        Ok(Resolution::One(found.swap_remove(0)))
    }
}

#[cfg(all(test, feature = "mock"))]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::mock::{MockDriver, MockElement, MockPage, Mutation};
    use std::time::Duration;

    fn fast() -> WaitSpec {
        WaitSpec::default().with_timeout(60).with_poll_interval(10)
    }

    fn framed() -> MockDriver {
        MockDriver::new(
            MockPage::new()
                .with(MockElement::new("p").attr("id", "intro").text("Top"))
                .with(MockElement::new("iframe").attr("id", "ads").frame(MockPage::new()))
                .with(MockElement::new("iframe").attr("id", "checkout").frame(
                    MockPage::new()
                        .with(MockElement::new("button").attr("id", "pay").text("Pay now")),
                )),
        )
    }

    mod default_scope_tests {
        use super::*;

        #[test]
        fn test_resolves_in_default_content() {
            let mut driver = framed();
            let handle = ElementResolver::default()
                .resolve_one(
                    &mut driver,
                    &Locator::id("intro").unwrap(),
                    &fast(),
                    &FrameContext::default(),
                )
                .unwrap();
            assert!(handle.frame.is_default());
            assert!(!driver.was_called("enumerate_frames"));
        }

        #[test]
        fn test_first_match_in_document_order() {
            let mut driver = MockDriver::new(
                MockPage::new()
                    .with(MockElement::new("li").attr("id", "one"))
                    .with(MockElement::new("li").attr("id", "two")),
            );
            let handle = ElementResolver::default()
                .resolve_one(
                    &mut driver,
                    &Locator::tag_name("li").unwrap(),
                    &fast(),
                    &FrameContext::default(),
                )
                .unwrap();
            assert_eq!(driver.dom_id_of(&handle).as_deref(), Some("one"));
        }

        #[test]
        fn test_strict_mode_rejects_ambiguity() {
            let mut driver = MockDriver::new(
                MockPage::new()
                    .with(MockElement::new("li"))
                    .with(MockElement::new("li")),
            );
            let resolver = ElementResolver::new(ResolverOptions::default().with_strict(true));
            let err = resolver
                .resolve_one(
                    &mut driver,
                    &Locator::tag_name("li").unwrap(),
                    &fast(),
                    &FrameContext::default(),
                )
                .unwrap_err();
            assert!(matches!(err, SeleniumError::AmbiguousMatch { count: 2, .. }));
        }

        #[test]
        fn test_resolve_all() {
            let mut driver = MockDriver::new(
                MockPage::new()
                    .with(MockElement::new("li"))
                    .with(MockElement::new("li"))
                    .with(MockElement::new("li")),
            );
            let all = ElementResolver::default()
                .resolve_all(
                    &mut driver,
                    &Locator::tag_name("li").unwrap(),
                    &fast(),
                    &FrameContext::default(),
                )
                .unwrap();
            assert_eq!(all.len(), 3);
        }

        #[test]
        fn test_invalid_wait_rejected_before_search() {
            let mut driver = framed();
            let err = ElementResolver::default()
                .resolve(
                    &mut driver,
                    &Locator::id("intro").unwrap(),
                    &fast().with_timeout(0),
                    &FrameContext::default(),
                )
                .unwrap_err();
            assert!(matches!(err, SeleniumError::InvalidWait { .. }));
            assert!(!driver.was_called("find_all"));
        }

        #[test]
        fn test_terminal_driver_error_not_masked() {
            let mut driver = framed();
            driver.fail_always("find_all", SeleniumError::driver("session lost"));
            let err = ElementResolver::default()
                .resolve_one(
                    &mut driver,
                    &Locator::id("intro").unwrap(),
                    &fast(),
                    &FrameContext::default(),
                )
                .unwrap_err();
            assert!(matches!(err, SeleniumError::Driver { .. }));
        }
    }

    mod frame_fallback_tests {
        use super::*;

        #[test]
        fn test_fallback_finds_match_in_frame() {
            let mut driver = framed();
            let handle = ElementResolver::default()
                .resolve_one(
                    &mut driver,
                    &Locator::id("pay").unwrap(),
                    &fast(),
                    &FrameContext::default(),
                )
                .unwrap();
            assert_eq!(handle.frame.depth(), 1);
            assert_eq!(driver.frame_depth(), 0);
            assert_eq!(driver.call_count("switch_to_frame"), 2);
        }

        #[test]
        fn test_fallback_disabled_reports_not_found() {
            let mut driver = framed();
            let resolver =
                ElementResolver::new(ResolverOptions::default().with_frame_fallback(false));
            let err = resolver
                .resolve_one(
                    &mut driver,
                    &Locator::id("pay").unwrap(),
                    &fast(),
                    &FrameContext::default(),
                )
                .unwrap_err();
            match err {
                SeleniumError::ElementNotFound {
                    scopes_searched, ..
                } => assert_eq!(scopes_searched, 1),
                other => panic!("expected not found, got {other:?}"),
            }
            assert!(!driver.was_called("switch_to_frame"));
        }

        #[test]
        fn test_exhausted_frames_count_scopes() {
            let mut driver = framed();
            let err = ElementResolver::default()
                .resolve_one(
                    &mut driver,
                    &Locator::id("nowhere").unwrap(),
                    &fast(),
                    &FrameContext::default(),
                )
                .unwrap_err();
            match err {
                SeleniumError::ElementNotFound {
                    scopes_searched, ..
                } => assert_eq!(scopes_searched, 3),
                other => panic!("expected not found, got {other:?}"),
            }
            assert_eq!(driver.frame_depth(), 0);
        }

        #[test]
        fn test_frame_timeout_bounds_each_frame() {
            let mut driver = framed();
            let resolver =
                ElementResolver::new(ResolverOptions::default().with_frame_timeout(20));
            let spec = WaitSpec::default().with_timeout(100).with_poll_interval(10);
            let start = Instant::now();
            let result = resolver.resolve_one(
                &mut driver,
                &Locator::id("nowhere").unwrap(),
                &spec,
                &FrameContext::default(),
            );
            assert!(result.is_err());
            assert!(start.elapsed() < Duration::from_millis(100 + 2 * 20 + 150));
        }

        #[test]
        fn test_element_appearing_late_in_default_content() {
            let mut driver = MockDriver::new(
                MockPage::new().with(MockElement::new("div").attr("id", "late").detached()),
            );
            driver.schedule(Duration::from_millis(20), Mutation::Attach("late".into()));
            let spec = WaitSpec::default().with_timeout(500).with_poll_interval(10);
            let handle = ElementResolver::default()
                .resolve_one(
                    &mut driver,
                    &Locator::id("late").unwrap(),
                    &spec,
                    &FrameContext::default(),
                )
                .unwrap();
            assert!(handle.frame.is_default());
        }
    }

    mod resolution_tests {
        use super::*;

        #[test]
        fn test_accessors() {
            let one = Resolution::One(ElementHandle::new("a", "p"));
            assert_eq!(one.len(), 1);
            assert!(!one.is_empty());
            let many = Resolution::Many(vec![
                ElementHandle::new("a", "p"),
                ElementHandle::new("b", "p"),
            ]);
            assert_eq!(many.first().map(|h| h.id.as_str()), Some("a"));
            assert_eq!(many.into_handles().len(), 2);
        }
    }
}
