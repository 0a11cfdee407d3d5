//! Seleniumpp: retry-safe element resolution for browser automation
//!
//! Seleniumpp turns loose, human-level descriptions of page elements ("the
//! button labelled Submit", "the input whose name contains email") into live
//! element handles, and acts on them without tripping over the usual
//! browser-automation races: elements that are not there yet, are hidden, get
//! replaced by a re-render, or live inside an iframe.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                         SELENIUMPP                                │
//! ├───────────────────────────────────────────────────────────────────┤
//! │                                                                   │
//! │   ┌────────────┐   ┌────────────┐   ┌────────────┐   ┌─────────┐  │
//! │   │  xpath /   │   │  resolver  │   │ interaction│   │ Driver  │  │
//! │   │  locator   │──►│ wait+frames│──►│   guard    │──►│ (trait) │  │
//! │   └────────────┘   └────────────┘   └────────────┘   └─────────┘  │
//! │         ▲                 ▲                ▲                      │
//! │         └──────────── Session + EngineConfig ────────────┘        │
//! └───────────────────────────────────────────────────────────────────┘
//! ```
//!
//! - [`xpath`] builds locators from attributes, text and labels.
//! - [`Waiter`] polls a predicate until it holds or the wait times out.
//! - [`ElementResolver`] searches the current scope, then each iframe.
//! - [`InteractionGuard`] checks preconditions and retries clicks.
//! - [`Session`] wires all of it to one [`Driver`] and an [`EngineConfig`].
//!
//! The `mock` feature (on by default) adds an in-memory [`mock::MockDriver`].

#![warn(missing_docs)]
#![cfg_attr(test, allow(clippy::large_stack_arrays, clippy::large_stack_frames))]

/// Engine configuration loaded from YAML or JSON
pub mod config;

/// The browser-session trait and element handles
pub mod driver;

/// Frame scopes and scoped frame switching
pub mod frame;

/// Guarded element actions and click retries
pub mod interaction;

/// Locator strategies and text match modes
pub mod locator;

/// Subscriber setup for the engine's `tracing` events
pub mod logging;

/// Element resolution with frame fallback
pub mod resolver;

/// Error types
pub mod result;

/// Script-level lookup and form helpers
pub mod session;

/// Polling waits
pub mod wait;

/// XPath builders
pub mod xpath;

/// In-memory driver for tests and demos
#[cfg(feature = "mock")]
pub mod mock;

pub use config::EngineConfig;
pub use driver::{Driver, ElementHandle};
pub use frame::{FrameContext, FrameGuard};
pub use interaction::{InteractionGuard, RetryPolicy, Target};
pub use locator::{Locator, LocatorStrategy, MatchMode, TextMatch};
pub use resolver::{ElementResolver, Resolution, ResolverOptions};
pub use result::{ErrorKind, SeleniumError, SeleniumResult};
pub use session::{LookupOptions, Session};
pub use wait::{PredicateKind, WaitResult, WaitSpec, Waiter};
pub use xpath::ButtonUnion;

/// Prelude for convenient imports
pub mod prelude {
    pub use super::config::*;
    pub use super::driver::*;
    pub use super::frame::*;
    pub use super::interaction::*;
    pub use super::locator::*;
    pub use super::resolver::*;
    pub use super::result::*;
    pub use super::session::*;
    pub use super::wait::*;
    pub use super::xpath::{
        any_text, build_xpath, button_label, clickable_text, text_or_attribute, ButtonUnion,
    };
    #[cfg(feature = "mock")]
    pub use super::mock::*;
}

#[cfg(all(test, feature = "mock"))]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::prelude::*;

    #[test]
    fn test_prelude_covers_a_script() {
        let page = MockPage::new().with(MockElement::new("button").attr("id", "ok").text("OK"));
        let config = EngineConfig::default().with_timeout(100).with_poll_interval(10);
        let mut session = Session::with_config(MockDriver::new(page), config).unwrap();
        session
            .click_button_by_label("OK", LookupOptions::exact())
            .unwrap();
        assert_eq!(session.into_driver().click_count("ok"), 1);
    }

    #[test]
    fn test_error_kind_reexported() {
        let err = SeleniumError::stale("node-1");
        assert_eq!(err.kind(), ErrorKind::StaleElement);
        assert!(RetryPolicy::default().is_retryable(&err));
    }
}
