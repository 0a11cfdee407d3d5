//! Driver - Abstract Browser Session Trait
//!
//! The engine never launches or configures a browser. It consumes an already
//! running session through the [`Driver`] trait, which lets the same resolver
//! and guard run against a WebDriver client, a CDP bridge, or the in-memory
//! [`crate::mock::MockDriver`].
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  Driver (Abstract Trait)                                     │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ┌──────────────────┐  ┌──────────────────┐  ┌────────────┐  │
//! │  │  WebDriver HTTP  │  │  CDP bridge      │  │  Mock      │  │
//! │  │  (caller-owned)  │  │  (caller-owned)  │  │  (tests)   │  │
//! │  └──────────────────┘  └──────────────────┘  └────────────┘  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! All methods take `&mut self`: one session is one mutable resource, and a
//! single resolution or interaction holds it for its whole duration.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::frame::FrameContext;
use crate::locator::Locator;
use crate::result::SeleniumResult;

/// Opaque reference to a live node owned by the driver session.
///
/// The handle may go stale at any moment; callers must ask the driver
/// ([`Driver::is_stale`]) rather than trust it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ElementHandle {
    /// Driver-assigned element id
    pub id: String,
    /// Element tag name
    pub tag_name: String,
    /// Frame scope the element was resolved in (empty = top document)
    #[serde(default)]
    pub frame: FrameContext,
}

impl ElementHandle {
    /// Create a handle in the top document
    #[must_use]
    pub fn new(id: impl Into<String>, tag_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            tag_name: tag_name.into(),
            frame: FrameContext::default(),
        }
    }

    /// Record the frame scope this handle lives in
    #[must_use]
    pub fn in_frame(mut self, frame: FrameContext) -> Self {
        self.frame = frame;
        self
    }
}

impl fmt::Display for ElementHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}#{}>", self.tag_name, self.id)?;
        if !self.frame.is_default() {
            write!(f, " in {}", self.frame)?;
        }
        Ok(())
    }
}

/// Capability interface of a browser session.
///
/// Queries run against the current frame scope. Implementations report a
/// detached node as [`crate::SeleniumError::StaleElement`] and a hidden or
/// disabled node refused by a native action as
/// [`crate::SeleniumError::ElementNotInteractable`].
pub trait Driver {
    /// All nodes matching `locator` in the current scope, in document order
    fn find_all(&mut self, locator: &Locator) -> SeleniumResult<Vec<ElementHandle>>;

    /// Whether the node is rendered visibly
    fn is_displayed(&mut self, element: &ElementHandle) -> SeleniumResult<bool>;

    /// Whether the node accepts input
    fn is_enabled(&mut self, element: &ElementHandle) -> SeleniumResult<bool>;

    /// Whether the node has been detached or replaced
    fn is_stale(&mut self, element: &ElementHandle) -> SeleniumResult<bool>;

    /// Clear an editable field
    fn clear(&mut self, element: &ElementHandle) -> SeleniumResult<()>;

    /// Send keystrokes to a field
    fn type_text(&mut self, element: &ElementHandle, text: &str) -> SeleniumResult<()>;

    /// Click the node
    fn click(&mut self, element: &ElementHandle) -> SeleniumResult<()>;

    /// Move the pointer over the node
    fn hover(&mut self, element: &ElementHandle) -> SeleniumResult<()>;

    /// Select the `<option>` whose visible text equals `text`
    fn select_by_visible_text(&mut self, element: &ElementHandle, text: &str)
        -> SeleniumResult<()>;

    /// Select the `<option>` whose `value` attribute equals `value`
    fn select_by_value(&mut self, element: &ElementHandle, value: &str) -> SeleniumResult<()>;

    /// Snapshot of the current document's source
    fn page_source(&mut self) -> SeleniumResult<String>;

    /// Frames directly inside the current scope, in document order
    fn enumerate_frames(&mut self) -> SeleniumResult<Vec<ElementHandle>> {
        self.find_all(&Locator::tag_name("iframe")?)
    }

    /// Descend into a frame of the current scope
    fn switch_to_frame(&mut self, frame: &ElementHandle) -> SeleniumResult<()>;

    /// Return to the top document
    fn switch_to_default_content(&mut self) -> SeleniumResult<()>;
}

impl<D: Driver + ?Sized> Driver for &mut D {
    fn find_all(&mut self, locator: &Locator) -> SeleniumResult<Vec<ElementHandle>> {
        (**self).find_all(locator)
    }

    fn is_displayed(&mut self, element: &ElementHandle) -> SeleniumResult<bool> {
        (**self).is_displayed(element)
    }

    fn is_enabled(&mut self, element: &ElementHandle) -> SeleniumResult<bool> {
        (**self).is_enabled(element)
    }

    fn is_stale(&mut self, element: &ElementHandle) -> SeleniumResult<bool> {
        (**self).is_stale(element)
    }

    fn clear(&mut self, element: &ElementHandle) -> SeleniumResult<()> {
        (**self).clear(element)
    }

    fn type_text(&mut self, element: &ElementHandle, text: &str) -> SeleniumResult<()> {
        (**self).type_text(element, text)
    }

    fn click(&mut self, element: &ElementHandle) -> SeleniumResult<()> {
        (**self).click(element)
    }

    fn hover(&mut self, element: &ElementHandle) -> SeleniumResult<()> {
        (**self).hover(element)
    }

    fn select_by_visible_text(
        &mut self,
        element: &ElementHandle,
        text: &str,
    ) -> SeleniumResult<()> {
        (**self).select_by_visible_text(element, text)
    }

    fn select_by_value(&mut self, element: &ElementHandle, value: &str) -> SeleniumResult<()> {
        (**self).select_by_value(element, value)
    }

    fn page_source(&mut self) -> SeleniumResult<String> {
        (**self).page_source()
    }

    fn enumerate_frames(&mut self) -> SeleniumResult<Vec<ElementHandle>> {
        (**self).enumerate_frames()
    }

    fn switch_to_frame(&mut self, frame: &ElementHandle) -> SeleniumResult<()> {
        (**self).switch_to_frame(frame)
    }

    fn switch_to_default_content(&mut self) -> SeleniumResult<()> {
        (**self).switch_to_default_content()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod element_handle_tests {
        use super::*;

        #[test]
        fn test_element_handle_creation() {
            let elem = ElementHandle::new("node-1", "button");
            assert_eq!(elem.id, "node-1");
            assert_eq!(elem.tag_name, "button");
            assert!(elem.frame.is_default());
        }

        #[test]
        fn test_display_includes_frame() {
            let frame = ElementHandle::new("node-7", "iframe");
            let elem =
                ElementHandle::new("node-9", "input").in_frame(FrameContext::from(vec![frame]));
            let text = elem.to_string();
            assert!(text.starts_with("<input#node-9>"));
            assert!(text.contains("node-7"));
        }

        #[test]
        fn test_top_level_display() {
            assert_eq!(ElementHandle::new("n", "a").to_string(), "<a#n>");
        }
    }
}
