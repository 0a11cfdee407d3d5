//! Frame scopes.
//!
//! A [`FrameContext`] is the path of frame handles from the top document to
//! the scope a search runs in. [`FrameGuard`] acquires a scope by switching
//! into it and releases it in `Drop`, so the session is back on the default
//! content however the scoped work ends: success, `?`, or panic unwinding.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Deref, DerefMut};
use tracing::{debug, warn};

use crate::driver::{Driver, ElementHandle};
use crate::result::SeleniumResult;

/// Ordered frame path; empty means the top document
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameContext {
    frames: Vec<ElementHandle>,
}

impl FrameContext {
    /// The top document
    #[must_use]
    pub fn default_content() -> Self {
        Self::default()
    }

    /// Whether this is the top document
    #[must_use]
    pub fn is_default(&self) -> bool {
        self.frames.is_empty()
    }

    /// Nesting depth
    #[must_use]
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Frame handles from outermost to innermost
    #[must_use]
    pub fn frames(&self) -> &[ElementHandle] {
        &self.frames
    }

    /// This path extended by one more frame
    #[must_use]
    pub fn child(&self, frame: ElementHandle) -> Self {
        let mut frames = self.frames.clone();
        frames.push(frame);
        Self { frames }
    }
}

impl From<Vec<ElementHandle>> for FrameContext {
    fn from(frames: Vec<ElementHandle>) -> Self {
        Self { frames }
    }
}

impl fmt::Display for FrameContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.frames.is_empty() {
            return f.write_str("default content");
        }
        let path: Vec<&str> = self.frames.iter().map(|frame| frame.id.as_str()).collect();
        write!(f, "frame [{}]", path.join(" > "))
    }
}

/// Scoped switch into a [`FrameContext`].
///
/// Dereferences to the driver, so work inside the scope uses the guard as
/// the session. Dropping the guard switches back to the default content.
pub struct FrameGuard<'a, D: Driver + ?Sized> {
    driver: &'a mut D,
    context: FrameContext,
}

impl<'a, D: Driver + ?Sized> FrameGuard<'a, D> {
    /// Switch to the default content, then down `context` frame by frame.
    ///
    /// If any switch fails the partially entered scope is released before the
    /// error is returned.
    pub fn enter(driver: &'a mut D, context: &FrameContext) -> SeleniumResult<Self> {
        driver.switch_to_default_content()?;
        let mut guard = Self {
            driver,
            context: FrameContext::default(),
        };
        for frame in context.frames() {
            guard.driver.switch_to_frame(frame)?;
            guard.context.frames.push(frame.clone());
        }
        if !guard.context.is_default() {
            debug!(scope = %guard.context, "entered frame scope");
        }
        Ok(guard)
    }

    /// The scope currently held
    #[must_use]
    pub fn context(&self) -> &FrameContext {
        &self.context
    }
}

impl<D: Driver + ?Sized> Deref for FrameGuard<'_, D> {
    type Target = D;

    fn deref(&self) -> &D {
        self.driver
    }
}

impl<D: Driver + ?Sized> DerefMut for FrameGuard<'_, D> {
    fn deref_mut(&mut self) -> &mut D {
        self.driver
    }
}

impl<D: Driver + ?Sized> Drop for FrameGuard<'_, D> {
    fn drop(&mut self) {
        if let Err(err) = self.driver.switch_to_default_content() {
            warn!(scope = %self.context, error = %err, "failed to restore default content");
        } else if !self.context.is_default() {
            debug!(scope = %self.context, "left frame scope");
        }
    }
}

impl<D: Driver + ?Sized> fmt::Debug for FrameGuard<'_, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameGuard")
            .field("context", &self.context)
            .finish_non_exhaustive()
    }
}
