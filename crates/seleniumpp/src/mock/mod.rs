//! In-memory browser for tests and demos.
//!
//! [`MockDriver`] implements [`crate::Driver`] over a page built from
//! [`MockPage`] and [`MockElement`]. It evaluates the XPath subset the lookup
//! builders emit plus simple CSS, keeps nested frames as separate documents,
//! and lets a test script the document's behaviour over time:
//!
//! - [`MockDriver::schedule`] applies a [`Mutation`] after a delay (an element
//!   appears, detaches, becomes visible or enabled, or is replaced)
//! - [`MockDriver::fail_times`] makes a driver method fail a number of times
//! - [`MockDriver::call_history`] / [`MockDriver::was_called`] record every call
//!
//! ## Example
//!
//! ```
//! use seleniumpp::mock::{MockDriver, MockElement, MockPage};
//! use seleniumpp::{Driver, Locator};
//!
//! let mut driver = MockDriver::new(
//!     MockPage::new().with(MockElement::new("button").attr("id", "go").text("Go")),
//! );
//! let found = driver.find_all(&Locator::xpath("//button[text()='Go']").unwrap()).unwrap();
//! assert_eq!(found.len(), 1);
//! ```

mod document;
mod driver;
mod xpath;

pub use document::{MockElement, MockPage};
pub use driver::{MockDriver, Mutation};
