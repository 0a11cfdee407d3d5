//! High-level lookup and form helpers over one browser session.
//!
//! [`Session`] owns the driver and an [`EngineConfig`], and composes the
//! locator builders, [`ElementResolver`] and [`InteractionGuard`] into the
//! calls a script actually makes:
//!
//! ```
//! use seleniumpp::mock::{MockDriver, MockElement, MockPage};
//! use seleniumpp::{LookupOptions, Session};
//!
//! let page = MockPage::new()
//!     .with(MockElement::new("input").attr("id", "email").attr("name", "email"))
//!     .with(MockElement::new("button").text("Sign in"));
//! let mut session = Session::new(MockDriver::new(page));
//!
//! session.fill_input_by_attribute("name", "email", "a@b.c", LookupOptions::exact())?;
//! session.click_button_by_label("Sign in", LookupOptions::exact())?;
//! assert_eq!(session.driver().value_of("email").as_deref(), Some("a@b.c"));
//! # Ok::<(), seleniumpp::SeleniumError>(())
//! ```

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::EngineConfig;
use crate::driver::{Driver, ElementHandle};
use crate::frame::FrameContext;
use crate::interaction::{InteractionGuard, Target};
use crate::locator::{Locator, TextMatch};
use crate::resolver::ElementResolver;
use crate::result::SeleniumResult;
use crate::wait::{PredicateKind, WaitSpec, Waiter};
use crate::xpath;

/// Option text chosen by [`Session::fill_boolean_select`] for `true`
pub const BOOLEAN_TRUE_TEXT: &str = "Yes";

/// Option text chosen by [`Session::fill_boolean_select`] for `false`
pub const BOOLEAN_FALSE_TEXT: &str = "No";

// =============================================================================
// LOOKUP OPTIONS
// =============================================================================

/// Per-call overrides for one lookup.
///
/// Unset fields fall back to the session's [`EngineConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LookupOptions {
    /// Whole-value instead of substring comparison
    pub exact: bool,
    /// Case folding override
    pub case_insensitive: Option<bool>,
    /// Timeout override in milliseconds
    pub timeout_ms: Option<u64>,
    /// Hover over the element once it is found
    pub move_to_element: Option<bool>,
}

impl LookupOptions {
    /// Substring comparison, everything else from the config
    #[must_use]
    pub const fn fuzzy() -> Self {
        Self {
            exact: false,
            case_insensitive: None,
            timeout_ms: None,
            move_to_element: None,
        }
    }

    /// Whole-value comparison, everything else from the config
    #[must_use]
    pub const fn exact() -> Self {
        Self {
            exact: true,
            ..Self::fuzzy()
        }
    }

    /// Set the comparison mode
    #[must_use]
    pub const fn with_exact(mut self, exact: bool) -> Self {
        self.exact = exact;
        self
    }

    /// Override case folding
    #[must_use]
    pub const fn with_case_insensitive(mut self, case_insensitive: bool) -> Self {
        self.case_insensitive = Some(case_insensitive);
        self
    }

    /// Override the timeout
    #[must_use]
    pub const fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    /// Override hovering
    #[must_use]
    pub const fn with_move_to_element(mut self, move_to_element: bool) -> Self {
        self.move_to_element = Some(move_to_element);
        self
    }
}

// =============================================================================
// SESSION
// =============================================================================

/// A driver plus the settings every helper call shares
#[derive(Debug)]
pub struct Session<D: Driver> {
    driver: D,
    config: EngineConfig,
    resolver: ElementResolver,
    guard: InteractionGuard,
    waiter: Waiter,
}

impl<D: Driver> Session<D> {
    /// Wrap `driver` with the default configuration
    pub fn new(driver: D) -> Self {
        Self::assemble(driver, EngineConfig::default())
    }

    /// Wrap `driver` with a validated `config`
    pub fn with_config(driver: D, config: EngineConfig) -> SeleniumResult<Self> {
        config.validate()?;
        Ok(Self::assemble(driver, config))
    }

    fn assemble(driver: D, config: EngineConfig) -> Self {
        Self {
            resolver: ElementResolver::new(config.resolver_options()),
            guard: InteractionGuard::new(config.retry_policy()),
            waiter: Waiter::new(),
            driver,
            config,
        }
    }

    /// Active configuration
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The wrapped driver
    pub const fn driver(&self) -> &D {
        &self.driver
    }

    /// The wrapped driver, mutably
    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }

    /// Give the driver back
    pub fn into_driver(self) -> D {
        self.driver
    }

    // ===== LOOKUPS =====

    /// First node matching `locator`
    pub fn find_element(
        &mut self,
        locator: &Locator,
        options: LookupOptions,
    ) -> SeleniumResult<ElementHandle> {
        self.locate(locator, PredicateKind::PresenceOf, options)
    }

    /// Element with the given `id`
    pub fn find_element_by_id(
        &mut self,
        id: &str,
        options: LookupOptions,
    ) -> SeleniumResult<ElementHandle> {
        self.find_element(&Locator::id(id)?, options)
    }

    /// First `tag` element whose `attribute` matches `value`.
    ///
    /// Pass `"*"` for any tag. Scripts usually want [`LookupOptions::exact`] here.
    pub fn get_element_by_attribute(
        &mut self,
        attribute: &str,
        value: &str,
        tag: &str,
        options: LookupOptions,
    ) -> SeleniumResult<ElementHandle> {
        let locator = xpath::build_xpath(tag, attribute, value, self.text_match(options))?;
        self.find_element(&locator, options)
    }

    /// First `tag` element carrying `text` in its subtree (or, fuzzy, in its
    /// class, aria-label or placeholder)
    pub fn find_element_by_text_or_attribute(
        &mut self,
        text: &str,
        tag: &str,
        options: LookupOptions,
    ) -> SeleniumResult<ElementHandle> {
        let locator = xpath::text_or_attribute(text, tag, self.text_match(options))?;
        self.find_element(&locator, options)
    }

    /// [`Self::find_element_by_text_or_attribute`] restricted to `button`
    pub fn find_button_by_text_or_attribute(
        &mut self,
        text: &str,
        options: LookupOptions,
    ) -> SeleniumResult<ElementHandle> {
        self.find_element_by_text_or_attribute(text, "button", options)
    }

    /// First clickable `tag` element with the given text
    pub fn get_clickable_element_by_text(
        &mut self,
        text: &str,
        tag: &str,
        options: LookupOptions,
    ) -> SeleniumResult<ElementHandle> {
        let locator = xpath::clickable_text(text, tag, self.text_match(options))?;
        self.locate(&locator, PredicateKind::ClickableOf, options)
    }

    /// Every element whose own text equals or contains `text`
    pub fn get_clickable_elements_by_text(
        &mut self,
        text: &str,
        options: LookupOptions,
    ) -> SeleniumResult<Vec<ElementHandle>> {
        let locator = xpath::any_text(text, self.text_match(options))?;
        self.locate_all(&locator, options)
    }

    /// First clickable button, role button or input button with `label`
    pub fn get_button_by_label(
        &mut self,
        label: &str,
        options: LookupOptions,
    ) -> SeleniumResult<ElementHandle> {
        let locator = self.label_locator(label, options)?;
        self.locate(&locator, PredicateKind::ClickableOf, options)
    }

    /// Every button-like element with `label`
    pub fn get_buttons_by_label(
        &mut self,
        label: &str,
        options: LookupOptions,
    ) -> SeleniumResult<Vec<ElementHandle>> {
        let locator = self.label_locator(label, options)?;
        self.locate_all(&locator, options)
    }

    // ===== ACTIONS =====

    /// Click the node matching `locator`, re-resolving it on every attempt
    pub fn click(&mut self, locator: &Locator, options: LookupOptions) -> SeleniumResult<()> {
        let spec = self.spec(PredicateKind::ClickableOf, options);
        let resolver = self.resolver;
        let guard = &self.guard;
        let mut hover = self.hovers(options);
        let target = Target::relocate(move |driver: &mut D| {
            let element = resolver.resolve_one(driver, locator, &spec, &FrameContext::default())?;
            if hover {
                guard.hover(driver, &element);
                hover = false;
            }
            Ok(element)
        });
        self.guard.click(&mut self.driver, target)
    }

    /// Click an already resolved handle
    pub fn click_element(&mut self, element: &ElementHandle) -> SeleniumResult<()> {
        self.guard.click(&mut self.driver, element.clone())
    }

    /// Click the button labelled `label`
    pub fn click_button_by_label(
        &mut self,
        label: &str,
        options: LookupOptions,
    ) -> SeleniumResult<()> {
        let locator = self.label_locator(label, options)?;
        self.click(&locator, options)
    }

    /// Replace the contents of the field matching `locator`
    pub fn fill_input(
        &mut self,
        locator: &Locator,
        text: &str,
        options: LookupOptions,
    ) -> SeleniumResult<()> {
        let element = self.find_element(locator, options)?;
        self.guard.fill(&mut self.driver, &element, text)
    }

    /// Fill the `input` whose `attribute` matches `value`
    pub fn fill_input_by_attribute(
        &mut self,
        attribute: &str,
        value: &str,
        text: &str,
        options: LookupOptions,
    ) -> SeleniumResult<()> {
        let locator = xpath::build_xpath("input", attribute, value, self.text_match(options))?;
        self.fill_input(&locator, text, options)
    }

    /// Choose an option of the select matching `locator` by visible text
    pub fn select_option_by_text(
        &mut self,
        locator: &Locator,
        option_text: &str,
        options: LookupOptions,
    ) -> SeleniumResult<()> {
        let element = self.find_element(locator, options)?;
        self.guard.select_by_text(&mut self.driver, &element, option_text)
    }

    /// Choose an option of the select matching `locator` by `value`
    pub fn select_option_by_value(
        &mut self,
        locator: &Locator,
        option_value: &str,
        options: LookupOptions,
    ) -> SeleniumResult<()> {
        let element = self.find_element(locator, options)?;
        self.guard.select_by_value(&mut self.driver, &element, option_value)
    }

    /// Choose by visible text in the `select` whose `attribute` matches `value`
    pub fn fill_select_by_text(
        &mut self,
        attribute: &str,
        value: &str,
        option_text: &str,
        options: LookupOptions,
    ) -> SeleniumResult<()> {
        let locator = xpath::build_xpath("select", attribute, value, self.text_match(options))?;
        self.select_option_by_text(&locator, option_text, options)
    }

    /// Choose by option value in the `select` whose `attribute` matches `value`
    pub fn fill_select_by_value(
        &mut self,
        attribute: &str,
        value: &str,
        option_value: &str,
        options: LookupOptions,
    ) -> SeleniumResult<()> {
        let locator = xpath::build_xpath("select", attribute, value, self.text_match(options))?;
        self.select_option_by_value(&locator, option_value, options)
    }

    /// Choose the "Yes" or "No" option by visible text, whatever the option values
    pub fn fill_boolean_select(
        &mut self,
        attribute: &str,
        value: &str,
        answer: bool,
        options: LookupOptions,
    ) -> SeleniumResult<()> {
        let text = if answer {
            BOOLEAN_TRUE_TEXT
        } else {
            BOOLEAN_FALSE_TEXT
        };
        self.fill_select_by_text(attribute, value, text, options)
    }

    /// Type `date` in the configured date format
    pub fn fill_date_input(
        &mut self,
        attribute: &str,
        value: &str,
        date: NaiveDate,
        options: LookupOptions,
    ) -> SeleniumResult<()> {
        let text = self.config.format_date(date)?;
        self.fill_input_by_attribute(attribute, value, &text, options)
    }

    /// Type `datetime` in the configured datetime format
    pub fn fill_datetime_input(
        &mut self,
        attribute: &str,
        value: &str,
        datetime: NaiveDateTime,
        options: LookupOptions,
    ) -> SeleniumResult<()> {
        let text = self.config.format_datetime(datetime)?;
        self.fill_input_by_attribute(attribute, value, &text, options)
    }

    /// Hover over `element`; `false` if that failed (the failure is logged)
    pub fn move_to_element(&mut self, element: &ElementHandle) -> bool {
        self.guard.hover(&mut self.driver, element)
    }

    /// Wait until `text` appears in the page source
    pub fn wait_for_page_text(&mut self, text: &str, options: LookupOptions) -> SeleniumResult<()> {
        let spec = self.spec(PredicateKind::PageContains, options);
        self.waiter
            .until_page_contains(&mut self.driver, text, &spec, &FrameContext::default())?;
        Ok(())
    }

    // ===== INTERNALS =====

    fn text_match(&self, options: LookupOptions) -> TextMatch {
        let mut m = self.config.text_match(options.exact);
        if let Some(case_insensitive) = options.case_insensitive {
            m.case_insensitive = case_insensitive;
        }
        m
    }

    fn hovers(&self, options: LookupOptions) -> bool {
        options
            .move_to_element
            .unwrap_or(self.config.move_to_element)
    }

    fn spec(&self, predicate: PredicateKind, options: LookupOptions) -> WaitSpec {
        let spec = self.config.wait_spec(predicate);
        match options.timeout_ms {
            Some(timeout_ms) => spec
                .with_timeout(timeout_ms)
                .with_poll_interval(spec.poll_interval_ms.min(timeout_ms)),
            None => spec,
        }
    }

    fn label_locator(&self, label: &str, options: LookupOptions) -> SeleniumResult<Locator> {
        xpath::button_label(label, self.text_match(options), self.config.button_union())
    }

    fn locate(
        &mut self,
        locator: &Locator,
        predicate: PredicateKind,
        options: LookupOptions,
    ) -> SeleniumResult<ElementHandle> {
        let spec = self.spec(predicate, options);
        let element =
            self.resolver
                .resolve_one(&mut self.driver, locator, &spec, &FrameContext::default())?;
        debug!(locator = %locator, element = %element, "located");
        if self.hovers(options) {
            self.guard.hover(&mut self.driver, &element);
        }
        Ok(element)
    }

    fn locate_all(
        &mut self,
        locator: &Locator,
        options: LookupOptions,
    ) -> SeleniumResult<Vec<ElementHandle>> {
        let spec = self.spec(PredicateKind::AllPresent, options);
        let elements =
            self.resolver
                .resolve_all(&mut self.driver, locator, &spec, &FrameContext::default())?;
        debug!(locator = %locator, count = elements.len(), "located all");
        if self.hovers(options) {
            for element in &elements {
                self.guard.hover(&mut self.driver, element);
            }
        }
        Ok(elements)
    }
}
