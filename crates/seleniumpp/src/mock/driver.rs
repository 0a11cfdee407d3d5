//! In-memory [`Driver`] for tests and demos.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::driver::{Driver, ElementHandle};
use crate::locator::Locator;
use crate::result::{SeleniumError, SeleniumResult};
use crate::xpath::normalize_space;

use super::document::{Dom, MockPage};

/// A change applied to the page, addressed by the element's `id` attribute
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    /// Insert a detached element into the document
    Attach(String),
    /// Remove an element from the document
    Detach(String),
    /// Render a hidden element
    Show(String),
    /// Stop rendering an element
    Hide(String),
    /// Allow input
    Enable(String),
    /// Reject input
    Disable(String),
    /// Swap the element for an identical copy; old handles go stale
    Replace(String),
    /// Change the element's own text
    SetText(String, String),
}

#[derive(Debug, Clone)]
struct Scheduled {
    due: Duration,
    mutation: Mutation,
}

#[derive(Debug, Clone)]
struct Fault {
    action: String,
    remaining: usize,
    error: SeleniumError,
}

/// Mock browser session over a [`MockPage`].
///
/// Handles are `node-<n>` ids into the page arena. A handle resolved in one
/// frame is stale from the point of view of any other frame, as in a real
/// session.
#[derive(Debug)]
pub struct MockDriver {
    dom: Dom,
    frames: Vec<usize>,
    started: Instant,
    scheduled: VecDeque<Scheduled>,
    faults: Vec<Fault>,
    call_history: Vec<String>,
    hovered: Option<usize>,
}

impl MockDriver {
    /// Create a session showing `page`
    #[must_use]
    pub fn new(page: MockPage) -> Self {
        Self {
            dom: Dom::build(page),
            frames: Vec::new(),
            started: Instant::now(),
            scheduled: VecDeque::new(),
            faults: Vec::new(),
            call_history: Vec::new(),
            hovered: None,
        }
    }

    /// Apply `mutation` once `after` has elapsed since the session started.
    ///
    /// Due mutations are applied at the start of the next driver call.
    pub fn schedule(&mut self, after: Duration, mutation: Mutation) {
        let due = self.started.elapsed() + after;
        let index = self.scheduled.partition_point(|s| s.due <= due);
        self.scheduled.insert(index, Scheduled { due, mutation });
    }

    /// Apply `mutation` now
    pub fn apply(&mut self, mutation: &Mutation) {
        let dom_id = match mutation {
            Mutation::Attach(id)
            | Mutation::Detach(id)
            | Mutation::Show(id)
            | Mutation::Hide(id)
            | Mutation::Enable(id)
            | Mutation::Disable(id)
            | Mutation::Replace(id)
            | Mutation::SetText(id, _) => id.as_str(),
        };
        let Some(node) = self
            .live_by_dom_id(dom_id)
            .or_else(|| self.dom.by_dom_id(dom_id))
        else {
            return;
        };
        match mutation {
            Mutation::Attach(_) => self.dom.nodes[node].attached = true,
            Mutation::Detach(_) => self.dom.nodes[node].attached = false,
            Mutation::Show(_) => self.dom.nodes[node].displayed = true,
            Mutation::Hide(_) => self.dom.nodes[node].displayed = false,
            Mutation::Enable(_) => self.dom.nodes[node].enabled = true,
            Mutation::Disable(_) => self.dom.nodes[node].enabled = false,
            Mutation::Replace(_) => {
                self.dom.replace(node);
            }
            Mutation::SetText(_, text) => self.dom.nodes[node].text.clone_from(text),
        }
    }

    /// Make the next `times` calls of `action` (a [`Driver`] method name) fail
    pub fn fail_times(&mut self, action: &str, times: usize, error: SeleniumError) {
        self.faults.push(Fault {
            action: action.to_string(),
            remaining: times,
            error,
        });
    }

    /// Make every call of `action` fail
    pub fn fail_always(&mut self, action: &str, error: SeleniumError) {
        self.fail_times(action, usize::MAX, error);
    }

    /// Every driver call so far, as `method(argument)`
    #[must_use]
    pub fn call_history(&self) -> &[String] {
        &self.call_history
    }

    /// Whether `method` has been called
    #[must_use]
    pub fn was_called(&self, method: &str) -> bool {
        self.call_count(method) > 0
    }

    /// How many times `method` has been called
    #[must_use]
    pub fn call_count(&self, method: &str) -> usize {
        self.call_history
            .iter()
            .filter(|entry| entry.split('(').next() == Some(method))
            .count()
    }

    /// Forget the call history
    pub fn clear_history(&mut self) {
        self.call_history.clear();
    }

    /// Number of frames currently entered
    #[must_use]
    pub fn frame_depth(&self) -> usize {
        self.frames.len()
    }

    /// The `id` attribute of the node behind `handle`
    #[must_use]
    pub fn dom_id_of(&self, handle: &ElementHandle) -> Option<String> {
        let node = parse_node_id(handle).filter(|&node| node < self.dom.nodes.len())?;
        self.dom.attr(node, "id").map(str::to_string)
    }

    /// Current value of the attached field with `id` attribute `dom_id`
    #[must_use]
    pub fn value_of(&self, dom_id: &str) -> Option<String> {
        self.live_by_dom_id(dom_id)
            .map(|node| self.dom.nodes[node].value.clone())
    }

    /// Visible text of the selected option of the select `dom_id`
    #[must_use]
    pub fn selected_text(&self, dom_id: &str) -> Option<String> {
        self.selected_option(dom_id)
            .map(|option| normalize_space(&self.dom.string_value(option)))
    }

    /// `value` attribute of the selected option of the select `dom_id`
    #[must_use]
    pub fn selected_value(&self, dom_id: &str) -> Option<String> {
        self.selected_option(dom_id)
            .and_then(|option| self.dom.attr(option, "value").map(str::to_string))
    }

    /// Successful clicks on the attached element `dom_id`
    #[must_use]
    pub fn click_count(&self, dom_id: &str) -> u32 {
        self.live_by_dom_id(dom_id)
            .map_or(0, |node| self.dom.nodes[node].clicks)
    }

    /// `id` attribute of the element last hovered
    #[must_use]
    pub fn hovered(&self) -> Option<String> {
        self.hovered
            .and_then(|node| self.dom.attr(node, "id").map(str::to_string))
    }

    fn live_by_dom_id(&self, dom_id: &str) -> Option<usize> {
        (0..self.dom.nodes.len())
            .find(|&node| self.dom.attr(node, "id") == Some(dom_id) && self.dom.is_connected(node))
    }

    fn selected_option(&self, dom_id: &str) -> Option<usize> {
        let select = self.live_by_dom_id(dom_id)?;
        let options = self.options(select);
        options
            .iter()
            .copied()
            .find(|&option| self.dom.nodes[option].selected)
            .or_else(|| options.first().copied())
    }

    fn options(&self, select: usize) -> Vec<usize> {
        let mut stack = vec![select];
        let mut out = Vec::new();
        while let Some(node) = stack.pop() {
            for child in self.dom.children(node).collect::<Vec<_>>().into_iter().rev() {
                if self.dom.nodes[child].tag == "option" {
                    out.push(child);
                }
                stack.push(child);
            }
        }
        out.sort_by_key(|&option| self.dom.nodes[option].order);
        out
    }

    fn current_doc(&self) -> usize {
        self.frames
            .last()
            .and_then(|&frame| self.dom.nodes[frame].frame_doc)
            .unwrap_or(0)
    }

    /// Apply due mutations, record the call, and fire any injected fault
    fn enter(&mut self, method: &str, argument: &str) -> SeleniumResult<()> {
        let now = self.started.elapsed();
        while self.scheduled.front().is_some_and(|s| s.due <= now) {
            if let Some(scheduled) = self.scheduled.pop_front() {
                self.apply(&scheduled.mutation);
            }
        }

        self.call_history.push(format!("{method}({argument})"));

        if let Some(fault) = self
            .faults
            .iter_mut()
            .find(|fault| fault.action == method && fault.remaining > 0)
        {
            fault.remaining = fault.remaining.saturating_sub(1);
            return Err(fault.error.clone());
        }
        Ok(())
    }

    /// Node behind `handle` if it is attached and in the current document
    fn live(&self, handle: &ElementHandle) -> Option<usize> {
        let node = parse_node_id(handle)?;
        (node < self.dom.nodes.len()
            && self.dom.is_connected(node)
            && self.dom.nodes[node].doc == self.current_doc())
        .then_some(node)
    }

    fn resolve(&self, handle: &ElementHandle) -> SeleniumResult<usize> {
        self.live(handle)
            .ok_or_else(|| SeleniumError::stale(handle.id.clone()))
    }

    /// Node behind `handle`, refusing hidden or disabled ones like a browser does
    fn interactable(&self, handle: &ElementHandle) -> SeleniumResult<usize> {
        let node = self.resolve(handle)?;
        if !self.dom.is_displayed(node) {
            return Err(SeleniumError::not_interactable(handle.id.clone(), "element not visible"));
        }
        if !self.dom.nodes[node].enabled {
            return Err(SeleniumError::not_interactable(handle.id.clone(), "element is disabled"));
        }
        Ok(node)
    }

    fn select(&self, handle: &ElementHandle) -> SeleniumResult<usize> {
        let node = self.interactable(handle)?;
        if self.dom.nodes[node].tag != "select" {
            return Err(SeleniumError::driver(format!(
                "element {} is a <{}>, not a <select>",
                handle.id, self.dom.nodes[node].tag
            )));
        }
        Ok(node)
    }

    fn choose(
        &mut self,
        handle: &ElementHandle,
        select: usize,
        wanted: &str,
        matches: impl Fn(&Dom, usize) -> bool,
    ) -> SeleniumResult<()> {
        let options = self.options(select);
        let chosen = options
            .iter()
            .copied()
            .find(|&option| matches(&self.dom, option))
            .ok_or_else(|| SeleniumError::OptionNotFound {
                element: handle.id.clone(),
                option: wanted.to_string(),
            })?;
        for option in options {
            self.dom.nodes[option].selected = option == chosen;
        }
        Ok(())
    }

    fn handle_for(&self, node: usize) -> ElementHandle {
        ElementHandle::new(format!("node-{node}"), self.dom.nodes[node].tag.clone())
    }
}

fn parse_node_id(handle: &ElementHandle) -> Option<usize> {
    handle.id.strip_prefix("node-")?.parse().ok()
}

impl Driver for MockDriver {
    fn find_all(&mut self, locator: &Locator) -> SeleniumResult<Vec<ElementHandle>> {
        self.enter("find_all", &locator.to_string())?;
        let found = self.dom.find(self.current_doc(), locator)?;
        Ok(found.into_iter().map(|node| self.handle_for(node)).collect())
    }

    fn is_displayed(&mut self, element: &ElementHandle) -> SeleniumResult<bool> {
        self.enter("is_displayed", &element.id)?;
        let node = self.resolve(element)?;
        Ok(self.dom.is_displayed(node))
    }

    fn is_enabled(&mut self, element: &ElementHandle) -> SeleniumResult<bool> {
        self.enter("is_enabled", &element.id)?;
        let node = self.resolve(element)?;
        Ok(self.dom.nodes[node].enabled)
    }

    fn is_stale(&mut self, element: &ElementHandle) -> SeleniumResult<bool> {
        self.enter("is_stale", &element.id)?;
        Ok(self.live(element).is_none())
    }

    fn clear(&mut self, element: &ElementHandle) -> SeleniumResult<()> {
        self.enter("clear", &element.id)?;
        let node = self.interactable(element)?;
        self.dom.nodes[node].value.clear();
        Ok(())
    }

    fn type_text(&mut self, element: &ElementHandle, text: &str) -> SeleniumResult<()> {
        self.enter("type_text", &format!("{}, {text}", element.id))?;
        let node = self.interactable(element)?;
        self.dom.nodes[node].value.push_str(text);
        Ok(())
    }

    fn click(&mut self, element: &ElementHandle) -> SeleniumResult<()> {
        self.enter("click", &element.id)?;
        let node = self.interactable(element)?;
        self.dom.nodes[node].clicks += 1;
        Ok(())
    }

    fn hover(&mut self, element: &ElementHandle) -> SeleniumResult<()> {
        self.enter("hover", &element.id)?;
        let node = self.resolve(element)?;
        if !self.dom.is_displayed(node) {
            return Err(SeleniumError::not_interactable(element.id.clone(), "element not visible"));
        }
        self.hovered = Some(node);
        Ok(())
    }

    fn select_by_visible_text(
        &mut self,
        element: &ElementHandle,
        text: &str,
    ) -> SeleniumResult<()> {
        self.enter("select_by_visible_text", &format!("{}, {text}", element.id))?;
        let select = self.select(element)?;
        let wanted = normalize_space(text);
        self.choose(element, select, text, |dom, option| {
            normalize_space(&dom.string_value(option)) == wanted
        })
    }

    fn select_by_value(&mut self, element: &ElementHandle, value: &str) -> SeleniumResult<()> {
        self.enter("select_by_value", &format!("{}, {value}", element.id))?;
        let select = self.select(element)?;
        self.choose(element, select, value, |dom, option| {
            dom.attr(option, "value") == Some(value)
        })
    }

    fn page_source(&mut self) -> SeleniumResult<String> {
        self.enter("page_source", "")?;
        Ok(self.dom.render(self.current_doc()))
    }

    fn enumerate_frames(&mut self) -> SeleniumResult<Vec<ElementHandle>> {
        self.enter("enumerate_frames", "")?;
        let frames = self
            .dom
            .elements(self.current_doc())
            .into_iter()
            .filter(|&node| self.dom.nodes[node].tag == "iframe")
            .map(|node| self.handle_for(node))
            .collect();
        Ok(frames)
    }

    fn switch_to_frame(&mut self, frame: &ElementHandle) -> SeleniumResult<()> {
        self.enter("switch_to_frame", &frame.id)?;
        let node = self.resolve(frame)?;
        if self.dom.nodes[node].frame_doc.is_none() {
            return Err(SeleniumError::driver(format!("no such frame: {}", frame.id)));
        }
        self.frames.push(node);
        Ok(())
    }

    fn switch_to_default_content(&mut self) -> SeleniumResult<()> {
        self.enter("switch_to_default_content", "")?;
        self.frames.clear();
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::mock::MockElement;

    fn form() -> MockDriver {
        MockDriver::new(
            MockPage::new()
                .with(MockElement::new("input").attr("id", "name").value("abc"))
                .with(
                    MockElement::new("select")
                        .attr("id", "answer")
                        .option("1", "Yes")
                        .option("0", "No"),
                )
                .with(MockElement::new("button").attr("id", "go").text("Go"))
                .with(MockElement::new("button").attr("id", "off").text("Off").disabled())
                .with(
                    MockElement::new("iframe").attr("id", "pay").frame(
                        MockPage::new().with(MockElement::new("input").attr("id", "card")),
                    ),
                ),
        )
    }

    fn one(driver: &mut MockDriver, id: &str) -> ElementHandle {
        driver.find_all(&Locator::id(id).unwrap()).unwrap().remove(0)
    }

    mod action_tests {
        use super::*;

        #[test]
        fn test_clear_and_type() {
            let mut driver = form();
            let input = one(&mut driver, "name");
            driver.type_text(&input, "def").unwrap();
            assert_eq!(driver.value_of("name").as_deref(), Some("abcdef"));
            driver.clear(&input).unwrap();
            driver.type_text(&input, "xyz").unwrap();
            assert_eq!(driver.value_of("name").as_deref(), Some("xyz"));
        }

        #[test]
        fn test_select_by_text_and_value() {
            let mut driver = form();
            let select = one(&mut driver, "answer");
            assert_eq!(driver.selected_text("answer").as_deref(), Some("Yes"));
            driver.select_by_visible_text(&select, "No").unwrap();
            assert_eq!(driver.selected_value("answer").as_deref(), Some("0"));
            driver.select_by_value(&select, "1").unwrap();
            assert_eq!(driver.selected_text("answer").as_deref(), Some("Yes"));
        }

        #[test]
        fn test_missing_option() {
            let mut driver = form();
            let select = one(&mut driver, "answer");
            let err = driver.select_by_visible_text(&select, "Maybe").unwrap_err();
            assert!(matches!(err, SeleniumError::OptionNotFound { .. }));
        }

        #[test]
        fn test_select_on_non_select() {
            let mut driver = form();
            let input = one(&mut driver, "name");
            let err = driver.select_by_value(&input, "x").unwrap_err();
            assert!(matches!(err, SeleniumError::Driver { .. }));
        }

        #[test]
        fn test_disabled_click_refused() {
            let mut driver = form();
            let off = one(&mut driver, "off");
            let err = driver.click(&off).unwrap_err();
            assert!(matches!(err, SeleniumError::ElementNotInteractable { .. }));
            assert_eq!(driver.click_count("off"), 0);
        }

        #[test]
        fn test_page_source() {
            let mut driver = form();
            let html = driver.page_source().unwrap();
            assert!(html.contains("<button id=\"go\">Go</button>"));
            assert!(!html.contains("card"));
        }
    }

    mod frame_tests {
        use super::*;

        #[test]
        fn test_switch_scopes_queries() {
            let mut driver = form();
            let frames = driver.enumerate_frames().unwrap();
            assert_eq!(frames.len(), 1);
            assert!(driver.find_all(&Locator::id("card").unwrap()).unwrap().is_empty());
            driver.switch_to_frame(&frames[0]).unwrap();
            assert_eq!(driver.frame_depth(), 1);
            let card = one(&mut driver, "card");
            driver.switch_to_default_content().unwrap();
            assert!(driver.is_stale(&card).unwrap());
        }

        #[test]
        fn test_switch_to_non_frame_fails() {
            let mut driver = form();
            let button = one(&mut driver, "go");
            assert!(driver.switch_to_frame(&button).is_err());
            assert_eq!(driver.frame_depth(), 0);
        }
    }

    mod mutation_tests {
        use super::*;

        #[test]
        fn test_replace_makes_handle_stale() {
            let mut driver = form();
            let go = one(&mut driver, "go");
            driver.apply(&Mutation::Replace("go".into()));
            assert!(driver.is_stale(&go).unwrap());
            assert!(matches!(driver.click(&go), Err(SeleniumError::StaleElement { .. })));
            let fresh = one(&mut driver, "go");
            assert_ne!(fresh.id, go.id);
            driver.click(&fresh).unwrap();
            assert_eq!(driver.click_count("go"), 1);
        }

        #[test]
        fn test_scheduled_mutation_applies_on_next_call() {
            let mut driver = form();
            driver.schedule(Duration::from_millis(20), Mutation::Detach("go".into()));
            assert_eq!(driver.find_all(&Locator::id("go").unwrap()).unwrap().len(), 1);
            std::thread::sleep(Duration::from_millis(30));
            assert!(driver.find_all(&Locator::id("go").unwrap()).unwrap().is_empty());
        }

        #[test]
        fn test_set_text() {
            let mut driver = form();
            driver.apply(&Mutation::SetText("go".into(), "Went".into()));
            assert!(driver.page_source().unwrap().contains(">Went<"));
        }
    }

    mod fault_tests {
        use super::*;

        #[test]
        fn test_fail_times_then_recover() {
            let mut driver = form();
            let go = one(&mut driver, "go");
            driver.fail_times("click", 2, SeleniumError::stale(go.id.clone()));
            assert!(driver.click(&go).is_err());
            assert!(driver.click(&go).is_err());
            driver.click(&go).unwrap();
            assert_eq!(driver.call_count("click"), 3);
            assert_eq!(driver.click_count("go"), 1);
        }

        #[test]
        fn test_history() {
            let mut driver = form();
            let go = one(&mut driver, "go");
            driver.hover(&go).unwrap();
            assert!(driver.was_called("hover"));
            assert!(!driver.was_called("click"));
            assert_eq!(driver.hovered().as_deref(), Some("go"));
            assert!(driver.call_history()[0].starts_with("find_all(id=go"));
            driver.clear_history();
            assert!(driver.call_history().is_empty());
        }
    }
}
